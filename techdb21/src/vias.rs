//!
//! # Via Definitions
//!
//! Standard (parameterized) vias and custom (cell-referencing) vias.
//! Each is created once per name; later edits go through [ViaDb::update_std_via].
//!

// Std-Lib
use std::collections::HashMap;

// Crates.io
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

// Local
use crate::error::{TechError, TechResult};
use crate::TechDecimal;

/// # Two-Dimensional Dimension Pair
/// Used for cut spacings, enclosures and offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XyPair {
    pub x: TechDecimal,
    pub y: TechDecimal,
}
impl XyPair {
    pub fn new(x: TechDecimal, y: TechDecimal) -> Self {
        Self { x, y }
    }
}

/// # Implant Layer and Enclosure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplantSpec {
    pub layer: String,
    pub enclosure: XyPair,
}

/// # Standard Via Template
#[derive(Clone, Builder, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[builder(pattern = "owned", setter(into))]
pub struct StdVia {
    pub name: String,
    /// Bottom conductor layer
    pub layer1: String,
    pub cut: String,
    /// Top conductor layer
    pub layer2: String,
    pub cut_width: TechDecimal,
    pub cut_height: TechDecimal,
    /// Resistance per cut
    #[builder(default, setter(strip_option))]
    pub resistance: Option<TechDecimal>,
    #[builder(default = "1")]
    pub rows: u32,
    #[builder(default = "1")]
    pub cols: u32,
    #[builder(default)]
    pub cut_space: XyPair,
    #[builder(default)]
    pub enc1: XyPair,
    #[builder(default)]
    pub enc2: XyPair,
    #[builder(default)]
    pub off1: XyPair,
    #[builder(default)]
    pub off2: XyPair,
    #[builder(default)]
    pub orig_off: XyPair,
    #[builder(default, setter(strip_option))]
    pub implant1: Option<ImplantSpec>,
    #[builder(default, setter(strip_option))]
    pub implant2: Option<ImplantSpec>,
}

/// # Custom Via
/// A via realized by a library cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomVia {
    pub name: String,
    pub lib: String,
    pub cell: String,
    pub view: String,
    pub layer1: String,
    pub layer2: String,
    pub resistance: Option<TechDecimal>,
}

/// # Via Database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViaDb {
    std_vias: Vec<StdVia>,
    custom_vias: Vec<CustomVia>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}
impl ViaDb {
    /// Add a [StdVia]. Names must be unique across standard and custom vias.
    pub fn add_std_via(&mut self, via: StdVia) -> TechResult<()> {
        self.check_unique(&via.name)?;
        self.index.insert(via.name.clone(), self.std_vias.len());
        self.std_vias.push(via);
        Ok(())
    }
    /// Add a [CustomVia]
    pub fn add_custom_via(&mut self, via: CustomVia) -> TechResult<()> {
        self.check_unique(&via.name)?;
        self.custom_vias.push(via);
        Ok(())
    }
    fn check_unique(&self, name: &str) -> TechResult<()> {
        if self.index.contains_key(name) || self.custom_vias.iter().any(|v| v.name == name) {
            return TechError::fail(format!("Via {} is already defined", name));
        }
        Ok(())
    }
    /// Modify standard via `name` through `f`. The name itself may not change.
    pub fn update_std_via(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut StdVia),
    ) -> TechResult<()> {
        let idx = match self.index.get(name) {
            Some(idx) => *idx,
            None => return TechError::fail(format!("No standard via named {}", name)),
        };
        let via = &mut self.std_vias[idx];
        f(via);
        if via.name != name {
            via.name = name.into();
            return TechError::fail(format!("Standard via {} may not be renamed", name));
        }
        Ok(())
    }
    pub fn std_via(&self, name: &str) -> Option<&StdVia> {
        self.std_vias.get(*self.index.get(name)?)
    }
    pub fn custom_via(&self, name: &str) -> Option<&CustomVia> {
        self.custom_vias.iter().find(|v| v.name == name)
    }
    pub fn std_vias(&self) -> &[StdVia] {
        &self.std_vias
    }
    pub fn custom_vias(&self) -> &[CustomVia] {
        &self.custom_vias
    }
    pub fn reindex(&mut self) {
        self.index = self
            .std_vias
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name.clone(), i))
            .collect();
    }
}
