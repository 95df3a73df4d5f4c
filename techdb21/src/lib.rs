//!
//! # Tech21 Technology Database
//!
//! The in-memory model the technology-file readers populate and the writers walk:
//!
//! * [LayerDb], the layer, purpose and layer-purpose-pair records
//! * [RuleSink], design rules and spacing tables
//! * [ViaDb], standard and custom via definitions
//! * [DisplayStore], colors, stipples, line styles and packets
//! * [Diagnostics], the structured warning log
//! * [Resolver], display-packet references awaiting their definitions
//!
//! All are gathered in a [TechDb].
//!

// Std-Lib
use std::collections::BTreeMap;

// Crates.io
use serde::{Deserialize, Serialize};

pub mod deferred;
pub mod derived;
pub mod diag;
pub mod display;
pub mod error;
pub mod layers;
pub mod rules;
pub mod vias;

pub use deferred::*;
pub use derived::*;
pub use diag::*;
pub use display::*;
pub use error::*;
pub use layers::*;
pub use rules::*;
pub use vias::*;

///
/// # TechDecimal
///
/// Internal type alias for all decimal-valued dimensions and rule values.
///
pub type TechDecimal = rust_decimal::Decimal;

/// # Technology Parameter Value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TechParam {
    Number(TechDecimal),
    Text(String),
    Bool(bool),
}

/// # Technology-Wide Information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechInfo {
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub process: Option<String>,
    pub version: Option<String>,
    pub lib_path: Vec<String>,
    pub script_path: Vec<String>,
    pub help_path: Vec<String>,
    /// Named technology parameters, as from `techParams`
    pub params: BTreeMap<String, TechParam>,
    /// Manufacturing grid, in microns
    pub mfg_grid: Option<TechDecimal>,
    pub dbu_per_micron: Option<u32>,
    /// View type to user-unit / database-unit settings
    pub view_units: BTreeMap<String, (String, Option<TechDecimal>)>,
    pub ref_tech_libs: Vec<String>,
    /// Layers and purposes written under `equivalentLayers`
    pub equivalent_layers: Vec<Vec<String>>,
    /// Named script blocks, kept verbatim
    pub scripts: BTreeMap<String, String>,
}

/// # Device-Extraction Hint
/// Recorded from device-definition forms; not interpreted further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHint {
    /// Defining form, e.g. `extractMOS`
    pub kind: String,
    pub name: Option<String>,
    /// Layer names referenced
    pub layers: Vec<String>,
    /// Full text of the definition
    pub text: String,
}

/// # Technology Database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechDb {
    pub info: TechInfo,
    pub layers: LayerDb,
    pub rules: RuleSink,
    pub vias: ViaDb,
    pub display: DisplayStore,
    pub devices: Vec<DeviceHint>,
    #[serde(skip)]
    pub diag: Diagnostics,
    #[serde(skip)]
    pub resolver: Resolver,
}
impl TechDb {
    /// Create a new, empty [TechDb]
    pub fn new() -> Self {
        Self::default()
    }
    /// Assign display packet `name` to `lpp`.
    /// If the packet cannot yet be resolved, the reference is saved for [TechDb::drain_deferred].
    /// Returns whether the packet was applied immediately.
    pub fn assign_packet(&mut self, lpp: LppKey, name: &str) -> bool {
        let look = self.display.packet_look(name);
        let entry = match self.layers.lpp_mut(lpp) {
            Some(e) => e,
            None => return false,
        };
        entry.display.packet = Some(name.into());
        match look {
            Some(look) => {
                entry.display.apply(&look);
                true
            }
            None => {
                self.resolver.save(lpp, name);
                false
            }
        }
    }
    /// Replay saved packet references against the current display resources.
    /// Returns the unresolved-name report, if any remain.
    pub fn drain_deferred(&mut self) -> Option<String> {
        let pending = self.resolver.pending();
        let (layers, display) = (&mut self.layers, &self.display);
        self.resolver.drain(|lpp, name| {
            let look = match display.packet_look(name) {
                Some(look) => look,
                None => return false,
            };
            match layers.lpp_mut(lpp) {
                Some(entry) => {
                    entry.display.apply(&look);
                    true
                }
                None => false,
            }
        });
        log::debug!("Replayed {} deferred packet references", pending);
        self.resolver.report_unresolved()
    }
    /// Rebuild all lookup indices, e.g. after deserializing
    pub fn reindex(&mut self) {
        self.layers.reindex();
        self.vias.reindex();
        self.display.reindex();
    }
    /// Load a [TechDb] from a JSON or YAML dump, rebuilding its indices
    pub fn load(fname: impl AsRef<std::path::Path>) -> TechResult<Self> {
        let fmt = tech21utils::SerializationFormat::from_path(&fname);
        let mut db: Self = fmt.open(fname)?;
        db.reindex();
        Ok(db)
    }
}
impl tech21utils::SerdeFile for TechDb {}

#[cfg(test)]
mod tests;
