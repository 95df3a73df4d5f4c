//!
//! # Layer Database
//!
//! Layers and purposes are parallel, numbered namespaces.
//! Each drawable (layer, purpose) pair is an [Lpp], carrying display and electrical attributes.
//! Records live in slot-maps; name and number indices sit alongside,
//! and are rebuilt by [LayerDb::reindex] after deserialization.
//!

// Std-Lib Imports
use std::collections::{BTreeMap, HashMap};

// Crates.io
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

// Local imports
use crate::derived::DerivedLayer;
use crate::display::{Fill, PacketLook, Rgb};
use crate::error::{TechError, TechResult};
use crate::TechDecimal;
use tech21utils::enumstr;

new_key_type! {
    /// Keys for [TechLayer] entries
    pub struct LayerKey;
    /// Keys for [Purpose] entries
    pub struct PurposeKey;
    /// Keys for [Lpp] entries
    pub struct LppKey;
}

/// Name of the default purpose
pub const DRAWING: &str = "drawing";
/// Number of the default purpose
pub const DRAWING_NUM: i32 = 252;

/// Cadence-reserved layer names and numbers
pub static RESERVED_LAYERS: Lazy<Vec<(&'static str, i32)>> = Lazy::new(|| {
    let mut v = vec![
        ("Unrouted", 200),
        ("Row", 201),
        ("Group", 202),
        ("Cannotoccupy", 203),
        ("Canplace", 204),
        ("hardFence", 205),
        ("softFence", 206),
    ];
    const YS: [&str; 10] = ["y0", "y1", "y2", "y3", "y4", "y5", "y6", "y7", "y8", "y9"];
    for (i, y) in YS.iter().enumerate() {
        v.push((*y, 210 + i as i32));
    }
    v.extend_from_slice(&[
        ("designFlow", 220),
        ("stretch", 221),
        ("edgeLayer", 222),
        ("changedLayer", 223),
        ("unset", 224),
        ("unknown", 225),
        ("spike", 226),
        ("hiz", 227),
        ("resist", 228),
        ("drive", 229),
        ("supply", 230),
        ("wire", 231),
        ("pin", 232),
        ("text", 233),
        ("device", 234),
        ("border", 235),
        ("snap", 236),
        ("align", 237),
        ("prBoundary", 238),
        ("instance", 239),
        ("annotate", 240),
        ("marker", 241),
        ("select", 242),
        ("grid", 251),
        ("axis", 252),
        ("hilite", 253),
        ("background", 254),
    ]);
    v
});

/// Cadence-reserved purpose names and numbers
pub static RESERVED_PURPOSES: Lazy<Vec<(&'static str, i32)>> = Lazy::new(|| {
    let mut v = vec![
        ("warning", 234),
        ("tool1", 235),
        ("tool0", 236),
        ("label", 237),
        ("flight", 238),
        ("error", 239),
        ("annotate", 240),
    ];
    const DRAWINGS: [&str; 9] = [
        "drawing1", "drawing2", "drawing3", "drawing4", "drawing5", "drawing6", "drawing7",
        "drawing8", "drawing9",
    ];
    for (i, d) in DRAWINGS.iter().enumerate() {
        v.push((*d, 241 + i as i32));
    }
    v.extend_from_slice(&[
        ("boundary", 250),
        ("pin", 251),
        (DRAWING, DRAWING_NUM),
        ("net", 253),
        ("cell", 254),
        ("all", 255),
    ]);
    v
});

/// # Layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechLayer {
    pub name: String,
    pub num: i32,
    pub abbrev: Option<String>,
    /// Vendor-reserved, not written back out
    pub reserved: bool,
}

/// # Purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purpose {
    pub name: String,
    pub num: i32,
    pub abbrev: Option<String>,
    pub reserved: bool,
}

enumstr!(
    /// # Layer Kinds
    LayerKind {
        Physical: "physical",
        Electrical: "electrical",
        Derived: "derived",
    }
);
impl Default for LayerKind {
    fn default() -> Self {
        Self::Physical
    }
}

enumstr!(
    /// # Layer Functions
    /// Process roles, as named by Cadence `functions` entries.
    LayerFunction {
        Metal: "metal",
        Cut: "cut",
        Poly: "poly",
        Diff: "diff",
        NDiff: "ndiff",
        PDiff: "pdiff",
        NWell: "nwell",
        PWell: "pwell",
        NImplant: "nplus",
        PImplant: "pplus",
        Li: "li",
        Recognition: "recognition",
        Other: "other",
        Unknown: "unknown",
    }
);

enumstr!(
    /// # Preferred Routing Directions
    RouteDir {
        Horizontal: "horizontal",
        Vertical: "vertical",
        LeftDiagonal: "leftDiagonal",
        RightDiagonal: "rightDiagonal",
        NoDir: "none",
        NotApplicable: "notApplicable",
    }
);

/// # Routing Attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    pub direction: Option<RouteDir>,
    pub pitch: Option<TechDecimal>,
    pub offset: Option<TechDecimal>,
}

/// # Per-Lpp Display Attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LppDisplay {
    pub color: Option<Rgb>,
    pub fill: Fill,
    /// Packet name, if assigned by packet
    pub packet: Option<String>,
    pub visible: bool,
    pub selectable: bool,
    pub blink: bool,
    pub con2chg: bool,
    pub drag_enable: bool,
    pub valid: bool,
}
impl Default for LppDisplay {
    fn default() -> Self {
        Self {
            color: None,
            fill: Fill::default(),
            packet: None,
            visible: true,
            selectable: true,
            blink: false,
            con2chg: false,
            drag_enable: true,
            valid: true,
        }
    }
}
impl LppDisplay {
    /// Apply a resolved packet appearance
    pub fn apply(&mut self, look: &PacketLook) {
        self.color = Some(look.color);
        self.fill = look.fill.clone();
        self.blink = look.blink;
    }
}

/// # Per-Lpp Electrical and Process Attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LppAttrs {
    pub function: Option<LayerFunction>,
    pub mask_number: Option<i32>,
    pub routing: Option<Routing>,
    pub wire_width: Option<TechDecimal>,
    pub conductor: bool,
    /// Conductor layers joined by this via layer
    pub via: Option<(String, String)>,
    pub thickness: Option<TechDecimal>,
    pub rho: Option<TechDecimal>,
    pub rsh: Option<TechDecimal>,
    pub epsilon: Option<TechDecimal>,
    pub wire_active: bool,
    pub symbolic: bool,
    pub no_merge: bool,
    /// Excluded from rule checking
    pub no_drc: bool,
    /// GDS stream (layer, datatype)
    pub gds: Option<(i32, i32)>,
    /// Other named properties, e.g. from `techLayerProperties`
    pub properties: BTreeMap<String, String>,
}

/// # Layer-Purpose Pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lpp {
    pub layer: LayerKey,
    pub purpose: PurposeKey,
    /// Layer name for the drawing purpose, otherwise `layer:purpose`
    pub name: String,
    pub kind: LayerKind,
    pub description: Option<String>,
    pub display: LppDisplay,
    pub attrs: LppAttrs,
    /// Derived-layer definition, for [LayerKind::Derived]
    pub derived: Option<DerivedLayer>,
}

/// # Layer Database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerDb {
    layers: SlotMap<LayerKey, TechLayer>,
    layer_order: Vec<LayerKey>,
    purposes: SlotMap<PurposeKey, Purpose>,
    purpose_order: Vec<PurposeKey>,
    lpps: SlotMap<LppKey, Lpp>,
    /// Lpps in priority (creation) order
    lpp_order: Vec<LppKey>,
    /// Alias name to layer name
    aliases: BTreeMap<String, String>,
    #[serde(skip)]
    layer_names: HashMap<String, LayerKey>,
    #[serde(skip)]
    layer_nums: HashMap<i32, LayerKey>,
    #[serde(skip)]
    abbrevs: HashMap<String, LayerKey>,
    #[serde(skip)]
    purpose_names: HashMap<String, PurposeKey>,
    #[serde(skip)]
    purpose_nums: HashMap<i32, PurposeKey>,
    #[serde(skip)]
    pairs: HashMap<(LayerKey, PurposeKey), LppKey>,
}
impl LayerDb {
    /// Add layer `name` with number `num`.
    /// Re-adding an identical layer returns its existing key.
    /// Conflicting names or numbers are errors.
    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        num: i32,
        abbrev: Option<String>,
    ) -> TechResult<LayerKey> {
        self.add_layer_inner(name.into(), num, abbrev, false)
    }
    fn add_layer_inner(
        &mut self,
        name: String,
        num: i32,
        abbrev: Option<String>,
        reserved: bool,
    ) -> TechResult<LayerKey> {
        if let Some(key) = self.layer_names.get(&name).copied() {
            let layer = &mut self.layers[key];
            if layer.num != num {
                return TechError::fail(format!(
                    "Layer {} already defined with number {}, not {}",
                    name, layer.num, num
                ));
            }
            if let Some(ab) = abbrev {
                layer.abbrev = Some(ab.clone());
                self.abbrevs.insert(ab, key);
            }
            return Ok(key);
        }
        if let Some(key) = self.layer_nums.get(&num) {
            return TechError::fail(format!(
                "Layer number {} already used by {}",
                num, self.layers[*key].name
            ));
        }
        let key = self.layers.insert(TechLayer {
            name: name.clone(),
            num,
            abbrev: abbrev.clone(),
            reserved,
        });
        self.layer_order.push(key);
        self.layer_names.insert(name, key);
        self.layer_nums.insert(num, key);
        if let Some(ab) = abbrev {
            self.abbrevs.insert(ab, key);
        }
        Ok(key)
    }
    /// Add purpose `name` with number `num`. Same conflict rules as [LayerDb::add_layer].
    pub fn add_purpose(
        &mut self,
        name: impl Into<String>,
        num: i32,
        abbrev: Option<String>,
    ) -> TechResult<PurposeKey> {
        self.add_purpose_inner(name.into(), num, abbrev, false)
    }
    fn add_purpose_inner(
        &mut self,
        name: String,
        num: i32,
        abbrev: Option<String>,
        reserved: bool,
    ) -> TechResult<PurposeKey> {
        if let Some(key) = self.purpose_names.get(&name).copied() {
            let purpose = &mut self.purposes[key];
            if purpose.num != num {
                return TechError::fail(format!(
                    "Purpose {} already defined with number {}, not {}",
                    name, purpose.num, num
                ));
            }
            if abbrev.is_some() {
                purpose.abbrev = abbrev;
            }
            return Ok(key);
        }
        if let Some(key) = self.purpose_nums.get(&num) {
            return TechError::fail(format!(
                "Purpose number {} already used by {}",
                num, self.purposes[*key].name
            ));
        }
        let key = self.purposes.insert(Purpose {
            name: name.clone(),
            num,
            abbrev,
            reserved,
        });
        self.purpose_order.push(key);
        self.purpose_names.insert(name, key);
        self.purpose_nums.insert(num, key);
        Ok(key)
    }
    /// Seed the vendor-reserved purposes. Idempotent.
    pub fn seed_reserved_purposes(&mut self) {
        for (name, num) in RESERVED_PURPOSES.iter() {
            if self.purpose_names.contains_key(*name) || self.purpose_nums.contains_key(num) {
                continue;
            }
            // Neither name nor number is taken, so this cannot fail
            let _ = self.add_purpose_inner(name.to_string(), *num, None, true);
        }
    }
    /// Seed the vendor-reserved layers and purposes. Idempotent.
    pub fn seed_reserved(&mut self) {
        self.seed_reserved_purposes();
        for (name, num) in RESERVED_LAYERS.iter() {
            if self.layer_names.contains_key(*name) || self.layer_nums.contains_key(num) {
                continue;
            }
            let _ = self.add_layer_inner(name.to_string(), *num, None, true);
        }
    }
    /// Get the key of the drawing purpose, creating it if necessary
    pub fn drawing(&mut self) -> TechResult<PurposeKey> {
        match self.purpose_names.get(DRAWING) {
            Some(k) => Ok(*k),
            None => self.add_purpose_inner(DRAWING.into(), DRAWING_NUM, None, true),
        }
    }
    /// Register `alias` as another name for existing layer `layer`
    pub fn add_alias(&mut self, alias: impl Into<String>, layer: &str) -> TechResult<()> {
        let alias = alias.into();
        if self.find_layer(layer).is_none() {
            return TechError::fail(format!("Alias {} names unknown layer {}", alias, layer));
        }
        if self.layer_names.contains_key(&alias) {
            return TechError::fail(format!("Alias {} shadows an existing layer", alias));
        }
        self.aliases.insert(alias, layer.into());
        Ok(())
    }
    pub fn aliases(&self) -> impl Iterator<Item = (&String, &String)> {
        self.aliases.iter()
    }
    /// Find a layer by name, then alias, then abbreviation
    pub fn find_layer(&self, name: &str) -> Option<LayerKey> {
        if let Some(k) = self.layer_names.get(name) {
            return Some(*k);
        }
        if let Some(target) = self.aliases.get(name) {
            return self.layer_names.get(target).copied();
        }
        self.abbrevs.get(name).copied()
    }
    pub fn find_layer_num(&self, num: i32) -> Option<LayerKey> {
        self.layer_nums.get(&num).copied()
    }
    pub fn find_purpose(&self, name: &str) -> Option<PurposeKey> {
        self.purpose_names.get(name).copied()
    }
    pub fn find_purpose_num(&self, num: i32) -> Option<PurposeKey> {
        self.purpose_nums.get(&num).copied()
    }
    pub fn layer(&self, key: LayerKey) -> Option<&TechLayer> {
        self.layers.get(key)
    }
    pub fn purpose(&self, key: PurposeKey) -> Option<&Purpose> {
        self.purposes.get(key)
    }
    /// Layers in definition order
    pub fn layers(&self) -> impl Iterator<Item = (LayerKey, &TechLayer)> {
        self.layer_order.iter().map(move |k| (*k, &self.layers[*k]))
    }
    /// Purposes in definition order
    pub fn purposes(&self) -> impl Iterator<Item = (PurposeKey, &Purpose)> {
        self.purpose_order.iter().map(move |k| (*k, &self.purposes[*k]))
    }
    /// Get the lpp for (`layer`, `purpose`), creating it if necessary
    pub fn add_lpp(&mut self, layer: LayerKey, purpose: PurposeKey) -> TechResult<LppKey> {
        if let Some(k) = self.pairs.get(&(layer, purpose)) {
            return Ok(*k);
        }
        let lname = match self.layers.get(layer) {
            Some(l) => l.name.clone(),
            None => return TechError::fail("Invalid layer key"),
        };
        let pname = match self.purposes.get(purpose) {
            Some(p) => p.name.clone(),
            None => return TechError::fail("Invalid purpose key"),
        };
        let name = if pname == DRAWING {
            lname
        } else {
            format!("{}:{}", lname, pname)
        };
        let key = self.lpps.insert(Lpp {
            layer,
            purpose,
            name,
            kind: LayerKind::default(),
            description: None,
            display: LppDisplay::default(),
            attrs: LppAttrs::default(),
            derived: None,
        });
        self.lpp_order.push(key);
        self.pairs.insert((layer, purpose), key);
        Ok(key)
    }
    /// Get or create the lpp for layer and purpose names.
    /// Both must already be defined.
    pub fn add_lpp_named(&mut self, layer: &str, purpose: &str) -> TechResult<LppKey> {
        let lkey = self
            .find_layer(layer)
            .ok_or_else(|| TechError::Str(format!("Unknown layer {}", layer)))?;
        let pkey = self
            .find_purpose(purpose)
            .ok_or_else(|| TechError::Str(format!("Unknown purpose {}", purpose)))?;
        self.add_lpp(lkey, pkey)
    }
    /// Find the lpp for (`layer`, `purpose`) names
    pub fn find_lpp(&self, layer: &str, purpose: &str) -> Option<LppKey> {
        let lkey = self.find_layer(layer)?;
        let pkey = self.find_purpose(purpose)?;
        self.pairs.get(&(lkey, pkey)).copied()
    }
    /// Find an lpp by its `layer` or `layer:purpose` name
    pub fn find_lpp_name(&self, name: &str) -> Option<LppKey> {
        match name.split_once(':') {
            Some((l, p)) => self.find_lpp(l, p),
            None => self.find_lpp(name, DRAWING),
        }
    }
    /// Find the lpp for (layer-number, purpose-number)
    pub fn find_lpp_num(&self, layer: i32, purpose: i32) -> Option<LppKey> {
        let lkey = self.find_layer_num(layer)?;
        let pkey = self.find_purpose_num(purpose)?;
        self.pairs.get(&(lkey, pkey)).copied()
    }
    pub fn lpp(&self, key: LppKey) -> Option<&Lpp> {
        self.lpps.get(key)
    }
    pub fn lpp_mut(&mut self, key: LppKey) -> Option<&mut Lpp> {
        self.lpps.get_mut(key)
    }
    /// Lpps in priority order
    pub fn lpps(&self) -> impl Iterator<Item = (LppKey, &Lpp)> {
        self.lpp_order.iter().map(move |k| (*k, &self.lpps[*k]))
    }
    /// Lpps on layer `layer`, in priority order
    pub fn lpps_on(&self, layer: LayerKey) -> impl Iterator<Item = (LppKey, &Lpp)> {
        self.lpps().filter(move |(_, l)| l.layer == layer)
    }
    /// Names of an lpp's layer and purpose
    pub fn lpp_names(&self, key: LppKey) -> Option<(&str, &str)> {
        let lpp = self.lpps.get(key)?;
        let layer = self.layers.get(lpp.layer)?;
        let purpose = self.purposes.get(lpp.purpose)?;
        Some((&layer.name, &purpose.name))
    }
    /// Lowest unused layer number at or above `start`
    pub fn next_layer_num(&self, start: i32) -> TechResult<i32> {
        for k in start..i32::MAX {
            if !self.layer_nums.contains_key(&k) {
                return Ok(k);
            }
        }
        TechError::fail("No more layer numbers available")
    }
    /// Rebuild name and number indices, e.g. after deserializing
    pub fn reindex(&mut self) {
        self.layer_names.clear();
        self.layer_nums.clear();
        self.abbrevs.clear();
        self.purpose_names.clear();
        self.purpose_nums.clear();
        self.pairs.clear();
        for (k, l) in self.layers.iter() {
            self.layer_names.insert(l.name.clone(), k);
            self.layer_nums.insert(l.num, k);
            if let Some(ab) = &l.abbrev {
                self.abbrevs.insert(ab.clone(), k);
            }
        }
        for (k, p) in self.purposes.iter() {
            self.purpose_names.insert(p.name.clone(), k);
            self.purpose_nums.insert(p.num, k);
        }
        for (k, lpp) in self.lpps.iter() {
            self.pairs.insert((lpp.layer, lpp.purpose), k);
        }
    }
}
