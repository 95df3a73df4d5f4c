//!
//! # Display Resource Store
//!
//! Colors, stipple bitmaps, line styles and packets, each held in a by-name table
//! alongside a reverse (value to name) table used to canonicalize names on output.
//! The first name registered for a value is its canonical name.
//!

// Std-Lib Imports
use std::collections::{BTreeMap, HashMap};

// Crates.io
use serde::{Deserialize, Serialize};

// Local imports
use crate::error::{TechError, TechResult};
use tech21utils::{enumstr, EnumStr};

/// # RGB Color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}
impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}
impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.r, self.g, self.b)
    }
}

/// # Named Color Definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorDef {
    pub rgb: Rgb,
    pub blink: bool,
}

/// # Packed Pixel Map
///
/// Rows are stored top to bottom, each row in `ceil(width / 8)` bytes,
/// pixel `x` at bit `x % 8` of byte `x / 8` (least-significant bit first).
///
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}
impl Pixmap {
    /// Create an all-clear map of `width` x `height`
    pub fn new(width: u32, height: u32) -> Self {
        let nbytes = Self::bytes_per_row(width) * height as usize;
        Self {
            width,
            height,
            data: vec![0; nbytes],
        }
    }
    /// Create from pre-packed row data, checking its length
    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> TechResult<Self> {
        let expected = Self::bytes_per_row(width) * height as usize;
        if data.len() != expected {
            return TechError::fail(format!(
                "Pixmap {}x{} requires {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
    /// Create from rows of booleans, which must all share one length
    pub fn from_rows(rows: &[Vec<bool>]) -> TechResult<Self> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return TechError::fail("Pixmap rows differ in length");
        }
        let mut map = Self::new(width as u32, rows.len() as u32);
        for (y, row) in rows.iter().enumerate() {
            for (x, bit) in row.iter().enumerate() {
                if *bit {
                    map.set(x as u32, y as u32, true);
                }
            }
        }
        Ok(map)
    }
    /// Packed bytes per row for a map of `width`
    pub fn bytes_per_row(width: u32) -> usize {
        ((width + 7) / 8) as usize
    }
    /// Get pixel (`x`, `y`). Out-of-range pixels are clear.
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let idx = y as usize * Self::bytes_per_row(self.width) + (x / 8) as usize;
        self.data[idx] & (1 << (x % 8)) != 0
    }
    /// Set pixel (`x`, `y`). Out-of-range pixels are ignored.
    pub fn set(&mut self, x: u32, y: u32, val: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = y as usize * Self::bytes_per_row(self.width) + (x / 8) as usize;
        if val {
            self.data[idx] |= 1 << (x % 8);
        } else {
            self.data[idx] &= !(1 << (x % 8));
        }
    }
    /// Unpack into rows of booleans
    pub fn rows(&self) -> Vec<Vec<bool>> {
        (0..self.height)
            .map(|y| (0..self.width).map(|x| self.get(x, y)).collect())
            .collect()
    }
    /// Boolean indicating whether every pixel is set
    pub fn is_solid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.rows().iter().all(|r| r.iter().all(|b| *b))
    }
    /// Boolean indicating whether no pixel is set
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|b| *b == 0)
    }
}

/// # Line Style
/// `size` is the drawn line thickness; `pattern` the repeating dash bits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineStyle {
    pub size: u32,
    pub pattern: Vec<bool>,
}

enumstr!(
    /// # Packet Fill Styles
    FillStyle {
        Outline: "outline",
        Solid: "solid",
        X: "X",
        Stipple: "stipple",
        OutlineStipple: "outlineStipple",
    }
);

/// # Display Packet
/// Composes a stipple, a line style, and fill and outline colors, all by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub name: String,
    pub stipple: String,
    pub line_style: String,
    pub fill: String,
    pub outline: String,
    pub fill_style: Option<FillStyle>,
}

enumstr!(
    /// # Layer Outline Styles
    Outline {
        Off: "none",
        Plain: "outline",
        Fat: "fat",
    }
);
impl Default for Outline {
    fn default() -> Self {
        Self::Off
    }
}

/// # Layer Fill Attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Whether the interior is filled at all
    pub filled: bool,
    /// Fill pattern. `None` with `filled` set is a solid fill.
    pub pattern: Option<Pixmap>,
    pub outline: Outline,
    /// Draw the diagonal "cut" cross
    pub cut: bool,
}
impl Fill {
    /// Solid fill, no outline
    pub fn solid() -> Self {
        Self {
            filled: true,
            ..Default::default()
        }
    }
    /// Filled with `pattern`. All-set patterns collapse to solid.
    pub fn stippled(pattern: Pixmap) -> Self {
        Self {
            filled: true,
            pattern: if pattern.is_solid() {
                None
            } else {
                Some(pattern)
            },
            ..Default::default()
        }
    }
}

/// # Resolved Packet Appearance
/// The per-layer display attributes a packet stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketLook {
    pub color: Rgb,
    pub fill: Fill,
    pub blink: bool,
}

/// # Reverse-Table Key
/// The part of a display resource its canonical name is looked up by.
pub trait ReverseKey {
    type Key: Clone + Eq + std::hash::Hash + std::fmt::Debug;
    fn reverse_key(&self) -> Self::Key;
}
impl ReverseKey for ColorDef {
    type Key = Rgb;
    fn reverse_key(&self) -> Rgb {
        self.rgb
    }
}
impl ReverseKey for Pixmap {
    type Key = Pixmap;
    fn reverse_key(&self) -> Pixmap {
        self.clone()
    }
}
impl ReverseKey for LineStyle {
    type Key = LineStyle;
    fn reverse_key(&self) -> LineStyle {
        self.clone()
    }
}

/// # Named Resource Table
///
/// Resources by name, plus the reverse table from value to canonical name.
/// Names are also kept in registration order, so that the canonical name
/// survives redefinitions and reloading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedTable<V: ReverseKey> {
    entries: BTreeMap<String, V>,
    /// Names in registration order
    #[serde(default)]
    order: Vec<String>,
    #[serde(skip)]
    names: HashMap<V::Key, String>,
}
impl<V: ReverseKey> Default for NamedTable<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            order: Vec::new(),
            names: HashMap::new(),
        }
    }
}
impl<V: ReverseKey> NamedTable<V> {
    /// Add or replace `name`
    pub fn insert(&mut self, name: String, value: V) {
        let key = value.reverse_key();
        match self.entries.insert(name.clone(), value) {
            None => {
                self.names.entry(key).or_insert_with(|| name.clone());
                self.order.push(name);
            }
            // The old value may have lost its canonical name, and the new one may gain it
            Some(_) => self.reindex(),
        }
    }
    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.get(name)
    }
    /// Canonical name for `key`
    pub fn name_of(&self, key: &V::Key) -> Option<&str> {
        self.names.get(key).map(|s| s.as_str())
    }
    /// Entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries.iter()
    }
    /// Rebuild the reverse table
    pub fn reindex(&mut self) {
        let consistent = self.order.len() == self.entries.len()
            && self.order.iter().all(|n| self.entries.contains_key(n));
        if !consistent {
            // Dumps without a registration order fall back to name order
            self.order = self.entries.keys().cloned().collect();
        }
        self.names.clear();
        for name in self.order.iter() {
            if let Some(value) = self.entries.get(name) {
                self.names
                    .entry(value.reverse_key())
                    .or_insert_with(|| name.clone());
            }
        }
    }
}

/// # Display Resource Store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayStore {
    /// Display-device names declared by the resource file
    pub displays: Vec<String>,
    colors: NamedTable<ColorDef>,
    stipples: NamedTable<Pixmap>,
    line_styles: NamedTable<LineStyle>,
    packets: BTreeMap<String, Packet>,
    packet_aliases: BTreeMap<String, String>,
}
impl DisplayStore {
    /// Add or replace color `name`
    pub fn add_color(&mut self, name: impl Into<String>, def: ColorDef) {
        self.colors.insert(name.into(), def);
    }
    pub fn color(&self, name: &str) -> Option<&ColorDef> {
        self.colors.get(name)
    }
    /// Canonical name for color-value `rgb`
    pub fn color_name(&self, rgb: &Rgb) -> Option<&str> {
        self.colors.name_of(rgb)
    }
    pub fn colors(&self) -> impl Iterator<Item = (&String, &ColorDef)> {
        self.colors.iter()
    }
    /// Add or replace stipple `name`
    pub fn add_stipple(&mut self, name: impl Into<String>, map: Pixmap) {
        self.stipples.insert(name.into(), map);
    }
    pub fn stipple(&self, name: &str) -> Option<&Pixmap> {
        self.stipples.get(name)
    }
    /// Canonical name for bitmap `map`
    pub fn stipple_name(&self, map: &Pixmap) -> Option<&str> {
        self.stipples.name_of(map)
    }
    pub fn stipples(&self) -> impl Iterator<Item = (&String, &Pixmap)> {
        self.stipples.iter()
    }
    /// Add or replace line style `name`
    pub fn add_line_style(&mut self, name: impl Into<String>, style: LineStyle) {
        self.line_styles.insert(name.into(), style);
    }
    pub fn line_style(&self, name: &str) -> Option<&LineStyle> {
        self.line_styles.get(name)
    }
    pub fn line_style_name(&self, style: &LineStyle) -> Option<&str> {
        self.line_styles.name_of(style)
    }
    pub fn line_styles(&self) -> impl Iterator<Item = (&String, &LineStyle)> {
        self.line_styles.iter()
    }
    /// Add or replace a [Packet]
    pub fn add_packet(&mut self, packet: Packet) {
        self.packets.insert(packet.name.clone(), packet);
    }
    /// Get packet `name`, following one level of aliasing
    pub fn packet(&self, name: &str) -> Option<&Packet> {
        match self.packets.get(name) {
            Some(p) => Some(p),
            None => self.packets.get(self.packet_aliases.get(name)?),
        }
    }
    pub fn packets(&self) -> impl Iterator<Item = &Packet> {
        self.packets.values()
    }
    /// Declare `alias` as another name for `packet`
    pub fn add_packet_alias(&mut self, alias: impl Into<String>, packet: impl Into<String>) {
        self.packet_aliases.insert(alias.into(), packet.into());
    }
    pub fn packet_aliases(&self) -> impl Iterator<Item = (&String, &String)> {
        self.packet_aliases.iter()
    }
    /// Resolve packet `name` into the layer appearance it describes.
    /// Returns `None` if the packet or its fill color is not (yet) defined.
    pub fn packet_look(&self, name: &str) -> Option<PacketLook> {
        let packet = self.packet(name)?;
        let color = self.color(&packet.fill)?;
        let pattern = self.stipple(&packet.stipple);
        let fat = self
            .line_style(&packet.line_style)
            .map(|l| l.size > 1)
            .unwrap_or(false);
        let outline = if fat { Outline::Fat } else { Outline::Plain };
        let stippled = |outline: Outline| {
            let mut fill = match pattern {
                Some(p) if !p.is_blank() => Fill::stippled(p.clone()),
                Some(_) => Fill::default(),
                None => Fill::solid(),
            };
            fill.outline = outline;
            fill
        };
        let fill = match packet.fill_style.unwrap_or(FillStyle::Stipple) {
            FillStyle::Solid => Fill::solid(),
            FillStyle::Stipple => stippled(Outline::Off),
            FillStyle::OutlineStipple => stippled(outline),
            FillStyle::Outline => Fill {
                outline,
                ..Default::default()
            },
            FillStyle::X => Fill {
                outline,
                cut: true,
                ..Default::default()
            },
        };
        Some(PacketLook {
            color: color.rgb,
            fill,
            blink: color.blink,
        })
    }
    /// Rebuild the reverse tables, e.g. after deserializing
    pub fn reindex(&mut self) {
        self.colors.reindex();
        self.stipples.reindex();
        self.line_styles.reindex();
    }
}

/// Parse a fill-style keyword, as found in packet definitions
pub fn fill_style(txt: &str) -> Option<FillStyle> {
    FillStyle::from_str(txt).or_else(|| FillStyle::from_str_nocase(txt))
}
