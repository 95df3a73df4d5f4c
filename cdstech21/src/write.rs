//!
//! # Cadence Technology Writer
//!
//! The inverse of the readers: technology, display-resource and layer-map text from a [TechDb].
//! Display names are canonicalized through the database's reverse tables,
//! so that re-reading the output reproduces the same layer appearances.
//!

// Std-Lib
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

// Workspace
use sexp21::escape;
use tech21utils::{enumstr, EnumStr, Indent};
use techdb21::{
    ColorDef, DerivedOp, DisplayStore, Fill, FillStyle, LayerDb, LayerExpr, LayerKind, LineStyle,
    Lpp, LppKey, Outline, Packet, PacketLook, Pixmap, RouteDir, Rule, SpacingTable, TechDb,
    TechError, TechParam, TechResult, XyPair, FOUNDRY,
};

// Local
use crate::DEFAULT_DISPLAY;

/// Basename used by [write_all] when none is given
pub const DEFAULT_BASENAME: &str = "tech";

enumstr!(
    /// # Output Formats
    /// Keyed by their file extensions
    OutputFormat {
        Tech: "txt",
        Drf: "drf",
        LayerMap: "gdsmap",
    }
);

/// Write `db` in `format` to file `path`.
/// The previous content of `path`, if any, is kept as `<path>.bak`.
pub fn write(db: &TechDb, format: OutputFormat, path: impl AsRef<Path>) -> TechResult<()> {
    let plan = DisplayPlan::new(db);
    let text = render(db, &plan, format)?;
    replace_file(path.as_ref(), text.as_bytes())
}

/// Write `db` in `format` to a [String]
pub fn to_string(db: &TechDb, format: OutputFormat) -> TechResult<String> {
    let plan = DisplayPlan::new(db);
    render(db, &plan, format)
}

/// Write all formats, to `<basename>.txt`, `<basename>.drf` and `<basename>.gdsmap`.
/// An empty `basename` defaults to [DEFAULT_BASENAME].
/// Failures of each file are collected into one error.
pub fn write_all(db: &TechDb, basename: &str) -> TechResult<()> {
    let plan = DisplayPlan::new(db);
    let mut errs = Vec::new();
    for format in OutputFormat::variants() {
        let path = output_path(basename, *format);
        let rv = render(db, &plan, *format).and_then(|text| replace_file(&path, text.as_bytes()));
        match rv {
            Ok(()) => log::info!("Wrote {}", path.display()),
            Err(e) => errs.push(e),
        }
    }
    TechError::aggregate(errs)
}

/// Output path for `format` under `basename`, as used by [write_all]
pub fn output_path(basename: &str, format: OutputFormat) -> PathBuf {
    let base = match basename {
        "" => DEFAULT_BASENAME,
        b => b,
    };
    PathBuf::from(format!("{}.{}", base, format.to_str()))
}

fn render(db: &TechDb, plan: &DisplayPlan, format: OutputFormat) -> TechResult<String> {
    let mut buf = Vec::new();
    {
        let mut w = CdsWriter::new(&mut buf, db, plan);
        match format {
            OutputFormat::Tech => w.write_tech()?,
            OutputFormat::Drf => w.write_drf()?,
            OutputFormat::LayerMap => w.write_layer_map()?,
        }
    }
    String::from_utf8(buf).map_err(|e| TechError::Boxed(Box::new(e)))
}

/// `path` with `.suffix` appended
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

/// Replace file `path` with `data`, via `<path>.tmp`, rotating any existing `path` to `<path>.bak`.
/// On failure the temporary file is removed and `path` is left as it was.
fn replace_file(path: &Path, data: &[u8]) -> TechResult<()> {
    let tmp = with_suffix(path, "tmp");
    let bak = with_suffix(path, "bak");
    let mut errs = Vec::new();
    if let Err(e) = std::fs::write(&tmp, data) {
        errs.push(TechError::io(&tmp, e));
    }
    let mut rotated = false;
    if errs.is_empty() && path.exists() {
        match std::fs::rename(path, &bak) {
            Ok(()) => rotated = true,
            Err(e) => errs.push(TechError::io(&bak, e)),
        }
    }
    if errs.is_empty() {
        if let Err(e) = std::fs::rename(&tmp, path) {
            errs.push(TechError::io(path, e));
            if rotated {
                if let Err(e) = std::fs::rename(&bak, path) {
                    errs.push(TechError::io(path, e));
                }
            }
        }
    }
    if !errs.is_empty() && tmp.exists() {
        if let Err(e) = std::fs::remove_file(&tmp) {
            errs.push(TechError::io(&tmp, e));
        }
    }
    TechError::aggregate(errs)
}

/// # Display Plan
///
/// The display resources to be written, and the packet each lpp refers to.
/// Starts from the database's own resources; appearances no existing packet
/// describes get synthesized packets, reusing existing colors, stipples and
/// line styles by value where possible.
///
#[derive(Debug, Clone)]
pub struct DisplayPlan {
    store: DisplayStore,
    packets: HashMap<LppKey, String>,
}
impl DisplayPlan {
    pub fn new(db: &TechDb) -> Self {
        let mut plan = Self {
            store: db.display.clone(),
            packets: HashMap::new(),
        };
        plan.store.reindex();
        for (key, lpp) in db.layers.lpps() {
            if let Some(name) = plan.packet_for(lpp) {
                plan.packets.insert(key, name);
            }
        }
        plan
    }
    /// Packet name for `key`, if it has any display
    pub fn packet(&self, key: LppKey) -> Option<&str> {
        self.packets.get(&key).map(|s| s.as_str())
    }
    pub fn store(&self) -> &DisplayStore {
        &self.store
    }
    fn packet_for(&mut self, lpp: &Lpp) -> Option<String> {
        let disp = &lpp.display;
        let color = match disp.color {
            Some(c) => c,
            // Unresolved references are written back as-is
            None => return disp.packet.clone(),
        };
        let look = PacketLook {
            color,
            fill: disp.fill.clone(),
            blink: disp.blink,
        };
        if let Some(name) = &disp.packet {
            if self.store.packet_look(name).as_ref() == Some(&look) {
                return Some(name.clone());
            }
        }
        let color = self.color(ColorDef {
            rgb: look.color,
            blink: look.blink,
        });
        let (style, pattern) = fill_style(&look.fill);
        let stipple = self.stipple(pattern);
        let size = if look.fill.outline == Outline::Fat { 3 } else { 1 };
        let line_style = self.line_style(LineStyle {
            size,
            pattern: vec![true; 3],
        });
        let base = format!("{}Pkt", lpp.name.replace(':', "_"));
        let name = unique(&base, |n| self.store.packet(n).is_some());
        self.store.add_packet(Packet {
            name: name.clone(),
            stipple,
            line_style,
            fill: color.clone(),
            outline: color,
            fill_style: Some(style),
        });
        Some(name)
    }
    fn color(&mut self, def: ColorDef) -> String {
        if let Some(name) = self.store.color_name(&def.rgb) {
            if self.store.color(name) == Some(&def) {
                return name.to_string();
            }
        }
        let rgb = def.rgb;
        let blink = if def.blink { "_blink" } else { "" };
        let base = format!("c_{}_{}_{}{}", rgb.r, rgb.g, rgb.b, blink);
        let name = unique(&base, |n| self.store.color(n).map_or(false, |c| *c != def));
        if self.store.color(&name).is_none() {
            self.store.add_color(name.clone(), def);
        }
        name
    }
    fn stipple(&mut self, map: Pixmap) -> String {
        if let Some(name) = self.store.stipple_name(&map) {
            return name.to_string();
        }
        let base = if map.is_solid() {
            "solid"
        } else if map.is_blank() {
            "blank"
        } else {
            "s"
        };
        let name = unique(base, |n| self.store.stipple(n).is_some());
        self.store.add_stipple(name.clone(), map);
        name
    }
    fn line_style(&mut self, style: LineStyle) -> String {
        if let Some(name) = self.store.line_style_name(&style) {
            return name.to_string();
        }
        let base = if style.size > 1 { "thick" } else { "solid" };
        let name = unique(base, |n| self.store.line_style(n).is_some());
        self.store.add_line_style(name.clone(), style);
        name
    }
}

/// Packet fill style and stipple reproducing `fill`
fn fill_style(fill: &Fill) -> (FillStyle, Pixmap) {
    let solid = || {
        let mut map = Pixmap::new(16, 16);
        for y in 0..16 {
            for x in 0..16 {
                map.set(x, y, true);
            }
        }
        map
    };
    if fill.cut {
        return (FillStyle::X, solid());
    }
    match (fill.filled, &fill.pattern, fill.outline) {
        (false, _, Outline::Off) => (FillStyle::Stipple, Pixmap::new(16, 16)),
        (false, _, _) => (FillStyle::Outline, solid()),
        (true, None, Outline::Off) => (FillStyle::Solid, solid()),
        (true, None, _) => (FillStyle::OutlineStipple, solid()),
        (true, Some(p), Outline::Off) => (FillStyle::Stipple, p.clone()),
        (true, Some(p), _) => (FillStyle::OutlineStipple, p.clone()),
    }
}

/// `base`, or `base_N` for the first `N` not `taken`
fn unique(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}

/// Quoted string
/// # Derived-Layer Entries
///
/// `techDerivedLayers` entries take exactly two layer operands.
/// Nested operands are split out into intermediate derived layers, named `<layer>_<n>`
/// and numbered above every layer in use, each entered ahead of its first use.
/// A lone layer is written as its union with itself.
struct DerivedEntries<'db> {
    layers: &'db LayerDb,
    nums: BTreeSet<i32>,
    names: HashSet<String>,
    entries: Vec<String>,
}
impl<'db> DerivedEntries<'db> {
    fn new(layers: &'db LayerDb) -> Self {
        Self {
            layers,
            nums: layers.layers().map(|(_, l)| l.num).collect(),
            names: HashSet::new(),
            entries: Vec::new(),
        }
    }
    /// Add derived layer `name`, number `num`, computing `expr`
    fn add(&mut self, name: &str, num: i32, expr: &LayerExpr) {
        let (op, lhs, rhs) = match expr {
            LayerExpr::Layer(l) => (DerivedOp::Or, l.clone(), l.clone()),
            LayerExpr::Binary { op, lhs, rhs } => {
                (*op, self.operand(name, lhs), self.operand(name, rhs))
            }
        };
        self.entries.push(format!(
            "( {} {} ( {} '{} {} ) )",
            q(name),
            num,
            q(&lhs),
            op,
            q(&rhs)
        ));
    }
    /// Layer name standing for operand `expr` of derived layer `name`
    fn operand(&mut self, name: &str, expr: &LayerExpr) -> String {
        match expr {
            LayerExpr::Layer(l) => l.clone(),
            nested => {
                let (tmp, num) = self.intermediate(name);
                self.add(&tmp, num, nested);
                tmp
            }
        }
    }
    /// Fresh name and number for an intermediate layer of `name`
    fn intermediate(&mut self, name: &str) -> (String, i32) {
        let mut idx = 1;
        let tmp = loop {
            let tmp = format!("{}_{}", name, idx);
            if self.layers.find_layer(&tmp).is_none() && !self.names.contains(&tmp) {
                break tmp;
            }
            idx += 1;
        };
        let num = self.nums.iter().next_back().map_or(0, |n| n + 1);
        self.nums.insert(num);
        self.names.insert(tmp.clone());
        (tmp, num)
    }
}

fn q(s: &str) -> String {
    format!("\"{}\"", escape(s))
}
fn tf(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "nil"
    }
}
fn xy(p: &XyPair) -> String {
    format!("({} {})", p.x, p.y)
}

/// # Cadence Writing Helper
pub struct CdsWriter<'wr> {
    /// Write Destination
    dest: Box<dyn Write + 'wr>,
    /// Indentation Helper
    indent: Indent,
    db: &'wr TechDb,
    plan: &'wr DisplayPlan,
}
impl<'wr> CdsWriter<'wr> {
    pub fn new(dest: impl Write + 'wr, db: &'wr TechDb, plan: &'wr DisplayPlan) -> Self {
        Self {
            dest: Box::new(dest),
            indent: Indent::new("  "),
            db,
            plan,
        }
    }
    /// Write a line at the current indentation
    fn write_line(&mut self, args: std::fmt::Arguments) -> TechResult<()> {
        writeln!(self.dest, "{}{}", self.indent.state(), args)?;
        Ok(())
    }
    /// Open form `name(`
    fn open(&mut self, name: &str) -> TechResult<()> {
        self.write_line(format_args!("{}(", name))?;
        self.indent += 1;
        Ok(())
    }
    /// Close form `name`
    fn close(&mut self, name: &str) -> TechResult<()> {
        self.indent -= 1;
        self.write_line(format_args!(") ;{}", name))
    }
    /// Write section `name` with entry lines `entries`, if there are any
    fn section(&mut self, name: &str, entries: Vec<String>) -> TechResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.open(name)?;
        for e in entries {
            self.write_line(format_args!("{}", e))?;
        }
        self.close(name)
    }

    /// Write the technology file
    pub fn write_tech(&mut self) -> TechResult<()> {
        self.write_line(format_args!(";; Technology file written by cdstech21"))?;
        self.write_controls()?;
        self.write_layer_defs()?;
        self.write_layer_rules()?;
        self.write_via_defs()?;
        self.write_constraint_groups()?;
        self.write_devices()?;
        self.dest.flush()?;
        Ok(())
    }
    fn write_controls(&mut self) -> TechResult<()> {
        let db = self.db;
        let info = &db.info;
        let params = info
            .params
            .iter()
            .map(|(name, p)| {
                let val = match p {
                    TechParam::Number(d) => d.to_string(),
                    TechParam::Text(t) => q(t),
                    TechParam::Bool(b) => tf(*b).to_string(),
                };
                format!("( {} {} )", name, val)
            })
            .collect();
        let units = info
            .view_units
            .iter()
            .map(|(view, (unit, dbu))| match dbu {
                Some(d) => format!("( {} {} {} )", view, unit, d),
                None => format!("( {} {} )", view, unit),
            })
            .collect();
        let grid: Vec<String> = info.mfg_grid.iter().map(|g| format!("( {} )", g)).collect();
        let libs: Vec<String> = info.ref_tech_libs.iter().map(|l| q(l)).collect();

        self.open("controls")?;
        self.section("techParams", params)?;
        self.section("viewTypeUnits", units)?;
        self.section("mfgGridResolution", grid)?;
        self.section("refTechLibs", libs)?;
        self.close("controls")
    }
    fn write_layer_defs(&mut self) -> TechResult<()> {
        let db = self.db;
        let plan = self.plan;
        let layers = &db.layers;
        let with_abbrev = |name: &str, num: i32, abbrev: &Option<String>| match abbrev {
            Some(ab) => format!("( {} {} {} )", q(name), num, q(ab)),
            None => format!("( {} {} )", q(name), num),
        };
        let purposes = layers
            .purposes()
            .filter(|(_, p)| !p.reserved)
            .map(|(_, p)| with_abbrev(&p.name, p.num, &p.abbrev))
            .collect();
        // Derived layers are declared by `techDerivedLayers` alone
        let derived_layers: Vec<_> = layers
            .lpps()
            .filter(|(_, l)| l.kind == LayerKind::Derived)
            .map(|(_, l)| l.layer)
            .collect();
        let techlayers = layers
            .layers()
            .filter(|(k, l)| !l.reserved && !derived_layers.contains(k))
            .map(|(_, l)| with_abbrev(&l.name, l.num, &l.abbrev))
            .collect();
        let priorities = layers
            .lpps()
            .filter(|(_, l)| l.kind != LayerKind::Derived)
            .filter_map(|(k, _)| layers.lpp_names(k))
            .map(|(l, p)| format!("( {} {} )", q(l), q(p)))
            .collect();
        // Displays, properties and derived layers in layer-then-purpose order
        let mut displays = Vec::new();
        let mut properties = Vec::new();
        let mut derived = DerivedEntries::new(layers);
        for (_, layer) in layers.layers() {
            for (_, purpose) in layers.purposes() {
                let key = match layers.find_lpp(&layer.name, &purpose.name) {
                    Some(k) => k,
                    None => continue,
                };
                let lpp = match layers.lpp(key) {
                    Some(lpp) => lpp,
                    None => continue,
                };
                if let Some(packet) = plan.packet(key) {
                    let d = &lpp.display;
                    displays.push(format!(
                        "( {} {} {} {} {} {} {} {} )",
                        q(&layer.name),
                        q(&purpose.name),
                        q(packet),
                        tf(d.visible),
                        tf(d.selectable),
                        tf(d.con2chg),
                        tf(d.drag_enable),
                        tf(d.valid)
                    ));
                }
                if purpose.name != techdb21::DRAWING {
                    continue;
                }
                if let Some(w) = lpp.attrs.wire_width {
                    properties.push(format!("( {} {} {} )", crate::tech::WIRE_WIDTH, q(&layer.name), w));
                }
                for (key, value) in lpp.attrs.properties.iter() {
                    properties.push(match key.split_once(':') {
                        Some((prop, layer2)) => {
                            format!("( {} {} {} {} )", prop, q(&layer.name), q(layer2), value)
                        }
                        None => format!("( {} {} {} )", key, q(&layer.name), value),
                    });
                }
                if let (LayerKind::Derived, Some(d)) = (lpp.kind, &lpp.derived) {
                    derived.add(&layer.name, layer.num, &d.expr);
                }
            }
        }
        self.open("layerDefinitions")?;
        self.section("techPurposes", purposes)?;
        self.section("techLayers", techlayers)?;
        // Derived layers are defined before anything refers to them
        self.section("techDerivedLayers", derived.entries)?;
        self.section("techLayerPurposePriorities", priorities)?;
        self.section("techDisplays", displays)?;
        self.section("techLayerProperties", properties)?;
        self.close("layerDefinitions")
    }
    fn write_layer_rules(&mut self) -> TechResult<()> {
        let db = self.db;
        let layers = &db.layers;
        let mut functions = Vec::new();
        let mut directions = Vec::new();
        let mut vias = Vec::new();
        for (key, lpp) in layers.lpps() {
            let (lname, pname) = match layers.lpp_names(key) {
                Some(names) => names,
                None => continue,
            };
            if pname != techdb21::DRAWING {
                continue;
            }
            if let Some(f) = lpp.attrs.function {
                functions.push(match lpp.attrs.mask_number {
                    Some(m) => format!("( {} {} {} )", q(lname), q(f.to_str()), m),
                    None => format!("( {} {} )", q(lname), q(f.to_str())),
                });
            }
            if let Some(dir) = lpp.attrs.routing.as_ref().and_then(|r| r.direction) {
                directions.push(format!("( {} {} )", q(lname), q(dir.to_str())));
            }
            if let Some((l1, l2)) = &lpp.attrs.via {
                vias.push(format!("( {} {} {} )", q(l1), q(lname), q(l2)));
            }
        }
        let equivalent = db
            .info
            .equivalent_layers
            .iter()
            .map(|set| {
                let names: Vec<String> = set.iter().map(|l| q(l)).collect();
                format!("( {} )", names.join(" "))
            })
            .collect();
        self.open("layerRules")?;
        self.section("functions", functions)?;
        self.section("routingDirections", directions)?;
        self.section("viaLayers", vias)?;
        self.section("equivalentLayers", equivalent)?;
        self.close("layerRules")
    }
    fn write_via_defs(&mut self) -> TechResult<()> {
        let db = self.db;
        let vias = &db.vias;
        let std_vias = vias
            .std_vias()
            .iter()
            .map(|v| {
                let res = v.resistance.map(|r| format!(" {}", r)).unwrap_or_default();
                let mut line = format!(
                    "( {} {} {} ({} {} {}{}) ({} {} {}) {} {} {} {} {}",
                    q(&v.name),
                    q(&v.layer1),
                    q(&v.layer2),
                    q(&v.cut),
                    v.cut_width,
                    v.cut_height,
                    res,
                    v.rows,
                    v.cols,
                    xy(&v.cut_space),
                    xy(&v.enc1),
                    xy(&v.enc2),
                    xy(&v.off1),
                    xy(&v.off2),
                    xy(&v.orig_off),
                );
                for imp in [&v.implant1, &v.implant2] {
                    match imp {
                        Some(i) => line += &format!(" {} {}", q(&i.layer), xy(&i.enclosure)),
                        None if v.implant2.is_some() => line += " nil nil",
                        None => (),
                    }
                }
                line + " )"
            })
            .collect();
        let custom_vias = vias
            .custom_vias()
            .iter()
            .map(|v| {
                let res = v.resistance.map(|r| format!(" {}", r)).unwrap_or_default();
                format!(
                    "( {} {} {} {} {} {}{} )",
                    q(&v.name),
                    q(&v.lib),
                    q(&v.cell),
                    q(&v.view),
                    q(&v.layer1),
                    q(&v.layer2),
                    res
                )
            })
            .collect();
        self.open("viaDefs")?;
        self.section("standardViaDefs", std_vias)?;
        self.section("customViaDefs", custom_vias)?;
        self.close("viaDefs")
    }
    fn write_constraint_groups(&mut self) -> TechResult<()> {
        let db = self.db;
        let rules = &db.rules;
        let mut names = rules.group_names();
        let (electrical, grids) = self.foundry_layer_rules();
        if !names.iter().any(|n| n == FOUNDRY) && !(electrical.is_empty() && grids.is_empty()) {
            names.insert(0, FOUNDRY.to_string());
        }
        if names.is_empty() {
            return Ok(());
        }
        self.open("constraintGroups")?;
        for name in names {
            let group = rules.groups.iter().find(|g| g.name == name);
            let override_ = group.map(|g| g.override_).unwrap_or(false);
            self.write_line(format_args!("( {} {}", q(&name), tf(override_)))?;
            self.indent += 1;
            if let Some(g) = group {
                let mut interconnect = Vec::new();
                for (key, list) in [("validLayers", &g.valid_layers), ("validVias", &g.valid_vias)] {
                    if !list.is_empty() {
                        let names: Vec<String> = list.iter().map(|l| q(l)).collect();
                        interconnect.push(format!("( {} ( {} ) )", key, names.join(" ")));
                    }
                }
                self.section("interconnect", interconnect)?;
            }
            let of_group = |ordered: bool| -> Vec<String> {
                rules
                    .rules()
                    .iter()
                    .filter(|r| r.group == name && r.ordered == ordered)
                    .map(rule_entry)
                    .collect()
            };
            self.section("spacings", of_group(false))?;
            self.section("orderedSpacings", of_group(true))?;
            let tables: Vec<&SpacingTable> = rules
                .tables()
                .iter()
                .filter(|t| t.group == name && !(t.ignore && t.rows.is_empty()))
                .collect();
            if !tables.is_empty() {
                self.open("spacingTables")?;
                for t in tables {
                    self.write_table(t)?;
                }
                self.close("spacingTables")?;
            }
            if name == FOUNDRY {
                self.section("electrical", electrical.clone())?;
                self.section("routingGrids", grids.clone())?;
            } else if let Some(g) = group {
                let grids = g
                    .routing_grids
                    .iter()
                    .map(|(key, layer, value)| format!("( {} {} {} )", key, q(layer), value))
                    .collect();
                self.section("routingGrids", grids)?;
            }
            if let Some(g) = group {
                if !g.antenna_models.is_empty() {
                    let models: Vec<String> = g.antenna_models.iter().map(|m| q(m)).collect();
                    self.write_line(format_args!("antennaModels( {} )", models.join(" ")))?;
                }
            }
            self.indent -= 1;
            self.write_line(format_args!(")"))?;
        }
        self.close("constraintGroups")
    }
    /// Foundry `electrical` and `routingGrids` entries, from the layers' attributes
    fn foundry_layer_rules(&self) -> (Vec<String>, Vec<String>) {
        let db = self.db;
        let layers = &db.layers;
        let mut electrical = Vec::new();
        let mut grids = Vec::new();
        for (key, lpp) in layers.lpps() {
            let lname = match layers.lpp_names(key) {
                Some((l, p)) if p == techdb21::DRAWING => l,
                _ => continue,
            };
            let a = &lpp.attrs;
            for (key, val) in [
                ("sheetResistance", a.rsh),
                ("resistivity", a.rho),
                ("thickness", a.thickness),
                ("dielectricConstant", a.epsilon),
            ] {
                if let Some(v) = val {
                    electrical.push(format!("( {} {} {} )", key, q(lname), v));
                }
            }
            if let Some(r) = &a.routing {
                // Grids are keyed horizontal or vertical only; `routingDirections` keeps the rest
                let dir = match r.direction {
                    Some(RouteDir::Vertical) => "vertical",
                    _ => "horizontal",
                };
                if let Some(p) = r.pitch {
                    grids.push(format!("( {}Pitch {} {} )", dir, q(lname), p));
                }
                if let Some(o) = r.offset {
                    grids.push(format!("( {}Offset {} {} )", dir, q(lname), o));
                }
            }
        }
        (electrical, grids)
    }
    fn write_table(&mut self, t: &SpacingTable) -> TechResult<()> {
        let mut layers = q(&t.layer1);
        if let Some(l2) = &t.layer2 {
            layers += &format!(" {}", q(l2));
        }
        self.write_line(format_args!("( {} {}", t.name, layers))?;
        self.indent += 1;
        let dims = match &t.index2 {
            Some(i2) => format!("( {} nil nil {} nil nil )", q(&t.index1), q(i2)),
            None => format!("( {} nil nil )", q(&t.index1)),
        };
        match t.default {
            Some(d) => self.write_line(format_args!("( {} {} )", dims, d))?,
            None => self.write_line(format_args!("( {} )", dims))?,
        }
        self.write_line(format_args!("("))?;
        self.indent += 1;
        for row in t.rows.iter() {
            match row.index2 {
                Some(i2) => self.write_line(format_args!("( {} {} ) {}", row.index1, i2, row.value))?,
                None => self.write_line(format_args!("{} {}", row.index1, row.value))?,
            }
        }
        self.indent -= 1;
        self.write_line(format_args!(")"))?;
        for flag in t.flags.names() {
            self.write_line(format_args!("'{}", flag))?;
        }
        if let Some(c) = &t.comment {
            self.write_line(format_args!("{}", q(c)))?;
        }
        self.indent -= 1;
        self.write_line(format_args!(")"))
    }
    fn write_devices(&mut self) -> TechResult<()> {
        let hints = self.db.devices.iter().map(|d| d.text.clone()).collect();
        self.section("devices", hints)
    }

    /// Write the display-resource file
    pub fn write_drf(&mut self) -> TechResult<()> {
        let plan = self.plan;
        let store = plan.store();
        let disp = DEFAULT_DISPLAY;
        let colors = store
            .colors()
            .map(|(name, c)| {
                let blink = if c.blink { " t" } else { "" };
                let rgb = c.rgb;
                format!("( {} {} {} {} {}{} )", disp, q(name), rgb.r, rgb.g, rgb.b, blink)
            })
            .collect();
        let line_styles = store
            .line_styles()
            .map(|(name, l)| {
                let bits: Vec<&str> = l.pattern.iter().map(|b| if *b { "1" } else { "0" }).collect();
                format!("( {} {} {} ({}) )", disp, q(name), l.size, bits.join(" "))
            })
            .collect();
        let packets = store
            .packets()
            .map(|p| {
                let style = p.fill_style.map(|f| format!(" {}", f)).unwrap_or_default();
                format!(
                    "( {} {} {} {} {} {}{} )",
                    disp,
                    q(&p.name),
                    q(&p.stipple),
                    q(&p.line_style),
                    q(&p.fill),
                    q(&p.outline),
                    style
                )
            })
            .collect();
        let aliases = store
            .packet_aliases()
            .map(|(alias, p)| format!("( {} {} {} )", disp, q(alias), q(p)))
            .collect();

        self.write_line(format_args!(";; Display resources written by cdstech21"))?;
        self.section("drDefineDisplay", vec![format!("( {} )", disp)])?;
        self.section("drDefineColor", colors)?;
        let stipples: Vec<(&String, &Pixmap)> = store.stipples().collect();
        if !stipples.is_empty() {
            self.open("drDefineStipple")?;
            for (name, map) in stipples {
                self.write_line(format_args!("( {} {} (", disp, q(name)))?;
                self.indent += 1;
                for row in map.rows() {
                    let bits: Vec<&str> = row.iter().map(|b| if *b { "1" } else { "0" }).collect();
                    self.write_line(format_args!("({})", bits.join(" ")))?;
                }
                self.indent -= 1;
                self.write_line(format_args!(") )"))?;
            }
            self.close("drDefineStipple")?;
        }
        self.section("drDefineLineStyle", line_styles)?;
        self.section("drDefinePacket", packets)?;
        self.section("drDefinePacketAlias", aliases)?;
        self.dest.flush()?;
        Ok(())
    }

    /// Write the GDS layer map: `layer purpose stream-layer stream-datatype` per line.
    /// Lpps without explicit stream numbers map drawing lpps of technology layers to `(number, 0)`.
    pub fn write_layer_map(&mut self) -> TechResult<()> {
        let db = self.db;
        let layers = &db.layers;
        self.write_line(format_args!("# layer purpose stream-layer stream-datatype"))?;
        for (key, lpp) in layers.lpps() {
            let (lname, pname) = match layers.lpp_names(key) {
                Some(names) => names,
                None => continue,
            };
            let gds = match (lpp.attrs.gds, layers.layer(lpp.layer)) {
                (Some(gds), _) => gds,
                (None, Some(l)) if !l.reserved && pname == techdb21::DRAWING => (l.num, 0),
                _ => continue,
            };
            self.write_line(format_args!("{} {} {} {}", lname, pname, gds.0, gds.1))?;
        }
        self.dest.flush()?;
        Ok(())
    }
}

/// `( name layer1 [layer2] value ['qualifier...] ["comment"] )`
fn rule_entry(r: &Rule) -> String {
    let mut s = format!("( {} {}", r.name, q(&r.layer1));
    if let Some(l2) = &r.layer2 {
        s += &format!(" {}", q(l2));
    }
    match r.value2 {
        Some(v2) => s += &format!(" ( {} {} )", r.value, v2),
        None => s += &format!(" {}", r.value),
    }
    for qual in r.qualifiers.iter() {
        s += &format!(" '{}", qual);
    }
    if let Some(c) = &r.comment {
        s += &format!(" {}", q(c));
    }
    s + " )"
}
