//!
//! # Preamble and Layer-Block Keywords
//!

// Std-Lib
use std::str::FromStr;

// Crates.io
use tech21utils::{enumstr, EnumStr};

// Workspace
use techdb21::{
    ColorDef, DerivedLayer, LayerExpr, LayerFunction, LayerKind, Lpp, LppKey, Rgb, RouteDir,
    Routing, TechDb, TechDecimal, TechError, DRAWING,
};

// Local
use crate::pmap::get_filled;
use crate::reader::DslSession;
use crate::LineStatus;

/// First layer number assigned to layers opened without one
pub const AUTO_LAYER_NUM: i32 = 1000;

enumstr!(
    /// # Preamble Keywords
    PreambleKey {
        Technology: "Technology",
        Vendor: "Vendor",
        Process: "Process",
        TechVersion: "TechVersion",
        LibPath: "LibPath",
        ScriptPath: "ScriptPath",
        HelpPath: "HelpPath",
        Set: "Set",
        Unset: "Unset",
        DefineLayer: "DefineLayer",
        DefinePurpose: "DefinePurpose",
        LayerAlias: "LayerAlias",
        MfgGrid: "MfgGrid",
        DbuPerMicron: "DbuPerMicron",
        DefineColor: "DefineColor",
    }
);

enumstr!(
    /// # Layer-Block Opening Keywords
    LayerOpener {
        Layer: "Layer",
        PhysLayer: "PhysLayer",
        ElecLayer: "ElecLayer",
        DerivedLayer: "DerivedLayer",
    }
);

enumstr!(
    /// # Layer-Block Attribute Keywords
    BlockKey {
        LppName: "LppName",
        Description: "Description",
        Abbrev: "Abbrev",
        Rgb: "Rgb",
        Color: "Color",
        Filled: "Filled",
        Packet: "Packet",
        Invisible: "Invisible",
        NoSelect: "NoSelect",
        NoMerge: "NoMerge",
        Blink: "Blink",
        WireActive: "WireActive",
        Symbolic: "Symbolic",
        Routing: "Routing",
        Direction: "Direction",
        Pitch: "Pitch",
        Offset: "Offset",
        WireWidth: "WireWidth",
        Conductor: "Conductor",
        Via: "Via",
        Thickness: "Thickness",
        Rho: "Rho",
        Rsh: "Rsh",
        Epsilon: "Epsilon",
        StreamData: "StreamData",
    }
);

/// Message text of a database error
pub(crate) fn msg(e: TechError) -> String {
    match e {
        TechError::Str(s) => s,
        e => e.to_string(),
    }
}
pub(crate) fn dec(txt: &str) -> Result<TechDecimal, String> {
    TechDecimal::from_str(txt)
        .or_else(|_| TechDecimal::from_scientific(txt))
        .map_err(|_| format!("Invalid number `{}`", txt))
}
pub(crate) fn int<T: FromStr>(txt: &str) -> Result<T, String> {
    txt.parse::<T>()
        .map_err(|_| format!("Invalid integer `{}`", txt))
}
/// Optional boolean argument, true when absent
pub(crate) fn flag(args: &str) -> Result<bool, String> {
    match args.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" | "t" | "true" | "1" | "on" => Ok(true),
        "n" | "no" | "nil" | "f" | "false" | "0" | "off" => Ok(false),
        other => Err(format!("Invalid boolean `{}`", other)),
    }
}
pub(crate) fn words(args: &str) -> Vec<&str> {
    args.split_whitespace().collect()
}
/// The single word of `args`
pub(crate) fn one<'a>(args: &'a str, usage: &str) -> Result<&'a str, String> {
    match words(args).as_slice() {
        [w] => Ok(*w),
        _ => Err(format!("Usage: {}", usage)),
    }
}
/// Non-empty text of `args`
fn text(args: &str, usage: &str) -> Result<String, String> {
    match args.trim() {
        "" => Err(format!("Usage: {}", usage)),
        t => Ok(t.to_string()),
    }
}
fn direction(txt: &str) -> Result<RouteDir, String> {
    match txt.to_ascii_lowercase().as_str() {
        "h" => Ok(RouteDir::Horizontal),
        "v" => Ok(RouteDir::Vertical),
        _ => RouteDir::from_str_nocase(txt).ok_or_else(|| format!("Unknown direction `{}`", txt)),
    }
}

/// Apply preamble keyword `key`
pub fn preamble(s: &mut DslSession, key: PreambleKey, args: &str) -> LineStatus {
    preamble_inner(s, key, args).into()
}
fn preamble_inner(s: &mut DslSession, key: PreambleKey, args: &str) -> Result<(), String> {
    let info = &mut s.db.info;
    match key {
        PreambleKey::Technology => info.name = Some(text(args, "Technology NAME")?),
        PreambleKey::Vendor => info.vendor = Some(text(args, "Vendor NAME")?),
        PreambleKey::Process => info.process = Some(text(args, "Process NAME")?),
        PreambleKey::TechVersion => info.version = Some(text(args, "TechVersion VERSION")?),
        PreambleKey::LibPath => info.lib_path = args.split_whitespace().map(String::from).collect(),
        PreambleKey::ScriptPath => {
            info.script_path = args.split_whitespace().map(String::from).collect()
        }
        PreambleKey::HelpPath => info.help_path = args.split_whitespace().map(String::from).collect(),
        PreambleKey::MfgGrid => info.mfg_grid = Some(dec(one(args, "MfgGrid VALUE")?)?),
        PreambleKey::DbuPerMicron => {
            info.dbu_per_micron = Some(int(one(args, "DbuPerMicron N")?)?)
        }
        PreambleKey::Set => match args.split_once(char::is_whitespace) {
            Some((name, val)) => s.vars.set(name, val.trim()),
            None if !args.is_empty() => s.vars.set(args, ""),
            None => return Err("Usage: Set NAME [VALUE]".into()),
        },
        PreambleKey::Unset => {
            s.vars.unset(one(args, "Unset NAME")?);
        }
        PreambleKey::DefineLayer | PreambleKey::DefinePurpose => {
            let (name, num, abbrev) = match words(args).as_slice() {
                [name, num] => (name.to_string(), int(num)?, None),
                [name, num, ab] => (name.to_string(), int(num)?, Some(ab.to_string())),
                _ => return Err(format!("Usage: {} NAME NUM [ABBREV]", key)),
            };
            if key == PreambleKey::DefineLayer {
                s.db.layers.add_layer(name, num, abbrev).map_err(msg)?;
            } else {
                s.db.layers.add_purpose(name, num, abbrev).map_err(msg)?;
            }
        }
        PreambleKey::LayerAlias => match words(args).as_slice() {
            [alias, layer] => s.db.layers.add_alias(*alias, layer).map_err(msg)?,
            _ => return Err("Usage: LayerAlias ALIAS LAYER".into()),
        },
        PreambleKey::DefineColor => {
            let (name, rgb, blink) = match words(args).as_slice() {
                [name, r, g, b, rest @ ..] => {
                    let rgb = Rgb::new(int(r)?, int(g)?, int(b)?);
                    (name.to_string(), rgb, flag(&rest.join(" "))? && !rest.is_empty())
                }
                _ => return Err("Usage: DefineColor NAME R G B [BLINK]".into()),
            };
            s.db.display.add_color(name, ColorDef { rgb, blink });
        }
    }
    Ok(())
}

/// Open a layer block: `Layer NAME[:PURPOSE] [NUM]`, or `DerivedLayer NAME [NUM] EXPR`
pub fn open(s: &mut DslSession, opener: LayerOpener, args: &str) -> LineStatus {
    open_inner(s, opener, args).into()
}
fn open_inner(s: &mut DslSession, opener: LayerOpener, args: &str) -> Result<(), String> {
    let usage = || match opener {
        LayerOpener::DerivedLayer => String::from("Usage: DerivedLayer NAME [NUM] EXPR"),
        _ => format!("Usage: {} NAME[:PURPOSE] [NUM]", opener),
    };
    let mut tokens = words(args);
    if tokens.is_empty() {
        return Err(usage());
    }
    let spec = tokens.remove(0);
    let (lname, pname) = spec.split_once(':').unwrap_or((spec, DRAWING));
    let (num, derived) = match opener {
        LayerOpener::DerivedLayer => {
            let num = match tokens.first().map(|t| t.parse::<i32>()) {
                Some(Ok(n)) => {
                    tokens.remove(0);
                    Some(n)
                }
                _ => None,
            };
            if tokens.is_empty() {
                return Err(usage());
            }
            let expr = LayerExpr::parse(&tokens.join(" ")).map_err(msg)?;
            (num, Some(expr))
        }
        _ => match tokens.as_slice() {
            [] => (None, None),
            [n] => (Some(int(n)?), None),
            _ => return Err(usage()),
        },
    };
    let layers = &mut s.db.layers;
    let layer = match (layers.find_layer(lname), num) {
        (Some(key), None) => key,
        (_, Some(n)) => layers.add_layer(lname, n, None).map_err(msg)?,
        (None, None) => {
            let n = layers.next_layer_num(AUTO_LAYER_NUM).map_err(msg)?;
            layers.add_layer(lname, n, None).map_err(msg)?
        }
    };
    let purpose = layers
        .find_purpose(pname)
        .ok_or_else(|| format!("Unknown purpose `{}`", pname))?;
    let lpp = layers.add_lpp(layer, purpose).map_err(msg)?;
    let entry = entry(s, lpp)?;
    entry.kind = match opener {
        LayerOpener::ElecLayer => LayerKind::Electrical,
        LayerOpener::DerivedLayer => LayerKind::Derived,
        _ => LayerKind::Physical,
    };
    if let Some(expr) = derived {
        entry.derived = Some(DerivedLayer::new(expr));
    }
    s.current = Some(lpp);
    Ok(())
}

fn entry(s: &mut DslSession, lpp: LppKey) -> Result<&mut Lpp, String> {
    s.db
        .layers
        .lpp_mut(lpp)
        .ok_or_else(|| String::from("Layer block refers to a removed layer"))
}
fn routing(entry: &mut Lpp) -> &mut Routing {
    entry.attrs.routing.get_or_insert_with(Routing::default)
}

/// Apply layer-block attribute `key` to open block `lpp`
pub fn attribute(s: &mut DslSession, lpp: LppKey, key: BlockKey, args: &str) -> LineStatus {
    attribute_inner(s, lpp, key, args).into()
}
fn attribute_inner(s: &mut DslSession, lpp: LppKey, key: BlockKey, args: &str) -> Result<(), String> {
    let usage = |form: &str| format!("Usage: {} {}", key, form);
    match key {
        BlockKey::LppName => {
            let alias = one(args, "LppName NAME")?;
            let (layer, _) = s
                .db
                .layers
                .lpp_names(lpp)
                .ok_or_else(|| String::from("Layer block refers to a removed layer"))?;
            let layer = layer.to_string();
            s.db.layers.add_alias(alias, &layer).map_err(msg)?;
        }
        BlockKey::Description => entry(s, lpp)?.description = Some(text(args, "Description TEXT")?),
        BlockKey::Abbrev => {
            let abbrev = one(args, "Abbrev NAME")?;
            let layer = entry(s, lpp)?.layer;
            let (name, num) = match s.db.layers.layer(layer) {
                Some(l) => (l.name.clone(), l.num),
                None => return Err("Layer block refers to a removed layer".into()),
            };
            s.db.layers.add_layer(name, num, Some(abbrev.into())).map_err(msg)?;
        }
        BlockKey::Rgb => {
            let rgb = match words(args).as_slice() {
                [r, g, b] => Rgb::new(int(r)?, int(g)?, int(b)?),
                _ => return Err(usage("R G B")),
            };
            entry(s, lpp)?.display.color = Some(rgb);
        }
        BlockKey::Color => {
            let name = one(args, "Color NAME")?;
            let def = *s
                .db
                .display
                .color(name)
                .ok_or_else(|| format!("Unknown color `{}`", name))?;
            let display = &mut entry(s, lpp)?.display;
            display.color = Some(def.rgb);
            display.blink = def.blink;
        }
        BlockKey::Filled => entry(s, lpp)?.display.fill = get_filled(args).map_err(msg)?,
        BlockKey::Packet => {
            let name = one(args, "Packet NAME")?;
            s.db.assign_packet(lpp, name);
        }
        BlockKey::Invisible => entry(s, lpp)?.display.visible = !flag(args)?,
        BlockKey::NoSelect => entry(s, lpp)?.display.selectable = !flag(args)?,
        BlockKey::Blink => entry(s, lpp)?.display.blink = flag(args)?,
        BlockKey::NoMerge => entry(s, lpp)?.attrs.no_merge = flag(args)?,
        BlockKey::WireActive => entry(s, lpp)?.attrs.wire_active = flag(args)?,
        BlockKey::Symbolic => entry(s, lpp)?.attrs.symbolic = flag(args)?,
        BlockKey::Conductor => entry(s, lpp)?.attrs.conductor = flag(args)?,
        BlockKey::Routing => {
            let dir = match args.trim() {
                "" => None,
                d => Some(direction(d)?),
            };
            let entry = entry(s, lpp)?;
            entry.attrs.conductor = true;
            let routing = routing(entry);
            if dir.is_some() {
                routing.direction = dir;
            }
        }
        BlockKey::Direction => {
            let dir = direction(one(args, "Direction DIR")?)?;
            routing(entry(s, lpp)?).direction = Some(dir);
        }
        BlockKey::Pitch => {
            let val = dec(one(args, "Pitch VALUE")?)?;
            routing(entry(s, lpp)?).pitch = Some(val);
        }
        BlockKey::Offset => {
            let val = dec(one(args, "Offset VALUE")?)?;
            routing(entry(s, lpp)?).offset = Some(val);
        }
        BlockKey::WireWidth => {
            entry(s, lpp)?.attrs.wire_width = Some(dec(one(args, "WireWidth VALUE")?)?)
        }
        BlockKey::Thickness => {
            entry(s, lpp)?.attrs.thickness = Some(dec(one(args, "Thickness VALUE")?)?)
        }
        BlockKey::Rho => entry(s, lpp)?.attrs.rho = Some(dec(one(args, "Rho VALUE")?)?),
        BlockKey::Rsh => entry(s, lpp)?.attrs.rsh = Some(dec(one(args, "Rsh VALUE")?)?),
        BlockKey::Epsilon => entry(s, lpp)?.attrs.epsilon = Some(dec(one(args, "Epsilon VALUE")?)?),
        BlockKey::Via => {
            let (l1, l2) = match words(args).as_slice() {
                [l1, l2] => (l1.to_string(), l2.to_string()),
                _ => return Err(usage("LAYER1 LAYER2")),
            };
            let attrs = &mut entry(s, lpp)?.attrs;
            attrs.via = Some((l1, l2));
            attrs.function = Some(LayerFunction::Cut);
        }
        BlockKey::StreamData => {
            let gds = match words(args).as_slice() {
                [l, d] => (int(l)?, int(d)?),
                _ => return Err(usage("LAYER DATATYPE")),
            };
            entry(s, lpp)?.attrs.gds = Some(gds);
        }
    }
    Ok(())
}

/// Built-in checks on a closing layer block, returning its problems
pub fn validate(db: &TechDb, lpp: LppKey) -> Vec<String> {
    let mut problems = Vec::new();
    let entry = match db.layers.lpp(lpp) {
        Some(entry) => entry,
        None => return problems,
    };
    if let Some((l1, l2)) = &entry.attrs.via {
        for l in [l1, l2] {
            if db.layers.find_layer(l).is_none() {
                problems.push(format!("Via layer {} joins unknown layer {}", entry.name, l));
            }
        }
    }
    if let Some(derived) = &entry.derived {
        for l in derived.expr.layers() {
            if db.layers.find_layer(l).is_none() {
                problems.push(format!("Derived layer {} uses unknown layer {}", entry.name, l));
            }
        }
    }
    let pitch = entry.attrs.routing.as_ref().and_then(|r| r.pitch);
    if let (Some(width), Some(pitch)) = (entry.attrs.wire_width, pitch) {
        if width > pitch {
            problems.push(format!(
                "Layer {} wire width {} exceeds its pitch {}",
                entry.name, width, pitch
            ));
        }
    }
    problems
}
