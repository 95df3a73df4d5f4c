//!
//! # Cadence ASCII Technology-File Grammar
//!
//! Handlers for `controls`, `layerDefinitions`, `layerRules`, `viaDefs`,
//! `constraintGroups` and `devices`, and their children.
//! The layer-definition handlers are shared with the legacy [crate::cdb] grammar.
//!

// Crates.io
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

// Workspace
use sexp21::{Node, SexpResult, SourcePos, Value};
use tech21utils::EnumStr;
use techdb21::{
    CustomVia, DerivedLayer, DerivedOp, DeviceHint, DiagCategory, ImplantSpec, LayerExpr,
    LayerFunction, LayerKind, RouteDir, Rule, SpacingTable, StdViaBuilder, TableFlags, TableRow,
    TechDb, TechParam, TechResult, FOUNDRY,
};

// Local
use crate::session::{
    self, flag, for_entries, int, names, num, opt, pair, stub, text, CdsEnv,
    CdsSession, Source,
};
use crate::ReadOptions;

/// Accepted and ignored
const STUBS: &[&str] = &[
    "techPermissions",
    "techOpcLayers",
    "stampLabelLayers",
    "labelLayers",
    "currentDensityTables",
    "mfgResolutions",
    "viaSpecs",
    "placementGrid",
    "viaStackingLimits",
    "memberConstraintGroups",
    "characterizationRules",
    "tcCreateCDSDeviceClass",
    "multipartPathTemplates",
    "siliconTemplates",
    "leLswLayers",
    "lxExtractLayers",
    "lxNoOverlapLayers",
];

/// Layer property carrying the default wire width
pub(crate) const WIRE_WIDTH: &str = "wireWidth";

/// Layers excluded from rule checking after every read
const NO_DRC_LAYERS: [&str; 2] = ["prBoundary", "text"];

/// Read technology content from `src` into `db`
pub(crate) fn read(db: &mut TechDb, src: Source, opts: &ReadOptions) -> TechResult<()> {
    db.layers.seed_reserved();
    let rv = session::run(db, src, opts, register);
    post_process(db);
    rv
}

/// Register the technology-file handler set
pub fn register(env: &mut CdsEnv) {
    for name in [
        "controls",
        "layerDefinitions",
        "layerRules",
        "viaDefs",
        "devices",
        "leRules",
        "lxRules",
    ] {
        env.register_dispatcher(name);
    }
    register_layer_defs(env);
    env.register_handler("techParams", tech_params);
    env.register_handler("viewTypeUnits", view_type_units);
    env.register_handler("mfgGridResolution", mfg_grid_resolution);
    env.register_handler("refTechLibs", ref_tech_libs);
    env.register_handler("functions", functions);
    env.register_handler("routingDirections", routing_directions);
    env.register_handler("equivalentLayers", equivalent_layers);
    env.register_handler("viaLayers", via_layers);
    env.register_handler("standardViaDefs", standard_via_defs);
    env.register_handler("customViaDefs", custom_via_defs);
    env.register_handler("constraintGroups", constraint_groups);
    env.register_handler("spacings", spacings);
    env.register_handler("orderedSpacings", ordered_spacings);
    env.register_handler("spacingTables", spacing_tables);
    env.register_handler("antennaModels", antenna_models);
    env.register_handler("electrical", electrical);
    env.register_handler("interconnect", interconnect);
    env.register_handler("routingGrids", routing_grids);
    for kind in ["extractMOS", "extractRES", "extractCAP", "extractDIODE"] {
        env.register_handler(kind, device_hint);
    }
    for name in STUBS {
        env.register_handler(*name, stub);
    }
    env.register_function("techParam", tech_param);
}

/// Register the `layerDefinitions` children, shared with the CDB grammar
pub(crate) fn register_layer_defs(env: &mut CdsEnv) {
    env.register_handler("techPurposes", tech_purposes);
    env.register_handler("techLayers", tech_layers);
    env.register_handler("techLayerPurposePriorities", tech_priorities);
    env.register_handler("techDisplays", tech_displays);
    env.register_handler("techLayerProperties", tech_layer_properties);
    env.register_handler("techDerivedLayers", tech_derived_layers);
}

/// Flag the boundary and text layers as excluded from rule checking
pub(crate) fn post_process(db: &mut TechDb) {
    for name in NO_DRC_LAYERS {
        let layer = match db.layers.find_layer(name) {
            Some(k) => k,
            None => continue,
        };
        let keys: Vec<_> = db.layers.lpps_on(layer).map(|(k, _)| k).collect();
        for key in keys {
            if let Some(lpp) = db.layers.lpp_mut(key) {
                lpp.attrs.no_drc = true;
            }
        }
    }
}

/// `techParams( (name value) ... )`
fn tech_params(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 2, "technology parameter", |s, _, vals| {
        let name = text(&vals[0])?;
        let param = match &vals[1] {
            Value::Number(d) => TechParam::Number(*d),
            Value::Str(t) | Value::Symbol(t) => TechParam::Text(t.clone()),
            Value::True => TechParam::Bool(true),
            Value::Nil => TechParam::Bool(false),
            _ => return None,
        };
        s.db.info.params.insert(name, param);
        Some(())
    })
}

/// Value function `techParam("name")`
fn tech_param(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    let vals = env.eval_list(s, form, 1)?;
    let name = match vals.first().and_then(Value::as_str) {
        Some(name) => name,
        None => return env.fail(format!("Malformed `{}`", form)),
    };
    match s.db.info.params.get(name) {
        Some(TechParam::Number(d)) => Ok(Value::Number(*d)),
        Some(TechParam::Text(t)) => Ok(Value::Str(t.clone())),
        Some(TechParam::Bool(true)) => Ok(Value::True),
        Some(TechParam::Bool(false)) => Ok(Value::Nil),
        None => env.fail(format!("Unknown technology parameter `{}`", name)),
    }
}

/// `viewTypeUnits( (viewType unit [dbuPerUnit]) ... )`
fn view_type_units(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 2, "view-type units", |s, _, vals| {
        let view = text(&vals[0])?;
        let unit = text(&vals[1])?;
        let dbu = opt(vals.get(2), num)?;
        if view == "maskLayout" && unit == "micron" {
            if let Some(d) = dbu {
                s.db.info.dbu_per_micron = Some(d.to_u32()?);
            }
        }
        s.db.info.view_units.insert(view, (unit, dbu));
        Some(())
    })
}

/// `mfgGridResolution( (grid) )`, or the bare-number form of the CDB grammar
pub(crate) fn mfg_grid_resolution(
    env: &mut CdsEnv,
    s: &mut CdsSession,
    form: &Node,
) -> SexpResult<Value> {
    let vals = env.eval_list(s, form, usize::MAX)?;
    let grid = vals.iter().find_map(|v| match v {
        Value::Number(d) => Some(*d),
        Value::List(items) => items.first().and_then(Value::as_number),
        _ => None,
    });
    match grid {
        Some(g) if g > Decimal::ZERO => s.db.info.mfg_grid = Some(g),
        _ => s.malformed(env.pos(), form, "manufacturing grid"),
    }
    Ok(Value::Nil)
}

/// `refTechLibs( "lib" ... )`
fn ref_tech_libs(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    let vals = env.eval_list(s, form, usize::MAX)?;
    match vals.iter().map(text).collect::<Option<Vec<_>>>() {
        Some(libs) => s.db.info.ref_tech_libs.extend(libs),
        None => s.malformed(env.pos(), form, "reference technology libraries"),
    }
    Ok(Value::Nil)
}

/// Shared body of `techLayers` and `techPurposes`: `(name number [abbrev])`
fn numbered(vals: &[Value]) -> Option<(String, i32, Option<String>)> {
    let name = text(&vals[0])?;
    let num = int(&vals[1])?;
    let abbrev = opt(vals.get(2), text)?;
    Some((name, num, abbrev))
}

/// `techPurposes( (name number [abbrev]) ... )`
fn tech_purposes(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 2, "purpose definition", |s, pos, vals| {
        let (name, num, abbrev) = numbered(vals)?;
        if let Err(e) = s.db.layers.add_purpose(name, num, abbrev) {
            s.warn(pos, DiagCategory::Validation, e.to_string());
        }
        Some(())
    })
}

/// `techLayers( (name number [abbrev]) ... )`
fn tech_layers(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 2, "layer definition", |s, pos, vals| {
        let (name, num, abbrev) = numbered(vals)?;
        if let Err(e) = s.db.layers.add_layer(name, num, abbrev) {
            s.warn(pos, DiagCategory::Validation, e.to_string());
        }
        Some(())
    })
}

/// Find the lpp for layer and purpose names, creating it if both are defined
fn lpp_of(s: &mut CdsSession, pos: &SourcePos, layer: &str, purpose: &str) -> Option<techdb21::LppKey> {
    let lk = s.layer(pos, layer);
    let pk = s.purpose(pos, purpose);
    match s.db.layers.add_lpp(lk?, pk?) {
        Ok(key) => Some(key),
        Err(e) => {
            s.warn(pos, DiagCategory::Internal, e.to_string());
            None
        }
    }
}

/// `techLayerPurposePriorities( (layer purpose) ... )`
fn tech_priorities(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 2, "layer-purpose priority", |s, pos, vals| {
        let layer = text(&vals[0])?;
        let purpose = text(&vals[1])?;
        lpp_of(s, pos, &layer, &purpose);
        Some(())
    })
}

/// `techDisplays( (layer purpose packet [visible selectable con2chg dragEnable valid]) ... )`
fn tech_displays(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "layer display", |s, pos, vals| {
        let layer = text(&vals[0])?;
        let purpose = text(&vals[1])?;
        let packet = text(&vals[2])?;
        let mut flags = [true, true, false, true, true];
        for (slot, v) in flags.iter_mut().zip(vals[3..].iter()) {
            *slot = flag(v)?;
        }
        let lpp = match lpp_of(s, pos, &layer, &purpose) {
            Some(k) => k,
            None => return Some(()),
        };
        let display = &mut s.db.layers.lpp_mut(lpp)?.display;
        display.visible = flags[0];
        display.selectable = flags[1];
        display.con2chg = flags[2];
        display.drag_enable = flags[3];
        display.valid = flags[4];
        s.db.assign_packet(lpp, &packet);
        Some(())
    })
}

/// `techLayerProperties( (property layer [layer2] value) ... )`
fn tech_layer_properties(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "layer property", |s, pos, vals| {
        let prop = text(&vals[0])?;
        let layer = text(&vals[1])?;
        let (key, value) = match vals.len() {
            3 => (prop, &vals[2]),
            _ => (format!("{}:{}", prop, text(&vals[2])?), &vals[3]),
        };
        if matches!(value, Value::List(_) | Value::Form(_)) {
            return None;
        }
        let lpp = match s.drawing_lpp(pos, &layer) {
            Some(k) => k,
            None => return Some(()),
        };
        let attrs = &mut s.db.layers.lpp_mut(lpp)?.attrs;
        match key.as_str() {
            WIRE_WIDTH => attrs.wire_width = Some(num(value)?),
            _ => {
                attrs.properties.insert(key, value.to_string());
            }
        }
        Some(())
    })
}

/// `techDerivedLayers( (name number (layer1 'op layer2)) ... )`
fn tech_derived_layers(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "derived layer", |s, pos, vals| {
        let name = text(&vals[0])?;
        let num = int(&vals[1])?;
        let (lhs, op, rhs) = match vals[2].as_list()? {
            [lhs, op, rhs] => (text(lhs)?, text(op)?, text(rhs)?),
            _ => return None,
        };
        let op = match DerivedOp::from_str_nocase(&op) {
            Some(op) => op,
            None => {
                let msg = format!("Derived layer {}: operator `{}` is not supported", name, op);
                s.warn(pos, DiagCategory::Unsupported, msg);
                return Some(());
            }
        };
        if !s.layers_defined(pos, &[&lhs, &rhs]) {
            return Some(());
        }
        if let Err(e) = s.db.layers.add_layer(name.clone(), num, None) {
            s.warn(pos, DiagCategory::Validation, e.to_string());
            return Some(());
        }
        let lpp = s.drawing_lpp(pos, &name)?;
        let entry = s.db.layers.lpp_mut(lpp)?;
        entry.kind = LayerKind::Derived;
        entry.derived = Some(DerivedLayer::new(LayerExpr::binary(op, lhs, rhs)));
        Some(())
    })
}

/// `functions( (layer "function" [maskNumber]) ... )`
fn functions(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 2, "layer function", |s, pos, vals| {
        let layer = text(&vals[0])?;
        let func = text(&vals[1])?;
        let mask = opt(vals.get(2), int)?;
        let function = match LayerFunction::from_str(&func) {
            Some(f) => f,
            None => {
                let msg = format!("Layer {}: unknown function `{}`", layer, func);
                s.warn(pos, DiagCategory::Unsupported, msg);
                LayerFunction::Other
            }
        };
        let lpp = match s.drawing_lpp(pos, &layer) {
            Some(k) => k,
            None => return Some(()),
        };
        let attrs = &mut s.db.layers.lpp_mut(lpp)?.attrs;
        attrs.function = Some(function);
        attrs.mask_number = mask;
        attrs.conductor = matches!(
            function,
            LayerFunction::Metal | LayerFunction::Poly | LayerFunction::Li
        );
        Some(())
    })
}

/// `routingDirections( (layer direction) ... )`
pub(crate) fn routing_directions(
    env: &mut CdsEnv,
    s: &mut CdsSession,
    form: &Node,
) -> SexpResult<Value> {
    for_entries(env, s, form, 2, "routing direction", |s, pos, vals| {
        let layer = text(&vals[0])?;
        let dir = RouteDir::from_str(&text(&vals[1])?)?;
        let lpp = match s.drawing_lpp(pos, &layer) {
            Some(k) => k,
            None => return Some(()),
        };
        let attrs = &mut s.db.layers.lpp_mut(lpp)?.attrs;
        attrs.routing.get_or_insert_with(Default::default).direction = Some(dir);
        Some(())
    })
}

/// `viaLayers( (layer1 viaLayer layer2) ... )`
fn via_layers(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "via layers", |s, pos, vals| {
        let l1 = text(&vals[0])?;
        let via = text(&vals[1])?;
        let l2 = text(&vals[2])?;
        if !s.layers_defined(pos, &[&l1, &l2]) {
            return Some(());
        }
        let lpp = match s.drawing_lpp(pos, &via) {
            Some(k) => k,
            None => return Some(()),
        };
        s.db.layers.lpp_mut(lpp)?.attrs.via = Some((l1, l2));
        Some(())
    })
}

/// `equivalentLayers( (layer layer ...) ... )`
fn equivalent_layers(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 2, "equivalent layers", |s, pos, vals| {
        let layers = vals.iter().map(text).collect::<Option<Vec<_>>>()?;
        let refs: Vec<&str> = layers.iter().map(String::as_str).collect();
        if s.layers_defined(pos, &refs) {
            s.db.info.equivalent_layers.push(layers);
        }
        Some(())
    })
}

/// Optional implant layer and enclosure, at `vals[idx]` and `vals[idx + 1]`
fn implant(vals: &[Value], idx: usize) -> Option<Option<ImplantSpec>> {
    let layer = match opt(vals.get(idx), text)? {
        Some(layer) => layer,
        None => return Some(None),
    };
    let enclosure = pair(vals.get(idx + 1)?)?;
    Some(Some(ImplantSpec { layer, enclosure }))
}

/// `standardViaDefs( (name layer1 layer2 (cut width height [resistance])
///     (rows cols (spaceX spaceY)) (enc1) (enc2) (off1) (off2) (origOffset)
///     [implant1 (enc) [implant2 (enc)]]) ... )`
fn standard_via_defs(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 10, "standard via", |s, pos, vals| {
        let name = text(&vals[0])?;
        let layer1 = text(&vals[1])?;
        let layer2 = text(&vals[2])?;
        let (cut, width, height, res) = match vals[3].as_list()? {
            [cut, w, h, rest @ ..] if rest.len() <= 1 => {
                (text(cut)?, num(w)?, num(h)?, opt(rest.first(), num)?)
            }
            _ => return None,
        };
        let (rows, cols, space) = match vals[4].as_list()? {
            [r, c, sp] => (
                u32::try_from(int(r)?).ok()?,
                u32::try_from(int(c)?).ok()?,
                pair(sp)?,
            ),
            _ => return None,
        };
        let (enc1, enc2) = (pair(&vals[5])?, pair(&vals[6])?);
        let (off1, off2, orig) = (pair(&vals[7])?, pair(&vals[8])?, pair(&vals[9])?);
        let imp1 = implant(vals, 10)?;
        let imp2 = implant(vals, 12)?;
        if !s.layers_defined(pos, &[&layer1, &cut, &layer2]) {
            return Some(());
        }
        let mut builder = StdViaBuilder::default()
            .name(name)
            .layer1(layer1)
            .cut(cut)
            .layer2(layer2)
            .cut_width(width)
            .cut_height(height)
            .rows(rows)
            .cols(cols)
            .cut_space(space)
            .enc1(enc1)
            .enc2(enc2)
            .off1(off1)
            .off2(off2)
            .orig_off(orig);
        if let Some(r) = res {
            builder = builder.resistance(r);
        }
        if let Some(i) = imp1 {
            builder = builder.implant1(i);
        }
        if let Some(i) = imp2 {
            builder = builder.implant2(i);
        }
        let via = builder.build().ok()?;
        if let Err(e) = s.db.vias.add_std_via(via) {
            s.warn(pos, DiagCategory::Validation, e.to_string());
        }
        Some(())
    })
}

/// `customViaDefs( (name lib cell view layer1 layer2 [resistance]) ... )`
fn custom_via_defs(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 6, "custom via", |s, pos, vals| {
        let via = CustomVia {
            name: text(&vals[0])?,
            lib: text(&vals[1])?,
            cell: text(&vals[2])?,
            view: text(&vals[3])?,
            layer1: text(&vals[4])?,
            layer2: text(&vals[5])?,
            resistance: opt(vals.get(6), num)?,
        };
        if !s.layers_defined(pos, &[&via.layer1, &via.layer2]) {
            return Some(());
        }
        if let Err(e) = s.db.vias.add_custom_via(via) {
            s.warn(pos, DiagCategory::Validation, e.to_string());
        }
        Some(())
    })
}

/// `constraintGroups( ("name" override children...) ... )`
fn constraint_groups(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for entry in form.args() {
        let (name, override_) = match group_head(env, s, entry)? {
            Some(head) => head,
            None => continue,
        };
        s.db.rules.group_mut(&name).override_ = override_;
        let outer = std::mem::replace(&mut s.group, name);
        let rv = env.dispatch_children(s, entry);
        s.group = outer;
        rv?;
    }
    Ok(Value::Nil)
}

/// Name and override flag leading a constraint-group entry
fn group_head(
    env: &mut CdsEnv,
    s: &mut CdsSession,
    entry: &Node,
) -> SexpResult<Option<(String, bool)>> {
    if !entry.is_list() {
        s.malformed(env.pos(), entry, "constraint group");
        return Ok(None);
    }
    let vals = match env.eval_list(s, entry, 2) {
        Ok(vals) => vals,
        Err(e) => {
            env.handle_error(s, e)?;
            return Ok(None);
        }
    };
    let name = vals.first().and_then(text);
    let override_ = match vals.get(1) {
        None | Some(Value::Form(_)) => Some(false),
        Some(v) => flag(v),
    };
    match (name, override_) {
        (Some(name), Some(o)) => Ok(Some((name, o))),
        _ => {
            s.malformed(env.pos(), entry, "constraint group");
            Ok(None)
        }
    }
}

/// Parse a rule entry: `(name layer1 [layer2] value ['qualifier...] ["comment"])`.
/// The value is a number or a `(value value2)` pair, optionally followed by a second number.
pub(crate) fn parse_rule(vals: &[Value], group: &str, ordered: bool) -> Option<Rule> {
    let name = text(&vals[0])?;
    let mut idx = 1;
    let mut layers = Vec::new();
    while let Some(Value::Str(l) | Value::Symbol(l)) = vals.get(idx) {
        if layers.len() == 2 {
            break;
        }
        layers.push(l.clone());
        idx += 1;
    }
    let mut layers = layers.into_iter();
    let layer1 = layers.next()?;
    let layer2 = layers.next();
    let (value, value2) = match vals.get(idx)? {
        Value::Number(d) => (*d, None),
        Value::List(items) => match items.as_slice() {
            [a, b] => (num(a)?, Some(num(b)?)),
            _ => return None,
        },
        _ => return None,
    };
    let mut rule = Rule::new(name, layer1, layer2, value);
    rule.value2 = value2;
    rule.group = group.into();
    rule.ordered = ordered;
    for v in &vals[idx + 1..] {
        match v {
            Value::Number(d) if rule.value2.is_none() && rule.qualifiers.is_empty() => {
                rule.value2 = Some(*d)
            }
            Value::Symbol(q) => rule.qualifiers.push(q.clone()),
            Value::Str(c) if rule.comment.is_none() => rule.comment = Some(c.clone()),
            _ => return None,
        }
    }
    Some(rule)
}

/// Add a parsed rule, if all its layers are defined
pub(crate) fn add_rule(s: &mut CdsSession, pos: &SourcePos, rule: Rule) {
    let mut layers = vec![rule.layer1.as_str()];
    layers.extend(rule.layer2.as_deref());
    if s.layers_defined(pos, &layers) {
        s.db.rules.add_rule(rule);
    }
}

fn rules(env: &mut CdsEnv, s: &mut CdsSession, form: &Node, ordered: bool) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "spacing rule", |s, pos, vals| {
        let rule = parse_rule(vals, &s.group, ordered)?;
        add_rule(s, pos, rule);
        Some(())
    })
}

/// `spacings( (rule layer1 [layer2] value ...) ... )`
fn spacings(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    rules(env, s, form, false)
}

/// `orderedSpacings( ... )`, where layer order is significant
fn ordered_spacings(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    rules(env, s, form, true)
}

/// Table rows. One-dimensional rows are flat `index value` pairs;
/// two-dimensional rows are `(index1 index2) value` pairs.
/// Returns `None` for any other shape.
fn table_rows(items: &[Value], two_d: bool) -> Option<Vec<TableRow>> {
    if items.len() % 2 != 0 {
        return None;
    }
    items
        .chunks(2)
        .map(|chunk| {
            let value = num(&chunk[1])?;
            let (index1, index2) = match (&chunk[0], two_d) {
                (Value::Number(i), false) => (*i, None),
                (Value::List(ix), true) => match ix.as_slice() {
                    [i1, i2] => (num(i1)?, Some(num(i2)?)),
                    _ => return None,
                },
                _ => return None,
            };
            Some(TableRow {
                index1,
                index2,
                value,
            })
        })
        .collect()
}

/// `spacingTables( (rule layer1 [layer2] (("index1" nil nil ["index2" nil nil]) [default])
///     (rows...) ['qualifier...] ["comment"]) ... )`
fn spacing_tables(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 4, "spacing table", |s, pos, vals| {
        let name = text(&vals[0])?;
        let mut idx = 1;
        let mut layers = Vec::new();
        while let Some(Value::Str(l) | Value::Symbol(l)) = vals.get(idx) {
            if layers.len() == 2 {
                break;
            }
            layers.push(l.clone());
            idx += 1;
        }
        let header = vals.get(idx)?.as_list()?;
        let dims = header.first()?.as_list()?;
        let index1 = text(dims.first()?)?;
        let index2 = opt(dims.get(3), text)?;
        let default = opt(header.get(1), num)?;
        let rows = vals.get(idx + 1)?.as_list()?;
        let mut flags = TableFlags::default();
        let mut comment = None;
        for v in vals.get(idx + 2..).unwrap_or_default() {
            match v {
                Value::Symbol(q) => {
                    if !flags.set(q) {
                        log::debug!("{}: ignoring table qualifier `{}`", pos, q);
                    }
                }
                Value::Str(c) => comment = Some(c.clone()),
                _ => return None,
            }
        }
        let mut layers = layers.into_iter();
        let layer1 = layers.next()?;
        let layer2 = layers.next();
        let mut refs = vec![layer1.as_str()];
        refs.extend(layer2.as_deref());
        if !s.layers_defined(pos, &refs) {
            return Some(());
        }
        let parsed = table_rows(rows, index2.is_some());
        let unsupported = parsed.is_none();
        let table = SpacingTable {
            name,
            layer1,
            layer2,
            index1,
            index2,
            default,
            rows: parsed.unwrap_or_default(),
            flags,
            ignore: unsupported,
            group: s.group.clone(),
            comment,
        };
        let msg = format!("{} table on {}", table.name, table.layer1);
        if unsupported {
            let msg = format!("{}: unsupported row shape, ignored", msg);
            s.warn(pos, DiagCategory::Unsupported, msg);
        }
        if !s.db.rules.add_table(table) && !unsupported {
            let msg = format!("{}: rows are not strictly increasing, ignored", msg);
            s.warn(pos, DiagCategory::Validation, msg);
        }
        Some(())
    })
}

/// `antennaModels( "model" ... )`. Only the model names are kept.
fn antenna_models(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    let vals = env.eval_list(s, form, usize::MAX)?;
    let models: Vec<String> = vals
        .iter()
        .filter_map(|v| match v {
            Value::Str(name) => Some(name.clone()),
            Value::List(items) => items.first().and_then(Value::as_str).map(String::from),
            _ => None,
        })
        .collect();
    let group = s.db.rules.group_mut(&s.group);
    group.antenna_models.extend(models);
    Ok(Value::Nil)
}

/// Electrical attributes with dedicated lpp fields
#[derive(Debug, Clone, Copy)]
enum ElecSlot {
    Rsh,
    Rho,
    Thickness,
    Epsilon,
    Property,
}

/// Apply `(name layer value)` electrical entries, shared with the CDB `characterizationRules`
pub(crate) fn electrical_entry(s: &mut CdsSession, pos: &SourcePos, vals: &[Value]) -> Option<()> {
    let key = text(&vals[0])?;
    let layer = text(&vals[1])?;
    let slot = match key.as_str() {
        "sheetResistance" => ElecSlot::Rsh,
        "resistivity" => ElecSlot::Rho,
        "thickness" => ElecSlot::Thickness,
        "dielectricConstant" | "epsilon" => ElecSlot::Epsilon,
        _ => ElecSlot::Property,
    };
    let number = match slot {
        ElecSlot::Property => None,
        _ => Some(num(&vals[2])?),
    };
    let lpp = match s.drawing_lpp(pos, &layer) {
        Some(k) => k,
        None => return Some(()),
    };
    let attrs = &mut s.db.layers.lpp_mut(lpp)?.attrs;
    match slot {
        ElecSlot::Rsh => attrs.rsh = number,
        ElecSlot::Rho => attrs.rho = number,
        ElecSlot::Thickness => attrs.thickness = number,
        ElecSlot::Epsilon => attrs.epsilon = number,
        ElecSlot::Property => {
            attrs.properties.insert(key, vals[2].to_string());
        }
    }
    Some(())
}

/// `electrical( (name layer value) ... )`
fn electrical(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "electrical rule", electrical_entry)
}

/// `interconnect( (validLayers (layers...)) (validVias (vias...)) )`
fn interconnect(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 2, "interconnect", |s, pos, vals| {
        let key = text(&vals[0])?;
        let list = names(&vals[1])?;
        match key.as_str() {
            "validLayers" => s.db.rules.group_mut(&s.group).valid_layers = list,
            "validVias" => s.db.rules.group_mut(&s.group).valid_vias = list,
            other => {
                let msg = format!("interconnect `{}` is not supported", other);
                s.warn(pos, DiagCategory::Unsupported, msg);
            }
        }
        Some(())
    })
}

/// `routingGrids( (horizontalPitch|verticalPitch|horizontalOffset|verticalOffset layer value) ... )`.
/// Foundry grids land on the layers' routing attributes; other groups keep their own.
fn routing_grids(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "routing grid", |s, pos, vals| {
        let key = text(&vals[0])?;
        let layer = text(&vals[1])?;
        let value = num(&vals[2])?;
        let (dir, pitch) = match key.as_str() {
            "horizontalPitch" => (RouteDir::Horizontal, true),
            "verticalPitch" => (RouteDir::Vertical, true),
            "horizontalOffset" => (RouteDir::Horizontal, false),
            "verticalOffset" => (RouteDir::Vertical, false),
            _ => return None,
        };
        if s.group != FOUNDRY {
            if s.layers_defined(pos, &[&layer]) {
                let group = s.db.rules.group_mut(&s.group);
                group.routing_grids.push((key, layer, value));
            }
            return Some(());
        }
        let lpp = match s.drawing_lpp(pos, &layer) {
            Some(k) => k,
            None => return Some(()),
        };
        let attrs = &mut s.db.layers.lpp_mut(lpp)?.attrs;
        let routing = attrs.routing.get_or_insert_with(Default::default);
        routing.direction.get_or_insert(dir);
        match pitch {
            true => routing.pitch = Some(value),
            false => routing.offset = Some(value),
        }
        Some(())
    })
}

/// `extractMOS( "name" layers... )` and friends, recorded as [DeviceHint]s
fn device_hint(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    let vals = env.eval_list(s, form, usize::MAX)?;
    let kind = form.name().unwrap_or_default().to_string();
    let name = vals.iter().find_map(|v| match v {
        Value::Str(name) => Some(name.clone()),
        _ => None,
    });
    let layers = vals
        .iter()
        .filter_map(Value::as_str)
        .filter(|l| s.db.layers.find_layer(l).is_some())
        .map(String::from)
        .collect();
    s.db.devices.push(DeviceHint {
        kind,
        name,
        layers,
        text: form.to_string(),
    });
    Ok(Value::Nil)
}
