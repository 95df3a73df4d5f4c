//!
//! # Legacy CDB Technology-File Grammar
//!
//! The pre-OpenAccess technology dialect. Layer definitions share the handlers of
//! [crate::tech]; rules arrive through `physicalRules`, `electricalRules` and `prRules`.
//! Compactor, symbolic-device and editor rule sections are accepted and ignored.
//!

// Workspace
use sexp21::{Node, SexpResult, Value};
use techdb21::{TechDb, TechResult, FOUNDRY};

// Local
use crate::session::{self, for_entries, stub, text, CdsEnv, CdsSession, Source};
use crate::tech;
use crate::ReadOptions;

/// Accepted and ignored
const STUBS: &[&str] = &[
    "compactorRules",
    "symContactDevice",
    "symEnhancementDevice",
    "symDepletionDevice",
    "symPinDevice",
    "symRulesDevice",
    "ruleContactDevice",
    "cdsViaDevice",
    "leRules",
    "lxRules",
    "prViaTypes",
    "prStackVias",
];

/// Read legacy technology content from `src` into `db`
pub(crate) fn read(db: &mut TechDb, src: Source, opts: &ReadOptions) -> TechResult<()> {
    db.layers.seed_reserved();
    let rv = session::run(db, src, opts, register);
    tech::post_process(db);
    rv
}

/// Register the legacy handler set
pub fn register(env: &mut CdsEnv) {
    for name in [
        "controls",
        "layerDefinitions",
        "physicalRules",
        "electricalRules",
        "prRules",
    ] {
        env.register_dispatcher(name);
    }
    tech::register_layer_defs(env);
    env.register_handler("mfgGridResolution", tech::mfg_grid_resolution);
    env.register_handler("spacingRules", spacing_rules);
    env.register_handler("orderedSpacingRules", ordered_spacing_rules);
    env.register_handler("characterizationRules", characterization_rules);
    env.register_handler("prRoutingLayers", tech::routing_directions);
    env.register_handler("prMastersliceLayers", masterslice_layers);
    for name in STUBS {
        env.register_handler(*name, stub);
    }
}

fn rules(env: &mut CdsEnv, s: &mut CdsSession, form: &Node, ordered: bool) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "spacing rule", |s, pos, vals| {
        let rule = tech::parse_rule(vals, FOUNDRY, ordered)?;
        tech::add_rule(s, pos, rule);
        Some(())
    })
}

/// `spacingRules( (rule layer1 [layer2] value) ... )`
fn spacing_rules(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    rules(env, s, form, false)
}

/// `orderedSpacingRules( ... )`, where layer order is significant
fn ordered_spacing_rules(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    rules(env, s, form, true)
}

/// `characterizationRules( (name layer value) ... )`, as in the `electrical` constraints
fn characterization_rules(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    for_entries(env, s, form, 3, "characterization rule", tech::electrical_entry)
}

/// `prMastersliceLayers( "layer" ... )`, flagged with the `masterslice` property
fn masterslice_layers(env: &mut CdsEnv, s: &mut CdsSession, form: &Node) -> SexpResult<Value> {
    let vals = env.eval_list(s, form, usize::MAX)?;
    let layers = match vals.iter().map(text).collect::<Option<Vec<_>>>() {
        Some(layers) => layers,
        None => {
            s.malformed(env.pos(), form, "masterslice layers");
            return Ok(Value::Nil);
        }
    };
    let pos = env.pos().clone();
    for layer in layers {
        if let Some(lpp) = s.drawing_lpp(&pos, &layer) {
            if let Some(entry) = s.db.layers.lpp_mut(lpp) {
                entry.attrs.properties.insert("masterslice".into(), "t".into());
            }
        }
    }
    Ok(Value::Nil)
}
