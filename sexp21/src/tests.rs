use super::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[test]
fn named_and_unnamed_lists() -> SexpResult<()> {
    let forms = parse_str(r#"techLayers( ("M1" 11 m1) ) (a b) foo ()"#)?;
    assert_eq!(forms.len(), 4);
    assert_eq!(forms[0].name(), Some("techLayers"));
    let entry = &forms[0].args()[0];
    assert_eq!(entry.name(), None);
    assert_eq!(entry.args()[0], Node::string("M1"));
    assert_eq!(entry.args()[1], Node::Number(dec("11")));
    assert_eq!(entry.args()[2], Node::ident("m1"));
    assert_eq!(forms[1], Node::unnamed(vec![Node::ident("a"), Node::ident("b")]));
    assert_eq!(forms[2], Node::ident("foo"));
    assert!(forms[3].is_nil());
    assert!(!forms[1].is_nil());
    assert!(!Node::named("x", vec![]).is_nil());
    Ok(())
}

#[test]
fn space_before_paren_is_not_a_name() -> SexpResult<()> {
    let forms = parse_str("foo (1 2)")?;
    assert_eq!(forms.len(), 2);
    assert_eq!(forms[0], Node::ident("foo"));
    assert_eq!(forms[1].args().len(), 2);
    Ok(())
}

#[test]
fn numbers_comments_quotes_and_strings() -> SexpResult<()> {
    let src = r#"
    ; line comment
    x( -1.5 +2 .25 1e-3 2.5E2 'sameNet /* block
    comment */ "a \"q\" \\ b" )
    "#;
    let forms = parse_str(src)?;
    assert_eq!(forms.len(), 1);
    let args = forms[0].args();
    assert_eq!(args[0].as_number(), Some(dec("-1.5")));
    assert_eq!(args[1].as_number(), Some(dec("2")));
    assert_eq!(args[2].as_number(), Some(dec("0.25")));
    assert_eq!(args[3].as_number(), Some(dec("0.001")));
    assert_eq!(args[4].as_number(), Some(dec("250")));
    assert_eq!(args[5], Node::ident("sameNet"));
    assert_eq!(args[6].as_str(), Some("a \"q\" \\ b"));
    // Rendering re-escapes
    assert_eq!(args[6].to_string(), r#""a \"q\" \\ b""#);
    Ok(())
}

#[test]
fn operators() -> SexpResult<()> {
    let forms = parse_str("pitch = 0.2 (w = 3)")?;
    match &forms[0] {
        Node::Operator { op, lhs, args } => {
            assert_eq!(op, "=");
            assert_eq!(**lhs, Node::ident("pitch"));
            assert_eq!(args[0].as_number(), Some(dec("0.2")));
        }
        other => panic!("Expected operator, got {:?}", other),
    }
    assert!(matches!(forms[1].args()[0], Node::Operator { .. }));
    Ok(())
}

#[test]
fn syntax_errors() {
    let e = parse_str("techLayers( (\"M1\" 11)").unwrap_err();
    assert!(e.is_syntax());
    match e {
        SexpError::Parse { msg, state } => {
            assert_eq!(msg, "Unclosed list");
            assert_eq!(state.ctx, vec!["techLayers".to_string()]);
        }
        other => panic!("Unexpected {:?}", other),
    }
    assert!(parse_str("a )").is_err());
    assert!(parse_str("x( \"open )").is_err());
    assert!(parse_str("x( 1.2.3 )").is_err());
    assert!(parse_str("/* never closed").is_err());
}

#[test]
fn pretty_printing() -> SexpResult<()> {
    let forms = parse_str(r#"techLayers( ("Metal1" 11 "m1") ("Metal2" 12 "m2") )"#)?;
    assert_eq!(forms[0].pretty(200), r#"techLayers(("Metal1" 11 "m1") ("Metal2" 12 "m2"))"#);
    let pretty = forms[0].pretty(20);
    assert_eq!(
        pretty,
        "techLayers(\n  (\"Metal1\" 11 \"m1\")\n  (\"Metal2\" 12 \"m2\")\n)"
    );
    assert_eq!(parse_str(&pretty)?, forms);
    Ok(())
}

#[test]
fn arena_recycles_slots() {
    let mut arena = Arena::default();
    let keep = arena.new_temp_node(Node::ident("keep"));
    assert!(arena.persist(keep));
    let mark = arena.mark();
    let a = arena.new_temp_node(Node::ident("a"));
    let b = arena.new_temp_copy(&Node::unnamed(vec![Node::ident("b")]));
    assert_eq!(arena.live(), 3);
    assert_eq!(arena.recycle(mark), 2);
    assert_eq!(arena.live(), 1);
    assert!(arena.get(a).is_none());
    assert!(arena.get(b).is_none());
    assert_eq!(arena.peak(), 3);
    // Freed slots are reused, and stale keys stay dead
    let c = arena.new_temp_node(Node::ident("c"));
    assert!(arena.get(a).is_none());
    assert_eq!(*arena.get(c).unwrap(), Node::ident("c"));
    assert_eq!(*arena.get(keep).unwrap(), Node::ident("keep"));
}

/// Test context: records what handlers see
#[derive(Default)]
struct Ctx {
    layers: Vec<(String, Decimal)>,
    warnings: Vec<String>,
}

fn layers_handler(env: &mut Environment<Ctx>, ctx: &mut Ctx, form: &Node) -> SexpResult<Value> {
    for entry in form.args() {
        let vals = env.eval_list(ctx, entry, 2)?;
        if vals.len() < 2 {
            env.warn(ctx, &format!("Malformed layer `{}`", entry));
            continue;
        }
        match (vals[0].as_str(), vals[1].as_number()) {
            (Some(name), Some(num)) => ctx.layers.push((name.to_string(), num)),
            _ => env.warn(ctx, &format!("Malformed layer `{}`", entry)),
        }
    }
    Ok(Value::Nil)
}

fn test_env() -> Environment<Ctx> {
    let mut env = Environment::new();
    env.register_handler("techLayers", layers_handler);
    env.register_dispatcher("layerDefinitions");
    env.register_handler("failing", |env: &mut Environment<Ctx>, _: &mut Ctx, _: &Node| -> SexpResult<Value> {
        env.fail("always fails")
    });
    env.register_function("double", |env: &mut Environment<Ctx>, ctx: &mut Ctx, form: &Node| -> SexpResult<Value> {
        let vals = env.eval_list(ctx, form, 1)?;
        match vals.first().and_then(|v| v.as_number()) {
            Some(d) => Ok(Value::Number(d * Decimal::from(2))),
            None => env.fail("double needs a number"),
        }
    });
    env.set_warn_sink(Rc::new(|ctx: &mut Ctx, pos: &SourcePos, msg: &str| {
        ctx.warnings.push(format!("{}: {}", pos.line, msg))
    }));
    env
}

#[test]
fn dispatch_and_malformed_tolerance() -> SexpResult<()> {
    let mut env = test_env();
    let mut ctx = Ctx::default();
    let src = r#"
    layerDefinitions(
        techLayers( ("M1" 11) ("M2") ("M3" double(6)) )
        unknownThing( 1 2 3 )
        failing()
    )
    "#;
    env.read_eval(&mut ctx, src, &[], false)?;
    assert_eq!(
        ctx.layers,
        vec![("M1".to_string(), dec("11")), ("M3".to_string(), dec("12"))]
    );
    // One malformed entry and one failing handler; unknown forms are quiet
    assert_eq!(ctx.warnings.len(), 2);
    assert!(ctx.warnings[0].starts_with("2: Malformed layer"));

    env.verbose = true;
    env.read_eval(&mut ctx, "layerDefinitions( unknownThing() )", &[], false)?;
    assert_eq!(ctx.warnings.len(), 3);

    // Stopping on errors passes handler failures up
    assert!(env.read_eval(&mut ctx, "failing()", &[], true).is_err());
    // Syntax errors always abort
    assert!(env.read_eval(&mut ctx, "techLayers( (\"M9\" 9)", &[], false).is_err());
    Ok(())
}

#[test]
fn variables_procedures_and_let() -> SexpResult<()> {
    let mut env = test_env();
    let mut ctx = Ctx::default();
    let src = r#"
    base = 20
    procedure( addLayer(name num)
        techLayers( (name num) )
    )
    addLayer("M1" base)
    let( ((base 30) other)
        addLayer("M2" base)
        base = 31
        addLayer("M3" base)
    )
    addLayer("M4" base)
    addLayer("M5")
    "#;
    env.read_eval(&mut ctx, src, &[], false)?;
    let names: Vec<(&str, Decimal)> = ctx.layers.iter().map(|(n, d)| (n.as_str(), *d)).collect();
    assert_eq!(
        names,
        vec![
            ("M1", dec("20")),
            ("M2", dec("30")),
            ("M3", dec("31")),
            ("M4", dec("20")),
        ]
    );
    // Too few arguments to a procedure is reported, not fatal
    assert_eq!(ctx.warnings.len(), 1);
    assert_eq!(env.global("base"), Some(&Value::Number(dec("20"))));
    // Only the procedure body outlives its top-level form
    assert_eq!(env.arena().live(), 1);
    Ok(())
}

#[test]
fn local_scopes_nest() {
    let mut env: Environment<Ctx> = Environment::new();
    env.set_global("x", Value::Number(dec("1")));
    let mut vars = HashMap::new();
    vars.insert("x".to_string(), Value::Number(dec("2")));
    env.push_local_vars(vars);
    env.push_local_vars(HashMap::new());
    assert_eq!(env.lookup("x"), Some(&Value::Number(dec("2"))));
    env.pop_local_vars();
    env.pop_local_vars();
    assert_eq!(env.lookup("x"), Some(&Value::Number(dec("1"))));
    assert_eq!(env.lookup("y"), None);
}

#[test]
fn eval_list_counts() -> SexpResult<()> {
    let mut env: Environment<Ctx> = Environment::new();
    let mut ctx = Ctx::default();
    let node = &parse_str("(1 \"two\" three nil t)")?[0];
    let vals = env.eval_list(&mut ctx, node, 10)?;
    assert_eq!(vals.len(), 5);
    assert_eq!(vals[2], Value::Symbol("three".into()));
    assert_eq!(vals[3], Value::Nil);
    assert_eq!(vals[4].as_bool(), Some(true));
    assert_eq!(env.eval_list(&mut ctx, node, 2)?.len(), 2);
    Ok(())
}

#[test]
fn includes_and_cycles() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("inner.il"), "techLayers( (\"M7\" 7) )")?;
    std::fs::write(
        dir.path().join("outer.il"),
        "include(\"inner.il\")\ntechLayers( (\"M8\" 8) )",
    )?;
    std::fs::write(dir.path().join("loop_a.il"), "include(\"loop_b.il\")")?;
    std::fs::write(dir.path().join("loop_b.il"), "include(\"loop_a.il\")")?;

    let mut env = test_env();
    let mut ctx = Ctx::default();
    env.read_eval_file(&mut ctx, dir.path().join("outer.il"), false)?;
    let names: Vec<&str> = ctx.layers.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["M7", "M8"]);

    // Search-path includes from text
    let mut env = test_env();
    let search: Vec<PathBuf> = vec![dir.path().to_path_buf()];
    env.read_eval(&mut ctx, "include(\"inner.il\")", &search, false)?;
    assert_eq!(ctx.layers.len(), 3);

    // Cycles are reported rather than recursing forever
    let mut env = test_env();
    env.read_eval_file(&mut ctx, dir.path().join("loop_a.il"), false)?;
    assert!(ctx.warnings.iter().any(|w| w.contains("Include cycle")));
    assert!(env
        .read_eval_file(&mut ctx, dir.path().join("loop_a.il"), true)
        .is_err());
    Ok(())
}
