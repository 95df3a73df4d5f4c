use super::*;
use rust_decimal::Decimal;
use std::cell::Cell;
use std::rc::Rc;
use std::str::FromStr;
use techdb21::{
    DiagCategory, Fill, LayerKind, Lpp, LppKey, Outline, Pixmap, Rgb, RouteDir, XyPair, DRAWING,
    FOUNDRY,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}
fn resource(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("resources").join(name)
}
/// Options without process-environment lookups
fn no_env() -> DslOptions {
    DslOptionsBuilder::default().use_env(false).build().unwrap()
}
fn drawing<'a>(db: &'a TechDb, layer: &str) -> Option<&'a Lpp> {
    db.layers.find_lpp(layer, DRAWING).and_then(|k| db.layers.lpp(k))
}
/// Dispatch each of `lines`, requiring every one to match
fn dispatch_all(reader: &mut DslReader, lines: &[&str]) {
    for line in lines {
        assert_eq!(reader.dispatch_line(line), LineStatus::Matched, "{}", line);
    }
}

#[test]
fn layer_rgb_filled() -> TechResult<()> {
    let mut reader = DslReader::new(TechDb::new(), no_env());
    dispatch_all(&mut reader, &["Layer M1", "Rgb 200 30 30", "Filled Y"]);
    reader.close()?;
    let db = reader.into_db();
    let m1 = drawing(&db, "M1").unwrap();
    assert_eq!(m1.display.color, Some(Rgb::new(200, 30, 30)));
    assert!(m1.display.fill.filled);
    assert_eq!(m1.display.fill.pattern, None);
    assert_eq!(m1.display.fill.outline, Outline::Off);
    assert_eq!(m1.kind, LayerKind::Physical);
    // Opened without a number
    let layer = db.layers.find_layer("M1").unwrap();
    assert_eq!(db.layers.layer(layer).unwrap().num, layer::AUTO_LAYER_NUM);
    assert!(db.diag.is_empty());
    Ok(())
}

#[test]
fn sample_file() -> TechResult<()> {
    let mut db = TechDb::new();
    read_dsl(&mut db, resource("sample.tech"), &no_env())?;

    let info = &db.info;
    assert_eq!(info.name.as_deref(), Some("demo18"));
    assert_eq!(info.vendor.as_deref(), Some("Acme"));
    assert_eq!(info.version.as_deref(), Some("1.2"));
    assert_eq!(info.lib_path, vec!["/lib/a".to_string(), "/lib/b".to_string()]);
    assert_eq!(info.mfg_grid, Some(dec("0.005")));
    assert_eq!(info.dbu_per_micron, Some(1000));
    assert_eq!(info.scripts.get("init").map(String::as_str), Some("puts \"hello $(world)\""));

    let dummy = db.layers.find_purpose("dummy").unwrap();
    assert_eq!(db.layers.purpose(dummy).unwrap().num, 300);

    let names: Vec<&str> = db.layers.lpps().map(|(_, l)| l.name.as_str()).collect();
    assert_eq!(names, ["NW", "M1", "M2", "V1", "M1andM2"]);

    let nw = drawing(&db, "NW").unwrap();
    assert_eq!(db.layers.find_layer("nw"), Some(nw.layer));
    assert_eq!(nw.description.as_deref(), Some("n-well eval(1+1)"));
    assert_eq!(nw.display.color, Some(Rgb::new(0, 128, 128)));
    assert_eq!(nw.display.fill.outline, Outline::Plain);
    let stipple = get_pmap("|X.X.| |.X.X|")?;
    assert_eq!(nw.display.fill.pattern.as_ref(), Some(&stipple));

    let m1 = drawing(&db, "M1").unwrap();
    assert_eq!(m1.display.fill, Fill::solid());
    let routing = m1.attrs.routing.as_ref().unwrap();
    assert_eq!(routing.direction, Some(RouteDir::Horizontal));
    assert_eq!(routing.pitch, Some(dec("0.2")));
    assert_eq!(m1.attrs.wire_width, Some(dec("0.1")));
    assert!(m1.attrs.conductor);
    assert_eq!(db.rules.find_rule("minWidth", "M1", None).unwrap().value, dec("0.1"));
    assert_eq!(db.rules.find_rule("minSpacing", "M1", None).unwrap().value, dec("0.15"));
    let table = db.rules.find_table("minSpacing", "M1").unwrap();
    assert!(!table.ignore);
    assert_eq!(table.lookup(dec("1.5"), None), Some(dec("0.2")));

    // Included with bindings
    let m2 = drawing(&db, "M2").unwrap();
    let layer = db.layers.layer(m2.layer).unwrap();
    assert_eq!(layer.num, 13);
    assert_eq!(m2.display.color, Some(Rgb::new(30, 30, 200)));
    assert!(!m2.display.fill.filled);
    assert_eq!(m2.display.fill.outline, Outline::Plain);
    assert_eq!(m2.attrs.routing.as_ref().unwrap().direction, Some(RouteDir::Vertical));
    assert!(db.layers.find_layer("M3").is_none());

    let v1 = drawing(&db, "V1").unwrap();
    assert_eq!(v1.attrs.via, Some(("M1".to_string(), "M2".to_string())));
    assert_eq!(v1.display.fill.pattern.as_ref(), Some(&stipple));
    assert!(v1.display.fill.cut);
    assert_eq!(v1.attrs.gds, Some((12, 0)));
    let enc = db.rules.find_rule("minEnclosure", "V1", Some("M1")).unwrap();
    assert!(enc.ordered);
    assert_eq!(enc.group, FOUNDRY);

    let via = db.vias.std_via("M1_M2").unwrap();
    assert_eq!((via.layer1.as_str(), via.cut.as_str(), via.layer2.as_str()), ("M1", "V1", "M2"));
    assert_eq!(via.cut_width, dec("0.1"));
    assert_eq!(via.resistance, Some(dec("5.0")));
    assert_eq!(via.enc1, XyPair::new(dec("0.02"), Decimal::ZERO));
    assert_eq!(via.cut_space.x, dec("0.15"));
    assert_eq!((via.rows, via.cols), (1, 1));

    let derived = drawing(&db, "M1andM2").unwrap();
    assert_eq!(derived.kind, LayerKind::Derived);
    assert_eq!(derived.derived.as_ref().unwrap().expr_string, "M1 and M2");

    // M2's wire is wider than its pitch, and one keyword is unknown
    assert_eq!(db.diag.count(DiagCategory::Validation), 1);
    assert_eq!(db.diag.count(DiagCategory::UnknownKeyword), 1);
    assert_eq!(db.diag.len(), 2);
    Ok(())
}

#[test]
fn pixmap_encodings() -> TechResult<()> {
    let masks = get_pmap("|XX..| |..XX|")?;
    let hex = get_pmap("0xc 0x3")?;
    let sized = get_pmap("x=4 y=2 c0 30")?;
    assert_eq!(masks, hex);
    assert_eq!(masks, sized);
    assert_eq!((masks.width, masks.height), (4, 2));
    // Row-major, least-significant bit first
    assert_eq!(masks.data, vec![0b0011, 0b1100]);
    assert_eq!(get_pmap("| X |")?, Pixmap::from_rows(&[vec![false, true, false]])?);

    assert!(get_pmap("|XX..| 0x3").is_err());
    assert!(get_pmap("0xc |..XX|").is_err());
    assert!(get_pmap("x=4 y=1 c |..XX|").is_err());
    assert!(get_pmap("|XX| |XXX|").is_err());
    assert!(get_pmap("0xc 0x03").is_err());
    assert!(get_pmap("x=8 y=1 c").is_err());
    assert!(get_pmap("|XX").is_err());
    assert!(get_pmap("0xc O").is_err());
    Ok(())
}

#[test]
fn fill_specs() -> TechResult<()> {
    let unfilled = get_filled("n")?;
    assert!(!unfilled.filled);
    assert_eq!(unfilled.outline, Outline::Plain);
    assert_eq!(get_filled("N n")?.outline, Outline::Off);

    let fat = get_filled("y F c")?;
    assert!(fat.filled && fat.cut);
    assert_eq!(fat.outline, Outline::Fat);

    // All-set patterns are solid
    assert_eq!(get_filled("|XX| |XX|")?, Fill::solid());
    let stippled = get_filled("|X.| |.X| o")?;
    assert!(stippled.pattern.is_some());
    assert_eq!(stippled.outline, Outline::Plain);
    let sized = get_filled("x=2 y=2 8 4 C")?;
    assert_eq!(sized.pattern, stippled.pattern);
    assert!(sized.cut);

    assert!(get_filled("y Q").is_err());
    assert!(get_filled("").is_err());
    Ok(())
}

#[test]
fn conditionals() -> TechResult<()> {
    let src = r#"
#define WIDE
#ifdef WIDE
Set W 0.3
#else
Set W 0.1
#endif
#ifndef WIDE
Technology narrow
#ifdef WIDE
Technology nested
#endif
#else
Technology wide
#endif
Layer M1 1
WireWidth $(W)
"#;
    let mut db = TechDb::new();
    read_dsl_str(&mut db, src, &no_env())?;
    assert_eq!(db.info.name.as_deref(), Some("wide"));
    assert_eq!(drawing(&db, "M1").unwrap().attrs.wire_width, Some(dec("0.3")));
    assert!(db.diag.is_empty());

    let mut db = TechDb::new();
    let rv = read_dsl_str(&mut db, "#endif\n", &no_env());
    assert!(matches!(rv, Err(TechError::Syntax { line: Some(1), .. })));
    let rv = read_dsl_str(&mut db, "#ifdef X\nTechnology t\n", &no_env());
    assert!(matches!(rv, Err(TechError::Syntax { .. })));
    let rv = read_dsl_str(&mut db, "#ifdef X\n#else\n#else\n#endif\n", &no_env());
    assert!(matches!(rv, Err(TechError::Syntax { line: Some(3), .. })));
    Ok(())
}

#[test]
fn single_lines() -> TechResult<()> {
    let mut reader = DslReader::new(TechDb::new(), no_env());
    // Macros work line by line, block conditionals do not
    dispatch_all(&mut reader, &["# comment", "", "#define MET M1", "Layer MET 7"]);
    assert!(reader.db().layers.find_layer("M1").is_some());
    match reader.dispatch_line("#ifdef MET") {
        LineStatus::Error(msg) => assert!(msg.starts_with("line 5:"), "{}", msg),
        other => panic!("Expected an error, got {:?}", other),
    }
    assert_eq!(reader.dispatch_line("Hardcopy ps"), LineStatus::NoMatch);
    // Verbatim keywords are not spliced
    dispatch_all(&mut reader, &["Description width eval(2*3)", "Pitch eval(2*0.3)"]);
    let db = reader.into_db();
    let m1 = drawing(&db, "M1").unwrap();
    assert_eq!(m1.description.as_deref(), Some("width eval(2*3)"));
    assert_eq!(m1.attrs.routing.as_ref().unwrap().pitch, Some(dec("0.6")));
    Ok(())
}

#[test]
fn includes() -> TechResult<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("inner.tech"), "Layer $(L) 5\nRgb 1 2 3\n")?;
    std::fs::write(dir.path().join("outer.tech"), "#include \"inner.tech\" L=M5\n")?;
    let mut reader = DslReader::new(TechDb::new(), no_env());
    reader.read_file(dir.path().join("outer.tech"))?;
    // Bindings are local to the included file
    assert_eq!(reader.session().vars.get("L"), None);
    let db = reader.into_db();
    let m5 = drawing(&db, "M5").unwrap();
    assert_eq!(db.layers.layer(m5.layer).unwrap().num, 5);
    assert_eq!(m5.display.color, Some(Rgb::new(1, 2, 3)));

    // Found along the search path
    let opts = DslOptionsBuilder::default()
        .use_env(false)
        .search_path(vec![dir.path().to_path_buf()])
        .build()
        .unwrap();
    let mut db = TechDb::new();
    read_dsl_str(&mut db, "#include inner.tech L=M6\n", &opts)?;
    assert!(drawing(&db, "M6").is_some());

    std::fs::write(dir.path().join("a.tech"), "#include b.tech\n")?;
    std::fs::write(dir.path().join("b.tech"), "#include a.tech\n")?;
    let mut db = TechDb::new();
    match read_dsl(&mut db, dir.path().join("a.tech"), &no_env()) {
        Err(TechError::Syntax { msg, .. }) => assert!(msg.contains("cycle"), "{}", msg),
        other => panic!("Expected an include-cycle error, got {:?}", other),
    }
    let rv = read_dsl_str(&mut db, "#include missing.tech\n", &no_env());
    assert!(matches!(rv, Err(TechError::Io { .. })));
    Ok(())
}

#[test]
fn variables() {
    let mut vars = TechVars::new(false);
    vars.set("a", "1");
    vars.set("name", "b");
    vars.set("b2", "deep");
    assert_eq!(vars.substitute("x $(a) y").unwrap(), "x 1 y");
    assert_eq!(vars.substitute("$($(name)2)").unwrap(), "deep");

    vars.push_scope();
    vars.set_local("a", "2");
    assert_eq!(vars.get("a").as_deref(), Some("2"));
    vars.pop_scope();
    assert_eq!(vars.get("a").as_deref(), Some("1"));
    assert!(vars.unset("a"));
    assert!(vars.substitute("$(a)").is_err());
    assert!(vars.substitute("$(b2").is_err());

    vars.set("loop", "$(loop)");
    assert!(vars.substitute("$(loop)").is_err());

    std::env::set_var("TECHDSL21_TEST_VAR", "from-env");
    assert_eq!(vars.get("TECHDSL21_TEST_VAR"), None);
    vars.use_env = true;
    assert_eq!(vars.substitute("$(TECHDSL21_TEST_VAR)").unwrap(), "from-env");
}

#[test]
fn inline_eval() {
    assert_eq!(eval::splice("MinSpace eval(0.1 * 1.5)").unwrap(), "MinSpace 0.15");
    assert_eq!(eval::splice("eval(eval(2) * 3) eval(-1 + 0.5)").unwrap(), "6 -0.5");
    assert_eq!(eval::splice("eval(max(1, sqrt(16), 3) / 2)").unwrap(), "2");
    assert_eq!(eval::splice("medieval(3)").unwrap(), "medieval(3)");
    assert_eq!(eval::evaluate("floor(2.7) + ceil(0.2) + round(1.5) + abs(-1)").unwrap(), 6.0);
    assert_eq!(eval::evaluate("1e-3 * 1000").unwrap(), 1.0);
    assert!(eval::splice("eval(1 / 0)").is_err());
    assert!(eval::splice("eval(1 +").is_err());
    assert!(eval::evaluate("nope(1)").is_err());
    assert_eq!(eval::format_value(-0.0), "0");
}

#[test]
fn drc_keywords() -> TechResult<()> {
    let mut reader = DslReader::new(TechDb::new(), no_env());
    match reader.dispatch_line("MinWidth 0.1") {
        LineStatus::Error(msg) => assert!(msg.contains("outside a layer block"), "{}", msg),
        other => panic!("Expected an error, got {:?}", other),
    }
    dispatch_all(
        &mut reader,
        &["Layer M1 1", "MinSpaceTo M9 0.2", "MinArea 0.05", "MinSpaceTable 1.0 0.2 0.5 0.1"],
    );
    assert!(!reader.dispatch_line("MinSpaceTo 0.2").is_match());
    reader.close()?;
    let db = reader.into_db();
    let rule = db.rules.find_rule("minSpacing", "M1", Some("M9")).unwrap();
    assert!(!rule.ordered);
    assert_eq!(db.rules.find_rule("minArea", "M1", None).unwrap().value, dec("0.05"));
    assert!(db.rules.find_table("minSpacing", "M1").unwrap().ignore);
    assert_eq!(db.diag.count(DiagCategory::Unresolved), 1);
    assert_eq!(db.diag.count(DiagCategory::Validation), 1);
    Ok(())
}

#[test]
fn std_via_keywords() -> TechResult<()> {
    let mut reader = DslReader::new(TechDb::new(), no_env());
    dispatch_all(&mut reader, &["DefineLayer M1 1", "DefineLayer V1 2", "DefineLayer M2 3"]);
    dispatch_all(&mut reader, &["StandardVia VA M1 V1 M2 w=0.1 h=0.2 rows=2 cols=3 ox=0.5"]);
    let failures = [
        "StandardVia VA M1 V1 M2 w=0.1 h=0.1",
        "StandardVia VB M1 V1 M2 w=0.1",
        "StandardVia VC M1 V9 M2 w=0.1 h=0.1",
        "StandardVia VD M1 V1 M2 w=0.1 h=0.1 q=1",
        "StandardVia VE M1 V1",
    ];
    for line in failures {
        assert!(!reader.dispatch_line(line).is_match(), "{}", line);
    }
    let via = reader.db().vias.std_via("VA").unwrap();
    assert_eq!((via.rows, via.cols), (2, 3));
    assert_eq!(via.orig_off, XyPair::new(dec("0.5"), Decimal::ZERO));
    assert_eq!(reader.db().vias.std_vias().len(), 1);
    Ok(())
}

#[test]
fn script_blocks() -> TechResult<()> {
    let mut db = TechDb::new();
    read_dsl_str(&mut db, "Script a\n  line one\n#not a directive\nendscript\n", &no_env())?;
    assert_eq!(
        db.info.scripts.get("a").map(String::as_str),
        Some("  line one\n#not a directive")
    );

    let mut db = TechDb::new();
    read_dsl_str(&mut db, "Script open\nnever closed\n", &no_env())?;
    assert!(db.info.scripts.is_empty());
    assert_eq!(db.diag.count(DiagCategory::Malformed), 1);

    let opts = DslOptionsBuilder::default()
        .use_env(false)
        .stop_on_error(true)
        .build()
        .unwrap();
    assert!(read_dsl_str(&mut TechDb::new(), "EndScript\n", &opts).is_err());
    Ok(())
}

#[test]
fn line_errors() -> TechResult<()> {
    let src = "Rgb 1 2 3\nLayer M1 1\nRgb 1 2\nFilled |X| 0x1\nPacket nothere\nUnknownThing\n";
    let mut db = TechDb::new();
    read_dsl_str(&mut db, src, &no_env())?;
    assert_eq!(db.diag.count(DiagCategory::Malformed), 3);
    assert_eq!(db.diag.count(DiagCategory::UnknownKeyword), 1);
    let lines: Vec<Option<usize>> = db.diag.entries().iter().map(|d| d.line).collect();
    assert_eq!(lines, [Some(1), Some(3), Some(4), Some(6)]);
    // Packets are resolved later, if ever
    assert_eq!(db.drain_deferred().as_deref().map(|r| r.contains("nothere")), Some(true));

    let opts = DslOptionsBuilder::default()
        .use_env(false)
        .stop_on_error(true)
        .build()
        .unwrap();
    let rv = read_dsl_str(&mut TechDb::new(), src, &opts);
    assert!(matches!(rv, Err(TechError::Syntax { line: Some(1), .. })));
    Ok(())
}

#[test]
fn finalize_callback() -> TechResult<()> {
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let mut reader = DslReader::new(TechDb::new(), no_env());
    reader.set_finalize(move |db: &TechDb, lpp: LppKey| {
        counter.set(counter.get() + 1);
        match db.layers.lpp(lpp) {
            Some(l) if l.display.color.is_none() => Err(format!("Layer {} has no color", l.name)),
            _ => Ok(()),
        }
    });
    reader.read_str("Layer A 1\nRgb 1 1 1\nLayer B 2\nLayer C 3\nVia A Z\nRgb 2 2 2\n")?;
    assert_eq!(calls.get(), 3);
    let db = reader.into_db();
    let problems: Vec<&str> = db
        .diag
        .entries()
        .iter()
        .filter(|d| d.category == DiagCategory::Validation)
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(problems, ["Layer B has no color", "Via layer C joins unknown layer Z"]);
    Ok(())
}

/// Records `Hardcopy` driver lines
#[derive(Default)]
struct Hardcopy {
    seen: Rc<Cell<usize>>,
}
impl KeywordDispatch for Hardcopy {
    fn dispatch(&mut self, _s: &mut DslSession, keyword: &str, args: &str) -> LineStatus {
        if !keyword.eq_ignore_ascii_case("Hardcopy") {
            return LineStatus::NoMatch;
        }
        if args.is_empty() {
            return LineStatus::error("Hardcopy requires a driver");
        }
        self.seen.set(self.seen.get() + 1);
        LineStatus::Matched
    }
}

#[test]
fn custom_dispatcher() -> TechResult<()> {
    let hardcopy = Hardcopy::default();
    let seen = hardcopy.seen.clone();
    let mut reader = DslReader::bare(TechDb::new(), no_env());
    reader.add_dispatcher(hardcopy);
    reader.read_str("HARDCOPY postscript\nHardcopy\nLayer M1 1\nMinWidth 0.1\n")?;
    assert_eq!(seen.get(), 1);
    let db = reader.into_db();
    assert_eq!(db.diag.count(DiagCategory::Malformed), 1);
    // No rule keywords without the built-in extensions
    assert_eq!(db.diag.count(DiagCategory::UnknownKeyword), 1);
    assert!(db.rules.rules().is_empty());
    Ok(())
}
