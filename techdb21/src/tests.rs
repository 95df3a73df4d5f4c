use super::*;
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(s: &str) -> TechDecimal {
    Decimal::from_str(s).unwrap()
}

#[test]
fn layers_by_name_and_number() -> TechResult<()> {
    let mut db = LayerDb::default();
    db.seed_reserved();
    let m1 = db.add_layer("M1", 11, Some("m1".into()))?;
    assert_eq!(db.add_layer("M1", 11, None)?, m1);
    assert!(db.add_layer("M1", 12, None).is_err());
    assert!(db.add_layer("Mx", 11, None).is_err());
    assert_eq!(db.find_layer("M1"), Some(m1));
    assert_eq!(db.find_layer("m1"), Some(m1));
    assert_eq!(db.find_layer_num(11), Some(m1));
    db.add_alias("metal1", "M1")?;
    assert_eq!(db.find_layer("metal1"), Some(m1));
    assert!(db.add_alias("bogus", "M9").is_err());

    let drawing = db.drawing()?;
    assert_eq!(db.purpose(drawing).unwrap().num, DRAWING_NUM);
    let lpp = db.add_lpp(m1, drawing)?;
    assert_eq!(db.add_lpp(m1, drawing)?, lpp);
    assert_eq!(db.lpp(lpp).unwrap().name, "M1");
    assert_eq!(db.find_lpp_num(11, DRAWING_NUM), Some(lpp));
    assert_eq!(db.find_lpp_name("M1"), Some(lpp));

    let pin = db.find_purpose("pin").unwrap();
    let m1pin = db.add_lpp(m1, pin)?;
    assert_eq!(db.lpp(m1pin).unwrap().name, "M1:pin");
    assert_eq!(db.find_lpp_name("M1:pin"), Some(m1pin));
    assert_eq!(db.lpps_on(m1).count(), 2);
    Ok(())
}

#[test]
fn seeding_is_idempotent() -> TechResult<()> {
    let mut db = LayerDb::default();
    db.add_layer("text", 233, None)?;
    db.seed_reserved();
    let nlayers = db.layers().count();
    let npurposes = db.purposes().count();
    db.seed_reserved();
    assert_eq!(db.layers().count(), nlayers);
    assert_eq!(db.purposes().count(), npurposes);
    // User definitions take precedence over reserved ones
    let text = db.find_layer("text").unwrap();
    assert!(!db.layer(text).unwrap().reserved);
    assert!(db.layer(db.find_layer("prBoundary").unwrap()).unwrap().reserved);
    Ok(())
}

#[test]
fn reindex_after_dump() -> TechResult<()> {
    let mut db = TechDb::new();
    db.layers.add_layer("M2", 12, None)?;
    db.display.add_color("red", ColorDef { rgb: Rgb::new(255, 0, 0), blink: false });
    let s = tech21utils::SerializationFormat::Json.to_string(&db)?;
    let mut db2: TechDb = tech21utils::SerializationFormat::Json.from_str(&s)?;
    assert_eq!(db2.layers.find_layer("M2"), None);
    db2.reindex();
    assert!(db2.layers.find_layer("M2").is_some());
    assert_eq!(db2.display.color_name(&Rgb::new(255, 0, 0)), Some("red"));
    Ok(())
}

#[test]
fn canonical_color_names() -> TechResult<()> {
    let red = Rgb::new(255, 0, 0);
    let blue = Rgb::new(0, 0, 255);
    let color = |rgb| ColorDef { rgb, blink: false };
    let mut db = TechDb::new();
    db.display.add_color("zred", color(red));
    db.display.add_color("ared", color(red));
    db.display.add_color("b", color(blue));
    // The first name registered wins, not the alphabetically first
    assert_eq!(db.display.color_name(&red), Some("zred"));

    // Redefining a name drops its old value's reverse entry
    db.display.add_color("b", color(Rgb::new(1, 2, 3)));
    assert_eq!(db.display.color_name(&blue), None);
    assert_eq!(db.display.color_name(&Rgb::new(1, 2, 3)), Some("b"));
    // And hands its canonical name on to the next holder
    db.display.add_color("zred", color(blue));
    assert_eq!(db.display.color_name(&red), Some("ared"));
    assert_eq!(db.display.color_name(&blue), Some("zred"));

    let s = tech21utils::SerializationFormat::Yaml.to_string(&db)?;
    let mut db2: TechDb = tech21utils::SerializationFormat::Yaml.from_str(&s)?;
    db2.reindex();
    assert_eq!(db2.display.color_name(&red), Some("ared"));
    assert_eq!(db2.display.color_name(&blue), Some("zred"));
    Ok(())
}

#[test]
fn pixmap_packing() -> TechResult<()> {
    let mut map = Pixmap::new(10, 2);
    assert_eq!(map.data.len(), 4);
    map.set(0, 0, true);
    map.set(9, 1, true);
    assert_eq!(map.data, vec![0x01, 0x00, 0x00, 0x02]);
    assert!(map.get(9, 1));
    assert!(!map.get(10, 1));
    let rows = map.rows();
    assert_eq!(Pixmap::from_rows(&rows)?, map);
    assert!(Pixmap::from_rows(&[vec![true], vec![true, false]]).is_err());
    assert!(Pixmap::from_packed(8, 2, vec![0xff]).is_err());
    assert!(Pixmap::from_packed(8, 2, vec![0xff, 0xff])?.is_solid());
    Ok(())
}

#[test]
fn spacing_table_monotonicity() {
    let row = |i, v| TableRow {
        index1: dec(i),
        index2: None,
        value: dec(v),
    };
    let mut table = SpacingTable {
        name: "minSpacing".into(),
        layer1: "M1".into(),
        layer2: None,
        index1: "width".into(),
        index2: None,
        default: Some(dec("0.1")),
        rows: vec![row("0", "0.1"), row("0.5", "0.2"), row("1.5", "0.5")],
        flags: TableFlags::default(),
        ignore: false,
        group: FOUNDRY.into(),
        comment: None,
    };
    assert!(table.is_monotonic());
    assert_eq!(table.lookup(dec("0.7"), None), Some(dec("0.2")));
    assert_eq!(table.lookup(dec("2"), None), Some(dec("0.5")));

    let mut sink = RuleSink::default();
    assert!(sink.add_table(table.clone()));

    table.rows = vec![row("0", "0.1"), row("1.5", "0.5"), row("0.5", "0.2")];
    assert!(!table.is_monotonic());
    assert!(!sink.add_table(table.clone()));
    assert!(sink.tables()[1].ignore);
    assert_eq!(sink.tables()[1].lookup(dec("2"), None), None);

    // Repeated thresholds are not strictly increasing
    table.rows = vec![row("0", "0.1"), row("0", "0.2")];
    assert!(!table.is_monotonic());
}

#[test]
fn rules_replace_in_slot() {
    let mut sink = RuleSink::default();
    sink.add_rule(Rule::new("minWidth", "M1", None, dec("0.1")));
    sink.add_rule(Rule::new("minSpacing", "M1", Some("M2".into()), dec("0.2")));
    sink.add_rule(Rule::new("minWidth", "M1", None, dec("0.12")));
    assert_eq!(sink.rules().len(), 2);
    let r = sink.find_rule("minWidth", "M1", None).unwrap();
    assert_eq!(r.value, dec("0.12"));
    assert_eq!(r.kind(), Some(RuleKind::MinWidth));
    assert_eq!(sink.rules_for("M2").count(), 1);
    assert_eq!(sink.group_names(), vec![FOUNDRY.to_string()]);
}

#[test]
fn std_via_updates() -> TechResult<()> {
    let mut vias = ViaDb::default();
    let via = StdViaBuilder::default()
        .name("M1_M2")
        .layer1("M1")
        .cut("V1")
        .layer2("M2")
        .cut_width(dec("0.1"))
        .cut_height(dec("0.1"))
        .build()
        .map_err(|e| TechError::Str(e.to_string()))?;
    assert_eq!(via.rows, 1);
    vias.add_std_via(via.clone())?;
    assert!(vias.add_std_via(via).is_err());
    vias.update_std_via("M1_M2", |v| v.rows = 2)?;
    assert_eq!(vias.std_via("M1_M2").unwrap().rows, 2);
    assert!(vias.update_std_via("M1_M2", |v| v.name = "other".into()).is_err());
    assert!(vias.std_via("M1_M2").is_some());
    assert!(vias.update_std_via("nope", |_| ()).is_err());
    Ok(())
}

#[test]
fn derived_expressions() -> TechResult<()> {
    let e = LayerExpr::parse("M1 AND (M2 or M3)")?;
    assert_eq!(e.expr_string(), "M1 and (M2 or M3)");
    assert_eq!(e.layers(), vec!["M1", "M2", "M3"]);
    assert_eq!(LayerExpr::parse(&e.expr_string())?, e);
    assert_eq!(
        LayerExpr::binary(DerivedOp::Not, "Poly", "Diff").expr_string(),
        "Poly not Diff"
    );
    assert!(LayerExpr::parse("M1 and").is_err());
    assert!(LayerExpr::parse("(M1 or M2").is_err());
    assert!(LayerExpr::parse("M1 M2").is_err());
    Ok(())
}

fn red_packet_store() -> DisplayStore {
    let mut store = DisplayStore::default();
    store.add_color("red", ColorDef { rgb: Rgb::new(200, 30, 30), blink: false });
    store.add_stipple("solid", Pixmap::from_packed(8, 1, vec![0xff]).unwrap());
    store.add_stipple("dots", Pixmap::from_packed(8, 1, vec![0x55]).unwrap());
    store.add_line_style("solid", LineStyle { size: 1, pattern: vec![true] });
    store.add_line_style("thick", LineStyle { size: 3, pattern: vec![true] });
    store.add_packet(Packet {
        name: "redDots".into(),
        stipple: "dots".into(),
        line_style: "thick".into(),
        fill: "red".into(),
        outline: "red".into(),
        fill_style: Some(FillStyle::OutlineStipple),
    });
    store
}

#[test]
fn packet_looks() {
    let mut store = red_packet_store();
    let look = store.packet_look("redDots").unwrap();
    assert_eq!(look.color, Rgb::new(200, 30, 30));
    assert!(look.fill.filled);
    assert_eq!(look.fill.outline, Outline::Fat);
    assert_eq!(look.fill.pattern.as_ref().unwrap().data, vec![0x55]);

    store.add_packet_alias("m1dots", "redDots");
    assert_eq!(store.packet_look("m1dots"), Some(look));
    assert_eq!(store.packet_look("missing"), None);
    assert_eq!(store.stipple_name(&Pixmap::from_packed(8, 1, vec![0x55]).unwrap()), Some("dots"));
}

#[test]
fn deferred_packets_resolve_in_either_order() -> TechResult<()> {
    // Packets first
    let mut a = TechDb::new();
    a.display = red_packet_store();
    let m1 = a.layers.add_layer("M1", 11, None)?;
    let drawing = a.layers.drawing()?;
    let lpp_a = a.layers.add_lpp(m1, drawing)?;
    assert!(a.assign_packet(lpp_a, "redDots"));

    // Layer assignments first
    let mut b = TechDb::new();
    let m1 = b.layers.add_layer("M1", 11, None)?;
    let drawing = b.layers.drawing()?;
    let lpp_b = b.layers.add_lpp(m1, drawing)?;
    assert!(!b.assign_packet(lpp_b, "redDots"));
    let other = b.layers.add_layer("M2", 12, None)?;
    let lpp_other = b.layers.add_lpp(other, drawing)?;
    b.assign_packet(lpp_other, "nowhere");
    b.assign_packet(lpp_other, "nowhere");
    assert_eq!(b.resolver.pending(), 3);
    b.display = red_packet_store();
    let report = b.drain_deferred();
    assert_eq!(b.resolver.pending(), 0);
    assert_eq!(report, Some("Unresolved display packets: nowhere".to_string()));

    assert_eq!(
        a.layers.lpp(lpp_a).unwrap().display,
        b.layers.lpp(lpp_b).unwrap().display
    );
    Ok(())
}

#[test]
fn diagnostics_log() {
    let mut diag = Diagnostics::default();
    diag.warn(DiagCategory::Malformed, "bad form");
    diag.warn_at(DiagCategory::Unresolved, Some("a.tf"), Some(3), "no layer M9");
    assert_eq!(diag.len(), 2);
    assert_eq!(diag.count(DiagCategory::Unresolved), 1);
    assert_eq!(diag.entries()[1].to_string(), "a.tf:3: [unresolved] no layer M9");
    assert_eq!(diag.take().len(), 2);
    assert!(diag.is_empty());
}
