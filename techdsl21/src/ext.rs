//!
//! # Built-In Keyword Extensions
//!
//! * [DrcKeywords], design rules on the open layer block
//! * [StdViaKeywords], `StandardVia` definitions
//! * [ScriptBlocks], named script text kept verbatim
//!

// Crates.io
use tech21utils::{enumstr, EnumStr};

// Workspace
use techdb21::{
    DiagCategory, Rule, RuleKind, SpacingTable, StdViaBuilder, TableFlags, TableRow, XyPair,
    FOUNDRY,
};

// Local
use crate::layer::{dec, int, msg, one, words};
use crate::reader::{split_keyword, DslSession, KeywordDispatch};
use crate::LineStatus;

enumstr!(
    /// # Design-Rule Keywords
    DrcKey {
        MinWidth: "MinWidth",
        MaxWidth: "MaxWidth",
        MinSpace: "MinSpace",
        MinSpaceTo: "MinSpaceTo",
        MinArea: "MinArea",
        MinHoleArea: "MinHoleArea",
        MinEnclosure: "MinEnclosure",
        MinExtension: "MinExtension",
        MinSpaceTable: "MinSpaceTable",
    }
);

/// # Design-Rule Keywords
///
/// Rules apply to the open layer block's layer, in the foundry group:
/// `MinWidth V`, `MaxWidth V`, `MinSpace V`, `MinSpaceTo LAYER V`, `MinArea V`, `MinHoleArea V`,
/// `MinEnclosure LAYER V` (of LAYER by this one), `MinExtension LAYER V`,
/// and `MinSpaceTable W1 S1 W2 S2 ...` (width-indexed spacing).
#[derive(Debug, Default)]
pub struct DrcKeywords;
impl KeywordDispatch for DrcKeywords {
    fn dispatch(&mut self, s: &mut DslSession, keyword: &str, args: &str) -> LineStatus {
        match DrcKey::from_str_nocase(keyword) {
            Some(key) => drc_rule(s, key, args).into(),
            None => LineStatus::NoMatch,
        }
    }
}
fn drc_rule(s: &mut DslSession, key: DrcKey, args: &str) -> Result<(), String> {
    let layer = s
        .current_layer()
        .ok_or_else(|| format!("`{}` outside a layer block", key))?;
    let w = words(args);
    let (kind, layer2, value) = match (key, w.as_slice()) {
        (DrcKey::MinWidth, [v]) => (RuleKind::MinWidth, None, v),
        (DrcKey::MaxWidth, [v]) => (RuleKind::MaxWidth, None, v),
        (DrcKey::MinSpace, [v]) => (RuleKind::MinSpacing, None, v),
        (DrcKey::MinArea, [v]) => (RuleKind::MinArea, None, v),
        (DrcKey::MinHoleArea, [v]) => (RuleKind::MinHoleArea, None, v),
        (DrcKey::MinSpaceTo, [l2, v]) => (RuleKind::MinSpacing, Some(l2), v),
        (DrcKey::MinEnclosure, [l2, v]) => (RuleKind::MinEnclosure, Some(l2), v),
        (DrcKey::MinExtension, [l2, v]) => (RuleKind::MinExtension, Some(l2), v),
        (DrcKey::MinSpaceTable, _) => return spacing_table(s, layer, &w),
        _ => return Err(format!("Malformed `{}` arguments `{}`", key, args)),
    };
    let value = dec(value)?;
    if let Some(l2) = layer2 {
        if s.db.layers.find_layer(l2).is_none() {
            s.warn(DiagCategory::Unresolved, format!("Unresolved layer `{}`", l2));
        }
    }
    let mut rule = Rule::new(kind.to_str(), layer, layer2.map(|l| l.to_string()), value);
    rule.ordered = matches!(key, DrcKey::MinEnclosure | DrcKey::MinExtension);
    s.db.rules.add_rule(rule);
    Ok(())
}
fn spacing_table(s: &mut DslSession, layer: String, w: &[&str]) -> Result<(), String> {
    if w.is_empty() || w.len() % 2 != 0 {
        return Err("Usage: MinSpaceTable WIDTH SPACING [WIDTH SPACING ...]".into());
    }
    let rows = w
        .chunks(2)
        .map(|pair| -> Result<TableRow, String> {
            Ok(TableRow {
                index1: dec(pair[0])?,
                index2: None,
                value: dec(pair[1])?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;
    let table = SpacingTable {
        name: RuleKind::MinSpacing.to_str().into(),
        layer1: layer.clone(),
        layer2: None,
        index1: "width".into(),
        index2: None,
        default: None,
        rows,
        flags: TableFlags::default(),
        ignore: false,
        group: FOUNDRY.into(),
        comment: None,
    };
    if !s.db.rules.add_table(table) {
        let msg = format!("Spacing table on {} is not strictly increasing, ignored", layer);
        s.warn(DiagCategory::Validation, msg);
    }
    Ok(())
}

/// # Standard-Via Keyword
///
/// `StandardVia NAME LAYER1 CUT LAYER2 key=value ...`, with keys
/// `w`, `h` (cut size, required), `res`, `rows`, `cols`, `sx`, `sy` (cut spacing),
/// `e1x`, `e1y`, `e2x`, `e2y` (enclosures), `o1x`, `o1y`, `o2x`, `o2y` (offsets) and `ox`, `oy` (origin offset).
#[derive(Debug, Default)]
pub struct StdViaKeywords;
impl KeywordDispatch for StdViaKeywords {
    fn dispatch(&mut self, s: &mut DslSession, keyword: &str, args: &str) -> LineStatus {
        if !keyword.eq_ignore_ascii_case("StandardVia") {
            return LineStatus::NoMatch;
        }
        std_via(s, args).into()
    }
}
fn std_via(s: &mut DslSession, args: &str) -> Result<(), String> {
    let w = words(args);
    let (name, layer1, cut, layer2, params) = match w.as_slice() {
        [name, l1, cut, l2, params @ ..] => (*name, *l1, *cut, *l2, params),
        _ => return Err("Usage: StandardVia NAME LAYER1 CUT LAYER2 key=value ...".into()),
    };
    for layer in [layer1, cut, layer2] {
        if s.db.layers.find_layer(layer).is_none() {
            return Err(format!("Standard via {}: unknown layer `{}`", name, layer));
        }
    }
    let mut builder = StdViaBuilder::default()
        .name(name)
        .layer1(layer1)
        .cut(cut)
        .layer2(layer2);
    let (mut space, mut enc1, mut enc2) = (XyPair::default(), XyPair::default(), XyPair::default());
    let (mut off1, mut off2, mut orig) = (XyPair::default(), XyPair::default(), XyPair::default());
    for param in params {
        let (key, val) = param
            .split_once('=')
            .ok_or_else(|| format!("Expected key=value, got `{}`", param))?;
        match key.to_ascii_lowercase().as_str() {
            "rows" => builder = builder.rows(int::<u32>(val)?),
            "cols" => builder = builder.cols(int::<u32>(val)?),
            "w" => builder = builder.cut_width(dec(val)?),
            "h" => builder = builder.cut_height(dec(val)?),
            "res" => builder = builder.resistance(dec(val)?),
            "sx" => space.x = dec(val)?,
            "sy" => space.y = dec(val)?,
            "e1x" => enc1.x = dec(val)?,
            "e1y" => enc1.y = dec(val)?,
            "e2x" => enc2.x = dec(val)?,
            "e2y" => enc2.y = dec(val)?,
            "o1x" => off1.x = dec(val)?,
            "o1y" => off1.y = dec(val)?,
            "o2x" => off2.x = dec(val)?,
            "o2y" => off2.y = dec(val)?,
            "ox" => orig.x = dec(val)?,
            "oy" => orig.y = dec(val)?,
            _ => return Err(format!("Standard via {}: unknown key `{}`", name, key)),
        }
    }
    let via = builder
        .cut_space(space)
        .enc1(enc1)
        .enc2(enc2)
        .off1(off1)
        .off2(off2)
        .orig_off(orig)
        .build()
        .map_err(|e| format!("Standard via {}: {}", name, e))?;
    s.db.vias.add_std_via(via).map_err(msg)
}

/// # Script Blocks
///
/// `Script NAME` opens a block, and lines up to `EndScript` are stored verbatim
/// under NAME in the technology information.
#[derive(Debug, Default)]
pub struct ScriptBlocks {
    open: Option<(String, Vec<String>)>,
}
impl KeywordDispatch for ScriptBlocks {
    fn dispatch(&mut self, _s: &mut DslSession, keyword: &str, args: &str) -> LineStatus {
        if keyword.eq_ignore_ascii_case("EndScript") {
            return LineStatus::error("EndScript without Script");
        }
        if !keyword.eq_ignore_ascii_case("Script") {
            return LineStatus::NoMatch;
        }
        match one(args, "Script NAME") {
            Ok(name) => {
                self.open = Some((name.to_string(), Vec::new()));
                LineStatus::Matched
            }
            Err(e) => LineStatus::Error(e),
        }
    }
    fn capturing(&self) -> bool {
        self.open.is_some()
    }
    fn capture(&mut self, s: &mut DslSession, line: &str) -> LineStatus {
        if split_keyword(line).0.eq_ignore_ascii_case("EndScript") {
            if let Some((name, lines)) = self.open.take() {
                s.db.info.scripts.insert(name, lines.join("\n"));
            }
            return LineStatus::Matched;
        }
        if let Some((_, lines)) = self.open.as_mut() {
            lines.push(line.to_string());
        }
        LineStatus::Matched
    }
    fn finish(&mut self, _s: &mut DslSession) -> LineStatus {
        match self.open.take() {
            Some((name, _)) => LineStatus::error(format!("Script {} is not closed by EndScript", name)),
            None => LineStatus::Matched,
        }
    }
}
