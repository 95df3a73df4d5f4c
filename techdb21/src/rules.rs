//!
//! # Design-Rule Sink
//!
//! Records single-valued rules and spacing tables, grouped by constraint group.
//!

use serde::{Deserialize, Serialize};

use crate::TechDecimal;
use tech21utils::{enumstr, EnumStr};

/// Name of the default constraint group
pub const FOUNDRY: &str = "foundry";

enumstr!(
    /// # Known Rule Kinds
    RuleKind {
        MinWidth: "minWidth",
        MaxWidth: "maxWidth",
        MinSpacing: "minSpacing",
        MinSameNetSpacing: "minSameNetSpacing",
        MinArea: "minArea",
        MinHoleArea: "minHoleArea",
        MinEnclosure: "minEnclosure",
        MinExtension: "minExtension",
        MinOppExtension: "minOppExtension",
        MinNotch: "minNotch",
        MinDiagonalSpacing: "minDiagonalSpacing",
        MinNumCut: "minNumCut",
        MinDensity: "minDensity",
        MaxDensity: "maxDensity",
        MinLength: "minLength",
        ViaSpacing: "viaSpacing",
    }
);

/// # Single-Valued Rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Constraint keyword, e.g. `minSpacing`. Kept verbatim for unrecognized kinds.
    pub name: String,
    pub layer1: String,
    pub layer2: Option<String>,
    pub value: TechDecimal,
    /// Second value of pair-valued rules, e.g. opposite-side extensions
    pub value2: Option<TechDecimal>,
    pub group: String,
    /// Trailing qualifier symbols, e.g. `'sameNet`
    pub qualifiers: Vec<String>,
    pub comment: Option<String>,
    /// Layer order is significant, e.g. enclosure of `layer2` by `layer1`
    pub ordered: bool,
}
impl Rule {
    pub fn new(
        name: impl Into<String>,
        layer1: impl Into<String>,
        layer2: Option<String>,
        value: TechDecimal,
    ) -> Self {
        Self {
            name: name.into(),
            layer1: layer1.into(),
            layer2,
            value,
            value2: None,
            group: FOUNDRY.into(),
            qualifiers: Vec::new(),
            comment: None,
            ordered: false,
        }
    }
    /// Get the [RuleKind], if a known one
    pub fn kind(&self) -> Option<RuleKind> {
        RuleKind::from_str(&self.name)
    }
    fn same_slot(&self, other: &Rule) -> bool {
        self.name == other.name
            && self.layer1 == other.layer1
            && self.layer2 == other.layer2
            && self.group == other.group
            && self.qualifiers == other.qualifiers
            && self.ordered == other.ordered
    }
}

/// # Spacing-Table Row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub index1: TechDecimal,
    pub index2: Option<TechDecimal>,
    pub value: TechDecimal,
}

/// # Spacing-Table Qualifier Flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFlags {
    pub same_net: bool,
    pub same_metal: bool,
    pub horizontal: bool,
    pub vertical: bool,
}
impl TableFlags {
    /// Set the flag named by qualifier `q`. Returns false for unknown qualifiers.
    pub fn set(&mut self, q: &str) -> bool {
        match q {
            "sameNet" => self.same_net = true,
            "sameMetal" => self.same_metal = true,
            "horizontal" => self.horizontal = true,
            "vertical" => self.vertical = true,
            _ => return false,
        }
        true
    }
    /// Qualifier names of all set flags
    pub fn names(&self) -> Vec<&'static str> {
        let mut v = Vec::new();
        if self.same_net {
            v.push("sameNet");
        }
        if self.same_metal {
            v.push("sameMetal");
        }
        if self.horizontal {
            v.push("horizontal");
        }
        if self.vertical {
            v.push("vertical");
        }
        v
    }
}

/// # Spacing Table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacingTable {
    pub name: String,
    pub layer1: String,
    pub layer2: Option<String>,
    /// Name of the first index dimension, e.g. `width`
    pub index1: String,
    pub index2: Option<String>,
    pub default: Option<TechDecimal>,
    pub rows: Vec<TableRow>,
    pub flags: TableFlags,
    /// Set for tables that cannot be used, e.g. with mis-ordered rows
    pub ignore: bool,
    pub group: String,
    pub comment: Option<String>,
}
impl SpacingTable {
    /// Boolean indication of strictly-increasing thresholds,
    /// ordered on (index1, index2)
    pub fn is_monotonic(&self) -> bool {
        self.rows.windows(2).all(|w| {
            let (a, b) = (&w[0], &w[1]);
            match (a.index2, b.index2) {
                (Some(a2), Some(b2)) => (a.index1, a2) < (b.index1, b2),
                (None, None) => a.index1 < b.index1,
                _ => false,
            }
        })
    }
    /// Look up the value for index (`i1`, `i2`): the last row whose thresholds do not exceed them.
    /// Falls back to the default when no row applies, and returns `None` for ignored tables.
    pub fn lookup(&self, i1: TechDecimal, i2: Option<TechDecimal>) -> Option<TechDecimal> {
        if self.ignore {
            return None;
        }
        let hit = self
            .rows
            .iter()
            .filter(|r| {
                r.index1 <= i1
                    && match (r.index2, i2) {
                        (Some(r2), Some(v2)) => r2 <= v2,
                        (None, _) => true,
                        (Some(_), None) => false,
                    }
            })
            .last();
        hit.map(|r| r.value).or(self.default)
    }
}

/// # Constraint Group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintGroup {
    pub name: String,
    pub override_: bool,
    /// Layers valid for routing, from `interconnect`
    pub valid_layers: Vec<String>,
    pub valid_vias: Vec<String>,
    /// Routing-grid entries, as (key, layer, value), e.g. (`horizontalPitch`, `M1`, 0.2)
    pub routing_grids: Vec<(String, String, TechDecimal)>,
    /// Names of antenna models defined in the group
    pub antenna_models: Vec<String>,
}

/// # Design-Rule Sink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSink {
    pub groups: Vec<ConstraintGroup>,
    rules: Vec<Rule>,
    tables: Vec<SpacingTable>,
}
impl RuleSink {
    /// Add a [Rule]. A rule in the same (name, layers, group, qualifiers) slot is replaced.
    pub fn add_rule(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.same_slot(&rule)) {
            Some(r) => *r = rule,
            None => self.rules.push(rule),
        }
    }
    /// Add a [SpacingTable], flagging it `ignore` if its rows are not strictly increasing.
    /// Returns whether the table is usable.
    pub fn add_table(&mut self, mut table: SpacingTable) -> bool {
        if !table.is_monotonic() {
            table.ignore = true;
        }
        let usable = !table.ignore;
        self.tables.push(table);
        usable
    }
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
    pub fn tables(&self) -> &[SpacingTable] {
        &self.tables
    }
    /// Find a rule by name and layers, in any group
    pub fn find_rule(&self, name: &str, layer1: &str, layer2: Option<&str>) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|r| r.name == name && r.layer1 == layer1 && r.layer2.as_deref() == layer2)
    }
    /// Rules naming layer `layer`
    pub fn rules_for<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.layer1 == layer || r.layer2.as_deref() == Some(layer))
    }
    pub fn find_table(&self, name: &str, layer1: &str) -> Option<&SpacingTable> {
        self.tables
            .iter()
            .find(|t| t.name == name && t.layer1 == layer1)
    }
    /// Get or create constraint group `name`
    pub fn group_mut(&mut self, name: &str) -> &mut ConstraintGroup {
        let idx = match self.groups.iter().position(|g| g.name == name) {
            Some(idx) => idx,
            None => {
                self.groups.push(ConstraintGroup {
                    name: name.into(),
                    ..Default::default()
                });
                self.groups.len() - 1
            }
        };
        &mut self.groups[idx]
    }
    /// Distinct group names of all rules and tables, in first-use order
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|g| g.name.clone()).collect();
        let used = self
            .rules
            .iter()
            .map(|r| &r.group)
            .chain(self.tables.iter().map(|t| &t.group));
        for g in used {
            if !names.contains(g) {
                names.push(g.clone());
            }
        }
        names
    }
}
