//!
//! # Deferred Reference Resolver
//!
//! Display-packet assignments made before the packets exist are saved here,
//! then replayed once the display resources have been read.
//!

use std::collections::BTreeSet;

use crate::layers::LppKey;

/// # Deferred Reference Resolver
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    pending: Vec<(LppKey, String)>,
    unresolved: BTreeSet<String>,
}
impl Resolver {
    /// Save a reference from `lpp` to resource `name`
    pub fn save(&mut self, lpp: LppKey, name: impl Into<String>) {
        self.pending.push((lpp, name.into()));
    }
    /// Number of saved references
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
    /// Replay every saved reference through `apply`, then clear the list.
    /// `apply` returns whether the reference resolved; names that did not are
    /// retained for [Resolver::report_unresolved].
    pub fn drain(&mut self, mut apply: impl FnMut(LppKey, &str) -> bool) {
        for (lpp, name) in std::mem::take(&mut self.pending) {
            if !apply(lpp, &name) {
                self.unresolved.insert(name);
            }
        }
    }
    /// Note a name that failed to resolve outside of [Resolver::drain]
    pub fn mark_unresolved(&mut self, name: impl Into<String>) {
        self.unresolved.insert(name.into());
    }
    /// Sorted, deduplicated report of unresolved names, if any
    pub fn report_unresolved(&self) -> Option<String> {
        if self.unresolved.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.unresolved.iter().map(|s| s.as_str()).collect();
        Some(format!("Unresolved display packets: {}", names.join(", ")))
    }
    /// Clear the unresolved-name report
    pub fn clear_unresolved(&mut self) {
        self.unresolved.clear();
    }
}
