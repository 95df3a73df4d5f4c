//!
//! # Node Arena
//!
//! Slot-map storage for nodes created while evaluating.
//! Temporaries are released with [Arena::recycle] once their top-level form completes,
//! and their slots are reused by later allocations.
//! Keys are generation-checked: a key to a recycled slot no longer resolves.
//!

use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use crate::node::Node;

new_key_type! {
    /// Keys for [Arena] entries
    pub struct NodeKey;
}

/// Position in the temporary list, returned by [Arena::mark]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaMark(usize);

/// # Node Arena
#[derive(Debug, Default)]
pub struct Arena {
    slots: SlotMap<NodeKey, Rc<Node>>,
    /// Temporaries, in allocation order
    temps: Vec<NodeKey>,
    /// Largest number of live nodes seen
    peak: usize,
}
impl Arena {
    /// Store `node` as a temporary
    pub fn new_temp_node(&mut self, node: Node) -> NodeKey {
        let key = self.slots.insert(Rc::new(node));
        self.temps.push(key);
        self.peak = self.peak.max(self.slots.len());
        key
    }
    /// Store a deep copy of `node` as a temporary
    pub fn new_temp_copy(&mut self, node: &Node) -> NodeKey {
        self.new_temp_node(node.clone())
    }
    pub fn get(&self, key: NodeKey) -> Option<Rc<Node>> {
        self.slots.get(key).cloned()
    }
    /// Exempt temporary `key` from recycling. Returns whether it was a temporary.
    pub fn persist(&mut self, key: NodeKey) -> bool {
        match self.temps.iter().rposition(|k| *k == key) {
            Some(idx) => {
                self.temps.remove(idx);
                true
            }
            None => false,
        }
    }
    /// Release `key`, temporary or persisted
    pub fn free(&mut self, key: NodeKey) {
        self.persist(key);
        self.slots.remove(key);
    }
    /// Mark the current end of the temporary list
    pub fn mark(&self) -> ArenaMark {
        ArenaMark(self.temps.len())
    }
    /// Release all temporaries allocated since `mark`. Returns the number released.
    pub fn recycle(&mut self, mark: ArenaMark) -> usize {
        let idx = mark.0.min(self.temps.len());
        let released: Vec<NodeKey> = self.temps.drain(idx..).collect();
        for key in released.iter() {
            self.slots.remove(*key);
        }
        released.len()
    }
    /// Number of live nodes
    pub fn live(&self) -> usize {
        self.slots.len()
    }
    /// Peak number of live nodes
    pub fn peak(&self) -> usize {
        self.peak
    }
}
