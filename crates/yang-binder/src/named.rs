//! Per-module name tables backing C2's typedef/grouping/identity/feature
//! search, and the sibling-uniqueness-per-namespace-partition invariant.

use rustc_hash::FxHashMap;
use yang_ast::NodeIndex;
use yang_common::Atom;

/// Maps a module-top-level name to the P-node that declares it. One table
/// exists per `NamedKind` per module; duplicate insertion is rejected by
/// the caller (node compiler), which is where the `exists` diagnostic is
/// raised with a span to point at.
#[derive(Default, Debug)]
pub struct NamedEntityTable {
    entries: FxHashMap<Atom, NodeIndex>,
}

impl NamedEntityTable {
    pub fn new() -> Self {
        NamedEntityTable::default()
    }

    /// Insert `name -> node`, returning the previous declaration's node
    /// if one already existed (the caller turns that into an `exists`
    /// diagnostic).
    pub fn insert(&mut self, name: Atom, node: NodeIndex) -> Option<NodeIndex> {
        self.entries.insert(name, node)
    }

    pub fn get(&self, name: Atom) -> Option<NodeIndex> {
        self.entries.get(&name).copied()
    }

    pub fn contains(&self, name: Atom) -> bool {
        self.entries.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Atom, NodeIndex)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_returns_previous_node() {
        let mut table = NamedEntityTable::new();
        let a = Atom::EMPTY;
        let first = NodeIndex(1);
        let second = NodeIndex(2);
        assert_eq!(table.insert(a, first), None);
        assert_eq!(table.insert(a, second), Some(first));
    }
}
