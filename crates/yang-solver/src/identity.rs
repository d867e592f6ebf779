//! Identity bases and derived-identity closures ("Identity").
//!
//! An `identity` may declare multiple `base` statements (YANG 1.1). The
//! table tracks the direct base edges as they're declared and computes the
//! transitive derived-from closure on demand, rejecting any cycle the base
//! graph would otherwise hide.

use rustc_hash::{FxHashMap, FxHashSet};
use yang_binder::ModuleId;
use yang_common::{limits, Atom, Diagnostic, DiagnosticKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdentityId(u32);

#[derive(Clone, Debug)]
pub struct Identity {
    pub name: Atom,
    pub module: ModuleId,
    pub bases: Vec<IdentityId>,
}

#[derive(Default)]
pub struct IdentityTable {
    identities: Vec<Identity>,
    by_key: FxHashMap<(ModuleId, Atom), IdentityId>,
}

fn cycle_error(name: Atom) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::Cycle,
        format!("<identity {}>", name.index()),
        "identity base graph contains a cycle",
    )
}

impl IdentityTable {
    pub fn new() -> Self {
        IdentityTable::default()
    }

    pub fn declare(&mut self, module: ModuleId, name: Atom) -> IdentityId {
        if let Some(&id) = self.by_key.get(&(module, name)) {
            return id;
        }
        let id = IdentityId(self.identities.len() as u32);
        self.identities.push(Identity { name, module, bases: Vec::new() });
        self.by_key.insert((module, name), id);
        id
    }

    pub fn find(&self, module: ModuleId, name: Atom) -> Option<IdentityId> {
        self.by_key.get(&(module, name)).copied()
    }

    pub fn get(&self, id: IdentityId) -> &Identity {
        &self.identities[id.0 as usize]
    }

    /// Record `id`'s `base` edges. Caps the number of direct bases an
    /// identity may declare at `limits::MAX_IDENTITY_BASES` to bound the
    /// work a pathological module can force on closure computation.
    pub fn add_bases(&mut self, id: IdentityId, bases: Vec<IdentityId>) -> Result<(), Diagnostic> {
        if bases.len() > limits::MAX_IDENTITY_BASES {
            return Err(Diagnostic::error(
                DiagnosticKind::Semantic,
                format!("<identity {}>", self.get(id).name.index()),
                format!("identity declares more than {} base statements", limits::MAX_IDENTITY_BASES),
            ));
        }
        self.identities[id.0 as usize].bases.extend(bases);
        Ok(())
    }

    /// Every identity `id` is directly or transitively derived from,
    /// including `id` itself. Detects cycles via a gray/black DFS marking
    /// (white = unvisited, gray = on the current path, black = finished).
    pub fn closure(&self, id: IdentityId) -> Result<FxHashSet<IdentityId>, Diagnostic> {
        let mut black = FxHashSet::default();
        let mut gray = FxHashSet::default();
        let mut out = FxHashSet::default();
        self.visit(id, &mut gray, &mut black, &mut out)?;
        Ok(out)
    }

    fn visit(
        &self,
        id: IdentityId,
        gray: &mut FxHashSet<IdentityId>,
        black: &mut FxHashSet<IdentityId>,
        out: &mut FxHashSet<IdentityId>,
    ) -> Result<(), Diagnostic> {
        if black.contains(&id) {
            return Ok(());
        }
        if !gray.insert(id) {
            return Err(cycle_error(self.get(id).name));
        }
        out.insert(id);
        for &base in &self.get(id).bases {
            out.insert(base);
            self.visit(base, gray, black, out)?;
        }
        gray.remove(&id);
        black.insert(id);
        Ok(())
    }

    /// `derived` is (transitively) based on `base`, per the derived-from
    /// relation used by `identityref` value validation.
    pub fn is_derived_from(&self, derived: IdentityId, base: IdentityId) -> Result<bool, Diagnostic> {
        Ok(self.closure(derived)?.contains(&base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_common::Interner;

    fn atom(interner: &mut Interner, s: &str) -> Atom {
        interner.intern(s)
    }

    #[test]
    fn single_base_closure_includes_self_and_ancestor() {
        let mut interner = Interner::new();
        let mut table = IdentityTable::new();
        let module = ModuleId(0);
        let animal = table.declare(module, atom(&mut interner, "animal"));
        let dog = table.declare(module, atom(&mut interner, "dog"));
        table.add_bases(dog, vec![animal]).unwrap();

        let closure = table.closure(dog).unwrap();
        assert!(closure.contains(&dog));
        assert!(closure.contains(&animal));
    }

    #[test]
    fn multi_base_identity_derives_from_both() {
        let mut interner = Interner::new();
        let mut table = IdentityTable::new();
        let module = ModuleId(0);
        let swimmer = table.declare(module, atom(&mut interner, "swimmer"));
        let flyer = table.declare(module, atom(&mut interner, "flyer"));
        let duck = table.declare(module, atom(&mut interner, "duck"));
        table.add_bases(duck, vec![swimmer, flyer]).unwrap();

        assert!(table.is_derived_from(duck, swimmer).unwrap());
        assert!(table.is_derived_from(duck, flyer).unwrap());
    }

    #[test]
    fn self_referential_base_is_a_cycle() {
        let mut interner = Interner::new();
        let mut table = IdentityTable::new();
        let module = ModuleId(0);
        let a = table.declare(module, atom(&mut interner, "a"));
        table.add_bases(a, vec![a]).unwrap();
        assert!(table.closure(a).is_err());
    }

    #[test]
    fn indirect_cycle_is_detected() {
        let mut interner = Interner::new();
        let mut table = IdentityTable::new();
        let module = ModuleId(0);
        let a = table.declare(module, atom(&mut interner, "a"));
        let b = table.declare(module, atom(&mut interner, "b"));
        table.add_bases(a, vec![b]).unwrap();
        table.add_bases(b, vec![a]).unwrap();
        assert!(table.closure(a).is_err());
    }
}
