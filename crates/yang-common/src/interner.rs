//! String interning for identifiers shared across modules.
//!
//! Every identifier the compiler touches repeatedly — module names,
//! prefixes, statement keywords' arguments — flows through the dictionary's
//! `Interner` so that two occurrences of the same text compare by a single
//! `u32` rather than by byte comparison. Atoms are cheap to copy and hash.

use rustc_hash::FxHashMap;
use std::fmt;

/// An interned string handle. Two atoms compare equal iff they were
/// produced by the same `Interner` from equal text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Atom(u32);

impl Atom {
    /// Reserved atom for the empty string; always index 0 in a fresh interner.
    pub const EMPTY: Atom = Atom(0);

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self.0)
    }
}

/// Append-only string interner.
///
/// Interning is idempotent: interning the same text twice returns the same
/// `Atom`. The interner never shrinks or reassigns indices, which is what
/// lets compiled schema structures hold `Atom`s past the point where the
/// originating source text has been dropped.
#[derive(Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    lookup: FxHashMap<Box<str>, Atom>,
}

impl Interner {
    pub fn new() -> Self {
        let mut interner = Interner {
            strings: Vec::new(),
            lookup: FxHashMap::default(),
        };
        let empty = interner.intern("");
        debug_assert_eq!(empty, Atom::EMPTY);
        interner
    }

    /// Intern `text`, returning its (possibly newly allocated) atom.
    pub fn intern(&mut self, text: &str) -> Atom {
        if let Some(atom) = self.lookup.get(text) {
            return *atom;
        }
        let id = Atom(self.strings.len() as u32);
        let boxed: Box<str> = text.into();
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, id);
        id
    }

    /// Resolve an atom back to its text. Panics if the atom did not
    /// originate from this interner — atoms from different `Interner`
    /// instances must never be mixed.
    pub fn resolve(&self, atom: Atom) -> &str {
        &self.strings[atom.0 as usize]
    }

    /// Look up an already-interned string without inserting it.
    pub fn get(&self, text: &str) -> Option<Atom> {
        self.lookup.get(text).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "foo");
    }

    #[test]
    fn distinct_strings_get_distinct_atoms() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_string_is_atom_zero() {
        let interner = Interner::new();
        assert_eq!(interner.get(""), Some(Atom::EMPTY));
    }
}
