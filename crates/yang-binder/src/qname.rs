//! Prefixed-name parsing ("Prefixed name `pfx:id`").

use yang_common::{Atom, Interner};

/// A name as written in YANG source: an optional prefix and a local part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<Atom>,
    pub local: Atom,
}

impl QName {
    /// Parse `"pfx:id"` or `"id"` and intern both parts.
    pub fn parse(text: &str, interner: &mut Interner) -> QName {
        match text.split_once(':') {
            Some((prefix, local)) => QName {
                prefix: Some(interner.intern(prefix)),
                local: interner.intern(local),
            },
            None => QName {
                prefix: None,
                local: interner.intern(text),
            },
        }
    }
}
