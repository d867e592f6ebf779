//! Programmatic P-tree construction, standing in for the out-of-scope
//! textual parser in tests across the workspace: tokenization isn't this
//! compiler's job, but something still has to produce P-trees for unit
//! tests to feed the compiler.

use crate::node::{Keyword, NodeArena, NodeIndex, NodeList, PNode};
use yang_common::{Interner, Span};

/// Build one statement with the given children, interning its argument
/// text (if any) through `interner`.
pub fn stmt(
    arena: &mut NodeArena,
    interner: &mut Interner,
    keyword: Keyword,
    argument: Option<&str>,
    children: Vec<NodeIndex>,
) -> NodeIndex {
    let argument = argument.map(|text| interner.intern(text));
    let mut node = PNode::new(keyword, argument, Span::synthetic());
    node.children = NodeList::from_vec(children);
    arena.push(node)
}

/// Build a leaf childless statement: `keyword argument;`.
pub fn leaf_stmt(
    arena: &mut NodeArena,
    interner: &mut Interner,
    keyword: Keyword,
    argument: &str,
) -> NodeIndex {
    stmt(arena, interner, keyword, Some(argument), Vec::new())
}

/// Build an extension-instance (unknown statement) node.
pub fn extension_instance(
    arena: &mut NodeArena,
    interner: &mut Interner,
    module_prefix: &str,
    name: &str,
    argument: Option<&str>,
    children: Vec<NodeIndex>,
) -> NodeIndex {
    let idx = stmt(arena, interner, Keyword::Unknown, argument, children);
    let prefix_atom = interner.intern(module_prefix);
    let name_atom = interner.intern(name);
    arena.get_mut(idx).extension_name = Some((prefix_atom, name_atom));
    idx
}
