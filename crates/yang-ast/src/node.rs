//! Arena-allocated P-nodes.
//!
//! Every YANG statement, built-in or extension, is one `PNode`. The P-tree
//! mirrors the YANG source shape exactly: `uses` and `grouping`
//! statements are ordinary nodes here, `choice`/`case` wrappers may be
//! implicit, and `rpc`/`action` carry no materialized `input`/`output`
//! unless the source wrote them explicitly. All of that normalization is
//! the node compiler's job (C4), not this crate's.

use smallvec::SmallVec;
use yang_common::{Atom, Span};

/// Closed set of statement keywords the compiler understands natively.
/// `Unknown` covers YIN/YANG extension instances, identified separately by
/// their `(module, name)` pair on the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    Module,
    Submodule,
    BelongsTo,
    YangVersion,
    Namespace,
    Prefix,
    Import,
    Include,
    Revision,
    RevisionDate,
    Organization,
    Contact,
    Description,
    Reference,
    Feature,
    IfFeature,
    Identity,
    Base,
    Typedef,
    Type,
    Default,
    Units,
    Status,
    Config,
    Mandatory,
    MinElements,
    MaxElements,
    OrderedBy,
    Presence,
    Container,
    Leaf,
    LeafList,
    List,
    Key,
    Unique,
    Choice,
    Case,
    AnyData,
    AnyXml,
    Grouping,
    Uses,
    Refine,
    Augment,
    Deviation,
    Deviate,
    Rpc,
    Action,
    Input,
    Output,
    Notification,
    Must,
    When,
    Extension,
    Argument,
    YinElement,
    Enum,
    Bit,
    Value,
    Position,
    Pattern,
    Modifier,
    Length,
    Range,
    FractionDigits,
    RequireInstance,
    Path,
    /// An extension instance (YIN "unknown statement"); `extension_name`
    /// on the owning `PNode` carries the `(module-prefix, name)` pair.
    Unknown,
}

pub type NodeList = SmallVec<[NodeIndex; 4]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub const ROOT: NodeIndex = NodeIndex(0);
}

/// A single parsed statement.
#[derive(Clone, Debug)]
pub struct PNode {
    pub keyword: Keyword,
    /// The statement's argument text, if any (e.g. the type name in
    /// `type int32;`, the path in `leafref { path ...; }`).
    pub argument: Option<Atom>,
    /// For `Keyword::Unknown`: the extension's defining module prefix and
    /// local name, e.g. `nacm:default-deny-write`.
    pub extension_name: Option<(Atom, Atom)>,
    pub span: Span,
    pub children: NodeList,
}

impl PNode {
    pub fn new(keyword: Keyword, argument: Option<Atom>, span: Span) -> Self {
        PNode {
            keyword,
            argument,
            extension_name: None,
            span,
            children: NodeList::new(),
        }
    }
}

/// Arena owning all `PNode`s of one parsed module (including its
/// submodules' statements, which are parsed into the same arena and linked
/// via `Keyword::Include`/`Keyword::BelongsTo`).
#[derive(Default, Debug)]
pub struct NodeArena {
    nodes: Vec<PNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        NodeArena { nodes: Vec::new() }
    }

    pub fn push(&mut self, node: PNode) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(node);
        idx
    }

    pub fn get(&self, idx: NodeIndex) -> &PNode {
        &self.nodes[idx.0 as usize]
    }

    pub fn get_mut(&mut self, idx: NodeIndex) -> &mut PNode {
        &mut self.nodes[idx.0 as usize]
    }

    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.nodes[parent.0 as usize].children.push(child);
    }

    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.nodes[idx.0 as usize].children
    }

    /// Iterate direct children matching a keyword, in source order — order
    /// is semantically significant for keys, defaults, leaf-list values
    /// ("Sized arrays").
    pub fn children_of_kind<'a>(
        &'a self,
        idx: NodeIndex,
        keyword: Keyword,
    ) -> impl Iterator<Item = NodeIndex> + 'a {
        self.children(idx)
            .iter()
            .copied()
            .filter(move |&c| self.get(c).keyword == keyword)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A parsed module: its statement arena plus the root `module`/`submodule`
/// node. Holding the arena by value (rather than a reference) keeps the
/// P-tree self-contained — exactly the shape C4/C5/C6 need when they must
/// hold onto nodes from multiple modules at once (grouping inlining,
/// cross-module augment).
#[derive(Debug)]
pub struct ParsedModule {
    pub arena: NodeArena,
    pub root: NodeIndex,
}

impl ParsedModule {
    pub fn new(arena: NodeArena, root: NodeIndex) -> Self {
        ParsedModule { arena, root }
    }
}
