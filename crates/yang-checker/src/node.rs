//! The compiled schema tree (C-tree): a tagged-variant node with a common
//! header plus per-kind payload fields ("Polymorphic node kinds" — a
//! common header plus payload beats a deep inheritance hierarchy for a
//! dozen node kinds that mostly share flags and a child list).

use smallvec::SmallVec;
use yang_ast::NodeIndex;
use yang_binder::{ModuleId, NodeTypeMask};
use yang_common::Atom;
use yang_solver::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CNodeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    Leaf,
    LeafList,
    List,
    Choice,
    Case,
    AnyData,
    AnyXml,
    Rpc,
    Action,
    Input,
    Output,
    Notification,
}

impl NodeKind {
    pub fn mask(self) -> NodeTypeMask {
        match self {
            NodeKind::Container => NodeTypeMask::CONTAINER,
            NodeKind::Leaf => NodeTypeMask::LEAF,
            NodeKind::LeafList => NodeTypeMask::LEAF_LIST,
            NodeKind::List => NodeTypeMask::LIST,
            NodeKind::Choice => NodeTypeMask::CHOICE,
            NodeKind::Case => NodeTypeMask::CASE,
            NodeKind::AnyData => NodeTypeMask::ANYDATA,
            NodeKind::AnyXml => NodeTypeMask::ANYXML,
            NodeKind::Rpc => NodeTypeMask::RPC,
            NodeKind::Action => NodeTypeMask::ACTION,
            NodeKind::Input => NodeTypeMask::INPUT,
            NodeKind::Output => NodeTypeMask::OUTPUT,
            NodeKind::Notification => NodeTypeMask::NOTIFICATION,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Current,
    Deprecated,
    Obsolete,
}

impl Status {
    /// A `current` definition may not reference `deprecated`/`obsolete`;
    /// `deprecated` may not reference `obsolete`.
    pub fn may_reference(self, target: Status) -> bool {
        match self {
            Status::Current => target == Status::Current,
            Status::Deprecated => target != Status::Obsolete,
            Status::Obsolete => true,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Flags {
    pub config: bool,
    pub status: Status,
    pub mandatory: bool,
    pub ordered_by_user: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Flags { config: true, status: Status::Current, mandatory: false, ordered_by_user: false }
    }
}

/// A `must`/`when` XPath expression attached to a node, in source text form
/// until compiles it against the node's axis.
#[derive(Clone, Debug)]
pub struct XPathAttachment {
    pub text: String,
    pub compiled: Option<yang_xpath::CompiledXPath>,
}

/// An extension instance attached to a node. `plugin_data` is an
/// opaque blob a plugin's `compile` hook may stash; `synthesized` marks an
/// instance a plugin created on a descendant to implement inheritance
/// (NACM-style), distinguishing it from one the source actually wrote.
#[derive(Clone, Debug)]
pub struct ExtensionInstance {
    pub module: ModuleId,
    pub name: Atom,
    pub argument: Option<Atom>,
    pub plugin_data: Option<String>,
    pub synthesized: bool,
}

pub type ChildList = SmallVec<[CNodeId; 4]>;

/// One compiled schema node. Kind-specific fields that don't apply to a
/// given `kind` simply stay at their default (`None`/empty) — e.g. `type_id`
/// is `None` on every non-leaf/leaf-list node.
#[derive(Clone, Debug)]
pub struct CNode {
    pub kind: NodeKind,
    pub name: Atom,
    /// The node's effective module for namespacing and `unique`
    /// cross-module rules (stays the target's own module even when
    /// the node was added by an augment from elsewhere).
    pub module: ModuleId,
    pub parent: Option<CNodeId>,
    pub children: ChildList,
    pub flags: Flags,
    pub type_id: Option<TypeId>,
    pub default: Option<Atom>,
    pub presence: bool,
    /// List-only: ordered key leaf names ("order is significant and
    /// preserved").
    pub key: Vec<Atom>,
    /// List-only: unresolved `unique` tag strings, resolved to leaf
    /// pointers during final validation.
    pub unique_tags: Vec<String>,
    pub min_elements: u32,
    pub max_elements: Option<u32>,
    pub must: Vec<XPathAttachment>,
    pub when: Option<XPathAttachment>,
    pub extensions: Vec<ExtensionInstance>,
}

impl CNode {
    pub fn new(kind: NodeKind, name: Atom, module: ModuleId, parent: Option<CNodeId>) -> Self {
        CNode {
            kind,
            name,
            module,
            parent,
            children: ChildList::new(),
            flags: Flags::default(),
            type_id: None,
            default: None,
            presence: false,
            key: Vec::new(),
            unique_tags: Vec::new(),
            min_elements: 0,
            max_elements: None,
            must: Vec::new(),
            when: None,
            extensions: Vec::new(),
        }
    }
}

/// Arena owning every `CNode` compiled for one `Context` (all modules share
/// one arena so augment/uses can freely mix nodes whose owning modules
/// differ).
#[derive(Default)]
pub struct CNodeArena {
    nodes: Vec<CNode>,
}

impl CNodeArena {
    pub fn new() -> Self {
        CNodeArena::default()
    }

    pub fn push(&mut self, node: CNode) -> CNodeId {
        let id = CNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: CNodeId) -> &CNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: CNodeId) -> &mut CNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn add_child(&mut self, parent: CNodeId, child: CNodeId) {
        self.nodes[parent.0 as usize].children.push(child);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every id currently in the arena, in allocation order. The final
    /// validation pass needs a whole-tree walk that doesn't start from any
    /// particular module's top level (leafref targets and `must`/`when`
    /// compilation touch every node regardless of module).
    pub fn ids(&self) -> impl Iterator<Item = CNodeId> + '_ {
        (0..self.nodes.len() as u32).map(CNodeId)
    }
}

/// One module's compiled view: which arena nodes are its top level. The
/// arena itself lives on `CompiledSchema` so cross-module augment can
/// attach nodes owned by one module as children of another's tree.
#[derive(Default)]
pub struct CompiledModule {
    pub top_level: Vec<CNodeId>,
}

/// Fingerprint of the `refine`/`augment` overlays applied at one `uses`
/// site. The naive case (no overlays at all) always fingerprints to `0`,
/// so every no-overlay `uses` of the same grouping shares one cache entry.
pub type OverlayFingerprint = u64;

/// One node of a cached grouping body, detached from any particular
/// `uses` site's parent: `parent_local`/`children_local` index into the
/// same `GroupingTemplate::nodes` vector rather than the arena, so the
/// whole subtree can be cloned and re-parented without walking the P-tree
/// again.
#[derive(Clone)]
pub struct TemplateNode {
    pub node: CNode,
    pub parent_local: Option<usize>,
    pub children_local: Vec<usize>,
}

/// A grouping body already compiled once for a given `(grouping,
/// overlay-fingerprint)` pair.
#[derive(Clone)]
pub struct GroupingTemplate {
    pub roots: Vec<usize>,
    pub nodes: Vec<TemplateNode>,
}

/// Key into the `uses` memoization cache: the grouping's home module and
/// P-node, plus the overlay fingerprint of the particular `uses` site.
pub type UsesCacheKey = (ModuleId, NodeIndex, OverlayFingerprint);

/// The full compiled schema tree across every implemented module in a
/// `Context`, plus the identity table and type store the node compiler
/// populated along the way.
pub struct CompiledSchema {
    pub arena: CNodeArena,
    pub modules: rustc_hash::FxHashMap<ModuleId, CompiledModule>,
    pub types: yang_solver::TypeStore,
    pub identities: yang_solver::IdentityTable,
    pub uses_cache: rustc_hash::FxHashMap<UsesCacheKey, GroupingTemplate>,
}

impl CompiledSchema {
    pub fn new() -> Self {
        CompiledSchema {
            arena: CNodeArena::new(),
            modules: rustc_hash::FxHashMap::default(),
            types: yang_solver::TypeStore::new(),
            identities: yang_solver::IdentityTable::new(),
            uses_cache: rustc_hash::FxHashMap::default(),
        }
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut CompiledModule {
        self.modules.entry(id).or_default()
    }
}

impl Default for CompiledSchema {
    fn default() -> Self {
        CompiledSchema::new()
    }
}

impl yang_binder::SchemaTreeView for CompiledSchema {
    type NodeRef = CNodeId;

    fn module_top_level(&self, module: ModuleId) -> Vec<CNodeId> {
        self.modules.get(&module).map(|m| m.top_level.clone()).unwrap_or_default()
    }

    fn local_name(&self, node: CNodeId) -> Atom {
        self.arena.get(node).name
    }

    fn owning_module(&self, node: CNodeId) -> ModuleId {
        self.arena.get(node).module
    }

    fn children(&self, node: CNodeId) -> Vec<CNodeId> {
        self.arena.get(node).children.to_vec()
    }

    fn node_type(&self, node: CNodeId) -> NodeTypeMask {
        self.arena.get(node).kind.mask()
    }
}
