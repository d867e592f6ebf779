//! Schema-node-id resolution (the second half of C2).
//!
//! The compiled schema tree (C-tree) is built by `yang-checker`'s node
//! compiler, a crate this one must not depend on. `SchemaTreeView` is the
//! seam: checker implements it over its concrete C-node type, and this
//! crate provides the generic node-id walking algorithm once, shared by
//! every caller (augment targets, leafref paths, `unique` tags, deviation
//! targets).

use crate::context::Context;
use crate::module::ModuleId;
use crate::path::ParsedNodeId;
use yang_common::{Atom, Diagnostic, DiagnosticKind};

/// Bitmask of YANG node-type tags, used to constrain what a schema-node-id
/// lookup may return ("Supported return-type filter is a bitmask of
/// node-types; mismatch → `denied` error").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeTypeMask(u16);

impl NodeTypeMask {
    pub const CONTAINER: NodeTypeMask = NodeTypeMask(1 << 0);
    pub const LIST: NodeTypeMask = NodeTypeMask(1 << 1);
    pub const LEAF: NodeTypeMask = NodeTypeMask(1 << 2);
    pub const LEAF_LIST: NodeTypeMask = NodeTypeMask(1 << 3);
    pub const CHOICE: NodeTypeMask = NodeTypeMask(1 << 4);
    pub const CASE: NodeTypeMask = NodeTypeMask(1 << 5);
    pub const ANYDATA: NodeTypeMask = NodeTypeMask(1 << 6);
    pub const ANYXML: NodeTypeMask = NodeTypeMask(1 << 7);
    pub const RPC: NodeTypeMask = NodeTypeMask(1 << 8);
    pub const ACTION: NodeTypeMask = NodeTypeMask(1 << 9);
    pub const INPUT: NodeTypeMask = NodeTypeMask(1 << 10);
    pub const OUTPUT: NodeTypeMask = NodeTypeMask(1 << 11);
    pub const NOTIFICATION: NodeTypeMask = NodeTypeMask(1 << 12);
    pub const NONE: NodeTypeMask = NodeTypeMask(0);

    pub const ALL: NodeTypeMask = NodeTypeMask(0x1FFF);

    /// The node kinds `augment` may target.
    pub const AUGMENT_TARGETS: NodeTypeMask = NodeTypeMask(
        Self::CONTAINER.0 | Self::LIST.0 | Self::CHOICE.0 | Self::CASE.0 | Self::INPUT.0 | Self::OUTPUT.0 | Self::NOTIFICATION.0,
    );

    pub const fn bit(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: NodeTypeMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: NodeTypeMask) -> NodeTypeMask {
        NodeTypeMask(self.0 | other.0)
    }
}

/// The compiler-facing view of a compiled schema tree that node-id
/// resolution needs. `yang-checker` implements this over its `CNode`
/// arena.
pub trait SchemaTreeView {
    type NodeRef: Copy + PartialEq;

    /// Direct top-level nodes of `module` (no module-root node itself).
    fn module_top_level(&self, module: ModuleId) -> Vec<Self::NodeRef>;
    fn local_name(&self, node: Self::NodeRef) -> Atom;
    fn owning_module(&self, node: Self::NodeRef) -> ModuleId;
    fn children(&self, node: Self::NodeRef) -> Vec<Self::NodeRef>;
    fn node_type(&self, node: Self::NodeRef) -> NodeTypeMask;

    /// Children of `node`, transparently descending into `input`/`output`
    /// when `node` is an rpc/action ("honoring implicit input/output
    /// traversal").
    fn effective_children(&self, node: Self::NodeRef) -> Vec<Self::NodeRef> {
        let kind = self.node_type(node);
        if kind.contains(NodeTypeMask::RPC) || kind.contains(NodeTypeMask::ACTION) {
            let mut out = Vec::new();
            for child in self.children(node) {
                let child_kind = self.node_type(child);
                if child_kind.contains(NodeTypeMask::INPUT) || child_kind.contains(NodeTypeMask::OUTPUT) {
                    out.extend(self.children(child));
                } else {
                    out.push(child);
                }
            }
            out
        } else {
            self.children(node)
        }
    }
}

fn reference_error(path: &ParsedNodeId, detail: impl Into<String>) -> Diagnostic {
    let rendered = render(path);
    Diagnostic::error(DiagnosticKind::Reference, rendered, detail.into())
}

fn denied_error(path: &ParsedNodeId, detail: impl Into<String>) -> Diagnostic {
    let rendered = render(path);
    Diagnostic::error(DiagnosticKind::Denied, rendered, detail.into())
}

fn render(path: &ParsedNodeId) -> String {
    let prefix = if path.absolute { "/" } else { "" };
    format!("{prefix}<{} segments>", path.segments.len())
}

/// Walk `parsed` against `view`, starting at module top level (absolute)
/// or at `start`'s children (descendant). Returns the resolved node if it
/// matches `allowed`.
pub fn resolve_node_id<V: SchemaTreeView>(
    view: &V,
    ctx: &Context,
    current_module: ModuleId,
    parsed: &ParsedNodeId,
    start: Option<V::NodeRef>,
    allowed: NodeTypeMask,
) -> Result<V::NodeRef, Diagnostic> {
    if parsed.segments.is_empty() {
        return Err(reference_error(parsed, "empty path"));
    }
    if !parsed.absolute && start.is_none() {
        return Err(reference_error(parsed, "descendant path requires a context node"));
    }

    let mut active_module = current_module;
    let mut current: Option<V::NodeRef> = if parsed.absolute { None } else { start };

    for (i, segment) in parsed.segments.iter().enumerate() {
        let module = match segment.prefix {
            Some(prefix) => ctx
                .module(active_module)
                .resolve_prefix(prefix)
                .ok_or_else(|| reference_error(parsed, "unresolved prefix"))?,
            None => active_module,
        };

        let pool: Vec<V::NodeRef> = if i == 0 && parsed.absolute {
            view.module_top_level(module)
        } else {
            view.effective_children(current.expect("current is set after first iteration"))
        };

        let found = pool
            .into_iter()
            .find(|&node| view.local_name(node) == segment.name && view.owning_module(node) == module)
            .ok_or_else(|| reference_error(parsed, "no such schema node"))?;

        active_module = view.owning_module(found);
        current = Some(found);
    }

    let resolved = current.expect("loop ran at least once");
    if view.node_type(resolved).0 & allowed.0 == 0 {
        return Err(denied_error(parsed, "resolved node-type is not permitted here"));
    }
    Ok(resolved)
}
