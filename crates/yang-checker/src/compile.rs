//! The node compiler (C4): one routine per YANG statement family, walking
//! a P-node plus its parent C-node (or module root) into zero or more
//! C-nodes.

use yang_ast::{Keyword, NodeIndex};
use yang_binder::{Context, ModuleId};
use yang_common::{Atom, Diagnostic, DiagnosticKind};
use yang_solver::{RawTypeRef, TypeCompileContext};

use crate::extension::{dispatch_extension, PluginRegistry};
use crate::feature::{eval_if_feature, parse_if_feature};
use crate::node::{CNode, CNodeId, CompiledSchema, ExtensionInstance, Flags, NodeKind, Status, XPathAttachment};

fn denied_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Denied, "<node>", detail.into())
}

fn semantic_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Semantic, "<node>", detail.into())
}

fn exists_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Exists, "<node>", detail.into())
}

/// Ambient state a node compile inherits from its parent ("Inherited
/// flags are resolved top-down").
#[derive(Clone, Copy)]
pub struct InheritedState {
    pub config: bool,
    pub status: Status,
}

impl Default for InheritedState {
    fn default() -> Self {
        InheritedState { config: true, status: Status::Current }
    }
}

pub struct NodeCompiler<'a> {
    pub ctx: &'a mut Context,
    pub schema: &'a mut CompiledSchema,
    pub registry: &'a PluginRegistry,
}

impl<'a> NodeCompiler<'a> {
    /// Compile every top-level data-tree statement of `module` into the
    /// C-tree, registering the result as that module's compiled top level.
    pub fn compile_module_body(&mut self, module: ModuleId) -> Result<(), Diagnostic> {
        let root = self.ctx.module(module).parsed.root;
        let children: Vec<NodeIndex> = self.ctx.module(module).parsed.arena.children(root).to_vec();
        let inherited = InheritedState::default();
        for child in children {
            if let Some(id) = self.compile_statement(module, child, None, inherited)? {
                self.schema.module_mut(module).top_level.push(id);
            }
        }
        Ok(())
    }

    /// Compile one P-node (and, recursively, its children) if its
    /// `if-feature` guards pass. Returns `None` when the node is elided
    /// ("not compiled into the C-tree, as if absent").
    pub(crate) fn compile_statement(
        &mut self,
        module: ModuleId,
        p_node: NodeIndex,
        parent: Option<CNodeId>,
        inherited: InheritedState,
    ) -> Result<Option<CNodeId>, Diagnostic> {
        if !self.passes_if_feature(module, p_node)? {
            return Ok(None);
        }

        let kind = match self.ctx.module(module).parsed.arena.get(p_node).keyword {
            Keyword::Container => NodeKind::Container,
            Keyword::Leaf => NodeKind::Leaf,
            Keyword::LeafList => NodeKind::LeafList,
            Keyword::List => NodeKind::List,
            Keyword::Choice => NodeKind::Choice,
            Keyword::Case => NodeKind::Case,
            Keyword::AnyData => NodeKind::AnyData,
            Keyword::AnyXml => NodeKind::AnyXml,
            Keyword::Rpc => NodeKind::Rpc,
            Keyword::Action => NodeKind::Action,
            Keyword::Notification => NodeKind::Notification,
            Keyword::Uses => return self.compile_uses(module, p_node, parent, inherited).map(|_| None),
            _ => return Ok(None),
        };

        let name = self
            .ctx
            .module(module)
            .parsed
            .arena
            .get(p_node)
            .argument
            .ok_or_else(|| semantic_error("schema node missing a name argument"))?;

        let mut state = inherited;
        state.config = self.resolve_config(module, p_node, inherited)?;
        state.status = self.resolve_status(module, p_node, inherited)?;
        if matches!(kind, NodeKind::Notification) {
            state.config = false;
        }

        let mut node = CNode::new(kind, name, module, parent);
        node.flags = Flags { config: state.config, status: state.status, mandatory: false, ordered_by_user: false };

        self.fill_common(module, p_node, &mut node)?;

        match kind {
            NodeKind::Leaf => self.fill_leaf(module, p_node, &mut node)?,
            NodeKind::LeafList => self.fill_leaf_list(module, p_node, &mut node)?,
            NodeKind::List => self.fill_list(module, p_node, &mut node)?,
            NodeKind::Container => {
                node.presence = self
                    .ctx
                    .module(module)
                    .parsed
                    .arena
                    .children_of_kind(p_node, Keyword::Presence)
                    .next()
                    .is_some();
            }
            _ => {}
        }

        let id = self.schema.arena.push(node);
        if let Some(parent_id) = parent {
            self.schema.arena.add_child(parent_id, id);
        }

        self.dispatch_extensions(module, p_node, id)?;

        match kind {
            NodeKind::Rpc | NodeKind::Action => self.compile_rpc_action_children(module, p_node, id, state)?,
            NodeKind::Choice => self.compile_choice_children(module, p_node, id, state)?,
            _ if matches!(kind, NodeKind::Container | NodeKind::List | NodeKind::Case | NodeKind::Input | NodeKind::Output) => {
                self.compile_children(module, p_node, id, state)?
            }
            _ => {}
        }

        self.check_sibling_uniqueness(id)?;
        Ok(Some(id))
    }

    fn compile_children(&mut self, module: ModuleId, p_node: NodeIndex, parent: CNodeId, state: InheritedState) -> Result<(), Diagnostic> {
        let children: Vec<NodeIndex> = self.ctx.module(module).parsed.arena.children(p_node).to_vec();
        for child in children {
            self.compile_statement(module, child, Some(parent), state)?;
        }
        Ok(())
    }

    /// Synthesizes `input`/`output` child nodes with `config=false`; both
    /// are always present, possibly empty.
    fn compile_rpc_action_children(&mut self, module: ModuleId, p_node: NodeIndex, parent: CNodeId, state: InheritedState) -> Result<(), Diagnostic> {
        let mut io_state = state;
        io_state.config = false;
        for (keyword, kind) in [(Keyword::Input, NodeKind::Input), (Keyword::Output, NodeKind::Output)] {
            let explicit = self.ctx.module(module).parsed.arena.children_of_kind(p_node, keyword).next();
            let io_node = CNode::new(kind, Atom::EMPTY, module, Some(parent));
            let io_id = self.schema.arena.push(io_node);
            self.schema.arena.add_child(parent, io_id);
            if let Some(explicit_node) = explicit {
                self.compile_children(module, explicit_node, io_id, io_state)?;
            }
        }
        Ok(())
    }

    /// Synthesizes implicit `case` wrappers around bare children; at most
    /// one default case is allowed.
    fn compile_choice_children(&mut self, module: ModuleId, p_node: NodeIndex, parent: CNodeId, state: InheritedState) -> Result<(), Diagnostic> {
        let children: Vec<NodeIndex> = self.ctx.module(module).parsed.arena.children(p_node).to_vec();
        let mut default_cases = 0usize;
        let default_name = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children_of_kind(p_node, Keyword::Default)
            .next()
            .and_then(|d| self.ctx.module(module).parsed.arena.get(d).argument);

        for child in children {
            let child_pnode = self.ctx.module(module).parsed.arena.get(child);
            let child_keyword = child_pnode.keyword;
            let child_argument = child_pnode.argument;
            if child_keyword == Keyword::Case {
                let case_name = child_argument;
                if self.compile_statement(module, child, Some(parent), state)?.is_some() && case_name == default_name {
                    default_cases += 1;
                }
                continue;
            }
            if !self.passes_if_feature(module, child)? {
                continue;
            }
            // Wrap a bare child in an implicit case named after the child.
            let name = child_argument.unwrap_or(Atom::EMPTY);
            let mut case_node = CNode::new(NodeKind::Case, name, module, Some(parent));
            case_node.flags = Flags { config: state.config, status: state.status, mandatory: false, ordered_by_user: false };
            let case_id = self.schema.arena.push(case_node);
            self.schema.arena.add_child(parent, case_id);
            self.compile_statement(module, child, Some(case_id), state)?;
            if Some(name) == default_name {
                default_cases += 1;
            }
        }

        if default_cases > 1 {
            return Err(semantic_error("choice declares more than one default case"));
        }
        Ok(())
    }

    fn fill_common(&mut self, module: ModuleId, p_node: NodeIndex, node: &mut CNode) -> Result<(), Diagnostic> {
        node.flags.mandatory = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children_of_kind(p_node, Keyword::Mandatory)
            .next()
            .and_then(|m| self.ctx.module(module).parsed.arena.get(m).argument)
            .map(|a| self.ctx.resolve(a) == "true")
            .unwrap_or(false);

        for must in self.ctx.module(module).parsed.arena.children_of_kind(p_node, Keyword::Must).collect::<Vec<_>>() {
            let text = self.ctx.module(module).parsed.arena.get(must).argument.map(|a| self.ctx.resolve(a).to_string()).unwrap_or_default();
            node.must.push(XPathAttachment { text, compiled: None });
        }
        if let Some(when) = self.ctx.module(module).parsed.arena.children_of_kind(p_node, Keyword::When).next() {
            let text = self.ctx.module(module).parsed.arena.get(when).argument.map(|a| self.ctx.resolve(a).to_string()).unwrap_or_default();
            node.when = Some(XPathAttachment { text, compiled: None });
        }
        Ok(())
    }

    fn fill_leaf(&mut self, module: ModuleId, p_node: NodeIndex, node: &mut CNode) -> Result<(), Diagnostic> {
        let type_node = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children_of_kind(p_node, Keyword::Type)
            .next()
            .ok_or_else(|| semantic_error("leaf missing a type statement"))?;
        let mut tc = TypeCompileContext { ctx: &*self.ctx, store: &mut self.schema.types };
        let type_id = yang_solver::compile_type(RawTypeRef { module, node: type_node }, &mut tc)?;
        node.type_id = Some(type_id);
        node.default = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children_of_kind(p_node, Keyword::Default)
            .next()
            .and_then(|d| self.ctx.module(module).parsed.arena.get(d).argument);
        Ok(())
    }

    fn fill_leaf_list(&mut self, module: ModuleId, p_node: NodeIndex, node: &mut CNode) -> Result<(), Diagnostic> {
        let type_node = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children_of_kind(p_node, Keyword::Type)
            .next()
            .ok_or_else(|| semantic_error("leaf-list missing a type statement"))?;
        let mut tc = TypeCompileContext { ctx: &*self.ctx, store: &mut self.schema.types };
        let type_id = yang_solver::compile_type(RawTypeRef { module, node: type_node }, &mut tc)?;
        node.type_id = Some(type_id);

        node.min_elements = self.parse_count(module, p_node, Keyword::MinElements)?.unwrap_or(0);
        node.max_elements = self.parse_count(module, p_node, Keyword::MaxElements)?;
        if let Some(max) = node.max_elements {
            if node.min_elements > max {
                return Err(semantic_error(format!(
                    "min-elements {} exceeds max-elements {}",
                    node.min_elements, max
                )));
            }
        }
        node.flags.ordered_by_user = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children_of_kind(p_node, Keyword::OrderedBy)
            .next()
            .and_then(|o| self.ctx.module(module).parsed.arena.get(o).argument)
            .map(|a| self.ctx.resolve(a) == "user")
            .unwrap_or(false);
        Ok(())
    }

    fn fill_list(&mut self, module: ModuleId, p_node: NodeIndex, node: &mut CNode) -> Result<(), Diagnostic> {
        let key_node = self.ctx.module(module).parsed.arena.children_of_kind(p_node, Keyword::Key).next();
        if let Some(key_node) = key_node {
            let text = self.ctx.module(module).parsed.arena.get(key_node).argument.map(|a| self.ctx.resolve(a).to_string()).unwrap_or_default();
            for part in text.split_whitespace() {
                node.key.push(self.ctx.intern(part));
            }
        }
        for unique_node in self.ctx.module(module).parsed.arena.children_of_kind(p_node, Keyword::Unique).collect::<Vec<_>>() {
            let text = self.ctx.module(module).parsed.arena.get(unique_node).argument.map(|a| self.ctx.resolve(a).to_string()).unwrap_or_default();
            node.unique_tags.push(text);
        }
        node.min_elements = self.parse_count(module, p_node, Keyword::MinElements)?.unwrap_or(0);
        node.max_elements = self.parse_count(module, p_node, Keyword::MaxElements)?;
        node.flags.ordered_by_user = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children_of_kind(p_node, Keyword::OrderedBy)
            .next()
            .and_then(|o| self.ctx.module(module).parsed.arena.get(o).argument)
            .map(|a| self.ctx.resolve(a) == "user")
            .unwrap_or(false);
        Ok(())
    }

    fn parse_count(&mut self, module: ModuleId, p_node: NodeIndex, keyword: Keyword) -> Result<Option<u32>, Diagnostic> {
        let Some(n) = self.ctx.module(module).parsed.arena.children_of_kind(p_node, keyword).next() else {
            return Ok(None);
        };
        let text = self.ctx.module(module).parsed.arena.get(n).argument.map(|a| self.ctx.resolve(a).to_string()).unwrap_or_default();
        if text == "unbounded" {
            return Ok(None);
        }
        text.parse::<u32>().map(Some).map_err(|_| semantic_error(format!("invalid element-count argument: {text}")))
    }

    /// `config` defaults to the parent's; a child may not set `config
    /// true` under a `config false` ancestor.
    fn resolve_config(&mut self, module: ModuleId, p_node: NodeIndex, inherited: InheritedState) -> Result<bool, Diagnostic> {
        let explicit = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children_of_kind(p_node, Keyword::Config)
            .next()
            .and_then(|c| self.ctx.module(module).parsed.arena.get(c).argument)
            .map(|a| self.ctx.resolve(a) == "true");
        match explicit {
            None => Ok(inherited.config),
            Some(true) if !inherited.config => Err(denied_error("config true is not permitted under a config false ancestor")),
            Some(value) => Ok(value),
        }
    }

    /// Status is monotonic: current -> deprecated -> obsolete.
    fn resolve_status(&mut self, module: ModuleId, p_node: NodeIndex, inherited: InheritedState) -> Result<Status, Diagnostic> {
        let explicit = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children_of_kind(p_node, Keyword::Status)
            .next()
            .and_then(|s| self.ctx.module(module).parsed.arena.get(s).argument)
            .map(|a| self.ctx.resolve(a).to_string());
        let status = match explicit.as_deref() {
            Some("deprecated") => Status::Deprecated,
            Some("obsolete") => Status::Obsolete,
            Some("current") | None => Status::Current,
            Some(other) => return Err(semantic_error(format!("invalid status value: {other}"))),
        };
        if !inherited.status.may_reference(status) {
            return Err(denied_error("status is less stable than its parent's"));
        }
        Ok(status)
    }

    pub(crate) fn passes_if_feature(&mut self, module: ModuleId, p_node: NodeIndex) -> Result<bool, Diagnostic> {
        for guard in self.ctx.module(module).parsed.arena.children_of_kind(p_node, Keyword::IfFeature).collect::<Vec<_>>() {
            let text = self.ctx.module(module).parsed.arena.get(guard).argument.map(|a| self.ctx.resolve(a).to_string()).unwrap_or_default();
            let expr = parse_if_feature(&text, self.ctx)?;
            if !eval_if_feature(&expr, self.ctx, module) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn dispatch_extensions(&mut self, module: ModuleId, p_node: NodeIndex, node_id: CNodeId) -> Result<(), Diagnostic> {
        let unknowns: Vec<NodeIndex> = self
            .ctx
            .module(module)
            .parsed
            .arena
            .children(p_node)
            .iter()
            .copied()
            .filter(|&c| self.ctx.module(module).parsed.arena.get(c).keyword == Keyword::Unknown)
            .collect();
        for unknown in unknowns {
            let p = self.ctx.module(module).parsed.arena.get(unknown);
            let Some((prefix, local)) = p.extension_name else { continue };
            let ext_module = self.ctx.module(module).resolve_prefix(prefix).unwrap_or(module);
            let instance = ExtensionInstance {
                module: ext_module,
                name: local,
                argument: p.argument,
                plugin_data: None,
                synthesized: false,
            };
            let idx = self.schema.arena.get(node_id).extensions.len();
            self.schema.arena.get_mut(node_id).extensions.push(instance);
            dispatch_extension(self.registry, self.ctx, &mut self.schema.arena, node_id, idx)?;
        }
        Ok(())
    }

    /// Enforces that a name is unique among siblings within the same
    /// namespace partition. Schema-node names share one partition
    /// regardless of node kind (RFC 7950 §6.2.1).
    pub(crate) fn check_sibling_uniqueness(&mut self, node_id: CNodeId) -> Result<(), Diagnostic> {
        let Some(parent) = self.schema.arena.get(node_id).parent else { return Ok(()) };
        let name = self.schema.arena.get(node_id).name;
        let module = self.schema.arena.get(node_id).module;
        let siblings = self.schema.arena.get(parent).children.clone();
        let duplicate = siblings
            .iter()
            .filter(|&&sib| sib != node_id)
            .any(|&sib| self.schema.arena.get(sib).name == name && self.schema.arena.get(sib).module == module);
        if duplicate {
            return Err(exists_error(format!("duplicate sibling name: {}", self.ctx.resolve(name))));
        }
        Ok(())
    }

    fn compile_uses(&mut self, module: ModuleId, p_node: NodeIndex, parent: Option<CNodeId>, state: InheritedState) -> Result<(), Diagnostic> {
        crate::uses::expand_uses(self, module, p_node, parent, state)
    }

    /// Record `id` as one of `module`'s top-level nodes. `uses` expansion
    /// at module top level needs this — its inlined children never pass
    /// back through `compile_statement`'s own top-level bookkeeping.
    pub(crate) fn register_top_level(&mut self, module: ModuleId, id: CNodeId) {
        self.schema.module_mut(module).top_level.push(id);
    }
}
