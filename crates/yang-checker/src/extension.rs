//! Extension plugin registry and dispatch.
//!
//! A plugin is resolved by `(module-name, extension-name)` rather than by
//! `ModuleId`: the registry is global state, seeded once at process
//! start, before any particular `Context`'s module ids exist.

use rustc_hash::FxHashMap;
use yang_binder::Context;
use yang_common::{Diagnostic, DiagnosticKind};

use crate::node::{CNodeArena, CNodeId, ExtensionInstance, NodeKind};

pub enum PluginEffect {
    Accepted,
    Rejected(String),
}

/// A registered extension's compile-time behavior. `validate`/`free`
/// hooks for a data-instance-validation concern this compiler does not
/// implement are omitted here rather than stubbed, since an empty hook
/// with nothing to call it would just be dead code.
pub trait ExtensionPlugin {
    fn compile(&self, arena: &mut CNodeArena, node: CNodeId, instance: &ExtensionInstance) -> Result<PluginEffect, Diagnostic>;
}

/// NACM-style `default-deny-write`/`default-deny-all`: reject on an
/// rpc/action/notification headnode (those have no configuration to deny
/// writes to), otherwise walk descendants and synthesize an inherited copy
/// on every one that doesn't already carry its own tag of the same name
/// ("Extension inheritance").
pub struct DefaultDenyPlugin;

impl ExtensionPlugin for DefaultDenyPlugin {
    fn compile(&self, arena: &mut CNodeArena, node: CNodeId, instance: &ExtensionInstance) -> Result<PluginEffect, Diagnostic> {
        let kind = arena.get(node).kind;
        if matches!(kind, NodeKind::Rpc | NodeKind::Action | NodeKind::Notification) {
            return Ok(PluginEffect::Rejected(
                "default-deny extensions cannot be attached to an rpc, action, or notification".to_string(),
            ));
        }
        inherit_to_descendants(arena, node, instance);
        Ok(PluginEffect::Accepted)
    }
}

fn inherit_to_descendants(arena: &mut CNodeArena, node: CNodeId, instance: &ExtensionInstance) {
    let children: Vec<CNodeId> = arena.get(node).children.to_vec();
    for child in children {
        let already_tagged = arena.get(child).extensions.iter().any(|e| e.name == instance.name);
        if already_tagged {
            continue;
        }
        let inherited = ExtensionInstance {
            module: instance.module,
            name: instance.name,
            argument: instance.argument,
            plugin_data: instance.plugin_data.clone(),
            synthesized: true,
        };
        arena.get_mut(child).extensions.push(inherited);
        inherit_to_descendants(arena, child, instance);
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: FxHashMap<(String, String), Box<dyn ExtensionPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    /// Seed the registry with the built-in NACM access-control extensions.
    pub fn with_builtins() -> Self {
        let mut registry = PluginRegistry::new();
        registry.register("ietf-netconf-acm", "default-deny-write", Box::new(DefaultDenyPlugin));
        registry.register("ietf-netconf-acm", "default-deny-all", Box::new(DefaultDenyPlugin));
        registry
    }

    pub fn register(&mut self, module_name: impl Into<String>, extension_name: impl Into<String>, plugin: Box<dyn ExtensionPlugin>) {
        self.plugins.insert((module_name.into(), extension_name.into()), plugin);
    }

    pub fn get(&self, module_name: &str, extension_name: &str) -> Option<&dyn ExtensionPlugin> {
        self.plugins.get(&(module_name.to_string(), extension_name.to_string())).map(|b| b.as_ref())
    }
}

/// Dispatch the extension instance at `arena[node].extensions[instance_index]`.
/// An extension with no registered plugin passes through unmodified —
/// only built-in and host-registered extensions act at compile time.
pub fn dispatch_extension(
    registry: &PluginRegistry,
    ctx: &Context,
    arena: &mut CNodeArena,
    node: CNodeId,
    instance_index: usize,
) -> Result<(), Diagnostic> {
    let instance = arena.get(node).extensions[instance_index].clone();
    let module_name = ctx.resolve(ctx.module(instance.module).name).to_string();
    let ext_name = ctx.resolve(instance.name).to_string();
    let Some(plugin) = registry.get(&module_name, &ext_name) else {
        return Ok(());
    };
    match plugin.compile(arena, node, &instance)? {
        PluginEffect::Accepted => Ok(()),
        PluginEffect::Rejected(message) => Err(Diagnostic::error(DiagnosticKind::Extension, format!("{module_name}:{ext_name}"), message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_binder::ModuleId;
    use yang_common::{Atom, CompileOptions};

    fn tagged_tree() -> (Context, CNodeArena, CNodeId, CNodeId) {
        let mut ctx = Context::new(CompileOptions::default());
        let acm_module = ctx.next_module_id();
        let name = ctx.intern("ietf-netconf-acm");
        let ns = ctx.intern("urn:acm");
        let own_prefix = ctx.intern("nacm");
        let module = yang_binder::Module {
            id: acm_module,
            name,
            namespace: ns,
            revision: None,
            own_prefix,
            imports: Vec::new(),
            includes: Vec::new(),
            belongs_to: None,
            implemented: true,
            latest_revision: true,
            yang_version: yang_common::YangVersion::V1_0,
            typedefs: yang_binder::NamedEntityTable::new(),
            groupings: yang_binder::NamedEntityTable::new(),
            identities: yang_binder::NamedEntityTable::new(),
            features: yang_binder::NamedEntityTable::new(),
            extensions: yang_binder::NamedEntityTable::new(),
            parsed: std::sync::Arc::new(yang_ast::ParsedModule::new(yang_ast::NodeArena::new(), yang_ast::NodeIndex::ROOT)),
        };
        ctx.register_module(module).unwrap();

        let data_module = ModuleId(1);
        let mut arena = CNodeArena::new();
        let top = arena.push(crate::node::CNode::new(NodeKind::Container, Atom::EMPTY, data_module, None));
        let child = arena.push(crate::node::CNode::new(NodeKind::Leaf, Atom::EMPTY, data_module, Some(top)));
        arena.add_child(top, child);
        (ctx, arena, top, child)
    }

    #[test]
    fn inherits_tag_onto_untagged_descendant() {
        let (mut ctx, mut arena, top, child) = tagged_tree();
        let ext_name = ctx.intern("default-deny-write");
        let instance = ExtensionInstance {
            module: ModuleId(0),
            name: ext_name,
            argument: None,
            plugin_data: None,
            synthesized: false,
        };
        arena.get_mut(top).extensions.push(instance.clone());
        let registry = PluginRegistry::with_builtins();
        dispatch_extension(&registry, &ctx, &mut arena, top, 0).unwrap();
        assert!(arena.get(child).extensions.iter().any(|e| e.synthesized));
    }

    #[test]
    fn rejects_attachment_on_rpc() {
        let mut ctx = Context::new(CompileOptions::default());
        let acm_module = ctx.next_module_id();
        let name = ctx.intern("ietf-netconf-acm");
        let ext_name = ctx.intern("default-deny-write");
        let ns = ctx.intern("urn:acm");
        let own_prefix = ctx.intern("nacm");
        let module = yang_binder::Module {
            id: acm_module,
            name,
            namespace: ns,
            revision: None,
            own_prefix,
            imports: Vec::new(),
            includes: Vec::new(),
            belongs_to: None,
            implemented: true,
            latest_revision: true,
            yang_version: yang_common::YangVersion::V1_0,
            typedefs: yang_binder::NamedEntityTable::new(),
            groupings: yang_binder::NamedEntityTable::new(),
            identities: yang_binder::NamedEntityTable::new(),
            features: yang_binder::NamedEntityTable::new(),
            extensions: yang_binder::NamedEntityTable::new(),
            parsed: std::sync::Arc::new(yang_ast::ParsedModule::new(yang_ast::NodeArena::new(), yang_ast::NodeIndex::ROOT)),
        };
        ctx.register_module(module).unwrap();

        let mut arena = CNodeArena::new();
        let rpc = arena.push(crate::node::CNode::new(NodeKind::Rpc, Atom::EMPTY, ModuleId(1), None));
        arena.get_mut(rpc).extensions.push(ExtensionInstance {
            module: acm_module,
            name: ext_name,
            argument: None,
            plugin_data: None,
            synthesized: false,
        });
        let registry = PluginRegistry::with_builtins();
        let result = dispatch_extension(&registry, &ctx, &mut arena, rpc, 0);
        assert!(result.is_err());
    }
}
