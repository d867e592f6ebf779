//! The node compiler, grouping/uses expander, augment & deviation
//! applier, feature evaluator, extension dispatch, and final validation
//! pass (C4-C9) for the YANG schema compiler.

pub mod node;
pub use node::{CNode, CNodeArena, CNodeId, ChildList, CompiledModule, CompiledSchema, ExtensionInstance, Flags, NodeKind, Status, XPathAttachment};

pub mod feature;
pub use feature::{check_feature_dag, eval_if_feature, parse_if_feature, IfFeatureExpr};

pub mod extension;
pub use extension::{dispatch_extension, DefaultDenyPlugin, ExtensionPlugin, PluginEffect, PluginRegistry};

pub mod compile;
pub use compile::{InheritedState, NodeCompiler};

pub mod uses;
pub use uses::expand_uses;

pub mod augment;
pub use augment::{apply_all_deviations, apply_all_top_level_augments};

pub mod validate;
pub use validate::run_final_validation;
