//! Compile-wide configuration: a small `Copy`/`Default` options struct
//! passed by value into the compile entry point.

/// YANG language version a module declares, gating version-specific rules
/// (union membership, multi-base identities).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum YangVersion {
    #[default]
    V1_0,
    V1_1,
}

/// Options controlling a single `Context::compile` invocation.
#[derive(Clone, Copy, Debug)]
pub struct CompileOptions {
    /// Treat accumulated warnings as fatal errors after a successful compile.
    pub warnings_as_errors: bool,
    /// Override for the fix-point iteration cap. `None` derives the
    /// cap from the module count via `limits::fixpoint_cap`.
    pub max_resolution_passes: Option<u32>,
    /// Default YANG version assumed for modules that omit `yang-version`.
    pub default_yang_version: YangVersion,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            warnings_as_errors: false,
            max_resolution_passes: None,
            default_yang_version: YangVersion::V1_0,
        }
    }
}
