//! Parsed-module (P-tree) data types for the YANG schema compiler.
//!
//! The textual YANG/YIN parser is out of scope for this crate: nothing
//! here tokenizes or reads bytes. What lives here is the *contract* a
//! parser must produce and the compiler consumes — a statement tree shaped
//! directly after YANG's own grammar
//! (`keyword argument? ("{" substatement* "}" | ";")`), arena-allocated
//! with a stable `NodeArena`/`NodeIndex` pair.

pub mod node;
pub use node::{Keyword, NodeArena, NodeIndex, NodeList, PNode, ParsedModule};

pub mod builders;
