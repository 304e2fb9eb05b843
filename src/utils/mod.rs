//! Shared utilities

pub mod diagnostics;
pub mod url;

pub use diagnostics::ScriptDump;
