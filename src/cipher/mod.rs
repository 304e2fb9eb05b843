//! Cipher extraction and evaluation

pub mod eval;
pub mod extract;
pub mod nfallback;
pub mod patterns;
pub mod scan;

pub use eval::EvaluationEngine;
pub use extract::{extract_from_script, CipherArtifact};
pub use nfallback::NParamFallback;
