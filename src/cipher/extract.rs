//! Extraction of cipher artifacts from raw player-script text

use regex::Regex;
use tracing::debug;

use crate::cipher::patterns::{self, NShape, SIG_FUNCTION_SHAPES};
use crate::error::{ExtractionFailureKind, UnsigError};

/// The structured extraction result for one player script: every source-text
/// snippet needed to decipher the signature and transform the n parameter.
/// Immutable once built; cached per script URL for the process lifetime.
#[derive(Debug, Clone)]
pub struct CipherArtifact {
    pub source_script_url: String,
    /// Numeric token the platform calls `signatureTimestamp` / `sts`.
    pub timestamp: String,
    pub global_vars: String,
    pub actions: String,
    pub sig_function: String,
    pub n_function: String,
    /// Retained only for diagnostics and the fallback n extractor.
    pub raw_script: String,
}

/// Runs the pattern library over raw script text. Each artifact is mandatory;
/// the first miss maps to its typed failure kind.
pub fn extract_from_script(script: &str, source_url: &str) -> Result<CipherArtifact, UnsigError> {
    let timestamp = patterns::find_timestamp(script)
        .ok_or_else(|| failure(ExtractionFailureKind::TimestampNotFound, source_url))?;

    let global_vars = patterns::find_global_vars(script)
        .ok_or_else(|| failure(ExtractionFailureKind::VariablesNotFound, source_url))?;

    let actions = patterns::find_actions(script)
        .ok_or_else(|| failure(ExtractionFailureKind::ActionsNotFound, source_url))?;

    let sig_function = select_sig_function(script, source_url)
        .ok_or_else(|| failure(ExtractionFailureKind::SigFunctionNotFound, source_url))?;

    let (n_shape, n_raw) = patterns::find_n_function(script)
        .ok_or_else(|| failure(ExtractionFailureKind::NFunctionNotFound, source_url))?;

    if n_shape == NShape::Relaxed {
        debug!("using relaxed n function shape for script {}", source_url);
    }

    Ok(CipherArtifact {
        source_script_url: source_url.to_string(),
        timestamp: timestamp.to_string(),
        global_vars: global_vars.to_string(),
        actions: actions.to_string(),
        sig_function,
        n_function: strip_short_circuit_guard(n_raw),
        raw_script: script.to_string(),
    })
}

/// Enumerates sig-function candidates shape-by-shape in priority order and
/// picks the first non-identity match. When every candidate is identity the
/// first one is kept as a last resort.
fn select_sig_function(script: &str, source_url: &str) -> Option<String> {
    let mut first_candidate: Option<&str> = None;

    for pattern in SIG_FUNCTION_SHAPES.iter() {
        for candidate in pattern.candidates(script) {
            if !is_identity_sig_function(candidate) {
                return Some(candidate.to_string());
            }
            if first_candidate.is_none() {
                first_candidate = Some(candidate);
            }
        }
    }

    first_candidate.map(|candidate| {
        debug!(
            "selected decipher function appears identity (may leave signature unchanged) for script {}",
            source_url
        );
        candidate.to_string()
    })
}

/// A candidate is identity when it has a first parameter, never reassigns it,
/// never calls a split/reverse-style operation, and simply returns it.
pub(crate) fn is_identity_sig_function(fn_source: &str) -> bool {
    let Some(param) = patterns::first_parameter_name(fn_source) else {
        return false;
    };

    if fn_source.contains(&format!("{param}="))
        || fn_source.contains(".split(\"\")")
        || fn_source.contains(".reverse(")
    {
        return false;
    }

    Regex::new(&format!(r"return\s+{}\s*;?", regex::escape(param)))
        .map(|re| re.is_match(fn_source))
        .unwrap_or(false)
}

/// Removes the inserted `if (typeof X === …) return <param>;` short-circuit
/// guard that turns the n function into a deliberate no-op under detection
/// conditions.
pub(crate) fn strip_short_circuit_guard(n_function: &str) -> String {
    let Some(param) = patterns::first_parameter_name(n_function) else {
        return n_function.to_string();
    };

    match Regex::new(&format!(
        r"if\s*\(typeof\s*[^\s()]+\s*===?.*?\)\s*return\s+{}\s*;?",
        regex::escape(param)
    )) {
        Ok(re) => re.replace_all(n_function, "").into_owned(),
        Err(_) => n_function.to_string(),
    }
}

fn failure(kind: ExtractionFailureKind, source_url: &str) -> UnsigError {
    UnsigError::Extraction {
        kind,
        url: source_url.to_string(),
    }
}
