//! Per-track playback URL resolution
//!
//! The resolver never fails a track over decipher or transform trouble: a
//! possibly-rejected URL with the original obfuscated values is preferred to
//! no URL. The only hard failure is a malformed base URL.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::cipher::eval::EvaluationEngine;
use crate::cipher::extract::CipherArtifact;
use crate::cipher::nfallback::NParamFallback;
use crate::error::UnsigError;
use crate::platform::script::PlayerScriptCache;
use crate::platform::transport::Transport;
use crate::utils::url::set_query_param;

/// The track-format collaborator: base URL plus the obfuscated query values.
#[derive(Debug, Clone, Default)]
pub struct StreamFormat {
    pub url: String,
    pub signature: Option<String>,
    /// Query-parameter name the deciphered signature is written under.
    pub signature_key: Option<String>,
    pub n_parameter: Option<String>,
}

impl StreamFormat {
    pub fn signature_key(&self) -> &str {
        self.signature_key.as_deref().unwrap_or("signature")
    }
}

/// Classification of one decipher/transform attempt. The same shape drives
/// the fallback and diagnostic logic for both the signature and the n paths.
#[derive(Debug)]
pub enum TransformOutcome {
    Transformed(String),
    Unchanged(String),
    Failed(UnsigError),
}

impl TransformOutcome {
    pub fn classify(input: &str, result: Result<String, UnsigError>) -> Self {
        match result {
            Ok(value) if value == input => TransformOutcome::Unchanged(value),
            Ok(value) => TransformOutcome::Transformed(value),
            Err(e) => TransformOutcome::Failed(e),
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            TransformOutcome::Transformed(v) | TransformOutcome::Unchanged(v) => Some(v),
            TransformOutcome::Failed(_) => None,
        }
    }
}

/// String predicates recognizing outputs the obfuscated code emits when it
/// fails internally. The shapes drift with upstream changes, so they are
/// replaceable rather than hardcoded.
#[derive(Debug, Clone)]
pub struct SentinelRules {
    exception_prefixes: Vec<String>,
    exception_suffix_markers: Vec<String>,
}

impl Default for SentinelRules {
    fn default() -> Self {
        Self {
            exception_prefixes: vec!["enhanced_except_".to_string()],
            exception_suffix_markers: vec!["_w8_".to_string()],
        }
    }
}

impl SentinelRules {
    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.exception_prefixes = prefixes;
        self
    }

    pub fn with_suffix_markers(mut self, markers: Vec<String>) -> Self {
        self.exception_suffix_markers = markers;
        self
    }

    /// True when `output` looks like an internal-failure sentinel for `input`:
    /// a known prefix, or a known marker followed by the unchanged input at
    /// the end.
    pub fn is_exception(&self, output: &str, input: &str) -> bool {
        self.exception_prefixes
            .iter()
            .any(|p| output.starts_with(p.as_str()))
            || self
                .exception_suffix_markers
                .iter()
                .any(|m| output.ends_with(&format!("{m}{input}")))
    }
}

/// Produces valid playback URLs for track formats.
pub struct UrlResolver {
    cache: Arc<PlayerScriptCache>,
    engine: EvaluationEngine,
    sentinels: SentinelRules,
}

impl UrlResolver {
    pub fn new(cache: Arc<PlayerScriptCache>) -> Self {
        Self {
            cache,
            engine: EvaluationEngine::new(),
            sentinels: SentinelRules::default(),
        }
    }

    pub fn with_sentinels(mut self, sentinels: SentinelRules) -> Self {
        self.sentinels = sentinels;
        self
    }

    /// Resolves the playback URL for `format` against the script at
    /// `script_url`, deciphering the signature and transforming the n value
    /// when present. Decipher and transform trouble degrades to the original
    /// values; only artifact extraction and a malformed base URL fail.
    pub async fn resolve_format_url(
        &self,
        transport: &dyn Transport,
        script_url: &str,
        format: &StreamFormat,
    ) -> Result<Url, UnsigError> {
        let artifact = self.cache.artifact_for(transport, script_url).await?;
        let mut url = Url::parse(&format.url)?;

        if let Some(signature) = format.signature.as_deref().filter(|s| !s.is_empty()) {
            let outcome =
                TransformOutcome::classify(signature, self.engine.apply(&artifact, signature));

            if let TransformOutcome::Failed(e) = &outcome {
                warn!(
                    "signature decipher failed (script: {}): {}",
                    script_url, e
                );
                self.cache
                    .dump_problematic(
                        &artifact.raw_script,
                        script_url,
                        &format!("can't transform s parameter {signature}"),
                    )
                    .await;
                debug!(
                    "falling back to original signature parameter (untransformed) for script {}",
                    script_url
                );
            }

            set_query_param(
                &mut url,
                format.signature_key(),
                outcome.value().unwrap_or(signature),
            );
        }

        if let Some(n) = format.n_parameter.as_deref().filter(|s| !s.is_empty()) {
            let final_n = self.resolve_n(&artifact, script_url, n).await;
            set_query_param(&mut url, "n", final_n.as_deref().unwrap_or(n));
        }

        Ok(url)
    }

    /// Runs the primary n transform, classifies the result, and falls back to
    /// the permissive extractor when the primary result is unusable. Returns
    /// the value to write, or `None` to keep the original.
    async fn resolve_n(
        &self,
        artifact: &CipherArtifact,
        script_url: &str,
        n: &str,
    ) -> Option<String> {
        let outcome = TransformOutcome::classify(n, self.engine.transform(artifact, n));

        let mut primary: Option<String> = None;
        let mut needs_fallback = false;

        match outcome {
            TransformOutcome::Transformed(value) => {
                if value.is_empty() {
                    warn!(
                        "transformed n parameter is empty, n function possibly faulty (in: {}, script: {})",
                        n, script_url
                    );
                    needs_fallback = true;
                } else if self.sentinels.is_exception(&value, n) {
                    warn!(
                        "n function did not complete due to exception (in: {}, out: {}, script: {})",
                        n, value, script_url
                    );
                    needs_fallback = true;
                } else {
                    debug!(
                        "n parameter primary transform success (script: {}, in: {}, out: {})",
                        script_url, n, value
                    );
                }
                primary = Some(value);
            }
            TransformOutcome::Unchanged(value) => {
                warn!(
                    "transformed n parameter is the same as input, n function possibly short-circuited (in: {}, script: {})",
                    n, script_url
                );
                primary = Some(value);
                needs_fallback = true;
            }
            TransformOutcome::Failed(e) => {
                self.cache
                    .dump_problematic(
                        &artifact.raw_script,
                        script_url,
                        &format!(
                            "can't transform n parameter {} with {} n function",
                            n, artifact.n_function
                        ),
                    )
                    .await;
                debug!(
                    "primary n transform failed: {} - attempting permissive fallback",
                    e
                );
                needs_fallback = true;
            }
        }

        let mut final_n = primary.clone();

        if needs_fallback {
            match NParamFallback::from_script(&artifact.raw_script) {
                Ok(fallback) => match fallback.transform(n) {
                    Ok(value) if value != n && primary.as_deref() != Some(value.as_str()) => {
                        info!(
                            "n parameter improved via permissive fallback (in: {}, primary: {:?}, fallback: {})",
                            n, primary, value
                        );
                        final_n = Some(value);
                    }
                    Ok(_) => {
                        debug!("permissive n fallback didn't improve result (primary: {:?})", primary);
                    }
                    Err(e) => {
                        debug!("permissive n fallback failed: {}", e);
                    }
                },
                Err(e) => {
                    debug!("permissive n fallback unavailable: {}", e);
                }
            }
        }

        info!(
            "n parameter final (script: {}, original: {}, final: {})",
            script_url,
            n,
            final_n.as_deref().unwrap_or(n)
        );

        final_n
    }
}
