//! Isolated evaluation of extracted cipher functions
//!
//! Every call builds a brand-new JavaScript runtime. Player-script variants
//! define colliding global names, so no scope is ever shared across calls,
//! artifacts, or successive calls for the same artifact.

use deno_core::{FastString, JsRuntime, RuntimeOptions};
use regex::Regex;
use tracing::{debug, warn};

use crate::cipher::extract::CipherArtifact;
use crate::cipher::patterns::first_parameter_name;
use crate::error::UnsigError;

const SIG_BINDING: &str = "decipher_sig";
const N_BINDING: &str = "decipher_nsig";

/// Executes an artifact's functions against parameter values.
#[derive(Debug, Default)]
pub struct EvaluationEngine;

impl EvaluationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Applies the signature decipher function to `text`.
    pub fn apply(&self, artifact: &CipherArtifact, text: &str) -> Result<String, UnsigError> {
        self.invoke(
            &artifact.global_vars,
            &artifact.actions,
            SIG_BINDING,
            &artifact.sig_function,
            text,
        )?
        .ok_or_else(|| UnsigError::Evaluation("decipher function returned no value".to_string()))
    }

    /// Transforms the n parameter with the extracted n function.
    ///
    /// If the output equals the input, early-return guards are stripped from
    /// the function source and the call is retried once in a fresh runtime;
    /// a differing retry result is adopted, otherwise the no-op result stands.
    pub fn transform(&self, artifact: &CipherArtifact, text: &str) -> Result<String, UnsigError> {
        // Many n functions reuse objects from the actions declaration; load both.
        let transformed = match self.invoke(
            &artifact.global_vars,
            &artifact.actions,
            N_BINDING,
            &artifact.n_function,
            text,
        )? {
            Some(value) => value,
            None => {
                debug!("n function returned no value (in: {})", text);
                return Ok(String::new());
            }
        };

        if transformed != text {
            return Ok(transformed);
        }

        if let Some(param) = first_parameter_name(&artifact.n_function) {
            let sanitized = sanitize_early_returns(&artifact.n_function, param);
            if sanitized != artifact.n_function {
                match self.invoke(
                    &artifact.global_vars,
                    &artifact.actions,
                    N_BINDING,
                    &sanitized,
                    text,
                ) {
                    Ok(Some(retry)) if retry != text => {
                        debug!(
                            "n parameter transformed after sanitizing early returns (in: {}, out: {})",
                            text, retry
                        );
                        return Ok(retry);
                    }
                    Ok(_) => {
                        debug!("sanitized n function still returns original input (param: {})", param);
                    }
                    Err(e) => {
                        debug!("retry transform with sanitized n function failed: {}", e);
                    }
                }
            }
        }

        let preview: String = artifact
            .n_function
            .chars()
            .take(400)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        warn!("n function produced identity result; extracted function preview: {}", preview);

        Ok(transformed)
    }

    /// Evaluates `global_vars; actions; var <binding> = <fn>;` and invokes the
    /// binding with `arg` in a fresh runtime. `None` means the function
    /// completed but produced null or undefined.
    pub(crate) fn invoke(
        &self,
        global_vars: &str,
        actions: &str,
        binding: &'static str,
        fn_source: &str,
        arg: &str,
    ) -> Result<Option<String>, UnsigError> {
        let mut runtime = JsRuntime::new(RuntimeOptions::default());

        let setup = format!("{};{};var {}={}", global_vars, actions, binding, fn_source);
        runtime
            .execute_script("<cipher>", FastString::from(setup))
            .map_err(|e| UnsigError::Evaluation(format!("cipher snippet failed to evaluate: {e:?}")))?;

        let call = format!("{}({})", binding, serde_json::to_string(arg)?);
        let global = runtime
            .execute_script("<invoke>", FastString::from(call))
            .map_err(|e| UnsigError::Evaluation(format!("cipher invocation failed: {e:?}")))?;

        let scope = &mut runtime.handle_scope();
        let local = global.open(scope);
        if local.is_null_or_undefined() {
            return Ok(None);
        }
        Ok(Some(local.to_rust_string_lossy(scope)))
    }
}

/// Deletes `if (...) return <param>;` guards and bare `return <param>;`
/// statements from a function body.
fn sanitize_early_returns(fn_source: &str, param: &str) -> String {
    let mut sanitized = fn_source.to_string();

    if let Ok(re) = Regex::new(&format!(
        r"if\s*\([^{{}}]*?\)\s*return\s+{}\s*;?",
        regex::escape(param)
    )) {
        sanitized = re.replace_all(&sanitized, "").into_owned();
    }
    if let Ok(re) = Regex::new(&format!(r"return\s+{}\s*;?", regex::escape(param))) {
        sanitized = re.replace_all(&sanitized, "").into_owned();
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::extract::strip_short_circuit_guard;

    fn artifact(global_vars: &str, actions: &str, sig: &str, n: &str) -> CipherArtifact {
        CipherArtifact {
            source_script_url: "https://x/base.js".to_string(),
            timestamp: "19834".to_string(),
            global_vars: global_vars.to_string(),
            actions: actions.to_string(),
            sig_function: sig.to_string(),
            n_function: n.to_string(),
            raw_script: String::new(),
        }
    }

    const HELPERS: &str = concat!(
        "var HX={",
        "swap:function(b,c){var d=b[0];b[0]=b[c%b.length];b[c%b.length]=d},",
        "rev:function(b){b.reverse()},",
        "cut:function(b,c){b.splice(0,c)}",
        "}"
    );

    #[test]
    fn test_apply_matches_independent_computation() {
        let sig_fn = r#"function(p){p=p.split("");HX.swap(p,3);HX.rev(p);HX.cut(p,2);return p.join("")}"#;
        let art = artifact("var unused=\"a\".split(\"\")", HELPERS, sig_fn, "function(a){return a}");

        let input = "abcdefg";
        // Same operations computed directly: swap(0,3), reverse, drop first 2.
        let mut chars: Vec<char> = input.chars().collect();
        chars.swap(0, 3);
        chars.reverse();
        let expected: String = chars[2..].iter().collect();

        let engine = EvaluationEngine::new();
        assert_eq!(engine.apply(&art, input).unwrap(), expected);
    }

    #[test]
    fn test_apply_isolated_scopes_do_not_collide() {
        let sig_fn = r#"function(p){return gv.join("")+p}"#;
        let first = artifact("var gv=\"AB\".split(\"\")", "", sig_fn, "function(a){return a}");
        let second = artifact("var gv=\"BA\".split(\"\")", "", sig_fn, "function(a){return a}");

        let engine = EvaluationEngine::new();
        assert_eq!(engine.apply(&first, "x").unwrap(), "ABx");
        assert_eq!(engine.apply(&second, "x").unwrap(), "BAx");
        // The second artifact's globals must not leak into a later call.
        assert_eq!(engine.apply(&first, "x").unwrap(), "ABx");
    }

    #[test]
    fn test_apply_missing_function_is_an_error() {
        let art = artifact("var a=1", "", "undefinedHelper", "function(a){return a}");
        let engine = EvaluationEngine::new();
        assert!(matches!(
            engine.apply(&art, "sig"),
            Err(UnsigError::Evaluation(_))
        ));
    }

    #[test]
    fn test_apply_throwing_snippet_is_an_error() {
        let art = artifact(
            "var a=1",
            "",
            "function(p){return missingGlobal(p)}",
            "function(a){return a}",
        );
        let engine = EvaluationEngine::new();
        assert!(matches!(
            engine.apply(&art, "sig"),
            Err(UnsigError::Evaluation(_))
        ));
    }

    #[test]
    fn test_transform_is_deterministic_across_fresh_scopes() {
        let n_fn = r#"function(a){return a.split("").reverse().join("")}"#;
        let art = artifact("var a0=\"x\".split(\"\")", "", "function(p){return p}", n_fn);

        let engine = EvaluationEngine::new();
        let first = engine.transform(&art, "xyz").unwrap();
        let second = engine.transform(&art, "xyz").unwrap();
        assert_eq!(first, "zyx");
        assert_eq!(first, second);
    }

    #[test]
    fn test_transform_after_guard_stripping_returns_reversed() {
        let raw =
            r#"function(a){ if (typeof x==='undefined') return a; a=a.split("").reverse().join(""); return a; }"#;
        let art = artifact(
            "var a0=\"x\".split(\"\")",
            "",
            "function(p){return p}",
            &strip_short_circuit_guard(raw),
        );

        let engine = EvaluationEngine::new();
        assert_eq!(engine.transform(&art, "ABCDEF").unwrap(), "FEDCBA");
    }

    #[test]
    fn test_transform_sanitize_retry_on_surviving_guard() {
        // `typeof w>"u"` is a minified undefined check the extraction-time
        // guard stripper does not recognize; the retry path must catch it.
        let n_fn = r#"function(a){if(typeof w>"u")return a;var b=a.split("").reverse().join("");return b}"#;
        let art = artifact("var a0=\"x\".split(\"\")", "", "function(p){return p}", n_fn);

        let engine = EvaluationEngine::new();
        assert_eq!(engine.transform(&art, "abc").unwrap(), "cba");
    }

    #[test]
    fn test_transform_identity_result_stands_when_sanitizing_cannot_help() {
        let n_fn = "function(a){return a}";
        let art = artifact("var a0=\"x\".split(\"\")", "", "function(p){return p}", n_fn);

        let engine = EvaluationEngine::new();
        assert_eq!(engine.transform(&art, "same").unwrap(), "same");
    }

    #[test]
    fn test_transform_null_result_maps_to_empty() {
        let n_fn = "function(a){return null}";
        let art = artifact("var a0=\"x\".split(\"\")", "", "function(p){return p}", n_fn);

        let engine = EvaluationEngine::new();
        assert_eq!(engine.transform(&art, "abc").unwrap(), "");
    }

    #[test]
    fn test_sanitize_early_returns() {
        let src = "function(a){if(a.length)return a;var b=1;return a;return b}";
        let sanitized = sanitize_early_returns(src, "a");
        assert!(!sanitized.contains("return a"));
        assert!(sanitized.contains("return b"));
    }
}
