//! Permissive re-derivation of the n function
//!
//! Used only when the primary pipeline's n result is judged unusable. Looks
//! for the property-form shape `N: function(args) {...}`, which the primary
//! function patterns do not cover, and wraps its body in a minimal standalone
//! function for isolated evaluation.

use tracing::debug;

use crate::cipher::eval::EvaluationEngine;
use crate::cipher::patterns::N_PROPERTY_HEADER;
use crate::cipher::scan::matching_brace_end;
use crate::error::UnsigError;

const FALLBACK_BINDING: &str = "transform_n_fallback";

/// A standalone n transformer rebuilt from the property-form function shape.
#[derive(Debug)]
pub struct NParamFallback {
    /// `None` when the located function takes no parameters, which means the
    /// script performs no n transform at all.
    wrapped_source: Option<String>,
}

impl NParamFallback {
    /// Locates the property-form n function in `script` and prepares a
    /// wrapper bound to its first declared parameter.
    pub fn from_script(script: &str) -> Result<Self, UnsigError> {
        let caps = N_PROPERTY_HEADER
            .captures(script)
            .ok_or(UnsigError::NPropertyNotFound)?;

        let body_start = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let body_end = matching_brace_end(script, body_start)?;
        let body = &script[body_start..body_end];

        let params = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        let first_param = params
            .split(',')
            .next()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let wrapped_source = first_param.map(|param| {
            format!("function(a){{var {param}=a;{body}}}")
        });

        if wrapped_source.is_none() {
            debug!("property-form n function takes no parameters, treating as no transform");
        }

        Ok(Self { wrapped_source })
    }

    /// Transforms an n value. A zero-parameter function, a null-ish result,
    /// or a result equal to the input all mean "no transform": the input is
    /// returned unchanged.
    pub fn transform(&self, input: &str) -> Result<String, UnsigError> {
        let Some(wrapped) = &self.wrapped_source else {
            return Ok(input.to_string());
        };

        let engine = EvaluationEngine::new();
        match engine.invoke("", "", FALLBACK_BINDING, wrapped, input)? {
            Some(result) if result != input => Ok(result),
            _ => Ok(input.to_string()),
        }
    }
}
