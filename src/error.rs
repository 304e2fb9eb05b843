//! Error types for unsig

use thiserror::Error;

/// The specific structural artifact that could not be located in a player script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailureKind {
    TimestampNotFound,
    VariablesNotFound,
    ActionsNotFound,
    SigFunctionNotFound,
    NFunctionNotFound,
}

impl ExtractionFailureKind {
    /// Human-readable label used in logs and dump reasons.
    pub fn friendly_name(&self) -> &'static str {
        match self {
            ExtractionFailureKind::TimestampNotFound => "script timestamp",
            ExtractionFailureKind::VariablesNotFound => "global variables",
            ExtractionFailureKind::ActionsNotFound => "sig actions",
            ExtractionFailureKind::SigFunctionNotFound => "decipher function",
            ExtractionFailureKind::NFunctionNotFound => "n function",
        }
    }
}

/// Main error type for unsig operations
#[derive(Debug, Error)]
pub enum UnsigError {
    #[error("must find {} from script: {url}", .kind.friendly_name())]
    Extraction {
        kind: ExtractionFailureKind,
        url: String,
    },

    #[error("unterminated function body at offset {0}")]
    UnterminatedBody(usize),

    #[error("property-form n function not found in player script")]
    NPropertyNotFound,

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("received non-success response code {status} from {url}")]
    ScriptRequest { status: u16, url: String },

    #[error("no script url token found in page body")]
    PlayerUrlNotFound,

    #[error("remote cipher request failed with status {0}")]
    RemoteStatus(u16),

    #[error("remote cipher response missing field {0}")]
    RemoteMissingField(&'static str),

    #[error("remote cipher endpoint not configured")]
    RemoteNotConfigured,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UnsigError {
    /// Extraction failure kind, if this error is one.
    pub fn extraction_kind(&self) -> Option<ExtractionFailureKind> {
        match self {
            UnsigError::Extraction { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_message() {
        let err = UnsigError::Extraction {
            kind: ExtractionFailureKind::NFunctionNotFound,
            url: "https://x/base.js".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "must find n function from script: https://x/base.js"
        );
        assert_eq!(
            err.extraction_kind(),
            Some(ExtractionFailureKind::NFunctionNotFound)
        );
    }

    #[test]
    fn test_non_extraction_error_has_no_kind() {
        assert!(UnsigError::PlayerUrlNotFound.extraction_kind().is_none());
    }
}
