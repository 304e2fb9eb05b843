//! # unsig - playback URL resolution for obfuscated player scripts
//!
//! A streaming platform obfuscates two query values on its media URLs, a
//! "signature" and a throttling "n" parameter, using JavaScript shipped with
//! each deployment of its player script. This crate locates the decoding
//! functions inside that script, executes them in isolated scopes, caches the
//! extraction per script URL, and falls back gracefully when the script's
//! internal structure drifts.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use unsig::{HttpTransport, PlayerScriptCache, StreamFormat, UrlResolver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::new()?;
//!     let cache = Arc::new(PlayerScriptCache::new());
//!     let resolver = UrlResolver::new(cache.clone());
//!
//!     let script_url = cache.current_script_url(&transport).await?;
//!     let format = StreamFormat {
//!         url: "https://host/videoplayback?id=1".to_string(),
//!         signature: Some("OBFUSCATED".to_string()),
//!         ..Default::default()
//!     };
//!     let url = resolver
//!         .resolve_format_url(&transport, &script_url, &format)
//!         .await?;
//!     println!("playable: {url}");
//!
//!     Ok(())
//! }
//! ```

pub mod cipher;
pub mod config;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use cipher::{CipherArtifact, EvaluationEngine, NParamFallback};
pub use config::ResolverOptions;
pub use error::{ExtractionFailureKind, UnsigError};
pub use platform::{
    HttpTransport, PlayerScriptCache, PlayerScriptHandle, RemoteCipherClient, SentinelRules,
    StreamFormat, Transport, UrlResolver,
};
pub use utils::ScriptDump;

/// Result type alias for unsig operations
pub type Result<T> = std::result::Result<T, UnsigError>;
