//! Player-script tracking and artifact caching
//!
//! Artifact reads are lock-free map lookups; every load (refreshing the
//! current script URL, or fetching and extracting a script body) serializes
//! behind one process-wide mutex. Loads happen on the order of hours to days
//! while resolutions happen per track, so one load in flight at a time is the
//! right tradeoff. The mutex payload is the diagnostics dedup set, which
//! shares the same lock by design.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cipher::extract::{extract_from_script, CipherArtifact};
use crate::error::UnsigError;
use crate::platform::transport::Transport;
use crate::utils::diagnostics::ScriptDump;
use crate::utils::url::{extract_between, normalize_script_url};

/// Page whose markup carries the current player-script URL token.
pub const EMBED_PAGE_URL: &str = "https://www.youtube.com/embed/";

const SCRIPT_URL_TOKEN_START: &str = "\"jsUrl\":\"";
const SCRIPT_URL_TOKEN_END: &str = "\"";

/// The currently known player-script URL, valid until `expire_at`.
#[derive(Debug, Clone)]
pub struct PlayerScriptHandle {
    pub url: String,
    pub expire_at: Instant,
}

/// Tracks the current script URL (time-boxed) and caches extraction results
/// per script URL for the process lifetime.
///
/// Independent instances may be configured with different pages and TTLs
/// (the embed page refreshed daily versus the homepage refreshed hourly);
/// they are separate caches.
pub struct PlayerScriptCache {
    page_url: String,
    ttl: Duration,
    handle: RwLock<Option<PlayerScriptHandle>>,
    artifacts: RwLock<HashMap<String, Arc<CipherArtifact>>>,
    load_lock: Mutex<HashSet<String>>,
    dump: ScriptDump,
}

impl PlayerScriptCache {
    /// Cache against the embed page with a 24 hour script-URL TTL.
    pub fn new() -> Self {
        Self {
            page_url: EMBED_PAGE_URL.to_string(),
            ttl: Duration::from_secs(24 * 60 * 60),
            handle: RwLock::new(None),
            artifacts: RwLock::new(HashMap::new()),
            load_lock: Mutex::new(HashSet::new()),
            dump: ScriptDump::new(),
        }
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_dump(mut self, dump: ScriptDump) -> Self {
        self.dump = dump;
        self
    }

    /// The current player-script URL token, refreshed through the load lock
    /// when absent or past expiry.
    pub async fn current_script_url(
        &self,
        transport: &dyn Transport,
    ) -> Result<String, UnsigError> {
        if let Some(url) = self.fresh_handle_url() {
            return Ok(url);
        }

        let _dumped = self.load_lock.lock().await;
        // Another caller may have refreshed while this one waited.
        if let Some(url) = self.fresh_handle_url() {
            return Ok(url);
        }

        let (status, page) = transport.get(&self.page_url).await?;
        if !(200..300).contains(&status) {
            return Err(UnsigError::ScriptRequest {
                status,
                url: self.page_url.clone(),
            });
        }

        let script_url = extract_between(&page, SCRIPT_URL_TOKEN_START, SCRIPT_URL_TOKEN_END)
            .ok_or(UnsigError::PlayerUrlNotFound)?
            .to_string();

        info!("fetched player script url: {}", script_url);
        *self.handle.write().unwrap() = Some(PlayerScriptHandle {
            url: script_url.clone(),
            expire_at: Instant::now() + self.ttl,
        });

        Ok(script_url)
    }

    /// The cached artifact for `script_url`, loading and extracting it under
    /// the load lock on a miss. Failed extractions are never cached; every
    /// later call retries.
    pub async fn artifact_for(
        &self,
        transport: &dyn Transport,
        script_url: &str,
    ) -> Result<Arc<CipherArtifact>, UnsigError> {
        if let Some(artifact) = self.artifacts.read().unwrap().get(script_url) {
            return Ok(artifact.clone());
        }

        let mut dumped = self.load_lock.lock().await;
        // Another caller may have just populated the entry.
        if let Some(artifact) = self.artifacts.read().unwrap().get(script_url) {
            return Ok(artifact.clone());
        }

        debug!("parsing player script {}", script_url);
        let fetch_url = normalize_script_url(script_url);
        let (status, body) = transport.get(&fetch_url).await?;
        if !(200..300).contains(&status) {
            return Err(UnsigError::ScriptRequest {
                status,
                url: script_url.to_string(),
            });
        }

        match extract_from_script(&body, script_url) {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                self.artifacts
                    .write()
                    .unwrap()
                    .insert(script_url.to_string(), artifact.clone());
                Ok(artifact)
            }
            Err(err) => {
                if let Some(kind) = err.extraction_kind() {
                    self.dump.write(
                        &mut dumped,
                        &body,
                        script_url,
                        &format!("must find {}", kind.friendly_name()),
                    );
                }
                Err(err)
            }
        }
    }

    /// The `signatureTimestamp` token of the current script, used by playback
    /// requests.
    pub async fn signature_timestamp(
        &self,
        transport: &dyn Transport,
    ) -> Result<String, UnsigError> {
        let script_url = self.current_script_url(transport).await?;
        let artifact = self.artifact_for(transport, &script_url).await?;
        Ok(artifact.timestamp.clone())
    }

    /// Dumps a problematic script once per source URL, sharing the dedup set
    /// guarded by the load lock.
    pub async fn dump_problematic(&self, script: &str, source_url: &str, reason: &str) {
        let mut dumped = self.load_lock.lock().await;
        self.dump.write(&mut dumped, script, source_url, reason);
    }

    fn fresh_handle_url(&self) -> Option<String> {
        let handle = self.handle.read().unwrap();
        handle
            .as_ref()
            .filter(|h| h.expire_at > Instant::now())
            .map(|h| h.url.clone())
    }
}

impl Default for PlayerScriptCache {
    fn default() -> Self {
        Self::new()
    }
}
