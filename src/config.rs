//! Host-level options
//!
//! The host decides which resolution modes are allowed and, for the remote
//! deployment, where decode requests go. Loading these from files or the
//! environment is the host's concern.

/// Options consumed by the surrounding integration.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub allow_search: bool,
    pub allow_direct_video_ids: bool,
    pub allow_direct_playlist_ids: bool,
    /// Remote decode endpoint; `None` selects local extraction and evaluation.
    pub cipher_endpoint: Option<String>,
    pub cipher_bearer_token: Option<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            allow_search: true,
            allow_direct_video_ids: true,
            allow_direct_playlist_ids: true,
            cipher_endpoint: None,
            cipher_bearer_token: None,
        }
    }
}

impl ResolverOptions {
    pub fn with_search(mut self, allow: bool) -> Self {
        self.allow_search = allow;
        self
    }

    pub fn with_direct_video_ids(mut self, allow: bool) -> Self {
        self.allow_direct_video_ids = allow;
        self
    }

    pub fn with_direct_playlist_ids(mut self, allow: bool) -> Self {
        self.allow_direct_playlist_ids = allow;
        self
    }

    pub fn with_cipher_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.cipher_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_cipher_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.cipher_bearer_token = Some(token.into());
        self
    }
}
