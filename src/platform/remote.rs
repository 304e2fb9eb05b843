//! Remote cipher deployment
//!
//! Alternate mode that delegates decode work to an external service instead
//! of local extraction and evaluation. Stateless locally; any non-2xx
//! response or missing response field is a hard failure for that parameter.
//! Correctness is the remote service's problem, there is no fallback chain.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::ResolverOptions;
use crate::error::UnsigError;
use crate::platform::resolver::StreamFormat;
use crate::platform::transport::Transport;
use crate::utils::url::set_query_param;

#[derive(Debug, Serialize)]
struct RemoteDecodeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    encrypted_signature: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_param: Option<&'a str>,
    player_url: &'a str,
    video_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct RemoteDecodeResponse {
    decrypted_signature: Option<String>,
    decrypted_n_sig: Option<String>,
}

/// Client for a remote decode endpoint with bearer-token authorization.
#[derive(Debug, Clone)]
pub struct RemoteCipherClient {
    endpoint: String,
    bearer_token: String,
}

impl RemoteCipherClient {
    pub fn new(endpoint: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Builds a client from host options; fails when no endpoint is configured.
    pub fn from_options(options: &ResolverOptions) -> Result<Self, UnsigError> {
        let endpoint = options
            .cipher_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(UnsigError::RemoteNotConfigured)?;
        Ok(Self::new(
            endpoint,
            options.cipher_bearer_token.clone().unwrap_or_default(),
        ))
    }

    /// Same contract as the local resolver: returns the playback URL with the
    /// signature and n parameters replaced by the service's decoded values.
    pub async fn resolve_format_url(
        &self,
        transport: &dyn Transport,
        player_url: &str,
        video_id: &str,
        format: &StreamFormat,
    ) -> Result<Url, UnsigError> {
        let mut url = Url::parse(&format.url)?;

        let signature = format.signature.as_deref().filter(|s| !s.is_empty());
        let n_parameter = format.n_parameter.as_deref().filter(|s| !s.is_empty());

        let request = RemoteDecodeRequest {
            encrypted_signature: signature,
            n_param: n_parameter,
            player_url,
            video_id,
        };

        debug!("requesting remote decode for video {}", video_id);
        let headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.bearer_token),
        )];
        let (status, text) = transport
            .post_json(&self.endpoint, &headers, serde_json::to_string(&request)?)
            .await?;

        if !(200..300).contains(&status) {
            return Err(UnsigError::RemoteStatus(status));
        }
        let response: RemoteDecodeResponse = serde_json::from_str(&text)?;

        if signature.is_some() {
            let decoded = response
                .decrypted_signature
                .as_deref()
                .ok_or(UnsigError::RemoteMissingField("decrypted_signature"))?;
            set_query_param(&mut url, format.signature_key(), decoded);
        }

        if n_parameter.is_some() {
            let decoded = response
                .decrypted_n_sig
                .as_deref()
                .ok_or(UnsigError::RemoteMissingField("decrypted_n_sig"))?;
            set_query_param(&mut url, "n", decoded);
        }

        Ok(url)
    }
}
