// 🌐 Registry Client - authenticated subscriber lookup per domain
//
// One POST per domain: {"country":"IND","type":"BPP","domain":"<domain>"}.
// Every attempt is signed afresh; transport errors and 429/5xx responses
// are retried with a fixed backoff, anything else non-200 fails at once.

use crate::config::{Config, RetryPolicy};
use crate::error::{Result, SyncError};
use crate::signer::{Signer, SIGNATURE_TTL_SECS};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

/// Only Indian network participants are looked up
pub const LOOKUP_COUNTRY: &str = "IND";

/// Participant type for seller-side platforms
pub const SELLER_PLATFORM_TYPE: &str = "BPP";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub country: String,

    #[serde(rename = "type")]
    pub participant_type: String,

    pub domain: String,
}

impl LookupRequest {
    pub fn for_domain(domain: &str) -> Self {
        LookupRequest {
            country: LOOKUP_COUNTRY.to_string(),
            participant_type: SELLER_PLATFORM_TYPE.to_string(),
            domain: domain.to_string(),
        }
    }
}

/// One entry of the registry lookup response.
///
/// Timestamps are kept as the registry's RFC3339 strings; the engine
/// parses the validity window when mapping into a seller record. Absent
/// and `null` fields both decode as empty strings, so one sparse entry
/// never costs the rest of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subscriber {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subscriber_id: String,

    #[serde(rename = "ukId", default, deserialize_with = "null_as_empty")]
    pub uk_id: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub br_id: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub domain: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub country: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,

    #[serde(rename = "signing_public_key", default, deserialize_with = "null_as_empty")]
    pub signing_key: String,

    #[serde(rename = "encr_public_key", default, deserialize_with = "null_as_empty")]
    pub encryption_key: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub valid_from: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub valid_until: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub created: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub updated: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// LOOKUP SEAM
// ============================================================================

/// Source of registry snapshots, one domain at a time
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    async fn fetch_subscribers(&self, domain: &str) -> Result<Vec<Subscriber>>;
}

enum AttemptError {
    /// Worth another try after the backoff delay
    Transient(SyncError),
    Fatal(SyncError),
}

pub struct RegistryClient {
    http: reqwest::Client,
    registry_url: String,
    signer: Signer,
    retry: RetryPolicy,
}

impl RegistryClient {
    pub fn new(registry_url: impl Into<String>, signer: Signer, retry: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build http client: {e}")))?;

        Ok(RegistryClient {
            http,
            registry_url: registry_url.into(),
            signer,
            retry,
        })
    }

    /// Builds the signer first, so missing key material fails here.
    pub fn from_config(config: &Config) -> Result<Self> {
        let signer = Signer::from_config(config)?;
        RegistryClient::new(config.registry_url.clone(), signer, config.retry)
    }

    async fn attempt(&self, body: &[u8]) -> std::result::Result<Vec<Subscriber>, AttemptError> {
        let header = self
            .signer
            .authorization_header(body, Utc::now().timestamp(), SIGNATURE_TTL_SECS);

        let response = self
            .http
            .post(&self.registry_url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, header.to_string())
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| AttemptError::Transient(SyncError::Upstream(format!("request failed: {e}"))))?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            let err = SyncError::Upstream(format!(
                "API request failed with status {}: {}",
                status.as_u16(),
                text
            ));
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                AttemptError::Transient(err)
            } else {
                AttemptError::Fatal(err)
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttemptError::Transient(SyncError::Upstream(format!("reading response body: {e}"))))?;

        serde_json::from_slice::<Vec<Subscriber>>(&bytes).map_err(|e| {
            AttemptError::Fatal(SyncError::Upstream(format!("invalid lookup response: {e}")))
        })
    }
}

#[async_trait]
impl RegistryLookup for RegistryClient {
    async fn fetch_subscribers(&self, domain: &str) -> Result<Vec<Subscriber>> {
        let body = serde_json::to_vec(&LookupRequest::for_domain(domain))?;
        let attempts = self.retry.attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.attempt(&body).await {
                Ok(subscribers) => {
                    tracing::debug!(domain, attempt, count = subscribers.len(), "registry lookup ok");
                    return Ok(subscribers);
                }
                Err(AttemptError::Fatal(err)) => return Err(err.context(format!("lookup {domain}"))),
                Err(AttemptError::Transient(err)) => {
                    tracing::warn!(
                        domain,
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "registry lookup attempt failed"
                    );
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.retry.backoff_delay).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(SyncError::Upstream(format!(
            "lookup {domain}: giving up after {attempts} attempts: {reason}"
        )))
    }
}
