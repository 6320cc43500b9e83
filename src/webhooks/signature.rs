//! Webhook signature verification.
//!
//! The carrier signs `timestamp + "." + rawBody` with RSA-SHA256 and ships
//! the signature base64-encoded alongside a key ID. Keys are published in a
//! key set document fetched from a configured URL and cached; an unknown key
//! ID triggers one refetch before rejection so carrier key rotation does not
//! drop webhooks.
//!
//! Timestamps more than five minutes from current time are rejected before
//! any cryptography runs — replay protection is independent of signature
//! validity.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::{BigUint, RsaPublicKey};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Maximum allowed distance between the signed timestamp and current time.
pub const REPLAY_WINDOW_SECS: i64 = 300;

/// How long a fetched key set stays fresh.
pub const KEY_SET_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("timestamp is not valid RFC 3339: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error("timestamp outside replay window ({skew_seconds}s from now)")]
    StaleTimestamp { skew_seconds: i64 },

    #[error("unknown signing key id {0:?}")]
    UnknownKeyId(String),

    #[error("signature is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("key set fetch failed: {0}")]
    KeyFetch(#[from] reqwest::Error),

    #[error("malformed key in key set: {0}")]
    InvalidKey(String),
}

/// Resolves a carrier key ID to its RSA public key.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, key_id: &str) -> Result<RsaPublicKey, SignatureError>;
}

/// Verifies a webhook request's signature headers against its raw body.
///
/// Check order matters: the replay window is enforced before any key lookup
/// or cryptography, so a replayed request cannot even cost a key-set fetch.
pub async fn verify_webhook(
    resolver: &dyn KeyResolver,
    key_id: &str,
    timestamp: &str,
    signature_b64: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let signed_at = DateTime::parse_from_rfc3339(timestamp)?.with_timezone(&Utc);
    let skew_seconds = (now - signed_at).num_seconds().abs();
    if skew_seconds > REPLAY_WINDOW_SECS {
        return Err(SignatureError::StaleTimestamp { skew_seconds });
    }

    let key = resolver.resolve(key_id).await?;

    let signature_bytes = STANDARD.decode(signature_b64)?;
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|_| SignatureError::InvalidSignature)?;

    let mut message = Vec::with_capacity(timestamp.len() + 1 + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(body);

    VerifyingKey::<Sha256>::new(key)
        .verify(&message, &signature)
        .map_err(|_| SignatureError::InvalidSignature)
}

/// A fixed in-process key set. Used by tests and deployments with pinned
/// carrier keys.
#[derive(Default)]
pub struct StaticKeyResolver {
    keys: HashMap<String, RsaPublicKey>,
}

impl StaticKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key_id: impl Into<String>, key: RsaPublicKey) -> Self {
        self.keys.insert(key_id.into(), key);
        self
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, key_id: &str) -> Result<RsaPublicKey, SignatureError> {
        self.keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| SignatureError::UnknownKeyId(key_id.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct KeySetDocument {
    keys: Vec<PublishedKey>,
}

/// One key in the carrier's published key set: RSA modulus and exponent as
/// base64url (no padding) big-endian bytes.
#[derive(Debug, Deserialize)]
struct PublishedKey {
    kid: String,
    n: String,
    e: String,
}

fn decode_key_set(doc: KeySetDocument) -> Result<HashMap<String, RsaPublicKey>, SignatureError> {
    let mut keys = HashMap::with_capacity(doc.keys.len());
    for published in doc.keys {
        let n = URL_SAFE_NO_PAD
            .decode(&published.n)
            .map_err(|e| SignatureError::InvalidKey(format!("{}: bad modulus: {e}", published.kid)))?;
        let e = URL_SAFE_NO_PAD
            .decode(&published.e)
            .map_err(|e| SignatureError::InvalidKey(format!("{}: bad exponent: {e}", published.kid)))?;
        let key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
            .map_err(|e| SignatureError::InvalidKey(format!("{}: {e}", published.kid)))?;
        keys.insert(published.kid, key);
    }
    Ok(keys)
}

struct CachedKeySet {
    keys: HashMap<String, RsaPublicKey>,
    fetched_at: Instant,
}

/// Key resolver backed by the carrier's published key set URL.
///
/// The set is cached for [`KEY_SET_TTL`]; a lookup that misses the cache
/// (stale, or the key ID is simply not there) refetches once before
/// rejecting, which is what makes carrier key rotation seamless.
pub struct KeySetCache {
    url: String,
    client: reqwest::Client,
    ttl: Duration,
    cached: RwLock<Option<CachedKeySet>>,
}

impl KeySetCache {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        KeySetCache {
            url: url.into(),
            client,
            ttl: KEY_SET_TTL,
            cached: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<HashMap<String, RsaPublicKey>, SignatureError> {
        debug!(url = %self.url, "fetching carrier key set");
        let doc: KeySetDocument = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        decode_key_set(doc)
    }
}

#[async_trait]
impl KeyResolver for KeySetCache {
    async fn resolve(&self, key_id: &str) -> Result<RsaPublicKey, SignatureError> {
        {
            let guard = self.cached.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    if let Some(key) = cached.keys.get(key_id) {
                        return Ok(key.clone());
                    }
                    warn!(key_id, "key id not in cached set; refetching");
                }
            }
        }

        let keys = self.fetch().await?;
        let key = keys.get(key_id).cloned();
        *self.cached.write().await = Some(CachedKeySet {
            keys,
            fetched_at: Instant::now(),
        });
        key.ok_or_else(|| SignatureError::UnknownKeyId(key_id.to_string()))
    }
}
