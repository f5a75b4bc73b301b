// 🔏 Request Signer - time-bounded ed25519 signatures for registry calls
//
// Signature base (newline separated, no trailing newline):
//   (created): <created>
//   (expires): <expires>
//   digest: BLAKE-512=<base64 blake2b-512 of the body>
//
// The base is signed with the subscriber's ed25519 key and carried in an
// Authorization header of the form:
//   Signature keyId="<sub>|<ukid>|ed25519",algorithm="ed25519",created="..",
//   expires="..",headers="(created) (expires) digest",signature=".."

use crate::config::Config;
use crate::error::{Result, SyncError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use std::fmt;
use std::str::FromStr;

pub const ALGORITHM: &str = "ed25519";
pub const SIGNED_HEADERS: &str = "(created) (expires) digest";

/// Validity window for outbound lookup signatures (seconds)
pub const SIGNATURE_TTL_SECS: i64 = 30;

/// Clock difference tolerated on either edge of an inbound validity window
pub const MAX_CLOCK_SKEW_SECS: i64 = 5;

// ============================================================================
// PROTOCOL PRIMITIVES
// ============================================================================

/// Base64 BLAKE2b-512 digest of a request body
pub fn digest_payload(payload: &[u8]) -> String {
    STANDARD.encode(Blake2b512::digest(payload))
}

/// Canonical string that gets signed. Shared by signing and verification.
pub fn signature_base(created: i64, expires: i64, payload: &[u8]) -> String {
    format!(
        "(created): {}\n(expires): {}\ndigest: BLAKE-512={}",
        created,
        expires,
        digest_payload(payload)
    )
}

/// Sign a payload, returning the base64 signature.
///
/// `private_key` is base64 of either the 64-byte keypair or the 32-byte seed.
pub fn sign_request(private_key: &str, payload: &[u8], created: i64, ttl: i64) -> Result<String> {
    let signing_key = decode_signing_key(private_key)?;
    Ok(sign_with(&signing_key, payload, created, created + ttl))
}

/// Recompute the signature base and check `signature` against it.
///
/// Returns `Ok(false)` for a well-formed but wrong signature; malformed
/// base64 is an `Encoding` error.
pub fn verify_request(
    public_key: &str,
    payload: &[u8],
    created: i64,
    expires: i64,
    signature: &str,
) -> Result<bool> {
    let verifying_key = decode_verifying_key(public_key)?;

    let signature_bytes = STANDARD
        .decode(signature.trim())
        .map_err(|e| SyncError::Encoding(format!("unable to base64 decode received signature: {e}")))?;
    let signature = match Signature::from_slice(&signature_bytes) {
        Ok(signature) => signature,
        Err(_) => return Ok(false),
    };

    let base = signature_base(created, expires, payload);
    Ok(verifying_key.verify(base.as_bytes(), &signature).is_ok())
}

/// Freshly generated signing keys, both base64-encoded
#[derive(Clone)]
pub struct KeyPair {
    /// 32-byte ed25519 public key
    pub public_key: String,

    /// 64-byte keypair (seed || public key)
    pub private_key: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Generate a new ed25519 keypair for provisioning.
pub fn generate_signing_keys() -> KeyPair {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);

    KeyPair {
        public_key: STANDARD.encode(signing_key.verifying_key().to_bytes()),
        private_key: STANDARD.encode(signing_key.to_keypair_bytes()),
    }
}

fn sign_with(signing_key: &SigningKey, payload: &[u8], created: i64, expires: i64) -> String {
    let base = signature_base(created, expires, payload);
    STANDARD.encode(signing_key.sign(base.as_bytes()).to_bytes())
}

fn decode_signing_key(private_key: &str) -> Result<SigningKey> {
    let private_key = private_key.trim();
    if private_key.is_empty() {
        return Err(SyncError::Configuration("PRIVATE_KEY not configured".to_string()));
    }

    let bytes = STANDARD
        .decode(private_key)
        .map_err(|e| SyncError::Encoding(format!("error decoding signing private key: {e}")))?;

    match bytes.len() {
        64 => {
            let mut keypair = [0u8; 64];
            keypair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&keypair).map_err(|_| {
                SyncError::Configuration("signing keypair halves do not match".to_string())
            })
        }
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        len => Err(SyncError::Configuration(format!(
            "signing private key must be 32 or 64 bytes, got {len}"
        ))),
    }
}

fn decode_verifying_key(public_key: &str) -> Result<VerifyingKey> {
    let bytes = STANDARD
        .decode(public_key.trim())
        .map_err(|e| SyncError::Encoding(format!("error decoding public key: {e}")))?;

    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| SyncError::Crypto(format!("public key must be 32 bytes, got {}", bytes.len())))?;

    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| SyncError::Crypto(format!("invalid ed25519 public key: {e}")))
}

// ============================================================================
// AUTHORIZATION HEADER
// ============================================================================

/// Parsed form of the `Signature ...` Authorization header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeader {
    pub subscriber_id: String,
    pub unique_key_id: String,
    pub algorithm: String,
    pub created: i64,
    pub expires: i64,
    pub headers: String,
    pub signature: String,
}

impl fmt::Display for AuthorizationHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"Signature keyId="{}|{}|{}",algorithm="{}",created="{}",expires="{}",headers="{}",signature="{}""#,
            self.subscriber_id,
            self.unique_key_id,
            self.algorithm,
            self.algorithm,
            self.created,
            self.expires,
            self.headers,
            self.signature
        )
    }
}

impl FromStr for AuthorizationHeader {
    type Err = SyncError;

    fn from_str(raw: &str) -> Result<Self> {
        let malformed = |what: &str| SyncError::Encoding(format!("malformed authorization header: {what}"));

        let mut rest = raw
            .trim()
            .strip_prefix("Signature ")
            .ok_or_else(|| malformed("missing Signature scheme"))?;

        let mut key_id = None;
        let mut algorithm = None;
        let mut created = None;
        let mut expires = None;
        let mut headers = None;
        let mut signature = None;

        while !rest.is_empty() {
            let eq = rest.find('=').ok_or_else(|| malformed("expected key=value"))?;
            let key = rest[..eq].trim();
            let after = rest[eq + 1..]
                .strip_prefix('"')
                .ok_or_else(|| malformed("unquoted value"))?;
            let close = after.find('"').ok_or_else(|| malformed("unterminated value"))?;
            let value = after[..close].to_string();
            rest = after[close + 1..].trim_start_matches(',').trim_start();

            match key {
                "keyId" => key_id = Some(value),
                "algorithm" => algorithm = Some(value),
                "created" => created = Some(value.parse::<i64>().map_err(|_| malformed("created"))?),
                "expires" => expires = Some(value.parse::<i64>().map_err(|_| malformed("expires"))?),
                "headers" => headers = Some(value),
                "signature" => signature = Some(value),
                _ => {}
            }
        }

        let key_id = key_id.ok_or_else(|| malformed("missing keyId"))?;
        let mut parts = key_id.splitn(3, '|');
        let subscriber_id = parts.next().unwrap_or_default().to_string();
        let unique_key_id = parts.next().ok_or_else(|| malformed("keyId"))?.to_string();
        let key_algorithm = parts.next().ok_or_else(|| malformed("keyId"))?.to_string();

        Ok(AuthorizationHeader {
            subscriber_id,
            unique_key_id,
            algorithm: algorithm.unwrap_or(key_algorithm),
            created: created.ok_or_else(|| malformed("missing created"))?,
            expires: expires.ok_or_else(|| malformed("missing expires"))?,
            headers: headers.unwrap_or_else(|| SIGNED_HEADERS.to_string()),
            signature: signature.ok_or_else(|| malformed("missing signature"))?,
        })
    }
}

// ============================================================================
// SIGNER
// ============================================================================

/// Holds our signing identity and produces Authorization headers
pub struct Signer {
    subscriber_id: String,
    unique_key_id: String,
    signing_key: SigningKey,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("subscriber_id", &self.subscriber_id)
            .field("unique_key_id", &self.unique_key_id)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(
        private_key: Option<&str>,
        subscriber_id: impl Into<String>,
        unique_key_id: impl Into<String>,
    ) -> Result<Self> {
        let private_key =
            private_key.ok_or_else(|| SyncError::Configuration("PRIVATE_KEY not configured".to_string()))?;

        Ok(Signer {
            subscriber_id: subscriber_id.into(),
            unique_key_id: unique_key_id.into(),
            signing_key: decode_signing_key(private_key)?,
        })
    }

    /// Fails before any network call when key material or key ids are missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let subscriber_id = config
            .subscriber_id
            .clone()
            .ok_or_else(|| SyncError::Configuration("SUBSCRIBER_ID not configured".to_string()))?;
        let unique_key_id = config
            .unique_key_id
            .clone()
            .ok_or_else(|| SyncError::Configuration("UNIQUE_KEY_ID not configured".to_string()))?;

        Signer::new(config.private_key.as_deref(), subscriber_id, unique_key_id)
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    /// Base64 public half, as registered with the registry
    pub fn public_key(&self) -> String {
        STANDARD.encode(self.signing_key.verifying_key().to_bytes())
    }

    pub fn authorization_header(&self, payload: &[u8], created: i64, ttl: i64) -> AuthorizationHeader {
        let expires = created + ttl;

        AuthorizationHeader {
            subscriber_id: self.subscriber_id.clone(),
            unique_key_id: self.unique_key_id.clone(),
            algorithm: ALGORITHM.to_string(),
            created,
            expires,
            headers: SIGNED_HEADERS.to_string(),
            signature: sign_with(&self.signing_key, payload, created, expires),
        }
    }
}

/// Verify an inbound Authorization header.
///
/// Rejects headers outside their validity window relative to `now`
/// (unix seconds), give or take `MAX_CLOCK_SKEW_SECS`, before checking
/// the signature itself.
pub fn verify_header(
    public_key: &str,
    payload: &[u8],
    header: &AuthorizationHeader,
    now: i64,
) -> Result<bool> {
    if header.algorithm != ALGORITHM
        || header.created > now + MAX_CLOCK_SKEW_SECS
        || header.expires < now - MAX_CLOCK_SKEW_SECS
    {
        return Ok(false);
    }
    verify_request(public_key, payload, header.created, header.expires, &header.signature)
}
