//! Attendance token issuance and verification.
//!
//! A token is a compact dot-separated string
//! `session_id.issued_at.expires_at.nonce.signature` where the
//! signature is an HMAC-SHA256 over the four preceding fields,
//! base64url-encoded without padding. Signing all four fields means a
//! client cannot extend validity by tampering with the expiry field
//! alone; verification additionally bounds `now - issued_at` by the
//! validity window, so both time checks must pass independently.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Verification failure reasons.
///
/// Distinguished here for the engine's own logging and tests; the
/// recorder collapses everything except `Malformed` into a single
/// client-visible rejection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token could not be parsed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signature mismatch")]
    BadSignature,
}

/// Decoded claims of a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassToken {
    pub session_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
}

/// A freshly issued token: the wire string plus its claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub encoded: String,
    pub claims: PassToken,
}

/// Signs and verifies short-lived attendance tokens.
///
/// Pure over its random source: issuing has no side effects, the
/// caller persists the result.
pub struct TokenCodec {
    key: Vec<u8>,
    validity: Duration,
}

impl TokenCodec {
    pub fn new(key: impl Into<Vec<u8>>, validity_secs: u64) -> Self {
        Self {
            key: key.into(),
            validity: Duration::seconds(validity_secs as i64),
        }
    }

    /// The validity window, which is also the rotation period.
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issue a signed token for `session_id`, valid from `now` for one
    /// validity window.
    pub fn issue(&self, session_id: Uuid, now: DateTime<Utc>) -> IssuedToken {
        let issued_at = now;
        let expires_at = now + self.validity;
        let nonce = generate_nonce();

        let message = signing_input(
            session_id,
            issued_at.timestamp(),
            expires_at.timestamp(),
            &nonce,
        );
        let signature = self.sign(&message);

        IssuedToken {
            encoded: format!("{message}.{signature}"),
            claims: PassToken {
                session_id,
                // Round-trip through unix seconds so the claims match
                // what verification will reconstruct from the wire.
                issued_at: DateTime::from_timestamp(issued_at.timestamp(), 0)
                    .unwrap_or(issued_at),
                expires_at: DateTime::from_timestamp(expires_at.timestamp(), 0)
                    .unwrap_or(expires_at),
                nonce,
            },
        }
    }

    /// Verify a token string at time `now` and return its claims.
    ///
    /// Checks, in order: structure, signature (constant-time), the
    /// expiry bound, and the independent issued-at bound.
    pub fn verify(&self, raw: &str, now: DateTime<Utc>) -> Result<PassToken, TokenError> {
        let parts: Vec<&str> = raw.split('.').collect();
        let [sid, iat, exp, nonce, sig] = parts.as_slice() else {
            return Err(TokenError::Malformed);
        };

        let session_id = Uuid::parse_str(sid).map_err(|_| TokenError::Malformed)?;
        let issued_secs: i64 = iat.parse().map_err(|_| TokenError::Malformed)?;
        let expires_secs: i64 = exp.parse().map_err(|_| TokenError::Malformed)?;
        if nonce.is_empty() {
            return Err(TokenError::Malformed);
        }
        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig)
            .map_err(|_| TokenError::Malformed)?;

        let message = signing_input(session_id, issued_secs, expires_secs, nonce);
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        mac.verify_slice(&sig_bytes)
            .map_err(|_| TokenError::BadSignature)?;

        let issued_at =
            DateTime::from_timestamp(issued_secs, 0).ok_or(TokenError::Malformed)?;
        let expires_at =
            DateTime::from_timestamp(expires_secs, 0).ok_or(TokenError::Malformed)?;

        if now > expires_at {
            return Err(TokenError::Expired);
        }
        if now - issued_at > self.validity {
            return Err(TokenError::Expired);
        }

        Ok(PassToken {
            session_id,
            issued_at,
            expires_at,
            nonce: (*nonce).to_string(),
        })
    }

    fn sign(&self, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

fn signing_input(session_id: Uuid, issued_secs: i64, expires_secs: i64, nonce: &str) -> String {
    format!("{session_id}.{issued_secs}.{expires_secs}.{nonce}")
}

/// Cryptographically random nonce (16 bytes, base64url, no padding).
fn generate_nonce() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}
