//! # Secure cookie codec
//!
//! Authenticated, encrypted cookie values. The payload is JSON, encrypted with
//! XChaCha20-Poly1305 under the block key (the cookie name is bound as
//! associated data). The envelope `timestamp|ciphertext` is then MAC'd with
//! HMAC-SHA256 under the independent hash key:
//!
//! ```text
//! base64url( "{ts}|{base64url(nonce ‖ ciphertext)}|{base64url(hmac)}" )
//! hmac = HMAC(hash_key, "{name}|{ts}|{base64url(nonce ‖ ciphertext)}")
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use crate::keys::{random_bytes, CookieKeys};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 24;
/// Tolerated clock drift for timestamps from the future.
const MAX_SKEW_SECS: i64 = 60;

#[derive(Error, Debug)]
pub enum CookieError {
    #[error("malformed cookie value")]
    Malformed,
    #[error("cookie MAC mismatch")]
    InvalidMac,
    #[error("cookie expired")]
    Expired,
    #[error("cookie decryption failed")]
    Decrypt,
    #[error("cookie payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("invalid key: {0}")]
    Key(String),
}

pub struct SecureCookie {
    keys: CookieKeys,
}

impl SecureCookie {
    pub fn new(keys: CookieKeys) -> Self {
        Self { keys }
    }

    pub fn encode<T: Serialize>(&self, name: &str, value: &T) -> Result<String, CookieError> {
        self.encode_at(name, value, chrono::Utc::now().timestamp())
    }

    /// Decodes a value issued at most `max_age_secs` ago.
    pub fn decode<T: DeserializeOwned>(
        &self,
        name: &str,
        token: &str,
        max_age_secs: i64,
    ) -> Result<T, CookieError> {
        self.decode_at(name, token, max_age_secs, chrono::Utc::now().timestamp())
    }

    pub(crate) fn encode_at<T: Serialize>(
        &self,
        name: &str,
        value: &T,
        now: i64,
    ) -> Result<String, CookieError> {
        let plain = serde_json::to_vec(value)?;

        let nonce = random_bytes(NONCE_LEN).map_err(|e| CookieError::Key(e.to_string()))?;
        let cipher = XChaCha20Poly1305::new_from_slice(self.keys.block_key.expose_secret())
            .map_err(|e| CookieError::Key(e.to_string()))?;
        let sealed = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &plain,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|_| CookieError::Decrypt)?;

        let mut body = nonce;
        body.extend_from_slice(&sealed);
        let body = URL_SAFE_NO_PAD.encode(body);

        let tag = self.mac(name, now, &body)?.finalize().into_bytes();
        let envelope = format!("{now}|{body}|{}", URL_SAFE_NO_PAD.encode(tag));
        Ok(URL_SAFE_NO_PAD.encode(envelope))
    }

    pub(crate) fn decode_at<T: DeserializeOwned>(
        &self,
        name: &str,
        token: &str,
        max_age_secs: i64,
        now: i64,
    ) -> Result<T, CookieError> {
        let envelope = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| CookieError::Malformed)?;
        let envelope = String::from_utf8(envelope).map_err(|_| CookieError::Malformed)?;

        let mut parts = envelope.splitn(3, '|');
        let (Some(ts), Some(body), Some(tag)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CookieError::Malformed);
        };
        let issued: i64 = ts.parse().map_err(|_| CookieError::Malformed)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| CookieError::Malformed)?;

        self.mac(name, issued, body)?
            .verify_slice(&tag)
            .map_err(|_| CookieError::InvalidMac)?;

        if issued < now - max_age_secs || issued > now + MAX_SKEW_SECS {
            return Err(CookieError::Expired);
        }

        let body = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| CookieError::Malformed)?;
        if body.len() < NONCE_LEN {
            return Err(CookieError::Malformed);
        }
        let (nonce, sealed) = body.split_at(NONCE_LEN);
        let cipher = XChaCha20Poly1305::new_from_slice(self.keys.block_key.expose_secret())
            .map_err(|e| CookieError::Key(e.to_string()))?;
        let plain = cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|_| CookieError::Decrypt)?;

        Ok(serde_json::from_slice(&plain)?)
    }

    fn mac(&self, name: &str, ts: i64, body: &str) -> Result<HmacSha256, CookieError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.keys.hash_key.expose_secret())
            .map_err(|e| CookieError::Key(e.to_string()))?;
        mac.update(format!("{name}|{ts}|{body}").as_bytes());
        Ok(mac)
    }
}
