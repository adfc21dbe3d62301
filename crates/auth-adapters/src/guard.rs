//! Edit tokens: secure cookies binding a comment id to a digest of its text.

use domains::{CommentGuard, CommentId, DomainError, PreferenceStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::keys::{self, CookieKeys, KeyError};
use crate::secure_cookie::SecureCookie;

/// Hex SHA-256 of a comment's text.
pub fn text_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[derive(Debug, Serialize, Deserialize)]
struct EditClaim {
    id: CommentId,
    digest: String,
}

/// [`CommentGuard`] backed by [`SecureCookie`]. Tokens are named after the
/// comment id and live for `max_age_secs`.
pub struct CookieGuard {
    codec: SecureCookie,
    max_age_secs: i64,
}

impl CookieGuard {
    pub fn new(keys: CookieKeys, max_age_secs: i64) -> Self {
        Self {
            codec: SecureCookie::new(keys),
            max_age_secs,
        }
    }

    /// Builds a guard from the persisted keys, creating them on first start.
    pub async fn from_store(
        store: &dyn PreferenceStore,
        max_age_secs: i64,
    ) -> Result<Self, KeyError> {
        Ok(Self::new(keys::load_or_generate(store).await?, max_age_secs))
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }
}

impl CommentGuard for CookieGuard {
    fn issue(&self, id: CommentId, text: &str) -> Result<String, DomainError> {
        let claim = EditClaim {
            id,
            digest: text_digest(text),
        };
        self.codec.encode(&id.to_string(), &claim).map_err(|err| {
            tracing::error!(comment_id = id, error = %err, "failed to issue edit token");
            DomainError::Storage(format!("edit token: {err}"))
        })
    }

    fn verify(&self, token: &str, id: CommentId, current_text: &str) -> Result<(), DomainError> {
        let claim: EditClaim = self
            .codec
            .decode(&id.to_string(), token, self.max_age_secs)
            .map_err(|err| {
                tracing::debug!(comment_id = id, error = %err, "edit token rejected");
                DomainError::Unauthorized
            })?;

        if claim.id != id || claim.digest != text_digest(current_text) {
            tracing::debug!(comment_id = id, "edit token does not match comment");
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> CookieGuard {
        CookieGuard::new(CookieKeys::generate().unwrap(), 900)
    }

    #[test]
    fn issued_token_verifies_for_same_comment() {
        let guard = guard();
        let token = guard.issue(12, "original text").unwrap();
        guard.verify(&token, 12, "original text").unwrap();
    }

    #[test]
    fn edited_text_is_rejected() {
        let guard = guard();
        let token = guard.issue(12, "original text").unwrap();
        let err = guard.verify(&token, 12, "edited text").unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized));
    }

    #[test]
    fn token_for_other_comment_is_rejected() {
        let guard = guard();
        let token = guard.issue(12, "same text").unwrap();
        let err = guard.verify(&token, 13, "same text").unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized));
    }

    #[test]
    fn token_from_other_keys_is_rejected() {
        let token = guard().issue(12, "text").unwrap();
        let err = guard().verify(&token, 12, "text").unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized));
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            text_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
