//! Secret keys of the cookie codec, persisted in the preference store.
//!
//! Keys are generated at most once per database and reused on every start, so
//! tokens survive restarts.

use domains::{PreferenceStore, StorageError};
use secrecy::{ExposeSecret, SecretSlice};
use thiserror::Error;
use zeroize::Zeroizing;

pub const HASH_KEY_PREF: &str = "hash-key";
pub const BLOCK_KEY_PREF: &str = "block-key";
pub const HASH_KEY_LEN: usize = 64;
pub const BLOCK_KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("key storage: {0}")]
    Storage(#[from] StorageError),
    #[error("stored {0} is corrupt")]
    Corrupt(&'static str),
    #[error("random source failed: {0}")]
    Random(String),
}

/// MAC key and encryption key. Independent of each other.
pub struct CookieKeys {
    pub hash_key: SecretSlice<u8>,
    pub block_key: SecretSlice<u8>,
}

impl CookieKeys {
    pub fn generate() -> Result<Self, KeyError> {
        Ok(Self {
            hash_key: SecretSlice::from(random_bytes(HASH_KEY_LEN)?),
            block_key: SecretSlice::from(random_bytes(BLOCK_KEY_LEN)?),
        })
    }
}

impl std::fmt::Debug for CookieKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieKeys").finish_non_exhaustive()
    }
}

pub(crate) fn random_bytes(len: usize) -> Result<Vec<u8>, KeyError> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf).map_err(|e| KeyError::Random(e.to_string()))?;
    Ok(buf)
}

/// Loads both keys, generating and storing whichever is missing.
pub async fn load_or_generate(store: &dyn PreferenceStore) -> Result<CookieKeys, KeyError> {
    Ok(CookieKeys {
        hash_key: load_or_generate_key(store, HASH_KEY_PREF, HASH_KEY_LEN).await?,
        block_key: load_or_generate_key(store, BLOCK_KEY_PREF, BLOCK_KEY_LEN).await?,
    })
}

async fn load_or_generate_key(
    store: &dyn PreferenceStore,
    name: &'static str,
    len: usize,
) -> Result<SecretSlice<u8>, KeyError> {
    if let Some(stored) = store.get_preference(name).await? {
        return decode_key(name, Zeroizing::new(stored), len);
    }

    let fresh = SecretSlice::from(random_bytes(len)?);
    let encoded = Zeroizing::new(hex::encode(fresh.expose_secret()));
    if store.insert_preference_if_absent(name, &encoded).await? {
        tracing::info!(key = name, "generated new cookie key");
        return Ok(fresh);
    }

    // Another process stored its key between our read and write.
    let stored = store
        .get_preference(name)
        .await?
        .ok_or(KeyError::Corrupt(name))?;
    decode_key(name, Zeroizing::new(stored), len)
}

fn decode_key(
    name: &'static str,
    stored: Zeroizing<String>,
    len: usize,
) -> Result<SecretSlice<u8>, KeyError> {
    let bytes = hex::decode(stored.as_str()).map_err(|_| KeyError::Corrupt(name))?;
    if bytes.len() != len {
        return Err(KeyError::Corrupt(name));
    }
    Ok(SecretSlice::from(bytes))
}
