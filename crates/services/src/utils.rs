//! Small helpers shared by the comment services.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Fractional UNIX seconds, the timestamp format of stored comments.
pub fn epoch_secs(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// Derives a stable, non-reversible author identifier.
#[derive(Debug, Clone)]
pub struct AuthorHasher {
    salt: SecretString,
}

impl AuthorHasher {
    pub fn new(salt: SecretString) -> Self {
        Self { salt }
    }

    /// Generates a short identifier (e.g., 3f9a1c07b2de) from an email or address.
    /// Identical inputs always map to the same identifier under one salt.
    pub fn identify(&self, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.expose_secret().as_bytes());
        hasher.update(key.as_bytes());
        let hash = hex::encode(hasher.finalize());
        hash[..12].to_string()
    }
}

/// Masks the host part of a client address before it is stored.
///
/// IPv4 keeps its /24, IPv6 its first three groups. Unparsable input collapses
/// to `0.0.0.0`.
pub fn anonymize(addr: &str) -> String {
    match addr.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            let [a, b, c, _] = v4.octets();
            Ipv4Addr::new(a, b, c, 0).to_string()
        }
        Ok(IpAddr::V6(v6)) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return anonymize(&v4.to_string());
            }
            let s = v6.segments();
            Ipv6Addr::new(s[0], s[1], s[2], 0, 0, 0, 0, 0).to_string()
        }
        Err(_) => Ipv4Addr::UNSPECIFIED.to_string(),
    }
}
