//! Fixed-size Bloom filter recording who already voted on a comment.

use sha2::{Digest, Sha256};

const FILTER_BYTES: usize = 256;
const FILTER_BITS: usize = FILTER_BYTES * 8;
const HASHES: usize = 11;

#[derive(Clone, PartialEq, Eq)]
pub struct Voters {
    bits: Vec<u8>,
}

impl Voters {
    pub fn new() -> Self {
        Self {
            bits: vec![0; FILTER_BYTES],
        }
    }

    /// A filter that already contains `addr`, so a comment's author cannot vote on it.
    pub fn seeded(addr: &str) -> Self {
        let mut voters = Self::new();
        voters.insert(addr);
        voters
    }

    /// Restores a filter from its stored bytes. Anything of the wrong size is
    /// treated as an empty filter.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes.len() == FILTER_BYTES {
            Self { bits: bytes }
        } else {
            Self::new()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn insert(&mut self, key: &str) {
        for bit in positions(key) {
            self.bits[bit / 8] |= 1 << (bit % 8);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        positions(key).all(|bit| self.bits[bit / 8] & (1 << (bit % 8)) != 0)
    }
}

impl Default for Voters {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Voters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = self.bits.iter().map(|b| b.count_ones()).sum::<u32>();
        f.debug_struct("Voters").field("bits_set", &set).finish()
    }
}

fn positions(key: &str) -> impl Iterator<Item = usize> {
    let digest = Sha256::digest(key.as_bytes());
    (0..HASHES).map(move |i| {
        let pair = u16::from_be_bytes([digest[2 * i], digest[2 * i + 1]]);
        pair as usize % FILTER_BITS
    })
}
