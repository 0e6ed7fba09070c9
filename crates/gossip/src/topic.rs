//! Gossipsub topic naming.
//!
//! One topic per validator: `dvgate/v1/<48-byte public key, lowercase hex>`.
//! Decided commits additionally propagate across every topic of their fork,
//! which is why the admission filter, not the topic layout, is the
//! duplication boundary.

use dvgate_types::PUBLIC_KEY_LEN;
use std::fmt;

const PREFIX: &str = "dvgate";
const FORK: &str = "v1";

/// A parsed, validated topic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    validator_hex: String,
}

impl Topic {
    /// The topic carrying one validator's consensus traffic.
    pub fn for_validator(public_key: &[u8; PUBLIC_KEY_LEN]) -> Self {
        Self {
            validator_hex: hex::encode(public_key),
        }
    }

    /// Parse a wire topic string. Returns `None` for foreign topics.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, '/');
        if parts.next() != Some(PREFIX) || parts.next() != Some(FORK) {
            return None;
        }
        let validator_hex = parts.next()?;
        if validator_hex.len() != PUBLIC_KEY_LEN * 2
            || !validator_hex.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return None;
        }
        Some(Self {
            validator_hex: validator_hex.to_ascii_lowercase(),
        })
    }

    /// The validator public key this topic belongs to.
    pub fn validator_public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        let mut pk = [0u8; PUBLIC_KEY_LEN];
        // validator_hex is length- and charset-checked at construction.
        let bytes = hex::decode(&self.validator_hex).expect("validated hex");
        pk.copy_from_slice(&bytes);
        pk
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", PREFIX, FORK, self.validator_hex)
    }
}
