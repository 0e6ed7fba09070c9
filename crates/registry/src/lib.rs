//! Share storage.
//!
//! The admission filter only needs one question answered: "which committee
//! runs this validator, and in which domain?". [`ShareStore`] is that
//! interface. The in-memory implementation backs production wiring (fed by
//! the registry event pipeline) as well as tests.

use dashmap::DashMap;
use dvgate_types::{Share, PUBLIC_KEY_LEN};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShareStoreError {
    #[error("share store unavailable: {0}")]
    Unavailable(String),
}

/// Lookup of validator shares by validator public key.
pub trait ShareStore: Send + Sync {
    /// Returns the share for the given validator public key, `None` when the
    /// validator is unknown, or an error when the backing store failed.
    fn lookup(
        &self,
        validator_public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> Result<Option<Arc<Share>>, ShareStoreError>;
}

/// Concurrent in-memory share store.
#[derive(Default)]
pub struct InMemoryShareStore {
    shares: DashMap<[u8; PUBLIC_KEY_LEN], Arc<Share>>,
}

impl InMemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the share for its validator public key.
    pub fn insert(&self, share: Share) {
        let key = share.validator_public_key.to_bytes();
        self.shares.insert(key, Arc::new(share));
    }

    pub fn remove(&self, validator_public_key: &[u8; PUBLIC_KEY_LEN]) -> bool {
        self.shares.remove(validator_public_key).is_some()
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

impl ShareStore for InMemoryShareStore {
    fn lookup(
        &self,
        validator_public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> Result<Option<Arc<Share>>, ShareStoreError> {
        Ok(self
            .shares
            .get(validator_public_key)
            .map(|entry| Arc::clone(entry.value())))
    }
}
