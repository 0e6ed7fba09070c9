//! Signing-root derivation.
//!
//! A signature never covers raw message bytes. The signed root binds the
//! message hash to the instance's signing domain and the signature kind, so
//! a signature produced for one network or purpose cannot be replayed in
//! another.

use sha2::{Digest, Sha256};

/// Network-level signing domain (4 bytes), carried on each share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainType(pub [u8; 4]);

impl DomainType {
    /// Primary network domain.
    pub const V1: DomainType = DomainType([0, 0, 0, 1]);
}

/// Purpose tag mixed into the signing root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    /// QBFT consensus messages (proposal, prepare, commit, round-change).
    Qbft,
    /// Partial duty signatures exchanged outside consensus.
    PartialSignature,
}

impl SignatureKind {
    fn tag(self) -> [u8; 4] {
        match self {
            SignatureKind::Qbft => [1, 0, 0, 0],
            SignatureKind::PartialSignature => [2, 0, 0, 0],
        }
    }
}

/// Compute the 32-byte root a signer actually signs:
/// `sha256(message_root || domain || kind)`.
pub fn signing_root(message_root: &[u8; 32], domain: DomainType, kind: SignatureKind) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(message_root);
    hasher.update(domain.0);
    hasher.update(kind.tag());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_separates_roots() {
        let root = [9u8; 32];
        let a = signing_root(&root, DomainType::V1, SignatureKind::Qbft);
        let b = signing_root(&root, DomainType([0, 0, 0, 2]), SignatureKind::Qbft);
        let c = signing_root(&root, DomainType::V1, SignatureKind::PartialSignature);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn deterministic() {
        let root = [1u8; 32];
        assert_eq!(
            signing_root(&root, DomainType::V1, SignatureKind::Qbft),
            signing_root(&root, DomainType::V1, SignatureKind::Qbft)
        );
    }
}
