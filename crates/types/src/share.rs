//! Local knowledge of a validator's committee.

use crate::crypto::BlsPublicKey;
use crate::identifiers::OperatorId;
use crate::signing::DomainType;

/// One committee member: operator index and signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub id: OperatorId,
    pub public_key: BlsPublicKey,
}

/// A validator share: the committee that runs this validator's duties and
/// the signing domain its messages use.
#[derive(Debug, Clone)]
pub struct Share {
    pub validator_public_key: BlsPublicKey,
    pub committee: Vec<Operator>,
    pub domain_type: DomainType,
}

impl Share {
    pub fn new(
        validator_public_key: BlsPublicKey,
        committee: Vec<Operator>,
        domain_type: DomainType,
    ) -> Self {
        Self {
            validator_public_key,
            committee,
            domain_type,
        }
    }

    /// Quorum size for this committee: `n - f` where `f = (n - 1) / 3`,
    /// i.e. 2f+1 for the standard 3f+1 committee sizes.
    pub fn quorum(&self) -> usize {
        let n = self.committee.len();
        n - (n.saturating_sub(1)) / 3
    }

    pub fn operator(&self, id: OperatorId) -> Option<&Operator> {
        self.committee.iter().find(|op| op.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlsKeyPair;

    fn share_of(n: usize) -> Share {
        let committee = (0..n)
            .map(|i| Operator {
                id: OperatorId(i as u64 + 1),
                public_key: BlsKeyPair::generate().public_key().clone(),
            })
            .collect();
        Share::new(
            BlsKeyPair::generate().public_key().clone(),
            committee,
            DomainType::V1,
        )
    }

    #[test]
    fn quorum_sizes() {
        assert_eq!(share_of(4).quorum(), 3);
        assert_eq!(share_of(7).quorum(), 5);
        assert_eq!(share_of(10).quorum(), 7);
        assert_eq!(share_of(13).quorum(), 9);
    }

    #[test]
    fn operator_lookup() {
        let share = share_of(4);
        assert!(share.operator(OperatorId(1)).is_some());
        assert!(share.operator(OperatorId(9)).is_none());
    }
}
