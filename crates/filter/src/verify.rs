//! Signature verification seam.
//!
//! Verification is the dominant per-message cost, so the pipeline treats it
//! as an external collaborator behind a trait: production wires the BLS
//! aggregate verifier, tests can substitute cheaper doubles.

use dvgate_types::{
    BlsPublicKey, BlsSignature, DomainType, Operator, OperatorId, SignatureKind,
    SignedConsensusMessage,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signer {0} is not in the committee")]
    UnknownSigner(OperatorId),

    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("signature does not verify")]
    Invalid,
}

/// Verifies a signed consensus message against a committee.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        msg: &SignedConsensusMessage,
        domain: DomainType,
        kind: SignatureKind,
        committee: &[Operator],
    ) -> Result<(), SignatureError>;
}

/// BLS12-381 aggregate verification: the message's signing root checked
/// against the aggregate of the signers' public keys. Covers both the
/// single-signer consensus path and quorum-sized decided commits.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlsAggregateVerifier;

impl SignatureVerifier for BlsAggregateVerifier {
    fn verify(
        &self,
        msg: &SignedConsensusMessage,
        domain: DomainType,
        kind: SignatureKind,
        committee: &[Operator],
    ) -> Result<(), SignatureError> {
        let root = msg
            .message
            .signing_root(domain, kind)
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;

        let signature = BlsSignature::from_bytes(&msg.signature)
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;

        let mut keys = Vec::with_capacity(msg.signers.len());
        for &signer in &msg.signers {
            let operator = committee
                .iter()
                .find(|op| op.id == signer)
                .ok_or(SignatureError::UnknownSigner(signer))?;
            keys.push(operator.public_key.clone());
        }

        let aggregate =
            BlsPublicKey::aggregate(&keys).map_err(|e| SignatureError::Malformed(e.to_string()))?;

        if aggregate.verify(&root, &signature) {
            Ok(())
        } else {
            Err(SignatureError::Invalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvgate_types::{
        BlsKeyPair, ConsensusMessage, ConsensusMessageType, DutyRole, Height, MessageId, Round,
    };

    fn committee(keys: &[BlsKeyPair]) -> Vec<Operator> {
        keys.iter()
            .enumerate()
            .map(|(i, key)| Operator {
                id: OperatorId(i as u64 + 1),
                public_key: key.public_key().clone(),
            })
            .collect()
    }

    fn signed_by(keys: &[BlsKeyPair], signer_ids: &[u64]) -> SignedConsensusMessage {
        let message = ConsensusMessage {
            msg_type: ConsensusMessageType::Commit,
            identifier: MessageId::new(&[5u8; 48], DutyRole::Attester),
            height: Height(3),
            round: Round::FIRST,
            data: vec![7u8; 32],
        };
        let root = message
            .signing_root(DomainType::V1, SignatureKind::Qbft)
            .unwrap();

        let sigs: Vec<_> = signer_ids
            .iter()
            .map(|&id| keys[(id - 1) as usize].sign(&root))
            .collect();
        let signature = BlsSignature::aggregate(&sigs).unwrap();

        SignedConsensusMessage {
            signature: signature.to_bytes().to_vec(),
            signers: signer_ids.iter().copied().map(OperatorId).collect(),
            message,
        }
    }

    #[test]
    fn single_signer_verifies() {
        let keys: Vec<_> = (0..4).map(|_| BlsKeyPair::generate()).collect();
        let msg = signed_by(&keys, &[2]);

        let verifier = BlsAggregateVerifier;
        assert!(verifier
            .verify(&msg, DomainType::V1, SignatureKind::Qbft, &committee(&keys))
            .is_ok());
    }

    #[test]
    fn aggregate_commit_verifies() {
        let keys: Vec<_> = (0..4).map(|_| BlsKeyPair::generate()).collect();
        let msg = signed_by(&keys, &[1, 2, 3]);

        let verifier = BlsAggregateVerifier;
        assert!(verifier
            .verify(&msg, DomainType::V1, SignatureKind::Qbft, &committee(&keys))
            .is_ok());
    }

    #[test]
    fn wrong_domain_rejected() {
        let keys: Vec<_> = (0..4).map(|_| BlsKeyPair::generate()).collect();
        let msg = signed_by(&keys, &[1, 2, 3]);

        let verifier = BlsAggregateVerifier;
        assert!(matches!(
            verifier.verify(
                &msg,
                DomainType([9, 9, 9, 9]),
                SignatureKind::Qbft,
                &committee(&keys)
            ),
            Err(SignatureError::Invalid)
        ));
    }

    #[test]
    fn unknown_signer_rejected() {
        let keys: Vec<_> = (0..4).map(|_| BlsKeyPair::generate()).collect();
        let mut msg = signed_by(&keys, &[1, 2, 3]);
        msg.signers.push(OperatorId(40));

        let verifier = BlsAggregateVerifier;
        assert!(matches!(
            verifier.verify(&msg, DomainType::V1, SignatureKind::Qbft, &committee(&keys)),
            Err(SignatureError::UnknownSigner(OperatorId(40)))
        ));
    }

    #[test]
    fn tampered_message_rejected() {
        let keys: Vec<_> = (0..4).map(|_| BlsKeyPair::generate()).collect();
        let mut msg = signed_by(&keys, &[1, 2, 3]);
        msg.message.round = Round(2);

        let verifier = BlsAggregateVerifier;
        assert!(matches!(
            verifier.verify(&msg, DomainType::V1, SignatureKind::Qbft, &committee(&keys)),
            Err(SignatureError::Invalid)
        ));
    }
}
