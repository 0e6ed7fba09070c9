//! QBFT message containers.

use crate::identifiers::{Height, MessageId, OperatorId, Round};
use crate::signing::{signing_root, DomainType, SignatureKind};
use crate::SIGNATURE_LEN;
use sbor::prelude::*;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// The four QBFT message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub enum ConsensusMessageType {
    Proposal,
    Prepare,
    Commit,
    RoundChange,
}

impl fmt::Display for ConsensusMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusMessageType::Proposal => write!(f, "proposal"),
            ConsensusMessageType::Prepare => write!(f, "prepare"),
            ConsensusMessageType::Commit => write!(f, "commit"),
            ConsensusMessageType::RoundChange => write!(f, "round-change"),
        }
    }
}

/// Structural errors surfaced by the syntactic checks.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message has no signers")]
    EmptySigners,

    #[error("signers are not strictly ascending")]
    UnorderedSigners,

    #[error("signature is {0} bytes, expected {SIGNATURE_LEN}")]
    BadSignatureLength(usize),

    #[error("round 0 is not a valid consensus round")]
    NoRound,

    #[error("{msg_type} data is {got} bytes, expected {expected}")]
    BadDataLength {
        msg_type: ConsensusMessageType,
        expected: usize,
        got: usize,
    },

    #[error("proposal carries no payload")]
    EmptyProposal,

    #[error("decided message is not a commit")]
    NotCommit,

    #[error("commit has {got} signers, quorum is {need}")]
    NoQuorum { got: usize, need: usize },

    #[error("message encoding failed: {0}")]
    Encode(String),
}

/// The body of a QBFT message, prior to signing.
///
/// `data` is type-dependent: prepares and commits carry the 32-byte value
/// root being agreed on; proposals carry the full proposed payload;
/// round-changes carry an opaque justification blob.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ConsensusMessage {
    pub msg_type: ConsensusMessageType,
    pub identifier: MessageId,
    pub height: Height,
    pub round: Round,
    pub data: Vec<u8>,
}

impl ConsensusMessage {
    /// Hash of the canonical encoding. This is what signatures bind to,
    /// after domain wrapping.
    pub fn message_root(&self) -> Result<[u8; 32], MessageError> {
        let encoded =
            sbor::basic_encode(self).map_err(|e| MessageError::Encode(format!("{:?}", e)))?;
        Ok(Sha256::digest(&encoded).into())
    }

    /// The root a committee member signs for this message.
    pub fn signing_root(
        &self,
        domain: DomainType,
        kind: SignatureKind,
    ) -> Result<[u8; 32], MessageError> {
        Ok(signing_root(&self.message_root()?, domain, kind))
    }
}

/// A QBFT message plus the signature and signer set that produced it.
///
/// Single-signer for proposals, prepares, round-changes and plain commits;
/// multi-signer (aggregated) for decided commits.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct SignedConsensusMessage {
    pub signature: Vec<u8>,
    pub signers: Vec<OperatorId>,
    pub message: ConsensusMessage,
}

impl SignedConsensusMessage {
    /// Base syntactic check: signer set shape, signature length, round and
    /// data shape. Cheap; runs before any schedule or signature work.
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.signers.is_empty() {
            return Err(MessageError::EmptySigners);
        }
        if !self.signers.windows(2).all(|w| w[0] < w[1]) {
            return Err(MessageError::UnorderedSigners);
        }
        if self.signature.len() != SIGNATURE_LEN {
            return Err(MessageError::BadSignatureLength(self.signature.len()));
        }
        if self.message.round < Round::FIRST {
            return Err(MessageError::NoRound);
        }
        match self.message.msg_type {
            ConsensusMessageType::Prepare | ConsensusMessageType::Commit => {
                if self.message.data.len() != 32 {
                    return Err(MessageError::BadDataLength {
                        msg_type: self.message.msg_type,
                        expected: 32,
                        got: self.message.data.len(),
                    });
                }
            }
            ConsensusMessageType::Proposal => {
                if self.message.data.is_empty() {
                    return Err(MessageError::EmptyProposal);
                }
            }
            ConsensusMessageType::RoundChange => {}
        }
        Ok(())
    }

    /// Deeper check for decided commits: commit type and quorum-sized signer
    /// set against the given quorum.
    pub fn validate_decided(&self, quorum: usize) -> Result<(), MessageError> {
        if self.message.msg_type != ConsensusMessageType::Commit {
            return Err(MessageError::NotCommit);
        }
        if self.signers.len() < quorum {
            return Err(MessageError::NoQuorum {
                got: self.signers.len(),
                need: quorum,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DutyRole;

    fn message(msg_type: ConsensusMessageType, data: Vec<u8>) -> ConsensusMessage {
        ConsensusMessage {
            msg_type,
            identifier: MessageId::new(&[1u8; 48], DutyRole::Attester),
            height: Height(0),
            round: Round::FIRST,
            data,
        }
    }

    fn signed(msg: ConsensusMessage, signers: Vec<u64>) -> SignedConsensusMessage {
        SignedConsensusMessage {
            signature: vec![0u8; SIGNATURE_LEN],
            signers: signers.into_iter().map(OperatorId).collect(),
            message: msg,
        }
    }

    #[test]
    fn valid_prepare_passes() {
        let msg = signed(message(ConsensusMessageType::Prepare, vec![0u8; 32]), vec![1]);
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn empty_signers_rejected() {
        let msg = signed(message(ConsensusMessageType::Prepare, vec![0u8; 32]), vec![]);
        assert!(matches!(msg.validate(), Err(MessageError::EmptySigners)));
    }

    #[test]
    fn duplicate_signers_rejected() {
        let msg = signed(
            message(ConsensusMessageType::Commit, vec![0u8; 32]),
            vec![1, 1, 2],
        );
        assert!(matches!(msg.validate(), Err(MessageError::UnorderedSigners)));
    }

    #[test]
    fn round_zero_rejected() {
        let mut msg = signed(message(ConsensusMessageType::Prepare, vec![0u8; 32]), vec![1]);
        msg.message.round = Round::NONE;
        assert!(matches!(msg.validate(), Err(MessageError::NoRound)));
    }

    #[test]
    fn short_signature_rejected() {
        let mut msg = signed(message(ConsensusMessageType::Prepare, vec![0u8; 32]), vec![1]);
        msg.signature.truncate(12);
        assert!(matches!(
            msg.validate(),
            Err(MessageError::BadSignatureLength(12))
        ));
    }

    #[test]
    fn commit_data_must_be_a_root() {
        let msg = signed(message(ConsensusMessageType::Commit, vec![0u8; 8]), vec![1]);
        assert!(matches!(
            msg.validate(),
            Err(MessageError::BadDataLength { got: 8, .. })
        ));
    }

    #[test]
    fn decided_requires_commit_and_quorum() {
        let prepare = signed(
            message(ConsensusMessageType::Prepare, vec![0u8; 32]),
            vec![1, 2, 3],
        );
        assert!(matches!(
            prepare.validate_decided(3),
            Err(MessageError::NotCommit)
        ));

        let thin_commit = signed(
            message(ConsensusMessageType::Commit, vec![0u8; 32]),
            vec![1, 2],
        );
        assert!(matches!(
            thin_commit.validate_decided(3),
            Err(MessageError::NoQuorum { got: 2, need: 3 })
        ));

        let commit = signed(
            message(ConsensusMessageType::Commit, vec![0u8; 32]),
            vec![1, 2, 3],
        );
        assert!(commit.validate_decided(3).is_ok());
    }

    #[test]
    fn message_root_binds_round() {
        let a = message(ConsensusMessageType::Prepare, vec![0u8; 32]);
        let mut b = a.clone();
        b.round = Round(2);
        assert_ne!(a.message_root().unwrap(), b.message_root().unwrap());
    }
}
