//! Identifier newtypes for consensus instances and their participants.

use sbor::prelude::*;
use std::fmt;

/// Index of one committee member within a consensus instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct OperatorId(pub u64);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// QBFT round within a height. The first round is 1; 0 means "no round yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Round(pub u64);

impl Round {
    /// The first round of every instance.
    pub const FIRST: Round = Round(1);

    /// The "no round observed" sentinel.
    pub const NONE: Round = Round(0);

    pub fn next(self) -> Round {
        Round(self.0 + 1)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round-{}", self.0)
    }
}

/// Decided QBFT height (one height per validator duty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Height(pub u64);

impl Height {
    pub fn next(self) -> Height {
        Height(self.0 + 1)
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "height-{}", self.0)
    }
}

/// The duty a consensus instance is voting on.
///
/// The role is part of [`MessageId`], so the same validator key runs
/// independent instances per duty type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DutyRole {
    Attester,
    Proposer,
    Aggregator,
    SyncCommittee,
}

impl DutyRole {
    /// Wire tag carried in the message identifier.
    pub fn tag(self) -> u64 {
        match self {
            DutyRole::Attester => 0,
            DutyRole::Proposer => 1,
            DutyRole::Aggregator => 2,
            DutyRole::SyncCommittee => 3,
        }
    }

    pub fn from_tag(tag: u64) -> Option<DutyRole> {
        match tag {
            0 => Some(DutyRole::Attester),
            1 => Some(DutyRole::Proposer),
            2 => Some(DutyRole::Aggregator),
            3 => Some(DutyRole::SyncCommittee),
            _ => None,
        }
    }
}

impl fmt::Display for DutyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DutyRole::Attester => write!(f, "attester"),
            DutyRole::Proposer => write!(f, "proposer"),
            DutyRole::Aggregator => write!(f, "aggregator"),
            DutyRole::SyncCommittee => write!(f, "sync-committee"),
        }
    }
}

/// Length of a [`MessageId`] in bytes: 48-byte validator public key followed
/// by an 8-byte little-endian duty role tag.
pub const MESSAGE_ID_LEN: usize = 56;

/// Opaque identifier of one consensus instance.
///
/// Compared and hashed as raw bytes; stable for the lifetime of the instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
#[sbor(transparent)]
pub struct MessageId([u8; MESSAGE_ID_LEN]);

impl MessageId {
    pub fn new(validator_public_key: &[u8; 48], role: DutyRole) -> Self {
        let mut bytes = [0u8; MESSAGE_ID_LEN];
        bytes[..48].copy_from_slice(validator_public_key);
        bytes[48..].copy_from_slice(&role.tag().to_le_bytes());
        MessageId(bytes)
    }

    pub fn from_bytes(bytes: [u8; MESSAGE_ID_LEN]) -> Self {
        MessageId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MESSAGE_ID_LEN] {
        &self.0
    }

    /// The validator public key this instance belongs to (share-store key).
    pub fn validator_public_key(&self) -> [u8; 48] {
        let mut pk = [0u8; 48];
        pk.copy_from_slice(&self.0[..48]);
        pk
    }

    pub fn role(&self) -> Option<DutyRole> {
        let mut tag = [0u8; 8];
        tag.copy_from_slice(&self.0[48..]);
        DutyRole::from_tag(u64::from_le_bytes(tag))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviated hex keeps log lines readable.
        write!(f, "{}..{}", hex::encode(&self.0[..4]), hex::encode(&self.0[52..]))
    }
}
