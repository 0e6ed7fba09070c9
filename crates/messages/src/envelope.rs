//! The outer container every gossip payload travels in.

use dvgate_types::MessageId;
use sbor::prelude::*;

/// Kind tag of the outer envelope.
///
/// Only `Consensus` enters the QBFT admission path; the other kinds are
/// handled by their own subsystems after the envelope-level checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
pub enum EnvelopeKind {
    /// QBFT consensus traffic (proposal, prepare, commit, round-change).
    Consensus,
    /// Decided-history sync responses.
    DecidedSync,
    /// Partial duty signatures exchanged post-consensus.
    PartialSignature,
}

/// The envelope: kind, instance identifier, and the kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct GossipEnvelope {
    pub kind: EnvelopeKind,
    pub msg_id: MessageId,
    pub data: Vec<u8>,
}
