//! Core types for the dvgate admission filter.
//!
//! This crate provides the foundational types shared by the filter, the
//! wire codec, and the gossip layer:
//!
//! - **Identifiers**: `MessageId`, `OperatorId`, `Round`, `Height`, `DutyRole`
//! - **QBFT messages**: `ConsensusMessage`, `SignedConsensusMessage`
//! - **Committee knowledge**: `Share`, `Operator`, quorum arithmetic
//! - **Crypto**: BLS12-381 key/signature wrappers and signing-root derivation
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod crypto;
mod identifiers;
mod message;
mod share;
mod signing;

pub use crypto::{
    BlsKeyPair, BlsPublicKey, BlsSecretKey, BlsSignature, CryptoError, PUBLIC_KEY_LEN,
    SIGNATURE_LEN,
};
pub use identifiers::{DutyRole, Height, MessageId, OperatorId, Round, MESSAGE_ID_LEN};
pub use message::{ConsensusMessage, ConsensusMessageType, MessageError, SignedConsensusMessage};
pub use share::{Operator, Share};
pub use signing::{signing_root, DomainType, SignatureKind};
