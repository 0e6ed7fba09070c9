//! Wire encoding for gossip payloads.
//!
//! # Wire Format
//!
//! ```text
//! [fork: u8][payload: SBOR-encoded envelope]
//! ```
//!
//! The fork byte versions the whole container format. Decoding is
//! fork-aware: an unknown fork is a hard decode failure, never a guess.

use crate::envelope::GossipEnvelope;
use dvgate_types::SignedConsensusMessage;
use thiserror::Error;

/// Current fork identifier.
pub const FORK_V1: u8 = 1;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown fork: {0}")]
    UnknownFork(u8),

    #[error("message too short")]
    MessageTooShort,

    #[error("SBOR decode error: {0}")]
    SborDecode(String),

    #[error("SBOR encode error: {0}")]
    SborEncode(String),
}

/// Encode an envelope to wire format.
pub fn encode_envelope(envelope: &GossipEnvelope) -> Result<Vec<u8>, CodecError> {
    let payload =
        sbor::basic_encode(envelope).map_err(|e| CodecError::SborEncode(format!("{:?}", e)))?;

    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(FORK_V1);
    bytes.extend(payload);
    Ok(bytes)
}

/// Decode an envelope from wire format, dispatching on the fork byte.
pub fn decode_envelope(data: &[u8]) -> Result<GossipEnvelope, CodecError> {
    let (&fork, payload) = data.split_first().ok_or(CodecError::MessageTooShort)?;
    if fork != FORK_V1 {
        return Err(CodecError::UnknownFork(fork));
    }

    sbor::basic_decode(payload).map_err(|e| CodecError::SborDecode(format!("{:?}", e)))
}

/// Encode a signed consensus message for embedding in an envelope's `data`.
pub fn encode_signed_message(msg: &SignedConsensusMessage) -> Result<Vec<u8>, CodecError> {
    sbor::basic_encode(msg).map_err(|e| CodecError::SborEncode(format!("{:?}", e)))
}

/// Decode the signed consensus message carried by a `Consensus` envelope.
pub fn decode_signed_message(data: &[u8]) -> Result<SignedConsensusMessage, CodecError> {
    sbor::basic_decode(data).map_err(|e| CodecError::SborDecode(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeKind;
    use dvgate_types::{
        ConsensusMessage, ConsensusMessageType, DutyRole, Height, MessageId, OperatorId, Round,
        SIGNATURE_LEN,
    };

    fn envelope() -> GossipEnvelope {
        let msg_id = MessageId::new(&[3u8; 48], DutyRole::Attester);
        let signed = SignedConsensusMessage {
            signature: vec![0u8; SIGNATURE_LEN],
            signers: vec![OperatorId(1)],
            message: ConsensusMessage {
                msg_type: ConsensusMessageType::Prepare,
                identifier: msg_id,
                height: Height(4),
                round: Round::FIRST,
                data: vec![0u8; 32],
            },
        };
        GossipEnvelope {
            kind: EnvelopeKind::Consensus,
            msg_id,
            data: encode_signed_message(&signed).unwrap(),
        }
    }

    #[test]
    fn envelope_roundtrip() {
        let env = envelope();
        let bytes = encode_envelope(&env).unwrap();
        assert_eq!(bytes[0], FORK_V1);

        let decoded = decode_envelope(&bytes).unwrap();
        assert_eq!(decoded, env);

        let signed = decode_signed_message(&decoded.data).unwrap();
        assert_eq!(signed.message.round, Round::FIRST);
        assert_eq!(signed.message.identifier, env.msg_id);
    }

    #[test]
    fn unknown_fork_rejected() {
        let mut bytes = encode_envelope(&envelope()).unwrap();
        bytes[0] = 9;
        assert!(matches!(
            decode_envelope(&bytes),
            Err(CodecError::UnknownFork(9))
        ));
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(
            decode_envelope(&[]),
            Err(CodecError::MessageTooShort)
        ));
    }

    #[test]
    fn garbage_payload_rejected() {
        let bytes = [FORK_V1, 0xff, 0xfe, 0xfd];
        assert!(matches!(
            decode_envelope(&bytes),
            Err(CodecError::SborDecode(_))
        ));
    }
}
