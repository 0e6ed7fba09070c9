//! Wire messages exchanged over the gossip mesh.

mod codec;
mod envelope;

pub use codec::{
    decode_envelope, decode_signed_message, encode_envelope, encode_signed_message, CodecError,
    FORK_V1,
};
pub use envelope::{EnvelopeKind, GossipEnvelope};
