//! Gossip transport wiring.
//!
//! Runs a libp2p gossipsub swarm with application-level validation: inbound
//! messages are withheld from the mesh until the admission filter returns a
//! verdict, which is reported back to gossipsub as
//! `MessageAcceptance::{Accept, Ignore, Reject}`. Rejections feed peer
//! scoring; accepted consensus envelopes are handed to the consumer channel.

mod config;
mod service;
mod topic;

pub use config::GossipConfig;
pub use service::{derive_gossip_keypair, AdmittedMessage, GossipError, GossipService};
pub use topic::Topic;
