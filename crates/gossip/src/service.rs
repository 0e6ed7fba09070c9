//! The gossip swarm service.
//!
//! Gossipsub is configured with application-level validation: a message is
//! neither delivered nor forwarded until the admission filter has ruled on
//! it. Signature verification runs on the blocking pool, never on the swarm
//! event loop, and the verdict is reported back to gossipsub where `Reject`
//! feeds peer scoring.

use crate::config::GossipConfig;
use dvgate_filter::{MessageValidator, Verdict};
use dvgate_messages::{decode_envelope, GossipEnvelope};
use dvgate_types::BlsPublicKey;
use futures::StreamExt;
use libp2p::{
    gossipsub, identity,
    swarm::SwarmEvent,
    Multiaddr, PeerId, Swarm, SwarmBuilder,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Domain separator for deriving the libp2p identity from an operator's
/// BLS public key.
const GOSSIP_IDENTITY_DOMAIN: &[u8] = b"dvgate-gossip-identity-v1:";

/// Derive a libp2p Ed25519 keypair deterministically from an operator's BLS
/// public key, so every operator's PeerId can be computed by its peers.
pub fn derive_gossip_keypair(public_key: &BlsPublicKey) -> identity::Keypair {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(GOSSIP_IDENTITY_DOMAIN);
    hasher.update(public_key.to_bytes());
    let seed: [u8; 32] = hasher.finalize().into();

    let secret = identity::ed25519::SecretKey::try_from_bytes(seed)
        .expect("valid ed25519 secret key from derived seed");
    identity::Keypair::from(identity::ed25519::Keypair::from(secret))
}

/// An envelope that passed admission, ready for the consensus layer.
#[derive(Debug)]
pub struct AdmittedMessage {
    /// The peer that propagated the message to us.
    pub peer: PeerId,
    pub envelope: GossipEnvelope,
}

/// Network errors.
#[derive(Debug, Error)]
pub enum GossipError {
    #[error("gossipsub error: {0}")]
    Behaviour(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("gossip service shut down")]
    Shutdown,
}

enum SwarmCommand {
    Subscribe {
        topic: String,
    },
    Publish {
        topic: String,
        data: Vec<u8>,
    },
    Dial {
        address: Multiaddr,
    },
    ReportVerdict {
        message_id: gossipsub::MessageId,
        propagation_source: PeerId,
        acceptance: gossipsub::MessageAcceptance,
    },
    GetListenAddresses {
        response_tx: oneshot::Sender<Vec<Multiaddr>>,
    },
}

/// Handle to the running swarm task.
pub struct GossipService {
    local_peer_id: PeerId,
    command_tx: mpsc::UnboundedSender<SwarmCommand>,
    shutdown: CancellationToken,
}

impl GossipService {
    /// Start the swarm and its event loop.
    ///
    /// Returns the service handle and the channel of admitted messages.
    pub fn new(
        config: GossipConfig,
        keypair: identity::Keypair,
        validator: Arc<MessageValidator>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<AdmittedMessage>), GossipError> {
        let local_peer_id = PeerId::from(keypair.public());
        info!(peer_id = %local_peer_id, "starting gossip service");

        let gossipsub_config = gossipsub::ConfigBuilder::default()
            .heartbeat_interval(config.gossipsub_heartbeat)
            .validation_mode(gossipsub::ValidationMode::Strict)
            // Withhold delivery and forwarding until the filter reports.
            .validate_messages()
            .message_id_fn(|msg| {
                // Data + topic as ID: the same decided commit may legally
                // appear on several topics without tripping deduplication.
                use std::hash::{Hash, Hasher};
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                msg.data.hash(&mut hasher);
                msg.topic.hash(&mut hasher);
                gossipsub::MessageId::from(hasher.finish().to_string())
            })
            .max_transmit_size(config.max_message_size)
            .build()
            .map_err(|e| GossipError::Behaviour(e.to_string()))?;

        let behaviour = gossipsub::Behaviour::new(
            gossipsub::MessageAuthenticity::Signed(keypair.clone()),
            gossipsub_config,
        )
        .map_err(|e| GossipError::Behaviour(e.to_string()))?;

        let mut swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_quic()
            .with_behaviour(|_| behaviour)
            .map_err(|e| GossipError::Behaviour(e.to_string()))?
            .with_swarm_config(|c| c.with_idle_connection_timeout(config.idle_connection_timeout))
            .build();

        for addr in &config.listen_addresses {
            swarm
                .listen_on(addr.clone())
                .map_err(|e| GossipError::Transport(e.to_string()))?;
            info!(%addr, "listening");
        }
        for addr in &config.bootstrap_peers {
            swarm
                .dial(addr.clone())
                .map_err(|e| GossipError::Transport(e.to_string()))?;
            info!(%addr, "dialing bootstrap peer");
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (admitted_tx, admitted_rx) = mpsc::channel(256);
        let shutdown = CancellationToken::new();

        let service = Arc::new(Self {
            local_peer_id,
            command_tx: command_tx.clone(),
            shutdown: shutdown.clone(),
        });

        tokio::spawn(Self::event_loop(
            swarm,
            command_rx,
            command_tx,
            validator,
            admitted_tx,
            shutdown,
        ));

        Ok((service, admitted_rx))
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    /// Subscribe to a topic.
    pub fn subscribe(&self, topic: &crate::Topic) -> Result<(), GossipError> {
        self.command_tx
            .send(SwarmCommand::Subscribe {
                topic: topic.to_string(),
            })
            .map_err(|_| GossipError::Shutdown)
    }

    /// Publish bytes to a topic.
    pub fn publish(&self, topic: &crate::Topic, data: Vec<u8>) -> Result<(), GossipError> {
        self.command_tx
            .send(SwarmCommand::Publish {
                topic: topic.to_string(),
                data,
            })
            .map_err(|_| GossipError::Shutdown)
    }

    /// Dial a peer address.
    pub fn dial(&self, address: Multiaddr) -> Result<(), GossipError> {
        self.command_tx
            .send(SwarmCommand::Dial { address })
            .map_err(|_| GossipError::Shutdown)
    }

    /// Current listen addresses.
    pub async fn listen_addresses(&self) -> Vec<Multiaddr> {
        let (tx, rx) = oneshot::channel();
        if self
            .command_tx
            .send(SwarmCommand::GetListenAddresses { response_tx: tx })
            .is_err()
        {
            return vec![];
        }
        rx.await.unwrap_or_default()
    }

    /// Stop the event loop and abandon in-flight validations.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn event_loop(
        mut swarm: Swarm<gossipsub::Behaviour>,
        mut command_rx: mpsc::UnboundedReceiver<SwarmCommand>,
        command_tx: mpsc::UnboundedSender<SwarmCommand>,
        validator: Arc<MessageValidator>,
        admitted_tx: mpsc::Sender<AdmittedMessage>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutting down gossip event loop");
                    break;
                }

                Some(cmd) = command_rx.recv() => {
                    Self::handle_command(&mut swarm, cmd);
                }

                event = swarm.select_next_some() => {
                    Self::handle_swarm_event(
                        event,
                        &command_tx,
                        &validator,
                        &admitted_tx,
                        &shutdown,
                    );
                }
            }
        }
    }

    fn handle_command(swarm: &mut Swarm<gossipsub::Behaviour>, cmd: SwarmCommand) {
        match cmd {
            SwarmCommand::Subscribe { topic } => {
                let topic = gossipsub::IdentTopic::new(topic);
                if let Err(e) = swarm.behaviour_mut().subscribe(&topic) {
                    warn!(%topic, error = ?e, "subscribe failed");
                } else {
                    info!(%topic, "subscribed");
                }
            }
            SwarmCommand::Publish { topic, data } => {
                let topic = gossipsub::IdentTopic::new(topic);
                if let Err(e) = swarm.behaviour_mut().publish(topic.clone(), data) {
                    warn!(%topic, error = ?e, "publish failed");
                } else {
                    trace!(%topic, "published");
                }
            }
            SwarmCommand::Dial { address } => {
                if let Err(e) = swarm.dial(address) {
                    warn!(error = ?e, "dial failed");
                }
            }
            SwarmCommand::ReportVerdict {
                message_id,
                propagation_source,
                acceptance,
            } => {
                trace!(%message_id, ?acceptance, "reporting validation result");
                let _ = swarm.behaviour_mut().report_message_validation_result(
                    &message_id,
                    &propagation_source,
                    acceptance,
                );
            }
            SwarmCommand::GetListenAddresses { response_tx } => {
                let addrs: Vec<Multiaddr> = swarm.listeners().cloned().collect();
                let _ = response_tx.send(addrs);
            }
        }
    }

    fn handle_swarm_event(
        event: SwarmEvent<gossipsub::Event>,
        command_tx: &mpsc::UnboundedSender<SwarmCommand>,
        validator: &Arc<MessageValidator>,
        admitted_tx: &mpsc::Sender<AdmittedMessage>,
        shutdown: &CancellationToken,
    ) {
        match event {
            SwarmEvent::Behaviour(gossipsub::Event::Message {
                propagation_source,
                message_id,
                message,
            }) => {
                let validator = Arc::clone(validator);
                let command_tx = command_tx.clone();
                let admitted_tx = admitted_tx.clone();
                let ctx = shutdown.child_token();
                let topic = message.topic.to_string();
                let data = message.data;

                // Validation includes signature verification: off the event
                // loop, onto the blocking pool.
                tokio::spawn(async move {
                    let peer = propagation_source.to_string();
                    let outcome = tokio::task::spawn_blocking(move || {
                        let verdict = validator.validate(&ctx, &peer, &topic, &data);
                        (verdict, data)
                    })
                    .await;

                    let (verdict, data) = match outcome {
                        Ok(result) => result,
                        Err(e) => {
                            warn!(error = %e, "validation task failed");
                            (Verdict::Ignore, Vec::new())
                        }
                    };

                    let acceptance = match verdict {
                        Verdict::Accept => gossipsub::MessageAcceptance::Accept,
                        Verdict::Ignore => gossipsub::MessageAcceptance::Ignore,
                        Verdict::Reject => gossipsub::MessageAcceptance::Reject,
                    };
                    let _ = command_tx.send(SwarmCommand::ReportVerdict {
                        message_id,
                        propagation_source,
                        acceptance,
                    });

                    if verdict == Verdict::Accept {
                        // Admission already decoded this envelope once; a
                        // re-decode here keeps the pipeline side-effect free.
                        if let Ok(envelope) = decode_envelope(&data) {
                            if admitted_tx
                                .send(AdmittedMessage {
                                    peer: propagation_source,
                                    envelope,
                                })
                                .await
                                .is_err()
                            {
                                warn!("consumer channel closed");
                            }
                        }
                    }
                });
            }

            SwarmEvent::Behaviour(gossipsub::Event::Subscribed { peer_id, topic }) => {
                debug!(peer = %peer_id, %topic, "peer subscribed");
            }

            SwarmEvent::ConnectionEstablished {
                peer_id, endpoint, ..
            } => {
                info!(peer = %peer_id, addr = %endpoint.get_remote_address(), "connection established");
            }

            SwarmEvent::ConnectionClosed { peer_id, cause, .. } => {
                info!(peer = %peer_id, ?cause, "connection closed");
            }

            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "listening on new address");
            }

            _ => {}
        }
    }
}

impl Drop for GossipService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvgate_types::BlsKeyPair;

    #[test]
    fn derived_identity_is_deterministic() {
        let key = BlsKeyPair::generate();
        let a = derive_gossip_keypair(key.public_key());
        let b = derive_gossip_keypair(key.public_key());
        assert_eq!(
            PeerId::from(a.public()),
            PeerId::from(b.public())
        );
    }

    #[test]
    fn derived_identity_differs_per_operator() {
        let a = derive_gossip_keypair(BlsKeyPair::generate().public_key());
        let b = derive_gossip_keypair(BlsKeyPair::generate().public_key());
        assert_ne!(PeerId::from(a.public()), PeerId::from(b.public()));
    }
}
