//! Gossip transport configuration.

use libp2p::Multiaddr;
use std::time::Duration;

/// Configuration for the gossip service.
///
/// # Example
///
/// ```
/// use dvgate_gossip::GossipConfig;
/// use std::time::Duration;
///
/// let config = GossipConfig::default()
///     .with_gossipsub_heartbeat(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Addresses to listen on.
    ///
    /// Default: `/ip4/0.0.0.0/udp/0/quic-v1` (random port, QUIC transport)
    pub listen_addresses: Vec<Multiaddr>,

    /// Bootstrap peer addresses for initial connection.
    ///
    /// Default: empty (no bootstrap peers)
    pub bootstrap_peers: Vec<Multiaddr>,

    /// Maximum gossip message size in bytes.
    ///
    /// Default: 1MB
    pub max_message_size: usize,

    /// Gossipsub heartbeat interval.
    ///
    /// Default: 1 second
    pub gossipsub_heartbeat: Duration,

    /// Idle connection timeout.
    ///
    /// Default: 60 seconds
    pub idle_connection_timeout: Duration,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            listen_addresses: vec!["/ip4/0.0.0.0/udp/0/quic-v1".parse().unwrap()],
            bootstrap_peers: vec![],
            max_message_size: 1024 * 1024,
            gossipsub_heartbeat: Duration::from_secs(1),
            idle_connection_timeout: Duration::from_secs(60),
        }
    }
}

impl GossipConfig {
    pub fn with_listen_addresses(mut self, addrs: Vec<Multiaddr>) -> Self {
        self.listen_addresses = addrs;
        self
    }

    pub fn with_bootstrap_peers(mut self, peers: Vec<Multiaddr>) -> Self {
        self.bootstrap_peers = peers;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_gossipsub_heartbeat(mut self, interval: Duration) -> Self {
        self.gossipsub_heartbeat = interval;
        self
    }

    pub fn with_idle_connection_timeout(mut self, timeout: Duration) -> Self {
        self.idle_connection_timeout = timeout;
        self
    }

    /// Config for local testing on a fixed loopback port.
    pub fn for_testing(port: u16) -> Self {
        Self {
            listen_addresses: vec![format!("/ip4/127.0.0.1/udp/{}/quic-v1", port)
                .parse()
                .unwrap()],
            bootstrap_peers: vec![],
            max_message_size: 256 * 1024,
            gossipsub_heartbeat: Duration::from_millis(500),
            idle_connection_timeout: Duration::from_secs(30),
        }
    }
}
