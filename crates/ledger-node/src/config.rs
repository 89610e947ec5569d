use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, DEFAULT_UPSTREAM,
    DEFAULT_WRITE_TIMEOUT_MILLIS, MAX_FRAME_BYTES,
};
use std::{net::SocketAddr, time::Duration};

#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// The single peer this node connects to.
    pub upstream: SocketAddr,
    pub connect_timeout: Duration,
    /// `None` waits on the upstream forever.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Duration,
    pub max_frame_bytes: usize,
    /// Whether mining and transaction submission work while disconnected.
    /// Changes made offline are pushed on the next successful command after reconnecting.
    pub allow_offline_mutations: bool,
}

impl NodeConfig {
    pub fn new(upstream: SocketAddr) -> Self {
        Self {
            upstream,
            ..Self::default()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            upstream: DEFAULT_UPSTREAM
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 5000))),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Some(Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS)),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MILLIS),
            max_frame_bytes: MAX_FRAME_BYTES,
            allow_offline_mutations: true,
        }
    }
}
