use serde::{Deserialize, Serialize};
use std::{
    fmt,
    net::{IpAddr, SocketAddr},
};

/// Opaque `(host, port)` identifier of a node. Doubles as the node's account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `None` when `host` is not a literal IP address.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        self.host
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.port))
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Party to a transaction.
///
/// `Network` is the mint that pays mining rewards. It has no spendable
/// balance, so the admission check always refuses it as a sender.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Account {
    Network,
    Peer(PeerAddress),
}

impl Account {
    /// Stable byte encoding fed into transaction digests.
    pub fn digest_bytes(&self) -> Vec<u8> {
        match self {
            Account::Network => vec![0u8],
            Account::Peer(addr) => {
                let mut bytes = Vec::with_capacity(1 + 8 + addr.host.len() + 2);
                bytes.push(1u8);
                bytes.extend_from_slice(&(addr.host.len() as u64).to_le_bytes());
                bytes.extend_from_slice(addr.host.as_bytes());
                bytes.extend_from_slice(&addr.port.to_le_bytes());
                bytes
            }
        }
    }
}

impl From<PeerAddress> for Account {
    fn from(addr: PeerAddress) -> Self {
        Account::Peer(addr)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Account::Network => write!(f, "network"),
            Account::Peer(addr) => write!(f, "{addr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_addr_conversions() {
        let v4: SocketAddr = "127.0.0.1:5001".parse().unwrap();
        let addr = PeerAddress::from(v4);
        assert_eq!(addr.to_string(), "127.0.0.1:5001");
        assert_eq!(addr.to_socket_addr(), Some(v4));

        let v6: SocketAddr = "[::1]:5002".parse().unwrap();
        assert_eq!(PeerAddress::from(v6).to_socket_addr(), Some(v6));

        assert_eq!(PeerAddress::new("node-a", 1).to_socket_addr(), None);
    }

    #[test]
    fn network_and_peer_digests_differ() {
        let peer = Account::Peer(PeerAddress::new("", 0));
        assert_ne!(peer.digest_bytes(), Account::Network.digest_bytes());
    }
}
