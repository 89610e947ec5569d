use ledger_core::{Account, Ledger, PeerAddress};
use ledger_node::{
    wire, ConnectionState, LedgerState, NetworkNode, NodeConfig, NodeEvent, PeerSet, Snapshot,
};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener,
    },
    sync::{broadcast, watch},
    time::{sleep, timeout},
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn peer(port: u16) -> PeerAddress {
    PeerAddress::new("127.0.0.1", port)
}

pub fn test_config(upstream: SocketAddr) -> NodeConfig {
    NodeConfig {
        connect_timeout: Duration::from_secs(2),
        read_timeout: Some(Duration::from_secs(30)),
        write_timeout: Duration::from_secs(2),
        ..NodeConfig::new(upstream)
    }
}

/// Chain of `len` blocks whose rewards all go to `miner`.
pub fn remote_ledger(miner: &PeerAddress, len: usize) -> Ledger {
    let mut ledger = Ledger::with_genesis();
    for _ in 1..len {
        ledger
            .add_block(&Account::Peer(miner.clone()))
            .expect("genesis present");
    }
    ledger
}

pub fn snapshot_of(peers: &[PeerAddress], ledger: Option<&Ledger>) -> Snapshot {
    Snapshot {
        peers: peers.iter().cloned().collect::<PeerSet>(),
        ledger: ledger.map(LedgerState::from),
    }
}

/// The far end of a node's upstream connection.
pub struct Upstream {
    pub reader: BufReader<OwnedReadHalf>,
    pub writer: OwnedWriteHalf,
}

impl Upstream {
    pub async fn recv(&mut self) -> Snapshot {
        timeout(WAIT, wire::read_frame(&mut self.reader, 1 << 24))
            .await
            .expect("snapshot within timeout")
            .expect("well-formed snapshot")
            .expect("stream still open")
    }

    pub async fn send(&mut self, snapshot: &Snapshot) {
        wire::write_frame(&mut self.writer, snapshot)
            .await
            .expect("write snapshot");
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write raw bytes");
        self.writer.flush().await.expect("flush");
    }
}

pub async fn listen() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, addr)
}

pub async fn accept(listener: &TcpListener) -> Upstream {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("accept within timeout")
        .expect("accept");
    let (reader, writer) = stream.into_split();
    Upstream {
        reader: BufReader::new(reader),
        writer,
    }
}

/// Start a node against a fresh listener and consume its first-contact snapshot.
pub async fn connected_node(
    config: impl FnOnce(NodeConfig) -> NodeConfig,
) -> (NetworkNode, TcpListener, Upstream) {
    let (listener, addr) = listen().await;
    let node = NetworkNode::new(config(test_config(addr)));
    node.connect().await.expect("connect");
    let mut upstream = accept(&listener).await;
    let hello = upstream.recv().await;
    assert!(hello.ledger.is_none());
    (node, listener, upstream)
}

pub async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, wanted: ConnectionState) {
    timeout(WAIT, rx.wait_for(|state| *state == wanted))
        .await
        .expect("state change within timeout")
        .expect("node alive");
}

pub async fn wait_for_chain_len(node: &NetworkNode, len: usize) {
    timeout(WAIT, async {
        while node.ledger().await.len() != len {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("chain length within timeout");
}

/// Known peers only change when a snapshot has been applied, so this doubles as a barrier.
pub async fn wait_for_peer(node: &NetworkNode, addr: &PeerAddress) {
    timeout(WAIT, async {
        while !node.known_peers().await.contains(addr) {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peer within timeout");
}

/// Skip events until one matches.
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<NodeEvent>,
    wanted: impl Fn(&NodeEvent) -> bool,
) -> NodeEvent {
    timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("node alive");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event within timeout")
}
