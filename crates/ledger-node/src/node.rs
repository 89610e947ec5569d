use crate::{
    constants::EVENT_CAPACITY,
    session::{ApplyOutcome, PeerSyncSession},
    wire, NodeConfig, NodeError,
};
use ledger_core::{
    Account, Amount, BigInt, Block, Ledger, PeerAddress, Transaction, ValidationError,
};
use std::sync::Arc;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpSocket, TcpStream,
    },
    sync::{broadcast, watch, Mutex, MutexGuard},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the receiver did with the upstream, for the operator to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Applied(ApplyOutcome),
    ChainRejected(ValidationError),
    UpstreamUnavailable(String),
}

struct Link {
    writer: OwnedWriteHalf,
    receiver: JoinHandle<()>,
}

#[derive(Default)]
struct LinkState {
    link: Option<Link>,
    /// Our own address; kept across disconnects so reconnecting reuses it.
    identity: Option<PeerAddress>,
    upstream: Option<PeerAddress>,
    /// Bumped on every connect so a stale receiver cannot tear down a newer link.
    generation: u64,
}

pub struct NetworkNode {
    config: NodeConfig,
    session: PeerSyncSession,
    link: Arc<Mutex<LinkState>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    events: broadcast::Sender<NodeEvent>,
}

impl NetworkNode {
    /// A disconnected node with a freshly generated genesis block.
    pub fn new(config: NodeConfig) -> Self {
        Self::with_ledger(config, Ledger::with_genesis())
    }

    pub fn with_ledger(config: NodeConfig, ledger: Ledger) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            session: PeerSyncSession::new(ledger),
            link: Arc::new(Mutex::new(LinkState::default())),
            state_tx: Arc::new(state_tx),
            events,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Applied snapshots, rejected chains and upstream loss, in order.
    pub fn subscribe_events(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    pub async fn identity(&self) -> Option<PeerAddress> {
        self.link.lock().await.identity.clone()
    }

    /// Open the upstream connection and spawn the receiver.
    ///
    /// A node that connected before binds its previous local address again so
    /// that its account stays the same.
    pub async fn connect(&self) -> Result<(), NodeError> {
        let mut guard = self.link.lock().await;
        if self.connection_state() != ConnectionState::Disconnected {
            return Err(NodeError::AlreadyConnected);
        }
        self.state_tx.send_replace(ConnectionState::Connecting);

        let stream = match self.open_stream(guard.identity.as_ref()).await {
            Ok(stream) => stream,
            Err(err) => {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(err);
            }
        };
        let (local, upstream) = match (stream.local_addr(), stream.peer_addr()) {
            (Ok(local), Ok(upstream)) => (PeerAddress::from(local), PeerAddress::from(upstream)),
            (Err(err), _) | (_, Err(err)) => {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(err.into());
            }
        };
        self.session.state().lock().await.peers.insert(local.clone());

        let (reader, writer) = stream.into_split();
        guard.generation += 1;
        let receiver = tokio::spawn(receive_loop(
            reader,
            self.session.clone(),
            Arc::clone(&self.link),
            Arc::clone(&self.state_tx),
            self.events.clone(),
            guard.generation,
            self.config.clone(),
        ));
        guard.link = Some(Link { writer, receiver });
        guard.identity = Some(local.clone());
        guard.upstream = Some(upstream.clone());
        self.state_tx.send_replace(ConnectionState::Connected);
        info!(%local, %upstream, "connected to upstream");

        // first contact announces our address without a ledger
        self.push_locked(&mut guard, false).await?;
        Ok(())
    }

    async fn open_stream(&self, identity: Option<&PeerAddress>) -> Result<TcpStream, NodeError> {
        if let Some(local) = identity.and_then(PeerAddress::to_socket_addr) {
            match self.dial(Some(local)).await {
                Ok(stream) => return Ok(stream),
                Err(err) => warn!(%local, %err, "could not reuse previous address"),
            }
        }
        self.dial(None).await
    }

    async fn dial(&self, local: Option<std::net::SocketAddr>) -> Result<TcpStream, NodeError> {
        let upstream = self.config.upstream;
        let socket = if upstream.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        if let Some(local) = local {
            socket.set_reuseaddr(true)?;
            socket.bind(local)?;
        }
        match timeout(self.config.connect_timeout, socket.connect(upstream)).await {
            Ok(stream) => Ok(stream?),
            Err(_) => Err(NodeError::Connection(format!(
                "connecting to {upstream} timed out"
            ))),
        }
    }

    /// Drop the upstream connection. The ledger is kept.
    pub async fn disconnect(&self) {
        let mut guard = self.link.lock().await;
        self.teardown(&mut guard, "disconnected by operator");
    }

    fn teardown(&self, guard: &mut MutexGuard<'_, LinkState>, reason: &str) {
        if let Some(link) = guard.link.take() {
            link.receiver.abort();
            warn!(reason, "upstream unavailable");
            let _ = self.events.send(NodeEvent::UpstreamUnavailable(reason.to_string()));
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Push the full snapshot upstream. Returns `false` when there is no connection.
    pub async fn push_snapshot(&self) -> Result<bool, NodeError> {
        let mut guard = self.link.lock().await;
        self.push_locked(&mut guard, true).await
    }

    async fn push_locked(
        &self,
        guard: &mut MutexGuard<'_, LinkState>,
        include_ledger: bool,
    ) -> Result<bool, NodeError> {
        let Some(link) = guard.link.as_mut() else {
            debug!("no upstream, snapshot not pushed");
            return Ok(false);
        };
        let frame = wire::encode(&self.session.snapshot(include_ledger).await)?;
        let written = timeout(self.config.write_timeout, async {
            link.writer.write_all(&frame).await?;
            link.writer.flush().await
        })
        .await;
        match written {
            Ok(Ok(())) => {
                debug!(bytes = frame.len(), include_ledger, "pushed snapshot");
                Ok(true)
            }
            Ok(Err(err)) => {
                self.teardown(guard, "write failed");
                Err(err.into())
            }
            Err(_) => {
                self.teardown(guard, "write timed out");
                Err(NodeError::Connection("write timed out".into()))
            }
        }
    }

    /// Push after a local change. A failed push is logged, not returned:
    /// the change itself already happened.
    async fn announce(&self) {
        if let Err(err) = self.push_snapshot().await {
            warn!(%err, "could not push snapshot");
        }
    }

    /// Completes an interactive round that changed nothing locally.
    pub async fn refresh(&self) {
        self.announce().await;
    }

    /// Balance of this node's own account, if it has one yet.
    pub async fn balance(&self) -> Option<BigInt> {
        let me = self.identity().await?;
        let state = self.session.state().lock().await;
        Some(state.ledger.get_balance(&Account::Peer(me)))
    }

    /// A copy of the current ledger, for display.
    pub async fn ledger(&self) -> Ledger {
        self.session.state().lock().await.ledger.clone()
    }

    /// Known peers other than this node and its upstream.
    pub async fn known_peers(&self) -> Vec<PeerAddress> {
        let guard = self.link.lock().await;
        let excluded: Vec<&PeerAddress> = guard
            .identity
            .iter()
            .chain(guard.upstream.iter())
            .collect();
        self.session.state().lock().await.peers.without(&excluded)
    }

    fn check_mutations_allowed(&self) -> Result<(), NodeError> {
        if !self.config.allow_offline_mutations
            && self.connection_state() != ConnectionState::Connected
        {
            return Err(NodeError::Disconnected);
        }
        Ok(())
    }

    /// Send `amount` from this node's account to a known peer.
    pub async fn submit_transaction(
        &self,
        recipient: PeerAddress,
        amount: Amount,
    ) -> Result<(), NodeError> {
        self.check_mutations_allowed()?;
        let me = self.identity().await.ok_or(NodeError::Disconnected)?;
        let peers = self.known_peers().await;
        if peers.is_empty() {
            return Err(NodeError::EmptyPeerSet);
        }
        if !peers.contains(&recipient) {
            return Err(NodeError::UnknownPeer(recipient));
        }
        {
            let mut state = self.session.state().lock().await;
            state
                .ledger
                .new_transaction(Transaction::new(me, recipient, amount))?;
        }
        self.announce().await;
        Ok(())
    }

    /// Seal the pending pool into a block rewarding this node.
    pub async fn mine_block(&self) -> Result<Block, NodeError> {
        self.check_mutations_allowed()?;
        let me = self.identity().await.ok_or(NodeError::Disconnected)?;
        let block = {
            let mut state = self.session.state().lock().await;
            state.ledger.add_block(&Account::Peer(me))?.clone()
        };
        self.announce().await;
        Ok(block)
    }
}

impl Drop for NetworkNode {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.link.try_lock() {
            if let Some(link) = guard.link.take() {
                link.receiver.abort();
            }
        }
    }
}

async fn receive_loop(
    reader: OwnedReadHalf,
    session: PeerSyncSession,
    link: Arc<Mutex<LinkState>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    events: broadcast::Sender<NodeEvent>,
    generation: u64,
    config: NodeConfig,
) {
    let mut reader = BufReader::new(reader);
    let reason = loop {
        let next = wire::read_frame(&mut reader, config.max_frame_bytes);
        let frame = match config.read_timeout {
            Some(limit) => match timeout(limit, next).await {
                Ok(frame) => frame,
                Err(_) => break NodeError::Connection("read timed out".into()),
            },
            None => next.await,
        };
        match frame {
            Ok(Some(snapshot)) => match session.apply(snapshot).await {
                Ok(outcome) => {
                    debug!(?outcome, "applied snapshot");
                    let _ = events.send(NodeEvent::Applied(outcome));
                }
                // the link stays up after a rejected chain
                Err(NodeError::Validation(err)) => {
                    let _ = events.send(NodeEvent::ChainRejected(err));
                }
                Err(err) => break err,
            },
            Ok(None) => break NodeError::Connection("upstream closed the connection".into()),
            Err(err) => break err,
        }
    };

    let mut guard = link.lock().await;
    if guard.generation == generation {
        guard.link = None;
        state_tx.send_replace(ConnectionState::Disconnected);
        warn!(%reason, "upstream unavailable");
        let _ = events.send(NodeEvent::UpstreamUnavailable(reason.to_string()));
    }
}
