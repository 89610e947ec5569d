use anyhow::Result;
use clap::Parser;
use ledger_core::{Amount, PeerAddress};
use ledger_node::{ApplyOutcome, NetworkNode, NodeConfig, NodeError, NodeEvent};
use std::{net::SocketAddr, str::FromStr, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Replicated ledger node with a single upstream peer")]
struct Args {
    /// Upstream peer to connect to, e.g. 127.0.0.1:5000
    #[arg(long, default_value = "127.0.0.1:5000")]
    upstream: SocketAddr,

    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Seconds without upstream data before the link is considered dead (0 = never)
    #[arg(long, default_value_t = 600)]
    read_timeout_secs: u64,

    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    max_frame_bytes: usize,

    /// Allow mining and transactions while the upstream is unavailable
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    offline_mutations: bool,
}

impl From<Args> for NodeConfig {
    fn from(args: Args) -> Self {
        Self {
            upstream: args.upstream,
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            read_timeout: (args.read_timeout_secs > 0)
                .then(|| Duration::from_secs(args.read_timeout_secs)),
            max_frame_bytes: args.max_frame_bytes,
            allow_offline_mutations: args.offline_mutations,
            ..NodeConfig::new(args.upstream)
        }
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Balance,
    Peers,
    Chain,
    Send { to: PeerAddress, amount: Amount },
    Mine,
    Refresh,
    Connect,
    Disconnect,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let cmd = match words.next() {
            None | Some("refresh") => Command::Refresh,
            Some("help") => Command::Help,
            Some("balance") => Command::Balance,
            Some("peers") => Command::Peers,
            Some("chain") => Command::Chain,
            Some("mine") => Command::Mine,
            Some("connect") => Command::Connect,
            Some("disconnect") => Command::Disconnect,
            Some("quit") | Some("exit") => Command::Quit,
            Some("send") => {
                let (Some(to), Some(amount)) = (words.next(), words.next()) else {
                    return Err("usage: send <host:port> <amount>".into());
                };
                let to = to
                    .parse::<SocketAddr>()
                    .map_err(|e| format!("bad address {to}: {e}"))?;
                let amount = amount
                    .parse::<Amount>()
                    .map_err(|e| format!("bad amount {amount}: {e}"))?;
                Command::Send {
                    to: PeerAddress::from(to),
                    amount,
                }
            }
            Some(other) => return Err(format!("unknown command {other:?}, try `help`")),
        };
        Ok(cmd)
    }
}

const HELP: &str = "commands: balance | peers | chain | send <host:port> <amount> | mine | refresh | connect | disconnect | quit";

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let node = NetworkNode::new(NodeConfig::from(args));
    let mut events = node.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(msg) = describe(&event) {
                        println!("{msg}");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
    node.connect().await?;
    info!("ledger-node connected to {}", node.config().upstream);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_status(&node).await;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        if !round(&node, &line).await {
            break;
        }
    }
    node.disconnect().await;
    Ok(())
}

async fn print_status(node: &NetworkNode) {
    match (node.identity().await, node.balance().await) {
        (Some(me), Some(balance)) => {
            println!("\n[{:?}] address: {me}  balance: {balance}", node.connection_state())
        }
        _ => println!("\n[{:?}]", node.connection_state()),
    }
}

fn describe(event: &NodeEvent) -> Option<String> {
    match event {
        NodeEvent::Applied(ApplyOutcome::Replaced { from, to }) => {
            Some(format!("adopted longer chain from upstream ({from} -> {to} blocks)"))
        }
        NodeEvent::Applied(_) => None,
        NodeEvent::ChainRejected(err) => Some(format!("rejected chain from upstream: {err}")),
        NodeEvent::UpstreamUnavailable(reason) => Some(format!(
            "upstream unavailable: {reason}; use `connect` to reach it again"
        )),
    }
}

/// Handle one input line. Returns `false` once the operator quits.
///
/// Every other round ends with our full snapshot pushed upstream, whether
/// the command succeeded, failed or did not parse.
async fn round(node: &NetworkNode, line: &str) -> bool {
    let pushed = match line.parse::<Command>() {
        Ok(Command::Quit) => return false,
        Ok(cmd) => match run(node, cmd).await {
            Ok(pushed) => pushed,
            Err(err) => {
                println!("error: {err}");
                if err.is_connection() {
                    println!("use `connect` to reach the upstream again");
                }
                false
            }
        },
        Err(msg) => {
            println!("{msg}");
            false
        }
    };
    if !pushed {
        node.refresh().await;
    }
    true
}

/// Run one command; `Ok(true)` when it already pushed a snapshot itself.
async fn run(node: &NetworkNode, cmd: Command) -> Result<bool, NodeError> {
    match cmd {
        Command::Help => println!("{HELP}"),
        Command::Balance => {
            if let Some(balance) = node.balance().await {
                println!("{balance}");
            }
        }
        Command::Peers => {
            let peers = node.known_peers().await;
            if peers.is_empty() {
                println!("no peers in the network");
            }
            for peer in peers {
                println!("{peer}");
            }
        }
        Command::Chain => print!("{}", node.ledger().await),
        Command::Send { to, amount } => {
            node.submit_transaction(to, amount).await?;
            println!("transaction added to the pending pool");
            return Ok(true);
        }
        Command::Mine => {
            let block = node.mine_block().await?;
            println!("mined block #{}", block.index);
            return Ok(true);
        }
        Command::Refresh => {
            node.refresh().await;
            return Ok(true);
        }
        // the hello carries no ledger, so the round still ends with a full push
        Command::Connect => node.connect().await?,
        // nothing left to push to
        Command::Disconnect => {
            node.disconnect().await;
            return Ok(true);
        }
        Command::Quit => {}
    }
    Ok(false)
}
