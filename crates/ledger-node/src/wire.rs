use crate::{NodeError, PeerSet};
use ledger_core::{Block, Ledger, Transaction};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
}

impl From<&Ledger> for LedgerState {
    fn from(ledger: &Ledger) -> Self {
        Self {
            chain: ledger.chain().to_vec(),
            pending_transactions: ledger.pending_transactions().to_vec(),
        }
    }
}

/// Full-state message exchanged between peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub peers: PeerSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<LedgerState>,
}

pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, NodeError> {
    let mut frame = serde_json::to_vec(snapshot)?;
    frame.push(b'\n');
    Ok(frame)
}

pub fn decode(frame: &[u8]) -> Result<Snapshot, NodeError> {
    Ok(serde_json::from_slice(frame)?)
}

/// Read the next `\n`-terminated snapshot. `Ok(None)` means the peer closed the stream cleanly.
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<Snapshot>, NodeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = max_frame_bytes as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    match buf.pop() {
        Some(b'\n') => decode(&buf).map(Some),
        _ if n as u64 >= limit => Err(NodeError::Connection(format!(
            "frame exceeds {max_frame_bytes} bytes"
        ))),
        _ => Err(NodeError::Connection("truncated frame".into())),
    }
}

pub async fn write_frame<W>(writer: &mut W, snapshot: &Snapshot) -> Result<(), NodeError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(snapshot)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
