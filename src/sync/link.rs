//! A peer connection: line-buffered reads, a serialized writer, and the
//! registry that indexes live links by SID (§4.H).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex as AsyncMutex;

use crate::proto::Message;

/// One peer connection. The reader half is owned by the link's read loop
/// task; the writer half is behind an async mutex so `write_message` can be
/// called from any task (the router, in particular) without the caller
/// blocking the whole daemon on a slow peer (§5 lock ordering:
/// `LinkSession-write` is always acquired last).
pub struct LinkSession {
    pub peer_sid: String,
    pub peer_name: String,
    writer: AsyncMutex<OwnedWriteHalf>,
    closed: std::sync::atomic::AtomicBool,
}

impl LinkSession {
    pub fn new(peer_sid: impl Into<String>, peer_name: impl Into<String>, writer: OwnedWriteHalf) -> Self {
        Self {
            peer_sid: peer_sid.into(),
            peer_name: peer_name.into(),
            writer: AsyncMutex::new(writer),
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn reader(stream: OwnedReadHalf) -> BufReader<OwnedReadHalf> {
        BufReader::new(stream)
    }

    pub async fn write_message(&self, msg: &Message) -> std::io::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let mut line = msg.to_line();
        line.push_str("\r\n");
        let mut w = self.writer.lock().await;
        w.write_all(line.as_bytes()).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Idempotent (§4.H).
    pub async fn close(&self) {
        if self.closed.swap(true, std::sync::atomic::Ordering::Relaxed) {
            return;
        }
        let mut w = self.writer.lock().await;
        let _ = w.shutdown().await;
    }
}

pub type LinkHandle = Arc<LinkSession>;

/// SID → live link (§4.H).
#[derive(Default)]
pub struct LinkRegistry {
    by_sid: RwLock<HashMap<String, LinkHandle>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self {
            by_sid: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, link: LinkHandle) {
        self.by_sid.write().insert(link.peer_sid.clone(), link);
    }

    pub fn get(&self, sid: &str) -> Option<LinkHandle> {
        self.by_sid.read().get(sid).cloned()
    }

    pub fn remove(&self, sid: &str) -> Option<LinkHandle> {
        self.by_sid.write().remove(sid)
    }

    pub fn all(&self) -> Vec<LinkHandle> {
        self.by_sid.read().values().cloned().collect()
    }

    pub fn sids(&self) -> Vec<String> {
        self.by_sid.read().keys().cloned().collect()
    }
}
