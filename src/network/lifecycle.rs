//! Per-connection task lifecycle: read loop, writer task, idle/ping
//! bookkeeping, and the two periodic loops that patrol every session
//! (§4.B, §4.J).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::Outcome;
use crate::handlers;
use crate::proto::{command, Message};
use crate::state::Session;

use super::gateway::Daemon;
use super::transport::{TransportReader, TransportWriter};

/// Per-line read deadline (§4.B).
const READ_DEADLINE: Duration = Duration::from_secs(300);
/// Per-write deadline (§4.B).
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
/// Timeout loop cadence (§4.J).
const TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Drive one client connection end to end: register the session, spawn its
/// writer task, then read and dispatch lines until disconnect. `reader`
/// and `writer` are the two halves produced by the transport's `split_*`
/// constructor — each is owned by exactly one task for the session's
/// lifetime, which is what makes the writer task the sole sender per §5.
pub async fn run_session(
    daemon: Arc<Daemon>,
    mut reader: Box<dyn TransportReader>,
    mut writer: Box<dyn TransportWriter>,
    is_websocket: bool,
) -> std::io::Result<()> {
    let addr = reader.peer_addr();
    let id = daemon.clients.next_session_id();
    let (session, outbound_rx) = Session::new(id, addr.ip());
    let shutdown = session.shutdown_handle();
    let session = Arc::new(RwLock::new(session));

    let writer_handle = tokio::spawn(writer_task(writer_take(&mut writer), outbound_rx));

    loop {
        let line = tokio::select! {
            result = reader.read_line(READ_DEADLINE) => match result {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(%addr, error = %e, "read error, disconnecting");
                    break;
                }
            },
            _ = shutdown.notified() => {
                if session.read().is_disconnected() {
                    break;
                }
                continue;
            }
        };

        session.write().last_activity = Instant::now();

        if !daemon.rate_limits.check(id) {
            session.read().send(command::error("Excess Flood"));
            break;
        }

        let msg = match Message::parse(&line) {
            Ok(m) => m,
            Err(_) => continue,
        };

        match handlers::dispatch(&daemon, &session, msg).await {
            Outcome::Continue => {}
            Outcome::Quit(reason) => {
                session.read().send(command::error(&format!("Closing Link: {reason}")));
                break;
            }
        }

        if is_websocket && session.read().is_disconnected() {
            break;
        }
    }

    session.write().disconnect();
    daemon.rate_limits.remove(id);
    if let Some(nick) = {
        let s = session.read();
        (!s.nickname().is_empty()).then(|| s.nickname().to_string())
    } {
        daemon.clients.remove(&nick);
    }
    writer_handle.abort();
    Ok(())
}

/// Move the writer half out so it can be handed to the spawned writer
/// task; `writer` itself is a local borrow owner whose only job is holding
/// the box until this point.
fn writer_take(writer: &mut Box<dyn TransportWriter>) -> Box<dyn TransportWriter> {
    std::mem::replace(writer, Box::new(NullWriter))
}

struct NullWriter;

#[async_trait::async_trait]
impl TransportWriter for NullWriter {
    async fn write_line(&mut self, _line: &str, _deadline: Duration) -> std::io::Result<()> {
        Ok(())
    }
    async fn close(&mut self) {}
}

/// The writer task owns the transport's write half exclusively — per §5,
/// it is the only task allowed to touch the socket for sending. It drains
/// the session's outbound queue until the queue closes (session dropped)
/// or a write fails (peer gone).
async fn writer_task(mut writer: Box<dyn TransportWriter>, mut rx: tokio::sync::mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if writer.write_line(&msg.to_line(), WRITE_DEADLINE).await.is_err() {
            break;
        }
    }
    writer.close().await;
}

/// Every `ping_interval`, enqueue `PING :<server>` to each registered
/// session whose `last_ping` has gone stale, and stamp `last_ping` (§4.J).
pub async fn ping_loop(daemon: Arc<Daemon>) {
    let interval = Duration::from_secs(daemon.config.limits.ping_interval);
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        for session in daemon.clients.all() {
            let mut s = session.write();
            if s.is_registered() && s.last_ping.elapsed() >= interval {
                s.send(command::ping(&daemon.config.server.name));
                s.last_ping = Instant::now();
            }
        }
    }
}

/// Every 30s, disconnect any session idle per §4.B (§4.J "Timeout loop").
pub async fn timeout_loop(daemon: Arc<Daemon>) {
    let mut ticker = tokio::time::interval(TIMEOUT_SWEEP_INTERVAL);
    let idle_timeout = Duration::from_secs(daemon.config.limits.idle_timeout);
    loop {
        ticker.tick().await;
        for session in daemon.clients.all() {
            let mut s = session.write();
            if s.is_disconnected() {
                continue;
            }
            if s.last_activity.elapsed() > idle_timeout {
                info!(session = s.id, "idle timeout");
                s.send(command::error("Closing Link: (Ping timeout)"));
                s.disconnect();
            }
        }
    }
}

pub fn active_session_count(daemon: &Daemon) -> usize {
    daemon.active_clients.load(Ordering::Relaxed)
}
