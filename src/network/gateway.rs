//! Acceptors: one TCP listener per configured transport, spawning a session
//! task per accepted connection (§4.J).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::security::{PasswordVerifier, RateLimitManager};
use crate::state::{ChannelRegistry, ClientRegistry};
use crate::sync::{LinkRegistry, Network};

use super::lifecycle;
use super::transport::{split_plain_tcp, split_tls, split_websocket};

/// Everything a session task needs a reference to; one `Arc<Daemon>` is
/// cloned into every spawned task.
pub struct Daemon {
    pub config: Config,
    pub clients: ClientRegistry,
    pub channels: ChannelRegistry,
    pub network: Network,
    pub links: LinkRegistry,
    pub rate_limits: RateLimitManager,
    pub password_verifier: Box<dyn PasswordVerifier>,
    pub active_clients: AtomicUsize,
}

impl Daemon {
    pub fn new(config: Config, password_verifier: Box<dyn PasswordVerifier>) -> Self {
        let network = Network::new(config.server.sid.clone(), config.server.name.clone());
        Self {
            config,
            clients: ClientRegistry::new(),
            channels: ChannelRegistry::new(),
            network,
            links: LinkRegistry::new(),
            rate_limits: RateLimitManager::new(),
            password_verifier,
            active_clients: AtomicUsize::new(0),
        }
    }
}

pub struct Gateway {
    listener: TcpListener,
    daemon: Arc<Daemon>,
}

impl Gateway {
    pub async fn bind(addr: SocketAddr, daemon: Arc<Daemon>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "gateway listening");
        Ok(Self { listener, daemon })
    }

    /// Accept loop, enforcing `max_clients` before spawning a session task
    /// (§4.J).
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let max = self.daemon.config.limits.max_clients;
                    if self.daemon.active_clients.load(Ordering::Relaxed) >= max {
                        info!(%addr, "rejecting connection, at max_clients");
                        drop(stream);
                        continue;
                    }
                    self.daemon.active_clients.fetch_add(1, Ordering::Relaxed);
                    let daemon = Arc::clone(&self.daemon);
                    tokio::spawn(async move {
                        let (reader, writer) = split_plain_tcp(stream, addr);
                        if let Err(e) = lifecycle::run_session(daemon.clone(), reader, writer, false).await {
                            error!(%addr, error = %e, "session ended with error");
                        }
                        daemon.active_clients.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                Err(e) => error!(error = %e, "accept failed"),
            }
        }
    }
}

/// Accept loop for the TLS listener, if configured (§6.4 `[tls]`).
pub async fn run_tls(daemon: Arc<Daemon>, addr: SocketAddr, acceptor: TlsAcceptor) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "TLS gateway listening");
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "TLS accept failed");
                continue;
            }
        };
        let max = daemon.config.limits.max_clients;
        if daemon.active_clients.load(Ordering::Relaxed) >= max {
            continue;
        }
        let acceptor = acceptor.clone();
        let daemon = Arc::clone(&daemon);
        daemon.active_clients.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            match acceptor.accept(stream).await {
                Ok(tls_stream) => {
                    let (reader, writer) = split_tls(tls_stream, peer_addr);
                    if let Err(e) = lifecycle::run_session(daemon.clone(), reader, writer, false).await {
                        error!(%peer_addr, error = %e, "TLS session ended with error");
                    }
                }
                Err(e) => error!(%peer_addr, error = %e, "TLS handshake failed"),
            }
            daemon.active_clients.fetch_sub(1, Ordering::Relaxed);
        });
    }
}

/// Accept loop for the WebSocket listener, if configured (§6.4
/// `[websocket]`). `Origin` checking is deliberately left to a reverse proxy
/// in front of this daemon; the `allowed_origins` list is recorded but not
/// yet enforced here (§1 Non-goals).
pub async fn run_websocket(daemon: Arc<Daemon>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "WebSocket gateway listening");
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "WebSocket accept failed");
                continue;
            }
        };
        let max = daemon.config.limits.max_clients;
        if daemon.active_clients.load(Ordering::Relaxed) >= max {
            continue;
        }
        daemon.active_clients.fetch_add(1, Ordering::Relaxed);
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move {
            match tokio_tungstenite::accept_async(stream).await {
                Ok(ws_stream) => {
                    let (reader, writer) = split_websocket(ws_stream, peer_addr);
                    if let Err(e) = lifecycle::run_session(daemon.clone(), reader, writer, true).await {
                        error!(%peer_addr, error = %e, "WebSocket session ended with error");
                    }
                }
                Err(e) => error!(%peer_addr, error = %e, "WebSocket handshake failed"),
            }
            daemon.active_clients.fetch_sub(1, Ordering::Relaxed);
        });
    }
}
