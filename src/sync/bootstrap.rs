//! Wires the handshake, burst, and link registry together into the two
//! entry points federation actually needs at runtime: accepting an inbound
//! link and dialing an outbound one (§4.F, §4.H).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::config::{Config, LinkBlock};
use crate::network::gateway::Daemon;
use crate::proto::Message;

use super::burst::{apply_burst_message, build_burst};
use super::handshake::{HandshakeMachine, Role};
use super::link::LinkSession;
use super::network::Server;
use super::remote::apply_ongoing;

fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Accept loop for the federation link port (§6.4 `federation.link_port`).
pub async fn run_link_listener(daemon: Arc<Daemon>, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "federation link listener bound");
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "link accept failed");
                continue;
            }
        };
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move {
            if let Err(e) = handle_inbound_link(daemon, stream).await {
                warn!(%peer_addr, error = %e, "inbound link terminated");
            }
        });
    }
}

async fn handle_inbound_link(daemon: Arc<Daemon>, stream: TcpStream) -> std::io::Result<()> {
    let expected_password = daemon
        .config
        .federation
        .as_ref()
        .map(|f| f.link_password.clone())
        .unwrap_or_default();

    let known_sids = daemon.links.sids();
    let mut machine = HandshakeMachine::new(
        Role::Inbound,
        daemon.network.local_sid().to_string(),
        daemon.network.local_name().to_string(),
        expected_password,
        daemon.config.server.description.clone(),
        known_sids,
    );

    run_handshake_and_burst(daemon, stream, &mut machine).await
}

/// Dial every `auto_connect` link block at startup; reconnection on drop is
/// left to the operator (§1 Non-goals).
pub async fn connect_configured_links(daemon: Arc<Daemon>, config: &Config) {
    let Some(fed) = &config.federation else { return };
    for link in &fed.links {
        if !link.auto_connect {
            continue;
        }
        let daemon = Arc::clone(&daemon);
        let link = link.clone();
        tokio::spawn(async move {
            if let Err(e) = connect_outbound_link(daemon, &link).await {
                warn!(peer = %link.name, error = %e, "outbound link failed");
            }
        });
    }
}

async fn connect_outbound_link(daemon: Arc<Daemon>, link: &LinkBlock) -> std::io::Result<()> {
    let stream = TcpStream::connect((link.host.as_str(), link.port)).await?;

    let known_sids = daemon.links.sids();
    let mut machine = HandshakeMachine::new(
        Role::Outbound {
            expected_sid: link.sid.clone(),
            expected_name: link.name.clone(),
        },
        daemon.network.local_sid().to_string(),
        daemon.network.local_name().to_string(),
        link.password.clone(),
        daemon.config.server.description.clone(),
        known_sids,
    );

    run_handshake_and_burst(daemon, stream, &mut machine).await
}

async fn run_handshake_and_burst(
    daemon: Arc<Daemon>,
    stream: TcpStream,
    machine: &mut HandshakeMachine,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = LinkSession::reader(read_half);

    for msg in machine.opening_messages(unix_now()) {
        write_line(&mut write_half, &msg).await?;
    }

    while !machine.is_complete() {
        let Some(line) = read_one_line(&mut reader).await? else {
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "link closed during handshake"));
        };
        let msg = Message::parse(&line).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        machine
            .step(&msg, unix_now())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    }

    let peer_sid = machine.remote_sid().unwrap_or_default().to_string();
    let peer_name = machine.remote_name.clone().unwrap_or_default();
    daemon.network.add_server(Server {
        sid: peer_sid.clone(),
        name: peer_name.clone(),
        description: machine.remote_description.clone().unwrap_or_default(),
        capabilities: machine.remote_capab.clone().unwrap_or_default(),
        uplink_sid: None,
        hops: 1,
        is_hub: true,
    }).ok();

    let link_session = Arc::new(LinkSession::new(peer_sid.clone(), peer_name, write_half));
    daemon.links.insert(link_session.clone());

    for msg in build_burst(daemon.network.local_sid(), daemon.network.local_name(), &daemon.clients, &daemon.channels) {
        link_session.write_message(&msg).await?;
    }

    // Burst phase: apply UID/SJOIN records to the network mirror until the
    // peer's own end-of-burst PING arrives, then answer PONG and drop into
    // the ongoing phase (§4.F "Transmitted records" / "end of burst").
    loop {
        let Some(line) = read_one_line(&mut reader).await? else {
            daemon.links.remove(&peer_sid);
            return Ok(());
        };
        let Ok(msg) = Message::parse(&line) else { continue };
        let end_of_burst = apply_burst_message(&daemon.network, &msg);
        if end_of_burst {
            link_session.write_message(&Message::new("PONG", vec![daemon.network.local_name().to_string()])).await?;
            break;
        }
    }

    // Ongoing phase: every subsequent line gets the full §4.F dispatch
    // table (PRIVMSG/JOIN/PART/QUIT/NICK/MODE/TOPIC/KICK/INVITE/SQUIT),
    // not just the burst-only UID/SJOIN/PING handling above.
    loop {
        let Some(line) = read_one_line(&mut reader).await? else {
            break;
        };
        let Ok(msg) = Message::parse(&line) else { continue };
        apply_ongoing(&daemon, &link_session, &msg).await;
    }

    daemon.links.remove(&peer_sid);
    Ok(())
}

async fn read_one_line<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    while buf.ends_with('\n') || buf.ends_with('\r') {
        buf.pop();
    }
    Ok(Some(buf))
}

async fn write_line(writer: &mut (impl AsyncWriteExt + Unpin), msg: &Message) -> std::io::Result<()> {
    let mut line = msg.to_line();
    line.push_str("\r\n");
    writer.write_all(line.as_bytes()).await
}
