//! slircd — a TS6-federated IRC daemon.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use slircd::config::{self, Config, LogFormat};
use slircd::network::gateway::{run_tls, run_websocket};
use slircd::network::{Daemon, Gateway};
use slircd::security::BcryptVerifier;
use slircd::sync::bootstrap::{connect_configured_links, run_link_listener};
use slircd::network;

fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);
    let raw_path = match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {flag}");
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "config.toml".to_string(),
    };
    match std::fs::canonicalize(Path::new(&raw_path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => raw_path,
    }
}

fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.server.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).json().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).init();
        }
    }
}

fn load_tls_acceptor(tls: &config::TlsConfig) -> anyhow::Result<tokio_rustls::TlsAcceptor> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(std::fs::File::open(&tls.cert_path)?))
        .collect::<Result<Vec<_>, _>>()?;
    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(std::fs::File::open(&tls.key_path)?))?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {}", tls.key_path))?;

    let server_config = tokio_rustls::rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(tokio_rustls::TlsAcceptor::from(Arc::new(server_config)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = resolve_config_path();
    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("ERROR: failed to load config from {config_path}: {e}");
        e
    })?;

    init_tracing(&config);

    info!(
        server = %config.server.name,
        sid = %config.server.sid,
        "starting slircd"
    );

    let plain_addr: std::net::SocketAddr = format!("{}:{}", config.listen.host, config.listen.port).parse()?;
    let tls_cfg = config.tls.clone();
    let ws_cfg = config.websocket.clone();
    let federation_cfg = config.federation.clone();

    let daemon = Arc::new(Daemon::new(config.clone(), Box::new(BcryptVerifier)));

    let gateway = Gateway::bind(plain_addr, daemon.clone()).await?;
    tokio::spawn(async move {
        if let Err(e) = gateway.run().await {
            error!(error = %e, "plain gateway exited");
        }
    });

    if let Some(tls) = tls_cfg {
        let addr: std::net::SocketAddr = format!("{}:{}", config.listen.host, tls.port).parse()?;
        let acceptor = load_tls_acceptor(&tls)?;
        let daemon = daemon.clone();
        tokio::spawn(async move {
            if let Err(e) = run_tls(daemon, addr, acceptor).await {
                error!(error = %e, "TLS gateway exited");
            }
        });
    }

    if let Some(ws) = ws_cfg {
        let addr: std::net::SocketAddr = format!("{}:{}", config.listen.host, ws.port).parse()?;
        let daemon = daemon.clone();
        tokio::spawn(async move {
            if let Err(e) = run_websocket(daemon, addr).await {
                error!(error = %e, "WebSocket gateway exited");
            }
        });
    }

    if let Some(fed) = federation_cfg {
        let link_addr: std::net::SocketAddr = format!("{}:{}", config.listen.host, fed.link_port).parse()?;
        let daemon = daemon.clone();
        tokio::spawn(async move {
            if let Err(e) = run_link_listener(daemon, link_addr).await {
                error!(error = %e, "link listener exited");
            }
        });
        connect_configured_links(daemon.clone(), &config).await;
    }

    {
        let daemon = daemon.clone();
        tokio::spawn(network::lifecycle::ping_loop(daemon));
    }
    {
        let daemon = daemon.clone();
        tokio::spawn(network::lifecycle::timeout_loop(daemon));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    Ok(())
}
