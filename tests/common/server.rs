//! Spawns real `slircd` subprocesses against throwaway config files, the
//! same black-box approach the teacher's integration suite uses rather than
//! wiring a `Gateway` in-process.

#![allow(dead_code)]

use std::net::TcpListener as StdTcpListener;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;

use tokio::time::sleep;

/// One configured peer link for a federated test server.
pub struct PeerLink {
    pub name: String,
    pub sid: String,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub auto_connect: bool,
}

pub struct TestServer {
    child: Child,
    port: u16,
    link_port: Option<u16>,
    data_dir: PathBuf,
}

/// Ask the OS for a free port by binding to `:0` and immediately dropping
/// the listener; good enough for a test suite that doesn't run the same
/// server twice in the same instant.
fn free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

impl TestServer {
    /// A plain server with no federation block.
    pub async fn spawn(sid: &str, name: &str) -> anyhow::Result<Self> {
        Self::spawn_with(sid, name, None).await
    }

    /// A server with a federation listener but no configured outbound links
    /// (the accepting side of a link test).
    pub async fn spawn_awaiting_link(sid: &str, name: &str, link_password: &str) -> anyhow::Result<(Self, u16)> {
        let link_port = free_port();
        let server = Self::spawn_with(sid, name, Some((link_password, link_port, vec![]))).await?;
        Ok((server, link_port))
    }

    /// A server that dials out to `peer` at startup (the connecting side of
    /// a link test).
    pub async fn spawn_with_link(sid: &str, name: &str, link_password: &str, peer: PeerLink) -> anyhow::Result<Self> {
        let own_link_port = free_port();
        Self::spawn_with(sid, name, Some((link_password, own_link_port, vec![peer]))).await
    }

    async fn spawn_with(
        sid: &str,
        name: &str,
        federation: Option<(&str, u16, Vec<PeerLink>)>,
    ) -> anyhow::Result<Self> {
        let port = free_port();
        let data_dir = std::env::temp_dir().join(format!("slircd-test-{port}"));
        std::fs::create_dir_all(&data_dir)?;

        let mut config = format!(
            r#"
[server]
name = "{name}"
description = "test server"
sid = "{sid}"

[listen]
host = "127.0.0.1"
port = {port}

[limits]
max_clients = 100
ping_interval = 120
idle_timeout = 120

[[oper]]
name = "testop"
bcrypt_hash = "{oper_hash}"
"#,
            oper_hash = bcrypt::hash(OPER_TEST_PASSWORD, bcrypt::DEFAULT_COST)?,
        );

        let link_port = federation.as_ref().map(|(_, port, _)| *port);

        if let Some((link_password, link_port, links)) = federation {
            config.push_str(&format!(
                "\n[federation]\nlink_password = \"{link_password}\"\nlink_port = {link_port}\n"
            ));
            for peer in links {
                config.push_str(&format!(
                    r#"
[[federation.links]]
name = "{}"
sid = "{}"
host = "{}"
port = {}
password = "{}"
auto_connect = {}
"#,
                    peer.name, peer.sid, peer.host, peer.port, peer.password, peer.auto_connect,
                ));
            }
        }

        let config_path = data_dir.join("config.toml");
        std::fs::write(&config_path, config)?;

        let cargo_manifest_dir = env!("CARGO_MANIFEST_DIR");
        let binary_path = PathBuf::from(cargo_manifest_dir).join("target/debug/slircd");

        let child = Command::new(&binary_path).arg(&config_path).spawn()?;

        let server = Self {
            child,
            port,
            link_port,
            data_dir,
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port)).await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("server did not start listening within 5 seconds")
    }

    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub fn link_port(&self) -> Option<u16> {
        self.link_port
    }

    pub async fn connect(&self, nick: &str) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.address(), nick).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

/// Plaintext OPER password every spawned test server accepts for "testop".
pub const OPER_TEST_PASSWORD: &str = "testpass";
