//! Shared scaffolding for the integration suite: spin up a real `slircd`
//! binary on an ephemeral port and drive it with a small line-oriented
//! client, mirroring the way the teacher's own `tests/common` spawns
//! subprocesses rather than wiring the daemon in-process.

pub mod client;
pub mod server;

pub use client::TestClient;
pub use server::TestServer;
