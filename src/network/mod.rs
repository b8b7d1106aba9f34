//! Acceptors, transports, and per-connection lifecycle (§4.J, §6.1).

pub mod gateway;
pub mod lifecycle;
pub mod transport;

pub use gateway::{Daemon, Gateway};
