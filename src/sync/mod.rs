//! TS6-style server federation: identifiers, handshake, burst sync, the
//! network mirror, and inter-server routing (§4.F–§4.I).

pub mod bootstrap;
pub mod burst;
pub mod handshake;
pub mod link;
pub mod network;
pub mod proto;
pub mod remote;
pub mod router;

pub use handshake::{HandshakeError, HandshakeMachine, HandshakeState, Role};
pub use link::{LinkHandle, LinkRegistry, LinkSession};
pub use network::{Network, NickCollision, RemoteChannel, RemoteUser, Server};
pub use router::Router;
