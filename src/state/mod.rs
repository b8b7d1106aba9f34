//! In-memory state: client sessions, channels, and the registries that
//! index them (§3, §4.B–§4.E).

pub mod channel;
pub mod registry;
pub mod session;

pub use channel::{Channel, ChannelHandle};
pub use registry::{ChannelRegistry, ClientRegistry, SessionHandle};
pub use session::{RegistrationState, Session};
