//! The four-message TS6 handshake (§4.F), as a small state machine so the
//! link read loop can feed it one message at a time without caring whether
//! it is driving the outbound (dialing) or inbound (accepting) side.
//!
//! Grounded on the upstream daemon's own `HandshakeMachine`: a `state` enum,
//! a `step` method dispatching on that state, and a dedicated error enum
//! for out-of-order or invalid messages.

use thiserror::Error;

use super::proto::validate_sid;
use crate::proto::Message;

pub const TS_VERSION: u32 = 6;
pub const MIN_TS_VERSION: u32 = 6;

pub const DEFAULT_CAPAB: &[&str] = &[
    "QS", "EX", "CHW", "IE", "KLN", "UNKLN", "ENCAP", "SERVICES", "EUID", "EOPMOD", "MLOCK",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Connected,
    PassRecv,
    CapabRecv,
    ServerRecv,
    Registered,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("{0} before {1}")]
    OutOfOrder(&'static str, &'static str),
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("password mismatch")]
    PasswordMismatch,
    #[error("malformed SID {0:?}")]
    MalformedSid(String),
    #[error("SID collision with local server")]
    SidIsLocal,
    #[error("SID already linked")]
    SidAlreadyLinked,
    #[error("unsupported TS version {0}")]
    VersionTooOld(u32),
    #[error("remote sent SID {sent:?}, expected {expected:?}")]
    SidMismatch { sent: String, expected: String },
    #[error("remote sent name {sent:?}, expected {expected:?}")]
    NameMismatch { sent: String, expected: String },
    #[error("remote closed handshake: {0}")]
    RemoteError(String),
    #[error("malformed {0} message")]
    Malformed(&'static str),
}

/// Who initiated the TCP connection; the outbound side additionally
/// validates that the peer it reached is the one it meant to dial (§4.F
/// "the initiating side validates the received SID matches the one it
/// dialed and the name matches").
pub enum Role {
    Outbound { expected_sid: String, expected_name: String },
    Inbound,
}

pub struct HandshakeMachine {
    pub state: HandshakeState,
    role: Role,
    local_sid: String,
    local_name: String,
    local_password: String,
    local_description: String,
    known_sids: Vec<String>,

    remote_password: Option<String>,
    remote_sid: Option<String>,
    pub remote_name: Option<String>,
    pub remote_description: Option<String>,
    pub remote_capab: Option<Vec<String>>,
    pub clock_skew_warning: bool,
}

impl HandshakeMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        role: Role,
        local_sid: impl Into<String>,
        local_name: impl Into<String>,
        local_password: impl Into<String>,
        local_description: impl Into<String>,
        known_sids: Vec<String>,
    ) -> Self {
        Self {
            state: HandshakeState::Connected,
            role,
            local_sid: local_sid.into(),
            local_name: local_name.into(),
            local_password: local_password.into(),
            local_description: local_description.into(),
            known_sids,
            remote_password: None,
            remote_sid: None,
            remote_name: None,
            remote_description: None,
            remote_capab: None,
            clock_skew_warning: false,
        }
    }

    /// The four messages this side sends, in order, built once at the start
    /// of the handshake (§4.F table).
    pub fn opening_messages(&self, unix_time: i64) -> Vec<Message> {
        vec![
            crate::proto::command::pass(&self.local_password, &self.local_sid),
            crate::proto::command::capab(DEFAULT_CAPAB),
            crate::proto::command::server(&self.local_name, 1, &self.local_description),
            crate::proto::command::svinfo(TS_VERSION, MIN_TS_VERSION, unix_time),
        ]
    }

    /// Feed one received message through the state machine (§4.F).
    pub fn step(&mut self, msg: &Message, now_unix: i64) -> Result<(), HandshakeError> {
        if msg.command == "ERROR" {
            return Err(HandshakeError::RemoteError(
                msg.param(0).unwrap_or("").to_string(),
            ));
        }
        match (self.state, msg.command.as_str()) {
            (HandshakeState::Connected, "PASS") => self.on_pass(msg)?,
            (HandshakeState::PassRecv, "CAPAB") => self.on_capab(msg)?,
            (HandshakeState::ServerRecv, "CAPAB") | (HandshakeState::CapabRecv, "CAPAB") => {
                return Err(HandshakeError::Duplicate("CAPAB"))
            }
            (HandshakeState::CapabRecv, "SERVER") => self.on_server(msg)?,
            (HandshakeState::ServerRecv, "SVINFO") => self.on_svinfo(msg, now_unix)?,
            (HandshakeState::Connected, other) => {
                return Err(HandshakeError::OutOfOrder(leak(other), "PASS"))
            }
            (HandshakeState::PassRecv, other) if other != "PASS" => {
                return Err(HandshakeError::OutOfOrder(leak(other), "CAPAB"))
            }
            (HandshakeState::CapabRecv, other) if other != "CAPAB" => {
                return Err(HandshakeError::OutOfOrder(leak(other), "SERVER"))
            }
            (HandshakeState::ServerRecv, other) if other != "SERVER" => {
                return Err(HandshakeError::OutOfOrder(leak(other), "SVINFO"))
            }
            (HandshakeState::Registered, _) => {}
            _ => return Err(HandshakeError::Malformed("handshake")),
        }
        Ok(())
    }

    fn on_pass(&mut self, msg: &Message) -> Result<(), HandshakeError> {
        let password = msg.param(0).ok_or(HandshakeError::Malformed("PASS"))?;
        let version = msg.param(2).ok_or(HandshakeError::Malformed("PASS"))?;
        let sid = msg.param(3).ok_or(HandshakeError::Malformed("PASS"))?;

        if !validate_sid(sid) {
            return Err(HandshakeError::MalformedSid(sid.to_string()));
        }
        if sid == self.local_sid {
            return Err(HandshakeError::SidIsLocal);
        }
        if self.known_sids.iter().any(|s| s == sid) {
            return Err(HandshakeError::SidAlreadyLinked);
        }
        let version: u32 = version.parse().map_err(|_| HandshakeError::Malformed("PASS"))?;
        if version < MIN_TS_VERSION {
            return Err(HandshakeError::VersionTooOld(version));
        }
        if let Role::Outbound { expected_sid, .. } = &self.role {
            if expected_sid != sid {
                return Err(HandshakeError::SidMismatch {
                    sent: sid.to_string(),
                    expected: expected_sid.clone(),
                });
            }
        }
        if password != self.local_password {
            return Err(HandshakeError::PasswordMismatch);
        }

        self.remote_password = Some(password.to_string());
        self.remote_sid = Some(sid.to_string());
        self.state = HandshakeState::PassRecv;
        Ok(())
    }

    fn on_capab(&mut self, msg: &Message) -> Result<(), HandshakeError> {
        let caps = msg.param(0).ok_or(HandshakeError::Malformed("CAPAB"))?;
        self.remote_capab = Some(caps.split_whitespace().map(str::to_string).collect());
        self.state = HandshakeState::CapabRecv;
        Ok(())
    }

    fn on_server(&mut self, msg: &Message) -> Result<(), HandshakeError> {
        let name = msg.param(0).ok_or(HandshakeError::Malformed("SERVER"))?;
        let description = msg.param(2).ok_or(HandshakeError::Malformed("SERVER"))?;

        if let Role::Outbound { expected_name, .. } = &self.role {
            if expected_name != name {
                return Err(HandshakeError::NameMismatch {
                    sent: name.to_string(),
                    expected: expected_name.clone(),
                });
            }
        }

        self.remote_name = Some(name.to_string());
        self.remote_description = Some(description.to_string());
        self.state = HandshakeState::ServerRecv;
        Ok(())
    }

    fn on_svinfo(&mut self, msg: &Message, now_unix: i64) -> Result<(), HandshakeError> {
        let ts_version: u32 = msg
            .param(0)
            .and_then(|s| s.parse().ok())
            .ok_or(HandshakeError::Malformed("SVINFO"))?;
        let remote_unix: i64 = msg
            .param(3)
            .and_then(|s| s.parse().ok())
            .ok_or(HandshakeError::Malformed("SVINFO"))?;

        if ts_version < MIN_TS_VERSION {
            return Err(HandshakeError::VersionTooOld(ts_version));
        }
        self.clock_skew_warning = (now_unix - remote_unix).abs() > 60;
        self.state = HandshakeState::Registered;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.state == HandshakeState::Registered
    }

    pub fn remote_sid(&self) -> Option<&str> {
        self.remote_sid.as_deref()
    }
}

/// `&'static str` leak for an owned command token so [`HandshakeError`] can
/// stay `Copy`-free but cheap; handshake errors are rare and terminal, so
/// the tiny one-time leak per malformed message is immaterial.
fn leak(s: &str) -> &'static str {
    Box::leak(s.to_string().into_boxed_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> HandshakeMachine {
        HandshakeMachine::new(Role::Inbound, "1AA", "hub.example.com", "sekrit", "test hub", vec![])
    }

    #[test]
    fn starts_connected() {
        assert_eq!(inbound().state, HandshakeState::Connected);
    }

    #[test]
    fn full_handshake_completes() {
        let mut hs = inbound();
        hs.step(&crate::proto::command::pass("sekrit", "2BB"), 1_700_000_000).unwrap();
        assert_eq!(hs.state, HandshakeState::PassRecv);
        hs.step(&crate::proto::command::capab(&["QS", "EX"]), 1_700_000_000).unwrap();
        assert_eq!(hs.state, HandshakeState::CapabRecv);
        hs.step(&crate::proto::command::server("leaf.example.com", 1, "a leaf"), 1_700_000_000)
            .unwrap();
        assert_eq!(hs.state, HandshakeState::ServerRecv);
        hs.step(&crate::proto::command::svinfo(6, 6, 1_700_000_000), 1_700_000_000)
            .unwrap();
        assert!(hs.is_complete());
        assert_eq!(hs.remote_sid(), Some("2BB"));
    }

    #[test]
    fn wrong_password_rejected() {
        let mut hs = inbound();
        let err = hs.step(&crate::proto::command::pass("wrong", "2BB"), 0).unwrap_err();
        assert_eq!(err, HandshakeError::PasswordMismatch);
    }

    #[test]
    fn sid_colliding_with_local_rejected() {
        let mut hs = inbound();
        let err = hs.step(&crate::proto::command::pass("sekrit", "1AA"), 0).unwrap_err();
        assert_eq!(err, HandshakeError::SidIsLocal);
    }

    #[test]
    fn out_of_order_capab_before_pass() {
        let mut hs = inbound();
        let err = hs.step(&crate::proto::command::capab(&["QS"]), 0).unwrap_err();
        assert!(matches!(err, HandshakeError::OutOfOrder(_, _)));
    }

    #[test]
    fn clock_skew_flagged_without_failing() {
        let mut hs = inbound();
        hs.step(&crate::proto::command::pass("sekrit", "2BB"), 0).unwrap();
        hs.step(&crate::proto::command::capab(&["QS"]), 0).unwrap();
        hs.step(&crate::proto::command::server("leaf.example.com", 1, "leaf"), 0)
            .unwrap();
        hs.step(&crate::proto::command::svinfo(6, 6, 1_000_000_000), 0).unwrap();
        assert!(hs.is_complete());
        assert!(hs.clock_skew_warning);
    }

    #[test]
    fn remote_error_terminates_handshake() {
        let mut hs = inbound();
        let err = hs
            .step(&crate::proto::command::error("bad mojo"), 0)
            .unwrap_err();
        assert_eq!(err, HandshakeError::RemoteError("bad mojo".to_string()));
    }
}
