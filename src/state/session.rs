//! Client session state (§3, §4.B).
//!
//! A `Session` is the daemon's view of one connected client: its registration
//! progress, its mutable identity (nick/user/realname), the channels it has
//! joined, and the bounded outbound queue the writer task drains. Every
//! accessor that mutates shared fields takes `&mut self` behind the caller's
//! lock (see [`crate::state::registry`] for how sessions are shared across
//! tasks); this struct itself holds no lock, it is always reached through an
//! `Arc<parking_lot::RwLock<Session>>` held by the registry.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Notify};

use crate::proto::Message;

/// Registration progress, tracked explicitly so the dispatcher can gate
/// non-registration commands (§4.D "Registration gate") without re-deriving
/// it from nick/user presence on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    New,
    NickSet,
    UserSet,
    Registered,
}

/// Capacity of a session's outbound queue (§4.B).
pub const OUTBOUND_QUEUE_CAPACITY: usize = 100;

/// One connected client (§3 "Client session").
pub struct Session {
    pub id: u64,
    nickname: String,
    username: String,
    realname: String,
    pub hostname: IpAddr,
    /// Federation identifier, assigned at registration when federation is
    /// active (§3). `None` for a server running without any configured
    /// links.
    pub uid: Option<String>,
    state: RegistrationState,
    channels: HashSet<String>,
    user_modes: HashSet<char>,
    away_message: Option<String>,
    pub last_activity: Instant,
    pub last_ping: Instant,
    pub connected_at: Instant,
    /// Unix timestamp at which this session completed registration, used as
    /// the nick-timestamp in burst `UID` records (§4.F). `None` until
    /// registered.
    registered_at: Option<i64>,
    disconnected: bool,
    outbound: mpsc::Sender<Message>,
    pub oper_attempts: u8,
    welcomed: bool,
    /// Wakes the read loop when another task disconnects this session out
    /// from under it (the ping-timeout sweep, a remote SQUIT cascade) so
    /// the blocked socket read doesn't linger for its full deadline
    /// (§4.B, §4.J "Timeout loop").
    shutdown: Arc<Notify>,
}

impl Session {
    /// Construct a new, unregistered session plus the receiving half of its
    /// outbound queue (handed to the writer task by the caller).
    pub fn new(id: u64, hostname: IpAddr) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let now = Instant::now();
        let session = Self {
            id,
            nickname: String::new(),
            username: String::new(),
            realname: String::new(),
            hostname,
            uid: None,
            state: RegistrationState::New,
            channels: HashSet::new(),
            user_modes: HashSet::new(),
            away_message: None,
            last_activity: now,
            last_ping: now,
            connected_at: now,
            registered_at: None,
            disconnected: false,
            outbound: tx,
            oper_attempts: 0,
            welcomed: false,
            shutdown: Arc::new(Notify::new()),
        };
        (session, rx)
    }

    /// Handle the read loop awaits alongside its socket read so an
    /// externally-triggered [`Session::disconnect`] can interrupt a blocked
    /// read rather than waiting out the full per-line deadline.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// `true` the first time this is called after the session reaches
    /// `Registered`; callers use this to gate the one-time welcome numerics
    /// and registry insertion (§4.B "Welcome numerics are sent exactly
    /// once at the REGISTERED transition").
    pub fn mark_welcomed_if_newly_registered(&mut self) -> bool {
        if self.state == RegistrationState::Registered && !self.welcomed {
            self.welcomed = true;
            self.registered_at = Some(
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0),
            );
            true
        } else {
            false
        }
    }

    /// Unix timestamp of registration, used as the nick-timestamp in burst
    /// `UID` records (§4.F, §9 "placeholder constants" fix). Falls back to
    /// the current time for a session queried before it finished
    /// registering, which should not happen in practice since only
    /// registered sessions are included in a burst.
    pub fn registered_at(&self) -> i64 {
        self.registered_at.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0)
        })
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn realname(&self) -> &str {
        &self.realname
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn is_registered(&self) -> bool {
        self.state == RegistrationState::Registered
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn is_away(&self) -> bool {
        self.away_message.is_some()
    }

    pub fn away_message(&self) -> Option<&str> {
        self.away_message.as_deref()
    }

    pub fn set_away(&mut self, message: Option<String>) {
        self.away_message = message;
    }

    pub fn is_oper(&self) -> bool {
        self.user_modes.contains(&'o')
    }

    pub fn user_modes(&self) -> &HashSet<char> {
        &self.user_modes
    }

    /// Add or remove a single user mode letter. `o` may only be removed this
    /// way; granting it happens through [`Session::grant_oper`] (§4.D MODE).
    pub fn set_user_mode(&mut self, letter: char, enabled: bool) {
        if enabled {
            self.user_modes.insert(letter);
        } else {
            self.user_modes.remove(&letter);
        }
    }

    pub fn grant_oper(&mut self) {
        self.user_modes.insert('o');
    }

    /// `nick` is only accepted if the caller already confirmed it's free;
    /// registry uniqueness is enforced one level up (§4.B contract for
    /// `set_nickname`).
    pub fn set_nickname(&mut self, nick: impl Into<String>) {
        self.nickname = nick.into();
        if self.state == RegistrationState::New {
            self.state = RegistrationState::NickSet;
        } else if self.state == RegistrationState::UserSet {
            self.state = RegistrationState::Registered;
        }
    }

    /// One-shot: later calls are no-ops once registered (§4.B).
    pub fn set_username(&mut self, user: impl Into<String>, real: impl Into<String>) {
        if self.state == RegistrationState::Registered {
            return;
        }
        self.username = user.into();
        self.realname = real.into();
        if self.state == RegistrationState::New {
            self.state = RegistrationState::UserSet;
        } else if self.state == RegistrationState::NickSet {
            self.state = RegistrationState::Registered;
        }
    }

    pub fn hostmask(&self) -> String {
        format!("{}!{}@{}", self.nickname, self.username, self.hostname)
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }

    pub fn join_channel(&mut self, name: impl Into<String>) {
        self.channels.insert(name.into());
    }

    pub fn part_channel(&mut self, name: &str) {
        self.channels.remove(name);
    }

    pub fn is_on_channel(&self, name: &str) -> bool {
        self.channels.contains(name)
    }

    /// Non-blocking enqueue (§4.B). Silently drops on a full queue or a
    /// disconnected session rather than ever blocking the caller — the
    /// caller may be holding a channel lock during broadcast.
    pub fn send(&self, message: Message) {
        if self.disconnected {
            return;
        }
        if self.outbound.try_send(message).is_err() {
            tracing::warn!(session = self.id, "outbound queue full or closed, dropping message");
        }
    }

    /// Idempotent (§4.B): the flag is checked by every other mutator and by
    /// `send`, so calling this twice is harmless. The queue's receiver side
    /// closing (writer task exit) is what actually tears down the socket.
    pub fn disconnect(&mut self) {
        self.disconnected = true;
        self.shutdown.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session() -> (Session, mpsc::Receiver<Message>) {
        Session::new(1, "127.0.0.1".parse().unwrap())
    }

    #[test]
    fn registration_transitions_on_nick_then_user() {
        let (mut s, _rx) = new_session();
        assert_eq!(s.state(), RegistrationState::New);
        s.set_nickname("alice");
        assert_eq!(s.state(), RegistrationState::NickSet);
        s.set_username("alice", "Alice Liddell");
        assert_eq!(s.state(), RegistrationState::Registered);
        assert!(s.is_registered());
    }

    #[test]
    fn registration_transitions_on_user_then_nick() {
        let (mut s, _rx) = new_session();
        s.set_username("alice", "Alice Liddell");
        assert_eq!(s.state(), RegistrationState::UserSet);
        s.set_nickname("alice");
        assert!(s.is_registered());
    }

    #[test]
    fn user_is_one_shot_after_registration() {
        let (mut s, _rx) = new_session();
        s.set_nickname("alice");
        s.set_username("alice", "Alice Liddell");
        s.set_username("ignored", "Ignored");
        assert_eq!(s.username(), "alice");
    }

    #[test]
    fn disconnected_session_drops_sends() {
        let (mut s, mut rx) = new_session();
        s.disconnect();
        s.send(Message::new("PING", vec!["x".into()]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn hostmask_format() {
        let (mut s, _rx) = new_session();
        s.set_nickname("alice");
        s.set_username("alicia", "Alice");
        assert_eq!(s.hostmask(), "alice!alicia@127.0.0.1");
    }
}
