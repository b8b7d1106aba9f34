//! Nickname→session and name→channel registries (§4.E).
//!
//! Both registries enforce uniqueness on insert and tolerate removing a key
//! that isn't present. They are backed by [`dashmap::DashMap`] the way the
//! rest of this daemon's shared maps are (see `sync::network` for the same
//! pattern applied to federation state), giving per-bucket locking instead
//! of one lock guarding the whole registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::channel::{Channel, ChannelHandle};
use super::session::Session;

pub type SessionHandle = Arc<RwLock<Session>>;

/// Nickname → session (§4.E).
#[derive(Default)]
pub struct ClientRegistry {
    by_nick: DashMap<String, SessionHandle>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            by_nick: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_session_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn contains_nick(&self, nick: &str) -> bool {
        self.by_nick.contains_key(nick)
    }

    /// Fails (returns `false`) if `nick` is already taken; uniqueness is
    /// enforced here, not inside [`Session`] (§4.B contract note).
    pub fn insert(&self, nick: &str, session: SessionHandle) -> bool {
        match self.by_nick.entry(nick.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(session);
                true
            }
        }
    }

    pub fn remove(&self, nick: &str) {
        self.by_nick.remove(nick);
    }

    /// Atomic rename: removes the old key and inserts under the new one,
    /// provided the new one is free. Returns `false` (no-op) on collision.
    pub fn rename(&self, old_nick: &str, new_nick: &str) -> bool {
        if self.by_nick.contains_key(new_nick) {
            return false;
        }
        if let Some((_, session)) = self.by_nick.remove(old_nick) {
            self.by_nick.insert(new_nick.to_string(), session);
            true
        } else {
            false
        }
    }

    pub fn get(&self, nick: &str) -> Option<SessionHandle> {
        self.by_nick.get(nick).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.by_nick.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_nick.is_empty()
    }

    pub fn all(&self) -> Vec<SessionHandle> {
        self.by_nick.iter().map(|e| e.value().clone()).collect()
    }
}

/// Channel name → channel (§4.E). `create_channel` is the one get-or-create
/// operation that must be atomic with respect to concurrent callers, so two
/// simultaneous JOINs to a brand-new channel never construct two `Channel`s.
#[derive(Default)]
pub struct ChannelRegistry {
    by_name: DashMap<String, ChannelHandle>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<ChannelHandle> {
        self.by_name.get(name).map(|e| e.clone())
    }

    pub fn create_channel(&self, name: &str) -> ChannelHandle {
        self.by_name
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Channel::new(name))))
            .clone()
    }

    /// Caller is responsible for checking emptiness before calling this
    /// (§3 invariant "channel with zero members must have been removed");
    /// this just performs the removal.
    pub fn remove(&self, name: &str) {
        self.by_name.remove(name);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.by_name.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::Session;

    fn handle(nick: &str) -> SessionHandle {
        let (mut s, _rx) = Session::new(1, "127.0.0.1".parse().unwrap());
        s.set_nickname(nick);
        Arc::new(RwLock::new(s))
    }

    #[test]
    fn insert_rejects_duplicate_nick() {
        let reg = ClientRegistry::new();
        assert!(reg.insert("alice", handle("alice")));
        assert!(!reg.insert("alice", handle("alice")));
    }

    #[test]
    fn remove_absent_nick_is_silent() {
        let reg = ClientRegistry::new();
        reg.remove("nobody");
    }

    #[test]
    fn create_channel_is_get_or_create() {
        let reg = ChannelRegistry::new();
        let a = reg.create_channel("#room");
        let b = reg.create_channel("#room");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn rename_moves_nick_and_rejects_collision() {
        let reg = ClientRegistry::new();
        reg.insert("alice", handle("alice"));
        reg.insert("bob", handle("bob"));
        assert!(!reg.rename("alice", "bob"));
        assert!(reg.rename("alice", "alice2"));
        assert!(!reg.contains_nick("alice"));
        assert!(reg.contains_nick("alice2"));
    }
}
