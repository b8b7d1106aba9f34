//! Channel state and membership engine (§3 "Channel", §4.C).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use super::registry::SessionHandle;
use crate::error::ChannelError;
use crate::proto::Message;

/// Modes granted to every channel at creation: no external messages, topic
/// locked to operators (§3 default modes).
const DEFAULT_MODES: [char; 2] = ['n', 't'];

/// Channel modes that take no argument. Anything not in this set and not in
/// `b`/`k`/`o`/`v` is unknown (§4.D MODE).
const VALUELESS_MODES: [char; 4] = ['i', 'm', 'n', 't'];

pub struct Channel {
    pub name: String,
    /// Doubles as the channel's TS6 timestamp (§4.F channel TS); the value
    /// this channel was first created at is exactly the value a winning
    /// burst-time SJOIN compares against.
    pub created_at: i64,
    topic: Option<(String, String)>,
    key: Option<String>,
    members: Vec<(String, SessionHandle)>,
    operators: HashSet<String>,
    voiced: HashSet<String>,
    modes: HashSet<char>,
    bans: Vec<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            name: name.into(),
            created_at,
            topic: None,
            key: None,
            members: Vec::new(),
            operators: HashSet::new(),
            voiced: HashSet::new(),
            modes: HashSet::from(DEFAULT_MODES),
            bans: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, nick: &str) -> bool {
        self.members.iter().any(|(n, _)| n == nick)
    }

    /// Inserts; grants operator if this is the first member (§4.C,
    /// §3 invariant "first member on an empty channel is automatically made
    /// operator"). Idempotent: re-adding an existing member does nothing.
    pub fn add_member(&mut self, nick: &str, session: SessionHandle) {
        if self.is_member(nick) {
            return;
        }
        let was_empty = self.members.is_empty();
        self.members.push((nick.to_string(), session));
        if was_empty {
            self.operators.insert(nick.to_string());
        }
    }

    /// Silent if `nick` is absent (§4.C).
    pub fn remove_member(&mut self, nick: &str) {
        self.members.retain(|(n, _)| n != nick);
        self.operators.remove(nick);
        self.voiced.remove(nick);
    }

    pub fn rename_member(&mut self, old_nick: &str, new_nick: &str) {
        for (n, _) in self.members.iter_mut() {
            if n == old_nick {
                *n = new_nick.to_string();
            }
        }
        if self.operators.remove(old_nick) {
            self.operators.insert(new_nick.to_string());
        }
        if self.voiced.remove(old_nick) {
            self.voiced.insert(new_nick.to_string());
        }
    }

    pub fn is_operator(&self, nick: &str) -> bool {
        self.operators.contains(nick)
    }

    pub fn is_voiced(&self, nick: &str) -> bool {
        self.voiced.contains(nick)
    }

    pub fn set_operator(&mut self, nick: &str, on: bool) {
        if on {
            self.operators.insert(nick.to_string());
        } else {
            self.operators.remove(nick);
        }
    }

    pub fn set_voice(&mut self, nick: &str, on: bool) {
        if on {
            self.voiced.insert(nick.to_string());
        } else {
            self.voiced.remove(nick);
        }
    }

    pub fn topic(&self) -> Option<&(String, String)> {
        self.topic.as_ref()
    }

    /// Last-writer-wins (§4.C).
    pub fn set_topic(&mut self, text: impl Into<String>, setter: impl Into<String>) {
        self.topic = Some((text.into(), setter.into()));
    }

    pub fn has_mode(&self, letter: char) -> bool {
        self.modes.contains(&letter)
    }

    /// Set or clear a valueless channel mode letter. `b`/`k`/`o`/`v` are
    /// handled by their own dedicated methods since they carry arguments;
    /// routing them here returns [`ChannelError::UnknownMode`] so callers
    /// can't silently bypass that dedicated handling.
    pub fn set_mode(&mut self, letter: char, on: bool) -> Result<(), ChannelError> {
        if !VALUELESS_MODES.contains(&letter) {
            return Err(ChannelError::UnknownMode(letter, self.name.clone()));
        }
        if on {
            self.modes.insert(letter);
        } else {
            self.modes.remove(&letter);
        }
        Ok(())
    }

    pub fn modes_string(&self) -> String {
        let mut letters: Vec<char> = self.modes.iter().copied().collect();
        letters.sort_unstable();
        let mut s = String::from("+");
        s.extend(letters);
        if self.key.is_some() {
            s.push('k');
        }
        s
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn set_key(&mut self, key: Option<String>) {
        self.key = key;
    }

    /// True if `+k` is unset, or `provided` matches the set key (§4.C).
    pub fn check_key(&self, provided: Option<&str>) -> bool {
        match &self.key {
            None => true,
            Some(k) => provided == Some(k.as_str()),
        }
    }

    /// Insertion-ordered, no duplicates (§4.C).
    pub fn add_ban(&mut self, mask: impl Into<String>) {
        let mask = mask.into();
        if !self.bans.contains(&mask) {
            self.bans.push(mask);
        }
    }

    /// Returns whether `mask` was present (§4.C).
    pub fn remove_ban(&mut self, mask: &str) -> bool {
        let before = self.bans.len();
        self.bans.retain(|b| b != mask);
        self.bans.len() != before
    }

    pub fn ban_list(&self) -> &[String] {
        &self.bans
    }

    /// Exact-string match only; wildcard ban masks are explicitly out of
    /// scope (§1 Non-goals).
    pub fn is_banned(&self, hostmask: &str) -> bool {
        self.bans.iter().any(|b| b == hostmask)
    }

    /// True unless `+m` is set and `nick` is neither operator nor voiced
    /// (§4.C).
    pub fn can_speak(&self, nick: &str) -> bool {
        if !self.modes.contains(&'m') {
            return true;
        }
        self.is_operator(nick) || self.is_voiced(nick)
    }

    /// Decorated nicknames: `@` for operators, `+` for voiced, bare
    /// otherwise (§4.C).
    pub fn member_nicks(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|(nick, _)| {
                if self.is_operator(nick) {
                    format!("@{nick}")
                } else if self.is_voiced(nick) {
                    format!("+{nick}")
                } else {
                    nick.clone()
                }
            })
            .collect()
    }

    /// Send to every member except `sender` (§4.C).
    pub fn broadcast(&self, line: &Message, sender: &str) {
        for (nick, session) in &self.members {
            if nick == sender {
                continue;
            }
            session.read().send(line.clone());
        }
    }

    /// Send to all members (§4.C).
    pub fn broadcast_all(&self, line: &Message) {
        for (_, session) in &self.members {
            session.read().send(line.clone());
        }
    }

    pub fn member_sessions(&self) -> impl Iterator<Item = &SessionHandle> {
        self.members.iter().map(|(_, s)| s)
    }

    pub fn member_nick_list(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(n, _)| n.as_str())
    }
}

pub type ChannelHandle = Arc<RwLock<Channel>>;
