//! Federation mirror state: remote servers, remote users, remote channels,
//! and the TS-based collision rules that keep them consistent across the
//! mesh (§3 "Network (federation)", §4.F collision rules, §4.G).
//!
//! Per §5, all of `Network`'s maps are guarded by a single lock rather than
//! one lock per map — operations that touch more than one map (user
//! removal touching users + nick→UID + channel members, server removal
//! cascading to downlinks and their users) need one critical section to
//! preserve the cross-map invariants. This is a deliberate divergence from
//! a more DashMap-per-field layout: the spec's invariants are explicitly
//! cross-map, so a single `Mutex<NetworkInner>` is the simpler and more
//! obviously correct choice here.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::proto::UidGenerator;

#[derive(Debug, Clone)]
pub struct Server {
    pub sid: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub uplink_sid: Option<String>,
    pub hops: u32,
    pub is_hub: bool,
}

#[derive(Debug, Clone)]
pub struct RemoteUser {
    pub uid: String,
    pub nick: String,
    pub user: String,
    pub host: String,
    pub ip: String,
    pub realname: String,
    pub home_sid: String,
    pub modes: String,
    pub away: Option<String>,
    pub channels: Vec<String>,
    pub nick_ts: i64,
}

#[derive(Debug, Clone)]
pub struct RemoteChannel {
    pub name: String,
    pub ts: i64,
    pub modes: String,
    pub key: Option<String>,
    pub limit: Option<u32>,
    pub topic: Option<(String, String, i64)>,
    /// UID → prefix (`"@"`, `"+"`, or `""`).
    pub members: HashMap<String, String>,
    pub bans: Vec<String>,
}

impl RemoteChannel {
    fn new(name: &str, ts: i64) -> Self {
        Self {
            name: name.to_string(),
            ts,
            modes: String::new(),
            key: None,
            limit: None,
            topic: None,
            members: HashMap::new(),
            bans: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NickCollision {
    /// Incoming user loses; inbound UID is rejected.
    IncomingRejected,
    /// Incoming user wins; the existing local nick mapping is dropped.
    ExistingDropped,
}

struct NetworkInner {
    servers: HashMap<String, Server>,
    users: HashMap<String, RemoteUser>,
    channels: HashMap<String, RemoteChannel>,
    nick_to_uid: HashMap<String, String>,
}

pub struct Network {
    local_sid: String,
    local_name: String,
    inner: Mutex<NetworkInner>,
    uid_gen: UidGenerator,
}

impl Network {
    pub fn new(local_sid: impl Into<String>, local_name: impl Into<String>) -> Self {
        let local_sid = local_sid.into();
        let uid_gen = UidGenerator::new(local_sid.clone());
        Self {
            local_sid,
            local_name: local_name.into(),
            inner: Mutex::new(NetworkInner {
                servers: HashMap::new(),
                users: HashMap::new(),
                channels: HashMap::new(),
                nick_to_uid: HashMap::new(),
            }),
            uid_gen,
        }
    }

    pub fn local_sid(&self) -> &str {
        &self.local_sid
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Monotonic; never repeats a UID generated earlier in the process
    /// lifetime (§4.G).
    pub fn generate_uid(&self) -> String {
        self.uid_gen.generate()
    }

    /// Fails if the SID is already known (§4.G `add_server`).
    pub fn add_server(&self, server: Server) -> Result<(), ()> {
        let mut inner = self.inner.lock();
        if inner.servers.contains_key(&server.sid) {
            return Err(());
        }
        inner.servers.insert(server.sid.clone(), server);
        Ok(())
    }

    pub fn server(&self, sid: &str) -> Option<Server> {
        self.inner.lock().servers.get(sid).cloned()
    }

    /// Recursively removes downlinks, then every user whose home SID is the
    /// target (or one of its now-removed downlinks), then drops those users
    /// from channel member sets and deletes channels left empty (§4.G).
    /// Returns the full records of the users that were removed (not just
    /// their UIDs) so the caller can still read their hostmask and last-known
    /// channel memberships when broadcasting QUITs, after they're already
    /// gone from the map.
    pub fn remove_server(&self, sid: &str) -> Vec<RemoteUser> {
        let mut inner = self.inner.lock();
        let mut to_remove_sids = vec![sid.to_string()];
        let mut i = 0;
        while i < to_remove_sids.len() {
            let current = to_remove_sids[i].clone();
            let downlinks: Vec<String> = inner
                .servers
                .values()
                .filter(|s| s.uplink_sid.as_deref() == Some(current.as_str()))
                .map(|s| s.sid.clone())
                .collect();
            to_remove_sids.extend(downlinks);
            i += 1;
        }
        for s in &to_remove_sids {
            inner.servers.remove(s);
        }

        let removed_uids: Vec<String> = inner
            .users
            .values()
            .filter(|u| to_remove_sids.contains(&u.home_sid))
            .map(|u| u.uid.clone())
            .collect();

        let mut removed_users = Vec::with_capacity(removed_uids.len());
        for uid in &removed_uids {
            if let Some(user) = inner.users.remove(uid) {
                inner.nick_to_uid.remove(&user.nick);
                for chan_name in &user.channels {
                    if let Some(chan) = inner.channels.get_mut(chan_name) {
                        chan.members.remove(uid);
                    }
                }
                removed_users.push(user);
            }
        }
        inner.channels.retain(|_, c| !c.members.is_empty());
        removed_users
    }

    /// Collision semantics from §4.F: lower nick-timestamp wins. Returns
    /// `Ok(())` on success, or the collision outcome when the inbound user
    /// cannot be accepted as-is.
    pub fn add_user(&self, user: RemoteUser) -> Result<(), NickCollision> {
        let mut inner = self.inner.lock();
        if let Some(existing_uid) = inner.nick_to_uid.get(&user.nick).cloned() {
            let existing_ts = inner.users.get(&existing_uid).map(|u| u.nick_ts);
            if let Some(existing_ts) = existing_ts {
                if user.nick_ts >= existing_ts {
                    return Err(NickCollision::IncomingRejected);
                }
                inner.nick_to_uid.remove(&user.nick);
            }
        }
        inner.nick_to_uid.insert(user.nick.clone(), user.uid.clone());
        inner.users.insert(user.uid.clone(), user);
        Ok(())
    }

    pub fn user(&self, uid: &str) -> Option<RemoteUser> {
        self.inner.lock().users.get(uid).cloned()
    }

    pub fn user_by_nick(&self, nick: &str) -> Option<RemoteUser> {
        let inner = self.inner.lock();
        inner.nick_to_uid.get(nick).and_then(|uid| inner.users.get(uid)).cloned()
    }

    pub fn remove_user(&self, uid: &str) -> Option<RemoteUser> {
        let mut inner = self.inner.lock();
        let user = inner.users.remove(uid)?;
        inner.nick_to_uid.remove(&user.nick);
        for chan_name in &user.channels {
            if let Some(chan) = inner.channels.get_mut(chan_name) {
                chan.members.remove(uid);
            }
        }
        inner.channels.retain(|_, c| !c.members.is_empty());
        Some(user)
    }

    /// Atomic relocation of the nick→UID mapping, with the same collision
    /// semantics as `add_user` (§4.G `update_nick`).
    pub fn update_nick(&self, uid: &str, new_nick: &str, new_ts: i64) -> Result<(), NickCollision> {
        let mut inner = self.inner.lock();
        if let Some(existing_uid) = inner.nick_to_uid.get(new_nick).cloned() {
            if existing_uid != uid {
                let existing_ts = inner.users.get(&existing_uid).map(|u| u.nick_ts);
                if let Some(existing_ts) = existing_ts {
                    if new_ts >= existing_ts {
                        return Err(NickCollision::IncomingRejected);
                    }
                    inner.nick_to_uid.remove(new_nick);
                }
            }
        }
        let old_nick = inner.users.get(uid).map(|u| u.nick.clone());
        if let Some(old_nick) = old_nick {
            inner.nick_to_uid.remove(&old_nick);
        }
        inner.nick_to_uid.insert(new_nick.to_string(), uid.to_string());
        if let Some(user) = inner.users.get_mut(uid) {
            user.nick = new_nick.to_string();
            user.nick_ts = new_ts;
        }
        Ok(())
    }

    /// Merge per the TS rules in §4.F: lower TS wins outright (and clears
    /// prefixes), equal TS unions members, higher TS is ignored entirely.
    pub fn merge_channel(
        &self,
        name: &str,
        ts: i64,
        modes: &str,
        members: HashMap<String, String>,
    ) {
        let mut inner = self.inner.lock();
        match inner.channels.get_mut(name) {
            None => {
                let mut chan = RemoteChannel::new(name, ts);
                chan.modes = modes.to_string();
                chan.members = members;
                inner.channels.insert(name.to_string(), chan);
            }
            Some(existing) => {
                if ts < existing.ts {
                    existing.ts = ts;
                    existing.modes = modes.to_string();
                    existing.key = None;
                    existing.limit = None;
                    existing.members = members.into_iter().map(|(uid, _)| (uid, String::new())).collect();
                } else if ts == existing.ts {
                    for (uid, prefix) in members {
                        existing.members.insert(uid, prefix);
                    }
                }
                // ts > existing.ts: incoming state is stale, ignored entirely.
            }
        }
    }

    pub fn channel(&self, name: &str) -> Option<RemoteChannel> {
        self.inner.lock().channels.get(name).cloned()
    }

    /// Incremental membership add for an ongoing (post-burst) `JOIN`,
    /// mirroring both sides of the `RemoteUser.channels` /
    /// `RemoteChannel.members` invariant (§3 "a RemoteUser's channel
    /// memberships are mirrored in the named RemoteChannels"). If the
    /// channel isn't known yet (burst hasn't covered it), it's created with
    /// the current time as its TS — a later SJOIN for the same name still
    /// resolves correctly under the usual TS merge rules.
    pub fn remote_join(&self, uid: &str, channel: &str, now: i64) {
        let mut inner = self.inner.lock();
        inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| RemoteChannel::new(channel, now))
            .members
            .entry(uid.to_string())
            .or_insert_with(String::new);
        if let Some(user) = inner.users.get_mut(uid) {
            if !user.channels.iter().any(|c| c == channel) {
                user.channels.push(channel.to_string());
            }
        }
    }

    /// Incremental membership removal for an ongoing `PART`/`KICK`; deletes
    /// the channel once its member set is empty (§3 invariant).
    pub fn remote_part(&self, uid: &str, channel: &str) {
        let mut inner = self.inner.lock();
        if let Some(chan) = inner.channels.get_mut(channel) {
            chan.members.remove(uid);
        }
        inner.channels.retain(|_, c| !c.members.is_empty());
        if let Some(user) = inner.users.get_mut(uid) {
            user.channels.retain(|c| c != channel);
        }
    }

    pub fn remote_set_topic(&self, channel: &str, topic: &str, setter: &str, ts: i64) {
        let mut inner = self.inner.lock();
        if let Some(chan) = inner.channels.get_mut(channel) {
            chan.topic = Some((topic.to_string(), setter.to_string(), ts));
        }
    }

    pub fn remote_set_mode(&self, channel: &str, modes: &str) {
        let mut inner = self.inner.lock();
        if let Some(chan) = inner.channels.get_mut(channel) {
            chan.modes = modes.to_string();
        }
    }

    /// The channels a remote user currently belongs to, per the mirrored
    /// `RemoteUser.channels` side of the invariant (§3). Used to restrict a
    /// remote QUIT's local broadcast to channels the user actually shared
    /// with local members, rather than every local channel (§9 "Open bugs
    /// in reference behaviour" #1).
    pub fn user_channels(&self, uid: &str) -> Vec<String> {
        self.inner.lock().users.get(uid).map(|u| u.channels.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(uid: &str, nick: &str, ts: i64) -> RemoteUser {
        RemoteUser {
            uid: uid.to_string(),
            nick: nick.to_string(),
            user: "u".to_string(),
            host: "h".to_string(),
            ip: "1.2.3.4".to_string(),
            realname: "Real Name".to_string(),
            home_sid: uid[..3].to_string(),
            modes: String::new(),
            away: None,
            channels: vec![],
            nick_ts: ts,
        }
    }

    #[test]
    fn add_server_rejects_sid_collision() {
        let net = Network::new("1AA", "my.example.com");
        let s = Server {
            sid: "2BB".into(),
            name: "leaf".into(),
            description: "d".into(),
            capabilities: vec![],
            uplink_sid: None,
            hops: 1,
            is_hub: false,
        };
        assert!(net.add_server(s.clone()).is_ok());
        assert!(net.add_server(s).is_err());
    }

    #[test]
    fn lower_ts_nick_wins_collision() {
        let net = Network::new("1AA", "my.example.com");
        net.add_user(user("2BB000001", "alice", 100)).unwrap();
        let err = net.add_user(user("2BB000002", "alice", 200)).unwrap_err();
        assert_eq!(err, NickCollision::IncomingRejected);
        assert_eq!(net.user_by_nick("alice").unwrap().uid, "2BB000001");

        net.add_user(user("2BB000003", "bob", 500)).unwrap();
        net.add_user(user("2BB000004", "bob", 10)).unwrap();
        assert_eq!(net.user_by_nick("bob").unwrap().uid, "2BB000004");
    }

    #[test]
    fn remove_server_cascades_to_downlinks_and_users() {
        let net = Network::new("1AA", "my.example.com");
        net.add_server(Server {
            sid: "2BB".into(),
            name: "hub".into(),
            description: "d".into(),
            capabilities: vec![],
            uplink_sid: None,
            hops: 1,
            is_hub: true,
        })
        .unwrap();
        net.add_server(Server {
            sid: "3CC".into(),
            name: "leaf".into(),
            description: "d".into(),
            capabilities: vec![],
            uplink_sid: Some("2BB".into()),
            hops: 2,
            is_hub: false,
        })
        .unwrap();
        let mut u = user("3CC000001", "carol", 1);
        u.channels = vec!["#room".to_string()];
        net.add_user(u).unwrap();
        net.merge_channel(
            "#room",
            1,
            "nt",
            HashMap::from([("3CC000001".to_string(), String::new())]),
        );

        let removed = net.remove_server("2BB");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].uid, "3CC000001");
        assert!(net.server("2BB").is_none());
        assert!(net.server("3CC").is_none());
        assert!(net.user("3CC000001").is_none());
        assert!(net.channel("#room").is_none());
    }

    #[test]
    fn channel_merge_lower_ts_wins_and_clears_prefixes() {
        let net = Network::new("1AA", "my.example.com");
        net.merge_channel(
            "#room",
            100,
            "nt",
            HashMap::from([("2BB000001".to_string(), "@".to_string())]),
        );
        net.merge_channel(
            "#room",
            50,
            "ntm",
            HashMap::from([("3CC000001".to_string(), "@".to_string())]),
        );
        let chan = net.channel("#room").unwrap();
        assert_eq!(chan.ts, 50);
        assert_eq!(chan.modes, "ntm");
        assert_eq!(chan.members.get("3CC000001"), Some(&String::new()));
    }

    #[test]
    fn channel_merge_equal_ts_unions_members() {
        let net = Network::new("1AA", "my.example.com");
        net.merge_channel(
            "#room",
            100,
            "nt",
            HashMap::from([("2BB000001".to_string(), "@".to_string())]),
        );
        net.merge_channel(
            "#room",
            100,
            "nt",
            HashMap::from([("3CC000001".to_string(), "+".to_string())]),
        );
        let chan = net.channel("#room").unwrap();
        assert_eq!(chan.members.len(), 2);
    }

    #[test]
    fn channel_merge_higher_ts_ignored() {
        let net = Network::new("1AA", "my.example.com");
        net.merge_channel(
            "#room",
            50,
            "nt",
            HashMap::from([("2BB000001".to_string(), "@".to_string())]),
        );
        net.merge_channel(
            "#room",
            100,
            "ntm",
            HashMap::from([("3CC000001".to_string(), "@".to_string())]),
        );
        let chan = net.channel("#room").unwrap();
        assert_eq!(chan.ts, 50);
        assert_eq!(chan.modes, "nt");
        assert!(!chan.members.contains_key("3CC000001"));
    }
}
