//! Burst synchronization: the full state exchange that happens immediately
//! after a successful handshake (§4.F "Burst").

use std::collections::HashMap;

use crate::proto::{command, Message};
use crate::state::{ChannelRegistry, ClientRegistry};

use super::network::{Network, RemoteUser};

/// Build every `UID` and `SJOIN` record for this server's local state, to
/// be sent in order, followed by the end-of-burst `PING` (§4.F "Transmitted
/// records").
pub fn build_burst(
    local_sid: &str,
    local_name: &str,
    clients: &ClientRegistry,
    channels: &ChannelRegistry,
) -> Vec<Message> {
    let mut out = Vec::new();

    for session in clients.all() {
        let s = session.read();
        if !s.is_registered() {
            continue;
        }
        let uid = s.uid.clone().unwrap_or_default();
        let modes: String = s.user_modes().iter().collect();
        out.push(command::uid(
            local_sid,
            s.nickname(),
            1,
            s.registered_at(),
            &format!("+{modes}"),
            s.username(),
            &s.hostname.to_string(),
            &s.hostname.to_string(),
            &uid,
            s.realname(),
        ));
    }

    for name in channels.names() {
        let Some(chan) = channels.get(&name) else {
            continue;
        };
        let chan = chan.read();
        let members: Vec<String> = chan
            .member_nick_list()
            .map(|nick| {
                let uid = clients
                    .get(nick)
                    .and_then(|s| s.read().uid.clone())
                    .unwrap_or_default();
                if chan.is_operator(nick) {
                    format!("@{uid}")
                } else if chan.is_voiced(nick) {
                    format!("+{uid}")
                } else {
                    uid
                }
            })
            .collect();
        out.push(command::sjoin(
            local_sid,
            chan.created_at,
            &name,
            &chan.modes_string().trim_start_matches('+').replace('k', ""),
            &members.join(" "),
        ));
    }

    out.push(command::ping(local_name));
    out
}

/// Apply one inbound burst record to the network mirror (§4.F "applying UID
/// and SJOIN as they arrive"). Returns `true` once `msg` is the peer's
/// end-of-burst `PING`, signalling the caller to respond with `PONG` and
/// leave burst mode.
pub fn apply_burst_message(network: &Network, msg: &Message) -> bool {
    match msg.command.as_str() {
        "UID" => {
            if let Some(home_sid) = msg.source.as_deref() {
                if let (Some(nick), Some(_hop), Some(ts), Some(modes), Some(user), Some(host), Some(ip), Some(uid), Some(real)) = (
                    msg.param(0),
                    msg.param(1),
                    msg.param(2),
                    msg.param(3),
                    msg.param(4),
                    msg.param(5),
                    msg.param(6),
                    msg.param(7),
                    msg.param(8),
                ) {
                    let _ = network.add_user(RemoteUser {
                        uid: uid.to_string(),
                        nick: nick.to_string(),
                        user: user.to_string(),
                        host: host.to_string(),
                        ip: ip.to_string(),
                        realname: real.to_string(),
                        home_sid: home_sid.to_string(),
                        modes: modes.to_string(),
                        away: None,
                        channels: Vec::new(),
                        nick_ts: ts.parse().unwrap_or(0),
                    });
                }
            }
            false
        }
        "SJOIN" => {
            if let (Some(ts), Some(chan_name), Some(modes), Some(members_str)) =
                (msg.param(0), msg.param(1), msg.param(2), msg.param(3))
            {
                let ts: i64 = ts.parse().unwrap_or(0);
                let members: HashMap<String, String> = members_str
                    .split_whitespace()
                    .map(|token| {
                        if let Some(uid) = token.strip_prefix('@') {
                            (uid.to_string(), "@".to_string())
                        } else if let Some(uid) = token.strip_prefix('+') {
                            (uid.to_string(), "+".to_string())
                        } else {
                            (token.to_string(), String::new())
                        }
                    })
                    .collect();
                network.merge_channel(chan_name, ts, modes, members);
            }
            false
        }
        "PING" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_burst_ends_with_ping() {
        let clients = ClientRegistry::new();
        let channels = ChannelRegistry::new();
        let msgs = build_burst("1AA", "my.example.com", &clients, &channels);
        assert_eq!(msgs.last().unwrap().command, "PING");
    }

    #[test]
    fn apply_burst_recognizes_end_marker() {
        let network = Network::new("1AA", "my.example.com");
        assert!(!apply_burst_message(&network, &command::uid(
            "2BB", "alice", 1, 1, "+i", "a", "h", "1.2.3.4", "2BB000001", "Alice",
        )));
        assert!(apply_burst_message(&network, &command::ping("peer.example.com")));
        assert!(network.user("2BB000001").is_some());
    }
}
