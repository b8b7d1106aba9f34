//! Ongoing (post-burst) federation message dispatch (§4.F "Ongoing
//! messages"): translates an inbound S2S line into its local effect on
//! mirrored network state and on local client connections.
//!
//! Grounded on the upstream daemon's per-command `handlers/server/*.rs`
//! modules (one file per remote command, each mapping onto a local-state
//! mutation); consolidated here into one dispatch function since this
//! surface's local-effect table (§4.F) is small enough that a directory of
//! one-handler-per-file would be more ceremony than the content warrants.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::network::gateway::Daemon;
use crate::proto::{command, Message};
use crate::sync::link::LinkSession;

fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// A remote user's wire hostmask, derived from the network mirror. Falls
/// back to the bare UID if the user isn't known (shouldn't happen in
/// practice since burst/UID always precedes any message naming that UID).
fn hostmask_for(daemon: &Daemon, uid: &str) -> String {
    daemon
        .network
        .user(uid)
        .map(|u| format!("{}!{}@{}", u.nick, u.user, u.host))
        .unwrap_or_else(|| uid.to_string())
}

fn nick_for(daemon: &Daemon, uid: &str) -> String {
    daemon.network.user(uid).map(|u| u.nick).unwrap_or_else(|| uid.to_string())
}

/// Broadcast `line` to every local member of `channel`, if the channel is
/// known locally (remote-only channels have no local members to reach).
fn broadcast_local_channel(daemon: &Daemon, channel: &str, line: &Message) {
    if let Some(chan) = daemon.channels.get(channel) {
        chan.read().broadcast_all(line);
    }
}

/// Apply one post-burst inbound message's local effect (§4.F table).
/// `link` is the peer connection it arrived on, used only to answer `PING`.
pub async fn apply_ongoing(daemon: &Daemon, link: &LinkSession, msg: &Message) {
    let Some(source_uid) = msg.source.clone() else {
        warn!(command = %msg.command, "ongoing federation message without a source, ignoring");
        return;
    };

    match msg.command.as_str() {
        "PRIVMSG" | "NOTICE" => {
            let Some(target) = msg.param(0) else { return };
            let Some(text) = msg.param(1) else { return };
            let hostmask = hostmask_for(daemon, &source_uid);
            let built = if msg.command == "NOTICE" {
                command::notice(&hostmask, target, text)
            } else {
                command::privmsg(&hostmask, target, text)
            };
            if target.starts_with('#') || target.starts_with('&') {
                broadcast_local_channel(daemon, target, &built);
            } else if let Some(recipient) = daemon.clients.get(target) {
                recipient.read().send(built);
            }
        }

        "JOIN" => {
            let Some(channel) = msg.param(0) else { return };
            daemon.network.remote_join(&source_uid, channel, unix_now());
            let hostmask = hostmask_for(daemon, &source_uid);
            broadcast_local_channel(daemon, channel, &command::join(&hostmask, channel));
        }

        "PART" => {
            let Some(channel) = msg.param(0) else { return };
            let reason = msg.param(1);
            let hostmask = hostmask_for(daemon, &source_uid);
            broadcast_local_channel(daemon, channel, &command::part(&hostmask, channel, reason));
            daemon.network.remote_part(&source_uid, channel);
        }

        "QUIT" => {
            let reason = msg.param(0).unwrap_or("Remote Quit");
            let hostmask = hostmask_for(daemon, &source_uid);
            let quit_msg = command::quit(&hostmask, reason);
            // Restricted to channels this user actually shared with local
            // members (§9 "Open bugs in reference behaviour" #1), not every
            // local channel.
            for channel in daemon.network.user_channels(&source_uid) {
                broadcast_local_channel(daemon, &channel, &quit_msg);
            }
            daemon.network.remove_user(&source_uid);
        }

        "NICK" => {
            let Some(new_nick) = msg.param(0) else { return };
            let ts: i64 = msg.param(1).and_then(|s| s.parse().ok()).unwrap_or_else(unix_now);
            let old_hostmask = hostmask_for(daemon, &source_uid);
            let nick_msg = command::nick_change(&old_hostmask, new_nick);
            for channel in daemon.network.user_channels(&source_uid) {
                broadcast_local_channel(daemon, &channel, &nick_msg);
            }
            let _ = daemon.network.update_nick(&source_uid, new_nick, ts);
        }

        "MODE" => {
            let Some(target) = msg.param(0) else { return };
            let Some(change) = msg.param(1) else { return };
            let args: Vec<&str> = msg.params[2..].iter().map(String::as_str).collect();
            let hostmask = hostmask_for(daemon, &source_uid);
            let mode_msg = command::mode(&hostmask, target, change, &args);
            if target.starts_with('#') || target.starts_with('&') {
                daemon.network.remote_set_mode(target, change);
                broadcast_local_channel(daemon, target, &mode_msg);
            }
        }

        "TOPIC" => {
            let Some(channel) = msg.param(0) else { return };
            let Some(topic) = msg.param(1) else { return };
            let ts = unix_now();
            daemon.network.remote_set_topic(channel, topic, &source_uid, ts);
            let hostmask = hostmask_for(daemon, &source_uid);
            broadcast_local_channel(daemon, channel, &command::topic(&hostmask, channel, topic));
            if let Some(local) = daemon.channels.get(channel) {
                local.write().set_topic(topic.to_string(), nick_for(daemon, &source_uid));
            }
        }

        "KICK" => {
            // Target is a nickname, matching this daemon's own KICK builder
            // (`command::kick`), not a raw UID.
            let Some(channel) = msg.param(0) else { return };
            let Some(target_nick) = msg.param(1) else { return };
            let reason = msg.param(2).unwrap_or("Kicked");
            let hostmask = hostmask_for(daemon, &source_uid);
            let kick_msg = command::kick(&hostmask, channel, target_nick, reason);
            broadcast_local_channel(daemon, channel, &kick_msg);
            if let Some(remote_target) = daemon.network.user_by_nick(target_nick) {
                daemon.network.remote_part(&remote_target.uid, channel);
            }
            if let Some(local) = daemon.clients.get(target_nick) {
                if let Some(local_chan) = daemon.channels.get(channel) {
                    let should_delete = {
                        let mut c = local_chan.write();
                        c.remove_member(target_nick);
                        c.is_empty()
                    };
                    if should_delete {
                        daemon.channels.remove(channel);
                    }
                }
                local.write().part_channel(channel);
            }
        }

        "INVITE" => {
            let Some(target_nick) = msg.param(0) else { return };
            let Some(channel) = msg.param(1) else { return };
            if let Some(local) = daemon.clients.get(target_nick) {
                let hostmask = hostmask_for(daemon, &source_uid);
                local.read().send(command::invite(&hostmask, target_nick, channel));
            }
        }

        "SQUIT" => {
            let Some(server_name) = msg.param(0) else { return };
            // `remove_server` already cascades to every downlink and their
            // users (§4.G) and hands back their last-known records, since
            // they're gone from the network mirror by the time it returns.
            // Each removed user gets the same shared-channels-only QUIT
            // broadcast as an ordinary remote QUIT (§9 "Open bugs in
            // reference behaviour" #1).
            let removed = daemon.network.remove_server(server_name);
            for user in removed {
                let hostmask = format!("{}!{}@{}", user.nick, user.user, user.host);
                let quit_msg = command::quit(&hostmask, "*.net *.split");
                for channel in &user.channels {
                    broadcast_local_channel(daemon, channel, &quit_msg);
                }
            }
            daemon.links.remove(server_name);
        }

        "PING" => {
            let _ = link.write_message(&Message::new("PONG", vec![daemon.network.local_name().to_string()])).await;
        }

        other => {
            warn!(command = %other, "unhandled ongoing federation command, ignoring");
        }
    }
}
