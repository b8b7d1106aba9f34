//! Builders for the messages this daemon emits, client-facing and S2S alike.
//!
//! Each builder pairs with `Message::parse` to satisfy the round-trip law in
//! §8: `parse(build(m)) == m` for every builder here (see `tests/parser.rs`).

use super::message::Message;

/// Opaque marker re-exported so callers can refer to "a builder result" by
/// name instead of the bare `Message` type; kept as a type alias rather than
/// a newtype since every builder here already returns a fully formed line.
pub type Command = Message;

pub fn error(reason: &str) -> Message {
    Message::new("ERROR", vec![reason.to_string()])
}

pub fn ping(token: &str) -> Message {
    Message::new("PING", vec![token.to_string()])
}

pub fn pong(server_name: &str, token: &str) -> Message {
    Message::new("PONG", vec![server_name.to_string(), token.to_string()])
        .with_source(server_name.to_string())
}

pub fn privmsg(source: &str, target: &str, text: &str) -> Message {
    Message::new("PRIVMSG", vec![target.to_string(), text.to_string()]).with_source(source)
}

pub fn notice(source: &str, target: &str, text: &str) -> Message {
    Message::new("NOTICE", vec![target.to_string(), text.to_string()]).with_source(source)
}

pub fn join(source: &str, channel: &str) -> Message {
    Message::new("JOIN", vec![channel.to_string()]).with_source(source)
}

pub fn part(source: &str, channel: &str, reason: Option<&str>) -> Message {
    let mut params = vec![channel.to_string()];
    if let Some(reason) = reason {
        params.push(reason.to_string());
    }
    Message::new("PART", params).with_source(source)
}

pub fn quit(source: &str, reason: &str) -> Message {
    Message::new("QUIT", vec![reason.to_string()]).with_source(source)
}

pub fn nick_change(source: &str, new_nick: &str) -> Message {
    Message::new("NICK", vec![new_nick.to_string()]).with_source(source)
}

pub fn topic(source: &str, channel: &str, topic: &str) -> Message {
    Message::new("TOPIC", vec![channel.to_string(), topic.to_string()]).with_source(source)
}

pub fn mode(source: &str, target: &str, change: &str, args: &[&str]) -> Message {
    let mut params = vec![target.to_string(), change.to_string()];
    params.extend(args.iter().map(|s| s.to_string()));
    Message::new("MODE", params).with_source(source)
}

pub fn kick(source: &str, channel: &str, target: &str, reason: &str) -> Message {
    Message::new(
        "KICK",
        vec![channel.to_string(), target.to_string(), reason.to_string()],
    )
    .with_source(source)
}

pub fn invite(source: &str, target: &str, channel: &str) -> Message {
    Message::new("INVITE", vec![target.to_string(), channel.to_string()]).with_source(source)
}

// --- TS6 server-to-server builders (§4.F) ---

pub fn pass(password: &str, local_sid: &str) -> Message {
    Message::new(
        "PASS",
        vec![
            password.to_string(),
            "TS".to_string(),
            "6".to_string(),
            local_sid.to_string(),
        ],
    )
}

pub fn capab(caps: &[&str]) -> Message {
    Message::new("CAPAB", vec![caps.join(" ")])
}

pub fn server(name: &str, hopcount: u32, description: &str) -> Message {
    Message::new(
        "SERVER",
        vec![name.to_string(), hopcount.to_string(), description.to_string()],
    )
}

pub fn svinfo(ts_version: u32, min_ts_version: u32, unix_time: i64) -> Message {
    Message::new(
        "SVINFO",
        vec![
            ts_version.to_string(),
            min_ts_version.to_string(),
            "0".to_string(),
            unix_time.to_string(),
        ],
    )
}

#[allow(clippy::too_many_arguments)]
pub fn uid(
    local_sid: &str,
    nick: &str,
    hopcount: u32,
    nick_ts: i64,
    modes: &str,
    user: &str,
    host: &str,
    ip: &str,
    remote_uid: &str,
    realname: &str,
) -> Message {
    Message::new(
        "UID",
        vec![
            nick.to_string(),
            hopcount.to_string(),
            nick_ts.to_string(),
            modes.to_string(),
            user.to_string(),
            host.to_string(),
            ip.to_string(),
            remote_uid.to_string(),
            realname.to_string(),
        ],
    )
    .with_source(local_sid)
}

pub fn sjoin(local_sid: &str, channel_ts: i64, channel: &str, modes: &str, members: &str) -> Message {
    Message::new(
        "SJOIN",
        vec![
            channel_ts.to_string(),
            channel.to_string(),
            modes.to_string(),
            members.to_string(),
        ],
    )
    .with_source(local_sid)
}

pub fn squit(source: &str, server: &str, reason: &str) -> Message {
    Message::new("SQUIT", vec![server.to_string(), reason.to_string()]).with_source(source)
}
