//! NICK, USER, PING, PONG, QUIT (§4.D) — the five commands exempt from the
//! registration gate, since at least one of them has to be how a session
//! gets registered in the first place.

use std::time::Instant;

use crate::error::{HandlerError, HandlerResult, Outcome};
use crate::network::gateway::Daemon;
use crate::proto::{command, response, Message};
use crate::state::{RegistrationState, SessionHandle};
use crate::sync::Router;

/// First char letter or one of `` []\`_^{|} ``; remaining chars may add
/// digits and `-`; length 1–16 (§4.D NICK).
fn valid_nick(nick: &str) -> bool {
    if nick.is_empty() || nick.len() > 16 {
        return false;
    }
    let mut chars = nick.chars();
    let first = chars.next().unwrap();
    let first_ok = first.is_ascii_alphabetic() || "[]\\`_^{|}".contains(first);
    if !first_ok {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || "-[]\\`_^{|}".contains(c))
}

pub async fn nick(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let new_nick = msg.param(0).ok_or(HandlerError::NeedMoreParams)?;
    if !valid_nick(new_nick) {
        return Err(HandlerError::ErroneousNickname(new_nick.to_string()));
    }
    if daemon.clients.contains_nick(new_nick) {
        return Err(HandlerError::NicknameInUse(new_nick.to_string()));
    }

    let (was_registered, old_nick, old_hostmask) = {
        let s = session.read();
        (s.is_registered(), s.nickname().to_string(), s.hostmask())
    };

    session.write().set_nickname(new_nick);

    if was_registered {
        daemon.clients.rename(&old_nick, new_nick);
        let change = command::nick_change(&old_hostmask, new_nick);
        let channel_names: Vec<String> = session.read().channels().map(str::to_string).collect();
        for name in &channel_names {
            if let Some(chan) = daemon.channels.get(name) {
                let mut c = chan.write();
                c.rename_member(&old_nick, new_nick);
                c.broadcast_all(&change);
            }
        }
        let router = Router::new(&daemon.links, &daemon.network);
        router.broadcast_all(None, &change).await;
        Ok(Outcome::Continue)
    } else {
        Ok(finalize_registration(daemon, session))
    }
}

pub async fn user(_daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    if msg.params.len() < 4 {
        return Err(HandlerError::NeedMoreParams);
    }
    let user = msg.param(0).unwrap();
    let real = msg.param(3).unwrap();

    if session.read().is_registered() {
        return Err(HandlerError::AlreadyRegistered);
    }

    session.write().set_username(user, real);
    Ok(finalize_registration(_daemon, session))
}

/// Inserts the session into the nickname registry and sends the welcome
/// burst exactly once, the moment both NICK and USER have landed (§4.B).
fn finalize_registration(daemon: &Daemon, session: &SessionHandle) -> Outcome {
    let newly = session.write().mark_welcomed_if_newly_registered();
    if !newly {
        return Outcome::Continue;
    }
    let nick = session.read().nickname().to_string();
    daemon.clients.insert(&nick, session.clone());

    if !daemon.links.sids().is_empty() || daemon.config.federation.is_some() {
        session.write().uid = Some(daemon.network.generate_uid());
    }

    let server = &daemon.config.server.name;
    let welcome = [
        response::numeric(
            server,
            response::RPL_WELCOME,
            &nick,
            vec![format!("Welcome to the Internet Relay Network {nick}")],
        ),
        response::numeric(
            server,
            response::RPL_YOURHOST,
            &nick,
            vec![format!("Your host is {server}, running version slircd")],
        ),
        response::numeric(
            server,
            response::RPL_CREATED,
            &nick,
            vec!["This server was started recently".to_string()],
        ),
        response::numeric(
            server,
            response::RPL_MYINFO,
            &nick,
            vec![server.clone(), "slircd-1.0".to_string(), "io".to_string(), "ovintmbk".to_string()],
        ),
    ];
    let s = session.read();
    for reply in welcome {
        s.send(reply);
    }
    Outcome::Continue
}

pub async fn ping(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let token = msg.param(0).unwrap_or("");
    session.read().send(command::pong(&daemon.config.server.name, token));
    Ok(Outcome::Continue)
}

pub async fn pong(_daemon: &Daemon, session: &SessionHandle, _msg: &Message) -> HandlerResult {
    session.write().last_ping = Instant::now();
    Ok(Outcome::Continue)
}

pub async fn quit(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let reason = msg.param(0).unwrap_or("Client Quit").to_string();
    let hostmask = session.read().hostmask();
    let nick = session.read().nickname().to_string();
    let quit_msg = command::quit(&hostmask, &reason);

    let channel_names: Vec<String> = session.read().channels().map(str::to_string).collect();
    for name in &channel_names {
        if let Some(chan) = daemon.channels.get(&name.clone()) {
            let should_delete = {
                let mut c = chan.write();
                c.broadcast(&quit_msg, &nick);
                c.remove_member(&nick);
                c.is_empty()
            };
            if should_delete {
                daemon.channels.remove(name);
            }
        }
    }

    if !nick.is_empty() {
        daemon.clients.remove(&nick);
    }

    if let Some(uid) = session.read().uid.clone() {
        let router = Router::new(&daemon.links, &daemon.network);
        let remote_quit = Message::new("QUIT", vec![reason.clone()]).with_source(uid);
        router.broadcast_all(None, &remote_quit).await;
    }

    Ok(Outcome::Quit(reason))
}

pub fn is_registration_exempt(command: &str) -> bool {
    matches!(command, "NICK" | "USER" | "PING" | "PONG" | "QUIT")
}

pub fn registration_state(session: &SessionHandle) -> RegistrationState {
    session.read().state()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nick_charset() {
        assert!(valid_nick("alice"));
        assert!(valid_nick("_weird^{nick}"));
        assert!(valid_nick("a-1"));
        assert!(!valid_nick("1alice"));
        assert!(!valid_nick(""));
        assert!(!valid_nick(&"a".repeat(17)));
    }

    #[test]
    fn registration_exempt_commands() {
        assert!(is_registration_exempt("NICK"));
        assert!(is_registration_exempt("QUIT"));
        assert!(!is_registration_exempt("JOIN"));
    }
}
