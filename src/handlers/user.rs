//! WHO, WHOIS, AWAY, USERHOST, ISON, and user MODE (§4.D).

use crate::error::{HandlerError, HandlerResult, Outcome};
use crate::network::gateway::Daemon;
use crate::proto::{response, Message};
use crate::state::SessionHandle;

pub async fn who(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();
    let mask = msg.param(0).unwrap_or("*");

    if let Some(chan) = daemon.channels.get(mask) {
        let c = chan.read();
        for member in c.member_sessions() {
            let m = member.read();
            let flags = if m.is_away() { "G" } else { "H" };
            session.read().send(response::numeric(
                server,
                response::RPL_WHOREPLY,
                &nick,
                vec![
                    mask.to_string(),
                    m.username().to_string(),
                    m.hostname.to_string(),
                    server.to_string(),
                    m.nickname().to_string(),
                    flags.to_string(),
                    format!("0 {}", m.realname()),
                ],
            ));
        }
    } else if let Some(target) = daemon.clients.get(mask) {
        let m = target.read();
        let flags = if m.is_away() { "G" } else { "H" };
        session.read().send(response::numeric(
            server,
            response::RPL_WHOREPLY,
            &nick,
            vec![
                "*".to_string(),
                m.username().to_string(),
                m.hostname.to_string(),
                server.to_string(),
                m.nickname().to_string(),
                flags.to_string(),
                format!("0 {}", m.realname()),
            ],
        ));
    }

    session.read().send(response::numeric(
        server,
        response::RPL_ENDOFWHO,
        &nick,
        vec![mask.to_string(), "End of /WHO list".to_string()],
    ));
    Ok(Outcome::Continue)
}

pub async fn whois(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();
    let target_nick = msg.param(0).ok_or(HandlerError::NeedMoreParams)?;

    let Some(target) = daemon.clients.get(target_nick) else {
        return Err(HandlerError::NoSuchNick(target_nick.to_string()));
    };
    let t = target.read();

    session.read().send(response::numeric(
        server,
        response::RPL_WHOISUSER,
        &nick,
        vec![
            t.nickname().to_string(),
            t.username().to_string(),
            t.hostname.to_string(),
            "*".to_string(),
            t.realname().to_string(),
        ],
    ));
    session.read().send(response::numeric(
        server,
        response::RPL_WHOISSERVER,
        &nick,
        vec![t.nickname().to_string(), server.to_string(), "slircd server".to_string()],
    ));
    if t.is_oper() {
        session.read().send(response::numeric(
            server,
            response::RPL_WHOISOPERATOR,
            &nick,
            vec![t.nickname().to_string(), "is an IRC operator".to_string()],
        ));
    }
    let channels: Vec<String> = t.channels().map(str::to_string).collect();
    if !channels.is_empty() {
        session.read().send(response::numeric(
            server,
            response::RPL_WHOISCHANNELS,
            &nick,
            vec![t.nickname().to_string(), channels.join(" ")],
        ));
    }
    session.read().send(response::numeric(
        server,
        response::RPL_ENDOFWHOIS,
        &nick,
        vec![t.nickname().to_string(), "End of /WHOIS list".to_string()],
    ));
    Ok(Outcome::Continue)
}

pub async fn away(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();
    let reason = msg.param(0).map(str::to_string);

    let now_away = reason.is_some();
    session.write().set_away(reason);

    let (code, text) = if now_away {
        (response::RPL_NOWAWAY, "You have been marked as being away")
    } else {
        (response::RPL_UNAWAY, "You are no longer marked as being away")
    };
    session.read().send(response::numeric(server, code, &nick, vec![text.to_string()]));
    Ok(Outcome::Continue)
}

pub async fn userhost(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();
    let mut replies = Vec::new();
    for target_nick in msg.params.iter().take(5) {
        if let Some(target) = daemon.clients.get(target_nick) {
            let t = target.read();
            let away_flag = if t.is_away() { '-' } else { '+' };
            replies.push(format!("{}={}{}@{}", t.nickname(), away_flag, t.username(), t.hostname));
        }
    }
    session
        .read()
        .send(response::numeric(server, response::RPL_USERHOST, &nick, vec![replies.join(" ")]));
    Ok(Outcome::Continue)
}

pub async fn ison(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();
    let online: Vec<String> = msg
        .params
        .iter()
        .filter(|n| daemon.clients.contains_nick(n))
        .cloned()
        .collect();
    session
        .read()
        .send(response::numeric(server, response::RPL_ISON, &nick, vec![online.join(" ")]));
    Ok(Outcome::Continue)
}

/// Called by `handlers::channel::mode` when the MODE target isn't a channel.
pub async fn user_mode(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let target_nick = msg.param(0).ok_or(HandlerError::NeedMoreParams)?;
    let self_nick = session.read().nickname().to_string();

    if target_nick != self_nick {
        return Err(HandlerError::UsersDontMatch);
    }

    let server = &daemon.config.server.name;

    let Some(change) = msg.param(1) else {
        let modes: String = session.read().user_modes().iter().collect();
        session.read().send(response::numeric(
            server,
            response::RPL_UMODEIS,
            &self_nick,
            vec![format!("+{modes}")],
        ));
        return Ok(Outcome::Continue);
    };

    let mut adding = true;
    for ch in change.chars() {
        match ch {
            '+' => adding = true,
            '-' => adding = false,
            'o' => {
                if !adding {
                    session.write().set_user_mode('o', false);
                }
                // Granting 'o' only happens through OPER (§4.D).
            }
            'i' | 'w' => session.write().set_user_mode(ch, adding),
            other => {
                session.read().send(response::numeric(
                    server,
                    response::ERR_UMODEUNKNOWNFLAG,
                    &self_nick,
                    vec!["Unknown MODE flag".to_string()],
                ));
                let _ = other;
            }
        }
    }
    Ok(Outcome::Continue)
}
