//! PRIVMSG and NOTICE (§4.D).

use crate::error::{HandlerError, HandlerResult, Outcome};
use crate::network::gateway::Daemon;
use crate::proto::{command, response, Message};
use crate::state::SessionHandle;
use crate::sync::Router;

async fn send(daemon: &Daemon, session: &SessionHandle, msg: &Message, notice: bool) -> HandlerResult {
    if msg.params.is_empty() {
        return Err(HandlerError::NeedMoreParams);
    }
    let target = msg.param(0).unwrap();
    let text = msg.param(1).unwrap_or("");
    let hostmask = session.read().hostmask();

    let built = if notice {
        command::notice(&hostmask, target, text)
    } else {
        command::privmsg(&hostmask, target, text)
    };

    if target.starts_with('#') || target.starts_with('&') {
        let Some(chan) = daemon.channels.get(target) else {
            return Err(HandlerError::NoSuchChannel(target.to_string()));
        };
        let nick = session.read().nickname().to_string();
        {
            let c = chan.read();
            if !c.is_member(&nick) && c.has_mode('n') {
                return Err(HandlerError::CannotSendToChan(target.to_string()));
            }
            if !c.can_speak(&nick) {
                return Err(HandlerError::CannotSendToChan(target.to_string()));
            }
            c.broadcast(&built, &nick);
        }
        let router = Router::new(&daemon.links, &daemon.network);
        router.fanout_channel(target, None, &built).await;
    } else if let Some(recipient) = daemon.clients.get(target) {
        if let Some(away) = recipient.read().away_message() {
            if !notice {
                let server = &daemon.config.server.name;
                let nick = session.read().nickname().to_string();
                session.read().send(response::numeric(
                    server,
                    response::RPL_AWAY,
                    &nick,
                    vec![target.to_string(), away.to_string()],
                ));
            }
        }
        recipient.read().send(built);
    } else if let Some(remote) = daemon.network.user_by_nick(target) {
        let router = Router::new(&daemon.links, &daemon.network);
        router.send_to_uid(&remote.uid, &built).await;
    } else {
        return Err(HandlerError::NoSuchNick(target.to_string()));
    }

    Ok(Outcome::Continue)
}

pub async fn privmsg(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    send(daemon, session, msg, false).await
}

/// NOTICE never generates automatic error replies to the sender (§4.D): any
/// error from the shared `send` path is swallowed here rather than
/// propagated to the dispatcher's numeric-reply conversion.
pub async fn notice(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    match send(daemon, session, msg, true).await {
        Ok(outcome) => Ok(outcome),
        Err(HandlerError::Quit(reason)) => Err(HandlerError::Quit(reason)),
        Err(_) => Ok(Outcome::Continue),
    }
}
