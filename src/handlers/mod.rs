//! Command dispatcher (§4.D): routes a parsed [`Message`] to the handler for
//! its command, enforces the registration gate, and converts a returned
//! [`HandlerError`] into the numeric reply the client actually sees.

pub mod channel;
pub mod messaging;
pub mod oper;
pub mod registration;
pub mod user;

use crate::error::{HandlerError, Outcome};
use crate::network::gateway::Daemon;
use crate::proto::Message;
use crate::state::SessionHandle;

/// Route one message to its handler and reduce the result to an [`Outcome`],
/// sending any numeric reply the handler's error maps to along the way.
pub async fn dispatch(daemon: &Daemon, session: &SessionHandle, msg: Message) -> Outcome {
    let command = msg.command.as_str();

    if !registration::is_registration_exempt(command) && !session.read().is_registered() {
        let server = &daemon.config.server.name;
        session.read().send(HandlerError::NotRegistered.to_irc_reply(server, "", command).unwrap());
        return Outcome::Continue;
    }

    let result = match command {
        "NICK" => registration::nick(daemon, session, &msg).await,
        "USER" => registration::user(daemon, session, &msg).await,
        "PING" => registration::ping(daemon, session, &msg).await,
        "PONG" => registration::pong(daemon, session, &msg).await,
        "QUIT" => registration::quit(daemon, session, &msg).await,

        "JOIN" => channel::join(daemon, session, &msg).await,
        "PART" => channel::part(daemon, session, &msg).await,
        "TOPIC" => channel::topic(daemon, session, &msg).await,
        "MODE" => channel::mode(daemon, session, &msg).await,
        "KICK" => channel::kick(daemon, session, &msg).await,
        "INVITE" => channel::invite(daemon, session, &msg).await,
        "NAMES" => channel::names(daemon, session, &msg).await,
        "LIST" => channel::list(daemon, session, &msg).await,

        "PRIVMSG" => messaging::privmsg(daemon, session, &msg).await,
        "NOTICE" => messaging::notice(daemon, session, &msg).await,

        "WHO" => user::who(daemon, session, &msg).await,
        "WHOIS" => user::whois(daemon, session, &msg).await,
        "AWAY" => user::away(daemon, session, &msg).await,
        "USERHOST" => user::userhost(daemon, session, &msg).await,
        "ISON" => user::ison(daemon, session, &msg).await,

        "OPER" => oper::oper(daemon, session, &msg).await,
        "SQUIT" => oper::squit(daemon, session, &msg).await,

        other => Err(HandlerError::UnknownCommand(other.to_string())),
    };

    match result {
        Ok(outcome) => outcome,
        Err(HandlerError::Quit(reason)) => Outcome::Quit(reason.unwrap_or_else(|| "Quit".to_string())),
        Err(e) => {
            let server = &daemon.config.server.name;
            let nick = session.read().nickname().to_string();
            if let Some(reply) = e.to_irc_reply(server, &nick, command) {
                session.read().send(reply);
            }
            Outcome::Continue
        }
    }
}
