//! Error hierarchy (§7): typed errors at each seam, converted to numerics or
//! logs at the boundary that knows what to do with them.

use crate::proto::{response, Message};
use thiserror::Error;

/// Errors raised while a command handler is processing one client message.
///
/// Categories 1–2 of the taxonomy in §7: most variants become a numeric
/// reply via [`HandlerError::to_irc_reply`]; the session otherwise
/// continues. [`HandlerError::Quit`] is the one variant that signals the
/// read loop to tear the session down.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("not enough parameters")]
    NeedMoreParams,

    #[error("not registered")]
    NotRegistered,

    #[error("already registered")]
    AlreadyRegistered,

    #[error("no such nick/channel: {0}")]
    NoSuchNick(String),

    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("nickname in use: {0}")]
    NicknameInUse(String),

    #[error("erroneous nickname: {0}")]
    ErroneousNickname(String),

    #[error("cannot send to channel: {0}")]
    CannotSendToChan(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("no privileges")]
    NoPrivileges,

    #[error("users don't match")]
    UsersDontMatch,

    #[error("password mismatch")]
    PasswdMismatch,

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("client quit: {0:?}")]
    Quit(Option<String>),
}

/// Either "keep reading" or "tear the session down"; returned by the
/// dispatcher so the read loop knows whether to exit (§4.D).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit(String),
}

pub type HandlerResult = Result<Outcome, HandlerError>;

impl HandlerError {
    /// Convert to the wire numeric this error corresponds to, if any.
    ///
    /// Returns `None` for [`HandlerError::Quit`], which the connection loop
    /// handles specially (sends `ERROR :Closing Link` itself, see
    /// `handlers::registration::quit`).
    pub fn to_irc_reply(&self, server_name: &str, nick: &str, cmd: &str) -> Option<Message> {
        let payload = |text: String| vec![text];
        Some(match self {
            Self::NeedMoreParams => response::numeric(
                server_name,
                response::ERR_NEEDMOREPARAMS,
                nick,
                vec![cmd.to_string(), "Not enough parameters".to_string()],
            ),
            Self::NotRegistered => response::numeric(
                server_name,
                response::ERR_NOTREGISTERED,
                nick,
                payload("You have not registered".to_string()),
            ),
            Self::AlreadyRegistered => response::numeric(
                server_name,
                response::ERR_ALREADYREGISTERED,
                nick,
                payload("You may not reregister".to_string()),
            ),
            Self::NoSuchNick(target) => response::numeric(
                server_name,
                response::ERR_NOSUCHNICK,
                nick,
                vec![target.clone(), "No such nick/channel".to_string()],
            ),
            Self::NoSuchChannel(target) => response::numeric(
                server_name,
                response::ERR_NOSUCHCHANNEL,
                nick,
                vec![target.clone(), "No such channel".to_string()],
            ),
            Self::NicknameInUse(bad) => response::numeric(
                server_name,
                response::ERR_NICKNAMEINUSE,
                nick,
                vec![bad.clone(), "Nickname is already in use".to_string()],
            ),
            Self::ErroneousNickname(bad) => response::numeric(
                server_name,
                response::ERR_ERRONEOUSNICKNAME,
                nick,
                vec![bad.clone(), "Erroneous nickname".to_string()],
            ),
            Self::CannotSendToChan(chan) => response::numeric(
                server_name,
                response::ERR_CANNOTSENDTOCHAN,
                nick,
                vec![chan.clone(), "Cannot send to channel (+m)".to_string()],
            ),
            Self::UnknownCommand(cmd) => response::numeric(
                server_name,
                response::ERR_UNKNOWNCOMMAND,
                nick,
                vec![cmd.clone(), "Unknown command".to_string()],
            ),
            Self::NoPrivileges => response::numeric(
                server_name,
                response::ERR_NOPRIVILEGES,
                nick,
                payload("Permission Denied- You're not an IRC operator".to_string()),
            ),
            Self::UsersDontMatch => response::numeric(
                server_name,
                response::ERR_USERSDONTMATCH,
                nick,
                payload("Cannot change mode for other users".to_string()),
            ),
            Self::PasswdMismatch => response::numeric(
                server_name,
                response::ERR_PASSWDMISMATCH,
                nick,
                payload("Password incorrect".to_string()),
            ),
            Self::Channel(e) => e.to_irc_reply(server_name, nick),
            Self::Quit(_) => return None,
        })
    }
}

/// Errors raised by [`crate::state::channel::Channel`] operations (§4.C).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("you're not on that channel")]
    NotOnChannel(String),

    #[error("you're not channel operator")]
    ChanOpPrivsNeeded(String),

    #[error("they aren't on that channel")]
    UserNotInChannel(String, String),

    #[error("is already on channel")]
    UserOnChannel(String, String),

    #[error("cannot join channel (+b)")]
    BannedFromChan(String),

    #[error("cannot join channel (+i)")]
    InviteOnlyChan(String),

    #[error("cannot join channel (+k)")]
    BadChannelKey(String),

    #[error("unknown mode char")]
    UnknownMode(char, String),
}

impl ChannelError {
    pub fn to_irc_reply(&self, server_name: &str, nick: &str) -> Message {
        let (code, params) = match self {
            Self::NotOnChannel(chan) => (
                response::ERR_NOTONCHANNEL,
                vec![chan.clone(), "You're not on that channel".to_string()],
            ),
            Self::ChanOpPrivsNeeded(chan) => (
                response::ERR_CHANOPRIVSNEEDED,
                vec![chan.clone(), "You're not channel operator".to_string()],
            ),
            Self::UserNotInChannel(target, chan) => (
                response::ERR_USERNOTINCHANNEL,
                vec![target.clone(), chan.clone(), "They aren't on that channel".to_string()],
            ),
            Self::UserOnChannel(target, chan) => (
                response::ERR_USERONCHANNEL,
                vec![target.clone(), chan.clone(), "is already on channel".to_string()],
            ),
            Self::BannedFromChan(chan) => (
                response::ERR_BANNEDFROMCHAN,
                vec![chan.clone(), "Cannot join channel (+b)".to_string()],
            ),
            Self::InviteOnlyChan(chan) => (
                response::ERR_INVITEONLYCHAN,
                vec![chan.clone(), "Cannot join channel (+i)".to_string()],
            ),
            Self::BadChannelKey(chan) => (
                response::ERR_BADCHANNELKEY,
                vec![chan.clone(), "Cannot join channel (+k)".to_string()],
            ),
            Self::UnknownMode(c, chan) => (
                response::ERR_UNKNOWNMODE,
                vec![c.to_string(), format!("is unknown mode char to me for {chan}")],
            ),
        };
        response::numeric(server_name, code, nick, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_has_no_wire_reply() {
        assert!(HandlerError::Quit(Some("bye".into())).to_irc_reply("s", "n", "QUIT").is_none());
    }

    #[test]
    fn need_more_params_reply() {
        let reply = HandlerError::NeedMoreParams.to_irc_reply("irc.example", "alice", "JOIN").unwrap();
        assert_eq!(reply.command, response::ERR_NEEDMOREPARAMS);
    }
}
