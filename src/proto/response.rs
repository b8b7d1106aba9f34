//! Three-digit numeric replies (§6.2).
//!
//! Only the codes this daemon actually emits are named here, matching the
//! set enumerated in the distilled spec's §6.2. Each constant is the code
//! as a `&str` (numerics are always sent as three ASCII digits, never as a
//! machine integer on the wire).

use super::message::Message;

pub const RPL_WELCOME: &str = "001";
pub const RPL_YOURHOST: &str = "002";
pub const RPL_CREATED: &str = "003";
pub const RPL_MYINFO: &str = "004";
pub const RPL_UMODEIS: &str = "221";
pub const RPL_AWAY: &str = "301";
pub const RPL_USERHOST: &str = "302";
pub const RPL_ISON: &str = "303";
pub const RPL_UNAWAY: &str = "305";
pub const RPL_NOWAWAY: &str = "306";
pub const RPL_WHOISUSER: &str = "311";
pub const RPL_WHOISSERVER: &str = "312";
pub const RPL_WHOISOPERATOR: &str = "313";
pub const RPL_ENDOFWHO: &str = "315";
pub const RPL_WHOISIDLE: &str = "317";
pub const RPL_ENDOFWHOIS: &str = "318";
pub const RPL_WHOISCHANNELS: &str = "319";
pub const RPL_LISTSTART: &str = "321";
pub const RPL_LIST: &str = "322";
pub const RPL_LISTEND: &str = "323";
pub const RPL_CHANNELMODEIS: &str = "324";
pub const RPL_NOTOPIC: &str = "331";
pub const RPL_TOPIC: &str = "332";
pub const RPL_INVITING: &str = "341";
pub const RPL_WHOREPLY: &str = "352";
pub const RPL_NAMREPLY: &str = "353";
pub const RPL_ENDOFNAMES: &str = "366";
pub const RPL_MOTD: &str = "372";
pub const RPL_MOTDSTART: &str = "375";
pub const RPL_ENDOFMOTD: &str = "376";
pub const RPL_YOUREOPER: &str = "381";
pub const ERR_NOSUCHNICK: &str = "401";
pub const ERR_NOSUCHSERVER: &str = "402";
pub const ERR_NOSUCHCHANNEL: &str = "403";
pub const ERR_CANNOTSENDTOCHAN: &str = "404";
pub const ERR_TOOMANYCHANNELS: &str = "405";
pub const ERR_NOORIGIN: &str = "411";
pub const ERR_NORECIPIENT: &str = "412";
pub const ERR_UNKNOWNCOMMAND: &str = "421";
pub const ERR_NONICKNAMEGIVEN: &str = "431";
pub const ERR_ERRONEOUSNICKNAME: &str = "432";
pub const ERR_NICKNAMEINUSE: &str = "433";
pub const ERR_USERNOTINCHANNEL: &str = "441";
pub const ERR_NOTONCHANNEL: &str = "442";
pub const ERR_USERONCHANNEL: &str = "443";
pub const ERR_NOTREGISTERED: &str = "451";
pub const ERR_NEEDMOREPARAMS: &str = "461";
pub const ERR_ALREADYREGISTERED: &str = "462";
pub const ERR_PASSWDMISMATCH: &str = "464";
pub const ERR_UNKNOWNMODE: &str = "472";
pub const ERR_INVITEONLYCHAN: &str = "473";
pub const ERR_BANNEDFROMCHAN: &str = "474";
pub const ERR_BADCHANNELKEY: &str = "475";
pub const ERR_NOPRIVILEGES: &str = "481";
pub const ERR_CHANOPRIVSNEEDED: &str = "482";
pub const ERR_UMODEUNKNOWNFLAG: &str = "501";
pub const ERR_USERSDONTMATCH: &str = "502";

/// Build `:<server_name> <code> <nick_or_star> <payload...>` (§4.D).
///
/// `nick` is substituted with `*` when the target session has not yet
/// chosen one, matching the rule in §4.D. The last element of `payload`,
/// when present, is always rendered as a `:`-prefixed trailing param on the
/// wire — a numeric's final human-readable argument carries a `:` even when
/// it's a single token (e.g. `353 alice = #room :@alice`), not only when it
/// contains a space (§6.2).
pub fn numeric(server_name: &str, code: &str, nick: &str, payload: Vec<String>) -> Message {
    let nick = if nick.is_empty() { "*" } else { nick };
    let has_payload = !payload.is_empty();
    let mut params = vec![nick.to_string()];
    params.extend(payload);
    let msg = Message::new(code, params).with_source(server_name);
    if has_payload {
        msg.with_forced_trailing()
    } else {
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_formats_with_server_source() {
        let m = numeric("irc.example.com", RPL_WELCOME, "alice", vec!["Welcome".to_string()]);
        assert_eq!(m.to_line(), ":irc.example.com 001 alice :Welcome");
    }

    #[test]
    fn empty_nick_becomes_star() {
        let m = numeric("irc.example.com", ERR_NOTREGISTERED, "", vec!["You have not registered".to_string()]);
        assert_eq!(m.to_line(), ":irc.example.com 451 * :You have not registered");
    }
}
