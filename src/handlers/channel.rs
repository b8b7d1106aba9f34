//! JOIN, PART, TOPIC, channel MODE, KICK, INVITE, NAMES, LIST (§4.D, §4.C).

use crate::error::{ChannelError, HandlerError, HandlerResult, Outcome};
use crate::network::gateway::Daemon;
use crate::proto::{command, response, Message};
use crate::state::SessionHandle;
use crate::sync::Router;

fn is_channel_name(name: &str) -> bool {
    (name.starts_with('#') || name.starts_with('&')) && name.len() > 1 && !name.contains(' ') && !name.contains(',')
}

pub async fn join(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let target = msg.param(0).ok_or(HandlerError::NeedMoreParams)?;
    let key = msg.param(1);

    for name in target.split(',') {
        if !is_channel_name(name) {
            return Err(HandlerError::NoSuchChannel(name.to_string()));
        }

        let (nick, hostmask) = {
            let s = session.read();
            (s.nickname().to_string(), s.hostmask())
        };

        let chan = daemon.channels.create_channel(name);
        {
            let c = chan.read();
            if c.is_banned(&hostmask) {
                return Err(HandlerError::Channel(ChannelError::BannedFromChan(name.to_string())));
            }
            if c.has_mode('i') {
                return Err(HandlerError::Channel(ChannelError::InviteOnlyChan(name.to_string())));
            }
            if !c.check_key(key) {
                return Err(HandlerError::Channel(ChannelError::BadChannelKey(name.to_string())));
            }
        }

        let join_msg = command::join(&hostmask, name);
        {
            let mut c = chan.write();
            c.add_member(&nick, session.clone());
            c.broadcast_all(&join_msg);
        }
        session.write().join_channel(name);

        send_topic_and_names(daemon, session, name, &chan);

        let router = Router::new(&daemon.links, &daemon.network);
        router.fanout_channel(name, None, &join_msg).await;
    }

    Ok(Outcome::Continue)
}

/// Decorated nicknames for a channel's remote members, read from the
/// federation mirror (§4.D NAMES "merge in remote members from federation
/// state if present"). Burst/SJOIN only ever populates `daemon.network`'s
/// `RemoteChannel`, never the local `Channel`'s own member list, so NAMES
/// has to consult both sides to see federated members.
fn remote_member_nicks(daemon: &Daemon, name: &str) -> Vec<String> {
    let Some(remote_chan) = daemon.network.channel(name) else {
        return Vec::new();
    };
    remote_chan
        .members
        .iter()
        .filter_map(|(uid, prefix)| daemon.network.user(uid).map(|u| format!("{prefix}{}", u.nick)))
        .collect()
}

fn send_topic_and_names(
    daemon: &Daemon,
    session: &SessionHandle,
    name: &str,
    chan: &crate::state::channel::ChannelHandle,
) {
    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();
    let c = chan.read();

    if let Some((text, _)) = c.topic() {
        session
            .read()
            .send(response::numeric(server, response::RPL_TOPIC, &nick, vec![name.to_string(), text.clone()]));
    } else {
        session
            .read()
            .send(response::numeric(server, response::RPL_NOTOPIC, &nick, vec![name.to_string(), "No topic is set".to_string()]));
    }

    let mut names = c.member_nicks();
    names.extend(remote_member_nicks(daemon, name));
    session.read().send(response::numeric(
        server,
        response::RPL_NAMREPLY,
        &nick,
        vec!["=".to_string(), name.to_string(), names.join(" ")],
    ));
    session.read().send(response::numeric(
        server,
        response::RPL_ENDOFNAMES,
        &nick,
        vec![name.to_string(), "End of /NAMES list".to_string()],
    ));
}

pub async fn part(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let target = msg.param(0).ok_or(HandlerError::NeedMoreParams)?;
    let reason = msg.param(1);

    for name in target.split(',') {
        let nick = session.read().nickname().to_string();
        let Some(chan) = daemon.channels.get(name) else {
            return Err(HandlerError::NoSuchChannel(name.to_string()));
        };
        if !chan.read().is_member(&nick) {
            return Err(HandlerError::Channel(ChannelError::NotOnChannel(name.to_string())));
        }

        let hostmask = session.read().hostmask();
        let part_msg = command::part(&hostmask, name, reason);
        let should_delete = {
            let mut c = chan.write();
            c.broadcast_all(&part_msg);
            c.remove_member(&nick);
            c.is_empty()
        };
        session.write().part_channel(name);
        if should_delete {
            daemon.channels.remove(name);
        }

        let router = Router::new(&daemon.links, &daemon.network);
        router.fanout_channel(name, None, &part_msg).await;
    }

    Ok(Outcome::Continue)
}

pub async fn topic(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let name = msg.param(0).ok_or(HandlerError::NeedMoreParams)?;
    let Some(chan) = daemon.channels.get(name) else {
        return Err(HandlerError::NoSuchChannel(name.to_string()));
    };
    let nick = session.read().nickname().to_string();

    if !chan.read().is_member(&nick) {
        return Err(HandlerError::Channel(ChannelError::NotOnChannel(name.to_string())));
    }

    match msg.param(1) {
        None => {
            let server = &daemon.config.server.name;
            let c = chan.read();
            if let Some((text, _)) = c.topic() {
                session.read().send(response::numeric(
                    server,
                    response::RPL_TOPIC,
                    &nick,
                    vec![name.to_string(), text.clone()],
                ));
            } else {
                session.read().send(response::numeric(
                    server,
                    response::RPL_NOTOPIC,
                    &nick,
                    vec![name.to_string(), "No topic is set".to_string()],
                ));
            }
            Ok(Outcome::Continue)
        }
        Some(new_topic) => {
            {
                let c = chan.read();
                if c.has_mode('t') && !c.is_operator(&nick) {
                    return Err(HandlerError::Channel(ChannelError::ChanOpPrivsNeeded(name.to_string())));
                }
            }
            let hostmask = session.read().hostmask();
            let topic_msg = command::topic(&hostmask, name, new_topic);
            {
                let mut c = chan.write();
                c.set_topic(new_topic, nick.clone());
                c.broadcast_all(&topic_msg);
            }
            let router = Router::new(&daemon.links, &daemon.network);
            router.fanout_channel(name, None, &topic_msg).await;
            Ok(Outcome::Continue)
        }
    }
}

pub async fn mode(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let target = msg.param(0).ok_or(HandlerError::NeedMoreParams)?;
    if !(target.starts_with('#') || target.starts_with('&')) {
        return super::user::user_mode(daemon, session, msg).await;
    }

    let Some(chan) = daemon.channels.get(target) else {
        return Err(HandlerError::NoSuchChannel(target.to_string()));
    };
    let nick = session.read().nickname().to_string();

    let Some(change) = msg.param(1) else {
        let server = &daemon.config.server.name;
        let c = chan.read();
        session.read().send(response::numeric(
            server,
            response::RPL_CHANNELMODEIS,
            &nick,
            vec![target.to_string(), c.modes_string()],
        ));
        return Ok(Outcome::Continue);
    };

    if !chan.read().is_operator(&nick) {
        return Err(HandlerError::Channel(ChannelError::ChanOpPrivsNeeded(target.to_string())));
    }

    let mut adding = true;
    let mut arg_index = 2;
    let mut applied_args: Vec<String> = Vec::new();
    let mut c = chan.write();

    for ch in change.chars() {
        match ch {
            '+' => adding = true,
            '-' => adding = false,
            'b' => {
                if adding {
                    if let Some(mask) = msg.param(arg_index) {
                        c.add_ban(mask);
                        applied_args.push(mask.to_string());
                        arg_index += 1;
                    }
                } else if let Some(mask) = msg.param(arg_index) {
                    c.remove_ban(mask);
                    applied_args.push(mask.to_string());
                    arg_index += 1;
                }
            }
            'k' => {
                if adding {
                    if let Some(key) = msg.param(arg_index) {
                        c.set_key(Some(key.to_string()));
                        applied_args.push(key.to_string());
                        arg_index += 1;
                    }
                } else {
                    c.set_key(None);
                }
            }
            'o' | 'v' => {
                if let Some(who) = msg.param(arg_index) {
                    if !c.is_member(who) {
                        return Err(HandlerError::Channel(ChannelError::UserNotInChannel(
                            who.to_string(),
                            target.to_string(),
                        )));
                    }
                    if ch == 'o' {
                        c.set_operator(who, adding);
                    } else {
                        c.set_voice(who, adding);
                    }
                    applied_args.push(who.to_string());
                    arg_index += 1;
                }
            }
            other => {
                c.set_mode(other, adding)
                    .map_err(HandlerError::Channel)?;
            }
        }
    }

    let hostmask = session.read().hostmask();
    let mode_msg = command::mode(
        &hostmask,
        target,
        change,
        &applied_args.iter().map(String::as_str).collect::<Vec<_>>(),
    );
    c.broadcast_all(&mode_msg);
    drop(c);

    let router = Router::new(&daemon.links, &daemon.network);
    router.fanout_channel(target, None, &mode_msg).await;

    Ok(Outcome::Continue)
}

pub async fn kick(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    if msg.params.len() < 2 {
        return Err(HandlerError::NeedMoreParams);
    }
    let name = msg.param(0).unwrap();
    let target_nick = msg.param(1).unwrap();
    let reason = msg.param(2).unwrap_or(target_nick);

    let Some(chan) = daemon.channels.get(name) else {
        return Err(HandlerError::NoSuchChannel(name.to_string()));
    };
    let nick = session.read().nickname().to_string();

    if !chan.read().is_operator(&nick) {
        return Err(HandlerError::Channel(ChannelError::ChanOpPrivsNeeded(name.to_string())));
    }
    if !chan.read().is_member(target_nick) {
        return Err(HandlerError::Channel(ChannelError::UserNotInChannel(
            target_nick.to_string(),
            name.to_string(),
        )));
    }

    let hostmask = session.read().hostmask();
    let kick_msg = command::kick(&hostmask, name, target_nick, reason);
    let target_session = daemon.clients.get(target_nick);

    let should_delete = {
        let mut c = chan.write();
        c.broadcast_all(&kick_msg);
        c.remove_member(target_nick);
        c.is_empty()
    };
    if let Some(target) = target_session {
        target.write().part_channel(name);
    }
    if should_delete {
        daemon.channels.remove(name);
    }

    let router = Router::new(&daemon.links, &daemon.network);
    router.fanout_channel(name, None, &kick_msg).await;

    Ok(Outcome::Continue)
}

pub async fn invite(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    if msg.params.len() < 2 {
        return Err(HandlerError::NeedMoreParams);
    }
    let target_nick = msg.param(0).unwrap();
    let channel_name = msg.param(1).unwrap();

    let local_target = daemon.clients.get(target_nick);
    let remote_target = if local_target.is_none() {
        daemon.network.user_by_nick(target_nick)
    } else {
        None
    };
    if local_target.is_none() && remote_target.is_none() {
        return Err(HandlerError::NoSuchNick(target_nick.to_string()));
    }

    if let Some(chan) = daemon.channels.get(channel_name) {
        let nick = session.read().nickname().to_string();
        let c = chan.read();
        if !c.is_member(&nick) {
            return Err(HandlerError::Channel(ChannelError::NotOnChannel(channel_name.to_string())));
        }
        if c.has_mode('i') && !c.is_operator(&nick) {
            return Err(HandlerError::Channel(ChannelError::ChanOpPrivsNeeded(channel_name.to_string())));
        }
        if c.is_member(target_nick) {
            return Err(HandlerError::Channel(ChannelError::UserOnChannel(
                target_nick.to_string(),
                channel_name.to_string(),
            )));
        }
    }

    let hostmask = session.read().hostmask();
    let invite_msg = command::invite(&hostmask, target_nick, channel_name);
    if let Some(target) = &local_target {
        target.read().send(invite_msg.clone());
    } else if let Some(remote) = &remote_target {
        let router = Router::new(&daemon.links, &daemon.network);
        router.send_to_uid(&remote.uid, &invite_msg).await;
    }

    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();
    session.read().send(response::numeric(
        server,
        response::RPL_INVITING,
        &nick,
        vec![target_nick.to_string(), channel_name.to_string()],
    ));

    Ok(Outcome::Continue)
}

pub async fn names(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();
    let targets = msg.param(0).map(|s| s.split(',').map(str::to_string).collect()).unwrap_or_else(|| daemon.channels.names());

    for name in targets {
        if let Some(chan) = daemon.channels.get(&name) {
            let mut names = chan.read().member_nicks();
            names.extend(remote_member_nicks(daemon, &name));
            session.read().send(response::numeric(
                server,
                response::RPL_NAMREPLY,
                &nick,
                vec!["=".to_string(), name.clone(), names.join(" ")],
            ));
        }
    }
    session.read().send(response::numeric(
        server,
        response::RPL_ENDOFNAMES,
        &nick,
        vec!["*".to_string(), "End of /NAMES list".to_string()],
    ));
    Ok(Outcome::Continue)
}

pub async fn list(daemon: &Daemon, session: &SessionHandle, _msg: &Message) -> HandlerResult {
    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();

    session.read().send(response::numeric(server, response::RPL_LISTSTART, &nick, vec!["Channel".to_string(), "Users  Name".to_string()]));
    for name in daemon.channels.names() {
        if let Some(chan) = daemon.channels.get(&name) {
            let c = chan.read();
            let topic = c.topic().map(|(t, _)| t.clone()).unwrap_or_default();
            session.read().send(response::numeric(
                server,
                response::RPL_LIST,
                &nick,
                vec![name.clone(), c.member_count().to_string(), topic],
            ));
        }
    }
    session.read().send(response::numeric(server, response::RPL_LISTEND, &nick, vec!["End of /LIST".to_string()]));
    Ok(Outcome::Continue)
}
