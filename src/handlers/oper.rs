//! OPER and SQUIT (§4.D).

use crate::error::{HandlerError, HandlerResult, Outcome};
use crate::network::gateway::Daemon;
use crate::proto::{response, Message};
use crate::state::SessionHandle;
use crate::sync::Router;

/// Failed OPER attempts beyond this close the connection (§4.D "brute force
/// guard").
const MAX_OPER_ATTEMPTS: u8 = 3;

pub async fn oper(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    if msg.params.len() < 2 {
        return Err(HandlerError::NeedMoreParams);
    }
    let name = msg.param(0).unwrap();
    let password = msg.param(1).unwrap();

    let block = daemon.config.oper.iter().find(|o| o.name == name);
    let matched = match block {
        Some(b) => daemon.password_verifier.verify(&b.bcrypt_hash, password).await,
        None => false,
    };

    if !matched {
        let attempts = {
            let mut s = session.write();
            s.oper_attempts += 1;
            s.oper_attempts
        };
        if attempts >= MAX_OPER_ATTEMPTS {
            return Ok(Outcome::Quit("Too many failed OPER attempts".to_string()));
        }
        return Err(HandlerError::PasswdMismatch);
    }

    session.write().grant_oper();
    let server = &daemon.config.server.name;
    let nick = session.read().nickname().to_string();
    session
        .read()
        .send(response::numeric(server, response::RPL_YOUREOPER, &nick, vec!["You are now an IRC operator".to_string()]));
    Ok(Outcome::Continue)
}

pub async fn squit(daemon: &Daemon, session: &SessionHandle, msg: &Message) -> HandlerResult {
    if !session.read().is_oper() {
        return Err(HandlerError::NoPrivileges);
    }
    let target_sid_or_name = msg.param(0).ok_or(HandlerError::NeedMoreParams)?;
    let reason = msg.param(1).unwrap_or("SQUIT");

    let sid = daemon
        .network
        .server(target_sid_or_name)
        .map(|_| target_sid_or_name.to_string())
        .unwrap_or_else(|| target_sid_or_name.to_string());

    if let Some(link) = daemon.links.get(&sid) {
        let quit_msg = crate::proto::command::squit(&daemon.network.local_sid().to_string(), &sid, reason);
        let _ = link.write_message(&quit_msg).await;
        link.close().await;
        daemon.links.remove(&sid);
    }

    let removed_users = daemon.network.remove_server(&sid);
    let router = Router::new(&daemon.links, &daemon.network);
    for user in removed_users {
        let quit_msg = Message::new("QUIT", vec![reason.to_string()]).with_source(user.uid);
        router.broadcast_all(Some(&sid), &quit_msg).await;
    }

    Ok(Outcome::Continue)
}
