//! Routes outbound federation traffic across peer links (§4.I).
//!
//! Three patterns: point-to-point to a UID's home server, direct fanout to
//! one SID, and channel fanout to the distinct set of home SIDs represented
//! among a channel's remote members.

use std::collections::HashSet;

use super::link::LinkRegistry;
use super::network::Network;
use crate::proto::Message;

#[derive(Debug, Default)]
pub struct RouteErrors {
    pub failures: Vec<(String, std::io::Error)>,
}

impl RouteErrors {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Router<'a> {
    links: &'a LinkRegistry,
    network: &'a Network,
}

impl<'a> Router<'a> {
    pub fn new(links: &'a LinkRegistry, network: &'a Network) -> Self {
        Self { links, network }
    }

    /// Look up the user's home SID, look up the link, write (§4.I pattern
    /// 1). No-op (not an error) if the UID is unknown or its home server
    /// has no live link — both are routine ("user just left", "link just
    /// dropped") rather than bugs.
    pub async fn send_to_uid(&self, uid: &str, msg: &Message) {
        let Some(user) = self.network.user(uid) else {
            return;
        };
        if let Some(link) = self.links.get(&user.home_sid) {
            let _ = link.write_message(msg).await;
        }
    }

    /// Direct lookup and write (§4.I pattern 2).
    pub async fn send_to_sid(&self, sid: &str, msg: &Message) {
        if let Some(link) = self.links.get(sid) {
            let _ = link.write_message(msg).await;
        }
    }

    /// Compute the distinct home SIDs across the channel's remote members,
    /// excluding `exclude_sid`, and write to each (§4.I pattern 3). Errors
    /// from individual sends are accumulated and reported as a composite;
    /// they do not abort the fanout.
    pub async fn fanout_channel(&self, channel: &str, exclude_sid: Option<&str>, msg: &Message) -> RouteErrors {
        let mut errors = RouteErrors::default();
        let Some(chan) = self.network.channel(channel) else {
            return errors;
        };
        let mut sids = HashSet::new();
        for uid in chan.members.keys() {
            if uid.len() >= 3 {
                sids.insert(uid[..3].to_string());
            }
        }
        if let Some(exclude) = exclude_sid {
            sids.remove(exclude);
        }
        for sid in sids {
            if let Some(link) = self.links.get(&sid) {
                if let Err(e) = link.write_message(msg).await {
                    errors.failures.push((sid, e));
                }
            }
        }
        errors
    }

    /// Broadcast to every live link except `exclude_sid`.
    pub async fn broadcast_all(&self, exclude_sid: Option<&str>, msg: &Message) -> RouteErrors {
        let mut errors = RouteErrors::default();
        for link in self.links.all() {
            if Some(link.peer_sid.as_str()) == exclude_sid {
                continue;
            }
            if let Err(e) = link.write_message(msg).await {
                errors.failures.push((link.peer_sid.clone(), e));
            }
        }
        errors
    }
}
