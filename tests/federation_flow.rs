//! End-to-end federation scenario (§4.F–§4.I): two linked servers burst each
//! other's pre-existing channel membership, then an ongoing remote JOIN and
//! a remote PRIVMSG each cross the link and land on the other side's local
//! client.

mod common;

use std::time::Duration;

use common::server::PeerLink;
use common::TestServer;
use tokio::time::sleep;

#[tokio::test]
async fn burst_and_ongoing_messages_cross_a_federation_link() {
    let (hub, hub_link_port) = TestServer::spawn_awaiting_link("1AA", "hub.test", "linksekrit").await.unwrap();

    let mut alice = hub.connect("alice").await.unwrap();
    alice.register().await.unwrap();
    alice.join("#room").await.unwrap();
    alice.recv().await.unwrap(); // JOIN echo
    alice.recv().await.unwrap(); // RPL_NOTOPIC
    alice.recv().await.unwrap(); // RPL_NAMREPLY
    alice.recv().await.unwrap(); // RPL_ENDOFNAMES

    let leaf = TestServer::spawn_with_link(
        "2BB",
        "leaf.test",
        "linksekrit",
        PeerLink {
            name: "hub.test".to_string(),
            sid: "1AA".to_string(),
            host: "127.0.0.1".to_string(),
            port: hub_link_port,
            password: "linksekrit".to_string(),
            auto_connect: true,
        },
    )
    .await
    .unwrap();

    // Give the link time to handshake and burst.
    sleep(Duration::from_millis(500)).await;

    let mut bob = leaf.connect("bob").await.unwrap();
    bob.register().await.unwrap();
    bob.join("#room").await.unwrap();
    bob.recv().await.unwrap(); // JOIN echo
    bob.recv().await.unwrap(); // RPL_NOTOPIC

    // Burst already told leaf.test about alice, so bob's NAMES list should
    // carry her even though she never connected to this server.
    let names = bob.recv().await.unwrap();
    let members: std::collections::HashSet<&str> = names.param(3).unwrap().split(' ').collect();
    assert!(members.contains("alice"), "names={:?}", names.param(3));
    bob.recv().await.unwrap(); // RPL_ENDOFNAMES

    // bob's JOIN is an ongoing message that should cross the link back to
    // hub.test and land on alice, who already shares #room with him.
    let seen_by_alice = alice.recv_timeout(Duration::from_secs(10)).await.unwrap();
    assert_eq!(seen_by_alice.command, "JOIN");
    assert_eq!(
        seen_by_alice.source.as_deref().unwrap().split('!').next(),
        Some("bob"),
        "alice should see bob's remote JOIN relayed across the link"
    );

    // alice's PRIVMSG should cross the link the other way and reach bob.
    alice.privmsg("#room", "hello from the hub").await.unwrap();
    let received = bob.recv_timeout(Duration::from_secs(10)).await.unwrap();
    assert_eq!(received.command, "PRIVMSG");
    assert_eq!(received.param(1), Some("hello from the hub"));
    assert_eq!(received.source.as_deref().unwrap().split('!').next(), Some("alice"));
}
