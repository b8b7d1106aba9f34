//! End-to-end scenario 2 (§8): channel creation, JOIN burst, and PRIVMSG
//! fanout excluding the sender.

mod common;

use common::TestServer;
use slircd::proto::response;

#[tokio::test]
async fn join_creates_channel_and_broadcasts_to_members() {
    let server = TestServer::spawn("1AA", "chan.test").await.unwrap();

    let mut alice = server.connect("alice").await.unwrap();
    alice.register().await.unwrap();
    alice.join("#room").await.unwrap();

    let join_echo = alice.recv().await.unwrap();
    assert_eq!(join_echo.command, "JOIN");
    assert_eq!(join_echo.param(0), Some("#room"));

    let notopic = alice.recv().await.unwrap();
    assert_eq!(notopic.command, response::RPL_NOTOPIC);

    let names = alice.recv().await.unwrap();
    assert_eq!(names.command, response::RPL_NAMREPLY);
    assert_eq!(names.param(3), Some("@alice"));

    let endofnames = alice.recv().await.unwrap();
    assert_eq!(endofnames.command, response::RPL_ENDOFNAMES);

    let mut bob = server.connect("bob").await.unwrap();
    bob.register().await.unwrap();
    bob.join("#room").await.unwrap();

    // alice sees bob's JOIN.
    let seen_by_alice = alice.recv().await.unwrap();
    assert_eq!(seen_by_alice.command, "JOIN");
    assert_eq!(seen_by_alice.source.as_deref().unwrap().split('!').next(), Some("bob"));

    // bob's own NAMES list carries both nicks, alice decorated as operator.
    let _join_echo = bob.recv().await.unwrap();
    let _notopic = bob.recv().await.unwrap();
    let names = bob.recv().await.unwrap();
    let members: std::collections::HashSet<&str> = names.param(3).unwrap().split(' ').collect();
    assert!(members.contains("@alice"));
    assert!(members.contains("bob"));

    // alice: PRIVMSG #room :hi -- bob receives it, alice does not echo.
    alice.privmsg("#room", "hi").await.unwrap();
    let received = bob.recv().await.unwrap();
    assert_eq!(received.command, "PRIVMSG");
    assert_eq!(received.param(1), Some("hi"));

    alice.send_raw("PING :echo-check").await.unwrap();
    let next = alice.recv().await.unwrap();
    assert_eq!(next.command, "PONG", "alice must not have received her own PRIVMSG");
}

#[tokio::test]
async fn part_removes_member_and_empty_channel_is_dropped() {
    let server = TestServer::spawn("1AA", "chan.test").await.unwrap();
    let mut alice = server.connect("alice").await.unwrap();
    alice.register().await.unwrap();
    alice.join("#temp").await.unwrap();
    alice.recv().await.unwrap();
    alice.recv().await.unwrap();
    alice.recv().await.unwrap();
    alice.recv().await.unwrap();

    alice.send_raw("PART #temp :leaving").await.unwrap();
    let part = alice.recv().await.unwrap();
    assert_eq!(part.command, "PART");

    let mut bob = server.connect("bob").await.unwrap();
    bob.register().await.unwrap();
    bob.send_raw("JOIN #temp").await.unwrap();
    let join_echo = bob.recv().await.unwrap();
    assert_eq!(join_echo.command, "JOIN");
    let notopic = bob.recv().await.unwrap();
    assert_eq!(notopic.command, response::RPL_NOTOPIC, "a fresh channel has no topic, confirming #temp was recreated empty");
}
