//! End-to-end scenario 3 (§8): channel moderation — op/voice/ban modes, TOPIC,
//! and KICK, including the operator-privilege errors guarding each.

mod common;

use common::TestServer;
use slircd::proto::response;

#[tokio::test]
async fn first_joiner_is_op_and_can_set_modes_topic_and_kick() {
    let server = TestServer::spawn("1AA", "mod.test").await.unwrap();

    let mut alice = server.connect("alice").await.unwrap();
    alice.register().await.unwrap();
    alice.join("#room").await.unwrap();
    alice.recv().await.unwrap(); // JOIN echo
    alice.recv().await.unwrap(); // RPL_NOTOPIC
    alice.recv().await.unwrap(); // RPL_NAMREPLY
    alice.recv().await.unwrap(); // RPL_ENDOFNAMES

    let mut bob = server.connect("bob").await.unwrap();
    bob.register().await.unwrap();
    bob.join("#room").await.unwrap();
    bob.recv().await.unwrap(); // JOIN echo
    bob.recv().await.unwrap(); // RPL_NOTOPIC
    bob.recv().await.unwrap(); // RPL_NAMREPLY
    bob.recv().await.unwrap(); // RPL_ENDOFNAMES
    alice.recv().await.unwrap(); // alice sees bob's JOIN

    // alice (the channel's first joiner) grants bob voice.
    alice.send_raw("MODE #room +v bob").await.unwrap();
    let mode_echo = alice.recv().await.unwrap();
    assert_eq!(mode_echo.command, "MODE");
    assert_eq!(mode_echo.param(1), Some("+v"));
    let seen_by_bob = bob.recv().await.unwrap();
    assert_eq!(seen_by_bob.command, "MODE");

    // Topic change is broadcast to every member.
    alice.send_raw("TOPIC #room :welcome to the room").await.unwrap();
    let topic_echo = alice.recv().await.unwrap();
    assert_eq!(topic_echo.command, "TOPIC");
    let topic_for_bob = bob.recv().await.unwrap();
    assert_eq!(topic_for_bob.command, "TOPIC");
    assert_eq!(topic_for_bob.param(1), Some("welcome to the room"));

    // A fresh joiner now sees the topic alice set, not RPL_NOTOPIC.
    let mut carol = server.connect("carol").await.unwrap();
    carol.register().await.unwrap();
    carol.join("#room").await.unwrap();
    carol.recv().await.unwrap(); // JOIN echo
    let rpl_topic = carol.recv().await.unwrap();
    assert_eq!(rpl_topic.command, response::RPL_TOPIC);
    assert_eq!(rpl_topic.param(1), Some("welcome to the room"));
    alice.recv().await.unwrap(); // alice sees carol's JOIN
    bob.recv().await.unwrap(); // bob sees carol's JOIN

    // bob has no operator privileges and can't kick carol.
    bob.send_raw("KICK #room carol :scram").await.unwrap();
    let denied = bob.recv().await.unwrap();
    assert_eq!(denied.command, response::ERR_CHANOPRIVSNEEDED);

    // alice can.
    alice.send_raw("KICK #room carol :scram").await.unwrap();
    let kick_echo = alice.recv().await.unwrap();
    assert_eq!(kick_echo.command, "KICK");
    assert_eq!(kick_echo.param(1), Some("carol"));
    let kick_for_bob = bob.recv().await.unwrap();
    assert_eq!(kick_for_bob.command, "KICK");

    carol.send_raw("PING :gone").await.unwrap();
    let after_kick = carol.recv().await.unwrap();
    assert_eq!(after_kick.command, "PONG", "carol is still connected, just no longer on #room");
}

#[tokio::test]
async fn ban_mask_blocks_matching_join() {
    let server = TestServer::spawn("1AA", "mod.test").await.unwrap();

    let mut alice = server.connect("alice").await.unwrap();
    alice.register().await.unwrap();
    alice.join("#banned").await.unwrap();
    alice.recv().await.unwrap();
    alice.recv().await.unwrap();
    alice.recv().await.unwrap();
    alice.recv().await.unwrap();

    alice.send_raw("MODE #banned +b bob!bob@127.0.0.1").await.unwrap();
    let mode_echo = alice.recv().await.unwrap();
    assert_eq!(mode_echo.command, "MODE");
    assert_eq!(mode_echo.param(1), Some("+b"));

    let mut bob = server.connect("bob").await.unwrap();
    bob.register().await.unwrap();
    bob.join("#banned").await.unwrap();
    let denied = bob.recv().await.unwrap();
    assert_eq!(denied.command, response::ERR_BANNEDFROMCHAN);
}
