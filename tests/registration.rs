//! End-to-end scenario 1 (§8): the registration handshake.

mod common;

use common::TestServer;
use slircd::proto::response;

#[tokio::test]
async fn registration_happy_path_delivers_welcome_burst_in_order() {
    let server = TestServer::spawn("1AA", "reg.test").await.unwrap();
    let mut alice = server.connect("alice").await.unwrap();

    alice.send_raw("NICK alice").await.unwrap();
    alice.send_raw("USER alice 0 * :Alice Liddell").await.unwrap();

    let expected = [
        response::RPL_WELCOME,
        response::RPL_YOURHOST,
        response::RPL_CREATED,
        response::RPL_MYINFO,
    ];
    for code in expected {
        let msg = alice.recv().await.unwrap();
        assert_eq!(msg.command, code, "expected numeric {code}, got {msg:?}");
    }
}

#[tokio::test]
async fn duplicate_nick_is_rejected() {
    let server = TestServer::spawn("1AA", "reg.test").await.unwrap();

    let mut alice = server.connect("alice").await.unwrap();
    alice.register().await.unwrap();

    let mut second = server.connect("alice-second").await.unwrap();
    second.send_raw("NICK alice").await.unwrap();
    second.send_raw("USER alice 0 * :Someone Else").await.unwrap();

    let msg = second.recv().await.unwrap();
    assert_eq!(msg.command, response::ERR_NICKNAMEINUSE);
}

#[tokio::test]
async fn ping_before_registration_is_answered_with_pong() {
    let server = TestServer::spawn("1AA", "reg.test").await.unwrap();
    let mut client = server.connect("bob").await.unwrap();

    client.send_raw("PING :hello").await.unwrap();
    let msg = client.recv().await.unwrap();
    assert_eq!(msg.command, "PONG");
    assert_eq!(msg.param(1), Some("hello"));
}

#[tokio::test]
async fn commands_before_registration_are_rejected() {
    let server = TestServer::spawn("1AA", "reg.test").await.unwrap();
    let mut client = server.connect("carol").await.unwrap();

    client.send_raw("JOIN #room").await.unwrap();
    let msg = client.recv().await.unwrap();
    assert_eq!(msg.command, response::ERR_NOTREGISTERED);
}
