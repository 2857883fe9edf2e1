mod common;

use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use common::{expect_no_event, next_event, send_json, wait_closed, TestServer};

#[tokio::test]
async fn invalid_token_gets_auth_error_then_close() -> Result<()> {
    let server = TestServer::spawn().await?;
    let mut socket = server.connect().await?;

    send_json(&mut socket, json!({ "type": "AUTH", "token": "not-a-jwt" })).await?;
    next_event(&mut socket, "AUTH_ERROR").await?;
    wait_closed(&mut socket).await?;

    let body = reqwest::get(server.url("/health")).await?.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["connections"], 0);
    Ok(())
}

#[tokio::test]
async fn unauthenticated_socket_times_out() -> Result<()> {
    let server = TestServer::spawn().await?;
    let mut socket = server.connect().await?;

    // auth timeout is 2s in the test server
    tokio::time::timeout(Duration::from_secs(5), wait_closed(&mut socket)).await??;
    Ok(())
}

#[tokio::test]
async fn presence_is_announced_to_peers() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let mut a = server.login(alice, "Alice").await?;
    let b = server.login(bob, "Bob").await?;

    let online = next_event(&mut a, "USER_ONLINE").await?;
    assert_eq!(online["data"]["userId"], json!(bob));

    drop(b);
    let offline = next_event(&mut a, "USER_OFFLINE").await?;
    assert_eq!(offline["data"]["userId"], json!(bob));
    Ok(())
}

#[tokio::test]
async fn message_is_delivered_and_read() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let mut a = server.login(alice, "Alice").await?;
    let mut b = server.login(bob, "Bob").await?;

    send_json(&mut a, json!({ "type": "SEND_MESSAGE", "receiverId": bob, "text": "  hi bob  " })).await?;

    let received = next_event(&mut b, "NEW_MESSAGE").await?;
    assert_eq!(received["data"]["text"], "hi bob");
    assert_eq!(received["data"]["sender"], json!(alice));
    assert_eq!(received["data"]["read"], false);
    let message_id = received["data"]["id"].clone();
    let conversation_id = received["data"]["conversationId"].clone();

    let echoed = next_event(&mut a, "NEW_MESSAGE").await?;
    assert_eq!(echoed["data"]["id"], message_id);

    let delivered = next_event(&mut a, "MESSAGE_DELIVERED").await?;
    assert_eq!(delivered["data"]["messageId"], message_id);

    let update = next_event(&mut b, "CONVERSATION_UPDATE").await?;
    assert_eq!(update["data"]["conversationId"], conversation_id);
    assert_eq!(update["data"]["lastMessage"], "hi bob");

    send_json(&mut b, json!({ "type": "READ_MESSAGE", "conversationId": conversation_id })).await?;
    let read = next_event(&mut a, "MESSAGE_READ").await?;
    assert_eq!(read["data"]["messageId"], message_id);

    // Reading again flips nothing, so no second receipt
    send_json(&mut b, json!({ "type": "READ_MESSAGE", "conversationId": conversation_id })).await?;
    expect_no_event(&mut a, "MESSAGE_READ", Duration::from_millis(300)).await?;
    Ok(())
}

#[tokio::test]
async fn offline_receiver_gets_no_delivery_receipt() -> Result<()> {
    let server = TestServer::spawn().await?;
    let alice = Uuid::new_v4();
    let mut a = server.login(alice, "Alice").await?;

    send_json(&mut a, json!({ "type": "SEND_MESSAGE", "receiverId": Uuid::new_v4(), "text": "later" })).await?;
    next_event(&mut a, "NEW_MESSAGE").await?;
    next_event(&mut a, "CONVERSATION_UPDATE").await?;
    expect_no_event(&mut a, "MESSAGE_DELIVERED", Duration::from_millis(300)).await?;
    assert_eq!(server.store.conversation_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn typing_indicators_reach_only_the_receiver() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let mut a = server.login(alice, "Alice").await?;
    let mut b = server.login(bob, "Bob").await?;
    let mut c = server.login(carol, "Carol").await?;

    send_json(&mut a, json!({ "type": "TYPING_START", "receiverId": bob })).await?;
    let started = next_event(&mut b, "TYPING_START").await?;
    assert_eq!(started["data"]["userId"], json!(alice));

    send_json(&mut a, json!({ "type": "TYPING_STOP", "receiverId": bob })).await?;
    next_event(&mut b, "TYPING_STOP").await?;

    expect_no_event(&mut c, "TYPING_START", Duration::from_millis(300)).await?;
    Ok(())
}

#[tokio::test]
async fn frames_before_auth_are_ignored() -> Result<()> {
    let server = TestServer::spawn().await?;
    let bob = Uuid::new_v4();
    let mut b = server.login(bob, "Bob").await?;

    let mut anon = server.connect().await?;
    send_json(&mut anon, json!({ "type": "SEND_MESSAGE", "receiverId": bob, "text": "sneaky" })).await?;
    send_json(&mut anon, json!({ "type": "NOT_A_THING" })).await?;

    expect_no_event(&mut b, "NEW_MESSAGE", Duration::from_millis(300)).await?;
    assert_eq!(server.store.conversation_count().await, 0);
    Ok(())
}
