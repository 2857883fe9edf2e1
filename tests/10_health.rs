mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let res = reqwest::get(server.url("/health")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], "ok");
    assert_eq!(body["data"]["connections"], 0);
    Ok(())
}

#[tokio::test]
async fn health_counts_authenticated_sockets() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let _socket = server.login(uuid::Uuid::new_v4(), "Asha").await?;

    let body = reqwest::get(server.url("/health")).await?.json::<Value>().await?;
    assert_eq!(body["data"]["connections"], 1);
    assert_eq!(body["data"]["onlineUsers"], 1);
    Ok(())
}

#[tokio::test]
async fn root_describes_service() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let body = reqwest::get(server.url("/")).await?.json::<Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Admin Realtime");
    assert!(body["data"]["endpoints"]["socket"].is_string());
    Ok(())
}
