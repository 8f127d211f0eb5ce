//! The HTTP server over loopback TCP.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use burner_common::Signal;
use burner_store::{Mailbox, MemoryMailbox};
use burner_web::{AliasGenerator, AppState, WebConfig, WebServer};
use chrono::Utc;
use tokio::sync::broadcast;

#[tokio::test]
async fn serves_until_shutdown() {
    let config = WebConfig {
        listen: "127.0.0.1:0".to_string(),
        random_alias: true,
        ..WebConfig::default()
    };
    let state = AppState {
        mailbox: Mailbox::new(Arc::new(MemoryMailbox::new(NonZeroUsize::MIN))),
        domain: "burner.test".to_string(),
        started_at: Utc::now(),
        retention_hours: 4,
        aliases: AliasGenerator::new(config.random_alias),
    };

    let server = WebServer::new(&config, state).await.expect("bind");
    let address = server.local_addr().unwrap();
    let (shutdown, receiver) = broadcast::channel(1);
    let handle = tokio::spawn(server.serve(receiver));

    let response = reqwest::get(format!("http://{address}/api/stats"))
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let stats: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(stats["processed"], 0);
    assert_eq!(stats["domain"], "burner.test");
    assert_eq!(stats["retention_hours"], 4);

    let alias: serde_json::Value = reqwest::get(format!("http://{address}/api/alias"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");
    assert_ne!(alias["alias"], "alias");

    shutdown.send(Signal::Shutdown).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = WebConfig {
        listen: taken.local_addr().unwrap().to_string(),
        ..WebConfig::default()
    };
    let state = AppState {
        mailbox: Mailbox::new(Arc::new(MemoryMailbox::new(NonZeroUsize::MIN))),
        domain: "burner.test".to_string(),
        started_at: Utc::now(),
        retention_hours: 4,
        aliases: AliasGenerator::default(),
    };

    let Err(err) = WebServer::new(&config, state).await else {
        panic!("second bind should fail");
    };
    assert!(err.to_string().starts_with("Failed to bind HTTP server to"));
}
