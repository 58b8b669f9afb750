//! Webhook endpoints over a real socket, with fake collaborators behind
//! the pipeline.

mod common;

use std::net::SocketAddr;

use common::*;
use informant_amp::server::router;
use serde_json::Value;

async fn spawn(h: &Harness) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(h.pipeline.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn post(addr: SocketAddr, path: &str, body: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://{}{}", addr, path))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let addr = spawn(&h).await;

    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_update_success_body() {
    let h = harness();
    let addr = spawn(&h).await;

    let (status, body) = post(addr, "/reports/update", r#"{"id": 696}"#).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["url"], format!("{}/{}", ORIGIN, CANONICAL_KEY));
    assert_eq!(body["sitemap_key"], "2018/5/sitemap.xml");
    assert_eq!(body["validation"]["status"], "PASS");
    assert!(h.store.object(CANONICAL_KEY).is_some());
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let h = harness();
    let addr = spawn(&h).await;

    let (status, body) = post(addr, "/reports/update", "{id: 696").await;

    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "Invalid JSON payload");
}

#[tokio::test]
async fn test_missing_id_is_bad_request() {
    let h = harness();
    let addr = spawn(&h).await;

    let (status, body) = post(addr, "/reports/update", "{}").await;

    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "ID is missing");
}

#[tokio::test]
async fn test_cms_outage_is_bad_gateway() {
    let h = harness();
    h.cms.set_down(true);
    let addr = spawn(&h).await;

    let (status, body) = post(addr, "/reports/update", r#"{"id": 696}"#).await;

    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "upstream");
}

#[tokio::test]
async fn test_delete_flow() {
    let h = harness();
    let addr = spawn(&h).await;
    let payload = format!(r#"{{"id": 696, "created": "{}"}}"#, CREATED);

    post(addr, "/reports/update", r#"{"id": 696}"#).await;

    let (status, body) = post(addr, "/reports/delete", &payload).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    h.cms.remove("696");
    let (status, body) = post(addr, "/reports/delete", &payload).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["sitemap_deleted"], true);
    assert!(h.store.keys().is_empty());
}
