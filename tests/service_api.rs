//! HTTP edge tests: evaluation, auth events, and the admin API.

use std::collections::BTreeMap;
use std::net::IpAddr;

use vigil::pipeline::{Evaluation, RequestContext, Verdict};

mod common;

fn ip(last: u8) -> IpAddr {
    IpAddr::from([198, 51, 100, last])
}

fn evaluate_body(source: IpAddr, fields: &[(&str, &str)]) -> RequestContext {
    let mut ctx = RequestContext::new(source, "/search");
    ctx.fields = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>();
    ctx
}

#[tokio::test]
async fn test_evaluate_roundtrip() {
    let (addr, _fixture) = common::spawn_server(|_| {}).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/v1/evaluate");

    // Benign query allows.
    let res = client
        .post(&url)
        .json(&evaluate_body(ip(1), &[("q", "wireless mouse")]))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let outcome: Evaluation = res.json().await.unwrap();
    assert_eq!(outcome.verdict, Verdict::Allow);

    // Injection payload blocks with a generic reason only.
    let res = client
        .post(&url)
        .json(&evaluate_body(ip(2), &[("q", "' OR '1'='1")]))
        .send()
        .await
        .unwrap();
    let outcome: Evaluation = res.json().await.unwrap();
    assert_eq!(outcome.verdict, Verdict::Block);
    assert_eq!(outcome.status, Some(403));
    let reason = outcome.reason.unwrap();
    assert!(!reason.contains("sql"), "detector internals leaked: {reason}");
}

#[tokio::test]
async fn test_auth_events_feed_the_counters() {
    let (addr, fixture) = common::spawn_server(|_| {}).await;
    let client = reqwest::Client::new();
    let source = ip(3);

    for _ in 0..6 {
        let res = client
            .post(format!("http://{addr}/v1/events/auth"))
            .json(&serde_json::json!({
                "source_ip": source,
                "account_id": "victim",
                "success": false
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 202);
    }

    // Six failures are visible to the scorer but under the threshold.
    let mut ctx = RequestContext::new(source, "/login");
    ctx.auth_sensitive = true;
    assert_eq!(fixture.engine.evaluate(&ctx).verdict, Verdict::Allow);

    // A success with no account id is rejected.
    let res = client
        .post(format!("http://{addr}/v1/events/auth"))
        .json(&serde_json::json!({ "source_ip": source, "success": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 422);
}

#[tokio::test]
async fn test_admin_requires_bearer_token() {
    let (addr, _fixture) = common::spawn_server(|cfg| {
        cfg.admin.enabled = true;
        cfg.admin.api_key = "test-key".to_string();
    })
    .await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("http://{addr}/admin/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);

    let res = client
        .get(format!("http://{addr}/admin/status"))
        .bearer_auth("wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);

    let res = client
        .get(format!("http://{addr}/admin/status"))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let status: serde_json::Value = res.json().await.unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["emergency_mode"], false);
}

#[tokio::test]
async fn test_admin_blacklist_drives_the_admission_gate() {
    let (addr, fixture) = common::spawn_server(|cfg| {
        cfg.admin.enabled = true;
        cfg.admin.api_key = "test-key".to_string();
    })
    .await;
    let client = reqwest::Client::new();
    let source = ip(4);

    let res = client
        .post(format!("http://{addr}/admin/blacklist"))
        .bearer_auth("test-key")
        .json(&serde_json::json!({ "ip": source, "reason": "scripted abuse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);

    // Blacklisted source is rejected before any detector runs.
    let res = client
        .post(format!("http://{addr}/v1/evaluate"))
        .json(&evaluate_body(source, &[]))
        .send()
        .await
        .unwrap();
    let outcome: Evaluation = res.json().await.unwrap();
    assert_eq!(outcome.verdict, Verdict::Block);

    // Unblock lifts it again.
    let res = client
        .delete(format!("http://{addr}/admin/blocks/{source}"))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 204);
    assert!(!fixture.engine.reputation().is_blocked(source));
}

#[tokio::test]
async fn test_incident_lifecycle_over_the_admin_api() {
    let (addr, fixture) = common::spawn_server(|cfg| {
        cfg.admin.enabled = true;
        cfg.admin.api_key = "test-key".to_string();
    })
    .await;
    let client = reqwest::Client::new();

    // Trigger a critical detection to raise an incident.
    fixture
        .engine
        .evaluate(&evaluate_body(ip(5), &[("q", "'; DROP TABLE users --")]));

    let res = client
        .get(format!("http://{addr}/admin/incidents"))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap();
    let incidents: serde_json::Value = res.json().await.unwrap();
    let list = incidents.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["status"], "open");
    let id = list[0]["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("http://{addr}/admin/incidents/{id}/status"))
        .bearer_auth("test-key")
        .json(&serde_json::json!({ "status": "resolved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 204);

    let res = client
        .get(format!("http://{addr}/admin/incidents"))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap();
    let incidents: serde_json::Value = res.json().await.unwrap();
    assert_eq!(incidents[0]["status"], "resolved");
}
