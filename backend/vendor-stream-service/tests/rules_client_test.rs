// Integration tests for the rules endpoint client

use serde_json::json;
use std::sync::Arc;
use vendor_stream::error::SyncStage;
use vendor_stream::models::Rule;
use vendor_stream::rules::{RuleEndpoint, RuleSynchronizer, RulesClient};
use vendor_stream::BearerToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RULES_PATH: &str = "/2/tweets/search/stream/rules";

fn client(server: &MockServer) -> RulesClient {
    RulesClient::new(
        reqwest::Client::new(),
        &server.uri(),
        BearerToken::new("test-token"),
    )
}

fn vendor_rule() -> Rule {
    Rule {
        value: "has:geo (from:u1 OR from:u2)".into(),
        tag: "vendors-geo".into(),
    }
}

#[tokio::test]
async fn test_list_sends_bearer_and_parses_rules() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(RULES_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "1001", "value": "has:geo (from:old)", "tag": "vendors-geo"}],
            "meta": {"sent": "2023-09-12T16:00:00.000Z", "result_count": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rules = client(&server).list().await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, "1001");
    assert_eq!(rules[0].tag.as_deref(), Some("vendors-geo"));
}

#[tokio::test]
async fn test_list_without_rules_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"sent": "2023-09-12T16:00:00.000Z", "result_count": 0}
        })))
        .mount(&server)
        .await;

    assert!(client(&server).list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_posts_rules() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(RULES_PATH))
        .and(body_json(json!({"add": [{"value": "has:geo (from:u1 OR from:u2)", "tag": "vendors-geo"}]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": [{"id": "2001", "value": "has:geo (from:u1 OR from:u2)", "tag": "vendors-geo"}],
            "meta": {"summary": {"created": 1, "not_created": 0, "valid": 1, "invalid": 0}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let installed = client(&server).add(&[vendor_rule()]).await.unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].id, "2001");
}

#[tokio::test]
async fn test_add_with_invalid_summary_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "meta": {"summary": {"created": 0, "not_created": 1, "valid": 0, "invalid": 1}},
            "errors": [{"value": "has:geo (from:u1 OR from:u2)", "title": "UnprocessableEntity",
                        "detail": "Rule is invalid", "type": "https://api.twitter.com/2/problems/invalid-rules"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server).add(&[vendor_rule()]).await.unwrap_err();
    assert_eq!(err.stage(), SyncStage::Add);
    assert!(err.to_string().contains("Rule is invalid"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_delete_posts_ids() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(RULES_PATH))
        .and(body_json(json!({"delete": {"ids": ["1001", "1002"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"sent": "2023-09-12T16:00:00.000Z", "summary": {"deleted": 2, "not_deleted": 0}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let deleted = client(&server)
        .delete(&["1001".to_string(), "1002".to_string()])
        .await
        .unwrap();
    assert_eq!(deleted, 2);
}

#[tokio::test]
async fn test_unauthorized_list_is_fetch_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "title": "Unauthorized", "type": "about:blank", "status": 401, "detail": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let err = client(&server).list().await.unwrap_err();
    assert_eq!(err.stage(), SyncStage::Fetch);
    assert!(!err.is_transient());
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let err = client(&server).list().await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_synchronizer_replaces_remote_rules() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "1001", "value": "has:geo (from:old)", "tag": "vendors-geo"}],
            "meta": {"result_count": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(RULES_PATH))
        .and(body_json(json!({"delete": {"ids": ["1001"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"summary": {"deleted": 1, "not_deleted": 0}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(RULES_PATH))
        .and(body_json(json!({"add": [{"value": "has:geo (from:u1 OR from:u2)", "tag": "vendors-geo"}]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": [{"id": "2001", "value": "has:geo (from:u1 OR from:u2)", "tag": "vendors-geo"}],
            "meta": {"summary": {"created": 1, "not_created": 0}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let synchronizer = RuleSynchronizer::new(Arc::new(client(&server)));
    let outcome = synchronizer.sync(&[vendor_rule()]).await.unwrap();

    assert_eq!(outcome.deleted, 1);
    assert_eq!(outcome.installed[0].id, "2001");
}

#[tokio::test]
async fn test_synchronizer_aborts_when_delete_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "1001", "value": "has:geo (from:old)"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let synchronizer = RuleSynchronizer::new(Arc::new(client(&server)));
    let err = synchronizer.sync(&[vendor_rule()]).await.unwrap_err();

    assert_eq!(err.stage(), SyncStage::Delete);
}
