//! Integration tests for execution and failover behavior.
//!
//! Verifies that:
//! - Standard requests are served by the local provider when healthy
//! - Specialized requests are served by the remote provider
//! - A failed primary attempt falls back once to the alternate provider
//! - Credit-exhaustion responses set the sticky flag and redirect later
//!   specialized requests to the local provider
//! - Both providers failing surfaces a dual failure with both messages
//! - Disabling fallback limits a request to a single attempt
//! - The start-up probe substitutes a missing configured local model
//!
//! Uses wiremock servers as fake providers.

use serde_json::json;
use switchyard::{Config, Error, ProviderId, RequestContext, RequestRouter};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build a config pointing both providers at mock servers.
fn test_config(local_url: &str, remote_url: &str) -> Config {
    let toml = format!(
        r#"
        [local]
        url = "{local_url}"
        model = "test-model"
        timeout_secs = 5

        [remote]
        url = "{remote_url}"
        model = "remote-test-model"
        api_key = "sk-test"
        timeout_secs = 5
        "#
    );
    Config::parse_str(&toml).expect("valid test config")
}

/// Mount the local capability probe with the given installed models.
async fn mount_local_tags(server: &MockServer, models: &[&str]) {
    let body = json!({
        "models": models.iter().map(|name| json!({"name": name})).collect::<Vec<_>>()
    });
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_local_generate_ok(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": text})))
        .mount(server)
        .await;
}

async fn mount_remote_ok(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": text}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn standard_request_served_locally() {
    let local = MockServer::start().await;
    let remote = MockServer::start().await;
    mount_local_tags(&local, &["test-model"]).await;
    mount_local_generate_ok(&local, "local answer").await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    let response = router
        .complete(RequestContext::from_prompt("what should I cook tonight"))
        .await
        .unwrap();

    assert_eq!(response.text, "local answer");
    assert_eq!(response.provider, ProviderId::Local);
    assert_eq!(response.routing_reason, "primary_provider");
    assert!(!response.fallback_used);

    let stats = router.stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.local_requests, 1);
    assert_eq!(stats.remote_requests, 0);
}

#[tokio::test]
async fn specialized_request_served_remotely() {
    let local = MockServer::start().await;
    let remote = MockServer::start().await;
    mount_local_tags(&local, &["test-model"]).await;
    mount_remote_ok(&remote, "remote answer").await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    let mut ctx = RequestContext::from_prompt("please look at this module");
    ctx.task_hint = Some("code_review".to_string());

    let response = router.complete(ctx).await.unwrap();
    assert_eq!(response.text, "remote answer");
    assert_eq!(response.provider, ProviderId::Remote);
    assert_eq!(response.routing_reason, "specialized_task:code_review");

    let stats = router.stats();
    assert_eq!(stats.remote_requests, 1);
    assert_eq!(stats.specialized_requests, 1);
}

#[tokio::test]
async fn failed_local_attempt_falls_back_to_remote() {
    let local = MockServer::start().await;
    let remote = MockServer::start().await;
    mount_local_tags(&local, &["test-model"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .expect(1)
        .mount(&local)
        .await;
    mount_remote_ok(&remote, "rescued by remote").await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    let response = router
        .complete(RequestContext::from_prompt("hello"))
        .await
        .unwrap();

    assert_eq!(response.text, "rescued by remote");
    assert_eq!(response.provider, ProviderId::Remote);
    assert!(response.fallback_used);
    assert_eq!(response.original_provider, Some(ProviderId::Local));
    // Decision was still made for the local primary.
    assert_eq!(response.routing_reason, "primary_provider");

    let stats = router.stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.local_errors, 1);
    assert_eq!(stats.remote_requests, 1);
    assert_eq!(stats.local_requests, 0);
    assert_eq!(stats.fallbacks, 1);

    let health = router.health();
    assert!(!health.local.reachable, "one failure marks local unreachable");
    assert!(health.remote.reachable);
}

#[tokio::test]
async fn unreachable_local_routes_standard_requests_to_remote() {
    let local = MockServer::start().await; // no mocks: probe gets 404
    let remote = MockServer::start().await;
    mount_remote_ok(&remote, "remote only").await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();
    assert!(!router.health().local.reachable);

    let response = router
        .complete(RequestContext::from_prompt("hello"))
        .await
        .unwrap();
    assert_eq!(response.provider, ProviderId::Remote);
    assert_eq!(response.routing_reason, "fallback_available");
    assert!(!response.fallback_used, "direct routing is not a fallback");
}

#[tokio::test]
async fn credit_exhaustion_is_sticky_and_redirects_specialized_requests() {
    let local = MockServer::start().await;
    let remote = MockServer::start().await;
    mount_local_tags(&local, &["test-model"]).await;
    mount_local_generate_ok(&local, "local answer").await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string("Your credit balance is too low. insufficient credits."),
        )
        .expect(1)
        .mount(&remote)
        .await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    // First specialized request: remote fails with credit exhaustion,
    // fallback to local succeeds.
    let mut ctx = RequestContext::from_prompt("review this");
    ctx.task_hint = Some("code_review".to_string());
    let response = router.complete(ctx.clone()).await.unwrap();
    assert_eq!(response.provider, ProviderId::Local);
    assert!(response.fallback_used);
    assert_eq!(response.original_provider, Some(ProviderId::Remote));

    let health = router.health();
    assert!(health.remote.credit_exhausted);

    // Next specialized request routes straight to local; the remote mock's
    // expect(1) verifies no second remote call is made.
    let response = router.complete(ctx).await.unwrap();
    assert_eq!(response.provider, ProviderId::Local);
    assert_eq!(response.routing_reason, "provider_unavailable_fallback");
    assert!(!response.fallback_used);

    // Only the explicit reset clears the flag.
    router.reset_credit_exhaustion();
    assert!(!router.health().remote.credit_exhausted);
}

#[tokio::test]
async fn dual_failure_carries_both_messages() {
    let local = MockServer::start().await;
    let remote = MockServer::start().await;
    mount_local_tags(&local, &["test-model"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("local exploded"))
        .expect(1)
        .mount(&local)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("remote exploded"))
        .expect(1)
        .mount(&remote)
        .await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    let err = router
        .complete(RequestContext::from_prompt("hello"))
        .await
        .unwrap_err();

    match &err {
        Error::BothProvidersFailed {
            primary_provider,
            fallback_provider,
            ..
        } => {
            assert_eq!(*primary_provider, ProviderId::Local);
            assert_eq!(*fallback_provider, ProviderId::Remote);
        }
        other => panic!("expected BothProvidersFailed, got: {:?}", other),
    }
    let text = err.to_string();
    assert!(text.contains("local exploded"), "missing primary cause: {}", text);
    assert!(text.contains("remote exploded"), "missing fallback cause: {}", text);

    // The expect(1) on each mock bounds the request to two attempts total.
    let stats = router.stats();
    assert_eq!(stats.local_errors, 1);
    assert_eq!(stats.remote_errors, 1);
    assert_eq!(stats.fallbacks, 1);
    assert_eq!(stats.local_requests + stats.remote_requests, 0);
}

#[tokio::test]
async fn last_resort_request_still_attempts_both_providers() {
    // Local probe fails (no tags mock) and remote errors, so the first
    // request marks both unreachable. The second request is routed
    // last-resort and must still produce a dual failure, not a single one.
    let local = MockServer::start().await;
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("remote down"))
        .mount(&remote)
        .await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    // First request: routed to remote (local unreachable), fails, and the
    // unreachable local blocks the fallback.
    let err = router
        .complete(RequestContext::from_prompt("hello"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Provider {
            provider: ProviderId::Remote,
            ..
        }
    ));

    let health = router.health();
    assert!(!health.local.reachable);
    assert!(!health.remote.reachable);

    // Second request: last-resort routing, both attempted, both causes
    // surfaced.
    let err = router
        .complete(RequestContext::from_prompt("hello again"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BothProvidersFailed { .. }));
    assert!(err.to_string().contains("remote down"));
}

#[tokio::test]
async fn disabled_fallback_limits_to_single_attempt() {
    let local = MockServer::start().await;
    let remote = MockServer::start().await;
    mount_local_tags(&local, &["test-model"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("still broken"))
        .expect(1)
        .mount(&local)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&remote)
        .await;

    let mut config = test_config(&local.uri(), &remote.uri());
    config.router.fallback_enabled = false;

    let router = RequestRouter::connect(config).await.unwrap();
    let err = router
        .complete(RequestContext::from_prompt("hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Provider {
            provider: ProviderId::Local,
            ..
        }
    ));
}

#[tokio::test]
async fn probe_substitutes_missing_local_model() {
    let local = MockServer::start().await;
    let remote = MockServer::start().await;
    // Configured "test-model" is not installed; "installed-model" is.
    mount_local_tags(&local, &["installed-model"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "installed-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
        .expect(1)
        .mount(&local)
        .await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    let response = router
        .complete(RequestContext::from_prompt("hello"))
        .await
        .unwrap();
    assert_eq!(response.text, "ok");
}

#[tokio::test]
async fn caller_token_budget_reaches_the_remote_wire() {
    let local = MockServer::start().await; // probe fails, remote serves
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"max_tokens": 77})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "budgeted"}]
        })))
        .expect(1)
        .mount(&remote)
        .await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    let mut ctx = RequestContext::from_prompt("hello");
    ctx.max_tokens = Some(77);
    let response = router.complete(ctx).await.unwrap();
    assert_eq!(response.text, "budgeted");
}

#[tokio::test]
async fn test_providers_reports_without_touching_health() {
    let local = MockServer::start().await; // down: no mocks
    let remote = MockServer::start().await;
    mount_remote_ok(&remote, "pong").await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    let before = router.health();
    let report = router.test_providers().await;
    assert!(!report.local.reachable);
    assert!(report.local.error.is_some());
    assert!(report.remote.reachable);

    let after = router.health();
    assert_eq!(before.local.reachable, after.local.reachable);
    assert_eq!(before.remote.reachable, after.remote.reachable);
    assert_eq!(
        before.remote.consecutive_failures,
        after.remote.consecutive_failures
    );
}

#[tokio::test]
async fn refresh_local_connection_restores_reachability() {
    let local = MockServer::start().await;
    let remote = MockServer::start().await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();
    assert!(!router.health().local.reachable);

    // The server comes back with the configured model installed.
    mount_local_tags(&local, &["test-model"]).await;
    assert!(router.refresh_local_connection().await);
    assert!(router.health().local.reachable);
}

#[tokio::test]
async fn clear_stats_zeroes_counters() {
    let local = MockServer::start().await;
    let remote = MockServer::start().await;
    mount_local_tags(&local, &["test-model"]).await;
    mount_local_generate_ok(&local, "answer").await;

    let router = RequestRouter::connect(test_config(&local.uri(), &remote.uri()))
        .await
        .unwrap();

    for _ in 0..3 {
        router
            .complete(RequestContext::from_prompt("hello"))
            .await
            .unwrap();
    }
    assert_eq!(router.stats().total_requests, 3);

    router.clear_stats();
    let stats = router.stats();
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.local_requests, 0);
    assert_eq!(stats.fallbacks, 0);
    assert_eq!(stats.estimated_cost_saved_usd, 0.0);
}
