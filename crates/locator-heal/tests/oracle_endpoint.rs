//! Healing against a mock chat completions server.

use locator_heal::prelude::*;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html><body><button id="new">Continue</button></body></html>"#;

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

async fn serve(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer) -> HealerConfig {
    HealerConfig::new()
        .with_oracle(OracleConfig::default().with_endpoint(server.uri()).with_timeouts(2_000, 5_000))
        .with_snapshot(SnapshotConfig::default().without_persistence())
        .with_wait(WaitOptions::default().with_timeout(40).with_poll_interval(5))
        .with_scroll(ScrollOptions::default().with_max_attempts(1).with_pauses(0, 0))
}

/// The blocking client must be built, used and dropped off the runtime
async fn blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_response_body_surfaces_healing_failure_as_cause() {
    let server = serve(ResponseTemplate::new(200)).await;
    let config = config_for(&server);

    let err = blocking(move || {
        let resolver = config.resolver(config.build_oracle(false)?);
        let session = Session::new(StaticPageDriver::new(PAGE));
        resolver.resolve(&session, &Locator::xpath("//button[@id='old']"))
    })
    .await
    .unwrap_err();

    match &err {
        HealError::ElementNotFound { locator, .. } => assert_eq!(locator, "xpath=//button[@id='old']"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.cause(), Some(HealError::HealingFailed { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn fenced_answer_heals_and_second_lookup_skips_server() {
    let server =
        serve(ResponseTemplate::new(200).set_body_json(completion("```xpath\n//button[@id='new']\n```")))
            .await;
    let config = config_for(&server);

    let states = blocking(move || {
        let resolver = config.resolver(config.build_oracle(false)?);
        let session = Session::new(StaticPageDriver::new(PAGE));
        let damaged = Locator::xpath("//button[@id='old']");
        let first = resolver.resolve(&session, &damaged)?;
        let second = resolver.resolve(&session, &damaged)?;
        Ok::<_, HealError>((first.state, second.state, second.locator))
    })
    .await
    .unwrap();

    assert_eq!(states.0, ResolutionState::ResolvedAfterHeal);
    assert_eq!(states.1, ResolutionState::ResolvedFromCache);
    assert_eq!(states.2, Locator::xpath("//button[@id='new']"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_oracle_falls_back_to_structure_when_enabled() {
    let config = HealerConfig::new()
        .with_oracle(OracleConfig::default().with_endpoint("http://127.0.0.1:9").with_timeouts(300, 300))
        .with_structural_fallback(true)
        .with_snapshot(SnapshotConfig::default().without_persistence())
        .with_wait(WaitOptions::default().with_timeout(40).with_poll_interval(5));

    let resolution = blocking(move || {
        let resolver = config.resolver(config.build_oracle(false)?);
        let session = Session::new(StaticPageDriver::new(PAGE));
        resolver.resolve(&session, &Locator::id("continue-btn"))
    })
    .await
    .unwrap();

    assert_eq!(resolution.state, ResolutionState::ResolvedAfterHeal);
    assert_eq!(resolution.element.attribute("id"), Some("new"));
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_sends_one_request_for_all_damaged() {
    let page = r#"<html><body>
        <input name="email">
        <input name="secret" type="password">
        <button id="go">Go</button>
    </body></html>"#;
    let server = serve(
        ResponseTemplate::new(200)
            .set_body_json(completion("1. //input[@name='email']\n2. //input[@name='secret']")),
    )
    .await;
    let config = config_for(&server);

    let out = blocking(move || {
        let orchestrator = config.orchestrator(config.build_oracle(false)?);
        let session = Session::new(StaticPageDriver::new(page));
        let batch = [Locator::id("email"), Locator::id("go"), Locator::id("password")];
        Ok::<_, HealError>(orchestrator.validate_and_heal(&session, &batch))
    })
    .await
    .unwrap();

    assert_eq!(
        out,
        vec![
            Locator::xpath("//input[@name='email']"),
            Locator::id("go"),
            Locator::xpath("//input[@name='secret']"),
        ]
    );
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("1. id=email"));
    assert!(prompt.contains("2. id=password"));
}
