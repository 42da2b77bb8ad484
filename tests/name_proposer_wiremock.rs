use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use archetype_engine::gateway::openrouter::OpenRouterAdapter;
use archetype_engine::gateway::{GatewayConfig, NoopUsageSink, ProviderGateway};
use archetype_engine::{
    AxisDefinition, ClassificationEngine, ClassificationRequest, EngineConfig, LlmNameProposer,
    NameProposer, NameRequest, NameSource, Polarity, ProposerError, TypeCell,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn gateway(server: &MockServer) -> Arc<ProviderGateway<NoopUsageSink>> {
    let adapter =
        OpenRouterAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5), None)
            .unwrap();
    Arc::new(ProviderGateway::with_config(
        adapter,
        Arc::new(NoopUsageSink),
        GatewayConfig {
            max_retries: 1,
            retry_base_delay: Duration::from_millis(0),
        },
    ))
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": { "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 40, "completion_tokens": 12 }
    }))
}

fn name_request(attempt: u8, previous_rejection: Option<&str>) -> NameRequest {
    NameRequest {
        session_id: "s-1".to_string(),
        run_id: Uuid::new_v4(),
        cell: TypeCell::base(Polarity::High, Polarity::Low),
        axis_a: AxisDefinition::new("exploration", "Exploration")
            .with_direction_label("seeks the unknown"),
        axis_b: AxisDefinition::new("risk", "Risk"),
        attempt,
        previous_rejection: previous_rejection.map(str::to_string),
        max_chars: 14,
    }
}

#[tokio::test]
async fn proposer_parses_name_from_json_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "openai/gpt-5-mini",
            "max_tokens": 120,
            "response_format": { "type": "json_object" }
        })))
        .and(body_string_contains("seeks the unknown"))
        .respond_with(completion(
            r#"{"name": "Wayfinder", "description": "Maps the unknown before committing.", "safe": true}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let proposer = LlmNameProposer::new(gateway(&server), "openai/gpt-5-mini");
    let proposal = proposer.propose_name(&name_request(1, None)).await.unwrap();

    assert_eq!(proposal.name, "Wayfinder");
    assert!(proposal.safety_ok);
    assert_eq!(
        proposal.description.as_deref(),
        Some("Maps the unknown before committing.")
    );
}

#[tokio::test]
async fn retry_prompt_carries_previous_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("previous_attempt_rejected"))
        .and(body_string_contains("name duplicates"))
        .respond_with(completion(r#"Sure! {"name": "Quiet Anchor"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let proposer = LlmNameProposer::new(gateway(&server), "openai/gpt-5-mini");
    let proposal = proposer
        .propose_name(&name_request(2, Some("name duplicates 'Anchor'")))
        .await
        .unwrap();
    assert_eq!(proposal.name, "Quiet Anchor");
}

#[tokio::test]
async fn provider_refusal_becomes_unsafe_proposal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("I can't help name that."))
        .mount(&server)
        .await;

    let proposer = LlmNameProposer::new(gateway(&server), "openai/gpt-5-mini");
    let proposal = proposer.propose_name(&name_request(1, None)).await.unwrap();
    assert!(!proposal.safety_ok);
    assert!(proposal.name.is_empty());
}

#[tokio::test]
async fn unparsable_reply_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("Wayfinder"))
        .mount(&server)
        .await;

    let proposer = LlmNameProposer::new(gateway(&server), "openai/gpt-5-mini");
    let err = proposer
        .propose_name(&name_request(1, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ProposerError::Parse(_)));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(r#"{"name": "Wayfinder"}"#).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let proposer = LlmNameProposer::new(gateway(&server), "openai/gpt-5-mini")
        .with_timeout(Duration::from_millis(50));
    let err = proposer
        .propose_name(&name_request(1, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ProposerError::Timeout(_)));
}

/// Hands out names from a fixed list in arrival order.
struct NameListResponder {
    calls: Arc<AtomicUsize>,
    names: Vec<&'static str>,
}

impl Respond for NameListResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let name = self.names[n % self.names.len()];
        completion(&json!({ "name": name, "safe": true }).to_string())
    }
}

#[tokio::test]
async fn engine_names_every_cell_through_the_provider() {
    let server = MockServer::start().await;
    let names = vec!["Vanguard", "Anchor", "Wanderer", "Hermit", "Drifter"];

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(NameListResponder {
            calls: Arc::new(AtomicUsize::new(0)),
            names: names.clone(),
        })
        .mount(&server)
        .await;

    let proposer = LlmNameProposer::new(gateway(&server), "openai/gpt-5-mini");
    let engine = ClassificationEngine::new(EngineConfig::default())
        .unwrap()
        .with_proposer(Arc::new(proposer));

    let request = ClassificationRequest::new(
        "session-llm",
        vec![
            AxisDefinition::new("exploration", "Exploration"),
            AxisDefinition::new("risk", "Risk"),
            AxisDefinition::new("harmony", "Harmony"),
            AxisDefinition::new("convergence", "Convergence"),
        ],
        HashMap::from([
            ("exploration".to_string(), 3.4),
            ("risk".to_string(), 2.7),
            ("harmony".to_string(), 1.7),
            ("convergence".to_string(), 0.0),
        ]),
    );
    let result = engine.classify(&request).await;

    assert!(!result.generation_meta.fallback_used);
    assert!(result.types.iter().all(|t| t.source == NameSource::Generated));
    let got: BTreeSet<&str> = result.types.iter().map(|t| t.name.as_str()).collect();
    let want: BTreeSet<&str> = names.into_iter().collect();
    assert_eq!(got, want);
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}
