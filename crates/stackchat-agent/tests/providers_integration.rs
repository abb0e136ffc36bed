#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use stackchat_agent::backends::{GeminiBackend, OpenAiBackend};
use stackchat_agent::{
    ChatEvent, ChatOrchestrator, ChatRequest, CompletionRequest, LlmBackend, ProviderAdapter,
    ProviderConfig, ProviderKind, ProviderSelector, ProvidersConfig, StreamItem,
};
use stackchat_core::{CredentialResolver, Message};
use stackchat_retrieval::{ContentstackClient, ContentstackConfig, Retriever};
use std::sync::Arc;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, key: &str) -> ProviderConfig {
    ProviderConfig {
        api_key: Some(key.to_string()),
        base_url: Some(server.uri()),
        ..Default::default()
    }
}

fn openai_sse(parts: &[&str]) -> String {
    let mut body = String::new();
    for part in parts {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": part}, "finish_reason": null}]})
        ));
    }
    body.push_str(&format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {}, "finish_reason": "stop"}]})
    ));
    body.push_str("data: [DONE]\n\n");
    body
}

fn quota_body() -> serde_json::Value {
    json!({"error": {
        "message": "You exceeded your current quota, please check your plan and billing details.",
        "type": "insufficient_quota",
        "code": "insufficient_quota"
    }})
}

async fn collect(adapter: &ProviderAdapter, model: &str) -> Vec<StreamItem> {
    let mut stream = adapter.stream(CompletionRequest::new(model, vec![Message::user("Hi")]));
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }
    items
}

// ---------------------------------------------------------------------------
// 1. OpenAI streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn openai_stream_yields_tokens_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(openai_sse(&["Hel", "lo", "!"]), "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(ProviderKind::OpenAi, &config_for(&server, "sk-test")).unwrap();
    let adapter = ProviderAdapter::new(ProviderKind::OpenAi, Arc::new(backend));
    let items = collect(&adapter, "gpt-4o-mini").await;

    assert_eq!(
        items,
        vec![
            StreamItem::Token("Hel".into()),
            StreamItem::Token("lo".into()),
            StreamItem::Token("!".into()),
            StreamItem::Done,
        ]
    );
}

#[tokio::test]
async fn openai_truncated_stream_fails() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"content": "partial"}, "finish_reason": null}]})
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(ProviderKind::OpenAi, &config_for(&server, "sk-test")).unwrap();
    let adapter = ProviderAdapter::new(ProviderKind::OpenAi, Arc::new(backend));
    let items = collect(&adapter, "gpt-4o-mini").await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0], StreamItem::Token("partial".into()));
    let StreamItem::Failed(err) = &items[1] else {
        panic!("expected failure, got {:?}", items[1]);
    };
    assert!(err.message.contains("ended before completion"));
}

#[tokio::test]
async fn openai_quota_error_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_body()))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(ProviderKind::OpenAi, &config_for(&server, "sk-test")).unwrap();
    let err = backend
        .stream("gpt-4o-mini", &[Message::user("Hi")], mpsc::channel(4).0)
        .await
        .unwrap_err();

    assert_eq!(err.provider, ProviderKind::OpenAi);
    assert_eq!(err.status, Some(429));
    assert_eq!(err.code.as_deref(), Some("insufficient_quota"));
    assert!(err.is_quota_or_rate_limit());
}

#[tokio::test]
async fn openai_complete_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Namaste!"}, "finish_reason": "stop"}]
        })))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(ProviderKind::OpenAi, &config_for(&server, "sk-test")).unwrap();
    let reply = backend.complete("gpt-4o-mini", &[Message::user("Hi")]).await.unwrap();
    assert_eq!(reply.text(), "Namaste!");
}

// ---------------------------------------------------------------------------
// 2. Gemini streaming and completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gemini_stream_and_complete() {
    let server = MockServer::start().await;
    let chunk = |text: &str| {
        format!(
            "data: {}\r\n\r\n",
            json!({"candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]})
        )
    };
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:streamGenerateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .and(body_partial_json(json!({"contents": [{"parts": [{"text": "user: Hi"}]}]})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(format!("{}{}", chunk("Hello"), chunk(" there")), "text/event-stream"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Full answer"}]}}]
        })))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&config_for(&server, "g-test")).unwrap();
    let adapter = ProviderAdapter::new(ProviderKind::Gemini, Arc::new(backend));
    let items = collect(&adapter, "gemini-1.5-flash").await;
    assert_eq!(
        items,
        vec![
            StreamItem::Token("Hello".into()),
            StreamItem::Token(" there".into()),
            StreamItem::Done,
        ]
    );

    let reply = adapter
        .complete(&CompletionRequest::new("gemini-1.5-flash", vec![Message::user("Hi")]))
        .await
        .unwrap();
    assert_eq!(reply.text(), "Full answer");
}

#[tokio::test]
async fn gemini_empty_stream_falls_back_to_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/event-stream"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Recovered"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&config_for(&server, "g-test")).unwrap();
    let adapter = ProviderAdapter::new(ProviderKind::Gemini, Arc::new(backend));
    let items = collect(&adapter, "gemini-1.5-flash").await;
    assert_eq!(items, vec![StreamItem::Token("Recovered".into()), StreamItem::Done]);
}

// ---------------------------------------------------------------------------
// 3. OpenAI 429 → Groq through the orchestrator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn openai_quota_switches_to_groq() {
    let openai = MockServer::start().await;
    let groq = MockServer::start().await;
    let cms = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_body()))
        .expect(1)
        .mount(&openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer gsk-test"))
        .and(body_partial_json(json!({"model": "llama-3.1-8b-instant"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(openai_sse(&["Hi", " there"]), "text/event-stream"))
        .expect(1)
        .mount(&groq)
        .await;

    let providers = ProvidersConfig {
        openai: config_for(&openai, "sk-test"),
        groq: config_for(&groq, "gsk-test"),
        ..Default::default()
    };
    let selector = ProviderSelector::from_config(&providers).unwrap();
    let cms_client = ContentstackClient::new(&ContentstackConfig {
        base_url: cms.uri(),
        ..Default::default()
    })
    .unwrap();
    let orchestrator = ChatOrchestrator::new(
        Arc::new(Retriever::new(Arc::new(cms_client))),
        Arc::new(selector),
        CredentialResolver::default(),
    );

    let (tx, mut rx) = mpsc::channel(32);
    orchestrator
        .run(
            ChatRequest {
                messages: vec![Message::user("Hello")],
                provider: Some("openai".into()),
                model: Some("gpt-4o-mini".into()),
                ..Default::default()
            },
            tx,
        )
        .await;

    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }

    let names: Vec<_> = events.iter().map(ChatEvent::name).collect();
    assert_eq!(names, vec!["provider_switch", "token", "token", "done"]);
    assert_eq!(events[0].data()["from"], "OpenAI");
    assert_eq!(events[0].data()["to"], "Groq");
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::Token { token } => Some(token.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hi there");
}
