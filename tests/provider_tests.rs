//! HTTP providers against a mock server.

use parley::chat::{ModelContext, PromptInput};
use parley::config::ProviderConfig;
use parley::error::ParleyError;
use parley::models::{ModelRef, ModelSpec};
use parley::provider::{create_provider, ProviderRequest, ToolDefinition};
use parley::types::{FinishReason, GenerationSettings, Message};
use parley::util::retry::RetryPolicy;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(provider: &str, server: &MockServer) -> ProviderConfig {
    let mut config = ProviderConfig::new();
    config.set_api_key(provider, "test-key".into());
    config.set_base_url(provider, server.uri());
    config
}

fn request(text: &str) -> ProviderRequest {
    ProviderRequest {
        messages: vec![Message::system("be brief"), Message::user(text)],
        settings: GenerationSettings {
            max_tokens: Some(64),
            temperature: Some(0.1),
            top_p: None,
        },
        tools: None,
    }
}

#[tokio::test]
async fn openai_chat_completion_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gpt-4o", "max_tokens": 64 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Hello there" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = create_provider(&ModelRef::parse("openai/gpt-4o"), &config_for("openai", &server)).unwrap();
    let response = provider.generate_text(&request("hi")).await.unwrap();

    assert_eq!(response.text, "Hello there");
    assert_eq!(response.usage.input_tokens, 12);
    assert_eq!(response.usage.output_tokens, 3);
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn openai_tool_calls_are_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "lookup", "arguments": "{\"q\":\"rust\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .mount(&server)
        .await;

    let provider = create_provider(&ModelRef::parse("openai/gpt-4o"), &config_for("openai", &server)).unwrap();
    let mut req = request("look it up");
    req.tools = Some(vec![ToolDefinition {
        name: "lookup".into(),
        description: "Look up".into(),
        parameters: json!({ "type": "object", "properties": { "q": { "type": "string" } } }),
    }]);
    let response = provider.generate_text(&req).await.unwrap();

    assert_eq!(response.text, "");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "lookup");
    assert_eq!(response.tool_calls[0].arguments, json!({ "q": "rust" }));
    assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
}

#[tokio::test]
async fn anthropic_messages_hoist_the_system_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-sonnet-4-5",
            "system": "be brief"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                { "type": "text", "text": "Sure. " },
                { "type": "tool_use", "id": "tu_1", "name": "read_file", "input": { "path": "a.txt" } }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 20, "output_tokens": 8 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        create_provider(&ModelRef::parse("claude-sonnet-4-5"), &config_for("anthropic", &server)).unwrap();
    let response = provider.generate_text(&request("read a.txt")).await.unwrap();

    assert_eq!(response.text, "Sure. ");
    assert_eq!(response.tool_calls[0].id, "tu_1");
    assert_eq!(response.tool_calls[0].arguments, json!({ "path": "a.txt" }));
    assert_eq!(response.usage.input_tokens, 20);
    assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
}

#[tokio::test]
async fn http_errors_map_to_typed_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let provider = create_provider(&ModelRef::parse("openai/gpt-4o"), &config_for("openai", &server)).unwrap();
    let err = provider.generate_text(&request("hi")).await.unwrap_err();
    assert!(matches!(err, ParleyError::Authentication(ref body) if body == "bad key"));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "recovered" }, "finish_reason": "stop" }]
        })))
        .mount(&server)
        .await;

    let retry = RetryPolicy {
        max_attempts: 2,
        initial_backoff: std::time::Duration::from_millis(1),
        ..RetryPolicy::default()
    };
    let mut context = ModelContext::new(ModelSpec::new("openai/gpt-4o"), &config_for("openai", &server))
        .unwrap()
        .with_retry(retry);

    let reply = context.chat(PromptInput::from("hi")).await.unwrap();
    assert_eq!(reply.content, "recovered");
}

#[tokio::test]
async fn each_context_talks_to_its_own_endpoint() {
    let local = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "from local" }, "finish_reason": "stop" }]
        })))
        .expect(1)
        .mount(&local)
        .await;

    let shared = ProviderConfig::new();
    let mut local_config = shared.clone();
    local_config.set_base_url("ollama", local.uri());

    let mut context = ModelContext::new(ModelSpec::new("ollama/llama3.2"), &local_config).unwrap();
    let reply = context.chat("hi".into()).await.unwrap();

    assert_eq!(reply.content, "from local");
    assert_eq!(shared.get_base_url("ollama"), None);
    assert_eq!(context.config().get_base_url("ollama"), Some(local.uri()));
}
