//! Session construction and `//directive` handling.

mod common;

use std::sync::Arc;

use common::{echo_factory, MockConnector, ServerBehavior};
use parley::config::{AppConfig, ProviderConfig};
use parley::error::ParleyError;
use parley::mcp::ServerSpec;
use parley::models::ModelSpec;
use parley::session::{Session, SessionOptions};
use parley::tools::{builtin, ToolPipeline};
use pretty_assertions::assert_eq;

fn session(models: &[&str]) -> Session {
    let specs = models.iter().map(|m| ModelSpec::new(*m)).collect();
    Session::with_factory(
        specs,
        ProviderConfig::new(),
        SessionOptions::default(),
        echo_factory(&["broken"]),
    )
    .unwrap()
}

#[test]
fn models_that_fail_to_start_are_skipped() {
    let session = session(&["a", "broken", "b"]);
    assert_eq!(session.describe_models(), "Models: a, b");
    assert_eq!(session.startup_warnings().len(), 1);
    assert!(session.startup_warnings()[0].starts_with("broken: Authentication error"));
}

#[test]
fn no_usable_model_is_fatal() {
    let err = Session::with_factory(
        vec![ModelSpec::new("broken")],
        ProviderConfig::new(),
        SessionOptions::default(),
        echo_factory(&["broken"]),
    )
    .unwrap_err();
    assert!(matches!(err, ParleyError::NoModels));

    let err = Session::with_factory(
        Vec::new(),
        ProviderConfig::new(),
        SessionOptions::default(),
        echo_factory(&[]),
    )
    .unwrap_err();
    assert!(matches!(err, ParleyError::NoModels));
}

#[test]
fn options_come_from_the_config_file() {
    let config = AppConfig::from_toml_str(
        r#"
        consensus = true
        system_prompt = "be brief"
        roles_dir = "/tmp/roles"

        [generation]
        temperature = 0.2
        max_tokens = 512
        "#,
    )
    .unwrap();

    let options = SessionOptions::from_config(&config);
    assert!(options.consensus);
    assert_eq!(options.system_prompt.as_deref(), Some("be brief"));
    assert_eq!(options.generation.temperature, Some(0.2));
    assert_eq!(options.generation.max_tokens, Some(512));
    assert_eq!(options.roles_dir.as_deref(), Some(std::path::Path::new("/tmp/roles")));
}

#[tokio::test]
async fn plain_input_goes_to_the_models() {
    let mut session = session(&["a", "b"]);
    let response = session.handle_input("hello").await;
    assert_eq!(response.content, "from: a\na: hello\n\nfrom: b\nb: hello");
    assert!(response.metrics.is_some());
}

#[tokio::test]
async fn directives_never_reach_the_models() {
    let mut session = session(&["a"]);
    let response = session.handle_input("//checkpoint start").await;
    assert_eq!(response.content, "Checkpoint 'start' created at position 0");
    assert_eq!(response.metrics, None);
    assert!(session.dispatcher().contexts()[0].messages().is_empty());
}

#[tokio::test]
async fn checkpoint_directives_round_trip() {
    let mut session = session(&["a"]);
    session.handle_input("one").await;
    session.handle_input("//ckp").await;
    session.handle_input("two").await;

    let listing = session.handle_input("//checkpoints").await.content;
    assert!(listing.contains("1 *: position 2"));

    let restored = session.handle_input("//restore 1").await.content;
    assert_eq!(restored, "Restored checkpoint '1' (position 2). Removed 0 checkpoint(s)");
    assert_eq!(session.dispatcher().contexts()[0].messages().len(), 2);

    let missing = session.handle_input("//restore nope").await.content;
    assert_eq!(missing, "Checkpoint 'nope' not found. Available: 1");
}

#[tokio::test]
async fn clear_directive_options() {
    let mut session = Session::with_factory(
        vec![ModelSpec::new("a")],
        ProviderConfig::new(),
        SessionOptions {
            system_prompt: Some("sys".into()),
            ..Default::default()
        },
        echo_factory(&[]),
    )
    .unwrap();
    session.handle_input("one").await;

    assert_eq!(
        session.handle_input("//clear").await.content,
        "Conversation cleared (system prompt kept)"
    );
    assert_eq!(session.dispatcher().contexts()[0].messages().len(), 1);

    assert_eq!(session.handle_input("//clear all").await.content, "Conversation cleared");
    assert!(session.dispatcher().contexts()[0].messages().is_empty());

    assert_eq!(
        session.handle_input("//clear everything").await.content,
        "Unknown option 'everything'. Usage: //clear [keep|all]"
    );
}

#[tokio::test]
async fn review_alias_shows_history() {
    let mut session = session(&["a"]);
    session.handle_input("hi").await;
    let review = session.handle_input("//context").await.content;
    assert!(review.starts_with("Conversation history (a, 2 messages):"));
}

#[tokio::test]
async fn model_directive_lists_and_replaces_models() {
    let mut session = session(&["a"]);
    session.handle_input("//checkpoint x").await;

    assert_eq!(session.handle_input("//model").await.content, "Models: a");

    let replaced = session.handle_input("//model b=critic, b, broken").await.content;
    assert_eq!(
        replaced,
        "Models: b (critic), b #2\n  skipped: broken: Authentication error: no key for broken"
    );
    assert!(session.checkpoints().is_empty());

    let ids: Vec<String> = session
        .dispatcher()
        .contexts()
        .iter()
        .map(|c| c.internal_id())
        .collect();
    assert_eq!(ids, vec!["b", "b#2"]);
}

#[tokio::test]
async fn failed_model_replacement_keeps_the_old_set() {
    let mut session = session(&["a"]);
    let out = session.handle_input("//model broken").await.content;
    assert!(out.starts_with("Configuration error: No models could be started"));
    assert_eq!(session.describe_models(), "Models: a");

    let out = session.handle_input("//model =critic").await.content;
    assert!(out.starts_with("Invalid argument"));
}

#[tokio::test]
async fn consensus_directive_toggles_mode() {
    let mut session = session(&["a", "b"]);
    assert_eq!(session.handle_input("//consensus").await.content, "Consensus is off");
    assert_eq!(session.handle_input("//consensus on").await.content, "Consensus enabled");
    assert!(session.dispatcher().consensus());
    assert_eq!(session.handle_input("//consensus off").await.content, "Consensus disabled");
    assert!(!session.dispatcher().consensus());
}

#[tokio::test]
async fn unknown_directive_returns_a_hint() {
    let mut session = session(&["a"]);
    let out = session.handle_input("//frobnicate now").await.content;
    assert_eq!(out, "Unknown directive '//frobnicate'. Type //help for available directives.");
}

#[tokio::test]
async fn help_lists_every_directive() {
    let mut session = session(&["a"]);
    let help = session.handle_input("//help").await.content;
    for usage in ["//checkpoint [name]", "//restore [name]", "//clear [keep|all]", "//tools"] {
        assert!(help.contains(usage), "missing {usage}");
    }
}

#[tokio::test]
async fn tools_directive_reports_sources_and_failures() {
    let connector = MockConnector::new()
        .with_server("fs", ServerBehavior::ready(&["read_file", "search"]))
        .with_server("web", ServerBehavior::Refuse("not installed".into()));
    let closed = Arc::clone(&connector.closed);

    let report = ToolPipeline::new(Arc::new(connector))
        .with_local_tools(builtin::all_tools())
        .with_servers(vec![ServerSpec::new("fs", "mock"), ServerSpec::new("web", "mock")])
        .load()
        .await;

    let mut session = session(&["a", "b"]).with_tools(report);
    for context in session.dispatcher().contexts() {
        assert_eq!(context.tools().len(), 5);
    }

    let out = session.handle_input("//tools").await.content;
    assert!(out.starts_with("Tools (5):"));
    assert!(out.contains("  read_file [local]"));
    assert!(out.contains("  search [mcp:fs]"));
    assert!(out.contains("  fs: connected (2 tools)"));
    assert!(out.contains("web: Connection failed"));
    assert!(out.contains("warning: Duplicate tool 'read_file' from mcp:fs ignored"));

    // Replacing models keeps the tool set attached.
    session.handle_input("//model c").await;
    assert_eq!(session.dispatcher().contexts()[0].tools().len(), 5);

    session.shutdown().await;
    assert_eq!(*closed.lock().unwrap(), vec!["fs"]);
}

#[tokio::test]
async fn tools_reload_reconnects_and_closes_old_sessions() {
    let connector = MockConnector::new().with_server("fs", ServerBehavior::ready(&["search"]));
    let completed = Arc::clone(&connector.completed);
    let closed = Arc::clone(&connector.closed);

    let pipeline = ToolPipeline::new(Arc::new(connector))
        .with_local_tools(builtin::all_tools())
        .with_servers(vec![ServerSpec::new("fs", "mock")]);
    let report = pipeline.load().await;

    let mut session = session(&["a", "b"])
        .with_tools(report)
        .with_tool_pipeline(pipeline);
    session.handle_input("hello").await;
    session.handle_input("//checkpoint before").await;

    let out = session.handle_input("//tools reload").await.content;
    assert!(out.starts_with("Tools reloaded\nTools (5):"));
    assert!(out.contains("  fs: connected (1 tools)"));

    assert_eq!(*completed.lock().unwrap(), vec!["fs", "fs"]);
    assert_eq!(*closed.lock().unwrap(), vec!["fs"]);
    for context in session.dispatcher().contexts() {
        assert_eq!(context.tools().len(), 5);
        assert_eq!(context.messages().len(), 2);
    }
    assert_eq!(session.checkpoints().names(), vec!["before"]);

    session.shutdown().await;
    assert_eq!(*closed.lock().unwrap(), vec!["fs", "fs"]);
}

#[tokio::test]
async fn tools_reload_without_a_pipeline() {
    let mut session = session(&["a"]);
    assert_eq!(
        session.handle_input("//tools reload").await.content,
        "No tool sources to reload"
    );
    assert_eq!(
        session.handle_input("//tools refresh").await.content,
        "Unknown option 'refresh'. Usage: //tools [reload]"
    );
}
