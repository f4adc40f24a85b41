use std::fs;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tempfile::TempDir;
use tokio::sync::mpsc;

use super::event_loop::{process_stream_updates, sanitize_pasted_text};
use super::*;
use crate::api::{ModelInfo, ModelPricing};
use crate::core::chat_stream::ChunkEvent;
use crate::core::config::RagMode;
use crate::core::message::Role;
use crate::core::prompts::{prompt_source_for, LocalPromptLibrary};
use crate::core::usage::UsageMetadata;
use crate::utils::test_utils::{spawn_chunked_server, ChunkedReply};

struct Harness {
    app: App,
    stream_rx: mpsc::UnboundedReceiver<(ChunkEvent, u64)>,
    action_rx: mpsc::UnboundedReceiver<AppAction>,
    dir: TempDir,
}

fn harness(server_url: &str) -> Harness {
    harness_with_prompt(server_url, None)
}

fn harness_with_prompt(server_url: &str, prompt: Option<&str>) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let prompts_dir = dir.path().join("prompts");
    fs::create_dir_all(&prompts_dir).expect("prompts dir");
    fs::write(
        prompts_dir.join("concise.md"),
        "---\ntitle: Concise\ndescription: Short answers\n---\n\nBe brief.\n",
    )
    .expect("write prompt");

    let store = SettingsStore::new(dir.path().join("config.toml"));
    let config = Config::default();
    let (stream_service, stream_rx) = ChatStreamService::new();
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let options = ChatOptions {
        server_url: server_url.to_string(),
        model: "test/model".to_string(),
        prompt: prompt.map(str::to_string),
    };
    let app = App::new(
        options,
        config,
        store,
        reqwest::Client::new(),
        stream_service,
        Arc::new(LocalPromptLibrary::new(prompts_dir)),
        action_tx,
    );
    Harness {
        app,
        stream_rx,
        action_rx,
        dir,
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn ctrl(ch: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
}

fn type_text(app: &mut App, text: &str) {
    for ch in text.chars() {
        handle_key(app, key(KeyCode::Char(ch)));
    }
}

fn model(id: &str, name: &str, price: &str) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: Some(name.to_string()),
        context_length: Some(8_000),
        pricing: Some(ModelPricing {
            prompt: Some(price.to_string()),
            completion: Some(price.to_string()),
        }),
        architecture: None,
        supported_parameters: None,
    }
}

fn saved_config(h: &Harness) -> Config {
    SettingsStore::new(h.dir.path().join("config.toml"))
        .load()
        .expect("config loads")
}

#[tokio::test]
async fn enter_streams_a_reply_into_the_history() {
    let server = spawn_chunked_server(ChunkedReply::Chunks {
        chunks: vec!["Hello ".into(), "world".into()],
        truncate: false,
    })
    .await;
    let mut h = harness(&server.url);

    type_text(&mut h.app, "Hi there");
    assert_eq!(handle_key(&mut h.app, key(KeyCode::Enter)), KeyOutcome::Handled);
    assert!(h.app.session.in_flight());
    assert!(h.app.input_text().is_empty());

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.app.session.in_flight() {
            if let Some((event, id)) = h.stream_rx.recv().await {
                h.app.apply_stream_event(event, id);
            }
        }
    })
    .await
    .expect("reply completes");

    let history = h.app.session.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].role, Role::User);
    assert_eq!(history[1].content, "Hi there");
    assert_eq!(history[2].role, Role::Assistant);
    assert_eq!(history[2].content, "Hello world");

    let request = server.captured().await.expect("request captured");
    assert!(request.request_line.starts_with("POST /api/chat"));
}

#[tokio::test]
async fn enter_is_ignored_while_a_reply_streams() {
    let mut h = harness("http://127.0.0.1:9");
    type_text(&mut h.app, "first");
    handle_key(&mut h.app, key(KeyCode::Enter));
    assert!(h.app.session.in_flight());

    type_text(&mut h.app, "second");
    handle_key(&mut h.app, key(KeyCode::Enter));

    assert_eq!(h.app.session.history().len(), 2);
    assert_eq!(h.app.input_text(), "second");
    assert_eq!(h.app.status.as_deref(), Some("Waiting for the current reply"));
}

#[tokio::test]
async fn alt_enter_inserts_a_newline() {
    let mut h = harness("http://127.0.0.1:9");
    type_text(&mut h.app, "a");
    handle_key(
        &mut h.app,
        KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT),
    );
    type_text(&mut h.app, "b");
    assert_eq!(h.app.input_text(), "a\nb");
    assert!(!h.app.session.in_flight());
}

#[tokio::test]
async fn ctrl_l_clears_an_idle_conversation() {
    let mut h = harness("http://127.0.0.1:9");
    let turn = h
        .app
        .session
        .begin_turn("Hello", Default::default())
        .expect("turn");
    h.app.apply_stream_event(
        ChunkEvent::Metadata(UsageMetadata {
            total_tokens: Some(12),
            ..UsageMetadata::default()
        }),
        turn.stream_id,
    );
    h.app
        .apply_stream_event(ChunkEvent::End("Hi".into()), turn.stream_id);
    assert_eq!(h.app.session.history().len(), 3);

    handle_key(&mut h.app, ctrl('l'));

    assert_eq!(h.app.session.history().len(), 1);
    assert_eq!(h.app.session.history()[0].role, Role::System);
    assert!(h.app.session.metrics().is_empty());
    assert!(h.app.session.transcript().is_empty());
}

#[tokio::test]
async fn ctrl_l_is_refused_while_streaming() {
    let mut h = harness("http://127.0.0.1:9");
    h.app
        .session
        .begin_turn("Hello", Default::default())
        .expect("turn");

    handle_key(&mut h.app, ctrl('l'));

    assert_eq!(h.app.session.history().len(), 2);
    assert!(h.app.status.is_some());
}

#[tokio::test]
async fn stale_stream_events_are_dropped() {
    let mut h = harness("http://127.0.0.1:9");
    let turn = h
        .app
        .session
        .begin_turn("Hello", Default::default())
        .expect("turn");
    h.app
        .stream_service
        .send_for_test(ChunkEvent::Content("old".into()), turn.stream_id + 10);
    h.app
        .stream_service
        .send_for_test(ChunkEvent::Content("new".into()), turn.stream_id);

    assert!(process_stream_updates(&mut h.app, &mut h.stream_rx));
    assert_eq!(h.app.session.live_reply(), Some("new"));
}

#[tokio::test]
async fn ctrl_c_exits_and_abandons_the_reply() {
    let mut h = harness("http://127.0.0.1:9");
    h.app
        .session
        .begin_turn("Hello", Default::default())
        .expect("turn");

    assert_eq!(handle_key(&mut h.app, ctrl('c')), KeyOutcome::Exit);
    assert!(h.app.exit_requested);

    h.app.shutdown();
    assert!(!h.app.session.in_flight());
    assert!(h.app.cancel_token.is_cancelled());
}

#[tokio::test]
async fn settings_tab_and_free_filter_are_persisted() {
    let mut h = harness("http://127.0.0.1:9");
    h.app.apply_action(AppAction::ModelsLoaded(Ok(vec![
        model("paid/model", "Paid", "0.000002"),
        model("free/model", "Free", "0"),
    ])));

    handle_key(&mut h.app, key(KeyCode::F(2)));
    assert_eq!(h.app.view, View::Settings);
    assert_eq!(h.app.active_tab(), SettingsTab::Models);
    assert_eq!(h.app.model_picker.items.len(), 2);

    handle_key(&mut h.app, key(KeyCode::Char('f')));
    assert!(h.app.config.free_only);
    assert_eq!(h.app.model_picker.items.len(), 1);
    assert!(saved_config(&h).free_only);

    handle_key(&mut h.app, key(KeyCode::Tab));
    assert_eq!(h.app.active_tab(), SettingsTab::Prompts);
    assert_eq!(saved_config(&h).active_tab, SettingsTab::Prompts);

    handle_key(&mut h.app, key(KeyCode::Esc));
    assert_eq!(h.app.view, View::Chat);
}

#[tokio::test]
async fn selecting_a_model_updates_session_and_settings() {
    let mut h = harness("http://127.0.0.1:9");
    h.app.apply_action(AppAction::ModelsLoaded(Ok(vec![
        model("b/model", "Bravo", "0.000001"),
        model("a/model", "Alpha", "0.000001"),
    ])));

    handle_key(&mut h.app, key(KeyCode::F(2)));
    // Sorted by display name: Alpha, Bravo.
    handle_key(&mut h.app, key(KeyCode::Down));
    handle_key(&mut h.app, key(KeyCode::Enter));

    assert_eq!(h.app.view, View::Chat);
    assert_eq!(h.app.session.model(), "b/model");
    assert_eq!(saved_config(&h).selected_model.as_deref(), Some("b/model"));
}

#[tokio::test]
async fn selecting_a_prompt_replaces_the_system_message() {
    let mut h = harness("http://127.0.0.1:9");
    h.app.load_prompts();
    let action = tokio::time::timeout(Duration::from_secs(5), h.action_rx.recv())
        .await
        .expect("prompts load")
        .expect("action");
    h.app.apply_action(action);

    handle_key(&mut h.app, key(KeyCode::F(2)));
    handle_key(&mut h.app, key(KeyCode::Tab));
    // Entry 0 is the default prompt.
    assert_eq!(h.app.prompt_picker.items[0].label, DEFAULT_PROMPT_LABEL);
    handle_key(&mut h.app, key(KeyCode::Down));
    handle_key(&mut h.app, key(KeyCode::Enter));
    assert_eq!(saved_config(&h).selected_prompt.as_deref(), Some("concise"));

    let action = tokio::time::timeout(Duration::from_secs(5), h.action_rx.recv())
        .await
        .expect("prompt content loads")
        .expect("action");
    h.app.apply_action(action);
    assert_eq!(h.app.session.system_prompt(), "Be brief.");
    assert_eq!(h.app.prompt_label, "Concise");

    handle_key(&mut h.app, key(KeyCode::F(2)));
    assert_eq!(h.app.prompt_picker.selected_id(), Some("concise"));
    handle_key(&mut h.app, key(KeyCode::Up));
    handle_key(&mut h.app, key(KeyCode::Enter));
    assert_eq!(h.app.session.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    assert_eq!(saved_config(&h).selected_prompt, None);
}

async fn next_action(h: &mut Harness) -> AppAction {
    tokio::time::timeout(Duration::from_secs(5), h.action_rx.recv())
        .await
        .expect("background work finishes")
        .expect("action")
}

#[tokio::test]
async fn sending_waits_for_the_startup_prompt() {
    let mut h = harness_with_prompt("http://127.0.0.1:9", Some("concise"));
    h.app.load_prompt_content("concise".to_string());

    type_text(&mut h.app, "hi");
    handle_key(&mut h.app, key(KeyCode::Enter));
    assert!(!h.app.session.in_flight());
    assert_eq!(h.app.status.as_deref(), Some("Loading system prompt…"));
    assert_eq!(h.app.input_text(), "hi");

    // A body for a prompt that is no longer wanted changes nothing.
    h.app.apply_action(AppAction::PromptContentLoaded {
        id: "verbose".into(),
        result: Ok(Some("Say a lot.".into())),
    });
    assert_eq!(h.app.session.system_prompt(), DEFAULT_SYSTEM_PROMPT);

    let action = next_action(&mut h).await;
    h.app.apply_action(action);
    assert_eq!(h.app.session.system_prompt(), "Be brief.");

    handle_key(&mut h.app, key(KeyCode::Enter));
    assert!(h.app.session.in_flight());
    h.app.shutdown();
}

#[tokio::test]
async fn failed_startup_prompt_does_not_block_sending() {
    let mut h = harness_with_prompt("http://127.0.0.1:9", Some("missing"));
    h.app.load_prompt_content("missing".to_string());
    let action = next_action(&mut h).await;
    h.app.apply_action(action);

    type_text(&mut h.app, "hi");
    handle_key(&mut h.app, key(KeyCode::Enter));
    assert!(h.app.session.in_flight());
    h.app.shutdown();
}

#[tokio::test]
async fn prompt_flag_is_highlighted_in_the_picker() {
    let mut h = harness_with_prompt("http://127.0.0.1:9", Some("concise"));
    assert_eq!(h.app.config.selected_prompt, None);
    h.app.load_prompts();
    let action = next_action(&mut h).await;
    h.app.apply_action(action);

    handle_key(&mut h.app, key(KeyCode::F(2)));
    assert_eq!(h.app.prompt_picker.selected_id(), Some("concise"));
}

#[tokio::test]
async fn rag_tab_switches_mode_only_when_complete() {
    let mut h = harness("http://127.0.0.1:9");

    handle_key(&mut h.app, key(KeyCode::F(2)));
    handle_key(&mut h.app, key(KeyCode::Tab));
    handle_key(&mut h.app, key(KeyCode::Tab));
    assert_eq!(h.app.active_tab(), SettingsTab::Rag);
    assert_eq!(saved_config(&h).active_tab, SettingsTab::Rag);
    handle_key(&mut h.app, key(KeyCode::BackTab));
    assert_eq!(h.app.active_tab(), SettingsTab::Prompts);
    handle_key(&mut h.app, key(KeyCode::BackTab));
    handle_key(&mut h.app, key(KeyCode::BackTab));
    assert_eq!(h.app.active_tab(), SettingsTab::Rag);

    assert_eq!(h.app.rag_picker.selected_id(), Some("local"));
    handle_key(&mut h.app, key(KeyCode::Down));
    handle_key(&mut h.app, key(KeyCode::Enter));
    assert_eq!(h.app.view, View::Chat);
    assert_eq!(h.app.config.rag.mode, RagMode::Server);
    assert_eq!(saved_config(&h).rag.mode, RagMode::Server);

    handle_key(&mut h.app, key(KeyCode::F(2)));
    assert_eq!(h.app.rag_picker.selected_id(), Some("server"));
    handle_key(&mut h.app, key(KeyCode::Down));
    handle_key(&mut h.app, key(KeyCode::Enter));
    assert_eq!(h.app.view, View::Settings);
    assert_eq!(
        h.app.status.as_deref(),
        Some("Tenant ID is required for cloud mode")
    );
    assert_eq!(saved_config(&h).rag.mode, RagMode::Server);
}

#[tokio::test]
async fn rag_details_show_the_local_path_check() {
    let mut h = harness("http://127.0.0.1:9");
    let store_dir = h.dir.path().join("chroma");
    h.app.config.rag.local_path = Some(store_dir);

    handle_key(&mut h.app, key(KeyCode::F(2)));
    assert_eq!(h.app.rag_path_status, Some(LocalPathStatus::WillCreate));

    let lines: Vec<String> = crate::ui::renderer::rag_details(&h.app)
        .iter()
        .map(|line| line.to_string())
        .collect();
    assert!(lines[1].starts_with("Local path  "));
    assert!(lines[1].ends_with("chroma (Directory will be created)"));
    assert_eq!(lines[2], "Server      localhost:8000");
    assert_eq!(lines[3], "Tenant      (unset)");
}

#[tokio::test]
async fn failed_model_load_is_reported_in_the_picker_state() {
    let mut h = harness("http://127.0.0.1:9");
    h.app
        .apply_action(AppAction::ModelsLoaded(Err("connection refused".into())));
    assert!(matches!(&h.app.models, Loadable::Failed(err) if err == "connection refused"));
    assert!(h.app.model_picker.is_empty());
}

#[test]
fn local_prompt_dir_takes_precedence() {
    let dir = TempDir::new().expect("tempdir");
    let config = Config {
        prompts_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    let source = prompt_source_for(&config, reqwest::Client::new(), "http://127.0.0.1:5000");
    assert!(!source.location().starts_with("http"));

    let source = prompt_source_for(
        &Config::default(),
        reqwest::Client::new(),
        "http://127.0.0.1:5000",
    );
    assert_eq!(source.location(), "http://127.0.0.1:5000");
}

#[test]
fn pasted_text_is_sanitized() {
    assert_eq!(sanitize_pasted_text("a\r\nb\rc\u{7}d\te"), "a\nb\ncd\te");
}
