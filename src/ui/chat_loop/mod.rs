//! Interactive chat application state.
//!
//! [`App`] owns the [`ChatSession`] and everything the terminal UI shows
//! around it. Work that would block the loop (streaming replies, fetching the
//! model and prompt directories) runs on background tasks and reports back
//! through channels that the event loop drains into the app each frame.

mod event_loop;
mod keybindings;
mod lifecycle;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use ratatui::prelude::Size;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tui_textarea::TextArea;

use crate::api::models::{fetch_models, ModelCatalog};
use crate::api::{ModelInfo, PromptSummary};
use crate::core::chat_stream::{ChatStreamService, ChunkEvent, StreamParams};
use crate::core::config::rag::{check_local_path, ApiKeyStatus, LocalPathStatus};
use crate::core::config::{Config, SettingsStore, SettingsTab};
use crate::core::constants::DEFAULT_SYSTEM_PROMPT;
use crate::core::message::TranscriptKind;
use crate::core::prompts::PromptSource;
use crate::core::session::{ChatSession, EventEffect, SessionError};
use crate::ui::picker::{PickerItem, PickerState};
use crate::ui::theme::Theme;

pub use event_loop::run_chat;
pub use keybindings::{handle_key, KeyOutcome};

/// Label shown for the built-in system prompt.
pub const DEFAULT_PROMPT_LABEL: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Chat,
    Settings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loadable<T> {
    Loading,
    Ready(T),
    Failed(String),
}

/// Results of background work, applied on the UI task.
#[derive(Debug)]
pub enum AppAction {
    ModelsLoaded(Result<Vec<ModelInfo>, String>),
    PromptsLoaded(Result<Vec<PromptSummary>, String>),
    PromptContentLoaded {
        id: String,
        result: Result<Option<String>, String>,
    },
}

/// Startup choices that apply to this run only.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub server_url: String,
    pub model: String,
    pub prompt: Option<String>,
}

impl ChatOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            server_url: config.server_url().to_string(),
            model: config.model().to_string(),
            prompt: config.selected_prompt.clone(),
        }
    }
}

pub struct App {
    pub session: ChatSession,
    pub theme: Theme,
    pub config: Config,
    pub input: TextArea<'static>,
    pub view: View,
    pub models: Loadable<ModelCatalog>,
    pub prompts: Loadable<Vec<PromptSummary>>,
    pub model_picker: PickerState,
    pub prompt_picker: PickerState,
    pub rag_picker: PickerState,
    /// Id of the prompt in effect for this run; `None` for the default.
    pub prompt_id: Option<String>,
    pub prompt_label: String,
    /// Check of the local store directory, refreshed when settings open.
    pub rag_path_status: Option<LocalPathStatus>,
    pub api_key: ApiKeyStatus,
    pub server_url: String,
    /// Lines scrolled up from the bottom of the transcript.
    pub scroll_from_bottom: u16,
    pub status: Option<String>,
    pub last_term_size: Size,
    pub stream_started: Instant,
    pub exit_requested: bool,
    store: SettingsStore,
    client: reqwest::Client,
    stream_service: ChatStreamService,
    prompt_source: Arc<dyn PromptSource>,
    action_tx: mpsc::UnboundedSender<AppAction>,
    cancel_token: CancellationToken,
    /// Prompt whose body is still being fetched; sending waits for it.
    pending_prompt: Option<String>,
}

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        options: ChatOptions,
        config: Config,
        store: SettingsStore,
        client: reqwest::Client,
        stream_service: ChatStreamService,
        prompt_source: Arc<dyn PromptSource>,
        action_tx: mpsc::UnboundedSender<AppAction>,
    ) -> Self {
        Self {
            session: ChatSession::new(DEFAULT_SYSTEM_PROMPT, options.model),
            theme: Theme::dark_default(),
            config,
            input: TextArea::default(),
            view: View::Chat,
            models: Loadable::Loading,
            prompts: Loadable::Loading,
            model_picker: PickerState::default(),
            prompt_picker: PickerState::default(),
            rag_picker: PickerState::default(),
            prompt_id: options.prompt,
            prompt_label: DEFAULT_PROMPT_LABEL.to_string(),
            rag_path_status: None,
            api_key: ApiKeyStatus::from_env(),
            server_url: options.server_url,
            scroll_from_bottom: 0,
            status: None,
            last_term_size: Size::default(),
            stream_started: Instant::now(),
            exit_requested: false,
            store,
            client,
            stream_service,
            prompt_source,
            action_tx,
            cancel_token: CancellationToken::new(),
            pending_prompt: None,
        }
    }

    pub fn active_tab(&self) -> SettingsTab {
        self.config.active_tab
    }

    pub fn catalog(&self) -> Option<&ModelCatalog> {
        match &self.models {
            Loadable::Ready(catalog) => Some(catalog),
            _ => None,
        }
    }

    pub fn input_text(&self) -> String {
        self.input.lines().join("\n")
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    /// Persist a settings change and mirror it into the in-memory copy.
    fn persist<F>(&mut self, mutator: F)
    where
        F: Fn(&mut Config),
    {
        mutator(&mut self.config);
        let result = self.store.mutate(|config| {
            mutator(config);
            Ok(())
        });
        if let Err(err) = result {
            tracing::error!(error = %err, "failed to save settings");
            self.set_status(format!("Could not save settings: {err}"));
        }
    }

    // Chat view

    /// Send the input as the next user turn. Ignored while a reply streams
    /// or a newly chosen system prompt is still loading.
    pub fn submit(&mut self) {
        if self.session.in_flight() {
            self.set_status("Waiting for the current reply");
            return;
        }
        if self.pending_prompt.is_some() {
            self.set_status("Loading system prompt…");
            return;
        }

        let text = self.input_text();
        let empty_catalog = ModelCatalog::default();
        let catalog = self.catalog().unwrap_or(&empty_catalog);
        let sampling = self
            .config
            .sampling()
            .restricted_to(catalog, self.session.model());

        let turn = match self.session.begin_turn(&text, sampling) {
            Ok(turn) => turn,
            Err(SessionError::EmptyMessage) => return,
            Err(err) => {
                self.set_status(err.to_string());
                return;
            }
        };

        tracing::info!(
            request_id = %turn.request_id,
            model = %turn.request.model,
            stream_id = turn.stream_id,
            "chat turn started"
        );

        self.input = TextArea::default();
        self.status = None;
        self.scroll_from_bottom = 0;
        self.stream_started = Instant::now();
        self.stream_service.spawn_stream(StreamParams {
            client: self.client.clone(),
            server_url: self.server_url.clone(),
            request: turn.request,
            request_id: turn.request_id,
            cancel_token: self.cancel_token.child_token(),
            stream_id: turn.stream_id,
        });
    }

    pub fn apply_stream_event(&mut self, event: ChunkEvent, stream_id: u64) {
        match self.session.apply_event(stream_id, event) {
            EventEffect::Ignored => {
                tracing::debug!(stream_id, "dropping event for a finished stream");
            }
            EventEffect::Completed { committed } => {
                tracing::debug!(stream_id, committed, "reply complete");
            }
            EventEffect::Failed(err) => {
                tracing::warn!(stream_id, error = %err, "reply failed");
            }
            EventEffect::ContentUpdated | EventEffect::MetricsUpdated => {}
        }
    }

    pub fn clear_conversation(&mut self) {
        match self.session.clear() {
            Ok(()) => {
                self.scroll_from_bottom = 0;
                self.status = None;
            }
            Err(err) => self.set_status(err.to_string()),
        }
    }

    fn page_height(&self) -> u16 {
        crate::ui::renderer::transcript_height(self.last_term_size.height).max(1)
    }

    pub fn scroll_up(&mut self) {
        let max = crate::ui::renderer::max_scroll(self);
        self.scroll_from_bottom = self
            .scroll_from_bottom
            .saturating_add(self.page_height())
            .min(max);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(self.page_height());
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    /// Abandon any in-flight reply.
    pub fn shutdown(&mut self) {
        self.cancel_token.cancel();
        if self.session.in_flight() {
            tracing::info!("abandoning in-flight reply on exit");
            self.session.abandon();
        }
    }

    // Settings view

    pub fn open_settings(&mut self) {
        self.rebuild_model_picker();
        self.rebuild_prompt_picker();
        self.rebuild_rag_picker();
        self.status = None;
        self.view = View::Settings;
    }

    pub fn close_settings(&mut self) {
        self.view = View::Chat;
    }

    pub fn next_tab(&mut self) {
        let tab = self.config.active_tab.next();
        self.persist(|config| config.active_tab = tab);
    }

    pub fn previous_tab(&mut self) {
        let tab = self.config.active_tab.previous();
        self.persist(|config| config.active_tab = tab);
    }

    pub fn toggle_free_only(&mut self) {
        let free_only = !self.config.free_only;
        self.persist(|config| config.free_only = free_only);
        self.rebuild_model_picker();
    }

    pub fn active_picker_mut(&mut self) -> &mut PickerState {
        match self.config.active_tab {
            SettingsTab::Models => &mut self.model_picker,
            SettingsTab::Prompts => &mut self.prompt_picker,
            SettingsTab::Rag => &mut self.rag_picker,
        }
    }

    fn rebuild_model_picker(&mut self) {
        self.model_picker = match &self.models {
            Loadable::Ready(catalog) => {
                PickerState::from_models(catalog, self.config.free_only, self.session.model())
            }
            _ => PickerState::default(),
        };
    }

    fn rebuild_prompt_picker(&mut self) {
        let current = self.prompt_id.as_deref().unwrap_or_default();
        let mut picker = match &self.prompts {
            Loadable::Ready(prompts) => PickerState::from_prompts(prompts, Some(current)),
            _ => PickerState::default(),
        };
        picker.items.insert(
            0,
            PickerItem {
                id: String::new(),
                label: DEFAULT_PROMPT_LABEL.to_string(),
                detail: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
        );
        picker.selected = picker
            .items
            .iter()
            .position(|item| item.id == current)
            .unwrap_or(0);
        self.prompt_picker = picker;
    }

    fn rebuild_rag_picker(&mut self) {
        self.rag_picker = PickerState::from_rag_modes(&self.config.rag);
        self.rag_path_status = self.config.rag.local_path.as_deref().map(check_local_path);
    }

    /// Apply the highlighted entry of the active tab.
    pub fn select_current(&mut self) {
        match self.config.active_tab {
            SettingsTab::Models => {
                let Some(id) = self.model_picker.selected_id().map(str::to_string) else {
                    return;
                };
                self.select_model(&id);
            }
            SettingsTab::Prompts => {
                let Some(item) = self.prompt_picker.selected_item().cloned() else {
                    return;
                };
                self.select_prompt(&item);
            }
            SettingsTab::Rag => {
                let Some(mode) = self.rag_picker.selected_id().map(str::to_string) else {
                    return;
                };
                if !self.select_rag_mode(&mode) {
                    return;
                }
            }
        }
        self.view = View::Chat;
    }

    fn select_model(&mut self, id: &str) {
        tracing::info!(model = %id, "model selected");
        self.session.set_model(id);
        let selected = id.to_string();
        self.persist(move |config| config.selected_model = Some(selected.clone()));
        self.session
            .push_notice(TranscriptKind::Info, format!("Model set to {id}"));
    }

    /// Switch the retrieval mode. An incomplete mode is refused and the
    /// settings view stays open with the reason.
    fn select_rag_mode(&mut self, mode: &str) -> bool {
        let mut updated = self.config.clone();
        if let Err(err) = updated.set_value("rag-mode", mode) {
            tracing::warn!(mode, error = %err, "retrieval mode refused");
            self.set_status(err.to_string());
            return false;
        }
        let selected = updated.rag.mode;
        self.persist(move |config| config.rag.mode = selected);
        self.rebuild_rag_picker();
        self.session
            .push_notice(TranscriptKind::Info, format!("RAG mode set to {mode}"));
        true
    }

    fn select_prompt(&mut self, item: &PickerItem) {
        if item.id.is_empty() {
            self.prompt_id = None;
            self.pending_prompt = None;
            self.persist(|config| config.selected_prompt = None);
            self.session.set_system_prompt(DEFAULT_SYSTEM_PROMPT);
            self.prompt_label = DEFAULT_PROMPT_LABEL.to_string();
            self.session.push_notice(
                TranscriptKind::Info,
                format!("System prompt set to {DEFAULT_PROMPT_LABEL}"),
            );
            return;
        }
        self.prompt_id = Some(item.id.clone());
        let selected = item.id.clone();
        self.persist(move |config| config.selected_prompt = Some(selected.clone()));
        self.load_prompt_content(item.id.clone());
    }

    // Background loading

    pub fn load_models(&mut self) {
        self.models = Loadable::Loading;
        let client = self.client.clone();
        let server_url = self.server_url.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let result = fetch_models(&client, &server_url)
                .await
                .map_err(|err| err.to_string());
            let _ = tx.send(AppAction::ModelsLoaded(result));
        });
    }

    pub fn load_prompts(&mut self) {
        self.prompts = Loadable::Loading;
        let source = Arc::clone(&self.prompt_source);
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let result = source.list().await.map_err(|err| err.to_string());
            let _ = tx.send(AppAction::PromptsLoaded(result));
        });
    }

    pub fn load_prompt_content(&mut self, id: String) {
        self.pending_prompt = Some(id.clone());
        let source = Arc::clone(&self.prompt_source);
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let result = source.content(&id).await.map_err(|err| err.to_string());
            let _ = tx.send(AppAction::PromptContentLoaded { id, result });
        });
    }

    pub fn apply_action(&mut self, action: AppAction) {
        match action {
            AppAction::ModelsLoaded(Ok(models)) => {
                tracing::debug!(count = models.len(), "models loaded");
                self.models = Loadable::Ready(ModelCatalog::new(models));
                self.rebuild_model_picker();
            }
            AppAction::ModelsLoaded(Err(err)) => {
                tracing::warn!(error = %err, "could not load models");
                self.models = Loadable::Failed(err);
                self.rebuild_model_picker();
            }
            AppAction::PromptsLoaded(Ok(prompts)) => {
                // The prompt body may have arrived first and been labelled by id.
                if let Some(prompt) = prompts.iter().find(|p| p.id == self.prompt_label) {
                    self.prompt_label = prompt.display_title().to_string();
                }
                self.prompts = Loadable::Ready(prompts);
                self.rebuild_prompt_picker();
            }
            AppAction::PromptsLoaded(Err(err)) => {
                tracing::warn!(error = %err, "could not load prompts");
                self.prompts = Loadable::Failed(err);
                self.rebuild_prompt_picker();
            }
            AppAction::PromptContentLoaded { id, .. }
                if self.pending_prompt.as_deref() != Some(id.as_str()) =>
            {
                tracing::debug!(prompt = %id, "dropping superseded prompt body");
            }
            AppAction::PromptContentLoaded { id, result } => {
                self.pending_prompt = None;
                self.apply_prompt_content(id, result);
            }
        }
    }

    fn apply_prompt_content(&mut self, id: String, result: Result<Option<String>, String>) {
        match result {
            Ok(Some(content)) => {
                self.session.set_system_prompt(content);
                let label = match &self.prompts {
                    Loadable::Ready(prompts) => prompts
                        .iter()
                        .find(|p| p.id == id)
                        .map(|p| p.display_title().to_string()),
                    _ => None,
                };
                self.prompt_label = label.unwrap_or_else(|| id.clone());
                self.session.push_notice(
                    TranscriptKind::Info,
                    format!("System prompt set to {}", self.prompt_label),
                );
            }
            Ok(None) => {
                tracing::warn!(prompt = %id, "selected prompt not found");
                self.session
                    .push_notice(TranscriptKind::Error, format!("Prompt not found: {id}"));
            }
            Err(err) => {
                tracing::warn!(prompt = %id, error = %err, "could not load prompt");
                self.session.push_notice(
                    TranscriptKind::Error,
                    format!("Could not load prompt {id}: {err}"),
                );
            }
        }
    }
}
