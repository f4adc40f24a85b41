//! Event polling, dispatching, and frame drawing.
//!
//! Terminal input is read on a dedicated task and forwarded over a channel.
//! Each pass of the loop drains that channel, the stream event channel and
//! the background action channel into the [`App`], then redraws when
//! anything changed.

use std::error::Error;
use std::time::{Duration, Instant};

use ratatui::crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc;

use super::keybindings::{handle_key, KeyOutcome};
use super::lifecycle::{restore_terminal, setup_terminal, ChatTerminal};
use super::{App, AppAction, ChatOptions};
use crate::core::chat_stream::{ChatStreamService, ChunkEvent};
use crate::core::config::{Config, SettingsStore};
use crate::core::prompts::prompt_source_for;
use crate::ui::renderer::ui;

const MAX_FPS: u64 = 30;

#[derive(Debug)]
enum UiEvent {
    Crossterm(Event),
}

pub(crate) fn sanitize_pasted_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect()
}

fn spawn_event_reader(event_tx: mpsc::UnboundedSender<UiEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Ok(true) = event::poll(Duration::from_millis(10)) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(UiEvent::Crossterm(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => continue,
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
}

/// Apply pending terminal events. Returns (processed_any, exit_requested).
fn process_ui_events(
    app: &mut App,
    event_rx: &mut mpsc::UnboundedReceiver<UiEvent>,
) -> (bool, bool) {
    let mut processed = false;
    while let Ok(ev) = event_rx.try_recv() {
        processed = true;
        match ev {
            UiEvent::Crossterm(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if handle_key(app, key) == KeyOutcome::Exit {
                    return (true, true);
                }
            }
            UiEvent::Crossterm(Event::Paste(text)) => {
                if app.view == super::View::Chat {
                    app.input.insert_str(sanitize_pasted_text(&text));
                }
            }
            UiEvent::Crossterm(_) => {}
        }
    }
    (processed, false)
}

pub(crate) fn process_stream_updates(
    app: &mut App,
    rx: &mut mpsc::UnboundedReceiver<(ChunkEvent, u64)>,
) -> bool {
    let mut received_any = false;
    while let Ok((event, stream_id)) = rx.try_recv() {
        received_any = true;
        app.apply_stream_event(event, stream_id);
    }
    received_any
}

fn drain_action_queue(app: &mut App, rx: &mut mpsc::UnboundedReceiver<AppAction>) -> bool {
    let mut applied = false;
    while let Ok(action) = rx.try_recv() {
        applied = true;
        app.apply_action(action);
    }
    applied
}

fn draw(terminal: &mut ChatTerminal, app: &mut App) -> Result<(), Box<dyn Error>> {
    app.last_term_size = terminal.size()?;
    terminal.draw(|f| ui(f, app))?;
    Ok(())
}

pub async fn run_chat(
    options: ChatOptions,
    config: Config,
    store: SettingsStore,
) -> Result<(), Box<dyn Error>> {
    let client = reqwest::Client::new();
    let (stream_service, mut stream_rx) = ChatStreamService::new();
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<AppAction>();
    let prompt_source = prompt_source_for(&config, client.clone(), &options.server_url);
    let startup_prompt = options.prompt.clone();

    tracing::info!(
        server = %options.server_url,
        model = %options.model,
        prompts = %prompt_source.location(),
        "starting chat session"
    );

    let mut app = App::new(
        options,
        config,
        store,
        client,
        stream_service,
        prompt_source,
        action_tx,
    );
    app.load_models();
    app.load_prompts();
    if let Some(id) = startup_prompt {
        app.load_prompt_content(id);
    }

    let mut terminal = setup_terminal()?;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let event_reader_handle = spawn_event_reader(event_tx);

    let frame_duration = Duration::from_millis(1000 / MAX_FPS);
    let mut last_draw = Instant::now() - frame_duration;
    let mut request_redraw = true;

    let result = loop {
        if app.exit_requested {
            break Ok(());
        }

        // Keep the streaming indicator moving.
        if app.session.in_flight() {
            request_redraw = true;
        }

        if request_redraw && last_draw.elapsed() >= frame_duration {
            if let Err(err) = draw(&mut terminal, &mut app) {
                break Err(err);
            }
            last_draw = Instant::now();
            request_redraw = false;
        }

        let (events_processed, exit) = process_ui_events(&mut app, &mut event_rx);
        if exit {
            break Ok(());
        }
        let received_any = process_stream_updates(&mut app, &mut stream_rx);
        let actions_applied = drain_action_queue(&mut app, &mut action_rx);

        if events_processed || received_any || actions_applied {
            request_redraw = true;
        } else {
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
    };

    app.shutdown();
    event_reader_handle.abort();
    restore_terminal(&mut terminal)?;
    tracing::info!(
        requests = app.session.metrics().requests,
        total_tokens = app.session.metrics().total_tokens,
        "chat session ended"
    );

    result
}
