//! Key handling for the chat and settings views.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tui_textarea::Input as TAInput;

use super::{App, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Handled,
    Ignored,
    Exit,
}

fn is_ctrl(key: &KeyEvent, ch: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(ch)
}

pub fn handle_key(app: &mut App, key: KeyEvent) -> KeyOutcome {
    if is_ctrl(&key, 'c') {
        app.request_exit();
        return KeyOutcome::Exit;
    }
    match app.view {
        View::Chat => handle_chat_key(app, key),
        View::Settings => handle_settings_key(app, key),
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent) -> KeyOutcome {
    if is_ctrl(&key, 'l') {
        app.clear_conversation();
        return KeyOutcome::Handled;
    }

    match key.code {
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) =>
        {
            app.input.insert_newline();
        }
        KeyCode::Enter => app.submit(),
        KeyCode::PageUp => app.scroll_up(),
        KeyCode::PageDown => app.scroll_down(),
        KeyCode::F(2) => app.open_settings(),
        _ => {
            if !app.input.input(TAInput::from(key)) {
                return KeyOutcome::Ignored;
            }
        }
    }
    KeyOutcome::Handled
}

fn handle_settings_key(app: &mut App, key: KeyEvent) -> KeyOutcome {
    match key.code {
        KeyCode::Esc | KeyCode::F(2) => app.close_settings(),
        KeyCode::Tab => app.next_tab(),
        KeyCode::BackTab => app.previous_tab(),
        KeyCode::Up | KeyCode::Char('k') => app.active_picker_mut().move_up(),
        KeyCode::Down | KeyCode::Char('j') => app.active_picker_mut().move_down(),
        KeyCode::Char('f') => app.toggle_free_only(),
        KeyCode::Char('r') => {
            app.load_models();
            app.load_prompts();
        }
        KeyCode::Enter => app.select_current(),
        _ => return KeyOutcome::Ignored,
    }
    KeyOutcome::Handled
}
