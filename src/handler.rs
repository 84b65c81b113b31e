use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

use crate::app::Command;
use crate::tui::AppEvent;
use crate::view::{Focus, TerminalView};

const SCROLL_STEP: u16 = 3;

/// Apply a terminal event: local edits go straight to the view, anything that
/// needs the chat service becomes a [`Command`].
pub fn handle_event(view: &TerminalView, commands: &UnboundedSender<Command>, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(view, commands, key),
        AppEvent::Mouse(mouse) => handle_mouse(view, mouse),
        AppEvent::Paste(text) => view.state_mut().insert_str(&text),
        AppEvent::Resize => {}
        AppEvent::Tick => view.state_mut().tick(Instant::now()),
    }
}

fn handle_key(view: &TerminalView, commands: &UnboundedSender<Command>, key: KeyEvent) {
    let send = |command| {
        let _ = commands.send(command);
    };

    // Global keys that work in any pane
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => return send(Command::Quit),
            KeyCode::Char('n') => return send(Command::NewChat),
            KeyCode::Char('r') => return send(Command::RefreshChats),
            _ => {}
        }
    }
    if key.code == KeyCode::Tab {
        let mut state = view.state_mut();
        state.cancel_delete();
        state.toggle_focus();
        return;
    }

    let focus = view.state().focus;
    let deleting = focus == Focus::Sidebar
        && matches!(key.code, KeyCode::Char('d') | KeyCode::Delete);
    if !deleting {
        view.state_mut().cancel_delete();
    }

    match focus {
        Focus::Composer => handle_composer_key(view, send, key),
        Focus::Sidebar => handle_sidebar_key(view, send, key),
    }
}

fn handle_composer_key(view: &TerminalView, send: impl Fn(Command), key: KeyEvent) {
    let mut state = view.state_mut();
    match key.code {
        KeyCode::Enter => {
            // Disabled composer means the send control is unavailable
            if state.input_enabled {
                send(Command::Send);
            }
        }
        KeyCode::Esc => state.focus = Focus::Sidebar,
        KeyCode::Backspace => state.backspace(),
        KeyCode::Delete => state.delete_char(),
        KeyCode::Left => state.cursor_left(),
        KeyCode::Right => state.cursor_right(),
        KeyCode::Home => state.cursor_home(),
        KeyCode::End => state.cursor_end(),
        KeyCode::Up => state.scroll_up(1),
        KeyCode::Down => state.scroll_down(1),
        KeyCode::PageUp => {
            let page = state.transcript_height.max(1);
            state.scroll_up(page);
        }
        KeyCode::PageDown => {
            let page = state.transcript_height.max(1);
            state.scroll_down(page);
        }
        KeyCode::Char(c) => state.insert_char(c),
        _ => {}
    }
}

fn handle_sidebar_key(view: &TerminalView, send: impl Fn(Command), key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => send(Command::Quit),
        KeyCode::Char('j') | KeyCode::Down => view.state_mut().sidebar_down(),
        KeyCode::Char('k') | KeyCode::Up => view.state_mut().sidebar_up(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => view.activate_selected(),
        KeyCode::Char('d') | KeyCode::Delete => {
            // A second press on the same chat confirms
            let mut state = view.state_mut();
            let confirmed = state
                .selected_chat_id()
                .filter(|&chat_id| state.request_delete(chat_id));
            drop(state);
            if let Some(chat_id) = confirmed {
                send(Command::DeleteChat(chat_id));
            }
        }
        KeyCode::Char('n') => send(Command::NewChat),
        KeyCode::Char('r') => send(Command::RefreshChats),
        KeyCode::Char('i') | KeyCode::Esc => view.state_mut().focus = Focus::Composer,
        KeyCode::PageUp => view.state_mut().scroll_up(SCROLL_STEP),
        KeyCode::PageDown => view.state_mut().scroll_down(SCROLL_STEP),
        _ => {}
    }
}

fn handle_mouse(view: &TerminalView, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => view.state_mut().scroll_down(SCROLL_STEP),
        MouseEventKind::ScrollUp => view.state_mut().scroll_up(SCROLL_STEP),
        _ => {}
    }
}
