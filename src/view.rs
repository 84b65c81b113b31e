//! Presentation state of the chat client.
//!
//! [`ViewState`] owns everything the user can see: the transcript, the chat
//! list, the composer, the loading flag and the error banner. The renderer in
//! `ui.rs` draws it every frame; nothing else reads it. The orchestrator only
//! talks to it through the [`ChatView`] trait, which [`TerminalView`]
//! implements on a shared handle.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::{Duration, Instant};

use ratatui::widgets::ListState;

use crate::state::{display_title, Chat, Role, DEFAULT_CHAT_TITLE};

/// How long an error banner stays up.
pub const ERROR_DISMISS_AFTER: Duration = Duration::from_secs(5);
/// How long a notice stays in the status line.
pub const NOTICE_DISMISS_AFTER: Duration = Duration::from_secs(3);

pub const NO_CHATS_PLACEHOLDER: &str = "No chats yet";
pub const CONFIRM_DELETE_NOTICE: &str = "Press d again to delete this chat";

/// Called with the chat id when a sidebar entry is activated.
pub type SelectHandler = Rc<dyn Fn(i64)>;

/// Operations the orchestrator may perform on the UI.
///
/// None of them touch the network and none of them fail.
pub trait ChatView {
    fn add_message(&self, content: &str, role: Role, animate: bool);
    fn clear_messages(&self);
    fn show_loading(&self);
    fn hide_loading(&self);
    fn show_error(&self, message: &str);
    fn show_notice(&self, message: &str);
    fn update_chat_list(&self, chats: &[Chat], on_select: SelectHandler);
    fn set_current_chat(&self, chat_id: Option<i64>, title: &str);
    fn current_chat_id(&self) -> Option<i64>;
    fn set_input_enabled(&self, enabled: bool);
    fn clear_input(&self);
    /// Composer text without surrounding whitespace.
    fn input_message(&self) -> String;
}

/// A message as drawn in the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    /// Drawn dimmed until the next tick.
    pub entering: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SidebarEntry {
    Placeholder,
    Chat {
        id: i64,
        title: String,
        updated: String,
        active: bool,
    },
}

impl SidebarEntry {
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            SidebarEntry::Placeholder => None,
            SidebarEntry::Chat { id, .. } => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Composer,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct ViewState {
    // Transcript
    pub messages: Vec<TranscriptEntry>,
    pub transcript_scroll: u16,
    pub follow_tail: bool,
    pub transcript_height: u16, // inner height of the transcript pane
    pub transcript_lines: u16,  // wrapped line count of the last rendered frame

    // Sidebar
    pub sidebar: Vec<SidebarEntry>,
    pub sidebar_state: ListState,
    on_select: Option<SelectHandler>,
    pending_delete: Option<i64>,

    // Current chat
    current_chat_id: Option<i64>,
    pub title: String,

    // Composer
    pub input: String,
    pub cursor: usize,
    pub input_enabled: bool,
    pub focus: Focus,

    // Indicators
    pub loading: bool,
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub error: Option<String>,
    error_dismissals: Vec<Instant>,
    pub notice: Option<String>,
    notice_until: Option<Instant>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    /// Initial state: empty transcript, empty sidebar, input disabled until
    /// startup has finished.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            transcript_scroll: 0,
            follow_tail: true,
            transcript_height: 0,
            transcript_lines: 0,

            sidebar: Vec::new(),
            sidebar_state: ListState::default(),
            on_select: None,
            pending_delete: None,

            current_chat_id: None,
            title: DEFAULT_CHAT_TITLE.to_string(),

            input: String::new(),
            cursor: 0,
            input_enabled: false,
            focus: Focus::Composer,

            loading: false,
            animation_frame: 0,
            error: None,
            error_dismissals: Vec::new(),
            notice: None,
            notice_until: None,
        }
    }

    pub fn add_message(&mut self, content: &str, role: Role, animate: bool) {
        self.messages.push(TranscriptEntry {
            role,
            content: content.to_string(),
            entering: animate,
        });
        self.follow_tail = true;
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.transcript_scroll = 0;
        self.follow_tail = true;
    }

    pub fn show_loading(&mut self) {
        self.loading = true;
        self.set_input_enabled(false);
    }

    pub fn hide_loading(&mut self) {
        self.loading = false;
        self.set_input_enabled(true);
    }

    pub fn show_error(&mut self, message: &str) {
        self.show_error_at(message, Instant::now());
    }

    /// Show `message` and schedule its dismissal relative to `now`.
    ///
    /// Dismissals already scheduled stay in place, so an older deadline can
    /// hide a newer message early.
    pub fn show_error_at(&mut self, message: &str, now: Instant) {
        self.error = Some(message.to_string());
        self.error_dismissals.push(now + ERROR_DISMISS_AFTER);
    }

    pub fn show_notice(&mut self, message: &str) {
        self.notice = Some(message.to_string());
        self.notice_until = Some(Instant::now() + NOTICE_DISMISS_AFTER);
    }

    pub fn update_chat_list(&mut self, chats: &[Chat], on_select: SelectHandler) {
        self.sidebar = if chats.is_empty() {
            vec![SidebarEntry::Placeholder]
        } else {
            chats
                .iter()
                .map(|chat| SidebarEntry::Chat {
                    id: chat.id,
                    title: chat.display_title().to_string(),
                    updated: chat.updated_label(),
                    active: false,
                })
                .collect()
        };
        self.on_select = Some(on_select);
        self.mark_active();

        let selected = self
            .sidebar_state
            .selected()
            .unwrap_or(0)
            .min(self.sidebar.len() - 1);
        self.sidebar_state.select(Some(selected));
    }

    pub fn set_current_chat(&mut self, chat_id: Option<i64>, title: &str) {
        self.current_chat_id = chat_id;
        self.title = display_title(title).to_string();
        self.mark_active();
    }

    pub fn current_chat_id(&self) -> Option<i64> {
        self.current_chat_id
    }

    fn mark_active(&mut self) {
        let current = self.current_chat_id;
        for entry in &mut self.sidebar {
            if let SidebarEntry::Chat { id, active, .. } = entry {
                *active = Some(*id) == current;
            }
        }
    }

    pub fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
        if enabled {
            self.focus = Focus::Composer;
        }
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    pub fn input_message(&self) -> String {
        self.input.trim().to_string()
    }

    /// Advance timed effects: finish entering animations, step the loading
    /// ellipsis, and drop banners whose deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        for entry in &mut self.messages {
            entry.entering = false;
        }

        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        let scheduled = self.error_dismissals.len();
        self.error_dismissals.retain(|deadline| *deadline > now);
        if self.error_dismissals.len() < scheduled {
            self.error = None;
        }

        if self.notice_until.is_some_and(|until| until <= now) {
            self.notice = None;
            self.notice_until = None;
            self.pending_delete = None;
        }
    }

    // Composer editing

    pub fn insert_char(&mut self, c: char) {
        if !self.input_enabled {
            return;
        }
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars().filter(|c| !c.is_control() || *c == ' ') {
            self.insert_char(c);
        }
    }

    pub fn backspace(&mut self) {
        if !self.input_enabled || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.remove(byte_pos);
    }

    pub fn delete_char(&mut self) {
        if !self.input_enabled {
            return;
        }
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // Sidebar navigation

    pub fn sidebar_down(&mut self) {
        if self.sidebar.is_empty() {
            return;
        }
        let i = match self.sidebar_state.selected() {
            Some(i) if i + 1 < self.sidebar.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.sidebar_state.select(Some(i));
    }

    pub fn sidebar_up(&mut self) {
        if self.sidebar.is_empty() {
            return;
        }
        let i = self.sidebar_state.selected().unwrap_or(0).saturating_sub(1);
        self.sidebar_state.select(Some(i));
    }

    /// Chat id under the sidebar cursor; `None` on the placeholder.
    pub fn selected_chat_id(&self) -> Option<i64> {
        self.sidebar_state
            .selected()
            .and_then(|i| self.sidebar.get(i))
            .and_then(SidebarEntry::chat_id)
    }

    /// First call arms deletion of `chat_id` and asks for confirmation;
    /// a second call for the same chat, before the notice expires, confirms.
    pub fn request_delete(&mut self, chat_id: i64) -> bool {
        if self.pending_delete == Some(chat_id) {
            self.cancel_delete();
            return true;
        }
        self.pending_delete = Some(chat_id);
        self.show_notice(CONFIRM_DELETE_NOTICE);
        false
    }

    pub fn cancel_delete(&mut self) {
        if self.pending_delete.take().is_some() {
            self.notice = None;
            self.notice_until = None;
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Sidebar => Focus::Composer,
            Focus::Composer => Focus::Sidebar,
        };
    }

    // Transcript scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let bottom = self.bottom_scroll();
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines).min(bottom);
        if self.transcript_scroll == bottom {
            self.follow_tail = true;
        }
    }

    fn bottom_scroll(&self) -> u16 {
        self.transcript_lines.saturating_sub(self.transcript_height)
    }

    /// Keep the newest message in view unless the user scrolled away.
    ///
    /// The renderer sets `transcript_lines` and `transcript_height` from the
    /// wrapped paragraph before calling this.
    pub fn sync_scroll(&mut self) {
        if self.follow_tail {
            self.transcript_scroll = self.bottom_scroll();
        }
    }
}

/// Shared handle to the view state, cloned into the orchestrator and the
/// event loop. Everything runs on one thread, and no borrow is held across an
/// await point.
#[derive(Clone, Default)]
pub struct TerminalView {
    state: Rc<RefCell<ViewState>>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, ViewState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, ViewState> {
        self.state.borrow_mut()
    }

    /// Activate the sidebar entry under the cursor. The placeholder entry
    /// activates nothing.
    pub fn activate_selected(&self) {
        let target = {
            let state = self.state.borrow();
            state.selected_chat_id().zip(state.on_select.clone())
        };
        if let Some((chat_id, on_select)) = target {
            on_select(chat_id);
        }
    }
}

impl ChatView for TerminalView {
    fn add_message(&self, content: &str, role: Role, animate: bool) {
        self.state_mut().add_message(content, role, animate);
    }

    fn clear_messages(&self) {
        self.state_mut().clear_messages();
    }

    fn show_loading(&self) {
        self.state_mut().show_loading();
    }

    fn hide_loading(&self) {
        self.state_mut().hide_loading();
    }

    fn show_error(&self, message: &str) {
        self.state_mut().show_error(message);
    }

    fn show_notice(&self, message: &str) {
        self.state_mut().show_notice(message);
    }

    fn update_chat_list(&self, chats: &[Chat], on_select: SelectHandler) {
        self.state_mut().update_chat_list(chats, on_select);
    }

    fn set_current_chat(&self, chat_id: Option<i64>, title: &str) {
        self.state_mut().set_current_chat(chat_id, title);
    }

    fn current_chat_id(&self) -> Option<i64> {
        self.state().current_chat_id()
    }

    fn set_input_enabled(&self, enabled: bool) {
        self.state_mut().set_input_enabled(enabled);
    }

    fn clear_input(&self) {
        self.state_mut().clear_input();
    }

    fn input_message(&self) -> String {
        self.state().input_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn chat(id: i64, title: &str) -> Chat {
        Chat {
            id,
            title: Some(title.to_string()),
            created_at: None,
            updated_at: Some("2026-02-19T12:00:00".to_string()),
            user_id: None,
            message_count: None,
            messages: Vec::new(),
        }
    }

    fn counting_handler() -> (SelectHandler, Rc<RefCell<Vec<i64>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        (Rc::new(move |id| sink.borrow_mut().push(id)), calls)
    }

    #[test]
    fn test_add_message_appends_and_follows_tail() {
        let mut view = ViewState::new();
        view.follow_tail = false;

        view.add_message("Hello", Role::User, true);
        view.add_message("Hi there", Role::Assistant, false);

        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[0].content, "Hello");
        assert!(view.messages[0].entering);
        assert!(!view.messages[1].entering);
        assert!(view.follow_tail);
    }

    #[test]
    fn test_entering_animation_ends_on_next_tick() {
        let mut view = ViewState::new();
        view.add_message("Hello", Role::User, true);

        view.tick(Instant::now());

        assert!(!view.messages[0].entering);
    }

    #[test]
    fn test_clear_messages_keeps_current_chat() {
        let mut view = ViewState::new();
        view.set_current_chat(Some(3), "Rust");
        view.add_message("Hello", Role::User, false);

        view.clear_messages();

        assert!(view.messages.is_empty());
        assert_eq!(view.current_chat_id(), Some(3));
    }

    #[test]
    fn test_loading_pairs_with_input_state() {
        let mut view = ViewState::new();
        view.set_input_enabled(true);
        view.focus = Focus::Sidebar;

        view.show_loading();
        assert!(view.loading);
        assert!(!view.input_enabled);

        view.hide_loading();
        assert!(!view.loading);
        assert!(view.input_enabled);
        assert_eq!(view.focus, Focus::Composer);
    }

    #[test]
    fn test_hide_loading_without_show_is_harmless() {
        let mut view = ViewState::new();

        view.hide_loading();
        view.hide_loading();

        assert!(!view.loading);
        assert!(view.input_enabled);
    }

    #[test]
    fn test_error_dismissed_after_delay() {
        let mut view = ViewState::new();
        let start = Instant::now();
        view.show_error_at("Failed to send message", start);

        view.tick(start + Duration::from_secs(4));
        assert_eq!(view.error.as_deref(), Some("Failed to send message"));

        view.tick(start + ERROR_DISMISS_AFTER);
        assert!(view.error.is_none());
    }

    #[test]
    fn test_earlier_dismissal_hides_newer_error() {
        let mut view = ViewState::new();
        let start = Instant::now();
        view.show_error_at("first", start);
        view.show_error_at("second", start + Duration::from_secs(3));
        assert_eq!(view.error.as_deref(), Some("second"));

        view.tick(start + ERROR_DISMISS_AFTER);
        assert!(view.error.is_none());

        // The second message's deadline also hides a later error early.
        view.show_error_at("third", start + Duration::from_secs(6));
        view.tick(start + Duration::from_secs(8));
        assert!(view.error.is_none());
    }

    #[test]
    fn test_empty_chat_list_shows_single_placeholder() {
        let view = TerminalView::new();
        let (handler, calls) = counting_handler();

        view.update_chat_list(&[], handler);

        {
            let state = view.state();
            assert_eq!(state.sidebar, vec![SidebarEntry::Placeholder]);
            assert_eq!(state.selected_chat_id(), None);
        }
        view.activate_selected();
        view.activate_selected();
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_chat_list_marks_current_and_activates() {
        let view = TerminalView::new();
        view.set_current_chat(Some(2), "Second");
        let (handler, calls) = counting_handler();

        view.update_chat_list(&[chat(1, "First"), chat(2, "Second"), chat(3, "")], handler);

        {
            let state = view.state();
            let active: Vec<_> = state
                .sidebar
                .iter()
                .map(|e| matches!(e, SidebarEntry::Chat { active: true, .. }))
                .collect();
            assert_eq!(active, [false, true, false]);
            match &state.sidebar[2] {
                SidebarEntry::Chat { title, updated, .. } => {
                    assert_eq!(title, DEFAULT_CHAT_TITLE);
                    assert_eq!(updated, "2026-02-19 12:00");
                }
                other => panic!("unexpected entry: {other:?}"),
            }
        }

        view.state_mut().sidebar_down();
        view.activate_selected();
        assert_eq!(*calls.borrow(), [2]);
    }

    #[test]
    fn test_set_current_chat_rederives_active_entry() {
        let mut view = ViewState::new();
        view.update_chat_list(&[chat(1, "First"), chat(2, "Second")], Rc::new(|_| {}));

        view.set_current_chat(Some(1), "");

        assert_eq!(view.title, DEFAULT_CHAT_TITLE);
        assert!(matches!(view.sidebar[0], SidebarEntry::Chat { active: true, .. }));
        assert!(matches!(view.sidebar[1], SidebarEntry::Chat { active: false, .. }));

        view.set_current_chat(None, DEFAULT_CHAT_TITLE);
        assert!(view
            .sidebar
            .iter()
            .all(|e| matches!(e, SidebarEntry::Chat { active: false, .. })));
    }

    #[test]
    fn test_chat_list_replacement_clamps_cursor() {
        let mut view = ViewState::new();
        view.update_chat_list(&[chat(1, "a"), chat(2, "b"), chat(3, "c")], Rc::new(|_| {}));
        view.sidebar_down();
        view.sidebar_down();
        assert_eq!(view.selected_chat_id(), Some(3));

        view.update_chat_list(&[chat(9, "only")], Rc::new(|_| {}));
        assert_eq!(view.selected_chat_id(), Some(9));
    }

    #[test]
    fn test_input_message_is_trimmed() {
        let mut view = ViewState::new();
        view.set_input_enabled(true);
        view.insert_str("  Hello there \t");

        assert_eq!(view.input_message(), "Hello there");

        view.clear_input();
        assert_eq!(view.input_message(), "");
        assert_eq!(view.cursor, 0);
    }

    #[test]
    fn test_disabled_composer_ignores_typing() {
        let mut view = ViewState::new();
        view.insert_char('x');
        assert!(view.input.is_empty());
    }

    #[test]
    fn test_composer_editing_is_utf8_safe() {
        let mut view = ViewState::new();
        view.set_input_enabled(true);
        view.insert_str("Привет");
        view.cursor_left();
        view.backspace();
        assert_eq!(view.input, "Привт");

        view.cursor_home();
        view.delete_char();
        view.cursor_end();
        view.insert_char('!');
        assert_eq!(view.input, "ривт!");
    }

    #[test]
    fn test_scrolling_up_stops_following() {
        let mut view = ViewState::new();
        view.transcript_height = 2;
        view.transcript_lines = 15;
        view.sync_scroll();
        let bottom = view.transcript_scroll;
        assert_eq!(bottom, 13);

        view.scroll_up(3);
        view.sync_scroll();
        assert_eq!(view.transcript_scroll, bottom - 3);

        view.scroll_down(10);
        assert_eq!(view.transcript_scroll, bottom);
        assert!(view.follow_tail);
    }

    #[test]
    fn test_handler_may_use_view_while_activating() {
        let view = TerminalView::new();
        let seen = Rc::new(Cell::new(None));
        let probe = view.clone();
        let sink = seen.clone();
        view.update_chat_list(
            &[chat(4, "Reentrant")],
            Rc::new(move |id| {
                probe.set_current_chat(Some(id), "Reentrant");
                sink.set(probe.current_chat_id());
            }),
        );

        view.activate_selected();

        assert_eq!(seen.get(), Some(4));
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let mut view = ViewState::new();

        assert!(!view.request_delete(5));
        assert_eq!(view.notice.as_deref(), Some(CONFIRM_DELETE_NOTICE));

        assert!(view.request_delete(5));
        assert!(view.notice.is_none());
        // Confirmation is consumed
        assert!(!view.request_delete(5));
    }

    #[test]
    fn test_delete_confirmation_is_per_chat_and_expires() {
        let mut view = ViewState::new();
        assert!(!view.request_delete(1));
        assert!(!view.request_delete(2));
        assert!(view.request_delete(2));

        assert!(!view.request_delete(3));
        view.tick(Instant::now() + NOTICE_DISMISS_AFTER);
        assert!(!view.request_delete(3));

        view.cancel_delete();
        assert!(!view.request_delete(3));
    }
}
