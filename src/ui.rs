use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

use crate::state::Role;
use crate::view::{Focus, SidebarEntry, ViewState, NO_CHATS_PLACEHOLDER};

const SIDEBAR_WIDTH: u16 = 32;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c != '*' || chars.peek() != Some(&'*') {
            current_text.push(c);
            continue;
        }
        chars.next(); // second *

        let mut bold_text = String::new();
        let mut found_close = false;
        while let Some(c) = chars.next() {
            if c == '*' && chars.peek() == Some(&'*') {
                chars.next();
                found_close = true;
                break;
            }
            bold_text.push(c);
        }

        if found_close && !bold_text.is_empty() {
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }
            spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
        } else {
            // No closing **, treat as literal
            current_text.push_str("**");
            current_text.push_str(&bold_text);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }
    Line::from(spans)
}

fn avatar_style(role: Role) -> Style {
    let color = match role {
        Role::User => Color::Cyan,
        Role::Assistant => Color::Yellow,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

pub fn render(view: &mut ViewState, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let [sidebar_area, chat_area] = Layout::horizontal([
        Constraint::Length(SIDEBAR_WIDTH.min(body_area.width / 2)),
        Constraint::Min(0),
    ])
    .areas(body_area);

    render_header(view, frame, header_area);
    render_sidebar(view, frame, sidebar_area);
    render_chat(view, frame, chat_area);
    render_footer(view, frame, footer_area);
}

fn render_header(view: &ViewState, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" Messenger ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("v{} ", env!("CARGO_PKG_VERSION")), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(view.title.clone(), Style::default().fg(Color::White).bold()),
    ];
    if view.loading {
        spans.push(Span::styled("  working...", Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(view: &mut ViewState, frame: &mut Frame, area: Rect) {
    let focused = view.focus == Focus::Sidebar;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chats ");

    let items: Vec<ListItem> = view
        .sidebar
        .iter()
        .map(|entry| match entry {
            SidebarEntry::Placeholder => ListItem::new(Span::styled(
                NO_CHATS_PLACEHOLDER,
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )),
            SidebarEntry::Chat { title, updated, active, .. } => {
                let (marker, title_style) = if *active {
                    ("* ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
                } else {
                    ("  ", Style::default())
                };
                ListItem::new(vec![
                    Line::from(vec![Span::raw(marker), Span::styled(title.clone(), title_style)]),
                    Line::from(Span::styled(
                        format!("  {}", updated),
                        Style::default().fg(Color::DarkGray),
                    )),
                ])
            }
        })
        .collect();

    let mut list = List::new(items).block(block);
    if focused {
        list = list
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
    }

    frame.render_stateful_widget(list, area, &mut view.sidebar_state);
}

fn render_chat(view: &mut ViewState, frame: &mut Frame, area: Rect) {
    let [transcript_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    let transcript_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", view.title));

    let transcript_text = if view.messages.is_empty() && !view.loading {
        Text::from(Span::styled(
            "Start typing to begin a new chat...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &view.messages {
            lines.push(Line::from(Span::styled(
                format!("{}:", msg.role.avatar()),
                avatar_style(msg.role),
            )));
            for line in msg.content.lines() {
                let line = parse_markdown_line(line);
                lines.push(if msg.entering {
                    line.style(Style::default().add_modifier(Modifier::DIM))
                } else {
                    line
                });
            }
            lines.push(Line::default());
        }

        if view.loading {
            lines.push(Line::from(Span::styled(
                format!("{}:", Role::Assistant.avatar()),
                avatar_style(Role::Assistant),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((view.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let transcript = Paragraph::new(transcript_text).wrap(Wrap { trim: true });

    // Scroll bounds come from the same word wrapping the frame is drawn with
    let inner_width = transcript_area.width.saturating_sub(2);
    view.transcript_height = transcript_area.height.saturating_sub(2);
    view.transcript_lines = u16::try_from(transcript.line_count(inner_width)).unwrap_or(u16::MAX);
    view.sync_scroll();

    let transcript = transcript
        .block(transcript_block)
        .scroll((view.transcript_scroll, 0));
    frame.render_widget(transcript, transcript_area);

    render_composer(view, frame, input_area);
}

fn render_composer(view: &ViewState, frame: &mut Frame, area: Rect) {
    let focused = view.focus == Focus::Composer;
    let (border_color, title) = match (view.input_enabled, focused) {
        (false, _) => (Color::DarkGray, " Please wait... "),
        (true, true) => (Color::Yellow, " Message (Enter to send) "),
        (true, false) => (Color::DarkGray, " Message (Tab to focus) "),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = composer_window(&view.input, view.cursor, inner_width);

    let text_color = if view.input_enabled { Color::Cyan } else { Color::DarkGray };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(block);
    frame.render_widget(input, area);

    if focused && view.input_enabled {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Horizontal scroll for the composer, in terminal cells: the visible part of
/// `input` and the cursor column inside it. Leading characters are dropped
/// until the cell after the cursor fits in `width`.
fn composer_window(input: &str, cursor: usize, width: usize) -> (String, u16) {
    let chars: Vec<char> = input.chars().collect();
    let cursor = cursor.min(chars.len());
    let cell_width = |c: &char| c.width().unwrap_or(0);

    let mut start = 0;
    let mut cursor_col: usize = chars[..cursor].iter().map(cell_width).sum();
    while cursor_col >= width && start < cursor {
        cursor_col -= cell_width(&chars[start]);
        start += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = cell_width(c);
        if used + w > width {
            break;
        }
        visible.push(*c);
        used += w;
    }

    (visible, u16::try_from(cursor_col).unwrap_or(u16::MAX))
}

fn render_footer(view: &ViewState, frame: &mut Frame, area: Rect) {
    if let Some(error) = &view.error {
        let banner = Paragraph::new(format!(" {} ", error))
            .style(Style::default().bg(Color::Red).fg(Color::White).bold());
        frame.render_widget(banner, area);
        return;
    }

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let (mode_text, mode_style) = match view.focus {
        Focus::Composer => (" COMPOSE ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        Focus::Sidebar => (" CHATS ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)];

    if let Some(notice) = &view.notice {
        spans.push(Span::styled(format!(" {} ", notice), Style::default().fg(Color::Green)));
    } else {
        let hints: &[(&str, &str)] = match view.focus {
            Focus::Composer => &[
                ("Enter", "send"),
                ("PgUp/PgDn", "scroll"),
                ("Tab", "chats"),
                ("^N", "new chat"),
                ("^C", "quit"),
            ],
            Focus::Sidebar => &[
                ("j/k", "nav"),
                ("Enter", "open"),
                ("d d", "delete"),
                ("n", "new"),
                ("r", "refresh"),
                ("Tab", "compose"),
                ("q", "quit"),
            ],
        };
        for (key, label) in hints {
            spans.push(Span::styled(format!(" {} ", key), key_style));
            spans.push(Span::styled(format!(" {} ", label), label_style));
        }
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Chat;
    use ratatui::{backend::TestBackend, Terminal};
    use std::rc::Rc;

    fn draw(view: &mut ViewState) -> String {
        draw_sized(view, 100, 24)
    }

    fn draw_sized(view: &mut ViewState, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(view, frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_markdown_bold() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_markdown_unclosed_is_literal() {
        let line = parse_markdown_line("2 ** 3");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "2 ** 3");
    }

    #[test]
    fn test_render_placeholder_and_transcript() {
        let mut view = ViewState::new();
        view.update_chat_list(&[], Rc::new(|_| {}));
        view.add_message("Hello", Role::User, false);
        view.add_message("Hi there", Role::Assistant, false);

        let screen = draw(&mut view);

        assert!(screen.contains(NO_CHATS_PLACEHOLDER));
        assert!(screen.contains("You:"));
        assert!(screen.contains("Hi there"));
        assert!(screen.find("Hello").unwrap() < screen.find("Hi there").unwrap());
    }

    #[test]
    fn test_render_marks_active_chat_and_error() {
        let mut view = ViewState::new();
        let chat: Chat = serde_json::from_str(r#"{"id": 42, "title": "Greetings"}"#).unwrap();
        view.update_chat_list(&[chat], Rc::new(|_| {}));
        view.set_current_chat(Some(42), "Greetings");
        view.show_error("Cannot connect to server");

        let screen = draw(&mut view);

        assert!(screen.contains("* Greetings"));
        assert!(screen.contains("Cannot connect to server"));
    }

    #[test]
    fn test_render_loading_indicator() {
        let mut view = ViewState::new();
        view.show_loading();

        let screen = draw(&mut view);

        assert!(screen.contains("Thinking."));
        assert!(screen.contains("Please wait..."));
    }

    #[test]
    fn test_latest_message_visible_after_wrapped_reply() {
        let mut view = ViewState::new();
        let reply = (1..=40)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        view.add_message("Tell me a story", Role::User, false);
        view.add_message(&reply, Role::Assistant, false);
        view.add_message("LASTLINE", Role::User, false);

        let screen = draw_sized(&mut view, 60, 14);

        assert!(view.transcript_scroll > 0);
        assert!(screen.contains("LASTLINE"), "latest message scrolled out:\n{screen}");

        // Still at the bottom after another message arrives
        view.add_message("the end of it", Role::Assistant, false);
        let screen = draw_sized(&mut view, 60, 14);
        assert!(screen.contains("the end of it"));
    }

    #[test]
    fn test_composer_window_ascii() {
        assert_eq!(composer_window("hello", 5, 10), ("hello".to_string(), 5));
        // Cursor at the end of a long line keeps the tail visible
        assert_eq!(composer_window("hello world", 11, 5), ("orld".to_string(), 4));
        assert_eq!(composer_window("hello world", 0, 5), ("hello".to_string(), 0));
    }

    #[test]
    fn test_composer_window_counts_wide_chars_as_two_cells() {
        assert_eq!(composer_window("你好世界", 4, 10), ("你好世界".to_string(), 8));
        assert_eq!(composer_window("你好世界", 4, 5), ("世界".to_string(), 4));
        assert_eq!(composer_window("a你b", 2, 10), ("a你b".to_string(), 3));
    }
}
