use backoffice_chat_core::controller::{MAX_INPUT_CHARS, QUICK_ACTIONS};
use backoffice_chat_core::language::{display_name, SUPPORTED_LANGUAGES};
use backoffice_chat_core::{Message, Role, SizeMode};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{panel_rect, App};

const LAUNCHER_LABEL: &str = " Chat (F2) ";

/// Rows a message occupies once wrapped to `width` columns
fn wrapped_height(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.lines()
        .map(|line| {
            let chars = line.chars().count();
            if chars == 0 {
                1
            } else {
                chars.div_ceil(width)
            }
        })
        .sum::<usize>()
        .max(1)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    render_backdrop(frame, area);
    render_launcher(app, frame, area);

    if app.controller.panel().is_open() {
        render_panel(app, frame, area);
    } else {
        app.panel_area = None;
        app.chat_area = None;
        app.quick_actions_area = None;
    }

    if app.show_language_picker {
        render_language_picker(app, frame, area);
    }
}

fn render_backdrop(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Back Office ");

    let text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            "  Orders · Customers · Inventory · Reports",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::styled(
            "  Press F2 or click Chat to ask the assistant. Ctrl+C quits.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn render_launcher(app: &mut App, frame: &mut Frame, area: Rect) {
    let width = LAUNCHER_LABEL.chars().count() as u16;
    if area.width < width + 2 || area.height < 3 {
        app.launcher_area = None;
        return;
    }
    let rect = Rect::new(
        area.x + area.width - width - 2,
        area.y + area.height - 2,
        width,
        1,
    );

    let style = if app.controller.panel().is_open() {
        Style::default().fg(Color::Black).bg(Color::DarkGray)
    } else {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    };
    frame.render_widget(Paragraph::new(LAUNCHER_LABEL).style(style), rect);
    app.launcher_area = Some(rect);
}

fn render_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let state = app.controller.panel().state();
    let position = app.controller.drag_position().unwrap_or(state.position);
    let rect = panel_rect(&state, position, area);
    app.panel_area = Some(rect);

    frame.render_widget(Clear, rect);

    let border_color = if app.controller.is_resizing() || app.controller.is_dragging() {
        Color::Yellow
    } else {
        Color::Cyan
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Back-office Assistant ")
        .title_top(Line::from(format!(" {} ", state.size.as_str())).right_aligned());
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    if state.size == SizeMode::Minimized {
        app.chat_area = None;
        app.quick_actions_area = None;
        let [toolbar_area, input_area, hint_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .areas(inner);
        render_toolbar(app, frame, toolbar_area);
        render_input(app, frame, input_area);
        render_hint(app, frame, hint_area);
        return;
    }

    let quick_height = if app.controller.show_quick_actions() {
        QUICK_ACTIONS.len() as u16 + 2
    } else {
        0
    };

    let [toolbar_area, quick_area, chat_area, input_area, hint_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(quick_height),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(3),
    ])
    .areas(inner);

    render_toolbar(app, frame, toolbar_area);
    if quick_height > 0 {
        render_quick_actions(app, frame, quick_area);
    } else {
        app.quick_actions_area = None;
    }
    render_messages(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_hint(app, frame, hint_area);
}

fn render_toolbar(app: &App, frame: &mut Frame, area: Rect) {
    let dictation = app.controller.dictation().state();
    let language = display_name(app.controller.language()).unwrap_or("Unknown");

    let context = if app.controller.use_context() {
        Span::styled("context on", Style::default().fg(Color::Green))
    } else {
        Span::styled("context off", Style::default().fg(Color::DarkGray))
    };
    let voice = if dictation.is_recording {
        Span::styled(
            "● recording",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else if app.controller.dictation().is_supported() {
        Span::styled("mic idle", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled("no mic", Style::default().fg(Color::DarkGray))
    };

    let line = Line::from(vec![
        context,
        Span::raw(" │ "),
        voice,
        Span::raw(" │ "),
        Span::styled(language, Style::default().fg(Color::Magenta)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_quick_actions(app: &mut App, frame: &mut Frame, area: Rect) {
    app.quick_actions_area = Some(area);

    let items: Vec<ListItem> = QUICK_ACTIONS
        .iter()
        .enumerate()
        .map(|(i, action)| ListItem::new(format!(" Alt+{}  {} ", i + 1, action.label)))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .title(" Quick actions "),
    );
    frame.render_widget(list, area);
}

fn message_lines(msg: &Message) -> Vec<Line<'static>> {
    let time = msg.timestamp.format("%H:%M").to_string();
    let (label, color) = match msg.role {
        Role::User => ("You", Color::Cyan),
        Role::Assistant if msg.is_error => ("Assistant", Color::Red),
        Role::Assistant => ("Assistant", Color::Yellow),
        Role::System => ("System", Color::DarkGray),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{}:", label),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {}", time), Style::default().fg(Color::DarkGray)),
    ])];

    let body_style = if msg.is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    for line in msg.content.lines() {
        lines.push(Line::from(Span::styled(line.to_string(), body_style)));
    }

    if let Some(meta) = &msg.metadata {
        let mut parts = Vec::new();
        if let Some(ms) = meta.execution_time {
            parts.push(format!("{:.0} ms", ms));
        }
        if let Some(tables) = meta.tables_used.as_ref().filter(|t| !t.is_empty()) {
            parts.push(format!("tables: {}", tables.join(", ")));
        }
        if meta.has_context == Some(true) {
            parts.push("with context".to_string());
        }
        if meta.cache_hit == Some(true) {
            parts.push("cached".to_string());
        }
        if !parts.is_empty() {
            lines.push(Line::from(Span::styled(
                parts.join(" · "),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }
    }

    lines.push(Line::default());
    lines
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    app.chat_height = area.height;

    let messages = app.controller.conversation().messages();
    let loading = app.controller.is_loading();
    let width = area.width as usize;

    let text = if messages.is_empty() && !loading {
        app.chat_lines = 1;
        Text::from(Span::styled(
            "Ask about orders, customers, inventory...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for msg in &messages {
            lines.extend(message_lines(msg));
        }

        if loading {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        app.chat_lines = lines
            .iter()
            .map(|line| wrapped_height(&line.to_string(), width))
            .sum();
        Text::from(lines)
    };

    app.apply_auto_scroll();
    app.chat_scroll = app.chat_scroll.min(app.max_chat_scroll());

    // Paragraph scroll offsets are u16; longer histories pin at the limit
    let offset = u16::try_from(app.chat_scroll).unwrap_or(u16::MAX);
    let chat = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let input = app.controller.input();
    let over_limit = !input.is_blank() && !app.controller.can_send();

    let border_color = if over_limit {
        Color::Red
    } else if app.controller.dictation().is_recording() {
        Color::Magenta
    } else {
        Color::Yellow
    };
    let title = if app.controller.dictation().is_recording() {
        " Listening... (Ctrl+R to stop) "
    } else {
        " Message "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor in view; line breaks show as ↵
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input
        .value()
        .chars()
        .map(|c| if c == '\n' { '↵' } else { c })
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if !app.show_language_picker && area.height > 2 {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_hint(app: &App, frame: &mut Frame, area: Rect) {
    if area.height == 0 {
        return;
    }

    let hint = if app.confirm_clear {
        Line::from(Span::styled(
            "Are you sure you want to clear the chat history? (y/n)",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))
    } else if let Some(status) = &app.status {
        Line::from(Span::styled(status.clone(), Style::default().fg(Color::Yellow)))
    } else {
        Line::from(Span::styled(
            app.controller.input_hint(),
            Style::default().fg(Color::DarkGray),
        ))
    };

    let input = app.controller.input();
    let counter = Line::from(vec![
        Span::styled(
            app.controller.send_button_tooltip(),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::styled(
            format!("{}/{}", input.char_count(), MAX_INPUT_CHARS),
            Style::default().fg(Color::DarkGray),
        ),
    ])
    .alignment(Alignment::Right);

    let keys = Line::from(Span::styled(
        "^R voice ^L lang ^K context ^Q actions ^S stop ^X clear ^N new ^E export  F5-F8 size  Esc close",
        Style::default().fg(Color::DarkGray),
    ));

    let lines = if area.height >= 2 {
        vec![hint, counter, keys]
    } else {
        vec![hint]
    };
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_language_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_width = 34.min(area.width.saturating_sub(4));
    let popup_height = (SUPPORTED_LANGUAGES.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Dictation language ");

    let current = app.controller.language();
    let items: Vec<ListItem> = SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, name)| {
            let style = if *code == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ({}) ", name, code)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.language_state);
}
