use anyhow::Result;
use backoffice_chat_core::controller::{ResizeDirection, QUICK_ACTIONS};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{cell_to_px, App, SCROLL_STEP};
use crate::tui::AppEvent;

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

/// Which border handle sits under the pointer. The top edge between the
/// corners is the drag handle, so it maps to no resize direction.
fn border_handle(x: u16, y: u16, rect: Rect) -> Option<ResizeDirection> {
    if !point_in_rect(x, y, rect) {
        return None;
    }
    let right = rect.x + rect.width.saturating_sub(1);
    let bottom = rect.y + rect.height.saturating_sub(1);

    let direction = ResizeDirection {
        north: y == rect.y && (x == rect.x || x == right),
        south: y == bottom,
        east: x == right,
        west: x == rect.x,
    };
    (!direction.is_empty()).then_some(direction)
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => {
            if app.controller.panel().is_open() {
                for c in text.chars() {
                    app.controller.input_mut().insert(c);
                }
            }
        }
        AppEvent::Resize(cols, rows) => app.resize(cols, rows),
        AppEvent::Tick => app.tick().await,
    }
    app.sync();
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    if key.code == KeyCode::F(2) {
        app.controller.panel().toggle();
        return;
    }

    if !app.controller.panel().is_open() {
        match key.code {
            KeyCode::Char('q') => app.should_quit = true,
            KeyCode::Enter | KeyCode::Char(' ') => app.controller.panel().open(),
            _ => {}
        }
        return;
    }

    if app.show_language_picker {
        handle_language_picker(app, key);
        return;
    }

    if app.confirm_clear {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.clear_chat(),
            _ => app.confirm_clear = false,
        }
        return;
    }

    if ctrl {
        handle_ctrl(app, key.code);
        return;
    }

    if key.modifiers.contains(KeyModifiers::ALT) {
        if let KeyCode::Char(c @ '1'..='5') = key.code {
            let index = c as usize - '1' as usize;
            let handle = app.controller.execute_quick_action(index);
            app.track(handle);
            return;
        }
    }

    match key.code {
        KeyCode::Esc => {
            if app.controller.show_quick_actions() {
                app.controller.toggle_quick_actions();
            } else {
                app.controller.close();
            }
        }
        KeyCode::Enter => {
            // Many terminals cannot tell Shift+Enter apart; Alt+Enter also breaks the line
            let newline = key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT);
            let handle = app.controller.handle_enter(newline);
            app.track(handle);
        }
        KeyCode::Char(c) => app.controller.input_mut().insert(c),
        KeyCode::Backspace => app.controller.input_mut().backspace(),
        KeyCode::Delete => app.controller.input_mut().delete(),
        KeyCode::Left => app.controller.input_mut().move_left(),
        KeyCode::Right => app.controller.input_mut().move_right(),
        KeyCode::Home => app.controller.input_mut().move_home(),
        KeyCode::End => app.controller.input_mut().move_end(),
        KeyCode::PageUp | KeyCode::Up => app.scroll_chat_up(SCROLL_STEP),
        KeyCode::PageDown | KeyCode::Down => app.scroll_chat_down(SCROLL_STEP),
        KeyCode::F(5) => app.controller.minimize(),
        KeyCode::F(6) => app.controller.expand(),
        KeyCode::F(7) => app.controller.maximize(),
        KeyCode::F(8) => app.controller.restore(),
        _ => {}
    }
}

fn handle_ctrl(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('r') => app.controller.toggle_voice(),
        KeyCode::Char('l') => app.open_language_picker(),
        KeyCode::Char('k') => app.toggle_context(),
        KeyCode::Char('q') => app.controller.toggle_quick_actions(),
        KeyCode::Char('s') => app.controller.stop_request(),
        KeyCode::Char('x') => app.confirm_clear = true,
        KeyCode::Char('e') => app.export_chat(),
        KeyCode::Char('d') => app.forget_server_context(),
        KeyCode::Char('t') => app.show_server_context(),
        KeyCode::Char('n') => app.start_new_session(),
        KeyCode::Char('u') => app.controller.input_mut().clear(),
        _ => {}
    }
}

fn handle_language_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_language_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.language_nav(true),
        KeyCode::Char('k') | KeyCode::Up => app.language_nav(false),
        KeyCode::Enter => app.confirm_language(),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;
    let pointer = cell_to_px(x, y);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(launcher) = app.launcher_area {
                if point_in_rect(x, y, launcher) {
                    app.controller.panel().toggle();
                    return;
                }
            }

            let Some(panel) = app.panel_area else {
                return;
            };

            if let Some(actions) = app.quick_actions_area {
                if point_in_rect(x, y, actions) {
                    // one action per row inside the border
                    let row = y.saturating_sub(actions.y + 1) as usize;
                    if row < QUICK_ACTIONS.len() && y > actions.y {
                        let handle = app.controller.execute_quick_action(row);
                        app.track(handle);
                    }
                    return;
                }
            }

            if let Some(direction) = border_handle(x, y, panel) {
                app.controller.begin_resize(direction, pointer);
            } else if y == panel.y && point_in_rect(x, y, panel) {
                app.controller.begin_drag(pointer);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            if app.controller.is_resizing() {
                app.controller.resize_to(pointer);
            } else if app.controller.is_dragging() {
                app.controller.drag_to(pointer);
            }
        }
        MouseEventKind::Up(MouseButton::Left) => app.controller.end_pointer(),
        MouseEventKind::ScrollUp => {
            if in_chat(app, x, y) {
                app.scroll_chat_up(SCROLL_STEP);
            }
        }
        MouseEventKind::ScrollDown => {
            if in_chat(app, x, y) {
                app.scroll_chat_down(SCROLL_STEP);
            }
        }
        _ => {}
    }
}

fn in_chat(app: &App, x: u16, y: u16) -> bool {
    app.chat_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false)
}
