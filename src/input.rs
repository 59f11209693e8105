//! Key bindings (normal and vim-style) and mouse clicks.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    /// Clear the group under the cursor.
    Clear,
    /// Push a new row in (or start over once the game has ended).
    NewRow,
    Restart,
    Quit,
    None,
}

/// Map key event to game action. Supports both normal (arrows, space) and vim (hjkl).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Up | KeyCode::Char('k') => Action::CursorUp,
        KeyCode::Down | KeyCode::Char('j') => Action::CursorDown,
        KeyCode::Left | KeyCode::Char('h') => Action::CursorLeft,
        KeyCode::Right | KeyCode::Char('l') => Action::CursorRight,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Clear,
        KeyCode::Char('n') | KeyCode::Char('N') => Action::NewRow,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Restart,
        _ => Action::None,
    }
}

/// Terminal position (column, row) of a left-button press.
pub fn left_click(event: MouseEvent) -> Option<(u16, u16)> {
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => Some((event.column, event.row)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_arrows_and_vim_keys_move_cursor() {
        assert_eq!(key_to_action(key(KeyCode::Up, KeyModifiers::NONE)), Action::CursorUp);
        assert_eq!(key_to_action(key(KeyCode::Char('j'), KeyModifiers::NONE)), Action::CursorDown);
        assert_eq!(key_to_action(key(KeyCode::Char('h'), KeyModifiers::NONE)), Action::CursorLeft);
        assert_eq!(key_to_action(key(KeyCode::Right, KeyModifiers::NONE)), Action::CursorRight);
    }

    #[test]
    fn test_game_keys() {
        assert_eq!(key_to_action(key(KeyCode::Char(' '), KeyModifiers::NONE)), Action::Clear);
        assert_eq!(key_to_action(key(KeyCode::Enter, KeyModifiers::NONE)), Action::Clear);
        assert_eq!(key_to_action(key(KeyCode::Char('N'), KeyModifiers::SHIFT)), Action::NewRow);
        assert_eq!(key_to_action(key(KeyCode::Char('r'), KeyModifiers::NONE)), Action::Restart);
        assert_eq!(key_to_action(key(KeyCode::Esc, KeyModifiers::NONE)), Action::Quit);
    }

    #[test]
    fn test_control_chords_are_ignored() {
        assert_eq!(key_to_action(key(KeyCode::Char('n'), KeyModifiers::CONTROL)), Action::None);
    }

    #[test]
    fn test_only_left_press_is_a_click() {
        let mut ev = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 12,
            row: 4,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(left_click(ev), Some((12, 4)));
        ev.kind = MouseEventKind::Down(MouseButton::Right);
        assert_eq!(left_click(ev), None);
        ev.kind = MouseEventKind::Up(MouseButton::Left);
        assert_eq!(left_click(ev), None);
    }
}
