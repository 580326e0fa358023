use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Focus, Mode};
use crate::keymap::{KeyBinding, Keymap};

/// Input action that can be performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Summarize,
    ResetKey,
    PickModel,
    Cancel,
    FocusInput,
    CloseOverlay,
    ScrollDown,
    ScrollUp,
    PageDown,
    PageUp,
    MoveDown,  // Model picker selection
    MoveUp,
    Confirm,   // Enter in a modal or the input bar
    Abort,     // Esc in a modal or the input bar
    InputChar(char),
    Backspace,
    None,
}

/// Handle a key event and return the corresponding action
pub fn handle_key_event(key: KeyEvent, app: &App, keymap: &Keymap) -> Action {
    // Ctrl+C always quits, even from modals
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    match &app.mode {
        Mode::SecretPrompt(_) => return handle_text_entry(key),
        Mode::ModelPicker { .. } => return handle_picker_mode(key),
        Mode::Normal => {}
    }

    if app.focus == Focus::Input {
        return handle_text_entry(key);
    }

    let binding = KeyBinding::new(key.code, key.modifiers);
    match keymap.get(&binding) {
        Some(action) => action.clone(),
        None => Action::None,
    }
}

/// Secret prompt modal and input bar
fn handle_text_entry(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Enter => Action::Confirm,
        KeyCode::Esc => Action::Abort,
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            Action::InputChar(c)
        }
        _ => Action::None,
    }
}

fn handle_picker_mode(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Action::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => Action::MoveUp,
        KeyCode::Enter => Action::Confirm,
        KeyCode::Esc | KeyCode::Char('q') => Action::Abort,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn test_normal_mode_uses_keymap() {
        let (app, _) = test_app(true);
        let keymap = Keymap::default();

        assert_eq!(handle_key_event(key(KeyCode::Char('s')), &app, &keymap), Action::Summarize);
        assert_eq!(handle_key_event(key(KeyCode::Esc), &app, &keymap), Action::CloseOverlay);
        assert_eq!(handle_key_event(key(KeyCode::Char('z')), &app, &keymap), Action::None);
        assert_eq!(
            handle_key_event(KeyEvent::new(KeyCode::Char('K'), KeyModifiers::SHIFT), &app, &keymap),
            Action::ResetKey
        );
    }

    #[tokio::test]
    async fn test_input_bar_swallows_shortcuts() {
        let (mut app, _) = test_app(true);
        app.focus_input();
        let keymap = Keymap::default();

        assert_eq!(
            handle_key_event(key(KeyCode::Char('s')), &app, &keymap),
            Action::InputChar('s')
        );
        assert_eq!(handle_key_event(key(KeyCode::Esc), &app, &keymap), Action::Abort);
        assert_eq!(
            handle_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &app, &keymap),
            Action::Quit
        );
    }

    #[tokio::test]
    async fn test_picker_navigation() {
        let (mut app, _) = test_app(true);
        app.open_model_picker();
        let keymap = Keymap::default();

        assert_eq!(handle_key_event(key(KeyCode::Char('j')), &app, &keymap), Action::MoveDown);
        assert_eq!(handle_key_event(key(KeyCode::Enter), &app, &keymap), Action::Confirm);
        assert_eq!(handle_key_event(key(KeyCode::Esc), &app, &keymap), Action::Abort);
    }
}
