use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use arena::{InputEvent, Key};

/// Decodes a terminal key event for the game loop. `q` maps straight to quit.
pub fn translate_key(event: &KeyEvent) -> Option<InputEvent> {
    let pressed = match event.kind {
        KeyEventKind::Press | KeyEventKind::Repeat => true,
        KeyEventKind::Release => false,
    };

    match event.code {
        KeyCode::Char('q') | KeyCode::Char('Q') if pressed => Some(InputEvent::Quit),
        KeyCode::Esc => Some(InputEvent::Key {
            key: Key::Escape,
            pressed,
        }),
        KeyCode::Char(c) => Some(InputEvent::Key {
            key: Key::Char(c),
            pressed,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyEventState, KeyModifiers};

    use super::*;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_quit_keys() {
        assert_eq!(
            translate_key(&key(KeyCode::Char('q'), KeyEventKind::Press)),
            Some(InputEvent::Quit)
        );
        assert!(
            translate_key(&key(KeyCode::Esc, KeyEventKind::Press))
                .unwrap()
                .is_quit()
        );
        assert!(
            !translate_key(&key(KeyCode::Esc, KeyEventKind::Release))
                .unwrap()
                .is_quit()
        );
        assert_eq!(translate_key(&key(KeyCode::Tab, KeyEventKind::Press)), None);
    }
}
