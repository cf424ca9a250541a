use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Char(char),
}

/// Local input already decoded by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    Key { key: Key, pressed: bool },
}

impl InputEvent {
    /// Whether this event asks the server to shut down.
    pub fn is_quit(&self) -> bool {
        matches!(
            self,
            InputEvent::Quit
                | InputEvent::Key {
                    key: Key::Escape,
                    pressed: true,
                }
        )
    }
}

/// Bounded queue of local input; the oldest event is dropped when full.
pub struct InputQueue {
    events: VecDeque<InputEvent>,
    max_size: usize,
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new(64)
    }
}

impl InputQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        if self.events.len() >= self.max_size {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Takes every queued event, returning whether any of them was a quit.
    pub fn drain_quit(&mut self) -> bool {
        self.events.drain(..).fold(false, |quit, e| quit | e.is_quit())
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
