//! Terminal-independent key events.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKey {
    Control,
    Shift,
    Alt,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Escape,
    Enter,
    Backspace,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// A bare modifier press, reported by terminals with enhanced keyboard support.
    Modifier(ModifierKey),
    Other,
}

impl Key {
    pub fn is_modifier(&self) -> bool {
        matches!(self, Key::Modifier(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
        meta: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        shift: false,
        alt: false,
        meta: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPhase {
    #[default]
    Press,
    Repeat,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: Modifiers,
    pub phase: KeyPhase,
}

impl KeyInput {
    pub fn press(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
            phase: KeyPhase::Press,
        }
    }

    pub fn char(c: char) -> Self {
        Self::press(Key::Char(c))
    }

    pub fn ctrl(c: char) -> Self {
        Self {
            key: Key::Char(c),
            modifiers: Modifiers::CTRL,
            phase: KeyPhase::Press,
        }
    }

    pub fn release(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
            phase: KeyPhase::Release,
        }
    }

    pub fn is_release(&self) -> bool {
        self.phase == KeyPhase::Release
    }

    /// A character typed without Ctrl/Alt/Meta. Shift is part of the character.
    pub fn plain_char(&self) -> Option<char> {
        match self.key {
            Key::Char(c) if !self.modifiers.ctrl && !self.modifiers.alt && !self.modifiers.meta => {
                Some(c)
            }
            _ => None,
        }
    }
}
