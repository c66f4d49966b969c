//! Modal key interpretation: `g`/`z` prefixes and the `:` command line.
//!
//! The interpreter only decides *what* a key sequence means. Applying the
//! resulting [`Action`] to the view is the store's job.

use std::path::PathBuf;

use tracing::debug;

use crate::input::{Key, KeyInput};
use crate::scroll::Align;
use crate::view::{FocusMode, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCommand {
    G,
    Z,
}

impl PendingCommand {
    pub fn as_char(&self) -> char {
        match self {
            PendingCommand::G => 'g',
            PendingCommand::Z => 'z',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Pending(PendingCommand),
    CommandLine,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `gg`: first page, or first outline row when the outline has focus.
    GotoFirst,
    GotoLast,
    /// 1-based, clamped when applied.
    GotoPage { page: usize },
    NextPage,
    PrevPage,
    /// `zt`/`zz`/`zb`.
    Realign { align: Align },
    ToggleSidebar,
    ToggleFitMode,
    SetAbsolute { percent: Option<u32> },
    SetRelative { percent: Option<u32> },
    FitWidth,
    FitPage,
    SetRasterScale { percent: u32 },
    SetTheme(Theme),
    ToggleFullscreen,
    ToggleHelp,
    CloseHelp,
    FocusDocument,
    OutlineMove { delta: isize },
    OutlineActivate,
    OutlineExpand,
    OutlineCollapse,
    JumpBack,
    JumpForward,
    ToggleFinder,
    OpenPath(PathBuf),
    Quit,
}

/// The slice of view state key interpretation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyContext {
    pub focus: FocusMode,
    pub help_open: bool,
}

/// Leading-integer parse: optional sign then digits, trailing junk ignored.
fn parse_leading_int(token: &str) -> Option<i64> {
    let token = token.trim_start();
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(index, _)| index)
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

fn positive(value: Option<i64>) -> Option<u32> {
    value
        .filter(|value| *value > 0)
        .and_then(|value| u32::try_from(value).ok())
}

/// Parses a submitted command line. Unknown commands yield `None`.
pub fn parse_command_line(line: &str) -> Option<Action> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    if head.is_empty() {
        return None;
    }
    let command = head.to_lowercase();
    let argument = rest.split_whitespace().next().and_then(parse_leading_int);

    let action = match command.as_str() {
        "dark" => Action::SetTheme(Theme::Dark),
        "light" => Action::SetTheme(Theme::Light),
        "fullscreen" | "fs" => Action::ToggleFullscreen,
        "a" => Action::SetAbsolute {
            percent: positive(argument),
        },
        "r" => Action::SetRelative {
            percent: positive(argument),
        },
        "fw" => Action::FitWidth,
        "fp" => Action::FitPage,
        "go" | "n" => Action::GotoPage {
            page: positive(argument)? as usize,
        },
        "raster" => Action::SetRasterScale {
            percent: positive(argument)?,
        },
        "open" | "e" | "edit" if !rest.is_empty() => Action::OpenPath(PathBuf::from(rest)),
        "q" | "quit" => Action::Quit,
        "help" => Action::ToggleHelp,
        _ => {
            let page = parse_leading_int(&command)?;
            if page <= 0 {
                return None;
            }
            Action::GotoPage {
                page: page as usize,
            }
        }
    };
    Some(action)
}

#[derive(Debug, Default)]
pub struct CommandInterpreter {
    mode: InputMode,
    buffer: String,
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn pending(&self) -> Option<PendingCommand> {
        match self.mode {
            InputMode::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.mode == InputMode::Normal
    }

    pub fn is_command_line(&self) -> bool {
        self.mode == InputMode::CommandLine
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn open_command_line(&mut self, prefill: &str) {
        self.mode = InputMode::CommandLine;
        self.buffer.clear();
        self.buffer.push_str(prefill);
    }

    /// Back to normal mode, dropping any pending prefix or command text.
    pub fn reset(&mut self) {
        self.mode = InputMode::Normal;
        self.buffer.clear();
    }

    pub fn interpret(&mut self, input: &KeyInput, context: KeyContext) -> Option<Action> {
        if input.is_release() {
            return None;
        }
        if input.key == Key::Escape && !self.is_command_line() {
            return self.escape(context);
        }
        match self.mode {
            InputMode::CommandLine => self.interpret_command_line(input),
            InputMode::Pending(pending) => self.interpret_pending(pending, input),
            InputMode::Normal => self.interpret_normal(input, context),
        }
    }

    fn interpret_command_line(&mut self, input: &KeyInput) -> Option<Action> {
        match input.key {
            Key::Escape => {
                self.reset();
                None
            }
            Key::Enter => {
                let line = std::mem::take(&mut self.buffer);
                self.reset();
                let action = parse_command_line(&line);
                debug!(%line, ?action, "command line submitted");
                action
            }
            Key::Backspace => {
                if self.buffer.pop().is_none() {
                    self.reset();
                }
                None
            }
            _ => {
                if let Some(c) = input.plain_char() {
                    self.buffer.push(c);
                }
                None
            }
        }
    }

    /// Dismisses the topmost concern: help, then a pending prefix, then outline focus.
    fn escape(&mut self, context: KeyContext) -> Option<Action> {
        if context.help_open {
            Some(Action::CloseHelp)
        } else if self.pending().is_some() {
            self.mode = InputMode::Normal;
            None
        } else if context.focus == FocusMode::Outline {
            Some(Action::FocusDocument)
        } else {
            None
        }
    }

    fn interpret_pending(&mut self, pending: PendingCommand, input: &KeyInput) -> Option<Action> {
        if input.key.is_modifier() {
            return None;
        }
        self.mode = InputMode::Normal;
        let c = input.plain_char()?;
        match pending {
            PendingCommand::G if c == 'g' => Some(Action::GotoFirst),
            PendingCommand::Z => Align::from_z_suffix(c).map(|align| Action::Realign { align }),
            PendingCommand::G => None,
        }
    }

    fn interpret_normal(&mut self, input: &KeyInput, context: KeyContext) -> Option<Action> {
        let outline = context.focus == FocusMode::Outline;
        match input.key {
            Key::Enter if outline => Some(Action::OutlineActivate),
            Key::Down if outline => Some(Action::OutlineMove { delta: 1 }),
            Key::Up if outline => Some(Action::OutlineMove { delta: -1 }),
            Key::Right if outline => Some(Action::OutlineExpand),
            Key::Left if outline => Some(Action::OutlineCollapse),
            Key::Right | Key::PageDown => Some(Action::NextPage),
            Key::Left | Key::PageUp => Some(Action::PrevPage),
            Key::End => Some(Action::GotoLast),
            Key::Home => Some(Action::GotoPage { page: 1 }),
            Key::Char(_) => self.interpret_normal_char(input.plain_char()?, outline),
            _ => None,
        }
    }

    fn interpret_normal_char(&mut self, c: char, outline: bool) -> Option<Action> {
        match c {
            'g' => {
                self.mode = InputMode::Pending(PendingCommand::G);
                None
            }
            'z' => {
                self.mode = InputMode::Pending(PendingCommand::Z);
                None
            }
            ':' => {
                self.open_command_line("");
                None
            }
            'o' => {
                self.open_command_line("open ");
                None
            }
            'G' => Some(Action::GotoLast),
            't' => Some(Action::ToggleSidebar),
            'a' => Some(Action::ToggleFitMode),
            '?' => Some(Action::ToggleHelp),
            'r' => Some(Action::ToggleFinder),
            'q' => Some(Action::Quit),
            'j' if outline => Some(Action::OutlineMove { delta: 1 }),
            'k' if outline => Some(Action::OutlineMove { delta: -1 }),
            'l' if outline => Some(Action::OutlineExpand),
            'h' if outline => Some(Action::OutlineCollapse),
            'l' => Some(Action::NextPage),
            'h' => Some(Action::PrevPage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ModifierKey, Modifiers};

    fn document() -> KeyContext {
        KeyContext::default()
    }

    fn outline() -> KeyContext {
        KeyContext {
            focus: FocusMode::Outline,
            help_open: false,
        }
    }

    fn feed(interpreter: &mut CommandInterpreter, keys: &str, context: KeyContext) -> Vec<Action> {
        keys.chars()
            .filter_map(|c| interpreter.interpret(&KeyInput::char(c), context))
            .collect()
    }

    fn submit(line: &str) -> Option<Action> {
        let mut interpreter = CommandInterpreter::new();
        interpreter.interpret(&KeyInput::char(':'), document());
        for c in line.chars() {
            interpreter.interpret(&KeyInput::char(c), document());
        }
        let action = interpreter.interpret(&KeyInput::press(Key::Enter), document());
        assert!(interpreter.is_normal());
        assert!(interpreter.buffer().is_empty());
        action
    }

    #[test]
    fn gg_goes_to_first_page_once() {
        let mut interpreter = CommandInterpreter::new();
        assert_eq!(feed(&mut interpreter, "gg", document()), vec![Action::GotoFirst]);
        assert!(interpreter.is_normal());
        assert!(feed(&mut interpreter, "g", document()).is_empty());
        assert_eq!(interpreter.pending(), Some(PendingCommand::G));
    }

    #[test]
    fn unrelated_key_aborts_pending_without_effect() {
        let mut interpreter = CommandInterpreter::new();
        assert!(feed(&mut interpreter, "gx", document()).is_empty());
        assert!(interpreter.is_normal());

        // The aborting key is consumed even when it is bound in normal mode.
        assert!(feed(&mut interpreter, "gt", document()).is_empty());
        assert!(interpreter.is_normal());
    }

    #[test]
    fn modifier_keys_do_not_abort_pending() {
        let mut interpreter = CommandInterpreter::new();
        interpreter.interpret(&KeyInput::char('z'), document());
        let shift = KeyInput::press(Key::Modifier(ModifierKey::Shift));
        assert_eq!(interpreter.interpret(&shift, document()), None);
        assert_eq!(interpreter.pending(), Some(PendingCommand::Z));
        assert_eq!(
            interpreter.interpret(&KeyInput::char('b'), document()),
            Some(Action::Realign { align: Align::End })
        );
    }

    #[test]
    fn z_suffixes_map_to_alignment() {
        let mut interpreter = CommandInterpreter::new();
        assert_eq!(
            feed(&mut interpreter, "zzztzb", document()),
            vec![
                Action::Realign {
                    align: Align::Center
                },
                Action::Realign {
                    align: Align::Start
                },
                Action::Realign { align: Align::End },
            ]
        );
    }

    #[test]
    fn escape_priority() {
        let mut interpreter = CommandInterpreter::new();
        let escape = KeyInput::press(Key::Escape);
        let help = KeyContext {
            focus: FocusMode::Outline,
            help_open: true,
        };

        interpreter.interpret(&KeyInput::char('g'), help);
        assert_eq!(interpreter.interpret(&escape, help), Some(Action::CloseHelp));
        assert_eq!(interpreter.pending(), Some(PendingCommand::G));
        assert_eq!(interpreter.interpret(&escape, outline()), None);
        assert!(interpreter.is_normal());
        assert_eq!(interpreter.interpret(&escape, outline()), Some(Action::FocusDocument));
        assert_eq!(interpreter.interpret(&escape, document()), None);
    }

    #[test]
    fn focus_changes_hjkl_meaning() {
        let mut interpreter = CommandInterpreter::new();
        assert_eq!(
            feed(&mut interpreter, "jkhl", outline()),
            vec![
                Action::OutlineMove { delta: 1 },
                Action::OutlineMove { delta: -1 },
                Action::OutlineCollapse,
                Action::OutlineExpand,
            ]
        );
        assert_eq!(
            feed(&mut interpreter, "jkhl", document()),
            vec![Action::PrevPage, Action::NextPage]
        );
    }

    #[test]
    fn ctrl_chords_are_not_normal_keys() {
        let mut interpreter = CommandInterpreter::new();
        assert_eq!(interpreter.interpret(&KeyInput::ctrl('g'), document()), None);
        assert!(interpreter.is_normal());
        let release = KeyInput::release(Key::Char('g'));
        assert_eq!(interpreter.interpret(&release, document()), None);
        assert!(interpreter.is_normal());
    }

    #[test]
    fn absolute_with_percent() {
        assert_eq!(submit("a 150"), Some(Action::SetAbsolute { percent: Some(150) }));
        assert_eq!(submit("A"), Some(Action::SetAbsolute { percent: None }));
        assert_eq!(submit("a 0"), Some(Action::SetAbsolute { percent: None }));
    }

    #[test]
    fn relative_without_argument() {
        assert_eq!(submit("r"), Some(Action::SetRelative { percent: None }));
        assert_eq!(submit("r 85%"), Some(Action::SetRelative { percent: Some(85) }));
    }

    #[test]
    fn page_jumps() {
        assert_eq!(submit("go 5"), Some(Action::GotoPage { page: 5 }));
        assert_eq!(submit("n 12"), Some(Action::GotoPage { page: 12 }));
        assert_eq!(submit("42"), Some(Action::GotoPage { page: 42 }));
        assert_eq!(submit("go"), None);
        assert_eq!(submit("go -3"), None);
        assert_eq!(submit("0"), None);
    }

    #[test]
    fn other_commands() {
        assert_eq!(submit("dark"), Some(Action::SetTheme(Theme::Dark)));
        assert_eq!(submit("LIGHT"), Some(Action::SetTheme(Theme::Light)));
        assert_eq!(submit("fs"), Some(Action::ToggleFullscreen));
        assert_eq!(submit("fullscreen"), Some(Action::ToggleFullscreen));
        assert_eq!(submit("fw"), Some(Action::FitWidth));
        assert_eq!(submit("fp"), Some(Action::FitPage));
        assert_eq!(submit("raster 200"), Some(Action::SetRasterScale { percent: 200 }));
        assert_eq!(submit("quit"), Some(Action::Quit));
        assert_eq!(
            submit("open /tmp/my paper.pdf"),
            Some(Action::OpenPath(PathBuf::from("/tmp/my paper.pdf")))
        );
        assert_eq!(submit("open"), None);
        assert_eq!(submit("frobnicate 3"), None);
        assert_eq!(submit(""), None);
    }

    #[test]
    fn leading_int_parse() {
        assert_eq!(parse_leading_int("150abc"), Some(150));
        assert_eq!(parse_leading_int("-7"), Some(-7));
        assert_eq!(parse_leading_int("+7"), Some(7));
        assert_eq!(parse_leading_int("x1"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn command_line_editing() {
        let mut interpreter = CommandInterpreter::new();
        feed(&mut interpreter, ":gox", document());
        assert_eq!(interpreter.buffer(), "gox");
        interpreter.interpret(&KeyInput::press(Key::Backspace), document());
        assert_eq!(interpreter.buffer(), "go");

        interpreter.interpret(&KeyInput::press(Key::Escape), document());
        assert!(interpreter.is_normal());
        assert!(interpreter.buffer().is_empty());

        interpreter.interpret(&KeyInput::char(':'), document());
        interpreter.interpret(&KeyInput::press(Key::Backspace), document());
        assert!(interpreter.is_normal());

        feed(&mut interpreter, "o", document());
        assert!(interpreter.is_command_line());
        assert_eq!(interpreter.buffer(), "open ");

        let shifted = KeyInput {
            key: Key::Char('X'),
            modifiers: Modifiers {
                shift: true,
                ..Modifiers::NONE
            },
            phase: Default::default(),
        };
        interpreter.interpret(&shifted, document());
        assert_eq!(interpreter.buffer(), "open X");
    }
}
