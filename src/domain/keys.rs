use std::fmt;
use thiserror::Error;

pub const ESC: u8 = 0x1b;
pub const DEL: u8 = 0x7f;
pub const BS: u8 = 0x08;

/// A single logical keystroke, independent of how the terminal encoded it.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum KeyStroke {
    Char(char),
    /// Control plus a lowercase ASCII letter (`'a'..='z'`).
    Ctrl(char),
    Alt(AltKey),
    Escape,
    /// A recognized byte sequence with no friendlier representation (arrows, Home, DEL).
    Raw(Vec<u8>),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AltKey {
    Char(char),
    Backspace,
    Left,
    Right,
    Up,
    Down,
}

impl KeyStroke {
    pub fn ctrl(letter: char) -> Self {
        Self::Ctrl(letter.to_ascii_lowercase())
    }

    pub fn raw(bytes: &[u8]) -> Self {
        Self::Raw(bytes.to_vec())
    }

    pub fn enter() -> Self {
        Self::Ctrl('m')
    }

    pub fn tab() -> Self {
        Self::Ctrl('i')
    }

    pub fn backspace() -> Self {
        Self::Raw(vec![DEL])
    }

    pub fn up() -> Self {
        Self::raw(b"\x1b[A")
    }

    pub fn down() -> Self {
        Self::raw(b"\x1b[B")
    }

    pub fn right() -> Self {
        Self::raw(b"\x1b[C")
    }

    pub fn left() -> Self {
        Self::raw(b"\x1b[D")
    }

    /// Printable, non-control character that should land in a text buffer.
    pub fn printable_char(&self) -> Option<char> {
        match self {
            Self::Char(ch) if !ch.is_control() => Some(*ch),
            _ => None,
        }
    }

    /// True when this stroke equals any configured alternative.
    pub fn matches_any(&self, alternatives: &[KeyStroke]) -> bool {
        alternatives.iter().any(|candidate| candidate == self)
    }
}

/// Every encoding a named key may arrive as. Parsing a key string expands to all of them.
pub fn named_key_encodings(name: NamedKey) -> Vec<KeyStroke> {
    match name {
        NamedKey::Up => vec![KeyStroke::up(), KeyStroke::raw(b"\x1bOA")],
        NamedKey::Down => vec![KeyStroke::down(), KeyStroke::raw(b"\x1bOB")],
        NamedKey::Right => vec![KeyStroke::right(), KeyStroke::raw(b"\x1bOC")],
        NamedKey::Left => vec![KeyStroke::left(), KeyStroke::raw(b"\x1bOD")],
        NamedKey::Home => vec![
            KeyStroke::raw(b"\x1b[H"),
            KeyStroke::raw(b"\x1bOH"),
            KeyStroke::raw(b"\x1b[1~"),
            KeyStroke::raw(b"\x1b[7~"),
        ],
        NamedKey::End => vec![
            KeyStroke::raw(b"\x1b[F"),
            KeyStroke::raw(b"\x1bOF"),
            KeyStroke::raw(b"\x1b[4~"),
            KeyStroke::raw(b"\x1b[8~"),
        ],
        NamedKey::Delete => vec![KeyStroke::raw(b"\x1b[3~")],
        NamedKey::Backspace => vec![KeyStroke::backspace(), KeyStroke::Ctrl('h')],
        NamedKey::Enter => vec![KeyStroke::enter()],
        NamedKey::Tab => vec![KeyStroke::tab()],
        NamedKey::Escape => vec![KeyStroke::Escape],
        NamedKey::Space => vec![KeyStroke::Char(' ')],
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NamedKey {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Delete,
    Backspace,
    Enter,
    Tab,
    Escape,
    Space,
}

impl NamedKey {
    fn from_name(name: &str) -> Option<Self> {
        let key = match name {
            "up" => Self::Up,
            "down" => Self::Down,
            "left" => Self::Left,
            "right" => Self::Right,
            "home" => Self::Home,
            "end" => Self::End,
            "delete" | "del" => Self::Delete,
            "backspace" | "bs" => Self::Backspace,
            "enter" | "return" | "ret" => Self::Enter,
            "tab" => Self::Tab,
            "esc" | "escape" => Self::Escape,
            "space" | "spc" => Self::Space,
            _ => return None,
        };
        Some(key)
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum KeyParseError {
    #[error("empty key string")]
    Empty,

    #[error("unknown modifier '{modifier}' in '{input}'")]
    UnknownModifier { modifier: String, input: String },

    #[error("unknown key '{key}' in '{input}'")]
    UnknownKey { key: String, input: String },

    #[error("'{input}' cannot be combined with Ctrl (only letters a-z can)")]
    UnsupportedCtrl { input: String },

    #[error("'{input}' cannot be combined with Alt")]
    UnsupportedAlt { input: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Modifier {
    Ctrl,
    Alt,
}

/// Parses a human-readable key string such as `Ctrl+J`, `C-j`, `Alt+b`, `M-b`,
/// `Esc`, `Up` or `n` into every stroke that represents it.
pub fn parse_key(input: &str) -> Result<Vec<KeyStroke>, KeyParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(KeyParseError::Empty);
    }

    let (modifier, key) = split_modifier(trimmed)?;
    let lowered = key.to_lowercase();
    let mut chars = key.chars();
    let single = match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    };

    match modifier {
        None => {
            if let Some(ch) = single {
                return Ok(vec![KeyStroke::Char(ch)]);
            }
            let named = NamedKey::from_name(&lowered).ok_or_else(|| KeyParseError::UnknownKey {
                key: key.to_string(),
                input: trimmed.to_string(),
            })?;
            Ok(named_key_encodings(named))
        }
        Some(Modifier::Ctrl) => match single {
            Some(ch) if ch.is_ascii_alphabetic() => Ok(vec![KeyStroke::ctrl(ch)]),
            _ => Err(KeyParseError::UnsupportedCtrl {
                input: trimmed.to_string(),
            }),
        },
        Some(Modifier::Alt) => {
            if let Some(ch) = single {
                return Ok(vec![KeyStroke::Alt(AltKey::Char(ch))]);
            }
            let alt = match NamedKey::from_name(&lowered) {
                Some(NamedKey::Backspace) => AltKey::Backspace,
                Some(NamedKey::Left) => AltKey::Left,
                Some(NamedKey::Right) => AltKey::Right,
                Some(NamedKey::Up) => AltKey::Up,
                Some(NamedKey::Down) => AltKey::Down,
                Some(_) => {
                    return Err(KeyParseError::UnsupportedAlt {
                        input: trimmed.to_string(),
                    });
                }
                None => {
                    return Err(KeyParseError::UnknownKey {
                        key: key.to_string(),
                        input: trimmed.to_string(),
                    });
                }
            };
            Ok(vec![KeyStroke::Alt(alt)])
        }
    }
}

fn split_modifier(input: &str) -> Result<(Option<Modifier>, &str), KeyParseError> {
    // "+" alone is the plus key, "Ctrl++" is Ctrl with the plus key.
    let separator = input
        .char_indices()
        .skip(1)
        .find(|(_, ch)| *ch == '+' || *ch == '-')
        .map(|(index, _)| index);
    let Some(index) = separator else {
        return Ok((None, input));
    };

    let prefix = input[..index].trim();
    let key = input[index + 1..].trim();
    if key.is_empty() {
        return Ok((None, input));
    }

    let modifier = match prefix.to_lowercase().as_str() {
        "ctrl" | "control" | "c" => Modifier::Ctrl,
        "alt" | "meta" | "option" | "opt" | "m" => Modifier::Alt,
        other => {
            return Err(KeyParseError::UnknownModifier {
                modifier: other.to_string(),
                input: input.to_string(),
            });
        }
    };
    Ok((Some(modifier), key))
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(' ') => write!(f, "Space"),
            Self::Char(ch) => write!(f, "{ch}"),
            Self::Ctrl('m') => write!(f, "Enter"),
            Self::Ctrl('i') => write!(f, "Tab"),
            Self::Ctrl(ch) => write!(f, "Ctrl+{}", ch.to_ascii_uppercase()),
            Self::Alt(alt) => match alt {
                AltKey::Char(ch) => write!(f, "Alt+{ch}"),
                AltKey::Backspace => write!(f, "Alt+Backspace"),
                AltKey::Left => write!(f, "Alt+Left"),
                AltKey::Right => write!(f, "Alt+Right"),
                AltKey::Up => write!(f, "Alt+Up"),
                AltKey::Down => write!(f, "Alt+Down"),
            },
            Self::Escape => write!(f, "Esc"),
            Self::Raw(bytes) => match raw_name(bytes) {
                Some(name) => write!(f, "{name}"),
                None => {
                    write!(f, "Raw(")?;
                    for (index, byte) in bytes.iter().enumerate() {
                        if index > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{byte:02x}")?;
                    }
                    write!(f, ")")
                }
            },
        }
    }
}

fn raw_name(bytes: &[u8]) -> Option<&'static str> {
    let name = match bytes {
        [DEL] => "Backspace",
        [ESC, b'[' | b'O', b'A'] => "Up",
        [ESC, b'[' | b'O', b'B'] => "Down",
        [ESC, b'[' | b'O', b'C'] => "Right",
        [ESC, b'[' | b'O', b'D'] => "Left",
        [ESC, b'[' | b'O', b'H'] | [ESC, b'[', b'1' | b'7', b'~'] => "Home",
        [ESC, b'[' | b'O', b'F'] | [ESC, b'[', b'4' | b'8', b'~'] => "End",
        [ESC, b'[', b'3', b'~'] => "Delete",
        _ => return None,
    };
    Some(name)
}
