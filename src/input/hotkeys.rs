use std::str::FromStr;

use crate::pipeline::Command;

/// Keys the player reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    ArrowLeft,
    ArrowRight,
    Character(char),
}

impl FromStr for Key {
    type Err = String;

    /// Parse names like `space`, `left`, `right` or a single character
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "space" => Ok(Key::Space),
            "left" | "arrowleft" => Ok(Key::ArrowLeft),
            "right" | "arrowright" => Ok(Key::ArrowRight),
            _ => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Key::Character(c.to_ascii_lowercase())),
                    _ => Err(format!("unknown key '{}'", s)),
                }
            }
        }
    }
}

/// Keyboard bindings of the player chrome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotkeyMap {
    /// Seconds moved by the arrow keys
    pub seek_step: f64,
}

impl Default for HotkeyMap {
    fn default() -> Self {
        HotkeyMap { seek_step: 5.0 }
    }
}

impl HotkeyMap {
    pub fn new(seek_step: f64) -> Self {
        HotkeyMap { seek_step }
    }

    pub fn command(&self, key: Key) -> Option<Command> {
        match key {
            Key::Space | Key::Character('k') => Some(Command::TogglePlay),
            Key::ArrowLeft => Some(Command::SeekBy(-self.seek_step)),
            Key::ArrowRight => Some(Command::SeekBy(self.seek_step)),
            Key::Character('m') => Some(Command::ToggleMute),
            Key::Character('f') => Some(Command::ToggleFullscreen),
            Key::Character(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let map = HotkeyMap::default();
        assert_eq!(map.command(Key::Space), Some(Command::TogglePlay));
        assert_eq!(map.command(Key::Character('k')), Some(Command::TogglePlay));
        assert_eq!(map.command(Key::ArrowLeft), Some(Command::SeekBy(-5.0)));
        assert_eq!(map.command(Key::ArrowRight), Some(Command::SeekBy(5.0)));
        assert_eq!(map.command(Key::Character('m')), Some(Command::ToggleMute));
        assert_eq!(map.command(Key::Character('f')), Some(Command::ToggleFullscreen));
        assert_eq!(map.command(Key::Character('x')), None);
    }

    #[test]
    fn test_custom_seek_step() {
        let map = HotkeyMap::new(10.0);
        assert_eq!(map.command(Key::ArrowRight), Some(Command::SeekBy(10.0)));
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!("space".parse::<Key>(), Ok(Key::Space));
        assert_eq!("Right".parse::<Key>(), Ok(Key::ArrowRight));
        assert_eq!(" left ".parse::<Key>(), Ok(Key::ArrowLeft));
        assert_eq!("M".parse::<Key>(), Ok(Key::Character('m')));
        assert!("ctrl".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
    }
}
