pub mod hotkeys;

pub use hotkeys::{HotkeyMap, Key};
