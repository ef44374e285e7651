use eframe::egui;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyError {
    #[error("hotkey is empty")]
    Empty,
    #[error("hotkey has no key, only modifiers")]
    MissingKey,
    #[error("hotkey names more than one key")]
    MultipleKeys,
    #[error("unknown key {0:?}")]
    UnknownKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Function(u8),
    Space,
    Tab,
    Enter,
    Escape,
}

impl Key {
    fn parse(token: &str) -> Option<Self> {
        let lower = token.to_ascii_lowercase();
        match lower.as_str() {
            "space" => return Some(Key::Space),
            "tab" => return Some(Key::Tab),
            "enter" | "return" => return Some(Key::Enter),
            "esc" | "escape" => return Some(Key::Escape),
            _ => {}
        }
        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.clone().next()) {
            if c.is_ascii_alphanumeric() {
                return Some(Key::Char(c.to_ascii_uppercase()));
            }
        }
        let n: u8 = lower.strip_prefix('f')?.parse().ok()?;
        (1..=24).contains(&n).then_some(Key::Function(n))
    }

    fn to_egui(self) -> Option<egui::Key> {
        Some(match self {
            Key::Char(c) => egui::Key::from_name(&c.to_string())?,
            Key::Function(n) => egui::Key::from_name(&format!("F{n}"))?,
            Key::Space => egui::Key::Space,
            Key::Tab => egui::Key::Tab,
            Key::Enter => egui::Key::Enter,
            Key::Escape => egui::Key::Escape,
        })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Function(n) => write!(f, "F{n}"),
            Key::Space => f.write_str("Space"),
            Key::Tab => f.write_str("Tab"),
            Key::Enter => f.write_str("Enter"),
            Key::Escape => f.write_str("Esc"),
        }
    }
}

/// A global key chord such as `ctrl+alt+d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
    pub key: Key,
}

impl Hotkey {
    pub fn parse(raw: &str) -> Result<Self, HotkeyError> {
        let tokens: Vec<&str> = raw
            .split('+')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(HotkeyError::Empty);
        }

        let (mut ctrl, mut alt, mut shift, mut win) = (false, false, false, false);
        let mut key = None;
        for token in tokens {
            match token.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => ctrl = true,
                "alt" => alt = true,
                "shift" => shift = true,
                "win" | "super" | "meta" | "cmd" => win = true,
                _ => {
                    let parsed =
                        Key::parse(token).ok_or_else(|| HotkeyError::UnknownKey(token.to_string()))?;
                    if key.replace(parsed).is_some() {
                        return Err(HotkeyError::MultipleKeys);
                    }
                }
            }
        }
        let key = key.ok_or(HotkeyError::MissingKey)?;
        Ok(Self {
            ctrl,
            alt,
            shift,
            win,
            key,
        })
    }

    /// The same chord as an in-window egui shortcut. The Windows key has no
    /// egui counterpart.
    pub fn egui_shortcut(&self) -> Option<egui::KeyboardShortcut> {
        if self.win {
            return None;
        }
        let modifiers = egui::Modifiers {
            alt: self.alt,
            ctrl: self.ctrl,
            shift: self.shift,
            mac_cmd: false,
            command: self.ctrl,
        };
        Some(egui::KeyboardShortcut::new(modifiers, self.key.to_egui()?))
    }

    #[cfg(target_os = "windows")]
    pub fn virtual_key(&self) -> u32 {
        match self.key {
            Key::Char(c) => c as u32,
            Key::Function(n) => 0x70 + u32::from(n) - 1,
            Key::Space => 0x20,
            Key::Tab => 0x09,
            Key::Enter => 0x0D,
            Key::Escape => 0x1B,
        }
    }

    #[cfg(target_os = "windows")]
    pub fn win32_modifiers(&self) -> windows::Win32::UI::Input::KeyboardAndMouse::HOT_KEY_MODIFIERS {
        use windows::Win32::UI::Input::KeyboardAndMouse::{
            MOD_ALT, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT, MOD_WIN,
        };
        let mut mods = MOD_NOREPEAT;
        if self.ctrl {
            mods = mods | MOD_CONTROL;
        }
        if self.alt {
            mods = mods | MOD_ALT;
        }
        if self.shift {
            mods = mods | MOD_SHIFT;
        }
        if self.win {
            mods = mods | MOD_WIN;
        }
        mods
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [
            (self.ctrl, "Ctrl+"),
            (self.alt, "Alt+"),
            (self.shift, "Shift+"),
            (self.win, "Win+"),
        ] {
            if on {
                f.write_str(name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_binding() {
        let hotkey = Hotkey::parse("alt+d").expect("valid");
        assert!(hotkey.alt && !hotkey.ctrl && !hotkey.shift && !hotkey.win);
        assert_eq!(hotkey.key, Key::Char('D'));
        assert_eq!(hotkey.to_string(), "Alt+D");
    }

    #[test]
    fn parses_mixed_case_and_spacing() {
        let hotkey = Hotkey::parse(" Ctrl + Shift + F12 ").expect("valid");
        assert!(hotkey.ctrl && hotkey.shift);
        assert_eq!(hotkey.key, Key::Function(12));
        assert_eq!(Hotkey::parse("win+space").expect("valid").key, Key::Space);
    }

    #[test]
    fn rejects_malformed_bindings() {
        assert_eq!(Hotkey::parse(""), Err(HotkeyError::Empty));
        assert_eq!(Hotkey::parse("ctrl+alt"), Err(HotkeyError::MissingKey));
        assert_eq!(Hotkey::parse("a+b"), Err(HotkeyError::MultipleKeys));
        assert_eq!(
            Hotkey::parse("alt+F99"),
            Err(HotkeyError::UnknownKey("F99".into()))
        );
        assert_eq!(
            Hotkey::parse("hyper+d"),
            Err(HotkeyError::UnknownKey("hyper".into()))
        );
    }

    #[test]
    fn egui_shortcut_mirrors_modifiers() {
        let shortcut = Hotkey::parse("ctrl+alt+k")
            .expect("valid")
            .egui_shortcut()
            .expect("representable");
        assert_eq!(shortcut.logical_key, egui::Key::K);
        assert!(shortcut.modifiers.ctrl && shortcut.modifiers.alt);
        assert!(Hotkey::parse("win+k").expect("valid").egui_shortcut().is_none());
    }
}
