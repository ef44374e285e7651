use super::CellCoord;
use crate::config::{IconEntry, LaunchOption};
use crate::icons::{self, AnimatedImage};
use eframe::egui;
use log::debug;
use std::path::Path;
use std::time::Instant;

pub const LABEL_CHARS_PER_LINE: usize = 14;
pub const LABEL_MAX_LINES: usize = 2;

pub enum IconVisual {
    Image(AnimatedImage),
    Placeholder,
}

/// Uploaded textures for one entity, one per frame.
pub struct IconTextures {
    pub frames: Vec<egui::TextureHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    Launch,
    RunExecutable,
    OpenWebsite,
    OpenFileLocation,
    Edit,
    SetLaunchOption(LaunchOption),
    Delete,
}

impl ContextAction {
    pub fn label(self) -> &'static str {
        match self {
            ContextAction::Launch => "Launch",
            ContextAction::RunExecutable => "Run executable",
            ContextAction::OpenWebsite => "Open website",
            ContextAction::OpenFileLocation => "Open file location",
            ContextAction::Edit => "Edit",
            ContextAction::SetLaunchOption(option) => option.label(),
            ContextAction::Delete => "Delete",
        }
    }
}

/// A rendered launcher icon occupying one grid cell.
///
/// Decoding is deferred until the cell is first painted so hidden cells cost
/// nothing beyond their entry.
pub struct IconEntity {
    entry: IconEntry,
    hidden: bool,
    visual: Option<IconVisual>,
    pub textures: Option<IconTextures>,
    shown_at: Instant,
}

impl IconEntity {
    pub fn new(entry: IconEntry) -> Self {
        Self {
            entry,
            hidden: false,
            visual: None,
            textures: None,
            shown_at: Instant::now(),
        }
    }

    pub fn entry(&self) -> &IconEntry {
        &self.entry
    }

    pub fn cell(&self) -> CellCoord {
        self.entry.cell()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Replaces the entry and drops decoded state so the next paint reloads it.
    pub fn reload(&mut self, entry: IconEntry) {
        self.entry = entry;
        self.visual = None;
        self.textures = None;
        self.shown_at = Instant::now();
    }

    pub fn visual(&mut self, edge: u32) -> &IconVisual {
        if self.visual.is_none() {
            self.visual = Some(decode_visual(&self.entry.icon_path, edge));
        }
        self.visual.get_or_insert(IconVisual::Placeholder)
    }

    pub fn frame_index(&self) -> usize {
        match &self.visual {
            Some(IconVisual::Image(anim)) => anim.frame_at(self.shown_at.elapsed()),
            _ => 0,
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(&self.visual, Some(IconVisual::Image(anim)) if anim.is_animated())
    }

    pub fn label_lines(&self) -> Vec<String> {
        wrap_label(&self.entry.name, LABEL_CHARS_PER_LINE, LABEL_MAX_LINES)
    }

    pub fn font_size(&self, global: u32) -> u32 {
        if self.entry.use_global_font_size {
            global
        } else {
            self.entry.font_size
        }
    }

    pub fn font_color<'a>(&'a self, global: &'a str) -> &'a str {
        if self.entry.use_global_font_color {
            global
        } else {
            &self.entry.font_color
        }
    }

    pub fn context_actions(&self) -> Vec<ContextAction> {
        let has_exe = !self.entry.executable_path.trim().is_empty();
        let has_site = !self.entry.website_link.trim().is_empty();
        let mut actions = vec![ContextAction::Launch];
        if has_exe && has_site {
            actions.push(ContextAction::RunExecutable);
            actions.push(ContextAction::OpenWebsite);
            actions.extend(LaunchOption::ALL.map(ContextAction::SetLaunchOption));
        }
        if has_exe {
            actions.push(ContextAction::OpenFileLocation);
        }
        actions.push(ContextAction::Edit);
        actions.push(ContextAction::Delete);
        actions
    }
}

fn decode_visual(icon_path: &str, edge: u32) -> IconVisual {
    let trimmed = icon_path.trim();
    if trimmed.is_empty() {
        return IconVisual::Placeholder;
    }
    let path = Path::new(trimmed);
    if !path.is_file() {
        debug!("icon image missing: {}", path.display());
        return IconVisual::Placeholder;
    }
    icons::load_animation(path, Some(edge))
        .map(IconVisual::Image)
        .unwrap_or(IconVisual::Placeholder)
}

/// Word-wraps `text` to `width` characters, truncating with an ellipsis once
/// `max_lines` is exceeded. Words longer than a line are hard-split.
pub fn wrap_label(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        push_word(word, width, &mut lines, &mut current);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines && max_lines > 0 {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let mut chars: Vec<char> = last.chars().collect();
            if chars.len() >= width {
                chars.truncate(width.saturating_sub(1));
            }
            *last = chars.into_iter().collect::<String>() + "…";
        }
    }
    lines
}

fn push_word(word: &str, width: usize, lines: &mut Vec<String>, current: &mut String) {
    let mut rest: Vec<char> = word.chars().collect();
    loop {
        let used = current.chars().count();
        let sep = usize::from(used > 0);
        if used + sep + rest.len() <= width {
            if sep == 1 {
                current.push(' ');
            }
            current.extend(rest.iter());
            return;
        }
        if used > 0 {
            lines.push(std::mem::take(current));
            continue;
        }
        lines.push(rest.iter().take(width).collect());
        rest.drain(..width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_label_wraps_and_truncates() {
        assert_eq!(wrap_label("Visual Studio Code", 14, 2), vec!["Visual Studio", "Code"]);
        assert_eq!(wrap_label("", 14, 2), Vec::<String>::new());
        assert_eq!(
            wrap_label("Supercalifragilistic", 8, 3),
            vec!["Supercal", "ifragili", "stic"]
        );
        assert_eq!(
            wrap_label("one two three four five", 8, 2),
            vec!["one two", "three…"]
        );
        assert_eq!(
            wrap_label("abcdefghijklmnopqrstuvwx", 8, 2),
            vec!["abcdefgh", "ijklmno…"]
        );
    }

    #[test]
    fn context_actions_depend_on_targets() {
        let mut entry = IconEntry::new(CellCoord::new(0, 0));
        entry.website_link = "example.com".into();
        let site_only = IconEntity::new(entry.clone());
        assert_eq!(
            site_only.context_actions(),
            vec![ContextAction::Launch, ContextAction::Edit, ContextAction::Delete]
        );

        entry.executable_path = "/usr/bin/env".into();
        let both = IconEntity::new(entry);
        let actions = both.context_actions();
        assert!(actions.contains(&ContextAction::RunExecutable));
        assert!(actions.contains(&ContextAction::OpenFileLocation));
        assert!(actions.contains(&ContextAction::SetLaunchOption(LaunchOption::WebsiteOnly)));
    }

    #[test]
    fn missing_icon_file_is_placeholder() {
        let mut entry = IconEntry::new(CellCoord::new(1, 1));
        entry.name = "Ghost".into();
        entry.icon_path = "/definitely/not/here.png".into();
        let mut entity = IconEntity::new(entry);
        assert!(matches!(entity.visual(64), IconVisual::Placeholder));
        assert_eq!(entity.frame_index(), 0);
    }

    #[test]
    fn font_overrides_respect_global_flags() {
        let mut entry = IconEntry::new(CellCoord::new(0, 0));
        entry.name = "x".into();
        entry.font_size = 18;
        entry.font_color = "#00ff00".into();
        let entity = IconEntity::new(entry.clone());
        assert_eq!(entity.font_size(11), 11);
        assert_eq!(entity.font_color("#ffffff"), "#ffffff");

        entry.use_global_font_size = false;
        entry.use_global_font_color = false;
        let entity = IconEntity::new(entry);
        assert_eq!(entity.font_size(11), 18);
        assert_eq!(entity.font_color("#ffffff"), "#00ff00");
    }
}
