use crate::config::IconEntry;
use crate::grid::CellCoord;
use crate::icon_gen::IconCandidate;
use eframe::egui;
use std::path::Path;

/// Where the answer to an icon-generation request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconTarget {
    /// The open editor's draft.
    Editor(CellCoord),
    /// An entry that was already saved without an icon.
    Saved(CellCoord),
}

impl IconTarget {
    pub fn cell(self) -> CellCoord {
        match self {
            IconTarget::Editor(cell) | IconTarget::Saved(cell) => cell,
        }
    }
}

pub struct EditorState {
    pub cell: CellCoord,
    pub draft: IconEntry,
    /// Paths in the draft that do not exist; non-empty while the
    /// "save anyway?" confirmation is showing.
    pub missing_paths: Vec<String>,
    pub generating: Option<u64>,
}

impl EditorState {
    pub fn new(draft: IconEntry) -> Self {
        Self {
            cell: draft.cell(),
            draft,
            missing_paths: Vec::new(),
            generating: None,
        }
    }

    pub fn has_target(&self) -> bool {
        !self.draft.executable_path.trim().is_empty() || !self.draft.website_link.trim().is_empty()
    }

    /// Draft paths that are set but point at nothing.
    pub fn find_missing_paths(&self) -> Vec<String> {
        [&self.draft.executable_path, &self.draft.icon_path]
            .into_iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty() && !Path::new(p).exists())
            .map(str::to_string)
            .collect()
    }
}

/// Overlay visibility as the UI thread sees it. Hiding minimises the window,
/// so a restore from the taskbar shows up as the viewport leaving the
/// minimised state.
#[derive(Debug, Clone, Copy)]
pub struct Visibility {
    visible: bool,
    seen_minimized: bool,
}

impl Visibility {
    pub fn shown() -> Self {
        Self {
            visible: true,
            seen_minimized: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set(&mut self, visible: bool) {
        self.visible = visible;
        self.seen_minimized = false;
    }

    /// Feeds the viewport's minimised flag; true once a hidden overlay has
    /// actually been minimised and then restored from outside.
    pub fn observe_minimized(&mut self, minimized: Option<bool>) -> bool {
        if self.visible {
            return false;
        }
        match minimized {
            Some(true) => {
                self.seen_minimized = true;
                false
            }
            Some(false) => self.seen_minimized,
            None => false,
        }
    }
}

pub struct IconChooser {
    pub target: IconTarget,
    pub candidates: Vec<IconCandidate>,
    pub textures: Vec<Option<egui::TextureHandle>>,
}

impl IconChooser {
    pub fn new(target: IconTarget, candidates: Vec<IconCandidate>) -> Self {
        Self {
            target,
            textures: Vec::new(),
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_paths_ignore_blank_fields() {
        let dir = tempfile::tempdir().expect("temp dir");
        let real = dir.path().join("tool");
        std::fs::write(&real, b"x").expect("write");

        let mut entry = IconEntry::new(CellCoord::new(0, 1));
        entry.executable_path = real.to_string_lossy().into_owned();
        let editor = EditorState::new(entry.clone());
        assert!(editor.find_missing_paths().is_empty());
        assert!(editor.has_target());

        entry.icon_path = dir.path().join("gone.png").to_string_lossy().into_owned();
        let editor = EditorState::new(entry);
        assert_eq!(editor.find_missing_paths().len(), 1);
    }

    #[test]
    fn external_restore_shows_hidden_overlay() {
        let mut vis = Visibility::shown();
        assert!(!vis.observe_minimized(Some(false)));

        vis.set(false);
        // The minimise request may not have landed yet.
        assert!(!vis.observe_minimized(Some(false)));
        assert!(!vis.observe_minimized(None));
        assert!(!vis.observe_minimized(Some(true)));
        assert!(vis.observe_minimized(Some(false)));

        vis.set(true);
        assert!(vis.is_visible());
        vis.set(false);
        assert!(!vis.observe_minimized(Some(false)), "a new hide starts over");
    }
}
