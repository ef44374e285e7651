use crate::branding::{PROJECT_APPLICATION, PROJECT_ORGANIZATION, PROJECT_QUALIFIER};
use crate::grid::CellCoord;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_ROWS: u32 = 20;
pub const DEFAULT_MAX_COLS: u32 = 40;
pub const DEFAULT_ICON_SIZE: u32 = 100;
pub const DEFAULT_LABEL_SIZE: u32 = 10;
pub const DEFAULT_LABEL_COLOR: &str = "#ffffff";
pub const DEFAULT_TOGGLE_KEYBIND: &str = "alt+d";

/// Resolved locations of every file the shell reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub settings_file: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_file: root.join("desktop_config.json"),
            settings_file: root.join("settings.json"),
            data_dir: root.join("data"),
            root,
        }
    }

    pub fn from_project_dirs() -> Option<Self> {
        directories::ProjectDirs::from(PROJECT_QUALIFIER, PROJECT_ORGANIZATION, PROJECT_APPLICATION)
            .map(|dirs| Self::at(dirs.data_dir()))
    }

    /// Per-user paths, falling back to a directory next to the working dir
    /// when the platform has no notion of a home directory.
    pub fn resolve() -> Self {
        Self::from_project_dirs().unwrap_or_else(|| {
            warn!("No per-user data directory available, using ./desk_grid_data");
            Self::at("desk_grid_data")
        })
    }

    pub fn cell_dir(&self, cell: CellCoord) -> PathBuf {
        self.data_dir.join(cell.folder_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundKind {
    None,
    Image,
    Video,
}

impl BackgroundKind {
    fn from_key(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "video" => Self::Video,
            _ => Self::None,
        }
    }
}

/// Placement knobs shared by the image and video background layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaPlacement {
    pub zoom: f32,
    pub x_offset: f32,
    pub y_offset: f32,
}

impl Default for MediaPlacement {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundSettings {
    pub kind: BackgroundKind,
    pub image_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub image_placement: MediaPlacement,
    pub video_placement: MediaPlacement,
}

/// Flat key/value settings file. Unknown keys survive a load/save cycle.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        let values = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(values) => values,
                Err(err) => {
                    warn!("Failed to parse settings {}: {err}, using defaults", path.display());
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        Self {
            path: path.to_path_buf(),
            values,
        }
    }

    pub fn get_setting<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.values.get(key) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|_| {
                warn!("Setting {key} has an unexpected type, using default");
                default
            }),
            None => default,
        }
    }

    pub fn set_setting<T: Serialize>(&mut self, key: &str, value: T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.values.insert(key.to_string(), value);
                self.save();
            }
            Err(err) => warn!("Failed to encode setting {key}: {err}"),
        }
    }

    pub fn save(&self) {
        if let Some(parent) = self.path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                warn!("Failed to create settings directory {}", parent.display());
                return;
            }
        }
        match std::fs::File::create(&self.path) {
            Ok(file) => {
                if let Err(err) = serde_json::to_writer_pretty(file, &self.values) {
                    warn!("Failed to write settings: {err}");
                }
            }
            Err(err) => warn!("Failed to create {}: {err}", self.path.display()),
        }
    }

    pub fn max_rows(&self) -> u32 {
        self.get_setting("max_rows", DEFAULT_MAX_ROWS).max(1)
    }

    pub fn max_cols(&self) -> u32 {
        self.get_setting("max_cols", DEFAULT_MAX_COLS).max(1)
    }

    pub fn icon_size(&self) -> u32 {
        self.get_setting("icon_size", DEFAULT_ICON_SIZE).clamp(24, 256)
    }

    pub fn label_size(&self) -> u32 {
        self.get_setting("label_size", DEFAULT_LABEL_SIZE)
    }

    pub fn label_color(&self) -> String {
        self.get_setting("label_color", DEFAULT_LABEL_COLOR.to_string())
    }

    pub fn toggle_keybind(&self) -> String {
        self.get_setting("toggle_overlay_keybind", DEFAULT_TOGGLE_KEYBIND.to_string())
    }

    pub fn background(&self) -> BackgroundSettings {
        let path_setting = |key: &str| {
            let raw: String = self.get_setting(key, String::new());
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
        };
        let placement = |prefix: &str| MediaPlacement {
            zoom: self.get_setting(&format!("{prefix}_zoom"), 1.0f32),
            x_offset: self.get_setting(&format!("{prefix}_x_offset"), 0.0f32),
            y_offset: self.get_setting(&format!("{prefix}_y_offset"), 0.0f32),
        };
        BackgroundSettings {
            kind: BackgroundKind::from_key(&self.get_setting("background_type", String::new())),
            image_path: path_setting("background_image"),
            video_path: path_setting("background_video"),
            image_placement: placement("image"),
            video_placement: placement("video"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let settings = Settings::load(&dir.path().join("settings.json"));
        assert_eq!(settings.max_rows(), DEFAULT_MAX_ROWS);
        assert_eq!(settings.max_cols(), DEFAULT_MAX_COLS);
        assert_eq!(settings.icon_size(), DEFAULT_ICON_SIZE);
        assert_eq!(settings.background().kind, BackgroundKind::None);
    }

    #[test]
    fn set_setting_persists_and_keeps_unknown_keys() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"theme":"dark","max_rows":"bogus"}"#).expect("seed");

        let mut settings = Settings::load(&path);
        assert_eq!(settings.max_rows(), DEFAULT_MAX_ROWS);
        settings.set_setting("max_cols", 12u32);

        let reloaded = Settings::load(&path);
        assert_eq!(reloaded.max_cols(), 12);
        assert_eq!(reloaded.get_setting("theme", String::new()), "dark");
    }

    #[test]
    fn background_settings_read_placement() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"background_type":"Video","background_video":" /tmp/a.gif ","video_zoom":1.5,"video_x_offset":-20}"#,
        )
        .expect("seed");

        let bg = Settings::load(&path).background();
        assert_eq!(bg.kind, BackgroundKind::Video);
        assert_eq!(bg.video_path, Some(PathBuf::from("/tmp/a.gif")));
        assert_eq!(bg.image_path, None);
        assert_eq!(bg.video_placement.zoom, 1.5);
        assert_eq!(bg.video_placement.x_offset, -20.0);
        assert_eq!(bg.image_placement, MediaPlacement::default());
    }
}
