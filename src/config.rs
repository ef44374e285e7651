use crate::error::ConfigError;
use crate::grid::CellCoord;
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const DEFAULT_FONT_SIZE: u32 = 10;
pub const DEFAULT_FONT_COLOR: &str = "#ffffff";

/// Fields every record is expected to carry; anything missing is backfilled on load.
const KNOWN_FIELDS: [&str; 12] = [
    "row",
    "column",
    "name",
    "icon_path",
    "executable_path",
    "command_args",
    "website_link",
    "launch_option",
    "font_size",
    "use_global_font_size",
    "font_color",
    "use_global_font_color",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOption {
    #[default]
    FirstFound,
    WebsiteFirst,
    AskEachTime,
    ExecutableOnly,
    WebsiteOnly,
}

impl LaunchOption {
    pub const ALL: [LaunchOption; 5] = [
        LaunchOption::FirstFound,
        LaunchOption::WebsiteFirst,
        LaunchOption::AskEachTime,
        LaunchOption::ExecutableOnly,
        LaunchOption::WebsiteOnly,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LaunchOption::FirstFound => "Launch first found",
            LaunchOption::WebsiteFirst => "Prioritize website",
            LaunchOption::AskEachTime => "Ask every time",
            LaunchOption::ExecutableOnly => "Executable only",
            LaunchOption::WebsiteOnly => "Website only",
        }
    }

    fn from_code(code: u64) -> Self {
        match code {
            1 => LaunchOption::WebsiteFirst,
            2 => LaunchOption::AskEachTime,
            3 => LaunchOption::ExecutableOnly,
            4 => LaunchOption::WebsiteOnly,
            _ => LaunchOption::FirstFound,
        }
    }

    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "website_first" => LaunchOption::WebsiteFirst,
            "ask_each_time" => LaunchOption::AskEachTime,
            "executable_only" => LaunchOption::ExecutableOnly,
            "website_only" => LaunchOption::WebsiteOnly,
            _ => LaunchOption::FirstFound,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LaunchOptionCompat {
    Code(u64),
    Name(String),
}

impl<'de> Deserialize<'de> for LaunchOption {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match LaunchOptionCompat::deserialize(deserializer)? {
            LaunchOptionCompat::Code(code) => LaunchOption::from_code(code),
            LaunchOptionCompat::Name(name) => LaunchOption::from_name(&name),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IconEntry {
    pub row: u32,
    pub column: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon_path: String,
    #[serde(default)]
    pub executable_path: String,
    #[serde(default)]
    pub command_args: String,
    #[serde(default)]
    pub website_link: String,
    #[serde(default)]
    pub launch_option: LaunchOption,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_true")]
    pub use_global_font_size: bool,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default = "default_true")]
    pub use_global_font_color: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_font_color() -> String {
    DEFAULT_FONT_COLOR.to_string()
}

fn default_true() -> bool {
    true
}

impl IconEntry {
    pub fn new(cell: CellCoord) -> Self {
        Self {
            row: cell.row,
            column: cell.col,
            name: String::new(),
            icon_path: String::new(),
            executable_path: String::new(),
            command_args: String::new(),
            website_link: String::new(),
            launch_option: LaunchOption::default(),
            font_size: DEFAULT_FONT_SIZE,
            use_global_font_size: true,
            font_color: default_font_color(),
            use_global_font_color: true,
            extra: Map::new(),
        }
    }

    pub fn cell(&self) -> CellCoord {
        CellCoord::new(self.row, self.column)
    }

    pub fn set_cell(&mut self, cell: CellCoord) {
        self.row = cell.row;
        self.column = cell.col;
    }

    /// True when nothing but the coordinates (and unknown extras) is set.
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
            && self.icon_path.is_empty()
            && self.executable_path.is_empty()
            && self.command_args.is_empty()
            && self.website_link.is_empty()
            && self.launch_option == LaunchOption::default()
            && self.font_size == DEFAULT_FONT_SIZE
            && self.use_global_font_size
            && self.font_color == DEFAULT_FONT_COLOR
            && self.use_global_font_color
    }

    pub fn reset_to_default(&mut self) {
        let extra = std::mem::take(&mut self.extra);
        *self = Self::new(self.cell());
        self.extra = extra;
    }
}

/// JSON-array backed store of icon entries with an in-memory cache.
///
/// All mutation goes through "snapshot, mutate the copy, save, reload" so
/// the cache never diverges from the file.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    entries: Vec<IconEntry>,
}

impl ConfigStore {
    pub fn open(path: &Path) -> Self {
        let mut store = Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
        };
        store.entries = store.load();
        store
    }

    /// Reads the file, backfilling any records that predate newer fields.
    /// A missing or unreadable file is an empty grid.
    pub fn load(&self) -> Vec<IconEntry> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return Vec::new(),
        };
        let raw: Vec<Value> = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Failed to parse {}: {err}, starting empty", self.path.display());
                return Vec::new();
            }
        };

        let mut needs_backfill = false;
        let mut dropped = 0usize;
        let mut entries = Vec::with_capacity(raw.len());
        for value in raw {
            if let Some(obj) = value.as_object() {
                if KNOWN_FIELDS.iter().any(|key| !obj.contains_key(*key)) {
                    needs_backfill = true;
                }
            }
            match serde_json::from_value::<IconEntry>(value) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    dropped += 1;
                    warn!("Skipping unreadable icon entry: {err}");
                }
            }
        }

        if needs_backfill {
            if dropped > 0 {
                warn!("Not rewriting config with {dropped} unreadable entries");
            } else {
                info!("Backfilling missing fields in {}", self.path.display());
                if let Err(err) = write_entries(&self.path, &entries) {
                    warn!("Failed to write migrated config: {err}");
                }
            }
        }
        entries
    }

    pub fn reload(&mut self) {
        self.entries = self.load();
    }

    pub fn entries(&self) -> &[IconEntry] {
        &self.entries
    }

    /// Owned copy of the cache for a load, mutate, save cycle.
    pub fn snapshot(&self) -> Vec<IconEntry> {
        self.entries.clone()
    }

    pub fn get_entry(&self, row: u32, col: u32) -> Option<&IconEntry> {
        self.entries
            .iter()
            .find(|entry| entry.row == row && entry.column == col)
    }

    pub fn is_default(&self, row: u32, col: u32) -> bool {
        self.get_entry(row, col)
            .map(IconEntry::is_default)
            .unwrap_or(true)
    }

    pub fn save(&mut self, records: Vec<IconEntry>) -> Result<(), ConfigError> {
        write_entries(&self.path, &records)?;
        self.reload();
        Ok(())
    }

    pub fn upsert_entry(&mut self, entry: IconEntry) -> Result<(), ConfigError> {
        let mut records = self.snapshot();
        match records
            .iter_mut()
            .find(|e| e.row == entry.row && e.column == entry.column)
        {
            Some(existing) => *existing = entry,
            None => records.push(entry),
        }
        self.save(records)
    }

    pub fn set_entry_to_default(&mut self, row: u32, col: u32) -> Result<(), ConfigError> {
        let mut records = self.snapshot();
        let Some(entry) = records
            .iter_mut()
            .find(|e| e.row == row && e.column == col)
        else {
            return Ok(());
        };
        entry.reset_to_default();
        self.save(records)
    }

    pub fn set_launch_option(
        &mut self,
        row: u32,
        col: u32,
        option: LaunchOption,
    ) -> Result<(), ConfigError> {
        let mut records = self.snapshot();
        match records
            .iter_mut()
            .find(|e| e.row == row && e.column == col)
        {
            Some(entry) => entry.launch_option = option,
            None => {
                let mut entry = IconEntry::new(CellCoord::new(row, col));
                entry.launch_option = option;
                records.push(entry);
            }
        }
        self.save(records)
    }

    /// Exchanges the coordinates of the records at `a` and `b` and persists.
    /// When only one exists it is relocated; when neither exists nothing is
    /// written. `moved` sees each relocated record with the cell it left.
    pub fn swap_positions(
        &mut self,
        a: CellCoord,
        b: CellCoord,
        mut moved: impl FnMut(&mut IconEntry, CellCoord),
    ) -> Result<(), ConfigError> {
        let mut records = self.snapshot();
        for record in records.iter_mut() {
            let cell = record.cell();
            if cell == a {
                record.set_cell(b);
                moved(record, a);
            } else if cell == b {
                record.set_cell(a);
                moved(record, b);
            }
        }
        if records == self.entries {
            return Ok(());
        }
        self.save(records)
    }
}

fn write_entries(path: &Path, entries: &[IconEntry]) -> Result<(), ConfigError> {
    let to_write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_write_err)?;
    }
    let encoded = serde_json::to_vec_pretty(entries)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, encoded).map_err(to_write_err)?;
    std::fs::rename(&tmp, path).map_err(to_write_err)
}
