mod entity;
mod interaction;
mod layout;
mod swap;

pub use entity::{ContextAction, IconEntity, IconTextures, IconVisual};
pub use interaction::{PointerOutcome, PointerTracker};
pub use layout::GridLayout;
pub use swap::{FolderOps, RetryPolicy, StdFolderOps};

use crate::config::{ConfigStore, IconEntry, LaunchOption};
use crate::error::{DeskError, DeskResult, SwapError};
use crate::settings::{AppPaths, Settings};
use eframe::egui::{Pos2, Vec2};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use swap::{stage_relocate, stage_swap, FolderTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn folder_name(self) -> String {
        format!("{}_{}", self.row, self.col)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Relocated {
        from: CellCoord,
        to: CellCoord,
        stray: Option<PathBuf>,
    },
    Swapped {
        a: CellCoord,
        b: CellCoord,
    },
}

/// Live icons keyed by cell, backed by the config store and the per-cell
/// data folders.
pub struct GridModel {
    paths: AppPaths,
    store: ConfigStore,
    layout: GridLayout,
    entities: HashMap<CellCoord, IconEntity>,
    busy: HashSet<CellCoord>,
    held: HashMap<CellCoord, u32>,
    retry: RetryPolicy,
}

impl GridModel {
    pub fn new(paths: AppPaths, settings: &Settings) -> Self {
        let store = ConfigStore::open(&paths.config_file);
        let layout = GridLayout::new(settings.icon_size(), settings.max_rows(), settings.max_cols());
        Self::with_store(paths, store, layout)
    }

    pub fn with_store(paths: AppPaths, store: ConfigStore, layout: GridLayout) -> Self {
        let mut model = Self {
            paths,
            store,
            layout,
            entities: HashMap::new(),
            busy: HashSet::new(),
            held: HashMap::new(),
            retry: RetryPolicy::default(),
        };
        model.rebuild_entities();
        model
    }

    #[cfg(test)]
    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    fn rebuild_entities(&mut self) {
        self.entities.clear();
        for entry in self.store.entries() {
            let cell = entry.cell();
            if entry.is_default() || !self.layout.in_bounds(cell) {
                continue;
            }
            let mut entity = IconEntity::new(entry.clone());
            entity.set_hidden(!self.layout.is_visible(cell));
            self.entities.insert(cell, entity);
        }
        info!("grid loaded with {} icons", self.entities.len());
    }

    /// Pins `cell` so moves touching it are refused until a matching
    /// `release`. Holds nest.
    pub fn hold(&mut self, cell: CellCoord) {
        *self.held.entry(cell).or_insert(0) += 1;
    }

    pub fn release(&mut self, cell: CellCoord) {
        if let Some(count) = self.held.get_mut(&cell) {
            *count -= 1;
            if *count == 0 {
                self.held.remove(&cell);
            }
        }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    #[cfg(test)]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn entity(&self, cell: CellCoord) -> Option<&IconEntity> {
        self.entities.get(&cell)
    }

    pub fn entity_mut(&mut self, cell: CellCoord) -> Option<&mut IconEntity> {
        self.entities.get_mut(&cell)
    }

    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.entities.contains_key(&cell)
    }

    pub fn visible_entities_mut(&mut self) -> impl Iterator<Item = &mut IconEntity> {
        self.entities.values_mut().filter(|e| !e.is_hidden())
    }

    /// The persisted entry for `cell`, or a fresh default one.
    pub fn entry_or_default(&self, cell: CellCoord) -> IconEntry {
        self.store
            .get_entry(cell.row, cell.col)
            .cloned()
            .unwrap_or_else(|| IconEntry::new(cell))
    }

    pub fn cell_dir(&self, cell: CellCoord) -> PathBuf {
        self.paths.cell_dir(cell)
    }

    /// Recomputes the visible extent and hides or reveals icons accordingly.
    pub fn resize(&mut self, viewport: Vec2) -> bool {
        if !self.layout.resize(viewport) {
            return false;
        }
        let layout = self.layout;
        for (cell, entity) in &mut self.entities {
            entity.set_hidden(!layout.is_visible(*cell));
        }
        true
    }

    /// Applies new bounds or icon size from settings.
    pub fn set_geometry(&mut self, icon_size: u32, max_rows: u32, max_cols: u32, viewport: Vec2) {
        self.layout = GridLayout::new(icon_size, max_rows, max_cols);
        self.layout.resize(viewport);
        self.rebuild_entities();
    }

    pub fn hit_test(&self, point: Pos2) -> Option<CellCoord> {
        self.layout.hit_test(point)
    }

    fn check_target(&self, cell: CellCoord) -> DeskResult<()> {
        if self.layout.in_bounds(cell) && self.layout.is_visible(cell) {
            Ok(())
        } else {
            Err(DeskError::OutOfBounds(cell))
        }
    }

    pub fn move_icon(&mut self, from: CellCoord, to: CellCoord) -> DeskResult<MoveOutcome> {
        self.move_icon_with(&StdFolderOps, from, to)
    }

    /// Drag-and-drop move. Folder renames run first; config and in-memory
    /// state change only once every rename has succeeded.
    pub fn move_icon_with<F: FolderOps>(
        &mut self,
        ops: &F,
        from: CellCoord,
        to: CellCoord,
    ) -> DeskResult<MoveOutcome> {
        if from == to {
            return Err(SwapError::SameCell(from).into());
        }
        self.check_target(from)?;
        self.check_target(to)?;
        if !self.is_occupied(from) {
            return Err(SwapError::EmptySource(from).into());
        }
        for cell in [from, to] {
            if self.busy.contains(&cell) {
                return Err(SwapError::Busy(cell).into());
            }
            if self.held.contains_key(&cell) {
                return Err(SwapError::Held(cell).into());
            }
        }

        self.busy.insert(from);
        self.busy.insert(to);
        let result = self.run_move(ops, from, to);
        self.busy.remove(&from);
        self.busy.remove(&to);

        if let Err(err) = &result {
            warn!("move {from} -> {to} aborted: {err}");
            self.reload_cell(from);
            self.reload_cell(to);
        }
        result
    }

    fn run_move<F: FolderOps>(
        &mut self,
        ops: &F,
        from: CellCoord,
        to: CellCoord,
    ) -> DeskResult<MoveOutcome> {
        let source_dir = self.cell_dir(from);
        let target_dir = self.cell_dir(to);
        let target_occupied = self.is_occupied(to);

        let mut tx = FolderTransaction::new(ops, self.retry);
        let staged = if target_occupied {
            stage_swap(&mut tx, &source_dir, &target_dir).map(|()| None)
        } else {
            stage_relocate(&mut tx, &source_dir, &target_dir)
        };
        let stray = match staged {
            Ok(stray) => stray,
            Err(err) => {
                tx.rollback();
                return Err(err.into());
            }
        };

        let committed = self.store.swap_positions(from, to, |record, origin| {
            if origin == from {
                rebase_icon_path(record, &source_dir, &target_dir);
            } else {
                rebase_icon_path(record, &target_dir, &source_dir);
            }
        });
        if let Err(err) = committed {
            tx.rollback();
            return Err(SwapError::Commit(err).into());
        }
        tx.commit();

        let moved = self.entities.remove(&from);
        let displaced = self.entities.remove(&to);
        if let Some(mut entity) = moved {
            entity.reload(self.entry_or_default(to));
            entity.set_hidden(!self.layout.is_visible(to));
            self.entities.insert(to, entity);
        }
        if let Some(mut entity) = displaced {
            entity.reload(self.entry_or_default(from));
            entity.set_hidden(!self.layout.is_visible(from));
            self.entities.insert(from, entity);
        }

        if target_occupied {
            info!("swapped icons {from} <-> {to}");
            Ok(MoveOutcome::Swapped { a: from, b: to })
        } else {
            info!("moved icon {from} -> {to}");
            Ok(MoveOutcome::Relocated { from, to, stray })
        }
    }

    /// Persists an edited entry and refreshes (or removes) its entity.
    pub fn save_entry(&mut self, entry: IconEntry) -> DeskResult<()> {
        let cell = entry.cell();
        if !self.layout.in_bounds(cell) {
            return Err(DeskError::OutOfBounds(cell));
        }
        self.store.upsert_entry(entry)?;
        self.reload_cell(cell);
        Ok(())
    }

    pub fn set_launch_option(&mut self, cell: CellCoord, option: LaunchOption) -> DeskResult<()> {
        self.store.set_launch_option(cell.row, cell.col, option)?;
        self.reload_cell(cell);
        Ok(())
    }

    /// Resets the cell to default and removes its data folder.
    pub fn delete_cell(&mut self, cell: CellCoord) -> DeskResult<()> {
        if self.held.contains_key(&cell) {
            return Err(SwapError::Held(cell).into());
        }
        self.store.set_entry_to_default(cell.row, cell.col)?;
        self.entities.remove(&cell);
        remove_cell_dir(&self.cell_dir(cell))
    }

    /// Rebuilds the entity for `cell` from persisted config, discarding any
    /// unsaved preview state.
    pub fn reload_cell(&mut self, cell: CellCoord) {
        let entry = self.entry_or_default(cell);
        if entry.is_default() {
            self.entities.remove(&cell);
            return;
        }
        let hidden = !self.layout.is_visible(cell);
        let entity = self
            .entities
            .entry(cell)
            .or_insert_with(|| IconEntity::new(entry.clone()));
        entity.reload(entry);
        entity.set_hidden(hidden);
    }

    /// Temporarily shows `entry` in its cell without saving it.
    pub fn preview_entry(&mut self, entry: IconEntry) {
        let cell = entry.cell();
        if entry.is_default() {
            self.entities.remove(&cell);
            return;
        }
        let hidden = !self.layout.is_visible(cell);
        let entity = self
            .entities
            .entry(cell)
            .or_insert_with(|| IconEntity::new(entry.clone()));
        entity.reload(entry);
        entity.set_hidden(hidden);
    }
}

fn rebase_icon_path(record: &mut IconEntry, old_dir: &Path, new_dir: &Path) {
    if record.icon_path.is_empty() {
        return;
    }
    if let Ok(rest) = Path::new(&record.icon_path).strip_prefix(old_dir) {
        record.icon_path = new_dir.join(rest).to_string_lossy().into_owned();
    }
}

fn remove_cell_dir(dir: &Path) -> DeskResult<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(DeskError::Io {
            path: dir.to_path_buf(),
            source,
        }),
    }
}
