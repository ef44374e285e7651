mod dialogs;
mod runtime;
mod state;
mod style;
mod ui;

use crate::background::BackgroundManager;
use crate::config::IconEntry;
use crate::events::{IconRequest, IconResult, UserEvent};
use crate::grid::{CellCoord, ContextAction, GridModel, PointerTracker};
use crate::hotkey::Hotkey;
use crate::icon_gen::{self, GenerateRequest, IconCandidate, IconSelection};
use crate::launch::{self, LaunchChoice, LaunchOutcome, SystemLauncher};
use crate::settings::{AppPaths, Settings, DEFAULT_TOGGLE_KEYBIND};
use crate::system;
use eframe::egui;
use log::{debug, info, warn};
use state::{EditorState, IconChooser, IconTarget, Visibility};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::time::Instant;
use style::DeskTheme;

pub struct DeskApp {
    settings: Settings,
    grid: GridModel,
    background: BackgroundManager,
    pointer: PointerTracker,
    theme: DeskTheme,
    launcher: SystemLauncher,
    toggle_shortcut: Option<egui::KeyboardShortcut>,
    rx: Receiver<UserEvent>,
    icon_req_tx: Sender<IconRequest>,
    #[cfg(target_os = "windows")]
    tray: Option<runtime::TrayHandles>,
    #[cfg(target_os = "windows")]
    action_tx: Sender<runtime::RuntimeAction>,
    visibility: Visibility,
    editor: Option<EditorState>,
    chooser: Option<IconChooser>,
    pending_icons: HashMap<u64, IconTarget>,
    next_ticket: u64,
    launch_prompt: Option<CellCoord>,
    delete_prompt: Option<CellCoord>,
    context_cell: Option<CellCoord>,
    selected: Option<CellCoord>,
    warning_message: Option<(String, Instant)>,
}

impl DeskApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let paths = AppPaths::resolve();
        info!("data directory: {}", paths.root.display());
        let settings = Settings::load(&paths.settings_file);
        let grid = GridModel::new(paths, &settings);
        let background = BackgroundManager::from_settings(&settings.background());

        let hotkey = parse_toggle_hotkey(&settings.toggle_keybind());
        let runtime = runtime::build_runtime(&cc.egui_ctx, hotkey);
        style::style_dialogs(&cc.egui_ctx);

        Self {
            settings,
            grid,
            background,
            pointer: PointerTracker::default(),
            theme: DeskTheme::default(),
            launcher: SystemLauncher::default(),
            toggle_shortcut: hotkey.and_then(|h| h.egui_shortcut()),
            rx: runtime.rx,
            icon_req_tx: runtime.icon_req_tx,
            #[cfg(target_os = "windows")]
            tray: runtime.tray,
            #[cfg(target_os = "windows")]
            action_tx: runtime.action_tx,
            visibility: Visibility::shown(),
            editor: None,
            chooser: None,
            pending_icons: HashMap::new(),
            next_ticket: 1,
            launch_prompt: None,
            delete_prompt: None,
            context_cell: None,
            selected: None,
            warning_message: None,
        }
    }

    fn show_warning<S: Into<String>>(&mut self, message: S) {
        self.warning_message = Some((message.into(), Instant::now()));
    }

    /// Grid input stays off while any dialog is up.
    fn modal_open(&self) -> bool {
        self.editor.is_some()
            || self.chooser.is_some()
            || self.launch_prompt.is_some()
            || self.delete_prompt.is_some()
    }

    fn set_visible(&mut self, visible: bool) {
        self.visibility.set(visible);
        #[cfg(target_os = "windows")]
        if let Some(tray) = &self.tray {
            tray.toggle_item.set_text(if visible { "Hide" } else { "Show" });
        }
    }

    /// Flips the overlay. On Windows the runtime thread issues the viewport
    /// commands so its own tray and hotkey state stay in step.
    fn toggle_visibility(&mut self, ctx: &egui::Context) {
        self.pointer.cancel();
        #[cfg(target_os = "windows")]
        if self.action_tx.send(runtime::RuntimeAction::Toggle).is_ok() {
            return;
        }
        let visible = !self.visibility.is_visible();
        self.set_visible(visible);
        if visible {
            ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(false));
            ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
        } else {
            ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
        }
    }

    /// Shows the grid again when the hidden window was restored by the
    /// window manager rather than by the app.
    fn watch_external_restore(&mut self, ctx: &egui::Context) {
        let minimized = ctx.input(|i| i.viewport().minimized);
        if !self.visibility.observe_minimized(minimized) {
            return;
        }
        info!("overlay restored from outside");
        self.set_visible(true);
        #[cfg(target_os = "windows")]
        let _ = self.action_tx.send(runtime::RuntimeAction::Show);
    }

    /// Re-reads settings from disk and applies geometry, background and the
    /// in-window toggle shortcut.
    fn reload_settings(&mut self, viewport: egui::Vec2) {
        self.settings = Settings::load(&self.grid.paths().settings_file);
        self.grid.set_geometry(
            self.settings.icon_size(),
            self.settings.max_rows(),
            self.settings.max_cols(),
            viewport,
        );
        self.background = BackgroundManager::from_settings(&self.settings.background());
        self.toggle_shortcut =
            parse_toggle_hotkey(&self.settings.toggle_keybind()).and_then(|h| h.egui_shortcut());
        self.pointer.cancel();
        self.selected = None;
        info!("settings reloaded");
    }

    fn set_icon_size(&mut self, size: u32, viewport: egui::Vec2) {
        self.settings.set_setting("icon_size", size);
        self.grid.set_geometry(
            self.settings.icon_size(),
            self.settings.max_rows(),
            self.settings.max_cols(),
            viewport,
        );
        self.pointer.cancel();
        info!("icon size set to {size}");
    }

    /// Queues icon generation for `entry`. Returns the ticket the answer will
    /// carry.
    fn request_icons(&mut self, target: IconTarget, entry: &IconEntry) -> Option<u64> {
        let cell = target.cell();
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let request = GenerateRequest::new(
            cell,
            &entry.executable_path,
            &entry.website_link,
            self.grid.cell_dir(cell),
        );
        if self.icon_req_tx.send(IconRequest { ticket, request }).is_err() {
            warn!("icon worker is gone, cannot generate an icon for {cell}");
            self.show_warning("Icon generation is unavailable");
            return None;
        }
        debug!("icon request {ticket} queued for {cell}");
        self.grid.hold(cell);
        self.pending_icons.insert(ticket, target);
        Some(ticket)
    }

    fn apply_icon_result(&mut self, result: IconResult) {
        let Some(target) = self.pending_icons.remove(&result.ticket) else {
            debug!("dropping unknown icon result {}", result.ticket);
            return;
        };
        let cell = target.cell();
        if let IconTarget::Editor(_) = target {
            match self.editor.as_mut() {
                Some(editor) if editor.generating == Some(result.ticket) => {
                    editor.generating = None;
                }
                _ => {
                    debug!("editor moved on, ignoring icon result {}", result.ticket);
                    self.grid.release(cell);
                    return;
                }
            }
        }

        match icon_gen::select(result.candidates) {
            IconSelection::None => {
                info!("no icon could be generated for {}", result.cell);
                if let IconTarget::Editor(_) = target {
                    self.show_warning("No icon could be generated");
                }
                self.grid.release(cell);
            }
            IconSelection::Single(path) => {
                self.assign_icon(target, path);
                self.grid.release(cell);
            }
            // The chooser takes over the hold until it closes.
            IconSelection::Choose(candidates) => self.open_chooser(target, candidates),
        }
    }

    fn open_chooser(&mut self, target: IconTarget, candidates: Vec<IconCandidate>) {
        self.close_chooser();
        self.chooser = Some(IconChooser::new(target, candidates));
    }

    fn close_chooser(&mut self) {
        if let Some(chooser) = self.chooser.take() {
            self.grid.release(chooser.target.cell());
        }
    }

    fn assign_icon(&mut self, target: IconTarget, path: PathBuf) {
        let icon_path = path.to_string_lossy().into_owned();
        match target {
            IconTarget::Editor(cell) => {
                let Some(editor) = self.editor.as_mut().filter(|e| e.cell == cell) else {
                    return;
                };
                editor.draft.icon_path = icon_path;
                self.grid.preview_entry(editor.draft.clone());
            }
            IconTarget::Saved(cell) => {
                let mut entry = self.grid.entry_or_default(cell);
                if entry.is_default() || !entry.icon_path.trim().is_empty() {
                    debug!("cell {cell} changed since generation, keeping its icon");
                    return;
                }
                entry.icon_path = icon_path;
                if let Err(err) = self.grid.save_entry(entry) {
                    warn!("failed to store generated icon for {cell}: {err}");
                    self.show_warning(format!("Could not save icon: {err}"));
                }
            }
        }
    }

    /// Opens the editor on `cell` and pins the cell until the editor closes.
    fn open_editor(&mut self, cell: CellCoord) {
        if let Some(previous) = self.close_editor() {
            self.grid.reload_cell(previous.cell);
        }
        self.close_chooser();
        self.editor = Some(EditorState::new(self.grid.entry_or_default(cell)));
        self.grid.hold(cell);
    }

    fn close_editor(&mut self) -> Option<EditorState> {
        let editor = self.editor.take()?;
        self.grid.release(editor.cell);
        Some(editor)
    }

    fn cancel_editor(&mut self) {
        if let Some(editor) = self.close_editor() {
            self.grid.reload_cell(editor.cell);
        }
    }

    fn commit_editor(&mut self) {
        let Some(editor) = self.close_editor() else {
            return;
        };
        let cell = editor.cell;
        let needs_icon = editor.has_target() && editor.draft.icon_path.trim().is_empty();
        let mut entry = editor.draft;
        entry.set_cell(cell);

        match self.grid.save_entry(entry.clone()) {
            Ok(()) => {
                info!("saved icon at {cell}");
                self.selected = Some(cell);
                if needs_icon && !entry.is_default() {
                    self.request_icons(IconTarget::Saved(cell), &entry);
                }
            }
            Err(err) => {
                warn!("failed to save icon at {cell}: {err}");
                self.show_warning(format!("Could not save: {err}"));
                self.grid.reload_cell(cell);
            }
        }
    }

    fn launch_cell(&mut self, cell: CellCoord) {
        let Some(entry) = self.grid.entity(cell).map(|e| e.entry().clone()) else {
            return;
        };
        match launch::launch(&entry, &mut self.launcher) {
            LaunchOutcome::Launched(_) => {}
            LaunchOutcome::NeedsChoice => self.launch_prompt = Some(cell),
            LaunchOutcome::Failed => self.show_warning(format!("Could not launch {}", entry.name)),
        }
    }

    fn launch_with(&mut self, cell: CellCoord, choice: LaunchChoice) {
        let Some(entry) = self.grid.entity(cell).map(|e| e.entry().clone()) else {
            return;
        };
        if launch::launch_choice(&entry, choice, &mut self.launcher) == LaunchOutcome::Failed {
            self.show_warning(format!("Could not launch {}", entry.name));
        }
    }

    fn delete_cell(&mut self, cell: CellCoord) {
        if self.editor.as_ref().is_some_and(|e| e.cell == cell) {
            self.close_editor();
        }
        if let Err(err) = self.grid.delete_cell(cell) {
            warn!("failed to delete icon at {cell}: {err}");
            self.show_warning(format!("Could not delete: {err}"));
            return;
        }
        if self.selected == Some(cell) {
            self.selected = None;
        }
        info!("deleted icon at {cell}");
    }

    fn run_context_action(&mut self, cell: CellCoord, action: ContextAction) {
        match action {
            ContextAction::Launch => self.launch_cell(cell),
            ContextAction::RunExecutable => self.launch_with(cell, LaunchChoice::Executable),
            ContextAction::OpenWebsite => self.launch_with(cell, LaunchChoice::Website),
            ContextAction::OpenFileLocation => {
                let target = self
                    .grid
                    .entity(cell)
                    .map(|e| e.entry().executable_path.trim().to_string())
                    .unwrap_or_default();
                if target.is_empty() || !system::reveal_in_file_manager(Path::new(&target)) {
                    self.show_warning("Could not open the file location");
                }
            }
            ContextAction::Edit => self.open_editor(cell),
            ContextAction::SetLaunchOption(option) => {
                if let Err(err) = self.grid.set_launch_option(cell, option) {
                    warn!("failed to set launch option for {cell}: {err}");
                    self.show_warning(format!("Could not change launch option: {err}"));
                }
            }
            ContextAction::Delete => self.delete_prompt = Some(cell),
        }
    }
}

fn parse_toggle_hotkey(raw: &str) -> Option<Hotkey> {
    match Hotkey::parse(raw) {
        Ok(hotkey) => Some(hotkey),
        Err(err) => {
            warn!("invalid toggle keybind {raw:?} ({err}), using {DEFAULT_TOGGLE_KEYBIND}");
            Hotkey::parse(DEFAULT_TOGGLE_KEYBIND).ok()
        }
    }
}
