use super::style::{parse_hex_color, CELL_ROUNDING, DRAG_GHOST_ALPHA, LABEL_GAP};
use super::DeskApp;
use crate::events::UserEvent;
use crate::grid::{CellCoord, ContextAction, IconEntity, IconTextures, IconVisual, PointerOutcome};
use eframe::egui;
use log::{info, warn};
use std::time::Duration;

const ANIMATION_REPAINT: Duration = Duration::from_millis(16);
const LABEL_LINE_HEIGHT: f32 = 1.3;
const ICON_SIZE_PRESETS: [(&str, u32); 3] = [("Small", 64), ("Medium", 100), ("Large", 128)];

impl eframe::App for DeskApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0, 0.0, 0.0, 0.0]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_runtime_events(ctx);
        self.handle_toggle_shortcut(ctx);
        self.watch_external_restore(ctx);
        if !self.visibility.is_visible() {
            return;
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                self.background.paint(ctx, ui.painter(), rect);
                if let Some(message) = self.background.take_warning() {
                    self.show_warning(message);
                }
                if self.grid.resize(rect.size()) {
                    let layout = self.grid.layout();
                    info!(
                        "visible grid is now {}x{}",
                        layout.visible_rows(),
                        layout.visible_cols()
                    );
                }

                let response = ui.interact(
                    rect,
                    egui::Id::new("desk_grid"),
                    egui::Sense::click_and_drag(),
                );
                let modal = self.modal_open();
                if modal {
                    self.pointer.cancel();
                } else {
                    self.handle_pointer(ui, rect.min, &response);
                }
                self.draw_grid(ui, rect.min, &response);
                self.draw_drag_ghost(ui, rect.min);
                if !modal {
                    response.context_menu(|ui| self.draw_context_menu(ui, rect.size()));
                }
                self.draw_warning_overlay(ui);
            });

        self.draw_dialogs(ctx);
    }
}

impl DeskApp {
    fn handle_runtime_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                UserEvent::Show => self.set_visible(true),
                UserEvent::Hide => self.set_visible(false),
                UserEvent::Quit => {
                    info!("Exiting application...");
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                UserEvent::IconsGenerated(result) => self.apply_icon_result(result),
            }
        }
    }

    /// The configured toggle chord while the window has focus; the global
    /// registration covers the unfocused case.
    fn handle_toggle_shortcut(&mut self, ctx: &egui::Context) {
        let Some(shortcut) = self.toggle_shortcut else {
            return;
        };
        if ctx.input_mut(|i| i.consume_shortcut(&shortcut)) {
            self.toggle_visibility(ctx);
        }
    }

    fn handle_pointer(&mut self, ui: &egui::Ui, origin: egui::Pos2, response: &egui::Response) {
        let (pressed, down, released, pointer) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let Some(pointer) = pointer else {
            return;
        };
        let local = (pointer - origin).to_pos2();
        let layout = *self.grid.layout();

        if pressed && response.contains_pointer() {
            let grid = &self.grid;
            self.pointer
                .on_pointer_down(&layout, local, |cell| grid.is_occupied(cell));
        } else if down {
            self.pointer.on_pointer_move(&layout, local);
        }
        if self.pointer.is_dragging() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
        }

        if released {
            match self.pointer.on_pointer_up(&layout, local) {
                PointerOutcome::None => {
                    if response.contains_pointer() {
                        self.selected = None;
                    }
                }
                PointerOutcome::Click(cell) => self.selected = Some(cell),
                PointerOutcome::Drop { from, to } => match self.grid.move_icon(from, to) {
                    Ok(outcome) => {
                        info!("drop finished: {outcome:?}");
                        self.selected = Some(to);
                    }
                    Err(err) => {
                        warn!("move {from} -> {to} failed: {err}");
                        self.show_warning(format!("Could not move icon: {err}"));
                    }
                },
                PointerOutcome::DropCancelled(cell) => self.selected = Some(cell),
            }
        }

        if response.double_clicked() {
            if let Some(cell) = self.grid.hit_test(local) {
                if self.grid.is_occupied(cell) {
                    self.launch_cell(cell);
                } else {
                    self.open_editor(cell);
                }
            }
        }
        if response.secondary_clicked() {
            self.context_cell = self.grid.hit_test(local);
        }
    }

    fn draw_grid(&mut self, ui: &egui::Ui, origin: egui::Pos2, response: &egui::Response) {
        let ctx = ui.ctx();
        let painter = ui.painter();
        let theme = self.theme;
        let layout = *self.grid.layout();
        let edge = layout.icon_size.round() as u32;
        let label_size = self.settings.label_size();
        let label_color = self.settings.label_color();
        let hovered = response
            .hover_pos()
            .and_then(|p| layout.hit_test((p - origin).to_pos2()));
        let dragged = self.pointer.drag_preview().map(|(cell, _)| cell);
        let selected = self.selected;

        if let (Some(from), Some(cell)) = (dragged, hovered) {
            if cell != from {
                painter.rect_stroke(
                    layout.cell_rect(origin, cell).expand(3.0),
                    CELL_ROUNDING,
                    egui::Stroke::new(2.0, theme.drop_hint),
                );
            }
        }

        let mut animated = false;
        for entity in self.grid.visible_entities_mut() {
            let cell = entity.cell();
            let cell_rect = layout.cell_rect(origin, cell);
            if selected == Some(cell) {
                painter.rect_filled(cell_rect.expand(3.0), CELL_ROUNDING, theme.cell_selected);
            } else if hovered == Some(cell) && dragged.is_none() {
                painter.rect_filled(cell_rect.expand(3.0), CELL_ROUNDING, theme.cell_hover);
            }

            let icon_rect = layout.icon_rect(origin, cell);
            let tint = if dragged == Some(cell) {
                egui::Color32::WHITE.gamma_multiply(0.35)
            } else {
                egui::Color32::WHITE
            };
            match icon_texture(ctx, entity, edge) {
                Some(texture) => {
                    painter.image(texture, icon_rect, full_uv(), tint);
                }
                None => paint_placeholder(painter, entity, icon_rect, &theme),
            }
            animated |= entity.is_animated();

            let size = entity.font_size(label_size).max(1) as f32 * LABEL_LINE_HEIGHT;
            let color = parse_hex_color(entity.font_color(&label_color)).unwrap_or(egui::Color32::WHITE);
            let mut y = icon_rect.bottom() + LABEL_GAP;
            for line in entity.label_lines() {
                let pos = egui::pos2(icon_rect.center().x, y);
                let font = egui::FontId::proportional(size);
                painter.text(
                    pos + egui::vec2(1.0, 1.0),
                    egui::Align2::CENTER_TOP,
                    &line,
                    font.clone(),
                    theme.label_shadow,
                );
                painter.text(pos, egui::Align2::CENTER_TOP, &line, font, color);
                y += size * LABEL_LINE_HEIGHT;
            }
        }

        if animated {
            ctx.request_repaint_after(ANIMATION_REPAINT);
        }
    }

    fn draw_drag_ghost(&mut self, ui: &egui::Ui, origin: egui::Pos2) {
        let Some((cell, top_left)) = self.pointer.drag_preview() else {
            return;
        };
        let layout = *self.grid.layout();
        let edge = layout.icon_size.round() as u32;
        let theme = self.theme;
        let Some(entity) = self.grid.entity_mut(cell) else {
            return;
        };
        let painter = ui.ctx().layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("drag_ghost"),
        ));
        let rect = egui::Rect::from_min_size(
            origin + top_left.to_vec2(),
            egui::vec2(layout.icon_size, layout.icon_size),
        );
        match icon_texture(ui.ctx(), entity, edge) {
            Some(texture) => {
                painter.image(
                    texture,
                    rect,
                    full_uv(),
                    egui::Color32::WHITE.gamma_multiply(DRAG_GHOST_ALPHA),
                );
            }
            None => paint_placeholder(&painter, entity, rect, &theme),
        }
        ui.ctx().request_repaint();
    }

    fn draw_context_menu(&mut self, ui: &mut egui::Ui, viewport: egui::Vec2) {
        let cell = self.context_cell;
        let actions = cell.and_then(|cell| {
            self.grid
                .entity(cell)
                .map(|e| (e.context_actions(), e.entry().launch_option))
        });
        let mut picked = None;

        match (cell, actions) {
            (Some(_), Some((actions, current))) => {
                let options: Vec<_> = actions
                    .iter()
                    .filter_map(|a| match a {
                        ContextAction::SetLaunchOption(option) => Some(*option),
                        _ => None,
                    })
                    .collect();
                let mut submenu_drawn = false;
                for action in actions {
                    if let ContextAction::SetLaunchOption(_) = action {
                        if !submenu_drawn {
                            submenu_drawn = true;
                            ui.menu_button("Launch option", |ui| {
                                for option in &options {
                                    if ui.radio(*option == current, option.label()).clicked() {
                                        picked = Some(ContextAction::SetLaunchOption(*option));
                                        ui.close_menu();
                                    }
                                }
                            });
                        }
                        continue;
                    }
                    if action == ContextAction::Delete {
                        ui.separator();
                    }
                    if ui.button(action.label()).clicked() {
                        picked = Some(action);
                        ui.close_menu();
                    }
                }
            }
            (Some(cell), None) => {
                if ui.button("New icon...").clicked() {
                    ui.close_menu();
                    self.open_editor(cell);
                }
            }
            (None, _) => {}
        }

        ui.separator();
        let current_size = self.settings.icon_size();
        let mut new_size = None;
        ui.menu_button("Icon size", |ui| {
            for (label, size) in ICON_SIZE_PRESETS {
                if ui.radio(current_size == size, label).clicked() {
                    new_size = Some(size);
                    ui.close_menu();
                }
            }
        });
        if let Some(size) = new_size {
            self.set_icon_size(size, viewport);
        }
        if ui.button("Reload settings").clicked() {
            ui.close_menu();
            self.reload_settings(viewport);
        }
        if ui.button("Quit").clicked() {
            info!("Exiting via context menu...");
            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
        }

        if let (Some(cell), Some(action)) = (cell, picked) {
            self.run_context_action(cell, action);
        }
    }

    fn draw_warning_overlay(&mut self, ui: &egui::Ui) {
        if let Some((msg, start_time)) = &self.warning_message {
            let elapsed = start_time.elapsed();
            if elapsed < Duration::from_secs(2) {
                let painter = ui.ctx().layer_painter(egui::LayerId::new(
                    egui::Order::Foreground,
                    egui::Id::new("warning"),
                ));
                let rect = ui.clip_rect();

                let galley = painter.layout(
                    msg.clone(),
                    egui::FontId::proportional(15.0),
                    self.theme.toast_text,
                    f32::INFINITY,
                );

                let text_rect = galley.rect;
                let centered_rect = text_rect.translate(rect.center() - text_rect.center());
                painter.rect_filled(centered_rect.expand(10.0), 10.0, self.theme.toast_bg);
                painter.rect_stroke(
                    centered_rect.expand(10.0),
                    10.0,
                    egui::Stroke::new(1.0, self.theme.toast_border),
                );
                painter.galley(centered_rect.min, galley, self.theme.toast_text);
                ui.ctx().request_repaint();
            } else {
                self.warning_message = None;
            }
        }
    }
}

fn full_uv() -> egui::Rect {
    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0))
}

/// Uploads the entity's frames on first use and returns the texture for the
/// current frame, or `None` when it renders as a placeholder.
fn icon_texture(ctx: &egui::Context, entity: &mut IconEntity, edge: u32) -> Option<egui::TextureId> {
    if entity.textures.is_none() {
        let cell = entity.cell();
        let frames = match entity.visual(edge) {
            IconVisual::Image(anim) => anim
                .frames
                .iter()
                .enumerate()
                .map(|(i, frame)| {
                    ctx.load_texture(
                        texture_name(cell, i),
                        frame.clone(),
                        egui::TextureOptions::LINEAR,
                    )
                })
                .collect(),
            IconVisual::Placeholder => Vec::new(),
        };
        entity.textures = Some(IconTextures { frames });
    }
    let index = entity.frame_index();
    entity
        .textures
        .as_ref()?
        .frames
        .get(index)
        .map(|texture| texture.id())
}

fn texture_name(cell: CellCoord, frame: usize) -> String {
    format!("icon:{}:{frame}", cell.folder_name())
}

fn paint_placeholder(
    painter: &egui::Painter,
    entity: &IconEntity,
    rect: egui::Rect,
    theme: &super::style::DeskTheme,
) {
    painter.rect_filled(rect, CELL_ROUNDING, theme.placeholder_bg);
    let initial = entity
        .entry()
        .name
        .trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "?".to_string());
    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        initial,
        egui::FontId::proportional(rect.height() * 0.42),
        theme.placeholder_fg,
    );
}
