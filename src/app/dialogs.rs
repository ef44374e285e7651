use super::DeskApp;
use crate::config::LaunchOption;
use crate::icons;
use crate::launch::LaunchChoice;
use eframe::egui;
use log::debug;

const CHOICE_EDGE: u32 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorAction {
    None,
    Save,
    SaveAnyway,
    BackToEdit,
    Generate,
    Cancel,
}

fn dialog<'open>(title: &str) -> egui::Window<'open> {
    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
}

impl DeskApp {
    pub(super) fn draw_dialogs(&mut self, ctx: &egui::Context) {
        self.draw_editor(ctx);
        self.draw_icon_chooser(ctx);
        self.draw_launch_prompt(ctx);
        self.draw_delete_prompt(ctx);
    }

    fn draw_editor(&mut self, ctx: &egui::Context) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let mut action = EditorAction::None;
        let mut open = true;
        let mut changed = false;
        let has_target = editor.has_target();
        let generating = editor.generating.is_some();

        dialog("Edit icon")
            .id(egui::Id::new("edit_cell"))
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(format!("Cell {}", editor.cell));
                if !editor.missing_paths.is_empty() {
                    ui.label("These paths do not exist:");
                    for path in &editor.missing_paths {
                        ui.monospace(path);
                    }
                    ui.label("Save anyway?");
                    ui.horizontal(|ui| {
                        if ui.button("Save anyway").clicked() {
                            action = EditorAction::SaveAnyway;
                        }
                        if ui.button("Back").clicked() {
                            action = EditorAction::BackToEdit;
                        }
                    });
                    return;
                }

                let draft = &mut editor.draft;
                egui::Grid::new("edit_cell_fields")
                    .num_columns(2)
                    .spacing([10.0, 6.0])
                    .show(ui, |ui| {
                        ui.label("Name");
                        changed |= ui.text_edit_singleline(&mut draft.name).changed();
                        ui.end_row();

                        ui.label("Executable");
                        changed |= ui.text_edit_singleline(&mut draft.executable_path).changed();
                        ui.end_row();

                        ui.label("Arguments");
                        changed |= ui.text_edit_singleline(&mut draft.command_args).changed();
                        ui.end_row();

                        ui.label("Website");
                        changed |= ui.text_edit_singleline(&mut draft.website_link).changed();
                        ui.end_row();

                        ui.label("Icon");
                        ui.horizontal(|ui| {
                            changed |= ui.text_edit_singleline(&mut draft.icon_path).changed();
                            let button = ui
                                .add_enabled(has_target && !generating, egui::Button::new("Generate"))
                                .on_disabled_hover_text("Set an executable or website first");
                            if button.clicked() {
                                action = EditorAction::Generate;
                            }
                        });
                        ui.end_row();

                        ui.label("Launch");
                        egui::ComboBox::from_id_salt("launch_option")
                            .selected_text(draft.launch_option.label())
                            .show_ui(ui, |ui| {
                                for option in LaunchOption::ALL {
                                    changed |= ui
                                        .selectable_value(&mut draft.launch_option, option, option.label())
                                        .changed();
                                }
                            });
                        ui.end_row();

                        ui.label("Font size");
                        ui.horizontal(|ui| {
                            changed |= ui
                                .checkbox(&mut draft.use_global_font_size, "Global")
                                .changed();
                            changed |= ui
                                .add_enabled(
                                    !draft.use_global_font_size,
                                    egui::DragValue::new(&mut draft.font_size).range(4..=72),
                                )
                                .changed();
                        });
                        ui.end_row();

                        ui.label("Font color");
                        ui.horizontal(|ui| {
                            changed |= ui
                                .checkbox(&mut draft.use_global_font_color, "Global")
                                .changed();
                            changed |= ui
                                .add_enabled(
                                    !draft.use_global_font_color,
                                    egui::TextEdit::singleline(&mut draft.font_color)
                                        .desired_width(90.0),
                                )
                                .changed();
                        });
                        ui.end_row();
                    });

                if generating {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Generating icon...");
                    });
                }
                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        action = EditorAction::Save;
                    }
                    if ui.button("Cancel").clicked() {
                        action = EditorAction::Cancel;
                    }
                });
            });

        if changed {
            self.grid.preview_entry(editor.draft.clone());
        }
        if !open {
            action = EditorAction::Cancel;
        }

        match action {
            EditorAction::None => {}
            EditorAction::Save => {
                let missing = editor.find_missing_paths();
                if missing.is_empty() {
                    self.commit_editor();
                } else {
                    editor.missing_paths = missing;
                }
            }
            EditorAction::SaveAnyway => self.commit_editor(),
            EditorAction::BackToEdit => editor.missing_paths.clear(),
            EditorAction::Generate => {
                let target = super::IconTarget::Editor(editor.cell);
                let draft = editor.draft.clone();
                let ticket = self.request_icons(target, &draft);
                if let Some(editor) = self.editor.as_mut() {
                    editor.generating = ticket;
                }
            }
            EditorAction::Cancel => self.cancel_editor(),
        }
    }

    fn draw_icon_chooser(&mut self, ctx: &egui::Context) {
        let Some(chooser) = self.chooser.as_mut() else {
            return;
        };
        if chooser.textures.len() != chooser.candidates.len() {
            chooser.textures = chooser
                .candidates
                .iter()
                .enumerate()
                .map(|(i, candidate)| {
                    let image = icons::load_rgba(&candidate.path)?;
                    let square = icons::resize_to_square(&image, CHOICE_EDGE);
                    Some(ctx.load_texture(
                        format!("choice:{i}"),
                        icons::to_color_image(&square),
                        egui::TextureOptions::LINEAR,
                    ))
                })
                .collect();
        }

        let mut picked = None;
        let mut dismissed = false;
        let mut open = true;
        let edge = CHOICE_EDGE as f32;
        dialog("Choose an icon")
            .id(egui::Id::new("icon_chooser"))
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label("Several icons were found. Pick one:");
                ui.horizontal(|ui| {
                    for (i, (candidate, texture)) in
                        chooser.candidates.iter().zip(&chooser.textures).enumerate()
                    {
                        ui.vertical(|ui| {
                            let clicked = match texture {
                                Some(texture) => ui
                                    .add(egui::ImageButton::new((texture.id(), egui::vec2(edge, edge))))
                                    .clicked(),
                                None => ui
                                    .add_sized([edge, edge], egui::Button::new("?"))
                                    .clicked(),
                            };
                            ui.label(candidate.source.label());
                            if clicked {
                                picked = Some(i);
                            }
                        });
                    }
                });
                ui.separator();
                if ui.button("Cancel").clicked() {
                    dismissed = true;
                }
            });

        if let Some(index) = picked {
            let target = chooser.target;
            let path = chooser.candidates.get(index).map(|c| c.path.clone());
            if let Some(path) = path {
                self.assign_icon(target, path);
            }
            self.close_chooser();
        } else if dismissed || !open {
            debug!("icon choice dismissed");
            self.close_chooser();
        }
    }

    fn draw_launch_prompt(&mut self, ctx: &egui::Context) {
        let Some(cell) = self.launch_prompt else {
            return;
        };
        let name = self
            .grid
            .entity(cell)
            .map(|e| e.entry().name.clone())
            .unwrap_or_default();
        let mut choice = None;
        let mut cancelled = false;

        dialog("Launch")
            .id(egui::Id::new("launch_prompt"))
            .show(ctx, |ui| {
                ui.label(format!("How should \"{name}\" be opened?"));
                ui.horizontal(|ui| {
                    if ui.button("Run executable").clicked() {
                        choice = Some(LaunchChoice::Executable);
                    }
                    if ui.button("Open website").clicked() {
                        choice = Some(LaunchChoice::Website);
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                });
            });

        if let Some(choice) = choice {
            self.launch_prompt = None;
            self.launch_with(cell, choice);
        } else if cancelled {
            self.launch_prompt = None;
        }
    }

    fn draw_delete_prompt(&mut self, ctx: &egui::Context) {
        let Some(cell) = self.delete_prompt else {
            return;
        };
        let name = self
            .grid
            .entity(cell)
            .map(|e| e.entry().name.clone())
            .unwrap_or_default();
        let mut confirmed = false;
        let mut cancelled = false;

        dialog("Delete icon")
            .id(egui::Id::new("delete_prompt"))
            .show(ctx, |ui| {
                ui.label(format!("Delete \"{name}\" and its icon files?"));
                ui.horizontal(|ui| {
                    if ui.button("Delete").clicked() {
                        confirmed = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                });
            });

        if confirmed {
            self.delete_prompt = None;
            self.delete_cell(cell);
        } else if cancelled {
            self.delete_prompt = None;
        }
    }
}
