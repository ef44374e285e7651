#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

mod app;
mod background;
mod branding;
mod config;
mod error;
mod events;
mod grid;
mod hotkey;
mod icon_gen;
mod icons;
mod launch;
mod settings;
mod system;

use crate::app::DeskApp;
use crate::branding::APP_DISPLAY_NAME;
use eframe::egui;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("starting {APP_DISPLAY_NAME}");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_DISPLAY_NAME)
            .with_maximized(true)
            .with_resizable(true)
            .with_decorations(false)
            .with_transparent(true)
            .with_taskbar(cfg!(not(target_os = "windows")))
            .with_visible(true),
        ..Default::default()
    };

    eframe::run_native(
        APP_DISPLAY_NAME,
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            install_windows_font_fallback(&cc.egui_ctx);
            Ok(Box::new(DeskApp::new(cc)))
        }),
    )
}

/// CJK-capable system fonts so icon names in any script render.
fn install_windows_font_fallback(ctx: &egui::Context) {
    let mut fonts = egui::FontDefinitions::default();
    let font_candidates = [
        ("yahei", r"C:\Windows\Fonts\msyh.ttc"),
        ("yahei_ui", r"C:\Windows\Fonts\msyhbd.ttc"),
        ("simhei", r"C:\Windows\Fonts\simhei.ttf"),
    ];

    for (name, path) in font_candidates {
        if let Ok(data) = std::fs::read(path) {
            fonts
                .font_data
                .insert(name.to_owned(), egui::FontData::from_owned(data).into());

            if let Some(family) = fonts.families.get_mut(&egui::FontFamily::Proportional) {
                family.push(name.to_owned());
            }
            if let Some(family) = fonts.families.get_mut(&egui::FontFamily::Monospace) {
                family.push(name.to_owned());
            }
            break;
        }
    }

    ctx.set_fonts(fonts);
}
