use eframe::egui::{self, Color32};

pub const CELL_ROUNDING: f32 = 8.0;
pub const LABEL_GAP: f32 = 3.0;
pub const DRAG_GHOST_ALPHA: f32 = 0.7;

#[derive(Clone, Copy)]
pub struct DeskTheme {
    pub cell_hover: Color32,
    pub cell_selected: Color32,
    pub drop_hint: Color32,
    pub placeholder_bg: Color32,
    pub placeholder_fg: Color32,
    pub label_shadow: Color32,
    pub toast_bg: Color32,
    pub toast_text: Color32,
    pub toast_border: Color32,
}

impl Default for DeskTheme {
    fn default() -> Self {
        Self {
            cell_hover: Color32::from_rgba_premultiplied(35, 53, 74, 110),
            cell_selected: Color32::from_rgba_premultiplied(45, 104, 114, 140),
            drop_hint: Color32::from_rgba_premultiplied(93, 214, 189, 186),
            placeholder_bg: Color32::from_rgba_premultiplied(24, 36, 50, 154),
            placeholder_fg: Color32::from_rgba_premultiplied(205, 221, 238, 180),
            label_shadow: Color32::from_rgba_premultiplied(0, 0, 0, 170),
            toast_bg: Color32::from_rgba_premultiplied(8, 12, 18, 236),
            toast_text: Color32::from_rgb(245, 250, 255),
            toast_border: Color32::from_rgba_premultiplied(147, 169, 194, 78),
        }
    }
}

/// `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(raw: &str) -> Option<Color32> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some(Color32::from_rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color32::from_rgba_unmultiplied(
            byte(0)?,
            byte(2)?,
            byte(4)?,
            byte(6)?,
        )),
        _ => None,
    }
}

pub fn style_dialogs(ctx: &egui::Context) {
    ctx.style_mut(|style| {
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        style.spacing.button_padding = egui::vec2(10.0, 5.0);
        style.visuals.window_rounding = egui::Rounding::same(10.0);
    });
}
