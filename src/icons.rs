use eframe::egui;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{imageops, AnimationDecoder, Frames, RgbaImage};
use log::{debug, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest frame delay honoured for animations; 0ms GIF frames play at this rate.
const MIN_FRAME_DELAY_MS: u32 = 20;

pub fn load_rgba(path: &Path) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(img) => Some(img.to_rgba8()),
        Err(err) => {
            debug!("failed to decode {}: {err}", path.display());
            None
        }
    }
}

pub fn decode_rgba(bytes: &[u8]) -> Option<RgbaImage> {
    image::load_from_memory(bytes)
        .ok()
        .map(|img| img.to_rgba8())
}

/// Scales `image` to fit an `edge` x `edge` square, centred on transparency.
pub fn resize_to_square(image: &RgbaImage, edge: u32) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w == edge && h == edge {
        return image.clone();
    }
    let edge = edge.max(1);
    let scale = edge as f32 / w.max(h).max(1) as f32;
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, edge);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, edge);
    let scaled = imageops::resize(image, new_w, new_h, imageops::FilterType::Lanczos3);

    let mut canvas = RgbaImage::new(edge, edge);
    let x = (edge - new_w) / 2;
    let y = (edge - new_h) / 2;
    imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
    canvas
}

/// Writes `image` as PNG, creating parent folders. Returns the written path.
pub fn save_png(image: &RgbaImage, path: &Path) -> Option<PathBuf> {
    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            warn!("failed to create {}: {err}", parent.display());
            return None;
        }
    }
    match image.save_with_format(path, image::ImageFormat::Png) {
        Ok(()) => Some(path.to_path_buf()),
        Err(err) => {
            warn!("failed to write {}: {err}", path.display());
            None
        }
    }
}

pub fn to_color_image(image: &RgbaImage) -> egui::ColorImage {
    let (w, h) = image.dimensions();
    egui::ColorImage::from_rgba_unmultiplied([w as usize, h as usize], image.as_raw())
}

/// Decoded frame sequence with per-frame delays.
pub struct AnimatedImage {
    pub frames: Vec<egui::ColorImage>,
    delays_ms: Vec<u32>,
    total_ms: u64,
}

impl AnimatedImage {
    pub fn new(frames: Vec<(egui::ColorImage, u32)>) -> Option<Self> {
        if frames.is_empty() {
            return None;
        }
        let mut images = Vec::with_capacity(frames.len());
        let mut delays_ms = Vec::with_capacity(frames.len());
        for (image, delay) in frames {
            images.push(image);
            delays_ms.push(delay.max(MIN_FRAME_DELAY_MS));
        }
        let total_ms = delays_ms.iter().map(|d| *d as u64).sum();
        Some(Self {
            frames: images,
            delays_ms,
            total_ms,
        })
    }

    pub fn size(&self) -> [usize; 2] {
        self.frames[0].size
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn frame_at(&self, elapsed: Duration) -> usize {
        if self.frames.len() <= 1 || self.total_ms == 0 {
            return 0;
        }
        let mut t = (elapsed.as_millis() as u64) % self.total_ms;
        for (idx, delay) in self.delays_ms.iter().enumerate() {
            let delay = *delay as u64;
            if t < delay {
                return idx;
            }
            t -= delay;
        }
        self.frames.len() - 1
    }
}

fn collect_frames(frames: Frames<'_>, edge: Option<u32>) -> Option<AnimatedImage> {
    let frames = match frames.collect_frames() {
        Ok(frames) => frames,
        Err(err) => {
            debug!("failed to decode animation frames: {err}");
            return None;
        }
    };
    let decoded = frames
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = if denom == 0 { 0 } else { numer / denom };
            let buffer = frame.into_buffer();
            let buffer = match edge {
                Some(edge) => resize_to_square(&buffer, edge),
                None => buffer,
            };
            (to_color_image(&buffer), delay)
        })
        .collect();
    AnimatedImage::new(decoded)
}

fn is_ext(path: &Path, wanted: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| wanted.iter().any(|w| ext.eq_ignore_ascii_case(w)))
        .unwrap_or(false)
}

pub fn is_animation_container(path: &Path) -> bool {
    is_ext(path, &["gif", "png", "apng", "webp"])
}

/// Decodes GIF, APNG or animated WebP frames. `edge` squares every frame when given.
/// Still images come back as a single frame.
pub fn load_animation(path: &Path, edge: Option<u32>) -> Option<AnimatedImage> {
    let open = || File::open(path).ok().map(BufReader::new);
    if is_ext(path, &["gif"]) {
        let decoder = GifDecoder::new(open()?).ok()?;
        return collect_frames(decoder.into_frames(), edge);
    }
    if is_ext(path, &["png", "apng"]) {
        let decoder = PngDecoder::new(open()?).ok()?;
        if decoder.is_apng().unwrap_or(false) {
            return collect_frames(decoder.apng().ok()?.into_frames(), edge);
        }
    }
    if is_ext(path, &["webp"]) {
        let decoder = WebPDecoder::new(open()?).ok()?;
        if decoder.has_animation() {
            return collect_frames(decoder.into_frames(), edge);
        }
    }
    let still = load_rgba(path)?;
    let still = match edge {
        Some(edge) => resize_to_square(&still, edge),
        None => still,
    };
    AnimatedImage::new(vec![(to_color_image(&still), 0)])
}

#[cfg(target_os = "windows")]
pub fn generate_colored_icon(color: [u8; 4]) -> Option<tray_icon::Icon> {
    let width = 32;
    let height = 32;
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..height {
        for _ in 0..width {
            rgba.extend_from_slice(&color);
        }
    }
    tray_icon::Icon::from_rgba(rgba, width, height).ok()
}
