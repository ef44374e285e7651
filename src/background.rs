use crate::icons::{self, AnimatedImage};
use crate::settings::{BackgroundKind, BackgroundSettings, MediaPlacement};
use eframe::egui;
use log::{info, warn};
use std::path::Path;
use std::time::{Duration, Instant};

const VIDEO_REPAINT: Duration = Duration::from_millis(16);

/// Where media of `media` size lands in `viewport`: cover-fit, scaled by the
/// zoom, centred and then shifted by the pixel offsets.
pub fn placed_rect(viewport: egui::Rect, media: egui::Vec2, placement: MediaPlacement) -> egui::Rect {
    if media.x <= 0.0 || media.y <= 0.0 {
        return viewport;
    }
    let cover = (viewport.width() / media.x).max(viewport.height() / media.y);
    let zoom = if placement.zoom.is_finite() && placement.zoom > 0.0 {
        placement.zoom
    } else {
        1.0
    };
    let size = media * cover * zoom;
    let center = viewport.center() + egui::vec2(placement.x_offset, placement.y_offset);
    egui::Rect::from_center_size(center, size)
}

pub trait BackgroundLayer {
    fn kind(&self) -> BackgroundKind;

    fn media(&self) -> &AnimatedImage;

    fn placement(&self) -> MediaPlacement;

    fn frame_index(&self) -> usize;
}

pub struct ImageBackground {
    media: AnimatedImage,
    placement: MediaPlacement,
}

impl ImageBackground {
    pub fn load(path: &Path, placement: MediaPlacement) -> Option<Self> {
        let still = icons::load_rgba(path)?;
        let media = AnimatedImage::new(vec![(icons::to_color_image(&still), 0)])?;
        Some(Self { media, placement })
    }
}

impl BackgroundLayer for ImageBackground {
    fn kind(&self) -> BackgroundKind {
        BackgroundKind::Image
    }

    fn media(&self) -> &AnimatedImage {
        &self.media
    }

    fn placement(&self) -> MediaPlacement {
        self.placement
    }

    fn frame_index(&self) -> usize {
        0
    }
}

/// Looping frame sequence decoded from an animated image container.
pub struct VideoBackground {
    media: AnimatedImage,
    placement: MediaPlacement,
    started: Instant,
}

impl VideoBackground {
    pub fn load(path: &Path, placement: MediaPlacement) -> Option<Self> {
        if !icons::is_animation_container(path) {
            return None;
        }
        let media = icons::load_animation(path, None)?;
        Some(Self {
            media,
            placement,
            started: Instant::now(),
        })
    }
}

impl BackgroundLayer for VideoBackground {
    fn kind(&self) -> BackgroundKind {
        BackgroundKind::Video
    }

    fn media(&self) -> &AnimatedImage {
        &self.media
    }

    fn placement(&self) -> MediaPlacement {
        self.placement
    }

    fn frame_index(&self) -> usize {
        self.media.frame_at(self.started.elapsed())
    }
}

#[derive(Default)]
pub struct BackgroundManager {
    layer: Option<Box<dyn BackgroundLayer>>,
    texture: Option<egui::TextureHandle>,
    uploaded: Option<usize>,
    warning: Option<String>,
}

impl BackgroundManager {
    pub fn from_settings(settings: &BackgroundSettings) -> Self {
        let mut manager = Self::default();
        manager.layer = match settings.kind {
            BackgroundKind::None => None,
            BackgroundKind::Image => manager.load_image(settings),
            BackgroundKind::Video => manager.load_video(settings),
        };
        if let Some(layer) = &manager.layer {
            let [w, h] = layer.media().size();
            info!(
                "background {:?} loaded ({w}x{h}, {} frame(s))",
                layer.kind(),
                layer.media().frames.len()
            );
        }
        manager
    }

    fn load_image(&mut self, settings: &BackgroundSettings) -> Option<Box<dyn BackgroundLayer>> {
        let path = settings.image_path.as_deref()?;
        match ImageBackground::load(path, settings.image_placement) {
            Some(layer) => Some(Box::new(layer)),
            None => {
                self.warn(format!("Background image {} could not be loaded", path.display()));
                None
            }
        }
    }

    fn load_video(&mut self, settings: &BackgroundSettings) -> Option<Box<dyn BackgroundLayer>> {
        if let Some(path) = settings.video_path.as_deref() {
            if let Some(layer) = VideoBackground::load(path, settings.video_placement) {
                return Some(Box::new(layer));
            }
            self.warn(format!(
                "Background video {} is not a playable animation",
                path.display()
            ));
        }
        self.load_image(settings)
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warning = Some(message);
    }

    #[cfg(test)]
    pub fn kind(&self) -> BackgroundKind {
        self.layer
            .as_ref()
            .map(|l| l.kind())
            .unwrap_or(BackgroundKind::None)
    }

    /// A load problem worth showing to the user, once.
    pub fn take_warning(&mut self) -> Option<String> {
        self.warning.take()
    }

    pub fn paint(&mut self, ctx: &egui::Context, painter: &egui::Painter, viewport: egui::Rect) {
        let Some(layer) = &self.layer else {
            return;
        };
        let index = layer.frame_index();
        let media = layer.media();
        let Some(frame) = media.frames.get(index) else {
            return;
        };

        if self.uploaded != Some(index) {
            match &mut self.texture {
                Some(texture) => texture.set(frame.clone(), egui::TextureOptions::LINEAR),
                None => {
                    self.texture = Some(ctx.load_texture(
                        "background",
                        frame.clone(),
                        egui::TextureOptions::LINEAR,
                    ));
                }
            }
            self.uploaded = Some(index);
        }

        if let Some(texture) = &self.texture {
            let [w, h] = media.size();
            let rect = placed_rect(viewport, egui::vec2(w as f32, h as f32), layer.placement());
            painter.image(
                texture.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        if media.is_animated() {
            ctx.request_repaint_after(VIDEO_REPAINT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    fn viewport() -> egui::Rect {
        egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(1920.0, 1080.0))
    }

    #[test]
    fn cover_fit_fills_the_viewport() {
        let rect = placed_rect(viewport(), egui::vec2(960.0, 960.0), MediaPlacement::default());
        assert_eq!(rect.size(), egui::vec2(1920.0, 1920.0));
        assert_eq!(rect.center(), egui::pos2(960.0, 540.0));
        assert_eq!(rect.min.y, -420.0);

        let wide = placed_rect(viewport(), egui::vec2(3840.0, 1080.0), MediaPlacement::default());
        assert_eq!(wide.size(), egui::vec2(3840.0, 1080.0));
        assert_eq!(wide.min.x, -960.0);
    }

    #[test]
    fn zoom_and_offsets_apply_after_cover() {
        let placement = MediaPlacement {
            zoom: 1.5,
            x_offset: 100.0,
            y_offset: -50.0,
        };
        let rect = placed_rect(viewport(), egui::vec2(1920.0, 1080.0), placement);
        assert_eq!(rect.size(), egui::vec2(2880.0, 1620.0));
        assert_eq!(rect.center(), egui::pos2(1060.0, 490.0));

        let bogus = MediaPlacement {
            zoom: 0.0,
            ..MediaPlacement::default()
        };
        let rect = placed_rect(viewport(), egui::vec2(1920.0, 1080.0), bogus);
        assert_eq!(rect, viewport());
    }

    fn settings(kind: BackgroundKind) -> BackgroundSettings {
        BackgroundSettings {
            kind,
            image_path: None,
            video_path: None,
            image_placement: MediaPlacement::default(),
            video_placement: MediaPlacement::default(),
        }
    }

    #[test]
    fn unsupported_video_falls_back_to_image() {
        let dir = tempfile::tempdir().expect("temp dir");
        let still = dir.path().join("wall.png");
        RgbaImage::from_pixel(8, 4, Rgba([1, 2, 3, 255]))
            .save(&still)
            .expect("png");

        let mut bg = settings(BackgroundKind::Video);
        bg.video_path = Some(dir.path().join("clip.mp4"));
        bg.image_path = Some(still);
        let mut manager = BackgroundManager::from_settings(&bg);
        assert_eq!(manager.kind(), BackgroundKind::Image);
        assert!(manager.take_warning().is_some());
        assert!(manager.take_warning().is_none());
    }

    #[test]
    fn missing_media_leaves_no_layer() {
        let mut bg = settings(BackgroundKind::Image);
        bg.image_path = Some(PathBuf::from("/nowhere/wall.png"));
        let mut manager = BackgroundManager::from_settings(&bg);
        assert_eq!(manager.kind(), BackgroundKind::None);
        assert!(manager.take_warning().is_some());

        let manager = BackgroundManager::from_settings(&settings(BackgroundKind::None));
        assert_eq!(manager.kind(), BackgroundKind::None);
    }
}
