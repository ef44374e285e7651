//! Icon image generation for a cell.
//!
//! Each [`IconStrategy`] looks at the cell's executable path or website link
//! and, when it applies, produces an image that is squared and written under a
//! fixed per-source filename in the cell's data folder. Strategies never fail
//! the pipeline; a strategy that cannot produce an image is simply skipped.

mod favicon;
mod strategies;

use favicon::GoogleFavicons;
pub use strategies::{
    DefaultBrowserStrategy, ExecutableStrategy, FaviconStrategy, ShellAssociationStrategy,
    ShortcutStrategy, UrlShortcutStrategy,
};

use crate::error::IconGenError;
use crate::grid::CellCoord;
use crate::icons;
use image::RgbaImage;
use log::{debug, info};
use std::path::PathBuf;

pub const TARGET_EDGE: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconSource {
    Executable,
    Shortcut,
    UrlShortcut,
    Favicon,
    DefaultBrowser,
    ShellAssociation,
}

impl IconSource {
    pub fn file_name(self) -> &'static str {
        match self {
            IconSource::Executable => "exe_icon.png",
            IconSource::Shortcut => "shortcut_icon.png",
            IconSource::UrlShortcut => "url_icon.png",
            IconSource::Favicon => "favicon.png",
            IconSource::DefaultBrowser => "browser_icon.png",
            IconSource::ShellAssociation => "association_icon.png",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IconSource::Executable => "Executable",
            IconSource::Shortcut => "Shortcut target",
            IconSource::UrlShortcut => "Internet shortcut",
            IconSource::Favicon => "Website icon",
            IconSource::DefaultBrowser => "Default browser",
            IconSource::ShellAssociation => "Default application",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub cell: CellCoord,
    pub executable_path: String,
    pub website_link: String,
    pub out_dir: PathBuf,
    pub target_edge: u32,
}

impl GenerateRequest {
    pub fn new(
        cell: CellCoord,
        executable_path: &str,
        website_link: &str,
        out_dir: PathBuf,
    ) -> Self {
        Self {
            cell,
            executable_path: executable_path.trim().to_string(),
            website_link: website_link.trim().to_string(),
            out_dir,
            target_edge: TARGET_EDGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconCandidate {
    pub source: IconSource,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSelection {
    /// Nothing was generated; the cell renders a placeholder.
    None,
    Single(PathBuf),
    /// Several sources succeeded; the user picks one.
    Choose(Vec<IconCandidate>),
}

pub fn select(mut candidates: Vec<IconCandidate>) -> IconSelection {
    match candidates.len() {
        0 => IconSelection::None,
        1 => IconSelection::Single(candidates.remove(0).path),
        _ => IconSelection::Choose(candidates),
    }
}

pub trait IconStrategy: Send {
    fn source(&self) -> IconSource;

    fn applies(&self, request: &GenerateRequest) -> bool;

    fn produce(&self, request: &GenerateRequest) -> Result<RgbaImage, IconGenError>;

    /// Only run when the named source produced nothing.
    fn fallback_of(&self) -> Option<IconSource> {
        None
    }
}

pub struct IconPipeline {
    strategies: Vec<Box<dyn IconStrategy>>,
}

impl IconPipeline {
    pub fn new(strategies: Vec<Box<dyn IconStrategy>>) -> Self {
        Self { strategies }
    }

    /// Every source, with favicons fetched from the public lookup service.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ExecutableStrategy),
            Box::new(ShortcutStrategy),
            Box::new(UrlShortcutStrategy),
            Box::new(ShellAssociationStrategy),
            Box::new(FaviconStrategy::new(Box::new(GoogleFavicons::new()))),
            Box::new(DefaultBrowserStrategy::system()),
        ])
    }

    pub fn run(&self, request: &GenerateRequest) -> Vec<IconCandidate> {
        let mut candidates: Vec<IconCandidate> = Vec::new();
        for strategy in &self.strategies {
            let source = strategy.source();
            if let Some(primary) = strategy.fallback_of() {
                if candidates.iter().any(|c| c.source == primary) {
                    continue;
                }
            }
            if !strategy.applies(request) {
                continue;
            }
            match strategy
                .produce(request)
                .and_then(|image| write_candidate(request, source, &image))
            {
                Ok(path) => candidates.push(IconCandidate { source, path }),
                Err(err) => debug!("{source:?} icon for {} skipped: {err}", request.cell),
            }
        }
        info!(
            "generated {} icon candidate(s) for {}",
            candidates.len(),
            request.cell
        );
        candidates
    }
}

fn write_candidate(
    request: &GenerateRequest,
    source: IconSource,
    image: &RgbaImage,
) -> Result<PathBuf, IconGenError> {
    let squared = icons::resize_to_square(image, request.target_edge);
    let path = request.out_dir.join(source.file_name());
    icons::save_png(&squared, &path).ok_or(IconGenError::Write(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct Fixed {
        source: IconSource,
        result: Option<[u8; 4]>,
    }

    impl IconStrategy for Fixed {
        fn source(&self) -> IconSource {
            self.source
        }

        fn applies(&self, _request: &GenerateRequest) -> bool {
            true
        }

        fn produce(&self, _request: &GenerateRequest) -> Result<RgbaImage, IconGenError> {
            match self.result {
                Some(px) => Ok(RgbaImage::from_pixel(4, 2, Rgba(px))),
                None => Err(IconGenError::NoIcon(PathBuf::from("fake"))),
            }
        }
    }

    struct Fallback(IconSource);

    impl IconStrategy for Fallback {
        fn source(&self) -> IconSource {
            IconSource::DefaultBrowser
        }

        fn applies(&self, _request: &GenerateRequest) -> bool {
            true
        }

        fn produce(&self, _request: &GenerateRequest) -> Result<RgbaImage, IconGenError> {
            Ok(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255])))
        }

        fn fallback_of(&self) -> Option<IconSource> {
            Some(self.0)
        }
    }

    fn fixed(source: IconSource, ok: bool) -> Box<dyn IconStrategy> {
        Box::new(Fixed {
            source,
            result: ok.then_some([255, 0, 0, 255]),
        })
    }

    fn request(dir: &tempfile::TempDir) -> GenerateRequest {
        let mut request = GenerateRequest::new(
            CellCoord::new(2, 5),
            "ignored",
            "",
            dir.path().join("2_5"),
        );
        request.target_edge = 32;
        request
    }

    #[test]
    fn no_successful_strategy_selects_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pipeline = IconPipeline::new(vec![
            fixed(IconSource::Executable, false),
            fixed(IconSource::Favicon, false),
        ]);
        let candidates = pipeline.run(&request(&dir));
        assert!(candidates.is_empty());
        assert_eq!(select(candidates), IconSelection::None);
    }

    #[test]
    fn single_success_is_used_directly() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pipeline = IconPipeline::new(vec![
            fixed(IconSource::Executable, true),
            fixed(IconSource::Favicon, false),
        ]);
        let candidates = pipeline.run(&request(&dir));
        let expected = dir.path().join("2_5").join("exe_icon.png");
        assert_eq!(select(candidates), IconSelection::Single(expected.clone()));

        let written = image::open(&expected).expect("png written").to_rgba8();
        assert_eq!(written.dimensions(), (32, 32));
    }

    #[test]
    fn several_successes_go_to_the_chooser() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pipeline = IconPipeline::new(vec![
            fixed(IconSource::Shortcut, true),
            fixed(IconSource::ShellAssociation, false),
            fixed(IconSource::Favicon, true),
        ]);
        match select(pipeline.run(&request(&dir))) {
            IconSelection::Choose(candidates) => {
                let sources: Vec<_> = candidates.iter().map(|c| c.source).collect();
                assert_eq!(sources, vec![IconSource::Shortcut, IconSource::Favicon]);
                assert!(candidates.iter().all(|c| c.path.is_file()));
            }
            other => panic!("expected a choice, got {other:?}"),
        }
    }

    #[test]
    fn fallback_runs_only_when_primary_failed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let with_primary = IconPipeline::new(vec![
            fixed(IconSource::Favicon, true),
            Box::new(Fallback(IconSource::Favicon)),
        ]);
        let sources: Vec<_> = with_primary
            .run(&request(&dir))
            .into_iter()
            .map(|c| c.source)
            .collect();
        assert_eq!(sources, vec![IconSource::Favicon]);

        let without_primary = IconPipeline::new(vec![
            fixed(IconSource::Favicon, false),
            Box::new(Fallback(IconSource::Favicon)),
        ]);
        let sources: Vec<_> = without_primary
            .run(&request(&dir))
            .into_iter()
            .map(|c| c.source)
            .collect();
        assert_eq!(sources, vec![IconSource::DefaultBrowser]);
    }
}
