use super::favicon::{host_of, FaviconFetcher};
use super::{GenerateRequest, IconSource, IconStrategy};
use crate::error::IconGenError;
use crate::{icons, system};
use image::RgbaImage;
use std::path::{Path, PathBuf};

fn exe_path(request: &GenerateRequest) -> Option<&Path> {
    let raw = request.executable_path.as_str();
    (!raw.is_empty()).then(|| Path::new(raw))
}

fn is_program(path: &Path) -> bool {
    !system::is_shortcut(path) && !system::is_url_file(path) && system::is_directly_executable(path)
}

/// `<stem>.ico` next to `path`, else the first `.ico` in the same folder.
pub(crate) fn colocated_ico(path: &Path) -> Option<PathBuf> {
    let dir = path.parent()?;
    if let Some(stem) = path.file_stem() {
        let mut same_stem = dir.join(stem);
        same_stem.set_extension("ico");
        if same_stem.is_file() {
            return Some(same_stem);
        }
    }
    let mut icos: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("ico"))
                    .unwrap_or(false)
        })
        .collect();
    icos.sort();
    icos.into_iter().next()
}

/// Co-located `.ico` first, then the icon embedded in the binary.
fn program_icon(path: &Path) -> Result<RgbaImage, IconGenError> {
    if !path.exists() {
        return Err(IconGenError::Missing(path.to_path_buf()));
    }
    if let Some(ico) = colocated_ico(path) {
        if let Some(image) = icons::load_rgba(&ico) {
            return Ok(image);
        }
    }
    system::extract_embedded_icon(path).ok_or_else(|| IconGenError::NoIcon(path.to_path_buf()))
}

pub struct ExecutableStrategy;

impl IconStrategy for ExecutableStrategy {
    fn source(&self) -> IconSource {
        IconSource::Executable
    }

    fn applies(&self, request: &GenerateRequest) -> bool {
        exe_path(request).map(is_program).unwrap_or(false)
    }

    fn produce(&self, request: &GenerateRequest) -> Result<RgbaImage, IconGenError> {
        let path = exe_path(request).ok_or_else(|| IconGenError::Missing(PathBuf::new()))?;
        program_icon(path)
    }
}

pub struct ShortcutStrategy;

impl IconStrategy for ShortcutStrategy {
    fn source(&self) -> IconSource {
        IconSource::Shortcut
    }

    fn applies(&self, request: &GenerateRequest) -> bool {
        exe_path(request).map(system::is_shortcut).unwrap_or(false)
    }

    fn produce(&self, request: &GenerateRequest) -> Result<RgbaImage, IconGenError> {
        let path = exe_path(request).ok_or_else(|| IconGenError::Missing(PathBuf::new()))?;
        let resolved =
            system::resolve_shortcut(path).ok_or_else(|| IconGenError::NoIcon(path.to_path_buf()))?;
        program_icon(&resolved.target_path)
    }
}

/// Reads the `IconFile` value from an internet shortcut's `[InternetShortcut]` section.
pub(crate) fn url_icon_file(text: &str) -> Option<PathBuf> {
    let mut in_section = false;
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_section = line.eq_ignore_ascii_case("[InternetShortcut]");
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("IconFile") {
                let value = value.trim().trim_matches('"');
                return (!value.is_empty()).then(|| PathBuf::from(value));
            }
        }
    }
    None
}

pub struct UrlShortcutStrategy;

impl IconStrategy for UrlShortcutStrategy {
    fn source(&self) -> IconSource {
        IconSource::UrlShortcut
    }

    fn applies(&self, request: &GenerateRequest) -> bool {
        exe_path(request).map(system::is_url_file).unwrap_or(false)
    }

    fn produce(&self, request: &GenerateRequest) -> Result<RgbaImage, IconGenError> {
        let path = exe_path(request).ok_or_else(|| IconGenError::Missing(PathBuf::new()))?;
        let text =
            std::fs::read_to_string(path).map_err(|_| IconGenError::Missing(path.to_path_buf()))?;
        let icon = url_icon_file(&text).ok_or_else(|| IconGenError::NoIcon(path.to_path_buf()))?;
        let is_ico = icon
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("ico"))
            .unwrap_or(false);
        if !is_ico {
            return Err(IconGenError::NoIcon(path.to_path_buf()));
        }
        // relative IconFile values are relative to the .url file
        let icon = match path.parent() {
            Some(dir) if icon.is_relative() => dir.join(icon),
            _ => icon,
        };
        icons::load_rgba(&icon).ok_or_else(|| IconGenError::Decode(icon.display().to_string()))
    }
}

pub struct ShellAssociationStrategy;

impl IconStrategy for ShellAssociationStrategy {
    fn source(&self) -> IconSource {
        IconSource::ShellAssociation
    }

    fn applies(&self, request: &GenerateRequest) -> bool {
        exe_path(request)
            .map(|p| {
                p.exists() && !is_program(p) && !system::is_shortcut(p) && !system::is_url_file(p)
            })
            .unwrap_or(false)
    }

    fn produce(&self, request: &GenerateRequest) -> Result<RgbaImage, IconGenError> {
        let path = exe_path(request).ok_or_else(|| IconGenError::Missing(PathBuf::new()))?;
        system::association_icon(path).ok_or_else(|| IconGenError::NoIcon(path.to_path_buf()))
    }
}

pub struct FaviconStrategy {
    fetcher: Box<dyn FaviconFetcher>,
}

impl FaviconStrategy {
    pub fn new(fetcher: Box<dyn FaviconFetcher>) -> Self {
        Self { fetcher }
    }
}

impl IconStrategy for FaviconStrategy {
    fn source(&self) -> IconSource {
        IconSource::Favicon
    }

    fn applies(&self, request: &GenerateRequest) -> bool {
        !request.website_link.is_empty()
    }

    fn produce(&self, request: &GenerateRequest) -> Result<RgbaImage, IconGenError> {
        let host = host_of(&request.website_link)
            .ok_or_else(|| IconGenError::BadUrl(request.website_link.clone()))?;
        let bytes = self.fetcher.fetch(&host)?;
        icons::decode_rgba(&bytes).ok_or_else(|| IconGenError::Decode(format!("favicon of {host}")))
    }
}

/// Icon of the user's default browser, used when no favicon could be fetched.
pub struct DefaultBrowserStrategy {
    locate: Box<dyn Fn() -> Option<PathBuf> + Send>,
}

impl DefaultBrowserStrategy {
    pub fn system() -> Self {
        Self::with_locator(system::default_browser_executable)
    }

    pub fn with_locator(locate: impl Fn() -> Option<PathBuf> + Send + 'static) -> Self {
        Self {
            locate: Box::new(locate),
        }
    }
}

impl IconStrategy for DefaultBrowserStrategy {
    fn source(&self) -> IconSource {
        IconSource::DefaultBrowser
    }

    fn applies(&self, request: &GenerateRequest) -> bool {
        !request.website_link.is_empty()
    }

    fn produce(&self, _request: &GenerateRequest) -> Result<RgbaImage, IconGenError> {
        let browser = (self.locate)().ok_or_else(|| IconGenError::NoIcon(PathBuf::from("browser")))?;
        program_icon(&browser)
    }

    fn fallback_of(&self) -> Option<IconSource> {
        Some(IconSource::Favicon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellCoord;
    use crate::icon_gen::{IconPipeline, IconSelection};
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn write_ico(path: &Path, color: [u8; 4]) {
        let image = RgbaImage::from_pixel(32, 32, Rgba(color));
        image
            .save_with_format(path, image::ImageFormat::Ico)
            .expect("write ico");
    }

    fn png_bytes(color: [u8; 4]) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        RgbaImage::from_pixel(16, 16, Rgba(color))
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    struct FakeFetcher {
        bytes: Option<Vec<u8>>,
        hosts: Arc<AtomicUsize>,
    }

    impl FaviconFetcher for FakeFetcher {
        fn fetch(&self, _host: &str) -> Result<Vec<u8>, IconGenError> {
            self.hosts.fetch_add(1, Ordering::SeqCst);
            self.bytes
                .clone()
                .ok_or_else(|| IconGenError::Fetch("offline".into()))
        }
    }

    fn request(dir: &Path, exe: &str, link: &str) -> GenerateRequest {
        let mut request = GenerateRequest::new(CellCoord::new(0, 0), exe, link, dir.join("0_0"));
        request.target_edge = 64;
        request
    }

    #[test]
    fn colocated_ico_prefers_matching_stem() {
        let dir = tempfile::tempdir().expect("temp dir");
        let exe = dir.path().join("tool.exe");
        std::fs::write(&exe, b"MZ").expect("exe");
        write_ico(&dir.path().join("aaa.ico"), [0, 255, 0, 255]);
        assert_eq!(colocated_ico(&exe), Some(dir.path().join("aaa.ico")));

        write_ico(&dir.path().join("tool.ico"), [255, 0, 0, 255]);
        assert_eq!(colocated_ico(&exe), Some(dir.path().join("tool.ico")));

        let icon = program_icon(&exe).expect("ico loads");
        assert_eq!(icon.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn url_file_icon_entry_is_parsed() {
        let text = "[{000214A0-0000-0000-C000-000000000046}]\nIconFile=ignored.ico\n\
                    [InternetShortcut]\r\nURL=https://example.com/\r\nIconIndex=0\r\n\
                    IconFile=\"C:\\Icons\\site.ico\"\r\n";
        assert_eq!(url_icon_file(text), Some(PathBuf::from("C:\\Icons\\site.ico")));
        assert_eq!(url_icon_file("[InternetShortcut]\nURL=x\n"), None);
    }

    #[test]
    fn url_shortcut_with_relative_ico_produces_candidate() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_ico(&dir.path().join("site.ico"), [10, 20, 30, 255]);
        let url = dir.path().join("Site.url");
        std::fs::write(&url, "[InternetShortcut]\nURL=https://example.com\nIconFile=site.ico\n")
            .expect("url file");

        let pipeline = IconPipeline::new(vec![Box::new(UrlShortcutStrategy)]);
        let req = request(dir.path(), &url.to_string_lossy(), "");
        let expected = dir.path().join("0_0").join("url_icon.png");
        assert_eq!(
            crate::icon_gen::select(pipeline.run(&req)),
            IconSelection::Single(expected)
        );
    }

    #[test]
    fn favicon_uses_fetcher_and_browser_is_fallback() {
        let dir = tempfile::tempdir().expect("temp dir");
        let browser_dir = tempfile::tempdir().expect("browser dir");
        let browser = browser_dir.path().join("browser.exe");
        std::fs::write(&browser, b"MZ").expect("browser");
        write_ico(&browser_dir.path().join("browser.ico"), [0, 0, 255, 255]);
        let locate = move || Some(browser.clone());

        let hosts = Arc::new(AtomicUsize::new(0));
        let online = IconPipeline::new(vec![
            Box::new(FaviconStrategy::new(Box::new(FakeFetcher {
                bytes: Some(png_bytes([200, 100, 0, 255])),
                hosts: hosts.clone(),
            }))),
            Box::new(DefaultBrowserStrategy::with_locator(locate.clone())),
        ]);
        let req = request(dir.path(), "", "example.com");
        let sources: Vec<_> = online.run(&req).into_iter().map(|c| c.source).collect();
        assert_eq!(sources, vec![IconSource::Favicon]);
        assert_eq!(hosts.load(Ordering::SeqCst), 1);

        let offline = IconPipeline::new(vec![
            Box::new(FaviconStrategy::new(Box::new(FakeFetcher {
                bytes: None,
                hosts: hosts.clone(),
            }))),
            Box::new(DefaultBrowserStrategy::with_locator(locate)),
        ]);
        let candidates = offline.run(&req);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source, IconSource::DefaultBrowser);
        assert!(candidates[0].path.ends_with("browser_icon.png"));
    }

    #[test]
    fn strategies_ignore_empty_inputs() {
        let dir = tempfile::tempdir().expect("temp dir");
        let req = request(dir.path(), "", "");
        assert!(!ExecutableStrategy.applies(&req));
        assert!(!ShortcutStrategy.applies(&req));
        assert!(!UrlShortcutStrategy.applies(&req));
        assert!(!ShellAssociationStrategy.applies(&req));
        assert!(!DefaultBrowserStrategy::system().applies(&req));
    }
}
