use image::RgbaImage;
use log::{debug, warn};
use std::path::{Path, PathBuf};

#[cfg(target_os = "windows")]
use std::os::windows::ffi::OsStrExt;
#[cfg(target_os = "windows")]
use windows::core::{Interface, PCWSTR, PWSTR};
#[cfg(target_os = "windows")]
use windows::Win32::Foundation::HWND;
#[cfg(target_os = "windows")]
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, DeleteDC, DeleteObject, GetDIBits, GetObjectW, BITMAP, BITMAPINFO,
    BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HGDIOBJ,
};
#[cfg(target_os = "windows")]
use windows::Win32::Storage::FileSystem::{FILE_FLAGS_AND_ATTRIBUTES, WIN32_FIND_DATAW};
#[cfg(target_os = "windows")]
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, IPersistFile, CLSCTX_INPROC_SERVER,
    COINIT_APARTMENTTHREADED, STGM_READ,
};
#[cfg(target_os = "windows")]
use windows::Win32::UI::Shell::{
    AssocQueryStringW, ExtractIconExW, IShellLinkW, SHGetFileInfoW, ShellExecuteW, ShellLink,
    ASSOCF_NONE, ASSOCSTR_EXECUTABLE, SHFILEINFOW, SHGFI_ICON, SHGFI_LARGEICON, SLGP_RAWPATH,
    SLR_ANY_MATCH, SLR_NO_UI,
};
#[cfg(target_os = "windows")]
use windows::Win32::UI::WindowsAndMessaging::{
    DestroyIcon, GetIconInfo, HICON, ICONINFO, SHOW_WINDOW_CMD,
};

#[derive(Debug, Clone)]
pub struct ShortcutResolution {
    pub target_path: PathBuf,
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

pub fn is_shortcut(path: &Path) -> bool {
    has_extension(path, "lnk")
}

pub fn is_url_file(path: &Path) -> bool {
    has_extension(path, "url")
}

/// True when the file can be spawned as a process rather than handed to a
/// default application.
pub fn is_directly_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(target_os = "windows")]
    {
        ["exe", "com", "bat", "cmd"]
            .iter()
            .any(|ext| has_extension(path, ext))
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|meta| meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(any(unix, target_os = "windows")))]
    {
        false
    }
}

#[cfg(target_os = "windows")]
fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

#[cfg(target_os = "windows")]
fn path_to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(target_os = "windows")]
pub fn shell_open_with(path: &Path, args: Option<&str>, working_dir: Option<&Path>) -> bool {
    unsafe {
        let operation = to_wide("open");
        let path_wide = path_to_wide(path);
        let args_wide = args.map(to_wide);
        let cwd_wide = working_dir.map(path_to_wide);
        let result = ShellExecuteW(
            HWND(std::ptr::null_mut()),
            PCWSTR(operation.as_ptr()),
            PCWSTR(path_wide.as_ptr()),
            args_wide
                .as_ref()
                .map(|w| PCWSTR(w.as_ptr()))
                .unwrap_or(PCWSTR(std::ptr::null())),
            cwd_wide
                .as_ref()
                .map(|w| PCWSTR(w.as_ptr()))
                .unwrap_or(PCWSTR(std::ptr::null())),
            SHOW_WINDOW_CMD(1),
        );
        let code = result.0 as isize;
        code > 32
    }
}

/// Hands `path` to the desktop's default handler. Arguments only apply to
/// programs, so they are passed through a direct spawn when present.
#[cfg(not(target_os = "windows"))]
pub fn shell_open_with(path: &Path, args: Option<&str>, working_dir: Option<&Path>) -> bool {
    if let Some(args) = args.filter(|a| !a.trim().is_empty()) {
        if is_directly_executable(path) {
            let mut command = std::process::Command::new(path);
            command.args(crate::launch::split_args(args));
            if let Some(dir) = working_dir {
                command.current_dir(dir);
            }
            return command.spawn().is_ok();
        }
        debug!("ignoring arguments for non-executable {}", path.display());
    }
    match open::that_detached(path) {
        Ok(()) => true,
        Err(err) => {
            warn!("failed to open {}: {err}", path.display());
            false
        }
    }
}

#[cfg(target_os = "windows")]
pub fn open_url(url: &str) -> bool {
    unsafe {
        let operation = to_wide("open");
        let url_wide = to_wide(url);
        let result = ShellExecuteW(
            HWND(std::ptr::null_mut()),
            PCWSTR(operation.as_ptr()),
            PCWSTR(url_wide.as_ptr()),
            PCWSTR(std::ptr::null()),
            PCWSTR(std::ptr::null()),
            SHOW_WINDOW_CMD(1),
        );
        result.0 as isize > 32
    }
}

#[cfg(not(target_os = "windows"))]
pub fn open_url(url: &str) -> bool {
    match open::that_detached(url) {
        Ok(()) => true,
        Err(err) => {
            warn!("failed to open {url}: {err}");
            false
        }
    }
}

/// Shows `path` selected in the platform file manager, or opens its folder.
pub fn reveal_in_file_manager(path: &Path) -> bool {
    #[cfg(target_os = "windows")]
    {
        let arg = format!("/select,\"{}\"", path.display());
        if std::process::Command::new("explorer").arg(arg).spawn().is_ok() {
            return true;
        }
    }
    let folder = if path.is_dir() {
        path
    } else {
        match path.parent() {
            Some(parent) => parent,
            None => return false,
        }
    };
    match open::that_detached(folder) {
        Ok(()) => true,
        Err(err) => {
            warn!("failed to open {}: {err}", folder.display());
            false
        }
    }
}

#[cfg(target_os = "windows")]
pub fn resolve_shortcut(path: &Path) -> Option<ShortcutResolution> {
    if !is_shortcut(path) {
        return None;
    }

    unsafe {
        let com_initialized = CoInitializeEx(None, COINIT_APARTMENTTHREADED).is_ok();

        let result = (|| {
            let shell_link: IShellLinkW =
                CoCreateInstance(&ShellLink, None, CLSCTX_INPROC_SERVER).ok()?;
            let persist_file: IPersistFile = shell_link.cast().ok()?;

            let shortcut_wide = path_to_wide(path);
            persist_file
                .Load(PCWSTR(shortcut_wide.as_ptr()), STGM_READ)
                .ok()?;

            let _ = shell_link.Resolve(
                HWND(std::ptr::null_mut()),
                (SLR_NO_UI | SLR_ANY_MATCH).0 as u32,
            );

            let mut target_buf = vec![0u16; 4096];
            let mut find_data = WIN32_FIND_DATAW::default();
            let _ = shell_link.GetPath(&mut target_buf, &mut find_data, SLGP_RAWPATH.0 as u32);
            let mut target = utf16z_to_string(&target_buf);
            if target.trim().is_empty() {
                shell_link
                    .GetPath(&mut target_buf, &mut find_data, 0)
                    .ok()?;
                target = utf16z_to_string(&target_buf);
            }
            if target.trim().is_empty() {
                return None;
            }

            Some(ShortcutResolution {
                target_path: PathBuf::from(target.trim()),
            })
        })();

        if com_initialized {
            CoUninitialize();
        }
        result
    }
}

/// Shell links are a Windows concept; elsewhere nothing resolves.
#[cfg(not(target_os = "windows"))]
pub fn resolve_shortcut(path: &Path) -> Option<ShortcutResolution> {
    debug!("shortcut resolution unavailable for {}", path.display());
    None
}

#[cfg(target_os = "windows")]
fn utf16z_to_string(wide: &[u16]) -> String {
    let end = wide.iter().position(|c| *c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..end])
}

/// Copies the colour bitmap behind `hicon` into RGBA and destroys the icon.
#[cfg(target_os = "windows")]
unsafe fn hicon_to_rgba(hicon: HICON) -> Option<RgbaImage> {
    if hicon.is_invalid() {
        return None;
    }

    let mut icon_info = ICONINFO::default();
    if GetIconInfo(hicon, &mut icon_info).is_err() {
        let _ = DestroyIcon(hicon);
        return None;
    }

    let mut bitmap: BITMAP = std::mem::zeroed();
    if GetObjectW(
        HGDIOBJ(icon_info.hbmColor.0),
        std::mem::size_of::<BITMAP>() as i32,
        Some(&mut bitmap as *mut _ as *mut _),
    ) == 0
    {
        let _ = DeleteObject(icon_info.hbmColor);
        let _ = DeleteObject(icon_info.hbmMask);
        let _ = DestroyIcon(hicon);
        return None;
    }

    let width = bitmap.bmWidth.max(0) as u32;
    let height = bitmap.bmHeight.max(0) as u32;

    let hdc = CreateCompatibleDC(None);
    let mut bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            biHeight: -(height as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut pixels: Vec<u8> = vec![0; (width * height * 4) as usize];

    let result = GetDIBits(
        hdc,
        icon_info.hbmColor,
        0,
        height,
        Some(pixels.as_mut_ptr() as *mut _),
        &mut bmi,
        DIB_RGB_COLORS,
    );

    let _ = DeleteDC(hdc);
    let _ = DeleteObject(icon_info.hbmColor);
    let _ = DeleteObject(icon_info.hbmMask);
    let _ = DestroyIcon(hicon);

    if result == 0 {
        return None;
    }

    // BGRA -> RGBA
    for chunk in pixels.chunks_exact_mut(4) {
        chunk.swap(0, 2);
    }
    RgbaImage::from_raw(width, height, pixels)
}

/// Largest icon embedded in an executable's resources.
#[cfg(target_os = "windows")]
pub fn extract_embedded_icon(path: &Path) -> Option<RgbaImage> {
    unsafe {
        let path_wide = path_to_wide(path);
        let mut large = HICON::default();
        let extracted = ExtractIconExW(
            PCWSTR(path_wide.as_ptr()),
            0,
            Some(&mut large as *mut HICON),
            None,
            1,
        );
        if extracted == 0 || large.is_invalid() {
            debug!("no embedded icon in {}", path.display());
            return None;
        }
        hicon_to_rgba(large)
    }
}

#[cfg(not(target_os = "windows"))]
pub fn extract_embedded_icon(path: &Path) -> Option<RgbaImage> {
    debug!("embedded icon extraction unavailable for {}", path.display());
    None
}

/// Icon the shell shows for `path`, which for documents is the icon of the
/// application registered to open them.
#[cfg(target_os = "windows")]
pub fn association_icon(path: &Path) -> Option<RgbaImage> {
    unsafe {
        let mut sh_file_info = SHFILEINFOW::default();
        let path_wide = path_to_wide(path);

        let result = SHGetFileInfoW(
            PCWSTR(path_wide.as_ptr()),
            FILE_FLAGS_AND_ATTRIBUTES(0),
            Some(&mut sh_file_info),
            std::mem::size_of::<SHFILEINFOW>() as u32,
            SHGFI_ICON | SHGFI_LARGEICON,
        );
        if result == 0 {
            return None;
        }
        hicon_to_rgba(sh_file_info.hIcon)
    }
}

#[cfg(not(target_os = "windows"))]
pub fn association_icon(path: &Path) -> Option<RgbaImage> {
    debug!("association icon lookup unavailable for {}", path.display());
    None
}

/// Executable registered for the `http` protocol.
#[cfg(target_os = "windows")]
pub fn default_browser_executable() -> Option<PathBuf> {
    unsafe {
        let assoc = to_wide("http");
        let verb = to_wide("open");
        let mut buf = vec![0u16; 1024];
        let mut len = buf.len() as u32;
        let status = AssocQueryStringW(
            ASSOCF_NONE,
            ASSOCSTR_EXECUTABLE,
            PCWSTR(assoc.as_ptr()),
            PCWSTR(verb.as_ptr()),
            PWSTR(buf.as_mut_ptr()),
            &mut len,
        );
        if status.is_err() {
            return None;
        }
        let exe = utf16z_to_string(&buf);
        let exe = exe.trim();
        (!exe.is_empty()).then(|| PathBuf::from(exe))
    }
}

#[cfg(not(target_os = "windows"))]
pub fn default_browser_executable() -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_checks_ignore_case() {
        assert!(is_shortcut(Path::new(r"C:\Users\me\Desktop\Editor.LNK")));
        assert!(is_url_file(Path::new("site.Url")));
        assert!(!is_shortcut(Path::new("tool.exe")));
        assert!(!is_url_file(Path::new("noext")));
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_decides_direct_spawn() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\n").expect("write");
        assert!(!is_directly_executable(&script));

        let mut perms = std::fs::metadata(&script).expect("meta").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod");
        assert!(is_directly_executable(&script));
        assert!(!is_directly_executable(dir.path()));
    }
}
