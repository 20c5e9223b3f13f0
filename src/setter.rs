use std::{fs, io, path::{Path, PathBuf}};

use thiserror::Error;

use crate::{info, DEBUG_NAME};

/// Anything smaller than this is treated as corrupt output rather than a
/// wallpaper worth applying.
const MIN_WALLPAPER_BYTES: u64 = 1000;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Wallpaper file missing: {0}")]
    FileMissing(PathBuf),
    #[error("Wallpaper file corrupted (too small: {0} bytes)")]
    FileTooSmall(u64),
    #[error("{0} not installed")]
    ToolMissing(&'static str),
    #[error("{tool} failed: {reason}")]
    ToolFailed {
        tool: &'static str,
        reason: String,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported platform")]
    Unsupported,
}

/// Set the image at `path` as the desktop background for the current OS.
/// Expected failure modes come back as `ApplyError` values, never panics.
pub fn apply(path: &Path) -> Result<(), ApplyError> {
    validate(path)?;
    platform_apply(path)
}

fn validate(path: &Path) -> Result<(), ApplyError> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ApplyError::FileMissing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    if metadata.len() < MIN_WALLPAPER_BYTES {
        return Err(ApplyError::FileTooSmall(metadata.len()));
    }

    Ok(())
}

/* =========================
   WINDOWS
   ========================= */

#[cfg(windows)]
fn platform_apply(path: &Path) -> Result<(), ApplyError> {
    use windows::Win32::Foundation::{LPARAM, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        SendMessageTimeoutW, SystemParametersInfoW, HWND_BROADCAST, SMTO_ABORTIFHUNG,
        SPIF_SENDWININICHANGE, SPIF_UPDATEINIFILE, SPI_SETDESKWALLPAPER, WM_SETTINGCHANGE,
    };

    let wide = to_wstring(&path.to_string_lossy());

    unsafe {
        SystemParametersInfoW(
            SPI_SETDESKWALLPAPER,
            0,
            Some(wide.as_ptr() as *mut core::ffi::c_void),
            SPIF_UPDATEINIFILE | SPIF_SENDWININICHANGE,
        )
        .map_err(|e| ApplyError::ToolFailed {
            tool: "SystemParametersInfoW",
            reason: e.to_string(),
        })?;

        // Best-effort refresh broadcast; some shells keep showing the old
        // image until they see a settings change.
        let mut broadcast_result = 0usize;
        let _ = SendMessageTimeoutW(
            HWND_BROADCAST,
            WM_SETTINGCHANGE,
            WPARAM(0),
            LPARAM(0),
            SMTO_ABORTIFHUNG,
            5000,
            Some(&mut broadcast_result),
        );
    }

    info!("[{}] Wallpaper set via SystemParametersInfoW", DEBUG_NAME);
    Ok(())
}

#[cfg(windows)]
fn to_wstring(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;

    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

/* =========================
   MACOS
   ========================= */

#[cfg(target_os = "macos")]
fn platform_apply(path: &Path) -> Result<(), ApplyError> {
    use std::process::Command;

    let script = format!(
        concat!(
            "tell application \"System Events\"\n",
            "    repeat with d in desktops\n",
            "        set picture of d to \"{}\"\n",
            "    end repeat\n",
            "end tell\n",
        ),
        path.display()
    );

    // A temp script file keeps paths with spaces or quotes out of argv.
    let script_path = std::env::temp_dir().join(format!(
        "lifegrid_setdesktop_{}.scpt",
        std::process::id()
    ));
    fs::write(&script_path, script)?;

    let output = Command::new("osascript").arg(&script_path).output();
    let _ = fs::remove_file(&script_path);

    match output {
        Ok(out) if out.status.success() => {
            info!("[{}] Wallpaper set via osascript", DEBUG_NAME);
            Ok(())
        }
        Ok(out) => Err(ApplyError::ToolFailed {
            tool: "osascript",
            reason: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        }),
        Err(e) => Err(ApplyError::ToolFailed {
            tool: "osascript",
            reason: e.to_string(),
        }),
    }
}

/* =========================
   UNIX DESKTOPS
   ========================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopFamily {
    Gnome,
    Kde,
    Xfce,
    Mate,
    Cinnamon,
    Unknown,
}

/// Classify the desktop environment from `XDG_CURRENT_DESKTOP` and
/// `DESKTOP_SESSION`, concatenated lower-case so either variable can match.
pub fn detect_desktop(current_desktop: &str, session: &str) -> DesktopFamily {
    let combined = format!(
        "{}{}",
        current_desktop.to_lowercase(),
        session.to_lowercase()
    );

    if combined.contains("gnome") || combined.contains("ubuntu") || combined.contains("unity") {
        DesktopFamily::Gnome
    } else if combined.contains("kde") || combined.contains("plasma") {
        DesktopFamily::Kde
    } else if combined.contains("xfce") {
        DesktopFamily::Xfce
    } else if combined.contains("mate") {
        DesktopFamily::Mate
    } else if combined.contains("cinnamon") {
        DesktopFamily::Cinnamon
    } else {
        DesktopFamily::Unknown
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_apply(path: &Path) -> Result<(), ApplyError> {
    let family = detect_desktop(
        &std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default(),
        &std::env::var("DESKTOP_SESSION").unwrap_or_default(),
    );
    apply_for_desktop(family, path)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn apply_for_desktop(family: DesktopFamily, path: &Path) -> Result<(), ApplyError> {
    let file_path = path.to_string_lossy().into_owned();
    let file_uri = format!("file://{file_path}");

    let result = match family {
        DesktopFamily::Gnome => {
            require_tool("gsettings")?;
            let light = run_tool(
                "gsettings",
                &["set", "org.gnome.desktop.background", "picture-uri", &file_uri],
            );
            let dark = run_tool(
                "gsettings",
                &[
                    "set",
                    "org.gnome.desktop.background",
                    "picture-uri-dark",
                    &file_uri,
                ],
            );
            // Either key taking effect is enough across GNOME versions.
            if light.is_ok() || dark.is_ok() {
                Ok(())
            } else {
                light
            }
        }
        DesktopFamily::Kde => {
            require_tool("plasma-apply-wallpaperimage")?;
            run_tool("plasma-apply-wallpaperimage", &[&file_path])
        }
        DesktopFamily::Xfce => {
            require_tool("xfconf-query")?;
            run_tool(
                "xfconf-query",
                &[
                    "-c",
                    "xfce4-desktop",
                    "-p",
                    "/backdrop/screen0/monitor0/image-path",
                    "-s",
                    &file_path,
                ],
            )
        }
        DesktopFamily::Mate => {
            require_tool("gsettings")?;
            run_tool(
                "gsettings",
                &["set", "org.mate.background", "picture-filename", &file_path],
            )
        }
        DesktopFamily::Cinnamon => {
            require_tool("gsettings")?;
            run_tool(
                "gsettings",
                &[
                    "set",
                    "org.cinnamon.desktop.background",
                    "picture-uri",
                    &file_uri,
                ],
            )
        }
        DesktopFamily::Unknown => {
            require_tool("feh")?;
            run_tool("feh", &["--bg-scale", &file_path])
        }
    };

    if result.is_ok() {
        info!("[{}] Wallpaper set ({:?} strategy)", DEBUG_NAME, family);
    }
    result
}

#[cfg(all(unix, not(target_os = "macos")))]
fn require_tool(tool: &'static str) -> Result<(), ApplyError> {
    if find_in_path(tool).is_none() {
        return Err(ApplyError::ToolMissing(tool));
    }
    Ok(())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn run_tool(tool: &'static str, args: &[&str]) -> Result<(), ApplyError> {
    let output = std::process::Command::new(tool)
        .args(args)
        .output()
        .map_err(|e| ApplyError::ToolFailed {
            tool,
            reason: e.to_string(),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = if stderr.trim().is_empty() {
            output.status.to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(ApplyError::ToolFailed { tool, reason })
    }
}

#[cfg(unix)]
pub(crate) fn find_in_path(tool: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}

#[cfg(not(any(unix, windows)))]
fn platform_apply(_path: &Path) -> Result<(), ApplyError> {
    Err(ApplyError::Unsupported)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.png");
        assert!(matches!(
            apply(&absent),
            Err(ApplyError::FileMissing(_))
        ));
    }

    #[test]
    fn rejects_undersized_file() {
        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("stub.png");
        fs::write(&stub, b"tiny").unwrap();
        assert!(matches!(
            apply(&stub),
            Err(ApplyError::FileTooSmall(4))
        ));
    }

    #[test]
    fn desktop_classification_table() {
        assert_eq!(detect_desktop("GNOME", ""), DesktopFamily::Gnome);
        assert_eq!(detect_desktop("ubuntu:GNOME", ""), DesktopFamily::Gnome);
        assert_eq!(detect_desktop("", "unity"), DesktopFamily::Gnome);
        assert_eq!(detect_desktop("KDE", ""), DesktopFamily::Kde);
        assert_eq!(detect_desktop("", "plasmawayland"), DesktopFamily::Kde);
        assert_eq!(detect_desktop("XFCE", ""), DesktopFamily::Xfce);
        assert_eq!(detect_desktop("MATE", ""), DesktopFamily::Mate);
        assert_eq!(detect_desktop("X-Cinnamon", ""), DesktopFamily::Cinnamon);
        assert_eq!(detect_desktop("sway", "i3"), DesktopFamily::Unknown);
        assert_eq!(detect_desktop("", ""), DesktopFamily::Unknown);
    }

    #[cfg(unix)]
    #[test]
    fn path_probe_finds_a_shell_and_misses_nonsense() {
        assert!(find_in_path("sh").is_some());
        assert!(find_in_path("definitely-not-a-real-tool-9f2").is_none());
    }
}
