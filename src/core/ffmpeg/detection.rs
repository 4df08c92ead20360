//! FFmpeg Detection Module
//!
//! Locates system-installed ffmpeg/ffprobe binaries and validates them by
//! reading the version banner.

use std::path::PathBuf;
use std::process::Command;

use super::{FFmpegError, FFmpegResult};

/// Information about the detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
}

/// Detect FFmpeg from system PATH
///
/// Checks common installation directories first, then falls back to a
/// `which`/`where` lookup.
pub fn detect_system_ffmpeg() -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = find_binary("ffmpeg")?;
    let ffprobe_path = find_binary("ffprobe")?;

    let version = get_ffmpeg_version(&ffmpeg_path)?;

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

/// Find a binary in common install locations, then on PATH
fn find_binary(name: &str) -> FFmpegResult<PathBuf> {
    #[cfg(target_os = "windows")]
    let file_name = format!("{name}.exe");

    #[cfg(not(target_os = "windows"))]
    let file_name = name.to_string();

    for dir in common_install_paths() {
        let candidate = dir.join(&file_name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    #[cfg(target_os = "windows")]
    let lookup = "where";

    #[cfg(not(target_os = "windows"))]
    let lookup = "which";

    let output = Command::new(lookup)
        .arg(name)
        .output()
        .map_err(|_| FFmpegError::NotFound)?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = path_str.lines().next() {
            let trimmed = first_line.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }
    }

    Err(FFmpegError::NotFound)
}

/// Common FFmpeg installation paths for the current platform
fn common_install_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));

        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string from the `-version` banner
fn get_ffmpeg_version(ffmpeg_path: &PathBuf) -> FFmpegResult<String> {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    let output_str = String::from_utf8_lossy(&output.stdout);
    Ok(parse_version_banner(&output_str))
}

/// Parse the version out of "ffmpeg version X.X.X ..."
fn parse_version_banner(banner: &str) -> String {
    banner
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("ffmpeg version "))
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_banner() {
        let banner = "ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers\n\
                      built with gcc 13";
        assert_eq!(parse_version_banner(banner), "6.1.1");
    }

    #[test]
    fn test_parse_version_banner_malformed() {
        assert_eq!(parse_version_banner("garbage output"), "unknown");
        assert_eq!(parse_version_banner(""), "unknown");
    }

    #[test]
    fn test_common_install_paths_not_empty() {
        assert!(!common_install_paths().is_empty());
    }
}
