//! Target filename derivation and sanitization.
//!
//! Precedence: explicit override, then the last URL path segment, then
//! `<host>.download`, then a generated `download_<timestamp>_<random>` name.
//! Every name without an extension receives the placeholder extension.

use std::fmt;
use std::path::{Component, Path};

use rand::Rng;
use url::Url;

/// Extension appended to names that lack one.
pub const PLACEHOLDER_EXTENSION: &str = "download";

/// Where a resolved filename came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNameSource {
    /// Supplied by the caller.
    Explicit,
    /// Decoded from the URL path.
    UrlPath,
    /// Derived from the URL host.
    Host,
    /// Generated from timestamp and random suffix.
    Generated,
}

impl fmt::Display for FileNameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit override"),
            Self::UrlPath => write!(f, "URL path"),
            Self::Host => write!(f, "URL host"),
            Self::Generated => write!(f, "generated fallback"),
        }
    }
}

/// Resolves the filename for `url`, without the placeholder-extension step.
#[must_use]
pub fn resolve_file_name(explicit: Option<&str>, url: &Url) -> (String, FileNameSource) {
    if let Some(name) = explicit
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(sanitize_filename)
    {
        return (name, FileNameSource::Explicit);
    }
    if let Some(name) = name_from_url(url) {
        return (name, FileNameSource::UrlPath);
    }
    if let Some(name) = host_fallback(url) {
        return (name, FileNameSource::Host);
    }
    (generated_fallback(), FileNameSource::Generated)
}

/// Percent-decoded, sanitized last path segment, if there is one.
pub(crate) fn name_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| sanitize_filename(trimmed))
}

/// `<host>.download` with invalid characters replaced.
pub(crate) fn host_fallback(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|host| !host.is_empty())?;
    Some(sanitize_filename(&format!("{host}.{PLACEHOLDER_EXTENSION}")))
}

/// `download_<unix seconds>_<8 hex digits>.download`.
pub(crate) fn generated_fallback() -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("download_{timestamp}_{suffix:08x}.{PLACEHOLDER_EXTENSION}")
}

/// Returns true if `name` ends in a non-empty extension.
#[must_use]
pub fn has_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| !ext.is_empty())
}

/// Appends [`PLACEHOLDER_EXTENSION`] when `name` has no extension.
///
/// Returns the name and whether it was changed.
#[must_use]
pub fn ensure_extension(name: String) -> (String, bool) {
    if has_extension(&name) {
        (name, false)
    } else {
        (format!("{name}.{PLACEHOLDER_EXTENSION}"), true)
    }
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
