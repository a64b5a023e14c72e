//! Input asset locations.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};

/// Maximum accepted length of a source string.
pub const MAX_SOURCE_LENGTH: usize = 2048;

/// Maximum length of a file extension carried over to a staged file.
const MAX_EXTENSION_LENGTH: usize = 8;

/// Where an input asset comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum SourceLocation {
    /// An `http`/`https` URL fetched over the network.
    Remote(Url),
    /// An absolute path on the local filesystem.
    Local(PathBuf),
}

impl SourceLocation {
    /// Parse a raw source string.
    ///
    /// Strings containing `://` are parsed as URLs; only `http`, `https` and
    /// (when `allow_local` is set) `file` schemes are accepted. Anything else is
    /// a filesystem path, accepted only when `allow_local` is set, and made
    /// absolute against the current directory.
    pub fn parse(field: &'static str, raw: &str, allow_local: bool) -> ModelResult<Self> {
        let raw = raw.trim();

        if raw.is_empty() {
            return Err(ModelError::MissingField(field));
        }

        if raw.len() > MAX_SOURCE_LENGTH {
            return Err(ModelError::invalid_field(
                field,
                format!("longer than {} characters", MAX_SOURCE_LENGTH),
            ));
        }

        if raw.contains("://") {
            let url = Url::parse(raw)
                .map_err(|e| ModelError::invalid_field(field, format!("malformed URL: {}", e)))?;

            return match url.scheme() {
                "http" | "https" => {
                    if url.host_str().map_or(true, str::is_empty) {
                        return Err(ModelError::invalid_field(field, "URL has no host"));
                    }
                    Ok(Self::Remote(url))
                }
                "file" if allow_local => url
                    .to_file_path()
                    .map(Self::Local)
                    .map_err(|_| ModelError::invalid_field(field, "malformed file URL")),
                scheme => Err(ModelError::invalid_field(
                    field,
                    format!("unsupported scheme '{}'", scheme),
                )),
            };
        }

        if !allow_local {
            return Err(ModelError::invalid_field(field, "must be an http(s) URL"));
        }

        let path = std::path::absolute(raw)
            .map_err(|e| ModelError::invalid_field(field, format!("bad path: {}", e)))?;
        Ok(Self::Local(path))
    }

    /// Check if this is a network location.
    pub fn is_remote(&self) -> bool {
        matches!(self, SourceLocation::Remote(_))
    }

    /// Lower-cased file extension of the source, if it has a sane one.
    pub fn extension(&self) -> Option<String> {
        let ext = match self {
            SourceLocation::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .and_then(|name| Path::new(name).extension())
                .and_then(|ext| ext.to_str())
                .map(str::to_string),
            SourceLocation::Local(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_string),
        }?;

        let valid = !ext.is_empty()
            && ext.len() <= MAX_EXTENSION_LENGTH
            && ext.chars().all(|c| c.is_ascii_alphanumeric());

        valid.then(|| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Remote(url) => write!(f, "{}", url),
            SourceLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_tagged() {
        let remote = SourceLocation::parse("video", "https://cdn.example.com/v.mp4", false).unwrap();
        let json = serde_json::to_value(&remote).unwrap();
        assert_eq!(json["kind"], "remote");
        assert_eq!(json["location"], "https://cdn.example.com/v.mp4");

        let back: SourceLocation = serde_json::from_value(json).unwrap();
        assert_eq!(back, remote);
    }

    #[test]
    fn test_parse_remote_url() {
        let source = SourceLocation::parse("video", "https://cdn.example.com/clips/a.MP4?x=1", false).unwrap();
        assert!(source.is_remote());
        assert_eq!(source.extension().as_deref(), Some("mp4"));
    }

    #[test]
    fn test_parse_rejects_local_path_when_not_allowed() {
        let err = SourceLocation::parse("audio", "assets/a.wav", false).unwrap_err();
        assert!(matches!(err, ModelError::InvalidField { field: "audio", .. }));
    }

    #[test]
    fn test_parse_local_path_is_absolutized() {
        let source = SourceLocation::parse("audio", "a.wav", true).unwrap();
        match source {
            SourceLocation::Local(path) => {
                assert!(path.is_absolute());
                assert!(path.ends_with("a.wav"));
            }
            other => panic!("expected local source, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_and_bad_scheme() {
        assert_eq!(
            SourceLocation::parse("video", "   ", true).unwrap_err(),
            ModelError::MissingField("video")
        );
        assert!(SourceLocation::parse("video", "ftp://host/a.mp4", true).is_err());
        assert!(SourceLocation::parse("video", "file:///tmp/a.mp4", false).is_err());
    }

    #[test]
    fn test_extension_rejects_garbage() {
        let source = SourceLocation::parse("video", "https://example.com/download", false).unwrap();
        assert_eq!(source.extension(), None);

        let source = SourceLocation::parse("video", "/tmp/x.mp4;rm", true).unwrap();
        assert_eq!(source.extension(), None);
    }
}
