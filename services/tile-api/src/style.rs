//! Stylesheet loading: the expensive resource behind the map pool.
//!
//! A style name is the pool identity; loading its YAML document from the
//! styles directory stands in for the costly construction step (style
//! parsing, datasource connection) of a full rendering engine.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use map_pool::ResourceFactory;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("Invalid style name: {0}")]
    InvalidName(String),

    #[error("Style not found: {0}")]
    NotFound(String),

    #[error("Failed to read style '{0}': {1}")]
    Io(String, String),

    #[error("Failed to parse style '{0}': {1}")]
    Parse(String, String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),
}

/// A parsed stylesheet document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleSheet {
    /// Human-readable name
    pub name: String,

    /// Description of the style
    #[serde(default)]
    pub description: String,

    /// Background color as `#rrggbb` or `#rrggbbaa`
    #[serde(default = "default_background")]
    pub background: String,

    /// Minimum zoom the style is meant for
    #[serde(default)]
    pub min_zoom: u32,

    /// Maximum zoom the style is meant for
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u32,
}

fn default_background() -> String {
    "#ffffff".to_string()
}

fn default_max_zoom() -> u32 {
    22
}

impl StyleSheet {
    /// Parse the background color into RGBA bytes.
    pub fn background_rgba(&self) -> Result<[u8; 4], StyleError> {
        let hex = self
            .background
            .strip_prefix('#')
            .ok_or_else(|| StyleError::InvalidColor(self.background.clone()))?;
        let bytes = match hex.len() {
            6 | 8 => (0..hex.len() / 2)
                .map(|i| u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16))
                .collect::<Result<Vec<u8>, _>>()
                .map_err(|_| StyleError::InvalidColor(self.background.clone()))?,
            _ => return Err(StyleError::InvalidColor(self.background.clone())),
        };
        Ok([
            bytes[0],
            bytes[1],
            bytes[2],
            bytes.get(3).copied().unwrap_or(255),
        ])
    }
}

/// A loaded map: the pooled resource.
///
/// Whoever holds a `MapSource` checked out of the pool owns it exclusively
/// until release.
#[derive(Debug)]
pub struct MapSource {
    pub path: PathBuf,
    pub style: StyleSheet,
    pub background: [u8; 4],
}

/// Constructs map resources from stylesheet files.
pub struct StyleFactory {
    styles_dir: PathBuf,
}

impl StyleFactory {
    pub fn new(styles_dir: impl AsRef<Path>) -> Self {
        Self {
            styles_dir: styles_dir.as_ref().to_path_buf(),
        }
    }

    /// Map a style name to its file path, rejecting path traversal.
    fn style_path(&self, name: &str) -> Result<PathBuf, StyleError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(StyleError::InvalidName(name.to_string()));
        }
        Ok(self.styles_dir.join(format!("{}.yaml", name)))
    }
}

#[async_trait]
impl ResourceFactory for StyleFactory {
    type Resource = MapSource;
    type Error = StyleError;

    async fn create(&self, identity: &str) -> Result<MapSource, StyleError> {
        let path = self.style_path(identity)?;
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StyleError::NotFound(identity.to_string())
            } else {
                StyleError::Io(identity.to_string(), e.to_string())
            }
        })?;
        let style: StyleSheet = serde_yaml::from_str(&raw)
            .map_err(|e| StyleError::Parse(identity.to_string(), e.to_string()))?;
        let background = style.background_rgba()?;

        debug!(style = identity, path = %path.display(), "loaded stylesheet");
        Ok(MapSource {
            path,
            style,
            background,
        })
    }

    fn destroy(&self, map: MapSource) {
        debug!(path = %map.path.display(), "destroying map");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(background: &str) -> StyleSheet {
        StyleSheet {
            name: "test".to_string(),
            description: String::new(),
            background: background.to_string(),
            min_zoom: 0,
            max_zoom: 22,
        }
    }

    #[test]
    fn test_background_rgb() {
        assert_eq!(sheet("#336699").background_rgba().unwrap(), [51, 102, 153, 255]);
    }

    #[test]
    fn test_background_rgba() {
        assert_eq!(sheet("#33669980").background_rgba().unwrap(), [51, 102, 153, 128]);
    }

    #[test]
    fn test_background_invalid() {
        assert!(sheet("336699").background_rgba().is_err());
        assert!(sheet("#33669").background_rgba().is_err());
        assert!(sheet("#zzzzzz").background_rgba().is_err());
    }

    #[test]
    fn test_style_path_rejects_traversal() {
        let factory = StyleFactory::new("/etc/styles");
        assert!(factory.style_path("../secrets").is_err());
        assert!(factory.style_path("a/b").is_err());
        assert!(factory.style_path("").is_err());
        assert!(factory.style_path("osm").is_ok());
    }

    #[test]
    fn test_parse_defaults() {
        let style: StyleSheet = serde_yaml::from_str("name: Minimal\n").unwrap();
        assert_eq!(style.background, "#ffffff");
        assert_eq!(style.max_zoom, 22);
        assert_eq!(style.min_zoom, 0);
    }
}
