//! Tile rendering behind a trait so the HTTP layer stays renderer-agnostic.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use tile_common::BoundingBox;

use crate::png;
use crate::style::MapSource;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Rendering failed: {0}")]
    Failed(String),
}

/// Output encodings a renderer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Png,
}

impl TileFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
        }
    }
}

/// Turns a checked-out map and a Web Mercator envelope into tile bytes.
#[async_trait]
pub trait TileRenderer: Send + Sync + 'static {
    async fn render(
        &self,
        map: &MapSource,
        envelope: &BoundingBox,
        format: TileFormat,
    ) -> Result<Bytes, RenderError>;
}

/// Fills the tile with the style's background color.
///
/// Stands in for a real map renderer; useful on its own for smoke tests
/// and as the default until a drawing backend is wired up.
pub struct FlatRenderer {
    tile_size: u32,
}

impl FlatRenderer {
    pub fn new(tile_size: u32) -> Self {
        Self { tile_size }
    }
}

impl Default for FlatRenderer {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl TileRenderer for FlatRenderer {
    async fn render(
        &self,
        map: &MapSource,
        envelope: &BoundingBox,
        format: TileFormat,
    ) -> Result<Bytes, RenderError> {
        if envelope.width() <= 0.0 || envelope.height() <= 0.0 {
            return Err(RenderError::Failed(format!(
                "degenerate envelope: {:?}",
                envelope
            )));
        }

        let size = self.tile_size as usize;
        let mut pixels = Vec::with_capacity(size * size * 4);
        for _ in 0..size * size {
            pixels.extend_from_slice(&map.background);
        }

        let encoded = match format {
            TileFormat::Png => png::encode_rgba(&pixels, size, size)
                .map_err(|e| RenderError::Failed(e.to_string()))?,
        };
        Ok(Bytes::from(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleSheet;
    use std::path::PathBuf;

    fn test_map(background: [u8; 4]) -> MapSource {
        MapSource {
            path: PathBuf::from("test.yaml"),
            style: StyleSheet {
                name: "test".to_string(),
                description: String::new(),
                background: "#000000".to_string(),
                min_zoom: 0,
                max_zoom: 22,
            },
            background,
        }
    }

    #[tokio::test]
    async fn test_flat_renderer_produces_png() {
        let renderer = FlatRenderer::new(8);
        let map = test_map([10, 20, 30, 255]);
        let envelope = BoundingBox::new(0.0, 0.0, 100.0, 100.0);

        let bytes = renderer
            .render(&map, &envelope, TileFormat::Png)
            .await
            .unwrap();
        assert_eq!(&bytes[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[tokio::test]
    async fn test_degenerate_envelope_rejected() {
        let renderer = FlatRenderer::new(8);
        let map = test_map([0, 0, 0, 255]);
        let envelope = BoundingBox::new(10.0, 10.0, 10.0, 20.0);

        let result = renderer.render(&map, &envelope, TileFormat::Png).await;
        assert!(result.is_err());
    }
}
