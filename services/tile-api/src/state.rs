//! Shared application state threaded through the handlers.

use std::sync::Arc;

use map_pool::KeyedPool;

use crate::config::ServerConfig;
use crate::render::{FlatRenderer, TileRenderer};
use crate::style::StyleFactory;

pub struct AppState {
    pub pool: KeyedPool<StyleFactory>,
    pub renderer: Arc<dyn TileRenderer>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let renderer = Arc::new(FlatRenderer::new(config.tile_size));
        Self::with_renderer(config, renderer)
    }

    pub fn with_renderer(config: ServerConfig, renderer: Arc<dyn TileRenderer>) -> Self {
        let factory = StyleFactory::new(&config.styles_dir);
        let pool = KeyedPool::new(factory, config.pool_config());
        Self {
            pool,
            renderer,
            config,
        }
    }
}
