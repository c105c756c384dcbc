//! Server configuration, loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use map_pool::PoolConfig;
use tile_common::TileScheme;
use tracing::info;

/// Runtime configuration for the tile service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding the stylesheet YAML files
    pub styles_dir: PathBuf,

    /// Maximum concurrently existing maps per style
    pub max_maps_per_style: usize,

    /// How long an acquire may queue before giving up (None = forever)
    pub acquire_timeout: Option<Duration>,

    /// How long an idle map may sit before being evicted
    pub idle_timeout: Duration,

    /// Idle maps per style the sweeper leaves alone
    pub min_warm_maps: usize,

    /// How often the idle sweeper runs
    pub sweep_interval: Duration,

    /// Default tile addressing scheme when the request does not pick one
    pub default_scheme: TileScheme,

    /// Tile edge length in pixels
    pub tile_size: u32,

    /// Styles to pre-construct a map for at startup
    pub warm_styles: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            styles_dir: PathBuf::from("config/styles"),
            max_maps_per_style: 4,
            acquire_timeout: Some(Duration::from_millis(5000)),
            idle_timeout: Duration::from_secs(300),
            min_warm_maps: 0,
            sweep_interval: Duration::from_secs(60),
            default_scheme: TileScheme::Xyz,
            tile_size: 256,
            warm_styles: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let styles_dir = env::var("STYLES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/styles"));

        let max_maps_per_style = env_parse("MAX_MAPS_PER_STYLE", 4);

        // 0 means wait forever
        let acquire_timeout = match env_parse("ACQUIRE_TIMEOUT_MS", 5000u64) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let idle_timeout = Duration::from_secs(env_parse("MAP_IDLE_TIMEOUT_SECS", 300));
        let min_warm_maps = env_parse("MIN_WARM_MAPS", 0);
        let sweep_interval = Duration::from_secs(env_parse("POOL_SWEEP_INTERVAL_SECS", 60));

        let default_scheme = if env_flag("TMS_SCHEME") {
            TileScheme::Tms
        } else {
            TileScheme::Xyz
        };

        let tile_size = env_parse("TILE_SIZE", 256u32);

        let warm_styles: Vec<String> = env::var("WARM_STYLES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let config = Self {
            styles_dir,
            max_maps_per_style,
            acquire_timeout,
            idle_timeout,
            min_warm_maps,
            sweep_interval,
            default_scheme,
            tile_size,
            warm_styles,
        };

        info!(
            styles_dir = %config.styles_dir.display(),
            max_maps_per_style = config.max_maps_per_style,
            tile_size = config.tile_size,
            "loaded server configuration"
        );
        config
    }

    /// The pool settings this configuration implies.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_per_identity: self.max_maps_per_style,
            acquire_timeout: self.acquire_timeout,
            idle_timeout: self.idle_timeout,
            min_idle: self.min_warm_maps,
            sweep_interval: self.sweep_interval,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_maps_per_style, 4);
        assert_eq!(config.acquire_timeout, Some(Duration::from_millis(5000)));
        assert_eq!(config.default_scheme, TileScheme::Xyz);
        assert_eq!(config.tile_size, 256);
        assert!(config.warm_styles.is_empty());
    }

    #[test]
    fn test_pool_config_mirrors_server_config() {
        let config = ServerConfig {
            max_maps_per_style: 7,
            acquire_timeout: None,
            min_warm_maps: 2,
            ..ServerConfig::default()
        };
        let pool = config.pool_config();
        assert_eq!(pool.max_per_identity, 7);
        assert_eq!(pool.acquire_timeout, None);
        assert_eq!(pool.min_idle, 2);
    }
}
