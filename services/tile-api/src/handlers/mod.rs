pub mod health;
pub mod tiles;

pub use health::{health_handler, metrics_handler};
pub use tiles::{tile_path_handler, tile_query_handler};
