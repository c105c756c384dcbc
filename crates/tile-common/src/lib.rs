//! Common types shared across the tileserv crates.

pub mod bbox;
pub mod coord;
pub mod error;

pub use bbox::BoundingBox;
pub use coord::{envelope_for, resolve, resolve_path, resolve_query, PathOrder, TileCoord, TileScheme};
pub use error::{TileError, TileResult};
