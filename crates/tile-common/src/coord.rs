//! Tile addressing and tile-to-envelope math.
//!
//! A tile address is a (z, x, y) triple under the standard XYZ scheme
//! (top-left origin) or the TMS scheme (bottom-left origin, y flipped).
//! Addresses arrive either as path segments (`{z}/{x}/{y}`) or as named
//! query parameters (`x=`, `y=`, `z=`, case-insensitive).

use crate::{BoundingBox, TileError};

/// Half the Web Mercator world extent in meters (EPSG:3857).
pub const WEB_MERCATOR_EXTENT: f64 = 20037508.342789244;

/// Deepest zoom level accepted by the resolver.
pub const MAX_ZOOM: u32 = 30;

/// A tile coordinate (z/x/y), always stored in XYZ (top-left) numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

/// Vertical tile-numbering convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileScheme {
    /// Top-left origin (OSM/Google/XYZ).
    #[default]
    Xyz,
    /// Bottom-left origin; y is flipped to `(2^z - 1) - y`.
    Tms,
}

/// Order of the three integer path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathOrder {
    /// `{z}/{x}/{y}`
    #[default]
    Zxy,
    /// `{x}/{y}/{z}`
    Xyz,
}

/// Resolve a tile address from an optional path and query parameters.
///
/// A well-formed path takes precedence; otherwise the `x`/`y`/`z` query
/// parameters are used. The result is validated against the zoom's tile
/// grid and normalized to XYZ numbering.
pub fn resolve<'a, I>(
    path: Option<&str>,
    query: I,
    scheme: TileScheme,
) -> Result<TileCoord, TileError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let raw = match path.and_then(|p| resolve_path(p, PathOrder::Zxy).ok()) {
        Some(coord) => coord,
        None => resolve_query(query)?,
    };
    normalize(raw, scheme)
}

/// Parse a tile address from path segments.
///
/// Accepts exactly three integer segments in the given order. A file
/// extension on the last segment (`.../1.png`) is ignored.
pub fn resolve_path(path: &str, order: PathOrder) -> Result<TileCoord, TileError> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    if segments.len() != 3 {
        return Err(TileError::InvalidAddress(format!(
            "expected three path segments, got {}",
            segments.len()
        )));
    }

    let last = segments[2]
        .split_once('.')
        .map(|(value, _ext)| value)
        .unwrap_or(segments[2]);

    let a = parse_component(segments[0], "first path segment")?;
    let b = parse_component(segments[1], "second path segment")?;
    let c = parse_component(last, "third path segment")?;

    Ok(match order {
        PathOrder::Zxy => TileCoord::new(a, b, c),
        PathOrder::Xyz => TileCoord::new(c, a, b),
    })
}

/// Parse a tile address from query parameters `x`, `y`, `z`.
///
/// Parameter names are case-insensitive; all three must be present and
/// parse as non-negative integers.
pub fn resolve_query<'a, I>(query: I) -> Result<TileCoord, TileError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut x = None;
    let mut y = None;
    let mut z = None;

    for (key, value) in query {
        match key.to_ascii_lowercase().as_str() {
            "x" => x = Some(parse_component(value, "parameter 'x'")?),
            "y" => y = Some(parse_component(value, "parameter 'y'")?),
            "z" => z = Some(parse_component(value, "parameter 'z'")?),
            _ => {}
        }
    }

    match (z, x, y) {
        (Some(z), Some(x), Some(y)) => Ok(TileCoord::new(z, x, y)),
        (None, _, _) => Err(TileError::InvalidAddress("missing parameter 'z'".into())),
        (_, None, _) => Err(TileError::InvalidAddress("missing parameter 'x'".into())),
        (_, _, None) => Err(TileError::InvalidAddress("missing parameter 'y'".into())),
    }
}

/// Calculate the Web Mercator envelope for a tile.
///
/// The world extent is subdivided into `2^z` columns and rows; pure and
/// deterministic, no I/O.
pub fn envelope_for(coord: &TileCoord) -> BoundingBox {
    let n = (1u64 << coord.z) as f64;
    let span = 2.0 * WEB_MERCATOR_EXTENT / n;

    let min_x = -WEB_MERCATOR_EXTENT + coord.x as f64 * span;
    let max_y = WEB_MERCATOR_EXTENT - coord.y as f64 * span;

    BoundingBox::new(min_x, max_y - span, min_x + span, max_y)
}

fn parse_component(value: &str, what: &str) -> Result<u32, TileError> {
    value
        .parse::<u32>()
        .map_err(|_| TileError::InvalidAddress(format!("{} is not a valid integer: '{}'", what, value)))
}

fn normalize(coord: TileCoord, scheme: TileScheme) -> Result<TileCoord, TileError> {
    if coord.z > MAX_ZOOM {
        return Err(TileError::InvalidAddress(format!(
            "zoom {} exceeds maximum of {}",
            coord.z, MAX_ZOOM
        )));
    }

    let n = (1u64 << coord.z) as u32;
    if coord.x >= n || coord.y >= n {
        return Err(TileError::InvalidAddress(format!(
            "tile {}/{}/{} outside the {}x{} grid at zoom {}",
            coord.z, coord.x, coord.y, n, n, coord.z
        )));
    }

    let y = match scheme {
        TileScheme::Xyz => coord.y,
        TileScheme::Tms => (n - 1) - coord.y,
    };

    Ok(TileCoord::new(coord.z, coord.x, y))
}
