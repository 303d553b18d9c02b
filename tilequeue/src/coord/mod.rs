//! Tile addressing and projection.
//!
//! Provides the quadtree [`TileCoord`] address used throughout the crate and
//! conversions between geographic coordinates (latitude/longitude) and the
//! standard Web Mercator tiling scheme (EPSG:3857, origin at the north-west
//! corner, rows increasing southwards).

mod types;

pub use types::{
    CoordError, TileBounds, TileCoord, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

use types::grid_size;

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to [`MAX_ZOOM`])
///
/// Points on the east or south edge of the world map to the last column or
/// row rather than falling off the grid.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = grid_size(zoom) as f64;
    let last = grid_size(zoom) - 1;

    let col = (((lon + 180.0) / 360.0 * n) as u64).min(last) as u32;

    let lat_rad = lat * PI / 180.0;
    let row = (((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).max(0.0) as u64).min(last) as u32;

    TileCoord::new(zoom, col, row)
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    grid_point_to_lat_lon(tile.zoom(), tile.col() as f64, tile.row() as f64)
}

/// Inverse Web Mercator for a fractional grid position at `zoom`.
fn grid_point_to_lat_lon(zoom: u8, x: f64, y: f64) -> (f64, f64) {
    let n = grid_size(zoom) as f64;

    let lon = x / n * 360.0 - 180.0;

    let lat_rad = (PI * (1.0 - 2.0 * y / n)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}

impl TileCoord {
    /// Geographic extent of the tile.
    pub fn bounds(&self) -> TileBounds {
        let (north, west) = grid_point_to_lat_lon(self.zoom(), self.col() as f64, self.row() as f64);
        let (south, east) = grid_point_to_lat_lon(
            self.zoom(),
            self.col() as f64 + 1.0,
            self.row() as f64 + 1.0,
        );
        TileBounds {
            west,
            south,
            east,
            north,
        }
    }

    /// Latitude/longitude of the tile's center in projected space.
    pub fn center(&self) -> (f64, f64) {
        grid_point_to_lat_lon(
            self.zoom(),
            self.col() as f64 + 0.5,
            self.row() as f64 + 0.5,
        )
    }
}
