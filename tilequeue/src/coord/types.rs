//! Coordinate type definitions

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Supported zoom range.
///
/// Columns and rows are `u32`, so the deepest level whose children still fit
/// is 30.
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 30;

/// Quadtree tile address in the Web Mercator / Slippy Map system.
///
/// A `TileCoord` is always valid: `col` and `row` are both below `2^zoom`
/// and `zoom` is at most [`MAX_ZOOM`]. Construct one with [`TileCoord::new`]
/// or by parsing a `zoom/column/row` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    zoom: u8,
    col: u32,
    row: u32,
}

impl TileCoord {
    /// The single tile covering the whole world at zoom 0.
    pub const ROOT: TileCoord = TileCoord {
        zoom: 0,
        col: 0,
        row: 0,
    };

    /// Creates a tile address, validating it against the grid at `zoom`.
    pub fn new(zoom: u8, col: u32, row: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let size = grid_size(zoom);
        if u64::from(col) >= size || u64::from(row) >= size {
            return Err(CoordError::OutOfBounds { zoom, col, row });
        }
        Ok(Self { zoom, col, row })
    }

    /// Parses a `zoom/column/row` token.
    ///
    /// Surrounding whitespace is ignored. Every field must be a plain run of
    /// ASCII digits.
    pub fn parse(token: &str) -> Result<Self, CoordError> {
        let token = token.trim();
        let mut fields = token.split('/');
        let (Some(zoom), Some(col), Some(row), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(CoordError::Malformed(token.to_string()));
        };

        let zoom: u8 = parse_field("zoom", zoom)?;
        let col: u32 = parse_field("column", col)?;
        let row: u32 = parse_field("row", row)?;
        Self::new(zoom, col, row)
    }

    /// Every tile at `zoom` in row-major order (empty beyond [`MAX_ZOOM`]).
    pub fn level(zoom: u8) -> impl Iterator<Item = TileCoord> {
        let size = if zoom > MAX_ZOOM { 0 } else { grid_size(zoom) };
        (0..size).flat_map(move |row| {
            (0..size).map(move |col| TileCoord {
                zoom,
                col: col as u32,
                row: row as u32,
            })
        })
    }

    /// Zoom level.
    #[inline]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// X coordinate (east-west), 0 at west.
    #[inline]
    pub fn col(&self) -> u32 {
        self.col
    }

    /// Y coordinate (north-south), 0 at north.
    #[inline]
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Returns the four tiles one level deeper that subdivide this tile.
    ///
    /// Order is north-west, north-east, south-west, south-east. Returns
    /// `None` for tiles already at [`MAX_ZOOM`].
    pub fn children(&self) -> Option<[TileCoord; 4]> {
        if self.zoom >= MAX_ZOOM {
            return None;
        }
        let zoom = self.zoom + 1;
        let col = self.col * 2;
        let row = self.row * 2;
        Some([
            TileCoord { zoom, col, row },
            TileCoord {
                zoom,
                col: col + 1,
                row,
            },
            TileCoord {
                zoom,
                col,
                row: row + 1,
            },
            TileCoord {
                zoom,
                col: col + 1,
                row: row + 1,
            },
        ])
    }

    /// Returns the enclosing tile one level up, or `None` at zoom 0.
    pub fn parent(&self) -> Option<TileCoord> {
        if self.zoom == 0 {
            return None;
        }
        Some(TileCoord {
            zoom: self.zoom - 1,
            col: self.col / 2,
            row: self.row / 2,
        })
    }

    /// Returns the ancestor at `zoom`, or `None` if `zoom` is deeper than
    /// this tile.
    pub fn zoom_to(&self, zoom: u8) -> Option<TileCoord> {
        if zoom > self.zoom {
            return None;
        }
        let shift = self.zoom - zoom;
        Some(TileCoord {
            zoom,
            col: self.col >> shift,
            row: self.row >> shift,
        })
    }

    /// Whether `other` is this tile or lies inside it.
    pub fn contains(&self, other: &TileCoord) -> bool {
        other.zoom_to(self.zoom) == Some(*self)
    }
}

impl fmt::Display for TileCoord {
    /// Formats as the tile list line format, `zoom/column/row`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

impl FromStr for TileCoord {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Geographic extent of a tile in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// Number of tiles along one axis at `zoom`.
#[inline]
pub(crate) fn grid_size(zoom: u8) -> u64 {
    1u64 << zoom
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, CoordError> {
    let invalid = || CoordError::InvalidField {
        field,
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

/// Errors that can occur during coordinate parsing and conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is outside valid range (-85.05112878 to 85.05112878)
    #[error("Invalid latitude: {0} (must be within the Web Mercator range)")]
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),
    /// Zoom level is outside valid range
    #[error("Invalid zoom level: {0} (must be between 0 and 30)")]
    InvalidZoom(u8),
    /// Token is not of the form `zoom/column/row`
    #[error("Malformed tile '{0}' (expected zoom/column/row)")]
    Malformed(String),
    /// A field is not a non-negative integer
    #[error("Invalid {field} '{value}' (expected a non-negative integer)")]
    InvalidField { field: &'static str, value: String },
    /// Column or row falls outside the grid at this zoom
    #[error("Tile {zoom}/{col}/{row} is outside the {zoom}-level grid")]
    OutOfBounds { zoom: u8, col: u32, row: u32 },
}
