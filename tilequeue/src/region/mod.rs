//! Named geographic regions that constrain high-zoom seeding.
//!
//! A [`RegionFilter`] holds a fixed set of [`Region`]s (metro extracts),
//! each a polygon with the zoom at which it starts constraining enumeration.
//! The filter answers one question: does a tile touch at least one region
//! that is active at the tile's zoom?
//!
//! # Loading
//!
//! Regions come from a metro extract descriptor, fetched once per seeding
//! run:
//!
//! ```text
//! {
//!   "regions": {
//!     "north-america": {
//!       "cities": {
//!         "new-york": {
//!           "bbox": { "top": "41.0", "left": "-74.3", "bottom": "40.4", "right": "-73.6" }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Each city may give an explicit `polygon` (a ring of `[lon, lat]` pairs)
//! instead of, or in addition to, its `bbox`, and a `min_zoom` activation
//! level.
//!
//! # Usage
//!
//! ```
//! use tilequeue::coord::TileCoord;
//! use tilequeue::region::{Region, RegionFilter};
//!
//! let nyc = Region::from_bbox("new-york", -74.3, 40.4, -73.6, 41.0, 0).unwrap();
//! let filter = RegionFilter::new(vec![nyc]);
//!
//! assert!(filter.contains(&TileCoord::new(10, 301, 385).unwrap()));
//! assert!(!filter.contains(&TileCoord::new(10, 0, 0).unwrap()));
//! ```

mod filter;
mod source;

pub use filter::{Region, RegionFilter};
pub use source::{fetch_descriptor, parse_metro_extract, RegionSource};

use thiserror::Error;

/// Errors raised while building a [`RegionFilter`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    /// The descriptor could not be retrieved at all
    #[error("Region source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The descriptor was retrieved but an entry has no usable boundary
    #[error("Malformed region entry '{entry}': {reason}")]
    MalformedSource { entry: String, reason: String },
}
