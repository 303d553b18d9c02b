//! Region and region filter types.

use geo::{coord, Area, Intersects, LineString, Polygon, Rect};

use super::RegionError;
use crate::coord::TileCoord;

/// A named area that constrains seeding from `activation_zoom` onwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    name: String,
    boundary: Polygon<f64>,
    activation_zoom: u8,
}

impl Region {
    /// Creates a region from a closed or open ring of `(lon, lat)` points.
    ///
    /// The ring must have at least three distinct finite points and enclose
    /// a non-zero area.
    pub fn from_ring(
        name: impl Into<String>,
        ring: &[(f64, f64)],
        activation_zoom: u8,
    ) -> Result<Self, RegionError> {
        let name = name.into();
        let malformed = |reason: &str| RegionError::MalformedSource {
            entry: name.clone(),
            reason: reason.to_string(),
        };

        if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(malformed("polygon contains non-finite coordinates"));
        }
        let mut distinct: Vec<(f64, f64)> = Vec::with_capacity(ring.len());
        for point in ring {
            if !distinct.contains(point) {
                distinct.push(*point);
            }
        }
        if distinct.len() < 3 {
            return Err(malformed("polygon needs at least three distinct points"));
        }

        let exterior: LineString<f64> = ring.iter().map(|&(x, y)| coord! { x: x, y: y }).collect();
        let boundary = Polygon::new(exterior, vec![]);
        if boundary.unsigned_area() <= 0.0 {
            return Err(malformed("polygon encloses no area"));
        }

        Ok(Self {
            name,
            boundary,
            activation_zoom,
        })
    }

    /// Creates a rectangular region from a lon/lat bounding box.
    pub fn from_bbox(
        name: impl Into<String>,
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        activation_zoom: u8,
    ) -> Result<Self, RegionError> {
        let name = name.into();
        let finite = [west, south, east, north].iter().all(|v| v.is_finite());
        if !finite || west >= east || south >= north {
            return Err(RegionError::MalformedSource {
                entry: name,
                reason: format!(
                    "invalid bbox (left={}, bottom={}, right={}, top={})",
                    west, south, east, north
                ),
            });
        }
        let rect = Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north });
        Ok(Self {
            name,
            boundary: rect.to_polygon(),
            activation_zoom,
        })
    }

    /// Region name (the metro extract city name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zoom at which this region starts constraining enumeration.
    pub fn activation_zoom(&self) -> u8 {
        self.activation_zoom
    }

    /// Region boundary in lon/lat degrees.
    pub fn boundary(&self) -> &Polygon<f64> {
        &self.boundary
    }

    /// Whether the tile's bounding box touches the boundary.
    ///
    /// Touching an edge or corner counts, so neighbouring regions never
    /// leave a seam of unseeded tiles between them.
    pub fn intersects(&self, tile: &TileCoord) -> bool {
        let bounds = tile.bounds();
        let rect = Rect::new(
            coord! { x: bounds.west, y: bounds.south },
            coord! { x: bounds.east, y: bounds.north },
        );
        self.boundary.intersects(&rect)
    }

    /// Whether the region is active at `zoom`.
    pub fn is_active_at(&self, zoom: u8) -> bool {
        zoom >= self.activation_zoom
    }

    /// Whether this region keeps `tile` during seeding.
    pub fn covers(&self, tile: &TileCoord) -> bool {
        self.is_active_at(tile.zoom()) && self.intersects(tile)
    }
}

/// Immutable set of regions consulted by the seeder above its threshold zoom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionFilter {
    regions: Vec<Region>,
}

impl RegionFilter {
    /// Creates a filter over the given regions.
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Returns a filter limited to regions whose name is in `names`.
    pub fn restrict_to(self, names: &[String]) -> Self {
        Self {
            regions: self
                .regions
                .into_iter()
                .filter(|r| names.iter().any(|n| n == r.name()))
                .collect(),
        }
    }

    /// True iff at least one region active at the tile's zoom touches it.
    pub fn contains(&self, tile: &TileCoord) -> bool {
        self.regions.iter().any(|region| region.covers(tile))
    }

    /// The regions in load order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the filter has no regions (and so keeps nothing).
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(zoom: u8, col: u32, row: u32) -> TileCoord {
        TileCoord::new(zoom, col, row).unwrap()
    }

    #[test]
    fn test_bbox_region_intersects_inner_tile() {
        // 1/1/0 spans lon 0..180, lat 0..85
        let region = Region::from_bbox("ne", 10.0, 10.0, 20.0, 20.0, 0).unwrap();
        assert!(region.intersects(&tile(1, 1, 0)));
        assert!(!region.intersects(&tile(1, 0, 0)));
        assert!(!region.intersects(&tile(1, 1, 1)));
    }

    #[test]
    fn test_touching_edge_counts_as_contained() {
        // Region whose west edge is the prime meridian touches 1/0/0 on its east edge
        let region = Region::from_bbox("edge", 0.0, 10.0, 20.0, 20.0, 0).unwrap();
        assert!(region.intersects(&tile(1, 0, 0)));
        assert!(region.intersects(&tile(1, 1, 0)));
    }

    #[test]
    fn test_activation_zoom_gates_coverage() {
        let region = Region::from_bbox("late", 10.0, 10.0, 20.0, 20.0, 3).unwrap();
        assert!(!region.covers(&tile(1, 1, 0)));
        let inside = crate::coord::to_tile_coords(15.0, 15.0, 3).unwrap();
        assert!(region.covers(&inside));
    }

    #[test]
    fn test_polygon_region() {
        let triangle = [(10.0, 10.0), (30.0, 10.0), (20.0, 30.0), (10.0, 10.0)];
        let region = Region::from_ring("tri", &triangle, 0).unwrap();
        assert!(region.intersects(&crate::coord::to_tile_coords(15.0, 20.0, 8).unwrap()));
        assert!(!region.intersects(&crate::coord::to_tile_coords(25.0, 28.0, 8).unwrap()));
    }

    #[test]
    fn test_invalid_bbox_is_malformed() {
        let err = Region::from_bbox("bad", 20.0, 10.0, 10.0, 20.0, 0).unwrap_err();
        assert!(matches!(err, RegionError::MalformedSource { ref entry, .. } if entry == "bad"));
        assert!(Region::from_bbox("nan", f64::NAN, 0.0, 1.0, 1.0, 0).is_err());
    }

    #[test]
    fn test_degenerate_ring_is_malformed() {
        let line = [(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)];
        assert!(Region::from_ring("line", &line, 0).is_err());
        let collinear = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        assert!(Region::from_ring("flat", &collinear, 0).is_err());
    }

    #[test]
    fn test_filter_contains_any_region() {
        let filter = RegionFilter::new(vec![
            Region::from_bbox("a", 10.0, 10.0, 20.0, 20.0, 0).unwrap(),
            Region::from_bbox("b", -20.0, -20.0, -10.0, -10.0, 0).unwrap(),
        ]);
        assert!(filter.contains(&tile(1, 1, 0)));
        assert!(filter.contains(&tile(1, 0, 1)));
        assert!(!filter.contains(&tile(1, 0, 0)));
        assert!(!filter.contains(&tile(1, 1, 1)));
    }

    #[test]
    fn test_empty_filter_keeps_nothing() {
        let filter = RegionFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.contains(&TileCoord::ROOT));
    }

    #[test]
    fn test_restrict_to_names() {
        let filter = RegionFilter::new(vec![
            Region::from_bbox("a", 10.0, 10.0, 20.0, 20.0, 0).unwrap(),
            Region::from_bbox("b", -20.0, -20.0, -10.0, -10.0, 0).unwrap(),
        ])
        .restrict_to(&["b".to_string()]);
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.regions()[0].name(), "b");
    }
}
