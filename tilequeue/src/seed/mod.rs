//! Initial job set generation.
//!
//! The [`Seeder`] enumerates every tile that should exist for a zoom range.
//! Below the metro filter threshold every tile of each level is produced.
//! From the threshold onwards only tiles touching a [`Region`] active at that
//! zoom are produced, found by descending through `children` from the tiles
//! each region touches at the threshold rather than scanning the full grid.
//!
//! Each region is descended independently, so regions that overlap produce
//! the same tile more than once. With `unique_tiles` set, a level emits each
//! tile at most once and the repeats are counted as duplicates.
//!
//! A [`CustomSeed`] adds operator-supplied bounding boxes seeded over their
//! own zoom range, merged level by level into the main pass.

mod levels;

pub use levels::{CombinedLevels, SeedLevel, SeedLevels};

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::coord::MAX_ZOOM;
use crate::queue::{enqueue_all, Queue, QueueError};
use crate::region::{Region, RegionError, RegionFilter, RegionSource};
use crate::retry::RetryPolicy;

/// Errors that abort a seeding run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeedError {
    #[error("Invalid zoom range {start}..={until} (must satisfy start <= until <= 30)")]
    InvalidZoomRange { start: u8, until: u8 },

    #[error("Metro filtering from zoom {0} requested but no regions were supplied")]
    MissingRegionFilter(u8),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error("Failed to enqueue seeded jobs: {0}")]
    Enqueue(#[from] QueueError),
}

/// Seeding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedConfig {
    /// First zoom level to emit
    pub zoom_start: u8,
    /// Last zoom level to emit (inclusive)
    pub zoom_until: u8,
    /// Zoom from which the region filter applies; `None` seeds every level
    /// in full
    pub filter_metro_zoom: Option<u8>,
    /// Emit each tile at most once per level
    pub unique_tiles: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            zoom_start: 0,
            zoom_until: 10,
            filter_metro_zoom: None,
            unique_tiles: true,
        }
    }
}

/// Totals reported after a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Jobs emitted across all levels
    pub emitted: u64,
    /// Tiles suppressed as duplicates (unique mode only)
    pub duplicates: u64,
    /// Jobs emitted per zoom level
    pub per_zoom: BTreeMap<u8, u64>,
}

impl SeedReport {
    fn record(&mut self, level: &SeedLevel) {
        self.emitted += level.tiles.len() as u64;
        self.duplicates += level.duplicates;
        self.per_zoom.insert(level.zoom, level.tiles.len() as u64);
    }
}

/// Bounding boxes seeded over their own zoom range, independent of the
/// metro filter.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSeed {
    regions: Vec<Region>,
    zoom_start: u8,
    zoom_until: u8,
}

impl CustomSeed {
    /// Builds the custom pass from `[west, south, east, north]` boxes in
    /// degrees.
    pub fn from_bboxes(
        bboxes: &[[f64; 4]],
        zoom_start: u8,
        zoom_until: u8,
    ) -> Result<Self, SeedError> {
        if zoom_start > zoom_until || zoom_until > MAX_ZOOM {
            return Err(SeedError::InvalidZoomRange {
                start: zoom_start,
                until: zoom_until,
            });
        }
        let regions = bboxes
            .iter()
            .enumerate()
            .map(|(i, [west, south, east, north])| {
                Region::from_bbox(format!("custom-{}", i), *west, *south, *east, *north, zoom_start)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            regions,
            zoom_start,
            zoom_until,
        })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    fn levels(&self, unique_tiles: bool) -> SeedLevels<'_> {
        let config = SeedConfig {
            zoom_start: self.zoom_start,
            zoom_until: self.zoom_until,
            filter_metro_zoom: Some(self.zoom_start),
            unique_tiles,
        };
        SeedLevels::new(&config, &self.regions)
    }
}

/// Enumerates the initial job set.
#[derive(Debug, Clone)]
pub struct Seeder {
    config: SeedConfig,
    filter: Option<RegionFilter>,
    custom: Option<CustomSeed>,
}

impl Seeder {
    /// Creates a seeder.
    ///
    /// Fails if the zoom range is invalid, or if a filter threshold is set
    /// without regions to filter by.
    pub fn new(config: SeedConfig, filter: Option<RegionFilter>) -> Result<Self, SeedError> {
        if config.zoom_start > config.zoom_until || config.zoom_until > MAX_ZOOM {
            return Err(SeedError::InvalidZoomRange {
                start: config.zoom_start,
                until: config.zoom_until,
            });
        }
        match (config.filter_metro_zoom, &filter) {
            (Some(threshold), None) => return Err(SeedError::MissingRegionFilter(threshold)),
            (None, Some(_)) => {
                warn!("Regions supplied without a filter zoom; seeding every level in full")
            }
            _ => {}
        }
        Ok(Self {
            config,
            filter,
            custom: None,
        })
    }

    /// Adds a custom bounding box pass.
    pub fn with_custom(mut self, custom: CustomSeed) -> Self {
        info!(
            boxes = custom.regions.len(),
            zoom_start = custom.zoom_start,
            zoom_until = custom.zoom_until,
            "Custom bounding boxes added to seed"
        );
        self.custom = Some(custom);
        self
    }

    /// Loads the region filter from `source`, then creates a seeder.
    ///
    /// A load failure is returned before anything is enumerated.
    pub async fn from_source(
        config: SeedConfig,
        source: &RegionSource,
        cities: Option<&[String]>,
        timeout: Duration,
    ) -> Result<Self, SeedError> {
        let default_activation = config.filter_metro_zoom.unwrap_or(0);
        let filter = RegionFilter::load(source, cities, default_activation, timeout).await?;
        Self::new(config, Some(filter))
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    /// Iterates the job set one zoom level at a time.
    pub fn levels(&self) -> CombinedLevels<'_> {
        let regions: &[Region] = match (&self.filter, self.config.filter_metro_zoom) {
            (Some(filter), Some(_)) => filter.regions(),
            _ => &[],
        };
        let unique = self.config.unique_tiles;
        CombinedLevels::new(
            SeedLevels::new(&self.config, regions),
            self.custom.as_ref().map(|custom| custom.levels(unique)),
            unique,
        )
    }

    /// Enumerates every level and enqueues the tiles.
    ///
    /// Levels are submitted in zoom order, each in batches bounded by the
    /// queue's maximum batch size.
    pub async fn seed<Q: Queue>(
        &self,
        queue: &Q,
        policy: &RetryPolicy,
    ) -> Result<SeedReport, SeedError> {
        let mut report = SeedReport::default();
        for level in self.levels() {
            enqueue_all(queue, &level.tiles, policy).await?;
            info!(
                zoom = level.zoom,
                tiles = level.tiles.len(),
                duplicates = level.duplicates,
                "Seeded zoom level"
            );
            report.record(&level);
        }
        info!(
            emitted = report.emitted,
            duplicates = report.duplicates,
            "Seeding complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::queue::MemoryQueue;

    fn region_inside_tile_1_1_0() -> Region {
        // Strictly inside 1/1/0 so neighbours are not touched
        Region::from_bbox("inner", 1.0, 1.0, 179.0, 84.0, 0).unwrap()
    }

    #[test]
    fn test_full_coverage_without_filter() {
        let seeder = Seeder::new(
            SeedConfig {
                zoom_start: 0,
                zoom_until: 3,
                filter_metro_zoom: None,
                unique_tiles: false,
            },
            None,
        )
        .unwrap();
        let counts: Vec<_> = seeder.levels().map(|l| l.tiles.len()).collect();
        assert_eq!(counts, vec![1, 4, 16, 64]);
    }

    #[test]
    fn test_filter_applies_at_and_above_threshold() {
        let filter = RegionFilter::new(vec![region_inside_tile_1_1_0()]);
        let seeder = Seeder::new(
            SeedConfig {
                zoom_start: 0,
                zoom_until: 2,
                filter_metro_zoom: Some(1),
                unique_tiles: true,
            },
            Some(filter),
        )
        .unwrap();

        let levels: Vec<_> = seeder.levels().collect();
        assert_eq!(levels[0].tiles, vec![TileCoord::ROOT]);
        assert_eq!(levels[1].tiles, vec![TileCoord::new(1, 1, 0).unwrap()]);
        let mut z2 = levels[2].tiles.clone();
        z2.sort();
        let mut expected = TileCoord::new(1, 1, 0).unwrap().children().unwrap().to_vec();
        expected.sort();
        assert_eq!(z2, expected);
    }

    #[test]
    fn test_region_exactly_covering_a_tile_keeps_touching_neighbours() {
        let bounds = TileCoord::new(1, 1, 0).unwrap().bounds();
        let exact = Region::from_bbox(
            "exact",
            bounds.west,
            bounds.south,
            bounds.east,
            bounds.north,
            0,
        )
        .unwrap();
        let seeder = Seeder::new(
            SeedConfig {
                zoom_start: 0,
                zoom_until: 2,
                filter_metro_zoom: Some(1),
                unique_tiles: true,
            },
            Some(RegionFilter::new(vec![exact])),
        )
        .unwrap();

        // Edge contact counts, so the ring of tiles around 1/1/0 is kept
        let counts: Vec<_> = seeder.levels().map(|l| l.tiles.len()).collect();
        assert_eq!(counts, vec![1, 4, 9]);
    }

    #[test]
    fn test_custom_boxes_extend_past_main_range() {
        let custom = CustomSeed::from_bboxes(&[[10.0, 10.0, 40.0, 40.0]], 2, 4).unwrap();
        let seeder = Seeder::new(
            SeedConfig {
                zoom_start: 0,
                zoom_until: 2,
                filter_metro_zoom: None,
                unique_tiles: true,
            },
            None,
        )
        .unwrap()
        .with_custom(custom);

        let levels: Vec<_> = seeder.levels().collect();
        let zooms: Vec<_> = levels.iter().map(|l| l.zoom).collect();
        assert_eq!(zooms, vec![0, 1, 2, 3, 4]);
        assert_eq!(levels[2].tiles.len(), 16);
        assert_eq!(levels[2].duplicates, 1);
        for level in &levels[3..] {
            assert!(!level.tiles.is_empty());
            assert!(level.tiles.iter().all(|t| seeder.custom.as_ref().unwrap().regions()[0].intersects(t)));
        }
    }

    #[test]
    fn test_custom_boxes_reject_bad_input() {
        assert_eq!(
            CustomSeed::from_bboxes(&[[0.0, 0.0, 1.0, 1.0]], 9, 3).unwrap_err(),
            SeedError::InvalidZoomRange { start: 9, until: 3 }
        );
        assert!(matches!(
            CustomSeed::from_bboxes(&[[5.0, 0.0, 1.0, 1.0]], 1, 3),
            Err(SeedError::Region(RegionError::MalformedSource { .. }))
        ));
    }

    #[test]
    fn test_invalid_zoom_range() {
        let config = SeedConfig {
            zoom_start: 5,
            zoom_until: 3,
            ..SeedConfig::default()
        };
        assert_eq!(
            Seeder::new(config, None).unwrap_err(),
            SeedError::InvalidZoomRange { start: 5, until: 3 }
        );
    }

    #[test]
    fn test_threshold_without_regions_is_rejected() {
        let config = SeedConfig {
            filter_metro_zoom: Some(8),
            ..SeedConfig::default()
        };
        assert_eq!(
            Seeder::new(config, None).unwrap_err(),
            SeedError::MissingRegionFilter(8)
        );
    }

    #[tokio::test]
    async fn test_seed_enqueues_every_level() {
        let seeder = Seeder::new(
            SeedConfig {
                zoom_start: 1,
                zoom_until: 2,
                filter_metro_zoom: None,
                unique_tiles: false,
            },
            None,
        )
        .unwrap();
        let queue = MemoryQueue::new("seed");
        let report = seeder.seed(&queue, &RetryPolicy::none()).await.unwrap();

        assert_eq!(report.emitted, 20);
        assert_eq!(report.per_zoom.get(&1), Some(&4));
        assert_eq!(report.per_zoom.get(&2), Some(&16));
        assert_eq!(queue.pending_len(), 20);
    }

    #[tokio::test]
    async fn test_region_load_failure_aborts_before_seeding() {
        let config = SeedConfig {
            zoom_start: 0,
            zoom_until: 2,
            filter_metro_zoom: Some(1),
            unique_tiles: true,
        };
        let source = RegionSource::File("/nonexistent/metro.json".into());
        let err = Seeder::from_source(config, &source, None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SeedError::Region(RegionError::SourceUnavailable { .. })
        ));
    }
}
