//! Level-by-level enumeration.

use std::collections::HashSet;
use std::iter::Peekable;

use super::SeedConfig;
use crate::coord::TileCoord;
use crate::region::Region;

/// Tiles emitted for one zoom level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedLevel {
    pub zoom: u8,
    pub tiles: Vec<TileCoord>,
    /// Tiles produced by more than one region but emitted once
    pub duplicates: u64,
}

/// Iterator over the seeded zoom levels, lowest zoom first.
#[derive(Debug)]
pub struct SeedLevels<'a> {
    regions: &'a [Region],
    threshold: Option<u8>,
    unique: bool,
    next_zoom: u8,
    zoom_until: u8,
    finished: bool,
    /// Per region, the tiles touching it at `frontier_zoom`
    frontiers: Vec<Vec<TileCoord>>,
    frontier_zoom: Option<u8>,
}

impl<'a> SeedLevels<'a> {
    pub(super) fn new(config: &SeedConfig, regions: &'a [Region]) -> Self {
        Self {
            regions,
            threshold: config.filter_metro_zoom,
            unique: config.unique_tiles,
            next_zoom: config.zoom_start,
            zoom_until: config.zoom_until,
            finished: config.zoom_start > config.zoom_until,
            frontiers: Vec::new(),
            frontier_zoom: None,
        }
    }

    fn full_level(&self, zoom: u8) -> SeedLevel {
        SeedLevel {
            zoom,
            tiles: TileCoord::level(zoom).collect(),
            duplicates: 0,
        }
    }

    /// Moves every region's frontier down to `zoom`.
    ///
    /// The first call descends from the root; later calls continue from the
    /// previous level. Pruning uses geometric intersection only, so a region
    /// that activates deeper still has its frontier tracked on the way down.
    fn advance_frontiers(&mut self, zoom: u8) {
        let start = match self.frontier_zoom {
            Some(current) => current,
            None => {
                self.frontiers = self
                    .regions
                    .iter()
                    .map(|region| {
                        if region.intersects(&TileCoord::ROOT) {
                            vec![TileCoord::ROOT]
                        } else {
                            Vec::new()
                        }
                    })
                    .collect();
                0
            }
        };

        for _ in start..zoom {
            let frontiers = std::mem::take(&mut self.frontiers);
            self.frontiers = frontiers
                .into_iter()
                .zip(self.regions)
                .map(|(tiles, region)| {
                    tiles
                        .iter()
                        .filter_map(TileCoord::children)
                        .flatten()
                        .filter(|child| region.intersects(child))
                        .collect()
                })
                .collect();
        }
        self.frontier_zoom = Some(zoom);
    }

    fn filtered_level(&mut self, zoom: u8) -> SeedLevel {
        self.advance_frontiers(zoom);

        let mut tiles = Vec::new();
        let mut seen = HashSet::new();
        let mut duplicates = 0;
        for (region, frontier) in self.regions.iter().zip(&self.frontiers) {
            if !region.is_active_at(zoom) {
                continue;
            }
            for tile in frontier {
                if self.unique && !seen.insert(*tile) {
                    duplicates += 1;
                    continue;
                }
                tiles.push(*tile);
            }
        }
        SeedLevel {
            zoom,
            tiles,
            duplicates,
        }
    }
}

impl Iterator for SeedLevels<'_> {
    type Item = SeedLevel;

    fn next(&mut self) -> Option<SeedLevel> {
        if self.finished {
            return None;
        }
        let zoom = self.next_zoom;
        let level = match self.threshold {
            Some(threshold) if zoom >= threshold => self.filtered_level(zoom),
            _ => self.full_level(zoom),
        };
        if zoom >= self.zoom_until {
            self.finished = true;
        } else {
            self.next_zoom += 1;
        }
        Some(level)
    }
}

/// Zoom-ordered union of the main pass and the custom bounding box pass.
///
/// Where both passes cover a zoom their tiles form one level. In unique
/// mode a custom tile already produced by the main pass counts as a
/// duplicate.
#[derive(Debug)]
pub struct CombinedLevels<'a> {
    main: Peekable<SeedLevels<'a>>,
    custom: Option<Peekable<SeedLevels<'a>>>,
    unique: bool,
}

impl<'a> CombinedLevels<'a> {
    pub(super) fn new(main: SeedLevels<'a>, custom: Option<SeedLevels<'a>>, unique: bool) -> Self {
        Self {
            main: main.peekable(),
            custom: custom.map(Iterator::peekable),
            unique,
        }
    }
}

fn merge_levels(mut main: SeedLevel, custom: SeedLevel, unique: bool) -> SeedLevel {
    main.duplicates += custom.duplicates;
    if !unique {
        main.tiles.extend(custom.tiles);
        return main;
    }
    let mut seen: HashSet<TileCoord> = main.tiles.iter().copied().collect();
    for tile in custom.tiles {
        if seen.insert(tile) {
            main.tiles.push(tile);
        } else {
            main.duplicates += 1;
        }
    }
    main
}

impl Iterator for CombinedLevels<'_> {
    type Item = SeedLevel;

    fn next(&mut self) -> Option<SeedLevel> {
        let Some(custom) = self.custom.as_mut() else {
            return self.main.next();
        };
        let main_zoom = self.main.peek().map(|l| l.zoom);
        let custom_zoom = custom.peek().map(|l| l.zoom);
        match (main_zoom, custom_zoom) {
            (Some(m), Some(c)) if m == c => {
                let main = self.main.next()?;
                let extra = custom.next()?;
                Some(merge_levels(main, extra, self.unique))
            }
            (Some(m), Some(c)) if c < m => custom.next(),
            (Some(_), _) => self.main.next(),
            (None, _) => custom.next(),
        }
    }
}
