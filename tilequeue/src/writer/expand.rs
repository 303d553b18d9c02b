//! Expired tile expansion and tiles-of-interest intersection.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use super::WriteError;
use crate::coord::TileCoord;

/// Expands expired tiles to their ancestors and intersects with a
/// tiles-of-interest set.
///
/// Each tile deeper than `until` also contributes its ancestors down to
/// zoom `until`; tiles at or above `until` contribute only themselves. When
/// `tiles_of_interest` is given, only tiles in it are kept. The result has no
/// duplicates and keeps first-seen order.
pub fn explode_and_intersect(
    tiles: &[TileCoord],
    tiles_of_interest: Option<&HashSet<TileCoord>>,
    until: u8,
) -> Vec<TileCoord> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for tile in tiles {
        let mut current = Some(*tile);
        while let Some(t) = current {
            if !seen.insert(t) {
                // Ancestors of an already seen tile were handled with it
                break;
            }
            if tiles_of_interest.map_or(true, |toi| toi.contains(&t)) {
                result.push(t);
            }
            current = if t.zoom() > until { t.parent() } else { None };
        }
    }
    result
}

/// Reads a tiles-of-interest file in the tile list line format.
///
/// Malformed lines are skipped with a warning.
pub async fn load_tiles_of_interest(path: &Path) -> Result<HashSet<TileCoord>, WriteError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| WriteError::Read(format!("{}: {}", path.display(), e)))?;

    let mut tiles = HashSet::new();
    let mut skipped = 0;
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match TileCoord::parse(line) {
            Ok(tile) => {
                tiles.insert(tile);
            }
            Err(e) => {
                skipped += 1;
                warn!(line = index + 1, error = %e, "Skipping tiles-of-interest entry");
            }
        }
    }
    info!(
        path = %path.display(),
        tiles = tiles.len(),
        skipped,
        "Loaded tiles of interest"
    );
    Ok(tiles)
}
