//! Deterministic storage keys.

use std::fmt;

use crate::coord::TileCoord;
use crate::render::OutputFormat;

/// Blob store key for one tile in one format.
///
/// Layout is `{path}/{layer}/{zoom}/{column}/{row}.{extension}`; an empty
/// path drops the leading segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(path: &str, layer: &str, tile: TileCoord, format: OutputFormat) -> Self {
        let path = path.trim_matches('/');
        let tail = format!(
            "{}/{}/{}/{}.{}",
            layer,
            tile.zoom(),
            tile.col(),
            tile.row(),
            format.extension()
        );
        if path.is_empty() {
            Self(tail)
        } else {
            Self(format!("{}/{}", path, tail))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let tile = TileCoord::new(10, 163, 395).unwrap();
        assert_eq!(
            StorageKey::new("osm", "all", tile, OutputFormat::Mvt).as_str(),
            "osm/all/10/163/395.mvt"
        );
    }

    #[test]
    fn test_empty_path_drops_segment() {
        let tile = TileCoord::new(1, 0, 1).unwrap();
        assert_eq!(
            StorageKey::new("", "all", tile, OutputFormat::Json).as_str(),
            "all/1/0/1.json"
        );
        assert_eq!(
            StorageKey::new("/tiles/", "roads", tile, OutputFormat::TopoJson).as_str(),
            "tiles/roads/1/0/1.topojson"
        );
    }

    #[test]
    fn test_key_is_deterministic() {
        let tile = TileCoord::new(5, 3, 4).unwrap();
        let a = StorageKey::new("p", "all", tile, OutputFormat::Vtm);
        let b = StorageKey::new("p", "all", tile, OutputFormat::Vtm);
        assert_eq!(a, b);
        assert_ne!(a, StorageKey::new("p", "all", tile, OutputFormat::Mvt));
    }
}
