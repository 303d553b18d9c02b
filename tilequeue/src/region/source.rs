//! Metro extract descriptor loading and parsing.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use super::{Region, RegionError, RegionFilter};

/// Where a metro extract descriptor lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSource {
    /// An `http://` or `https://` URL
    Url(String),
    /// A local file, given as a path or a `file://` URL
    File(PathBuf),
}

impl RegionSource {
    /// Classifies a source string by its scheme.
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        if source.starts_with("http://") || source.starts_with("https://") {
            Self::Url(source.to_string())
        } else if let Some(path) = source.strip_prefix("file://") {
            Self::File(PathBuf::from(path))
        } else {
            Self::File(PathBuf::from(source))
        }
    }
}

impl fmt::Display for RegionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Retrieves the raw descriptor bytes.
pub async fn fetch_descriptor(
    source: &RegionSource,
    timeout: Duration,
) -> Result<Vec<u8>, RegionError> {
    let unavailable = |reason: String| RegionError::SourceUnavailable {
        source_name: source.to_string(),
        reason,
    };

    match source {
        RegionSource::Url(url) => {
            debug!(url = %url, "Fetching metro extract descriptor");
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| unavailable(format!("failed to create HTTP client: {}", e)))?;
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| unavailable(format!("request failed: {}", e)))?;
            if !response.status().is_success() {
                return Err(unavailable(format!("HTTP {}", response.status())));
            }
            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| unavailable(format!("failed to read response: {}", e)))
        }
        RegionSource::File(path) => {
            debug!(path = %path.display(), "Reading metro extract descriptor");
            tokio::fs::read(path)
                .await
                .map_err(|e| unavailable(e.to_string()))
        }
    }
}

impl RegionFilter {
    /// Fetches and parses a descriptor, optionally keeping only the named
    /// cities.
    ///
    /// Any failure aborts the load; a partially built filter is never
    /// returned.
    pub async fn load(
        source: &RegionSource,
        cities: Option<&[String]>,
        default_activation_zoom: u8,
        timeout: Duration,
    ) -> Result<Self, RegionError> {
        let bytes = fetch_descriptor(source, timeout).await?;
        let mut filter = Self::new(parse_metro_extract(&bytes, default_activation_zoom)?);
        if let Some(names) = cities {
            filter = filter.restrict_to(names);
        }
        info!(
            source = %source,
            regions = filter.len(),
            "Loaded metro extract regions"
        );
        Ok(filter)
    }
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    regions: BTreeMap<String, RegionGroup>,
}

#[derive(Debug, Deserialize)]
struct RegionGroup {
    #[serde(default)]
    cities: BTreeMap<String, CityEntry>,
}

#[derive(Debug, Deserialize)]
struct CityEntry {
    bbox: Option<BBox>,
    polygon: Option<Vec<[Degrees; 2]>>,
    min_zoom: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct BBox {
    top: Degrees,
    left: Degrees,
    bottom: Degrees,
    right: Degrees,
}

/// Coordinates arrive as either JSON numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Degrees {
    Number(f64),
    Text(String),
}

impl Degrees {
    fn value(&self, entry: &str, field: &str) -> Result<f64, RegionError> {
        match self {
            Self::Number(v) => Ok(*v),
            Self::Text(s) => s.trim().parse().map_err(|_| RegionError::MalformedSource {
                entry: entry.to_string(),
                reason: format!("{} '{}' is not a number", field, s),
            }),
        }
    }
}

/// Parses a metro extract descriptor into regions.
///
/// Cities come out ordered by group then city name. A city with an explicit
/// `polygon` uses it; otherwise its `bbox` becomes a rectangle. Entries
/// without `min_zoom` activate at `default_activation_zoom`.
pub fn parse_metro_extract(
    bytes: &[u8],
    default_activation_zoom: u8,
) -> Result<Vec<Region>, RegionError> {
    let descriptor: Descriptor =
        serde_json::from_slice(bytes).map_err(|e| RegionError::MalformedSource {
            entry: "<descriptor>".to_string(),
            reason: e.to_string(),
        })?;

    let mut regions = Vec::new();
    for group in descriptor.regions.into_values() {
        for (name, city) in group.cities {
            let activation_zoom = city.min_zoom.unwrap_or(default_activation_zoom);
            let region = if let Some(points) = city.polygon {
                let ring = points
                    .iter()
                    .map(|[lon, lat]| Ok((lon.value(&name, "lon")?, lat.value(&name, "lat")?)))
                    .collect::<Result<Vec<_>, RegionError>>()?;
                Region::from_ring(name, &ring, activation_zoom)?
            } else if let Some(bbox) = city.bbox {
                Region::from_bbox(
                    name.clone(),
                    bbox.left.value(&name, "left")?,
                    bbox.bottom.value(&name, "bottom")?,
                    bbox.right.value(&name, "right")?,
                    bbox.top.value(&name, "top")?,
                    activation_zoom,
                )?
            } else {
                return Err(RegionError::MalformedSource {
                    entry: name,
                    reason: "neither bbox nor polygon given".to_string(),
                });
            };
            regions.push(region);
        }
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DESCRIPTOR: &str = r#"{
        "regions": {
            "europe": {
                "cities": {
                    "london": {
                        "bbox": {"top": "51.7", "left": "-0.5", "bottom": "51.3", "right": "0.3"}
                    }
                }
            },
            "north-america": {
                "cities": {
                    "new-york": {
                        "bbox": {"top": 41.0, "left": -74.3, "bottom": 40.4, "right": -73.6},
                        "min_zoom": 12
                    },
                    "triangle": {
                        "polygon": [[10, 10], [30, 10], [20, 30]]
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_source_classification() {
        assert_eq!(
            RegionSource::parse("https://example.com/cities.json"),
            RegionSource::Url("https://example.com/cities.json".to_string())
        );
        assert_eq!(
            RegionSource::parse("file:///tmp/cities.json"),
            RegionSource::File(PathBuf::from("/tmp/cities.json"))
        );
        assert_eq!(
            RegionSource::parse("cities.json"),
            RegionSource::File(PathBuf::from("cities.json"))
        );
    }

    #[test]
    fn test_parse_descriptor() {
        let regions = parse_metro_extract(DESCRIPTOR.as_bytes(), 0).unwrap();
        let names: Vec<_> = regions.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["london", "new-york", "triangle"]);
        assert_eq!(regions[0].activation_zoom(), 0);
        assert_eq!(regions[1].activation_zoom(), 12);
    }

    #[test]
    fn test_default_activation_zoom_applies() {
        let regions = parse_metro_extract(DESCRIPTOR.as_bytes(), 10).unwrap();
        assert_eq!(regions[0].activation_zoom(), 10);
        assert_eq!(regions[1].activation_zoom(), 12);
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = parse_metro_extract(b"{not json", 0).unwrap_err();
        assert!(matches!(err, RegionError::MalformedSource { .. }));
    }

    #[test]
    fn test_entry_without_boundary_names_entry() {
        let json = r#"{"regions": {"x": {"cities": {"nowhere": {}}}}}"#;
        let err = parse_metro_extract(json.as_bytes(), 0).unwrap_err();
        assert_eq!(
            err,
            RegionError::MalformedSource {
                entry: "nowhere".to_string(),
                reason: "neither bbox nor polygon given".to_string(),
            }
        );
    }

    #[test]
    fn test_non_numeric_bbox_names_entry() {
        let json = r#"{"regions": {"x": {"cities": {"odd": {
            "bbox": {"top": "north", "left": "0", "bottom": "0", "right": "1"}
        }}}}}"#;
        let err = parse_metro_extract(json.as_bytes(), 0).unwrap_err();
        assert!(matches!(err, RegionError::MalformedSource { ref entry, .. } if entry == "odd"));
    }

    #[tokio::test]
    async fn test_load_from_file_with_city_filter() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DESCRIPTOR.as_bytes()).unwrap();
        let source = RegionSource::File(file.path().to_path_buf());

        let cities = vec!["london".to_string()];
        let filter = RegionFilter::load(&source, Some(&cities), 0, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.regions()[0].name(), "london");
    }

    #[tokio::test]
    async fn test_load_missing_file_is_unavailable() {
        let source = RegionSource::File(PathBuf::from("/nonexistent/cities.json"));
        let err = RegionFilter::load(&source, None, 0, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RegionError::SourceUnavailable { .. }));
    }
}
