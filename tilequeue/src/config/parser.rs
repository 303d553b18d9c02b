//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::coord::MAX_ZOOM;
use crate::render::parse_format_list;

fn invalid(section: &str, key: &str, value: &str, reason: impl Into<String>) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "expected a non-negative integer"))
}

fn parse_positive(section: &str, key: &str, value: &str) -> Result<usize, ConfigFileError> {
    let n: usize = parse_number(section, key, value)?;
    if n == 0 {
        return Err(invalid(section, key, value, "must be at least 1"));
    }
    Ok(n)
}

fn parse_zoom(section: &str, key: &str, value: &str) -> Result<u8, ConfigFileError> {
    let zoom: u8 = parse_number(section, key, value)?;
    if zoom > MAX_ZOOM {
        return Err(invalid(section, key, value, "zoom must be between 0 and 30"));
    }
    Ok(zoom)
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value, "expected true or false")),
    }
}

/// Returns the trimmed value, or `None` if it is blank.
fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `west,south,east,north` boxes separated by semicolons.
fn parse_bboxes(section: &str, key: &str, value: &str) -> Result<Vec<[f64; 4]>, ConfigFileError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let parts = entry
                .split(',')
                .map(|p| p.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| invalid(section, key, value, format!("'{}' is not numeric", entry)))?;
            let [west, south, east, north] = parts[..] else {
                return Err(invalid(
                    section,
                    key,
                    value,
                    format!("'{}' needs west,south,east,north", entry),
                ));
            };
            let finite = parts.iter().all(|v| v.is_finite());
            if !finite || west >= east || south >= north {
                return Err(invalid(
                    section,
                    key,
                    value,
                    format!("'{}' is not a valid bounding box", entry),
                ));
            }
            Ok([west, south, east, north])
        })
        .collect()
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [queue] section
    if let Some(section) = ini.section(Some("queue")) {
        if let Some(v) = section.get("type") {
            config.queue.queue_type = v.parse().map_err(|e: String| invalid("queue", "type", v, e))?;
        }
        if let Some(v) = section.get("name").and_then(non_empty) {
            config.queue.name = expand_tilde(v).display().to_string();
        }
        if let Some(v) = section.get("max_batch_size") {
            config.queue.max_batch_size = parse_positive("queue", "max_batch_size", v)?;
        }
        if let Some(v) = section.get("visibility_timeout_secs") {
            config.queue.visibility_timeout_secs =
                parse_number("queue", "visibility_timeout_secs", v)?;
        }
        if let Some(v) = section.get("poll_interval_ms") {
            config.queue.poll_interval_ms = parse_number("queue", "poll_interval_ms", v)?;
        }
    }

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("type") {
            config.store.store_type = v.parse().map_err(|e: String| invalid("store", "type", v, e))?;
        }
        if let Some(v) = section.get("target").and_then(non_empty) {
            config.store.target = expand_tilde(v);
        }
        if let Some(v) = section.get("path") {
            config.store.path = v.trim().trim_matches('/').to_string();
        }
        if let Some(v) = section.get("storage_class") {
            config.store.storage_class = v
                .parse()
                .map_err(|e: String| invalid("store", "storage_class", v, e))?;
        }
    }

    // [render] section
    if let Some(section) = ini.section(Some("render")) {
        if let Some(v) = section.get("url_template").and_then(non_empty) {
            if !v.contains("{z}") || !v.contains("{x}") || !v.contains("{y}") {
                return Err(invalid(
                    "render",
                    "url_template",
                    v,
                    "must contain {z}, {x} and {y} placeholders",
                ));
            }
            config.render.url_template = v.to_string();
        }
        if let Some(v) = section.get("layer").and_then(non_empty) {
            config.render.layer = v.to_string();
        }
        if let Some(v) = section.get("formats") {
            config.render.formats =
                parse_format_list(v).map_err(|e| invalid("render", "formats", v, e.to_string()))?;
        }
        if let Some(v) = section.get("timeout_secs") {
            config.render.timeout_secs = parse_number("render", "timeout_secs", v)?;
        }
    }

    // [seed] section
    if let Some(section) = ini.section(Some("seed")) {
        if let Some(v) = section.get("zoom_start") {
            config.seed.zoom_start = parse_zoom("seed", "zoom_start", v)?;
        }
        if let Some(v) = section.get("zoom_until") {
            config.seed.zoom_until = parse_zoom("seed", "zoom_until", v)?;
        }
        if let Some(v) = section.get("filter_metro_zoom").and_then(non_empty) {
            config.seed.filter_metro_zoom = Some(parse_zoom("seed", "filter_metro_zoom", v)?);
        }
        if let Some(v) = section.get("unique_tiles") {
            config.seed.unique_tiles = parse_bool("seed", "unique_tiles", v)?;
        }
        if let Some(v) = section.get("metro_extract_url").and_then(non_empty) {
            config.seed.metro_extract_url = Some(v.to_string());
        }
        if let Some(v) = section.get("metro_extract_cities") {
            let cities = parse_list(v);
            config.seed.metro_extract_cities = (!cities.is_empty()).then_some(cities);
        }
        if let Some(v) = section.get("metro_extract_timeout_secs") {
            config.seed.metro_extract_timeout_secs =
                parse_number("seed", "metro_extract_timeout_secs", v)?;
        }
        if let Some(v) = section.get("custom_bboxes") {
            config.seed.custom_bboxes = parse_bboxes("seed", "custom_bboxes", v)?;
        }
        if let Some(v) = section.get("custom_zoom_start").and_then(non_empty) {
            config.seed.custom_zoom_start = Some(parse_zoom("seed", "custom_zoom_start", v)?);
        }
        if let Some(v) = section.get("custom_zoom_until").and_then(non_empty) {
            config.seed.custom_zoom_until = Some(parse_zoom("seed", "custom_zoom_until", v)?);
        }
        if config.seed.zoom_start > config.seed.zoom_until {
            return Err(invalid(
                "seed",
                "zoom_start",
                &config.seed.zoom_start.to_string(),
                "must not exceed zoom_until",
            ));
        }
        if !config.seed.custom_bboxes.is_empty() {
            match (config.seed.custom_zoom_start, config.seed.custom_zoom_until) {
                (Some(start), Some(until)) if start > until => {
                    return Err(invalid(
                        "seed",
                        "custom_zoom_start",
                        &start.to_string(),
                        "must not exceed custom_zoom_until",
                    ));
                }
                (Some(_), Some(_)) => {}
                _ => {
                    return Err(invalid(
                        "seed",
                        "custom_bboxes",
                        section.get("custom_bboxes").unwrap_or(""),
                        "needs custom_zoom_start and custom_zoom_until",
                    ));
                }
            }
        }
    }

    // [write] section
    if let Some(section) = ini.section(Some("write")) {
        if let Some(v) = section.get("expand_until_zoom").and_then(non_empty) {
            config.write.expand_until_zoom = Some(parse_zoom("write", "expand_until_zoom", v)?);
        }
        if let Some(v) = section.get("tiles_of_interest").and_then(non_empty) {
            config.write.tiles_of_interest = Some(expand_tilde(v));
        }
        if let Some(v) = section.get("expired_tiles_location").and_then(non_empty) {
            config.write.expired_tiles_location = Some(expand_tilde(v));
        }
        if let Some(v) = section.get("max_expired_files") {
            config.write.max_expired_files = parse_positive("write", "max_expired_files", v)?;
        }
    }

    // [worker] section
    if let Some(section) = ini.section(Some("worker")) {
        if let Some(v) = section.get("workers") {
            config.worker.workers = parse_positive("worker", "workers", v)?;
        }
        if let Some(v) = section.get("max_retries") {
            config.worker.max_retries = parse_positive("worker", "max_retries", v)? as u32;
        }
        if let Some(v) = section.get("retry_base_delay_ms") {
            config.worker.retry_base_delay_ms = parse_number("worker", "retry_base_delay_ms", v)?;
        }
    }

    // [credentials] section
    if let Some(section) = ini.section(Some("credentials")) {
        if let Some(v) = section.get("access_key_id").and_then(non_empty) {
            config.credentials.access_key_id = Some(v.to_string());
        }
        if let Some(v) = section.get("secret_access_key").and_then(non_empty) {
            config.credentials.secret_access_key = Some(v.to_string());
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file").and_then(non_empty) {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

/// Expand tilde in path to home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use crate::queue::QueueKind;
    use crate::render::OutputFormat;
    use crate::store::{StorageClass, StoreKind};

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.queue.max_batch_size, 10);
        assert_eq!(
            config.render.formats,
            vec![OutputFormat::Json, OutputFormat::Mvt]
        );
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
[queue]
type = memory
name = jobs
max_batch_size = 5
visibility_timeout_secs = 60

[store]
type = directory
target = /srv/tiles
path = /osm/
storage_class = reduced_redundancy

[render]
url_template = http://render:8080/{layer}/{z}/{x}/{y}.{ext}
layer = buildings
formats = json, topojson, mvt

[seed]
zoom_start = 2
zoom_until = 14
filter_metro_zoom = 11
unique_tiles = false
metro_extract_url = https://example.com/cities.json
metro_extract_cities = london, new-york
metro_extract_timeout_secs = 5
custom_bboxes = -74.02,40.70,-73.94,40.76; 2.25,48.81,2.42,48.90
custom_zoom_start = 10
custom_zoom_until = 16

[write]
expand_until_zoom = 12
expired_tiles_location = /var/expired
max_expired_files = 5

[worker]
workers = 6
max_retries = 5
retry_base_delay_ms = 250

[credentials]
access_key_id = AKID
secret_access_key = SECRET
"#,
        )
        .unwrap();

        assert_eq!(config.queue.queue_type, QueueKind::Memory);
        assert_eq!(config.queue.name, "jobs");
        assert_eq!(config.queue.max_batch_size, 5);
        assert_eq!(config.queue.visibility_timeout_secs, 60);
        assert_eq!(
            config.queue.poll_interval_ms,
            DEFAULT_POLL_INTERVAL_MS
        );
        assert_eq!(config.store.store_type, StoreKind::Directory);
        assert_eq!(config.store.target, PathBuf::from("/srv/tiles"));
        assert_eq!(config.store.path, "osm");
        assert_eq!(
            config.store.storage_class,
            StorageClass::ReducedRedundancy
        );
        assert_eq!(config.render.layer, "buildings");
        assert_eq!(config.render.formats.len(), 3);
        assert_eq!(config.seed.zoom_start, 2);
        assert_eq!(config.seed.zoom_until, 14);
        assert_eq!(config.seed.filter_metro_zoom, Some(11));
        assert!(!config.seed.unique_tiles);
        assert_eq!(
            config.seed.metro_extract_cities,
            Some(vec!["london".to_string(), "new-york".to_string()])
        );
        assert_eq!(config.seed.metro_extract_timeout_secs, 5);
        assert_eq!(
            config.seed.custom_bboxes,
            vec![[-74.02, 40.70, -73.94, 40.76], [2.25, 48.81, 2.42, 48.90]]
        );
        assert_eq!(config.seed.custom_zoom_start, Some(10));
        assert_eq!(config.seed.custom_zoom_until, Some(16));
        assert_eq!(config.write.expand_until_zoom, Some(12));
        assert_eq!(
            config.write.expired_tiles_location,
            Some(PathBuf::from("/var/expired"))
        );
        assert_eq!(config.write.max_expired_files, 5);
        assert_eq!(config.worker.workers, 6);
        assert_eq!(config.worker.max_retries, 5);
        assert_eq!(config.credentials.access_key_id.as_deref(), Some("AKID"));
    }

    #[test]
    fn test_unknown_format_is_config_error() {
        let err = parse("[render]\nformats = json,png\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "render");
                assert_eq!(key, "formats");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse("[queue]\ntype = sqs\n").is_err());
        assert!(parse("[queue]\nmax_batch_size = 0\n").is_err());
        assert!(parse("[store]\nstorage_class = glacier\n").is_err());
        assert!(parse("[seed]\nzoom_until = 31\n").is_err());
        assert!(parse("[seed]\nunique_tiles = maybe\n").is_err());
        assert!(parse("[seed]\nzoom_start = 9\nzoom_until = 3\n").is_err());
        assert!(parse("[render]\nurl_template = http://render/tile\n").is_err());
        assert!(parse("[worker]\nworkers = many\n").is_err());
        assert!(parse("[write]\nmax_expired_files = 0\n").is_err());
    }

    #[test]
    fn test_custom_bboxes_validation() {
        let zooms = "custom_zoom_start = 10\ncustom_zoom_until = 12\n";
        assert!(parse(&format!("[seed]\ncustom_bboxes = 1,2,3\n{}", zooms)).is_err());
        assert!(parse(&format!("[seed]\ncustom_bboxes = 5,0,1,1\n{}", zooms)).is_err());
        assert!(parse(&format!("[seed]\ncustom_bboxes = a,b,c,d\n{}", zooms)).is_err());
        // Boxes without a zoom range
        assert!(parse("[seed]\ncustom_bboxes = 0,0,1,1\n").is_err());
        assert!(parse(
            "[seed]\ncustom_bboxes = 0,0,1,1\ncustom_zoom_start = 12\ncustom_zoom_until = 10\n"
        )
        .is_err());

        let config = parse(&format!("[seed]\ncustom_bboxes = 0,0,1,1;\n{}", zooms)).unwrap();
        assert_eq!(config.seed.custom_bboxes, vec![[0.0, 0.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_blank_optional_values_stay_unset() {
        let config = parse("[seed]\nfilter_metro_zoom =\nmetro_extract_cities = \n").unwrap();
        assert_eq!(config.seed.filter_metro_zoom, None);
        assert_eq!(config.seed.metro_extract_cities, None);
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/tiles");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("tiles"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
