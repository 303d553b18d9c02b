//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
///
/// Credentials are never written back; they stay wherever the operator put them.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let formats = config
        .render
        .formats
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ");
    let filter_metro_zoom = config
        .seed
        .filter_metro_zoom
        .map(|z| z.to_string())
        .unwrap_or_default();
    let metro_extract_url = config.seed.metro_extract_url.as_deref().unwrap_or("");
    let metro_extract_cities = config
        .seed
        .metro_extract_cities
        .as_ref()
        .map(|cities| cities.join(", "))
        .unwrap_or_default();
    let custom_bboxes = config
        .seed
        .custom_bboxes
        .iter()
        .map(|[west, south, east, north]| format!("{},{},{},{}", west, south, east, north))
        .collect::<Vec<_>>()
        .join("; ");
    let custom_zoom_start = config
        .seed
        .custom_zoom_start
        .map(|z| z.to_string())
        .unwrap_or_default();
    let custom_zoom_until = config
        .seed
        .custom_zoom_until
        .map(|z| z.to_string())
        .unwrap_or_default();
    let expired_tiles_location = config
        .write
        .expired_tiles_location
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();
    let expand_until_zoom = config
        .write
        .expand_until_zoom
        .map(|z| z.to_string())
        .unwrap_or_default();
    let tiles_of_interest = config
        .write
        .tiles_of_interest
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();

    format!(
        r#"[queue]
; Queue backend:
;   file   - newline-delimited tile file shared between processes
;   memory - in-process queue (single command only)
type = {}
; Queue identifier (path of the queue file for file queues)
name = {}
; Maximum tiles per enqueue call
max_batch_size = {}
; Seconds a received job stays hidden before it is redelivered
visibility_timeout_secs = {}
; How long a worker waits for a job before polling again (milliseconds)
poll_interval_ms = {}

[store]
; Blob store backend: directory or memory
type = {}
; Root directory for the directory store
target = {}
; Key prefix inside the store (may be empty)
path = {}
; Durability class: standard or reduced_redundancy
storage_class = {}

[render]
; Upstream tile server; placeholders {{layer}} {{z}} {{x}} {{y}} {{ext}}
url_template = {}
layer = {}
; Comma-separated output formats: json, topojson, mvt, vtm
formats = {}
timeout_secs = {}

[seed]
zoom_start = {}
zoom_until = {}
; Restrict seeding to metro extracts from this zoom on (empty = no filter)
filter_metro_zoom = {}
; Emit each tile at most once per zoom level
unique_tiles = {}
; Metro extract descriptor (URL or path)
metro_extract_url = {}
; Comma-separated city names to keep (empty = all)
metro_extract_cities = {}
; Seconds allowed for fetching the metro extract descriptor
metro_extract_timeout_secs = {}
; Extra boxes seeded over their own zoom range, as
; west,south,east,north separated by semicolons (empty = none)
custom_bboxes = {}
custom_zoom_start = {}
custom_zoom_until = {}

[write]
; Also enqueue ancestors down to this zoom (empty = disabled)
expand_until_zoom = {}
; File of tiles of interest limiting expansion (empty = no limit)
tiles_of_interest = {}
; Directory of expired tile lists read and then removed by intersect
expired_tiles_location = {}
; Most expired tile files consumed per intersect run
max_expired_files = {}

[worker]
; Number of concurrent workers
workers = {}
; Attempts per render, store or enqueue call
max_retries = {}
retry_base_delay_ms = {}

[credentials]
; Upstream credentials; may also come from TILEQUEUE_ACCESS_KEY_ID and
; TILEQUEUE_SECRET_ACCESS_KEY or command-line flags
access_key_id =
secret_access_key =

[logging]
file = {}
"#,
        config.queue.queue_type.name(),
        config.queue.name,
        config.queue.max_batch_size,
        config.queue.visibility_timeout_secs,
        config.queue.poll_interval_ms,
        config.store.store_type.name(),
        path_to_string(&config.store.target),
        config.store.path,
        config.store.storage_class,
        config.render.url_template,
        config.render.layer,
        formats,
        config.render.timeout_secs,
        config.seed.zoom_start,
        config.seed.zoom_until,
        filter_metro_zoom,
        config.seed.unique_tiles,
        metro_extract_url,
        metro_extract_cities,
        config.seed.metro_extract_timeout_secs,
        custom_bboxes,
        custom_zoom_start,
        custom_zoom_until,
        expand_until_zoom,
        tiles_of_interest,
        expired_tiles_location,
        config.write.max_expired_files,
        config.worker.workers,
        config.worker.max_retries,
        config.worker.retry_base_delay_ms,
        path_to_string(&config.logging.file),
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ini::Ini;

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.seed.filter_metro_zoom = Some(11);
        config.seed.metro_extract_cities = Some(vec!["london".to_string(), "paris".to_string()]);
        config.write.expand_until_zoom = Some(8);
        config.seed.custom_bboxes = vec![[-74.02, 40.7, -73.94, 40.76], [0.0, -1.5, 1.0, 2.0]];
        config.seed.custom_zoom_start = Some(10);
        config.seed.custom_zoom_until = Some(15);
        config.write.expired_tiles_location = Some("/var/expired".into());
        config.write.max_expired_files = 7;

        let content = to_config_string(&config);
        let ini = Ini::load_from_str(&content).unwrap();
        let parsed = super::super::parser::parse_ini(&ini).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_credentials_not_written() {
        let mut config = ConfigFile::default();
        config.credentials.secret_access_key = Some("hunter2".to_string());

        let content = to_config_string(&config);
        assert!(!content.contains("hunter2"));
    }
}
