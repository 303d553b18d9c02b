//! Seed command - enqueue the initial job set.

use std::time::Duration;

use tracing::info;

use tilequeue::region::RegionSource;
use tilequeue::retry::RetryPolicy;
use tilequeue::config::SeedSettings;
use tilequeue::seed::{CustomSeed, SeedConfig, Seeder};

use crate::error::CliError;
use crate::runner::{CliRunner, GlobalArgs};

/// Arguments for the seed command.
#[derive(Debug, Default)]
pub struct SeedArgs {
    pub zoom_start: Option<u8>,
    pub zoom_until: Option<u8>,
    pub filter_metro_zoom: Option<u8>,
    pub no_metro_filter: bool,
    pub allow_duplicates: bool,
    /// Skip `seed.custom_bboxes`
    pub no_custom: bool,
}

impl SeedArgs {
    /// Command-line values take precedence over `[seed]`.
    fn apply(&self, config: &mut SeedConfig) {
        if let Some(zoom) = self.zoom_start {
            config.zoom_start = zoom;
        }
        if let Some(zoom) = self.zoom_until {
            config.zoom_until = zoom;
        }
        if let Some(zoom) = self.filter_metro_zoom {
            config.filter_metro_zoom = Some(zoom);
        }
        if self.no_metro_filter {
            config.filter_metro_zoom = None;
        }
        if self.allow_duplicates {
            config.unique_tiles = false;
        }
    }
}

/// The custom bounding box pass from `[seed]`, unless disabled or empty.
fn custom_seed(settings: &SeedSettings, args: &SeedArgs) -> Result<Option<CustomSeed>, CliError> {
    if args.no_custom || settings.custom_bboxes.is_empty() {
        return Ok(None);
    }
    let (Some(start), Some(until)) = (settings.custom_zoom_start, settings.custom_zoom_until) else {
        return Err(CliError::Config(
            "seed.custom_bboxes needs seed.custom_zoom_start and seed.custom_zoom_until".to_string(),
        ));
    };
    Ok(Some(CustomSeed::from_bboxes(&settings.custom_bboxes, start, until)?))
}

/// Run the seed command.
pub fn run(global: &GlobalArgs, args: SeedArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("seed");

    let config = runner.config();
    let mut seed_config = SeedConfig::from(config);
    args.apply(&mut seed_config);
    let policy = RetryPolicy::from(config);
    let queue = runner.open_queue()?;
    let custom = custom_seed(&config.seed, &args)?;

    let report = runner.block_on(async {
        let seeder = match seed_config.filter_metro_zoom {
            Some(threshold) => {
                let url = config.seed.metro_extract_url.as_deref().ok_or_else(|| {
                    CliError::Config(format!(
                        "Metro filtering from zoom {} needs seed.metro_extract_url",
                        threshold
                    ))
                })?;
                let source = RegionSource::parse(url);
                println!("Loading metro extract regions from {}...", source);
                Seeder::from_source(
                    seed_config,
                    &source,
                    config.seed.metro_extract_cities.as_deref(),
                    Duration::from_secs(config.seed.metro_extract_timeout_secs),
                )
                .await?
            }
            None => Seeder::new(seed_config, None)?,
        };
        let seeder = match custom {
            Some(custom) => {
                println!(
                    "Adding {} custom bounding boxes",
                    custom.regions().len()
                );
                seeder.with_custom(custom)
            }
            None => seeder,
        };

        println!(
            "Seeding zoom {}..={}{}",
            seed_config.zoom_start,
            seed_config.zoom_until,
            seed_config
                .filter_metro_zoom
                .map(|z| format!(" (metro regions from zoom {})", z))
                .unwrap_or_default()
        );
        seeder.seed(&queue, &policy).await.map_err(CliError::from)
    })?;

    for (zoom, count) in &report.per_zoom {
        println!("  zoom {:>2}: {} tiles", zoom, count);
    }
    println!(
        "Seeded {} tiles ({} duplicates suppressed)",
        report.emitted, report.duplicates
    );
    info!(
        emitted = report.emitted,
        duplicates = report.duplicates,
        "Seed command finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilequeue::config::ConfigFile;

    #[test]
    fn test_flags_override_config() {
        let mut config = SeedConfig {
            zoom_start: 0,
            zoom_until: 10,
            filter_metro_zoom: Some(11),
            unique_tiles: true,
        };
        let args = SeedArgs {
            zoom_until: Some(14),
            no_metro_filter: true,
            allow_duplicates: true,
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.zoom_start, 0);
        assert_eq!(config.zoom_until, 14);
        assert_eq!(config.filter_metro_zoom, None);
        assert!(!config.unique_tiles);
    }

    #[test]
    fn test_custom_seed_from_settings() {
        let mut settings = ConfigFile::default().seed;
        let args = SeedArgs::default();
        assert!(custom_seed(&settings, &args).unwrap().is_none());

        settings.custom_bboxes = vec![[-74.02, 40.70, -73.94, 40.76]];
        assert!(matches!(custom_seed(&settings, &args), Err(CliError::Config(_))));

        settings.custom_zoom_start = Some(12);
        settings.custom_zoom_until = Some(14);
        let custom = custom_seed(&settings, &args).unwrap().unwrap();
        assert_eq!(custom.regions().len(), 1);

        let skip = SeedArgs {
            no_custom: true,
            ..Default::default()
        };
        assert!(custom_seed(&settings, &skip).unwrap().is_none());
    }
}
