//! tilequeue CLI - Command-line interface
//!
//! Seeds and feeds the tile job queue and runs the workers that drain it.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::intersect::IntersectArgs;
use commands::process::ProcessArgs;
use commands::seed::SeedArgs;
use commands::write::WriteArgs;
use runner::GlobalArgs;

#[derive(Parser)]
#[command(name = "tilequeue")]
#[command(version = tilequeue::VERSION)]
#[command(about = "Queue map tiles for regeneration and render them", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.tilequeue/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging, mirrored to stdout
    #[arg(long, global = true)]
    debug: bool,

    /// Upstream access key id (overrides config and environment)
    #[arg(long, global = true)]
    access_key_id: Option<String>,

    /// Upstream secret access key (overrides config and environment)
    #[arg(long, global = true)]
    secret_access_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue every tile for a zoom range, optionally limited to metro regions
    Seed {
        /// First zoom level
        #[arg(long)]
        zoom_start: Option<u8>,

        /// Last zoom level (inclusive)
        #[arg(long)]
        zoom_until: Option<u8>,

        /// Restrict to metro regions from this zoom on
        #[arg(long, conflicts_with = "no_metro_filter")]
        filter_metro_zoom: Option<u8>,

        /// Seed every level in full, ignoring seed.filter_metro_zoom
        #[arg(long)]
        no_metro_filter: bool,

        /// Keep tiles produced by more than one region
        #[arg(long)]
        allow_duplicates: bool,

        /// Ignore seed.custom_bboxes
        #[arg(long)]
        no_custom: bool,
    },

    /// Enqueue tiles listed one per line as zoom/column/row
    Write {
        /// Tile list file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Expand expired tile lists to ancestors, intersect and enqueue
    Intersect {
        /// Expired tile list files (left in place)
        files: Vec<PathBuf>,

        /// Directory of expired tile lists, removed once enqueued
        #[arg(long, value_name = "DIR", conflicts_with = "files")]
        expired_dir: Option<PathBuf>,

        /// Most files taken from the directory in one run
        #[arg(long, value_name = "N")]
        max_files: Option<usize>,

        /// Lowest zoom ancestors are expanded to
        #[arg(long)]
        until: Option<u8>,

        /// Only enqueue tiles listed in this file
        #[arg(long, value_name = "FILE")]
        tiles_of_interest: Option<PathBuf>,
    },

    /// Render queued jobs until interrupted
    Process {
        /// Number of concurrent workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Remove every pending job from the queue
    Drain,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalArgs {
        config: cli.config,
        debug: cli.debug,
        access_key_id: cli.access_key_id,
        secret_access_key: cli.secret_access_key,
    };

    let result = match cli.command {
        Commands::Seed {
            zoom_start,
            zoom_until,
            filter_metro_zoom,
            no_metro_filter,
            allow_duplicates,
            no_custom,
        } => commands::seed::run(
            &global,
            SeedArgs {
                zoom_start,
                zoom_until,
                filter_metro_zoom,
                no_metro_filter,
                allow_duplicates,
                no_custom,
            },
        ),
        Commands::Write { file } => commands::write::run(&global, WriteArgs { file }),
        Commands::Intersect {
            files,
            expired_dir,
            max_files,
            until,
            tiles_of_interest,
        } => commands::intersect::run(
            &global,
            IntersectArgs {
                files,
                expired_dir,
                max_files,
                until,
                tiles_of_interest,
            },
        ),
        Commands::Process { workers } => commands::process::run(&global, ProcessArgs { workers }),
        Commands::Drain => commands::drain::run(&global),
        Commands::Config { command } => commands::config::run(command, global.config.as_deref()),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tilequeue",
            "seed",
            "--zoom-until",
            "12",
            "--config",
            "/tmp/tq.ini",
            "--access-key-id",
            "AKID",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tq.ini")));
        assert_eq!(cli.access_key_id.as_deref(), Some("AKID"));
        match cli.command {
            Commands::Seed { zoom_until, .. } => assert_eq!(zoom_until, Some(12)),
            _ => panic!("expected seed"),
        }
    }

    #[test]
    fn test_intersect_inputs() {
        let cli = Cli::try_parse_from(["tilequeue", "intersect", "--expired-dir", "/var/expired"])
            .unwrap();
        match cli.command {
            Commands::Intersect {
                files, expired_dir, ..
            } => {
                assert!(files.is_empty());
                assert_eq!(expired_dir, Some(PathBuf::from("/var/expired")));
            }
            _ => panic!("expected intersect"),
        }
        assert!(
            Cli::try_parse_from(["tilequeue", "intersect", "a.txt", "--expired-dir", "/x"]).is_err()
        );

        let cli = Cli::try_parse_from(["tilequeue", "intersect", "a.txt", "b.txt", "--until", "8"])
            .unwrap();
        match cli.command {
            Commands::Intersect { files, until, .. } => {
                assert_eq!(files.len(), 2);
                assert_eq!(until, Some(8));
            }
            _ => panic!("expected intersect"),
        }
    }
}
