//! Intersect command - expand expired tile lists and enqueue the result.
//!
//! Each expired tile also stands for its ancestors down to `--until`; with a
//! tiles-of-interest file only tiles listed there are enqueued. Lists come
//! either from files named on the command line, which are left in place, or
//! from an expiry directory, whose files are removed once enqueued.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use tilequeue::coord::MAX_ZOOM;
use tilequeue::queue::Queue;
use tilequeue::writer::{
    list_expired_files, load_tiles_of_interest, read_tile_files, remove_consumed, QueueWriter,
    WriteSummary, WriterConfig,
};

use super::write::report;
use crate::error::CliError;
use crate::runner::{CliRunner, GlobalArgs};

/// Arguments for the intersect command.
#[derive(Debug, Default)]
pub struct IntersectArgs {
    /// Expired tile list files
    pub files: Vec<PathBuf>,
    /// Expiry directory; falls back to `write.expired_tiles_location`
    pub expired_dir: Option<PathBuf>,
    /// Files taken from the directory per run; falls back to
    /// `write.max_expired_files`
    pub max_files: Option<usize>,
    /// Lowest ancestor zoom; falls back to `write.expand_until_zoom`
    pub until: Option<u8>,
    /// Tiles-of-interest file; falls back to `write.tiles_of_interest`
    pub tiles_of_interest: Option<PathBuf>,
}

/// Where expired tile lists are read from.
#[derive(Debug, Clone, PartialEq)]
enum ExpiredInput {
    Files(Vec<PathBuf>),
    Directory { dir: PathBuf, cap: usize },
}

/// Run the intersect command.
pub fn run(global: &GlobalArgs, args: IntersectArgs) -> Result<(), CliError> {
    if let Some(until) = args.until.filter(|z| *z > MAX_ZOOM) {
        return Err(CliError::Config(format!(
            "--until {} is beyond the maximum zoom {}",
            until, MAX_ZOOM
        )));
    }
    if args.max_files == Some(0) {
        return Err(CliError::Config("--max-files must be at least 1".to_string()));
    }

    let runner = CliRunner::new(global)?;
    runner.log_startup("intersect");

    let config = runner.config();
    let input = if !args.files.is_empty() {
        ExpiredInput::Files(args.files.clone())
    } else {
        let dir = args
            .expired_dir
            .clone()
            .or_else(|| config.write.expired_tiles_location.clone())
            .ok_or_else(|| {
                CliError::Config(
                    "intersect needs expired tile files, --expired-dir or \
                     write.expired_tiles_location"
                        .to_string(),
                )
            })?;
        ExpiredInput::Directory {
            dir,
            cap: args.max_files.unwrap_or(config.write.max_expired_files),
        }
    };

    let queue = Arc::new(runner.open_queue()?);
    let mut writer_config = WriterConfig::from(config);
    if args.until.is_some() {
        writer_config.expand_until_zoom = args.until;
    }
    let tiles_of_interest = args
        .tiles_of_interest
        .clone()
        .or_else(|| config.write.tiles_of_interest.clone());

    let summary = runner.block_on(async {
        let mut writer = QueueWriter::new(queue, writer_config);
        if let Some(path) = &tiles_of_interest {
            let tiles = load_tiles_of_interest(path).await?;
            println!("Loaded {} tiles of interest", tiles.len());
            writer = writer.with_tiles_of_interest(tiles);
        }
        intersect(&writer, &input).await
    })?;

    match summary {
        Some(summary) => report(&summary),
        None => println!("No expired tile files found"),
    }
    Ok(())
}

/// Enqueues the tiles of every input file.
///
/// Directory files are removed only after all of their tiles were
/// enqueued. Returns `None` when the directory held no files.
async fn intersect<Q: Queue>(
    writer: &QueueWriter<Q>,
    input: &ExpiredInput,
) -> Result<Option<WriteSummary>, CliError> {
    let (paths, consume) = match input {
        ExpiredInput::Files(paths) => (paths.clone(), false),
        ExpiredInput::Directory { dir, cap } => (list_expired_files(dir, *cap).await?, true),
    };
    if paths.is_empty() {
        return Ok(None);
    }

    println!("Processing {} expired tile files", paths.len());
    let lines = read_tile_files(&paths).await?;
    let summary = writer.write(lines).await?;

    if consume {
        remove_consumed(&paths).await?;
        info!(files = paths.len(), "Consumed expired tile files");
    }
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tilequeue::queue::MemoryQueue;

    fn writer(queue: &Arc<MemoryQueue>) -> QueueWriter<MemoryQueue> {
        QueueWriter::new(Arc::clone(queue), WriterConfig::default())
    }

    #[tokio::test]
    async fn test_directory_files_are_capped_and_removed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("001.txt"), "12/1/1\n12/1/2\n").unwrap();
        std::fs::write(dir.path().join("002.txt"), "12/1/3\n").unwrap();
        std::fs::write(dir.path().join("003.txt"), "12/1/4\n").unwrap();
        let queue = Arc::new(MemoryQueue::new("intersect"));
        let input = ExpiredInput::Directory {
            dir: dir.path().to_path_buf(),
            cap: 2,
        };

        let summary = intersect(&writer(&queue), &input).await.unwrap().unwrap();
        assert_eq!(summary.enqueued, 3);
        assert_eq!(queue.pending_len(), 3);
        assert!(!dir.path().join("001.txt").exists());
        assert!(!dir.path().join("002.txt").exists());
        assert!(dir.path().join("003.txt").exists());

        // A rerun only picks up what is left
        let summary = intersect(&writer(&queue), &input).await.unwrap().unwrap();
        assert_eq!(summary.enqueued, 1);
        assert!(intersect(&writer(&queue), &input).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_named_files_are_left_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("expired.txt");
        std::fs::write(&path, "12/1/1\n").unwrap();
        let queue = Arc::new(MemoryQueue::new("intersect"));

        let input = ExpiredInput::Files(vec![path.clone()]);
        intersect(&writer(&queue), &input).await.unwrap();

        assert!(path.exists());
        let job = queue.receive(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.tile.to_string(), "12/1/1");
    }

    #[tokio::test]
    async fn test_failed_write_keeps_directory_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.txt");
        std::fs::write(&path, "not a tile\n").unwrap();
        let queue = Arc::new(MemoryQueue::new("intersect"));
        let input = ExpiredInput::Directory {
            dir: dir.path().to_path_buf(),
            cap: 20,
        };

        let err = intersect(&writer(&queue), &input).await.unwrap_err();
        assert!(matches!(err, CliError::Write(_)));
        assert!(path.exists());
    }
}
