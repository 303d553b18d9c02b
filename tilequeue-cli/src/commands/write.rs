//! Write command - enqueue a tile list from a file or stdin.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::BufReader;
use tracing::info;

use tilequeue::writer::{load_tiles_of_interest, QueueWriter, WriteSummary, WriterConfig};

use crate::error::CliError;
use crate::runner::{CliRunner, GlobalArgs};

/// Arguments for the write command.
#[derive(Debug, Default)]
pub struct WriteArgs {
    /// Tile list file; stdin when absent
    pub file: Option<PathBuf>,
}

/// Run the write command.
pub fn run(global: &GlobalArgs, args: WriteArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("write");

    let config = runner.config();
    let queue = Arc::new(runner.open_queue()?);
    let tiles_of_interest = config.write.tiles_of_interest.clone();
    let writer_config = WriterConfig::from(config);

    let summary = runner.block_on(async {
        let mut writer = QueueWriter::new(queue, writer_config);
        if let Some(path) = &tiles_of_interest {
            writer = writer.with_tiles_of_interest(load_tiles_of_interest(path).await?);
        }
        match &args.file {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|error| CliError::FileRead {
                        path: path.display().to_string(),
                        error,
                    })?;
                Ok::<_, CliError>(writer.write_from(BufReader::new(file)).await?)
            }
            None => Ok(writer
                .write_from(BufReader::new(tokio::io::stdin()))
                .await?),
        }
    })?;

    report(&summary);
    Ok(())
}

pub(crate) fn report(summary: &WriteSummary) {
    println!("Enqueued {} tiles", summary.enqueued);
    if summary.parse_failures > 0 {
        println!("Skipped {} malformed lines", summary.parse_failures);
    }
    info!(
        enqueued = summary.enqueued,
        parse_failures = summary.parse_failures,
        "Write command finished"
    );
}
