//! Process command - run the worker pool until interrupted.

use std::sync::Arc;

use tracing::{info, warn};

use tilequeue::queue::FileQueue;
use tilequeue::render::{HttpRenderer, RenderConfig};
use tilequeue::store::{BlobStore, DirectoryStore, MemoryStore, StoreConfig, StoreKind};
use tilequeue::worker::{StatsSnapshot, WorkerConfig, WorkerPool};

use crate::error::CliError;
use crate::runner::{CliRunner, GlobalArgs};

/// Arguments for the process command.
#[derive(Debug, Default)]
pub struct ProcessArgs {
    /// Worker count; falls back to `worker.workers`
    pub workers: Option<usize>,
}

/// Run the process command.
///
/// The queue file and the store root are opened before any worker starts;
/// either being unusable ends the command with an error.
pub fn run(global: &GlobalArgs, args: ProcessArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("process");

    let config = runner.config();
    let mut worker_config = WorkerConfig::from(config);
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(CliError::Config("--workers must be at least 1".to_string()));
        }
        worker_config.workers = workers;
    }

    let queue = Arc::new(runner.open_queue()?);
    let render_config = RenderConfig::from(config);
    let renderer = Arc::new(
        HttpRenderer::new(&render_config, runner.credentials().cloned())
            .map_err(CliError::Renderer)?,
    );
    let store_config = StoreConfig::from(config);
    let directory_store = match store_config.kind {
        StoreKind::Directory => Some(Arc::new(DirectoryStore::new(&store_config.target))),
        StoreKind::Memory => None,
    };
    runner.block_on(check_backends(&queue, directory_store.as_deref()))?;

    println!(
        "Processing jobs from {} with {} workers (Ctrl-C or SIGTERM to stop)",
        config.queue.name, worker_config.workers
    );

    let snapshot = match directory_store {
        Some(store) => {
            info!(target_dir = %store.root().display(), "Using directory store");
            run_pool(&runner, queue, renderer, store, worker_config)?
        }
        None => {
            warn!("Memory store selected; rendered tiles are discarded on exit");
            run_pool(&runner, queue, renderer, Arc::new(MemoryStore::new()), worker_config)?
        }
    };

    println!("Stopped: {}", snapshot);
    Ok(())
}

/// Opens the queue file and, for a directory store, proves the root takes
/// writes.
async fn check_backends(
    queue: &FileQueue,
    store: Option<&DirectoryStore>,
) -> Result<(), CliError> {
    queue.open().await?;
    if let Some(store) = store {
        store.check_writable().await?;
    }
    Ok(())
}

fn run_pool<S: BlobStore>(
    runner: &CliRunner,
    queue: Arc<FileQueue>,
    renderer: Arc<HttpRenderer>,
    store: Arc<S>,
    config: WorkerConfig,
) -> Result<StatsSnapshot, CliError> {
    let pool = WorkerPool::new(queue, renderer, store, config).map_err(CliError::Worker)?;
    let shutdown = runner.shutdown_token();
    Ok(runner.block_on(pool.run(shutdown)))
}
