//! Drain command - remove every pending job from the queue.

use tilequeue::queue::Queue;
use tracing::info;

use crate::error::CliError;
use crate::runner::{CliRunner, GlobalArgs};

/// Run the drain command.
pub fn run(global: &GlobalArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("drain");

    let queue = runner.open_queue()?;
    let removed = runner.block_on(queue.clear())?;

    println!("Removed {} jobs from {}", removed, queue.name());
    info!(removed, queue = queue.name(), "Queue drained");
    Ok(())
}
