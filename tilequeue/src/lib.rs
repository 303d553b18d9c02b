//! Tilequeue - map tile regeneration pipeline
//!
//! Decides which tiles need rendering, distributes them as jobs over a
//! durable queue and consumes those jobs with a pool of workers that render
//! each tile in several formats and write the results to a blob store.
//!
//! # Pipeline
//!
//! ```text
//! seed / write ──► Queue ──► WorkerPool ──► Renderer ──► BlobStore
//! ```
//!
//! - [`seed`] enumerates tiles zoom by zoom, optionally restricted to metro
//!   regions ([`region`]) from a threshold zoom upward.
//! - [`writer`] enqueues explicit tile lists, such as expired-tile files.
//! - [`worker`] receives jobs and acknowledges them once at least one
//!   format was stored.
//!
//! # Example
//!
//! ```
//! use tilequeue::queue::MemoryQueue;
//! use tilequeue::retry::RetryPolicy;
//! use tilequeue::seed::{SeedConfig, Seeder};
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let config = SeedConfig { zoom_start: 0, zoom_until: 2, ..Default::default() };
//! let seeder = Seeder::new(config, None).unwrap();
//! let queue = MemoryQueue::new("jobs");
//!
//! let report = seeder.seed(&queue, &RetryPolicy::default()).await.unwrap();
//! assert_eq!(report.emitted, 1 + 4 + 16);
//! # });
//! ```

pub mod config;
pub mod coord;
pub mod logging;
pub mod queue;
pub mod region;
pub mod render;
pub mod retry;
pub mod seed;
pub mod store;
pub mod worker;
pub mod writer;

/// Version of the tilequeue library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
