//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration inspection (path, show)
//! - [`drain`] - Remove every pending job from the queue
//! - [`intersect`] - Expand expired tile lists and enqueue them
//! - [`process`] - Run the worker pool
//! - [`seed`] - Enqueue the initial job set
//! - [`write`] - Enqueue a tile list

pub mod config;
pub mod drain;
pub mod intersect;
pub mod process;
pub mod seed;
pub mod write;
