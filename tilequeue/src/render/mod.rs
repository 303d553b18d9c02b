//! Renderer contract and output formats.
//!
//! Rendering itself happens elsewhere; this module only defines what is
//! requested ([`OutputFormat`]) and how a renderer is called ([`Renderer`]).
//! [`HttpRenderer`] adapts an upstream tile server.

mod format;
mod http;

pub use format::{parse_format_list, FormatError, OutputFormat, DEFAULT_FORMATS};
pub use http::{HttpRenderer, RenderConfig, DEFAULT_URL_TEMPLATE};

use std::fmt;
use std::future::Future;

use crate::coord::TileCoord;

/// Failure to render one tile in one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub message: String,
    pub is_retryable: bool,
}

impl RenderError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: false,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RenderError {}

/// Produces the payload for a tile in a format.
///
/// Treated as a pure function of `(tile, format)`, so calls may be repeated
/// freely.
pub trait Renderer: Send + Sync + 'static {
    fn render(
        &self,
        tile: TileCoord,
        format: OutputFormat,
    ) -> impl Future<Output = Result<Vec<u8>, RenderError>> + Send;
}
