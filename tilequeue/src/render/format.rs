//! Output formats.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A tile encoding produced by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputFormat {
    /// GeoJSON feature collections per layer
    Json,
    /// TopoJSON topology
    TopoJson,
    /// Mapbox Vector Tile (protobuf)
    Mvt,
    /// OpenScienceMap vector tile (protobuf)
    Vtm,
}

/// Formats rendered when none are configured.
pub const DEFAULT_FORMATS: [OutputFormat; 2] = [OutputFormat::Json, OutputFormat::Mvt];

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Json,
        OutputFormat::TopoJson,
        OutputFormat::Mvt,
        OutputFormat::Vtm,
    ];

    /// Identifier used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::TopoJson => "topojson",
            Self::Mvt => "mvt",
            Self::Vtm => "vtm",
        }
    }

    /// File extension used in storage keys.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::TopoJson => "topojson",
            Self::Mvt => "mvt",
            Self::Vtm => "vtm",
        }
    }

    /// MIME type of the payload.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json | Self::TopoJson => "application/json",
            Self::Mvt => "application/x-protobuf",
            Self::Vtm => "application/x-protobuf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Unknown output format '{0}' (expected one of: json, topojson, mvt, vtm)")]
    Unknown(String),

    #[error("No output formats given")]
    Empty,
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| FormatError::Unknown(s.trim().to_string()))
    }
}

/// Parses a comma-separated format list, dropping repeats.
pub fn parse_format_list(list: &str) -> Result<Vec<OutputFormat>, FormatError> {
    let mut formats = Vec::new();
    for name in list.split(',').filter(|s| !s.trim().is_empty()) {
        let format: OutputFormat = name.parse()?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    if formats.is_empty() {
        return Err(FormatError::Empty);
    }
    Ok(formats)
}
