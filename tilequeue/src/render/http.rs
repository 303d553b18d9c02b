//! Renderer backed by an upstream HTTP tile server.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, trace, warn};

use super::{OutputFormat, RenderError, Renderer, DEFAULT_FORMATS};
use crate::config::Credentials;
use crate::coord::TileCoord;

/// Default upstream URL template.
pub const DEFAULT_URL_TEMPLATE: &str = "http://localhost:8080/{layer}/{z}/{x}/{y}.{ext}";

/// Renderer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Upstream URL with `{layer}`, `{z}`, `{x}`, `{y}` and `{ext}` placeholders
    pub url_template: String,
    /// Layer name substituted into the template
    pub layer: String,
    /// Formats each job is rendered in
    pub formats: Vec<OutputFormat>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            layer: "all".to_string(),
            formats: DEFAULT_FORMATS.to_vec(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Fetches rendered tiles from an upstream tile server.
#[derive(Clone)]
pub struct HttpRenderer {
    client: reqwest::Client,
    url_template: String,
    layer: String,
    credentials: Option<Credentials>,
}

impl HttpRenderer {
    pub fn new(config: &RenderConfig, credentials: Option<Credentials>) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RenderError::permanent(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url_template: config.url_template.clone(),
            layer: config.layer.clone(),
            credentials,
        })
    }

    /// Upstream URL for a tile in a format.
    pub fn url_for(&self, tile: TileCoord, format: OutputFormat) -> String {
        self.url_template
            .replace("{layer}", &self.layer)
            .replace("{z}", &tile.zoom().to_string())
            .replace("{x}", &tile.col().to_string())
            .replace("{y}", &tile.row().to_string())
            .replace("{ext}", format.extension())
    }
}

/// Server errors and throttling may clear up; other failures will not.
fn status_error(status: StatusCode, url: &str) -> RenderError {
    let message = format!("HTTP {} from {}", status, url);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RenderError::retryable(message)
    } else {
        RenderError::permanent(message)
    }
}

impl Renderer for HttpRenderer {
    async fn render(&self, tile: TileCoord, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
        let url = self.url_for(tile, format);
        trace!(url = %url, "Render request starting");

        let mut request = self.client.get(&url);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(
                &credentials.access_key_id,
                Some(&credentials.secret_access_key),
            );
        }

        let response = request.send().await.map_err(|e| {
            warn!(
                url = %url,
                error = %e,
                is_timeout = e.is_timeout(),
                is_connect = e.is_connect(),
                "Render request failed"
            );
            RenderError::retryable(format!("Request failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(status_error(response.status(), &url));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RenderError::retryable(format!("Failed to read response: {}", e)))?;
        debug!(tile = %tile, format = %format, bytes = body.len(), "Tile rendered");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_template_substitution() {
        let config = RenderConfig {
            url_template: "https://tiles.example.com/{layer}/{z}/{x}/{y}.{ext}".to_string(),
            layer: "buildings".to_string(),
            ..RenderConfig::default()
        };
        let renderer = HttpRenderer::new(&config, None).unwrap();
        let tile = TileCoord::new(10, 163, 395).unwrap();
        assert_eq!(
            renderer.url_for(tile, OutputFormat::Mvt),
            "https://tiles.example.com/buildings/10/163/395.mvt"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "u").is_retryable);
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "u").is_retryable);
        assert!(!status_error(StatusCode::NOT_FOUND, "u").is_retryable);
        assert!(!status_error(StatusCode::BAD_REQUEST, "u").is_retryable);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_retryable() {
        let config = RenderConfig {
            url_template: "http://127.0.0.1:9/{z}/{x}/{y}.{ext}".to_string(),
            timeout: Duration::from_secs(2),
            ..RenderConfig::default()
        };
        let renderer = HttpRenderer::new(&config, None).unwrap();
        let err = renderer
            .render(TileCoord::ROOT, OutputFormat::Json)
            .await
            .unwrap_err();
        assert!(err.is_retryable);
    }
}
