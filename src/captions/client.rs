use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::youtube::require_video_id;
use super::CaptionData;
use crate::config::CaptionsConfig;
use crate::error::{Result, YtSubError};

/// Error body returned by the captions service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// Client for the captions service (`GET /api/subtitle?v=..&lang=..`)
#[derive(Debug, Clone)]
pub struct CaptionClient {
    config: CaptionsConfig,
    client: reqwest::Client,
    endpoint: Url,
}

impl CaptionClient {
    pub fn new(config: CaptionsConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.base_url)
            .and_then(|base| base.join("/api/subtitle"))
            .map_err(|e| YtSubError::Config(format!("Invalid captions base URL {}: {}", config.base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client, endpoint })
    }

    /// Fetch captions for a video id or URL.
    ///
    /// Unrecognised input is rejected before any request is made. Transient
    /// failures are retried up to `max_retries` times with doubling backoff.
    pub async fn fetch_captions(&self, url_or_id: &str, language: Option<&str>) -> Result<CaptionData> {
        let video_id = require_video_id(url_or_id)?;
        let language = language.or(self.config.default_language.as_deref());

        let mut attempt = 0;
        loop {
            match self.fetch_once(&video_id, language).await {
                Ok(data) => {
                    info!("✅ Fetched {} cues for {}", data.subtitles.len(), video_id);
                    return Ok(data);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(self.config.retry_backoff_ms * 2_u64.pow(attempt));
                    attempt += 1;
                    warn!("Caption fetch attempt {} for {} failed ({}), retrying in {:?}", attempt, video_id, e, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn request_url(&self, video_id: &str, language: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("v", video_id);
            if let Some(lang) = language {
                query.append_pair("lang", lang);
            }
        }
        url
    }

    async fn fetch_once(&self, video_id: &str, language: Option<&str>) -> Result<CaptionData> {
        let url = self.request_url(video_id, language);
        debug!("Requesting captions from {}", url);

        let mut request = self.client.get(url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request.send().await.map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.detail);
            return Err(YtSubError::Upstream { status, detail });
        }

        let data: CaptionData = response.json().await.map_err(|e| self.map_transport_error(e))?;
        Ok(data)
    }

    fn map_transport_error(&self, error: reqwest::Error) -> YtSubError {
        if error.is_timeout() {
            YtSubError::Timeout(self.config.timeout_seconds)
        } else if error.is_decode() {
            YtSubError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                detail: Some(format!("Malformed captions response: {}", error)),
            }
        } else {
            YtSubError::Network(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url() {
        let client = CaptionClient::new(CaptionsConfig::default()).unwrap();
        assert_eq!(
            client.request_url("dQw4w9WgXcQ", Some("ko")).as_str(),
            "http://localhost:4000/api/subtitle?v=dQw4w9WgXcQ&lang=ko"
        );
        assert_eq!(
            client.request_url("dQw4w9WgXcQ", None).as_str(),
            "http://localhost:4000/api/subtitle?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let config = CaptionsConfig {
            base_url: "not a url".to_string(),
            ..CaptionsConfig::default()
        };
        assert!(matches!(CaptionClient::new(config), Err(YtSubError::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_id_rejected_before_request() {
        let config = CaptionsConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            max_retries: 0,
            ..CaptionsConfig::default()
        };
        let client = CaptionClient::new(config).unwrap();
        let result = client.fetch_captions("https://example.com/video", None).await;
        assert!(matches!(result, Err(YtSubError::InvalidVideoId(_))));
    }
}
