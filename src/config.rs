use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, YtSubError};

/// Configuration for the subtitle editor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Captions service settings
    pub captions: CaptionsConfig,

    /// Supabase project settings
    pub supabase: SupabaseConfig,

    /// Analytics settings
    pub analytics: AnalyticsConfig,

    /// Local persistence settings
    pub storage: StorageConfig,

    /// Editing and playback behaviour
    pub editor: EditorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionsConfig {
    /// Base URL of the captions API
    pub base_url: String,

    /// Optional API key sent as `x-api-key`
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Extra attempts after a transient failure
    pub max_retries: u32,

    /// Base delay between attempts in milliseconds, doubled per attempt
    pub retry_backoff_ms: u64,

    /// Language requested when none is given
    pub default_language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    /// Project URL (required)
    pub url: String,

    /// Anonymous client key (required)
    pub anon_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Measurement id; analytics stay off when unset
    pub tracking_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted store
    pub data_dir: PathBuf,

    /// Key the whole session map is stored under
    pub storage_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Idle time before a field edit is committed
    pub commit_debounce_ms: u64,

    /// Idle time before a search filter is applied
    pub search_debounce_ms: u64,

    /// Step used by time nudges
    pub nudge_step_ms: u64,

    /// Sessions older than this are removed by cleanup
    pub session_max_age_days: u32,

    /// Playback polling interval
    pub frame_interval_ms: u64,
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            api_key: None,
            timeout_seconds: 10,
            max_retries: 1,
            retry_backoff_ms: 1000,
            default_language: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".ytsub"),
            storage_key: "ytsub.subtitle".to_string(),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            commit_debounce_ms: 2000,
            search_debounce_ms: 300,
            nudge_step_ms: 100,
            session_max_age_days: 7,
            frame_interval_ms: 16,
        }
    }
}

impl EditorConfig {
    /// Maximum session age in milliseconds
    pub fn session_max_age_ms(&self) -> i64 {
        i64::from(self.session_max_age_days) * 24 * 60 * 60 * 1000
    }
}

impl Config {
    /// Load configuration from the first readable config file, then apply
    /// environment overrides. Missing files are not an error.
    pub fn load() -> Result<Self> {
        let config_paths = ["ytsub.toml", "config/ytsub.toml"];

        let mut config = None;
        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(parsed) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config = Some(parsed);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_default();
        config.apply_env();
        Ok(config)
    }

    /// Load a specific config file, then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&config_str)
            .map_err(|e| YtSubError::Config(format!("{}: {}", path.display(), e)))?;
        config.apply_env();
        Ok(config)
    }

    /// Configuration built from defaults and environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(base_url) = std::env::var("YTSUB_CAPTIONS_BASE_URL") {
            if !base_url.is_empty() {
                self.captions.base_url = base_url;
            }
        }

        if let Ok(api_key) = std::env::var("YTSUB_CAPTIONS_API_KEY") {
            self.captions.api_key = Some(api_key).filter(|key| !key.is_empty());
        }

        if let Ok(url) = std::env::var("YTSUB_SUPABASE_URL") {
            self.supabase.url = url;
        }

        if let Ok(key) = std::env::var("YTSUB_SUPABASE_ANON_KEY") {
            self.supabase.anon_key = key;
        }

        if let Ok(id) = std::env::var("YTSUB_ANALYTICS_ID") {
            self.analytics.tracking_id = Some(id).filter(|id| !id.is_empty());
        }

        if let Ok(dir) = std::env::var("YTSUB_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str =
            toml::to_string_pretty(self).map_err(|e| YtSubError::Config(e.to_string()))?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration. Every missing required value is listed in the error.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.supabase.url.trim().is_empty() {
            problems.push("- YTSUB_SUPABASE_URL: required");
        }
        if self.supabase.anon_key.trim().is_empty() {
            problems.push("- YTSUB_SUPABASE_ANON_KEY: required");
        }
        if url::Url::parse(&self.captions.base_url).is_err() {
            problems.push("- YTSUB_CAPTIONS_BASE_URL: not a valid URL");
        }
        if self.captions.timeout_seconds == 0 {
            problems.push("- captions.timeout_seconds: must be greater than 0");
        }
        if self.editor.frame_interval_ms == 0 {
            problems.push("- editor.frame_interval_ms: must be greater than 0");
        }
        if self.storage.storage_key.trim().is_empty() {
            problems.push("- storage.storage_key: required");
        }

        if !problems.is_empty() {
            return Err(YtSubError::Config(format!(
                "Environment is not configured correctly. Check the following:\n{}",
                problems.join("\n")
            )));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "ytsub Configuration:\n\
            - Captions API: {}\n\
            - API Key: {}\n\
            - Supabase: {}\n\
            - Analytics: {}\n\
            - Data Directory: {}\n\
            - Commit Debounce: {}ms",
            self.captions.base_url,
            if self.captions.api_key.is_some() { "set" } else { "not set" },
            self.supabase.url,
            self.analytics.tracking_id.as_deref().unwrap_or("disabled"),
            self.storage.data_dir.display(),
            self.editor.commit_debounce_ms
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_captions_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.captions.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.captions.api_key = Some(api_key.into());
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.config.captions.max_retries = max_retries;
        self.config.captions.retry_backoff_ms = backoff_ms;
        self
    }

    pub fn with_supabase(mut self, url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        self.config.supabase.url = url.into();
        self.config.supabase.anon_key = anon_key.into();
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.data_dir = dir;
        self
    }

    pub fn with_commit_debounce_ms(mut self, ms: u64) -> Self {
        self.config.editor.commit_debounce_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.captions.base_url, "http://localhost:4000");
        assert_eq!(config.captions.timeout_seconds, 10);
        assert_eq!(config.editor.commit_debounce_ms, 2000);
        assert_eq!(config.editor.search_debounce_ms, 300);
        assert_eq!(config.editor.session_max_age_ms(), 604_800_000);
        assert_eq!(config.storage.storage_key, "ytsub.subtitle");
    }

    #[test]
    fn test_missing_supabase_is_fatal() {
        let err = Config::default().validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("YTSUB_SUPABASE_URL"));
        assert!(message.contains("YTSUB_SUPABASE_ANON_KEY"));
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_supabase("https://demo.supabase.co", "anon")
            .with_api_key("secret")
            .with_retries(2, 0)
            .build();

        assert!(config.validate().is_ok());
        assert_eq!(config.captions.api_key.as_deref(), Some("secret"));
        assert_eq!(config.captions.max_retries, 2);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [supabase]
            url = "https://demo.supabase.co"
            anon_key = "anon"

            [editor]
            nudge_step_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.editor.nudge_step_ms, 250);
        assert_eq!(config.editor.commit_debounce_ms, 2000);
        assert_eq!(config.captions.max_retries, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ytsub.toml");
        let config = ConfigBuilder::new()
            .with_supabase("https://demo.supabase.co", "anon")
            .with_commit_debounce_ms(500)
            .build();

        config.save(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.editor.commit_debounce_ms, 500);
    }
}
