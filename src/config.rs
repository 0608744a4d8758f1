//! Configuration management for glm-mcp
//!
//! Settings come from three layers. An optional TOML file provides the base,
//! command-line flags (and their environment fallbacks) override it, and
//! built-in defaults fill whatever is left.

use crate::error::{AppError, AppResult};
use crate::glm::{CODING_BASE_URL, ClientConfig, DEFAULT_BASE_URL};
use crate::tools::{DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL, ToolSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Upstream timeout used when none is configured
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Largest accepted upstream timeout
pub const MAX_TIMEOUT_SECONDS: u64 = 600;

/// Root of the TOML configuration file
///
/// Every section and key is optional; unknown keys are rejected so typos
/// surface at startup instead of being silently ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// `[api]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Explicit API root; conflicts with `coding`
    #[serde(default)]
    pub base_url: Option<String>,
    /// Use the coding-plan endpoint
    #[serde(default)]
    pub coding: bool,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub image_model: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// `[observability]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %path_display, "Loaded configuration file");
        Ok(config)
    }

    /// Validate the file on its own, before any overrides are applied
    pub fn validate(&self) -> AppResult<()> {
        if self.api.base_url.is_some() && self.api.coding {
            return Err(AppError::Config(
                "api.base_url and api.coding are mutually exclusive".to_string(),
            ));
        }
        if let Some(url) = &self.api.base_url {
            validate_base_url(url)?;
        }
        if let Some(seconds) = self.api.timeout_seconds {
            validate_timeout(seconds)?;
        }
        validate_log_level(&self.observability.log_level)?;
        Ok(())
    }
}

impl FromStr for FileConfig {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: FileConfig =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}

/// Values supplied on the command line or through the environment
///
/// `None` / `false` means "not given", letting the file or the built-in
/// default decide.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub coding: bool,
    pub model: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved runtime configuration
#[derive(Clone)]
pub struct Config {
    api_key: String,
    base_url: String,
    timeout: Duration,
    chat_model: String,
    image_model: String,
    log_level: String,
}

impl Config {
    /// Merge overrides over the file and validate the result
    ///
    /// # Errors
    ///
    /// - [`AppError::MissingApiKey`] when no non-blank key was supplied
    /// - [`AppError::Config`] for conflicting endpoint selection, a base URL
    ///   without an http(s) scheme, an out-of-range timeout or an unknown log
    ///   level
    pub fn resolve(overrides: Overrides, file: FileConfig) -> AppResult<Self> {
        if overrides.base_url.is_some() && overrides.coding {
            return Err(AppError::Config(
                "--base-url and --coding are mutually exclusive".to_string(),
            ));
        }

        let api_key = overrides
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(AppError::MissingApiKey)?
            .to_string();

        let base_url = match (overrides.base_url, overrides.coding) {
            (Some(url), _) => url,
            (None, true) => CODING_BASE_URL.to_string(),
            (None, false) => match file.api.base_url {
                Some(url) => url,
                None if file.api.coding => CODING_BASE_URL.to_string(),
                None => DEFAULT_BASE_URL.to_string(),
            },
        };
        validate_base_url(&base_url)?;

        let timeout_seconds = file.api.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        validate_timeout(timeout_seconds)?;

        let chat_model = first_non_empty([overrides.model, file.api.default_model])
            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let image_model = first_non_empty([file.api.image_model])
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());

        let log_level =
            first_non_empty([overrides.log_level]).unwrap_or(file.observability.log_level);
        validate_log_level(&log_level)?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_seconds),
            chat_model,
            image_model,
            log_level,
        })
    }

    /// Settings for [`crate::glm::GlmClient`]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_key.clone(), &self.base_url).with_timeout(self.timeout)
    }

    /// Default models for the tools
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings::new(&self.chat_model, &self.image_model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("chat_model", &self.chat_model)
            .field("image_model", &self.image_model)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

fn validate_base_url(url: &str) -> AppResult<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AppError::Config(format!(
            "base_url must start with http:// or https://, got '{}'",
            url
        )));
    }
    Ok(())
}

fn validate_timeout(seconds: u64) -> AppResult<()> {
    if seconds == 0 {
        return Err(AppError::Config(
            "api.timeout_seconds must be greater than 0".to_string(),
        ));
    }
    if seconds > MAX_TIMEOUT_SECONDS {
        return Err(AppError::Config(format!(
            "api.timeout_seconds cannot exceed {} seconds, got {}",
            MAX_TIMEOUT_SECONDS, seconds
        )));
    }
    Ok(())
}

fn validate_log_level(level: &str) -> AppResult<()> {
    tracing::Level::from_str(level).map(|_| ()).map_err(|_| {
        AppError::Config(format!(
            "log_level must be one of trace, debug, info, warn, error; got '{}'",
            level
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
[api]
default_model = "glm-5"
image_model = "glm-image"
timeout_seconds = 90

[observability]
log_level = "debug"
"#;

    fn with_key() -> Overrides {
        Overrides {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_file_parses_to_defaults() {
        let file = FileConfig::from_str("").expect("empty config should parse");
        assert!(file.api.base_url.is_none());
        assert!(!file.api.coding);
        assert_eq!(file.observability.log_level, "info");
    }

    #[test]
    fn test_full_file_parses() {
        let file = FileConfig::from_str(FULL_CONFIG).expect("should parse config");
        assert_eq!(file.api.default_model.as_deref(), Some("glm-5"));
        assert_eq!(file.api.image_model.as_deref(), Some("glm-image"));
        assert_eq!(file.api.timeout_seconds, Some(90));
        assert_eq!(file.observability.log_level, "debug");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = FileConfig::from_str("[api]\nmodel = \"glm-5\"\n").unwrap_err();
        assert!(matches!(err, AppError::ConfigParseFailed { .. }));

        let err = FileConfig::from_str("[server]\nport = 3000\n").unwrap_err();
        assert!(matches!(err, AppError::ConfigParseFailed { .. }));
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(FileConfig::from_str("[api]\ntimeout_seconds = 0\n").is_err());
        assert!(FileConfig::from_str("[api]\ntimeout_seconds = 601\n").is_err());
        assert!(FileConfig::from_str("[api]\ntimeout_seconds = 600\n").is_ok());
        assert!(FileConfig::from_str("[api]\ntimeout_seconds = 1\n").is_ok());
    }

    #[test]
    fn test_file_base_url_requires_scheme() {
        let err = FileConfig::from_str("[api]\nbase_url = \"api.z.ai/v4\"\n").unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
    }

    #[test]
    fn test_file_base_url_and_coding_conflict() {
        let err = FileConfig::from_str("[api]\nbase_url = \"https://x.example\"\ncoding = true\n")
            .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_invalid_log_level() {
        assert!(FileConfig::from_str("[observability]\nlog_level = \"loud\"\n").is_err());
    }

    #[test]
    fn test_resolve_defaults() {
        let config = Config::resolve(with_key(), FileConfig::default()).unwrap();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert_eq!(config.chat_model(), "glm-4.7");
        assert_eq!(config.image_model(), "cogview-4-250304");
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_resolve_missing_or_blank_key() {
        let err = Config::resolve(Overrides::default(), FileConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::MissingApiKey));

        let overrides = Overrides {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        let err = Config::resolve(overrides, FileConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::MissingApiKey));
    }

    #[test]
    fn test_resolve_coding_endpoint() {
        let overrides = Overrides {
            coding: true,
            ..with_key()
        };
        let config = Config::resolve(overrides, FileConfig::default()).unwrap();
        assert_eq!(config.base_url(), CODING_BASE_URL);

        let file = FileConfig::from_str("[api]\ncoding = true\n").unwrap();
        let config = Config::resolve(with_key(), file).unwrap();
        assert_eq!(config.base_url(), CODING_BASE_URL);
    }

    #[test]
    fn test_resolve_flag_conflict() {
        let overrides = Overrides {
            coding: true,
            base_url: Some("https://proxy.example/v4".to_string()),
            ..with_key()
        };
        let err = Config::resolve(overrides, FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_flags_override_file() {
        let file = FileConfig::from_str(
            "[api]\nbase_url = \"https://file.example/v4\"\ndefault_model = \"glm-4.5\"\n\
             [observability]\nlog_level = \"warn\"\n",
        )
        .unwrap();
        let overrides = Overrides {
            base_url: Some("https://flag.example/v4/".to_string()),
            model: Some("glm-5".to_string()),
            log_level: Some("trace".to_string()),
            ..with_key()
        };

        let config = Config::resolve(overrides, file).unwrap();
        assert_eq!(config.base_url(), "https://flag.example/v4");
        assert_eq!(config.chat_model(), "glm-5");
        assert_eq!(config.log_level(), "trace");
    }

    #[test]
    fn test_coding_flag_beats_file_base_url() {
        let file = FileConfig::from_str("[api]\nbase_url = \"https://file.example/v4\"\n").unwrap();
        let overrides = Overrides {
            coding: true,
            ..with_key()
        };
        let config = Config::resolve(overrides, file).unwrap();
        assert_eq!(config.base_url(), CODING_BASE_URL);
    }

    #[test]
    fn test_file_values_apply_without_flags() {
        let file = FileConfig::from_str(FULL_CONFIG).unwrap();
        let config = Config::resolve(with_key(), file).unwrap();

        assert_eq!(config.chat_model(), "glm-5");
        assert_eq!(config.image_model(), "glm-image");
        assert_eq!(config.timeout(), Duration::from_secs(90));
        assert_eq!(config.log_level(), "debug");

        let settings = config.tool_settings();
        assert_eq!(settings.chat_model(), "glm-5");
        assert_eq!(settings.image_model(), "glm-image");
    }

    #[test]
    fn test_resolve_rejects_schemeless_flag_url() {
        let overrides = Overrides {
            base_url: Some("ftp://example.com".to_string()),
            ..with_key()
        };
        assert!(Config::resolve(overrides, FileConfig::default()).is_err());
    }

    #[test]
    fn test_client_config_carries_key_url_and_timeout() {
        let file = FileConfig::from_str("[api]\ntimeout_seconds = 30\n").unwrap();
        let config = Config::resolve(with_key(), file).unwrap();
        let client = config.client_config();

        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config::resolve(with_key(), FileConfig::default()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-test"));
        assert!(rendered.contains("<redacted>"));
    }
}
