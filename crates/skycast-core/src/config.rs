use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

use crate::error::ConfigError;

/// Environment variable read for the default API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Prefix for layered overrides, e.g. `SKYCAST__WEATHER__DEFAULT_UNIT=imperial`.
const ENV_PREFIX: &str = "SKYCAST";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Measurement unit. The serialized form is the provider's `units=` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Imperial,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Unit::Metric => Unit::Imperial,
            Unit::Imperial => Unit::Metric,
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Unit::Metric => "°C",
            Unit::Imperial => "°F",
        }
    }

    pub fn wind_speed_symbol(&self) -> &'static str {
        match self {
            Unit::Metric => "m/s",
            Unit::Imperial => "mph",
        }
    }

    pub fn distance_symbol(&self) -> &'static str {
        match self {
            Unit::Metric => "km",
            Unit::Imperial => "mi",
        }
    }

    /// Convert a visibility reported in metres into this unit's distance.
    pub fn visibility_from_meters(&self, meters: f64) -> f64 {
        match self {
            Unit::Metric => meters / 1000.0,
            Unit::Imperial => meters / 1609.34,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Unit::Metric),
            "imperial" => Ok(Unit::Imperial),
            other => Err(ConfigError::Invalid(format!("unknown unit '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (also holds preferences.json)
    pub config_dir: PathBuf,

    /// Weather provider settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Device position settings
    #[serde(default)]
    pub geolocation: GeolocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeather API key
    #[serde(default)]
    pub api_key: String,

    /// Base URL for /weather, /forecast and /air_pollution
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL for /reverse
    #[serde(default = "default_geo_base_url")]
    pub geo_base_url: String,

    /// Unit used until the user toggles one
    #[serde(default)]
    pub default_unit: Unit,

    /// Query used when the device position cannot be resolved
    #[serde(default = "default_fallback_location")]
    pub fallback_location: String,

    /// Per-request timeout. Unset means no timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_api_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_geo_base_url() -> String {
    "https://api.openweathermap.org/geo/1.0".to_string()
}

fn default_fallback_location() -> String {
    "Pune".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: default_api_base_url(),
            geo_base_url: default_geo_base_url(),
            default_unit: Unit::Metric,
            fallback_location: default_fallback_location(),
            request_timeout_secs: None,
        }
    }
}

/// Where the device position comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationProvider {
    /// Approximate position from an IP lookup service
    #[default]
    Ip,
    /// Coordinates from `latitude`/`longitude`
    Fixed,
    /// Geolocation unsupported; always falls back
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default)]
    pub provider: GeolocationProvider,

    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    /// Position acquisition timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum age of a reused position (0 = always fresh)
    #[serde(default)]
    pub maximum_age_ms: u64,

    #[serde(default = "default_high_accuracy")]
    pub high_accuracy: bool,
}

fn default_ip_lookup_url() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_high_accuracy() -> bool {
    true
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            provider: GeolocationProvider::Ip,
            ip_lookup_url: default_ip_lookup_url(),
            latitude: None,
            longitude: None,
            timeout_ms: default_timeout_ms(),
            maximum_age_ms: 0,
            high_accuracy: default_high_accuracy(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            weather: WeatherConfig::default(),
            geolocation: GeolocationConfig::default(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skycast")
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, layering `SKYCAST__*` environment overrides.
    ///
    /// A non-empty `OPENWEATHER_API_KEY` takes precedence over the file and is
    /// never written to disk.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with_env_key(path, std::env::var(API_KEY_ENV).ok())
    }

    fn load_with_env_key(path: &Path, env_key: Option<String>) -> Result<Self> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
        }

        let layered = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to read config file")?;

        let mut config: Config = layered
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;

        if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
            config.weather.api_key = key;
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.api_base_url, "weather.api_base_url", &mut result);
        self.validate_url(&self.weather.geo_base_url, "weather.geo_base_url", &mut result);

        if self.weather.api_key.trim().is_empty() {
            result.add_warning(
                "weather.api_key",
                format!("No API key configured (set {} or weather.api_key)", API_KEY_ENV),
            );
        }

        if self.weather.fallback_location.trim().is_empty() {
            result.add_error("weather.fallback_location", "Fallback location must not be empty");
        }

        if self.weather.request_timeout_secs == Some(0) {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0 (omit it to disable)",
            );
        }

        let geo = &self.geolocation;
        match geo.provider {
            GeolocationProvider::Ip => {
                self.validate_url(&geo.ip_lookup_url, "geolocation.ip_lookup_url", &mut result);
            }
            GeolocationProvider::Fixed => match (geo.latitude, geo.longitude) {
                (Some(lat), Some(lon)) => {
                    if !(-90.0..=90.0).contains(&lat) {
                        result.add_error("geolocation.latitude", "Latitude must be within [-90, 90]");
                    }
                    if !(-180.0..=180.0).contains(&lon) {
                        result.add_error(
                            "geolocation.longitude",
                            "Longitude must be within [-180, 180]",
                        );
                    }
                }
                _ => result.add_error(
                    "geolocation",
                    "Fixed provider requires both latitude and longitude",
                ),
            },
            GeolocationProvider::Disabled => {}
        }

        if geo.timeout_ms == 0 {
            result.add_error("geolocation.timeout_ms", "Timeout must be greater than 0");
        } else if geo.timeout_ms > 60_000 {
            result.add_warning("geolocation.timeout_ms", "Timeout is longer than a minute");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `path`
    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        tracing::info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::MissingSetting("config directory".into()))
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.weather.api_base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.api_base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.geo_base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_missing_api_key_is_warning() {
        let mut config = Config::default();
        config.weather.api_key = String::new();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.api_key"));
    }

    #[test]
    fn test_empty_fallback_location() {
        let mut config = Config::default();
        config.weather.fallback_location = "  ".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.fallback_location"));
    }

    #[test]
    fn test_fixed_provider_requires_coordinates() {
        let mut config = Config::default();
        config.geolocation.provider = GeolocationProvider::Fixed;
        assert!(!config.validate().is_valid());

        config.geolocation.latitude = Some(18.52);
        config.geolocation.longitude = Some(73.86);
        assert!(config.validate().is_valid());

        config.geolocation.latitude = Some(123.0);
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "geolocation.latitude"));
    }

    #[test]
    fn test_zero_geolocation_timeout() {
        let mut config = Config::default();
        config.geolocation.timeout_ms = 0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "geolocation.timeout_ms"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }

    #[test]
    fn test_unit_parse_and_toggle() {
        assert_eq!("imperial".parse::<Unit>().unwrap(), Unit::Imperial);
        assert_eq!(" Metric ".parse::<Unit>().unwrap(), Unit::Metric);
        assert!("kelvin".parse::<Unit>().is_err());
        assert_eq!(Unit::Metric.toggled(), Unit::Imperial);
        assert_eq!(Unit::Imperial.toggled(), Unit::Metric);
        assert_eq!(Unit::Imperial.to_string(), "imperial");
    }

    #[test]
    fn test_unit_display_symbols() {
        assert_eq!(Unit::Metric.temperature_symbol(), "°C");
        assert_eq!(Unit::Imperial.wind_speed_symbol(), "mph");
        assert!((Unit::Metric.visibility_from_meters(10_000.0) - 10.0).abs() < f64::EPSILON);
        assert!((Unit::Imperial.visibility_from_meters(1609.34) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_with_env_key(&path, None).unwrap();

        assert!(path.exists());
        assert_eq!(config.config_dir, dir.path());
        assert_eq!(config.weather.fallback_location, "Pune");
    }

    #[test]
    fn test_load_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let contents = format!(
            "config_dir = {:?}\n\n[weather]\napi_key = \"abc\"\ndefault_unit = \"imperial\"\nfallback_location = \"Oslo\"\n\n[geolocation]\nprovider = \"disabled\"\n",
            dir.path().display().to_string()
        );
        std::fs::write(&path, contents).unwrap();

        let config = Config::load_with_env_key(&path, None).unwrap();

        assert_eq!(config.weather.api_key, "abc");
        assert_eq!(config.weather.default_unit, Unit::Imperial);
        assert_eq!(config.weather.fallback_location, "Oslo");
        assert_eq!(config.geolocation.provider, GeolocationProvider::Disabled);
        assert_eq!(config.geolocation.timeout_ms, 5000);
    }

    #[test]
    fn test_env_api_key_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_with_env_key(&path, Some("OLD_KEY".into())).unwrap();
        assert_eq!(config.weather.api_key, "OLD_KEY");

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("OLD_KEY"));
    }

    #[test]
    fn test_env_api_key_rotation_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        Config::load_with_env_key(&path, Some("OLD_KEY".into())).unwrap();
        let config = Config::load_with_env_key(&path, Some("NEW_KEY".into())).unwrap();
        assert_eq!(config.weather.api_key, "NEW_KEY");

        let contents = format!(
            "config_dir = {:?}\n\n[weather]\napi_key = \"file_key\"\n",
            dir.path().display().to_string()
        );
        std::fs::write(&path, contents).unwrap();
        let config = Config::load_with_env_key(&path, Some("NEW_KEY".into())).unwrap();
        assert_eq!(config.weather.api_key, "NEW_KEY");

        let config = Config::load_with_env_key(&path, Some("  ".into())).unwrap();
        assert_eq!(config.weather.api_key, "file_key");
    }
}
