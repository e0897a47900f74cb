use crate::output::DEFAULT_OUTPUT_PATH;
use crate::source::CsvSource;
use crate::uptime::observation::parse_utc_timestamp;
use crate::uptime::{DEFAULT_LOOKBACK_DAYS, DEFAULT_TIMEZONE, EngineParams, default_workers};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_REFERENCE_TIME: &str = "2023-01-25 19:00:00";
pub const DEFAULT_STATUS_PATH: &str = "cache/store_status.csv";
pub const DEFAULT_BUSINESS_HOURS_PATH: &str = "cache/menu_hours.csv";
pub const DEFAULT_TIMEZONES_PATH: &str = "cache/store_timezones.csv";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub data: Option<DataSection>,
    #[serde(default)]
    pub report: Option<ReportSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

/// CSV extracts of the store status, business hours and timezone tables.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DataSection {
    pub store_status_path: Option<PathBuf>,
    pub business_hours_path: Option<PathBuf>,
    pub timezones_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReportSection {
    pub output_path: Option<PathBuf>,
    /// UTC instant the trailing windows end at, e.g. "2023-01-25 19:00:00"
    pub reference_time: Option<String>,
    /// IANA zone for stores without a timezone row (default: America/Chicago)
    pub default_timezone: Option<String>,
    /// Days to step back looking for data before reporting zeros (default: 6)
    pub lookback_days: Option<u32>,
    /// Worker threads for per-store computation (default: available cores)
    pub workers: Option<NonZeroUsize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),
    #[error("invalid reference time: {0}")]
    InvalidReferenceTime(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the configured max log level, or INFO if unset or unrecognised.
    pub fn log_level(&self) -> tracing::Level {
        self.logging.level.trim().parse().unwrap_or(tracing::Level::INFO)
    }

    pub fn csv_source(&self) -> CsvSource {
        let data = self.data.clone().unwrap_or_default();
        CsvSource::new(
            data.store_status_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATUS_PATH)),
            data.business_hours_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BUSINESS_HOURS_PATH)),
            data.timezones_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TIMEZONES_PATH)),
        )
    }

    pub fn output_path(&self) -> PathBuf {
        self.report
            .as_ref()
            .and_then(|r| r.output_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH))
    }

    /// Returns the reference instant (default: 2023-01-25 19:00:00 UTC)
    pub fn reference_time(&self) -> Result<DateTime<Utc>, ConfigError> {
        let raw = self
            .report
            .as_ref()
            .and_then(|r| r.reference_time.as_deref())
            .unwrap_or(DEFAULT_REFERENCE_TIME);
        parse_utc_timestamp(raw).map_err(|_| ConfigError::InvalidReferenceTime(raw.to_string()))
    }

    pub fn engine_params(&self) -> Result<EngineParams, ConfigError> {
        let report = self.report.clone().unwrap_or_default();
        let default_timezone = match report.default_timezone {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name.clone()))?,
            None => DEFAULT_TIMEZONE,
        };
        Ok(EngineParams {
            default_timezone,
            lookback_days: report.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            workers: report.workers.unwrap_or_else(default_workers),
            ..EngineParams::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_temp_config(label: &str, contents: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("store-uptime-{label}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    const MINIMAL: &str = r#"
[app]
name = "store-uptime"

[logging]
level = "info"
"#;

    #[test]
    fn default_config_is_complete() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;

        assert!(config.report.is_some());
        assert!(config.data.is_some());
        let params = config.engine_params()?;
        assert_eq!(params.lookback_days, DEFAULT_LOOKBACK_DAYS);
        Ok(())
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp_config("minimal", MINIMAL)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(config.output_path(), PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert_eq!(
            config.csv_source().status_path,
            PathBuf::from(DEFAULT_STATUS_PATH)
        );
        assert_eq!(
            config.reference_time()?,
            Utc.with_ymd_and_hms(2023, 1, 25, 19, 0, 0).single().ok_or("bad time")?
        );
        let params = config.engine_params()?;
        assert_eq!(params.default_timezone, chrono_tz::America::Chicago);
        assert_eq!(params.lookback_days, 6);
        Ok(())
    }

    #[test]
    fn report_section_overrides_engine_params() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}\n[report]\nreference_time = \"2023-01-24 09:30:00.5 UTC\"\n\
             default_timezone = \"Asia/Beirut\"\nlookback_days = 3\nworkers = 2\n"
        );
        let path = write_temp_config("report", &contents)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        let params = config.engine_params()?;
        assert_eq!(params.default_timezone, chrono_tz::Asia::Beirut);
        assert_eq!(params.lookback_days, 3);
        assert_eq!(params.workers.get(), 2);
        assert_eq!(config.reference_time()?.timestamp_subsec_millis(), 500);
        Ok(())
    }

    #[test]
    fn unknown_default_timezone_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!("{MINIMAL}\n[report]\ndefault_timezone = \"Nowhere/Land\"\n");
        let path = write_temp_config("bad-zone", &contents)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert!(matches!(
            config.engine_params(),
            Err(ConfigError::InvalidTimezone(_))
        ));
        Ok(())
    }

    #[test]
    fn malformed_reference_time_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!("{MINIMAL}\n[report]\nreference_time = \"yesterday\"\n");
        let path = write_temp_config("bad-reference", &contents)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert!(matches!(
            config.reference_time(),
            Err(ConfigError::InvalidReferenceTime(_))
        ));
        Ok(())
    }

    #[test]
    fn unrecognised_log_level_defaults_to_info() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp_config("log-level", &MINIMAL.replace("info", "chatty"))?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.log_level(), tracing::Level::INFO);
        Ok(())
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("store-uptime-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp_config("invalid", "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
