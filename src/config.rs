use std::env;
use std::path::PathBuf;

use crate::models::WaterYearStart;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Var(#[from] env::VarError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub server_host: String,
    pub server_port: u16,
    pub water_year_start: WaterYearStart,
    pub extrema_padding_hours: i64,
    pub display_decimals: usize,
    pub significant_figures: Option<u32>,
    pub missing_text: String,
}

/// Longest padding fetched around an extrema report: one year.
pub const MAX_EXTREMA_PADDING_HOURS: i64 = 8760;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let water_year_start_month = env::var("WATER_YEAR_START_MONTH")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .map_err(|e| ConfigError::Invalid(format!("WATER_YEAR_START_MONTH: {e}")))?;

        Ok(Config {
            data_dir: PathBuf::from(env::var("DATA_DIR")?),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            water_year_start: WaterYearStart::new(water_year_start_month)?,
            extrema_padding_hours: parse_padding_hours(
                &env::var("EXTREMA_PADDING_HOURS").unwrap_or_else(|_| "12".to_string()),
            )?,
            display_decimals: env::var("DISPLAY_DECIMALS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            significant_figures: env::var("SIGNIFICANT_FIGURES")
                .ok()
                .and_then(|v| v.parse().ok()),
            missing_text: env::var("MISSING_TEXT").unwrap_or_else(|_| "***".to_string()),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Parse `EXTREMA_PADDING_HOURS`. Unparseable text falls back to 12; values
/// outside `0..=MAX_EXTREMA_PADDING_HOURS` are rejected.
pub fn parse_padding_hours(text: &str) -> Result<i64, ConfigError> {
    let hours = text.trim().parse().unwrap_or(12);
    if (0..=MAX_EXTREMA_PADDING_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(ConfigError::Invalid(format!(
            "EXTREMA_PADDING_HOURS must be 0-{MAX_EXTREMA_PADDING_HOURS}, got {hours}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_addr() {
        let config = Config {
            data_dir: PathBuf::from("data"),
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            water_year_start: WaterYearStart::default(),
            extrema_padding_hours: 12,
            display_decimals: 2,
            significant_figures: None,
            missing_text: "***".to_string(),
        };
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_parse_padding_hours() {
        assert_eq!(parse_padding_hours("12").unwrap(), 12);
        assert_eq!(parse_padding_hours(" 0 ").unwrap(), 0);
        assert_eq!(parse_padding_hours("8760").unwrap(), MAX_EXTREMA_PADDING_HOURS);
        assert_eq!(parse_padding_hours("soon").unwrap(), 12);
        assert!(matches!(
            parse_padding_hours("8761"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_padding_hours("3000000000"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_padding_hours("-1"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
