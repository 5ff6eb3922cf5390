//! Queue server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. There is no config file: the server runs at one location and
//! the handful of knobs below ship as environment variables.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use std::env;
use std::time::Duration;

use pila_core::ResetPolicy;

/// Queue server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP/WebSocket listen port.
    pub http_port: u16,

    /// SQLite database file path.
    pub database_path: String,

    /// Business timezone as whole hours east of UTC (Philippines: +8).
    /// Business-day arithmetic and the reset timer use this, never the
    /// host clock's zone.
    pub tz_offset_hours: i32,

    /// Local hour of day (0-23) when the daily reset fires.
    pub reset_hour: u32,

    /// Value the token counter restarts from after a reset.
    pub token_start: i64,

    /// Bounded wait for entity locks before a mutation fails with `Busy`.
    pub lock_timeout_ms: u64,

    /// What the reset does with entries still open at day end.
    pub reset_policy: ResetPolicy,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ServerConfig {
            http_port: env::var("PILA_HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PILA_HTTP_PORT".to_string()))?,

            database_path: env::var("PILA_DB_PATH").unwrap_or_else(|_| "./pila.db".to_string()),

            tz_offset_hours: env::var("PILA_TZ_OFFSET_HOURS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PILA_TZ_OFFSET_HOURS".to_string()))?,

            reset_hour: env::var("PILA_RESET_HOUR")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PILA_RESET_HOUR".to_string()))?,

            token_start: env::var("PILA_TOKEN_START")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PILA_TOKEN_START".to_string()))?,

            lock_timeout_ms: env::var("PILA_LOCK_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PILA_LOCK_TIMEOUT_MS".to_string()))?,

            reset_policy: env::var("PILA_RESET_POLICY")
                .unwrap_or_else(|_| "cancel".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PILA_RESET_POLICY".to_string()))?,
        };

        if config.reset_hour > 23 {
            return Err(ConfigError::InvalidValue("PILA_RESET_HOUR".to_string()));
        }
        if config.tz_offset_hours < -12 || config.tz_offset_hours > 14 {
            return Err(ConfigError::InvalidValue(
                "PILA_TZ_OFFSET_HOURS".to_string(),
            ));
        }

        Ok(config)
    }

    /// The configured business timezone.
    pub fn timezone(&self) -> FixedOffset {
        // Range-checked in load(); fall back to UTC rather than panic
        FixedOffset::east_opt(self.tz_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Today's business day in the configured timezone.
    pub fn business_day_now(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone()).date_naive()
    }

    /// Entity lock timeout as a Duration.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timezone_offset() {
        let config = ServerConfig {
            http_port: 8080,
            database_path: ":memory:".into(),
            tz_offset_hours: 8,
            reset_hour: 0,
            token_start: 1,
            lock_timeout_ms: 2000,
            reset_policy: ResetPolicy::Cancel,
        };
        assert_eq!(config.timezone().local_minus_utc(), 8 * 3600);
    }
}
