//! Journal configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Variable               | Default        |
//! |------------------------|----------------|
//! | `LISTEN_ADDR`          | `0.0.0.0:3000` |
//! | `JOURNAL_PREWARM_DAYS` | `30`           |
//! | `JOURNAL_UTC_OFFSET`   | host offset    |
//! | `EVENT_BUS_CAPACITY`   | `10000`        |
//! | `LOG_FORMAT`           | `text`         |

use std::net::SocketAddr;
use std::str::FromStr;

use chrono::{FixedOffset, Local, Offset};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Errors raised while reading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` is not a socket address.
    #[error("invalid LISTEN_ADDR {value:?}: {source}")]
    ListenAddr {
        /// Offending value.
        value: String,
        /// Parse failure.
        source: std::net::AddrParseError,
    },

    /// `JOURNAL_UTC_OFFSET` is not a `±HH:MM` offset.
    #[error("invalid JOURNAL_UTC_OFFSET {0:?}: expected ±HH:MM")]
    UtcOffset(String),
}

/// Top-level journal configuration.
///
/// Loaded once at startup via [`JournalConfig::from_env`].
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Days (ending today) whose buckets are created at startup.
    pub prewarm_days: u32,

    /// Timezone used for day boundaries.
    pub utc_offset: FixedOffset,

    /// Capacity of the store-level EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Tracing output format.
    pub log_format: LogFormat,
}

impl JournalConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `LISTEN_ADDR` or `JOURNAL_UTC_OFFSET`
    /// is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let raw_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let listen_addr = raw_addr
            .parse()
            .map_err(|source| ConfigError::ListenAddr {
                value: raw_addr.clone(),
                source,
            })?;

        let utc_offset = match std::env::var("JOURNAL_UTC_OFFSET") {
            Ok(raw) => parse_utc_offset(&raw).ok_or(ConfigError::UtcOffset(raw))?,
            Err(_) => Local::now().offset().fix(),
        };

        Ok(Self {
            listen_addr,
            prewarm_days: parse_env("JOURNAL_PREWARM_DAYS", 30),
            utc_offset,
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", 10_000),
            log_format: parse_env("LOG_FORMAT", LogFormat::Text),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses `Z`, `+HH:MM`, `-HH:MM`, `+HHMM` or `+HH`.
#[must_use]
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.strip_prefix('+') {
        Some(rest) => (1, rest),
        None => (-1, raw.strip_prefix('-')?),
    };
    let (hh, mm) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 => (rest.get(..2)?, rest.get(2..)?),
        None => (rest, "00"),
    };
    if hh.len() != 2 || mm.len() != 2 {
        return None;
    }
    let hours: i32 = hh.parse().ok()?;
    let minutes: i32 = mm.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3_600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_parse_in_common_shapes() {
        assert_eq!(parse_utc_offset("+02:00"), FixedOffset::east_opt(7_200));
        assert_eq!(parse_utc_offset("-0530"), FixedOffset::west_opt(19_800));
        assert_eq!(parse_utc_offset("+09"), FixedOffset::east_opt(32_400));
        assert_eq!(parse_utc_offset("Z"), FixedOffset::east_opt(0));
    }

    #[test]
    fn bad_offsets_are_rejected() {
        assert_eq!(parse_utc_offset("02:00"), None);
        assert_eq!(parse_utc_offset("+25:00"), None);
        assert_eq!(parse_utc_offset("+2:0"), None);
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
