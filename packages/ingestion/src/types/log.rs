//! Harvest log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Severity of a harvest log entry.
///
/// Unknown levels on the wire degrade to [`LogLevel::Info`] during
/// extraction; the validator raises a warning for them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warning,
    #[default]
    Info,
}

impl LogLevel {
    /// Parse a wire-format level string. Case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized log entry reported by a harvest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestLog {
    #[serde(default)]
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-form structured context carried alongside the message
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl HarvestLog {
    /// Placeholder used when a log entry arrives without a message.
    pub const DEFAULT_MESSAGE: &'static str = "(no message provided)";

    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            url: None,
            details: Map::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse(" WARNING "), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("Info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("debug"), None);
        assert_eq!(LogLevel::parse(""), None);
    }

    #[test]
    fn default_level_is_info() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn builders_attach_context() {
        let log = HarvestLog::new(LogLevel::Warning, "slow response")
            .with_url("https://example.org/archives")
            .with_detail("elapsed_ms", Value::from(2450));

        assert_eq!(log.url.as_deref(), Some("https://example.org/archives"));
        assert_eq!(log.details["elapsed_ms"], Value::from(2450));
    }

    #[test]
    fn serializes_level_lowercase() {
        let log = HarvestLog::new(LogLevel::Error, "fetch failed");
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["level"], "error");
        // empty optional context stays off the wire
        assert!(value.get("url").is_none());
        assert!(value.get("details").is_none());
    }
}
