//! Enumerations used throughout the relay system.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

// ---------------------------------------------------------------------------
// Actor roles
// ---------------------------------------------------------------------------

/// Whether an actor is a data source or a data sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Reader,
    Writer,
}

impl ActorRole {
    /// Code returned when an operation runs before `initialize()`.
    pub fn not_initialized_code(self) -> &'static str {
        match self {
            Self::Reader => crate::error::codes::READER_NOT_INITIALIZED,
            Self::Writer => crate::error::codes::WRITER_NOT_INITIALIZED,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reader => write!(f, "reader"),
            Self::Writer => write!(f, "writer"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client types
// ---------------------------------------------------------------------------

/// Logical type of a registered backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientType {
    DataSource,
    MessageBroker,
    Cache,
    Database,
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataSource => write!(f, "data-source"),
            Self::MessageBroker => write!(f, "message-broker"),
            Self::Cache => write!(f, "cache"),
            Self::Database => write!(f, "database"),
        }
    }
}

// ---------------------------------------------------------------------------
// Candle timeframes
// ---------------------------------------------------------------------------

/// Candle interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    #[default]
    D1,
    #[serde(rename = "4d")]
    D4,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [Self::M1, Self::M5, Self::M15, Self::M30, Self::H1, Self::H4, Self::D1, Self::D4];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
            Self::D4 => "4d",
        }
    }

    pub fn duration(self) -> Duration {
        let secs = match self {
            Self::M1 => 60,
            Self::M5 => 300,
            Self::M15 => 900,
            Self::M30 => 1_800,
            Self::H1 => 3_600,
            Self::H4 => 14_400,
            Self::D1 => 86_400,
            Self::D4 => 345_600,
        };
        Duration::from_secs(secs)
    }
}

impl FromStr for Timeframe {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RelayError::Parse(format!("unknown timeframe: {s}")))
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
