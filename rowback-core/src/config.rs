//! Insert engine configuration.
//!
//! Configuration is loaded from environment variables or a TOML document,
//! with defaults that match the long-standing best-effort behavior.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// KEY EXTRAPOLATION
// ============================================================================

/// What to do when a multi-row insert only reports the last generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyExtrapolation {
    /// Back-fill earlier rows by counting down from the reported key.
    /// Assumes the sequence allocated the batch contiguously.
    Contiguous,
    /// Fail with `ReconcileError::KeysUnavailable`.
    Refuse,
}

impl KeyExtrapolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyExtrapolation::Contiguous => "contiguous",
            KeyExtrapolation::Refuse => "refuse",
        }
    }
}

impl fmt::Display for KeyExtrapolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KeyExtrapolation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contiguous" => Ok(KeyExtrapolation::Contiguous),
            "refuse" => Ok(KeyExtrapolation::Refuse),
            other => Err(ConfigError::InvalidValue {
                field: "key_extrapolation".to_string(),
                value: other.to_string(),
                reason: "expected 'contiguous' or 'refuse'".to_string(),
            }),
        }
    }
}

// ============================================================================
// INSERT CONFIG
// ============================================================================

/// Knobs for statement execution and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertConfig {
    /// Ask the driver for generated values at all.
    pub return_generated_values: bool,

    /// Execute as a batch even for a single row.
    pub always_batch: bool,

    /// Treat a generated-row count mismatch as an error instead of a warning.
    pub strict_row_count: bool,

    /// Behavior when only the last generated key of a batch is reported.
    pub key_extrapolation: KeyExtrapolation,
}

impl Default for InsertConfig {
    fn default() -> Self {
        Self {
            return_generated_values: true,
            always_batch: false,
            strict_row_count: false,
            key_extrapolation: KeyExtrapolation::Contiguous,
        }
    }
}

impl InsertConfig {
    /// Create InsertConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ROWBACK_RETURN_GENERATED`: "true" or "false" (default: true)
    /// - `ROWBACK_ALWAYS_BATCH`: "true" or "false" (default: false)
    /// - `ROWBACK_STRICT_ROW_COUNT`: "true" or "false" (default: false)
    /// - `ROWBACK_KEY_EXTRAPOLATION`: "contiguous" or "refuse" (default: contiguous)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let return_generated_values = match lookup("ROWBACK_RETURN_GENERATED") {
            Some(raw) => parse_bool("return_generated_values", &raw)?,
            None => defaults.return_generated_values,
        };

        let always_batch = match lookup("ROWBACK_ALWAYS_BATCH") {
            Some(raw) => parse_bool("always_batch", &raw)?,
            None => defaults.always_batch,
        };

        let strict_row_count = match lookup("ROWBACK_STRICT_ROW_COUNT") {
            Some(raw) => parse_bool("strict_row_count", &raw)?,
            None => defaults.strict_row_count,
        };

        let key_extrapolation = match lookup("ROWBACK_KEY_EXTRAPOLATION") {
            Some(raw) => raw.parse()?,
            None => defaults.key_extrapolation,
        };

        Ok(Self {
            return_generated_values,
            always_batch,
            strict_row_count,
            key_extrapolation,
        })
    }

    /// Parse a TOML document; missing keys take their defaults.
    ///
    /// ```toml
    /// strict_row_count = true
    /// key_extrapolation = "refuse"
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
