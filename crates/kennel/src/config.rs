//! Application configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// What the dogs migration does with an existing `dogs` store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPolicy {
    /// Delete and recreate the store on every version bump, discarding its data
    #[default]
    Recreate,
    /// Create the store and indexes only where missing
    Preserve,
}

impl MigrationPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationPolicy::Recreate => "recreate",
            MigrationPolicy::Preserve => "preserve",
        }
    }
}

impl fmt::Display for MigrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "recreate" => Ok(MigrationPolicy::Recreate),
            "preserve" => Ok(MigrationPolicy::Preserve),
            other => Err(AppError::Config(format!("unknown migration policy {:?}", other))),
        }
    }
}

/// Database settings for the dog app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_name: String,
    pub db_version: u32,
    pub migration: MigrationPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_name: "myDB".to_string(),
            db_version: 1,
            migration: MigrationPolicy::Recreate,
        }
    }
}

impl AppConfig {
    /// Parse a JSON object; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_name.is_empty() {
            return Err(AppError::Config("db_name must not be empty".into()));
        }
        if self.db_version == 0 {
            return Err(AppError::Config("db_version must be at least 1".into()));
        }
        Ok(())
    }
}
