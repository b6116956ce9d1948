//! Backend selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing a backend selector
#[derive(Debug, Clone)]
pub struct ParseBackendError(String);

impl fmt::Display for ParseBackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid backend: {}", self.0)
    }
}

impl std::error::Error for ParseBackendError {}

/// Which store serves an operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Flat-file store only
    File,
    /// Table store only
    Table,
    /// Pick by payload size on write, probe both on read/delete/clear
    #[default]
    Auto,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::File => "file",
            Backend::Table => "table",
            Backend::Auto => "auto",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "table" | "database" => Ok(Backend::Table),
            "auto" => Ok(Backend::Auto),
            _ => Err(ParseBackendError(s.to_string())),
        }
    }
}
