//! Load configuration for data sources

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};

use super::null_handling::NullConfig;
use crate::DataError;

/// Source file type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Csv,
    Sqlite,
}

impl FileType {
    /// Guess the file type from the extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("db" | "sqlite" | "sqlite3") => FileType::Sqlite,
            _ => FileType::Csv,
        }
    }
}

/// Configuration for loading one source into a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Path to the file
    pub path: PathBuf,

    /// File type
    pub file_type: FileType,

    /// Table to read for SQLite sources
    #[serde(default)]
    pub table: Option<String>,

    /// Whether the first CSV row holds field names
    #[serde(default = "default_true")]
    pub has_headers: bool,

    /// CSV field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Fields to load; empty loads every field
    #[serde(default)]
    pub selected_fields: Vec<String>,

    /// Null handling configuration
    #[serde(default)]
    pub null_config: NullConfig,
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

impl LoadConfig {
    /// Create a configuration, guessing the file type from the extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_type = FileType::from_path(&path);
        Self {
            path,
            file_type,
            table: None,
            has_headers: true,
            delimiter: default_delimiter(),
            selected_fields: Vec::new(),
            null_config: NullConfig::default(),
        }
    }

    pub fn csv(path: impl Into<PathBuf>) -> Self {
        Self {
            file_type: FileType::Csv,
            ..Self::new(path)
        }
    }

    pub fn sqlite(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            file_type: FileType::Sqlite,
            table: Some(table.into()),
            ..Self::new(path)
        }
    }

    /// Read a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, DataError> {
        let text = fs::read_to_string(path)?;
        let config: LoadConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as pretty JSON
    pub fn to_json_file(&self, path: &Path) -> Result<(), DataError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Get the file name
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }

    /// Whether `field` is part of the load
    pub fn includes_field(&self, field: &str) -> bool {
        self.selected_fields.is_empty() || self.selected_fields.iter().any(|f| f == field)
    }

    /// Delimiter as the single byte the CSV reader expects
    pub fn delimiter_byte(&self) -> Result<u8, DataError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(|b| b.is_ascii())
            .ok_or_else(|| DataError::Config(format!("delimiter '{}' is not a single ASCII character", self.delimiter)))
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.file_type == FileType::Sqlite && self.table.as_deref().map_or(true, str::is_empty) {
            return Err(DataError::Config(format!(
                "SQLite source '{}' needs a table name",
                self.file_name()
            )));
        }
        self.delimiter_byte()?;
        Ok(())
    }
}
