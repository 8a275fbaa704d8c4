//! Null value handling for data loading

use serde::{Serialize, Deserialize};

/// Null value configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    /// Patterns to treat as null
    pub patterns: Vec<String>,

    /// Whether to trim whitespace before checking, and from kept values
    pub trim_whitespace: bool,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                String::new(),
                "-".to_string(),
                "N/A".to_string(),
                "null".to_string(),
                "NULL".to_string(),
            ],
            trim_whitespace: true,
            case_sensitive: false,
        }
    }
}

impl NullConfig {
    /// Only the empty cell counts as null
    pub fn empty_only() -> Self {
        Self {
            patterns: vec![String::new()],
            ..Self::default()
        }
    }

    /// Check if a value should be treated as null
    pub fn is_null(&self, value: &str) -> bool {
        let test_value = if self.trim_whitespace { value.trim() } else { value };

        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                test_value == pattern
            } else {
                test_value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    /// The text a cell contributes as a field value, `None` for nulls
    pub fn normalize<'a>(&self, value: &'a str) -> Option<&'a str> {
        if self.is_null(value) {
            None
        } else if self.trim_whitespace {
            Some(value.trim())
        } else {
            Some(value)
        }
    }

    /// Add a null pattern
    pub fn add_pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    /// Remove a null pattern
    pub fn remove_pattern(&mut self, pattern: &str) {
        self.patterns.retain(|p| p != pattern);
    }
}
