//! Check configuration.
//!
//! Defines the YAML-serializable configuration read by `contract-schema
//! check`, typically from `.contract-schema.yml` at the repository root.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! allowlist:
//!   - pthread_create
//!   - dlopen
//! deny_warnings: true
//! exclude:
//!   - legacy.skit
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use contract_schema_core::ValidateOptions;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Current configuration format version.
pub const CONFIG_VERSION: &str = "1.0";

/// Top-level check configuration.
///
/// Every field except `version` may be omitted.
///
/// # Examples
///
/// ```
/// use contract_schema_db::CheckConfig;
///
/// let config: CheckConfig = serde_yaml::from_str("version: \"1.0\"\nallowlist: [dlopen]\n").unwrap();
/// assert!(config.validate_options().allows("dlopen"));
/// assert!(!config.deny_warnings);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    /// Functions defined outside the checked specs.
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// Treat warnings as failures.
    #[serde(default)]
    pub deny_warnings: bool,
    /// Spec files to skip, by file name or stem.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            allowlist: Vec::new(),
            deny_warnings: false,
            exclude: Vec::new(),
        }
    }
}

impl CheckConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::DatabaseError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Returns `true` if the spec file at `path` should be skipped.
    pub fn is_excluded(&self, path: &Path) -> bool {
        matches_exclusion(&self.exclude, path)
    }

    /// Returns `true` if `function` is declared external.
    pub fn is_allowed(&self, function: &str) -> bool {
        self.allowlist.iter().any(|f| f == function)
    }

    /// Builds validation options from the allow-list.
    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions::default().with_external(self.allowlist.iter().cloned())
    }
}

/// Matches `path` against exclusion entries by file name or file stem.
pub(crate) fn matches_exclusion(exclude: &[String], path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str());
    let stem = path.file_stem().and_then(|s| s.to_str());
    exclude
        .iter()
        .any(|entry| Some(entry.as_str()) == name || Some(entry.as_str()) == stem)
}
