//! Generation manifest.
//!
//! The manifest records, per library, what was generated from which source
//! so `build` can skip libraries whose source has not changed. A library is
//! regenerated when any of the following holds:
//!
//! - **New**: the manifest has no entry for it.
//! - **Checksum**: the SHA-256 digest of its source document changed.
//! - **Tool**: the manifest was written by a different tool version.
//!
//! # Examples
//!
//! ```no_run
//! use contract_schema_db::{LibraryEntry, Manifest, checksum_bytes};
//!
//! let mut manifest = Manifest::new("0.1.0".into());
//! manifest.update_entry("posix".into(), LibraryEntry {
//!     source: "posix.skit".into(),
//!     checksum: checksum_bytes(&std::fs::read("cfg/posix.skit").unwrap()),
//!     output: "posix.cfg".into(),
//!     functions: 120,
//!     resources: 6,
//!     generated_at: "2026-01-15T10:30:00Z".into(),
//! });
//!
//! manifest.save("manifest.json").unwrap();
//! let loaded = Manifest::load("manifest.json").unwrap();
//! assert!(loaded.contains("posix"));
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DatabaseError, Result};

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// What was generated for one library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Source document file name.
    pub source: String,
    /// SHA-256 hex digest of the source document.
    pub checksum: String,
    /// Generated file name relative to the output directory.
    pub output: String,
    pub functions: usize,
    pub resources: usize,
    /// RFC 3339 timestamp of generation.
    pub generated_at: String,
}

/// Top-level manifest, persisted as pretty-printed JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Spec document format version (mirrors
    /// [`contract_schema_core::SPEC_FORMAT_VERSION`]).
    pub format_version: String,
    /// Manifest format version.
    pub version: String,
    /// Version of the tool that generated the outputs.
    pub tool_version: String,
    /// RFC 3339 timestamp of the last update.
    pub updated_at: String,
    /// Entries keyed by library name.
    pub libraries: BTreeMap<String, LibraryEntry>,
}

impl Manifest {
    /// Creates an empty manifest stamped with the current time.
    pub fn new(tool_version: String) -> Self {
        Self {
            format_version: contract_schema_core::SPEC_FORMAT_VERSION.to_string(),
            version: MANIFEST_VERSION.to_string(),
            tool_version,
            updated_at: now_rfc3339(),
            libraries: BTreeMap::new(),
        }
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, [`JsonError`](crate::DatabaseError::JsonError) if it is not
    /// manifest JSON, or [`InvalidManifest`](crate::DatabaseError::InvalidManifest)
    /// for an unsupported manifest version.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let manifest: Self = serde_json::from_reader(reader)?;
        manifest.check_version()?;
        Ok(manifest)
    }

    /// Loads the manifest at `path`, or starts a new one if the file does not
    /// exist.
    pub fn load_or_new(path: impl AsRef<Path>, tool_version: &str) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new(tool_version.to_string()))
        }
    }

    fn check_version(&self) -> Result<()> {
        let major = |v: &str| v.split('.').next().map(str::to_string);
        if major(&self.version) != major(MANIFEST_VERSION) {
            return Err(DatabaseError::InvalidManifest(format!(
                "unsupported manifest version '{}' (expected {MANIFEST_VERSION})",
                self.version
            )));
        }
        Ok(())
    }

    /// Saves the manifest as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Inserts or replaces the entry for `library` and refreshes `updated_at`.
    pub fn update_entry(&mut self, library: String, entry: LibraryEntry) {
        self.libraries.insert(library, entry);
        self.updated_at = now_rfc3339();
    }

    /// Drops the entry for `library`, returning it.
    pub fn remove_entry(&mut self, library: &str) -> Option<LibraryEntry> {
        let removed = self.libraries.remove(library);
        if removed.is_some() {
            self.updated_at = now_rfc3339();
        }
        removed
    }

    /// Returns `true` if `library` must be regenerated for a source with
    /// the given checksum by tool version `tool_version`.
    ///
    /// # Examples
    ///
    /// ```
    /// use contract_schema_db::{LibraryEntry, Manifest};
    ///
    /// let mut manifest = Manifest::new("0.1.0".into());
    /// manifest.update_entry("zlib".into(), LibraryEntry {
    ///     source: "zlib.skit".into(),
    ///     checksum: "abc".into(),
    ///     output: "zlib.cfg".into(),
    ///     functions: 3,
    ///     resources: 1,
    ///     generated_at: "2026-01-01T00:00:00Z".into(),
    /// });
    ///
    /// assert!(!manifest.needs_regeneration("zlib", "abc", "0.1.0"));
    /// assert!(manifest.needs_regeneration("zlib", "def", "0.1.0"));
    /// assert!(manifest.needs_regeneration("zlib", "abc", "0.2.0"));
    /// assert!(manifest.needs_regeneration("bzip2", "abc", "0.1.0"));
    /// ```
    pub fn needs_regeneration(&self, library: &str, checksum: &str, tool_version: &str) -> bool {
        if self.tool_version != tool_version {
            return true;
        }
        self.libraries
            .get(library)
            .is_none_or(|entry| entry.checksum != checksum)
    }

    /// Returns the libraries that differ between `self` and `other`, sorted.
    ///
    /// A library differs when it is present in only one manifest or its
    /// checksum or output changed. A tool version change marks every library.
    pub fn diff(&self, other: &Manifest) -> Vec<String> {
        let names = self.libraries.keys().chain(other.libraries.keys());

        let mut changed: Vec<String> = if self.tool_version != other.tool_version {
            names.cloned().collect()
        } else {
            names
                .filter(|name| {
                    match (self.libraries.get(*name), other.libraries.get(*name)) {
                        (Some(a), Some(b)) => a.checksum != b.checksum || a.output != b.output,
                        _ => true,
                    }
                })
                .cloned()
                .collect()
        };
        changed.sort();
        changed.dedup();
        changed
    }

    /// Returns entries whose library is not in `present`, sorted.
    pub fn stale<'a>(&self, present: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let present: std::collections::BTreeSet<&str> = present.into_iter().collect();
        self.libraries
            .keys()
            .filter(|name| !present.contains(name.as_str()))
            .cloned()
            .collect()
    }

    pub fn get(&self, library: &str) -> Option<&LibraryEntry> {
        self.libraries.get(library)
    }

    pub fn contains(&self, library: &str) -> bool {
        self.libraries.contains_key(library)
    }
}

/// SHA-256 hex digest of `bytes`.
pub fn checksum_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(checksum: &str) -> LibraryEntry {
        LibraryEntry {
            source: "lib.skit".into(),
            checksum: checksum.into(),
            output: "lib.cfg".into(),
            functions: 1,
            resources: 0,
            generated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_new_manifest() {
        let manifest = Manifest::new("0.1.0".into());
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert_eq!(
            manifest.format_version,
            contract_schema_core::SPEC_FORMAT_VERSION
        );
        assert!(manifest.libraries.is_empty());
        assert!(manifest.updated_at.ends_with('Z'));
    }

    #[test]
    fn test_checksum_bytes() {
        assert_eq!(
            checksum_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut manifest = Manifest::new("0.1.0".into());
        manifest.update_entry("zlib".into(), entry("abc"));
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded.get("zlib"), Some(&entry("abc")));
        assert_eq!(loaded.tool_version, "0.1.0");
    }

    #[test]
    fn test_load_or_new_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load_or_new(dir.path().join("none.json"), "0.3.0").unwrap();
        assert_eq!(manifest.tool_version, "0.3.0");
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = Manifest::new("0.1.0".into());
        manifest.version = "2.0".into();
        manifest.save(&path).unwrap();

        assert!(matches!(
            Manifest::load(&path),
            Err(DatabaseError::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_diff() {
        let mut old = Manifest::new("0.1.0".into());
        old.update_entry("a".into(), entry("1"));
        old.update_entry("b".into(), entry("2"));
        old.update_entry("gone".into(), entry("3"));

        let mut new = Manifest::new("0.1.0".into());
        new.update_entry("a".into(), entry("1"));
        new.update_entry("b".into(), entry("changed"));
        new.update_entry("added".into(), entry("4"));

        assert_eq!(old.diff(&new), vec!["added", "b", "gone"]);
    }

    #[test]
    fn test_diff_tool_version_marks_all() {
        let mut old = Manifest::new("0.1.0".into());
        old.update_entry("a".into(), entry("1"));
        let mut new = Manifest::new("0.2.0".into());
        new.update_entry("a".into(), entry("1"));

        assert_eq!(old.diff(&new), vec!["a"]);
    }

    #[test]
    fn test_stale_and_remove() {
        let mut manifest = Manifest::new("0.1.0".into());
        manifest.update_entry("a".into(), entry("1"));
        manifest.update_entry("b".into(), entry("2"));

        assert_eq!(manifest.stale(["a"]), vec!["b"]);
        assert!(manifest.remove_entry("b").is_some());
        assert!(manifest.remove_entry("b").is_none());
        assert!(manifest.stale(["a"]).is_empty());
    }
}
