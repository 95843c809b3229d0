//! Loading spec files from disk.
//!
//! Provides [`SpecFile`] for a single loaded document, [`SpecDatabase`] for
//! a set of them keyed by library name, and [`DatabaseBuilder`] for merging
//! several directories and files into one database.
//!
//! # Loading patterns
//!
//! ```no_run
//! use contract_schema_db::SpecDatabase;
//!
//! // Load every .skit, .json and .yaml file of a directory
//! let db = SpecDatabase::from_dir("cfg/").unwrap();
//! assert!(db.get("posix").is_some());
//!
//! // Merge sources, skipping some files
//! let db = SpecDatabase::builder()
//!     .from_dir("cfg/")
//!     .from_file("extra/qt.skit")
//!     .exclude(["legacy.skit"])
//!     .build()
//!     .unwrap();
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use contract_schema_core::ContractSpec;
use contract_schema_skit::DocumentFormat;
use tracing::{debug, info};

use crate::config::matches_exclusion;
use crate::error::{DatabaseError, Result};
use crate::manifest::checksum_bytes;

/// Describes where a [`SpecDatabase`] was loaded from.
#[derive(Debug, Clone)]
pub enum DatabaseSource {
    /// A directory of spec files.
    Directory(PathBuf),
    /// A single spec file.
    File(PathBuf),
    /// Several sources merged by a [`DatabaseBuilder`].
    Multiple(Vec<DatabaseSource>),
}

/// One loaded spec document.
#[derive(Debug, Clone)]
pub struct SpecFile {
    /// Library name: the document's own `library` field, or the file stem.
    pub library: String,
    pub path: PathBuf,
    pub format: DocumentFormat,
    /// SHA-256 hex digest of the file contents.
    pub checksum: String,
    pub spec: ContractSpec,
}

impl SpecFile {
    /// Loads a spec file, picking the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::UnsupportedFormat`] for an unknown extension,
    /// [`DatabaseError::IoError`] if the file cannot be read, or
    /// [`DatabaseError::Parse`] if the document is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = DocumentFormat::from_path(path)
            .ok_or_else(|| DatabaseError::UnsupportedFormat(path.to_path_buf()))?;
        Self::load_as(path, format)
    }

    /// Loads a spec file in an explicit format.
    pub fn load_as(path: impl AsRef<Path>, format: DocumentFormat) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let spec =
            contract_schema_skit::load(&text, format).map_err(|source| DatabaseError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let library = spec
            .library()
            .map(str::to_string)
            .or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        info!(
            library = %library,
            path = %path.display(),
            functions = spec.function_count(),
            resources = spec.resource_count(),
            "Loaded spec"
        );

        Ok(Self {
            library,
            path: path.to_path_buf(),
            format,
            checksum: checksum_bytes(text.as_bytes()),
            spec,
        })
    }
}

/// Lists the spec files directly inside `dir`, sorted by path.
///
/// Hidden files and files whose extension is not a known spec format are
/// skipped.
pub fn spec_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if !hidden && path.is_file() && DocumentFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loaded spec files keyed by library name.
///
/// Iteration is in library-name order.
///
/// # Examples
///
/// ```no_run
/// use contract_schema_db::SpecDatabase;
///
/// let db = SpecDatabase::from_dir("cfg/").unwrap();
/// for file in db.iter() {
///     println!("{}: {} functions", file.library, file.spec.function_count());
/// }
/// ```
#[derive(Debug)]
pub struct SpecDatabase {
    specs: BTreeMap<String, SpecFile>,
    source: DatabaseSource,
}

impl SpecDatabase {
    /// Returns a new [`DatabaseBuilder`].
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Loads every spec file of a directory.
    ///
    /// # Errors
    ///
    /// Fails on the first file that cannot be loaded, or with
    /// [`DatabaseError::DuplicateLibrary`] when two files share a library
    /// name.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut db = Self::empty(DatabaseSource::Directory(path.to_path_buf()));
        for file in spec_files(path)? {
            db.insert(SpecFile::load(&file)?)?;
        }
        Ok(db)
    }

    /// Loads a single spec file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut db = Self::empty(DatabaseSource::File(path.to_path_buf()));
        db.insert(SpecFile::load(path)?)?;
        Ok(db)
    }

    fn empty(source: DatabaseSource) -> Self {
        Self {
            specs: BTreeMap::new(),
            source,
        }
    }

    fn insert(&mut self, file: SpecFile) -> Result<()> {
        if let Some(existing) = self.specs.get(&file.library) {
            return Err(DatabaseError::DuplicateLibrary {
                name: file.library,
                first: existing.path.clone(),
                second: file.path,
            });
        }
        self.specs.insert(file.library.clone(), file);
        Ok(())
    }

    pub fn get(&self, library: &str) -> Option<&SpecFile> {
        self.specs.get(library)
    }

    pub fn contains(&self, library: &str) -> bool {
        self.specs.contains_key(library)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Returns an iterator over library names.
    pub fn libraries(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpecFile> {
        self.specs.values()
    }

    pub fn source(&self) -> &DatabaseSource {
        &self.source
    }
}

/// Builder merging several sources into one [`SpecDatabase`].
///
/// Every source must load; library names must be unique across all of them.
/// Excluded names are matched against file names and file stems.
#[derive(Debug, Default)]
pub struct DatabaseBuilder {
    sources: Vec<DatabaseSource>,
    exclude: Vec<String>,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory of spec files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::Directory(path.into()));
        self
    }

    /// Adds a single spec file as a source.
    pub fn from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::File(path.into()));
        self
    }

    /// Skips files whose name or stem is listed.
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Loads all sources.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NoSourcesAvailable`] without sources, or the
    /// first load or duplicate-library error.
    pub fn build(self) -> Result<SpecDatabase> {
        if self.sources.is_empty() {
            return Err(DatabaseError::NoSourcesAvailable);
        }

        let mut db = SpecDatabase::empty(DatabaseSource::Multiple(self.sources.clone()));
        for source in &self.sources {
            let files = match source {
                DatabaseSource::Directory(path) => spec_files(path)?,
                DatabaseSource::File(path) => vec![path.clone()],
                DatabaseSource::Multiple(_) => continue,
            };
            for file in files {
                if matches_exclusion(&self.exclude, &file) {
                    debug!(path = %file.display(), "Skipping excluded spec file");
                    continue;
                }
                db.insert(SpecFile::load(&file)?)?;
            }
        }
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_from_dir_mixed_formats() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "stdio.skit", "fn fclose\n    1 nn\n");
        write(
            dir.path(),
            "zlib.json",
            r#"{"declarations": [{"type": "function", "name": "gzclose"}]}"#,
        );
        write(
            dir.path(),
            "posix.yaml",
            "declarations:\n  - type: define\n    name: O_RDONLY\n    value: \"0\"\n",
        );
        write(dir.path(), "README.md", "# not a spec");

        let db = SpecDatabase::from_dir(dir.path()).unwrap();
        assert_eq!(db.len(), 3);
        let libraries: Vec<&str> = db.libraries().collect();
        assert_eq!(libraries, vec!["posix", "stdio", "zlib"]);
        assert_eq!(db.get("zlib").unwrap().format, DocumentFormat::Json);
        assert!(db.get("stdio").unwrap().spec.function("fclose").is_some());
    }

    #[test]
    fn test_library_field_overrides_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "z.json",
            r#"{"library": "zlib", "declarations": []}"#,
        );
        let db = SpecDatabase::from_file(&path).unwrap();
        assert!(db.contains("zlib"));
        assert!(!db.contains("z"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.skit", "fn f\n    1 nz\n");
        let err = SpecFile::load(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::Parse { .. }));
        let message = err.to_string();
        assert!(message.contains("bad.skit"), "{message}");
        assert!(message.contains("line 2"), "{message}");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = SpecFile::load("notes.txt").unwrap_err();
        assert!(matches!(err, DatabaseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_checksum_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.skit", "def A 1\n");
        let first = SpecFile::load(&path).unwrap().checksum;
        write(dir.path(), "a.skit", "def A 2\n");
        let second = SpecFile::load(&path).unwrap().checksum;
        assert_eq!(first.len(), 64);
        assert_ne!(first, second);
    }

    #[test]
    fn test_builder_merges_and_excludes() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write(first.path(), "a.skit", "def A 1\n");
        write(first.path(), "legacy.skit", "def OLD 1\n");
        let extra = write(second.path(), "b.skit", "def B 1\n");

        let db = SpecDatabase::builder()
            .from_dir(first.path())
            .from_file(&extra)
            .exclude(["legacy.skit"])
            .build()
            .unwrap();
        let libraries: Vec<&str> = db.libraries().collect();
        assert_eq!(libraries, vec!["a", "b"]);
        assert!(matches!(db.source(), DatabaseSource::Multiple(s) if s.len() == 2));
    }

    #[test]
    fn test_builder_duplicate_library() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write(first.path(), "libc.skit", "def A 1\n");
        write(second.path(), "libc.yaml", "declarations: []\n");

        let err = SpecDatabase::builder()
            .from_dir(first.path())
            .from_dir(second.path())
            .build()
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateLibrary { ref name, .. } if name == "libc"));
    }

    #[test]
    fn test_builder_without_sources() {
        assert!(matches!(
            DatabaseBuilder::new().build(),
            Err(DatabaseError::NoSourcesAvailable)
        ));
    }
}
