//! Spec file loading, check configuration and generation manifests.
//!
//! This crate connects the in-memory contract model to the file system:
//!
//! - [`SpecFile`] / [`SpecDatabase`]: load `.skit`, `.json` and `.yaml`
//!   documents, one library per file.
//! - [`CheckConfig`]: the `.contract-schema.yml` settings used by checks.
//! - [`Manifest`]: records generated outputs and their source checksums so
//!   unchanged libraries are not regenerated.
//!
//! # Quick start
//!
//! ```no_run
//! use contract_schema_db::{CheckConfig, Manifest, SpecDatabase};
//!
//! let config = CheckConfig::load(".contract-schema.yml").unwrap();
//! let db = SpecDatabase::builder()
//!     .from_dir("cfg/")
//!     .exclude(config.exclude.clone())
//!     .build()
//!     .unwrap();
//!
//! let manifest = Manifest::load_or_new("cfg/manifest.json", "0.1.0").unwrap();
//! for file in db.iter() {
//!     if manifest.needs_regeneration(&file.library, &file.checksum, "0.1.0") {
//!         println!("{} changed", file.library);
//!     }
//! }
//! ```

mod config;
mod error;
mod loader;
mod manifest;

pub use config::{CONFIG_VERSION, CheckConfig};
pub use error::{DatabaseError, Result};
pub use loader::{DatabaseBuilder, DatabaseSource, SpecDatabase, SpecFile, spec_files};
pub use manifest::{LibraryEntry, MANIFEST_VERSION, Manifest, checksum_bytes};
