//! Reading and writing contract specifications.
//!
//! This crate turns source documents into [`ContractSpec`]s and back:
//!
//! - [`load_skit`] / [`to_skit`]: the line-oriented SKIT shorthand.
//! - [`load_json`], [`load_yaml`] and [`serialize`]: structured documents
//!   built from [`SpecDocument`].
//! - [`to_cppcheck_xml`]: the library file consumed by Cppcheck.
//! - [`output`]: rendering validation results for humans and tools.
//!
//! Loading is all or nothing. Failures are reported as a [`ParseError`] whose
//! [`Location`] points at the offending line or declaration.
//!
//! # Example
//!
//! ```
//! use contract_schema_core::{ValidateOptions, validate};
//! use contract_schema_skit::{load_skit, to_cppcheck_xml};
//!
//! let spec = load_skit("\
//! fn fopen
//!     ur
//!     rv FILE *
//!     1 nn s
//!     2 nn s
//!
//! fn fclose
//!     1 nn
//!
//! res
//!     alloc fopen
//!     dealloc fclose
//! ").unwrap();
//!
//! assert!(validate(&spec, &ValidateOptions::default()).is_empty());
//! assert!(to_cppcheck_xml(&spec).contains("<alloc init=\"false\">fopen</alloc>"));
//! ```
//!
//! [`ContractSpec`]: contract_schema_core::ContractSpec
//! [`SpecDocument`]: contract_schema_core::SpecDocument

pub mod cppcheck;
pub mod document;
pub mod error;
pub mod output;
mod parser;
mod writer;

pub use cppcheck::to_cppcheck_xml;
pub use document::{DocumentFormat, load, load_json, load_yaml, serialize};
pub use error::{Location, ParseError, ParseErrorKind, WriteError};
pub use parser::load_skit;
pub use writer::to_skit;
