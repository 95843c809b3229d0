//! Core contract types and validation.
//!
//! This crate defines the data model for describing the external contracts
//! of a C library API, as consumed by static analyzers such as Cppcheck:
//!
//! - [`FunctionContract`]: per-function flags, return value and
//!   per-argument [`Predicate`]s.
//! - [`ResourceRule`]: allocator/deallocator groups used for leak tracking.
//! - [`ConstantDefine`] and [`PodType`]: constants and value types.
//! - [`ContractSpec`]: the immutable collection of all of the above,
//!   assembled through [`SpecBuilder`].
//!
//! Structural invariants are enforced on construction and reported as
//! [`SchemaError`]. Semantic checks ([`validate`]) return the full list of
//! [`Diagnostic`]s rather than stopping at the first problem.
//!
//! # Example
//!
//! ```
//! use contract_schema_core::*;
//!
//! let mut builder = ContractSpec::builder();
//! builder
//!     .function(
//!         FunctionContract::new("fopen")?
//!             .returning(ReturnContract::new("FILE *"))
//!             .use_retval()
//!             .with_argument(
//!                 ArgumentConstraint::new(1)?
//!                     .with(Predicate::NotNull)?
//!                     .with(Predicate::StringTerminated)?,
//!             )?,
//!     )?
//!     .function(
//!         FunctionContract::new("fclose")?
//!             .with_argument(ArgumentConstraint::new(1)?.with(Predicate::NotNull)?)?,
//!     )?
//!     .resource(ResourceRule::new(
//!         ResourceKind::Resource,
//!         vec![Allocator::new("fopen")],
//!         vec!["fclose".into()],
//!     )?)?;
//! let spec = builder.build();
//!
//! assert_eq!(spec.function_count(), 2);
//! assert!(validate(&spec, &ValidateOptions::default()).is_empty());
//! # Ok::<(), SchemaError>(())
//! ```

mod error;
mod spec;
mod types;
mod validate;

pub use error::SchemaError;
pub use spec::{ContractSpec, Declaration, SpecBuilder, SpecDocument};
pub use types::*;
pub use validate::{
    Diagnostic, DiagnosticKind, Severity, Subject, SubjectKind, ValidateOptions, has_errors,
    validate,
};
