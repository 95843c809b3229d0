//! Structural errors raised while building a contract specification.

use thiserror::Error;

/// Errors raised when a value would break a structural invariant.
///
/// Every constructor and [`SpecBuilder`](crate::SpecBuilder) insertion
/// returns one of these instead of producing an inconsistent value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A function, define, podtype or allocator name is empty or whitespace.
    #[error("{0} name cannot be empty")]
    EmptyName(&'static str),
    /// Names are single tokens in every document format.
    #[error("{what} name '{name}' cannot contain whitespace")]
    WhitespaceInName { what: &'static str, name: String },
    /// Define values and return types are written on one line.
    #[error("{what} '{text}' cannot span several lines")]
    MultiLineText { what: &'static str, text: String },
    /// A function whose return contract has no type.
    #[error("function '{0}' declares a return value without a type")]
    EmptyReturnType(String),
    /// Argument positions are 1-based.
    #[error("argument position must be a positive integer, got {0}")]
    InvalidPosition(i64),
    /// A range whose lower bound exceeds its upper bound.
    #[error("invalid range {min}:{max}: lower bound exceeds upper bound")]
    InvertedRange { min: String, max: String },
    /// A range with neither bound, or an empty range list.
    #[error("valid range cannot be empty")]
    EmptyRange,
    /// Range text that is not `n`, `n:`, `:n` or `n:m`.
    #[error("malformed range '{0}'")]
    MalformedRange(String),
    /// `mul` minimum sizes need two linked arguments, the others exactly one.
    #[error("minsize of type '{kind}' {detail}")]
    MinSizeArity { kind: &'static str, detail: &'static str },
    /// The same predicate kind attached twice to one argument.
    #[error("argument {position} already has a '{predicate}' constraint")]
    DuplicatePredicate { position: u32, predicate: &'static str },
    /// Two constraints for the same argument position.
    #[error("function '{function}' declares argument {position} twice")]
    DuplicateArgument { function: String, position: u32 },
    /// Two function contracts with the same name.
    #[error("duplicate function: {0}")]
    DuplicateFunction(String),
    /// Two defines with the same name.
    #[error("duplicate define: {0}")]
    DuplicateDefine(String),
    /// A define without a value expression.
    #[error("define '{0}' has no value")]
    EmptyDefineValue(String),
    /// Two podtypes with the same name.
    #[error("duplicate podtype: {0}")]
    DuplicatePodType(String),
    /// Podtype sizes are byte counts and must be non-zero.
    #[error("podtype '{0}' cannot have a size of zero")]
    ZeroPodSize(String),
    /// A resource rule without allocators or without deallocators.
    #[error("{0} rule needs at least one allocator and one deallocator")]
    IncompleteResource(&'static str),
    /// A function listed twice within one resource rule.
    #[error("function '{0}' appears more than once in the same resource rule")]
    RepeatedInResource(String),
    /// A function already owned by a different resource rule.
    #[error("function '{name}' already belongs to resource rule #{owner}")]
    ResourceOverlap { name: String, owner: usize },
}
