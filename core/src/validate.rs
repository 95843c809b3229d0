//! Semantic validation of a built specification.
//!
//! Construction already guarantees the structural invariants (unique names,
//! positive positions, ordered ranges, disjoint resource rules). Validation
//! adds the cross-reference checks and reports every finding in one batch,
//! in declaration order, so repeated runs over the same spec produce the same
//! list.
//!
//! # Examples
//!
//! ```
//! use contract_schema_core::*;
//!
//! let mut builder = SpecBuilder::new();
//! builder
//!     .function(FunctionContract::new("open")?.returning(ReturnContract::new("int")))?
//!     .resource(ResourceRule::new(
//!         ResourceKind::Resource,
//!         vec![Allocator::new("open")],
//!         vec!["close".into()],
//!     )?)?;
//! let spec = builder.build();
//!
//! // `close` is not declared
//! let diagnostics = validate(&spec, &ValidateOptions::default());
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].subject.name, "close");
//!
//! // ...unless it is provided elsewhere
//! let options = ValidateOptions::default().with_external(["close"]);
//! assert!(validate(&spec, &options).is_empty());
//! # Ok::<(), SchemaError>(())
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::{ContractSpec, Declaration, FunctionContract, ResourceRule};

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// What kind of entity a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Function,
    Define,
    Podtype,
    Resource,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Function => "function",
            Self::Define => "define",
            Self::Podtype => "podtype",
            Self::Resource => "resource",
        })
    }
}

/// The named entity a diagnostic refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
}

impl Subject {
    fn function(name: &str) -> Self {
        Self {
            kind: SubjectKind::Function,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// Everything validation can report.
///
/// The `Display` impl is the diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticKind {
    /// A resource rule names a function that is neither declared nor allowed.
    #[error("resource rule #{rule} references '{name}', which is neither declared nor allow-listed")]
    UnknownFunction { rule: usize, name: String },
    /// A minimum size links to an argument the function does not declare.
    #[error("argument {position} links its minimum size to argument {linked}, which is not declared")]
    UnresolvedArgument { position: u32, linked: u32 },
    /// A minimum size links to its own argument.
    #[error("argument {position} links its minimum size to itself")]
    SelfLinkedArgument { position: u32 },
    #[error("return value must be used, but the function returns void")]
    RetvalOnVoid,
    #[error("return value must be used, but the function never returns")]
    RetvalOnNoreturn,
    /// Leak tracking is suppressed on a function that allocates.
    #[error("allocator in resource rule #{rule} is marked leak-ignore")]
    LeakIgnoredAllocator { rule: usize },
    #[error("allocator in resource rule #{rule} declares no non-void return value")]
    AllocatorWithoutReturn { rule: usize },
    #[error("deallocator in resource rule #{rule} constrains no argument")]
    DeallocatorWithoutArgument { rule: usize },
    #[error("function is marked pure or const but never returns")]
    PureNoreturn,
    /// A define shares its name with a podtype.
    #[error("define shadows the podtype of the same name")]
    ShadowedDefine,
    /// An allow-listed name the spec declares itself.
    #[error("allow-listed function is already declared in the spec")]
    RedundantAllowlist,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownFunction { .. }
            | Self::UnresolvedArgument { .. }
            | Self::SelfLinkedArgument { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// Stable kebab-case identifier, suitable for filtering.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownFunction { .. } => "unknown-function",
            Self::UnresolvedArgument { .. } => "unresolved-argument",
            Self::SelfLinkedArgument { .. } => "self-linked-argument",
            Self::RetvalOnVoid => "retval-on-void",
            Self::RetvalOnNoreturn => "retval-on-noreturn",
            Self::LeakIgnoredAllocator { .. } => "leak-ignored-allocator",
            Self::AllocatorWithoutReturn { .. } => "allocator-without-return",
            Self::DeallocatorWithoutArgument { .. } => "deallocator-without-argument",
            Self::PureNoreturn => "pure-noreturn",
            Self::ShadowedDefine => "shadowed-define",
            Self::RedundantAllowlist => "redundant-allowlist",
        }
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub subject: Subject,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    fn new(subject: Subject, kind: DiagnosticKind) -> Self {
        Self {
            severity: kind.severity(),
            subject,
            kind,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity,
            self.code(),
            self.subject,
            self.kind
        )
    }
}

impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Diagnostic", 4)?;
        state.serialize_field("severity", &self.severity)?;
        state.serialize_field("subject", &self.subject)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.message())?;
        state.end()
    }
}

/// Inputs to validation beyond the spec itself.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Functions defined outside the spec (for umbrella libraries where not
    /// every symbol is annotated).
    pub external: BTreeSet<String>,
}

impl ValidateOptions {
    /// Adds externally defined function names.
    pub fn with_external<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn allows(&self, name: &str) -> bool {
        self.external.contains(name)
    }
}

/// Returns `true` if any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Validates a spec, returning every finding.
///
/// An empty list means the spec is clean. The order is deterministic:
/// declarations in document order, then the allow-list in sorted order.
pub fn validate(spec: &ContractSpec, options: &ValidateOptions) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut rule = 0;

    for declaration in spec.declarations() {
        match declaration {
            Declaration::Function(function) => {
                diagnostics.extend(validate_function(function));
            }
            Declaration::Define(define) => {
                if spec.podtype(define.name()).is_some() {
                    diagnostics.push(Diagnostic::new(
                        Subject {
                            kind: SubjectKind::Define,
                            name: define.name().to_string(),
                        },
                        DiagnosticKind::ShadowedDefine,
                    ));
                }
            }
            Declaration::Resource(resource) => {
                diagnostics.extend(validate_resource(spec, resource, rule, options));
                rule += 1;
            }
            Declaration::Podtype(_) | Declaration::Comment { .. } => {}
        }
    }

    for name in &options.external {
        if spec.function(name).is_some() {
            diagnostics.push(Diagnostic::new(
                Subject::function(name),
                DiagnosticKind::RedundantAllowlist,
            ));
        }
    }

    diagnostics
}

fn validate_function(function: &FunctionContract) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let subject = || Subject::function(function.name());

    for argument in function.arguments() {
        let Some(size) = argument.min_size() else {
            continue;
        };
        let position = argument.position();
        for linked in size.linked() {
            let kind = if linked == position {
                DiagnosticKind::SelfLinkedArgument {
                    position: position.get(),
                }
            } else if function.argument(linked).is_none() {
                DiagnosticKind::UnresolvedArgument {
                    position: position.get(),
                    linked: linked.get(),
                }
            } else {
                continue;
            };
            diagnostics.push(Diagnostic::new(subject(), kind));
        }
    }

    if function.uses_retval() {
        if function.returns().is_some_and(|r| r.is_void()) {
            diagnostics.push(Diagnostic::new(subject(), DiagnosticKind::RetvalOnVoid));
        }
        if function.never_returns() {
            diagnostics.push(Diagnostic::new(subject(), DiagnosticKind::RetvalOnNoreturn));
        }
    }

    if (function.is_pure() || function.is_const()) && function.never_returns() {
        diagnostics.push(Diagnostic::new(subject(), DiagnosticKind::PureNoreturn));
    }

    diagnostics
}

fn validate_resource(
    spec: &ContractSpec,
    resource: &ResourceRule,
    rule: usize,
    options: &ValidateOptions,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for allocator in resource.allocators() {
        let subject = Subject::function(&allocator.name);
        match spec.function(&allocator.name) {
            Some(function) => {
                if function.is_leak_ignored() {
                    diagnostics.push(Diagnostic::new(
                        subject.clone(),
                        DiagnosticKind::LeakIgnoredAllocator { rule },
                    ));
                }
                if function.returns().is_none_or(|r| r.is_void()) {
                    diagnostics.push(Diagnostic::new(
                        subject,
                        DiagnosticKind::AllocatorWithoutReturn { rule },
                    ));
                }
            }
            None if options.allows(&allocator.name) => {}
            None => diagnostics.push(unknown(subject, rule)),
        }
    }

    for name in resource.deallocators() {
        let subject = Subject::function(name);
        match spec.function(name) {
            Some(function) if function.arguments().is_empty() => {
                diagnostics.push(Diagnostic::new(
                    subject,
                    DiagnosticKind::DeallocatorWithoutArgument { rule },
                ));
            }
            Some(_) => {}
            None if options.allows(name) => {}
            None => diagnostics.push(unknown(subject, rule)),
        }
    }

    diagnostics
}

fn unknown(subject: Subject, rule: usize) -> Diagnostic {
    let name = subject.name.clone();
    Diagnostic::new(subject, DiagnosticKind::UnknownFunction { rule, name })
}
