//! The immutable contract specification and its builder.

use std::collections::HashMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::{
    ConstantDefine, FunctionContract, PodType, ResourceRule, SPEC_FORMAT_VERSION, SchemaError,
};

/// One top-level entry of a specification, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Declaration {
    /// Author comment carried through to generated output.
    Comment { text: String },
    Define(ConstantDefine),
    Podtype(PodType),
    Function(FunctionContract),
    Resource(ResourceRule),
}

/// Serializable form of a specification.
///
/// Deserializing a document only checks per-declaration invariants; pass it
/// through [`SpecBuilder::from_document`] to get a [`ContractSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecDocument {
    /// Document format version (populated from [`SPEC_FORMAT_VERSION`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    /// Optional library name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

#[derive(Serialize)]
struct SpecDocumentRef<'a> {
    format_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    library: Option<&'a str>,
    declarations: &'a [Declaration],
}

/// A fully built, read-only collection of contracts for one library.
///
/// Obtained from [`SpecBuilder::build`]; nothing mutates it afterwards, so a
/// shared reference can be handed to any number of threads.
///
/// # Examples
///
/// ```
/// use contract_schema_core::*;
///
/// let mut builder = SpecBuilder::new();
/// builder
///     .function(FunctionContract::new("open").unwrap())?
///     .function(FunctionContract::new("close").unwrap())?
///     .resource(ResourceRule::new(
///         ResourceKind::Resource,
///         vec![Allocator::new("open")],
///         vec!["close".into()],
///     )?)?;
/// let spec = builder.build();
///
/// assert!(spec.function("open").is_some());
/// assert_eq!(spec.resource_for("close").map(|(id, _)| id), Some(0));
/// # Ok::<(), SchemaError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContractSpec {
    library: Option<String>,
    declarations: Vec<Declaration>,
    functions: HashMap<String, usize>,
    defines: HashMap<String, usize>,
    podtypes: HashMap<String, usize>,
    /// Declaration index of each resource rule; the rule id is the position
    /// in this list.
    resources: Vec<usize>,
    /// Function name to owning rule id.
    resource_owner: HashMap<String, usize>,
}

impl ContractSpec {
    /// Returns a new [`SpecBuilder`].
    pub fn builder() -> SpecBuilder {
        SpecBuilder::new()
    }

    pub fn library(&self) -> Option<&str> {
        self.library.as_deref()
    }

    /// Returns every declaration in document order.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionContract> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&FunctionContract> {
        match self.declarations.get(*self.functions.get(name)?) {
            Some(Declaration::Function(f)) => Some(f),
            _ => None,
        }
    }

    pub fn defines(&self) -> impl Iterator<Item = &ConstantDefine> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Define(d) => Some(d),
            _ => None,
        })
    }

    pub fn define(&self, name: &str) -> Option<&ConstantDefine> {
        match self.declarations.get(*self.defines.get(name)?) {
            Some(Declaration::Define(d)) => Some(d),
            _ => None,
        }
    }

    pub fn podtypes(&self) -> impl Iterator<Item = &PodType> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Podtype(p) => Some(p),
            _ => None,
        })
    }

    pub fn podtype(&self, name: &str) -> Option<&PodType> {
        match self.declarations.get(*self.podtypes.get(name)?) {
            Some(Declaration::Podtype(p)) => Some(p),
            _ => None,
        }
    }

    /// Iterates over resource rules in rule-id order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceRule> {
        self.resources
            .iter()
            .filter_map(|&index| match &self.declarations[index] {
                Declaration::Resource(r) => Some(r),
                _ => None,
            })
    }

    /// Finds the rule that owns `function`, with its rule id.
    pub fn resource_for(&self, function: &str) -> Option<(usize, &ResourceRule)> {
        let id = *self.resource_owner.get(function)?;
        match &self.declarations[self.resources[id]] {
            Declaration::Resource(r) => Some((id, r)),
            _ => None,
        }
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Copies the spec into its serializable document form.
    pub fn to_document(&self) -> SpecDocument {
        SpecDocument {
            format_version: Some(SPEC_FORMAT_VERSION.to_string()),
            library: self.library.clone(),
            declarations: self.declarations.clone(),
        }
    }
}

/// Two specs are equal when they declare the same things in the same order.
impl PartialEq for ContractSpec {
    fn eq(&self, other: &Self) -> bool {
        self.library == other.library && self.declarations == other.declarations
    }
}

impl Eq for ContractSpec {}

impl Serialize for ContractSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SpecDocumentRef {
            format_version: SPEC_FORMAT_VERSION,
            library: self.library.as_deref(),
            declarations: &self.declarations,
        }
        .serialize(serializer)
    }
}

/// Incrementally assembles a [`ContractSpec`], enforcing uniqueness of
/// names and the disjointness of resource rules as each declaration is
/// inserted.
#[derive(Debug, Default)]
pub struct SpecBuilder {
    spec: ContractSpec,
}

impl SpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a spec from a deserialized document, stopping at the first
    /// structural error. The error carries the index of the offending
    /// declaration.
    pub fn from_document(document: SpecDocument) -> Result<ContractSpec, (usize, SchemaError)> {
        let mut builder = Self::new();
        builder.spec.library = document.library;
        for (index, declaration) in document.declarations.into_iter().enumerate() {
            builder.declare(declaration).map_err(|err| (index, err))?;
        }
        Ok(builder.build())
    }

    /// Sets the library name.
    pub fn library(&mut self, name: impl Into<String>) -> &mut Self {
        self.spec.library = Some(name.into());
        self
    }

    /// Inserts any declaration.
    pub fn declare(&mut self, declaration: Declaration) -> Result<&mut Self, SchemaError> {
        match declaration {
            Declaration::Comment { text } => Ok(self.comment(text)),
            Declaration::Define(d) => self.define(d),
            Declaration::Podtype(p) => self.podtype(p),
            Declaration::Function(f) => self.function(f),
            Declaration::Resource(r) => self.resource(r),
        }
    }

    /// Adds a comment. Multi-line text becomes one comment per line, each
    /// trimmed.
    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        let mut lines = text.lines().peekable();
        if lines.peek().is_none() {
            self.spec.declarations.push(Declaration::Comment {
                text: String::new(),
            });
        }
        for line in lines {
            self.spec.declarations.push(Declaration::Comment {
                text: line.trim().to_string(),
            });
        }
        self
    }

    pub fn define(&mut self, define: ConstantDefine) -> Result<&mut Self, SchemaError> {
        if self.spec.defines.contains_key(define.name()) {
            return Err(SchemaError::DuplicateDefine(define.name().to_string()));
        }
        let index = self.spec.declarations.len();
        self.spec.defines.insert(define.name().to_string(), index);
        self.spec.declarations.push(Declaration::Define(define));
        Ok(self)
    }

    pub fn podtype(&mut self, podtype: PodType) -> Result<&mut Self, SchemaError> {
        if self.spec.podtypes.contains_key(podtype.name()) {
            return Err(SchemaError::DuplicatePodType(podtype.name().to_string()));
        }
        let index = self.spec.declarations.len();
        self.spec.podtypes.insert(podtype.name().to_string(), index);
        self.spec.declarations.push(Declaration::Podtype(podtype));
        Ok(self)
    }

    pub fn function(&mut self, function: FunctionContract) -> Result<&mut Self, SchemaError> {
        let function = function.normalize_return_type()?;
        if self.spec.functions.contains_key(function.name()) {
            return Err(SchemaError::DuplicateFunction(function.name().to_string()));
        }
        let index = self.spec.declarations.len();
        self.spec.functions.insert(function.name().to_string(), index);
        self.spec.declarations.push(Declaration::Function(function));
        Ok(self)
    }

    /// Inserts a resource rule, rejecting it when any of its functions is
    /// already owned by an earlier rule.
    pub fn resource(&mut self, rule: ResourceRule) -> Result<&mut Self, SchemaError> {
        if let Some((name, &owner)) = rule
            .function_names()
            .find_map(|name| self.spec.resource_owner.get(name).map(|owner| (name, owner)))
        {
            return Err(SchemaError::ResourceOverlap {
                name: name.to_string(),
                owner,
            });
        }

        let id = self.spec.resources.len();
        for name in rule.function_names() {
            self.spec.resource_owner.insert(name.to_string(), id);
        }
        self.spec.resources.push(self.spec.declarations.len());
        self.spec.declarations.push(Declaration::Resource(rule));
        Ok(self)
    }

    pub fn build(self) -> ContractSpec {
        self.spec
    }
}
