//! Structured documents (JSON, YAML) and format dispatch.

use std::path::Path;

use contract_schema_core::{ContractSpec, Declaration, SpecBuilder, SpecDocument};
use tracing::debug;

use crate::error::{Location, ParseError, ParseErrorKind, WriteError};
use crate::parser::check_argument_links;
use crate::{load_skit, to_skit};

/// Source formats a spec can be read from and written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum DocumentFormat {
    Skit,
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "skit" => Some(Self::Skit),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Skit => "skit",
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Loads a spec from text in the given format.
pub fn load(text: &str, format: DocumentFormat) -> Result<ContractSpec, ParseError> {
    match format {
        DocumentFormat::Skit => load_skit(text),
        DocumentFormat::Json => load_json(text),
        DocumentFormat::Yaml => load_yaml(text),
    }
}

/// Loads a JSON [`SpecDocument`].
///
/// # Examples
///
/// ```
/// use contract_schema_skit::{Location, load_json};
///
/// let spec = load_json(r#"{"declarations": [{"type": "define", "name": "EOF", "value": "-1"}]}"#)
///     .unwrap();
/// assert_eq!(spec.define("EOF").unwrap().value(), "-1");
///
/// let err = load_json(r#"{"declarations": [{"type": "macro"}]}"#).unwrap_err();
/// assert!(matches!(err.location, Location::Position { line: 1, .. }));
/// ```
pub fn load_json(text: &str) -> Result<ContractSpec, ParseError> {
    let document: SpecDocument = serde_json::from_str(text).map_err(|e| {
        let location = Location::Position {
            line: e.line(),
            column: e.column(),
        };
        ParseError::new(location, syntax(e.to_string()))
    })?;
    from_document(document)
}

/// Loads a YAML [`SpecDocument`].
pub fn load_yaml(text: &str) -> Result<ContractSpec, ParseError> {
    let document: SpecDocument = serde_yaml::from_str(text).map_err(|e| {
        let location = e.location().map_or(Location::Document, |l| Location::Position {
            line: l.line(),
            column: l.column(),
        });
        ParseError::new(location, syntax(e.to_string()))
    })?;
    from_document(document)
}

/// Builds a spec from a deserialized document, then checks that every
/// minimum-size link resolves within its function.
fn from_document(document: SpecDocument) -> Result<ContractSpec, ParseError> {
    let spec = SpecBuilder::from_document(document)
        .map_err(|(index, err)| ParseError::new(Location::Declaration(index + 1), err))?;

    for (index, declaration) in spec.declarations().iter().enumerate() {
        if let Declaration::Function(function) = declaration {
            for argument in function.arguments() {
                check_argument_links(function, argument.position())
                    .map_err(|kind| ParseError::new(Location::Declaration(index + 1), kind))?;
            }
        }
    }

    debug!(
        library = spec.library().unwrap_or("-"),
        declarations = spec.len(),
        "Loaded structured document"
    );
    Ok(spec)
}

fn syntax(message: String) -> ParseErrorKind {
    ParseErrorKind::Syntax(message)
}

/// Serializes a spec in the given format.
pub fn serialize(spec: &ContractSpec, format: DocumentFormat) -> Result<String, WriteError> {
    match format {
        DocumentFormat::Skit => Ok(to_skit(spec)),
        DocumentFormat::Json => {
            let mut text = serde_json::to_string_pretty(spec)?;
            text.push('\n');
            Ok(text)
        }
        // Enums must be written as single-key maps to load back inside
        // tagged declarations.
        DocumentFormat::Yaml => Ok(serde_yaml::to_string(&serde_json::to_value(spec)?)?),
    }
}
