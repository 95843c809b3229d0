//! Argument predicate tokens (`nn`, `min{mul,2,3}`, `v{0:10}`, ...).

use std::sync::LazyLock;

use contract_schema_core::{
    ArgPosition, FormatStyle, MinSize, MinSizeKind, Predicate, ValidRanges,
};
use regex::Regex;

use crate::error::ParseErrorKind;

// `name{payload}` with no nested braces.
static BRACED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z-]*)\{([^{}]*)\}$").expect("static regex must compile")
});

/// Parses one predicate token of an argument line.
pub(super) fn parse_predicate(token: &str) -> Result<Predicate, ParseErrorKind> {
    match token.to_ascii_lowercase().as_str() {
        "nn" | "not-null" => return Ok(Predicate::NotNull),
        "nu" | "not-uninit" => return Ok(Predicate::NotUninit),
        "nb" | "not-bool" => return Ok(Predicate::NotBool),
        "s" | "strz" => return Ok(Predicate::StringTerminated),
        "fmt" | "formatstr" => return Ok(Predicate::FormatString(None)),
        _ => {}
    }

    let Some(caps) = BRACED.captures(token) else {
        return Err(ParseErrorKind::UnknownPredicate(token.to_string()));
    };
    let payload = caps[2].trim();

    match caps[1].to_ascii_lowercase().as_str() {
        "fmt" | "formatstr" => parse_format_style(payload)
            .map(|style| Predicate::FormatString(Some(style)))
            .ok_or_else(|| malformed("format string type", token)),
        "min" | "minsize" => parse_min_size(payload, token).map(Predicate::MinSize),
        "v" | "valid" => Ok(Predicate::ValidRange(payload.parse::<ValidRanges>()?)),
        _ => Err(ParseErrorKind::UnknownPredicate(token.to_string())),
    }
}

fn parse_format_style(text: &str) -> Option<FormatStyle> {
    match text.to_ascii_lowercase().as_str() {
        "printf" => Some(FormatStyle::Printf),
        "scanf" => Some(FormatStyle::Scanf),
        _ => None,
    }
}

fn parse_min_size(payload: &str, token: &str) -> Result<MinSize, ParseErrorKind> {
    let mut parts = payload.split(',').map(str::trim);
    let kind = parts
        .next()
        .and_then(MinSizeKind::parse)
        .ok_or_else(|| malformed("minsize type", token))?;

    let mut positions = Vec::new();
    for part in parts {
        let number: u32 = part
            .parse()
            .map_err(|_| malformed("minsize argument reference", token))?;
        positions.push(ArgPosition::new(number)?);
    }

    Ok(MinSize::from_parts(kind, &positions)?)
}

fn malformed(what: &'static str, token: &str) -> ParseErrorKind {
    ParseErrorKind::Malformed {
        what,
        text: token.to_string(),
    }
}

/// Writes a predicate back as its canonical SKIT token.
pub(crate) fn predicate_token(predicate: &Predicate) -> String {
    match predicate {
        Predicate::NotNull => "nn".to_string(),
        Predicate::NotUninit => "nu".to_string(),
        Predicate::NotBool => "nb".to_string(),
        Predicate::StringTerminated => "s".to_string(),
        Predicate::FormatString(None) => "fmt".to_string(),
        Predicate::FormatString(Some(style)) => format!("fmt{{{}}}", style.as_str()),
        Predicate::MinSize(min) => {
            let mut token = format!("min{{{}", min.kind().as_str());
            for position in min.linked() {
                token.push_str(&format!(",{position}"));
            }
            token.push('}');
            token
        }
        Predicate::ValidRange(ranges) => format!("v{{{ranges}}}"),
    }
}
