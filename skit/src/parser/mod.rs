//! SKIT loader.
//!
//! SKIT is a line-oriented shorthand for contract files. A document is a
//! sequence of single-line statements and blocks; a block starts with a
//! keyword line and runs until the next blank line or the end of input:
//!
//! ```text
//! # kept as a comment in generated output
//! ; dropped
//! def EOF -1
//! pod size_t u 8
//!
//! fn fread
//!     ur
//!     rv size_t
//!     1 nn min{mul,2,3}
//!     2 nu v{0:}
//!     3 nu v{0:}
//!     4 nn
//!
//! mem
//!     alloc malloc
//!     alloc init calloc
//!     dealloc free
//! ```
//!
//! Keywords and predicate names are case-insensitive. Parsing is all or
//! nothing: the first problem is returned as a [`ParseError`] carrying the
//! 1-based line number.

mod predicate;

use std::collections::HashSet;
use std::sync::LazyLock;

use contract_schema_core::{
    Allocator, ArgPosition, ArgumentConstraint, ConstantDefine, ContractSpec, FunctionContract, PodSign, PodType,
    ResourceKind, ResourceRule, ReturnContract, SchemaError, SpecBuilder,
};
use regex::Regex;
use tracing::debug;

use crate::error::{ParseError, ParseErrorKind};

pub(crate) use predicate::predicate_token;

/// Regex patterns for SKIT statements.
static PATTERNS: LazyLock<SkitPatterns> = LazyLock::new(SkitPatterns::new);

struct SkitPatterns {
    argument: Regex,
    return_value: Regex,
    define: Regex,
    noreturn: Regex,
}

impl SkitPatterns {
    fn new() -> Self {
        // All patterns are compile-time constants.
        Self {
            argument: Regex::new(r"^(-?\d+)(?:\s+(.*))?$").expect("static regex must compile"),
            return_value: Regex::new(r"(?i)^rv(?:\{([^{}]*)\})?(?:\s+(.*))?$")
                .expect("static regex must compile"),
            define: Regex::new(r"(?i)^def\s+(\S+)\s+(.+)$").expect("static regex must compile"),
            noreturn: Regex::new(r"(?i)^nr\s+(t|f|true|false)$")
                .expect("static regex must compile"),
        }
    }
}

/// Loads a SKIT document.
///
/// # Examples
///
/// ```
/// use contract_schema_skit::load_skit;
///
/// let spec = load_skit("fn fclose\n    1 nn\n").unwrap();
/// assert!(spec.function("fclose").is_some());
///
/// let err = load_skit("fn strlen\n    1 nz\n").unwrap_err();
/// assert_eq!(err.to_string(), "line 2: unknown predicate 'nz'");
/// ```
pub fn load_skit(text: &str) -> Result<ContractSpec, ParseError> {
    SkitParser::new(text).parse()
}

/// Line-by-line SKIT parser feeding a [`SpecBuilder`].
struct SkitParser<'a> {
    lines: Vec<&'a str>,
    cursor: usize,
    builder: SpecBuilder,
}

impl<'a> SkitParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            cursor: 0,
            builder: SpecBuilder::new(),
        }
    }

    fn parse(mut self) -> Result<ContractSpec, ParseError> {
        while let Some((line_no, line)) = self.next_line() {
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            if let Some(text) = line.strip_prefix('#') {
                self.builder.comment(text.trim());
                continue;
            }

            let keyword = line
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            match keyword.as_str() {
                "fn" => self.parse_function(line_no, line)?,
                "mem" => self.parse_resource(line_no, line, ResourceKind::Memory)?,
                "res" => self.parse_resource(line_no, line, ResourceKind::Resource)?,
                "pod" => self.parse_podtype(line_no, line)?,
                "def" => self.parse_define(line_no, line)?,
                "con" => {
                    return Err(ParseError::at_line(
                        line_no,
                        ParseErrorKind::UnsupportedContainer,
                    ));
                }
                _ => {
                    return Err(ParseError::at_line(
                        line_no,
                        ParseErrorKind::UnknownStatement(line.to_string()),
                    ));
                }
            }
        }

        Ok(self.builder.build())
    }

    /// Returns the next line, trimmed, with its 1-based number.
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let line = self.lines.get(self.cursor)?;
        self.cursor += 1;
        Some((self.cursor, line.trim()))
    }

    /// Returns the lines of the current block up to the next blank line.
    fn block_lines(&mut self) -> Vec<(usize, &'a str)> {
        let mut lines = Vec::new();
        while let Some((line_no, line)) = self.next_line() {
            if line.is_empty() {
                break;
            }
            lines.push((line_no, line));
        }
        lines
    }

    fn parse_function(&mut self, header_no: usize, header: &str) -> Result<(), ParseError> {
        let name = match header.split_whitespace().collect::<Vec<_>>().as_slice() {
            [_, name] => *name,
            _ => {
                return Err(ParseError::at_line(
                    header_no,
                    malformed("function header", header),
                ));
            }
        };

        let mut function = FunctionContract::new(name).map_err(|e| ParseError::at_line(header_no, e))?;
        let mut seen = HashSet::new();
        let mut argument_lines = Vec::new();

        for (line_no, line) in self.block_lines() {
            let fail = |kind: ParseErrorKind| ParseError::at_line(line_no, kind);

            if let Some(caps) = PATTERNS.argument.captures(line) {
                let argument = parse_argument(&caps[1], caps.get(2).map_or("", |m| m.as_str()))
                    .map_err(fail)?;
                argument_lines.push((line_no, argument.position()));
                function = function.with_argument(argument).map_err(|e| fail(e.into()))?;
                continue;
            }

            let keyword = line
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            let entry = if keyword.starts_with("rv") { "rv" } else { keyword.as_str() };
            let entry: &'static str = match entry {
                "pure" => "pure",
                "const" => "const",
                "ur" => "ur",
                "li" => "li",
                "nr" => "nr",
                "rv" => "rv",
                _ => {
                    return Err(fail(ParseErrorKind::UnexpectedEntry {
                        block: "function",
                        entry: line.to_string(),
                    }));
                }
            };
            if !seen.insert(entry) {
                return Err(fail(ParseErrorKind::RepeatedEntry(entry)));
            }

            function = match entry {
                "pure" | "const" | "ur" | "li" if line.split_whitespace().count() > 1 => {
                    return Err(fail(malformed("flag", line)));
                }
                "pure" => function.pure(),
                "const" => function.constant(),
                "ur" => function.use_retval(),
                "li" => function.leak_ignore(),
                "nr" => {
                    let caps = PATTERNS
                        .noreturn
                        .captures(line)
                        .ok_or_else(|| fail(malformed("noreturn flag", line)))?;
                    let value = caps[1].to_ascii_lowercase();
                    function.noreturn(value.starts_with('t'))
                }
                _ => function.returning(parse_return(line).map_err(fail)?),
            };
        }

        for (line_no, position) in argument_lines {
            check_argument_links(&function, position)
                .map_err(|kind| ParseError::at_line(line_no, kind))?;
        }

        debug!(
            function = name,
            line = header_no,
            arguments = function.arguments().len(),
            "Parsed function block"
        );
        self.builder
            .function(function)
            .map_err(|e| ParseError::at_line(header_no, e))?;
        Ok(())
    }

    fn parse_resource(
        &mut self,
        header_no: usize,
        header: &str,
        kind: ResourceKind,
    ) -> Result<(), ParseError> {
        if header.split_whitespace().count() != 1 {
            return Err(ParseError::at_line(
                header_no,
                malformed("resource header", header),
            ));
        }

        let mut allocators = Vec::new();
        let mut deallocators = Vec::new();
        for (line_no, line) in self.block_lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let keywords: Vec<String> = tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
            match (keywords.first().map(String::as_str), tokens.as_slice()) {
                (Some("alloc"), [_, name]) => allocators.push(Allocator::new(*name)),
                (Some("alloc"), [_, init, name]) if init.eq_ignore_ascii_case("init") => {
                    allocators.push(Allocator::initializing(*name));
                }
                (Some("dealloc"), [_, name]) => deallocators.push(name.to_string()),
                (Some("alloc" | "dealloc"), _) => {
                    return Err(ParseError::at_line(line_no, malformed("resource entry", line)));
                }
                _ => {
                    return Err(ParseError::at_line(
                        line_no,
                        ParseErrorKind::UnexpectedEntry {
                            block: kind.as_str(),
                            entry: line.to_string(),
                        },
                    ));
                }
            }
        }

        let rule = ResourceRule::new(kind, allocators, deallocators)
            .map_err(|e| ParseError::at_line(header_no, e))?;
        debug!(
            kind = kind.as_str(),
            line = header_no,
            allocators = rule.allocators().len(),
            deallocators = rule.deallocators().len(),
            "Parsed resource block"
        );
        self.builder
            .resource(rule)
            .map_err(|e| ParseError::at_line(header_no, e))?;
        Ok(())
    }

    fn parse_podtype(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let fail = |kind: ParseErrorKind| ParseError::at_line(line_no, kind);
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(name) = tokens.get(1) else {
            return Err(fail(malformed("podtype", line)));
        };

        let mut pod = PodType::new(name).map_err(|e| fail(e.into()))?;
        let mut sign = None;
        let mut size = None;
        for token in &tokens[2..] {
            match token.to_ascii_lowercase().as_str() {
                "s" if sign.is_none() => sign = Some(PodSign::Signed),
                "u" if sign.is_none() => sign = Some(PodSign::Unsigned),
                digits if size.is_none() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                    size = Some(
                        digits
                            .parse::<u32>()
                            .map_err(|_| fail(malformed("podtype size", token)))?,
                    );
                }
                _ => return Err(fail(malformed("podtype", line))),
            }
        }

        if let Some(sign) = sign {
            pod = pod.with_sign(sign);
        }
        if let Some(size) = size {
            pod = pod.with_size(size).map_err(|e| fail(e.into()))?;
        }

        debug!(podtype = *name, line = line_no, "Parsed podtype");
        self.builder.podtype(pod).map_err(|e| fail(e.into()))?;
        Ok(())
    }

    fn parse_define(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let fail = |kind: ParseErrorKind| ParseError::at_line(line_no, kind);
        let caps = PATTERNS
            .define
            .captures(line)
            .ok_or_else(|| fail(malformed("define", line)))?;
        let define = ConstantDefine::new(&caps[1], &caps[2])
            .map_err(|e| fail(e.into()))?;

        debug!(define = define.name(), line = line_no, "Parsed define");
        self.builder.define(define).map_err(|e| fail(e.into()))?;
        Ok(())
    }
}

/// Parses `<position> <predicate>...`.
fn parse_argument(position: &str, predicates: &str) -> Result<ArgumentConstraint, ParseErrorKind> {
    let number: i64 = position
        .parse()
        .map_err(|_| malformed("argument position", position))?;
    let number = u32::try_from(number).map_err(|_| SchemaError::InvalidPosition(number))?;

    let mut argument = ArgumentConstraint::new(number)?;
    for token in split_tokens(predicates) {
        argument = argument.with(predicate::parse_predicate(token)?)?;
    }
    Ok(argument)
}

/// Parses `rv <type>`, `rv{nn} <type>` or `rv{null} <type>`.
fn parse_return(line: &str) -> Result<ReturnContract, ParseErrorKind> {
    let caps = PATTERNS
        .return_value
        .captures(line)
        .ok_or_else(|| malformed("return value", line))?;
    let type_name = caps
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed("return value", line))?;

    let returns = ReturnContract::new(type_name);
    match caps.get(1).map(|m| m.as_str().trim().to_ascii_lowercase()) {
        None => Ok(returns),
        Some(flag) if flag == "nn" || flag == "not-null" => Ok(returns.not_null()),
        Some(flag) if flag == "null" => Ok(returns.maybe_null()),
        Some(_) => Err(malformed("return nullability", line)),
    }
}

/// Splits on whitespace outside `{...}` so `v{0:10, 15}` stays one token.
fn split_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&text[s..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&text[s..]);
    }
    tokens
}

/// Checks that the minimum-size links of the argument at `position` point at
/// arguments the function declares.
pub(crate) fn check_argument_links(
    function: &FunctionContract,
    position: ArgPosition,
) -> Result<(), ParseErrorKind> {
    let Some(min_size) = function.argument(position).and_then(|a| a.min_size()) else {
        return Ok(());
    };
    match min_size
        .linked()
        .into_iter()
        .find(|linked| function.argument(*linked).is_none())
    {
        Some(linked) => Err(ParseErrorKind::UnresolvedArgument {
            function: function.name().to_string(),
            position: position.get(),
            linked: linked.get(),
        }),
        None => Ok(()),
    }
}

fn malformed(what: &'static str, text: &str) -> ParseErrorKind {
    ParseErrorKind::Malformed {
        what,
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_schema_core::{Declaration, FormatStyle, Nullability, Predicate};

    #[test]
    fn test_function_block() {
        let spec = load_skit(
            "fn fgets\n    ur\n    rv{null} char *\n    1 nn min{argvalue,2}\n    2 nu v{1:}\n    3 nn\n",
        )
        .unwrap();
        let fgets = spec.function("fgets").unwrap();
        assert!(fgets.uses_retval());
        let returns = fgets.returns().unwrap();
        assert_eq!(returns.type_name, "char *");
        assert_eq!(returns.nullability, Nullability::MaybeNull);
        assert_eq!(fgets.arguments().len(), 3);
        assert!(fgets.arguments()[0].min_size().is_some());
    }

    #[test]
    fn test_flags_and_noreturn() {
        let spec = load_skit("FN exit\n    PURE\n    li\n    nr T\n\nfn abort\n    nr false\n")
            .unwrap();
        let exit = spec.function("exit").unwrap();
        assert!(exit.is_pure());
        assert!(exit.is_leak_ignored());
        assert_eq!(exit.noreturn_flag(), Some(true));
        assert_eq!(spec.function("abort").unwrap().noreturn_flag(), Some(false));
    }

    #[test]
    fn test_braced_token_with_spaces() {
        let spec = load_skit("fn printf\n    1 nn fmt{printf} v{0:10, 15}\n").unwrap();
        let arg = &spec.function("printf").unwrap().arguments()[0];
        assert!(arg.has(&Predicate::FormatString(Some(FormatStyle::Printf))));
        assert!(arg.valid_range().unwrap().contains(15));
    }

    #[test]
    fn test_comments_and_single_line_statements() {
        let spec = load_skit("# stdio\n; scratch note\ndef EOF -1\npod FILE\npod int8_t s 1\n")
            .unwrap();
        assert_eq!(spec.len(), 4);
        assert_eq!(
            spec.declarations()[0],
            Declaration::Comment {
                text: "stdio".into()
            }
        );
        assert_eq!(spec.define("EOF").unwrap().value(), "-1");
        let pod = spec.podtype("int8_t").unwrap();
        assert_eq!(pod.sign(), Some(PodSign::Signed));
        assert_eq!(pod.size(), Some(1));
    }

    #[test]
    fn test_define_keeps_expression() {
        let spec = load_skit("def MAX_PATH (4096 + 1)\n").unwrap();
        assert_eq!(spec.define("MAX_PATH").unwrap().value(), "(4096 + 1)");
    }

    #[test]
    fn test_resource_block() {
        let spec = load_skit("mem\n    alloc malloc\n    alloc init calloc\n    dealloc free\n")
            .unwrap();
        let (id, rule) = spec.resource_for("calloc").unwrap();
        assert_eq!(id, 0);
        assert_eq!(rule.kind(), ResourceKind::Memory);
        assert!(rule.allocators()[1].init);
        assert!(rule.deallocates("free"));
    }

    #[test]
    fn test_block_ends_at_blank_line() {
        let err = load_skit("fn a\n    1 nn\n\n    2 nn\n").unwrap_err();
        assert_eq!(err.location, crate::Location::Line(4));
    }

    #[test]
    fn test_decimal_range_bounds() {
        let spec = load_skit("fn sqrt\n    rv double\n    1 nu v{0.0:}\n").unwrap();
        let range = spec.function("sqrt").unwrap().arguments()[0]
            .valid_range()
            .unwrap();
        assert!(range.contains(2.5));
        assert!(!range.contains(-0.5));
        assert_eq!(range.to_string(), "0.0:");

        let err = load_skit("fn f\n    1 v{0.x:}\n").unwrap_err();
        assert_eq!(err.location, crate::Location::Line(2));
        assert_eq!(
            err.kind,
            ParseErrorKind::Schema(SchemaError::MalformedRange("0.x:".into()))
        );
    }

    #[test]
    fn test_unresolved_min_size_is_parse_error() {
        let err = load_skit("fn memset\n    1 nn min{argvalue,99}\n    2 nu\n").unwrap_err();
        assert_eq!(err.location, crate::Location::Line(2));
        assert_eq!(
            err.kind,
            ParseErrorKind::UnresolvedArgument {
                function: "memset".into(),
                position: 1,
                linked: 99,
            }
        );
    }

    #[test]
    fn test_forward_link_resolves() {
        assert!(load_skit("fn f\n    1 min{argvalue,2}\n    2 nu\n").is_ok());
    }

    #[test]
    fn test_structural_errors_carry_line() {
        let err = load_skit("fn f\n    1 nn\n    1 nu\n").unwrap_err();
        assert_eq!(err.location, crate::Location::Line(3));
        assert!(matches!(
            err.kind,
            ParseErrorKind::Schema(SchemaError::DuplicateArgument { .. })
        ));

        let err = load_skit("fn f\n    0 nn\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Schema(SchemaError::InvalidPosition(0)));

        let err = load_skit("fn f\n    -1 nn\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Schema(SchemaError::InvalidPosition(-1)));

        let err = load_skit("fn f\n    1 nn nn\n").unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::Schema(SchemaError::DuplicatePredicate { .. })
        ));
    }

    #[test]
    fn test_duplicate_definitions() {
        let err = load_skit("fn f\n\nfn f\n").unwrap_err();
        assert_eq!(err.location, crate::Location::Line(3));
        assert_eq!(err.kind, ParseErrorKind::Schema(SchemaError::DuplicateFunction("f".into())));

        let err = load_skit("def A 1\ndef A 2\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Schema(SchemaError::DuplicateDefine("A".into())));
    }

    #[test]
    fn test_shared_resource_name_rejected() {
        let text = "res\n    alloc fopen\n    dealloc fclose\n\nres\n    alloc fdopen\n    dealloc fclose\n";
        let err = load_skit(text).unwrap_err();
        assert_eq!(err.location, crate::Location::Line(5));
        assert!(matches!(
            err.kind,
            ParseErrorKind::Schema(SchemaError::ResourceOverlap { owner: 0, .. })
        ));
    }

    #[test]
    fn test_incomplete_resource() {
        let err = load_skit("mem\n    alloc malloc\n").unwrap_err();
        assert_eq!(err.location, crate::Location::Line(1));
        assert_eq!(err.kind, ParseErrorKind::Schema(SchemaError::IncompleteResource("memory")));
    }

    #[test]
    fn test_rejected_statements() {
        let err = load_skit("con\n    size 3\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnsupportedContainer);

        let err = load_skit("func f\n").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnknownStatement(_)));

        let err = load_skit("fn f\n    rv int\n    rv long\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::RepeatedEntry("rv"));

        let err = load_skit("fn f\n    # note\n").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEntry { .. }));

        let err = load_skit("fn f\n    rv\n").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Malformed { .. }));

        let err = load_skit("pod t x\n").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Malformed { .. }));

        let err = load_skit("pod t 0\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Schema(SchemaError::ZeroPodSize("t".into())));
    }

    #[test]
    fn test_split_tokens() {
        assert_eq!(split_tokens(" nn  v{1, 2} s "), vec!["nn", "v{1, 2}", "s"]);
        assert!(split_tokens("").is_empty());
    }
}
