//! Canonical SKIT output.

use contract_schema_core::{
    ContractSpec, Declaration, FunctionContract, Nullability, Predicate, ResourceKind, ResourceRule,
};

use crate::parser::predicate_token;

const INDENT: &str = "    ";

/// Writes `spec` as SKIT text that [`load_skit`](crate::load_skit) reads
/// back to an equal spec.
///
/// Declarations are separated by blank lines. Function entries come in a
/// fixed order (flags, return value, arguments by position) so two equal
/// specs always produce the same text. SKIT has no library name, so it is
/// not written.
///
/// # Examples
///
/// ```
/// use contract_schema_skit::{load_skit, to_skit};
///
/// let spec = load_skit("fn free\n    1 nu\n\nmem\n    alloc malloc\n    dealloc free\n").unwrap();
/// let text = to_skit(&spec);
/// assert_eq!(load_skit(&text).unwrap(), spec);
/// ```
pub fn to_skit(spec: &ContractSpec) -> String {
    let blocks: Vec<String> = spec.declarations().iter().map(declaration_text).collect();
    let mut out = blocks.join("\n");
    if out.is_empty() {
        return out;
    }
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

fn declaration_text(declaration: &Declaration) -> String {
    match declaration {
        Declaration::Comment { text } => comment_line(text),
        Declaration::Define(define) => format!("def {} {}\n", define.name(), define.value()),
        Declaration::Podtype(pod) => {
            let mut line = format!("pod {}", pod.name());
            if let Some(sign) = pod.sign() {
                line.push(' ');
                line.push_str(sign.as_letter());
            }
            if let Some(size) = pod.size() {
                line.push_str(&format!(" {size}"));
            }
            line.push('\n');
            line
        }
        Declaration::Function(function) => function_block(function),
        Declaration::Resource(rule) => resource_block(rule),
    }
}

fn comment_line(text: &str) -> String {
    match text.trim() {
        "" => "#\n".to_string(),
        text => format!("# {text}\n"),
    }
}

/// Canonical predicate order on an argument line.
fn predicate_rank(predicate: &Predicate) -> u8 {
    match predicate {
        Predicate::NotNull => 0,
        Predicate::NotUninit => 1,
        Predicate::NotBool => 2,
        Predicate::StringTerminated => 3,
        Predicate::FormatString(_) => 4,
        Predicate::MinSize(_) => 5,
        Predicate::ValidRange(_) => 6,
    }
}

fn function_block(function: &FunctionContract) -> String {
    let mut out = format!("fn {}\n", function.name());
    let mut entry = |text: &str| {
        out.push_str(INDENT);
        out.push_str(text);
        out.push('\n');
    };

    if function.is_pure() {
        entry("pure");
    }
    if function.is_const() {
        entry("const");
    }
    if function.is_leak_ignored() {
        entry("li");
    }
    if function.uses_retval() {
        entry("ur");
    }
    match function.noreturn_flag() {
        Some(true) => entry("nr t"),
        Some(false) => entry("nr f"),
        None => {}
    }
    if let Some(returns) = function.returns() {
        let flag = match returns.nullability {
            Nullability::Unspecified => "",
            Nullability::NotNull => "{nn}",
            Nullability::MaybeNull => "{null}",
        };
        entry(&format!("rv{flag} {}", returns.type_name.trim()));
    }
    for argument in function.arguments() {
        let mut line = argument.position().to_string();
        let mut predicates: Vec<&Predicate> = argument.predicates().iter().collect();
        predicates.sort_by_key(|p| predicate_rank(p));
        for predicate in predicates {
            line.push(' ');
            line.push_str(&predicate_token(predicate));
        }
        entry(&line);
    }
    out
}

fn resource_block(rule: &ResourceRule) -> String {
    let keyword = match rule.kind() {
        ResourceKind::Memory => "mem",
        ResourceKind::Resource => "res",
    };
    let mut out = format!("{keyword}\n");
    for allocator in rule.allocators() {
        let init = if allocator.init { "init " } else { "" };
        out.push_str(&format!("{INDENT}alloc {init}{}\n", allocator.name));
    }
    for name in rule.deallocators() {
        out.push_str(&format!("{INDENT}dealloc {name}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_skit;

    const STDIO: &str = "\
# stdio subset

def EOF -1

pod FILE

fn fopen
    ur
    rv{null} FILE *
    1 nn s
    2 nn s

fn fclose
    1 nn nu

fn fread
    ur
    rv size_t
    1 nn min{mul,2,3}
    2 nu v{0:}
    3 nu v{0:}
    4 nn nu

res
    alloc fopen
    dealloc fclose
";

    #[test]
    fn test_canonical_text_is_stable() {
        let spec = load_skit(STDIO).unwrap();
        assert_eq!(to_skit(&spec), STDIO);
    }

    #[test]
    fn test_roundtrip_after_reordering() {
        let messy = "fn f\n  2 nu\n  rv{nn} int *\n  nr f\n  CONST\n  1 s nn\n";
        let spec = load_skit(messy).unwrap();
        let text = to_skit(&spec);
        assert_eq!(text, "fn f\n    const\n    nr f\n    rv{nn} int *\n    1 nn s\n    2 nu\n");
        assert_eq!(load_skit(&text).unwrap(), spec);
    }

    #[test]
    fn test_initializing_allocator() {
        let spec = load_skit("mem\n    alloc init calloc\n    dealloc free\n").unwrap();
        assert!(to_skit(&spec).contains("    alloc init calloc\n"));
    }

    #[test]
    fn test_structured_documents_roundtrip_through_skit() {
        let spec = crate::load_json(
            r#"{"declarations": [
                {"type": "comment", "text": "line one\nline two"},
                {"type": "comment", "text": ""},
                {"type": "define", "name": " LIMIT ", "value": " 1 + 2 "},
                {"type": "function", "name": "sqrt", "returns": {"type": " double "},
                 "arguments": [{"position": 1, "predicates": [{"valid_range": "0.0:"}]}]},
                {"type": "function", "name": "dealloc_all"},
                {"type": "resource", "kind": "memory",
                 "allocators": [{"name": " init "}], "deallocators": ["dealloc_all"]}
            ]}"#,
        )
        .unwrap();
        let text = to_skit(&spec);
        assert!(text.starts_with("# line one\n\n# line two\n\n#\n\ndef LIMIT 1 + 2\n"));
        assert!(text.contains("    rv double\n    1 v{0.0:}\n"));
        assert!(text.contains("    alloc init\n"));
        assert_eq!(load_skit(&text).unwrap(), spec);
    }

    #[test]
    fn test_names_skit_cannot_hold_fail_to_load() {
        for declaration in [
            r#"{"type": "define", "name": "A B", "value": "1"}"#,
            r#"{"type": "podtype", "name": "long long"}"#,
            r#"{"type": "function", "name": "f g"}"#,
            r#"{"type": "define", "name": "A", "value": "1\n2"}"#,
            r#"{"type": "function", "name": "f", "returns": {"type": "int\nlong"}}"#,
        ] {
            let json = format!(r#"{{"declarations": [{declaration}]}}"#);
            assert!(crate::load_json(&json).is_err(), "{declaration}");
        }
    }

    #[test]
    fn test_empty_spec() {
        assert_eq!(to_skit(&ContractSpec::default()), "");
    }
}
