//! Cppcheck library configuration (`format="2"`) output.
//!
//! The emitted XML is what `cppcheck --library=<file>` consumes. Only the
//! subset of the format that contracts can express is produced; return
//! value nullability has no Cppcheck counterpart and is left out.

use contract_schema_core::{
    ArgumentConstraint, ContractSpec, Declaration, FunctionContract, Predicate, ResourceKind,
    ResourceRule,
};
use tracing::debug;

const DECLARATION_INDENT: &str = "    ";
const ENTRY_INDENT: &str = "        ";

/// Renders `spec` as a Cppcheck library file.
///
/// # Examples
///
/// ```
/// use contract_schema_skit::{load_skit, to_cppcheck_xml};
///
/// let spec = load_skit("def EOF -1\n").unwrap();
/// assert_eq!(
///     to_cppcheck_xml(&spec),
///     "<?xml version=\"1.0\"?>\n<def format=\"2\">\n    <define name=\"EOF\" value=\"-1\"/>\n</def>\n"
/// );
/// ```
pub fn to_cppcheck_xml(spec: &ContractSpec) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<def format=\"2\">\n");

    let mut previous_was_block = false;
    for (index, declaration) in spec.declarations().iter().enumerate() {
        let is_block = matches!(
            declaration,
            Declaration::Function(_) | Declaration::Resource(_)
        );
        if index > 0 && (is_block || previous_was_block) {
            out.push('\n');
        }
        previous_was_block = is_block;

        match declaration {
            Declaration::Comment { text } => out.push_str(&format!(
                "{DECLARATION_INDENT}<!-- {} -->\n",
                comment_body(text.trim())
            )),
            Declaration::Define(define) => out.push_str(&format!(
                "{DECLARATION_INDENT}<define name=\"{}\" value=\"{}\"/>\n",
                escape(define.name()),
                escape(define.value())
            )),
            Declaration::Podtype(pod) => {
                out.push_str(&format!(
                    "{DECLARATION_INDENT}<podtype name=\"{}\"",
                    escape(pod.name())
                ));
                if let Some(sign) = pod.sign() {
                    out.push_str(&format!(" sign=\"{}\"", sign.as_letter()));
                }
                if let Some(size) = pod.size() {
                    out.push_str(&format!(" size=\"{size}\""));
                }
                out.push_str("/>\n");
            }
            Declaration::Function(function) => write_function(&mut out, function),
            Declaration::Resource(rule) => write_resource(&mut out, rule),
        }
    }

    out.push_str("</def>\n");
    debug!(
        declarations = spec.len(),
        bytes = out.len(),
        "Rendered Cppcheck library"
    );
    out
}

fn write_function(out: &mut String, function: &FunctionContract) {
    out.push_str(&format!(
        "{DECLARATION_INDENT}<function name=\"{}\">\n",
        escape(function.name())
    ));

    let mut entry = |text: &str| {
        out.push_str(ENTRY_INDENT);
        out.push_str(text);
        out.push('\n');
    };
    if function.is_pure() {
        entry("<pure/>");
    }
    if function.is_const() {
        entry("<const/>");
    }
    if function.is_leak_ignored() {
        entry("<leak-ignore/>");
    }
    if function.uses_retval() {
        entry("<use-retval/>");
    }
    if let Some(returns) = function.returns() {
        entry(&format!(
            "<returnValue type=\"{}\"/>",
            escape(returns.type_name.trim())
        ));
    }
    if let Some(noreturn) = function.noreturn_flag() {
        entry(&format!("<noreturn>{noreturn}</noreturn>"));
    }
    for argument in function.arguments() {
        entry(&argument_element(argument));
    }

    out.push_str(&format!("{DECLARATION_INDENT}</function>\n"));
}

fn argument_element(argument: &ArgumentConstraint) -> String {
    let mut element = format!("<arg nr=\"{}\">", argument.position());
    for predicate in argument.predicates() {
        match predicate {
            Predicate::NotNull => element.push_str("<not-null/>"),
            Predicate::NotUninit => element.push_str("<not-uninit/>"),
            Predicate::NotBool => element.push_str("<not-bool/>"),
            Predicate::StringTerminated => element.push_str("<strz/>"),
            Predicate::FormatString(None) => element.push_str("<formatstr/>"),
            Predicate::FormatString(Some(style)) => {
                element.push_str(&format!("<formatstr type=\"{}\"/>", style.as_str()));
            }
            Predicate::MinSize(min) => {
                let linked = min.linked();
                element.push_str(&format!(
                    "<minsize type=\"{}\" arg=\"{}\"",
                    min.kind().as_str(),
                    linked[0]
                ));
                if let Some(arg2) = linked.get(1) {
                    element.push_str(&format!(" arg2=\"{arg2}\""));
                }
                element.push_str("/>");
            }
            Predicate::ValidRange(ranges) => {
                element.push_str(&format!("<valid>{ranges}</valid>"));
            }
        }
    }
    element.push_str("</arg>");
    element
}

fn write_resource(out: &mut String, rule: &ResourceRule) {
    let tag = match rule.kind() {
        ResourceKind::Memory => "memory",
        ResourceKind::Resource => "resource",
    };
    out.push_str(&format!("{DECLARATION_INDENT}<{tag}>\n"));
    for allocator in rule.allocators() {
        out.push_str(&format!(
            "{ENTRY_INDENT}<alloc init=\"{}\">{}</alloc>\n",
            allocator.init,
            escape(&allocator.name)
        ));
    }
    for name in rule.deallocators() {
        out.push_str(&format!("{ENTRY_INDENT}<dealloc>{}</dealloc>\n", escape(name)));
    }
    out.push_str(&format!("{DECLARATION_INDENT}</{tag}>\n"));
}

/// Escapes the five XML special characters.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Splits every run of dashes so no `--` reaches the comment body.
fn comment_body(text: &str) -> String {
    let mut body = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '-' && body.ends_with('-') {
            body.push(' ');
        }
        body.push(ch);
    }
    body
}
