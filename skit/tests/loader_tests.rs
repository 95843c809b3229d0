//! Loading fixture documents and checking them end to end.

use std::fs;
use std::path::PathBuf;

use contract_schema_core::{
    DiagnosticKind, Nullability, ResourceKind, SchemaError, Severity, SpecBuilder,
    ValidateOptions, has_errors, validate,
};
use contract_schema_skit::{
    DocumentFormat, Location, ParseErrorKind, load, load_skit, serialize, to_cppcheck_xml,
    to_skit,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture(name)).expect("fixture should be readable")
}

#[test]
fn test_stdio_fixture_loads() {
    let spec = load_skit(&read_fixture("stdio.skit")).unwrap();

    assert_eq!(spec.function_count(), 6);
    assert_eq!(spec.resource_count(), 1);
    assert_eq!(spec.define("BUFSIZ").unwrap().value(), "8192");
    assert_eq!(
        spec.function("fopen").unwrap().returns().unwrap().nullability,
        Nullability::MaybeNull
    );
    assert_eq!(spec.function("exit").unwrap().noreturn_flag(), Some(true));

    let (_, rule) = spec.resource_for("fdopen").unwrap();
    assert_eq!(rule.kind(), ResourceKind::Resource);
    assert!(rule.deallocates("fclose"));
}

#[test]
fn test_stdio_fixture_validates_clean() {
    let spec = load_skit(&read_fixture("stdio.skit")).unwrap();
    assert!(validate(&spec, &ValidateOptions::default()).is_empty());
}

#[test]
fn test_dropped_comments_are_not_kept() {
    let spec = load_skit(&read_fixture("stdio.skit")).unwrap();
    let text = to_skit(&spec);
    assert!(text.starts_with("# stdio.h subset\n"));
    assert!(!text.contains("opaque"));
}

#[test]
fn test_many_allocators_share_one_deallocator() {
    let spec = load_skit(&read_fixture("bzip2.skit")).unwrap();
    let (open_rule, _) = spec.resource_for("BZ2_bzopen").unwrap();
    let (dopen_rule, _) = spec.resource_for("BZ2_bzdopen").unwrap();
    assert_eq!(open_rule, dopen_rule);
    assert!(validate(&spec, &ValidateOptions::default()).is_empty());
}

#[test]
fn test_unresolved_min_size_fixture() {
    let err = load_skit(&read_fixture("unresolved_link.skit")).unwrap_err();
    assert_eq!(err.location, Location::Line(3));
    assert_eq!(
        err.kind,
        ParseErrorKind::UnresolvedArgument {
            function: "memcpy".into(),
            position: 1,
            linked: 99,
        }
    );
}

#[test]
fn test_yaml_fixture_loads() {
    let spec = load(&read_fixture("posix_io.yaml"), DocumentFormat::Yaml).unwrap();
    assert_eq!(spec.library(), Some("posix_io"));
    assert_eq!(spec.function_count(), 3);
    let close = spec.function("close").unwrap();
    assert!(close.arguments()[0].valid_range().unwrap().contains(0));
    assert!(!close.arguments()[0].valid_range().unwrap().contains(-1));
    assert!(validate(&spec, &ValidateOptions::default()).is_empty());
}

#[test]
fn test_open_close_scenario() {
    let clean = "\
fn open
    ur
    rv int
    1 nn s

fn close
    1 nu

res
    alloc open
    dealloc close
";
    let spec = load_skit(clean).unwrap();
    assert!(validate(&spec, &ValidateOptions::default()).is_empty());

    let with_open2 = clean.replace("    alloc open\n", "    alloc open\n    alloc open2\n");
    let spec = load_skit(&with_open2).unwrap();
    let diagnostics = validate(&spec, &ValidateOptions::default());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(diagnostics[0].subject.name, "open2");
    assert!(matches!(
        diagnostics[0].kind,
        DiagnosticKind::UnknownFunction { .. }
    ));
    assert!(has_errors(&diagnostics));

    let options = ValidateOptions::default().with_external(["open2"]);
    assert!(validate(&spec, &options).is_empty());
}

#[test]
fn test_allocator_in_two_rules_fails_to_load() {
    let text = "\
mem
    alloc malloc
    dealloc free

mem
    alloc malloc
    dealloc cfree
";
    let err = load_skit(text).unwrap_err();
    assert_eq!(err.location, Location::Line(5));
    assert_eq!(
        err.kind,
        ParseErrorKind::Schema(SchemaError::ResourceOverlap {
            name: "malloc".into(),
            owner: 0,
        })
    );
}

#[test]
fn test_inverted_range_fails_to_load() {
    let err = load_skit("fn f\n    1 v{5:1}\n").unwrap_err();
    assert_eq!(
        err.kind,
        ParseErrorKind::Schema(SchemaError::InvertedRange {
            min: "5".into(),
            max: "1".into()
        })
    );
}

#[test]
fn test_roundtrip_fixtures_through_every_format() {
    for name in ["stdio.skit", "bzip2.skit", "math.skit"] {
        let spec = load_skit(&read_fixture(name)).unwrap();
        for format in [DocumentFormat::Skit, DocumentFormat::Json, DocumentFormat::Yaml] {
            let text = serialize(&spec, format).unwrap();
            assert_eq!(load(&text, format).unwrap(), spec, "{name} as {format:?}");
        }
    }
}

#[test]
fn test_yaml_converted_to_skit_keeps_contracts() {
    let spec = load(&read_fixture("posix_io.yaml"), DocumentFormat::Yaml).unwrap();
    let reloaded = load_skit(&to_skit(&spec)).unwrap();

    // SKIT carries no library name; everything else survives.
    assert_eq!(reloaded.library(), None);
    assert_eq!(reloaded.declarations(), spec.declarations());
}

#[test]
fn test_cppcheck_output_for_fixture() {
    let spec = load_skit(&read_fixture("stdio.skit")).unwrap();
    let xml = to_cppcheck_xml(&spec);

    assert!(xml.starts_with("<?xml version=\"1.0\"?>\n<def format=\"2\">\n"));
    assert!(xml.ends_with("</def>\n"));
    assert!(xml.contains("    <!-- stdio.h subset -->\n"));
    assert!(xml.contains("    <podtype name=\"fpos_t\" sign=\"s\" size=\"8\"/>\n"));
    assert!(xml.contains("        <returnValue type=\"FILE *\"/>\n"));
    assert!(xml.contains("        <noreturn>true</noreturn>\n"));
    assert!(xml.contains(
        "        <arg nr=\"2\"><not-null/><strz/><formatstr type=\"printf\"/></arg>\n"
    ));
    assert_eq!(xml.matches("<function name=").count(), 6);
}

#[test]
fn test_math_fixture_keeps_decimal_ranges() {
    let text = read_fixture("math.skit");
    let spec = load_skit(&text).unwrap();

    let acos = spec.function("acos").unwrap();
    let range = acos.arguments()[0].valid_range().unwrap();
    assert!(range.contains(0.5));
    assert!(!range.contains(1.5));
    assert_eq!(to_skit(&spec), text);

    let xml = to_cppcheck_xml(&spec);
    assert!(xml.contains("<valid>0.0:</valid>"));
    assert!(xml.contains("<valid>-1.0:1.0</valid>"));
    assert!(xml.contains("    <!-- math.h - - - domain checks -->\n"));
    assert!(validate(&spec, &ValidateOptions::default()).is_empty());
}

#[test]
fn test_loaded_spec_is_shareable_across_threads() {
    let spec = load_skit(&read_fixture("stdio.skit")).unwrap();
    let spec = std::sync::Arc::new(spec);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let spec = std::sync::Arc::clone(&spec);
            std::thread::spawn(move || validate(&spec, &ValidateOptions::default()).len())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 0);
    }
}

#[test]
fn test_builder_spec_matches_loaded_spec() {
    let loaded = load_skit("def EOF -1\n").unwrap();
    let mut builder = SpecBuilder::new();
    builder
        .define(contract_schema_core::ConstantDefine::new("EOF", "-1").unwrap())
        .unwrap();
    assert_eq!(builder.build(), loaded);
}
