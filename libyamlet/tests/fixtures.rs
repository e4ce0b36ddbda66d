//! Test harness for the loading pipeline against fixture files.
//!
//! Every test/yaml/NAME.yaml is parsed and its events are compared, one line
//! per event, with test/events/NAME.events; the file must also compose
//! without error. Every test/nay/NAME.nay must fail to load as a single
//! document, and the error must contain the text of test/nay/NAME.error.
//! Fixtures are read as bytes so encodings other than UTF-8 are covered.

use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use libyamlet::{
    compose, tags, Composer, Document, LoadSettings, NodeKind, Parser, Result, Scanner,
    StreamReader,
};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crate lives inside the workspace")
        .join("test")
}

/// All fixture files matching `pattern` under the test root, sorted.
fn fixture_files(pattern: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(pattern);
    let mut files: Vec<PathBuf> = glob(&pattern.to_string_lossy())
        .expect("valid glob pattern")
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();
    files
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Read the expected output next to a fixture: `subdir/STEM.ext`.
fn read_expected(path: &Path, subdir: &str, ext: &str) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().to_string();
    let expected = path
        .parent()?
        .parent()?
        .join(subdir)
        .join(format!("{}.{}", stem, ext));
    fs::read_to_string(expected).ok()
}

fn parser_for(bytes: Vec<u8>, settings: &LoadSettings) -> Parser {
    let reader = StreamReader::new(bytes, settings);
    Parser::new(Scanner::new(reader, settings))
}

/// Run a single .yaml test file (expected to load).
fn run_yaml_test(path: &Path) -> std::result::Result<(), String> {
    let filename = file_name(path);
    let bytes = fs::read(path).map_err(|e| format!("Failed to read {}: {}", filename, e))?;
    let settings = LoadSettings::new(Some(&filename));

    let events: Vec<String> = parser_for(bytes.clone(), &settings)
        .map(|event| event.map(|e| e.to_string()))
        .collect::<Result<_>>()
        .map_err(|e| format!("{}: Unexpected parse error: {}", filename, e))?;

    let documents: Vec<Document> = Composer::new(parser_for(bytes, &settings), &settings)
        .collect::<Result<_>>()
        .map_err(|e| format!("{}: Unexpected compose error: {}", filename, e))?;

    match read_expected(path, "events", "events") {
        Some(expected) => {
            let expected: Vec<&str> = expected.lines().map(str::trim_end).collect();
            if events != expected {
                return Err(format!(
                    "{}: Event mismatch\n    expected: {:?}\n    actual:   {:?}",
                    filename, expected, events
                ));
            }
            println!("  {} => {} events, {} documents", filename, events.len(), documents.len());
        }
        None => println!("  {} => {:?} (no expected events)", filename, events),
    }
    Ok(())
}

/// Run a single .nay test file (expected to fail with a specific error).
fn run_nay_test(path: &Path) -> std::result::Result<(), String> {
    let filename = file_name(path);
    let bytes = fs::read(path).map_err(|e| format!("Failed to read {}: {}", filename, e))?;
    let settings = LoadSettings::new(Some(&filename));

    let mut composer = Composer::new(parser_for(bytes, &settings), &settings);
    match composer.get_single_node() {
        Ok(document) => Err(format!(
            "{}: Expected load error, but got success: {:?}",
            filename,
            document.root_node()
        )),
        Err(e) => {
            let actual_error = e.to_string();
            let location = format!("in \"{}\"", filename);
            if !actual_error.contains(&location) {
                return Err(format!(
                    "{}: Error does not name the file\n    actual: {}",
                    filename, actual_error
                ));
            }
            match read_expected(path, "nay", "error") {
                Some(expected) => {
                    let expected = expected.trim();
                    if actual_error.contains(expected) {
                        println!("  {} => error (as expected)", filename);
                        Ok(())
                    } else {
                        Err(format!(
                            "{}: Error mismatch\n    expected: {}\n    actual:   {}",
                            filename, expected, actual_error
                        ))
                    }
                }
                None => {
                    println!(
                        "  {} => error: {} (no .error file to compare)",
                        filename, actual_error
                    );
                    Ok(())
                }
            }
        }
    }
}

fn run_all(kind: &str, files: &[PathBuf], run: fn(&Path) -> std::result::Result<(), String>) {
    assert!(!files.is_empty(), "No .{} test files found!", kind);

    println!("\nRunning {} .{} test files:", files.len(), kind);

    let mut passed = 0;
    let mut failed = 0;
    let mut errors: Vec<String> = Vec::new();

    for file in files {
        match run(file) {
            Ok(()) => passed += 1,
            Err(e) => {
                failed += 1;
                errors.push(e);
            }
        }
    }

    println!("\nResults: {} passed, {} failed", passed, failed);

    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    assert!(failed == 0, "{} .{} tests failed", failed, kind);
}

#[test]
fn test_all_yaml_fixtures() {
    run_all("yaml", &fixture_files("yaml/*.yaml"), run_yaml_test);
}

#[test]
fn test_all_nay_fixtures() {
    run_all("nay", &fixture_files("nay/*.nay"), run_nay_test);
}

#[test]
fn test_every_yaml_fixture_has_events() {
    for path in fixture_files("yaml/*.yaml") {
        assert!(
            read_expected(&path, "events", "events").is_some(),
            "{} has no .events file",
            file_name(&path)
        );
    }
}

// ============================================================================
// Composed node spot checks
// ============================================================================

fn scalar_at<'a>(doc: &'a Document, key: &str) -> (&'a str, &'a str) {
    let id = doc.get_value(doc.root(), key).expect("key present");
    let node = &doc[id];
    (node.as_str().expect("scalar value"), node.tag.as_str())
}

#[test]
fn test_core_schema_tags() {
    let doc = compose("n: ~\nb: true\ni: 0x1F\nf: -1.5e3\ns: hello\nq: '42'\n").unwrap();
    assert_eq!(scalar_at(&doc, "n"), ("~", tags::NULL));
    assert_eq!(scalar_at(&doc, "b"), ("true", tags::BOOL));
    assert_eq!(scalar_at(&doc, "i"), ("0x1F", tags::INT));
    assert_eq!(scalar_at(&doc, "f"), ("-1.5e3", tags::FLOAT));
    assert_eq!(scalar_at(&doc, "s"), ("hello", tags::STR));
    assert_eq!(scalar_at(&doc, "q"), ("42", tags::STR));
}

#[test]
fn test_alias_shares_node() {
    let doc = compose("a: &x [1, 2]\nb: *x\n").unwrap();
    let a = doc.get_value(doc.root(), "a").unwrap();
    let b = doc.get_value(doc.root(), "b").unwrap();
    assert_eq!(a, b);
    assert_eq!(doc[a].items().map(<[_]>::len), Some(2));
}

#[test]
fn test_recursive_mapping() {
    let doc = compose("&r {self: *r}").unwrap();
    let root = doc.root();
    assert!(doc[root].recursive);
    assert_eq!(doc.get_value(root, "self"), Some(root));
}

#[test]
fn test_flow_style_survives_composition() {
    let doc = compose("outer:\n  inner: {k: v}\n").unwrap();
    let outer = doc.get_value(doc.root(), "outer").unwrap();
    let inner = doc.get_value(outer, "inner").unwrap();
    assert!(matches!(
        doc[outer].kind,
        NodeKind::Mapping {
            flow_style: libyamlet::FlowStyle::Block,
            ..
        }
    ));
    assert!(matches!(
        doc[inner].kind,
        NodeKind::Mapping {
            flow_style: libyamlet::FlowStyle::Flow,
            ..
        }
    ));
}

#[test]
fn test_error_marks_point_at_problem() {
    let err = compose("a: 1\nb: [x, *missing]\n").unwrap_err();
    let mark = err.problem_mark().unwrap();
    assert_eq!((mark.line, mark.column), (1, 7));
}
