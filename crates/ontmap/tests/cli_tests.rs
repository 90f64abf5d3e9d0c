//! CLI integration tests.
//!
//! These tests invoke the `ontmap` binary via `std::process::Command`
//! against the fixture graphs and mapping, and verify the output.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

/// Path to the built binary (set by cargo test).
fn binary_path() -> PathBuf {
    // `cargo test` places the test binary next to the main binary
    let mut path = std::env::current_exe()
        .expect("current_exe")
        .parent()
        .expect("parent")
        .parent()
        .expect("grandparent")
        .to_path_buf();
    path.push("ontmap");
    path
}

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn run(extra: &[&str]) -> Output {
    let schema = fixture("schema.nt");
    let mapping = fixture("mapping.json");
    let input = fixture("people.nt");
    let mut args = vec![
        "--schema",
        schema.as_str(),
        "--mapping",
        mapping.as_str(),
        input.as_str(),
    ];
    args.extend_from_slice(extra);
    Command::new(binary_path())
        .args(&args)
        .output()
        .expect("failed to execute binary")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "ontmap failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("invalid UTF-8")
}

#[test]
fn ntriples_output_is_valid() {
    let stdout = stdout_of(&run(&["-q"]));

    // N-Triples: every non-empty line ends with " ."
    let mut lines = 0;
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        assert!(
            trimmed.ends_with(" ."),
            "N-Triples line does not end with ' .': {trimmed}"
        );
        assert!(
            trimmed.starts_with('<') || trimmed.starts_with("_:"),
            "N-Triples line does not start with a subject: {trimmed}"
        );
        lines += 1;
    }
    assert!(lines > 0, "Expected some triples");
}

#[test]
fn people_become_users() {
    let stdout = stdout_of(&run(&["-q"]));
    let typed = "<http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://tgt.example/User> .";
    assert_eq!(stdout.lines().filter(|l| l.ends_with(typed)).count(), 3);

    for name in ["Ann", "Bob", "Cy"] {
        let line = format!(
            "<http://tgt.example/user/{name}> <http://tgt.example/userName> \"{name}\" ."
        );
        assert!(stdout.contains(&line), "Missing {line} in:\n{stdout}");
    }
    assert!(stdout.contains("<http://tgt.example/user/Ann> <http://tgt.example/fullName> \"Ann Lee\" ."));
}

#[test]
fn status_falls_back_to_default() {
    let stdout = stdout_of(&run(&["-q"]));
    assert!(stdout.contains("<http://tgt.example/user/Ann> <http://tgt.example/status> \"inactive\" ."));
    assert!(stdout.contains("<http://tgt.example/user/Bob> <http://tgt.example/status> \"active\" ."));
    assert!(
        !stdout.contains("<http://tgt.example/user/Ann> <http://tgt.example/status> \"active\" ."),
        "Asserted value must win over the default"
    );
}

#[test]
fn bound_contexts_link_profiles() {
    let stdout = stdout_of(&run(&["-q"]));
    let links: Vec<&str> = stdout
        .lines()
        .filter(|l| l.contains("<http://tgt.example/hasProfile> <urn:uuid:"))
        .collect();
    assert_eq!(links.len(), 3, "Expected one profile per user:\n{stdout}");
}

#[test]
fn turtle_output_has_prefixes() {
    let stdout = stdout_of(&run(&["-f", "turtle", "-q"]));
    assert!(stdout.contains("@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> ."));
    assert!(stdout.contains("@prefix map: <http://ontmap.example/mapping#> ."));
    assert!(
        stdout.contains("<http://tgt.example/user/Ann> a <http://tgt.example/User> ."),
        "Expected `a` for rdf:type:\n{stdout}"
    );
}

#[test]
fn dump_mapping_writes_rules() {
    let stdout = stdout_of(&run(&["--dump-mapping", "-q"]));
    assert!(stdout.contains("<http://ontmap.example/mapping#rule>"));
    assert!(stdout.contains("<http://ontmap.example/mapping#Context>"));
    assert!(
        !stdout.contains("<http://tgt.example/user/Ann>"),
        "Dumping the mapping must not run inference"
    );
}

#[test]
fn output_file_and_config() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.nt");
    let config = dir.path().join("config.json");
    fs::write(
        &config,
        r#"{"generate_named_individuals": true, "base_iri": "http://example.org/m"}"#,
    )
    .unwrap();

    let output = run(&[
        "-o",
        out.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "-q",
    ]);
    assert!(stdout_of(&output).is_empty(), "Output went to the file");

    let written = fs::read_to_string(&out).unwrap();
    let named = "<http://www.w3.org/2002/07/owl#NamedIndividual> .";
    assert_eq!(
        written.lines().filter(|l| l.ends_with(named)).count(),
        6,
        "Users and profiles are named individuals:\n{written}"
    );
}

#[test]
fn unknown_format_fails() {
    let output = run(&["-f", "rdfxml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown format"), "stderr: {stderr}");
}

#[test]
fn invalid_mapping_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mapping = dir.path().join("bad.json");
    fs::write(
        &mapping,
        r#"{"contexts": [{
            "source": "http://src.example/Person",
            "target": "http://tgt.example/User",
            "class_bridge": {"function": "fn:upperCase", "args": {"arg1": "x"}}
        }]}"#,
    )
    .unwrap();

    let output = Command::new(binary_path())
        .args([
            "--schema",
            fixture("schema.nt").as_str(),
            "--mapping",
            mapping.to_str().unwrap(),
            fixture("people.nt").as_str(),
        ])
        .output()
        .expect("failed to execute binary");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CONTEXT_REQUIRE_TARGET_FUNCTION"), "stderr: {stderr}");
}

#[test]
fn summary_goes_to_stderr() {
    let output = run(&[]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Mapped 9 individuals"),
        "Expected summary on stderr: {stderr}"
    );
}

#[test]
fn quiet_suppresses_stderr() {
    let output = run(&["-q"]);
    assert!(output.status.success());
    assert!(output.stderr.is_empty(), "Expected no stderr with -q");
}

#[test]
fn verbose_logs_engine_events() {
    let output = run(&["-v"]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("[INFO] Inference finished"),
        "Expected engine events on stderr: {stderr}"
    );
    assert!(stderr.contains("[DEBUG] Selected rule"), "stderr: {stderr}");
    assert!(!stderr.contains("verbose logging unavailable"), "stderr: {stderr}");
}
