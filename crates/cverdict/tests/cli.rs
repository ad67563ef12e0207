use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

fn cverdict() -> Command {
    Command::cargo_bin("cverdict").unwrap()
}

#[test]
fn valid_file_exits_zero() {
    cverdict()
        .arg(fixture("valid/hello.c"))
        .assert()
        .success()
        .stdout(predicate::str::ends_with("hello.c: valid\n"));
}

#[test]
fn invalid_file_exits_one_with_text_report() {
    cverdict()
        .arg(fixture("invalid/broken.c"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "broken.c:8:28: error: SyntaxError — expected ';' before 'char'",
        ))
        .stdout(predicate::str::contains(
            "broken.c:11:21: warning: PossibleResourceLeak",
        ))
        .stdout(predicate::str::contains("broken.c:16:27: error: UninitializedRead"))
        .stdout(predicate::str::contains("broken.c:19:1: error: MissingReturn"))
        .stdout(predicate::str::contains("invalid (3 errors, 1 warnings)"));
}

#[test]
fn unreadable_input_exits_two() {
    let dir = tempdir().unwrap();
    cverdict()
        .arg(dir.path().join("missing.c"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn empty_input_exits_two() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.c");
    fs::write(&path, "   \n").unwrap();
    cverdict()
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("is empty"));
}

#[test]
fn strict_mode_fails_on_leak_warning() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("leak.c");
    fs::write(&path, "void f(void) {\n    char *p = malloc(4);\n}\n").unwrap();

    cverdict().arg(&path).assert().success();
    cverdict().arg("--strict").arg(&path).assert().code(1);
    cverdict().arg("--no-leak").arg("--strict").arg(&path).assert().success();
}

#[test]
fn custom_allocator_pairs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.c");
    fs::write(
        &path,
        "void f(void) {\n    char *p = pool_get(4);\n    pool_put(p);\n    char *q = pool_get(8);\n}\n",
    )
    .unwrap();

    cverdict()
        .args(["--alloc", "pool_get", "--release", "pool_put"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("pool.c:4:15: warning: PossibleResourceLeak"))
        .stdout(predicate::str::contains("bound to 'p'").not());
}

#[test]
fn project_settings_file_is_applied() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("leak.c");
    fs::write(&path, "void f(void) {\n    char *p = malloc(4);\n}\n").unwrap();
    fs::write(dir.path().join(".cverdict.json"), r#"{ "strict": true }"#).unwrap();

    cverdict()
        .current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .arg("leak.c")
        .assert()
        .code(1);

    let lenient = dir.path().join("lenient.json");
    fs::write(&lenient, r#"{ "strict": false }"#).unwrap();
    cverdict()
        .current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .arg("--config")
        .arg(&lenient)
        .arg("leak.c")
        .assert()
        .success();

    // flags still win over the files
    cverdict()
        .current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .arg("--config")
        .arg(&lenient)
        .arg("--strict")
        .arg("leak.c")
        .assert()
        .code(1);
}

#[test]
fn malformed_settings_file_exits_two() {
    let dir = tempdir().unwrap();
    let settings = dir.path().join("bad.json");
    fs::write(&settings, r#"{ "c": { "check_memory": true } }"#).unwrap();

    cverdict()
        .env("XDG_CONFIG_HOME", dir.path())
        .arg("--config")
        .arg(&settings)
        .arg(fixture("valid/hello.c"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid config file"));
}

#[test]
fn several_files_keep_input_order_with_jobs() {
    let dir = tempdir().unwrap();
    let mut args = vec!["--jobs".to_string(), "3".to_string()];
    for i in 0..5 {
        let path = dir.path().join(format!("f{i}.c"));
        fs::write(&path, format!("int f{i}(void) {{ return {i}; }}\n")).unwrap();
        args.push(path.display().to_string());
    }
    args.push(fixture("invalid/broken.c").display().to_string());

    let output = cverdict().args(&args).output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let summaries: Vec<_> = stdout
        .lines()
        .filter(|line| line.ends_with(": valid") || line.contains(": invalid ("))
        .collect();
    assert_eq!(summaries.len(), 6);
    for (i, line) in summaries.iter().take(5).enumerate() {
        assert!(line.contains(&format!("f{i}.c")), "{line}");
    }
    assert!(summaries[5].contains("broken.c: invalid"));
}

#[test]
fn rich_format_shows_source() {
    cverdict()
        .args(["--format", "rich"])
        .arg(fixture("invalid/broken.c"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("printf(\"Value: %d\\n\", value);"))
        .stdout(predicate::str::contains("MissingReturn"));
}

#[test]
fn dumps_go_to_stderr() {
    cverdict()
        .args(["--dump-tokens", "--dump-ast", "--verbose"])
        .arg(fixture("valid/hello.c"))
        .assert()
        .success()
        .stderr(predicate::str::contains("=== C Tokens ==="))
        .stderr(predicate::str::contains("=== C AST ==="))
        .stderr(predicate::str::contains("Parsing C..."));
}
