use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const WORDS: &[&str] = &["hello", "world", "the", "cat", "sat", "on", "mat", "fn", "main"];

/// A scratch directory holding an `en_US` dictionary pair and isolated
/// config and data directories.
fn workspace() -> TempDir {
    let dir = tempdir().unwrap();
    let dicts = dir.path().join("dicts");
    fs::create_dir_all(&dicts).unwrap();
    fs::write(dicts.join("en_US.aff"), "SET UTF-8\n").unwrap();
    fs::write(
        dicts.join("en_US.dic"),
        format!("{}\n{}\n", WORDS.len(), WORDS.join("\n")),
    )
    .unwrap();
    dir
}

fn spellscan(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("spellscan").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("XDG_DATA_HOME", dir.join("data"))
        .env_remove("SPELLSCAN_LOG")
        .env_remove("RUST_LOG")
        .arg("--no-color")
        .arg("--dictionary-folder")
        .arg(dir.join("dicts"));
    cmd
}

#[test]
fn clean_file_passes() {
    let dir = workspace();
    fs::write(dir.path().join("notes.txt"), "hello world\n").unwrap();

    spellscan(dir.path())
        .arg("notes.txt")
        .assert()
        .success()
        .stdout(predicate::str::contains("No spelling errors found"));
}

#[test]
fn misspelling_fails_with_suggestion() {
    let dir = workspace();
    fs::write(dir.path().join("notes.txt"), "hello wrold\n").unwrap();

    spellscan(dir.path())
        .arg("notes.txt")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1:7 wrold"))
        .stdout(predicate::str::contains("→ world"));
}

#[test]
fn no_fail_and_ignore_word() {
    let dir = workspace();
    fs::write(dir.path().join("notes.txt"), "hello wrold\n").unwrap();

    spellscan(dir.path())
        .args(["--no-fail", "notes.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 error found in 1 file"));

    spellscan(dir.path())
        .args(["--ignore-word", "wrold", "notes.txt"])
        .assert()
        .success();
}

#[test]
fn only_comments_and_strings_of_code_are_checked() {
    let dir = workspace();
    fs::write(
        dir.path().join("main.rs"),
        "// hello wrold\nfn main() { let xyzzy = \"the cat\"; }\n",
    )
    .unwrap();

    spellscan(dir.path())
        .arg("main.rs")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("wrold"))
        .stdout(predicate::str::contains("xyzzy").not());
}

#[test]
fn json_report() {
    let dir = workspace();
    fs::write(dir.path().join("notes.txt"), "hello wrold\n").unwrap();

    let output = spellscan(dir.path())
        .args(["-o", "json", "notes.txt"])
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["files_checked"], 1);
    assert_eq!(report["total_errors"], 1);
    let error = &report["errors"][0];
    assert_eq!(error["word"], "wrold");
    assert_eq!(error["kind"], "misspelling");
    assert_eq!(error["classification"], "PlainText");
    assert_eq!(error["offset"], 6);
    assert_eq!(error["suggestions"][0], "world");
}

#[test]
fn doubled_words_are_reported_unless_disabled() {
    let dir = workspace();
    fs::write(dir.path().join("notes.txt"), "the the cat\n").unwrap();

    spellscan(dir.path())
        .arg("notes.txt")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("(doubled)"));

    spellscan(dir.path())
        .args(["--no-doubled-words", "notes.txt"])
        .assert()
        .success();
}

#[test]
fn fix_rewrites_the_file() {
    let dir = workspace();
    let path = dir.path().join("notes.txt");
    fs::write(&path, "the the cat sat on teh mat\n").unwrap();

    spellscan(dir.path())
        .args(["--fix", "notes.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 corrections applied"));

    assert_eq!(fs::read_to_string(&path).unwrap(), "the cat sat on the mat\n");
}

#[test]
fn excluded_extension_is_skipped() {
    let dir = workspace();
    fs::write(dir.path().join("image.png"), "wrold wrold\n").unwrap();

    spellscan(dir.path())
        .arg("image.png")
        .assert()
        .success();
}

#[test]
fn directories_are_walked() {
    let dir = workspace();
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("guide.md"), "# hello\n\nwrold\n").unwrap();
    fs::write(docs.join("logo.png"), "wrold\n").unwrap();

    spellscan(dir.path())
        .arg("docs")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("guide.md"))
        .stdout(predicate::str::contains("logo.png").not());
}

#[test]
fn classify_prints_spans() {
    let dir = workspace();
    fs::write(dir.path().join("main.rs"), "// hello\nfn main() {}\n").unwrap();

    spellscan(dir.path())
        .args(["classify", "main.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SingleLineComment"))
        .stdout(predicate::str::contains("\"// hello\""));
}

#[test]
fn missing_dictionary_is_an_error() {
    let dir = workspace();
    fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();

    spellscan(dir.path())
        .args(["-l", "xx_XX", "notes.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no dictionaries could be loaded"));
}

#[test]
fn local_config_file_is_read() {
    let dir = workspace();
    fs::write(dir.path().join("notes.txt"), "hello wrold\n").unwrap();
    fs::write(
        dir.path().join(".spellscan.toml"),
        "ignored_words = [\"wrold\"]\n",
    )
    .unwrap();

    spellscan(dir.path()).arg("notes.txt").assert().success();
}

#[test]
fn completion_script() {
    let dir = workspace();
    spellscan(dir.path())
        .args(["--completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("spellscan"));
}
