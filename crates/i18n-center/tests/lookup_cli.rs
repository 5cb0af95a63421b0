use assert_cmd::Command;
use i18n_center::Layout;
use predicates::prelude::*;
use std::fs;
use tempfile::{TempDir, tempdir};

fn run_cli(root: &TempDir, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("i18n-center").expect("binary exists");
    cmd.arg("--root").arg(root.path()).args(args);
    cmd.env_remove("I18N_CENTER_ROOT");
    cmd.env("I18N_CENTER_LANG", "it");
    cmd.assert()
}

fn workspace() -> TempDir {
    let tmp = tempdir().expect("temp dir");
    let layout = Layout::new(tmp.path().to_path_buf());
    layout.ensure().expect("layout");
    for (tag, entries) in [
        ("fr", vec![("Hello", "Bonjour")]),
        ("de", vec![("Hello", "Hallo")]),
    ] {
        let mut po = String::new();
        for (msgid, msgstr) in entries {
            po.push_str(&format!("msgid \"{msgid}\"\nmsgstr \"{msgstr}\"\n\n"));
        }
        let path = layout.catalog_path(tag);
        fs::create_dir_all(path.parent().unwrap()).expect("catalog dir");
        fs::write(path, po).expect("write catalog");
    }
    tmp
}

#[test]
fn lookup_prints_language_and_text() {
    let root = workspace();
    run_cli(&root, &["lookup", "Hello", "--lang", "fr-CA,it;q=0.5"])
        .success()
        .stdout("fr\tBonjour\n");
}

#[test]
fn lookup_falls_back_to_default_language() {
    let root = workspace();
    run_cli(&root, &["lookup", "Goodbye", "--lang", "fr"]).success().stdout("en\tGoodbye\n");
}

#[test]
fn lookup_with_limited_passes_can_fail() {
    let root = workspace();
    run_cli(&root, &["lookup", "Hello", "--lang", "de-AT", "--max-passes", "0"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no translation found for 'Hello'"));
    run_cli(&root, &["lookup", "Hello", "--lang", "de-AT", "--max-passes", "2"])
        .success()
        .stdout("de\tHallo\n");
}

#[test]
fn lookup_defaults_to_environment_language() {
    let root = workspace();
    let mut cmd = Command::cargo_bin("i18n-center").expect("binary exists");
    cmd.arg("--root").arg(root.path()).args(["lookup", "Hello"]);
    cmd.env("I18N_CENTER_LANG", "de-CH");
    cmd.assert().success().stdout("de\tHallo\n");
}

#[test]
fn languages_lists_catalogs_and_default() {
    let root = workspace();
    run_cli(&root, &["languages"]).success().stdout("de\nen\nfr\n");
}

#[test]
fn settings_change_default_language() {
    let root = workspace();
    fs::write(root.path().join("config/i18n.toml"), "default_language = \"fr\"\n")
        .expect("write settings");
    run_cli(&root, &["languages"]).success().stdout("de\nfr\n");
    run_cli(&root, &["lookup", "Goodbye"]).success().stdout("fr\tGoodbye\n");
}

#[test]
fn invalid_settings_are_reported() {
    let root = workspace();
    fs::write(root.path().join("config/i18n.toml"), "default_language = \"!!\"\n")
        .expect("write settings");
    run_cli(&root, &["languages"])
        .failure()
        .stderr(predicate::str::contains("invalid language tag '!!'"));
}
