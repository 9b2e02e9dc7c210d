//! `glr config-hash`
//!
//! GREEN when:
//! - the hash and canonical JSON are printed for layered files
//! - a literal secret aborts with CONFIG_SECRET_DETECTED
//! - --strict turns an unknown key into CONFIG_UNUSED_KEYS

use predicates::prelude::*;

fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let p = dir.path().join(name);
    std::fs::write(&p, body).unwrap();
    p.to_string_lossy().into_owned()
}

#[test]
fn prints_hash_and_canonical_json() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(&dir, "base.yaml", "directory:\n  page_size: 1000\n  api_base_url: https://api.example.com\n");
    let overlay = write(&dir, "local.yaml", "directory:\n  page_size: 500\n");

    let mut cmd = assert_cmd::Command::cargo_bin("glr").unwrap();
    cmd.current_dir(dir.path()).args(["config-hash", &base, &overlay]);
    cmd.assert()
        .success()
        .stdout(predicate::str::is_match("config_hash=[0-9a-f]{64}").unwrap())
        .stdout(predicate::str::contains(
            r#"{"directory":{"api_base_url":"https://api.example.com","page_size":500}}"#,
        ));
}

#[test]
fn literal_secret_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(
        &dir,
        "bad.yaml",
        "directory:\n  credentials_env:\n    password: \"ghp_abcdefghijklmnop\"\n",
    );

    let mut cmd = assert_cmd::Command::cargo_bin("glr").unwrap();
    cmd.current_dir(dir.path()).args(["config-hash", &bad]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("ghp_abcdefghijklmnop").not());
}

#[test]
fn strict_mode_fails_on_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(&dir, "cfg.yaml", "gates:\n  max_sampel: 50\n");

    let mut warn = assert_cmd::Command::cargo_bin("glr").unwrap();
    warn.current_dir(dir.path()).args(["config-hash", &cfg]);
    warn.assert().success();

    let mut strict = assert_cmd::Command::cargo_bin("glr").unwrap();
    strict.current_dir(dir.path()).args(["config-hash", "--strict", &cfg]);
    strict
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"))
        .stderr(predicate::str::contains("/gates/max_sampel"));
}
