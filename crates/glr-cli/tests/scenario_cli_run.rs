//! `glr run` and `glr db`
//!
//! GREEN when:
//! - a run against a mock OData server prints the summary and risk score
//! - a run with no base URL fails before any request
//! - a run with unset credential env vars fails naming the var
//! - a directory error fails the run with "Run failed"
//! - db commands without GLR_DATABASE_URL fail naming the variable

use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;

fn write_config(dir: &tempfile::TempDir, api_base_url: &str, user_var: &str, pass_var: &str) -> String {
    let p = dir.path().join("glr.yaml");
    let body = format!(
        "directory:\n  api_base_url: \"{api_base_url}\"\n  timeout_secs: 5\n  credentials_env:\n    username: \"{user_var}\"\n    password: \"{pass_var}\"\nscope:\n  instance_url: \"https://hcm.example.com\"\n"
    );
    std::fs::write(&p, body).unwrap();
    p.to_string_lossy().into_owned()
}

fn glr(dir: &tempfile::TempDir) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("glr").unwrap();
    cmd.current_dir(dir.path()).env_remove("GLR_DATABASE_URL");
    cmd
}

fn job(user_id: &str, code: &str, label: &str, manager: &str) -> serde_json::Value {
    json!({
        "userId": user_id,
        "managerId": manager,
        "company": "ACME",
        "businessUnit": "CORP",
        "division": "OPS",
        "department": "HR",
        "location": "NYC",
        "emplStatus": code,
        "emplStatusNav": {"id": code, "externalCode": code, "label_defaultValue": label},
    })
}

#[test]
fn run_against_mock_directory_prints_summary() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/odata/v2/User");
        then.status(200).json_body(json!({"d": {"results": [
            {"userId": "U1", "status": "active", "email": "a@x.com", "username": "u1"},
            {"userId": "U2", "status": "active", "email": "b@x.com", "username": "u2"},
        ]}}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/odata/v2/EmpJob");
        then.status(200).json_body(json!({"d": {"results": [
            job("U1", "A", "Active", "M1"),
            job("U2", "A", "Active", ""),
        ]}}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/odata/v2/EmpEmployment");
        then.status(200).json_body(json!({"d": {"results": [
            {"userId": "U1", "isContingentWorker": false},
            {"userId": "U2", "isContingentWorker": true},
        ]}}));
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(&dir, &server.base_url(), "GLR_CLI_TEST_USER", "GLR_CLI_TEST_PASS");

    glr(&dir)
        .env("GLR_CLI_TEST_USER", "svc")
        .env("GLR_CLI_TEST_PASS", "pw")
        .args(["run", "--config", &cfg, "--company-id", "ACME"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scope_key=https://hcm.example.com"))
        .stdout(predicate::str::contains("active_users=2 inactive_users=0"))
        .stdout(predicate::str::contains("missing_manager=1"))
        .stdout(predicate::str::contains("contingent_workers=1"))
        // 1 of 2 missing a manager: the manager component hits its cap of 40.
        .stdout(predicate::str::contains("risk_score=40"));
}

#[test]
fn run_without_base_url_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(&dir, "", "GLR_CLI_TEST_USER_2", "GLR_CLI_TEST_PASS_2");

    glr(&dir)
        .env("GLR_CLI_TEST_USER_2", "svc")
        .env("GLR_CLI_TEST_PASS_2", "pw")
        .args(["run", "--config", &cfg])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing api_base_url"));
}

#[test]
fn run_without_credentials_names_env_var() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(&dir, "https://api.example.com", "GLR_CLI_TEST_USER_3", "GLR_CLI_TEST_PASS_3");

    glr(&dir)
        .env("GLR_CLI_TEST_USER_3", "svc")
        .env_remove("GLR_CLI_TEST_PASS_3")
        .args(["run", "--config", &cfg])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING"))
        .stderr(predicate::str::contains("GLR_CLI_TEST_PASS_3"));
}

#[test]
fn directory_auth_failure_fails_the_run() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/odata/v2/User");
        then.status(401).body("Unauthorized");
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(&dir, &server.base_url(), "GLR_CLI_TEST_USER_4", "GLR_CLI_TEST_PASS_4");

    glr(&dir)
        .env("GLR_CLI_TEST_USER_4", "svc")
        .env("GLR_CLI_TEST_PASS_4", "pw-9f3k2x")
        .args(["run", "--config", &cfg])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Run failed"))
        .stderr(predicate::str::contains("User"))
        .stderr(predicate::str::contains("pw-9f3k2x").not());
}

#[test]
fn db_status_without_url_names_the_variable() {
    let dir = tempfile::tempdir().unwrap();
    glr(&dir)
        .args(["db", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GLR_DATABASE_URL"));
}
