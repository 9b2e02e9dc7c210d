//! Config hash stability.
//!
//! GREEN when:
//! - the same input hashes identically across loads
//! - key order in YAML does not change the hash
//! - an overriding layer changes the hash and the merged values
//! - empty layers are ignored

use glr_config::{load_layered_yaml, load_layered_yaml_from_strings};

const BASE_YAML: &str = r#"
directory:
  api_base_url: "https://api.example.com"
  page_size: 1000
  credentials_env:
    username: "SF_USERNAME"
    password: "SF_PASSWORD"
gates:
  max_sample: 200
"#;

const BASE_YAML_REORDERED: &str = r#"
gates:
  max_sample: 200
directory:
  credentials_env:
    password: "SF_PASSWORD"
    username: "SF_USERNAME"
  page_size: 1000
  api_base_url: "https://api.example.com"
"#;

const OVERLAY_YAML: &str = r#"
directory:
  page_size: 500
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, layered.config_hash);
    assert_eq!(layered.config_json["directory"]["page_size"], 500);
    assert_eq!(
        layered.config_json["directory"]["api_base_url"],
        "https://api.example.com"
    );
}

#[test]
fn empty_layer_is_ignored() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn files_load_like_strings() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("overlay.yaml");
    std::fs::write(&base, BASE_YAML).unwrap();
    std::fs::write(&overlay, OVERLAY_YAML).unwrap();

    let from_files = load_layered_yaml(&[
        base.to_str().unwrap(),
        overlay.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);

    let missing = dir.path().join("missing.yaml");
    let err = load_layered_yaml(&[missing.to_str().unwrap()]).unwrap_err();
    assert!(format!("{err:#}").contains("failed to read yaml path"));
}

#[test]
fn non_mapping_top_level_is_rejected() {
    let err = load_layered_yaml_from_strings(&["- a\n- b\n"]).unwrap_err();
    assert!(err.to_string().contains("CONFIG_INVALID"), "{err}");
}
