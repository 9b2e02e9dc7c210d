//! Layered YAML configuration for readiness runs.
//!
//! Later documents override earlier ones by deep merge. The merged document
//! is hashed over its canonical JSON so every snapshot can name the exact
//! config it ran under. Credentials never live in config: only the names of
//! the env vars that hold them (see [`secrets`]).

pub mod consumption;
pub mod secrets;

pub use consumption::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport, CONSUMED_POINTERS};
pub use secrets::{resolve_secrets, DirectoryCredentials, ResolvedSecrets};

use std::fs;

use anyhow::{bail, Context, Result};
use glr_gates::{GatePolicy, ScopeIds};
use glr_odata::ClientSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use consumption::collect_leaf_pointers;

/// Leaf string values starting with one of these abort the load with
/// CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "xoxp-",      // Slack user token
    "Basic ",     // pasted HTTP basic auth header
    "Bearer ",    // pasted bearer token
];

// ---------------------------------------------------------------------------
// Loading + hashing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw = fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml (layer {i})"))?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty file parses to null; it overrides nothing.
        if v_json.is_null() {
            continue;
        }
        if !v_json.is_object() {
            bail!("CONFIG_INVALID layer {i}: top level must be a mapping");
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged);
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Compact JSON with object keys sorted at every level, whatever map order
/// serde_json was built with.
fn canonicalize_json(v: &Value) -> String {
    let mut out = String::new();
    write_canonical(v, &mut out);
    out
}

fn write_canonical(v: &Value, out: &mut String) {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*k).clone()).to_string());
                out.push(':');
                write_canonical(&map[k.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim_start();
    if t.trim_end().len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

/// Env var names holding the directory credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsEnv {
    pub username: String,
    pub password: String,
}

impl Default for CredentialsEnv {
    fn default() -> Self {
        Self {
            username: secrets::DEFAULT_USERNAME_ENV.to_string(),
            password: secrets::DEFAULT_PASSWORD_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Default OData API base URL; a run request may override it.
    pub api_base_url: String,
    pub page_size: usize,
    pub max_pages: usize,
    pub timeout_secs: u64,
    pub verify_tls: bool,
    pub credentials_env: CredentialsEnv,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        let c = ClientSettings::default();
        Self {
            api_base_url: String::new(),
            page_size: c.page_size,
            max_pages: c.max_pages,
            timeout_secs: c.timeout_secs,
            verify_tls: c.verify_tls,
            credentials_env: CredentialsEnv::default(),
        }
    }
}

impl DirectoryConfig {
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            page_size: self.page_size,
            max_pages: self.max_pages,
            timeout_secs: self.timeout_secs,
            verify_tls: self.verify_tls,
        }
    }
}

/// Scope defaults used when a run request leaves a field out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeDefaults {
    pub instance_url: String,
    pub company_id: String,
}

/// Everything a readiness run reads from config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub directory: DirectoryConfig,
    pub gates: GatePolicy,
    pub scope: ScopeDefaults,
}

impl ReadinessConfig {
    /// Typed view over a loaded config. Absent sections take defaults;
    /// present ones must have the right shape.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let cfg: ReadinessConfig =
            serde_json::from_value(config_json.clone()).context("CONFIG_INVALID: config does not match the readiness schema")?;

        if cfg.directory.page_size == 0 {
            bail!("CONFIG_INVALID: directory.page_size must be > 0");
        }
        if cfg.directory.max_pages == 0 {
            bail!("CONFIG_INVALID: directory.max_pages must be > 0");
        }
        if cfg.directory.timeout_secs == 0 {
            bail!("CONFIG_INVALID: directory.timeout_secs must be > 0");
        }
        Ok(cfg)
    }

    /// Request values win over config defaults; blank counts as absent.
    pub fn scope_ids(
        &self,
        instance_url: Option<&str>,
        api_base_url: Option<&str>,
        company_id: Option<&str>,
    ) -> ScopeIds {
        fn pick(req: Option<&str>, default: &str) -> String {
            req.map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(default.trim())
                .to_string()
        }
        ScopeIds {
            instance_url: pick(instance_url, &self.scope.instance_url),
            api_base_url: pick(api_base_url, &self.directory.api_base_url),
            company_id: pick(company_id, &self.scope.company_id),
        }
    }
}
