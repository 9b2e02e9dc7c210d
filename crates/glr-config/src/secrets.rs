//! Runtime resolution of directory credentials.
//!
//! Config stores env var NAMES (`directory.credentials_env.username|password`).
//! Callers resolve them once with [`resolve_secrets`] and pass the result to
//! constructors. `Debug` redacts values, and errors name the env var only.

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_USERNAME_ENV: &str = "SF_USERNAME";
pub const DEFAULT_PASSWORD_ENV: &str = "SF_PASSWORD";

/// Secrets resolved from the environment; absent or blank vars are `None`.
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub directory_username: Option<String>,
    pub directory_password: Option<String>,
    /// Env var names the values came from. Not secret.
    pub username_var: String,
    pub password_var: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "directory_username",
                &self.directory_username.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "directory_password",
                &self.directory_password.as_ref().map(|_| "<REDACTED>"),
            )
            .field("username_var", &self.username_var)
            .field("password_var", &self.password_var)
            .finish()
    }
}

/// Username and password for the directory API, both present.
#[derive(Clone)]
pub struct DirectoryCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DirectoryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryCredentials")
            .field("username", &"<REDACTED>")
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl ResolvedSecrets {
    /// Both credentials, or SECRETS_MISSING naming the first unset var.
    pub fn directory_credentials(&self) -> Result<DirectoryCredentials> {
        let Some(username) = self.directory_username.clone() else {
            bail!(
                "SECRETS_MISSING: required env var '{}' (directory username) is not set or empty",
                self.username_var
            );
        };
        let Some(password) = self.directory_password.clone() else {
            bail!(
                "SECRETS_MISSING: required env var '{}' (directory password) is not set or empty",
                self.password_var
            );
        };
        Ok(DirectoryCredentials { username, password })
    }
}

/// Non-blank string at `pointer`, trimmed.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Read the configured env var names (falling back to `SF_USERNAME` /
/// `SF_PASSWORD`) and resolve them. Missing values are not an error here;
/// see [`ResolvedSecrets::directory_credentials`].
pub fn resolve_secrets(config_json: &Value) -> ResolvedSecrets {
    let username_var = read_str_at(config_json, "/directory/credentials_env/username")
        .unwrap_or_else(|| DEFAULT_USERNAME_ENV.to_string());
    let password_var = read_str_at(config_json, "/directory/credentials_env/password")
        .unwrap_or_else(|| DEFAULT_PASSWORD_ENV.to_string());

    ResolvedSecrets {
        directory_username: resolve_env(&username_var),
        directory_password: resolve_env(&password_var),
        username_var,
        password_var,
    }
}
