//! Credential and profile loading.
//!
//! Generalizes a `profiles.rs`-style TOML profile file with `${VAR}`
//! environment substitution, with the priority rule spec.md §6 requires:
//! `SCHEDULED_JOB_SECRETS` (a JSON string with credential material) takes
//! priority over the profile-file lookup chain.

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Platform credentials for one named profile.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

pub type Profiles = HashMap<String, Credentials>;

const SECRETS_ENV_VAR: &str = "SCHEDULED_JOB_SECRETS";

/// Resolve credentials for `profile_name`, honoring the priority rule:
/// `SCHEDULED_JOB_SECRETS` first, the on-disk profile file second.
pub fn resolve_credentials(profile_name: &str, profiles_path: &Path) -> PipelineResult<Credentials> {
    if let Ok(raw) = env::var(SECRETS_ENV_VAR) {
        return parse_scheduled_job_secrets(&raw);
    }
    let profiles = load_profiles(profiles_path)?;
    profiles
        .get(profile_name)
        .cloned()
        .ok_or_else(|| PipelineError::ProfileNotFound(profile_name.to_string()))
}

fn parse_scheduled_job_secrets(raw: &str) -> PipelineResult<Credentials> {
    serde_json::from_str(raw).map_err(|e| PipelineError::Other(format!(
        "malformed {SECRETS_ENV_VAR}: {e}"
    )))
}

/// Load the TOML profile file, substituting `${VAR}` references in secret
/// fields against the process environment.
pub fn load_profiles(path: &Path) -> PipelineResult<Profiles> {
    let content = std::fs::read_to_string(path).map_err(PipelineError::Io)?;
    let mut profiles: Profiles =
        toml::from_str(&content).map_err(|e| PipelineError::Other(format!("invalid {}: {e}", path.display())))?;

    for profile in profiles.values_mut() {
        profile.access_key = substitute_env(&profile.access_key);
        profile.secret_key = substitute_env(&profile.secret_key);
    }

    Ok(profiles)
}

fn substitute_env(value: &str) -> String {
    if let Some(var) = value.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        env::var(var).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

/// Gateway call policy (spec.md §5): a bounded per-call timeout and an
/// exponential-backoff retry, default 3s / 5 attempts / base factor 1 (i.e.
/// constant backoff, per §5's literal wording).
#[derive(Debug, Clone)]
pub struct GatewayPolicy {
    pub timeout: std::time::Duration,
    pub max_attempts: u32,
    pub backoff_base: std::time::Duration,
}

impl Default for GatewayPolicy {
    fn default() -> Self {
        GatewayPolicy {
            timeout: std::time::Duration::from_secs(3),
            max_attempts: 5,
            backoff_base: std::time::Duration::from_secs(1),
        }
    }
}

/// Run-wide configuration: project identifier, profile name, paths. Built
/// once at CLI entry and threaded through the pipeline explicitly, replacing
/// the global mutable configuration the REDESIGN FLAGS call out (spec.md
/// §9).
#[derive(Debug, Clone)]
pub struct RunContext {
    pub project_id: String,
    pub profile_name: String,
    pub profiles_path: std::path::PathBuf,
    pub log_dir: std::path::PathBuf,
    pub scratch_dir: std::path::PathBuf,
    pub format_registry_packages: Vec<String>,
    pub gateway_policy: GatewayPolicy,
}

impl RunContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        RunContext {
            project_id: project_id.into(),
            profile_name: "default".to_string(),
            profiles_path: std::path::PathBuf::from("profiles.toml"),
            log_dir: std::path::PathBuf::from("logs"),
            scratch_dir: std::path::PathBuf::from("scratch"),
            format_registry_packages: Vec::new(),
            gateway_policy: GatewayPolicy::default(),
        }
    }

    pub fn credentials(&self) -> PipelineResult<Credentials> {
        resolve_credentials(&self.profile_name, &self.profiles_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_env_var() {
        std::env::set_var("CENTER_INGEST_TEST_KEY", "abc123");
        assert_eq!(substitute_env("${CENTER_INGEST_TEST_KEY}"), "abc123");
        std::env::remove_var("CENTER_INGEST_TEST_KEY");
    }

    #[test]
    fn leaves_literal_values_untouched() {
        assert_eq!(substitute_env("literal"), "literal");
    }

    #[test]
    fn scheduled_job_secrets_takes_priority() {
        std::env::set_var(
            SECRETS_ENV_VAR,
            r#"{"access_key":"k","secret_key":"s"}"#,
        );
        let creds = resolve_credentials("ignored", Path::new("/nonexistent/profiles.toml")).unwrap();
        assert_eq!(creds.access_key, "k");
        std::env::remove_var(SECRETS_ENV_VAR);
    }
}
