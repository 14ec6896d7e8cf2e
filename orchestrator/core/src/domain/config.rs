// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Repository Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Security sentinels (admin group, automatic principal, root owner)
// - Action trigger behaviour
// - Smart folder query paging
// - Logging

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::domain::principal::{Principal, ADMINS_GROUP, SYSTEM_EMAIL};

pub const API_VERSION: &str = "docvault/v1";
pub const KIND: &str = "RepositoryConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfigManifest {
    /// API version (must be "docvault/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "RepositoryConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: RepositoryConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable repository name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfigSpec {
    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub actions: ActionsConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Members of this group are administrators
    #[serde(default = "default_admin_group")]
    pub admin_group: String,

    /// Identity used for event-triggered action runs
    #[serde(default = "default_system_email")]
    pub system_principal_email: String,

    /// Owner recorded on the Root and System folders
    #[serde(default = "default_root_owner")]
    pub root_owner_email: String,
}

impl SecurityConfig {
    pub fn system_principal(&self) -> Principal {
        Principal {
            email: self.system_principal_email.clone(),
            groups: BTreeSet::from([self.admin_group.clone()]),
            is_admin: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Upper bound on triggered runs executing at once for a single event
    #[serde(default = "default_action_concurrency")]
    pub max_concurrent_runs: usize,

    /// Let mutations made by triggered actions trigger further actions
    #[serde(default)]
    pub trigger_on_system_events: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page size used when a smart folder pages through the node store
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_admin_group() -> String {
    ADMINS_GROUP.to_string()
}

fn default_system_email() -> String {
    SYSTEM_EMAIL.to_string()
}

fn default_root_owner() -> String {
    "root@docvault.local".to_string()
}

fn default_action_concurrency() -> usize {
    8
}

fn default_page_size() -> u32 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            admin_group: default_admin_group(),
            system_principal_email: default_system_email(),
            root_owner_email: default_root_owner(),
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_action_concurrency(),
            trigger_on_system_events: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for RepositoryConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "docvault".to_string(),
                version: Some("1.0.0".to_string()),
            },
            spec: RepositoryConfigSpec::default(),
        }
    }
}

impl RepositoryConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, yaml).with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse repository config")
    }

    /// Discover configuration file using precedence order
    /// 1. DOCVAULT_CONFIG_PATH environment variable
    /// 2. ./docvault-config.yaml (working directory)
    /// 3. /etc/docvault/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DOCVAULT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./docvault-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        let system_config = PathBuf::from("/etc/docvault/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = explicit_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)?;
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("DOCVAULT_LOG_LEVEL") {
            tracing::info!("Environment override: DOCVAULT_LOG_LEVEL={}", level);
            self.spec.observability.logging.level = level;
        }

        if let Ok(val) = std::env::var("DOCVAULT_ACTION_CONCURRENCY") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => {
                    tracing::info!("Environment override: DOCVAULT_ACTION_CONCURRENCY={}", n);
                    self.spec.actions.max_concurrent_runs = n;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for DOCVAULT_ACTION_CONCURRENCY: '{}'. Expected a positive integer. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let security = &self.spec.security;
        if security.admin_group.is_empty() {
            anyhow::bail!("spec.security.admin_group cannot be empty");
        }
        if !security.system_principal_email.contains('@') {
            anyhow::bail!(
                "spec.security.system_principal_email is not an email: '{}'",
                security.system_principal_email
            );
        }

        if self.spec.actions.max_concurrent_runs == 0 {
            anyhow::bail!("spec.actions.max_concurrent_runs must be at least 1");
        }

        if self.spec.query.page_size == 0 {
            anyhow::bail!("spec.query.page_size must be at least 1");
        }

        match self.spec.observability.logging.format.as_str() {
            "json" | "compact" => {}
            other => anyhow::bail!("Unsupported log format '{}'. Use 'json' or 'compact'", other),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = RepositoryConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.security.admin_group, ADMINS_GROUP);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
apiVersion: docvault/v1
kind: RepositoryConfig
metadata:
  name: archive
spec:
  actions:
    max_concurrent_runs: 2
"#;
        let manifest = RepositoryConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.metadata.name, "archive");
        assert_eq!(manifest.spec.actions.max_concurrent_runs, 2);
        assert!(!manifest.spec.actions.trigger_on_system_events);
        assert_eq!(manifest.spec.query.page_size, 100);
        assert_eq!(manifest.spec.security.system_principal_email, SYSTEM_EMAIL);
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docvault-config.yaml");

        let mut manifest = RepositoryConfigManifest::default();
        manifest.spec.query.page_size = 25;
        manifest.to_yaml_file(&path).unwrap();

        let loaded = RepositoryConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.query.page_size, 25);
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = RepositoryConfigManifest::load_or_default(Some(missing.clone())).unwrap_err();
        assert!(err.to_string().contains(&missing.display().to_string()));
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "apiVersion: [unterminated").unwrap();
        let err = RepositoryConfigManifest::from_yaml_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_validation() {
        let mut manifest = RepositoryConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.spec.actions.max_concurrent_runs = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.actions.max_concurrent_runs = 4;

        manifest.spec.observability.logging.format = "xml".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.observability.logging.format = "json".to_string();

        manifest.spec.security.system_principal_email = "system".to_string();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_system_principal_is_admin() {
        let principal = SecurityConfig::default().system_principal();
        assert!(principal.is_admin);
        assert!(principal.in_group(ADMINS_GROUP));
    }
}
