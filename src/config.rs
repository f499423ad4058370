//! Configuration
//!
//! One explicit `SyncConfig` value threaded into tree construction and apply
//! calls — no hidden global state. Loading is layered: built-in defaults,
//! then an optional configuration file, then `SUITESYNC_*` environment
//! variables. CLI arguments override the loaded result.

use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Run-wide configuration for scanning, diffing and pushing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the test management API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API token; required for any remote operation.
    #[serde(default)]
    pub api_token: String,

    /// Code of the project all suites and cases are synced into.
    #[serde(default)]
    pub project_code: String,

    /// Remote suite the tree root is bound to. Without it, remote trees are
    /// rooted at a synthetic repository node spanning the whole project.
    #[serde(default)]
    pub root_suite_id: Option<u64>,

    /// Seed values for service-required custom fields (field id → value),
    /// applied wherever the local source declares nothing.
    #[serde(default)]
    pub custom_field_defaults: BTreeMap<String, Value>,

    /// Strip border quotes and redundant whitespace from local case titles.
    #[serde(default)]
    pub strip_titles: bool,

    /// Skip feature files that cannot be parsed instead of aborting.
    #[serde(default = "default_true")]
    pub skip_unparsable: bool,

    /// Entities per page for the paginated remote fetch.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_endpoint() -> String {
    "https://api.qase.io/v1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    10
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            endpoint: default_endpoint(),
            api_token: String::new(),
            project_code: String::new(),
            root_suite_id: None,
            custom_field_defaults: BTreeMap::new(),
            strip_titles: false,
            skip_unparsable: default_true(),
            page_size: default_page_size(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from an optional file with environment overlay.
    /// Precedence: defaults (lowest) -> file -> SUITESYNC_* environment.
    pub fn load(file: Option<&Path>) -> Result<Self, SyncError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path.to_path_buf()));
        }
        let builder = builder.add_source(
            Environment::with_prefix("SUITESYNC")
                .separator("__")
                .try_parsing(true),
        );
        let config = builder
            .build()
            .map_err(|err| SyncError::Config(err.to_string()))?;
        config
            .try_deserialize()
            .map_err(|err| SyncError::Config(err.to_string()))
    }

    /// Load the default custom-field map from a JSON file.
    pub fn load_custom_field_defaults(&mut self, path: &Path) -> Result<(), SyncError> {
        let text = std::fs::read_to_string(path)?;
        self.custom_field_defaults =
            serde_json::from_str(&text).map_err(|err| SyncError::Parse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        Ok(())
    }

    /// Fail fast when remote credentials are missing.
    pub fn require_remote(&self) -> Result<(), SyncError> {
        if self.api_token.is_empty() {
            return Err(SyncError::Config(
                "API token is not set (use --token or SUITESYNC_API_TOKEN)".to_string(),
            ));
        }
        if self.project_code.is_empty() {
            return Err(SyncError::Config(
                "project code is not set (use --project-code or SUITESYNC_PROJECT_CODE)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
