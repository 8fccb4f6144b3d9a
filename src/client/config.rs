//! Client configuration
//!
//! Configuration is layered: the manager holds a default config, callers
//! may pass a per-call config, and `merged_with` combines them with an
//! explicit precedence order (overlay wins field-wise; override maps are
//! key-merged with overlay keys winning).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration used to build an agent runtime session
///
/// All fields are optional; unset fields defer to the runtime's own
/// defaults. Use the builder methods to construct:
///
/// ```ignore
/// let config = ClientConfig::new()
///     .with_model("gpt-5")
///     .with_cwd("/work/repo")
///     .with_override("sandbox_permissions", serde_json::json!(["disk-read"]));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Model to run the session with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Working directory for the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Approval policy name (e.g. "never", "on-request")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_policy: Option<String>,

    /// Sandbox mode name (e.g. "read-only", "workspace-write")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_mode: Option<String>,

    /// Base instructions for the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Free-form key/value overrides passed through to the runtime
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, Value>,
}

impl ClientConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the approval policy
    pub fn with_approval_policy(mut self, policy: impl Into<String>) -> Self {
        self.approval_policy = Some(policy.into());
        self
    }

    /// Set the sandbox mode
    pub fn with_sandbox_mode(mut self, mode: impl Into<String>) -> Self {
        self.sandbox_mode = Some(mode.into());
        self
    }

    /// Set the base instructions
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Add a single runtime override
    pub fn with_override(mut self, key: impl Into<String>, value: Value) -> Self {
        self.overrides.insert(key.into(), value);
        self
    }

    /// Combine this config with an overlay
    ///
    /// Precedence: every `Some` field of `overlay` replaces the value here;
    /// `None` fields fall through. Override maps are merged key-wise with
    /// `overlay`'s entries winning.
    pub fn merged_with(&self, overlay: &ClientConfig) -> ClientConfig {
        let mut overrides = self.overrides.clone();
        overrides.extend(overlay.overrides.clone());

        ClientConfig {
            model: overlay.model.clone().or_else(|| self.model.clone()),
            cwd: overlay.cwd.clone().or_else(|| self.cwd.clone()),
            approval_policy: overlay
                .approval_policy
                .clone()
                .or_else(|| self.approval_policy.clone()),
            sandbox_mode: overlay
                .sandbox_mode
                .clone()
                .or_else(|| self.sandbox_mode.clone()),
            instructions: overlay
                .instructions
                .clone()
                .or_else(|| self.instructions.clone()),
            overrides,
        }
    }

    /// Fold a list of layers left to right (later layers win)
    pub fn layered(layers: &[&ClientConfig]) -> ClientConfig {
        layers
            .iter()
            .fold(ClientConfig::new(), |acc, layer| acc.merged_with(layer))
    }
}
