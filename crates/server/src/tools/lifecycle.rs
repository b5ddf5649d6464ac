//! sw_install, sw_release_clients and sw_status tool implementations.
//!
//! Installs a worker version into the registration, promotes a waiting
//! version, and reports which workers are active or waiting.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pwa_core::{Registration, RegistrationStatus, WorkerConfig, WorkerSummary};

use super::json_result;

/// Input parameters for sw_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwInstallParams {
    /// Cache namespace for the new version. Defaults to the configured one;
    /// pass a new tag to simulate a version bump.
    #[serde(default)]
    pub cache_name: Option<String>,

    /// Activate as soon as the install succeeds (default: configured value).
    /// When false and a version is already active, the new one waits for
    /// sw_release_clients.
    #[serde(default)]
    pub skip_waiting: Option<bool>,
}

/// Output structure for sw_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwInstallOutput {
    /// The worker that was just installed.
    pub installed: WorkerSummary,
    /// Registration state after the install (and activation, if it happened).
    pub registration: RegistrationStatus,
}

/// Implementation of the sw_install tool.
pub async fn install_impl(
    registration: &Registration, base: &WorkerConfig, params: SwInstallParams,
) -> Result<CallToolResult, McpError> {
    let mut config = match params.cache_name {
        Some(name) => base.with_cache_name(name)?,
        None => base.clone(),
    };
    if let Some(skip_waiting) = params.skip_waiting {
        config = config.with_skip_waiting(skip_waiting);
    }

    let worker = registration.update(config).await?;
    let output = SwInstallOutput {
        installed: WorkerSummary::of(&worker).await,
        registration: registration.status().await,
    };

    json_result(&output)
}

/// Output structure for sw_release_clients tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwReleaseOutput {
    /// Whether a waiting worker was activated.
    pub promoted: bool,
    pub registration: RegistrationStatus,
}

/// Implementation of the sw_release_clients tool.
pub async fn release_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let promoted = registration.release_clients().await?;
    json_result(&SwReleaseOutput { promoted, registration: registration.status().await })
}

/// Implementation of the sw_status tool.
pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    json_result(&registration.status().await)
}
