// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The action tree: a composable description of work to execute inside a
//! container.
//!
//! On the wire each node is `{"action": "<kind>", "args": {...}}`; the serde
//! codec dispatches on the discriminator. Composition nodes carry their
//! children by value.

use crate::container::EnvVar;
use crate::json::null_to_default;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One node of the action tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "args", rename_all = "snake_case")]
pub enum Action {
    /// Spawn a process in the container.
    Run(RunAction),
    /// Fetch a remote artifact into the container filesystem.
    Download(DownloadAction),
    /// Push a container file to a remote URL.
    Upload(UploadAction),
    /// Wrap a child action with human-readable progress messages.
    EmitProgress(EmitProgressAction),
    /// Run a child action and swallow its failure.
    Try(TryAction),
    /// Long-running health loop around a check action.
    Monitor(MonitorAction),
    /// Run children concurrently.
    Parallel(ParallelAction),
    /// Run children in order, stopping at the first failure.
    Serial(SerialAction),
}

/// Kernel resource limits applied to a spawned process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nofile: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAction {
    pub path: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub args: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub env: Vec<EnvVar>,
    /// Milliseconds; zero means no timeout.
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadAction {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAction {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitProgressAction {
    #[serde(default)]
    pub start_message: String,
    #[serde(default)]
    pub success_message: String,
    #[serde(default)]
    pub failure_message: String,
    pub action: Box<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryAction {
    pub action: Box<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorAction {
    pub action: Box<Action>,
    #[serde(default)]
    pub healthy_hook: String,
    #[serde(default)]
    pub unhealthy_hook: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelAction {
    #[serde(default, deserialize_with = "null_to_default")]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialAction {
    #[serde(default, deserialize_with = "null_to_default")]
    pub actions: Vec<Action>,
}

/// A structurally invalid action tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAction {
    #[error("run action requires a path")]
    RunPathMissing,
    #[error("download action requires a source URL")]
    DownloadFromMissing,
    #[error("download action requires a destination path")]
    DownloadToMissing,
    #[error("upload action requires a source path")]
    UploadFromMissing,
    #[error("upload action requires a destination URL")]
    UploadToMissing,
}

impl Action {
    /// Walk the tree checking every leaf is well formed.
    pub fn validate(&self) -> Result<(), InvalidAction> {
        match self {
            Action::Run(run) => {
                if run.path.is_empty() {
                    return Err(InvalidAction::RunPathMissing);
                }
            }
            Action::Download(download) => {
                if download.from.is_empty() {
                    return Err(InvalidAction::DownloadFromMissing);
                }
                if download.to.is_empty() {
                    return Err(InvalidAction::DownloadToMissing);
                }
            }
            Action::Upload(upload) => {
                if upload.from.is_empty() {
                    return Err(InvalidAction::UploadFromMissing);
                }
                if upload.to.is_empty() {
                    return Err(InvalidAction::UploadToMissing);
                }
            }
            Action::EmitProgress(wrapped) => wrapped.action.validate()?,
            Action::Try(wrapped) => wrapped.action.validate()?,
            Action::Monitor(monitor) => monitor.action.validate()?,
            Action::Parallel(ParallelAction { actions })
            | Action::Serial(SerialAction { actions }) => {
                for action in actions {
                    action.validate()?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
