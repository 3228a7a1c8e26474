// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request bodies accepted by the container endpoints.

use serde::{Deserialize, Serialize};
use stevedore_core::json::null_to_default;
use stevedore_core::{Action, EnvVar, LogConfig, PortMapping, Tags};

/// Body of `POST /containers/{guid}`.
///
/// Collection fields tolerate both omission and an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub disk_mb: u64,
    #[serde(default)]
    pub cpu_weight: u32,
    #[serde(default, deserialize_with = "null_to_default")]
    pub tags: Tags,
    #[serde(default, deserialize_with = "null_to_default")]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub root_fs: String,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default, deserialize_with = "null_to_default")]
    pub env: Vec<EnvVar>,
}

/// Body of `POST /containers/{guid}/run`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default, deserialize_with = "null_to_default")]
    pub actions: Vec<Action>,
    /// Prepended to every run action's environment.
    #[serde(default, deserialize_with = "null_to_default")]
    pub env: Vec<EnvVar>,
    /// Empty means no completion callback.
    #[serde(default)]
    pub complete_url: String,
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod tests;
