// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container record and lifecycle states.

use crate::json::null_to_default;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form labels attached to a container at allocation time.
pub type Tags = HashMap<String, String>;

/// Lifecycle state of a container.
///
/// Transitions form a DAG: Reserved → Initializing → Created → Completed,
/// with Initializing → Completed for failed initialization. Deletion removes
/// the record from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Reserved,
    Initializing,
    Created,
    Completed,
}

impl State {
    /// Check whether `next` is a legal forward transition from this state.
    pub fn can_advance_to(self, next: State) -> bool {
        matches!(
            (self, next),
            (State::Reserved, State::Initializing)
                | (State::Initializing, State::Created)
                | (State::Initializing, State::Completed)
                | (State::Created, State::Completed)
        )
    }

    /// Completed containers no longer count against capacity.
    pub fn consumes_capacity(self) -> bool {
        self != State::Completed
    }
}

crate::simple_display! {
    State {
        Reserved => "reserved",
        Initializing => "initializing",
        Created => "created",
        Completed => "completed",
    }
}

/// A declared port: container side plus the host side it should map to.
/// A zero host port asks the backend to assign one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    #[serde(default)]
    pub host_port: u16,
}

/// Where a container's process output is routed on the log bus.
///
/// An empty `guid` disables log emission for the container entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub index: Option<u32>,
}

/// A name/value environment variable pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Outcome of a container's run, recorded at the Completed transition and
/// posted to the completion callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub failure_reason: String,
    #[serde(default)]
    pub result: String,
}

/// Capacity on the three accounted axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorResources {
    pub memory_mb: u64,
    pub disk_mb: u64,
    pub containers: u64,
}

/// A container known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub guid: String,
    pub state: State,

    pub memory_mb: u64,
    pub disk_mb: u64,
    pub cpu_weight: u32,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,

    /// Epoch milliseconds at allocation.
    pub allocated_at: u64,

    #[serde(default)]
    pub root_fs: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default, deserialize_with = "null_to_default", skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Backend handle, set at the Created transition.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_handle: String,

    #[serde(default)]
    pub run_result: RunResult,
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
