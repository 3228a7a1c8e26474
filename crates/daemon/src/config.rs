// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-scope configuration, read once at startup.

use std::time::Duration;
use stevedore_core::ExecutorResources;

pub const DEFAULT_MAX_LOG_MESSAGE_SIZE: usize = 4096;
pub const DEFAULT_MAX_CPU_SHARES: u64 = 1024;

/// Daemon configuration. Never mutated at runtime.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Capacity ceiling on all three axes.
    pub total_capacity: ExecutorResources,
    /// Largest single log message emitted by the streamer, in bytes.
    pub max_log_message_size: usize,
    /// Passed to the backend so leaked containers are attributable.
    pub container_owner_name: String,
    /// Backend-native shares corresponding to a cpu_weight of 100.
    pub container_max_cpu_shares: u64,
    /// How long Completed records linger before GC. Zero disables pruning.
    pub completed_ttl: Duration,
    /// Polling interval for monitor actions.
    pub monitor_interval: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            total_capacity: ExecutorResources {
                memory_mb: 1024,
                disk_mb: 1024,
                containers: 256,
            },
            max_log_message_size: DEFAULT_MAX_LOG_MESSAGE_SIZE,
            container_owner_name: "stevedore".to_string(),
            container_max_cpu_shares: DEFAULT_MAX_CPU_SHARES,
            completed_ttl: Duration::from_secs(300),
            monitor_interval: Duration::from_secs(30),
        }
    }
}
