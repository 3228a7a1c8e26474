// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The container backend contract.
//!
//! The backend is the layer that actually creates namespaces, mounts
//! filesystems, and spawns processes; the daemon only consumes this trait.
//! Containers are identified here by the backend handle, never by the
//! externally supplied GUID.

use async_trait::async_trait;
use stevedore_core::ResourceLimits;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Failure reported by the backend. The message is surfaced verbatim as a
/// run failure reason, so backends should keep it human readable.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

/// What the backend needs to create a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    pub owner_name: String,
    pub memory_mb: u64,
    pub disk_mb: u64,
    pub cpu_shares: u64,
    pub root_fs: String,
}

/// What the backend needs to spawn a process inside a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSpec {
    pub path: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub limits: ResourceLimits,
}

/// Raw byte stream of a process's stdout or stderr.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// A process running inside a container.
///
/// Dropping a process before `wait` resolves must terminate it; bounded
/// cancellation of run steps depends on this.
#[async_trait]
pub trait Process: Send {
    /// The stdout stream. Yields `Some` at most once.
    fn take_stdout(&mut self) -> Option<OutputStream>;
    /// The stderr stream. Yields `Some` at most once.
    fn take_stderr(&mut self) -> Option<OutputStream>;
    /// Wait for the process to exit and return its exit code.
    async fn wait(&mut self) -> Result<i32, BackendError>;
}

/// The container runtime consumed by the agent.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Create a container, returning its handle.
    async fn create(&self, spec: ContainerSpec) -> Result<String, BackendError>;

    /// Destroy a container and everything in it.
    async fn destroy(&self, handle: &str) -> Result<(), BackendError>;

    /// Spawn a process inside the container.
    async fn run(&self, handle: &str, spec: ProcessSpec) -> Result<Box<dyn Process>, BackendError>;

    /// Map a host port into the container. Returns the host port actually
    /// bound, which matters when the requested host port is zero ("assign").
    async fn net_in(
        &self,
        handle: &str,
        container_port: u16,
        host_port: u16,
    ) -> Result<u16, BackendError>;

    /// Cap the container's memory, in megabytes.
    async fn limit_memory(&self, handle: &str, limit_mb: u64) -> Result<(), BackendError>;

    /// Cap the container's disk, in megabytes.
    async fn limit_disk(&self, handle: &str, limit_mb: u64) -> Result<(), BackendError>;

    /// Write a file into the container filesystem.
    async fn stream_in(
        &self,
        handle: &str,
        dest_path: &str,
        contents: Vec<u8>,
    ) -> Result<(), BackendError>;

    /// Read a file out of the container filesystem.
    async fn stream_out(&self, handle: &str, source_path: &str) -> Result<Vec<u8>, BackendError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
