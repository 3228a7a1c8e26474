// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-process backend.
//!
//! The thinnest possible [`Backend`]: a container is a scratch directory and
//! a process is an ordinary host process running inside it. There is no
//! isolation; resource limits and port mappings are accepted and logged but
//! not enforced. Real deployments substitute an isolating runtime behind the
//! same trait.

use crate::backend::{Backend, BackendError, ContainerSpec, OutputStream, Process, ProcessSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::{Child, Command};
use tracing::debug;

pub struct HostBackend {
    base_dir: PathBuf,
    counter: AtomicU64,
}

impl HostBackend {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), counter: AtomicU64::new(0) }
    }

    fn container_dir(&self, handle: &str) -> PathBuf {
        self.base_dir.join(handle)
    }

    fn resolve(&self, handle: &str, path: &str) -> PathBuf {
        self.container_dir(handle)
            .join(Path::new(path).strip_prefix("/").unwrap_or(Path::new(path)))
    }
}

#[async_trait]
impl Backend for HostBackend {
    async fn create(&self, spec: ContainerSpec) -> Result<String, BackendError> {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = format!("{}-{}", spec.owner_name, sequence);
        tokio::fs::create_dir_all(self.container_dir(&handle)).await?;
        debug!(handle = %handle, root_fs = %spec.root_fs, "created scratch container");
        Ok(handle)
    }

    async fn destroy(&self, handle: &str) -> Result<(), BackendError> {
        tokio::fs::remove_dir_all(self.container_dir(handle)).await?;
        Ok(())
    }

    async fn run(&self, handle: &str, spec: ProcessSpec) -> Result<Box<dyn Process>, BackendError> {
        let mut command = Command::new(&spec.path);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(self.container_dir(handle))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = command
            .spawn()
            .map_err(|err| BackendError::new(format!("spawn {}: {err}", spec.path)))?;
        Ok(Box::new(HostProcess { child }))
    }

    async fn net_in(
        &self,
        handle: &str,
        container_port: u16,
        host_port: u16,
    ) -> Result<u16, BackendError> {
        // Host networking: the container port already is a host port.
        debug!(handle = %handle, container_port, host_port, "net_in is a no-op on the host backend");
        Ok(if host_port == 0 { container_port } else { host_port })
    }

    async fn limit_memory(&self, handle: &str, limit_mb: u64) -> Result<(), BackendError> {
        debug!(handle = %handle, limit_mb, "memory limit not enforced on the host backend");
        Ok(())
    }

    async fn limit_disk(&self, handle: &str, limit_mb: u64) -> Result<(), BackendError> {
        debug!(handle = %handle, limit_mb, "disk limit not enforced on the host backend");
        Ok(())
    }

    async fn stream_in(
        &self,
        handle: &str,
        dest_path: &str,
        contents: Vec<u8>,
    ) -> Result<(), BackendError> {
        let target = self.resolve(handle, dest_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, contents).await?;
        Ok(())
    }

    async fn stream_out(&self, handle: &str, source_path: &str) -> Result<Vec<u8>, BackendError> {
        Ok(tokio::fs::read(self.resolve(handle, source_path)).await?)
    }
}

struct HostProcess {
    child: Child,
}

#[async_trait]
impl Process for HostProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.child.stdout.take().map(|stdout| Box::new(stdout) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.child.stderr.take().map(|stderr| Box::new(stderr) as OutputStream)
    }

    async fn wait(&mut self) -> Result<i32, BackendError> {
        let status = self.child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
