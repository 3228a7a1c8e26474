// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fake backend for tests.
//!
//! Records every call and replays scripted processes. Scripted failure
//! points cover each setup hook so initialization error paths can be
//! exercised without a real container runtime.

use super::{Backend, BackendError, ContainerSpec, OutputStream, Process, ProcessSpec};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Arc;

/// Script for one spawned process.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessPlan {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    /// When set, `wait` fails with this message instead of returning a code.
    pub error: Option<String>,
    /// When set, `wait` never resolves; the process only ends by being
    /// dropped (i.e. cancelled).
    pub hang: bool,
}

impl FakeProcessPlan {
    pub fn succeeding(stdout: impl Into<Vec<u8>>) -> Self {
        Self { stdout: stdout.into(), ..Self::default() }
    }

    pub fn exiting(exit_code: i32) -> Self {
        Self { exit_code, ..Self::default() }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::default() }
    }

    pub fn hanging() -> Self {
        Self { hang: true, ..Self::default() }
    }
}

#[derive(Default)]
struct FakeState {
    handle_counter: u64,
    fail_create: Option<String>,
    fail_net_in: Option<String>,
    fail_limit_memory: Option<String>,
    fail_limit_disk: Option<String>,
    created: Vec<ContainerSpec>,
    destroyed: Vec<String>,
    runs: Vec<(String, ProcessSpec)>,
    net_ins: Vec<(String, u16, u16)>,
    memory_limits: Vec<(String, u64)>,
    disk_limits: Vec<(String, u64)>,
    streamed_in: Vec<(String, String, Vec<u8>)>,
    stream_out_files: HashMap<String, Vec<u8>>,
    processes: VecDeque<FakeProcessPlan>,
}

/// A scriptable, call-recording [`Backend`].
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the plan for the next spawned process. Unplanned spawns exit 0
    /// with no output.
    pub fn enqueue_process(&self, plan: FakeProcessPlan) {
        self.state.lock().processes.push_back(plan);
    }

    pub fn fail_create(&self, message: impl Into<String>) {
        self.state.lock().fail_create = Some(message.into());
    }

    pub fn fail_net_in(&self, message: impl Into<String>) {
        self.state.lock().fail_net_in = Some(message.into());
    }

    pub fn fail_limit_memory(&self, message: impl Into<String>) {
        self.state.lock().fail_limit_memory = Some(message.into());
    }

    pub fn fail_limit_disk(&self, message: impl Into<String>) {
        self.state.lock().fail_limit_disk = Some(message.into());
    }

    pub fn set_stream_out(&self, source_path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.state.lock().stream_out_files.insert(source_path.into(), contents.into());
    }

    pub fn created(&self) -> Vec<ContainerSpec> {
        self.state.lock().created.clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.state.lock().destroyed.clone()
    }

    pub fn runs(&self) -> Vec<(String, ProcessSpec)> {
        self.state.lock().runs.clone()
    }

    pub fn net_ins(&self) -> Vec<(String, u16, u16)> {
        self.state.lock().net_ins.clone()
    }

    pub fn memory_limits(&self) -> Vec<(String, u64)> {
        self.state.lock().memory_limits.clone()
    }

    pub fn disk_limits(&self) -> Vec<(String, u64)> {
        self.state.lock().disk_limits.clone()
    }

    pub fn streamed_in(&self) -> Vec<(String, String, Vec<u8>)> {
        self.state.lock().streamed_in.clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn create(&self, spec: ContainerSpec) -> Result<String, BackendError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.fail_create {
            return Err(BackendError::new(message.clone()));
        }
        state.handle_counter += 1;
        let handle = format!("handle-{}", state.handle_counter);
        state.created.push(spec);
        Ok(handle)
    }

    async fn destroy(&self, handle: &str) -> Result<(), BackendError> {
        self.state.lock().destroyed.push(handle.to_string());
        Ok(())
    }

    async fn run(&self, handle: &str, spec: ProcessSpec) -> Result<Box<dyn Process>, BackendError> {
        let mut state = self.state.lock();
        state.runs.push((handle.to_string(), spec));
        let plan = state.processes.pop_front().unwrap_or_default();
        Ok(Box::new(FakeProcess {
            stdout: Some(Box::new(Cursor::new(plan.stdout))),
            stderr: Some(Box::new(Cursor::new(plan.stderr))),
            exit_code: plan.exit_code,
            error: plan.error,
            hang: plan.hang,
        }))
    }

    async fn net_in(
        &self,
        handle: &str,
        container_port: u16,
        host_port: u16,
    ) -> Result<u16, BackendError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.fail_net_in {
            return Err(BackendError::new(message.clone()));
        }
        // Zero means "assign": hand out a deterministic ephemeral port.
        let bound = if host_port == 0 {
            60000 + state.net_ins.len() as u16
        } else {
            host_port
        };
        state.net_ins.push((handle.to_string(), container_port, bound));
        Ok(bound)
    }

    async fn limit_memory(&self, handle: &str, limit_mb: u64) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.fail_limit_memory {
            return Err(BackendError::new(message.clone()));
        }
        state.memory_limits.push((handle.to_string(), limit_mb));
        Ok(())
    }

    async fn limit_disk(&self, handle: &str, limit_mb: u64) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.fail_limit_disk {
            return Err(BackendError::new(message.clone()));
        }
        state.disk_limits.push((handle.to_string(), limit_mb));
        Ok(())
    }

    async fn stream_in(
        &self,
        handle: &str,
        dest_path: &str,
        contents: Vec<u8>,
    ) -> Result<(), BackendError> {
        self.state
            .lock()
            .streamed_in
            .push((handle.to_string(), dest_path.to_string(), contents));
        Ok(())
    }

    async fn stream_out(&self, _handle: &str, source_path: &str) -> Result<Vec<u8>, BackendError> {
        self.state
            .lock()
            .stream_out_files
            .get(source_path)
            .cloned()
            .ok_or_else(|| BackendError::new(format!("no such file: {source_path}")))
    }
}

struct FakeProcess {
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
    exit_code: i32,
    error: Option<String>,
    hang: bool,
}

#[async_trait]
impl Process for FakeProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    async fn wait(&mut self) -> Result<i32, BackendError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        match self.error.take() {
            Some(message) => Err(BackendError::new(message)),
            None => Ok(self.exit_code),
        }
    }
}
