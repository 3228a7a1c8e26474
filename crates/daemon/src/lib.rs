// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stevedore daemon library
//!
//! The per-host container execution agent: an in-memory registry with
//! capacity accounting, cancellable run sequences over action trees, a
//! line-framing log streamer, and the HTTP surface that exposes them.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod backend;
pub mod config;
pub mod executor;
pub mod host;
pub mod logs;
pub mod registry;
pub mod run;
pub mod sequence;
pub mod server;

pub use backend::{Backend, BackendError, ContainerSpec, Process, ProcessSpec};
pub use config::DaemonConfig;
pub use executor::Executor;
pub use host::HostBackend;
pub use logs::{LogEmitter, LogMessage, LogStreamer, MessageKind, TracingEmitter};
pub use registry::Registry;
pub use run::RunSequence;
pub use sequence::StepError;
pub use server::{router, serve};

#[cfg(any(test, feature = "test-support"))]
pub use backend::fake::{FakeBackend, FakeProcessPlan};
#[cfg(any(test, feature = "test-support"))]
pub use logs::FakeEmitter;
