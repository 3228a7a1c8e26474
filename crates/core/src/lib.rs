// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stevedore-core: Core library for the Stevedore container execution agent

pub mod macros;

pub mod action;
pub mod bytes;
pub mod clock;
pub mod container;
pub mod json;

pub use action::{
    Action, DownloadAction, EmitProgressAction, InvalidAction, MonitorAction, ParallelAction,
    ResourceLimits, RunAction, SerialAction, TryAction, UploadAction,
};
pub use bytes::{format_bytes, to_bytes, to_megabytes, InvalidByteQuantity};
pub use clock::{Clock, FakeClock, SystemClock};
pub use container::{
    Container, EnvVar, ExecutorResources, LogConfig, PortMapping, RunResult, State, Tags,
};
