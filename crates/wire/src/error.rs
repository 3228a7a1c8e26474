// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed error protocol.
//!
//! Every 4xx/5xx response carries a stable error name in the
//! [`EXECUTOR_ERROR_HEADER`] header; clients map it back to an
//! [`ExecutorError`] value. Names are part of the wire contract and never
//! change.

use thiserror::Error;

/// Response header carrying the error name on failed requests.
pub const EXECUTOR_ERROR_HEADER: &str = "X-Executor-Error";

/// Operational errors surfaced by the agent API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("container not found")]
    ContainerNotFound,
    #[error("container guid not available")]
    GuidNotAvailable,
    #[error("insufficient resources available to allocate container")]
    InsufficientResources,
    #[error("container limit reached")]
    LimitReached,
    #[error("operation not allowed in current container state")]
    InvalidTransition,
    #[error("steps invalid")]
    StepsInvalid,
    #[error("failed to initialize container")]
    InitializeFailed,
    #[error("limits invalid")]
    LimitsInvalid,
    #[error("invalid json")]
    InvalidJson,
    /// An error name this client build does not recognize; the name is
    /// preserved verbatim.
    #[error("unrecognized executor error: {0}")]
    Unknown(String),
}

impl ExecutorError {
    /// Stable wire name, as carried in the error header.
    pub fn name(&self) -> &str {
        match self {
            ExecutorError::ContainerNotFound => "ContainerNotFound",
            ExecutorError::GuidNotAvailable => "ContainerGuidNotAvailable",
            ExecutorError::InsufficientResources => "InsufficientResources",
            ExecutorError::LimitReached => "LimitReached",
            ExecutorError::InvalidTransition => "InvalidTransition",
            ExecutorError::StepsInvalid => "StepsInvalid",
            ExecutorError::InitializeFailed => "InitializeFailed",
            ExecutorError::LimitsInvalid => "LimitsInvalid",
            ExecutorError::InvalidJson => "InvalidJSON",
            ExecutorError::Unknown(name) => name,
        }
    }

    /// HTTP status paired with this error.
    pub fn http_code(&self) -> u16 {
        match self {
            ExecutorError::ContainerNotFound => 404,
            ExecutorError::GuidNotAvailable => 400,
            ExecutorError::InsufficientResources => 503,
            ExecutorError::LimitReached => 503,
            ExecutorError::InvalidTransition => 400,
            ExecutorError::StepsInvalid => 400,
            ExecutorError::InitializeFailed => 500,
            ExecutorError::LimitsInvalid => 400,
            ExecutorError::InvalidJson => 400,
            ExecutorError::Unknown(_) => 500,
        }
    }

    /// Map a wire name back to its error value. Unknown names are preserved
    /// so the caller can still see what the server reported.
    pub fn from_name(name: &str) -> Self {
        match name {
            "ContainerNotFound" => ExecutorError::ContainerNotFound,
            "ContainerGuidNotAvailable" => ExecutorError::GuidNotAvailable,
            "InsufficientResources" => ExecutorError::InsufficientResources,
            "LimitReached" => ExecutorError::LimitReached,
            "InvalidTransition" => ExecutorError::InvalidTransition,
            "StepsInvalid" => ExecutorError::StepsInvalid,
            "InitializeFailed" => ExecutorError::InitializeFailed,
            "LimitsInvalid" => ExecutorError::LimitsInvalid,
            "InvalidJSON" => ExecutorError::InvalidJson,
            other => ExecutorError::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
