// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the agent API.
//!
//! Symmetric to the daemon's server: JSON bodies, typed failures decoded
//! from the `X-Executor-Error` header. Unknown error names survive as
//! [`ExecutorError::Unknown`] with the name preserved verbatim.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use stevedore_core::{Container, ExecutorResources};
use stevedore_wire::{AllocationRequest, ExecutorError, RunRequest, EXECUTOR_ERROR_HEADER};
use thiserror::Error;

/// A failed agent call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The agent rejected the request with a typed error.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Failure response without a typed header.
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

impl ClientError {
    /// The typed executor error, when there is one.
    pub fn executor_error(&self) -> Option<&ExecutorError> {
        match self {
            ClientError::Executor(err) => Some(err),
            _ => None,
        }
    }
}

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, http: reqwest::Client::new() }
    }

    pub async fn allocate(
        &self,
        guid: &str,
        request: &AllocationRequest,
    ) -> Result<Container, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/containers/{guid}")))
            .json(request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn get(&self, guid: &str) -> Result<Container, ClientError> {
        let response = self.http.get(self.url(&format!("/containers/{guid}"))).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn initialize(&self, guid: &str) -> Result<Container, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/containers/{guid}/initialize")))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn run(&self, guid: &str, request: &RunRequest) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/containers/{guid}/run")))
            .json(request)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn delete(&self, guid: &str) -> Result<(), ClientError> {
        let response = self.http.delete(self.url(&format!("/containers/{guid}"))).send().await?;
        check(response).await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Container>, ClientError> {
        let response = self.http.get(self.url("/containers")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn total_resources(&self) -> Result<ExecutorResources, ClientError> {
        let response = self.http.get(self.url("/resources/total")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn remaining_resources(&self) -> Result<ExecutorResources, ClientError> {
        let response = self.http.get(self.url("/resources/remaining")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        let response = self.http.get(self.url("/ping")).send().await?;
        check(response).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let Some(name) = response.headers().get(EXECUTOR_ERROR_HEADER) {
        if let Ok(name) = name.to_str() {
            return Err(ExecutorError::from_name(name).into());
        }
    }
    Err(ClientError::Status(status))
}
