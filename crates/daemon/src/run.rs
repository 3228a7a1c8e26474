// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One container's run: execute the action tree, await completion or
//! cancellation, record the result, fire the completion callback.

use crate::backend::Backend;
use crate::logs::{LogEmitter, LogStreamer};
use crate::registry::Registry;
use crate::sequence::{perform, StepCtx, StepError};
use std::sync::Arc;
use std::time::Duration;
use stevedore_core::{Action, Clock, Container, EnvVar, RunResult, SerialAction};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A launched-but-not-yet-started run for one Created container.
pub struct RunSequence<C: Clock> {
    pub container: Container,
    pub actions: Vec<Action>,
    pub env: Vec<EnvVar>,
    /// Empty disables the completion callback.
    pub complete_url: String,
    pub registry: Arc<Registry<C>>,
    pub backend: Arc<dyn Backend>,
    pub emitter: Arc<dyn LogEmitter>,
    pub http: reqwest::Client,
    pub clock: C,
    pub max_log_message_size: usize,
    pub monitor_interval: Duration,
}

impl<C: Clock> RunSequence<C> {
    /// Supervisor contract: announces readiness on `ready` immediately, then
    /// performs the tree until completion or cancellation.
    ///
    /// On cancellation the registry is left untouched and no callback fires;
    /// the Delete that triggered the cancel owns registry state. Otherwise
    /// the result is recorded (releasing capacity) and the callback, if any,
    /// is posted fire-and-forget.
    pub async fn run(
        self,
        cancel: CancellationToken,
        ready: oneshot::Sender<()>,
    ) -> Result<(), StepError> {
        let guid = self.container.guid.clone();
        let handle = self.container.container_handle.clone();
        let streamer = LogStreamer::new(
            self.container.log.clone(),
            self.emitter.clone(),
            self.clock.clone(),
            self.max_log_message_size,
        );
        let root = Action::Serial(SerialAction { actions: self.actions });
        let ctx = StepCtx {
            backend: self.backend.as_ref(),
            handle: &handle,
            streamer: &streamer,
            cancel: &cancel,
            env: &self.env,
            http: &self.http,
            monitor_interval: self.monitor_interval,
        };

        let _ = ready.send(());
        info!(%guid, handle = %handle, "run starting");

        let outcome = perform(&root, &ctx).await;
        streamer.flush();

        if matches!(outcome, Err(StepError::Cancelled)) {
            info!(%guid, "run cancelled");
            return Err(StepError::Cancelled);
        }

        info!(%guid, failed = outcome.is_err(), "run completed");
        let result = RunResult {
            guid: guid.clone(),
            failed: outcome.is_err(),
            failure_reason: outcome.as_ref().err().map(ToString::to_string).unwrap_or_default(),
            result: String::new(),
        };
        if let Err(err) = self.registry.complete(&guid, result.clone()) {
            error!(%guid, error = %err, "failed to record run result");
        }

        if !self.complete_url.is_empty() {
            let http = self.http.clone();
            let url = self.complete_url.clone();
            info!(%guid, %url, "callback started");
            tokio::spawn(async move {
                match http.post(&url).json(&result).send().await {
                    Ok(response) if !response.status().is_success() => {
                        warn!(%url, status = %response.status(), "completion callback rejected");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(%url, error = %err, "completion callback failed"),
                }
            });
        }

        outcome
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
