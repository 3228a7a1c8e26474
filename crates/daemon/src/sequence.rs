// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellable execution of an action tree.
//!
//! [`perform`] walks the tree, observing a `CancellationToken` at every
//! blocking point. Cancellation surfaces as the distinguished
//! [`StepError::Cancelled`] value, never as the underlying abort error, and
//! is bounded by the backend's own cancellation latency (dropping a process
//! kills it).

use crate::backend::{Backend, OutputStream, ProcessSpec};
use crate::logs::LogStreamer;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use stevedore_core::{
    Action, Clock, DownloadAction, EmitProgressAction, EnvVar, MonitorAction, RunAction,
    UploadAction,
};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a step did not succeed.
#[derive(Debug, Error)]
pub enum StepError {
    /// The step was asked to stop. Distinguished: callers match on this to
    /// tell deliberate cancellation from failure.
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Backend(#[from] crate::backend::BackendError),
    #[error("process exited with status {0}")]
    ExitStatus(i32),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Failed(String),
}

impl StepError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Cancelled)
    }
}

/// Everything a step needs while executing.
pub struct StepCtx<'a, C: Clock> {
    pub backend: &'a dyn Backend,
    pub handle: &'a str,
    pub streamer: &'a LogStreamer<C>,
    pub cancel: &'a CancellationToken,
    /// Run-request environment, prepended to every run action's env.
    pub env: &'a [EnvVar],
    pub http: &'a reqwest::Client,
    pub monitor_interval: Duration,
}

/// Execute one action tree node, recursing through composites.
pub fn perform<'a, C: Clock>(
    action: &'a Action,
    ctx: &'a StepCtx<'a, C>,
) -> BoxFuture<'a, Result<(), StepError>> {
    Box::pin(async move {
        if ctx.cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        match action {
            Action::Run(run) => perform_run(run, ctx).await,
            Action::Download(download) => perform_download(download, ctx).await,
            Action::Upload(upload) => perform_upload(upload, ctx).await,
            Action::EmitProgress(progress) => perform_emit_progress(progress, ctx).await,
            Action::Try(wrapped) => match perform(&wrapped.action, ctx).await {
                Err(StepError::Cancelled) => Err(StepError::Cancelled),
                Err(err) => {
                    debug!(error = %err, "try step swallowed failure");
                    Ok(())
                }
                Ok(()) => Ok(()),
            },
            Action::Monitor(monitor) => perform_monitor(monitor, ctx).await,
            Action::Parallel(parallel) => perform_parallel(&parallel.actions, ctx).await,
            Action::Serial(serial) => {
                for child in &serial.actions {
                    if ctx.cancel.is_cancelled() {
                        return Err(StepError::Cancelled);
                    }
                    perform(child, ctx).await?;
                }
                Ok(())
            }
        }
    })
}

async fn perform_run<C: Clock>(run: &RunAction, ctx: &StepCtx<'_, C>) -> Result<(), StepError> {
    let mut env: Vec<(String, String)> =
        ctx.env.iter().map(|var| (var.name.clone(), var.value.clone())).collect();
    env.extend(run.env.iter().map(|var| (var.name.clone(), var.value.clone())));
    let spec = ProcessSpec {
        path: run.path.clone(),
        args: run.args.clone(),
        env,
        limits: run.resource_limits,
    };

    let mut process = tokio::select! {
        spawned = ctx.backend.run(ctx.handle, spec) => spawned?,
        _ = ctx.cancel.cancelled() => return Err(StepError::Cancelled),
    };

    let stdout = process.take_stdout();
    let stderr = process.take_stderr();
    let streamer = ctx.streamer;
    // Dropping this future (cancel, timeout) drops the process, killing it.
    let work = async move {
        let ((), (), status) = tokio::join!(
            copy_stream(stdout, |chunk| streamer.write_stdout(chunk)),
            copy_stream(stderr, |chunk| streamer.write_stderr(chunk)),
            async { process.wait().await },
        );
        status
    };

    let status = tokio::select! {
        status = maybe_timeout(run.timeout_ms, work) => status,
        _ = ctx.cancel.cancelled() => {
            ctx.streamer.flush();
            return Err(StepError::Cancelled);
        }
    };
    ctx.streamer.flush();

    match status? {
        0 => Ok(()),
        code => Err(StepError::ExitStatus(code)),
    }
}

async fn maybe_timeout<F>(timeout_ms: u64, work: F) -> Result<i32, StepError>
where
    F: std::future::Future<Output = Result<i32, crate::backend::BackendError>>,
{
    if timeout_ms == 0 {
        return Ok(work.await?);
    }
    let limit = Duration::from_millis(timeout_ms);
    match tokio::time::timeout(limit, work).await {
        Ok(status) => Ok(status?),
        Err(_) => Err(StepError::Timeout(limit)),
    }
}

async fn copy_stream(stream: Option<OutputStream>, mut sink: impl FnMut(&[u8])) {
    let Some(mut stream) = stream else {
        return;
    };
    let mut buffer = [0u8; 4096];
    loop {
        match stream.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink(&buffer[..n]),
        }
    }
}

async fn perform_download<C: Clock>(
    download: &DownloadAction,
    ctx: &StepCtx<'_, C>,
) -> Result<(), StepError> {
    let transfer = async {
        let response = ctx
            .http
            .get(&download.from)
            .send()
            .await
            .map_err(|err| StepError::Failed(format!("download {}: {err}", download.from)))?;
        if !response.status().is_success() {
            return Err(StepError::Failed(format!(
                "download {}: status {}",
                download.from,
                response.status()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| StepError::Failed(format!("download {}: {err}", download.from)))?;
        ctx.backend.stream_in(ctx.handle, &download.to, body.to_vec()).await?;
        Ok(())
    };
    tokio::select! {
        result = transfer => result,
        _ = ctx.cancel.cancelled() => Err(StepError::Cancelled),
    }
}

async fn perform_upload<C: Clock>(
    upload: &UploadAction,
    ctx: &StepCtx<'_, C>,
) -> Result<(), StepError> {
    let transfer = async {
        let contents = ctx.backend.stream_out(ctx.handle, &upload.from).await?;
        let response = ctx
            .http
            .post(&upload.to)
            .body(contents)
            .send()
            .await
            .map_err(|err| StepError::Failed(format!("upload {}: {err}", upload.to)))?;
        if !response.status().is_success() {
            return Err(StepError::Failed(format!(
                "upload {}: status {}",
                upload.to,
                response.status()
            )));
        }
        Ok(())
    };
    tokio::select! {
        result = transfer => result,
        _ = ctx.cancel.cancelled() => Err(StepError::Cancelled),
    }
}

async fn perform_emit_progress<C: Clock>(
    progress: &EmitProgressAction,
    ctx: &StepCtx<'_, C>,
) -> Result<(), StepError> {
    if !progress.start_message.is_empty() {
        ctx.streamer.write_stdout(progress.start_message.as_bytes());
        ctx.streamer.write_stdout(b"\n");
    }
    match perform(&progress.action, ctx).await {
        Ok(()) => {
            if !progress.success_message.is_empty() {
                ctx.streamer.write_stdout(progress.success_message.as_bytes());
                ctx.streamer.write_stdout(b"\n");
            }
            Ok(())
        }
        Err(StepError::Cancelled) => Err(StepError::Cancelled),
        Err(err) => {
            if !progress.failure_message.is_empty() {
                ctx.streamer
                    .write_stderr(format!("{}: {}\n", progress.failure_message, err).as_bytes());
            }
            Err(err)
        }
    }
}

/// Poll the health-check child on an interval, firing hooks on transitions.
/// Runs until cancelled.
async fn perform_monitor<C: Clock>(
    monitor: &MonitorAction,
    ctx: &StepCtx<'_, C>,
) -> Result<(), StepError> {
    let mut healthy = false;
    let mut checked = false;
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(StepError::Cancelled),
            _ = tokio::time::sleep(ctx.monitor_interval) => {}
        }
        match perform(&monitor.action, ctx).await {
            Err(StepError::Cancelled) => return Err(StepError::Cancelled),
            Ok(()) => {
                if !checked || !healthy {
                    hit_hook(ctx, &monitor.healthy_hook).await;
                }
                healthy = true;
            }
            Err(err) => {
                debug!(error = %err, "health check failed");
                if !checked || healthy {
                    hit_hook(ctx, &monitor.unhealthy_hook).await;
                }
                healthy = false;
            }
        }
        checked = true;
    }
}

async fn hit_hook<C: Clock>(ctx: &StepCtx<'_, C>, url: &str) {
    if url.is_empty() {
        return;
    }
    if let Err(err) = ctx.http.post(url).send().await {
        warn!(%url, error = %err, "health hook failed");
    }
}

/// Start every child; on the first non-cancel failure, cancel the rest. The
/// aggregate result is the first non-cancel error, or `Cancelled` when the
/// only failures were cancellations.
async fn perform_parallel<C: Clock>(
    actions: &[Action],
    ctx: &StepCtx<'_, C>,
) -> Result<(), StepError> {
    if actions.is_empty() {
        return Ok(());
    }
    let sibling_cancel = ctx.cancel.child_token();
    let child_ctx = StepCtx {
        backend: ctx.backend,
        handle: ctx.handle,
        streamer: ctx.streamer,
        cancel: &sibling_cancel,
        env: ctx.env,
        http: ctx.http,
        monitor_interval: ctx.monitor_interval,
    };

    let mut pending: FuturesUnordered<_> =
        actions.iter().map(|action| perform(action, &child_ctx)).collect();
    let mut first_error: Option<StepError> = None;
    let mut saw_cancelled = false;
    while let Some(result) = pending.next().await {
        match result {
            Ok(()) => {}
            Err(StepError::Cancelled) => saw_cancelled = true,
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                    sibling_cancel.cancel();
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None if saw_cancelled || ctx.cancel.is_cancelled() => Err(StepError::Cancelled),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "sequence_tests.rs"]
mod tests;
