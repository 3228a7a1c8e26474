// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface of the agent.
//!
//! Success responses are JSON; every failed request carries the error's
//! wire name in the `X-Executor-Error` header so clients can decode it back
//! into a typed value. Request bodies are decoded by hand so malformed JSON
//! also travels the typed protocol.

use crate::executor::Executor;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use stevedore_core::{Clock, Container, ExecutorResources};
use stevedore_wire::{AllocationRequest, ExecutorError, RunRequest, EXECUTOR_ERROR_HEADER};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// [`ExecutorError`] as an axum response with the typed header attached.
struct ApiError(ExecutorError);

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.0.to_string()).into_response();
        if let Ok(name) = HeaderValue::from_str(self.0.name()) {
            response.headers_mut().insert(EXECUTOR_ERROR_HEADER, name);
        }
        response
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router<C: Clock>(executor: Arc<Executor<C>>) -> Router {
    Router::new()
        .route("/containers", get(list_containers))
        .route(
            "/containers/{guid}",
            get(get_container).post(allocate_container).delete(delete_container),
        )
        .route("/containers/{guid}/initialize", axum::routing::post(initialize_container))
        .route("/containers/{guid}/run", axum::routing::post(run_container))
        .route("/resources/total", get(total_resources))
        .route("/resources/remaining", get(remaining_resources))
        .route("/ping", get(ping))
        .with_state(executor)
}

/// Serve until the executor's shutdown token fires, then drain.
pub async fn serve<C: Clock>(
    executor: Arc<Executor<C>>,
    listener: tokio::net::TcpListener,
) -> std::io::Result<()> {
    let shutdown: CancellationToken = executor.shutdown_token();
    executor.spawn_pruner();
    info!(addr = %listener.local_addr()?, "agent listening");
    axum::serve(listener, router(executor))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn allocate_container<C: Clock>(
    State(executor): State<Arc<Executor<C>>>,
    Path(guid): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Container>)> {
    let request: AllocationRequest =
        serde_json::from_slice(&body).map_err(|_| ExecutorError::InvalidJson)?;
    let container = executor.allocate(&guid, &request)?;
    Ok((StatusCode::CREATED, Json(container)))
}

async fn get_container<C: Clock>(
    State(executor): State<Arc<Executor<C>>>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Container>> {
    Ok(Json(executor.get(&guid)?))
}

async fn initialize_container<C: Clock>(
    State(executor): State<Arc<Executor<C>>>,
    Path(guid): Path<String>,
) -> ApiResult<(StatusCode, Json<Container>)> {
    let container = executor.initialize(&guid).await?;
    Ok((StatusCode::CREATED, Json(container)))
}

async fn run_container<C: Clock>(
    State(executor): State<Arc<Executor<C>>>,
    Path(guid): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    // A body that does not decode to an action tree is a steps problem,
    // not a generic JSON problem.
    let request: RunRequest =
        serde_json::from_slice(&body).map_err(|_| ExecutorError::StepsInvalid)?;
    executor.run(&guid, request).await?;
    Ok(StatusCode::OK)
}

async fn delete_container<C: Clock>(
    State(executor): State<Arc<Executor<C>>>,
    Path(guid): Path<String>,
) -> ApiResult<StatusCode> {
    executor.delete(&guid).await?;
    Ok(StatusCode::OK)
}

async fn list_containers<C: Clock>(
    State(executor): State<Arc<Executor<C>>>,
) -> Json<Vec<Container>> {
    Json(executor.list())
}

async fn total_resources<C: Clock>(
    State(executor): State<Arc<Executor<C>>>,
) -> Json<ExecutorResources> {
    Json(executor.total_resources())
}

async fn remaining_resources<C: Clock>(
    State(executor): State<Arc<Executor<C>>>,
) -> Json<ExecutorResources> {
    Json(executor.remaining_resources())
}

async fn ping() -> StatusCode {
    StatusCode::OK
}
