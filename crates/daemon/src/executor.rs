// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration facade over the registry, the backend, and active runs.
//!
//! Long operations follow the registry's locking contract: transition under
//! lock, call the backend lock-free, then transition again with a re-check.
//! The executor also owns the per-run cancellation tokens and the agent-wide
//! shutdown token they descend from.

use crate::backend::{Backend, BackendError, ContainerSpec};
use crate::config::DaemonConfig;
use crate::logs::LogEmitter;
use crate::registry::Registry;
use crate::run::RunSequence;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stevedore_core::{Clock, Container, ExecutorResources, PortMapping, State, SystemClock};
use stevedore_wire::{AllocationRequest, ExecutorError, RunRequest};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const PRUNE_TICK: Duration = Duration::from_secs(60);

pub struct Executor<C: Clock = SystemClock> {
    config: DaemonConfig,
    registry: Arc<Registry<C>>,
    backend: Arc<dyn Backend>,
    emitter: Arc<dyn LogEmitter>,
    http: reqwest::Client,
    clock: C,
    runs: Arc<Mutex<HashMap<String, CancellationToken>>>,
    shutdown: CancellationToken,
}

impl<C: Clock> Executor<C> {
    pub fn new(
        config: DaemonConfig,
        backend: Arc<dyn Backend>,
        emitter: Arc<dyn LogEmitter>,
        clock: C,
    ) -> Arc<Self> {
        let registry = Arc::new(Registry::new(config.total_capacity, clock.clone()));
        Arc::new(Self {
            config,
            registry,
            backend,
            emitter,
            http: reqwest::Client::new(),
            clock,
            runs: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        })
    }

    /// Token cancelled when the agent drains; per-run tokens descend from it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn allocate(
        &self,
        guid: &str,
        request: &AllocationRequest,
    ) -> Result<Container, ExecutorError> {
        let container = self.registry.allocate(guid, request)?;
        info!(
            %guid,
            memory_mb = request.memory_mb,
            disk_mb = request.disk_mb,
            "container allocated"
        );
        Ok(container)
    }

    pub fn get(&self, guid: &str) -> Result<Container, ExecutorError> {
        self.registry.get(guid)
    }

    pub fn list(&self) -> Vec<Container> {
        self.registry.list()
    }

    pub fn total_resources(&self) -> ExecutorResources {
        self.registry.total_capacity()
    }

    pub fn remaining_resources(&self) -> ExecutorResources {
        self.registry.remaining_capacity()
    }

    /// Ask the backend to create the container and run its setup hooks.
    ///
    /// The record transitions to Initializing under lock first, so a
    /// concurrent Initialize observes `InvalidTransition` instead of racing
    /// the backend call.
    pub async fn initialize(&self, guid: &str) -> Result<Container, ExecutorError> {
        let container = self.registry.start_initializing(guid)?;

        match self.create_in_backend(&container).await {
            Ok((handle, ports)) => {
                match self.registry.mark_created(guid, handle.clone(), ports) {
                    Ok(created) => {
                        info!(%guid, handle = %handle, "container initialized");
                        Ok(created)
                    }
                    Err(err) => {
                        // Deleted while the backend call was in flight; the
                        // handle would otherwise leak.
                        warn!(%guid, handle = %handle, "container deleted during initialize");
                        if let Err(destroy_err) = self.backend.destroy(&handle).await {
                            error!(%guid, error = %destroy_err, "failed to destroy orphaned container");
                        }
                        Err(err)
                    }
                }
            }
            Err(reason) => {
                error!(%guid, error = %reason, "container initialization failed");
                let _ = self.registry.mark_initialize_failed(guid, reason.to_string());
                Err(ExecutorError::InitializeFailed)
            }
        }
    }

    async fn create_in_backend(
        &self,
        container: &Container,
    ) -> Result<(String, Vec<PortMapping>), BackendError> {
        let spec = ContainerSpec {
            owner_name: self.config.container_owner_name.clone(),
            memory_mb: container.memory_mb,
            disk_mb: container.disk_mb,
            cpu_shares: u64::from(container.cpu_weight) * self.config.container_max_cpu_shares
                / 100,
            root_fs: container.root_fs.clone(),
        };
        let handle = self.backend.create(spec).await?;
        match self.setup(&handle, container).await {
            Ok(ports) => Ok((handle, ports)),
            Err(err) => {
                if let Err(destroy_err) = self.backend.destroy(&handle).await {
                    error!(handle = %handle, error = %destroy_err, "failed to destroy half-initialized container");
                }
                Err(err)
            }
        }
    }

    async fn setup(
        &self,
        handle: &str,
        container: &Container,
    ) -> Result<Vec<PortMapping>, BackendError> {
        if container.memory_mb > 0 {
            self.backend.limit_memory(handle, container.memory_mb).await?;
        }
        if container.disk_mb > 0 {
            self.backend.limit_disk(handle, container.disk_mb).await?;
        }
        let mut bound = Vec::with_capacity(container.ports.len());
        for mapping in &container.ports {
            let host_port =
                self.backend.net_in(handle, mapping.container_port, mapping.host_port).await?;
            bound.push(PortMapping { container_port: mapping.container_port, host_port });
        }
        Ok(bound)
    }

    /// Launch the run sequence for a Created container. Returns once the
    /// sequence announces readiness; completion is reported through the
    /// registry and the request's completion callback.
    pub async fn run(&self, guid: &str, request: RunRequest) -> Result<(), ExecutorError> {
        let container = self.registry.get(guid)?;
        if container.state != State::Created {
            return Err(ExecutorError::InvalidTransition);
        }
        for action in &request.actions {
            action.validate().map_err(|err| {
                warn!(%guid, error = %err, "rejecting run request");
                ExecutorError::StepsInvalid
            })?;
        }

        let cancel = self.shutdown.child_token();
        {
            let mut runs = self.runs.lock();
            if runs.contains_key(guid) {
                return Err(ExecutorError::InvalidTransition);
            }
            runs.insert(guid.to_string(), cancel.clone());
        }

        let sequence = RunSequence {
            container,
            actions: request.actions,
            env: request.env,
            complete_url: request.complete_url,
            registry: self.registry.clone(),
            backend: self.backend.clone(),
            emitter: self.emitter.clone(),
            http: self.http.clone(),
            clock: self.clock.clone(),
            max_log_message_size: self.config.max_log_message_size,
            monitor_interval: self.config.monitor_interval,
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let runs = Arc::clone(&self.runs);
        let owned_guid = guid.to_string();
        tokio::spawn(async move {
            let _ = sequence.run(cancel, ready_tx).await;
            runs.lock().remove(&owned_guid);
        });
        let _ = ready_rx.await;
        Ok(())
    }

    /// Cancel any in-flight run, drop the record, and destroy the backend
    /// container. Backend failures are logged and swallowed: the slot is
    /// reclaimed regardless.
    pub async fn delete(&self, guid: &str) -> Result<(), ExecutorError> {
        if let Some(cancel) = self.runs.lock().remove(guid) {
            cancel.cancel();
        }
        let container = self.registry.delete(guid)?;
        if !container.container_handle.is_empty() {
            if let Err(err) = self.backend.destroy(&container.container_handle).await {
                error!(
                    %guid,
                    handle = %container.container_handle,
                    error = %err,
                    "failed to destroy container"
                );
            }
        }
        info!(%guid, "container deleted");
        Ok(())
    }

    /// Cancel every active run and refuse nothing else; callers stop the
    /// HTTP server off the same token.
    pub fn drain(&self) {
        info!("draining: cancelling all active runs");
        self.shutdown.cancel();
    }

    /// Periodically GC Completed records. No-op when the TTL is zero.
    pub fn spawn_pruner(&self) {
        if self.config.completed_ttl.is_zero() {
            return;
        }
        let registry = Arc::clone(&self.registry);
        let shutdown = self.shutdown.clone();
        let ttl = self.config.completed_ttl;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(PRUNE_TICK);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        let pruned = registry.prune_completed(ttl);
                        if !pruned.is_empty() {
                            info!(count = pruned.len(), "pruned completed containers");
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
