// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory container registry: capacity accounting, the lifecycle state
//! machine, and lookup.
//!
//! All state lives behind a single registry-wide mutex. Critical sections
//! are brief; the backend is never called under the lock. The executor
//! sequences long operations as transition → lock-free backend call →
//! transition-with-recheck, so a Delete racing an Initialize is observed at
//! the second transition.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use stevedore_core::{Clock, Container, ExecutorResources, PortMapping, RunResult, State};
use stevedore_wire::{AllocationRequest, ExecutorError};

struct Record {
    container: Container,
    completed_at_ms: Option<u64>,
}

pub struct Registry<C: Clock> {
    total: ExecutorResources,
    clock: C,
    records: Mutex<HashMap<String, Record>>,
}

impl<C: Clock> Registry<C> {
    pub fn new(total: ExecutorResources, clock: C) -> Self {
        Self { total, clock, records: Mutex::new(HashMap::new()) }
    }

    /// Reserve capacity for a new container.
    ///
    /// Capacity checks and the insert happen in one critical section, so two
    /// racing allocations can never both fit into the last slot.
    pub fn allocate(
        &self,
        guid: &str,
        request: &AllocationRequest,
    ) -> Result<Container, ExecutorError> {
        let cpu_weight = match request.cpu_weight {
            0 => 100,
            weight if weight > 100 => return Err(ExecutorError::LimitsInvalid),
            weight => weight,
        };

        let mut records = self.records.lock();
        if records.contains_key(guid) {
            return Err(ExecutorError::GuidNotAvailable);
        }
        let remaining = remaining_of(self.total, &records);
        if remaining.containers == 0 {
            return Err(ExecutorError::LimitReached);
        }
        if request.memory_mb > remaining.memory_mb || request.disk_mb > remaining.disk_mb {
            return Err(ExecutorError::InsufficientResources);
        }

        let container = Container {
            guid: guid.to_string(),
            state: State::Reserved,
            memory_mb: request.memory_mb,
            disk_mb: request.disk_mb,
            cpu_weight,
            tags: request.tags.clone(),
            allocated_at: self.clock.epoch_ms(),
            root_fs: request.root_fs.clone(),
            ports: request.ports.clone(),
            log: request.log.clone(),
            env: request.env.clone(),
            container_handle: String::new(),
            run_result: RunResult::default(),
        };
        records.insert(
            guid.to_string(),
            Record { container: container.clone(), completed_at_ms: None },
        );
        Ok(container)
    }

    pub fn get(&self, guid: &str) -> Result<Container, ExecutorError> {
        self.records
            .lock()
            .get(guid)
            .map(|record| record.container.clone())
            .ok_or(ExecutorError::ContainerNotFound)
    }

    pub fn list(&self) -> Vec<Container> {
        self.records.lock().values().map(|record| record.container.clone()).collect()
    }

    /// Reserved → Initializing. The caller then talks to the backend without
    /// holding any lock and finishes with [`mark_created`] or
    /// [`mark_initialize_failed`].
    ///
    /// [`mark_created`]: Registry::mark_created
    /// [`mark_initialize_failed`]: Registry::mark_initialize_failed
    pub fn start_initializing(&self, guid: &str) -> Result<Container, ExecutorError> {
        self.advance(guid, State::Initializing, |_| {})
    }

    /// Initializing → Created, storing the backend handle and the ports the
    /// backend actually bound. Fails with `ContainerNotFound` if the record
    /// was deleted while the backend call was in flight.
    pub fn mark_created(
        &self,
        guid: &str,
        handle: String,
        ports: Vec<PortMapping>,
    ) -> Result<Container, ExecutorError> {
        self.advance(guid, State::Created, |container| {
            container.container_handle = handle;
            container.ports = ports;
        })
    }

    /// Initializing → Completed with failure recorded; the capacity the
    /// container held is released by the transition.
    pub fn mark_initialize_failed(
        &self,
        guid: &str,
        reason: String,
    ) -> Result<Container, ExecutorError> {
        let failure = RunResult {
            guid: guid.to_string(),
            failed: true,
            failure_reason: reason,
            result: String::new(),
        };
        self.complete_record(guid, State::Initializing, failure)
    }

    /// Created → Completed with the run's result. Called by the run sequence.
    pub fn complete(&self, guid: &str, result: RunResult) -> Result<Container, ExecutorError> {
        self.complete_record(guid, State::Created, result)
    }

    /// Remove the record from any state, returning it so the caller can
    /// clean up the backend container.
    pub fn delete(&self, guid: &str) -> Result<Container, ExecutorError> {
        self.records
            .lock()
            .remove(guid)
            .map(|record| record.container)
            .ok_or(ExecutorError::ContainerNotFound)
    }

    pub fn total_capacity(&self) -> ExecutorResources {
        self.total
    }

    pub fn remaining_capacity(&self) -> ExecutorResources {
        remaining_of(self.total, &self.records.lock())
    }

    /// Drop Completed records older than `ttl`. Returns the pruned guids.
    pub fn prune_completed(&self, ttl: Duration) -> Vec<String> {
        let cutoff = self.clock.epoch_ms().saturating_sub(ttl.as_millis() as u64);
        let mut pruned = Vec::new();
        self.records.lock().retain(|guid, record| {
            match record.completed_at_ms {
                Some(completed_at) if completed_at <= cutoff => {
                    pruned.push(guid.clone());
                    false
                }
                _ => true,
            }
        });
        pruned
    }

    fn advance(
        &self,
        guid: &str,
        next: State,
        mutate: impl FnOnce(&mut Container),
    ) -> Result<Container, ExecutorError> {
        let mut records = self.records.lock();
        let record = records.get_mut(guid).ok_or(ExecutorError::ContainerNotFound)?;
        if !record.container.state.can_advance_to(next) {
            return Err(ExecutorError::InvalidTransition);
        }
        record.container.state = next;
        mutate(&mut record.container);
        Ok(record.container.clone())
    }

    fn complete_record(
        &self,
        guid: &str,
        expected: State,
        result: RunResult,
    ) -> Result<Container, ExecutorError> {
        let mut records = self.records.lock();
        let record = records.get_mut(guid).ok_or(ExecutorError::ContainerNotFound)?;
        if record.container.state != expected {
            return Err(ExecutorError::InvalidTransition);
        }
        record.container.state = State::Completed;
        record.container.run_result = result;
        record.completed_at_ms = Some(self.clock.epoch_ms());
        Ok(record.container.clone())
    }
}

fn remaining_of(total: ExecutorResources, records: &HashMap<String, Record>) -> ExecutorResources {
    let mut remaining = total;
    for record in records.values() {
        if record.container.state.consumes_capacity() {
            remaining.memory_mb = remaining.memory_mb.saturating_sub(record.container.memory_mb);
            remaining.disk_mb = remaining.disk_mb.saturating_sub(record.container.disk_mb);
            remaining.containers = remaining.containers.saturating_sub(1);
        }
    }
    remaining
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
