// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use stevedore_core::FakeClock;

fn registry(memory_mb: u64, disk_mb: u64, containers: u64) -> Registry<FakeClock> {
    Registry::new(
        ExecutorResources { memory_mb, disk_mb, containers },
        FakeClock::new(),
    )
}

fn request(memory_mb: u64, disk_mb: u64) -> AllocationRequest {
    AllocationRequest { memory_mb, disk_mb, ..AllocationRequest::default() }
}

#[test]
fn allocation_accounting_matches_the_documented_scenario() {
    let registry = registry(1024, 2048, 32);

    registry.allocate("a", &request(64, 1024)).unwrap();
    registry.allocate("b", &request(960, 1024)).unwrap();

    assert_eq!(
        registry.remaining_capacity(),
        ExecutorResources { memory_mb: 0, disk_mb: 0, containers: 30 }
    );
    assert_eq!(
        registry.allocate("c", &request(1, 1)),
        Err(ExecutorError::InsufficientResources)
    );
    assert_eq!(
        registry.total_capacity(),
        ExecutorResources { memory_mb: 1024, disk_mb: 2048, containers: 32 }
    );
}

#[test]
fn allocation_records_the_request() {
    let registry = registry(1024, 2048, 32);
    let clock = registry.clock.clone();
    clock.set_epoch_ms(7_000);

    let mut request = request(64, 512);
    request.cpu_weight = 5;
    request.root_fs = "docker:///busybox".to_string();
    request.tags.insert("lifecycle".to_string(), "task".to_string());

    let container = registry.allocate("a", &request).unwrap();
    assert_eq!(container.state, State::Reserved);
    assert_eq!(container.guid, "a");
    assert_eq!(container.cpu_weight, 5);
    assert_eq!(container.allocated_at, 7_000);
    assert_eq!(container.root_fs, "docker:///busybox");
    assert!(container.container_handle.is_empty());
    assert_eq!(registry.get("a").unwrap(), container);
}

#[test]
fn duplicate_guid_is_rejected() {
    let registry = registry(1024, 2048, 32);
    registry.allocate("a", &request(1, 1)).unwrap();
    assert_eq!(
        registry.allocate("a", &request(1, 1)),
        Err(ExecutorError::GuidNotAvailable)
    );
}

#[test]
fn container_count_ceiling_is_enforced() {
    let registry = registry(1024, 2048, 2);
    registry.allocate("a", &request(1, 1)).unwrap();
    registry.allocate("b", &request(1, 1)).unwrap();
    assert_eq!(registry.allocate("c", &request(1, 1)), Err(ExecutorError::LimitReached));
}

#[test]
fn cpu_weight_zero_defaults_and_out_of_range_is_rejected() {
    let registry = registry(1024, 2048, 32);

    let container = registry.allocate("a", &request(1, 1)).unwrap();
    assert_eq!(container.cpu_weight, 100);

    let mut over = request(1, 1);
    over.cpu_weight = 101;
    assert_eq!(registry.allocate("b", &over), Err(ExecutorError::LimitsInvalid));
}

#[test]
fn lifecycle_walks_the_state_machine() {
    let registry = registry(1024, 2048, 32);
    registry.allocate("a", &request(64, 64)).unwrap();

    let container = registry.start_initializing("a").unwrap();
    assert_eq!(container.state, State::Initializing);

    let ports = vec![PortMapping { container_port: 8080, host_port: 60001 }];
    let container = registry.mark_created("a", "handle-9".to_string(), ports.clone()).unwrap();
    assert_eq!(container.state, State::Created);
    assert_eq!(container.container_handle, "handle-9");
    assert_eq!(container.ports, ports);

    let result = RunResult {
        guid: "a".to_string(),
        failed: false,
        failure_reason: String::new(),
        result: String::new(),
    };
    let container = registry.complete("a", result.clone()).unwrap();
    assert_eq!(container.state, State::Completed);
    assert_eq!(container.run_result, result);
}

#[test]
fn illegal_transitions_are_rejected() {
    let registry = registry(1024, 2048, 32);
    registry.allocate("a", &request(1, 1)).unwrap();

    // Reserved container cannot be created or completed directly.
    assert_eq!(
        registry.mark_created("a", "h".to_string(), Vec::new()),
        Err(ExecutorError::InvalidTransition)
    );
    assert_eq!(
        registry.complete("a", RunResult::default()),
        Err(ExecutorError::InvalidTransition)
    );

    registry.start_initializing("a").unwrap();
    assert_eq!(registry.start_initializing("a"), Err(ExecutorError::InvalidTransition));

    registry.mark_created("a", "h".to_string(), Vec::new()).unwrap();
    registry.complete("a", RunResult::default()).unwrap();

    // Completed is terminal short of deletion.
    assert_eq!(registry.start_initializing("a"), Err(ExecutorError::InvalidTransition));
    assert_eq!(
        registry.complete("a", RunResult::default()),
        Err(ExecutorError::InvalidTransition)
    );
}

#[test]
fn missing_guids_report_not_found() {
    let registry = registry(1024, 2048, 32);
    assert_eq!(registry.get("nope"), Err(ExecutorError::ContainerNotFound));
    assert_eq!(registry.start_initializing("nope"), Err(ExecutorError::ContainerNotFound));
    assert_eq!(registry.delete("nope"), Err(ExecutorError::ContainerNotFound));
}

#[test]
fn completion_releases_capacity_but_keeps_the_record() {
    let registry = registry(1024, 2048, 32);
    registry.allocate("a", &request(512, 512)).unwrap();
    registry.start_initializing("a").unwrap();
    registry.mark_created("a", "h".to_string(), Vec::new()).unwrap();

    assert_eq!(registry.remaining_capacity().memory_mb, 512);
    registry.complete("a", RunResult::default()).unwrap();

    assert_eq!(
        registry.remaining_capacity(),
        ExecutorResources { memory_mb: 1024, disk_mb: 2048, containers: 32 }
    );
    assert_eq!(registry.get("a").unwrap().state, State::Completed);
    assert_eq!(registry.list().len(), 1);
}

#[test]
fn failed_initialization_completes_the_record_with_the_reason() {
    let registry = registry(1024, 2048, 32);
    registry.allocate("a", &request(512, 512)).unwrap();
    registry.start_initializing("a").unwrap();

    registry.mark_initialize_failed("a", "quota exhausted".to_string()).unwrap();

    let container = registry.get("a").unwrap();
    assert_eq!(container.state, State::Completed);
    assert!(container.run_result.failed);
    assert_eq!(container.run_result.failure_reason, "quota exhausted");
    assert_eq!(registry.remaining_capacity().memory_mb, 1024);

    // A second initialize attempt sees an illegal transition.
    assert_eq!(registry.start_initializing("a"), Err(ExecutorError::InvalidTransition));
}

#[test]
fn delete_from_any_state_releases_capacity() {
    let registry = registry(1024, 2048, 32);
    registry.allocate("a", &request(512, 512)).unwrap();
    registry.delete("a").unwrap();
    assert_eq!(registry.remaining_capacity().memory_mb, 1024);
    assert_eq!(registry.get("a"), Err(ExecutorError::ContainerNotFound));

    // Deleting while initializing simulates the race with a backend call:
    // the in-flight initialize will find the record gone at mark_created.
    registry.allocate("b", &request(1, 1)).unwrap();
    registry.start_initializing("b").unwrap();
    registry.delete("b").unwrap();
    assert_eq!(
        registry.mark_created("b", "h".to_string(), Vec::new()),
        Err(ExecutorError::ContainerNotFound)
    );
}

#[test]
fn remaining_capacity_never_goes_negative() {
    let registry = registry(10, 10, 2);
    registry.allocate("a", &request(10, 10)).unwrap();
    assert_eq!(
        registry.remaining_capacity(),
        ExecutorResources { memory_mb: 0, disk_mb: 0, containers: 1 }
    );
    assert_eq!(registry.allocate("b", &request(1, 0)), Err(ExecutorError::InsufficientResources));
}

#[test]
fn prune_drops_only_stale_completed_records() {
    let registry = registry(1024, 2048, 32);
    let clock = registry.clock.clone();

    registry.allocate("stale", &request(1, 1)).unwrap();
    registry.start_initializing("stale").unwrap();
    registry.mark_created("stale", "h1".to_string(), Vec::new()).unwrap();
    registry.complete("stale", RunResult::default()).unwrap();

    clock.advance(std::time::Duration::from_secs(200));

    registry.allocate("fresh", &request(1, 1)).unwrap();
    registry.start_initializing("fresh").unwrap();
    registry.mark_created("fresh", "h2".to_string(), Vec::new()).unwrap();
    registry.complete("fresh", RunResult::default()).unwrap();

    registry.allocate("live", &request(1, 1)).unwrap();

    clock.advance(std::time::Duration::from_secs(150));

    let pruned = registry.prune_completed(std::time::Duration::from_secs(300));
    assert_eq!(pruned, vec!["stale".to_string()]);
    assert!(registry.get("stale").is_err());
    assert!(registry.get("fresh").is_ok());
    assert!(registry.get("live").is_ok());
}
