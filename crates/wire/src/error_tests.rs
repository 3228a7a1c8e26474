// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const ALL: [ExecutorError; 8] = [
    ExecutorError::ContainerNotFound,
    ExecutorError::GuidNotAvailable,
    ExecutorError::InsufficientResources,
    ExecutorError::LimitReached,
    ExecutorError::InvalidTransition,
    ExecutorError::StepsInvalid,
    ExecutorError::InitializeFailed,
    ExecutorError::LimitsInvalid,
];

#[test]
fn names_round_trip() {
    for err in ALL {
        assert_eq!(ExecutorError::from_name(err.name()), err);
    }
}

#[test]
fn wire_names_are_stable() {
    let names: Vec<&str> = ALL.iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec![
            "ContainerNotFound",
            "ContainerGuidNotAvailable",
            "InsufficientResources",
            "LimitReached",
            "InvalidTransition",
            "StepsInvalid",
            "InitializeFailed",
            "LimitsInvalid",
        ]
    );
}

#[test]
fn http_codes_match_the_error_table() {
    assert_eq!(ExecutorError::ContainerNotFound.http_code(), 404);
    assert_eq!(ExecutorError::GuidNotAvailable.http_code(), 400);
    assert_eq!(ExecutorError::InsufficientResources.http_code(), 503);
    assert_eq!(ExecutorError::LimitReached.http_code(), 503);
    assert_eq!(ExecutorError::InvalidTransition.http_code(), 400);
    assert_eq!(ExecutorError::StepsInvalid.http_code(), 400);
    assert_eq!(ExecutorError::InitializeFailed.http_code(), 500);
    assert_eq!(ExecutorError::LimitsInvalid.http_code(), 400);
}

#[test]
fn invalid_json_rides_the_same_protocol() {
    assert_eq!(ExecutorError::InvalidJson.name(), "InvalidJSON");
    assert_eq!(ExecutorError::InvalidJson.http_code(), 400);
    assert_eq!(ExecutorError::from_name("InvalidJSON"), ExecutorError::InvalidJson);
}

#[test]
fn unknown_names_are_preserved_verbatim() {
    let err = ExecutorError::from_name("Whoa");
    assert_eq!(err, ExecutorError::Unknown("Whoa".to_string()));
    assert_eq!(err.name(), "Whoa");
    assert!(err.to_string().contains("Whoa"));
    assert_eq!(err.http_code(), 500);
}

#[test]
fn sentinels_compare_by_identity() {
    assert_eq!(ExecutorError::ContainerNotFound, ExecutorError::ContainerNotFound);
    assert_ne!(ExecutorError::ContainerNotFound, ExecutorError::StepsInvalid);
    assert_ne!(
        ExecutorError::Unknown("A".to_string()),
        ExecutorError::Unknown("B".to_string())
    );
}
