// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serde helpers for the wire format.

use serde::{Deserialize, Deserializer};

/// Deserialize a field that callers may send as `null` (e.g. `"ports": null`
/// on an allocation request) by falling back to the type's default.
///
/// Combine with `#[serde(default)]` so the field may also be omitted
/// entirely.
pub fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
