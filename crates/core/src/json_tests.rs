// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::Deserialize;

#[derive(Debug, PartialEq, Deserialize)]
struct Doc {
    #[serde(default, deserialize_with = "null_to_default")]
    ports: Vec<u16>,
    #[serde(default, deserialize_with = "null_to_default")]
    label: String,
}

#[test]
fn null_decodes_to_the_default() {
    let doc: Doc = serde_json::from_str(r#"{"ports": null, "label": null}"#).unwrap();
    assert_eq!(doc, Doc { ports: Vec::new(), label: String::new() });
}

#[test]
fn omitted_fields_decode_to_the_default() {
    let doc: Doc = serde_json::from_str("{}").unwrap();
    assert_eq!(doc, Doc { ports: Vec::new(), label: String::new() });
}

#[test]
fn present_values_pass_through() {
    let doc: Doc = serde_json::from_str(r#"{"ports": [8080, 9090], "label": "web"}"#).unwrap();
    assert_eq!(doc.ports, vec![8080, 9090]);
    assert_eq!(doc.label, "web");
}

#[test]
fn wrong_types_still_error() {
    assert!(serde_json::from_str::<Doc>(r#"{"ports": "nope"}"#).is_err());
}
