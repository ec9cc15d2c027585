//! Tests for cache key derivation.

use std::collections::{BTreeMap, HashMap};

use genpipe::{GenError, GenerationRequest, KeyDeriver};
use serde::Serialize;
use serde_json::json;

#[test]
fn identical_requests_share_a_key() {
    let deriver = KeyDeriver::new("v1");
    let a = GenerationRequest::new("quarterly revenue", "chart", "small");
    let b = GenerationRequest::new("quarterly revenue", "chart", "small");
    assert_eq!(deriver.derive(&a), deriver.derive(&b));
}

#[test]
fn object_key_order_does_not_matter() {
    let deriver = KeyDeriver::new("v1");
    let a = GenerationRequest::new(
        json!({"region": "EU", "filters": {"to": 2024, "from": 2020}, "rows": [1, 2]}),
        "table",
        "large",
    );
    let b = GenerationRequest::new(
        json!({"rows": [1, 2], "filters": {"from": 2020, "to": 2024}, "region": "EU"}),
        "table",
        "large",
    );
    assert_eq!(deriver.derive(&a), deriver.derive(&b));
}

#[test]
fn array_order_matters() {
    let deriver = KeyDeriver::new("v1");
    let a = GenerationRequest::new(json!([1, 2]), "table", "large");
    let b = GenerationRequest::new(json!([2, 1]), "table", "large");
    assert_ne!(deriver.derive(&a), deriver.derive(&b));
}

#[test]
fn surrounding_whitespace_in_text_is_ignored() {
    let deriver = KeyDeriver::new("v1");
    let a = GenerationRequest::new("  hello\n", "chart", "small");
    let b = GenerationRequest::new("hello", "chart", "small");
    assert_eq!(deriver.derive(&a), deriver.derive(&b));
}

#[test]
fn surrounding_whitespace_in_intent_is_ignored() {
    let deriver = KeyDeriver::new("v1");
    let a = GenerationRequest::new("hello", " dashboard\n", "small");
    let b = GenerationRequest::new("hello", "dashboard", "small");
    assert_eq!(deriver.derive(&a), deriver.derive(&b));
    assert_eq!(
        deriver.derive_parts("hello", "  dashboard", "small").unwrap(),
        deriver.derive(&b)
    );
}

#[test]
fn every_component_changes_the_key() {
    let base = KeyDeriver::new("v1").derive(&GenerationRequest::new("x", "y", "small"));

    let other_input = KeyDeriver::new("v1").derive(&GenerationRequest::new("x2", "y", "small"));
    let other_intent = KeyDeriver::new("v1").derive(&GenerationRequest::new("x", "y2", "small"));
    let other_model = KeyDeriver::new("v1").derive(&GenerationRequest::new("x", "y", "large"));
    let other_version = KeyDeriver::new("v2").derive(&GenerationRequest::new("x", "y", "small"));

    for other in [other_input, other_intent, other_model, other_version] {
        assert_ne!(base, other);
    }
}

#[test]
fn text_and_json_string_inputs_agree() {
    let deriver = KeyDeriver::new("v1");
    let text = deriver.derive(&GenerationRequest::new("hello", "chart", "small"));
    let parts = deriver.derive_parts("hello", "chart", "small").unwrap();
    assert_eq!(text, parts);
}

#[test]
fn derive_parts_matches_structured_request() {
    #[derive(Serialize)]
    struct Query {
        region: &'static str,
        quarter: u8,
    }

    let deriver = KeyDeriver::new("v1");
    let query = Query {
        region: "EU",
        quarter: 3,
    };
    let from_parts = deriver.derive_parts(&query, "table", "large").unwrap();
    let from_request = deriver.derive(&GenerationRequest::structured(&query, "table", "large").unwrap());
    assert_eq!(from_parts, from_request);

    let mut map = BTreeMap::new();
    map.insert("quarter", json!(3));
    map.insert("region", json!("EU"));
    assert_eq!(deriver.derive_parts(&map, "table", "large").unwrap(), from_parts);
}

#[test]
fn unserializable_input_is_a_serialization_error() {
    let mut map: HashMap<Vec<u8>, u8> = HashMap::new();
    map.insert(vec![1, 2], 3);

    let err = KeyDeriver::new("v1")
        .derive_parts(&map, "chart", "small")
        .unwrap_err();
    assert!(matches!(err, GenError::Serialization(_)));
}

#[test]
fn key_is_fixed_length_hex() {
    let deriver = KeyDeriver::new("v1");
    for input in ["", "a", "long input ".repeat(1000).as_str()] {
        let key = deriver.derive(&GenerationRequest::new(input, "y", "small"));
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }
}
