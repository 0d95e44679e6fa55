//! Sequence merging.
//!
//! Two sequences are merged by partitioning their elements by kind and
//! recombining the partitions in a fixed order: mappings, then scalars, then
//! nested sequences. Scalar partitions behave as an ordered set union. All
//! outputs are deterministic: element order only depends on input order.

use serde_json::Value;

/// Merge `override_list` into `original_list`.
///
/// - Mappings: original's then override's. With `uniqify`, a mapping equal to
///   an earlier one (same keys and values, in any order) is dropped.
/// - Scalars: every distinct scalar of original in order, then the ones only
///   override has, in order.
/// - Nested sequences: paired by position and merged recursively with the same
///   `uniqify` flag; unpaired ones are appended unchanged.
pub fn handle_lists_merges(original_list: &[Value], override_list: &[Value], uniqify: bool) -> Vec<Value> {
    let mut merged = Vec::with_capacity(original_list.len() + override_list.len());

    // Mappings
    let mappings = original_list
        .iter()
        .chain(override_list)
        .filter(|item| item.is_object());
    if uniqify {
        for item in mappings {
            if !merged.iter().any(|seen| structurally_equal(seen, item)) {
                merged.push(item.clone());
            }
        }
    } else {
        merged.extend(mappings.cloned());
    }

    // Scalars
    let mut scalars: Vec<Value> = Vec::new();
    for item in original_list.iter().chain(override_list) {
        if is_scalar(item) && !scalars.contains(item) {
            scalars.push(item.clone());
        }
    }
    merged.extend(scalars);

    // Nested sequences
    let original_nested: Vec<&Vec<Value>> = original_list.iter().filter_map(Value::as_array).collect();
    let override_nested: Vec<&Vec<Value>> = override_list.iter().filter_map(Value::as_array).collect();
    let paired = original_nested.len().max(override_nested.len());
    for index in 0..paired {
        match (original_nested.get(index), override_nested.get(index)) {
            (Some(original), Some(overriding)) => {
                merged.push(Value::Array(handle_lists_merges(original, overriding, uniqify)));
            }
            (Some(only), None) | (None, Some(only)) => merged.push(Value::Array((*only).clone())),
            (None, None) => {}
        }
    }

    merged
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

/// Deep equality that ignores mapping key order.
fn structurally_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l
                    .iter()
                    .all(|(key, lv)| r.get(key).is_some_and(|rv| structurally_equal(lv, rv)))
        }
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(lv, rv)| structurally_equal(lv, rv))
        }
        (l, r) => l == r,
    }
}
