//! Field paths, ordering, and arithmetic over JSON values.

use std::cmp::Ordering;

use anyhow::{bail, Result};
use serde_json::{Number, Value};

use crate::models::Document;

/// Rank used to order values of different types:
/// null < numbers < strings < objects < arrays < booleans.
pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x.cmp(&y);
    }
    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

/// Total order over JSON values.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y) {
                let ord = lk.cmp(rk).then_with(|| compare(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Equality where `1` and `1.0` are the same value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare(a, b) == Ordering::Equal
}

/// Every value reachable through a dotted path.
///
/// Arrays along the path fan out over their elements; a numeric segment
/// indexes into an array.
pub fn resolve<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return Vec::new();
    };
    let mut current: Vec<&Value> = doc.get(first).into_iter().collect();

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => next.extend(map.get(segment)),
                Value::Array(items) => {
                    if let Ok(idx) = segment.parse::<usize>() {
                        next.extend(items.get(idx));
                    } else {
                        for item in items {
                            if let Value::Object(map) = item {
                                next.extend(map.get(segment));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

/// The value at a path as a single value: `None` when missing, an array
/// when the path fanned out over several elements.
pub fn field_value(doc: &Document, path: &str) -> Option<Value> {
    let found = resolve(doc, path);
    match found.len() {
        0 => None,
        1 if !path_crosses_array(doc, path) => Some(found[0].clone()),
        _ => Some(Value::Array(found.into_iter().cloned().collect())),
    }
}

fn path_crosses_array(doc: &Document, path: &str) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = match doc.get(segments[0]) {
        Some(v) => v,
        None => return false,
    };
    for segment in &segments[1..] {
        match current {
            Value::Object(map) => match map.get(*segment) {
                Some(v) => current = v,
                None => return false,
            },
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(idx) => match items.get(idx) {
                    Some(v) => current = v,
                    None => return false,
                },
                Err(_) => return true,
            },
            _ => return false,
        }
    }
    false
}

/// Set a dotted path, creating intermediate objects as needed.
pub fn set_path(doc: &mut Document, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => bail!("empty field path"),
    };
    if segments.iter().any(|s| s.is_empty()) {
        bail!("invalid field path '{}'", path);
    }

    let mut current = doc;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Document::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => bail!(
                "cannot create field '{}' in '{}': parent is not a document",
                last,
                path
            ),
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Remove a dotted path, returning the removed value.
pub fn remove_path(doc: &mut Document, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;
    let mut current = doc;
    for segment in parents {
        current = match current.get_mut(*segment) {
            Some(Value::Object(map)) => map,
            _ => return None,
        };
    }
    current.shift_remove(*last)
}

/// Truthiness used by projections and `$exists`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

fn checked_or_float(
    a: &Number,
    b: &Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(r) = int_op(x, y) {
            return Value::Number(r.into());
        }
    }
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    Number::from_f64(float_op(x, y)).map_or(Value::Null, Value::Number)
}

pub fn add_numbers(a: &Number, b: &Number) -> Value {
    checked_or_float(a, b, i64::checked_add, |x, y| x + y)
}

pub fn mul_numbers(a: &Number, b: &Number) -> Value {
    checked_or_float(a, b, i64::checked_mul, |x, y| x * y)
}
