//! Filter matching (`find`, `$match`, update filters).

use std::cmp::Ordering;

use anyhow::{anyhow, bail, Result};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::value::{compare, is_truthy, resolve, type_rank, values_equal};
use crate::models::Document;

/// Does `doc` satisfy every condition in `filter`?
pub fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => clauses(key, condition)?
                .iter()
                .map(|c| matches(doc, c))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .all(|b| b),
            "$or" => clauses(key, condition)?
                .iter()
                .map(|c| matches(doc, c))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .any(|b| b),
            "$nor" => !clauses(key, condition)?
                .iter()
                .map(|c| matches(doc, c))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .any(|b| b),
            op if op.starts_with('$') => bail!("unsupported query operator '{}'", op),
            path => matches_field(doc, path, condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(op: &str, value: &'a Value) -> Result<Vec<&'a Document>> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("{} expects an array of filters", op))?;
    if items.is_empty() {
        bail!("{} expects a non-empty array", op);
    }
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| anyhow!("{} entries must be documents", op))
        })
        .collect()
}

/// An object whose keys all start with `$` is an operator expression.
fn is_operator_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn matches_field(doc: &Document, path: &str, condition: &Value) -> Result<bool> {
    let found = resolve(doc, path);
    match condition {
        Value::Object(ops) if is_operator_object(condition) => apply_operators(&found, ops),
        _ => Ok(equals_any(&found, condition)),
    }
}

/// Candidate values for comparisons: each value, plus the elements of
/// array values.
fn expand<'a>(found: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for value in found {
        out.push(*value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn equals_any(found: &[&Value], target: &Value) -> bool {
    if found.is_empty() {
        return target.is_null();
    }
    expand(found).iter().any(|v| values_equal(v, target))
}

fn in_list(found: &[&Value], operand: &Value, op: &str) -> Result<bool> {
    let list = operand
        .as_array()
        .ok_or_else(|| anyhow!("{} expects an array", op))?;
    Ok(list.iter().any(|target| equals_any(found, target)))
}

fn compare_any(found: &[&Value], operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    expand(found)
        .iter()
        .any(|v| type_rank(v) == type_rank(operand) && accept(compare(v, operand)))
}

fn build_regex(pattern: &str, options: &str) -> Result<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => bail!("unsupported $regex option '{}'", other),
        };
    }
    builder
        .build()
        .map_err(|e| anyhow!("invalid $regex '{}': {}", pattern, e))
}

fn apply_operators(found: &[&Value], ops: &Document) -> Result<bool> {
    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => equals_any(found, operand),
            "$ne" => !equals_any(found, operand),
            "$gt" => compare_any(found, operand, |o| o == Ordering::Greater),
            "$gte" => compare_any(found, operand, |o| o != Ordering::Less),
            "$lt" => compare_any(found, operand, |o| o == Ordering::Less),
            "$lte" => compare_any(found, operand, |o| o != Ordering::Greater),
            "$in" => in_list(found, operand, op)?,
            "$nin" => !in_list(found, operand, op)?,
            "$exists" => found.is_empty() != is_truthy(operand),
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| anyhow!("$regex expects a string pattern"))?;
                let options = match ops.get("$options") {
                    Some(Value::String(s)) => s.as_str(),
                    Some(_) => bail!("$options must be a string"),
                    None => "",
                };
                let re = build_regex(pattern, options)?;
                expand(found)
                    .iter()
                    .any(|v| v.as_str().is_some_and(|s| re.is_match(s)))
            }
            "$options" => {
                if !ops.contains_key("$regex") {
                    bail!("$options requires $regex");
                }
                true
            }
            "$not" => match operand {
                Value::Object(inner) if is_operator_object(operand) => {
                    !apply_operators(found, inner)?
                }
                _ => bail!("$not expects an operator expression"),
            },
            "$size" => {
                let n = operand
                    .as_u64()
                    .ok_or_else(|| anyhow!("$size expects a non-negative integer"))?;
                found
                    .iter()
                    .any(|v| v.as_array().is_some_and(|a| a.len() as u64 == n))
            }
            "$all" => {
                let wanted = operand
                    .as_array()
                    .ok_or_else(|| anyhow!("$all expects an array"))?;
                found.iter().any(|v| match v {
                    Value::Array(items) => wanted
                        .iter()
                        .all(|w| items.iter().any(|i| values_equal(i, w))),
                    _ => false,
                })
            }
            "$elemMatch" => {
                let criteria = operand
                    .as_object()
                    .ok_or_else(|| anyhow!("$elemMatch expects a document"))?;
                let mut any = false;
                for value in found {
                    if let Value::Array(items) = value {
                        for item in items {
                            let hit = if is_operator_object(operand) {
                                apply_operators(&[item], criteria)?
                            } else if let Value::Object(sub) = item {
                                matches(sub, criteria)?
                            } else {
                                false
                            };
                            if hit {
                                any = true;
                                break;
                            }
                        }
                    }
                    if any {
                        break;
                    }
                }
                any
            }
            other => bail!("unsupported query operator '{}'", other),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn check(d: &Value, f: Value) -> bool {
        matches(&doc(d.clone()), &doc(f)).unwrap()
    }

    fn smith() -> Value {
        json!({
            "name": "John Smith",
            "specialty": "ENT",
            "years_experience": 25,
            "tags": ["surgeon", "lead"],
            "address": {"city": "Leeds"},
            "visits": [{"room": 3, "ok": true}, {"room": 7, "ok": false}]
        })
    }

    #[test]
    fn test_equality_and_missing() {
        let d = smith();
        assert!(check(&d, json!({"specialty": "ENT"})));
        assert!(!check(&d, json!({"specialty": "Cardio"})));
        assert!(check(&d, json!({"tags": "lead"})));
        assert!(check(&d, json!({"address.city": "Leeds"})));
        assert!(check(&d, json!({"retired": null})));
        assert!(check(&d, json!({})));
    }

    #[test]
    fn test_comparisons() {
        let d = smith();
        assert!(check(&d, json!({"years_experience": {"$gt": 20}})));
        assert!(check(&d, json!({"years_experience": {"$gte": 25, "$lt": 26}})));
        assert!(!check(&d, json!({"years_experience": {"$lte": 24}})));
        // No cross-type comparison.
        assert!(!check(&d, json!({"years_experience": {"$gt": "1"}})));
        assert!(check(&d, json!({"visits.room": {"$gt": 5}})));
    }

    #[test]
    fn test_membership_and_existence() {
        let d = smith();
        assert!(check(&d, json!({"specialty": {"$in": ["ENT", "GP"]}})));
        assert!(check(&d, json!({"specialty": {"$nin": ["GP"]}})));
        assert!(check(&d, json!({"address": {"$exists": true}})));
        assert!(check(&d, json!({"retired": {"$exists": false}})));
        assert!(check(&d, json!({"specialty": {"$ne": "GP"}})));
        assert!(check(&d, json!({"tags": {"$size": 2}})));
        assert!(check(&d, json!({"tags": {"$all": ["lead", "surgeon"]}})));
    }

    #[test]
    fn test_regex() {
        let d = smith();
        assert!(check(&d, json!({"name": {"$regex": "Smith$"}})));
        assert!(!check(&d, json!({"name": {"$regex": "^smith"}})));
        assert!(check(&d, json!({"name": {"$regex": "SMITH", "$options": "i"}})));
        assert!(check(&d, json!({"name": {"$not": {"$regex": "^Jane"}}})));
    }

    #[test]
    fn test_logical_operators() {
        let d = smith();
        assert!(check(
            &d,
            json!({"$or": [{"specialty": "GP"}, {"years_experience": {"$gt": 20}}]})
        ));
        assert!(!check(
            &d,
            json!({"$and": [{"specialty": "ENT"}, {"years_experience": {"$lt": 20}}]})
        ));
        assert!(check(&d, json!({"$nor": [{"specialty": "GP"}]})));
    }

    #[test]
    fn test_elem_match() {
        let d = smith();
        assert!(check(&d, json!({"visits": {"$elemMatch": {"room": 7, "ok": false}}})));
        assert!(!check(&d, json!({"visits": {"$elemMatch": {"room": 7, "ok": true}}})));
    }

    #[test]
    fn test_errors() {
        let d = doc(smith());
        assert!(matches(&d, &doc(json!({"$where": "1"}))).is_err());
        assert!(matches(&d, &doc(json!({"a": {"$near": 1}}))).is_err());
        assert!(matches(&d, &doc(json!({"name": {"$regex": "("}}))).is_err());
        assert!(matches(&d, &doc(json!({"$or": {}}))).is_err());
    }
}
