//! Aggregation pipelines.

use std::cmp::Ordering;

use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use serde_json::{Number, Value};

use super::filter::matches;
use super::value::{
    add_numbers, compare, field_value, is_truthy, remove_path, set_path, values_equal,
};
use crate::models::Document;

/// Run `stages` in order over `docs`.
pub fn run_pipeline(mut docs: Vec<Document>, stages: &[Document]) -> Result<Vec<Document>> {
    for (i, stage) in stages.iter().enumerate() {
        let mut entries = stage.iter();
        let (name, spec) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => bail!(
                "pipeline stage {} must have exactly one operator, found {}",
                i + 1,
                stage.len()
            ),
        };
        docs = match name.as_str() {
            "$match" => match_stage(docs, spec)?,
            "$project" => project_stage(docs, spec)?,
            "$sort" => sort_stage(docs, spec)?,
            "$limit" => {
                let n = count_arg(name, spec)?;
                docs.truncate(n);
                docs
            }
            "$skip" => {
                let n = count_arg(name, spec)?;
                docs.into_iter().skip(n).collect()
            }
            "$count" => count_stage(docs, spec)?,
            "$unwind" => unwind_stage(docs, spec)?,
            "$group" => group_stage(docs, spec)?,
            "$addFields" | "$set" => add_fields_stage(docs, spec)?,
            other => bail!("unsupported aggregation stage '{}'", other),
        };
    }
    Ok(docs)
}

fn count_arg(stage: &str, spec: &Value) -> Result<usize> {
    spec.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| anyhow!("{} expects a non-negative integer", stage))
}

fn spec_object<'a>(stage: &str, spec: &'a Value) -> Result<&'a Document> {
    spec.as_object()
        .ok_or_else(|| anyhow!("{} expects a document", stage))
}

fn match_stage(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let filter = spec_object("$match", spec)?;
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        if matches(&doc, filter)? {
            out.push(doc);
        }
    }
    Ok(out)
}

/// Evaluate an expression: `"$path"` reads a field, documents and arrays
/// evaluate element-wise, anything else is a literal. `None` means the
/// referenced field is missing. `{"$literal": v}` yields `v` unevaluated;
/// any other `$`-prefixed key is an expression operator and is rejected.
pub fn eval_expr(doc: &Document, expr: &Value) -> Result<Option<Value>> {
    match expr {
        Value::String(s) if s.starts_with('$') && s.len() > 1 => Ok(field_value(doc, &s[1..])),
        Value::Object(map) => {
            if let Some(literal) = map.get("$literal").filter(|_| map.len() == 1) {
                return Ok(Some(literal.clone()));
            }
            if let Some(op) = map.keys().find(|k| k.starts_with('$')) {
                bail!("unsupported expression operator '{}'", op);
            }
            let mut out = Document::new();
            for (k, v) in map {
                out.insert(k.clone(), eval_expr(doc, v)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Object(out)))
        }
        Value::Array(items) => {
            let values = items
                .iter()
                .map(|v| Ok(eval_expr(doc, v)?.unwrap_or(Value::Null)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(Value::Array(values)))
        }
        other => Ok(Some(other.clone())),
    }
}

/// A projection value that only says "keep" or "drop".
fn inclusion_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(_) => Some(is_truthy(value)),
        _ => None,
    }
}

fn project_stage(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let spec = spec_object("$project", spec)?;
    if spec.is_empty() {
        bail!("$project requires at least one field");
    }

    let include_id = spec
        .get("_id")
        .and_then(inclusion_flag)
        .unwrap_or(true);
    let fields: Vec<(&String, &Value)> = spec.iter().filter(|(k, _)| k.as_str() != "_id").collect();
    let exclusion = !fields.is_empty()
        && fields
            .iter()
            .all(|(_, v)| inclusion_flag(v) == Some(false));

    if exclusion || (fields.is_empty() && !include_id) {
        return Ok(docs
            .into_iter()
            .map(|mut doc| {
                for (path, _) in &fields {
                    remove_path(&mut doc, path);
                }
                if !include_id {
                    doc.shift_remove("_id");
                }
                doc
            })
            .collect());
    }

    if fields.iter().any(|(_, v)| inclusion_flag(v) == Some(false)) {
        bail!("$project cannot mix inclusion and exclusion of fields other than _id");
    }

    docs.into_iter()
        .map(|doc| {
            let mut out = Document::new();
            if include_id {
                if let Some(id) = doc.get("_id") {
                    out.insert("_id".to_string(), id.clone());
                }
            }
            if let Some(id_expr) = spec.get("_id").filter(|v| inclusion_flag(v).is_none()) {
                if let Some(value) = eval_expr(&doc, id_expr)? {
                    out.insert("_id".to_string(), value);
                }
            }
            for (path, value) in &fields {
                let projected = match inclusion_flag(value) {
                    Some(_) => field_value(&doc, path),
                    None => eval_expr(&doc, value)?,
                };
                if let Some(v) = projected {
                    set_path(&mut out, path, v)?;
                }
            }
            Ok(out)
        })
        .collect()
}

fn sort_stage(mut docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let spec = spec_object("$sort", spec)?;
    let mut keys = Vec::with_capacity(spec.len());
    for (path, dir) in spec {
        let descending = match dir.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => bail!("$sort direction for '{}' must be 1 or -1", path),
        };
        keys.push((path.as_str(), descending));
    }

    docs.sort_by(|a, b| {
        for (path, descending) in &keys {
            let left = field_value(a, path).unwrap_or(Value::Null);
            let right = field_value(b, path).unwrap_or(Value::Null);
            let mut ord = compare(&left, &right);
            if *descending {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(docs)
}

fn count_stage(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let name = spec
        .as_str()
        .filter(|s| !s.is_empty() && !s.starts_with('$') && !s.contains('.'))
        .ok_or_else(|| anyhow!("$count expects a plain field name"))?;
    if docs.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Document::new();
    out.insert(name.to_string(), Value::Number((docs.len() as u64).into()));
    Ok(vec![out])
}

fn unwind_stage(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let (path_expr, preserve) = match spec {
        Value::String(s) => (s.as_str(), false),
        Value::Object(map) => {
            let path = map
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("$unwind requires a 'path'"))?;
            let preserve = map
                .get("preserveNullAndEmptyArrays")
                .is_some_and(is_truthy);
            (path, preserve)
        }
        _ => bail!("$unwind expects a field path or a document"),
    };
    let path = path_expr
        .strip_prefix('$')
        .ok_or_else(|| anyhow!("$unwind path must start with '$'"))?;

    let mut out = Vec::new();
    for doc in docs {
        match field_value(&doc, path) {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    set_path(&mut copy, path, item)?;
                    out.push(copy);
                }
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                if preserve {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    Ok(out)
}

enum Accumulator {
    Sum(Option<Value>),
    Avg { total: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
    Last(Option<Value>),
    Push(Vec<Value>),
    AddToSet(Vec<Value>),
}

impl Accumulator {
    fn new(op: &str) -> Result<Self> {
        Ok(match op {
            "$sum" => Accumulator::Sum(None),
            "$avg" => Accumulator::Avg { total: 0.0, count: 0 },
            "$min" => Accumulator::Min(None),
            "$max" => Accumulator::Max(None),
            "$first" => Accumulator::First(None),
            "$last" => Accumulator::Last(None),
            "$push" => Accumulator::Push(Vec::new()),
            "$addToSet" => Accumulator::AddToSet(Vec::new()),
            other => bail!("unsupported $group accumulator '{}'", other),
        })
    }

    fn feed(&mut self, value: Option<Value>, first_seen: bool) {
        match self {
            Accumulator::Sum(total) => {
                if let Some(Value::Number(n)) = value {
                    *total = Some(match total.take() {
                        Some(Value::Number(t)) => add_numbers(&t, &n),
                        _ => Value::Number(n),
                    });
                }
            }
            Accumulator::Avg { total, count } => {
                if let Some(f) = value.as_ref().and_then(Value::as_f64) {
                    *total += f;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => keep_extreme(current, value, Ordering::Less),
            Accumulator::Max(current) => keep_extreme(current, value, Ordering::Greater),
            Accumulator::First(slot) => {
                if first_seen {
                    *slot = Some(value.unwrap_or(Value::Null));
                }
            }
            Accumulator::Last(slot) => *slot = Some(value.unwrap_or(Value::Null)),
            Accumulator::Push(items) => items.extend(value),
            Accumulator::AddToSet(items) => {
                if let Some(v) = value {
                    if !items.iter().any(|i| values_equal(i, &v)) {
                        items.push(v);
                    }
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Sum(total) => total.unwrap_or_else(|| Value::Number(0.into())),
            Accumulator::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Number::from_f64(total / count as f64).map_or(Value::Null, Value::Number)
                }
            }
            Accumulator::Min(v)
            | Accumulator::Max(v)
            | Accumulator::First(v)
            | Accumulator::Last(v) => v.unwrap_or(Value::Null),
            Accumulator::Push(items) | Accumulator::AddToSet(items) => Value::Array(items),
        }
    }
}

/// `$min`/`$max`: nulls and missing values are ignored.
fn keep_extreme(current: &mut Option<Value>, value: Option<Value>, want: Ordering) {
    let Some(v) = value.filter(|v| !v.is_null()) else {
        return;
    };
    let replace = match current {
        Some(c) => compare(&v, c) == want,
        None => true,
    };
    if replace {
        *current = Some(v);
    }
}

fn group_stage(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let spec = spec_object("$group", spec)?;
    let id_expr = spec
        .get("_id")
        .ok_or_else(|| anyhow!("$group requires an _id expression"))?;

    let mut outputs: Vec<(&String, &str, &Value)> = Vec::new();
    for (field, acc) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
        let acc = acc
            .as_object()
            .filter(|m| m.len() == 1)
            .ok_or_else(|| anyhow!("$group field '{}' must be {{ <accumulator>: <expr> }}", field))?;
        let (op, expr) = acc.iter().next().ok_or_else(|| anyhow!("empty accumulator"))?;
        Accumulator::new(op)?;
        outputs.push((field, op.as_str(), expr));
    }

    // Keyed by the serialized group key; insertion order = first-seen order.
    let mut groups: IndexMap<String, (Value, Vec<Accumulator>)> = IndexMap::new();
    for doc in &docs {
        let key = eval_expr(doc, id_expr)?.unwrap_or(Value::Null);
        let key_text = serde_json::to_string(&key)?;
        let first_seen = !groups.contains_key(&key_text);
        if first_seen {
            let accs = outputs
                .iter()
                .map(|(_, op, _)| Accumulator::new(op))
                .collect::<Result<Vec<_>>>()?;
            groups.insert(key_text.clone(), (key, accs));
        }
        if let Some((_, accs)) = groups.get_mut(&key_text) {
            for (acc, (_, _, expr)) in accs.iter_mut().zip(&outputs) {
                acc.feed(eval_expr(doc, expr)?, first_seen);
            }
        }
    }

    Ok(groups
        .into_values()
        .map(|(key, accs)| {
            let mut out = Document::new();
            out.insert("_id".to_string(), key);
            for (acc, (field, _, _)) in accs.into_iter().zip(&outputs) {
                out.insert((*field).clone(), acc.finish());
            }
            out
        })
        .collect())
}

fn add_fields_stage(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let spec = spec_object("$addFields", spec)?;
    docs.into_iter()
        .map(|mut doc| {
            for (path, expr) in spec {
                match eval_expr(&doc, expr)? {
                    Some(value) => set_path(&mut doc, path, value)?,
                    None => {
                        remove_path(&mut doc, path);
                    }
                }
            }
            Ok(doc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs(value: Value) -> Vec<Document> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn run(input: Value, stages: Value) -> Vec<Value> {
        run_pipeline(docs(input), &docs(stages))
            .unwrap()
            .into_iter()
            .map(Value::Object)
            .collect()
    }

    fn doctors() -> Value {
        json!([
            {"_id": "a", "name": "Ann", "specialty": "ENT", "years": 12},
            {"_id": "b", "name": "Bob", "specialty": "GP", "years": 30},
            {"_id": "c", "name": "Cho", "specialty": "ENT", "years": 5}
        ])
    }

    #[test]
    fn test_match_and_project() {
        let out = run(
            doctors(),
            json!([{"$match": {"specialty": "ENT"}}, {"$project": {"name": 1, "_id": 0}}]),
        );
        assert_eq!(out, vec![json!({"name": "Ann"}), json!({"name": "Cho"})]);
    }

    #[test]
    fn test_project_keeps_id_by_default_and_renames() {
        let out = run(
            doctors(),
            json!([{"$limit": 1}, {"$project": {"who": "$name"}}]),
        );
        assert_eq!(out, vec![json!({"_id": "a", "who": "Ann"})]);
    }

    #[test]
    fn test_project_exclusion() {
        let out = run(doctors(), json!([{"$skip": 2}, {"$project": {"years": 0, "_id": 0}}]));
        assert_eq!(out, vec![json!({"name": "Cho", "specialty": "ENT"})]);
    }

    #[test]
    fn test_project_mixing_rejected() {
        let err = run_pipeline(
            docs(doctors()),
            &docs(json!([{"$project": {"name": 1, "years": 0}}])),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_sort_limit_skip() {
        let out = run(
            doctors(),
            json!([{"$sort": {"years": -1}}, {"$skip": 1}, {"$limit": 1}, {"$project": {"_id": 1}}]),
        );
        assert_eq!(out, vec![json!({"_id": "a"})]);
    }

    #[test]
    fn test_group_accumulators() {
        let out = run(
            doctors(),
            json!([{"$group": {
                "_id": "$specialty",
                "count": {"$sum": 1},
                "total": {"$sum": "$years"},
                "avg": {"$avg": "$years"},
                "min": {"$min": "$years"},
                "max": {"$max": "$years"},
                "first": {"$first": "$name"},
                "names": {"$push": "$name"}
            }}]),
        );
        assert_eq!(
            out,
            vec![
                json!({"_id": "ENT", "count": 2, "total": 17, "avg": 8.5, "min": 5, "max": 12, "first": "Ann", "names": ["Ann", "Cho"]}),
                json!({"_id": "GP", "count": 1, "total": 30, "avg": 30.0, "min": 30, "max": 30, "first": "Bob", "names": ["Bob"]}),
            ]
        );
    }

    #[test]
    fn test_count_and_unwind() {
        let input = json!([
            {"n": 1, "tags": ["x", "y"]},
            {"n": 2, "tags": []},
            {"n": 3}
        ]);
        let out = run(input.clone(), json!([{"$unwind": "$tags"}, {"$count": "total"}]));
        assert_eq!(out, vec![json!({"total": 2})]);

        let out = run(
            input,
            json!([{"$unwind": {"path": "$tags", "preserveNullAndEmptyArrays": true}}, {"$project": {"n": 1}}]),
        );
        assert_eq!(out, vec![json!({"n": 1}), json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
    }

    #[test]
    fn test_add_fields() {
        let out = run(
            json!([{"a": 1}]),
            json!([{"$addFields": {"b": "$a", "c.d": "lit"}}]),
        );
        assert_eq!(out, vec![json!({"a": 1, "b": 1, "c": {"d": "lit"}})]);
    }

    #[test]
    fn test_invalid_stages() {
        let bad = [
            json!([{"$lookup": {}}]),
            json!([{"$match": {}, "$limit": 1}]),
            json!([{"$limit": -1}]),
            json!([{"$sort": {"a": 2}}]),
            json!([{"$group": {"n": {"$sum": 1}}}]),
        ];
        for stages in bad {
            assert!(run_pipeline(docs(doctors()), &docs(stages.clone())).is_err(), "{}", stages);
        }
    }

    #[test]
    fn test_expression_operators_rejected() {
        let people = json!([{"first": "Ann", "last": "Lee", "price": 2, "qty": 3}]);
        let bad = [
            json!([{"$project": {"full": {"$concat": ["$first", " ", "$last"]}, "_id": 0}}]),
            json!([{"$group": {"_id": null, "revenue": {"$sum": {"$multiply": ["$price", "$qty"]}}}}]),
            json!([{"$addFields": {"total": {"$add": ["$price", 1]}}}]),
            json!([{"$group": {"_id": {"$toUpper": "$last"}, "n": {"$sum": 1}}}]),
        ];
        for stages in bad {
            let err = run_pipeline(docs(people.clone()), &docs(stages.clone())).unwrap_err();
            assert!(
                err.to_string().starts_with("unsupported expression operator '$"),
                "{}: {}",
                stages,
                err
            );
        }
    }

    #[test]
    fn test_literal_and_nested_documents_still_evaluate() {
        let out = run(
            json!([{"_id": 1, "first": "Ann", "qty": 3}]),
            json!([{"$project": {
                "_id": 0,
                "raw": {"$literal": "$qty"},
                "who": {"name": "$first", "n": "$qty"}
            }}]),
        );
        assert_eq!(out, vec![json!({"raw": "$qty", "who": {"name": "Ann", "n": 3}})]);
    }
}
