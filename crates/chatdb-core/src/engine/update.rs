//! Update operators for `update_many`.

use anyhow::{anyhow, bail, Result};
use serde_json::Value;

use super::value::{add_numbers, field_value, mul_numbers, remove_path, set_path, values_equal};
use crate::models::Document;

const ID_FIELD: &str = "_id";

/// Check an update document before touching any data: non-empty, every
/// key a supported operator, every operand a document, `_id` untouched.
pub fn validate_update(update: &Document) -> Result<()> {
    if update.is_empty() {
        bail!("update document is empty");
    }
    for (op, fields) in update {
        if !op.starts_with('$') {
            bail!(
                "update must use operators such as $set; found plain field '{}'",
                op
            );
        }
        if !matches!(
            op.as_str(),
            "$set" | "$unset" | "$inc" | "$mul" | "$rename" | "$push"
        ) {
            bail!("unsupported update operator '{}'", op);
        }
        let fields = fields
            .as_object()
            .ok_or_else(|| anyhow!("{} expects a document of fields", op))?;
        for (path, operand) in fields {
            if path == ID_FIELD || path.starts_with("_id.") {
                bail!("the _id field cannot be modified");
            }
            if op == "$rename" {
                let target = operand
                    .as_str()
                    .ok_or_else(|| anyhow!("$rename target for '{}' must be a string", path))?;
                if target == ID_FIELD || target.is_empty() {
                    bail!("invalid $rename target '{}'", target);
                }
            }
        }
    }
    Ok(())
}

/// Apply `update` to `doc`. Returns whether the document changed.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool> {
    validate_update(update)?;
    let before = doc.clone();

    for (op, fields) in update {
        let fields = fields
            .as_object()
            .ok_or_else(|| anyhow!("{} expects a document of fields", op))?;
        for (path, operand) in fields {
            match op.as_str() {
                "$set" => set_path(doc, path, operand.clone())?,
                "$unset" => {
                    remove_path(doc, path);
                }
                "$inc" | "$mul" => {
                    let by = match operand {
                        Value::Number(n) => n,
                        _ => bail!("{} on '{}' requires a numeric operand", op, path),
                    };
                    let next = match field_value(doc, path) {
                        None | Some(Value::Null) if op == "$inc" => Value::Number(by.clone()),
                        None | Some(Value::Null) => Value::Number(0.into()),
                        Some(Value::Number(current)) if op == "$inc" => add_numbers(&current, by),
                        Some(Value::Number(current)) => mul_numbers(&current, by),
                        Some(other) => bail!(
                            "cannot apply {} to non-numeric field '{}' ({})",
                            op,
                            path,
                            other
                        ),
                    };
                    set_path(doc, path, next)?;
                }
                "$rename" => {
                    let target = operand.as_str().unwrap_or_default();
                    if let Some(value) = remove_path(doc, path) {
                        set_path(doc, target, value)?;
                    }
                }
                "$push" => {
                    let items = match operand {
                        Value::Object(m) if m.contains_key("$each") => m
                            .get("$each")
                            .and_then(Value::as_array)
                            .cloned()
                            .ok_or_else(|| anyhow!("$each expects an array"))?,
                        other => vec![other.clone()],
                    };
                    let next = match field_value(doc, path) {
                        None => Value::Array(items),
                        Some(Value::Array(mut current)) => {
                            current.extend(items);
                            Value::Array(current)
                        }
                        Some(_) => bail!("cannot $push to non-array field '{}'", path),
                    };
                    set_path(doc, path, next)?;
                }
                other => bail!("unsupported update operator '{}'", other),
            }
        }
    }

    Ok(!documents_equal(&before, doc))
}

fn documents_equal(a: &Document, b: &Document) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
}
