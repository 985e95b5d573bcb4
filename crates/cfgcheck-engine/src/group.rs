//! Configuration groups: flattened field maps extracted from device logs.
//!
//! A group is one configuration snapshot. Fields are addressed by
//! dot-joined names (`opSch.debugLevel`); repeated sections carry an
//! occurrence index (`buffers.0.size`, `buffers.1.size`). All values are
//! stored as strings and compared string-wise unless a check explicitly
//! coerces them to numbers.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{EngineError, Result};

/// One configuration group in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Zero-based position in the extracted sequence.
    pub index: usize,
    fields: BTreeMap<String, String>,
}

impl Group {
    pub fn new(index: usize, fields: BTreeMap<String, String>) -> Self {
        Group { index, fields }
    }

    /// Look up a flattened field. Absent fields are `None`, never `""`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|s| s.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parse a JSON array of group objects into a group sequence.
///
/// Each array element is one group. Nested objects flatten with
/// dot-joined prefixes, arrays of objects with occurrence indices, and
/// scalar values normalize to their string form (`1` → `"1"`,
/// `true` → `"true"`). `null` fields are treated as absent.
pub fn groups_from_json(input: &str) -> Result<Vec<Group>> {
    let value: Value = serde_json::from_str(input)?;
    let Value::Array(items) = value else {
        return Err(EngineError::InvalidGroups(
            "expected a JSON array of group objects".into(),
        ));
    };

    let mut groups = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(_) = item else {
            return Err(EngineError::InvalidGroups(format!(
                "group {index} is not a JSON object"
            )));
        };
        let mut fields = BTreeMap::new();
        flatten(item, "", &mut fields);
        groups.push(Group::new(index, fields));
    }
    Ok(groups)
}

fn flatten(value: &Value, prefix: &str, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(v, &key, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(v, &format!("{prefix}.{i}"), out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
    }
}
