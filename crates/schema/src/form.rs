//! Form path codec
//!
//! Multipart and urlencoded forms arrive as a flat, ordered list of
//! `(name, value)` string pairs. Field names use dot/bracket-index path
//! notation (`a.b[2].c`) to describe a position inside a nested
//! object/array shape. This module assembles that tree, then validates it
//! against the coercion-aware form of the target schema, so `"25"` lands in
//! a number field as `25`.
//!
//! Decoding rules:
//! - array indices need not be contiguous; present indices compact into the
//!   array in ascending numeric order
//! - repeated occurrences of the same non-indexed name collect into an
//!   ordered sequence in submission order (used for scalar-array fields)
//! - an empty string degrades to "absent" for optional fields and to `null`
//!   for nullable fields during validation
//!
//! [`flatten`] is the inverse encoding and feeds the multipart body
//! builder; for schemas without default-driven fields,
//! `decode(flatten(v)) == v`.

use crate::coerce::coercing;
use crate::error::{FieldPath, ValidationFailure, ValidationIssue};
use crate::node::Schema;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Decodes an ordered field list into a validated value of `schema`.
pub fn decode(fields: &[(String, String)], schema: &Schema) -> Result<Value, ValidationFailure> {
    let mut root = FormNode::Map(Vec::new());
    let mut issues = Vec::new();

    for (name, value) in fields {
        match parse_name(name) {
            Ok(segments) => root.insert(&segments, value, &mut issues),
            Err(message) => {
                let mut path = FieldPath::root();
                path.push_key(name.clone());
                issues.push(ValidationIssue::new(path, message));
            }
        }
    }

    if !issues.is_empty() {
        return Err(ValidationFailure::new(issues));
    }

    let assembled = root.into_value(Some(schema));
    coercing(schema).parse(&assembled)
}

/// Flattens a nested value into dot/bracket-indexed `(name, value)` pairs,
/// the encoding [`decode`] consumes. Scalars render with their plain string
/// form; `null` renders as the empty string.
pub fn flatten(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, prefix: String, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let name = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                flatten_into(child, name, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, format!("{prefix}[{index}]"), out);
            }
        }
        Value::String(s) => out.push((prefix, s.clone())),
        Value::Number(n) => out.push((prefix, n.to_string())),
        Value::Bool(b) => out.push((prefix, b.to_string())),
        Value::Null => out.push((prefix, String::new())),
    }
}

/// One parsed path segment: `key` or `key[index]`.
struct Segment {
    key: String,
    index: Option<usize>,
}

fn parse_name(name: &str) -> Result<Vec<Segment>, String> {
    if name.is_empty() {
        return Err("empty field name".to_string());
    }
    name.split('.')
        .map(|raw| {
            if raw.is_empty() {
                return Err("empty path segment".to_string());
            }
            match raw.split_once('[') {
                None => Ok(Segment { key: raw.to_string(), index: None }),
                Some((key, rest)) => {
                    let digits = rest
                        .strip_suffix(']')
                        .ok_or_else(|| format!("unterminated index in segment '{raw}'"))?;
                    if key.is_empty() {
                        return Err(format!("missing key before index in segment '{raw}'"));
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| format!("invalid array index '{digits}'"))?;
                    Ok(Segment { key: key.to_string(), index: Some(index) })
                }
            }
        })
        .collect()
}

/// Intermediate tree built from the field list before validation.
///
/// `Sparse` holds array positions keyed by their declared index so that
/// gaps compact away when the tree is converted; `Leaf` keeps every value
/// submitted under one name, in submission order.
enum FormNode {
    Map(Vec<(String, FormNode)>),
    Sparse(BTreeMap<usize, FormNode>),
    Leaf(Vec<String>),
}

impl FormNode {
    fn insert(&mut self, segments: &[Segment], value: &str, issues: &mut Vec<ValidationIssue>) {
        let mut node = self;
        let mut path = FieldPath::root();

        for (pos, segment) in segments.iter().enumerate() {
            let last = pos == segments.len() - 1;
            path.push_key(&segment.key);

            let FormNode::Map(entries) = node else {
                issues.push(ValidationIssue::new(path, "conflicting field paths"));
                return;
            };
            if !entries.iter().any(|(key, _)| key == &segment.key) {
                let fresh = match (segment.index, last) {
                    (Some(_), _) => FormNode::Sparse(BTreeMap::new()),
                    (None, true) => FormNode::Leaf(Vec::new()),
                    (None, false) => FormNode::Map(Vec::new()),
                };
                entries.push((segment.key.clone(), fresh));
            }
            let entry = entries
                .iter_mut()
                .find(|(key, _)| key == &segment.key)
                .map(|(_, child)| child)
                .unwrap_or_else(|| unreachable!("entry inserted above"));

            node = match segment.index {
                Some(index) => {
                    path.push_index(index);
                    let FormNode::Sparse(positions) = entry else {
                        issues.push(ValidationIssue::new(path, "conflicting field paths"));
                        return;
                    };
                    positions.entry(index).or_insert_with(|| {
                        if last { FormNode::Leaf(Vec::new()) } else { FormNode::Map(Vec::new()) }
                    })
                }
                None => entry,
            };

            if last {
                let FormNode::Leaf(values) = node else {
                    issues.push(ValidationIssue::new(path, "conflicting field paths"));
                    return;
                };
                values.push(value.to_string());
                return;
            }
        }
    }

    /// Converts the assembled tree into a JSON value, consulting the target
    /// schema to decide whether a repeated/single leaf is a scalar or an
    /// array element list.
    fn into_value(self, schema: Option<&Schema>) -> Value {
        match self {
            FormNode::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, child) in entries {
                    let child_schema = schema.and_then(|s| s.object_field(&key));
                    map.insert(key, child.into_value(child_schema));
                }
                Value::Object(map)
            }
            FormNode::Sparse(positions) => {
                let element = schema.and_then(|s| match s.unwrapped() {
                    Schema::Array(element) => Some(element.as_ref()),
                    _ => None,
                });
                // BTreeMap iteration yields ascending indices; gaps compact
                Value::Array(positions.into_values().map(|child| child.into_value(element)).collect())
            }
            FormNode::Leaf(values) => {
                let is_array_target =
                    schema.is_some_and(|s| matches!(s.unwrapped(), Schema::Array(_)));
                if is_array_target {
                    Value::Array(values.into_iter().map(Value::String).collect())
                } else if values.len() == 1 {
                    Value::String(values.into_iter().next().unwrap_or_default())
                } else {
                    // repeated name on a scalar target: last submission wins
                    values.into_iter().next_back().map(Value::String).unwrap_or(Value::Null)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Schema;
    use serde_json::json;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect()
    }

    #[test]
    fn decodes_nested_object_paths() {
        let schema = Schema::object([
            ("user", Schema::object([("name", Schema::string()), ("age", Schema::integer())])),
        ]);
        let out = decode(&fields(&[("user.name", "Ada"), ("user.age", "36")]), &schema).unwrap();
        assert_eq!(out, json!({"user": {"name": "Ada", "age": 36}}));
    }

    #[test]
    fn sparse_indices_compact_in_ascending_order() {
        let schema = Schema::object([("items", Schema::array(Schema::string()))]);
        // submitted out of order, with gaps
        let out = decode(
            &fields(&[("items[4]", "c"), ("items[0]", "a"), ("items[2]", "b")]),
            &schema,
        )
        .unwrap();
        assert_eq!(out, json!({"items": ["a", "b", "c"]}));
    }

    #[test]
    fn indexed_objects_inside_arrays() {
        let schema = Schema::object([(
            "a",
            Schema::object([("b", Schema::array(Schema::object([("c", Schema::integer())])))]),
        )]);
        let out = decode(&fields(&[("a.b[2].c", "7"), ("a.b[0].c", "1")]), &schema).unwrap();
        assert_eq!(out, json!({"a": {"b": [{"c": 1}, {"c": 7}]}}));
    }

    #[test]
    fn repeated_names_collect_for_array_fields() {
        let schema = Schema::object([("tags", Schema::array(Schema::string()))]);
        let out = decode(&fields(&[("tags", "x"), ("tags", "y"), ("tags", "z")]), &schema).unwrap();
        assert_eq!(out, json!({"tags": ["x", "y", "z"]}));
    }

    #[test]
    fn single_occurrence_still_decodes_as_array_when_declared() {
        let schema = Schema::object([("tags", Schema::array(Schema::string()))]);
        let out = decode(&fields(&[("tags", "only")]), &schema).unwrap();
        assert_eq!(out, json!({"tags": ["only"]}));
    }

    #[test]
    fn repeated_scalar_name_takes_last_submission() {
        let schema = Schema::object([("name", Schema::string())]);
        let out = decode(&fields(&[("name", "first"), ("name", "second")]), &schema).unwrap();
        assert_eq!(out, json!({"name": "second"}));
    }

    #[test]
    fn empty_string_degrades_for_optional_and_nullable() {
        let schema = Schema::object([
            ("age", Schema::integer().optional()),
            ("score", Schema::number().nullable()),
        ]);
        let out = decode(&fields(&[("age", ""), ("score", "")]), &schema).unwrap();
        assert_eq!(out, json!({"score": null}));
    }

    #[test]
    fn leaf_coercion_matches_query_policy() {
        let schema = Schema::object([("active", Schema::boolean()), ("count", Schema::integer())]);
        let out = decode(&fields(&[("active", "true"), ("count", "3")]), &schema).unwrap();
        assert_eq!(out, json!({"active": true, "count": 3}));
    }

    #[test]
    fn validation_failure_is_path_indexed() {
        let schema = Schema::object([("user", Schema::object([("age", Schema::integer())]))]);
        let err = decode(&fields(&[("user.age", "not-a-number")]), &schema).unwrap_err();
        assert_eq!(err.issues[0].path.to_string(), "user.age");
    }

    #[test]
    fn malformed_index_is_rejected() {
        let schema = Schema::object([("a", Schema::array(Schema::string()))]);
        assert!(decode(&fields(&[("a[x]", "v")]), &schema).is_err());
        assert!(decode(&fields(&[("a[1", "v")]), &schema).is_err());
    }

    #[test]
    fn conflicting_paths_are_rejected() {
        let schema = Schema::object([("a", Schema::string())]);
        let err = decode(&fields(&[("a", "x"), ("a.b", "y")]), &schema).unwrap_err();
        assert!(err.issues[0].message.contains("conflicting"));
    }

    #[test]
    fn decode_is_left_inverse_of_flatten() {
        let schema = Schema::object([
            ("name", Schema::string()),
            ("age", Schema::integer()),
            ("active", Schema::boolean()),
            ("tags", Schema::array(Schema::string())),
            (
                "addresses",
                Schema::array(Schema::object([
                    ("street", Schema::string()),
                    ("zip", Schema::string()),
                ])),
            ),
        ]);
        let original = json!({
            "name": "Ada",
            "age": 36,
            "active": true,
            "tags": ["math", "engines"],
            "addresses": [
                {"street": "1 Infinite Loop", "zip": "95014"},
                {"street": "10 Downing St", "zip": "SW1A"},
            ],
        });
        let encoded = flatten(&original);
        assert_eq!(decode(&encoded, &schema).unwrap(), original);
    }
}
