//! Validation engine
//!
//! Walks a JSON value against a schema node, producing a validated output
//! value or a field-path-indexed issue list. The output is a rebuilt value:
//! undeclared object keys are stripped, defaults are applied, and leaves
//! whose `coerce` flag is set convert string input to the declared type
//! before constraint checks.
//!
//! The walker collects every issue it encounters in one pass rather than
//! stopping at the first, so a request validation error reports the whole
//! structural diff.

use crate::error::{FieldPath, ValidationFailure, ValidationIssue};
use crate::node::{IntegerSchema, NumberSchema, ObjectField, Schema, StringFormat, StringSchema};
use chrono::DateTime;
use serde_json::{Map, Number, Value};

impl Schema {
    /// Validates `value` against this schema.
    ///
    /// On success returns the rebuilt, typed value. On failure returns the
    /// full issue list collected during the walk.
    pub fn parse(&self, value: &Value) -> Result<Value, ValidationFailure> {
        let mut walker = Walker::default();
        let out = walker.node(self, value);
        match out {
            Some(value) if walker.issues.is_empty() => Ok(value),
            _ => Err(ValidationFailure::new(walker.issues)),
        }
    }

    /// True when this node's base leaf re-parses string input.
    fn coerces_strings(&self) -> bool {
        match self.unwrapped() {
            Schema::String(s) => s.coerce,
            Schema::Number(n) => n.coerce,
            Schema::Integer(i) => i.coerce,
            Schema::Boolean { coerce } | Schema::Date { coerce } => *coerce,
            _ => false,
        }
    }
}

#[derive(Default)]
struct Walker {
    path: FieldPath,
    issues: Vec<ValidationIssue>,
}

impl Walker {
    fn reject(&mut self, message: impl Into<String>) -> Option<Value> {
        self.issues.push(ValidationIssue::new(self.path.clone(), message));
        None
    }

    fn node(&mut self, schema: &Schema, value: &Value) -> Option<Value> {
        match schema {
            Schema::String(spec) => self.string(spec, value),
            Schema::Number(spec) => self.number(spec, value),
            Schema::Integer(spec) => self.integer(spec, value),
            Schema::Boolean { coerce } => self.boolean(*coerce, value),
            Schema::Date { coerce } => self.date(*coerce, value),
            Schema::Literal(expected) => {
                if value == expected {
                    Some(value.clone())
                } else {
                    self.reject(format!("expected literal {expected}"))
                }
            }
            Schema::Enum(variants) => match value.as_str() {
                Some(s) if variants.iter().any(|v| v == s) => Some(value.clone()),
                Some(s) => self.reject(format!("'{s}' is not one of {variants:?}")),
                None => self.reject("expected enum string"),
            },
            Schema::Union(variants) => self.union(variants, value),
            Schema::Object(fields) => self.object(fields, value),
            Schema::Array(element) => self.array(element, value),
            Schema::Optional(inner) => {
                // an optional field that arrives blank over a string-only
                // channel degrades to "absent"; the object walker skips it
                if value.is_null() || is_blank_for(inner, value) {
                    Some(Value::Null)
                } else {
                    self.node(inner, value)
                }
            }
            Schema::Nullable(inner) => {
                if value.is_null() || is_blank_for(inner, value) {
                    Some(Value::Null)
                } else {
                    self.node(inner, value)
                }
            }
            Schema::WithDefault { inner, default } => {
                if value.is_null() {
                    Some(default.clone())
                } else {
                    self.node(inner, value)
                }
            }
            Schema::Unknown => Some(value.clone()),
            Schema::Void => {
                if value.is_null() {
                    Some(Value::Null)
                } else {
                    self.reject("expected no value")
                }
            }
        }
    }

    fn string(&mut self, spec: &StringSchema, value: &Value) -> Option<Value> {
        let Some(s) = value.as_str() else {
            return self.reject("expected string");
        };
        if let Some(min) = spec.min_len
            && s.chars().count() < min
        {
            return self.reject(format!("shorter than {min} characters"));
        }
        if let Some(max) = spec.max_len
            && s.chars().count() > max
        {
            return self.reject(format!("longer than {max} characters"));
        }
        if let Some(format) = spec.format
            && !format_matches(format, s)
        {
            return self.reject(format!("does not match format {format:?}"));
        }
        Some(Value::String(s.to_owned()))
    }

    fn number(&mut self, spec: &NumberSchema, value: &Value) -> Option<Value> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if spec.coerce => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let Some(n) = parsed else {
            return self.reject("expected number");
        };
        if let Some(min) = spec.min
            && n < min
        {
            return self.reject(format!("less than minimum {min}"));
        }
        if let Some(max) = spec.max
            && n > max
        {
            return self.reject(format!("greater than maximum {max}"));
        }
        Number::from_f64(n).map(Value::Number).or_else(|| self.reject("number is not finite"))
    }

    fn integer(&mut self, spec: &IntegerSchema, value: &Value) -> Option<Value> {
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) if spec.coerce => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let Some(n) = parsed else {
            return self.reject("expected integer");
        };
        if let Some(min) = spec.min
            && n < min
        {
            return self.reject(format!("less than minimum {min}"));
        }
        if let Some(max) = spec.max
            && n > max
        {
            return self.reject(format!("greater than maximum {max}"));
        }
        Some(Value::Number(n.into()))
    }

    fn boolean(&mut self, coerce: bool, value: &Value) -> Option<Value> {
        match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) if coerce => match s.trim() {
                "true" | "1" | "on" => Some(Value::Bool(true)),
                "false" | "0" | "off" => Some(Value::Bool(false)),
                _ => self.reject("expected boolean"),
            },
            _ => self.reject("expected boolean"),
        }
    }

    fn date(&mut self, _coerce: bool, value: &Value) -> Option<Value> {
        // dates travel as strings either way; coercion only relaxes the
        // empty-string handling upstream
        let Some(s) = value.as_str() else {
            return self.reject("expected date-time string");
        };
        match DateTime::parse_from_rfc3339(s) {
            Ok(_) => Some(Value::String(s.to_owned())),
            Err(e) => self.reject(format!("invalid RFC 3339 date-time: {e}")),
        }
    }

    fn union(&mut self, variants: &[Schema], value: &Value) -> Option<Value> {
        for variant in variants {
            if let Ok(out) = variant.parse(value) {
                return Some(out);
            }
        }
        self.reject("no union variant matched")
    }

    fn object(&mut self, fields: &[ObjectField], value: &Value) -> Option<Value> {
        let Some(map) = value.as_object() else {
            return self.reject("expected object");
        };
        let mut out = Map::with_capacity(fields.len());
        for field in fields {
            self.path.push_key(&field.name);
            match (map.get(&field.name), &field.schema) {
                (None, Schema::Optional(_)) => {}
                (None, Schema::WithDefault { default, .. }) => {
                    out.insert(field.name.clone(), default.clone());
                }
                (None, _) => {
                    self.reject("required field is missing");
                }
                (Some(present), schema) => {
                    if let Some(validated) = self.node(schema, present) {
                        // optional fields that degraded to absent stay out
                        // of the rebuilt object
                        let skip = validated.is_null() && matches!(schema, Schema::Optional(_));
                        if !skip {
                            out.insert(field.name.clone(), validated);
                        }
                    }
                }
            }
            self.path.pop();
        }
        // undeclared keys are stripped rather than copied through
        Some(Value::Object(out))
    }

    fn array(&mut self, element: &Schema, value: &Value) -> Option<Value> {
        let Some(items) = value.as_array() else {
            return self.reject("expected array");
        };
        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            self.path.push_index(index);
            if let Some(validated) = self.node(element, item) {
                out.push(validated);
            }
            self.path.pop();
        }
        Some(Value::Array(out))
    }
}

/// Blank-string normalization: over string-only channels an empty field
/// means "not provided" for optional/nullable coercing leaves.
fn is_blank_for(inner: &Schema, value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
        && inner.is_coercible_leaf()
        && inner.coerces_strings()
}

fn format_matches(format: StringFormat, s: &str) -> bool {
    match format {
        StringFormat::Email => {
            let Some((local, domain)) = s.split_once('@') else {
                return false;
            };
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        StringFormat::Uuid => {
            let lens = [8, 4, 4, 4, 12];
            let groups: Vec<&str> = s.split('-').collect();
            groups.len() == 5
                && groups
                    .iter()
                    .zip(lens)
                    .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
        }
        StringFormat::DateTime => DateTime::parse_from_rfc3339(s).is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coercing;
    use serde_json::json;

    #[test]
    fn object_happy_path_strips_undeclared_keys() {
        let schema = Schema::object([("id", Schema::string()), ("name", Schema::string())]);
        let out = schema.parse(&json!({"id": "1", "name": "John Doe", "extra": true})).unwrap();
        assert_eq!(out, json!({"id": "1", "name": "John Doe"}));
    }

    #[test]
    fn missing_required_field_reports_path() {
        let schema = Schema::object([("user", Schema::object([("id", Schema::string())]))]);
        let err = schema.parse(&json!({"user": {}})).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].path.to_string(), "user.id");
    }

    #[test]
    fn collects_every_issue_in_one_pass() {
        let schema = Schema::object([("a", Schema::number()), ("b", Schema::boolean())]);
        let err = schema.parse(&json!({"a": "x", "b": "y"})).unwrap_err();
        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn number_does_not_coerce_without_flag() {
        assert!(Schema::number().parse(&json!("25")).is_err());
    }

    #[test]
    fn coerced_number_parses_string() {
        let schema = coercing(&Schema::number());
        assert_eq!(schema.parse(&json!("25")).unwrap(), json!(25.0));
    }

    #[test]
    fn coerced_number_keeps_range_constraints() {
        let schema = coercing(&NumberSchema::new().min(10.0).into_schema());
        assert!(schema.parse(&json!("5")).is_err());
        assert_eq!(schema.parse(&json!("12")).unwrap(), json!(12.0));
    }

    #[test]
    fn integer_rejects_fractional_input() {
        assert!(Schema::integer().parse(&json!(1.5)).is_err());
        assert_eq!(Schema::integer().parse(&json!(7)).unwrap(), json!(7));
    }

    #[test]
    fn coerced_boolean_accepts_form_spellings() {
        let schema = coercing(&Schema::boolean());
        assert_eq!(schema.parse(&json!("on")).unwrap(), json!(true));
        assert_eq!(schema.parse(&json!("0")).unwrap(), json!(false));
        assert!(schema.parse(&json!("maybe")).is_err());
    }

    #[test]
    fn default_applies_on_missing_and_null() {
        let schema = Schema::object([("limit", Schema::number().default_to(json!(20)))]);
        assert_eq!(schema.parse(&json!({})).unwrap(), json!({"limit": 20}));
        assert_eq!(schema.parse(&json!({"limit": null})).unwrap(), json!({"limit": 20}));
        assert_eq!(schema.parse(&json!({"limit": 5})).unwrap(), json!({"limit": 5.0}));
    }

    #[test]
    fn nullable_accepts_null_but_not_absence() {
        let schema = Schema::object([("note", Schema::string().nullable())]);
        assert_eq!(schema.parse(&json!({"note": null})).unwrap(), json!({"note": null}));
        assert!(schema.parse(&json!({})).is_err());
    }

    #[test]
    fn blank_string_degrades_for_coercing_optional() {
        let schema = coercing(&Schema::object([("age", Schema::number().optional())]));
        assert_eq!(schema.parse(&json!({"age": ""})).unwrap(), json!({}));
    }

    #[test]
    fn blank_string_becomes_null_for_coercing_nullable() {
        let schema = coercing(&Schema::object([("age", Schema::number().nullable())]));
        assert_eq!(schema.parse(&json!({"age": ""})).unwrap(), json!({"age": null}));
    }

    #[test]
    fn blank_string_stays_a_value_without_coercion() {
        let schema = Schema::object([("name", Schema::string().optional())]);
        assert_eq!(schema.parse(&json!({"name": ""})).unwrap(), json!({"name": ""}));
    }

    #[test]
    fn array_issues_carry_index_paths() {
        let schema = Schema::array(Schema::number());
        let err = schema.parse(&json!([1, "x", 3])).unwrap_err();
        assert_eq!(err.issues[0].path.to_string(), "[1]");
    }

    #[test]
    fn union_takes_first_matching_variant() {
        let schema = Schema::union([Schema::number(), Schema::string()]);
        assert_eq!(schema.parse(&json!("hi")).unwrap(), json!("hi"));
        assert_eq!(schema.parse(&json!(3)).unwrap(), json!(3.0));
        assert!(schema.parse(&json!(true)).is_err());
    }

    #[test]
    fn enum_and_literal() {
        let schema = Schema::enumeration(["red", "green"]);
        assert!(schema.parse(&json!("blue")).is_err());
        assert_eq!(schema.parse(&json!("red")).unwrap(), json!("red"));

        let lit = Schema::literal(json!(42));
        assert!(lit.parse(&json!(41)).is_err());
    }

    #[test]
    fn date_requires_rfc3339() {
        let schema = Schema::date();
        assert!(schema.parse(&json!("2026-08-26T10:00:00Z")).is_ok());
        assert!(schema.parse(&json!("yesterday")).is_err());
    }

    #[test]
    fn string_format_email() {
        let schema = StringSchema::new().format(StringFormat::Email).into_schema();
        assert!(schema.parse(&json!("john@example.com")).is_ok());
        assert!(schema.parse(&json!("not-an-email")).is_err());
    }

    #[test]
    fn void_accepts_only_null() {
        assert!(Schema::Void.parse(&Value::Null).is_ok());
        assert!(Schema::Void.parse(&json!({})).is_err());
    }
}
