//! Coercing-schema transformer
//!
//! Query strings and form fields carry only strings (or string lists), so a
//! schema declared with typed leaves cannot validate them directly. This
//! transformer rewrites a schema tree so that every primitive leaf accepts
//! string input and converts it to the declared type, while the structural
//! shape — objects, arrays, optional/nullable/default wrappers — is
//! preserved exactly.

use crate::node::{ObjectField, Schema};

/// Rebuilds `schema` with string coercion enabled on every primitive leaf.
///
/// Structural nodes recurse; modifier wrappers are unwrapped, transformed
/// and re-wrapped (default values preserved verbatim); every other node
/// kind passes through unchanged — coercion is leaf-primitive-only.
pub fn coercing(schema: &Schema) -> Schema {
    match schema {
        Schema::Object(fields) => Schema::Object(
            fields
                .iter()
                .map(|field| ObjectField { name: field.name.clone(), schema: coercing(&field.schema) })
                .collect(),
        ),
        Schema::Array(element) => Schema::Array(Box::new(coercing(element))),
        Schema::Optional(inner) => Schema::Optional(Box::new(coercing(inner))),
        Schema::Nullable(inner) => Schema::Nullable(Box::new(coercing(inner))),
        Schema::WithDefault { inner, default } => {
            Schema::WithDefault { inner: Box::new(coercing(inner)), default: default.clone() }
        }
        Schema::String(spec) => {
            let mut spec = spec.clone();
            spec.coerce = true;
            Schema::String(spec)
        }
        Schema::Number(spec) => {
            let mut spec = spec.clone();
            spec.coerce = true;
            Schema::Number(spec)
        }
        Schema::Integer(spec) => {
            let mut spec = spec.clone();
            spec.coerce = true;
            Schema::Integer(spec)
        }
        Schema::Boolean { .. } => Schema::Boolean { coerce: true },
        Schema::Date { .. } => Schema::Date { coerce: true },
        // enum, literal, union and the pass-through kinds keep their exact
        // semantics; their input is already a string or a structural match
        other @ (Schema::Literal(_) | Schema::Enum(_) | Schema::Union(_) | Schema::Unknown | Schema::Void) => {
            other.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NumberSchema, StringFormat, StringSchema};
    use serde_json::json;

    #[test]
    fn leaves_gain_coercion_and_keep_constraints() {
        let schema = NumberSchema::new().min(0.0).max(100.0).into_schema();
        match coercing(&schema) {
            Schema::Number(spec) => {
                assert!(spec.coerce);
                assert_eq!(spec.min, Some(0.0));
                assert_eq!(spec.max, Some(100.0));
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn object_structure_is_preserved() {
        let schema = Schema::object([
            ("age", Schema::integer()),
            ("tags", Schema::array(Schema::string())),
            ("bio", Schema::string().optional()),
        ]);
        let coerced = coercing(&schema);
        let Schema::Object(fields) = &coerced else {
            panic!("expected object");
        };
        assert_eq!(fields.len(), 3);
        assert!(matches!(&fields[2].schema, Schema::Optional(_)));
    }

    #[test]
    fn default_value_is_preserved_verbatim() {
        let schema = Schema::number().default_to(json!(42));
        match coercing(&schema) {
            Schema::WithDefault { inner, default } => {
                assert_eq!(default, json!(42));
                assert!(matches!(*inner, Schema::Number(ref spec) if spec.coerce));
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn string_format_survives_coercion() {
        let schema = StringSchema::new().format(StringFormat::Uuid).into_schema();
        match coercing(&schema) {
            Schema::String(spec) => assert_eq!(spec.format, Some(StringFormat::Uuid)),
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn unsupported_kinds_pass_through_unchanged() {
        let schema = Schema::enumeration(["a", "b"]);
        assert_eq!(coercing(&schema), schema);
        let schema = Schema::literal(json!(1));
        assert_eq!(coercing(&schema), schema);
    }

    #[test]
    fn transform_only_changes_leaf_acceptance() {
        let schema = Schema::object([("n", Schema::number())]);
        let coerced = coercing(&schema);
        // plain input validates identically under both
        assert_eq!(
            schema.parse(&json!({"n": 3})).unwrap(),
            coerced.parse(&json!({"n": 3})).unwrap()
        );
        // string input only validates under the coerced tree
        assert!(schema.parse(&json!({"n": "3"})).is_err());
        assert_eq!(coerced.parse(&json!({"n": "3"})).unwrap(), json!({"n": 3.0}));
    }
}
