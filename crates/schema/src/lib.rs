//! Schema tree, validation and form decoding for the typact contract client
//!
//! This crate provides the data-shape half of the contract layer: a closed
//! tree of schema nodes, a validation engine that turns untyped JSON values
//! into validated (and, where requested, coerced) values, and a form codec
//! that maps flat `name=value` field lists onto nested object/array shapes.
//!
//! # Features
//!
//! - Closed enum of schema node kinds, so new leaf types are a
//!   compile-time-checked exhaustiveness gap rather than a runtime surprise
//! - Validation with field-path-indexed issue reporting
//! - String coercion for transport channels that only carry strings
//!   (query strings, form fields)
//! - Dot/bracket-index form decoding with sparse-array compaction
//!
//! # Example
//!
//! ```
//! use typact_schema::{Schema, coercing};
//! use serde_json::json;
//!
//! let schema = Schema::object([
//!     ("age", Schema::number()),
//!     ("active", Schema::boolean().optional()),
//! ]);
//!
//! // query strings carry only strings, so wrap the schema before validating
//! let value = coercing(&schema).parse(&json!({"age": "25"})).unwrap();
//! assert_eq!(value, json!({"age": 25.0}));
//! ```

mod coerce;
mod error;
mod node;
mod validate;

pub mod form;

pub use coerce::coercing;
pub use error::{FieldPath, PathSegment, ValidationFailure, ValidationIssue};
pub use node::{IntegerSchema, NumberSchema, ObjectField, Schema, StringFormat, StringSchema};
