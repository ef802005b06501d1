//! Endpoint contracts and the canonical-key grammar
//!
//! An endpoint is one declared operation: an HTTP method, a path template
//! with `:name` placeholders, the schemas for each accepted input kind, and
//! the declared output. Endpoints are identified by a canonical key of the
//! form `@<method>/<path-template>` (for example `@get/users/:id`); methods
//! are matched case-insensitively and lower-cased internally.

use crate::error::UsageError;
use http::Method;
use typact_schema::Schema;

/// Schemas for the input kinds an endpoint accepts. Absent kinds are not
/// validated and not serialized.
#[derive(Debug, Clone, Default)]
pub struct InputSchemas {
    pub query: Option<Schema>,
    pub param: Option<Schema>,
    pub json: Option<Schema>,
    pub form: Option<Schema>,
}

/// Declared output of an endpoint.
#[derive(Debug, Clone)]
pub enum Output {
    /// Single response body validated against one schema.
    Plain(Schema),
    /// Server-sent events; payloads validate against a per-event-name map.
    Sse(Vec<(String, Schema)>),
    /// One JSON document per line, each validated against the item schema.
    JsonStream(Schema),
    /// Bidirectional socket with independent schemas per direction.
    WebSocket { send: Schema, receive: Schema },
}

impl Output {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Output::Plain(_) => "plain",
            Output::Sse(_) => "sse",
            Output::JsonStream(_) => "json-stream",
            Output::WebSocket { .. } => "websocket",
        }
    }
}

/// One registered endpoint contract. Immutable once registered.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub method: Method,
    pub path_template: String,
    pub input: InputSchemas,
    pub output: Output,
}

impl Endpoint {
    pub fn new(method: Method, path_template: impl Into<String>) -> Self {
        Self {
            method,
            path_template: path_template.into(),
            input: InputSchemas::default(),
            output: Output::Plain(Schema::Unknown),
        }
    }

    pub fn get(path_template: impl Into<String>) -> Self {
        Self::new(Method::GET, path_template)
    }

    pub fn post(path_template: impl Into<String>) -> Self {
        Self::new(Method::POST, path_template)
    }

    pub fn put(path_template: impl Into<String>) -> Self {
        Self::new(Method::PUT, path_template)
    }

    pub fn patch(path_template: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path_template)
    }

    pub fn delete(path_template: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path_template)
    }

    pub fn query(mut self, schema: Schema) -> Self {
        self.input.query = Some(schema);
        self
    }

    pub fn param(mut self, schema: Schema) -> Self {
        self.input.param = Some(schema);
        self
    }

    pub fn json(mut self, schema: Schema) -> Self {
        self.input.json = Some(schema);
        self
    }

    pub fn form(mut self, schema: Schema) -> Self {
        self.input.form = Some(schema);
        self
    }

    pub fn response(mut self, schema: Schema) -> Self {
        self.output = Output::Plain(schema);
        self
    }

    pub fn sse<S: Into<String>>(mut self, events: impl IntoIterator<Item = (S, Schema)>) -> Self {
        self.output = Output::Sse(events.into_iter().map(|(name, schema)| (name.into(), schema)).collect());
        self
    }

    pub fn json_stream(mut self, item: Schema) -> Self {
        self.output = Output::JsonStream(item);
        self
    }

    pub fn websocket(mut self, send: Schema, receive: Schema) -> Self {
        self.output = Output::WebSocket { send, receive };
        self
    }

    /// The canonical key this endpoint registers under.
    pub fn key(&self) -> String {
        format!("@{}/{}", self.method.as_str().to_ascii_lowercase(), self.path_template)
    }

    /// Placeholder names (`:name`) appearing in the path template, in order.
    pub fn placeholders(&self) -> Vec<String> {
        placeholders(&self.path_template)
    }
}

/// Splits an endpoint key into its method token and path template without
/// validating the method; the pipeline checks the token only after the
/// registry lookup, so an unregistered key reports "not found" rather than
/// "unknown method".
pub(crate) fn split_key(key: &str) -> Result<(String, String), UsageError> {
    let rest = key.strip_prefix('@').ok_or_else(|| UsageError::malformed_key(key))?;
    let (token, path) = rest.split_once('/').ok_or_else(|| UsageError::malformed_key(key))?;
    if token.is_empty() {
        return Err(UsageError::malformed_key(key));
    }
    Ok((token.to_ascii_lowercase(), path.to_string()))
}

/// Resolves a method token to one of the recognized HTTP methods.
pub(crate) fn method_from_token(key: &str, token: &str) -> Result<Method, UsageError> {
    match token {
        "get" => Ok(Method::GET),
        "post" => Ok(Method::POST),
        "put" => Ok(Method::PUT),
        "patch" => Ok(Method::PATCH),
        "delete" => Ok(Method::DELETE),
        _ => Err(UsageError::unknown_method(key, token)),
    }
}

/// Splits a `:name` path segment into its placeholder name and literal
/// suffix. Returns `None` for segments that do not start a placeholder.
pub(crate) fn placeholder_in(segment: &str) -> Option<(&str, &str)> {
    let rest = segment.strip_prefix(':')?;
    let end = rest.find(|c: char| !c.is_ascii_alphanumeric() && c != '_').unwrap_or(rest.len());
    if end == 0 { None } else { Some(rest.split_at(end)) }
}

/// Extracts `:name` placeholders from a path template, in order.
pub(crate) fn placeholders(template: &str) -> Vec<String> {
    template
        .split('/')
        .filter_map(|segment| placeholder_in(segment).map(|(name, _)| name.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_lowercases_the_method() {
        let endpoint = Endpoint::new(Method::GET, "users/:id");
        assert_eq!(endpoint.key(), "@get/users/:id");
    }

    #[test]
    fn split_key_accepts_mixed_case_methods() {
        assert_eq!(split_key("@GET/users/:id").unwrap(), ("get".to_string(), "users/:id".to_string()));
    }

    #[test]
    fn split_key_rejects_malformed_shapes() {
        assert!(split_key("get/users").is_err());
        assert!(split_key("@getusers").is_err());
        assert!(split_key("@/users").is_err());
    }

    #[test]
    fn unknown_method_token_is_reported() {
        let err = method_from_token("@brew/coffee", "brew").unwrap_err();
        assert!(err.to_string().contains("brew"));
    }

    #[test]
    fn placeholders_in_template_order() {
        assert_eq!(placeholders("orgs/:org/users/:user_id"), vec!["org", "user_id"]);
        assert!(placeholders("plain/path").is_empty());
    }

    #[test]
    fn placeholder_segments_keep_literal_suffixes() {
        assert_eq!(placeholder_in(":id"), Some(("id", "")));
        assert_eq!(placeholder_in(":id.json"), Some(("id", ".json")));
        assert_eq!(placeholder_in("users"), None);
        assert_eq!(placeholder_in(":"), None);
    }
}
