//! Request pipeline
//!
//! [`Client::call`] turns a canonical endpoint key plus per-call arguments
//! into one transport attempt: key and method checks, path substitution,
//! input validation (with string coercion for the query/param channels),
//! query serialization, body construction, interceptor chains, failure
//! classification, and response parsing/validation. Every step is a
//! distinct failure point mapped onto the [`crate::error`] taxonomy, and
//! there is never an automatic retry — retry policy belongs to the caller,
//! composable via interceptors.
//!
//! The streaming variants ([`Client::open_sse`],
//! [`Client::open_json_stream`], [`Client::open_websocket`]) share the
//! request-building half of the pipeline and hand the response over to the
//! pumps in [`crate::stream`].

use crate::endpoint::{method_from_token, placeholder_in, split_key, Endpoint, Output};
use crate::error::{ApiError, ClientError, ErrorBody, InputKind, UsageError};
use crate::interceptor::{Chain, InterceptorHandle, InvokeContext};
use crate::registry::{Declaration, Registry};
use crate::stream::{ndjson, sse, ws, Connection};
use crate::transport::{
    FormPart, RequestBody, SocketConnector, Transport, TransportError, TransportRequest, TransportResponse,
};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use typact_schema::{coercing, form, FieldPath, Schema, ValidationFailure};

/// Per-call argument bag. Which members are meaningful depends on the
/// input kinds the endpoint declares.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub query: Option<Value>,
    pub param: Option<Value>,
    pub json: Option<Value>,
    pub form: Option<Value>,
    pub headers: HeaderMap,
    pub cancel: Option<CancellationToken>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, value: Value) -> Self {
        self.query = Some(value);
        self
    }

    pub fn param(mut self, value: Value) -> Self {
        self.param = Some(value);
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.json = Some(value);
        self
    }

    pub fn form(mut self, value: Value) -> Self {
        self.form = Some(value);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Legacy single-callback transform over the outgoing request; runs once
/// before the request chain and may replace the request wholesale.
pub type RequestHook = Arc<dyn Fn(&InvokeContext, TransportRequest) -> TransportRequest + Send + Sync>;

/// Legacy single-callback transform over the raw response; runs once
/// before the response chain.
pub type ResponseHook = Arc<dyn Fn(&InvokeContext, TransportResponse) -> TransportResponse + Send + Sync>;

/// Schema-driven contract client.
///
/// Construction fixes the registry; the interceptor chains stay mutable
/// for the client's lifetime.
pub struct Client {
    base_url: String,
    registry: Registry,
    transport: Arc<dyn Transport>,
    connector: Option<Arc<dyn SocketConnector>>,
    default_headers: HeaderMap,
    request_chain: Chain<TransportRequest>,
    response_chain: Chain<TransportResponse>,
    request_hook: Option<RequestHook>,
    response_hook: Option<ResponseHook>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("base_url", &self.base_url).field("endpoints", &self.registry.len()).finish()
    }
}

/// Builder for [`Client`]; the transport is the one required piece.
pub struct ClientBuilder {
    base_url: String,
    declarations: Vec<Declaration>,
    transport: Arc<dyn Transport>,
    connector: Option<Arc<dyn SocketConnector>>,
    default_headers: HeaderMap,
    request_hook: Option<RequestHook>,
    response_hook: Option<ResponseHook>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder").field("base_url", &self.base_url).finish()
    }
}

impl ClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn declare(mut self, declaration: impl Into<Declaration>) -> Self {
        self.declarations.push(declaration.into());
        self
    }

    pub fn socket_connector(mut self, connector: impl SocketConnector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn transform_request(
        mut self,
        hook: impl Fn(&InvokeContext, TransportRequest) -> TransportRequest + Send + Sync + 'static,
    ) -> Self {
        self.request_hook = Some(Arc::new(hook));
        self
    }

    pub fn transform_response(
        mut self,
        hook: impl Fn(&InvokeContext, TransportResponse) -> TransportResponse + Send + Sync + 'static,
    ) -> Self {
        self.response_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Client {
        Client {
            base_url: self.base_url,
            registry: Registry::build(self.declarations),
            transport: self.transport,
            connector: self.connector,
            default_headers: self.default_headers,
            request_chain: Chain::new(),
            response_chain: Chain::new(),
            request_hook: self.request_hook,
            response_hook: self.response_hook,
        }
    }
}

/// Everything `prepare` produces for one call: the contract, the
/// interceptor context, and the fully built outgoing request.
struct Prepared {
    endpoint: Arc<Endpoint>,
    ctx: InvokeContext,
    request: TransportRequest,
}

fn network_error(error: TransportError) -> ClientError {
    let timeout = matches!(error, TransportError::Aborted);
    ClientError::Network { timeout, source: Box::new(error) }
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Client {
    pub fn builder(transport: impl Transport + 'static) -> ClientBuilder {
        ClientBuilder {
            base_url: String::new(),
            declarations: Vec::new(),
            transport: Arc::new(transport),
            connector: None,
            default_headers: HeaderMap::new(),
            request_hook: None,
            response_hook: None,
        }
    }

    /// Subscribes a request-stage interceptor; takes effect on subsequent
    /// calls.
    pub fn on_request(
        &self,
        callback: impl Fn(&InvokeContext, &mut TransportRequest) + Send + Sync + 'static,
    ) -> InterceptorHandle {
        self.request_chain.subscribe(callback)
    }

    pub fn off_request(&self, handle: InterceptorHandle) -> bool {
        self.request_chain.unsubscribe(handle)
    }

    /// Subscribes a response-stage interceptor.
    pub fn on_response(
        &self,
        callback: impl Fn(&InvokeContext, &mut TransportResponse) + Send + Sync + 'static,
    ) -> InterceptorHandle {
        self.response_chain.subscribe(callback)
    }

    pub fn off_response(&self, handle: InterceptorHandle) -> bool {
        self.response_chain.unsubscribe(handle)
    }

    fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if base.is_empty() { format!("/{path}") } else { format!("{base}/{path}") }
    }

    /// Steps 1–9: everything before the wire.
    fn prepare(&self, key: &str, args: &CallArgs) -> Result<Prepared, ClientError> {
        // step 1: key shape
        let (token, path_template) = split_key(key)?;
        let canonical = format!("@{token}/{path_template}");

        // step 2: endpoint lookup
        let endpoint = self
            .registry
            .lookup(&canonical)
            .cloned()
            .ok_or_else(|| UsageError::endpoint_not_found(&canonical))?;

        // step 3: method token must be a recognized http method
        let method = method_from_token(key, &token)?;

        // step 4: literal :name substitution, one segment at a time so a
        // supplied value is inserted verbatim and never rescanned, and a
        // name sharing a prefix with another never bleeds into it
        let mut resolved = Vec::new();
        for segment in endpoint.path_template.split('/') {
            let Some((name, suffix)) = placeholder_in(segment) else {
                resolved.push(segment.to_string());
                continue;
            };
            let supplied = args.param.as_ref().and_then(|params| params.get(name)).map(plain_string);
            match supplied {
                Some(value) => resolved.push(format!("{value}{suffix}")),
                None => {
                    let url = self.url_for(&endpoint.path_template);
                    return Err(UsageError::missing_path_param(name, method, url).into());
                }
            }
        }
        let path = resolved.join("/");

        // step 5: validate each declared input kind that is present;
        // query/param ride string-only channels, so their schemas coerce
        let mut inputs = serde_json::Map::new();
        let query = validate_input(&endpoint.input.query, &args.query, InputKind::Query, true)?;
        let param = validate_input(&endpoint.input.param, &args.param, InputKind::Param, true)?;
        let json = validate_input(&endpoint.input.json, &args.json, InputKind::Json, false)?;
        let form_value = validate_input(&endpoint.input.form, &args.form, InputKind::Form, false)?;
        for (kind, validated) in
            [("query", &query), ("param", &param), ("json", &json), ("form", &form_value)]
        {
            if let Some(validated) = validated {
                inputs.insert(kind.to_string(), validated.clone());
            }
        }

        // step 6: query string, appended only when non-empty
        let mut url = self.url_for(&path);
        if let Some(query) = &query {
            let pairs = form::flatten(query);
            if !pairs.is_empty() {
                let encoded =
                    serde_urlencoded::to_string(&pairs).map_err(|e| UsageError::encode("query string", e))?;
                url.push('?');
                url.push_str(&encoded);
            }
        }

        // step 7: body construction
        let mut headers = self.default_headers.clone();
        for (name, value) in args.headers.iter() {
            headers.insert(name, value.clone());
        }
        let body = if method == Method::GET {
            RequestBody::Empty
        } else if let Some(json) = &json {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime::APPLICATION_JSON.as_ref()));
            let encoded = serde_json::to_vec(json).map_err(|e| UsageError::encode("request body", e))?;
            RequestBody::Json(Bytes::from(encoded))
        } else if let Some(form_value) = &form_value {
            // content-type stays unset: multipart needs the transport's boundary
            let parts = form::flatten(form_value)
                .into_iter()
                .map(|(name, value)| FormPart { name, value })
                .collect();
            RequestBody::Multipart(parts)
        } else {
            RequestBody::Empty
        };

        // step 8: read-only context, built once per call
        let ctx = InvokeContext { key: canonical, method: method.clone(), path: path.clone(), inputs };

        let request = TransportRequest {
            method,
            url,
            headers,
            body,
            cancel: args.cancel.clone().unwrap_or_default(),
        };

        // step 9: legacy hook first (may replace wholesale), then the
        // chain snapshot in registration order
        let mut request = match &self.request_hook {
            Some(hook) => hook(&ctx, request),
            None => request,
        };
        for callback in self.request_chain.snapshot() {
            callback(&ctx, &mut request);
        }

        Ok(Prepared { endpoint, ctx, request })
    }

    /// Steps 10–11: one transport attempt plus the response-stage hooks.
    async fn dispatch(&self, ctx: &InvokeContext, request: TransportRequest) -> Result<TransportResponse, ClientError> {
        debug!(key = %ctx.key, method = %request.method, url = %request.url, "dispatching request");
        let response = self.transport.send(request).await.map_err(network_error)?;
        debug!(key = %ctx.key, status = %response.status, "received response");
        let mut response = match &self.response_hook {
            Some(hook) => hook(ctx, response),
            None => response,
        };
        for callback in self.response_chain.snapshot() {
            callback(ctx, &mut response);
        }
        Ok(response)
    }

    /// Executes a plain (non-streaming) call and returns the validated
    /// response value.
    pub async fn call(&self, key: &str, args: CallArgs) -> Result<Value, ClientError> {
        let Prepared { endpoint, ctx, request } = self.prepare(key, &args)?;
        let schema = match &endpoint.output {
            Output::Plain(schema) => schema.clone(),
            other => return Err(UsageError::wrong_output_kind(&ctx.key, "plain", other.kind_name()).into()),
        };
        let method = request.method.clone();
        let url = request.url.clone();

        let response = self.dispatch(&ctx, request).await?;
        let status = response.status;

        // step 12: status check with best-effort error body
        if !status.is_success() {
            let bytes = response.body.collect().await.map_err(ClientError::network)?;
            return Err(ApiError::Status { status, method, url, body: ErrorBody::from_bytes(&bytes) }.into());
        }

        // step 13: read strategy follows the declared response kind
        let (parsed, raw) = match &schema {
            Schema::Void => (Value::Null, String::new()),
            Schema::String(_) => {
                let bytes = response.body.collect().await.map_err(ClientError::network)?;
                match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => (Value::String(text.clone()), text),
                    Err(e) => {
                        return Err(ApiError::UndecodableBody { status, method, url, reason: e.to_string() }.into());
                    }
                }
            }
            _ => {
                let bytes = response.body.collect().await.map_err(ClientError::network)?;
                let raw = String::from_utf8_lossy(&bytes).into_owned();
                match serde_json::from_slice::<Value>(&bytes) {
                    Ok(parsed) => (parsed, raw),
                    Err(e) => {
                        return Err(ApiError::UndecodableBody { status, method, url, reason: e.to_string() }.into());
                    }
                }
            }
        };

        // steps 14–15: response validation, then the typed value
        schema.parse(&parsed).map_err(|failure| ClientError::response_validation(status, raw, failure))
    }

    /// Like [`Client::call`], deserializing the validated value into `T`.
    pub async fn call_as<T: DeserializeOwned>(&self, key: &str, args: CallArgs) -> Result<T, ClientError> {
        let value = self.call(key, args).await?;
        serde_json::from_value(value).map_err(|e| {
            let failure = ValidationFailure::single(FieldPath::root(), e.to_string());
            ClientError::response_validation(StatusCode::OK, String::new(), failure)
        })
    }

    /// Opens a server-sent-events connection.
    pub async fn open_sse(&self, key: &str, args: CallArgs) -> Result<Connection, ClientError> {
        let Prepared { endpoint, ctx, request } = self.prepare(key, &args)?;
        let events = match &endpoint.output {
            Output::Sse(events) => events.clone(),
            other => return Err(UsageError::wrong_output_kind(&ctx.key, "sse", other.kind_name()).into()),
        };
        let body = self.open_body(&ctx, request).await?;
        Ok(Connection { chunks: sse::open(events, body), controller: None })
    }

    /// Opens a newline-delimited-JSON stream.
    pub async fn open_json_stream(&self, key: &str, args: CallArgs) -> Result<Connection, ClientError> {
        let Prepared { endpoint, ctx, request } = self.prepare(key, &args)?;
        let item = match &endpoint.output {
            Output::JsonStream(item) => item.clone(),
            other => return Err(UsageError::wrong_output_kind(&ctx.key, "json-stream", other.kind_name()).into()),
        };
        let body = self.open_body(&ctx, request).await?;
        Ok(Connection { chunks: ndjson::open(item, body), controller: None })
    }

    /// Opens a WebSocket connection; the returned
    /// [`Connection::controller`] carries the outbound handle.
    pub async fn open_websocket(&self, key: &str, args: CallArgs) -> Result<Connection, ClientError> {
        let Prepared { endpoint, ctx, request } = self.prepare(key, &args)?;
        let (send, receive) = match &endpoint.output {
            Output::WebSocket { send, receive } => (send.clone(), receive.clone()),
            other => return Err(UsageError::wrong_output_kind(&ctx.key, "websocket", other.kind_name()).into()),
        };
        let connector = self
            .connector
            .as_ref()
            .ok_or_else(|| ClientError::network(io::Error::other("no socket connector configured")))?;
        let duplex = connector.connect(&request.url, &request.headers).await.map_err(network_error)?;
        let (chunks, controller) = ws::open(send, receive, duplex);
        Ok(Connection { chunks, controller: Some(controller) })
    }

    /// Shared establishment path for the two HTTP-carried stream kinds:
    /// dispatch, status check, then hand back the byte stream.
    async fn open_body(
        &self,
        ctx: &InvokeContext,
        request: TransportRequest,
    ) -> Result<futures::stream::BoxStream<'static, io::Result<Bytes>>, ClientError> {
        let method = request.method.clone();
        let url = request.url.clone();
        let response = self.dispatch(ctx, request).await?;
        let status = response.status;
        if !status.is_success() {
            let bytes = response.body.collect().await.map_err(ClientError::network)?;
            return Err(ApiError::Status { status, method, url, body: ErrorBody::from_bytes(&bytes) }.into());
        }
        Ok(response.body.into_stream())
    }
}

fn validate_input(
    schema: &Option<Schema>,
    value: &Option<Value>,
    kind: InputKind,
    coerce: bool,
) -> Result<Option<Value>, ClientError> {
    match (schema, value) {
        (Some(schema), Some(value)) => {
            let result = if coerce { coercing(schema).parse(value) } else { schema.parse(value) };
            result.map(Some).map_err(|failure| ClientError::request_validation(kind, failure))
        }
        _ => Ok(None),
    }
}
