//! A schema-driven HTTP contract client
//!
//! This crate turns a set of declared endpoint contracts into a typed,
//! validating client. Every call is addressed by a canonical key such as
//! `@get/users/:id`; the pipeline validates inputs against the declared
//! schemas (coercing string-borne channels), builds and dispatches exactly
//! one request through an injected [`Transport`], and validates the
//! response before handing it back. Streaming endpoints (server-sent
//! events, line-delimited JSON, WebSocket) surface as a uniform
//! [`stream::ChunkStream`] in which per-item failures travel in-band.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use typact_client::{CallArgs, Client, Endpoint};
//! use typact_schema::Schema;
//!
//! # async fn run(transport: impl typact_client::Transport + 'static) {
//! let client = Client::builder(transport)
//!     .base_url("https://api.example.com")
//!     .declare(
//!         Endpoint::get("users/:id")
//!             .param(Schema::object([("id", Schema::string())]))
//!             .response(Schema::object([
//!                 ("id", Schema::string()),
//!                 ("name", Schema::string()),
//!             ])),
//!     )
//!     .build();
//!
//! let user = client
//!     .call("@get/users/:id", CallArgs::new().param(json!({"id": "42"})))
//!     .await
//!     .unwrap();
//! println!("{user}");
//! # }
//! ```

mod endpoint;
mod interceptor;
mod pipeline;
mod registry;

pub mod error;
pub mod stream;
pub mod transport;

pub use endpoint::Endpoint;
pub use endpoint::InputSchemas;
pub use endpoint::Output;
pub use error::ClientError;
pub use error::InputKind;
pub use error::UsageError;
pub use interceptor::InterceptorHandle;
pub use interceptor::InvokeContext;
pub use pipeline::CallArgs;
pub use pipeline::Client;
pub use pipeline::ClientBuilder;
pub use registry::group;
pub use registry::Declaration;
pub use registry::Registry;
pub use transport::SocketConnector;
pub use transport::Transport;
pub use transport::TransportRequest;
pub use transport::TransportResponse;
