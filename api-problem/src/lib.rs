//! # api-problem
//!
//! Content-negotiated [RFC 9457] problem responses for axum and tower.
//!
//! ## Features
//!
//! - **Negotiation**: `Accept` on every request, `Content-Type` on requests with a body; 406/415 before any handler runs
//! - **Failure translation**: errors, thrown [`Failure`]s and panics become problem responses in the negotiated media type
//! - **Problem catalogue**: every 4xx/5xx kind with its fixed type URI, status and title
//! - **Response builder**: success, empty, redirect and problem responses from one serializer
//! - **Debug mode**: failure messages and backtraces in 500 bodies, off by default
//!
//! ## Example
//!
//! ```rust,no_run
//! use api_problem::prelude::*;
//! use axum::error_handling::HandleErrorLayer;
//! use axum::{routing::get, Router};
//!
//! async fn show_pet() -> std::result::Result<axum::response::Response, Failure> {
//!     Err(Problem::not_found().with_detail("Pet 7 does not exist").into())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let pipeline = ProblemPipeline::from_config(&config)?;
//!     let app: Router = Router::new().route("/pets/{id}", get(show_pet)).layer(
//!         tower::ServiceBuilder::new()
//!             .layer(HandleErrorLayer::new(|_: tower::BoxError| async {
//!                 axum::http::StatusCode::INTERNAL_SERVER_ERROR
//!             }))
//!             .layer(pipeline.layers()),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! [RFC 9457]: https://www.rfc-editor.org/rfc/rfc9457

pub mod config;
pub mod context;
pub mod error;
pub mod failure;
pub mod logger;
pub mod middleware;
pub mod negotiation;
pub mod observability;
pub mod pipeline;
pub mod problem;
pub mod responses;
pub mod serialization;

pub use failure::Failure;
pub use problem::{Problem, ProblemKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, NegotiationConfig, ProblemsConfig, ServiceConfig};
    pub use crate::context::{Negotiated, NegotiationOutcome};
    pub use crate::error::{Error, Result};
    pub use crate::failure::{BacktraceFrame, Failure, FailureBacktrace};
    pub use crate::logger::{FailureLogger, NoopLogger, TracingLogger};
    pub use crate::middleware::{NegotiationLayer, ProblemLayer};
    pub use crate::negotiation::{
        AcceptNegotiator, ContentTypeNegotiator, NegotiatedValue, Negotiator,
    };
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::ProblemPipeline;
    pub use crate::problem::{InvalidParameter, Problem, ProblemKind, APPLICATION_PROBLEM_JSON};
    pub use crate::responses::ResponseBuilder;
    pub use crate::serialization::{Encoder, JsonEncoder, SerializationContext, Serializer};
}
