//! Pipeline assembly
//!
//! [`ProblemPipeline`] holds the read-only configuration shared by both
//! middlewares and produces them in the right order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use api_problem::prelude::*;
//! use axum::error_handling::HandleErrorLayer;
//!
//! let config = Config::load()?;
//! let pipeline = ProblemPipeline::from_config(&config)?;
//!
//! let app = Router::new()
//!     .route("/pets/{id}", get(show_pet))
//!     .layer(
//!         tower::ServiceBuilder::new()
//!             .layer(HandleErrorLayer::new(escalated))
//!             .layer(pipeline.layers()),
//!     );
//! ```

use std::fmt;
use std::sync::Arc;

use tower::layer::util::Stack;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logger::{FailureLogger, NoopLogger, TracingLogger};
use crate::middleware::{NegotiationLayer, ProblemLayer};
use crate::negotiation::{AcceptNegotiator, ContentTypeNegotiator, Negotiator};
use crate::responses::{problem_media_type, ResponseBuilder};
use crate::serialization::Serializer;

/// Builder for the negotiation and failure translation layers
#[derive(Clone)]
pub struct ProblemPipeline {
    accept: Arc<dyn Negotiator>,
    content_type: Arc<dyn Negotiator>,
    responses: ResponseBuilder,
    debug: bool,
    logger: Arc<dyn FailureLogger>,
}

impl ProblemPipeline {
    /// JSON only, no debug output, no logging
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            accept: Arc::new(AcceptNegotiator::new(config.negotiation.accept)),
            content_type: Arc::new(ContentTypeNegotiator::new(config.negotiation.content_type)),
            responses: ResponseBuilder::default(),
            debug: false,
            logger: Arc::new(NoopLogger),
        }
    }

    /// Build from configuration, logging failures through `tracing`
    ///
    /// Fails when a configured `Accept` type has no encoder.
    pub fn from_config(config: &Config) -> Result<Self> {
        let pipeline = Self::new()
            .with_accept(AcceptNegotiator::new(config.negotiation.accept.clone()))
            .with_content_type(ContentTypeNegotiator::new(
                config.negotiation.content_type.clone(),
            ))
            .with_debug(config.problems.debug)
            .with_logger(TracingLogger);
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Check that every supported `Accept` type can be encoded, both as a
    /// success payload and as its `problem+` variant
    pub fn validate(&self) -> Result<()> {
        let serializer = self.responses.serializer();
        for media_type in self.accept.supported_media_types() {
            let problem_type = problem_media_type(media_type);
            for candidate in [media_type.as_str(), problem_type.as_str()] {
                if !serializer.supports(candidate) {
                    return Err(Error::UnsupportedMediaType(candidate.to_string()));
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn with_accept(mut self, negotiator: impl Negotiator + 'static) -> Self {
        self.accept = Arc::new(negotiator);
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, negotiator: impl Negotiator + 'static) -> Self {
        self.content_type = Arc::new(negotiator);
        self
    }

    #[must_use]
    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.responses = ResponseBuilder::new(serializer);
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: impl FailureLogger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// The builder handlers should use for their own responses
    pub fn responses(&self) -> &ResponseBuilder {
        &self.responses
    }

    pub fn negotiation_layer(&self) -> NegotiationLayer {
        NegotiationLayer::from_shared(
            self.accept.clone(),
            self.content_type.clone(),
            self.responses.clone(),
        )
    }

    pub fn problem_layer(&self) -> ProblemLayer {
        ProblemLayer::new(self.responses.clone())
            .with_debug(self.debug)
            .with_shared_logger(self.logger.clone())
    }

    /// Both layers, negotiation outermost
    pub fn layers(&self) -> Stack<ProblemLayer, NegotiationLayer> {
        Stack::new(self.problem_layer(), self.negotiation_layer())
    }
}

impl Default for ProblemPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProblemPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemPipeline")
            .field("accept", &self.accept.supported_media_types())
            .field("content_type", &self.content_type.supported_media_types())
            .field("debug", &self.debug)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Negotiated;
    use crate::failure::Failure;
    use crate::problem::{Problem, ProblemKind};
    use axum::body::{to_bytes, Body};
    use axum::error_handling::HandleErrorLayer;
    use axum::extract::Path;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::{BoxError, Layer, ServiceBuilder, ServiceExt};

    fn app(pipeline: ProblemPipeline) -> Router {
        let responses = pipeline.responses().clone();
        let show = move |Path(id): Path<u32>, Negotiated(outcome): Negotiated| {
            let responses = responses.clone();
            async move {
                if id != 7 {
                    return Err(Failure::from(
                        Problem::not_found().with_detail(format!("Pet {id} does not exist")),
                    ));
                }
                let pet = json!({"id": 7, "name": "Rex"});
                responses
                    .success(&pet, outcome.accept_media_type())
                    .map_err(Failure::from)
            }
        };

        Router::new()
            .route("/pets/{id}", get(show))
            .route(
                "/pets",
                post(|| async { Err::<Response, Failure>(Failure::msg("storage offline")) }),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(|_: BoxError| async {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }))
                    .layer(pipeline.layers()),
            )
    }

    fn get_request(uri: &str, accept: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.negotiation.accept = vec![
            "application/json".into(),
            "application/vnd.api+json".into(),
        ];
        config.problems.debug = true;

        let pipeline = ProblemPipeline::from_config(&config).unwrap();
        assert!(pipeline.problem_layer().debug());
        assert_eq!(
            pipeline.accept.supported_media_types(),
            &[
                "application/json".to_string(),
                "application/vnd.api+json".to_string()
            ]
        );
    }

    #[test]
    fn test_from_config_rejects_accept_without_encoder() {
        let mut config = Config::default();
        config.negotiation.accept = vec!["application/json".into(), "application/xml".into()];

        let error = ProblemPipeline::from_config(&config).unwrap_err();
        assert!(matches!(
            error,
            Error::UnsupportedMediaType(ref media_type) if media_type == "application/xml"
        ));
    }

    #[test]
    fn test_validate_checks_custom_serializer() {
        let pipeline = ProblemPipeline::new().with_serializer(Serializer::empty());
        assert!(pipeline.validate().is_err());
        assert!(ProblemPipeline::new().validate().is_ok());
    }

    #[tokio::test]
    async fn test_success_through_router() {
        let response = app(ProblemPipeline::new())
            .oneshot(get_request("/pets/7", Some("application/json")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_json(response).await, json!({"id": 7, "name": "Rex"}));
    }

    #[tokio::test]
    async fn test_known_problem_through_router() {
        let response = app(ProblemPipeline::new())
            .oneshot(get_request("/pets/3", Some("application/json")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["detail"], json!("Pet 3 does not exist"));
        assert_eq!(body["instance"], Value::Null);
    }

    #[tokio::test]
    async fn test_missing_accept_through_router() {
        let response = app(ProblemPipeline::new())
            .oneshot(get_request("/pets/7", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(response.headers()["x-acceptables"], "application/json");
    }

    #[tokio::test]
    async fn test_unknown_failure_through_router() {
        let request = Request::builder()
            .method("POST")
            .uri("/pets")
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap();

        let response = app(ProblemPipeline::new().with_debug(true))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["detail"], json!("storage offline"));
        assert_eq!(body["backtrace"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_layer_order_without_router() {
        let service = ProblemPipeline::new().layers().layer(tower::service_fn(
            |_req: Request<Body>| async { Err::<Response, BoxError>(Problem::new(ProblemKind::Gone).into()) },
        ));

        let response = service
            .oneshot(get_request("/pets/1", Some("*/*")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
    }
}
