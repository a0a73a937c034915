//! Accept / Content-Type negotiation middleware
//!
//! Runs before any application code. `Accept` is always negotiated;
//! `Content-Type` only for methods that carry a body. A failed check answers
//! with a 406 or 415 problem and the inner service is never called.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{HeaderMap, Method, Request};
use axum::response::Response;
use tower::{BoxError, Layer, Service};

use crate::context::NegotiationOutcome;
use crate::negotiation::{header_line, Negotiator};
use crate::problem::Problem;
use crate::responses::ResponseBuilder;

/// Media type used for a 406 when the server lists no supported types
pub const FALLBACK_MEDIA_TYPE: &str = "application/json";

/// Methods exempt from `Content-Type` negotiation
const BODILESS_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::OPTIONS,
    Method::TRACE,
    Method::DELETE,
    Method::CONNECT,
];

/// Whether requests with this method must declare a `Content-Type`
pub fn carries_body(method: &Method) -> bool {
    !BODILESS_METHODS.contains(method)
}

/// A failed negotiation, ready to be rendered
#[derive(Debug, Clone)]
pub struct Rejection {
    pub problem: Problem,
    /// Media type the problem is rendered in
    pub media_type: String,
}

struct Negotiation {
    accept: Arc<dyn Negotiator>,
    content_type: Arc<dyn Negotiator>,
    responses: ResponseBuilder,
}

/// Layer applying [`NegotiationService`]
#[derive(Clone)]
pub struct NegotiationLayer {
    negotiation: Arc<Negotiation>,
}

impl NegotiationLayer {
    pub fn new(
        accept: impl Negotiator + 'static,
        content_type: impl Negotiator + 'static,
        responses: ResponseBuilder,
    ) -> Self {
        Self::from_shared(Arc::new(accept), Arc::new(content_type), responses)
    }

    pub(crate) fn from_shared(
        accept: Arc<dyn Negotiator>,
        content_type: Arc<dyn Negotiator>,
        responses: ResponseBuilder,
    ) -> Self {
        Self {
            negotiation: Arc::new(Negotiation {
                accept,
                content_type,
                responses,
            }),
        }
    }

    /// Run both checks against a request's method and headers
    pub fn negotiate(
        &self,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<NegotiationOutcome, Rejection> {
        let negotiation = &self.negotiation;

        let Some(accept) = negotiation.accept.negotiate(headers) else {
            let supported = negotiation.accept.supported_media_types();
            let value = header_line(headers, &negotiation.accept.header_name());
            let detail = rejection_detail(&value, "accept", supported);
            return Err(Rejection {
                problem: Problem::not_acceptable(value, supported).with_detail(detail),
                media_type: supported
                    .first()
                    .cloned()
                    .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string()),
            });
        };

        if !carries_body(method) {
            return Ok(NegotiationOutcome {
                accept,
                content_type: None,
            });
        }

        let Some(content_type) = negotiation.content_type.negotiate(headers) else {
            let supported = negotiation.content_type.supported_media_types();
            let value = header_line(headers, &negotiation.content_type.header_name());
            let detail = rejection_detail(&value, "content-type", supported);
            return Err(Rejection {
                problem: Problem::unsupported_media_type(value, supported).with_detail(detail),
                media_type: accept.value,
            });
        };

        Ok(NegotiationOutcome {
            accept,
            content_type: Some(content_type),
        })
    }
}

impl<S> Layer<S> for NegotiationLayer {
    type Service = NegotiationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NegotiationService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Negotiation service implementation
#[derive(Clone)]
pub struct NegotiationService<S> {
    inner: S,
    layer: NegotiationLayer,
}

impl<S, B> Service<Request<B>> for NegotiationService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let negotiated = self.layer.negotiate(req.method(), req.headers());
        let responses = self.layer.negotiation.responses.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match negotiated {
                Ok(outcome) => {
                    tracing::trace!(
                        accept = %outcome.accept.value,
                        content_type = ?outcome.content_type.as_ref().map(|v| v.value.as_str()),
                        "Negotiated request media types"
                    );
                    req.extensions_mut().insert(outcome);
                    inner.call(req).await.map_err(Into::into)
                }
                Err(rejection) => Ok(responses.from_problem(&rejection.problem, &rejection.media_type)?),
            }
        })
    }
}

fn rejection_detail(value: &str, header: &str, supported: &[String]) -> String {
    let reason = if value.trim().is_empty() {
        "Missing"
    } else {
        "Not supported"
    };
    let supported_values = supported
        .iter()
        .map(|media_type| format!("\"{media_type}\""))
        .collect::<Vec<_>>()
        .join(",");

    format!("{reason} {header}, supportedValues: {supported_values}")
}
