//! Failure translation middleware
//!
//! Wraps the downstream service in one failure boundary. A thrown failure is
//! an `Err` from the inner service, a response carrying a [`Failure`] in its
//! extensions, or a panic. Each is turned into a [`Problem`], logged once and
//! rendered in the negotiated `Accept` media type. Without a negotiated
//! `Accept` there is nothing to render into and the failure is re-raised.

use std::any::Any;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::Request;
use axum::response::Response;
use futures::FutureExt;
use serde_json::Value;
use tower::{BoxError, Layer, Service};

use crate::context::NegotiationOutcome;
use crate::failure::{Failure, FailureBacktrace, PanicError, Raised};
use crate::logger::{level_for, FailureLogger, NoopLogger, FAILURE_MESSAGE};
use crate::problem::Problem;
use crate::responses::ResponseBuilder;

/// Header whose value becomes the `instance` of a generic 500 problem
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Layer applying [`ProblemService`]
#[derive(Clone)]
pub struct ProblemLayer {
    responses: ResponseBuilder,
    debug: bool,
    logger: Arc<dyn FailureLogger>,
}

impl ProblemLayer {
    /// Production defaults: no debug detail, no logging
    pub fn new(responses: ResponseBuilder) -> Self {
        Self {
            responses,
            debug: false,
            logger: Arc::new(NoopLogger),
        }
    }

    /// Expose failure messages and backtraces in 500 bodies
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_logger(self, logger: impl FailureLogger + 'static) -> Self {
        self.with_shared_logger(Arc::new(logger))
    }

    #[must_use]
    pub fn with_shared_logger(mut self, logger: Arc<dyn FailureLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    fn translate(
        &self,
        thrown: Thrown,
        accept: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<Response, BoxError> {
        let (backtrace, known, message) = match &thrown {
            Thrown::Error(error) => (
                FailureBacktrace::from_error(&**error),
                known_problem(&**error),
                error.to_string(),
            ),
            Thrown::Failure(failure) => {
                (failure.frames(), failure.problem().cloned(), failure.to_string())
            }
            Thrown::Panic(payload) => {
                let failure = Failure::from_panic(PanicError::from_payload(&**payload));
                (failure.frames(), None, failure.to_string())
            }
        };

        let problem = match known {
            Some(problem) => problem,
            None => self.unknown_problem(message, &backtrace, request_id),
        };

        let status = problem.status();
        self.logger
            .log(level_for(status), FAILURE_MESSAGE, status, &backtrace);

        let Some(accept) = accept else {
            return thrown.escalate();
        };

        match self.responses.from_problem(&problem, accept) {
            Ok(response) => Ok(response),
            Err(error) => {
                tracing::error!(
                    error = %error,
                    media_type = accept,
                    status = status.as_u16(),
                    "Problem response could not be encoded"
                );
                thrown.escalate()
            }
        }
    }

    fn unknown_problem(
        &self,
        message: String,
        backtrace: &FailureBacktrace,
        request_id: Option<&str>,
    ) -> Problem {
        let mut problem = Problem::internal_server_error();
        if let Some(request_id) = request_id {
            problem = problem.with_instance(request_id);
        }
        if self.debug {
            problem = problem
                .with_detail(message)
                .with_extension("backtrace", serde_json::to_value(backtrace).unwrap_or(Value::Null));
        }
        problem
    }
}

impl<S> Layer<S> for ProblemLayer {
    type Service = ProblemService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ProblemService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Failure translation service implementation
#[derive(Clone)]
pub struct ProblemService<S> {
    inner: S,
    layer: ProblemLayer,
}

impl<S, B> Service<Request<B>> for ProblemService<S>
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

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let accept = NegotiationOutcome::from_extensions(req.extensions())
            .map(|outcome| outcome.accept.value.clone());
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let layer = self.layer.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let outcome = AssertUnwindSafe(async move { inner.call(req).await })
                .catch_unwind()
                .await;

            let thrown = match outcome {
                Ok(Ok(response)) => match response.extensions().get::<Failure>() {
                    Some(failure) => Thrown::Failure(failure.clone()),
                    None => return Ok(response),
                },
                Ok(Err(error)) => {
                    let error: BoxError = error.into();
                    match error.downcast::<Raised>() {
                        Ok(raised) => Thrown::Failure(raised.0),
                        Err(error) => Thrown::Error(error),
                    }
                }
                Err(payload) => Thrown::Panic(payload),
            };

            layer.translate(thrown, accept.as_deref(), request_id.as_deref())
        })
    }
}

enum Thrown {
    Error(BoxError),
    Failure(Failure),
    Panic(Box<dyn Any + Send>),
}

impl Thrown {
    fn escalate(self) -> Result<Response, BoxError> {
        match self {
            Thrown::Error(error) => Err(error),
            Thrown::Failure(failure) => Err(failure.into()),
            Thrown::Panic(payload) => std::panic::resume_unwind(payload),
        }
    }
}

fn known_problem(error: &(dyn StdError + 'static)) -> Option<Problem> {
    error.downcast_ref::<Problem>().cloned()
}
