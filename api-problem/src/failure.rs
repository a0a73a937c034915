//! Thrown failures and their backtraces
//!
//! Axum handlers cannot fail at the service level, so a handler "throws" by
//! returning a [`Failure`]: it renders as an empty 500 that carries itself in
//! the response extensions, where the translation middleware picks it up.
//! Services further down the stack may instead return the failure as their
//! `Err` via `BoxError::from(failure)`.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::panic::Location;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tower::BoxError;

use crate::problem::Problem;

/// An application failure with the place it was raised
#[derive(Clone)]
pub struct Failure {
    error: Arc<dyn StdError + Send + Sync>,
    type_name: Option<&'static str>,
    location: Option<&'static Location<'static>>,
    backtrace: Arc<Backtrace>,
}

impl Failure {
    /// Wrap an error, recording the caller as the raise location
    #[track_caller]
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            error: Arc::new(error),
            type_name: Some(std::any::type_name::<E>()),
            location: Some(Location::caller()),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    /// Wrap an already boxed error whose concrete type is unknown
    #[track_caller]
    pub fn from_boxed(error: BoxError) -> Self {
        Self {
            error: Arc::from(error),
            type_name: None,
            location: Some(Location::caller()),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    /// A failure carrying only a message
    #[track_caller]
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(Message(message.to_string()))
    }

    pub(crate) fn from_panic(panic: PanicError) -> Self {
        Self {
            error: Arc::new(panic),
            type_name: Some(std::any::type_name::<PanicError>()),
            location: None,
            backtrace: Arc::new(Backtrace::disabled()),
        }
    }

    /// The wrapped error
    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.error
    }

    /// The problem this failure was raised with, if any
    pub fn problem(&self) -> Option<&Problem> {
        self.error.downcast_ref::<Problem>()
    }

    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// One frame per error in the cause chain, root cause last
    pub fn frames(&self) -> FailureBacktrace {
        let mut frames = FailureBacktrace::from_error(self.error());
        if let Some(top) = frames.0.first_mut() {
            if let Some(type_name) = self.type_name.filter(|_| !has_fixed_kind(self.error())) {
                top.kind = type_name.to_string();
            }
            top.location = self.location.map(ToString::to_string);
            if self.backtrace.status() == BacktraceStatus::Captured {
                top.trace = Some(self.backtrace.to_string());
            }
        }
        frames
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("error", &self.error)
            .field("location", &self.location)
            .finish()
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<Failure> for BoxError {
    fn from(failure: Failure) -> Self {
        Box::new(Raised(failure))
    }
}

/// A [`Failure`] travelling through a service's `Err` channel
pub(crate) struct Raised(pub(crate) Failure);

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl StdError for Raised {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.error.source()
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// A panic caught while the downstream service was running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    /// Extract the message from a panic payload
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "panic with a non-string payload".to_string()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for PanicError {}

/// One entry of a failure backtrace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktraceFrame {
    pub kind: String,
    pub message: String,
    pub code: Option<i64>,
    pub location: Option<String>,
    pub trace: Option<String>,
}

/// Ordered cause chain of a failure, outermost first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FailureBacktrace(pub Vec<BacktraceFrame>);

impl FailureBacktrace {
    /// Walk `source()` from `error` down to its root cause
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut frames = Vec::new();
        let mut current = Some(error);
        while let Some(error) = current {
            frames.push(frame(error));
            current = error.source();
        }
        Self(frames)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn frames(&self) -> &[BacktraceFrame] {
        &self.0
    }
}

fn frame(error: &(dyn StdError + 'static)) -> BacktraceFrame {
    let (kind, code) = if let Some(io_error) = error.downcast_ref::<io::Error>() {
        ("std::io::Error".to_string(), io_error.raw_os_error().map(i64::from))
    } else if let Some(problem) = error.downcast_ref::<Problem>() {
        ("Problem".to_string(), Some(i64::from(problem.status().as_u16())))
    } else if let Some(raised) = error.downcast_ref::<Raised>() {
        return raised.0.frames().0.into_iter().next().unwrap_or_else(|| fallback(error));
    } else {
        (debug_kind(error), None)
    };

    BacktraceFrame {
        kind,
        message: error.to_string(),
        code,
        location: None,
        trace: None,
    }
}

fn has_fixed_kind(error: &(dyn StdError + 'static)) -> bool {
    error.is::<io::Error>() || error.is::<Problem>()
}

fn fallback(error: &(dyn StdError + 'static)) -> BacktraceFrame {
    BacktraceFrame {
        kind: debug_kind(error),
        message: error.to_string(),
        code: None,
        location: None,
        trace: None,
    }
}

/// Type-like leading identifier of the `Debug` output, e.g. `NotFound` for
/// `NotFound { id: 3 }`
fn debug_kind(error: &(dyn StdError + 'static)) -> String {
    let debug = format!("{error:?}");
    let ident: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    let rest = &debug[ident.len()..];

    let looks_like_type = !ident.is_empty()
        && ident.starts_with(|c: char| c.is_uppercase())
        && (rest.is_empty() || rest.starts_with('(') || rest.starts_with(" {"));

    if looks_like_type {
        ident
    } else {
        "Error".to_string()
    }
}
