//! Failure logging
//!
//! The translation middleware picks the level; a [`FailureLogger`] only
//! decides where the record goes. [`NoopLogger`] is the default so a
//! pipeline built without configuration stays silent.

use axum::http::StatusCode;
use tracing::Level;

use crate::failure::FailureBacktrace;

/// Message attached to every logged failure
pub const FAILURE_MESSAGE: &str = "Http Exception";

/// Sink for translated failures
pub trait FailureLogger: Send + Sync {
    fn log(&self, level: Level, message: &str, status: StatusCode, backtrace: &FailureBacktrace);
}

/// Discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl FailureLogger for NoopLogger {
    fn log(&self, _level: Level, _message: &str, _status: StatusCode, _backtrace: &FailureBacktrace) {}
}

/// Emits `tracing` events with the backtrace as a JSON field
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl FailureLogger for TracingLogger {
    fn log(&self, level: Level, message: &str, status: StatusCode, backtrace: &FailureBacktrace) {
        let backtrace = serde_json::to_string(backtrace).unwrap_or_default();
        let status = status.as_u16();

        if level == Level::ERROR {
            tracing::error!(status, backtrace = %backtrace, "{}", message);
        } else if level == Level::WARN {
            tracing::warn!(status, backtrace = %backtrace, "{}", message);
        } else if level == Level::INFO {
            tracing::info!(status, backtrace = %backtrace, "{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!(status, backtrace = %backtrace, "{}", message);
        } else {
            tracing::trace!(status, backtrace = %backtrace, "{}", message);
        }
    }
}

/// Level for a translated failure: `ERROR` for server errors, `INFO` otherwise
pub fn level_for(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else {
        Level::INFO
    }
}
