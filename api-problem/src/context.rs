//! Request-scoped negotiation results
//!
//! [`NegotiationLayer`](crate::middleware::NegotiationLayer) stores one
//! [`NegotiationOutcome`] in the request extensions; every later stage reads
//! it from there and never from shared state.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Extensions;

use crate::failure::Failure;
use crate::negotiation::NegotiatedValue;

/// Values agreed with the client for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationOutcome {
    /// Negotiated `Accept`; always present once negotiation ran
    pub accept: NegotiatedValue,
    /// Negotiated `Content-Type`; only set for body-bearing methods
    pub content_type: Option<NegotiatedValue>,
}

impl NegotiationOutcome {
    pub fn from_extensions(extensions: &Extensions) -> Option<&Self> {
        extensions.get::<Self>()
    }

    /// The media type every response for this request is serialized into
    pub fn accept_media_type(&self) -> &str {
        &self.accept.value
    }
}

/// Extractor for the negotiated values
///
/// ```rust,ignore
/// async fn show(Negotiated(outcome): Negotiated) -> Response {
///     responses.success(&pet, outcome.accept_media_type())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Negotiated(pub NegotiationOutcome);

impl<S> FromRequestParts<S> for Negotiated
where
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let outcome = NegotiationOutcome::from_extensions(&parts.extensions)
            .cloned()
            .ok_or_else(|| Failure::msg("No negotiation outcome in request extensions"))?;
        Ok(Self(outcome))
    }
}
