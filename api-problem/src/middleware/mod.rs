//! Tower middleware for the problem pipeline
//!
//! [`NegotiationLayer`] must wrap [`ProblemLayer`] so the negotiated `Accept`
//! is in the request extensions before a failure can occur.

pub mod negotiation;
pub mod problem;

pub use negotiation::{carries_body, NegotiationLayer, NegotiationService, Rejection};
pub use problem::{ProblemLayer, ProblemService, REQUEST_ID_HEADER};
