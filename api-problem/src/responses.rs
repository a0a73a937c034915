//! Response construction keyed by the negotiated media type
//!
//! [`ResponseBuilder`] is the only place a body is written. Every operation
//! sets headers first and writes the body once, or not at all.
//!
//! ## Operations
//!
//! - **success** - serialized payload, `200 OK` by default
//! - **empty** - `Content-Type` only, `204 No Content` by default
//! - **redirect** - `Location` only, `307 Temporary Redirect` by default
//! - **from_problem** - RFC 9457 body, or headers only for `406`
//!
//! ## Example
//!
//! ```rust,ignore
//! let responses = ResponseBuilder::default();
//!
//! async fn show(Negotiated(outcome): Negotiated) -> Result<Response, Failure> {
//!     let pet = find_pet(7).ok_or_else(|| Problem::not_found().with_detail("no pet 7"))?;
//!     Ok(responses.success(&pet, outcome.accept_media_type())?)
//! }
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use mime::Mime;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::problem::Problem;
use crate::serialization::{SerializationContext, Serializer};

/// Builds transport responses from success payloads, intents and problems
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    serializer: Arc<Serializer>,
}

impl ResponseBuilder {
    pub fn new(serializer: Serializer) -> Self {
        Self {
            serializer: Arc::new(serializer),
        }
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// `200 OK` with the serialized payload
    pub fn success<T>(&self, payload: &T, media_type: &str) -> Result<Response>
    where
        T: Serialize + ?Sized,
    {
        self.success_with(payload, media_type, StatusCode::OK, None)
    }

    /// Serialized payload with an explicit status and encoder context
    pub fn success_with<T>(
        &self,
        payload: &T,
        media_type: &str,
        status: StatusCode,
        context: Option<&SerializationContext>,
    ) -> Result<Response>
    where
        T: Serialize + ?Sized,
    {
        let body = self.serializer.serialize(payload, media_type, context)?;

        Ok(Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, header_value(header::CONTENT_TYPE.as_str(), media_type)?)
            .body(Body::from(body))?)
    }

    /// `204 No Content` with `Content-Type` and no body
    pub fn empty(&self, media_type: &str) -> Result<Response> {
        self.empty_with_status(media_type, StatusCode::NO_CONTENT)
    }

    pub fn empty_with_status(&self, media_type: &str, status: StatusCode) -> Result<Response> {
        Ok(Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, header_value(header::CONTENT_TYPE.as_str(), media_type)?)
            .body(Body::empty())?)
    }

    /// `307 Temporary Redirect` to `location`
    pub fn redirect(&self, location: &str) -> Result<Response> {
        self.redirect_with_status(location, StatusCode::TEMPORARY_REDIRECT)
    }

    /// Redirect with only a `Location` header
    pub fn redirect_with_status(&self, location: &str, status: StatusCode) -> Result<Response> {
        Ok(Response::builder()
            .status(status)
            .header(header::LOCATION, header_value(header::LOCATION.as_str(), location)?)
            .body(Body::empty())?)
    }

    /// Render a problem in the given media type
    ///
    /// The problem's own headers are always applied. A `406` carries those
    /// headers only; every other kind gets a full problem body whose
    /// `Content-Type` is the `problem+` variant of `media_type`.
    pub fn from_problem(&self, problem: &Problem, media_type: &str) -> Result<Response> {
        let mut builder = Response::builder().status(problem.status());
        for (name, value) in problem.headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::invalid_header(name.as_str(), value.as_str()))?;
            builder = builder.header(header_name, header_value(name, value)?);
        }

        if problem.kind().is_headers_only() {
            return Ok(builder.body(Body::empty())?);
        }

        let content_type = problem_media_type(media_type);
        let body = self.serializer.serialize(problem, &content_type, None)?;

        Ok(builder
            .header(header::CONTENT_TYPE, header_value(header::CONTENT_TYPE.as_str(), &content_type)?)
            .body(Body::from(body))?)
    }
}

/// `application/json` → `application/problem+json`; parameters are dropped
pub fn problem_media_type(media_type: &str) -> String {
    let Ok(mime) = media_type.trim().parse::<Mime>() else {
        return media_type.trim().to_ascii_lowercase();
    };
    let essence = mime.essence_str().to_ascii_lowercase();
    let main_type = mime.type_().as_str().to_ascii_lowercase();
    let subtype = essence
        .strip_prefix(main_type.as_str())
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or_default();

    if subtype.starts_with("problem+") {
        essence
    } else {
        format!("{main_type}/problem+{subtype}")
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::invalid_header(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemKind;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[derive(Serialize)]
    struct Pet {
        id: u32,
        name: &'static str,
    }

    #[test]
    fn test_problem_media_type() {
        assert_eq!(problem_media_type("application/json"), "application/problem+json");
        assert_eq!(
            problem_media_type("application/xml; charset=utf-8"),
            "application/problem+xml"
        );
        assert_eq!(
            problem_media_type("application/problem+json"),
            "application/problem+json"
        );
        assert_eq!(
            problem_media_type("Application/VND.API+JSON"),
            "application/problem+vnd.api+json"
        );
    }

    #[tokio::test]
    async fn test_success() {
        let responses = ResponseBuilder::default();
        let response = responses
            .success(&Pet { id: 7, name: "Rex" }, "application/json")
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_bytes(response).await, br#"{"id":7,"name":"Rex"}"#);
    }

    #[tokio::test]
    async fn test_success_with_status() {
        let responses = ResponseBuilder::default();
        let response = responses
            .success_with(&json!({"id": 8}), "application/json", StatusCode::CREATED, None)
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_success_unsupported_media_type() {
        let responses = ResponseBuilder::default();
        let err = responses.success(&json!({}), "text/csv").unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));
    }

    #[tokio::test]
    async fn test_empty() {
        let response = ResponseBuilder::default()
            .empty("application/json")
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_redirect() {
        let responses = ResponseBuilder::default();
        let response = responses
            .redirect_with_status("https://example.com/pets/7", StatusCode::MOVED_PERMANENTLY)
            .unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.headers()[header::LOCATION], "https://example.com/pets/7");
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert!(body_bytes(response).await.is_empty());

        let response = responses.redirect("/pets").unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[test]
    fn test_redirect_invalid_location() {
        let err = ResponseBuilder::default()
            .redirect("/pets\n7")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { ref name, .. } if name == "location"));
    }

    #[tokio::test]
    async fn test_from_problem_body() {
        let problem = Problem::not_found()
            .with_detail("no pet 7")
            .with_instance("/pets/7");
        let response = ResponseBuilder::default()
            .from_problem(&problem, "application/json")
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["type"], json!(ProblemKind::NotFound.type_url()));
        assert_eq!(body["status"], json!(404));
        assert_eq!(body["title"], json!("Not Found"));
        assert_eq!(body["detail"], json!("no pet 7"));
        assert_eq!(body["instance"], json!("/pets/7"));
        assert_eq!(body["_type"], json!("apiProblem"));
    }

    #[tokio::test]
    async fn test_from_problem_is_idempotent() {
        let responses = ResponseBuilder::default();
        let problem = Problem::conflict().with_extension("resource", "pet");

        let first = body_bytes(responses.from_problem(&problem, "application/json").unwrap()).await;
        let second = body_bytes(responses.from_problem(&problem, "application/json").unwrap()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_from_problem_applies_headers_with_body() {
        let problem = Problem::method_not_allowed(&["GET", "POST"]);
        let response = ResponseBuilder::default()
            .from_problem(&problem, "application/json")
            .unwrap();

        assert_eq!(response.headers()[header::ALLOW], "GET,POST");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["allowedMethods"], json!(["GET", "POST"]));
    }

    #[tokio::test]
    async fn test_not_acceptable_is_headers_only() {
        let supported = vec!["application/json".to_string()];
        let problem = Problem::not_acceptable("text/html", &supported);
        let response = ResponseBuilder::default()
            .from_problem(&problem, "application/json")
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(response.headers()["x-acceptables"], "application/json");
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_media_type_has_body() {
        let supported = vec!["application/json".to_string()];
        let problem = Problem::unsupported_media_type("text/plain", &supported);
        let response = ResponseBuilder::default()
            .from_problem(&problem, "application/json")
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["value"], json!("text/plain"));
    }
}
