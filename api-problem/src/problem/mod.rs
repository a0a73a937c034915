//! RFC 9457 problem records
//!
//! A [`Problem`] is built once, either by application code for a known
//! failure or by the translation middleware for an unknown one, and is then
//! handed to [`ResponseBuilder::from_problem`](crate::responses::ResponseBuilder::from_problem).
//! `type`, `status` and `title` come from its [`ProblemKind`] and cannot be
//! changed after construction.

pub mod catalogue;

use std::fmt;

use axum::http::{header, StatusCode};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub use catalogue::{KindDef, ProblemKind};

/// Content type for Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Value of the `_type` discriminator written into every problem body
pub const API_PROBLEM_TYPE: &str = "apiProblem";

/// Header listing acceptable media types on a 406 response
pub const X_ACCEPTABLES: &str = "X-Acceptables";

const RESERVED_FIELDS: [&str; 6] = ["type", "status", "title", "detail", "instance", "_type"];

/// A single offending request parameter (400/422 problems)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidParameter {
    /// Parameter path, e.g. "email" or "user.email"
    pub name: String,
    /// Human-readable reason the value was rejected
    pub reason: String,
    /// Optional machine-readable details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl InvalidParameter {
    /// Create a new invalid parameter entry
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
            details: None,
        }
    }

    /// Attach machine-readable details
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Canonical representation of an API problem.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Problem {
    kind: ProblemKind,
    detail: Option<String>,
    instance: Option<String>,
    extensions: Map<String, Value>,
    headers: Vec<(String, String)>,
}

impl Problem {
    /// Create a problem of the given kind with no detail, instance,
    /// extensions or headers.
    pub fn new(kind: ProblemKind) -> Self {
        Self {
            kind,
            detail: None,
            instance: None,
            extensions: Map::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Add a kind-specific field, serialized after the base fields.
    ///
    /// Names of base fields (`type`, `status`, `title`, `detail`, `instance`,
    /// `_type`) are ignored at serialization time.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Add a transport header, replacing any previous value of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    pub fn kind(&self) -> ProblemKind {
        self.kind
    }

    pub fn type_url(&self) -> String {
        self.kind.type_url()
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn title(&self) -> &'static str {
        self.kind.title()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

// Kind-specific constructors
impl Problem {
    /// 400 with the offending parameters
    pub fn bad_request(invalid_parameters: Vec<InvalidParameter>) -> Self {
        Self::new(ProblemKind::BadRequest)
            .with_extension("invalidParameters", parameters_value(invalid_parameters))
    }

    /// 401; `WWW-Authenticate` lists the accepted authorization types
    pub fn unauthorized(authorization: impl Into<String>, authorization_types: &[&str]) -> Self {
        let problem = Self::new(ProblemKind::Unauthorized)
            .with_extension("authorization", Value::String(authorization.into()))
            .with_extension("authorizationTypes", string_array(authorization_types));

        if authorization_types.is_empty() {
            return problem;
        }
        problem.with_header(
            header::WWW_AUTHENTICATE.as_str(),
            authorization_types.join(","),
        )
    }

    pub fn forbidden() -> Self {
        Self::new(ProblemKind::Forbidden)
    }

    pub fn not_found() -> Self {
        Self::new(ProblemKind::NotFound)
    }

    /// 405; `Allow` is only sent when at least one method is allowed
    pub fn method_not_allowed(allowed_methods: &[&str]) -> Self {
        let problem = Self::new(ProblemKind::MethodNotAllowed)
            .with_extension("allowedMethods", string_array(allowed_methods));

        if allowed_methods.is_empty() {
            return problem;
        }
        problem.with_header(header::ALLOW.as_str(), allowed_methods.join(","))
    }

    /// 406 for a requested value with no overlap with the supported set
    pub fn not_acceptable(value: impl Into<String>, supported: &[String]) -> Self {
        Self::new(ProblemKind::NotAcceptable)
            .with_extension("value", Value::String(value.into()))
            .with_extension("supportedValues", supported.to_vec())
            .with_header(X_ACCEPTABLES, supported.join(","))
    }

    pub fn conflict() -> Self {
        Self::new(ProblemKind::Conflict)
    }

    /// 415 for a request body type outside the supported set
    pub fn unsupported_media_type(value: impl Into<String>, supported: &[String]) -> Self {
        Self::new(ProblemKind::UnsupportedMediaType)
            .with_extension("value", Value::String(value.into()))
            .with_extension("supportedValues", supported.to_vec())
    }

    /// 422 with the offending parameters
    pub fn unprocessable_entity(invalid_parameters: Vec<InvalidParameter>) -> Self {
        Self::new(ProblemKind::UnprocessableEntity)
            .with_extension("invalidParameters", parameters_value(invalid_parameters))
    }

    /// 429, optionally telling the client when to retry
    pub fn too_many_requests(retry_after_secs: Option<u64>) -> Self {
        with_retry_after(Self::new(ProblemKind::TooManyRequests), retry_after_secs)
    }

    pub fn internal_server_error() -> Self {
        Self::new(ProblemKind::InternalServerError)
    }

    /// 503, optionally telling the client when to retry
    pub fn service_unavailable(retry_after_secs: Option<u64>) -> Self {
        with_retry_after(Self::new(ProblemKind::ServiceUnavailable), retry_after_secs)
    }

    pub fn gateway_timeout() -> Self {
        Self::new(ProblemKind::GatewayTimeout)
    }
}

impl From<ProblemKind> for Problem {
    fn from(kind: ProblemKind) -> Self {
        Self::new(kind)
    }
}

fn with_retry_after(problem: Problem, retry_after_secs: Option<u64>) -> Problem {
    match retry_after_secs {
        Some(secs) => problem
            .with_extension("retryAfter", secs)
            .with_header(header::RETRY_AFTER.as_str(), secs.to_string()),
        None => problem,
    }
}

fn string_array(values: &[&str]) -> Value {
    Value::Array(values.iter().map(|v| Value::from(*v)).collect())
}

fn parameters_value(parameters: Vec<InvalidParameter>) -> Value {
    serde_json::to_value(parameters).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// Field order: base fields, extensions in insertion order, then `_type`.
impl Serialize for Problem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.type_url())?;
        map.serialize_entry("status", &self.status().as_u16())?;
        map.serialize_entry("title", self.title())?;
        map.serialize_entry("detail", &self.detail)?;
        map.serialize_entry("instance", &self.instance)?;
        for (key, value) in &self.extensions {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("_type", API_PROBLEM_TYPE)?;
        map.end()
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.title(), detail),
            None => write!(f, "{}", self.title()),
        }
    }
}

impl std::error::Error for Problem {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_problem_builder_pattern() {
        let problem = Problem::not_found()
            .with_detail("User usr_123 does not exist")
            .with_instance("/users/usr_123");

        assert_eq!(problem.status(), StatusCode::NOT_FOUND);
        assert_eq!(problem.title(), "Not Found");
        assert_eq!(problem.detail(), Some("User usr_123 does not exist"));
        assert_eq!(problem.instance(), Some("/users/usr_123"));
        assert!(problem.headers().is_empty());
        assert!(problem.extensions().is_empty());
    }

    #[test]
    fn test_minimal_problem_serializes_nulls() {
        let value = serde_json::to_value(Problem::new(ProblemKind::FailedDependency)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "https://datatracker.ietf.org/doc/html/rfc4918#section-11.4",
                "status": 424,
                "title": "Failed Dependency",
                "detail": null,
                "instance": null,
                "_type": "apiProblem",
            })
        );
    }

    #[test]
    fn test_field_order_is_stable() {
        let problem = Problem::method_not_allowed(&["PATCH", "PUT"])
            .with_extension("zeta", 1)
            .with_extension("alpha", 2);
        let json = serde_json::to_string(&problem).unwrap();
        assert_eq!(
            json,
            r#"{"type":"https://datatracker.ietf.org/doc/html/rfc2616#section-10.4.6","status":405,"title":"Method Not Allowed","detail":null,"instance":null,"allowedMethods":["PATCH","PUT"],"zeta":1,"alpha":2,"_type":"apiProblem"}"#
        );
    }

    #[test]
    fn test_reserved_extension_names_are_ignored() {
        let problem = Problem::not_found().with_extension("status", 200);
        let value = serde_json::to_value(problem).unwrap();
        assert_eq!(value["status"], json!(404));
    }

    #[test]
    fn test_method_not_allowed_headers() {
        let problem = Problem::method_not_allowed(&["GET", "POST"]);
        assert_eq!(
            problem.headers(),
            &[("allow".to_string(), "GET,POST".to_string())]
        );

        let problem = Problem::method_not_allowed(&[]);
        assert!(problem.headers().is_empty());
        assert_eq!(problem.extension("allowedMethods"), Some(&json!([])));
    }

    #[test]
    fn test_unauthorized_headers() {
        let problem = Problem::unauthorized("Bearer abc", &["Basic", "Bearer"]);
        assert_eq!(
            problem.headers(),
            &[("www-authenticate".to_string(), "Basic,Bearer".to_string())]
        );
        assert_eq!(problem.extension("authorization"), Some(&json!("Bearer abc")));
    }

    #[test]
    fn test_not_acceptable_extensions_and_header() {
        let supported = vec!["application/json".to_string(), "application/xml".to_string()];
        let problem = Problem::not_acceptable("text/html", &supported);

        assert_eq!(problem.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(problem.extension("value"), Some(&json!("text/html")));
        assert_eq!(
            problem.extension("supportedValues"),
            Some(&json!(["application/json", "application/xml"]))
        );
        assert_eq!(
            problem.headers(),
            &[(X_ACCEPTABLES.to_string(), "application/json,application/xml".to_string())]
        );
    }

    #[test]
    fn test_with_header_replaces_case_insensitively() {
        let problem = Problem::service_unavailable(Some(30)).with_header("retry-after", "60");
        assert_eq!(problem.headers().len(), 1);
        assert_eq!(problem.headers()[0].1, "60");
        assert_eq!(problem.extension("retryAfter"), Some(&json!(30)));
    }

    #[test]
    fn test_invalid_parameters() {
        let problem = Problem::unprocessable_entity(vec![
            InvalidParameter::new("email", "must not be empty"),
            InvalidParameter::new("age", "out of range").with_details(json!({"min": 18})),
        ]);
        assert_eq!(
            problem.extension("invalidParameters"),
            Some(&json!([
                {"name": "email", "reason": "must not be empty"},
                {"name": "age", "reason": "out of range", "details": {"min": 18}},
            ]))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Problem::conflict().to_string(), "Conflict");
        assert_eq!(
            Problem::conflict().with_detail("email taken").to_string(),
            "Conflict: email taken"
        );
    }
}
