//! Closed catalogue of problem kinds
//!
//! Every kind fixes its `type` URI, HTTP status and title. Lookups are plain
//! table dispatch; nothing about a kind varies per instance.

use std::fmt;

use axum::http::StatusCode;

const RFC2616: &str = "https://datatracker.ietf.org/doc/html/rfc2616";
const RFC2295: &str = "https://datatracker.ietf.org/doc/html/rfc2295";
const RFC2774: &str = "https://datatracker.ietf.org/doc/html/rfc2774";
const RFC2817: &str = "https://datatracker.ietf.org/doc/html/rfc2817";
const RFC4918: &str = "https://datatracker.ietf.org/doc/html/rfc4918";
const RFC5842: &str = "https://datatracker.ietf.org/doc/html/rfc5842";
const RFC6585: &str = "https://datatracker.ietf.org/doc/html/rfc6585";
const RFC7540: &str = "https://datatracker.ietf.org/doc/html/rfc7540";
const RFC7725: &str = "https://datatracker.ietf.org/doc/html/rfc7725";

/// A catalogued problem kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 402
    PaymentRequired,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 405
    MethodNotAllowed,
    /// 406
    NotAcceptable,
    /// 407
    ProxyAuthenticationRequired,
    /// 408
    RequestTimeout,
    /// 409
    Conflict,
    /// 410
    Gone,
    /// 411
    LengthRequired,
    /// 412
    PreconditionFailed,
    /// 413
    RequestEntityTooLarge,
    /// 414
    RequestUriTooLong,
    /// 415
    UnsupportedMediaType,
    /// 416
    RequestedRangeNotSatisfiable,
    /// 417
    ExpectationFailed,
    /// 421
    MisdirectedRequest,
    /// 422
    UnprocessableEntity,
    /// 423
    Locked,
    /// 424
    FailedDependency,
    /// 426
    UpgradeRequired,
    /// 428
    PreconditionRequired,
    /// 429
    TooManyRequests,
    /// 431
    RequestHeaderFieldsTooLarge,
    /// 451
    UnavailableForLegalReasons,
    /// 500
    InternalServerError,
    /// 501
    NotImplemented,
    /// 502
    BadGateway,
    /// 503
    ServiceUnavailable,
    /// 504
    GatewayTimeout,
    /// 505
    HttpVersionNotSupported,
    /// 506
    VariantAlsoNegotiates,
    /// 507
    InsufficientStorage,
    /// 508
    LoopDetected,
    /// 510
    NotExtended,
    /// 511
    NetworkAuthenticationRequired,
}

/// Static record backing a [`ProblemKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDef {
    pub status: u16,
    pub title: &'static str,
    pub rfc: &'static str,
    pub section: &'static str,
}

impl ProblemKind {
    /// Every kind in the catalogue, in status order
    pub const ALL: [ProblemKind; 38] = [
        Self::BadRequest,
        Self::Unauthorized,
        Self::PaymentRequired,
        Self::Forbidden,
        Self::NotFound,
        Self::MethodNotAllowed,
        Self::NotAcceptable,
        Self::ProxyAuthenticationRequired,
        Self::RequestTimeout,
        Self::Conflict,
        Self::Gone,
        Self::LengthRequired,
        Self::PreconditionFailed,
        Self::RequestEntityTooLarge,
        Self::RequestUriTooLong,
        Self::UnsupportedMediaType,
        Self::RequestedRangeNotSatisfiable,
        Self::ExpectationFailed,
        Self::MisdirectedRequest,
        Self::UnprocessableEntity,
        Self::Locked,
        Self::FailedDependency,
        Self::UpgradeRequired,
        Self::PreconditionRequired,
        Self::TooManyRequests,
        Self::RequestHeaderFieldsTooLarge,
        Self::UnavailableForLegalReasons,
        Self::InternalServerError,
        Self::NotImplemented,
        Self::BadGateway,
        Self::ServiceUnavailable,
        Self::GatewayTimeout,
        Self::HttpVersionNotSupported,
        Self::VariantAlsoNegotiates,
        Self::InsufficientStorage,
        Self::LoopDetected,
        Self::NotExtended,
        Self::NetworkAuthenticationRequired,
    ];

    /// The static definition for this kind
    #[must_use]
    pub const fn def(&self) -> KindDef {
        let (status, title, rfc, section) = match self {
            Self::BadRequest => (400, "Bad Request", RFC2616, "10.4.1"),
            Self::Unauthorized => (401, "Unauthorized", RFC2616, "10.4.2"),
            Self::PaymentRequired => (402, "Payment Required", RFC2616, "10.4.3"),
            Self::Forbidden => (403, "Forbidden", RFC2616, "10.4.4"),
            Self::NotFound => (404, "Not Found", RFC2616, "10.4.5"),
            Self::MethodNotAllowed => (405, "Method Not Allowed", RFC2616, "10.4.6"),
            Self::NotAcceptable => (406, "Not Acceptable", RFC2616, "10.4.7"),
            Self::ProxyAuthenticationRequired => {
                (407, "Proxy Authentication Required", RFC2616, "10.4.8")
            }
            Self::RequestTimeout => (408, "Request Timeout", RFC2616, "10.4.9"),
            Self::Conflict => (409, "Conflict", RFC2616, "10.4.10"),
            Self::Gone => (410, "Gone", RFC2616, "10.4.11"),
            Self::LengthRequired => (411, "Length Required", RFC2616, "10.4.12"),
            Self::PreconditionFailed => (412, "Precondition Failed", RFC2616, "10.4.13"),
            Self::RequestEntityTooLarge => (413, "Request Entity Too Large", RFC2616, "10.4.14"),
            Self::RequestUriTooLong => (414, "Request-URI Too Long", RFC2616, "10.4.15"),
            Self::UnsupportedMediaType => (415, "Unsupported Media Type", RFC2616, "10.4.16"),
            Self::RequestedRangeNotSatisfiable => {
                (416, "Requested Range Not Satisfiable", RFC2616, "10.4.17")
            }
            Self::ExpectationFailed => (417, "Expectation Failed", RFC2616, "10.4.18"),
            Self::MisdirectedRequest => (421, "Misdirected Request", RFC7540, "9.1.2"),
            Self::UnprocessableEntity => (422, "Unprocessable Entity", RFC4918, "11.2"),
            Self::Locked => (423, "Locked", RFC4918, "11.3"),
            Self::FailedDependency => (424, "Failed Dependency", RFC4918, "11.4"),
            Self::UpgradeRequired => (426, "Upgrade Required", RFC2817, "6"),
            Self::PreconditionRequired => (428, "Precondition Required", RFC6585, "3"),
            Self::TooManyRequests => (429, "Too Many Requests", RFC6585, "4"),
            Self::RequestHeaderFieldsTooLarge => {
                (431, "Request Header Fields Too Large", RFC6585, "5")
            }
            Self::UnavailableForLegalReasons => {
                (451, "Unavailable For Legal Reasons", RFC7725, "3")
            }
            Self::InternalServerError => (500, "Internal Server Error", RFC2616, "10.5.1"),
            Self::NotImplemented => (501, "Not Implemented", RFC2616, "10.5.2"),
            Self::BadGateway => (502, "Bad Gateway", RFC2616, "10.5.3"),
            Self::ServiceUnavailable => (503, "Service Unavailable", RFC2616, "10.5.4"),
            Self::GatewayTimeout => (504, "Gateway Timeout", RFC2616, "10.5.5"),
            Self::HttpVersionNotSupported => {
                (505, "HTTP Version Not Supported", RFC2616, "10.5.6")
            }
            Self::VariantAlsoNegotiates => (506, "Variant Also Negotiates", RFC2295, "8.1"),
            Self::InsufficientStorage => (507, "Insufficient Storage", RFC4918, "11.5"),
            Self::LoopDetected => (508, "Loop Detected", RFC5842, "7.2"),
            Self::NotExtended => (510, "Not Extended", RFC2774, "7"),
            Self::NetworkAuthenticationRequired => {
                (511, "Network Authentication Required", RFC6585, "6")
            }
        };

        KindDef {
            status,
            title,
            rfc,
            section,
        }
    }

    /// The HTTP status code fixed for this kind
    #[must_use]
    pub fn status(&self) -> StatusCode {
        // Every catalogued code is a valid status; the fallback is unreachable.
        StatusCode::from_u16(self.def().status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The short human-readable title fixed for this kind
    #[must_use]
    pub const fn title(&self) -> &'static str {
        self.def().title
    }

    /// The stable URI identifying this kind
    #[must_use]
    pub fn type_url(&self) -> String {
        let def = self.def();
        format!("{}#section-{}", def.rfc, def.section)
    }

    /// Whether responses for this kind carry headers only, never a body
    ///
    /// Only 406 qualifies: no representation was agreed with the client, so
    /// there is nothing to encode a body into.
    #[must_use]
    pub const fn is_headers_only(&self) -> bool {
        matches!(self, Self::NotAcceptable)
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.def().status, self.title())
    }
}
