//! Accept and Content-Type negotiation
//!
//! A [`Negotiator`] matches one request header against a server-side,
//! ordered list of supported media types. Only the outcome is consumed by the
//! middleware; the matching rules live here.

use std::collections::BTreeMap;

use axum::http::{header, HeaderMap, HeaderName};
use mime::Mime;

/// The value agreed for one negotiated header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedValue {
    /// The supported media type that was selected
    pub value: String,
    /// Parameters the client sent alongside the matched value, `q` excluded
    pub attributes: BTreeMap<String, String>,
}

impl NegotiatedValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Negotiates a single request header against a supported set
pub trait Negotiator: Send + Sync {
    /// The request header this negotiator reads
    fn header_name(&self) -> HeaderName;

    /// Select a supported value, or `None` when nothing matches
    fn negotiate(&self, headers: &HeaderMap) -> Option<NegotiatedValue>;

    /// Supported media types, in server preference order
    fn supported_media_types(&self) -> &[String];
}

/// Lower-cased media type without parameters; empty when unparsable
pub fn essence(media_type: &str) -> String {
    parse_mime(media_type)
        .map(|mime| mime.essence_str().to_ascii_lowercase())
        .unwrap_or_default()
}

/// All values of a header joined with `", "`; empty when absent
///
/// Bytes that are not UTF-8 are replaced rather than dropped, so a present
/// but malformed header is never mistaken for a missing one.
pub fn header_line(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get_all(name)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_mime(raw: &str) -> Option<Mime> {
    raw.trim().parse().ok()
}

struct MediaRange {
    mime: Mime,
    params: BTreeMap<String, String>,
    quality: f32,
}

fn parse_media_range(raw: &str) -> Option<MediaRange> {
    let mime = parse_mime(raw)?;

    let mut params = BTreeMap::new();
    let mut quality = 1.0;
    for (name, value) in mime.params() {
        let name = name.as_str().to_ascii_lowercase();
        let value = value.as_str().trim_matches('"');
        if name == "q" {
            quality = value.parse::<f32>().ok().filter(|q| (0.0..=1.0).contains(q))?;
        } else {
            params.insert(name, value.to_string());
        }
    }

    Some(MediaRange {
        mime,
        params,
        quality,
    })
}

/// Specificity of `range` against a concrete type, `None` when it does not match
fn specificity(range: &Mime, media_type: &Mime) -> Option<u8> {
    if range.essence_str().eq_ignore_ascii_case(media_type.essence_str()) {
        return Some(2);
    }
    if range.subtype() != mime::STAR {
        return None;
    }
    if range.type_() == mime::STAR {
        return Some(0);
    }
    range
        .type_()
        .as_str()
        .eq_ignore_ascii_case(media_type.type_().as_str())
        .then_some(1)
}

fn normalize_supported(supported: Vec<String>) -> Vec<String> {
    supported
        .into_iter()
        .map(|media_type| essence(&media_type))
        .filter(|media_type| !media_type.is_empty())
        .collect()
}

/// `Accept` negotiation with quality values and wildcards
///
/// For each supported type the most specific matching range decides its
/// quality. The highest quality wins; ties go to the range the client listed
/// first, then to server order. A quality of zero excludes the type.
#[derive(Debug, Clone)]
pub struct AcceptNegotiator {
    supported: Vec<String>,
    mimes: Vec<Mime>,
}

impl AcceptNegotiator {
    pub fn new(supported: Vec<String>) -> Self {
        let supported = normalize_supported(supported);
        let mimes = supported.iter().filter_map(|media_type| parse_mime(media_type)).collect();
        Self { supported, mimes }
    }
}

impl Negotiator for AcceptNegotiator {
    fn header_name(&self) -> HeaderName {
        header::ACCEPT
    }

    fn negotiate(&self, headers: &HeaderMap) -> Option<NegotiatedValue> {
        let line = header_line(headers, &header::ACCEPT);
        let ranges: Vec<MediaRange> = line.split(',').filter_map(parse_media_range).collect();

        // (quality, client position, supported index)
        let mut best: Option<(f32, usize, usize)> = None;
        for (index, supported) in self.mimes.iter().enumerate() {
            let matched = ranges
                .iter()
                .enumerate()
                .filter_map(|(position, range)| {
                    specificity(&range.mime, supported).map(|s| (s, position))
                })
                .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

            let Some((_, position)) = matched else {
                continue;
            };
            let quality = ranges[position].quality;
            if quality <= 0.0 {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_quality, best_position, _)) => {
                    quality > best_quality
                        || (quality == best_quality && position < best_position)
                }
            };
            if better {
                best = Some((quality, position, index));
            }
        }

        best.map(|(_, position, index)| NegotiatedValue {
            value: self.supported[index].clone(),
            attributes: ranges[position].params.clone(),
        })
    }

    fn supported_media_types(&self) -> &[String] {
        &self.supported
    }
}

/// `Content-Type` negotiation by exact media type match
///
/// Parameters such as `charset` are kept as attributes of the result.
#[derive(Debug, Clone)]
pub struct ContentTypeNegotiator {
    supported: Vec<String>,
}

impl ContentTypeNegotiator {
    pub fn new(supported: Vec<String>) -> Self {
        Self {
            supported: normalize_supported(supported),
        }
    }
}

impl Negotiator for ContentTypeNegotiator {
    fn header_name(&self) -> HeaderName {
        header::CONTENT_TYPE
    }

    fn negotiate(&self, headers: &HeaderMap) -> Option<NegotiatedValue> {
        let line = header_line(headers, &header::CONTENT_TYPE);
        let range = parse_media_range(&line)?;

        self.supported
            .iter()
            .find(|supported| supported.eq_ignore_ascii_case(range.mime.essence_str()))
            .map(|supported| NegotiatedValue {
                value: supported.clone(),
                attributes: range.params,
            })
    }

    fn supported_media_types(&self) -> &[String] {
        &self.supported
    }
}
