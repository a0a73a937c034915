//! Media-type keyed serialization
//!
//! Values are first normalized through `serde` into a [`serde_json::Value`]
//! (object key order is preserved), then handed to the [`Encoder`] registered
//! for the requested media type.

use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::negotiation::essence;

/// Opaque encoder options passed through from the caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerializationContext {
    attributes: Map<String, Value>,
}

impl SerializationContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Turns a normalized value into bytes for one family of media types
pub trait Encoder: Send + Sync {
    /// Whether this encoder can produce the given media type essence
    fn accepts(&self, media_type: &str) -> bool;

    /// Encode a normalized value
    fn encode(
        &self,
        value: &Value,
        media_type: &str,
        context: Option<&SerializationContext>,
    ) -> Result<Bytes>;
}

/// JSON encoder for `application/json` and every `+json` structured suffix
///
/// Set the context attribute `pretty` to `true` for indented output.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn accepts(&self, media_type: &str) -> bool {
        media_type == "application/json" || media_type.ends_with("+json")
    }

    fn encode(
        &self,
        value: &Value,
        _media_type: &str,
        context: Option<&SerializationContext>,
    ) -> Result<Bytes> {
        let pretty = context
            .and_then(|ctx| ctx.attribute("pretty"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let encoded = if pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(Bytes::from(encoded))
    }
}

/// Registry of encoders, consulted in registration order
#[derive(Clone)]
pub struct Serializer {
    encoders: Vec<Arc<dyn Encoder>>,
}

impl Serializer {
    /// A serializer with no encoders at all
    pub fn empty() -> Self {
        Self {
            encoders: Vec::new(),
        }
    }

    /// Register an additional encoder. Earlier registrations win.
    #[must_use]
    pub fn with_encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoders.push(Arc::new(encoder));
        self
    }

    /// Whether some encoder can produce the given media type
    pub fn supports(&self, media_type: &str) -> bool {
        let essence = essence(media_type);
        self.encoders.iter().any(|e| e.accepts(&essence))
    }

    /// Serialize any value into the given media type
    pub fn serialize<T>(
        &self,
        value: &T,
        media_type: &str,
        context: Option<&SerializationContext>,
    ) -> Result<Bytes>
    where
        T: Serialize + ?Sized,
    {
        let essence = essence(media_type);
        let encoder = self
            .encoders
            .iter()
            .find(|e| e.accepts(&essence))
            .ok_or_else(|| Error::UnsupportedMediaType(media_type.to_string()))?;

        let normalized = serde_json::to_value(value)?;
        encoder.encode(&normalized, &essence, context)
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::empty().with_encoder(JsonEncoder)
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("encoders", &self.encoders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Pet {
        name: String,
        tag: Option<String>,
    }

    struct PlainText;

    impl Encoder for PlainText {
        fn accepts(&self, media_type: &str) -> bool {
            media_type == "text/plain"
        }

        fn encode(
            &self,
            value: &Value,
            _media_type: &str,
            _context: Option<&SerializationContext>,
        ) -> Result<Bytes> {
            Ok(Bytes::from(value.to_string()))
        }
    }

    #[test]
    fn test_json_encoding() {
        let pet = Pet {
            name: "Rex".to_string(),
            tag: None,
        };
        let bytes = Serializer::default()
            .serialize(&pet, "application/json", None)
            .unwrap();
        assert_eq!(&bytes[..], br#"{"name":"Rex","tag":null}"#);
    }

    #[test]
    fn test_json_suffix_and_parameters() {
        let serializer = Serializer::default();
        assert!(serializer.supports("application/problem+json"));
        assert!(serializer.supports("application/vnd.api+json; charset=utf-8"));
        assert!(serializer.supports("Application/JSON"));
        assert!(!serializer.supports("application/xml"));
    }

    #[test]
    fn test_pretty_context() {
        let context = SerializationContext::new().with_attribute("pretty", true);
        let bytes = Serializer::default()
            .serialize(&json!({"a": 1}), "application/json", Some(&context))
            .unwrap();
        assert_eq!(&bytes[..], b"{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_unsupported_media_type() {
        let err = Serializer::default()
            .serialize(&json!({}), "application/xml", None)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(ref t) if t == "application/xml"));
    }

    #[test]
    fn test_custom_encoder() {
        let serializer = Serializer::empty().with_encoder(PlainText);
        let bytes = serializer.serialize(&"hi", "text/plain", None).unwrap();
        assert_eq!(&bytes[..], b"\"hi\"");
        assert!(!serializer.supports("application/json"));
    }
}
