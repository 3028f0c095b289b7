use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AlarmError, Result};

/// Schema capability for opaque task payloads.
///
/// Schedule calls run [`parse`](PayloadParser::parse) before anything is
/// written, so a bad payload fails fast with
/// [`AlarmError::Validation`] and never reaches the store. The dispatcher
/// uses [`safe_parse`](PayloadParser::safe_parse) when reading records back,
/// a best-effort read that cannot abort a wake.
pub trait PayloadParser: Send + Sync {
    type Payload: Send;

    fn parse(&self, raw: &Value) -> Result<Self::Payload>;

    /// Non-throwing variant of [`parse`](PayloadParser::parse).
    fn safe_parse(&self, raw: &Value) -> Option<Self::Payload> {
        self.parse(raw).ok()
    }
}

/// Parser that accepts any value deserializable into `T`.
///
/// The usual choice: define the payload as a serde struct and let the
/// derive do the schema work.
pub struct SerdeParser<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeParser<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PayloadParser for SerdeParser<T>
where
    T: DeserializeOwned + Send,
{
    type Payload = T;

    fn parse(&self, raw: &Value) -> Result<T> {
        serde_json::from_value(raw.clone()).map_err(|e| AlarmError::Validation(e.to_string()))
    }
}
