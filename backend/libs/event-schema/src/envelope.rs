use crate::error::ProtocolError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Frame envelope used in both directions: `{type, data, timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    /// Epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

impl Envelope {
    /// Wrap a serializable payload, stamped with the current time
    pub fn new<T: Serialize>(kind: impl Into<String>, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: kind.into(),
            data: serde_json::to_value(data)?,
            timestamp: crate::now_millis(),
        })
    }

    /// Parse a raw text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    /// Decode `data` as the payload for this envelope's type
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.data.clone()).map_err(|source| ProtocolError::InvalidPayload {
            kind: self.kind.clone(),
            source,
        })
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
