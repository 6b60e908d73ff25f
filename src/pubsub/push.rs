use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("push message carries no data")]
    MissingData,
    #[error("message data is not valid base64")]
    InvalidEncoding,
    #[error("message data is not a JSON object: {0}")]
    InvalidJson(String),
    #[error("offset `{0}` is not a non-negative integer")]
    InvalidOffset(String),
    #[error("offset {0} leaves no room for a continuation")]
    OffsetOutOfRange(u64),
}

/// Body of a Pub/Sub push delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, rename = "messageId")]
    pub message_id: Option<String>,
}

/// Decoded trigger message. The offset arrives either as a number or, when
/// written by a previous run, as a numeric string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerPayload {
    #[serde(default)]
    pub offset: Option<RawOffset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOffset {
    Number(u64),
    Text(String),
    /// Negative, fractional or non-scalar; rejected by `offset()`.
    Other(serde_json::Value),
}

impl TriggerPayload {
    pub fn offset(&self) -> Result<u64, TriggerError> {
        let offset = match &self.offset {
            None => return Ok(0),
            Some(RawOffset::Number(value)) => *value,
            Some(RawOffset::Text(text)) => text
                .trim()
                .parse::<u64>()
                .map_err(|_| TriggerError::InvalidOffset(text.clone()))?,
            Some(RawOffset::Other(value)) => {
                return Err(TriggerError::InvalidOffset(value.to_string()));
            }
        };
        if offset == u64::MAX {
            return Err(TriggerError::OffsetOutOfRange(offset));
        }
        Ok(offset)
    }
}

impl PushEnvelope {
    /// Key identifying this delivery across redeliveries.
    pub fn delivery_key(&self) -> Option<String> {
        let id = self.message.message_id.as_deref()?.trim();
        if id.is_empty() {
            return None;
        }
        let subscription = self.subscription.as_deref().unwrap_or("direct");
        Some(format!("sync:delivery:{subscription}:{id}"))
    }
}

pub fn decode_offset(data: Option<&str>) -> Result<u64, TriggerError> {
    let encoded = data
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(TriggerError::MissingData)?;
    let raw = BASE64
        .decode(encoded)
        .map_err(|_| TriggerError::InvalidEncoding)?;
    let payload: TriggerPayload =
        serde_json::from_slice(&raw).map_err(|err| TriggerError::InvalidJson(err.to_string()))?;
    payload.offset()
}
