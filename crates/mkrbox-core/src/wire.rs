//! Permissive decoding of inbound `{event_type, payload}` envelopes.
//!
//! Hosts hand the engine loosely shaped JSON. Decoding is lenient about
//! optional payload fields and strict only where a command cannot mean
//! anything without the field (`levelId`). Every failure is a
//! [`DecodeError`]; the engine logs and drops those rather than surfacing
//! them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::command::{self, Command};
use crate::state::ItemQty;

// ===========================================================================
// Errors
// ===========================================================================

/// Reasons an inbound envelope could not become a [`Command`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The text was not JSON, or not an object.
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope had no string `event_type`.
    #[error("envelope has no event_type")]
    MissingEventType,

    /// The `event_type` names no known command.
    #[error("unknown event_type '{0}'")]
    UnknownEventType(String),

    /// The payload did not fit the command.
    #[error("bad payload for {event_type}: {detail}")]
    Payload {
        event_type: &'static str,
        detail: String,
    },
}

// ===========================================================================
// Envelope
// ===========================================================================

/// Raw inbound envelope before the payload is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Parse envelope text. Non-string `event_type` values are treated as
    /// missing.
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    /// Build from an already parsed JSON value.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };
        let event_type = match map.remove("event_type") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        Self {
            event_type,
            payload: map.remove("payload").unwrap_or(Value::Null),
        }
    }

    /// Interpret the envelope as a command.
    pub fn decode(&self) -> Result<Command, DecodeError> {
        let event_type = self
            .event_type
            .as_deref()
            .ok_or(DecodeError::MissingEventType)?;

        match event_type {
            command::CONNECT => Ok(Command::Connect),
            command::EMERGENCY_STOP => Ok(Command::EmergencyStop),
            command::SET_LEVEL => {
                let p: SetLevelPayload = self.payload_as(command::SET_LEVEL)?;
                Ok(Command::SetLevel {
                    level_id: p.level_id,
                })
            }
            command::CHAT_REQUEST => {
                let p: ChatPayload = self.payload_as(command::CHAT_REQUEST)?;
                Ok(Command::ChatRequest { text: p.text })
            }
            command::SUPPLY_INPUTS => {
                let p: SupplyPayload = self.payload_as(command::SUPPLY_INPUTS)?;
                Ok(Command::SupplyInputs { items: p.items })
            }
            other => Err(DecodeError::UnknownEventType(other.to_string())),
        }
    }

    fn payload_as<T: serde::de::DeserializeOwned>(
        &self,
        event_type: &'static str,
    ) -> Result<T, DecodeError> {
        // A missing or non-object payload reads as an empty object so
        // defaulted fields still apply.
        let payload = match &self.payload {
            Value::Object(_) => self.payload.clone(),
            _ => Value::Object(Default::default()),
        };
        serde_json::from_value(payload).map_err(|e| DecodeError::Payload {
            event_type,
            detail: e.to_string(),
        })
    }
}

impl From<&Command> for Envelope {
    fn from(cmd: &Command) -> Self {
        // Serializing a command into a JSON value cannot fail: every field is
        // a string, integer, or list thereof.
        let value = serde_json::to_value(cmd).unwrap_or(Value::Null);
        Self::from_value(value)
    }
}

/// Decode envelope text straight to a command.
pub fn decode_command(text: &str) -> Result<Command, DecodeError> {
    Envelope::from_json(text)?.decode()
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SetLevelPayload {
    #[serde(rename = "levelId")]
    level_id: String,
}

#[derive(Deserialize)]
struct ChatPayload {
    #[serde(default, deserialize_with = "lenient_text")]
    text: String,
}

#[derive(Deserialize)]
struct SupplyPayload {
    #[serde(default, deserialize_with = "lenient_items")]
    items: Vec<ItemQty>,
}

/// Strings pass through, `null` is empty, anything else becomes its JSON
/// text.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Keeps every well-formed entry and drops the rest. A non-list reads as
/// no items.
fn lenient_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ItemQty>, D::Error> {
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        trace!("supplied items are not a list");
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| match ItemQty::deserialize(&entry) {
            Ok(item) => Some(item),
            Err(e) => {
                trace!(error = %e, %entry, "dropping malformed supplied item");
                None
            }
        })
        .collect())
}

// ===========================================================================
// Tests
// ===========================================================================
