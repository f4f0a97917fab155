//! Inbound commands a host sends to the engine.
//!
//! Commands are handled immediately, in the order they arrive. Anything
//! they defer is scheduled on the engine's timer registry.

use serde::{Deserialize, Serialize};

use crate::state::ItemQty;

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

/// A single command that can be submitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum Command {
    /// Ask for a greeting and the current state.
    #[serde(rename = "mkrbox_connect")]
    Connect,
    /// Cancel everything and reset to the baseline of a level.
    #[serde(rename = "mkrbox_set_level")]
    SetLevel {
        #[serde(rename = "levelId")]
        level_id: String,
    },
    /// Operator chat; starts planning.
    #[serde(rename = "mkrbox_chat_request")]
    ChatRequest { text: String },
    /// Hand over requested inputs; starts assembly.
    #[serde(rename = "mkrbox_supply_inputs")]
    SupplyInputs { items: Vec<ItemQty> },
    /// Abort whatever is in flight and enter the error phase.
    #[serde(rename = "mkrbox_emergency_stop")]
    EmergencyStop,
}

impl Command {
    /// Wire name carried in the envelope's `event_type`.
    pub fn event_type(&self) -> &'static str {
        match self {
            Command::Connect => CONNECT,
            Command::SetLevel { .. } => SET_LEVEL,
            Command::ChatRequest { .. } => CHAT_REQUEST,
            Command::SupplyInputs { .. } => SUPPLY_INPUTS,
            Command::EmergencyStop => EMERGENCY_STOP,
        }
    }

    pub fn set_level(level_id: impl Into<String>) -> Self {
        Command::SetLevel {
            level_id: level_id.into(),
        }
    }

    pub fn chat(text: impl Into<String>) -> Self {
        Command::ChatRequest { text: text.into() }
    }

    pub fn supply(items: impl IntoIterator<Item = ItemQty>) -> Self {
        Command::SupplyInputs {
            items: items.into_iter().collect(),
        }
    }
}

pub const CONNECT: &str = "mkrbox_connect";
pub const SET_LEVEL: &str = "mkrbox_set_level";
pub const CHAT_REQUEST: &str = "mkrbox_chat_request";
pub const SUPPLY_INPUTS: &str = "mkrbox_supply_inputs";
pub const EMERGENCY_STOP: &str = "mkrbox_emergency_stop";

// ===========================================================================
// Tests
// ===========================================================================
