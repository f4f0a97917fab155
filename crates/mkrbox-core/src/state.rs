//! Simulation state snapshot and the transient payloads the engine emits.
//!
//! [`SimState`] is a value type. The engine replaces it wholesale on every
//! mutation through the `with_*` builders and hands out clones, so nothing a
//! host does with a received snapshot can reach back into the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The named stage of the simulated production process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Host-side placeholder before the engine exists. The engine never
    /// enters this phase itself.
    Disconnected,
    Idle,
    Planning,
    WaitingForInputs,
    Assembling,
    Calibrating,
    Running,
    OutputFull,
    Error,
}

impl Phase {
    /// Wire name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Disconnected => "DISCONNECTED",
            Phase::Idle => "IDLE",
            Phase::Planning => "PLANNING",
            Phase::WaitingForInputs => "WAITING_FOR_INPUTS",
            Phase::Assembling => "ASSEMBLING",
            Phase::Calibrating => "CALIBRATING",
            Phase::Running => "RUNNING",
            Phase::OutputFull => "OUTPUT_FULL",
            Phase::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Finished units collected during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBay {
    pub count: u32,
    pub capacity: u32,
}

impl OutputBay {
    /// Whether the bay has reached capacity.
    pub fn is_full(&self) -> bool {
        self.count >= self.capacity
    }
}

/// Simulated clock as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimTime {
    /// Seconds of simulated time since the clock first started.
    pub sim_time: u64,
    /// Display multiplier. Carried, never varied by the engine.
    pub timewarp: f64,
}

/// Complete snapshot of the simulation, pushed to the host after every
/// mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimState {
    pub phase: Phase,
    pub level_id: String,
    pub stable: bool,
    pub output_bay: OutputBay,
    pub time: SimTime,
}

impl SimState {
    /// Baseline state for a freshly loaded level.
    pub fn baseline(level_id: impl Into<String>, capacity: u32, timewarp: f64) -> Self {
        Self {
            phase: Phase::Idle,
            level_id: level_id.into(),
            stable: true,
            output_bay: OutputBay { count: 0, capacity },
            time: SimTime {
                sim_time: 0,
                timewarp,
            },
        }
    }

    /// What a host shows before any engine exists.
    pub fn disconnected(level_id: impl Into<String>, capacity: u32) -> Self {
        Self {
            phase: Phase::Disconnected,
            stable: false,
            ..Self::baseline(level_id, capacity, 1.0)
        }
    }

    /// Same state with a new phase and stability flag.
    pub fn with_phase(&self, phase: Phase, stable: bool) -> Self {
        Self {
            phase,
            stable,
            ..self.clone()
        }
    }

    /// Same state with the simulated clock one second further on.
    pub fn with_clock_tick(&self) -> Self {
        Self {
            time: SimTime {
                sim_time: self.time.sim_time + 1,
                ..self.time
            },
            ..self.clone()
        }
    }

    /// Same state with one more unit in the output bay, saturating at
    /// capacity.
    pub fn with_unit_produced(&self) -> Self {
        let count = (self.output_bay.count + 1).min(self.output_bay.capacity);
        Self {
            output_bay: OutputBay {
                count,
                ..self.output_bay
            },
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Transient payloads
// ---------------------------------------------------------------------------

/// An ordered list of steps proposed in answer to a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub plan_id: String,
    pub summary: String,
    pub steps: Vec<String>,
}

/// A named quantity of some resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQty {
    pub id: String,
    pub qty: u32,
}

impl ItemQty {
    pub fn new(id: impl Into<String>, qty: u32) -> Self {
        Self { id: id.into(), qty }
    }
}

/// A request for resources the run needs before it can proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRequest {
    pub reason: String,
    pub blocking: bool,
    pub items: Vec<ItemQty>,
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    pub success: bool,
    pub score: u32,
    #[serde(default)]
    pub breakdown: BTreeMap<String, serde_json::Value>,
}

// ===========================================================================
// Tests
// ===========================================================================
