//! Engine configuration: timings, run parameters, levels, and the scripted
//! planner reply.
//!
//! [`EngineConfig::default`] reproduces the stock mock exactly. Every field
//! is `#[serde(default)]`, so a config file only needs the values it
//! changes.

use serde::{Deserialize, Serialize};

use crate::level::LevelCatalog;
use crate::state::{InputRequest, ItemQty, Plan};
use crate::timer::Millis;

// ===========================================================================
// Errors
// ===========================================================================

/// A configuration value the engine cannot run with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("level catalog is empty")]
    NoLevels,

    #[error("duplicate level id '{0}'")]
    DuplicateLevel(String),

    #[error("timewarp must be a positive finite number, got {0}")]
    BadTimewarp(f64),

    /// Calibration would land after the run has already started.
    #[error("calibrate_delay_ms ({calibrate_ms}) must not exceed run_delay_ms ({run_ms})")]
    DelayOrder { calibrate_ms: Millis, run_ms: Millis },
}

// ===========================================================================
// Plan template
// ===========================================================================

/// Scripted answer to every chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanTemplate {
    pub summary: String,
    pub steps: Vec<String>,
    pub reason: String,
    pub items: Vec<ItemQty>,
}

impl Default for PlanTemplate {
    fn default() -> Self {
        Self {
            summary: "Plan to produce cups using the baseline toolchain.".to_string(),
            steps: vec![
                "Mount clamp module".to_string(),
                "Calibrate spindle".to_string(),
                "Run production loop".to_string(),
            ],
            reason: "Missing inputs for plan execution".to_string(),
            items: vec![
                ItemQty::new("wooden-blank", 6),
                ItemQty::new("clamp-module", 1),
                ItemQty::new("spindle-tool", 1),
            ],
        }
    }
}

impl PlanTemplate {
    pub fn plan(&self, plan_id: String) -> Plan {
        Plan {
            plan_id,
            summary: self.summary.clone(),
            steps: self.steps.clone(),
        }
    }

    pub fn input_request(&self) -> InputRequest {
        InputRequest {
            reason: self.reason.clone(),
            blocking: true,
            items: self.items.clone(),
        }
    }
}

// ===========================================================================
// EngineConfig
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between a chat request and the proposed plan.
    pub plan_delay_ms: Millis,
    /// Delay between supplying inputs and calibration.
    pub calibrate_delay_ms: Millis,
    /// Delay between supplying inputs and the start of the run.
    pub run_delay_ms: Millis,
    /// Period of the simulated clock (one `simTime` second per tick).
    pub clock_period_ms: Millis,
    /// Period of the output counter.
    pub output_period_ms: Millis,
    pub output_capacity: u32,
    pub timewarp: f64,
    /// Score reported when the output bay fills.
    pub success_score: u32,
    pub levels: LevelCatalog,
    pub plan: PlanTemplate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plan_delay_ms: 600,
            calibrate_delay_ms: 1_200,
            run_delay_ms: 2_400,
            clock_period_ms: 1_000,
            output_period_ms: 2_200,
            output_capacity: 5,
            timewarp: 1.0,
            success_score: 92,
            levels: LevelCatalog::default(),
            plan: PlanTemplate::default(),
        }
    }
}

impl EngineConfig {
    /// Check the values the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("clock_period_ms", self.clock_period_ms),
            ("output_period_ms", self.output_period_ms),
            ("output_capacity", u64::from(self.output_capacity)),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::ZeroValue { field });
            }
        }
        // Equal delays are fine: Calibrate is scheduled first and fires first.
        if self.calibrate_delay_ms > self.run_delay_ms {
            return Err(ConfigError::DelayOrder {
                calibrate_ms: self.calibrate_delay_ms,
                run_ms: self.run_delay_ms,
            });
        }
        if !(self.timewarp.is_finite() && self.timewarp > 0.0) {
            return Err(ConfigError::BadTimewarp(self.timewarp));
        }
        if self.levels.is_empty() {
            return Err(ConfigError::NoLevels);
        }
        if let Some(id) = self.levels.first_duplicate() {
            return Err(ConfigError::DuplicateLevel(id.to_string()));
        }
        Ok(())
    }

    /// Id of the level a fresh engine starts on.
    pub fn default_level_id(&self) -> &str {
        self.levels
            .default_level()
            .map(|l| l.id.as_str())
            .unwrap_or(DEFAULT_LEVEL_ID)
    }
}

/// Level used when a catalog is empty.
pub const DEFAULT_LEVEL_ID: &str = "level01-boot";

// ===========================================================================
// Tests
// ===========================================================================
