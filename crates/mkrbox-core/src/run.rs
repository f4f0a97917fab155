//! Production-run driver.
//!
//! A run owns two independent intervals: the simulated clock, which adds
//! one second of `simTime` per tick, and the output counter, which puts one
//! unit in the output bay per tick. When the bay fills, every timer is
//! cancelled, the phase becomes `OUTPUT_FULL`, and a level result closes the
//! run.

use tracing::debug;

use crate::engine::{Engine, TimerAction};
use crate::event::{Event, EventSink};
use crate::state::{LevelResult, Phase};

/// Name of the simulated-clock interval.
pub const CLOCK_INTERVAL: &str = "sim-clock";
/// Name of the output-counter interval.
pub const OUTPUT_INTERVAL: &str = "output-counter";

impl<S: EventSink> Engine<S> {
    pub(crate) fn start_run(&mut self) {
        self.set_phase(Phase::Running, true);
        self.timers.start_interval(
            CLOCK_INTERVAL,
            TimerAction::ClockTick,
            self.config.clock_period_ms,
        );
        self.timers.start_interval(
            OUTPUT_INTERVAL,
            TimerAction::OutputTick,
            self.config.output_period_ms,
        );
    }

    pub(crate) fn clock_tick(&mut self) {
        let state = self.state.with_clock_tick();
        self.replace_state(state);
    }

    pub(crate) fn output_tick(&mut self) {
        let state = self.state.with_unit_produced();
        let full = state.output_bay.is_full();
        self.replace_state(state);
        if full {
            self.finish_run();
        }
    }

    fn finish_run(&mut self) {
        self.timers.cancel_all();
        self.set_phase(Phase::OutputFull, true);

        let result = LevelResult {
            success: true,
            score: self.config.success_score,
            breakdown: Default::default(),
        };
        debug!(
            level = %self.state.level_id,
            units = self.state.output_bay.count,
            sim_time = self.state.time.sim_time,
            "run complete"
        );
        self.emit(Event::LevelResult(result));
    }
}

// ===========================================================================
// Tests
// ===========================================================================
