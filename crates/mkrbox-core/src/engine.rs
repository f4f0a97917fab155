//! The mock simulator engine: owns the simulation state and the timer
//! registry, and runs the phase state machine.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A [`SimState`], replaced wholesale on every mutation
//! - A [`TimerRegistry`] holding every deferred transition
//! - Exactly one [`EventSink`], given at construction
//!
//! Commands are handled synchronously by [`Engine::handle_message`]. Anything
//! they defer fires later from [`Engine::advance`], which walks the virtual
//! clock forward and interprets due timers one at a time. Nothing else
//! mutates the engine, so at most one transition is ever in flight.
//!
//! # Transitions
//!
//! ```text
//! IDLE -> PLANNING -> WAITING_FOR_INPUTS -> ASSEMBLING -> CALIBRATING
//!      -> RUNNING -> OUTPUT_FULL
//! ```
//!
//! `mkrbox_set_level` resets to `IDLE` from anywhere and
//! `mkrbox_emergency_stop` moves anywhere to `ERROR`. No command is guarded
//! by the current phase.

use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::config::{ConfigError, EngineConfig};
use crate::event::{Event, EventSink};
use crate::run::CLOCK_INTERVAL;
use crate::state::{Phase, SimState};
use crate::timer::{Millis, TimerRegistry};
use crate::wire::Envelope;

// ---------------------------------------------------------------------------
// Timer actions
// ---------------------------------------------------------------------------

/// Deferred work the engine schedules on its own timer registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    /// Publish the plan and input request for a chat request.
    ProposePlan { text: String },
    /// Move from assembly to calibration.
    Calibrate,
    /// Start the production-run driver.
    StartRun,
    /// Advance `simTime` by one second.
    ClockTick,
    /// Put one more unit in the output bay.
    OutputTick,
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of an `Engine::advance()` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Number of timers that fired.
    pub timers_fired: u64,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The mock simulator. Generic over its single event sink.
pub struct Engine<S> {
    pub(crate) config: EngineConfig,
    pub(crate) state: SimState,
    pub(crate) timers: TimerRegistry<TimerAction>,
    sink: S,
    /// Plans proposed so far; numbers plan ids.
    plans_issued: u64,
}

impl<S> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("timers", &self.timers)
            .field("plans_issued", &self.plans_issued)
            .finish_non_exhaustive()
    }
}

impl<S: EventSink> Engine<S> {
    /// Create an engine with the stock configuration.
    pub fn new(sink: S) -> Self {
        Self::build(EngineConfig::default(), sink)
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(config: EngineConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, sink))
    }

    fn build(config: EngineConfig, sink: S) -> Self {
        let state = Self::baseline_for(&config, config.default_level_id());
        Self {
            config,
            state,
            timers: TimerRegistry::new(),
            sink,
            plans_issued: 0,
        }
    }

    fn baseline_for(config: &EngineConfig, level_id: &str) -> SimState {
        SimState::baseline(level_id, config.output_capacity, config.timewarp)
    }

    // -----------------------------------------------------------------------
    // Host surface
    // -----------------------------------------------------------------------

    /// Greet the host and publish the current state.
    pub fn connect(&mut self) {
        debug!(level = %self.state.level_id, "host connected");
        self.emit(Event::chat("Mock sim online."));
        self.emit_state();
    }

    /// Handle one inbound command.
    pub fn handle_message(&mut self, command: Command) {
        debug!(event_type = command.event_type(), phase = %self.state.phase, "command");
        match command {
            Command::Connect => {
                self.emit(Event::chat("Sim connected."));
                self.emit_state();
            }
            Command::SetLevel { level_id } => self.load_level(level_id),
            Command::ChatRequest { text } => {
                self.set_phase(Phase::Planning, false);
                self.timers
                    .schedule(TimerAction::ProposePlan { text }, self.config.plan_delay_ms);
            }
            Command::SupplyInputs { items } => {
                debug!(items = items.len(), "inputs supplied");
                self.set_phase(Phase::Assembling, false);
                self.timers
                    .schedule(TimerAction::Calibrate, self.config.calibrate_delay_ms);
                self.timers
                    .schedule(TimerAction::StartRun, self.config.run_delay_ms);
            }
            Command::EmergencyStop => {
                self.timers.cancel_all();
                self.timers.stop_interval(CLOCK_INTERVAL);
                self.set_phase(Phase::Error, false);
                self.emit(Event::chat("E-stop triggered."));
            }
        }
    }

    /// Decode and handle a raw envelope. Malformed or unknown envelopes are
    /// dropped without emitting anything.
    pub fn handle_envelope(&mut self, envelope: &Envelope) {
        match envelope.decode() {
            Ok(command) => self.handle_message(command),
            Err(e) => trace!(error = %e, "ignoring inbound envelope"),
        }
    }

    /// Decode and handle envelope text. Same permissiveness as
    /// [`Engine::handle_envelope`].
    pub fn handle_json(&mut self, text: &str) {
        match Envelope::from_json(text) {
            Ok(envelope) => self.handle_envelope(&envelope),
            Err(e) => trace!(error = %e, "ignoring inbound text"),
        }
    }

    /// Cancel every outstanding timer. Idempotent.
    pub fn dispose(&mut self) {
        let pending = self.timers.pending_count();
        self.timers.cancel_all();
        debug!(pending, "engine disposed");
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Move the virtual clock forward by `dt` ms, firing every timer that
    /// falls due on the way.
    pub fn advance(&mut self, dt: Millis) -> AdvanceResult {
        let target = self.timers.now().saturating_add(dt);
        self.advance_to(target)
    }

    /// Move the virtual clock to `target` (never backwards), firing every
    /// timer that falls due on the way.
    pub fn advance_to(&mut self, target: Millis) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        while let Some(fired) = self.timers.pop_due(target) {
            trace!(at = fired.at, action = ?fired.action, "timer fired");
            result.timers_fired += 1;
            self.fire(fired.action);
        }
        self.timers.advance_clock(target);
        result
    }

    fn fire(&mut self, action: TimerAction) {
        match action {
            TimerAction::ProposePlan { text } => self.propose_plan(&text),
            TimerAction::Calibrate => self.set_phase(Phase::Calibrating, false),
            TimerAction::StartRun => self.start_run(),
            TimerAction::ClockTick => self.clock_tick(),
            TimerAction::OutputTick => self.output_tick(),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Copy of the current state.
    pub fn state(&self) -> SimState {
        self.state.clone()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Current virtual time.
    pub fn now(&self) -> Millis {
        self.timers.now()
    }

    /// Virtual time of the next timer, if any is pending.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.timers.next_deadline()
    }

    /// Outstanding one-shots plus running intervals.
    pub fn pending_timers(&self) -> usize {
        self.timers.pending_count()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Access the sink, e.g. to inspect a recorder in tests.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn load_level(&mut self, level_id: String) {
        self.timers.cancel_all();
        if !self.config.levels.contains(&level_id) {
            warn!(level = %level_id, "loading level outside the catalog");
        }
        let state = Self::baseline_for(&self.config, &level_id);
        self.replace_state(state);
        self.emit(Event::chat(format!("Loaded {level_id}.")));
    }

    fn propose_plan(&mut self, text: &str) {
        self.plans_issued += 1;
        let plan = self.config.plan.plan(format!("plan-{}", self.plans_issued));
        let request = self.config.plan.input_request();
        debug!(plan_id = %plan.plan_id, steps = plan.steps.len(), "plan proposed");

        self.emit(Event::PlanProposed(plan));
        self.emit(Event::RequestInputs(request));
        self.emit(Event::chat(format!(
            "Received: \"{text}\". Proposed a plan and requested inputs."
        )));
        self.set_phase(Phase::WaitingForInputs, false);
    }

    pub(crate) fn set_phase(&mut self, phase: Phase, stable: bool) {
        debug!(from = %self.state.phase, to = %phase, stable, "phase transition");
        let state = self.state.with_phase(phase, stable);
        self.replace_state(state);
    }

    /// Swap in a new state and push a snapshot of it.
    pub(crate) fn replace_state(&mut self, state: SimState) {
        self.state = state;
        self.emit_state();
    }

    fn emit_state(&mut self) {
        let event = Event::state(&self.state);
        self.emit(event);
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.sink.emit(event);
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::state::ItemQty;
    use crate::test_utils::*;

    // -----------------------------------------------------------------------
    // connect
    // -----------------------------------------------------------------------

    #[test]
    fn connect_greets_then_publishes_idle_state() {
        let (mut engine, log) = recording_engine();
        engine.connect();

        let events = log.take();
        assert_eq!(events.len(), 2);
        assert_eq!(chat_texts(&events), vec!["Mock sim online."]);
        assert_eq!(phases(&events), vec![Phase::Idle]);
        assert_eq!(events[0].kind(), EventKind::ChatResponse);
    }

    #[test]
    fn connect_command_uses_its_own_greeting() {
        let (mut engine, log) = recording_engine();
        engine.handle_message(Command::Connect);

        let events = log.take();
        assert_eq!(chat_texts(&events), vec!["Sim connected."]);
        assert_eq!(phases(&events), vec![Phase::Idle]);
    }

    // -----------------------------------------------------------------------
    // set_level
    // -----------------------------------------------------------------------

    #[test]
    fn set_level_resets_and_confirms() {
        let (mut engine, log) = recording_engine();
        engine.handle_message(Command::chat("make cups"));
        engine.handle_message(Command::set_level("level02-sensors"));

        let events = log.take();
        let last_state = last_state(&events).unwrap();
        assert_eq!(last_state.level_id, "level02-sensors");
        assert_eq!(last_state.phase, Phase::Idle);
        assert!(last_state.stable);
        assert_eq!(
            chat_texts(&events).last().copied(),
            Some("Loaded level02-sensors.")
        );
        assert_eq!(engine.pending_timers(), 0);
    }

    #[test]
    fn set_level_accepts_unknown_ids() {
        let (mut engine, log) = recording_engine();
        engine.handle_message(Command::set_level("level99-custom"));
        assert_eq!(engine.state().level_id, "level99-custom");
        assert_eq!(chat_texts(&log.take()), vec!["Loaded level99-custom."]);
    }

    // -----------------------------------------------------------------------
    // chat_request
    // -----------------------------------------------------------------------

    #[test]
    fn chat_request_plans_after_delay() {
        let (mut engine, log) = recording_engine();
        engine.handle_message(Command::chat("make cups"));
        assert_eq!(phases(&log.take()), vec![Phase::Planning]);
        assert!(!engine.state().stable);

        engine.advance(599);
        assert!(log.take().is_empty());

        engine.advance(1);
        let events = log.take();
        let kinds: Vec<EventKind> = events.iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::PlanProposed,
                EventKind::RequestInputs,
                EventKind::ChatResponse,
                EventKind::StateUpdate,
            ]
        );
        assert_eq!(
            chat_texts(&events),
            vec!["Received: \"make cups\". Proposed a plan and requested inputs."]
        );
        assert_eq!(engine.phase(), Phase::WaitingForInputs);
    }

    #[test]
    fn plan_ids_are_sequential() {
        let (mut engine, log) = recording_engine();
        engine.handle_message(Command::chat("a"));
        engine.advance(600);
        engine.handle_message(Command::chat("b"));
        engine.advance(600);

        let ids: Vec<String> = log
            .take()
            .into_iter()
            .filter_map(|e| match e {
                Event::PlanProposed(p) => Some(p.plan_id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["plan-1", "plan-2"]);
    }

    // -----------------------------------------------------------------------
    // supply_inputs
    // -----------------------------------------------------------------------

    #[test]
    fn supply_inputs_assembles_calibrates_then_runs() {
        let (mut engine, log) = recording_engine();
        engine.handle_message(Command::supply([ItemQty::new("wooden-blank", 6)]));
        assert_eq!(phases(&log.take()), vec![Phase::Assembling]);

        engine.advance(1_200);
        assert_eq!(phases(&log.take()), vec![Phase::Calibrating]);

        engine.advance(1_200);
        let events = log.take();
        assert_eq!(phases(&events), vec![Phase::Running]);
        assert!(last_state(&events).unwrap().stable);
        assert!(engine.timers.is_interval_running(CLOCK_INTERVAL));
    }

    #[test]
    fn equal_delays_still_calibrate_before_running() {
        let config = EngineConfig {
            calibrate_delay_ms: 500,
            run_delay_ms: 500,
            ..EngineConfig::default()
        };
        let (mut engine, log) = recording_engine_with(config);
        engine.handle_message(Command::supply([]));
        engine.advance(500);

        assert_eq!(
            phases(&log.take()),
            vec![Phase::Assembling, Phase::Calibrating, Phase::Running]
        );
        assert!(engine.state().stable);
    }

    #[test]
    fn supply_inputs_is_accepted_in_any_phase() {
        let (mut engine, _log) = recording_engine();
        engine.handle_message(Command::EmergencyStop);
        engine.handle_message(Command::supply([]));
        assert_eq!(engine.phase(), Phase::Assembling);
    }

    // -----------------------------------------------------------------------
    // emergency_stop
    // -----------------------------------------------------------------------

    #[test]
    fn emergency_stop_cancels_pending_work() {
        let (mut engine, log) = recording_engine();
        engine.handle_message(Command::chat("make cups"));
        engine.handle_message(Command::EmergencyStop);
        log.take();

        assert_eq!(engine.phase(), Phase::Error);
        assert!(!engine.state().stable);
        assert_eq!(engine.pending_timers(), 0);

        engine.advance(60_000);
        assert!(log.take().is_empty());
    }

    #[test]
    fn emergency_stop_notifies_after_state() {
        let (mut engine, log) = recording_engine();
        engine.handle_message(Command::EmergencyStop);
        let events = log.take();
        assert_eq!(events[0].kind(), EventKind::StateUpdate);
        assert_eq!(chat_texts(&events), vec!["E-stop triggered."]);
    }

    // -----------------------------------------------------------------------
    // Permissiveness
    // -----------------------------------------------------------------------

    #[test]
    fn malformed_and_unknown_input_is_ignored() {
        let (mut engine, log) = recording_engine();
        engine.handle_json("");
        engine.handle_json("{}");
        engine.handle_json(r#"{"event_type":"mkrbox_warp_drive"}"#);
        engine.handle_json(r#"{"event_type":"mkrbox_set_level"}"#);
        engine.handle_envelope(&Envelope::default());

        assert!(log.take().is_empty());
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn loosely_shaped_payloads_still_drive_the_machine() {
        let supplies = [
            r#"{"event_type":"mkrbox_supply_inputs","payload":{"items":[{"id":"wooden-blank","qty":"6"}]}}"#,
            r#"{"event_type":"mkrbox_supply_inputs","payload":{"items":[{"id":"wooden-blank","qty":1.5}]}}"#,
            r#"{"event_type":"mkrbox_supply_inputs","payload":{"items":"not a list"}}"#,
        ];
        for text in supplies {
            let (mut engine, log) = recording_engine();
            engine.handle_json(text);
            assert_eq!(phases(&log.take()), vec![Phase::Assembling], "{text}");
            assert_eq!(engine.pending_timers(), 2);
        }

        let (mut engine, log) = recording_engine();
        engine.handle_json(r#"{"event_type":"mkrbox_chat_request","payload":{"text":42}}"#);
        assert_eq!(phases(&log.take()), vec![Phase::Planning]);
        engine.advance(600);
        assert_eq!(
            chat_texts(&log.take()),
            vec!["Received: \"42\". Proposed a plan and requested inputs."]
        );
    }

    #[test]
    fn json_commands_reach_the_state_machine() {
        let (mut engine, _log) = recording_engine();
        engine.handle_json(r#"{"event_type":"mkrbox_chat_request","payload":{"text":"hi"}}"#);
        assert_eq!(engine.phase(), Phase::Planning);
    }

    // -----------------------------------------------------------------------
    // dispose / config
    // -----------------------------------------------------------------------

    #[test]
    fn dispose_is_idempotent() {
        let (mut engine, log) = recording_engine();
        engine.handle_message(Command::supply([]));
        engine.dispose();
        engine.dispose();
        assert_eq!(engine.pending_timers(), 0);

        log.take();
        engine.advance(100_000);
        assert!(log.take().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            clock_period_ms: 0,
            ..EngineConfig::default()
        };
        assert!(Engine::with_config(config, |_e: Event| {}).is_err());
    }

    #[test]
    fn state_copy_is_detached() {
        let (engine, _log) = recording_engine();
        let mut copy = engine.state();
        copy.output_bay.count = 4;
        copy.phase = Phase::Error;
        assert_eq!(engine.state().output_bay.count, 0);
        assert_eq!(engine.phase(), Phase::Idle);
    }
}
