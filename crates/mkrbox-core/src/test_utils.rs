//! Shared test helpers for unit tests, integration tests, and downstream
//! crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::event::{Event, EventSink};
use crate::state::{InputRequest, LevelResult, Phase, Plan, SimState};

// ===========================================================================
// Recording sink
// ===========================================================================

/// Event sink that records into a shared list. Clones share the list.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: Event) {
        self.0.borrow_mut().push(event);
    }
}

// ===========================================================================
// Engine constructors
// ===========================================================================

/// Engine with the stock config and a recorder attached.
pub fn recording_engine() -> (Engine<EventLog>, EventLog) {
    let log = EventLog::new();
    (Engine::new(log.clone()), log)
}

/// Engine with a custom config and a recorder attached.
///
/// # Panics
///
/// Panics if the config is invalid.
pub fn recording_engine_with(config: EngineConfig) -> (Engine<EventLog>, EventLog) {
    let log = EventLog::new();
    let engine = Engine::with_config(config, log.clone()).expect("valid test config");
    (engine, log)
}

// ===========================================================================
// Event filters
// ===========================================================================

pub fn state_updates(events: &[Event]) -> impl Iterator<Item = &SimState> {
    events.iter().filter_map(|e| match e {
        Event::StateUpdate { state } => Some(state),
        _ => None,
    })
}

/// Phases of every state update, in order.
pub fn phases(events: &[Event]) -> Vec<Phase> {
    state_updates(events).map(|s| s.phase).collect()
}

pub fn last_state(events: &[Event]) -> Option<&SimState> {
    state_updates(events).last()
}

pub fn chat_texts(events: &[Event]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ChatResponse { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

pub fn plans(events: &[Event]) -> Vec<&Plan> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::PlanProposed(plan) => Some(plan),
            _ => None,
        })
        .collect()
}

pub fn input_requests(events: &[Event]) -> Vec<&InputRequest> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::RequestInputs(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn level_results(events: &[Event]) -> Vec<&LevelResult> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::LevelResult(result) => Some(result),
            _ => None,
        })
        .collect()
}

/// Drive a fresh recording engine from IDLE to RUNNING through the happy
/// path. Returns with the log cleared.
pub fn engine_in_running() -> (Engine<EventLog>, EventLog) {
    use crate::command::Command;

    let (mut engine, log) = recording_engine();
    engine.connect();
    engine.handle_message(Command::chat("make cups"));
    engine.advance(engine.config().plan_delay_ms);
    let items = engine.config().plan.items.clone();
    engine.handle_message(Command::supply(items));
    engine.advance(engine.config().run_delay_ms);
    log.take();
    (engine, log)
}
