//! Outbound events and the sink the engine publishes them through.
//!
//! The engine holds exactly one [`EventSink`] for its whole lifetime and
//! calls it synchronously, once per emission, with no buffering or retry.
//! Hosts that need several listeners wrap them in a [`Broadcast`], which is
//! itself a sink.
//!
//! On the wire every event is an envelope
//! `{"event_type": "mkrbox_...", "payload": {...}}`.

use serde::{Deserialize, Serialize};

use crate::state::{InputRequest, LevelResult, Plan, SimState};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// An event published by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum Event {
    /// Full snapshot, sent after every state mutation.
    #[serde(rename = "mkrbox_state_update")]
    StateUpdate { state: SimState },
    /// A line of chat from the simulator.
    #[serde(rename = "mkrbox_chat_response")]
    ChatResponse { text: String },
    #[serde(rename = "mkrbox_plan_proposed")]
    PlanProposed(Plan),
    #[serde(rename = "mkrbox_request_inputs")]
    RequestInputs(InputRequest),
    /// Terminal event of a completed run.
    #[serde(rename = "mkrbox_level_result")]
    LevelResult(LevelResult),
}

/// Discriminant tag for event types, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateUpdate,
    ChatResponse,
    PlanProposed,
    RequestInputs,
    LevelResult,
}

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StateUpdate { .. } => EventKind::StateUpdate,
            Event::ChatResponse { .. } => EventKind::ChatResponse,
            Event::PlanProposed(_) => EventKind::PlanProposed,
            Event::RequestInputs(_) => EventKind::RequestInputs,
            Event::LevelResult(_) => EventKind::LevelResult,
        }
    }

    /// Wire name carried in the envelope's `event_type`.
    pub fn event_type(&self) -> &'static str {
        self.kind().event_type()
    }

    /// Encode as a JSON envelope string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a JSON envelope string.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub(crate) fn state(state: &SimState) -> Self {
        Event::StateUpdate {
            state: state.clone(),
        }
    }

    pub(crate) fn chat(text: impl Into<String>) -> Self {
        Event::ChatResponse { text: text.into() }
    }
}

impl EventKind {
    /// Wire name carried in the envelope's `event_type`.
    pub fn event_type(self) -> &'static str {
        match self {
            EventKind::StateUpdate => "mkrbox_state_update",
            EventKind::ChatResponse => "mkrbox_chat_response",
            EventKind::PlanProposed => "mkrbox_plan_proposed",
            EventKind::RequestInputs => "mkrbox_request_inputs",
            EventKind::LevelResult => "mkrbox_level_result",
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver of engine events. Implemented for every `FnMut(Event)`.
pub trait EventSink {
    fn emit(&mut self, event: Event);
}

impl<F: FnMut(Event)> EventSink for F {
    fn emit(&mut self, event: Event) {
        self(event)
    }
}

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

struct Subscriber {
    sink: Box<dyn EventSink>,
    filter: Option<EventFilter>,
}

/// Explicit fan-out list. Subscribers receive events in the order they were
/// added; each gets its own clone.
#[derive(Default)]
pub struct Broadcast {
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for Broadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcast")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Broadcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber that sees every event.
    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.subscribers.push(Subscriber {
            sink: Box::new(sink),
            filter: None,
        });
    }

    /// Add a subscriber that only sees events of the given kinds.
    pub fn subscribe_to(&mut self, kinds: &[EventKind], sink: impl EventSink + 'static) {
        let kinds = kinds.to_vec();
        self.subscribers.push(Subscriber {
            sink: Box::new(sink),
            filter: Some(Box::new(move |event: &Event| kinds.contains(&event.kind()))),
        });
    }

    /// Add a subscriber with an arbitrary filter.
    pub fn subscribe_filtered(&mut self, filter: EventFilter, sink: impl EventSink + 'static) {
        self.subscribers.push(Subscriber {
            sink: Box::new(sink),
            filter: Some(filter),
        });
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl EventSink for Broadcast {
    fn emit(&mut self, event: Event) {
        for sub in &mut self.subscribers {
            if sub.filter.as_ref().is_none_or(|f| f(&event)) {
                sub.sink.emit(event.clone());
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ItemQty, Phase};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn shared_log() -> (Rc<RefCell<Vec<Event>>>, impl FnMut(Event)) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink_log = Rc::clone(&log);
        (log, move |e| sink_log.borrow_mut().push(e))
    }

    // -----------------------------------------------------------------------
    // Wire format
    // -----------------------------------------------------------------------

    #[test]
    fn chat_envelope_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&Event::chat("Sim connected.").to_json().unwrap()).unwrap();
        assert_eq!(json["event_type"], "mkrbox_chat_response");
        assert_eq!(json["payload"]["text"], "Sim connected.");
    }

    #[test]
    fn state_update_envelope_nests_state() {
        let state = SimState::baseline("level01-boot", 5, 1.0);
        let json = serde_json::to_value(Event::state(&state)).unwrap();
        assert_eq!(json["event_type"], "mkrbox_state_update");
        assert_eq!(json["payload"]["state"]["phase"], "IDLE");
    }

    #[test]
    fn request_inputs_payload_is_flat() {
        let event = Event::RequestInputs(InputRequest {
            reason: "need stuff".into(),
            blocking: true,
            items: vec![ItemQty::new("wooden-blank", 6)],
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["blocking"], true);
        assert_eq!(json["payload"]["items"][0]["id"], "wooden-blank");
        assert_eq!(json["payload"]["items"][0]["qty"], 6);
    }

    #[test]
    fn event_type_matches_serialized_tag() {
        let events = [
            Event::chat("x"),
            Event::state(&SimState::baseline("l", 1, 1.0)),
            Event::LevelResult(LevelResult {
                success: true,
                score: 92,
                breakdown: Default::default(),
            }),
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event_type"], event.event_type());
        }
    }

    #[test]
    fn from_json_reads_host_side() {
        let text = r#"{"event_type":"mkrbox_level_result","payload":{"success":true,"score":92,"breakdown":{}}}"#;
        match Event::from_json(text).unwrap() {
            Event::LevelResult(result) => {
                assert!(result.success);
                assert_eq!(result.score, 92);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Sinks
    // -----------------------------------------------------------------------

    #[test]
    fn closure_is_a_sink() {
        let (log, mut sink) = shared_log();
        sink.emit(Event::chat("hi"));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn broadcast_delivers_in_subscription_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut bus = Broadcast::new();
        for name in ["first", "second"] {
            let order = Rc::clone(&order);
            bus.subscribe(move |_e: Event| order.borrow_mut().push(name));
        }

        bus.emit(Event::chat("x"));
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn broadcast_filters_by_kind() {
        let (all, all_sink) = shared_log();
        let (states, state_sink) = shared_log();
        let mut bus = Broadcast::new();
        bus.subscribe(all_sink);
        bus.subscribe_to(&[EventKind::StateUpdate], state_sink);

        bus.emit(Event::chat("x"));
        bus.emit(Event::state(
            &SimState::baseline("l", 5, 1.0).with_phase(Phase::Running, true),
        ));

        assert_eq!(all.borrow().len(), 2);
        assert_eq!(states.borrow().len(), 1);
        assert_eq!(states.borrow()[0].kind(), EventKind::StateUpdate);
    }

    #[test]
    fn empty_broadcast_drops_events() {
        let mut bus = Broadcast::new();
        assert!(bus.is_empty());
        bus.emit(Event::chat("nobody listening"));
    }
}
