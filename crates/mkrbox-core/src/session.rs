//! Headless mirror of what a host keeps from the event stream.
//!
//! A [`Session`] folds engine events into the latest state, plan, input
//! request, and a chat transcript, and builds the commands a host sends in
//! response to operator actions. It holds copies only; nothing here touches
//! engine internals.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::config::DEFAULT_LEVEL_ID;
use crate::event::Event;
use crate::state::{InputRequest, LevelResult, Plan, SimState};

/// Opening line of every transcript.
pub const WELCOME: &str = "MKRBOX ready. Type a goal like \u{201c}make cups\u{201d}.";

/// Who said a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub state: SimState,
    pub transcript: Vec<ChatLine>,
    pub plan: Option<Plan>,
    pub input_request: Option<InputRequest>,
    pub last_result: Option<LevelResult>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session that has not heard from any engine yet.
    pub fn new() -> Self {
        Self {
            state: SimState::disconnected(DEFAULT_LEVEL_ID, 5),
            transcript: vec![ChatLine {
                role: Role::System,
                text: WELCOME.to_string(),
            }],
            plan: None,
            input_request: None,
            last_result: None,
        }
    }

    fn push(&mut self, role: Role, text: impl Into<String>) {
        self.transcript.push(ChatLine {
            role,
            text: text.into(),
        });
    }

    /// Fold one engine event into the session.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::StateUpdate { state } => self.state = state.clone(),
            Event::ChatResponse { text } => self.push(Role::System, text.clone()),
            Event::PlanProposed(plan) => self.plan = Some(plan.clone()),
            Event::RequestInputs(request) => self.input_request = Some(request.clone()),
            Event::LevelResult(result) => {
                self.push(Role::System, format!("Level complete. Score: {}", result.score));
                self.last_result = Some(result.clone());
            }
        }
    }

    /// Record an operator chat line and build the request for it. Blank
    /// input produces nothing.
    pub fn chat(&mut self, text: &str) -> Option<Command> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.push(Role::User, text);
        Some(Command::chat(text))
    }

    /// Hand over exactly what the pending input request asked for.
    pub fn supply_requested_inputs(&mut self) -> Option<Command> {
        let request = self.input_request.take()?;
        Some(Command::SupplyInputs {
            items: request.items,
        })
    }

    /// Switch levels, forgetting any plan or input request.
    pub fn select_level(&mut self, level_id: &str) -> Command {
        self.plan = None;
        self.input_request = None;
        Command::set_level(level_id)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ItemQty, Phase};
    use crate::test_utils::*;

    #[test]
    fn fresh_session_is_disconnected_with_welcome() {
        let session = Session::new();
        assert_eq!(session.state.phase, Phase::Disconnected);
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript[0].role, Role::System);
    }

    #[test]
    fn blank_chat_is_dropped() {
        let mut session = Session::new();
        assert_eq!(session.chat("   "), None);
        assert_eq!(session.transcript.len(), 1);
    }

    #[test]
    fn chat_trims_and_records_user_line() {
        let mut session = Session::new();
        assert_eq!(session.chat("  make cups "), Some(Command::chat("make cups")));
        assert_eq!(session.transcript.last().unwrap().role, Role::User);
        assert_eq!(session.transcript.last().unwrap().text, "make cups");
    }

    #[test]
    fn supply_echoes_request_once() {
        let mut session = Session::new();
        assert_eq!(session.supply_requested_inputs(), None);

        session.apply(&Event::RequestInputs(InputRequest {
            reason: "r".into(),
            blocking: true,
            items: vec![ItemQty::new("spindle-tool", 1)],
        }));
        assert_eq!(
            session.supply_requested_inputs(),
            Some(Command::supply([ItemQty::new("spindle-tool", 1)]))
        );
        assert_eq!(session.supply_requested_inputs(), None);
    }

    #[test]
    fn follows_an_engine_through_a_full_run() {
        let (mut engine, log) = recording_engine();
        let mut session = Session::new();
        let pump = |session: &mut Session| {
            for event in log.take() {
                session.apply(&event);
            }
        };

        engine.connect();
        pump(&mut session);
        assert_eq!(session.state.phase, Phase::Idle);

        let cmd = session.chat("make cups").unwrap();
        engine.handle_message(cmd);
        engine.advance(600);
        pump(&mut session);
        assert!(session.plan.is_some());
        assert_eq!(session.state.phase, Phase::WaitingForInputs);

        let cmd = session.supply_requested_inputs().unwrap();
        engine.handle_message(cmd);
        engine.advance(2_400 + 5 * 2_200);
        pump(&mut session);

        assert_eq!(session.state.phase, Phase::OutputFull);
        assert_eq!(session.last_result.as_ref().unwrap().score, 92);
        assert_eq!(
            session.transcript.last().unwrap().text,
            "Level complete. Score: 92"
        );
    }

    #[test]
    fn select_level_clears_plan_and_request() {
        let mut session = Session::new();
        session.plan = Some(Plan {
            plan_id: "plan-1".into(),
            summary: String::new(),
            steps: Vec::new(),
        });
        let cmd = session.select_level("level03-toolchange");
        assert_eq!(cmd, Command::set_level("level03-toolchange"));
        assert!(session.plan.is_none());
        assert!(session.input_request.is_none());
    }
}
