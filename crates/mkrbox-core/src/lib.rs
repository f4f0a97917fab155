//! MKRBOX Core -- the mock factory-simulator engine.
//!
//! This crate provides the timer-driven phase state machine a MKRBOX host
//! chats with, together with the state snapshot, event, and command types
//! that cross the host boundary.
//!
//! # Production Run
//!
//! A run walks through the following phases:
//!
//! 1. **Planning** -- a chat request is answered with a plan and an input
//!    request after a short delay.
//! 2. **Waiting for inputs** -- the host supplies the requested items.
//! 3. **Assembling / Calibrating** -- timed transitions after supply.
//! 4. **Running** -- the simulated clock and the output counter tick
//!    independently.
//! 5. **Output full** -- the bay reaches capacity, every timer is torn down
//!    and a level result is published.
//!
//! An emergency stop moves any phase to `ERROR`; loading a level resets to
//! `IDLE`.
//!
//! # Time
//!
//! The engine never sleeps. Deferred transitions live in a
//! [`timer::TimerRegistry`] on a virtual millisecond clock, advanced by the
//! host through [`engine::Engine::advance`]. Tests drive it directly; the
//! `mkrbox-runtime` crate maps wall-clock time onto it.
//!
//! ```rust,ignore
//! let mut engine = Engine::new(|event: Event| println!("{}", event.event_type()));
//! engine.connect();
//! engine.handle_message(Command::chat("make cups"));
//! engine.advance(600);
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- state machine, owner of state and timers.
//! - [`state::SimState`] -- immutable-per-update snapshot pushed to the host.
//! - [`event::Event`] / [`event::EventSink`] -- outbound events and their sink.
//! - [`command::Command`] / [`wire::Envelope`] -- inbound commands and their
//!   permissive wire decoding.
//! - [`session::Session`] -- headless host-side mirror of the event stream.

pub mod command;
pub mod config;
pub mod engine;
pub mod event;
pub mod level;
pub mod run;
pub mod session;
pub mod state;
pub mod timer;
pub mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
