//! Real-time driver for the MKRBOX engine.
//!
//! [`spawn_engine`] moves an [`Engine`] into a tokio task that owns it
//! exclusively. Hosts talk to the task through a [`SimHandle`] and read
//! events from an unbounded channel. The task maps elapsed tokio time onto
//! the engine's virtual clock: before every request, and whenever the next
//! engine deadline passes, it advances the engine to "now". Commands and
//! timer firings are therefore serialized through one owner.
//!
//! Because only `tokio::time` is consulted, the driver runs under paused
//! time (`#[tokio::test(start_paused = true)]`) as deterministically as the
//! bare engine does.

use std::time::Duration;

use mkrbox_core::command::Command;
use mkrbox_core::config::{ConfigError, EngineConfig};
use mkrbox_core::engine::Engine;
use mkrbox_core::event::{Event, EventSink};
use mkrbox_core::state::SimState;
use mkrbox_core::timer::Millis;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

pub mod host;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The engine task has stopped and can take no more requests.
    #[error("engine task is no longer running")]
    Closed,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] mkrbox_data::DataLoadError),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Requests
// ===========================================================================

/// What the engine task reports when asked.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: SimState,
    /// Virtual time of the engine.
    pub now: Millis,
    pub pending_timers: usize,
}

#[derive(Debug)]
enum Request {
    Connect,
    Command(Command),
    Json(String),
    Dispose,
    Snapshot(oneshot::Sender<Snapshot>),
}

// ===========================================================================
// SimHandle
// ===========================================================================

/// Host-side handle to a running engine task. Dropping every handle stops
/// the task after it disposes the engine.
#[derive(Debug)]
pub struct SimHandle {
    requests: mpsc::UnboundedSender<Request>,
    task: JoinHandle<()>,
}

impl SimHandle {
    fn send_request(&self, request: Request) -> Result<(), RuntimeError> {
        self.requests.send(request).map_err(|_| RuntimeError::Closed)
    }

    /// Ask for the greeting and the current state.
    pub fn connect(&self) -> Result<(), RuntimeError> {
        self.send_request(Request::Connect)
    }

    pub fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.send_request(Request::Command(command))
    }

    /// Forward raw envelope text. Malformed text is dropped by the engine.
    pub fn send_json(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        self.send_request(Request::Json(text.into()))
    }

    /// Cancel every pending engine timer. The task keeps running.
    pub fn dispose(&self) -> Result<(), RuntimeError> {
        self.send_request(Request::Dispose)
    }

    /// Current state, virtual time, and pending timer count.
    pub async fn snapshot(&self) -> Result<Snapshot, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send_request(Request::Snapshot(tx))?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        let Self { requests, task } = self;
        drop(requests);
        task.await.map_err(|_| RuntimeError::Closed)
    }
}

// ===========================================================================
// Spawning
// ===========================================================================

/// Spawn an engine task on the current tokio runtime.
///
/// Returns the handle and the receiving end of the event stream. Events are
/// delivered in emission order; if the receiver is dropped they are
/// discarded.
pub fn spawn_engine(
    config: EngineConfig,
) -> Result<(SimHandle, mpsc::UnboundedReceiver<Event>), RuntimeError> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let sink = move |event: Event| {
        if event_tx.send(event).is_err() {
            trace!("event receiver dropped");
        }
    };
    let engine = Engine::with_config(config, sink)?;

    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(drive(engine, request_rx));
    Ok((
        SimHandle {
            requests: request_tx,
            task,
        },
        event_rx,
    ))
}

fn elapsed_ms(origin: Instant) -> Millis {
    Millis::try_from(origin.elapsed().as_millis()).unwrap_or(Millis::MAX)
}

async fn sleep_until_deadline(origin: Instant, deadline: Option<Millis>) {
    match deadline {
        Some(ms) => tokio::time::sleep_until(origin + Duration::from_millis(ms)).await,
        None => std::future::pending().await,
    }
}

/// Owner loop of the engine task.
async fn drive<S: EventSink>(
    mut engine: Engine<S>,
    mut requests: mpsc::UnboundedReceiver<Request>,
) {
    let origin = Instant::now();
    debug!("engine task started");

    loop {
        let deadline = engine.next_deadline();
        tokio::select! {
            biased;

            _ = sleep_until_deadline(origin, deadline) => {
                engine.advance_to(elapsed_ms(origin));
            }
            request = requests.recv() => {
                // Timers that are already due fire before the request.
                engine.advance_to(elapsed_ms(origin));
                match request {
                    Some(request) => handle(&mut engine, request),
                    None => break,
                }
            }
        }
    }

    engine.dispose();
    debug!("engine task stopped");
}

fn handle<S: EventSink>(engine: &mut Engine<S>, request: Request) {
    match request {
        Request::Connect => engine.connect(),
        Request::Command(command) => engine.handle_message(command),
        Request::Json(text) => engine.handle_json(&text),
        Request::Dispose => engine.dispose(),
        Request::Snapshot(reply) => {
            let snapshot = Snapshot {
                state: engine.state(),
                now: engine.now(),
                pending_timers: engine.pending_timers(),
            };
            if reply.send(snapshot).is_err() {
                trace!("snapshot requester went away");
            }
        }
    }
}
