//! Line-oriented host: one JSON command envelope per input line, one JSON
//! event envelope per output line.
//!
//! Input lines are forwarded verbatim to the engine, which drops anything it
//! cannot decode. Lines that are not UTF-8 never reach it and are skipped
//! here. When input ends, events keep flowing until the engine has no
//! pending timers.

use std::time::Duration;

use mkrbox_core::event::Event;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{RuntimeError, SimHandle};

/// How often to re-check for pending timers once input has ended.
const QUIET_POLL: Duration = Duration::from_millis(250);

/// Serve `input` against the engine behind `handle`, writing events to
/// `output`, then shut the engine down.
///
/// Events already emitted are written out before any error is returned.
pub async fn serve_lines<R, W>(
    handle: SimHandle,
    mut events: mpsc::UnboundedReceiver<Event>,
    mut input: R,
    output: &mut W,
) -> Result<(), RuntimeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let served = match forward_lines(&handle, &mut events, &mut input, output).await {
        Ok(()) => {
            info!("input closed, waiting for pending timers");
            drain_until_quiet(&handle, &mut events, output).await
        }
        Err(e) => {
            // A snapshot round trip guarantees every forwarded command has
            // been handled before the backlog is written.
            if let Err(sync_err) = handle.snapshot().await {
                warn!(error = %sync_err, "engine gone while flushing events");
            }
            if let Err(write_err) = write_pending(&mut events, output).await {
                warn!(error = %write_err, "could not flush pending events");
            }
            Err(e)
        }
    };
    let shutdown = handle.shutdown().await;
    served.and(shutdown)
}

/// Strip the line terminator and decode. `None` for non-UTF-8 input.
fn decode_line(raw: &[u8]) -> Option<&str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    match std::str::from_utf8(raw) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!(error = %e, bytes = raw.len(), "skipping non-UTF-8 input line");
            None
        }
    }
}

async fn forward_lines<R, W>(
    handle: &SimHandle,
    events: &mut mpsc::UnboundedReceiver<Event>,
    input: &mut R,
    output: &mut W,
) -> Result<(), RuntimeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Partial reads stay in `buf` if the event branch wins the select.
    let mut buf = Vec::new();
    loop {
        tokio::select! {
            read = input.read_until(b'\n', &mut buf) => {
                if read? == 0 && buf.is_empty() {
                    return Ok(());
                }
                match decode_line(&buf) {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => handle.send_json(line)?,
                    None => {}
                }
                buf.clear();
            }
            Some(event) = events.recv() => write_event(output, &event).await?,
        }
    }
}

/// Wait until the engine has nothing left to fire, echoing events meanwhile.
async fn drain_until_quiet<W: AsyncWrite + Unpin>(
    handle: &SimHandle,
    events: &mut mpsc::UnboundedReceiver<Event>,
    output: &mut W,
) -> Result<(), RuntimeError> {
    loop {
        write_pending(events, output).await?;
        let snapshot = handle.snapshot().await?;
        if snapshot.pending_timers == 0 {
            debug!(now = snapshot.now, "engine quiet");
            break;
        }
        tokio::select! {
            Some(event) = events.recv() => write_event(output, &event).await?,
            _ = tokio::time::sleep(QUIET_POLL) => {}
        }
    }
    write_pending(events, output).await
}

async fn write_pending<W: AsyncWrite + Unpin>(
    events: &mut mpsc::UnboundedReceiver<Event>,
    output: &mut W,
) -> Result<(), RuntimeError> {
    while let Ok(event) = events.try_recv() {
        write_event(output, &event).await?;
    }
    Ok(())
}

async fn write_event<W: AsyncWrite + Unpin>(
    output: &mut W,
    event: &Event,
) -> Result<(), RuntimeError> {
    let mut line = event.to_json()?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_line_strips_terminators() {
        assert_eq!(decode_line(b"abc\n"), Some("abc"));
        assert_eq!(decode_line(b"abc\r\n"), Some("abc"));
        assert_eq!(decode_line(b"abc"), Some("abc"));
        assert_eq!(decode_line(b"\n"), Some(""));
    }

    #[test]
    fn decode_line_rejects_non_utf8() {
        assert_eq!(decode_line(b"\xff\xfe\n"), None);
    }
}
