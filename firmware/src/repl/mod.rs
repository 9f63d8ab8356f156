//! USB console session.
//!
//! Bytes arrive from the CDC interface as [`ReplInput`] frames. The session
//! echoes them, assembles lines with the shared [`LineBuffer`], runs complete
//! lines through the command executor, and queues the echo plus the framed
//! response in an [`Outbox`] that the REPL task flushes back to the host in
//! packet-sized [`ReplFrame`]s.

use core::fmt::{self, Write as _};

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Sender};
use heapless::Vec;
use ppm_core::repl::{CommandExecutor, ControlSurface, Feed, LineBuffer, write_response};
use ppm_core::timing::FrameTiming;

/// Bytes carried by one console frame; matches the CDC packet size.
pub const REPL_FRAME_LEN: usize = 64;

/// Frames buffered in each direction between the USB and REPL tasks.
pub const REPL_QUEUE_DEPTH: usize = 4;

/// Pending host output; large enough for a full echo plus one response.
pub const OUTBOX_LEN: usize = 256;

/// Space kept free before feeding another byte: the longest response is an
/// unrecognised maximum-length line.
const RESPONSE_RESERVE: usize = 128;

#[cfg(target_os = "none")]
type ReplMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ReplMutex = NoopRawMutex;

/// One USB packet worth of console bytes.
pub type ReplFrame = Vec<u8, REPL_FRAME_LEN>;

/// Host-to-device console traffic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReplInput {
    /// Host opened the port and asserted DTR.
    Connected,
    Bytes(ReplFrame),
    /// Host closed the port or the interface was disabled.
    Disconnected,
}

pub type ReplRxQueue = Channel<ReplMutex, ReplInput, REPL_QUEUE_DEPTH>;
pub type ReplTxQueue = Channel<ReplMutex, ReplFrame, REPL_QUEUE_DEPTH>;
pub type ReplTxSender<'a> = Sender<'a, ReplMutex, ReplFrame, REPL_QUEUE_DEPTH>;

/// Output bytes waiting to be sent to the host.
pub struct Outbox {
    pending: Vec<u8, OUTBOX_LEN>,
}

impl Outbox {
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pending
    }

    /// Returns `true` when another byte could overflow the buffer.
    pub fn needs_flush(&self) -> bool {
        OUTBOX_LEN - self.pending.len() < RESPONSE_RESERVE
    }

    /// Splits the pending bytes into packet-sized frames.
    pub fn frames(&self) -> impl Iterator<Item = ReplFrame> + '_ {
        self.pending.chunks(REPL_FRAME_LEN).map(|chunk| {
            let mut frame = ReplFrame::new();
            // Chunks never exceed the frame capacity.
            let _ = frame.extend_from_slice(chunk);
            frame
        })
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn push_byte(&mut self, byte: u8) -> fmt::Result {
        self.pending.push(byte).map_err(|_| fmt::Error)
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for Outbox {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.pending
            .extend_from_slice(s.as_bytes())
            .map_err(|_| fmt::Error)
    }
}

/// Line-oriented console bound to a control surface.
pub struct ReplSession<S> {
    executor: CommandExecutor<S>,
    line: LineBuffer,
    connected: bool,
}

impl<S: ControlSurface> ReplSession<S> {
    pub fn new(executor: CommandExecutor<S>) -> Self {
        Self {
            executor,
            line: LineBuffer::new(),
            connected: false,
        }
    }

    /// Host opened the port: reset the line and greet with the active timing.
    pub fn on_connect(&mut self, timing: &FrameTiming, out: &mut Outbox) -> fmt::Result {
        self.connected = true;
        self.line.clear();
        write!(
            out,
            "PPM encoder ready: {} Hz clock, {} Hz frames, {} cycles per frame, {} cycle gap\r\n",
            timing.clock_frequency_hz,
            timing.sample_rate_hz,
            timing.cycles_per_frame,
            timing.min_gap
        )?;
        if let Some(issue) = timing.issue {
            write!(out, "Timing clamped: {issue}\r\n")?;
        }
        Ok(())
    }

    /// Host closed the port; partial input is dropped.
    pub fn on_disconnect(&mut self) {
        self.connected = false;
        self.line.clear();
    }

    /// Feeds one byte, appending the echo and any command response to `out`.
    pub fn ingest(&mut self, byte: u8, out: &mut Outbox) -> fmt::Result {
        if !self.connected {
            return Ok(());
        }

        match self.line.push(byte) {
            Feed::Stored => out.push_byte(byte),
            Feed::Erased => out.write_str("\x08 \x08"),
            Feed::Ignored => Ok(()),
            Feed::Line(line) => {
                let result = self.executor.execute(line.as_str());
                log_command(line.as_str(), result.is_ok());
                write_response(out, &result)
            }
            Feed::Overflow => out.write_str("\r\nLine too long\r\n"),
            Feed::InvalidUtf8 => out.write_str("\r\nInvalid UTF-8\r\n"),
        }
    }
}

#[cfg(target_os = "none")]
fn log_command(line: &str, accepted: bool) {
    if accepted {
        defmt::info!("repl: {}", line);
    } else {
        defmt::warn!("repl: rejected {}", line);
    }
}

#[cfg(not(target_os = "none"))]
fn log_command(_line: &str, _accepted: bool) {}
