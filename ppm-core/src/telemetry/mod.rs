//! Engine telemetry shared by firmware and host targets.
//!
//! The engine never logs directly. It queues typed records that the platform
//! drains and forwards to defmt (firmware) or the console and transcript
//! (emulator). Event kinds map to compact numeric codes so they can travel
//! over narrow diagnostics channels.

use core::fmt;

use heapless::Deque;

use crate::timing::{Code, ConfigIssue, CycleCount};

/// Identifier assigned to each telemetry record.
pub type EventId = u32;

/// Default number of records buffered between drains.
pub const TELEMETRY_QUEUE_CAPACITY: usize = 16;

/// Discriminated telemetry events emitted by the frame engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    EngineStarted,
    EngineStopped,
    FrameOverrun,
    SlotsSkipped,
    SpuriousEdge,
    ConfigClamped,
    SweepRestarted,
    GeneratorStall,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::EngineStarted => f.write_str("engine-started"),
            TelemetryEventKind::EngineStopped => f.write_str("engine-stopped"),
            TelemetryEventKind::FrameOverrun => f.write_str("frame-overrun"),
            TelemetryEventKind::SlotsSkipped => f.write_str("slots-skipped"),
            TelemetryEventKind::SpuriousEdge => f.write_str("spurious-edge"),
            TelemetryEventKind::ConfigClamped => f.write_str("config-clamped"),
            TelemetryEventKind::SweepRestarted => f.write_str("sweep-restarted"),
            TelemetryEventKind::GeneratorStall => f.write_str("generator-stall"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const ENGINE_STARTED_CODE: u16 = 0x0001;
    const ENGINE_STOPPED_CODE: u16 = 0x0002;
    const FRAME_OVERRUN_CODE: u16 = 0x0010;
    const SLOTS_SKIPPED_CODE: u16 = 0x0011;
    const GENERATOR_STALL_CODE: u16 = 0x0012;
    const SPURIOUS_EDGE_CODE: u16 = 0x0020;
    const CONFIG_CLAMPED_CODE: u16 = 0x0030;
    const SWEEP_RESTARTED_CODE: u16 = 0x0040;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::EngineStarted => Self::ENGINE_STARTED_CODE,
            TelemetryEventKind::EngineStopped => Self::ENGINE_STOPPED_CODE,
            TelemetryEventKind::FrameOverrun => Self::FRAME_OVERRUN_CODE,
            TelemetryEventKind::SlotsSkipped => Self::SLOTS_SKIPPED_CODE,
            TelemetryEventKind::GeneratorStall => Self::GENERATOR_STALL_CODE,
            TelemetryEventKind::SpuriousEdge => Self::SPURIOUS_EDGE_CODE,
            TelemetryEventKind::ConfigClamped => Self::CONFIG_CLAMPED_CODE,
            TelemetryEventKind::SweepRestarted => Self::SWEEP_RESTARTED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        match code {
            Self::ENGINE_STARTED_CODE => TelemetryEventKind::EngineStarted,
            Self::ENGINE_STOPPED_CODE => TelemetryEventKind::EngineStopped,
            Self::FRAME_OVERRUN_CODE => TelemetryEventKind::FrameOverrun,
            Self::SLOTS_SKIPPED_CODE => TelemetryEventKind::SlotsSkipped,
            Self::GENERATOR_STALL_CODE => TelemetryEventKind::GeneratorStall,
            Self::SPURIOUS_EDGE_CODE => TelemetryEventKind::SpuriousEdge,
            Self::CONFIG_CLAMPED_CODE => TelemetryEventKind::ConfigClamped,
            Self::SWEEP_RESTARTED_CODE => TelemetryEventKind::SweepRestarted,
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryPayload {
    None,
    Overrun(OverrunTelemetry),
    Config(ConfigIssue),
    /// Handshake state the spurious notification arrived in.
    Edge(&'static str),
    Sweep(SweepTelemetry),
    /// Frame period and per-second rounding remainder at start-up.
    Timing {
        cycles_per_frame: CycleCount,
        rounding_remainder: u32,
    },
}

impl TelemetryPayload {
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Details of a late frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OverrunTelemetry {
    pub frame: u32,
    pub lateness: u64,
    pub skipped: u32,
}

/// Sweep restart details.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SweepTelemetry {
    pub epoch: u32,
    pub start: Code,
    pub interval_frames: u32,
}

/// Telemetry record stored in the queue.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord<I> {
    pub id: EventId,
    pub timestamp: I,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Bounded FIFO of telemetry; when full, the oldest record is dropped.
pub struct TelemetryQueue<I, const CAPACITY: usize = TELEMETRY_QUEUE_CAPACITY> {
    records: Deque<TelemetryRecord<I>, CAPACITY>,
    next_event_id: EventId,
    dropped: u32,
}

impl<I: Copy, const CAPACITY: usize> TelemetryQueue<I, CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Deque::new(),
            next_event_id: 0,
            dropped: 0,
        }
    }

    /// Queues an event and returns its identifier.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        details: TelemetryPayload,
        timestamp: I,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        let record = TelemetryRecord {
            id,
            timestamp,
            event,
            details,
        };
        if let Err(record) = self.records.push_back(record) {
            self.records.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            let _ = self.records.push_back(record);
        }
        id
    }

    /// Pops the oldest pending record.
    pub fn pop(&mut self) -> Option<TelemetryRecord<I>> {
        self.records.pop_front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records lost to overflow since creation.
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<I: Copy, const CAPACITY: usize> Default for TelemetryQueue<I, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_round_trip_known_events() {
        for kind in [
            TelemetryEventKind::EngineStarted,
            TelemetryEventKind::FrameOverrun,
            TelemetryEventKind::SpuriousEdge,
            TelemetryEventKind::SweepRestarted,
        ] {
            assert_eq!(TelemetryEventKind::from_raw(kind.to_raw()), kind);
        }
        assert_eq!(
            TelemetryEventKind::from_raw(0x7777),
            TelemetryEventKind::Custom(0x7777)
        );
    }

    #[test]
    fn full_queue_drops_oldest() {
        let mut queue: TelemetryQueue<u64, 2> = TelemetryQueue::new();
        queue.record(TelemetryEventKind::EngineStarted, TelemetryPayload::none(), 1);
        queue.record(TelemetryEventKind::FrameOverrun, TelemetryPayload::none(), 2);
        let id = queue.record(TelemetryEventKind::EngineStopped, TelemetryPayload::none(), 3);

        assert_eq!(id, 2);
        assert_eq!(queue.dropped(), 1);
        let first = queue.pop().expect("record");
        assert_eq!(first.event, TelemetryEventKind::FrameOverrun);
        assert_eq!(first.timestamp, 2);
        assert_eq!(queue.len(), 1);
    }
}
