//! Forwards engine telemetry to the log.
//!
//! The frame engine queues typed records; the frame task drains them after
//! each step and hands them to [`TelemetryForwarder`], which renders one line
//! per record and mirrors it to defmt (target) or stdout (host builds).

use core::fmt::Write as _;

use heapless::String;
use ppm_core::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecord};
use ppm_core::timing::CycleInstant;

/// Longest rendered record.
pub const LINE_CAPACITY: usize = 96;

const MICROS_PER_SECOND: u32 = 1_000_000;

/// Renders and logs engine telemetry, tracking queue drops.
pub struct TelemetryForwarder {
    clock_hz: u32,
    forwarded: u32,
    reported_drops: u32,
}

impl TelemetryForwarder {
    pub const fn new(clock_hz: u32) -> Self {
        Self {
            clock_hz,
            forwarded: 0,
            reported_drops: 0,
        }
    }

    pub const fn forwarded(&self) -> u32 {
        self.forwarded
    }

    /// Logs every record and warns once per batch if the engine queue overflowed.
    pub fn forward<R>(&mut self, records: R, dropped: u32)
    where
        R: IntoIterator<Item = TelemetryRecord<CycleInstant>>,
    {
        for record in records {
            let line = self.render(&record);
            emit_log(record.event, line.as_str());
            self.forwarded = self.forwarded.wrapping_add(1);
        }

        if dropped != self.reported_drops {
            emit_drops(dropped.wrapping_sub(self.reported_drops));
            self.reported_drops = dropped;
        }
    }

    /// One-line description of a record with its timestamp in microseconds.
    pub fn render(&self, record: &TelemetryRecord<CycleInstant>) -> String<LINE_CAPACITY> {
        let mut line = String::new();
        let micros = record.timestamp.to_ticks(MICROS_PER_SECOND, self.clock_hz);
        // Truncation is acceptable for log output.
        let _ = write!(line, "#{} {} t={}us", record.id, record.event, micros);
        let _ = write_details(&mut line, &record.details);
        line
    }
}

fn write_details(line: &mut String<LINE_CAPACITY>, details: &TelemetryPayload) -> core::fmt::Result {
    match details {
        TelemetryPayload::None => Ok(()),
        TelemetryPayload::Overrun(overrun) => write!(
            line,
            " frame={} late={}cyc skipped={}",
            overrun.frame, overrun.lateness, overrun.skipped
        ),
        TelemetryPayload::Config(issue) => write!(line, " {issue}"),
        TelemetryPayload::Edge(state) => write!(line, " state={state}"),
        TelemetryPayload::Sweep(sweep) => write!(
            line,
            " epoch={} start={} every={} frames",
            sweep.epoch, sweep.start, sweep.interval_frames
        ),
        TelemetryPayload::Timing {
            cycles_per_frame,
            rounding_remainder,
        } => write!(
            line,
            " period={cycles_per_frame}cyc remainder={rounding_remainder}cyc/s"
        ),
    }
}

const fn is_fault(event: TelemetryEventKind) -> bool {
    matches!(
        event,
        TelemetryEventKind::FrameOverrun
            | TelemetryEventKind::SlotsSkipped
            | TelemetryEventKind::GeneratorStall
            | TelemetryEventKind::ConfigClamped
    )
}

#[cfg(target_os = "none")]
fn emit_log(event: TelemetryEventKind, line: &str) {
    if is_fault(event) {
        defmt::warn!("telemetry: {}", line);
    } else {
        defmt::info!("telemetry: {}", line);
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(event: TelemetryEventKind, line: &str) {
    if is_fault(event) {
        println!("telemetry: WARN {line}");
    } else {
        println!("telemetry: {line}");
    }
}

#[cfg(target_os = "none")]
fn emit_drops(count: u32) {
    defmt::warn!("telemetry: {} records dropped", count);
}

#[cfg(not(target_os = "none"))]
fn emit_drops(count: u32) {
    println!("telemetry: WARN {count} records dropped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppm_core::telemetry::{OverrunTelemetry, SweepTelemetry};
    use ppm_core::timing::Code;

    fn record(event: TelemetryEventKind, details: TelemetryPayload) -> TelemetryRecord<CycleInstant> {
        TelemetryRecord {
            id: 7,
            timestamp: CycleInstant::from_cycles(133_000),
            event,
            details,
        }
    }

    #[test]
    fn renders_overrun_with_timestamp() {
        let forwarder = TelemetryForwarder::new(133_000_000);
        let line = forwarder.render(&record(
            TelemetryEventKind::FrameOverrun,
            TelemetryPayload::Overrun(OverrunTelemetry {
                frame: 12,
                lateness: 300,
                skipped: 0,
            }),
        ));

        assert_eq!(
            line.as_str(),
            "#7 frame-overrun t=1000us frame=12 late=300cyc skipped=0"
        );
    }

    #[test]
    fn renders_sweep_and_timing_payloads() {
        let forwarder = TelemetryForwarder::new(133_000_000);
        let sweep = forwarder.render(&record(
            TelemetryEventKind::SweepRestarted,
            TelemetryPayload::Sweep(SweepTelemetry {
                epoch: 2,
                start: Code::ZERO,
                interval_frames: 528,
            }),
        ));
        assert!(sweep.ends_with("epoch=2 start=0 every=528 frames"));

        let started = forwarder.render(&record(
            TelemetryEventKind::EngineStarted,
            TelemetryPayload::Timing {
                cycles_per_frame: 2770,
                rounding_remainder: 40_000,
            },
        ));
        assert!(started.ends_with("period=2770cyc remainder=40000cyc/s"));
    }

    #[test]
    fn forward_counts_records_and_tracks_drops() {
        let mut forwarder = TelemetryForwarder::new(133_000_000);
        let batch = [
            record(TelemetryEventKind::EngineStarted, TelemetryPayload::None),
            record(TelemetryEventKind::SpuriousEdge, TelemetryPayload::Edge("frame-idle")),
        ];

        forwarder.forward(batch, 3);
        assert_eq!(forwarder.forwarded(), 2);
        assert_eq!(forwarder.reported_drops, 3);

        forwarder.forward([], 3);
        assert_eq!(forwarder.reported_drops, 3);
    }

    #[test]
    fn faults_are_flagged() {
        assert!(is_fault(TelemetryEventKind::GeneratorStall));
        assert!(!is_fault(TelemetryEventKind::SweepRestarted));
    }
}
