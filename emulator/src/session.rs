use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use ppm_core::control::ControlBlock;
use ppm_core::engine::sim::{run_sequenced, run_triggered};
use ppm_core::engine::{FrameEngine, FrameRecord};
use ppm_core::generator::GeneratorMode;
use ppm_core::generator::sim::SimulatedGenerator;
use ppm_core::repl::CommandExecutor;
use ppm_core::scheduler::Completion;
use ppm_core::telemetry::{TelemetryPayload, TelemetryRecord};
use ppm_core::timing::{CycleInstant, TimingConfig};

/// Upper bound on frames simulated by one `run`/`trace` command.
const MAX_RUN_FRAMES: u32 = 10_000_000;
/// Upper bound on per-frame lines printed by `trace`.
const MAX_TRACE_FRAMES: u32 = 64;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("T", "T | t                 - toggle test mode (sweep restarts at 0)"),
    ("C", "C:<int>               - set the PPM code (clamped to 0..=1024)"),
    ("P", "P:<seconds>           - set the test sweep update period (> 0.010)"),
    ("run", "run <frames>          - simulate frames and summarise the output"),
    ("trace", "trace <frames>        - simulate frames and print each one"),
    ("status", "status                - show timing, control and scheduler state"),
    ("help", "help [topic]          - show help for a command"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Sequenced,
    Triggered,
    Sweep,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Sequenced => "transcripts/emulator-sequenced.log",
            TranscriptProfile::Triggered => "transcripts/emulator-triggered.log",
            TranscriptProfile::Sweep => "transcripts/emulator-sweep.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Sequenced => "PPM emulator transcript (sequenced generator)",
            TranscriptProfile::Triggered => "PPM emulator transcript (triggered generator)",
            TranscriptProfile::Sweep => "PPM emulator transcript (test-mode sweep)",
        }
    }

    pub fn for_mode(mode: GeneratorMode) -> Self {
        match mode {
            GeneratorMode::Sequenced => TranscriptProfile::Sequenced,
            GeneratorMode::Triggered => TranscriptProfile::Triggered,
        }
    }
}

/// Settings chosen on the command line.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    pub mode: GeneratorMode,
    pub timing: TimingConfig,
    pub profile: TranscriptProfile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: GeneratorMode::Sequenced,
            timing: TimingConfig::default(),
            profile: TranscriptProfile::Sequenced,
        }
    }
}

pub struct Session<'c> {
    control: &'c ControlBlock,
    engine: FrameEngine<'c, CycleInstant>,
    generator: SimulatedGenerator,
    executor: CommandExecutor<&'c ControlBlock>,
    mode: GeneratorMode,
    transcript: TranscriptLogger,
    started_at: HostInstant,
}

impl<'c> Session<'c> {
    /// Starts a session on `control`, logging to the profile's transcript file.
    pub fn new(config: SessionConfig, control: &'c ControlBlock) -> io::Result<Self> {
        let transcript = TranscriptLogger::open(config.profile)?;
        Self::with_transcript(config, control, transcript)
    }

    fn with_transcript(
        config: SessionConfig,
        control: &'c ControlBlock,
        transcript: TranscriptLogger,
    ) -> io::Result<Self> {
        let timing = TimingConfig::for_generator::<SimulatedGenerator>(
            config.timing.clock_frequency_hz,
            config.timing.sample_rate_hz,
        )
        .with_min_gap_us(config.timing.min_gap_us);
        let mut engine = FrameEngine::new(&timing, control);
        engine.start(CycleInstant::ZERO);

        let mut session = Self {
            control,
            engine,
            generator: SimulatedGenerator::new(),
            executor: CommandExecutor::new(control),
            mode: config.mode,
            transcript,
            started_at: HostInstant::now(),
        };

        let mut banner = vec![format!(
            "generator={} clock={} Hz rate={} Hz",
            session.mode, config.timing.clock_frequency_hz, config.timing.sample_rate_hz
        )];
        banner.extend(session.drain_telemetry());
        session.record_output(Duration::ZERO, &banner)?;
        Ok(session)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let mut words = trimmed.split_whitespace();
        let keyword = words.next().unwrap_or_default();
        let argument = words.next();

        let lines = if keyword.eq_ignore_ascii_case("help") {
            help_lines(argument)
        } else if keyword.eq_ignore_ascii_case("status") {
            self.status_lines()
        } else if keyword.eq_ignore_ascii_case("run") {
            self.run_lines(argument, false)
        } else if keyword.eq_ignore_ascii_case("trace") {
            self.run_lines(argument, true)
        } else {
            match self.executor.execute(trimmed) {
                Ok(outcome) => vec![outcome.to_string()],
                Err(err) => vec![err.to_string()],
            }
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn run_lines(&mut self, argument: Option<&str>, trace: bool) -> Vec<String> {
        let frames = match argument.map(str::parse::<u32>) {
            None => 1,
            Some(Ok(count)) if (1..=MAX_RUN_FRAMES).contains(&count) => count,
            Some(_) => return vec![format!("frame count must be 1..={MAX_RUN_FRAMES}")],
        };

        let mut lines = Vec::new();
        let mut last = None;
        let mut traced = 0;
        let mut observe = |record: &FrameRecord<CycleInstant>| {
            if trace && traced < MAX_TRACE_FRAMES {
                lines.push(describe_frame(record));
                traced += 1;
            }
            last = Some(*record);
        };

        let completed = match self.mode {
            GeneratorMode::Sequenced => {
                run_sequenced(&mut self.engine, &mut self.generator, frames, &mut observe)
            }
            GeneratorMode::Triggered => {
                run_triggered(&mut self.engine, &mut self.generator, frames, &mut observe)
            }
        };

        let cycles_per_frame = self.engine.timing().cycles_per_frame;
        let mut summary = format!(
            "ran {completed} frames ({}) now={} cycles",
            self.mode,
            self.generator.now().as_cycles()
        );
        if let Some(record) = last {
            summary.push_str(&format!(
                " last code={} delay={} period={cycles_per_frame}",
                record.plan.code, record.plan.code_delay
            ));
        }
        lines.push(summary);
        lines.extend(self.pulse_lines());
        lines.extend(self.drain_telemetry());
        lines
    }

    fn pulse_lines(&self) -> Vec<String> {
        let starts: Vec<u64> = self.generator.pulses().map(|at| at.as_cycles()).collect();
        let Some(tail) = starts.rchunks_exact(2).next() else {
            return Vec::new();
        };
        vec![format!(
            "last pulses at {} and {} (spacing {} cycles)",
            tail[0],
            tail[1],
            tail[1] - tail[0]
        )]
    }

    fn status_lines(&self) -> Vec<String> {
        let timing = *self.engine.timing();
        let control = self.control.snapshot();
        let stats = self.engine.stats();

        let mut lines = vec![
            format!(
                "timing: cycles/frame={} min-gap={} available={} overhead={}",
                timing.cycles_per_frame, timing.min_gap, timing.available, timing.pulse_overhead
            ),
            format!(
                "rounding: {} cycles/s dropped, rate error {} ppm",
                timing.rounding_remainder,
                timing.rate_error_ppm()
            ),
            format!(
                "control: code={} test-mode={} period={:.3}s epoch={}",
                control.code,
                if control.test_mode { "on" } else { "off" },
                control.test_update_period.as_secs_f32(),
                control.sweep_epoch
            ),
            format!(
                "frames: started={} completed={} overruns={} skipped={} worst-lateness={}",
                stats.scheduler.frames_started,
                stats.scheduler.frames_completed,
                stats.scheduler.overruns,
                stats.scheduler.skipped_slots,
                stats.scheduler.worst_lateness
            ),
            format!(
                "generator: {} handshake={} spurious={} telemetry-dropped={}",
                self.mode,
                self.engine.handshake().label(),
                stats.spurious_edges,
                stats.telemetry_dropped
            ),
        ];
        if let Some(issue) = timing.issue {
            lines.push(format!("config issue: {issue}"));
        }
        lines
    }

    fn drain_telemetry(&mut self) -> Vec<String> {
        self.engine.drain_events().map(|record| describe_event(&record)).collect()
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_frame(record: &FrameRecord<CycleInstant>) -> String {
    let outcome = match record.completion {
        Completion::OnTime { .. } => "on-time".to_string(),
        Completion::Overrun {
            lateness, skipped, ..
        } => format!("overrun late={lateness} skipped={skipped}"),
        Completion::Spurious => "spurious".to_string(),
    };
    format!(
        "  frame {} @{} code={} gap={} delay={} tail={} {outcome}",
        record.ticket.index,
        record.ticket.deadline.as_cycles(),
        record.plan.code,
        record.plan.min_gap,
        record.plan.code_delay,
        record.plan.frame_completion,
    )
}

fn describe_event(record: &TelemetryRecord<CycleInstant>) -> String {
    let details = match record.details {
        TelemetryPayload::None => String::new(),
        TelemetryPayload::Overrun(overrun) => format!(
            " frame={} late={} skipped={}",
            overrun.frame, overrun.lateness, overrun.skipped
        ),
        TelemetryPayload::Config(issue) => format!(" {issue}"),
        TelemetryPayload::Edge(state) => format!(" state={state}"),
        TelemetryPayload::Sweep(sweep) => format!(
            " epoch={} start={} every={} frames",
            sweep.epoch, sweep.start, sweep.interval_frames
        ),
        TelemetryPayload::Timing {
            cycles_per_frame,
            rounding_remainder,
        } => format!(" cycles/frame={cycles_per_frame} remainder={rounding_remainder}"),
    };
    format!(
        "telemetry #{} @{} {}{details}",
        record.id,
        record.timestamp.as_cycles(),
        record.event
    )
}

struct TranscriptLogger {
    writer: Box<dyn Write>,
}

impl TranscriptLogger {
    fn open(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Self::new(profile, Box::new(BufWriter::new(file)))
    }

    fn new(profile: TranscriptProfile, writer: Box<dyn Write>) -> io::Result<Self> {
        let mut logger = Self { writer };
        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppm_core::timing::Code;

    fn session(control: &ControlBlock) -> Session<'_> {
        let transcript = TranscriptLogger::new(TranscriptProfile::Sequenced, Box::new(io::sink()))
            .expect("sink transcript");
        Session::with_transcript(SessionConfig::default(), control, transcript).expect("session")
    }

    #[test]
    fn each_session_drives_its_own_control_block() {
        let first_control = ControlBlock::new();
        let second_control = ControlBlock::new();
        let mut first = session(&first_control);
        let mut second = session(&second_control);

        first.handle_command("C:500").expect("command");
        second.handle_command("T").expect("command");

        assert_eq!(first_control.code(), Code::new(500));
        assert!(!first_control.test_mode());
        assert_eq!(second_control.code(), Code::ZERO);
        assert!(second_control.test_mode());
    }

    #[test]
    fn run_reports_code_delay_spacing() {
        let control = ControlBlock::new();
        let mut session = session(&control);

        session.handle_command("C:512").expect("command");
        let lines = session.handle_command("run 3").expect("command");

        assert!(lines.iter().any(|line| line.starts_with("ran 3 frames")));
        assert!(
            lines
                .iter()
                .any(|line| line.ends_with("(spacing 1385 cycles)")),
            "{lines:?}"
        );
    }
}
