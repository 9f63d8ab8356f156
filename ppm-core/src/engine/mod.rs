//! Frame engine: the single owner of per-frame state.
//!
//! The engine borrows the shared [`ControlBlock`] and owns everything else:
//! derived timing, the deadline scheduler, the test sweeper, the edge-triggered
//! handshake, and the telemetry queue. Platforms drive it through one of two
//! entry points depending on the generator they have:
//!
//! * sequenced generators call [`FrameEngine::poll_sequenced`] and then
//!   [`FrameEngine::complete_sequenced`] once the frame has been handed off;
//! * triggered generators arm a timer for [`FrameEngine::next_wakeup`], call
//!   [`FrameEngine::on_timer`] when it fires, and route every pulse-complete
//!   notification to [`FrameEngine::on_pulse_complete`].

use core::time::Duration;

use crate::control::ControlBlock;
use crate::generator::{FrameProgram, GeneratorState, SequencedGenerator, TriggeredGenerator};
use crate::scheduler::{
    Completion, FrameScheduler, FrameTicket, Monotonic, Poll, SchedulerState, SchedulerStats,
};
use crate::sweep::{TestSweeper, frames_for};
use crate::telemetry::{
    OverrunTelemetry, SweepTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryQueue,
    TelemetryRecord,
};
use crate::timing::{FramePlan, FrameTiming, TimingConfig, plan_with};

pub mod sim;

/// Outcome of [`FrameEngine::poll_sequenced`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequencedPoll<I> {
    Idle,
    Wait(I),
    /// A frame is loaded and has not been completed yet.
    Busy,
    /// Deadline reached but the generator cannot take another frame.
    GeneratorBusy,
    Loaded {
        ticket: FrameTicket<I>,
        plan: FramePlan,
    },
}

/// What the platform should do after a triggered-variant event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeAction<I> {
    /// Engine not started.
    Idle,
    /// Arm a timer for this instant and call [`FrameEngine::on_timer`].
    Wait(I),
    /// A pulse is in flight; wait for its completion notification.
    Pending,
    FirstPulse(FrameTicket<I>),
    SecondPulse,
    FrameComplete(Completion<I>),
    /// Notification arrived with no pulse in flight.
    Ignored,
}

/// One finished frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameRecord<I> {
    pub ticket: FrameTicket<I>,
    pub plan: FramePlan,
    pub completion: Completion<I>,
}

/// Counters surfaced for status output.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EngineStats {
    pub scheduler: SchedulerStats,
    pub spurious_edges: u32,
    pub generator_stalls: u32,
    pub telemetry_dropped: u32,
}

pub struct FrameEngine<'a, I> {
    control: &'a ControlBlock,
    timing: FrameTiming,
    scheduler: FrameScheduler<I>,
    sweeper: TestSweeper,
    handshake: GeneratorState<I>,
    current: Option<(FrameTicket<I>, FramePlan)>,
    last: Option<FrameRecord<I>>,
    seen_epoch: Option<u32>,
    sweep_period: Duration,
    spurious_edges: u32,
    generator_stalls: u32,
    telemetry: TelemetryQueue<I>,
}

impl<'a, I: Monotonic> FrameEngine<'a, I> {
    #[must_use]
    pub fn new(config: &TimingConfig, control: &'a ControlBlock) -> Self {
        let timing = config.derive();
        let mut sweeper = TestSweeper::new();
        sweeper.set_interval(frames_for(Duration::ZERO, &timing));

        Self {
            control,
            timing,
            scheduler: FrameScheduler::new(timing.frame_period()),
            sweeper,
            handshake: GeneratorState::FrameIdle,
            current: None,
            last: None,
            seen_epoch: None,
            sweep_period: Duration::ZERO,
            spurious_edges: 0,
            generator_stalls: 0,
            telemetry: TelemetryQueue::new(),
        }
    }

    pub const fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    pub const fn control(&self) -> &'a ControlBlock {
        self.control
    }

    pub const fn scheduler_state(&self) -> SchedulerState<I> {
        self.scheduler.state()
    }

    pub const fn handshake(&self) -> GeneratorState<I> {
        self.handshake
    }

    /// Most recently finished frame.
    pub const fn last_frame(&self) -> Option<FrameRecord<I>> {
        self.last
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            scheduler: self.scheduler.stats(),
            spurious_edges: self.spurious_edges,
            generator_stalls: self.generator_stalls,
            telemetry_dropped: self.telemetry.dropped(),
        }
    }

    /// Arms the first frame at `at` and reports the derived timing.
    pub fn start(&mut self, at: I) {
        self.scheduler.start(at);
        self.handshake = GeneratorState::FrameIdle;
        self.current = None;
        self.telemetry.record(
            TelemetryEventKind::EngineStarted,
            TelemetryPayload::Timing {
                cycles_per_frame: self.timing.cycles_per_frame,
                rounding_remainder: self.timing.rounding_remainder,
            },
            at,
        );
        if let Some(issue) = self.timing.issue {
            self.telemetry.record(
                TelemetryEventKind::ConfigClamped,
                TelemetryPayload::Config(issue),
                at,
            );
        }
    }

    pub fn stop(&mut self, now: I) {
        self.scheduler.stop();
        self.handshake = GeneratorState::FrameIdle;
        self.current = None;
        self.telemetry.record(
            TelemetryEventKind::EngineStopped,
            TelemetryPayload::none(),
            now,
        );
    }

    /// Loads the next frame into a sequenced generator once its deadline is reached.
    pub fn poll_sequenced<G: SequencedGenerator>(
        &mut self,
        now: I,
        generator: &mut G,
    ) -> SequencedPoll<I> {
        if let SchedulerState::FrameArmed { deadline } = self.scheduler.state()
            && now >= deadline
            && !generator.ready_for_frame()
        {
            return SequencedPoll::GeneratorBusy;
        }

        match self.scheduler.poll(now) {
            Poll::Idle => SequencedPoll::Idle,
            Poll::Wait(deadline) => SequencedPoll::Wait(deadline),
            Poll::Busy => SequencedPoll::Busy,
            Poll::Ready(ticket) => {
                let plan = self.begin_frame(ticket);
                generator.load_frame(&FrameProgram::for_generator::<G>(&plan));
                SequencedPoll::Loaded { ticket, plan }
            }
        }
    }

    /// Closes the frame loaded by [`FrameEngine::poll_sequenced`].
    pub fn complete_sequenced(&mut self, now: I) -> Completion<I> {
        self.finish_frame(now)
    }

    /// Records that a sequenced generator ran out of queued frames.
    pub fn record_generator_stall(&mut self, now: I) {
        self.generator_stalls = self.generator_stalls.saturating_add(1);
        self.telemetry.record(
            TelemetryEventKind::GeneratorStall,
            TelemetryPayload::none(),
            now,
        );
    }

    /// Next instant the triggered variant needs [`FrameEngine::on_timer`] called.
    ///
    /// `None` while a pulse is in flight or the engine is stopped.
    pub fn next_wakeup(&self) -> Option<I> {
        match self.handshake {
            GeneratorState::FrameIdle => match self.scheduler.state() {
                SchedulerState::FrameArmed { deadline } => Some(deadline),
                _ => None,
            },
            GeneratorState::AwaitingSecondPulse { due } => Some(due),
            GeneratorState::FirstPulseInFlight | GeneratorState::SecondPulseInFlight => None,
        }
    }

    /// Timer expiry for the triggered variant.
    pub fn on_timer<G: TriggeredGenerator>(&mut self, now: I, generator: &mut G) -> EdgeAction<I> {
        match self.handshake {
            GeneratorState::FrameIdle => match self.scheduler.poll(now) {
                Poll::Idle => EdgeAction::Idle,
                Poll::Wait(deadline) => EdgeAction::Wait(deadline),
                Poll::Busy => EdgeAction::Pending,
                Poll::Ready(ticket) => {
                    self.begin_frame(ticket);
                    generator.request_pulse();
                    self.handshake = GeneratorState::FirstPulseInFlight;
                    EdgeAction::FirstPulse(ticket)
                }
            },
            GeneratorState::AwaitingSecondPulse { due } if now < due => EdgeAction::Wait(due),
            GeneratorState::AwaitingSecondPulse { .. } => {
                generator.request_pulse();
                self.handshake = GeneratorState::SecondPulseInFlight;
                EdgeAction::SecondPulse
            }
            GeneratorState::FirstPulseInFlight | GeneratorState::SecondPulseInFlight => {
                EdgeAction::Pending
            }
        }
    }

    /// Pulse-complete notification for the triggered variant.
    ///
    /// After the first pulse the second is due `code_delay` cycles later;
    /// after the second the frame completes. Notifications in any other state
    /// are counted and ignored.
    pub fn on_pulse_complete(&mut self, now: I) -> EdgeAction<I> {
        match (self.handshake, self.current) {
            (GeneratorState::FirstPulseInFlight, Some((_, plan))) => {
                let due = now.advanced_by(u64::from(plan.code_delay));
                self.handshake = GeneratorState::AwaitingSecondPulse { due };
                EdgeAction::Wait(due)
            }
            (GeneratorState::SecondPulseInFlight, Some(_)) => {
                self.handshake = GeneratorState::FrameIdle;
                EdgeAction::FrameComplete(self.finish_frame(now))
            }
            (state, _) => {
                self.spurious_edges = self.spurious_edges.saturating_add(1);
                self.telemetry.record(
                    TelemetryEventKind::SpuriousEdge,
                    TelemetryPayload::Edge(state.label()),
                    now,
                );
                EdgeAction::Ignored
            }
        }
    }

    /// Pops the oldest pending telemetry record.
    pub fn next_event(&mut self) -> Option<TelemetryRecord<I>> {
        self.telemetry.pop()
    }

    /// Drains all pending telemetry, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = TelemetryRecord<I>> + '_ {
        core::iter::from_fn(move || self.telemetry.pop())
    }

    fn begin_frame(&mut self, ticket: FrameTicket<I>) -> FramePlan {
        let plan = plan_with(self.control.code(), &self.timing);
        self.current = Some((ticket, plan));
        plan
    }

    fn finish_frame(&mut self, now: I) -> Completion<I> {
        let completion = self.scheduler.complete(now);
        let Some((ticket, plan)) = self.current.take() else {
            self.spurious_edges = self.spurious_edges.saturating_add(1);
            self.telemetry.record(
                TelemetryEventKind::SpuriousEdge,
                TelemetryPayload::Edge(self.handshake.label()),
                now,
            );
            return completion;
        };

        if let Completion::Overrun {
            lateness, skipped, ..
        } = completion
        {
            let details = OverrunTelemetry {
                frame: ticket.index,
                lateness,
                skipped,
            };
            self.telemetry.record(
                TelemetryEventKind::FrameOverrun,
                TelemetryPayload::Overrun(details),
                now,
            );
            if skipped > 0 {
                self.telemetry.record(
                    TelemetryEventKind::SlotsSkipped,
                    TelemetryPayload::Overrun(details),
                    now,
                );
            }
        }

        self.last = Some(FrameRecord {
            ticket,
            plan,
            completion,
        });
        self.advance_sweep(now);
        completion
    }

    fn advance_sweep(&mut self, now: I) {
        if !self.control.test_mode() {
            return;
        }

        let period = self.control.test_update_period();
        if period != self.sweep_period {
            self.sweep_period = period;
            self.sweeper.set_interval(frames_for(period, &self.timing));
        }

        let epoch = self.control.sweep_epoch();
        if self.seen_epoch != Some(epoch) {
            self.seen_epoch = Some(epoch);
            self.sweeper.reset();
            self.telemetry.record(
                TelemetryEventKind::SweepRestarted,
                TelemetryPayload::Sweep(SweepTelemetry {
                    epoch,
                    start: self.control.code(),
                    interval_frames: self.sweeper.interval(),
                }),
                now,
            );
        }

        let code = self.control.code();
        if let Some(next) = self.sweeper.on_frame(code) {
            // A failed swap means the operator wrote a code; keep theirs.
            self.control.replace_code(code, next);
        }
    }
}
