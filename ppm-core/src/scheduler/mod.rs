//! Anchored frame deadline scheduler.
//!
//! The scheduler owns the "next frame starts at" deadline and nothing else. It
//! is generic over the instant type so firmware, emulator, and tests can use
//! their own clocks; deadlines always advance from the previous deadline, never
//! from the observed completion time, so scheduling jitter cannot accumulate.

use crate::timing::{CycleCount, CycleInstant};

/// Monotonic instant measured in generator cycles.
pub trait Monotonic: Copy + Ord {
    /// Returns the instant `cycles` later, saturating at the clock's end.
    #[must_use]
    fn advanced_by(self, cycles: u64) -> Self;

    /// Cycles from `earlier` to `self`, zero if `earlier` is later.
    fn cycles_since(self, earlier: Self) -> u64;
}

impl Monotonic for CycleInstant {
    fn advanced_by(self, cycles: u64) -> Self {
        CycleInstant::from_cycles(self.as_cycles().saturating_add(cycles))
    }

    fn cycles_since(self, earlier: Self) -> u64 {
        self.saturating_cycles_since(earlier)
    }
}

/// One frame handed out by [`FrameScheduler::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameTicket<I> {
    /// Sequence number of the frame since [`FrameScheduler::start`].
    pub index: u32,
    pub deadline: I,
    /// Cycles between the deadline and the poll that started the frame.
    pub lateness: u64,
}

/// Scheduler lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SchedulerState<I> {
    Idle,
    FrameArmed { deadline: I },
    FrameRunning { ticket: FrameTicket<I> },
}

impl<I> SchedulerState<I> {
    /// Returns `true` once the scheduler has been started.
    pub const fn is_active(&self) -> bool {
        !matches!(self, SchedulerState::Idle)
    }
}

/// Result of [`FrameScheduler::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Poll<I> {
    /// Not started.
    Idle,
    /// Deadline not reached yet.
    Wait(I),
    /// A frame is already running.
    Busy,
    /// Deadline reached; the frame is now running.
    Ready(FrameTicket<I>),
}

/// Result of [`FrameScheduler::complete`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Completion<I> {
    OnTime {
        next: I,
    },
    /// The frame ended past the next deadline. `skipped` whole slots were
    /// dropped from the anchor grid so the next frame is not stacked.
    Overrun {
        next: I,
        lateness: u64,
        skipped: u32,
    },
    /// No frame was running; nothing changed.
    Spurious,
}

impl<I: Copy> Completion<I> {
    #[must_use]
    pub const fn next_deadline(&self) -> Option<I> {
        match self {
            Completion::OnTime { next } | Completion::Overrun { next, .. } => Some(*next),
            Completion::Spurious => None,
        }
    }
}

/// Counters kept across a scheduler run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SchedulerStats {
    pub frames_started: u32,
    pub frames_completed: u32,
    pub overruns: u32,
    pub skipped_slots: u32,
    pub spurious_completions: u32,
    pub worst_lateness: u64,
}

/// Deadline state machine: `Idle → FrameArmed → FrameRunning → FrameArmed …`.
pub struct FrameScheduler<I> {
    period: CycleCount,
    state: SchedulerState<I>,
    next_index: u32,
    stats: SchedulerStats,
}

impl<I: Monotonic> FrameScheduler<I> {
    /// Creates an idle scheduler; a zero period is treated as one cycle.
    #[must_use]
    pub fn new(period: CycleCount) -> Self {
        Self {
            period: period.max(1),
            state: SchedulerState::Idle,
            next_index: 0,
            stats: SchedulerStats::default(),
        }
    }

    pub const fn period(&self) -> CycleCount {
        self.period
    }

    pub const fn state(&self) -> SchedulerState<I> {
        self.state
    }

    pub const fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Deadline of the armed or running frame.
    pub const fn deadline(&self) -> Option<I> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::FrameArmed { deadline } => Some(deadline),
            SchedulerState::FrameRunning { ticket } => Some(ticket.deadline),
        }
    }

    /// Arms the first frame. Restarting an active scheduler re-anchors it.
    pub fn start(&mut self, first_deadline: I) {
        self.state = SchedulerState::FrameArmed {
            deadline: first_deadline,
        };
        self.next_index = 0;
        self.stats = SchedulerStats::default();
    }

    pub fn stop(&mut self) {
        self.state = SchedulerState::Idle;
    }

    /// Starts the armed frame once `now` has reached its deadline.
    pub fn poll(&mut self, now: I) -> Poll<I> {
        match self.state {
            SchedulerState::Idle => Poll::Idle,
            SchedulerState::FrameRunning { .. } => Poll::Busy,
            SchedulerState::FrameArmed { deadline } if now < deadline => Poll::Wait(deadline),
            SchedulerState::FrameArmed { deadline } => {
                let ticket = FrameTicket {
                    index: self.next_index,
                    deadline,
                    lateness: now.cycles_since(deadline),
                };
                self.next_index = self.next_index.wrapping_add(1);
                self.stats.frames_started = self.stats.frames_started.saturating_add(1);
                self.stats.worst_lateness = self.stats.worst_lateness.max(ticket.lateness);
                self.state = SchedulerState::FrameRunning { ticket };
                Poll::Ready(ticket)
            }
        }
    }

    /// Closes the running frame and arms the next anchored deadline.
    pub fn complete(&mut self, now: I) -> Completion<I> {
        let SchedulerState::FrameRunning { ticket } = self.state else {
            self.stats.spurious_completions = self.stats.spurious_completions.saturating_add(1);
            return Completion::Spurious;
        };

        self.stats.frames_completed = self.stats.frames_completed.saturating_add(1);
        let period = u64::from(self.period);
        let mut next = ticket.deadline.advanced_by(period);

        let completion = if now <= next {
            Completion::OnTime { next }
        } else {
            let lateness = now.cycles_since(next);
            let whole_periods = lateness / period;
            if whole_periods > 0 {
                next = next.advanced_by(whole_periods * period);
            }
            let skipped = u32::try_from(whole_periods).unwrap_or(u32::MAX);
            self.stats.overruns = self.stats.overruns.saturating_add(1);
            self.stats.skipped_slots = self.stats.skipped_slots.saturating_add(skipped);
            Completion::Overrun {
                next,
                lateness,
                skipped,
            }
        };

        self.state = SchedulerState::FrameArmed { deadline: next };
        completion
    }
}
