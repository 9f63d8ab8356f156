use ppm_core::scheduler::{Completion, FrameScheduler, Monotonic, Poll};

/// Microsecond-style instant that is unrelated to generator cycles.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct MockInstant(u64);

impl Monotonic for MockInstant {
    fn advanced_by(self, cycles: u64) -> Self {
        MockInstant(self.0.saturating_add(cycles))
    }

    fn cycles_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

fn run_frame(scheduler: &mut FrameScheduler<MockInstant>, start: u64, end: u64) -> Completion<MockInstant> {
    let Poll::Ready(_) = scheduler.poll(MockInstant(start)) else {
        panic!("frame at {start} should be ready");
    };
    scheduler.complete(MockInstant(end))
}

#[test]
fn deadlines_never_drift_with_jittery_completions() {
    let period = 2_770;
    let mut scheduler = FrameScheduler::new(period);
    scheduler.start(MockInstant(1_000));

    let jitter = [0, 13, 2, 250, 7, 1_999, 0, 64];
    for i in 0..1_000u64 {
        let deadline = 1_000 + i * u64::from(period);
        assert_eq!(scheduler.deadline(), Some(MockInstant(deadline)), "frame {i}");

        let start = deadline + jitter[(i % 8) as usize];
        let end = start + 300;
        let completion = run_frame(&mut scheduler, start, end);
        assert_eq!(
            completion,
            Completion::OnTime {
                next: MockInstant(deadline + u64::from(period))
            }
        );
    }

    let stats = scheduler.stats();
    assert_eq!(stats.frames_completed, 1_000);
    assert_eq!(stats.overruns, 0);
    assert_eq!(stats.worst_lateness, 1_999);
}

#[test]
fn overrun_recovers_onto_the_original_grid() {
    let mut scheduler = FrameScheduler::new(100);
    scheduler.start(MockInstant(0));

    let completion = run_frame(&mut scheduler, 0, 450);
    assert_eq!(
        completion,
        Completion::Overrun {
            next: MockInstant(400),
            lateness: 350,
            skipped: 3
        }
    );

    let completion = run_frame(&mut scheduler, 450, 460);
    assert_eq!(completion, Completion::OnTime { next: MockInstant(500) });
    assert_eq!(scheduler.stats().skipped_slots, 3);
}

#[test]
fn repeated_completion_is_idempotent() {
    let mut scheduler = FrameScheduler::new(100);
    scheduler.start(MockInstant(0));
    run_frame(&mut scheduler, 0, 10);

    assert_eq!(scheduler.complete(MockInstant(11)), Completion::Spurious);
    assert_eq!(scheduler.complete(MockInstant(12)), Completion::Spurious);
    assert_eq!(scheduler.deadline(), Some(MockInstant(100)));
    assert_eq!(scheduler.stats().frames_completed, 1);
}
