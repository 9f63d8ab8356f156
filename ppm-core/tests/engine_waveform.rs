use core::time::Duration;

use ppm_core::control::ControlBlock;
use ppm_core::engine::sim::{run_sequenced, run_triggered};
use ppm_core::engine::{EdgeAction, FrameEngine};
use ppm_core::generator::sim::SimulatedGenerator;
use ppm_core::scheduler::Completion;
use ppm_core::telemetry::{TelemetryEventKind, TelemetryPayload};
use ppm_core::timing::{Code, CycleInstant, TimingConfig};

fn pulse_starts(generator: &SimulatedGenerator) -> Vec<u64> {
    generator.pulses().map(|at| at.as_cycles()).collect()
}

/// Gaps between the two pulses of each frame, measured start to start.
fn pulse_spacings(starts: &[u64]) -> Vec<u64> {
    starts.chunks_exact(2).map(|pair| pair[1] - pair[0]).collect()
}

#[test]
fn both_variants_share_period_and_spacing() {
    let config = TimingConfig::default();
    let codes = [0u16, 100, 512, 1_000, 1_024];

    let mut sequenced = Vec::new();
    let mut triggered = Vec::new();
    for variant in 0..2 {
        let control = ControlBlock::new();
        let mut engine = FrameEngine::new(&config, &control);
        let mut generator = SimulatedGenerator::new();
        engine.start(CycleInstant::ZERO);

        for code in codes {
            control.set_code(Code::new(code));
            let done = if variant == 0 {
                run_sequenced(&mut engine, &mut generator, 1, |_| {})
            } else {
                run_triggered(&mut engine, &mut generator, 1, |_| {})
            };
            assert_eq!(done, 1);
        }

        let starts = pulse_starts(&generator);
        let frame_starts: Vec<u64> = starts.iter().step_by(2).copied().collect();
        for pair in frame_starts.windows(2) {
            assert_eq!(pair[1] - pair[0], 2770);
        }
        assert_eq!(engine.stats().scheduler.overruns, 0);

        if variant == 0 {
            sequenced = pulse_spacings(&starts);
        } else {
            triggered = pulse_spacings(&starts);
        }
    }

    assert_eq!(sequenced, triggered);
    assert_eq!(sequenced[0], 2 + 399);
    assert_eq!(sequenced[4], 2 + 399 + 1968);
}

#[test]
fn test_mode_sweeps_one_step_per_frame() {
    let control = ControlBlock::new();
    control.set_code(Code::new(900));
    control.toggle_test_mode();

    let mut engine = FrameEngine::new(&TimingConfig::default(), &control);
    let mut generator = SimulatedGenerator::new();
    engine.start(CycleInstant::ZERO);

    let mut planned = Vec::new();
    run_sequenced(&mut engine, &mut generator, 5, |record| {
        planned.push(record.plan.code.get());
    });

    assert_eq!(planned, [0, 1, 2, 3, 4]);
    assert_eq!(control.code(), Code::new(5));

    let restarted = engine
        .drain_events()
        .find(|record| record.event == TelemetryEventKind::SweepRestarted)
        .expect("sweep restart telemetry");
    let TelemetryPayload::Sweep(sweep) = restarted.details else {
        panic!("unexpected payload {:?}", restarted.details);
    };
    assert_eq!(sweep.epoch, 1);
    assert_eq!(sweep.interval_frames, 1);
}

#[test]
fn sweep_period_spaces_out_steps() {
    let control = ControlBlock::new();
    control.toggle_test_mode();
    // 0.011 s at 2770 cycles per frame and 133 MHz is 528 frames.
    control
        .set_test_update_period(Duration::from_millis(11))
        .expect("valid period");

    let mut engine = FrameEngine::new(&TimingConfig::default(), &control);
    let mut generator = SimulatedGenerator::new();
    engine.start(CycleInstant::ZERO);

    run_triggered(&mut engine, &mut generator, 527, |_| {});
    assert_eq!(control.code(), Code::ZERO);
    run_triggered(&mut engine, &mut generator, 1, |_| {});
    assert_eq!(control.code(), Code::new(1));
}

#[test]
fn leaving_test_mode_freezes_code() {
    let control = ControlBlock::new();
    control.toggle_test_mode();
    let mut engine = FrameEngine::new(&TimingConfig::default(), &control);
    let mut generator = SimulatedGenerator::new();
    engine.start(CycleInstant::ZERO);

    run_sequenced(&mut engine, &mut generator, 3, |_| {});
    assert_eq!(control.code(), Code::new(3));

    control.toggle_test_mode();
    control.set_code(Code::new(600));
    run_sequenced(&mut engine, &mut generator, 3, |record| {
        assert_eq!(record.plan.code, Code::new(600));
    });
    assert_eq!(control.code(), Code::new(600));

    control.toggle_test_mode();
    run_sequenced(&mut engine, &mut generator, 2, |_| {});
    assert_eq!(control.code(), Code::new(2));
}

#[test]
fn late_timer_is_recovered_and_reported() {
    let control = ControlBlock::new();
    let mut engine = FrameEngine::new(&TimingConfig::default(), &control);
    let mut generator = SimulatedGenerator::new();
    engine.start(CycleInstant::ZERO);

    run_triggered(&mut engine, &mut generator, 1, |_| {});
    assert_eq!(engine.next_wakeup(), Some(CycleInstant::from_cycles(2770)));

    // Timer fires two frames late.
    generator.advance_to(CycleInstant::from_cycles(2770 * 3 + 100));
    let EdgeAction::FirstPulse(ticket) = engine.on_timer(generator.now(), &mut generator) else {
        panic!("late frame should still start");
    };
    assert_eq!(ticket.lateness, 2770 * 2 + 100);

    let mut completion = None;
    run_triggered(&mut engine, &mut generator, 1, |record| {
        completion = Some(record.completion);
    });
    let Some(Completion::Overrun { next, skipped, .. }) = completion else {
        panic!("expected overrun, got {completion:?}");
    };
    // Whole missed slots are dropped; the next frame is still behind and starts at once.
    assert_eq!(skipped, 1);
    assert_eq!(next, CycleInstant::from_cycles(2770 * 3));

    let kinds: Vec<TelemetryEventKind> = engine.drain_events().map(|record| record.event).collect();
    assert_eq!(
        kinds,
        [
            TelemetryEventKind::EngineStarted,
            TelemetryEventKind::FrameOverrun,
            TelemetryEventKind::SlotsSkipped,
        ]
    );

    run_triggered(&mut engine, &mut generator, 2, |record| {
        assert!(matches!(record.completion, Completion::OnTime { .. }));
    });
    assert_eq!(pulse_starts(&generator).len(), 8);
}
