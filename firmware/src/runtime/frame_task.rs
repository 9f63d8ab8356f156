use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::Irq;
use embassy_time::{Instant, TICK_HZ, Timer};
use ppm_core::engine::{EdgeAction, FrameEngine, SequencedPoll};
use ppm_core::scheduler::Monotonic;
use ppm_core::timing::{CycleInstant, TimingConfig};

use super::CONTROL;
use crate::hw::generator::{SequencedPio, TriggeredPio};
use crate::telemetry::TelemetryForwarder;

type Engine = FrameEngine<'static, CycleInstant>;

/// Variant A: frames are streamed into the PIO FIFO ahead of time.
///
/// The engine runs in stream time: each frame starts where the previous one
/// ended on the generator's own clock, and FIFO backpressure paces the loop.
#[embassy_executor::task]
pub async fn run_sequenced(mut generator: SequencedPio<'static, PIO0, 0>, config: TimingConfig) -> ! {
    let mut engine: Engine = FrameEngine::new(&config, &CONTROL);
    let mut telemetry = TelemetryForwarder::new(config.clock_frequency_hz);
    let mut stream = CycleInstant::ZERO;
    let mut rejected = 0;

    engine.start(stream);
    defmt::info!(
        "frame: sequenced start, {} cycles per frame",
        engine.timing().cycles_per_frame
    );

    loop {
        match engine.poll_sequenced(stream, &mut generator) {
            SequencedPoll::Loaded { ticket, plan } => {
                if generator.rejected_frames() != rejected {
                    rejected = generator.rejected_frames();
                    defmt::warn!("frame: {} frames rejected by the generator", rejected);
                }
                generator.flush().await;
                if generator.take_stall() {
                    engine.record_generator_stall(ticket.deadline);
                }
                stream = ticket.deadline.advanced_by(plan.total());
                engine.complete_sequenced(stream);
            }
            SequencedPoll::Wait(deadline) => stream = deadline,
            SequencedPoll::GeneratorBusy => generator.flush().await,
            SequencedPoll::Idle | SequencedPoll::Busy => {
                defmt::error!("frame: sequenced engine is not armed");
                core::future::pending::<()>().await;
            }
        }

        forward_telemetry(&mut engine, &mut telemetry);
    }
}

/// Variant B: the CPU times every phase and fires single pulses.
#[embassy_executor::task]
pub async fn run_triggered(
    mut generator: TriggeredPio<'static, PIO0, 0>,
    mut pulse_done: Irq<'static, PIO0, 0>,
    config: TimingConfig,
) -> ! {
    let clock_hz = config.clock_frequency_hz;
    let mut engine: Engine = FrameEngine::new(&config, &CONTROL);
    let mut telemetry = TelemetryForwarder::new(clock_hz);

    engine.start(now_cycles(clock_hz));
    defmt::info!(
        "frame: triggered start, {} cycles per frame",
        engine.timing().cycles_per_frame
    );

    loop {
        let action = match engine.next_wakeup() {
            Some(at) => {
                Timer::at(instant_for(at, clock_hz)).await;
                engine.on_timer(now_cycles(clock_hz), &mut generator)
            }
            None => {
                pulse_done.wait().await;
                engine.on_pulse_complete(now_cycles(clock_hz))
            }
        };

        if action == EdgeAction::Idle {
            defmt::error!("frame: triggered engine is not armed");
            core::future::pending::<()>().await;
        }

        forward_telemetry(&mut engine, &mut telemetry);
    }
}

fn forward_telemetry(engine: &mut Engine, telemetry: &mut TelemetryForwarder) {
    let dropped = engine.stats().telemetry_dropped;
    telemetry.forward(engine.drain_events(), dropped);
}

fn tick_hz() -> u32 {
    u32::try_from(TICK_HZ).unwrap_or(u32::MAX)
}

fn now_cycles(clock_hz: u32) -> CycleInstant {
    CycleInstant::from_ticks(Instant::now().as_ticks(), tick_hz(), clock_hz)
}

fn instant_for(at: CycleInstant, clock_hz: u32) -> Instant {
    Instant::from_ticks(at.to_ticks(tick_hz(), clock_hz))
}
