use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_sync::channel::Channel;
use ppm_core::control::ControlBlock;
use ppm_core::generator::GeneratorMode;
use ppm_core::timing::{DEFAULT_SAMPLE_RATE_HZ, TimingConfig};
use static_cell::StaticCell;

use crate::hw::generator::{SequencedPio, TriggeredPio};
use crate::hw::program::TRIGGERED_FRAME_OVERHEAD;
use crate::repl::{ReplRxQueue, ReplTxQueue};
use crate::usb;

mod frame_task;
mod led_task;
mod repl_task;
mod usb_task;

/// Generator variant flashed into this build.
const GENERATOR_MODE: GeneratorMode = GeneratorMode::Sequenced;

bind_interrupts!(struct PioIrqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

pub(super) static CONTROL: ControlBlock = ControlBlock::new();
pub(super) static REPL_RX_QUEUE: ReplRxQueue = Channel::new();
pub(super) static REPL_TX_QUEUE: ReplTxQueue = Channel::new();
pub(super) static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let p = embassy_rp::init(embassy_rp::config::Config::default());
    let clock_hz = clk_sys_freq();

    let Pio {
        mut common,
        irq0,
        sm0,
        ..
    } = Pio::new(p.PIO0, PioIrqs);

    let config = match GENERATOR_MODE {
        GeneratorMode::Sequenced => {
            let generator = SequencedPio::new(&mut common, sm0, p.PIN_0);
            let config = TimingConfig::for_generator::<SequencedPio<'static, PIO0, 0>>(
                clock_hz,
                DEFAULT_SAMPLE_RATE_HZ,
            );
            spawner
                .spawn(frame_task::run_sequenced(generator, config))
                .expect("failed to spawn frame task");
            config
        }
        GeneratorMode::Triggered => {
            let generator = TriggeredPio::new(&mut common, sm0, p.PIN_0);
            let config = TimingConfig::new(clock_hz, DEFAULT_SAMPLE_RATE_HZ)
                .with_pulse_overhead(TRIGGERED_FRAME_OVERHEAD);
            spawner
                .spawn(frame_task::run_triggered(generator, irq0, config))
                .expect("failed to spawn frame task");
            config
        }
    };

    defmt::info!(
        "frame: {} generator, clk_sys={} Hz, rate={} Hz",
        GENERATOR_MODE.label(),
        clock_hz,
        config.sample_rate_hz
    );

    spawner
        .spawn(usb_task::run(p.USB))
        .expect("failed to spawn USB task");

    spawner
        .spawn(repl_task::run(config))
        .expect("failed to spawn REPL task");

    spawner
        .spawn(led_task::run(Output::new(p.PIN_25, Level::Low)))
        .expect("failed to spawn heartbeat task");

    core::future::pending::<()>().await;
}
