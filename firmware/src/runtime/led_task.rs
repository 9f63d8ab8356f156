use embassy_rp::gpio::Output;
use embassy_time::{Duration, Ticker};

use crate::hw::HEARTBEAT_PERIOD_MS;

#[embassy_executor::task]
pub async fn run(mut led: Output<'static>) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(HEARTBEAT_PERIOD_MS));
    loop {
        led.toggle();
        ticker.next().await;
    }
}
