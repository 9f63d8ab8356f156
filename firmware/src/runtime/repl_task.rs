use ppm_core::repl::CommandExecutor;
use ppm_core::timing::TimingConfig;

use super::{CONTROL, REPL_RX_QUEUE, REPL_TX_QUEUE};
use crate::repl::{Outbox, ReplInput, ReplSession, ReplTxSender};

#[embassy_executor::task]
pub async fn run(config: TimingConfig) -> ! {
    let timing = config.derive();
    let rx = REPL_RX_QUEUE.receiver();
    let tx = REPL_TX_QUEUE.sender();
    let mut session = ReplSession::new(CommandExecutor::new(&CONTROL));
    let mut outbox = Outbox::new();

    loop {
        match rx.receive().await {
            ReplInput::Connected => {
                if session.on_connect(&timing, &mut outbox).is_err() {
                    defmt::warn!("repl: banner truncated");
                }
            }
            ReplInput::Disconnected => {
                session.on_disconnect();
                outbox.clear();
                continue;
            }
            ReplInput::Bytes(frame) => {
                for byte in frame {
                    if outbox.needs_flush() {
                        flush(&tx, &mut outbox).await;
                    }
                    if session.ingest(byte, &mut outbox).is_err() {
                        defmt::warn!("repl: response truncated");
                    }
                }
            }
        }

        flush(&tx, &mut outbox).await;
    }
}

async fn flush(tx: &ReplTxSender<'_>, outbox: &mut Outbox) {
    for frame in outbox.frames() {
        tx.send(frame).await;
    }
    outbox.clear();
}
