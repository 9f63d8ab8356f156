use super::{REPL_RX_QUEUE, REPL_TX_QUEUE, USB_STORAGE};
use crate::repl::{ReplFrame, ReplInput};
use crate::usb::{self, UsbDeviceStrings};
use embassy_futures::join::join;
use embassy_futures::select::{Either3, select3};
use embassy_rp::Peri;
use embassy_rp::peripherals::USB;
use embassy_usb::driver::EndpointError;

embassy_rp::bind_interrupts!(struct UsbIrqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

#[embassy_executor::task]
pub async fn run(usb: Peri<'static, USB>) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = embassy_rp::usb::Driver::new(usb, UsbIrqs);

    let mut console = usb::UsbConsole::new(driver, storage, UsbDeviceStrings::default());

    let usb::CdcAcmHandle {
        sender,
        receiver,
        control,
    } = console
        .take_console()
        .expect("console CDC interface unavailable");

    let mut device = console.device;

    join(device.run(), run_console(sender, receiver, control)).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn run_console<D>(
    mut sender: embassy_usb::class::cdc_acm::Sender<'static, D>,
    mut receiver: embassy_usb::class::cdc_acm::Receiver<'static, D>,
    control: embassy_usb::class::cdc_acm::ControlChanged<'static>,
) -> !
where
    D: embassy_usb::driver::Driver<'static>,
{
    let repl_rx_queue = REPL_RX_QUEUE.sender();
    let repl_tx_queue = REPL_TX_QUEUE.receiver();
    let mut ingress = [0u8; usb::MAX_PACKET_SIZE as usize];
    let mut pending_tx: Option<ReplFrame> = None;

    loop {
        join(receiver.wait_connection(), sender.wait_connection()).await;
        wait_for_dtr(&control, &sender).await;
        pending_tx.take();
        // Output produced while the port was closed is stale.
        while repl_tx_queue.try_receive().is_ok() {}

        defmt::info!("usb: console connected");
        repl_rx_queue.send(ReplInput::Connected).await;

        loop {
            match select3(
                receiver.read_packet(&mut ingress),
                async {
                    // Keep the frame queued until the write completes; a
                    // cancelled write is retried on the next pass.
                    let frame = match &pending_tx {
                        Some(frame) => frame.clone(),
                        None => {
                            let frame = repl_tx_queue.receive().await;
                            pending_tx = Some(frame.clone());
                            frame
                        }
                    };
                    sender.write_packet(&frame).await?;
                    pending_tx = None;
                    Ok::<(), EndpointError>(())
                },
                control.control_changed(),
            )
            .await
            {
                Either3::First(Ok(count)) => {
                    if count == 0 {
                        continue;
                    }

                    let mut frame = ReplFrame::new();
                    if frame.extend_from_slice(&ingress[..count]).is_err() {
                        defmt::warn!("usb: dropping console frame len={} (overflow)", count);
                        continue;
                    }

                    repl_rx_queue.send(ReplInput::Bytes(frame)).await;
                }
                Either3::First(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console interface disabled");
                    break;
                }
                Either3::First(Err(_)) => {
                    defmt::warn!("usb: console read error");
                }
                Either3::Second(Ok(())) => {}
                Either3::Second(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console write disabled");
                    break;
                }
                Either3::Second(Err(_)) => {
                    defmt::warn!("usb: console write error");
                }
                Either3::Third(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: host dropped DTR");
                        break;
                    }
                }
            }
        }

        pending_tx.take();
        repl_rx_queue.send(ReplInput::Disconnected).await;
    }
}

async fn wait_for_dtr<D>(
    control: &embassy_usb::class::cdc_acm::ControlChanged<'static>,
    sender: &embassy_usb::class::cdc_acm::Sender<'static, D>,
) where
    D: embassy_usb::driver::Driver<'static>,
{
    while !sender.dtr() {
        control.control_changed().await;
    }
}
