//! USB CDC ACM console device.
//!
//! The encoder exposes a single CDC ACM interface carrying the operator
//! console. [`UsbConsole`] owns the Embassy device and hands out the split
//! sender/receiver/control handles once so the USB task can pump bytes
//! between the host and the REPL queues.

/// User-visible strings advertised in the USB descriptors.
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceStrings {
    pub manufacturer: &'static str,
    pub product: &'static str,
    pub serial_number: Option<&'static str>,
}

impl Default for UsbDeviceStrings {
    fn default() -> Self {
        Self {
            manufacturer: "Pico PPM",
            product: "PPM Laser Encoder",
            serial_number: None,
        }
    }
}

#[cfg(target_os = "none")]
pub const MAX_PACKET_SIZE: u16 = 64;

#[cfg(target_os = "none")]
const CONTROL_BUFFER_LEN: usize = 64;
#[cfg(target_os = "none")]
const CONFIG_DESCRIPTOR_LEN: usize = 256;
#[cfg(target_os = "none")]
const BOS_DESCRIPTOR_LEN: usize = 256;
#[cfg(target_os = "none")]
const MSOS_DESCRIPTOR_LEN: usize = 256;

/// Backing storage for the Embassy USB builder and the CDC ACM class.
#[cfg(target_os = "none")]
pub struct UsbDeviceStorage {
    control_buf: [u8; CONTROL_BUFFER_LEN],
    config_descriptor: [u8; CONFIG_DESCRIPTOR_LEN],
    bos_descriptor: [u8; BOS_DESCRIPTOR_LEN],
    msos_descriptor: [u8; MSOS_DESCRIPTOR_LEN],
    console_state: embassy_usb::class::cdc_acm::State<'static>,
}

#[cfg(target_os = "none")]
impl UsbDeviceStorage {
    pub fn new() -> Self {
        Self {
            control_buf: [0; CONTROL_BUFFER_LEN],
            config_descriptor: [0; CONFIG_DESCRIPTOR_LEN],
            bos_descriptor: [0; BOS_DESCRIPTOR_LEN],
            msos_descriptor: [0; MSOS_DESCRIPTOR_LEN],
            console_state: embassy_usb::class::cdc_acm::State::new(),
        }
    }
}

/// Split handles for the console interface.
#[cfg(target_os = "none")]
pub struct CdcAcmHandle<D: embassy_usb::driver::Driver<'static>> {
    pub sender: embassy_usb::class::cdc_acm::Sender<'static, D>,
    pub receiver: embassy_usb::class::cdc_acm::Receiver<'static, D>,
    pub control: embassy_usb::class::cdc_acm::ControlChanged<'static>,
}

/// Owns the USB device and the not-yet-claimed console handles.
#[cfg(target_os = "none")]
pub struct UsbConsole<D>
where
    D: embassy_usb::driver::Driver<'static>,
{
    pub device: embassy_usb::UsbDevice<'static, D>,
    console: Option<CdcAcmHandle<D>>,
}

#[cfg(target_os = "none")]
impl<D> UsbConsole<D>
where
    D: embassy_usb::driver::Driver<'static>,
{
    pub fn new(
        driver: D,
        storage: &'static mut UsbDeviceStorage,
        strings: UsbDeviceStrings,
    ) -> Self {
        let mut config = embassy_usb::Config::new(0x1209, 0x0001);
        config.manufacturer = Some(strings.manufacturer);
        config.product = Some(strings.product);
        config.serial_number = strings.serial_number;
        config.max_packet_size_0 = MAX_PACKET_SIZE as u8;
        config.max_power = 100;
        config.device_class = 0xEF;
        config.device_sub_class = 0x02;
        config.device_protocol = 0x01;
        config.composite_with_iads = true;

        let mut builder = embassy_usb::Builder::new(
            driver,
            config,
            &mut storage.config_descriptor,
            &mut storage.bos_descriptor,
            &mut storage.msos_descriptor,
            &mut storage.control_buf,
        );

        let console = embassy_usb::class::cdc_acm::CdcAcmClass::new(
            &mut builder,
            &mut storage.console_state,
            MAX_PACKET_SIZE,
        );
        let (sender, receiver, control) = console.split_with_control();

        Self {
            device: builder.build(),
            console: Some(CdcAcmHandle {
                sender,
                receiver,
                control,
            }),
        }
    }

    /// Takes ownership of the console handles; `None` after the first call.
    pub fn take_console(&mut self) -> Option<CdcAcmHandle<D>> {
        self.console.take()
    }
}

/// Host-side stub so `cargo test` builds without pulling in Embassy USB.
#[cfg(not(target_os = "none"))]
pub struct UsbDeviceStorage;

#[cfg(not(target_os = "none"))]
impl UsbDeviceStorage {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

/// Host-side stub representing the console device.
#[cfg(not(target_os = "none"))]
pub struct UsbConsole<D> {
    pub device: (),
    _marker: core::marker::PhantomData<D>,
}

#[cfg(not(target_os = "none"))]
impl<D> UsbConsole<D> {
    pub fn new(_: D, _: &'static mut UsbDeviceStorage, _: UsbDeviceStrings) -> Self {
        Self {
            device: (),
            _marker: core::marker::PhantomData,
        }
    }

    pub fn take_console(&mut self) -> Option<()> {
        None
    }
}
