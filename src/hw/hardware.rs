use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::fake_backend::{FakeDevice, FakeTransport};
use super::mailbox::ReportMailbox;
use super::model::UsbDeviceId;
use super::rusb_backend::RusbBackend;
use super::session::DeviceSession;
use crate::error::{DmdError, TransportError};

/// Byte-level HID transport used by a [`DeviceSession`].
///
/// Implementations accept 65-byte control frames (leading report-id byte
/// included) and 64-byte raw frames, and publish every inbound report through
/// the sink they were opened with.
#[async_trait]
pub(crate) trait HidTransport: Send + Sync + fmt::Debug {
    /// Sends one frame.
    async fn send_report(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Stops inbound delivery and releases the device.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Opens controller sessions.
#[async_trait]
pub trait HardwareClient: Send + Sync {
    /// Opens the first controller matching `device` and reads its display mode.
    async fn open(self: Box<Self>, device: UsbDeviceId) -> Result<DeviceSession, DmdError>;
}

/// Creates a hardware client backed by libusb.
#[must_use]
pub fn real_hardware_client() -> Box<dyn HardwareClient> {
    Box::new(RealHardwareClient)
}

/// Creates a hardware client backed by a simulated controller.
///
/// ```
/// # async fn demo() -> Result<(), dlpc::DmdError> {
/// use dlpc::{DisplayMode, FakeDevice, UsbDeviceId};
///
/// let device = FakeDevice::builder().initial_mode(DisplayMode::Video).build();
/// let session = dlpc::fake_hardware_client(device)
///     .open(UsbDeviceId::default())
///     .await?;
/// assert_eq!(Some(DisplayMode::Video), session.current_mode().await);
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn fake_hardware_client(device: FakeDevice) -> Box<dyn HardwareClient> {
    Box::new(FakeHardwareClient { device })
}

#[derive(Debug)]
struct RealHardwareClient;

#[async_trait]
impl HardwareClient for RealHardwareClient {
    #[instrument(skip(self), level = "info", fields(%device))]
    async fn open(self: Box<Self>, device: UsbDeviceId) -> Result<DeviceSession, DmdError> {
        let mailbox = ReportMailbox::new();
        let backend = RusbBackend::open(device, mailbox.sink()).await?;
        info!("opened USB controller");
        DeviceSession::establish(device, Arc::new(backend), mailbox).await
    }
}

#[derive(Debug)]
struct FakeHardwareClient {
    device: FakeDevice,
}

#[async_trait]
impl HardwareClient for FakeHardwareClient {
    #[instrument(skip(self), level = "info", fields(%device))]
    async fn open(self: Box<Self>, device: UsbDeviceId) -> Result<DeviceSession, DmdError> {
        let Self { device: fake } = *self;
        if fake.device_id() != device {
            return Err(TransportError::DeviceNotFound { device }.into());
        }

        info!("using fake USB backend");
        let mailbox = ReportMailbox::new();
        let transport = FakeTransport::new(fake, mailbox.sink());
        DeviceSession::establish(device, Arc::new(transport), mailbox).await
    }
}
