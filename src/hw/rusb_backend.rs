use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rusb::{Context, DeviceHandle, UsbContext};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::{debug, info, instrument, trace, warn};

use super::hardware::HidTransport;
use super::mailbox::ReportSink;
use super::model::UsbDeviceId;
use crate::error::TransportError;
use crate::protocol::{CONTROL_FRAME_LEN, RAW_FRAME_LEN};

const HID_INTERFACE: u8 = 0;
const INTERRUPT_OUT_ENDPOINT: u8 = 0x01;
const INTERRUPT_IN_ENDPOINT: u8 = 0x81;
const WRITE_TIMEOUT: Duration = Duration::from_millis(1_000);
const READ_TIMEOUT: Duration = Duration::from_millis(100);
const REPORT_ID: u8 = 0x00;

/// HID transport over libusb interrupt endpoints.
///
/// Control frames lose their report-id byte on the wire and inbound reports
/// regain one, so both directions keep the 65-byte layout used everywhere
/// else in the crate.
#[derive(Debug)]
pub(crate) struct RusbBackend {
    handle: Arc<DeviceHandle<Context>>,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl RusbBackend {
    /// Opens the first device matching `device` and starts the report reader.
    #[instrument(skip(sink), level = "debug", fields(%device))]
    pub(crate) async fn open(device: UsbDeviceId, sink: ReportSink) -> Result<Self, TransportError> {
        let handle = Arc::new(spawn_blocking(move || open_device(device)).await??);
        let running = Arc::new(AtomicBool::new(true));
        let reader = spawn_blocking({
            let handle = Arc::clone(&handle);
            let running = Arc::clone(&running);
            move || read_reports(&handle, &running, &sink)
        });

        Ok(Self {
            handle,
            running,
            reader: Mutex::new(Some(reader)),
        })
    }
}

#[async_trait]
impl HidTransport for RusbBackend {
    #[instrument(skip(self, frame), level = "trace", fields(frame_len = frame.len()))]
    async fn send_report(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let payload = match frame.len() {
            CONTROL_FRAME_LEN => frame[1..].to_vec(),
            RAW_FRAME_LEN => frame.to_vec(),
            len => return Err(TransportError::InvalidFrameSize { len }),
        };
        let expected = payload.len();
        let handle = Arc::clone(&self.handle);
        let transferred = spawn_blocking(move || {
            handle.write_interrupt(INTERRUPT_OUT_ENDPOINT, &payload, WRITE_TIMEOUT)
        })
        .await??;

        if transferred != expected {
            return Err(TransportError::ShortWrite {
                transferred,
                expected,
            });
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn close(&self) -> Result<(), TransportError> {
        self.running.store(false, Ordering::Release);
        if let Some(reader) = self.reader.lock().await.take() {
            reader.await?;
        }

        let handle = Arc::clone(&self.handle);
        spawn_blocking(move || handle.release_interface(HID_INTERFACE)).await??;
        info!("released USB interface");
        Ok(())
    }
}

impl Drop for RusbBackend {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

fn open_device(device: UsbDeviceId) -> Result<DeviceHandle<Context>, TransportError> {
    let context = Context::new()?;
    for candidate in context.devices()?.iter() {
        let descriptor = candidate.device_descriptor()?;
        if descriptor.vendor_id() != device.vendor_id()
            || descriptor.product_id() != device.product_id()
        {
            continue;
        }

        let handle = candidate.open()?;
        if matches!(handle.kernel_driver_active(HID_INTERFACE), Ok(true)) {
            debug!("detaching kernel HID driver");
            handle.detach_kernel_driver(HID_INTERFACE)?;
        }
        handle.claim_interface(HID_INTERFACE)?;
        return Ok(handle);
    }

    Err(TransportError::DeviceNotFound { device })
}

fn read_reports(handle: &DeviceHandle<Context>, running: &AtomicBool, sink: &ReportSink) {
    let mut buffer = [0u8; RAW_FRAME_LEN];
    while running.load(Ordering::Acquire) {
        match handle.read_interrupt(INTERRUPT_IN_ENDPOINT, &mut buffer, READ_TIMEOUT) {
            Ok(len) => {
                let mut report = Vec::with_capacity(len + 1);
                report.push(REPORT_ID);
                report.extend_from_slice(&buffer[..len]);
                sink.deliver(&report);
            }
            Err(rusb::Error::Timeout) => trace!("no inbound report"),
            Err(error) => {
                warn!(%error, "stopping USB report reader");
                break;
            }
        }
    }
}
