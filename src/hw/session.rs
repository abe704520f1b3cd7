use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

use super::hardware::HidTransport;
use super::mailbox::ReportMailbox;
use super::model::{DisplayMode, UsbDeviceId};
use crate::error::DmdError;
use crate::handlers::{
    Access, ControlCommand, CorrelatedResponse, CorrelatorBudget, DisplayModeHandler, FrameCodec,
    ResponseCorrelator,
};
use crate::protocol::{RAW_FRAME_LEN, RESERVED_SEQUENCE_BYTE, UsbCommand};
use crate::response::DeviceResponse;
use crate::utils::format_hex;

const FIRST_SEQUENCE_BYTE: u8 = 0x01;

/// Open connection to one controller.
///
/// Commands are serialised: each command-response cycle holds the session lock
/// from send until its response is correlated, so only one command is ever in
/// flight.
#[derive(Debug)]
pub struct DeviceSession {
    device: UsbDeviceId,
    transport: Arc<dyn HidTransport>,
    mailbox: ReportMailbox,
    budget: CorrelatorBudget,
    state: Mutex<SessionState>,
}

#[derive(Debug)]
struct SessionState {
    current_mode: Option<DisplayMode>,
    last_response: Option<DeviceResponse>,
    next_sequence_byte: u8,
}

impl SessionState {
    fn take_sequence_byte(&mut self) -> u8 {
        let sequence_byte = self.next_sequence_byte;
        let mut next = sequence_byte.wrapping_add(1);
        while next == 0 || next == RESERVED_SEQUENCE_BYTE {
            next = next.wrapping_add(1);
        }
        self.next_sequence_byte = next;
        sequence_byte
    }
}

impl DeviceSession {
    /// Wraps an opened transport and reads the current display mode.
    pub(crate) async fn establish(
        device: UsbDeviceId,
        transport: Arc<dyn HidTransport>,
        mailbox: ReportMailbox,
    ) -> Result<Self, DmdError> {
        let session = Self {
            device,
            transport,
            mailbox,
            budget: CorrelatorBudget::default(),
            state: Mutex::new(SessionState {
                current_mode: None,
                last_response: None,
                next_sequence_byte: FIRST_SEQUENCE_BYTE,
            }),
        };
        let mode = DisplayModeHandler::query(&session).await?;
        debug!(%mode, "read display mode at open");
        Ok(session)
    }

    /// Identifiers of the connected controller.
    #[must_use]
    pub fn device(&self) -> UsbDeviceId {
        self.device
    }

    /// Last known display mode.
    ///
    /// Seeded by the mode read at open and updated after every successful
    /// mode change issued through this session.
    pub async fn current_mode(&self) -> Option<DisplayMode> {
        self.state.lock().await.current_mode
    }

    /// Most recent correlated response.
    pub async fn last_response(&self) -> Option<DeviceResponse> {
        self.state.lock().await.last_response.clone()
    }

    #[must_use]
    pub fn correlator_budget(&self) -> CorrelatorBudget {
        self.budget
    }

    /// Replaces the polling budget used for every later command.
    #[must_use]
    pub fn with_correlator_budget(mut self, budget: CorrelatorBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Sends one control command with an arbitrary selector and waits for its
    /// response.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload does not fit one frame, the transport
    /// fails, no response arrives in time, or the device reports an error code.
    pub async fn execute(
        &self,
        access: Access,
        usb_code: u16,
        payload: Vec<u8>,
    ) -> Result<CorrelatedResponse, DmdError> {
        self.lock().await.execute(access, usb_code, payload).await
    }

    /// Stops inbound report delivery and releases the device.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot release the device.
    #[instrument(skip(self), level = "debug", fields(device = %self.device))]
    pub async fn close(self) -> Result<(), DmdError> {
        self.transport.close().await?;
        Ok(())
    }

    /// Acquires exclusive use of the session for one or more commands.
    pub(crate) async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            session: self,
            state: self.state.lock().await,
        }
    }
}

/// Exclusive access to a session while commands are in flight.
pub(crate) struct SessionGuard<'a> {
    session: &'a DeviceSession,
    state: MutexGuard<'a, SessionState>,
}

impl SessionGuard<'_> {
    /// Runs one full command-response cycle.
    ///
    /// The frame is encoded before the mailbox is touched, so oversize payloads
    /// fail without any I/O.
    #[instrument(
        skip(self, payload),
        level = "debug",
        fields(%access, usb_code = format_args!("0x{usb_code:04X}"), payload_len = payload.len())
    )]
    pub(crate) async fn execute(
        &mut self,
        access: Access,
        usb_code: u16,
        payload: Vec<u8>,
    ) -> Result<CorrelatedResponse, DmdError> {
        let sequence_byte = self.state.take_sequence_byte();
        let command = ControlCommand::builder()
            .access(access)
            .sequence_byte(sequence_byte)
            .usb_code(usb_code)
            .payload(payload)
            .build();
        let frame = FrameCodec::encode_control(&command)?;

        self.session.mailbox.clear();
        debug!(sequence_byte, frame = %format_hex(&frame), "sending control frame");
        self.session.transport.send_report(&frame).await?;

        let correlated =
            ResponseCorrelator::new(self.session.transport.as_ref(), &self.session.mailbox)
                .await_response(sequence_byte, self.session.budget)
                .await?;
        self.state.last_response = Some(correlated.response().clone());
        Ok(correlated)
    }

    pub(crate) async fn write(
        &mut self,
        command: UsbCommand,
        payload: Vec<u8>,
    ) -> Result<CorrelatedResponse, DmdError> {
        self.execute(Access::Write, command.code(), payload).await
    }

    pub(crate) async fn read(
        &mut self,
        command: UsbCommand,
        payload: Vec<u8>,
    ) -> Result<CorrelatedResponse, DmdError> {
        self.execute(Access::Read, command.code(), payload).await
    }

    /// Sends one headerless frame without waiting for a response.
    pub(crate) async fn send_raw_frame(
        &mut self,
        frame: &[u8; RAW_FRAME_LEN],
    ) -> Result<(), DmdError> {
        self.session.transport.send_report(frame).await?;
        Ok(())
    }

    pub(crate) fn current_mode(&self) -> Option<DisplayMode> {
        self.state.current_mode
    }

    pub(crate) fn set_current_mode(&mut self, mode: DisplayMode) {
        self.state.current_mode = Some(mode);
    }
}
