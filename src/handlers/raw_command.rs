use tracing::instrument;

use crate::error::DmdError;
use crate::hw::DeviceSession;

use super::correlator::CorrelatedResponse;
use super::frame_codec::Access;

/// Handler for commands addressed by bare selector value.
pub struct RawCommandHandler;

impl RawCommandHandler {
    /// Sends a write to `usb_code` and returns the correlated response.
    ///
    /// ```
    /// # async fn demo(session: dlpc::DeviceSession) -> Result<(), dlpc::DmdError> {
    /// use dlpc::RawCommandHandler;
    ///
    /// RawCommandHandler::write(&session, 0x0201, vec![0x00]).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the payload exceeds one frame, the transport fails,
    /// the response times out, or the device reports an error code.
    #[instrument(skip(session, payload), level = "info", fields(usb_code = format_args!("0x{usb_code:04X}")))]
    pub async fn write(
        session: &DeviceSession,
        usb_code: u16,
        payload: Vec<u8>,
    ) -> Result<CorrelatedResponse, DmdError> {
        session.execute(Access::Write, usb_code, payload).await
    }

    /// Sends a read to `usb_code` and returns the correlated response.
    ///
    /// # Errors
    ///
    /// Same as [`RawCommandHandler::write`].
    #[instrument(skip(session, payload), level = "info", fields(usb_code = format_args!("0x{usb_code:04X}")))]
    pub async fn read(
        session: &DeviceSession,
        usb_code: u16,
        payload: Vec<u8>,
    ) -> Result<CorrelatedResponse, DmdError> {
        session.execute(Access::Read, usb_code, payload).await
    }
}
