use tracing::{info, instrument};

use crate::error::{DmdError, ResponseError};
use crate::hw::{DeviceSession, DisplayMode, SessionGuard};
use crate::protocol::UsbCommand;

/// Handler for display mode selection and queries.
pub struct DisplayModeHandler;

impl DisplayModeHandler {
    fn payload_for(mode: DisplayMode) -> Vec<u8> {
        vec![mode.as_byte()]
    }

    /// Switches the controller to `mode` and records it on the session.
    ///
    /// ```
    /// # async fn demo(session: dlpc::DeviceSession) -> Result<(), dlpc::DmdError> {
    /// use dlpc::{DisplayMode, DisplayModeHandler};
    ///
    /// DisplayModeHandler::select(&session, DisplayMode::PatternOnTheFly).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the device rejects it.
    #[instrument(skip(session), level = "info", fields(%mode))]
    pub async fn select(session: &DeviceSession, mode: DisplayMode) -> Result<(), DmdError> {
        let mut guard = session.lock().await;
        Self::select_locked(&mut guard, mode).await
    }

    /// Reads the active display mode from the controller.
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the answer is not a known
    /// mode index.
    #[instrument(skip(session), level = "debug")]
    pub async fn query(session: &DeviceSession) -> Result<DisplayMode, DmdError> {
        let mut guard = session.lock().await;
        Self::query_locked(&mut guard).await
    }

    pub(crate) async fn select_locked(
        guard: &mut SessionGuard<'_>,
        mode: DisplayMode,
    ) -> Result<(), DmdError> {
        guard
            .write(UsbCommand::DisplayMode, Self::payload_for(mode))
            .await?;
        guard.set_current_mode(mode);
        info!(%mode, "display mode selected");
        Ok(())
    }

    pub(crate) async fn query_locked(guard: &mut SessionGuard<'_>) -> Result<DisplayMode, DmdError> {
        let correlated = guard.read(UsbCommand::DisplayMode, vec![0x00]).await?;
        let response = correlated.response();
        let index = response.first_data_byte();
        let mode = DisplayMode::from_byte(index).ok_or_else(|| ResponseError::MalformedResponse {
            sequence_byte: response.sequence_byte(),
            detail: format!("display mode index {index} is not in 0..=3"),
        })?;
        guard.set_current_mode(mode);
        Ok(mode)
    }
}
