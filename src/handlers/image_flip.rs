use tracing::instrument;

use crate::error::DmdError;
use crate::hw::{DeviceSession, SessionGuard};
use crate::protocol::UsbCommand;

const FLIP_ENABLED: u8 = 0x80;

/// Axis along which the displayed image is mirrored.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FlipAxis {
    /// Left-right mirror.
    Long,
    /// Up-down mirror.
    Short,
}

impl FlipAxis {
    const fn command(self) -> UsbCommand {
        match self {
            Self::Long => UsbCommand::LongAxisFlip,
            Self::Short => UsbCommand::ShortAxisFlip,
        }
    }
}

/// Handler for long and short axis image flips.
pub struct ImageFlipHandler;

impl ImageFlipHandler {
    fn payload_for(enabled: bool) -> Vec<u8> {
        vec![if enabled { FLIP_ENABLED } else { 0x00 }]
    }

    /// Enables or disables mirroring along `axis`.
    ///
    /// ```
    /// # async fn demo(session: dlpc::DeviceSession) -> Result<(), dlpc::DmdError> {
    /// use dlpc::{FlipAxis, ImageFlipHandler};
    ///
    /// ImageFlipHandler::set_flip(&session, FlipAxis::Long, true).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the device rejects it.
    #[instrument(skip(session), level = "info", fields(%axis))]
    pub async fn set_flip(
        session: &DeviceSession,
        axis: FlipAxis,
        enabled: bool,
    ) -> Result<(), DmdError> {
        let mut guard = session.lock().await;
        Self::set_flip_locked(&mut guard, axis, enabled).await
    }

    pub(crate) async fn set_flip_locked(
        guard: &mut SessionGuard<'_>,
        axis: FlipAxis,
        enabled: bool,
    ) -> Result<(), DmdError> {
        guard
            .write(axis.command(), Self::payload_for(enabled))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(true, vec![0x80])]
    #[case(false, vec![0x00])]
    fn payload_for_flip_matches_protocol(#[case] enabled: bool, #[case] expected: Vec<u8>) {
        assert_eq!(expected, ImageFlipHandler::payload_for(enabled));
    }

    #[test]
    fn axes_map_to_their_selectors() {
        assert_eq!(0x1008, FlipAxis::Long.command().code());
        assert_eq!(0x1009, FlipAxis::Short.command().code());
    }
}
