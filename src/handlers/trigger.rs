use std::str::FromStr;

use strum_macros::{Display, EnumString};
use tracing::instrument;

use crate::error::{DmdError, PreconditionError};
use crate::hw::{DeviceSession, SessionGuard};
use crate::protocol::UsbCommand;

/// Smallest TRIG_IN1 delay the controller accepts, in microseconds.
pub const MIN_TRIGGER_DELAY_US: u32 = 105;
const MAX_TRIGGER_DELAY_US: u32 = u16::MAX as u32;

/// TRIG_IN1 edge that starts the delay.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TriggerEdge {
    #[default]
    Rising,
    Falling,
}

impl TriggerEdge {
    const fn as_byte(self) -> u8 {
        match self {
            Self::Rising => 0x00,
            Self::Falling => 0x01,
        }
    }

    /// Parses `rising` or `falling`.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::UnknownName`] for any other value.
    pub fn from_name(name: &str) -> Result<Self, PreconditionError> {
        Self::from_str(name).map_err(|_error| PreconditionError::UnknownName {
            kind: "trigger edge",
            value: name.to_string(),
        })
    }
}

/// Handler for the TRIG_IN1 delay.
pub struct TriggerHandler;

impl TriggerHandler {
    fn payload_for(delay_us: u32, edge: TriggerEdge) -> Result<Vec<u8>, PreconditionError> {
        if delay_us < MIN_TRIGGER_DELAY_US {
            return Err(PreconditionError::TriggerDelayTooShort {
                delay_us,
                min_us: MIN_TRIGGER_DELAY_US,
            });
        }
        let delay = u16::try_from(delay_us).map_err(|_overflow| {
            PreconditionError::TriggerDelayOutOfRange {
                delay_us,
                max_us: MAX_TRIGGER_DELAY_US,
            }
        })?;

        let [low, high] = delay.to_le_bytes();
        Ok(vec![low, high, edge.as_byte()])
    }

    /// Sets the TRIG_IN1 delay relative to pattern display.
    ///
    /// Stop the running sequence before changing the delay.
    ///
    /// ```
    /// # async fn demo(session: dlpc::DeviceSession) -> Result<(), dlpc::DmdError> {
    /// use dlpc::{TriggerEdge, TriggerHandler};
    ///
    /// TriggerHandler::configure_trigger_in_1(&session, 105, TriggerEdge::Rising).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a precondition error without sending anything when the delay is
    /// outside 105..=65535 µs, otherwise any command failure.
    #[instrument(skip(session), level = "info", fields(%edge))]
    pub async fn configure_trigger_in_1(
        session: &DeviceSession,
        delay_us: u32,
        edge: TriggerEdge,
    ) -> Result<(), DmdError> {
        let payload = Self::payload_for(delay_us, edge)?;
        session
            .lock()
            .await
            .write(UsbCommand::TriggerIn1, payload)
            .await?;
        Ok(())
    }

    pub(crate) async fn configure_locked(
        guard: &mut SessionGuard<'_>,
        delay_us: u32,
        edge: TriggerEdge,
    ) -> Result<(), DmdError> {
        let payload = Self::payload_for(delay_us, edge)?;
        guard.write(UsbCommand::TriggerIn1, payload).await?;
        Ok(())
    }

    /// Validates a delay without building a command.
    pub(crate) fn validate_delay(delay_us: u32) -> Result<(), PreconditionError> {
        Self::payload_for(delay_us, TriggerEdge::default()).map(|_payload| ())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(105, TriggerEdge::Rising, vec![0x69, 0x00, 0x00])]
    #[case(1_000, TriggerEdge::Falling, vec![0xE8, 0x03, 0x01])]
    #[case(65_535, TriggerEdge::Rising, vec![0xFF, 0xFF, 0x00])]
    fn payload_for_trigger_matches_protocol(
        #[case] delay_us: u32,
        #[case] edge: TriggerEdge,
        #[case] expected: Vec<u8>,
    ) {
        assert_eq!(
            expected,
            TriggerHandler::payload_for(delay_us, edge).expect("delay within range should encode")
        );
    }

    #[test]
    fn delay_below_minimum_is_rejected() {
        assert_matches!(
            TriggerHandler::payload_for(104, TriggerEdge::Rising),
            Err(PreconditionError::TriggerDelayTooShort {
                delay_us: 104,
                min_us: 105,
            })
        );
    }

    #[test]
    fn delay_above_sixteen_bits_is_rejected() {
        assert_matches!(
            TriggerHandler::payload_for(65_536, TriggerEdge::Rising),
            Err(PreconditionError::TriggerDelayOutOfRange { delay_us: 65_536, .. })
        );
    }
}
