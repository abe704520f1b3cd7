use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};
use tracing::{info, instrument};

use crate::error::{DmdError, PreconditionError};
use crate::hw::{DeviceSession, DisplayMode, SessionGuard};
use crate::protocol::UsbCommand;

/// Pattern sequence playback command.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum PlaybackAction {
    /// Start, or resume after a pause.
    Start,
    /// Stop; the next start begins from the first pattern.
    Stop,
    /// Pause; the next start re-displays the current pattern.
    Pause,
}

impl PlaybackAction {
    /// Returns the start/stop command byte.
    ///
    /// ```
    /// use dlpc::PlaybackAction;
    ///
    /// assert_eq!(0x02, PlaybackAction::Start.as_byte());
    /// assert_eq!(0x00, PlaybackAction::Stop.as_byte());
    /// assert_eq!(0x01, PlaybackAction::Pause.as_byte());
    /// ```
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Start => 0x02,
            Self::Stop => 0x00,
            Self::Pause => 0x01,
        }
    }

    /// Parses `start`, `stop` or `pause`.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::UnknownName`] for any other value.
    pub fn from_name(name: &str) -> Result<Self, PreconditionError> {
        Self::from_str(name).map_err(|_error| PreconditionError::UnknownName {
            kind: "playback action",
            value: name.to_string(),
        })
    }
}

/// Handler for starting, stopping and pausing the pattern sequence.
pub struct PlaybackHandler;

impl PlaybackHandler {
    fn payload_for(action: PlaybackAction) -> Vec<u8> {
        vec![action.as_byte()]
    }

    /// Sends a playback command.
    ///
    /// ```
    /// # async fn demo(session: dlpc::DeviceSession) -> Result<(), dlpc::DmdError> {
    /// use dlpc::{PlaybackAction, PlaybackHandler};
    ///
    /// PlaybackHandler::control(&session, PlaybackAction::Start).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a precondition error without sending anything when the session
    /// is not in pattern-on-the-fly mode, otherwise any command failure.
    #[instrument(skip(session), level = "info", fields(%action))]
    pub async fn control(session: &DeviceSession, action: PlaybackAction) -> Result<(), DmdError> {
        let mut guard = session.lock().await;
        Self::control_locked(&mut guard, action).await
    }

    pub(crate) async fn control_locked(
        guard: &mut SessionGuard<'_>,
        action: PlaybackAction,
    ) -> Result<(), DmdError> {
        match guard.current_mode() {
            Some(DisplayMode::PatternOnTheFly) => {}
            current => {
                return Err(PreconditionError::PlaybackRequiresPatternOnTheFly {
                    action,
                    current,
                }
                .into());
            }
        }

        guard
            .write(UsbCommand::PatternStartStop, Self::payload_for(action))
            .await?;
        info!(%action, "pattern sequence playback changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(PlaybackAction::Start, vec![0x02])]
    #[case(PlaybackAction::Stop, vec![0x00])]
    #[case(PlaybackAction::Pause, vec![0x01])]
    fn payload_for_playback_matches_protocol(
        #[case] action: PlaybackAction,
        #[case] expected: Vec<u8>,
    ) {
        assert_eq!(expected, PlaybackHandler::payload_for(action));
    }

    #[test]
    fn playback_action_rejects_unknown_name() {
        assert_matches!(
            PlaybackAction::from_name("resume"),
            Err(PreconditionError::UnknownName { kind: "playback action", .. })
        );
    }
}
