use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};
use tracing::instrument;

use crate::error::{DmdError, PreconditionError};
use crate::hw::DeviceSession;
use crate::protocol::UsbCommand;

/// Internally generated test pattern.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum TestPattern {
    SolidField,
    HorizontalRamp,
    VerticalRamp,
    HorizontalLines,
    DiagonalLines,
    VerticalLines,
    Grid,
    #[strum(to_string = "checkerboard", serialize = "checkboard")]
    Checkerboard,
    #[strum(to_string = "rgb_ramp", serialize = "RGB_ramp")]
    RgbRamp,
    ColorBars,
    NoPattern,
}

impl TestPattern {
    /// Returns the test pattern select byte.
    ///
    /// ```
    /// use dlpc::TestPattern;
    ///
    /// assert_eq!(0x06, TestPattern::Grid.as_byte());
    /// assert_eq!(0x0A, TestPattern::NoPattern.as_byte());
    /// ```
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::SolidField => 0x00,
            Self::HorizontalRamp => 0x01,
            Self::VerticalRamp => 0x02,
            Self::HorizontalLines => 0x03,
            Self::DiagonalLines => 0x04,
            Self::VerticalLines => 0x05,
            Self::Grid => 0x06,
            Self::Checkerboard => 0x07,
            Self::RgbRamp => 0x08,
            Self::ColorBars => 0x09,
            Self::NoPattern => 0x0A,
        }
    }

    /// Parses a test pattern name such as `color_bars`.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::UnknownName`] for unrecognised names.
    pub fn from_name(name: &str) -> Result<Self, PreconditionError> {
        Self::from_str(name).map_err(|_error| PreconditionError::UnknownName {
            kind: "test pattern",
            value: name.to_string(),
        })
    }
}

/// Handler for internal test pattern selection.
pub struct TestPatternHandler;

impl TestPatternHandler {
    /// Displays an internally generated test pattern.
    ///
    /// The pattern only shows while the test pattern generator is the active
    /// input source.
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the device rejects it.
    #[instrument(skip(session), level = "info", fields(%pattern))]
    pub async fn select(session: &DeviceSession, pattern: TestPattern) -> Result<(), DmdError> {
        session
            .lock()
            .await
            .write(UsbCommand::TestPatternSelect, vec![pattern.as_byte()])
            .await?;
        Ok(())
    }
}
