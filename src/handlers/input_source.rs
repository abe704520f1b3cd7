use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};
use tracing::{info, instrument};

use crate::error::{DmdError, PreconditionError};
use crate::hw::{DeviceSession, DisplayMode};
use crate::protocol::UsbCommand;

const BIT_DEPTH_SHIFT: u8 = 3;

/// Source of the displayed image.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum InputSource {
    /// Parallel RGB/YUV interface.
    PrimaryInterface,
    InternalTestPattern,
    /// 24-bit still images stored in flash.
    FlashImage,
    SolidCurtain,
}

impl InputSource {
    const fn bits(self) -> u8 {
        match self {
            Self::PrimaryInterface => 0b000,
            Self::InternalTestPattern => 0b001,
            Self::FlashImage => 0b010,
            Self::SolidCurtain => 0b011,
        }
    }

    /// Parses a source name such as `flash_image`.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::UnknownName`] for unrecognised names.
    pub fn from_name(name: &str) -> Result<Self, PreconditionError> {
        Self::from_str(name).map_err(|_error| PreconditionError::UnknownName {
            kind: "input source",
            value: name.to_string(),
        })
    }
}

/// Bit depth of the parallel input interface.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
pub enum ParallelBitDepth {
    #[default]
    #[strum(to_string = "30", serialize = "30_bits")]
    Bits30,
    #[strum(to_string = "24", serialize = "24_bits")]
    Bits24,
    #[strum(to_string = "20", serialize = "20_bits")]
    Bits20,
    #[strum(to_string = "16", serialize = "16_bits")]
    Bits16,
}

impl ParallelBitDepth {
    const fn bits(self) -> u8 {
        match self {
            Self::Bits30 => 0b00,
            Self::Bits24 => 0b01,
            Self::Bits20 => 0b10,
            Self::Bits16 => 0b11,
        }
    }

    /// Parses `30`, `24`, `20` or `16`, with or without a `_bits` suffix.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::UnknownName`] for any other value.
    pub fn from_name(name: &str) -> Result<Self, PreconditionError> {
        Self::from_str(name).map_err(|_error| PreconditionError::UnknownName {
            kind: "parallel bit depth",
            value: name.to_string(),
        })
    }
}

/// Handler for input source configuration.
pub struct InputSourceHandler;

impl InputSourceHandler {
    fn payload_for(source: InputSource, bit_depth: ParallelBitDepth) -> Vec<u8> {
        vec![(bit_depth.bits() << BIT_DEPTH_SHIFT) | source.bits()]
    }

    /// Selects the displayed input source.
    ///
    /// The controller leaves pattern mode when the source changes, so the
    /// session records video mode afterwards.
    ///
    /// ```
    /// # async fn demo(session: dlpc::DeviceSession) -> Result<(), dlpc::DmdError> {
    /// use dlpc::{InputSource, InputSourceHandler, ParallelBitDepth};
    ///
    /// InputSourceHandler::configure(&session, InputSource::FlashImage, ParallelBitDepth::Bits24)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the device rejects it.
    #[instrument(skip(session), level = "info", fields(%source, %bit_depth))]
    pub async fn configure(
        session: &DeviceSession,
        source: InputSource,
        bit_depth: ParallelBitDepth,
    ) -> Result<(), DmdError> {
        let mut guard = session.lock().await;
        guard
            .write(UsbCommand::InputSource, Self::payload_for(source, bit_depth))
            .await?;
        guard.set_current_mode(DisplayMode::Video);
        info!(%source, "input source configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(InputSource::PrimaryInterface, ParallelBitDepth::Bits30, vec![0b0000_0000])]
    #[case(InputSource::InternalTestPattern, ParallelBitDepth::Bits30, vec![0b0000_0001])]
    #[case(InputSource::FlashImage, ParallelBitDepth::Bits24, vec![0b0000_1010])]
    #[case(InputSource::SolidCurtain, ParallelBitDepth::Bits16, vec![0b0001_1011])]
    fn payload_for_input_source_matches_protocol(
        #[case] source: InputSource,
        #[case] bit_depth: ParallelBitDepth,
        #[case] expected: Vec<u8>,
    ) {
        assert_eq!(expected, InputSourceHandler::payload_for(source, bit_depth));
    }

    #[rstest]
    #[case("24", ParallelBitDepth::Bits24)]
    #[case("16_bits", ParallelBitDepth::Bits16)]
    fn parallel_bit_depth_parses_names(#[case] name: &str, #[case] expected: ParallelBitDepth) {
        assert_eq!(
            expected,
            ParallelBitDepth::from_name(name).expect("known bit depth should parse")
        );
    }
}
