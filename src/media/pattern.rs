use std::str::FromStr;

use bon::Builder;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::PreconditionError;

use super::{Resolution, Rgb888Frame};

/// Shortest exposure, trigger delay and LUT timing the controller accepts.
pub const MIN_EXPOSURE_TIME_US: u32 = 105;
/// Largest value a 3-byte LUT timing field can carry.
pub const MAX_LUT_TIME_US: u32 = 0x00FF_FFFF;
/// Maximum number of LUT slots.
pub const MAX_SEQUENCE_LEN: usize = 256;

const DEFAULT_EXPOSURE_TIME_US: u32 = MIN_EXPOSURE_TIME_US;
const DEFAULT_BIT_DEPTH: u8 = 1;

/// Image compression applied before upload.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Compression {
    /// One bit per channel, packed MSB first.
    #[default]
    None,
    /// Per-row run-length records.
    Rle,
}

impl Compression {
    /// Returns the compression-type byte written at header offset 25.
    ///
    /// ```
    /// use dlpc::Compression;
    ///
    /// assert_eq!(0, Compression::None.header_byte());
    /// assert_eq!(1, Compression::Rle.header_byte());
    /// ```
    #[must_use]
    pub const fn header_byte(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Rle => 0x01,
        }
    }

    /// Parses a compression name, rejecting anything but `none` and `rle`.
    ///
    /// ```
    /// use dlpc::Compression;
    ///
    /// assert_eq!(Compression::Rle, Compression::from_name("rle")?);
    /// assert!(Compression::from_name("erle").is_err());
    /// # Ok::<(), dlpc::PreconditionError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::UnknownName`] for unsupported names.
    pub fn from_name(name: &str) -> Result<Self, PreconditionError> {
        Self::from_str(name).map_err(|_error| PreconditionError::UnknownName {
            kind: "compression",
            value: name.to_string(),
        })
    }
}

/// One displayable image plus its LUT timing attributes.
///
/// Validation happens when the pattern is placed into a [`PatternSequence`] and
/// again when its LUT entry is encoded.
#[derive(Debug, Clone, Eq, PartialEq, Builder)]
pub struct Pattern {
    frame: Rgb888Frame,
    #[builder(default)]
    compression: Compression,
    #[builder(default = DEFAULT_EXPOSURE_TIME_US)]
    exposure_time_us: u32,
    #[builder(default)]
    dark_time_us: u32,
    #[builder(default = DEFAULT_BIT_DEPTH)]
    bit_depth: u8,
    #[builder(default = true)]
    flicker_active: bool,
    #[builder(default)]
    wait_for_trigger: bool,
}

impl Pattern {
    /// Creates a pattern with default timing for `frame`.
    ///
    /// ```
    /// use dlpc::{Compression, Pattern, Resolution, Rgb888Frame};
    ///
    /// let frame = Rgb888Frame::filled(Resolution::NATIVE, [0, 0, 0])?;
    /// let pattern = Pattern::new(frame);
    /// assert_eq!(Compression::None, pattern.compression());
    /// assert_eq!(105, pattern.exposure_time_us());
    /// assert_eq!(0, pattern.dark_time_us());
    /// assert_eq!(1, pattern.bit_depth());
    /// assert!(pattern.flicker_active());
    /// assert!(!pattern.wait_for_trigger());
    /// # Ok::<(), dlpc::Rgb888FrameError>(())
    /// ```
    #[must_use]
    pub fn new(frame: Rgb888Frame) -> Self {
        Self::builder().frame(frame).build()
    }

    /// Checks the timing and bit-depth attributes against the device limits.
    ///
    /// # Errors
    ///
    /// Returns a [`PreconditionError`] naming the first violated limit.
    pub fn validate(&self) -> Result<(), PreconditionError> {
        validate_timing(self.exposure_time_us, self.dark_time_us, self.bit_depth)
    }

    #[must_use]
    pub fn frame(&self) -> &Rgb888Frame {
        &self.frame
    }

    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.frame.resolution()
    }

    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[must_use]
    pub fn exposure_time_us(&self) -> u32 {
        self.exposure_time_us
    }

    #[must_use]
    pub fn dark_time_us(&self) -> u32 {
        self.dark_time_us
    }

    #[must_use]
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    #[must_use]
    pub fn flicker_active(&self) -> bool {
        self.flicker_active
    }

    #[must_use]
    pub fn wait_for_trigger(&self) -> bool {
        self.wait_for_trigger
    }
}

pub(crate) fn validate_timing(
    exposure_time_us: u32,
    dark_time_us: u32,
    bit_depth: u8,
) -> Result<(), PreconditionError> {
    if exposure_time_us < MIN_EXPOSURE_TIME_US {
        return Err(PreconditionError::ExposureTooShort {
            exposure_time_us,
            min_us: MIN_EXPOSURE_TIME_US,
        });
    }
    if exposure_time_us > MAX_LUT_TIME_US {
        return Err(PreconditionError::TimeOutOfRange {
            field: "exposure time",
            value_us: exposure_time_us,
            max_us: MAX_LUT_TIME_US,
        });
    }
    if dark_time_us > MAX_LUT_TIME_US {
        return Err(PreconditionError::TimeOutOfRange {
            field: "dark time",
            value_us: dark_time_us,
            max_us: MAX_LUT_TIME_US,
        });
    }
    if !(1..=8).contains(&bit_depth) {
        return Err(PreconditionError::BitDepthOutOfRange { bit_depth });
    }
    Ok(())
}

/// Ordered patterns, one per LUT slot, plus the LUT repeat count.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PatternSequence {
    patterns: Vec<Pattern>,
    number_of_repeats: u32,
}

impl PatternSequence {
    /// Builds a sequence after validating every pattern.
    ///
    /// `number_of_repeats == 0` repeats the sequence until stopped.
    ///
    /// # Errors
    ///
    /// Returns an error when the sequence is empty, longer than 256 patterns,
    /// or holds a pattern with out-of-range timing.
    pub fn new(patterns: Vec<Pattern>, number_of_repeats: u32) -> Result<Self, PreconditionError> {
        if patterns.is_empty() {
            return Err(PreconditionError::EmptySequence);
        }
        if patterns.len() > MAX_SEQUENCE_LEN {
            return Err(PreconditionError::SequenceTooLong {
                len: patterns.len(),
                max: MAX_SEQUENCE_LEN,
            });
        }
        for pattern in &patterns {
            pattern.validate()?;
        }

        Ok(Self {
            patterns,
            number_of_repeats,
        })
    }

    /// Builds a sequence that repeats until playback is stopped.
    ///
    /// # Errors
    ///
    /// Same as [`PatternSequence::new`].
    pub fn repeat_forever(patterns: Vec<Pattern>) -> Result<Self, PreconditionError> {
        Self::new(patterns, 0)
    }

    #[must_use]
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    #[must_use]
    pub fn number_of_repeats(&self) -> u32 {
        self.number_of_repeats
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn black_pattern() -> Pattern {
        let resolution = Resolution::new(2, 2).expect("2x2 should be valid");
        let frame = Rgb888Frame::filled(resolution, [0, 0, 0]).expect("2x2 frame should build");
        Pattern::new(frame)
    }

    #[rstest]
    #[case("none", Compression::None)]
    #[case("rle", Compression::Rle)]
    fn compression_parses_known_names(#[case] name: &str, #[case] expected: Compression) {
        let parsed = Compression::from_name(name).expect("known compression should parse");
        assert_eq!(expected, parsed);
    }

    #[rstest]
    #[case("erle")]
    #[case("zip")]
    fn compression_rejects_unknown_names(#[case] name: &str) {
        assert_matches!(
            Compression::from_name(name),
            Err(PreconditionError::UnknownName { kind: "compression", value }) if value == name
        );
    }

    #[rstest]
    #[case(104, 0, 1)]
    #[case(105, 0x0100_0000, 1)]
    #[case(0x0100_0000, 0, 1)]
    #[case(105, 0, 0)]
    #[case(105, 0, 9)]
    fn pattern_validation_rejects_out_of_range_attributes(
        #[case] exposure_time_us: u32,
        #[case] dark_time_us: u32,
        #[case] bit_depth: u8,
    ) {
        let pattern = Pattern::builder()
            .frame(black_pattern().frame().clone())
            .exposure_time_us(exposure_time_us)
            .dark_time_us(dark_time_us)
            .bit_depth(bit_depth)
            .build();

        assert!(pattern.validate().is_err());
    }

    #[test]
    fn exposure_below_minimum_is_reported_with_limit() {
        let pattern = Pattern::builder()
            .frame(black_pattern().frame().clone())
            .exposure_time_us(104)
            .build();

        assert_eq!(
            Err(PreconditionError::ExposureTooShort {
                exposure_time_us: 104,
                min_us: 105,
            }),
            pattern.validate()
        );
    }

    #[test]
    fn sequence_accepts_full_lut() {
        let patterns = vec![black_pattern(); MAX_SEQUENCE_LEN];

        let sequence =
            PatternSequence::new(patterns, 3).expect("256 patterns should fit the LUT");

        assert_eq!(256, sequence.len());
        assert_eq!(3, sequence.number_of_repeats());
    }

    #[test]
    fn sequence_rejects_more_than_256_patterns() {
        let patterns = vec![black_pattern(); MAX_SEQUENCE_LEN + 1];

        assert_eq!(
            Err(PreconditionError::SequenceTooLong { len: 257, max: 256 }),
            PatternSequence::new(patterns, 0)
        );
    }

    #[test]
    fn sequence_rejects_empty_pattern_list() {
        assert_eq!(
            Err(PreconditionError::EmptySequence),
            PatternSequence::repeat_forever(Vec::new())
        );
    }
}
