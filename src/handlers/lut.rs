use bon::Builder;
use tracing::{debug, instrument};

use crate::error::{DmdError, PreconditionError};
use crate::hw::{DeviceSession, SessionGuard};
use crate::media::{MAX_SEQUENCE_LEN, MIN_EXPOSURE_TIME_US, Pattern, validate_timing};
use crate::protocol::UsbCommand;

const MAX_PATTERN_INDEX: u16 = 255;
const TRIGGER_BIT: u8 = 0x80;
const BIT_DEPTH_SHIFT: u8 = 1;
const FLICKER_BIT: u8 = 0x01;
const TRIGGER_2_OUTPUT: u8 = 0x00;

/// One pattern display LUT definition.
///
/// LEDs stay disabled for every entry.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Builder)]
pub struct LutEntry {
    pattern_index: u16,
    #[builder(default = MIN_EXPOSURE_TIME_US)]
    exposure_time_us: u32,
    #[builder(default)]
    dark_time_us: u32,
    #[builder(default = 1)]
    bit_depth: u8,
    #[builder(default = true)]
    flicker_active: bool,
    #[builder(default)]
    wait_for_trigger: bool,
}

impl LutEntry {
    /// Builds the entry describing `pattern` at LUT slot `pattern_index`.
    #[must_use]
    pub fn for_pattern(pattern_index: u16, pattern: &Pattern) -> Self {
        Self {
            pattern_index,
            exposure_time_us: pattern.exposure_time_us(),
            dark_time_us: pattern.dark_time_us(),
            bit_depth: pattern.bit_depth(),
            flicker_active: pattern.flicker_active(),
            wait_for_trigger: pattern.wait_for_trigger(),
        }
    }

    /// Forces the entry to wait for a trigger before displaying.
    #[must_use]
    pub fn waiting_for_trigger(mut self) -> Self {
        self.wait_for_trigger = true;
        self
    }

    #[must_use]
    pub fn pattern_index(&self) -> u16 {
        self.pattern_index
    }

    /// Packs the trigger, LED, bit-depth and flicker settings into one byte.
    ///
    /// ```
    /// use dlpc::LutEntry;
    ///
    /// let entry = LutEntry::builder().pattern_index(0).bit_depth(8).build();
    /// assert_eq!(0b0000_1111, entry.flag_byte());
    /// ```
    #[must_use]
    pub fn flag_byte(&self) -> u8 {
        let mut flags = self.bit_depth.saturating_sub(1) << BIT_DEPTH_SHIFT;
        if self.wait_for_trigger {
            flags |= TRIGGER_BIT;
        }
        if self.flicker_active {
            flags |= FLICKER_BIT;
        }
        flags
    }

    /// Encodes the 12-byte LUT definition payload.
    ///
    /// # Errors
    ///
    /// Returns a precondition error when the index, timing or bit depth is out
    /// of range.
    pub fn encode(&self) -> Result<Vec<u8>, PreconditionError> {
        if self.pattern_index > MAX_PATTERN_INDEX {
            return Err(PreconditionError::PatternIndexOutOfRange {
                index: self.pattern_index,
            });
        }
        validate_timing(self.exposure_time_us, self.dark_time_us, self.bit_depth)?;

        let index = self.pattern_index.to_le_bytes();
        let mut payload = Vec::with_capacity(12);
        payload.extend_from_slice(&index);
        payload.extend_from_slice(&self.exposure_time_us.to_le_bytes()[..3]);
        payload.push(self.flag_byte());
        payload.extend_from_slice(&self.dark_time_us.to_le_bytes()[..3]);
        payload.push(TRIGGER_2_OUTPUT);
        payload.extend_from_slice(&index);
        Ok(payload)
    }
}

/// Handler for LUT definition and execution configuration.
pub struct LutHandler;

impl LutHandler {
    fn configuration_payload(
        pattern_count: usize,
        number_of_repeats: u32,
    ) -> Result<Vec<u8>, PreconditionError> {
        if pattern_count == 0 {
            return Err(PreconditionError::EmptySequence);
        }
        let count = u16::try_from(pattern_count)
            .ok()
            .filter(|_fits| pattern_count <= MAX_SEQUENCE_LEN)
            .ok_or(PreconditionError::SequenceTooLong {
                len: pattern_count,
                max: MAX_SEQUENCE_LEN,
            })?;

        let mut payload = Vec::with_capacity(6);
        payload.extend_from_slice(&count.to_le_bytes());
        payload.extend_from_slice(&number_of_repeats.to_le_bytes());
        Ok(payload)
    }

    /// Defines one LUT entry.
    ///
    /// ```
    /// # async fn demo(session: dlpc::DeviceSession) -> Result<(), dlpc::DmdError> {
    /// use dlpc::{LutEntry, LutHandler};
    ///
    /// let entry = LutEntry::builder().pattern_index(0).exposure_time_us(20_000).build();
    /// LutHandler::define(&session, &entry).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a precondition error before any I/O when the entry is invalid,
    /// otherwise any command failure.
    #[instrument(skip(session), level = "info", fields(pattern_index = entry.pattern_index))]
    pub async fn define(session: &DeviceSession, entry: &LutEntry) -> Result<(), DmdError> {
        let payload = entry.encode()?;
        session
            .lock()
            .await
            .write(UsbCommand::LutDefinition, payload)
            .await?;
        Ok(())
    }

    /// Sets how many LUT entries play and how often the sequence repeats.
    ///
    /// `number_of_repeats == 0` repeats until stopped.
    ///
    /// # Errors
    ///
    /// Returns a precondition error before any I/O when the count is outside
    /// 1..=256, otherwise any command failure.
    #[instrument(skip(session), level = "info")]
    pub async fn configure(
        session: &DeviceSession,
        pattern_count: usize,
        number_of_repeats: u32,
    ) -> Result<(), DmdError> {
        let payload = Self::configuration_payload(pattern_count, number_of_repeats)?;
        session
            .lock()
            .await
            .write(UsbCommand::LutConfiguration, payload)
            .await?;
        Ok(())
    }

    pub(crate) async fn define_locked(
        guard: &mut SessionGuard<'_>,
        payload: Vec<u8>,
    ) -> Result<(), DmdError> {
        debug!(payload_len = payload.len(), "defining LUT entry");
        guard.write(UsbCommand::LutDefinition, payload).await?;
        Ok(())
    }

    pub(crate) async fn configure_locked(
        guard: &mut SessionGuard<'_>,
        pattern_count: usize,
        number_of_repeats: u32,
    ) -> Result<(), DmdError> {
        let payload = Self::configuration_payload(pattern_count, number_of_repeats)?;
        guard.write(UsbCommand::LutConfiguration, payload).await?;
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
    #[case(false, 1, true, 0b0000_0001)]
    #[case(true, 1, true, 0b1000_0001)]
    #[case(false, 1, false, 0b0000_0000)]
    #[case(true, 8, false, 0b1000_1110)]
    #[case(false, 4, true, 0b0000_0111)]
    fn flag_byte_matches_protocol(
        #[case] wait_for_trigger: bool,
        #[case] bit_depth: u8,
        #[case] flicker_active: bool,
        #[case] expected: u8,
    ) {
        let entry = LutEntry::builder()
            .pattern_index(0)
            .wait_for_trigger(wait_for_trigger)
            .bit_depth(bit_depth)
            .flicker_active(flicker_active)
            .build();

        assert_eq!(expected, entry.flag_byte());
    }

    #[test]
    fn definition_payload_matches_protocol() {
        let entry = LutEntry::builder()
            .pattern_index(2)
            .exposure_time_us(0x01_2345)
            .dark_time_us(0x00_0105)
            .build();

        let payload = entry.encode().expect("valid entry should encode");

        assert_eq!(
            vec![
                0x02, 0x00, 0x45, 0x23, 0x01, 0x01, 0x05, 0x01, 0x00, 0x00, 0x02, 0x00
            ],
            payload
        );
    }

    #[rstest]
    #[case(LutEntry::builder().pattern_index(0).exposure_time_us(104).build())]
    #[case(LutEntry::builder().pattern_index(256).build())]
    #[case(LutEntry::builder().pattern_index(0).bit_depth(0).build())]
    #[case(LutEntry::builder().pattern_index(0).dark_time_us(0x0100_0000).build())]
    fn invalid_entries_are_preconditions(#[case] entry: LutEntry) {
        assert!(entry.encode().is_err());
    }

    #[test]
    fn short_exposure_names_the_minimum() {
        let entry = LutEntry::builder().pattern_index(0).exposure_time_us(104).build();

        assert_matches!(
            entry.encode(),
            Err(PreconditionError::ExposureTooShort {
                exposure_time_us: 104,
                min_us: 105,
            })
        );
    }

    #[rstest]
    #[case(3, 0, vec![0x03, 0x00, 0x00, 0x00, 0x00, 0x00])]
    #[case(256, 10, vec![0x00, 0x01, 0x0A, 0x00, 0x00, 0x00])]
    fn configuration_payload_matches_protocol(
        #[case] pattern_count: usize,
        #[case] number_of_repeats: u32,
        #[case] expected: Vec<u8>,
    ) {
        assert_eq!(
            expected,
            LutHandler::configuration_payload(pattern_count, number_of_repeats)
                .expect("count within range should encode")
        );
    }

    #[test]
    fn configuration_rejects_oversized_count() {
        assert_matches!(
            LutHandler::configuration_payload(257, 0),
            Err(PreconditionError::SequenceTooLong { len: 257, max: 256 })
        );
    }
}
