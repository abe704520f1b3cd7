use std::fmt;

use strum_macros::{Display, EnumIter};

use crate::error::ResponseError;
use crate::protocol::{ANSWER_DATA_OFFSET, FLAG_BYTE_OFFSET, REPORT_LEN, SEQUENCE_BYTE_OFFSET};

// Third bit from the MSB of the flag byte.
const ERROR_FLAG: u8 = 0x20;
const LENGTH_OFFSET: usize = 3;

/// Meaning of a controller error code.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumIter)]
pub enum DeviceErrorKind {
    #[strum(to_string = "no error")]
    NoError,
    #[strum(to_string = "batch file checksum error")]
    BatchFileChecksum,
    #[strum(to_string = "device failure")]
    DeviceFailure,
    #[strum(to_string = "invalid command number")]
    InvalidCommandNumber,
    #[strum(to_string = "incompatible controller/dmd")]
    IncompatibleController,
    #[strum(to_string = "command not allowed in current mode")]
    CommandNotAllowedInMode,
    #[strum(to_string = "invalid command parameter")]
    InvalidCommandParameter,
    #[strum(to_string = "item referred by the parameter is not present")]
    ItemNotPresent,
    #[strum(to_string = "out of resource/RAM")]
    OutOfResource,
    #[strum(to_string = "invalid bmp compression type")]
    InvalidBmpCompression,
    #[strum(to_string = "pattern bit number out of range")]
    PatternBitNumberOutOfRange,
    #[strum(to_string = "pattern bmp not present in flash")]
    PatternBmpNotInFlash,
    #[strum(to_string = "pattern dark time out of range")]
    DarkTimeOutOfRange,
    #[strum(to_string = "signal delay parameter out of range")]
    SignalDelayOutOfRange,
    #[strum(to_string = "pattern exposure time is out of range")]
    ExposureTimeOutOfRange,
    #[strum(to_string = "pattern number is out of range")]
    PatternNumberOutOfRange,
    #[strum(to_string = "invalid pattern definition")]
    InvalidPatternDefinition,
    #[strum(to_string = "pattern image memory address is out of range")]
    ImageAddressOutOfRange,
    #[strum(to_string = "internal error")]
    Internal,
    #[strum(to_string = "undefined error")]
    Undefined,
}

/// Error code read back from the controller error register.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, derive_more::From, derive_more::Into)]
pub struct DeviceErrorCode(u8);

impl DeviceErrorCode {
    /// Creates an error code wrapper.
    #[must_use]
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns whether the code reports a failure.
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 != 0
    }

    /// Maps the code to its documented meaning.
    ///
    /// ```
    /// use dlpc::{DeviceErrorCode, DeviceErrorKind};
    ///
    /// assert_eq!(DeviceErrorKind::InvalidBmpCompression, DeviceErrorCode::new(9).kind());
    /// assert_eq!(DeviceErrorKind::Undefined, DeviceErrorCode::new(200).kind());
    /// assert_eq!(DeviceErrorKind::Internal, DeviceErrorCode::new(255).kind());
    /// ```
    #[must_use]
    pub const fn kind(self) -> DeviceErrorKind {
        match self.0 {
            0 => DeviceErrorKind::NoError,
            1 => DeviceErrorKind::BatchFileChecksum,
            2 => DeviceErrorKind::DeviceFailure,
            3 => DeviceErrorKind::InvalidCommandNumber,
            4 => DeviceErrorKind::IncompatibleController,
            5 => DeviceErrorKind::CommandNotAllowedInMode,
            6 => DeviceErrorKind::InvalidCommandParameter,
            7 => DeviceErrorKind::ItemNotPresent,
            8 => DeviceErrorKind::OutOfResource,
            9 => DeviceErrorKind::InvalidBmpCompression,
            10 => DeviceErrorKind::PatternBitNumberOutOfRange,
            11 => DeviceErrorKind::PatternBmpNotInFlash,
            12 => DeviceErrorKind::DarkTimeOutOfRange,
            13 => DeviceErrorKind::SignalDelayOutOfRange,
            14 => DeviceErrorKind::ExposureTimeOutOfRange,
            15 => DeviceErrorKind::PatternNumberOutOfRange,
            16 => DeviceErrorKind::InvalidPatternDefinition,
            17 => DeviceErrorKind::ImageAddressOutOfRange,
            255 => DeviceErrorKind::Internal,
            _ => DeviceErrorKind::Undefined,
        }
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.0, self.kind())
    }
}

/// One 65-byte inbound report matched to a command.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeviceResponse {
    report: [u8; REPORT_LEN],
}

impl DeviceResponse {
    /// Validates the size of a report whose sequence byte matched.
    pub(crate) fn decode(sequence_byte: u8, report: &[u8]) -> Result<Self, ResponseError> {
        let report =
            <[u8; REPORT_LEN]>::try_from(report).map_err(|_size| ResponseError::MalformedResponse {
                sequence_byte,
                detail: format!("expected {REPORT_LEN}-byte report, got {} bytes", report.len()),
            })?;
        Ok(Self { report })
    }

    #[must_use]
    pub fn flags(&self) -> u8 {
        self.report[FLAG_BYTE_OFFSET]
    }

    #[must_use]
    pub fn sequence_byte(&self) -> u8 {
        self.report[SEQUENCE_BYTE_OFFSET]
    }

    /// Returns whether the device flagged the command as failed.
    #[must_use]
    pub fn error_flag(&self) -> bool {
        self.flags() & ERROR_FLAG != 0
    }

    /// Answer length declared by the device.
    #[must_use]
    pub fn declared_len(&self) -> u16 {
        u16::from_le_bytes([self.report[LENGTH_OFFSET], self.report[LENGTH_OFFSET + 1]])
    }

    /// Answer bytes from offset 5 to the end of the report.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.report[ANSWER_DATA_OFFSET..]
    }

    /// First answer byte, where single-value reads place their result.
    #[must_use]
    pub fn first_data_byte(&self) -> u8 {
        self.report[ANSWER_DATA_OFFSET]
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; REPORT_LEN] {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, "no error")]
    #[case(1, "batch file checksum error")]
    #[case(5, "command not allowed in current mode")]
    #[case(9, "invalid bmp compression type")]
    #[case(17, "pattern image memory address is out of range")]
    #[case(18, "undefined error")]
    #[case(200, "undefined error")]
    #[case(254, "undefined error")]
    #[case(255, "internal error")]
    fn error_codes_map_to_documented_meaning(#[case] code: u8, #[case] meaning: &str) {
        assert_eq!(meaning, DeviceErrorCode::new(code).kind().to_string());
    }

    #[test]
    fn error_code_display_includes_number_and_meaning() {
        assert_eq!(
            "14: pattern exposure time is out of range",
            DeviceErrorCode::new(14).to_string()
        );
        assert!(!DeviceErrorCode::new(0).is_error());
    }

    #[test]
    fn response_exposes_flag_and_answer_bytes() {
        let mut report = [0u8; REPORT_LEN];
        report[1] = 0x60;
        report[2] = 0x14;
        report[3] = 0x01;
        report[5] = 0x03;

        let response = DeviceResponse::decode(0x14, &report).expect("65-byte report should decode");

        assert!(response.error_flag());
        assert_eq!(0x14, response.sequence_byte());
        assert_eq!(1, response.declared_len());
        assert_eq!(0x03, response.first_data_byte());
    }

    #[test]
    fn short_report_is_malformed() {
        assert_matches!(
            DeviceResponse::decode(0x10, &[0x00, 0x40, 0x10]),
            Err(ResponseError::MalformedResponse {
                sequence_byte: 0x10,
                ..
            })
        );
    }
}
