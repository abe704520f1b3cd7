use bon::Builder;
use strum_macros::Display;
use thiserror::Error;

use crate::protocol::{
    CONTROL_FRAME_LEN, FLAG_BYTE_OFFSET, RAW_FRAME_LEN, SEQUENCE_BYTE_OFFSET, UsbCommand,
};

const READ_FLAG: u8 = 0x80;
const REPLY_FLAG: u8 = 0x40;
const LENGTH_OFFSET: usize = 3;
const USB_CODE_OFFSET: usize = 5;
const CONTROL_DATA_OFFSET: usize = 7;
const USB_CODE_LEN: usize = 2;

/// Largest data block one control frame can carry.
pub const MAX_CONTROL_PAYLOAD_LEN: usize = CONTROL_FRAME_LEN - CONTROL_DATA_OFFSET;
/// Length of the sub-header that opens every image data group.
pub const IMAGE_LOAD_HEADER_LEN: usize = 8;
/// Largest image group announced by one image load header.
pub const MAX_IMAGE_GROUP_LEN: usize = 504;

/// Errors returned by frame encoding and decoding.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameCodecError {
    /// Control data does not fit in one 65-byte frame.
    #[error("control payload is too large: {payload_len} bytes exceeds max {max_payload_len}")]
    ControlPayloadTooLarge {
        payload_len: usize,
        max_payload_len: usize,
    },
    /// Raw data does not fit in one 64-byte frame.
    #[error("raw payload is too large: {payload_len} bytes exceeds max {max_payload_len}")]
    RawPayloadTooLarge {
        payload_len: usize,
        max_payload_len: usize,
    },
    /// An image group is larger than the load header can announce.
    #[error("image group is too large: {group_len} bytes exceeds max {max_group_len}")]
    ImageGroupTooLarge {
        group_len: usize,
        max_group_len: usize,
    },
    /// A frame handed to the decoder has the wrong size.
    #[error("control frame must be {expected} bytes, got {actual}")]
    ControlFrameLength { expected: usize, actual: usize },
    /// The declared length field disagrees with the frame size.
    #[error("control frame declares {declared} payload bytes which do not fit the frame")]
    ControlLengthField { declared: usize },
}

/// Direction of a control command.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Access {
    /// The device places response data in its answer buffer.
    Read,
    /// The device applies the payload.
    Write,
}

/// One control command before framing.
#[derive(Debug, Clone, Eq, PartialEq, Builder)]
pub struct ControlCommand {
    access: Access,
    #[builder(default = true)]
    reply: bool,
    sequence_byte: u8,
    usb_code: u16,
    #[builder(default)]
    payload: Vec<u8>,
}

impl ControlCommand {
    /// Creates a reply-requesting write for a known selector.
    #[must_use]
    pub fn write(command: UsbCommand, sequence_byte: u8, payload: Vec<u8>) -> Self {
        Self::builder()
            .access(Access::Write)
            .sequence_byte(sequence_byte)
            .usb_code(command.code())
            .payload(payload)
            .build()
    }

    /// Creates a reply-requesting read for a known selector.
    #[must_use]
    pub fn read(command: UsbCommand, sequence_byte: u8, payload: Vec<u8>) -> Self {
        Self::builder()
            .access(Access::Read)
            .sequence_byte(sequence_byte)
            .usb_code(command.code())
            .payload(payload)
            .build()
    }

    #[must_use]
    pub fn access(&self) -> Access {
        self.access
    }

    #[must_use]
    pub fn reply(&self) -> bool {
        self.reply
    }

    #[must_use]
    pub fn sequence_byte(&self) -> u8 {
        self.sequence_byte
    }

    #[must_use]
    pub fn usb_code(&self) -> u16 {
        self.usb_code
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Resolves the selector to a known command, if any.
    #[must_use]
    pub fn command(&self) -> Option<UsbCommand> {
        UsbCommand::from_code(self.usb_code)
    }
}

/// Builder for fixed-size HID transport frames.
pub struct FrameCodec;

impl FrameCodec {
    /// Encodes a 65-byte control frame.
    ///
    /// Layout: report id, flag byte (read `0x80`, reply `0x40`), sequence byte,
    /// little-endian `2 + payload_len`, selector low byte then high byte, data.
    /// The selector byte order follows what the controller firmware expects.
    ///
    /// ```
    /// use dlpc::{Access, ControlCommand, FrameCodec};
    ///
    /// let command = ControlCommand::builder()
    ///     .access(Access::Write)
    ///     .sequence_byte(0x12)
    ///     .usb_code(0x1A24)
    ///     .payload(vec![0x02])
    ///     .build();
    /// let frame = FrameCodec::encode_control(&command)?;
    /// assert_eq!(&[0x00, 0x40, 0x12, 0x03, 0x00, 0x24, 0x1A, 0x02], &frame[..8]);
    /// # Ok::<(), dlpc::FrameCodecError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the payload exceeds 58 bytes.
    pub fn encode_control(
        command: &ControlCommand,
    ) -> Result<[u8; CONTROL_FRAME_LEN], FrameCodecError> {
        let payload_len = command.payload.len();
        if payload_len > MAX_CONTROL_PAYLOAD_LEN {
            return Err(FrameCodecError::ControlPayloadTooLarge {
                payload_len,
                max_payload_len: MAX_CONTROL_PAYLOAD_LEN,
            });
        }

        let mut frame = [0u8; CONTROL_FRAME_LEN];
        frame[FLAG_BYTE_OFFSET] = flag_byte(command.access, command.reply);
        frame[SEQUENCE_BYTE_OFFSET] = command.sequence_byte;
        let declared = u16::try_from(USB_CODE_LEN + payload_len).map_err(|_overflow| {
            FrameCodecError::ControlPayloadTooLarge {
                payload_len,
                max_payload_len: MAX_CONTROL_PAYLOAD_LEN,
            }
        })?;
        frame[LENGTH_OFFSET..LENGTH_OFFSET + 2].copy_from_slice(&declared.to_le_bytes());
        frame[USB_CODE_OFFSET..USB_CODE_OFFSET + 2].copy_from_slice(&command.usb_code.to_le_bytes());
        frame[CONTROL_DATA_OFFSET..CONTROL_DATA_OFFSET + payload_len]
            .copy_from_slice(&command.payload);
        Ok(frame)
    }

    /// Decodes a control frame produced by [`FrameCodec::encode_control`].
    ///
    /// # Errors
    ///
    /// Returns an error when the frame size or length field is inconsistent.
    pub fn decode_control(frame: &[u8]) -> Result<ControlCommand, FrameCodecError> {
        if frame.len() != CONTROL_FRAME_LEN {
            return Err(FrameCodecError::ControlFrameLength {
                expected: CONTROL_FRAME_LEN,
                actual: frame.len(),
            });
        }

        let flags = frame[FLAG_BYTE_OFFSET];
        let declared = usize::from(u16::from_le_bytes([
            frame[LENGTH_OFFSET],
            frame[LENGTH_OFFSET + 1],
        ]));
        let payload_len = declared
            .checked_sub(USB_CODE_LEN)
            .filter(|len| *len <= MAX_CONTROL_PAYLOAD_LEN)
            .ok_or(FrameCodecError::ControlLengthField { declared })?;

        Ok(ControlCommand {
            access: if flags & READ_FLAG == 0 {
                Access::Write
            } else {
                Access::Read
            },
            reply: flags & REPLY_FLAG != 0,
            sequence_byte: frame[SEQUENCE_BYTE_OFFSET],
            usb_code: u16::from_le_bytes([frame[USB_CODE_OFFSET], frame[USB_CODE_OFFSET + 1]]),
            payload: frame[CONTROL_DATA_OFFSET..CONTROL_DATA_OFFSET + payload_len].to_vec(),
        })
    }

    /// Encodes a headerless 64-byte raw frame, zero-padded.
    ///
    /// ```
    /// use dlpc::FrameCodec;
    ///
    /// let frame = FrameCodec::encode_raw(&[0xAA, 0xBB])?;
    /// assert_eq!(64, frame.len());
    /// assert_eq!(&[0xAA, 0xBB, 0x00], &frame[..3]);
    /// # Ok::<(), dlpc::FrameCodecError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the payload exceeds 64 bytes.
    pub fn encode_raw(payload: &[u8]) -> Result<[u8; RAW_FRAME_LEN], FrameCodecError> {
        if payload.len() > RAW_FRAME_LEN {
            return Err(FrameCodecError::RawPayloadTooLarge {
                payload_len: payload.len(),
                max_payload_len: RAW_FRAME_LEN,
            });
        }

        let mut frame = [0u8; RAW_FRAME_LEN];
        frame[..payload.len()].copy_from_slice(payload);
        Ok(frame)
    }

    /// Encodes the 8-byte sub-header opening one image data group.
    ///
    /// # Errors
    ///
    /// Returns an error when the group exceeds 504 bytes.
    pub fn encode_image_load_header(
        sequence_tag: u8,
        group_len: usize,
    ) -> Result<[u8; IMAGE_LOAD_HEADER_LEN], FrameCodecError> {
        let too_large = || FrameCodecError::ImageGroupTooLarge {
            group_len,
            max_group_len: MAX_IMAGE_GROUP_LEN,
        };
        if group_len > MAX_IMAGE_GROUP_LEN {
            return Err(too_large());
        }
        let data_len = u16::try_from(group_len).map_err(|_overflow| too_large())?;
        // Selector plus the inner length field precede the group bytes.
        let declared = data_len + 4;
        let [selector_low, selector_high] = UsbCommand::PatternBmpLoad.code().to_le_bytes();

        let mut header = [0u8; IMAGE_LOAD_HEADER_LEN];
        header[1] = sequence_tag;
        header[2..4].copy_from_slice(&declared.to_le_bytes());
        header[4] = selector_low;
        header[5] = selector_high;
        header[6..8].copy_from_slice(&data_len.to_le_bytes());
        Ok(header)
    }
}

fn flag_byte(access: Access, reply: bool) -> u8 {
    let mut flags = 0;
    if access == Access::Read {
        flags |= READ_FLAG;
    }
    if reply {
        flags |= REPLY_FLAG;
    }
    flags
}
