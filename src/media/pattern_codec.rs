use super::{Compression, Pattern, Rgb888Frame};
use crate::error::PreconditionError;

/// Length of the fixed image header preceding every compressed payload.
pub const IMAGE_HEADER_LEN: usize = 48;

const ENCODED_LENGTH_OFFSET: usize = 8;
const COMPRESSION_OFFSET: usize = 25;
const MAX_RUN_LEN: usize = 0xFF;
const END_OF_IMAGE: [u8; 2] = [0x00, 0x01];

// Header captured from the vendor GUI; width and height always read 1920x1080.
const HEADER_TEMPLATE: [u8; IMAGE_HEADER_LEN] = [
    0x53, 0x70, 0x6C, 0x64, // signature
    0x80, 0x07, 0x38, 0x04, // width, height
    0x00, 0x00, 0x00, 0x00, // encoded length
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // reserved
    0x00, 0x00, 0x00, 0x00, // background BB GG RR 00
    0x01, // reserved
    0x00, // compression
    0x01, // reserved
    0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Compressed pattern image: fixed header followed by the encoded payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CompressedImage {
    header: [u8; IMAGE_HEADER_LEN],
    payload: Vec<u8>,
}

impl CompressedImage {
    #[must_use]
    pub fn header(&self) -> &[u8; IMAGE_HEADER_LEN] {
        &self.header
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the payload length recorded in the header.
    ///
    /// ```
    /// use dlpc::{Compression, Pattern, PatternCodec, Resolution, Rgb888Frame};
    ///
    /// let resolution = Resolution::new(2, 2).expect("2x2 should be valid");
    /// let frame = Rgb888Frame::filled(resolution, [0xFF, 0xFF, 0xFF])?;
    /// let pattern = Pattern::builder().frame(frame).compression(Compression::Rle).build();
    /// let image = PatternCodec::compress(&pattern)?;
    /// assert_eq!(10, image.encoded_length());
    /// assert_eq!(58, image.total_len());
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    #[must_use]
    pub fn encoded_length(&self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.header[ENCODED_LENGTH_OFFSET..ENCODED_LENGTH_OFFSET + 4]);
        u32::from_le_bytes(bytes)
    }

    /// Returns the compression-type byte recorded in the header.
    #[must_use]
    pub fn compression_byte(&self) -> u8 {
        self.header[COMPRESSION_OFFSET]
    }

    /// Total length of header plus payload.
    #[must_use]
    pub fn total_len(&self) -> usize {
        IMAGE_HEADER_LEN + self.payload.len()
    }

    /// Concatenates header and payload into the byte stream sent to the device.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.total_len());
        bytes.extend_from_slice(&self.header);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Encoder for the controller's compressed image format.
pub struct PatternCodec;

impl PatternCodec {
    /// Compresses a pattern at its own resolution.
    ///
    /// The result is deterministic; compressing the same pattern twice yields
    /// identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::ImageTooLarge`] when header plus payload
    /// would not fit the 32-bit length announced to the device.
    pub fn compress(pattern: &Pattern) -> Result<CompressedImage, PreconditionError> {
        let payload = match pattern.compression() {
            Compression::None => pack_channel_bits(pattern.frame()),
            Compression::Rle => run_length_encode(pattern.frame()),
        };
        // The load announcement carries the total length, so it must fit too.
        image_len_field(IMAGE_HEADER_LEN + payload.len())?;

        Ok(CompressedImage {
            header: header_for(payload.len(), pattern.compression())?,
            payload,
        })
    }
}

/// Converts a byte count into a 32-bit length field.
pub(crate) fn image_len_field(len: usize) -> Result<u32, PreconditionError> {
    u32::try_from(len).map_err(|_overflow| PreconditionError::ImageTooLarge { len })
}

fn header_for(
    payload_len: usize,
    compression: Compression,
) -> Result<[u8; IMAGE_HEADER_LEN], PreconditionError> {
    let mut header = HEADER_TEMPLATE;
    let encoded_length = image_len_field(payload_len)?;
    header[ENCODED_LENGTH_OFFSET..ENCODED_LENGTH_OFFSET + 4]
        .copy_from_slice(&encoded_length.to_le_bytes());
    header[COMPRESSION_OFFSET] = compression.header_byte();
    Ok(header)
}

/// Packs every channel value as one bit (nonzero is set), MSB first.
fn pack_channel_bits(frame: &Rgb888Frame) -> Vec<u8> {
    frame
        .payload()
        .chunks(8)
        .map(|channels| {
            channels
                .iter()
                .enumerate()
                .fold(0u8, |packed, (bit, value)| {
                    if *value == 0 {
                        packed
                    } else {
                        packed | (0x80 >> bit)
                    }
                })
        })
        .collect()
}

fn run_length_encode(frame: &Rgb888Frame) -> Vec<u8> {
    let mut encoded = Vec::new();
    for row in frame.rows() {
        encode_row(row, &mut encoded);
    }
    encoded.extend_from_slice(&END_OF_IMAGE);
    encoded
}

fn encode_row(row: &[u8], encoded: &mut Vec<u8>) {
    let mut pixels = row.chunks_exact(3);
    let Some(first) = pixels.next() else {
        return;
    };

    let mut run_value = first;
    let mut run_len = 1usize;
    for pixel in pixels {
        if pixel == run_value {
            run_len += 1;
        } else {
            push_run(run_len, run_value, encoded);
            run_value = pixel;
            run_len = 1;
        }
    }
    push_run(run_len, run_value, encoded);
}

fn push_run(mut run_len: usize, value: &[u8], encoded: &mut Vec<u8>) {
    assert!(run_len > 0, "run-length records cannot be empty");

    while run_len > MAX_RUN_LEN {
        push_record(MAX_RUN_LEN, value, encoded);
        run_len -= MAX_RUN_LEN;
    }
    push_record(run_len, value, encoded);
}

fn push_record(run_len: usize, value: &[u8], encoded: &mut Vec<u8>) {
    // Callers split runs so the count fits one byte.
    encoded.push(u8::try_from(run_len).unwrap_or(u8::MAX));
    encoded.extend_from_slice(value);
}
