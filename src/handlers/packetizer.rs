use crate::protocol::{RAW_FRAME_LEN, RESERVED_SEQUENCE_BYTE};

use super::frame_codec::{FrameCodec, FrameCodecError, IMAGE_LOAD_HEADER_LEN, MAX_IMAGE_GROUP_LEN};

const FIRST_FRAME_PAYLOAD_LEN: usize = RAW_FRAME_LEN - IMAGE_LOAD_HEADER_LEN;

/// Splits compressed image bytes into 64-byte transport frames.
///
/// Bytes are grouped in blocks of up to 504. Each group opens with a frame
/// holding the 8-byte load header and up to 56 bytes, followed by headerless
/// continuation frames of 64 bytes. The last group is tagged `0xAB`; the others
/// carry their index modulo 256.
pub struct ImagePacketizer;

impl ImagePacketizer {
    /// Produces every frame needed to transfer `image_bytes`, in send order.
    ///
    /// ```
    /// use dlpc::ImagePacketizer;
    ///
    /// let frames = ImagePacketizer::frames(&[0x11; 120])?;
    /// assert_eq!(3, frames.len());
    /// assert_eq!(0xAB, frames[0][1]);
    /// # Ok::<(), dlpc::FrameCodecError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if a group header cannot be encoded.
    pub fn frames(image_bytes: &[u8]) -> Result<Vec<[u8; RAW_FRAME_LEN]>, FrameCodecError> {
        let group_count = image_bytes.len().div_ceil(MAX_IMAGE_GROUP_LEN);
        let mut frames = Vec::with_capacity(Self::frame_count(image_bytes.len()));

        for (index, group) in image_bytes.chunks(MAX_IMAGE_GROUP_LEN).enumerate() {
            let tag = if index + 1 == group_count {
                RESERVED_SEQUENCE_BYTE
            } else {
                (index % 256) as u8
            };
            push_group(tag, group, &mut frames)?;
        }

        Ok(frames)
    }

    /// Number of continuation frames a group of `group_len` bytes needs.
    #[must_use]
    pub fn slave_frame_count(group_len: usize) -> usize {
        group_len
            .saturating_sub(FIRST_FRAME_PAYLOAD_LEN)
            .div_ceil(RAW_FRAME_LEN)
    }

    /// Total number of frames [`ImagePacketizer::frames`] emits for `image_len` bytes.
    #[must_use]
    pub fn frame_count(image_len: usize) -> usize {
        let full_groups = image_len / MAX_IMAGE_GROUP_LEN;
        let remainder = image_len % MAX_IMAGE_GROUP_LEN;
        let full_group_frames = 1 + Self::slave_frame_count(MAX_IMAGE_GROUP_LEN);
        let remainder_frames = if remainder == 0 {
            0
        } else {
            1 + Self::slave_frame_count(remainder)
        };
        full_groups * full_group_frames + remainder_frames
    }
}

fn push_group(
    tag: u8,
    group: &[u8],
    frames: &mut Vec<[u8; RAW_FRAME_LEN]>,
) -> Result<(), FrameCodecError> {
    let header = FrameCodec::encode_image_load_header(tag, group.len())?;
    let (head, rest) = group.split_at(group.len().min(FIRST_FRAME_PAYLOAD_LEN));

    let mut first = [0u8; RAW_FRAME_LEN];
    first[..IMAGE_LOAD_HEADER_LEN].copy_from_slice(&header);
    first[IMAGE_LOAD_HEADER_LEN..IMAGE_LOAD_HEADER_LEN + head.len()].copy_from_slice(head);
    frames.push(first);

    for chunk in rest.chunks(RAW_FRAME_LEN) {
        frames.push(FrameCodec::encode_raw(chunk)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn numbered_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|index| (index % 251) as u8).collect()
    }

    /// Reassembles the carried bytes from the frames using each group header.
    fn reassemble(frames: &[[u8; RAW_FRAME_LEN]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut index = 0;
        while index < frames.len() {
            let header = &frames[index];
            let group_len = usize::from(u16::from_le_bytes([header[6], header[7]]));
            let mut group = header[IMAGE_LOAD_HEADER_LEN..].to_vec();
            let slaves = ImagePacketizer::slave_frame_count(group_len);
            for slave in &frames[index + 1..=index + slaves] {
                group.extend_from_slice(slave);
            }
            group.truncate(group_len);
            bytes.extend(group);
            index += 1 + slaves;
        }
        bytes
    }

    #[test]
    fn empty_image_produces_no_frames() {
        let frames = ImagePacketizer::frames(&[]).expect("empty image should packetize");

        assert!(frames.is_empty());
    }

    #[rstest]
    #[case(1)]
    #[case(56)]
    #[case(57)]
    #[case(120)]
    #[case(504)]
    #[case(505)]
    #[case(1008)]
    #[case(4000)]
    fn frames_carry_every_byte_in_order(#[case] len: usize) {
        let image = numbered_bytes(len);

        let frames = ImagePacketizer::frames(&image).expect("image should packetize");

        assert_eq!(ImagePacketizer::frame_count(len), frames.len());
        assert_eq!(image, reassemble(&frames));
    }

    #[rstest]
    #[case(0, 0)]
    #[case(56, 0)]
    #[case(57, 1)]
    #[case(120, 1)]
    #[case(121, 2)]
    #[case(504, 7)]
    fn slave_frame_count_matches_remaining_bytes(#[case] group_len: usize, #[case] slaves: usize) {
        assert_eq!(slaves, ImagePacketizer::slave_frame_count(group_len));
    }

    #[test]
    fn only_last_group_is_tagged_as_final() {
        let image = numbered_bytes(504 * 2 + 10);

        let frames = ImagePacketizer::frames(&image).expect("image should packetize");

        let group_tags: Vec<u8> = [0, 8, 16].iter().map(|index| frames[*index][1]).collect();
        assert_eq!(vec![0x00, 0x01, 0xAB], group_tags);
        assert_eq!(17, frames.len());
    }

    #[test]
    fn short_group_is_zero_padded_in_first_frame() {
        let frames = ImagePacketizer::frames(&[0xEE; 3]).expect("short image should packetize");

        assert_eq!(1, frames.len());
        assert_eq!(
            vec![0x00, 0xAB, 0x07, 0x00, 0x2B, 0x1A, 0x03, 0x00, 0xEE, 0xEE, 0xEE, 0x00],
            frames[0][..12].to_vec()
        );
        assert!(frames[0][11..].iter().all(|byte| *byte == 0));
    }
}
