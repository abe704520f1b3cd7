use tracing::{debug, instrument};

use crate::error::{DmdError, PreconditionError};
use crate::hw::{DeviceSession, SessionGuard};
use crate::media::{CompressedImage, image_len_field};
use crate::protocol::UsbCommand;

use super::packetizer::ImagePacketizer;

const MAX_IMAGE_INDEX: u16 = 255;

/// Handler for loading compressed images into pattern memory.
pub struct BmpLoadHandler;

impl BmpLoadHandler {
    fn init_payload(image_index: u16, image_len: u32) -> Result<Vec<u8>, PreconditionError> {
        if image_index > MAX_IMAGE_INDEX {
            return Err(PreconditionError::PatternIndexOutOfRange { index: image_index });
        }
        let mut payload = Vec::with_capacity(6);
        payload.extend_from_slice(&image_index.to_le_bytes());
        payload.extend_from_slice(&image_len.to_le_bytes());
        Ok(payload)
    }

    /// Announces and transfers one compressed image.
    ///
    /// Only the announcement is correlated; the packetized image frames are
    /// written back to back. Returns the number of image frames written.
    ///
    /// # Errors
    ///
    /// Returns an error when the index is out of range, the announcement is
    /// rejected, or a frame write fails.
    #[instrument(skip(session, image), level = "info", fields(image_len = image.total_len()))]
    pub async fn load(
        session: &DeviceSession,
        image_index: u16,
        image: &CompressedImage,
    ) -> Result<usize, DmdError> {
        let mut guard = session.lock().await;
        Self::load_locked(&mut guard, image_index, image).await
    }

    pub(crate) async fn load_locked(
        guard: &mut SessionGuard<'_>,
        image_index: u16,
        image: &CompressedImage,
    ) -> Result<usize, DmdError> {
        let bytes = image.to_bytes();
        let image_len = image_len_field(bytes.len())?;
        let payload = Self::init_payload(image_index, image_len)?;
        let frames = ImagePacketizer::frames(&bytes)?;

        guard.write(UsbCommand::InitPatternBmpLoad, payload).await?;
        for frame in &frames {
            guard.send_raw_frame(frame).await?;
        }
        debug!(image_index, frame_count = frames.len(), "image frames written");
        Ok(frames.len())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 58, vec![0x00, 0x00, 0x3A, 0x00, 0x00, 0x00])]
    #[case(2, 0x0001_0203, vec![0x02, 0x00, 0x03, 0x02, 0x01, 0x00])]
    fn init_payload_matches_protocol(
        #[case] image_index: u16,
        #[case] image_len: u32,
        #[case] expected: Vec<u8>,
    ) {
        assert_eq!(
            expected,
            BmpLoadHandler::init_payload(image_index, image_len)
                .expect("index within range should encode")
        );
    }

    #[test]
    fn init_payload_rejects_index_past_lut() {
        assert_matches!(
            BmpLoadHandler::init_payload(256, 58),
            Err(PreconditionError::PatternIndexOutOfRange { index: 256 })
        );
    }
}
