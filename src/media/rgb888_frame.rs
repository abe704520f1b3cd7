use std::fmt::{self, Formatter};

use thiserror::Error;

/// Native DMD canvas width in pixels.
pub const NATIVE_WIDTH: u16 = 1920;
/// Native DMD canvas height in pixels.
pub const NATIVE_HEIGHT: u16 = 1080;

/// Pattern resolution in pixels.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Resolution {
    width: u16,
    height: u16,
}

impl Resolution {
    /// The DLPC900 native 1920x1080 canvas.
    pub const NATIVE: Self = Self {
        width: NATIVE_WIDTH,
        height: NATIVE_HEIGHT,
    };

    /// Creates a resolution when both values are non-zero.
    ///
    /// ```
    /// use dlpc::Resolution;
    ///
    /// let resolution = Resolution::new(1920, 1080).expect("1920x1080 should be valid");
    /// assert_eq!(1920, resolution.width());
    /// assert!(Resolution::new(0, 4).is_none());
    /// ```
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        Some(Self { width, height })
    }

    /// Returns the width in pixels.
    #[must_use]
    pub const fn width(self) -> u16 {
        self.width
    }

    /// Returns the height in pixels.
    #[must_use]
    pub const fn height(self) -> u16 {
        self.height
    }

    /// Returns whether this is the native device canvas.
    #[must_use]
    pub const fn is_native(self) -> bool {
        self.width == NATIVE_WIDTH && self.height == NATIVE_HEIGHT
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::NATIVE
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Errors returned when validating an RGB888 pixel buffer.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum Rgb888FrameError {
    /// The payload length does not match `width * height * 3`.
    #[error(
        "rgb888 payload length mismatch for {resolution}: expected {expected_len} bytes, got {actual_len}"
    )]
    LengthMismatch {
        resolution: Resolution,
        expected_len: usize,
        actual_len: usize,
    },
    /// The resolution cannot be represented as an in-memory RGB888 length.
    #[error("rgb888 payload length overflows platform usize for {resolution}")]
    PayloadLengthOverflow { resolution: Resolution },
}

/// Validated RGB888 pixel buffer, row-major, three channels per pixel.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Rgb888Frame {
    resolution: Resolution,
    payload: Vec<u8>,
}

impl Rgb888Frame {
    /// Creates a frame filled with one colour.
    ///
    /// ```
    /// use dlpc::{Resolution, Rgb888Frame};
    ///
    /// let resolution = Resolution::new(2, 1).expect("2x1 should be valid");
    /// let frame = Rgb888Frame::filled(resolution, [0xFF, 0x00, 0x00])?;
    /// assert_eq!(&[0xFF, 0x00, 0x00, 0xFF, 0x00, 0x00], frame.payload());
    /// # Ok::<(), dlpc::Rgb888FrameError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the resolution overflows the platform `usize`.
    pub fn filled(resolution: Resolution, colour: [u8; 3]) -> Result<Self, Rgb888FrameError> {
        let expected_len = Self::expected_payload_len(resolution)?;
        let payload = colour
            .iter()
            .copied()
            .cycle()
            .take(expected_len)
            .collect();
        Ok(Self {
            resolution,
            payload,
        })
    }

    /// Returns the resolution this frame was validated against.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the validated RGB888 payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes this frame and returns the payload bytes.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Iterates rows as slices of `width * 3` bytes.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.payload
            .chunks_exact(usize::from(self.resolution.width()) * 3)
    }

    /// Returns the expected RGB888 payload length for `resolution`.
    ///
    /// # Errors
    ///
    /// Returns an error when the computed length overflows the platform `usize`.
    ///
    /// ```
    /// use dlpc::{Resolution, Rgb888Frame};
    ///
    /// let resolution = Resolution::new(8, 8).expect("8x8 should be valid");
    /// assert_eq!(192, Rgb888Frame::expected_payload_len(resolution)?);
    /// # Ok::<(), dlpc::Rgb888FrameError>(())
    /// ```
    pub fn expected_payload_len(resolution: Resolution) -> Result<usize, Rgb888FrameError> {
        let pixels = usize::from(resolution.width())
            .checked_mul(usize::from(resolution.height()))
            .ok_or(Rgb888FrameError::PayloadLengthOverflow { resolution })?;
        pixels
            .checked_mul(3)
            .ok_or(Rgb888FrameError::PayloadLengthOverflow { resolution })
    }
}

impl TryFrom<(Resolution, Vec<u8>)> for Rgb888Frame {
    type Error = Rgb888FrameError;

    fn try_from(value: (Resolution, Vec<u8>)) -> Result<Self, Self::Error> {
        let (resolution, payload) = value;
        let expected_len = Self::expected_payload_len(resolution)?;
        let actual_len = payload.len();

        if actual_len != expected_len {
            return Err(Rgb888FrameError::LengthMismatch {
                resolution,
                expected_len,
                actual_len,
            });
        }

        Ok(Self {
            resolution,
            payload,
        })
    }
}

impl TryFrom<(Resolution, &[u8])> for Rgb888Frame {
    type Error = Rgb888FrameError;

    fn try_from(value: (Resolution, &[u8])) -> Result<Self, Self::Error> {
        let (resolution, payload) = value;
        Self::try_from((resolution, payload.to_vec()))
    }
}
