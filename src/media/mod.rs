mod image_preprocessor;
mod pattern;
mod pattern_codec;
mod rgb888_frame;

pub use self::image_preprocessor::{ImageLoader, MediaError};
pub use self::pattern::{
    Compression, MAX_LUT_TIME_US, MAX_SEQUENCE_LEN, MIN_EXPOSURE_TIME_US, Pattern, PatternSequence,
};
pub(crate) use self::pattern::validate_timing;
pub(crate) use self::pattern_codec::image_len_field;
pub use self::pattern_codec::{CompressedImage, IMAGE_HEADER_LEN, PatternCodec};
pub use self::rgb888_frame::{Resolution, Rgb888Frame, Rgb888FrameError};
