mod bmp_load;
mod correlator;
mod display_mode;
mod frame_codec;
mod image_flip;
mod input_source;
mod lut;
mod packetizer;
mod playback;
mod power;
mod raw_command;
mod sequence_upload;
mod test_pattern;
mod trigger;

pub use self::bmp_load::BmpLoadHandler;
pub use self::correlator::{CorrelatedResponse, CorrelatorBudget};
pub(crate) use self::correlator::ResponseCorrelator;
pub use self::display_mode::DisplayModeHandler;
pub use self::frame_codec::{
    Access, ControlCommand, FrameCodec, FrameCodecError, IMAGE_LOAD_HEADER_LEN,
    MAX_CONTROL_PAYLOAD_LEN, MAX_IMAGE_GROUP_LEN,
};
pub use self::image_flip::{FlipAxis, ImageFlipHandler};
pub use self::input_source::{InputSource, InputSourceHandler, ParallelBitDepth};
pub use self::lut::{LutEntry, LutHandler};
pub use self::packetizer::ImagePacketizer;
pub use self::playback::{PlaybackAction, PlaybackHandler};
pub use self::power::{ParkState, PowerHandler, PowerMode};
pub use self::raw_command::RawCommandHandler;
pub use self::sequence_upload::{
    ImageUploadRequest, SequenceUploadHandler, SequenceUploadReceipt, SequenceUploadRequest,
};
pub use self::test_pattern::{TestPattern, TestPatternHandler};
pub use self::trigger::{MIN_TRIGGER_DELAY_US, TriggerEdge, TriggerHandler};
