mod app;
mod cli;
mod error;
mod handlers;
mod hw;
mod media;
mod protocol;
mod response;
mod telemetry;
mod terminal;
mod utils;

pub use app::{RunOptions, fake_client_from_args, run, run_with_clients, run_with_options};
pub use cli::{
    Args, Command, ErrorInjections, FakeArgs, FlipArgs, FlipAxisArg, HexPayload, IdleArgs,
    InputSourceArgs, LogLevel, ModeArgs, OutputFormat, PlaybackArgs, PowerArgs, RawAccess,
    RawArgs, TestPatternArgs, Toggle, TriggerArgs, UploadArgs,
};
pub use error::{
    DmdError, FixtureError, PreconditionError, ResponseError, TransportError,
};
pub use handlers::{
    Access, BmpLoadHandler, ControlCommand, CorrelatedResponse, CorrelatorBudget,
    DisplayModeHandler, FlipAxis, FrameCodec, FrameCodecError, IMAGE_LOAD_HEADER_LEN,
    ImageFlipHandler, ImagePacketizer, ImageUploadRequest, InputSource, InputSourceHandler,
    LutEntry, LutHandler, MAX_CONTROL_PAYLOAD_LEN, MAX_IMAGE_GROUP_LEN, MIN_TRIGGER_DELAY_US,
    ParallelBitDepth, ParkState, PlaybackAction, PlaybackHandler, PowerHandler, PowerMode,
    RawCommandHandler, SequenceUploadHandler, SequenceUploadReceipt, SequenceUploadRequest,
    TestPattern, TestPatternHandler, TriggerEdge, TriggerHandler,
};
pub use hw::{
    DeviceSession, DisplayMode, FakeDevice, FakeJournal, HardwareClient, JournalEntry,
    UsbDeviceId, fake_hardware_client, real_hardware_client,
};
pub use media::{
    CompressedImage, Compression, IMAGE_HEADER_LEN, ImageLoader, MAX_LUT_TIME_US,
    MAX_SEQUENCE_LEN, MIN_EXPOSURE_TIME_US, MediaError, Pattern, PatternCodec, PatternSequence,
    Resolution, Rgb888Frame, Rgb888FrameError,
};
pub use protocol::{
    CONTROL_FRAME_LEN, DLPC900_PRODUCT_ID, DLPC900_VENDOR_ID, RAW_FRAME_LEN, REPORT_LEN,
    RESERVED_SEQUENCE_BYTE, UsbCommand,
};
pub use response::{DeviceErrorCode, DeviceErrorKind, DeviceResponse};
pub use terminal::TerminalClient;
