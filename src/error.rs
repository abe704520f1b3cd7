use derive_more::From;
use thiserror::Error;

use crate::handlers::{FrameCodecError, PlaybackAction};
use crate::hw::{DisplayMode, UsbDeviceId};
use crate::media::MediaError;
use crate::response::DeviceErrorCode;

/// Caller input rejected before anything reaches the device.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum PreconditionError {
    #[error("exposure time {exposure_time_us}µs is below the {min_us}µs minimum")]
    ExposureTooShort { exposure_time_us: u32, min_us: u32 },
    #[error("{field} of {value_us}µs exceeds the 24-bit limit of {max_us}µs")]
    TimeOutOfRange {
        field: &'static str,
        value_us: u32,
        max_us: u32,
    },
    #[error("bit depth {bit_depth} is outside the supported 1..=8 range")]
    BitDepthOutOfRange { bit_depth: u8 },
    #[error("pattern index {index} is outside the LUT range 0..=255")]
    PatternIndexOutOfRange { index: u16 },
    #[error("pattern sequence holds {len} patterns but the LUT fits at most {max}")]
    SequenceTooLong { len: usize, max: usize },
    #[error("pattern sequence must contain at least one pattern")]
    EmptySequence,
    #[error("compressed image of {len} bytes does not fit the 32-bit length field")]
    ImageTooLarge { len: usize },
    #[error("trigger delay {delay_us}µs is below the {min_us}µs minimum")]
    TriggerDelayTooShort { delay_us: u32, min_us: u32 },
    #[error("trigger delay {delay_us}µs exceeds the 16-bit limit of {max_us}µs")]
    TriggerDelayOutOfRange { delay_us: u32, max_us: u32 },
    #[error(
        "cannot {action} the pattern sequence while the device is in {} mode",
        mode_name(.current)
    )]
    PlaybackRequiresPatternOnTheFly {
        action: PlaybackAction,
        current: Option<DisplayMode>,
    },
    #[error("unknown {kind} `{value}`")]
    UnknownName { kind: &'static str, value: String },
}

fn mode_name(mode: &Option<DisplayMode>) -> String {
    mode.map_or_else(|| "an unknown".to_string(), |mode| mode.to_string())
}

/// Failures of the USB HID transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no USB device with id {device} was found")]
    DeviceNotFound { device: UsbDeviceId },
    #[error("USB operation failed")]
    Usb(#[from] rusb::Error),
    #[error("USB write transferred {transferred} of {expected} bytes")]
    ShortWrite { transferred: usize, expected: usize },
    #[error("frame of {len} bytes is neither a 65-byte control frame nor a 64-byte raw frame")]
    InvalidFrameSize { len: usize },
    #[error("the USB transport is closed")]
    Closed,
    #[error("blocking USB task failed")]
    BlockingTask(#[from] tokio::task::JoinError),
}

/// Failures while waiting for or interpreting a device response.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ResponseError {
    #[error("no response with sequence byte 0x{sequence_byte:02X} arrived within {waited_ms}ms")]
    ResponseTimeout { sequence_byte: u8, waited_ms: u64 },
    #[error("malformed response for sequence byte 0x{sequence_byte:02X}: {detail}")]
    MalformedResponse { sequence_byte: u8, detail: String },
    #[error("device reported error {0}")]
    Device(DeviceErrorCode),
}

/// Errors returned when parsing fake device settings.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FixtureError {
    #[error("error injection `{value}` must look like `<usb_code>=<error_code>`")]
    InvalidErrorInjection { value: String },
    #[error("invalid number `{value}`")]
    InvalidNumber { value: String },
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Top-level driver errors wrapping module-specific error types.
#[derive(Debug, Error, From)]
pub enum DmdError {
    #[error(transparent)]
    #[from(PreconditionError, Box<PreconditionError>)]
    Precondition(Box<PreconditionError>),
    #[error(transparent)]
    #[from(FrameCodecError, Box<FrameCodecError>)]
    FrameCodec(Box<FrameCodecError>),
    #[error(transparent)]
    #[from(TransportError, Box<TransportError>)]
    Transport(Box<TransportError>),
    #[error(transparent)]
    #[from(ResponseError, Box<ResponseError>)]
    Response(Box<ResponseError>),
    #[error(transparent)]
    #[from(MediaError, Box<MediaError>)]
    Media(Box<MediaError>),
}

impl DmdError {
    /// Returns the device error code when the controller rejected a command.
    ///
    /// ```
    /// use dlpc::{DeviceErrorCode, DmdError, ResponseError};
    ///
    /// let error = DmdError::from(ResponseError::Device(DeviceErrorCode::new(9)));
    /// assert_eq!(Some(DeviceErrorCode::new(9)), error.device_error_code());
    /// ```
    #[must_use]
    pub fn device_error_code(&self) -> Option<DeviceErrorCode> {
        match self {
            Self::Response(error) => match error.as_ref() {
                ResponseError::Device(code) => Some(*code),
                _other => None,
            },
            _other => None,
        }
    }

    /// Returns whether the error was raised before any I/O took place.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_) | Self::FrameCodec(_))
    }
}
