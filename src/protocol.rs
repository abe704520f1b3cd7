use std::collections::HashMap;
use std::sync::LazyLock;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// Texas Instruments USB vendor ID used by DLPC900 controllers.
pub const DLPC900_VENDOR_ID: u16 = 0x0451;
/// USB product ID reported by DLPC900 controllers.
pub const DLPC900_PRODUCT_ID: u16 = 0xC900;

/// Length of one control frame including the leading report-id byte.
pub const CONTROL_FRAME_LEN: usize = 65;
/// Length of one headerless raw data frame.
pub const RAW_FRAME_LEN: usize = 64;
/// Length of one inbound report including the leading report-id byte.
pub const REPORT_LEN: usize = 65;

/// Sequence byte reserved for error-code reads and the final image command group.
pub const RESERVED_SEQUENCE_BYTE: u8 = 0xAB;

/// Offset of the flag byte inside control frames and inbound reports.
pub(crate) const FLAG_BYTE_OFFSET: usize = 1;
/// Offset of the sequence byte inside control frames and inbound reports.
pub(crate) const SEQUENCE_BYTE_OFFSET: usize = 2;
/// Offset of the first answer data byte inside inbound reports.
pub(crate) const ANSWER_DATA_OFFSET: usize = 5;

/// DLPC900 USB command selectors used by this driver.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum UsbCommand {
    /// Reads the error code of the last failed command.
    #[strum(to_string = "read_error_code")]
    ReadErrorCode,
    /// Selects the device power mode.
    #[strum(to_string = "power_mode")]
    PowerMode,
    /// Enables or disables the 50/50 duty-cycle idle mode.
    #[strum(to_string = "dmd_idle_mode")]
    IdleMode,
    /// Parks or unparks the mirror array.
    #[strum(to_string = "dmd_park")]
    DmdPark,
    /// Flips the image along its long axis.
    #[strum(to_string = "long_axis_flip")]
    LongAxisFlip,
    /// Flips the image along its short axis.
    #[strum(to_string = "short_axis_flip")]
    ShortAxisFlip,
    /// Selects an internally generated test pattern.
    #[strum(to_string = "test_pattern_select")]
    TestPatternSelect,
    /// Selects the displayed input source.
    #[strum(to_string = "input_source")]
    InputSource,
    /// Selects or reads the display mode.
    #[strum(to_string = "display_mode")]
    DisplayMode,
    /// Starts, stops or pauses the pattern sequence.
    #[strum(to_string = "pattern_start_stop")]
    PatternStartStop,
    /// Announces an image upload into pattern memory.
    #[strum(to_string = "init_pattern_bmp_load")]
    InitPatternBmpLoad,
    /// Carries compressed image data.
    #[strum(to_string = "pattern_bmp_load")]
    PatternBmpLoad,
    /// Configures LUT execution.
    #[strum(to_string = "lut_configuration")]
    LutConfiguration,
    /// Defines one LUT entry.
    #[strum(to_string = "lut_definition")]
    LutDefinition,
    /// Configures the TRIG_IN1 delay.
    #[strum(to_string = "trigger_in_1")]
    TriggerIn1,
}

impl UsbCommand {
    /// Returns the 16-bit selector value for this command.
    ///
    /// ```
    /// use dlpc::UsbCommand;
    ///
    /// assert_eq!(0x1A24, UsbCommand::PatternStartStop.code());
    /// ```
    #[must_use]
    pub fn code(self) -> u16 {
        metadata_for(self).code
    }

    /// Returns the human-readable command name from the programmer's guide.
    #[must_use]
    pub fn title(self) -> &'static str {
        metadata_for(self).title
    }

    /// Resolves a known command from its selector value.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        COMMANDS_BY_CODE.get(&code).copied()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct CommandMetadata {
    code: u16,
    title: &'static str,
}

static COMMANDS_BY_CODE: LazyLock<HashMap<u16, UsbCommand>> = LazyLock::new(|| {
    UsbCommand::iter()
        .map(|command| (metadata_for(command).code, command))
        .collect()
});

fn metadata_for(command: UsbCommand) -> CommandMetadata {
    match command {
        UsbCommand::ReadErrorCode => CommandMetadata {
            code: 0x0100,
            title: "Read Error Code",
        },
        UsbCommand::PowerMode => CommandMetadata {
            code: 0x0200,
            title: "Power Mode",
        },
        UsbCommand::IdleMode => CommandMetadata {
            code: 0x0201,
            title: "DMD Idle Mode",
        },
        UsbCommand::DmdPark => CommandMetadata {
            code: 0x0609,
            title: "DMD Park/Unpark",
        },
        UsbCommand::LongAxisFlip => CommandMetadata {
            code: 0x1008,
            title: "Long Axis Image Flip",
        },
        UsbCommand::ShortAxisFlip => CommandMetadata {
            code: 0x1009,
            title: "Short Axis Image Flip",
        },
        UsbCommand::TestPatternSelect => CommandMetadata {
            code: 0x1203,
            title: "Internal Test Pattern Select",
        },
        UsbCommand::InputSource => CommandMetadata {
            code: 0x1A00,
            title: "Input Source Configuration",
        },
        UsbCommand::DisplayMode => CommandMetadata {
            code: 0x1A1B,
            title: "Display Mode Selection",
        },
        UsbCommand::PatternStartStop => CommandMetadata {
            code: 0x1A24,
            title: "Pattern Display Start/Stop",
        },
        UsbCommand::InitPatternBmpLoad => CommandMetadata {
            code: 0x1A2A,
            title: "Initialize Pattern BMP Load",
        },
        UsbCommand::PatternBmpLoad => CommandMetadata {
            code: 0x1A2B,
            title: "Pattern BMP Load",
        },
        UsbCommand::LutConfiguration => CommandMetadata {
            code: 0x1A31,
            title: "Pattern Display LUT Configuration",
        },
        UsbCommand::LutDefinition => CommandMetadata {
            code: 0x1A34,
            title: "Pattern Display LUT Definition",
        },
        UsbCommand::TriggerIn1 => CommandMetadata {
            code: 0x1A35,
            title: "Trigger In 1",
        },
    }
}
