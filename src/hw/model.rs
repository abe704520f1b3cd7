use std::fmt;
use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};

use crate::error::PreconditionError;
use crate::protocol::{DLPC900_PRODUCT_ID, DLPC900_VENDOR_ID};

/// Controller display mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum DisplayMode {
    /// Video input from the external interface.
    Video,
    /// Patterns read from onboard flash.
    #[strum(to_string = "pre_stored_pattern", serialize = "pre-stored_pattern")]
    PreStoredPattern,
    /// Patterns derived from the video input.
    VideoPattern,
    /// Patterns streamed from the host over USB.
    PatternOnTheFly,
}

impl DisplayMode {
    /// Returns the mode-select byte.
    ///
    /// ```
    /// use dlpc::DisplayMode;
    ///
    /// assert_eq!(0x00, DisplayMode::Video.as_byte());
    /// assert_eq!(0x03, DisplayMode::PatternOnTheFly.as_byte());
    /// ```
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Video => 0x00,
            Self::PreStoredPattern => 0x01,
            Self::VideoPattern => 0x02,
            Self::PatternOnTheFly => 0x03,
        }
    }

    /// Resolves a mode-select byte reported by the device.
    #[must_use]
    pub const fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Video),
            0x01 => Some(Self::PreStoredPattern),
            0x02 => Some(Self::VideoPattern),
            0x03 => Some(Self::PatternOnTheFly),
            _ => None,
        }
    }

    /// Parses a mode name such as `pattern_on_the_fly`.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::UnknownName`] for unrecognised names.
    pub fn from_name(name: &str) -> Result<Self, PreconditionError> {
        Self::from_str(name).map_err(|_error| PreconditionError::UnknownName {
            kind: "display mode",
            value: name.to_string(),
        })
    }
}

/// USB vendor and product identifiers used to locate a controller.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct UsbDeviceId {
    vendor_id: u16,
    product_id: u16,
}

impl UsbDeviceId {
    /// The stock DLPC900 identifiers.
    pub const DLPC900: Self = Self {
        vendor_id: DLPC900_VENDOR_ID,
        product_id: DLPC900_PRODUCT_ID,
    };

    #[must_use]
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    #[must_use]
    pub const fn vendor_id(self) -> u16 {
        self.vendor_id
    }

    #[must_use]
    pub const fn product_id(self) -> u16 {
        self.product_id
    }
}

impl Default for UsbDeviceId {
    fn default() -> Self {
        Self::DLPC900
    }
}

impl fmt::Display for UsbDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}
