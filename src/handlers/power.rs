use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};
use tracing::{info, instrument};

use crate::error::{DmdError, PreconditionError};
use crate::hw::DeviceSession;
use crate::protocol::UsbCommand;

/// Controller power state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum PowerMode {
    Normal,
    Standby,
    /// Software reset.
    Reset,
}

impl PowerMode {
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Normal => 0x00,
            Self::Standby => 0x01,
            Self::Reset => 0x02,
        }
    }

    /// Parses `normal`, `standby` or `reset`.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::UnknownName`] for any other value.
    pub fn from_name(name: &str) -> Result<Self, PreconditionError> {
        Self::from_str(name).map_err(|_error| PreconditionError::UnknownName {
            kind: "power mode",
            value: name.to_string(),
        })
    }
}

/// Mirror array park state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ParkState {
    Park,
    Unpark,
}

impl ParkState {
    const fn as_byte(self) -> u8 {
        match self {
            Self::Park => 0x01,
            Self::Unpark => 0x00,
        }
    }
}

/// Handler for power, idle and park commands.
pub struct PowerHandler;

impl PowerHandler {
    fn power_payload(mode: PowerMode) -> Vec<u8> {
        vec![mode.as_byte()]
    }

    fn idle_payload(enabled: bool) -> Vec<u8> {
        vec![u8::from(enabled)]
    }

    fn park_payload(state: ParkState) -> Vec<u8> {
        vec![state.as_byte()]
    }

    /// Switches the controller power mode.
    ///
    /// ```
    /// # async fn demo(session: dlpc::DeviceSession) -> Result<(), dlpc::DmdError> {
    /// use dlpc::{PowerHandler, PowerMode};
    ///
    /// PowerHandler::set_power_mode(&session, PowerMode::Standby).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the device rejects it.
    #[instrument(skip(session), level = "info", fields(%mode))]
    pub async fn set_power_mode(session: &DeviceSession, mode: PowerMode) -> Result<(), DmdError> {
        session
            .lock()
            .await
            .write(UsbCommand::PowerMode, Self::power_payload(mode))
            .await?;
        info!(%mode, "power mode changed");
        Ok(())
    }

    /// Enables or disables the 50/50 duty-cycle idle mode.
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the device rejects it.
    #[instrument(skip(session), level = "info")]
    pub async fn set_idle_mode(session: &DeviceSession, enabled: bool) -> Result<(), DmdError> {
        session
            .lock()
            .await
            .write(UsbCommand::IdleMode, Self::idle_payload(enabled))
            .await?;
        Ok(())
    }

    /// Parks or unparks the mirror array.
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails or the device rejects it.
    #[instrument(skip(session), level = "info", fields(%state))]
    pub async fn set_park(session: &DeviceSession, state: ParkState) -> Result<(), DmdError> {
        session
            .lock()
            .await
            .write(UsbCommand::DmdPark, Self::park_payload(state))
            .await?;
        Ok(())
    }
}
