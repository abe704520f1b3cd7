use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::cli::control::{
    FlipArgs, IdleArgs, InputSourceArgs, ModeArgs, PlaybackArgs, PowerArgs, RawArgs,
    TestPatternArgs, TriggerArgs,
};
use crate::cli::upload::UploadArgs;
use crate::error::FixtureError;
use crate::hw::{DisplayMode, FakeDevice, UsbDeviceId, parse_error_injection};
use crate::utils::parse_u16;

/// Command-line options for the DLPC900 controller tool.
#[derive(Debug, Parser)]
#[command(name = "dlpc", about = "Drive DLPC900 DMD controllers over USB HID.")]
pub struct Args {
    /// Log verbosity; overrides `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output style; defaults to pretty on terminals and JSON otherwise.
    #[arg(long, global = true, value_enum)]
    output_format: Option<OutputFormat>,
    /// USB vendor id of the controller.
    #[arg(long, global = true, default_value = "0x0451", value_parser = parse_usb_id)]
    vendor_id: u16,
    /// USB product id of the controller.
    #[arg(long, global = true, default_value = "0xC900", value_parser = parse_usb_id)]
    product_id: u16,
    /// Uses a simulated controller instead of USB hardware.
    #[arg(long, global = true)]
    fake: bool,
    /// Initial display mode of the simulated controller.
    #[arg(long, global = true, requires = "fake", value_parser = parse_display_mode)]
    fake_mode: Option<DisplayMode>,
    /// Device error codes to raise, as `usb_code=error_code` pairs separated by commas.
    #[arg(long, global = true, requires = "fake")]
    fake_error: Option<ErrorInjections>,
    /// Delay before each simulated reply (e.g. `5ms`, `1s`).
    #[arg(long, global = true, requires = "fake", value_parser = parse_duration)]
    fake_delay: Option<Duration>,
    /// Makes the simulated controller ignore every command.
    #[arg(long, global = true, requires = "fake")]
    fake_silent: bool,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use dlpc::{Args, Command};
    ///
    /// let args = Args::new(Command::Park);
    /// assert_eq!(dlpc::UsbDeviceId::DLPC900, args.device_id());
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            output_format: None,
            vendor_id: UsbDeviceId::DLPC900.vendor_id(),
            product_id: UsbDeviceId::DLPC900.product_id(),
            fake: false,
            fake_mode: None,
            fake_error: None,
            fake_delay: None,
            fake_silent: false,
            command,
        }
    }

    /// Enables the simulated controller with pre-parsed settings.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        let FakeArgs {
            mode,
            error_injections,
            response_delay,
            silent,
        } = fake;

        self.fake = true;
        self.fake_mode = Some(mode);
        self.fake_error = error_injections;
        self.fake_delay = Some(response_delay);
        self.fake_silent = silent;
        self
    }

    /// Overrides the output style.
    #[must_use]
    pub fn with_output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = Some(output_format);
        self
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    /// USB identifiers selected with `--vendor-id` and `--product-id`.
    #[must_use]
    pub fn device_id(&self) -> UsbDeviceId {
        UsbDeviceId::new(self.vendor_id, self.product_id)
    }

    /// Splits parsed arguments into the command and optional simulator settings.
    #[must_use]
    pub fn into_command_and_fake_args(self) -> (Command, Option<FakeArgs>) {
        let Args {
            fake,
            fake_mode,
            fake_error,
            fake_delay,
            fake_silent,
            command,
            ..
        } = self;

        let fake_args = fake.then(|| FakeArgs {
            mode: fake_mode.unwrap_or(DisplayMode::PatternOnTheFly),
            error_injections: fake_error,
            response_delay: fake_delay.unwrap_or(Duration::ZERO),
            silent: fake_silent,
        });

        (command, fake_args)
    }
}

/// Simulated controller settings for programmatic runs.
///
/// ```
/// let fake = dlpc::FakeArgs::builder()
///     .error_injections("0x1A24=5")?
///     .build();
/// let _ = fake;
/// # Ok::<(), dlpc::FixtureError>(())
/// ```
#[derive(Debug, Clone, Builder)]
pub struct FakeArgs {
    #[builder(default = DisplayMode::PatternOnTheFly)]
    mode: DisplayMode,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    error_injections: Option<ErrorInjections>,
    #[builder(default)]
    response_delay: Duration,
    #[builder(default)]
    silent: bool,
}

impl FakeArgs {
    pub(crate) fn into_device(self, device_id: UsbDeviceId) -> FakeDevice {
        let Self {
            mode,
            error_injections,
            response_delay,
            silent,
        } = self;

        FakeDevice::builder()
            .device_id(device_id)
            .initial_mode(mode)
            .error_codes(error_injections.unwrap_or_default().0.into_iter().collect())
            .response_delay(response_delay)
            .silent(silent)
            .build()
    }
}

/// Comma-separated `usb_code=error_code` pairs such as `0x1A24=5,0x0200=1`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ErrorInjections(Vec<(u16, u8)>);

impl FromStr for ErrorInjections {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .split(',')
            .filter(|pair| !pair.trim().is_empty())
            .map(parse_error_injection)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Output style for command results.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON document per command.
    Json,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload PNG patterns and start pattern-on-the-fly playback.
    Upload(UploadArgs),
    /// Print the display mode, or select one when a name is given.
    Mode(ModeArgs),
    /// Start, stop or pause the pattern sequence.
    Playback(PlaybackArgs),
    /// Mirror the image along the long or short axis.
    Flip(FlipArgs),
    /// Turn idle mode on or off.
    Idle(IdleArgs),
    /// Show an internal test pattern.
    TestPattern(TestPatternArgs),
    /// Select the video input source and parallel bit depth.
    InputSource(InputSourceArgs),
    /// Park the micromirror array.
    Park,
    /// Unpark the micromirror array.
    Unpark,
    /// Switch between normal, standby and reset.
    Power(PowerArgs),
    /// Set the TRIG_IN1 delay.
    Trigger(TriggerArgs),
    /// Send a command by bare selector value.
    Raw(RawArgs),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Upload(_args) => "upload",
            Self::Mode(_args) => "mode",
            Self::Playback(_args) => "playback",
            Self::Flip(_args) => "flip",
            Self::Idle(_args) => "idle",
            Self::TestPattern(_args) => "test-pattern",
            Self::InputSource(_args) => "input-source",
            Self::Park => "park",
            Self::Unpark => "unpark",
            Self::Power(_args) => "power",
            Self::Trigger(_args) => "trigger",
            Self::Raw(_args) => "raw",
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

fn parse_usb_id(value: &str) -> Result<u16, String> {
    parse_u16(value).ok_or_else(|| format!("`{value}` is not a 16-bit USB id"))
}

fn parse_display_mode(value: &str) -> Result<DisplayMode, String> {
    DisplayMode::from_name(value).map_err(|error| error.to_string())
}
