use std::io;
use std::str::FromStr;

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::instrument;

use crate::cli::command::Command;
use crate::cli::{OutputFormat, write_json_line};
use crate::handlers::{
    DisplayModeHandler, FlipAxis, ImageFlipHandler, InputSource, InputSourceHandler,
    MIN_TRIGGER_DELAY_US, ParallelBitDepth, ParkState, PlaybackAction, PlaybackHandler,
    PowerHandler, PowerMode, RawCommandHandler, TestPattern, TestPatternHandler, TriggerEdge,
    TriggerHandler,
};
use crate::hw::{DeviceSession, DisplayMode};
use crate::utils::{format_hex, parse_hex, parse_u16};

/// JSON result emitted by a control command.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ControlResult {
    Mode {
        mode: String,
        selected: bool,
    },
    Playback {
        playback: String,
    },
    Flip {
        axis: String,
        enabled: bool,
    },
    Idle {
        enabled: bool,
    },
    TestPattern {
        pattern: String,
    },
    InputSource {
        source: String,
        bit_depth: String,
    },
    Park {
        state: String,
    },
    Power {
        mode: String,
    },
    Trigger {
        delay_us: u32,
        edge: String,
    },
    Raw {
        usb_code: String,
        error_flag: bool,
        data: String,
    },
}

/// On/off switch argument.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Axis argument for `flip`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum FlipAxisArg {
    Long,
    Short,
}

impl FlipAxisArg {
    fn to_handler_axis(self) -> FlipAxis {
        match self {
            Self::Long => FlipAxis::Long,
            Self::Short => FlipAxis::Short,
        }
    }
}

/// Direction argument for `raw`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum RawAccess {
    Read,
    Write,
}

/// Arguments for `mode`.
#[derive(Debug, Args)]
pub struct ModeArgs {
    /// Mode to select, e.g. `pattern_on_the_fly`. Prints the current mode when omitted.
    #[arg(value_parser = parse_display_mode)]
    mode: Option<DisplayMode>,
}

impl ModeArgs {
    /// Creates mode arguments.
    ///
    /// ```
    /// use dlpc::{DisplayMode, ModeArgs};
    ///
    /// let query = ModeArgs::new(None);
    /// let select = ModeArgs::new(Some(DisplayMode::Video));
    /// let _ = (query, select);
    /// ```
    #[must_use]
    pub fn new(mode: Option<DisplayMode>) -> Self {
        Self { mode }
    }
}

/// Arguments for `playback`.
#[derive(Debug, Args)]
pub struct PlaybackArgs {
    /// `start`, `stop` or `pause`.
    #[arg(value_parser = parse_playback_action)]
    action: PlaybackAction,
}

impl PlaybackArgs {
    #[must_use]
    pub fn new(action: PlaybackAction) -> Self {
        Self { action }
    }
}

/// Arguments for `flip`.
#[derive(Debug, Args)]
pub struct FlipArgs {
    #[arg(value_enum)]
    axis: FlipAxisArg,
    #[arg(value_enum)]
    state: Toggle,
}

impl FlipArgs {
    #[must_use]
    pub fn new(axis: FlipAxisArg, state: Toggle) -> Self {
        Self { axis, state }
    }
}

/// Arguments for `idle`.
#[derive(Debug, Args)]
pub struct IdleArgs {
    #[arg(value_enum)]
    state: Toggle,
}

impl IdleArgs {
    #[must_use]
    pub fn new(state: Toggle) -> Self {
        Self { state }
    }
}

/// Arguments for `test-pattern`.
#[derive(Debug, Args)]
pub struct TestPatternArgs {
    /// Pattern name, e.g. `grid` or `color_bars`.
    #[arg(value_parser = parse_test_pattern)]
    pattern: TestPattern,
}

impl TestPatternArgs {
    #[must_use]
    pub fn new(pattern: TestPattern) -> Self {
        Self { pattern }
    }
}

/// Arguments for `input-source`.
#[derive(Debug, Args)]
pub struct InputSourceArgs {
    /// Source name, e.g. `flash_image`.
    #[arg(value_parser = parse_input_source)]
    source: InputSource,
    /// Parallel interface bit depth: 30, 24, 20 or 16.
    #[arg(long, default_value = "30", value_parser = parse_parallel_bit_depth)]
    bit_depth: ParallelBitDepth,
}

impl InputSourceArgs {
    #[must_use]
    pub fn new(source: InputSource, bit_depth: ParallelBitDepth) -> Self {
        Self { source, bit_depth }
    }
}

/// Arguments for `power`.
#[derive(Debug, Args)]
pub struct PowerArgs {
    /// `normal`, `standby` or `reset`.
    #[arg(value_parser = parse_power_mode)]
    mode: PowerMode,
}

impl PowerArgs {
    #[must_use]
    pub fn new(mode: PowerMode) -> Self {
        Self { mode }
    }
}

/// Arguments for `trigger`.
#[derive(Debug, Args)]
pub struct TriggerArgs {
    /// Delay in microseconds, at least 105.
    #[arg(default_value_t = MIN_TRIGGER_DELAY_US)]
    delay_us: u32,
    /// `rising` or `falling`.
    #[arg(long, default_value = "rising", value_parser = parse_trigger_edge)]
    edge: TriggerEdge,
}

impl TriggerArgs {
    #[must_use]
    pub fn new(delay_us: u32, edge: TriggerEdge) -> Self {
        Self { delay_us, edge }
    }
}

/// Arguments for `raw`.
#[derive(Debug, Args)]
pub struct RawArgs {
    #[arg(value_enum)]
    access: RawAccess,
    /// Command selector, e.g. `0x1A1B`.
    #[arg(value_parser = parse_usb_code)]
    usb_code: u16,
    /// Payload as hexadecimal bytes, e.g. `03` or `"69 00 00"`.
    payload: Option<HexPayload>,
}

impl RawArgs {
    #[must_use]
    pub fn new(access: RawAccess, usb_code: u16, payload: Vec<u8>) -> Self {
        Self {
            access,
            usb_code,
            payload: Some(HexPayload(payload)),
        }
    }
}

/// Hexadecimal payload bytes.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct HexPayload(Vec<u8>);

impl FromStr for HexPayload {
    type Err = hex::FromHexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_hex(value).map(Self)
    }
}

/// Executes one control command against an open session.
#[instrument(skip(session, command, out), level = "debug", fields(command = command.name(), ?output_format))]
pub(crate) async fn run_with_session<W>(
    session: &DeviceSession,
    command: &Command,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let result = match command {
        Command::Mode(args) => match args.mode {
            Some(mode) => {
                DisplayModeHandler::select(session, mode).await?;
                ControlResult::Mode {
                    mode: mode.to_string(),
                    selected: true,
                }
            }
            None => {
                let mode = DisplayModeHandler::query(session).await?;
                ControlResult::Mode {
                    mode: mode.to_string(),
                    selected: false,
                }
            }
        },
        Command::Playback(args) => {
            PlaybackHandler::control(session, args.action).await?;
            ControlResult::Playback {
                playback: args.action.to_string(),
            }
        }
        Command::Flip(args) => {
            let axis = args.axis.to_handler_axis();
            ImageFlipHandler::set_flip(session, axis, args.state.enabled()).await?;
            ControlResult::Flip {
                axis: axis.to_string(),
                enabled: args.state.enabled(),
            }
        }
        Command::Idle(args) => {
            PowerHandler::set_idle_mode(session, args.state.enabled()).await?;
            ControlResult::Idle {
                enabled: args.state.enabled(),
            }
        }
        Command::TestPattern(args) => {
            TestPatternHandler::select(session, args.pattern).await?;
            ControlResult::TestPattern {
                pattern: args.pattern.to_string(),
            }
        }
        Command::InputSource(args) => {
            InputSourceHandler::configure(session, args.source, args.bit_depth).await?;
            ControlResult::InputSource {
                source: args.source.to_string(),
                bit_depth: args.bit_depth.to_string(),
            }
        }
        Command::Park | Command::Unpark => {
            let state = if matches!(command, Command::Park) {
                ParkState::Park
            } else {
                ParkState::Unpark
            };
            PowerHandler::set_park(session, state).await?;
            ControlResult::Park {
                state: state.to_string(),
            }
        }
        Command::Power(args) => {
            PowerHandler::set_power_mode(session, args.mode).await?;
            ControlResult::Power {
                mode: args.mode.to_string(),
            }
        }
        Command::Trigger(args) => {
            TriggerHandler::configure_trigger_in_1(session, args.delay_us, args.edge).await?;
            ControlResult::Trigger {
                delay_us: args.delay_us,
                edge: args.edge.to_string(),
            }
        }
        Command::Raw(args) => {
            let payload = args.payload.clone().unwrap_or_default().0;
            let correlated = match args.access {
                RawAccess::Read => RawCommandHandler::read(session, args.usb_code, payload).await?,
                RawAccess::Write => {
                    RawCommandHandler::write(session, args.usb_code, payload).await?
                }
            };
            let response = correlated.response();
            let data_len = usize::from(response.declared_len()).min(response.data().len());
            ControlResult::Raw {
                usb_code: format!("0x{:04X}", args.usb_code),
                error_flag: correlated.error_flag(),
                data: format_hex(&response.data()[..data_len]),
            }
        }
        Command::Upload(_args) => {
            anyhow::bail!("upload is not a control command");
        }
    };

    match output_format {
        OutputFormat::Pretty => writeln!(out, "{}", pretty_line(&result))?,
        OutputFormat::Json => write_json_line(out, &result)?,
    }
    Ok(())
}

fn pretty_line(result: &ControlResult) -> String {
    match result {
        ControlResult::Mode {
            mode,
            selected: true,
        } => format!("Selected display mode: {mode}"),
        ControlResult::Mode {
            mode,
            selected: false,
        } => format!("Display mode: {mode}"),
        ControlResult::Playback { playback } => format!("Applied playback: {playback}"),
        ControlResult::Flip { axis, enabled } => {
            format!("Applied {axis} axis flip: {}", on_off(*enabled))
        }
        ControlResult::Idle { enabled } => format!("Applied idle mode: {}", on_off(*enabled)),
        ControlResult::TestPattern { pattern } => format!("Showing test pattern: {pattern}"),
        ControlResult::InputSource { source, bit_depth } => {
            format!("Selected input source: {source} ({bit_depth}-bit)")
        }
        ControlResult::Park { state } => format!("Applied mirror state: {state}"),
        ControlResult::Power { mode } => format!("Applied power mode: {mode}"),
        ControlResult::Trigger { delay_us, edge } => {
            format!("Applied TRIG_IN1 delay: {delay_us}µs on {edge} edge")
        }
        ControlResult::Raw {
            usb_code,
            error_flag,
            data,
        } => format!("{usb_code} answered{}: {data}", if *error_flag { " with error flag" } else { "" }),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn parse_display_mode(value: &str) -> Result<DisplayMode, String> {
    DisplayMode::from_name(value).map_err(|error| error.to_string())
}

fn parse_playback_action(value: &str) -> Result<PlaybackAction, String> {
    PlaybackAction::from_name(value).map_err(|error| error.to_string())
}

fn parse_test_pattern(value: &str) -> Result<TestPattern, String> {
    TestPattern::from_name(value).map_err(|error| error.to_string())
}

fn parse_input_source(value: &str) -> Result<InputSource, String> {
    InputSource::from_name(value).map_err(|error| error.to_string())
}

fn parse_parallel_bit_depth(value: &str) -> Result<ParallelBitDepth, String> {
    ParallelBitDepth::from_name(value).map_err(|error| error.to_string())
}

fn parse_power_mode(value: &str) -> Result<PowerMode, String> {
    PowerMode::from_name(value).map_err(|error| error.to_string())
}

fn parse_trigger_edge(value: &str) -> Result<TriggerEdge, String> {
    TriggerEdge::from_name(value).map_err(|error| error.to_string())
}

fn parse_usb_code(value: &str) -> Result<u16, String> {
    parse_u16(value).ok_or_else(|| format!("`{value}` is not a 16-bit command selector"))
}
