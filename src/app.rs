use std::io;

use anyhow::Result;
use tracing::{instrument, trace};

use crate::cli::{Command, FakeArgs, LogLevel, OutputFormat};
use crate::hw::{
    HardwareClient, UsbDeviceId, fake_hardware_client as build_fake_hardware_client,
};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

/// Creates a hardware client backed by a simulated controller built from CLI settings.
///
/// ```
/// let client = dlpc::fake_client_from_args(dlpc::FakeArgs::builder().build(), dlpc::UsbDeviceId::DLPC900);
/// let _ = client;
/// ```
#[must_use]
pub fn fake_client_from_args(fake_args: FakeArgs, device_id: UsbDeviceId) -> Box<dyn HardwareClient> {
    build_fake_hardware_client(fake_args.into_device(device_id))
}

/// Runs the CLI command against the controller identified by `device_id`.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = dlpc::Args::try_parse_from(["dlpc", "--fake", "mode"])?;
/// let device_id = args.device_id();
/// let (command, maybe_fake_args) = args.into_command_and_fake_args();
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => dlpc::fake_client_from_args(fake_args, device_id),
///     None => dlpc::real_hardware_client(),
/// };
/// let mut out = Vec::new();
/// dlpc::run(command, &mut out, hardware_client, device_id).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the device cannot be
/// opened, the command fails, or output writing fails.
pub async fn run<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
    device_id: UsbDeviceId,
) -> Result<()>
where
    W: io::Write,
{
    run_with_options(command, out, hardware_client, device_id, RunOptions::default()).await
}

/// Runs the CLI command with explicit telemetry and output settings.
///
/// # Errors
///
/// Same as [`run`].
pub async fn run_with_options<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
    device_id: UsbDeviceId,
    options: RunOptions,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients(
        command,
        out,
        &SystemTerminalClient,
        hardware_client,
        device_id,
        options,
    )
    .await
}

/// Telemetry and output settings for one CLI run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub log_level: Option<LogLevel>,
    /// Falls back to pretty on a terminal stdout and JSON otherwise.
    pub output_format: Option<OutputFormat>,
}

/// Runs the CLI command with injected clients.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// struct FakeTerminal;
/// impl dlpc::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let args = dlpc::Args::try_parse_from(["dlpc", "--log-level", "debug", "--fake", "park"])?;
/// let options = dlpc::RunOptions {
///     log_level: args.log_level(),
///     output_format: args.output_format(),
/// };
/// let device_id = args.device_id();
/// let (command, maybe_fake_args) = args.into_command_and_fake_args();
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => dlpc::fake_client_from_args(fake_args, device_id),
///     None => dlpc::real_hardware_client(),
/// };
/// let mut out = Vec::new();
/// dlpc::run_with_clients(command, &mut out, &FakeTerminal, hardware_client, device_id, options)
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the device cannot be
/// opened, the command fails, or output writing fails.
#[instrument(
    skip(out, terminal_client, hardware_client),
    level = "info",
    fields(command = command.name(), %device_id, ?options)
)]
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    hardware_client: Box<dyn HardwareClient>,
    device_id: UsbDeviceId,
    options: RunOptions,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "dlpc",
        terminal_client.stderr_is_terminal(),
        options.log_level.map(LogLevel::as_level_filter),
    )?;

    let output_format = options.output_format.unwrap_or(if terminal_client.stdout_is_terminal() {
        OutputFormat::Pretty
    } else {
        OutputFormat::Json
    });

    let session = hardware_client.open(device_id).await?;
    let command_result = match &command {
        Command::Upload(args) => {
            crate::cli::upload::run_with_session(&session, args, out, output_format).await
        }
        other => crate::cli::control::run_with_session(&session, other, out, output_format).await,
    };
    let close_result = session.close().await;

    if let Err(error) = close_result {
        if command_result.is_ok() {
            return Err(error.into());
        }
        trace!(?error, "failed to close session cleanly");
    }

    command_result
}
