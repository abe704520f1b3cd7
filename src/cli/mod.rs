use std::io;

use serde::Serialize;

pub(crate) mod command;
pub(crate) mod control;
pub(crate) mod upload;

pub use self::command::{Args, Command, ErrorInjections, FakeArgs, LogLevel, OutputFormat};
pub use self::control::{
    FlipArgs, FlipAxisArg, HexPayload, IdleArgs, InputSourceArgs, ModeArgs, PlaybackArgs,
    PowerArgs, RawAccess, RawArgs, TestPatternArgs, Toggle, TriggerArgs,
};
pub use self::upload::UploadArgs;

pub(crate) fn write_json_line(out: &mut impl io::Write, value: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
