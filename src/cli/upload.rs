use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::instrument;

use crate::cli::{OutputFormat, write_json_line};
use crate::handlers::{
    MIN_TRIGGER_DELAY_US, SequenceUploadHandler, SequenceUploadReceipt, SequenceUploadRequest,
    TriggerEdge,
};
use crate::hw::DeviceSession;
use crate::media::{Compression, ImageLoader, MIN_EXPOSURE_TIME_US, Pattern, PatternSequence, Rgb888Frame};

/// Arguments for `upload`.
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// PNG files, one per LUT slot in display order.
    #[arg(required_unless_present = "sequence_dir", conflicts_with = "sequence_dir")]
    images: Vec<PathBuf>,
    /// Directory holding `sequence_0.png`, `sequence_1.png`, ...
    #[arg(long)]
    sequence_dir: Option<PathBuf>,
    /// Exposure time per pattern in microseconds.
    #[arg(long, default_value_t = MIN_EXPOSURE_TIME_US)]
    exposure_us: u32,
    /// Dark time after each pattern in microseconds.
    #[arg(long, default_value_t = 0)]
    dark_us: u32,
    /// Bits per pixel of each pattern (1..=8).
    #[arg(long, default_value_t = 1)]
    bit_depth: u8,
    /// `none` or `rle`.
    #[arg(long, default_value = "rle", value_parser = parse_compression)]
    compression: Compression,
    /// Number of patterns displayed before stopping; 0 repeats until stopped.
    #[arg(long, default_value_t = 0)]
    repeats: u32,
    /// Wait for TRIG_IN1 before each pattern.
    #[arg(long)]
    wait_for_trigger: bool,
    /// TRIG_IN1 delay in microseconds.
    #[arg(long, default_value_t = MIN_TRIGGER_DELAY_US)]
    trigger_delay_us: u32,
    /// `rising` or `falling`.
    #[arg(long, default_value = "rising", value_parser = parse_trigger_edge)]
    trigger_edge: TriggerEdge,
}

impl UploadArgs {
    /// Creates upload arguments for explicit image files with default timing.
    ///
    /// ```
    /// use std::path::PathBuf;
    ///
    /// let args = dlpc::UploadArgs::new(vec![PathBuf::from("pattern.png")]);
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(images: Vec<PathBuf>) -> Self {
        Self {
            images,
            sequence_dir: None,
            exposure_us: MIN_EXPOSURE_TIME_US,
            dark_us: 0,
            bit_depth: 1,
            compression: Compression::Rle,
            repeats: 0,
            wait_for_trigger: false,
            trigger_delay_us: MIN_TRIGGER_DELAY_US,
            trigger_edge: TriggerEdge::Rising,
        }
    }

    /// Overrides the exposure time of every pattern.
    #[must_use]
    pub fn with_exposure_us(mut self, exposure_us: u32) -> Self {
        self.exposure_us = exposure_us;
        self
    }

    fn load_frames(&self) -> Result<Vec<Rgb888Frame>> {
        if let Some(dir) = &self.sequence_dir {
            return ImageLoader::load_sequence_dir(dir)
                .with_context(|| format!("failed to load sequence from `{}`", dir.display()));
        }
        self.images.iter().map(|path| load_image(path)).collect()
    }

    fn request(&self, frames: Vec<Rgb888Frame>) -> Result<SequenceUploadRequest> {
        let patterns = frames
            .into_iter()
            .map(|frame| {
                Pattern::builder()
                    .frame(frame)
                    .compression(self.compression)
                    .exposure_time_us(self.exposure_us)
                    .dark_time_us(self.dark_us)
                    .bit_depth(self.bit_depth)
                    .build()
            })
            .collect();
        let sequence = PatternSequence::new(patterns, self.repeats)?;

        Ok(SequenceUploadRequest::builder()
            .sequence(sequence)
            .wait_for_trigger(self.wait_for_trigger)
            .trigger_delay_us(self.trigger_delay_us)
            .trigger_edge(self.trigger_edge)
            .build())
    }
}

#[derive(Debug, Serialize)]
struct UploadResult {
    action: &'static str,
    #[serde(flatten)]
    receipt: SequenceUploadReceipt,
}

/// Loads the requested images and uploads them as one pattern sequence.
#[instrument(skip(session, args, out), level = "debug", fields(?output_format))]
pub(crate) async fn run_with_session<W>(
    session: &DeviceSession,
    args: &UploadArgs,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let request = args.request(args.load_frames()?)?;
    let receipt = SequenceUploadHandler::upload_sequence(session, &request).await?;

    match output_format {
        OutputFormat::Pretty => {
            writeln!(
                out,
                "{} Uploaded {} pattern(s): {} compressed bytes in {} frame(s)",
                "✓".green(),
                receipt.patterns(),
                receipt.compressed_bytes(),
                receipt.frames_written(),
            )?;
        }
        OutputFormat::Json => {
            write_json_line(
                out,
                &UploadResult {
                    action: "upload",
                    receipt,
                },
            )?;
        }
    }
    Ok(())
}

fn load_image(path: &Path) -> Result<Rgb888Frame> {
    ImageLoader::load_png(path)
        .with_context(|| format!("failed to load pattern image `{}`", path.display()))
}

fn parse_compression(value: &str) -> Result<Compression, String> {
    Compression::from_name(value).map_err(|error| error.to_string())
}

fn parse_trigger_edge(value: &str) -> Result<TriggerEdge, String> {
    TriggerEdge::from_name(value).map_err(|error| error.to_string())
}
