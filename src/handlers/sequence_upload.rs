use bon::Builder;
use serde::Serialize;
use tracing::{Span, info, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::error::{DmdError, PreconditionError};
use crate::hw::{DeviceSession, DisplayMode, SessionGuard};
use crate::media::{MAX_SEQUENCE_LEN, Pattern, PatternCodec, PatternSequence};

use super::bmp_load::BmpLoadHandler;
use super::display_mode::DisplayModeHandler;
use super::image_flip::{FlipAxis, ImageFlipHandler};
use super::lut::{LutEntry, LutHandler};
use super::playback::{PlaybackAction, PlaybackHandler};
use super::trigger::{MIN_TRIGGER_DELAY_US, TriggerEdge, TriggerHandler};

/// Pattern sequence upload parameters.
#[derive(Debug, Clone, Eq, PartialEq, Builder)]
pub struct SequenceUploadRequest {
    sequence: PatternSequence,
    /// Makes every LUT entry wait for TRIG_IN1.
    #[builder(default)]
    wait_for_trigger: bool,
    #[builder(default = MIN_TRIGGER_DELAY_US)]
    trigger_delay_us: u32,
    #[builder(default)]
    trigger_edge: TriggerEdge,
}

impl SequenceUploadRequest {
    /// Creates a request with the default trigger configuration.
    #[must_use]
    pub fn new(sequence: PatternSequence) -> Self {
        Self::builder().sequence(sequence).build()
    }

    #[must_use]
    pub fn sequence(&self) -> &PatternSequence {
        &self.sequence
    }

    #[must_use]
    pub fn wait_for_trigger(&self) -> bool {
        self.wait_for_trigger
    }

    #[must_use]
    pub fn trigger_delay_us(&self) -> u32 {
        self.trigger_delay_us
    }

    #[must_use]
    pub fn trigger_edge(&self) -> TriggerEdge {
        self.trigger_edge
    }

    fn lut_definitions(&self) -> Result<Vec<Vec<u8>>, PreconditionError> {
        self.sequence
            .patterns()
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                let index = slot_index(index, self.sequence.len())?;
                let entry = LutEntry::for_pattern(index, pattern);
                let entry = if self.wait_for_trigger {
                    entry.waiting_for_trigger()
                } else {
                    entry
                };
                entry.encode()
            })
            .collect()
    }
}

/// Single image upload parameters.
#[derive(Debug, Clone, Eq, PartialEq, Builder)]
pub struct ImageUploadRequest {
    pattern: Pattern,
    #[builder(default)]
    long_axis_flip: bool,
    #[builder(default)]
    short_axis_flip: bool,
    /// Number of times the image is shown; 0 repeats until stopped.
    #[builder(default)]
    number_of_repeats: u32,
    #[builder(default)]
    wait_for_trigger: bool,
}

impl ImageUploadRequest {
    #[must_use]
    pub fn new(pattern: Pattern) -> Self {
        Self::builder().pattern(pattern).build()
    }

    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

/// Summary of a completed upload.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct SequenceUploadReceipt {
    patterns: usize,
    compressed_bytes: usize,
    frames_written: usize,
}

impl SequenceUploadReceipt {
    /// Number of patterns loaded into the LUT.
    #[must_use]
    pub fn patterns(&self) -> usize {
        self.patterns
    }

    /// Header plus payload bytes of every compressed image.
    #[must_use]
    pub fn compressed_bytes(&self) -> usize {
        self.compressed_bytes
    }

    /// Image data frames written, excluding control commands.
    #[must_use]
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }
}

/// Handler for pattern-on-the-fly uploads.
pub struct SequenceUploadHandler;

impl SequenceUploadHandler {
    /// Loads a pattern sequence into the controller and starts playback.
    ///
    /// Runs stop (when already in pattern-on-the-fly mode), mode selection,
    /// LUT definitions in ascending slot order, then image loads in
    /// descending slot order each followed by LUT configuration, then the
    /// trigger delay and start. Every control command is correlated, and the
    /// first failure aborts the upload with earlier steps left applied.
    ///
    /// ```
    /// # async fn demo(session: dlpc::DeviceSession) -> anyhow::Result<()> {
    /// use dlpc::{
    ///     Pattern, PatternSequence, Resolution, Rgb888Frame, SequenceUploadHandler,
    ///     SequenceUploadRequest,
    /// };
    ///
    /// let frame = Rgb888Frame::filled(Resolution::NATIVE, [0xFF, 0xFF, 0xFF])?;
    /// let sequence = PatternSequence::repeat_forever(vec![Pattern::new(frame)])?;
    /// let receipt =
    ///     SequenceUploadHandler::upload_sequence(&session, &SequenceUploadRequest::new(sequence))
    ///         .await?;
    /// assert_eq!(1, receipt.patterns());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a precondition error before any I/O when a LUT entry or the
    /// trigger delay is invalid, otherwise the first command failure.
    #[instrument(
        skip(session, request),
        level = "info",
        fields(patterns = request.sequence.len(), repeats = request.sequence.number_of_repeats())
    )]
    pub async fn upload_sequence(
        session: &DeviceSession,
        request: &SequenceUploadRequest,
    ) -> Result<SequenceUploadReceipt, DmdError> {
        let definitions = request.lut_definitions()?;
        TriggerHandler::validate_delay(request.trigger_delay_us)?;

        let mut guard = session.lock().await;
        Self::upload_locked(&mut guard, request, definitions).await
    }

    /// Shows one image: selects pattern-on-the-fly mode, applies the axis
    /// flips and uploads a one-pattern sequence.
    ///
    /// # Errors
    ///
    /// Same as [`SequenceUploadHandler::upload_sequence`].
    #[instrument(skip(session, request), level = "info")]
    pub async fn upload_image(
        session: &DeviceSession,
        request: &ImageUploadRequest,
    ) -> Result<SequenceUploadReceipt, DmdError> {
        let sequence = PatternSequence::new(vec![request.pattern.clone()], request.number_of_repeats)?;
        let upload = SequenceUploadRequest::builder()
            .sequence(sequence)
            .wait_for_trigger(request.wait_for_trigger)
            .build();
        let definitions = upload.lut_definitions()?;

        let mut guard = session.lock().await;
        DisplayModeHandler::select_locked(&mut guard, DisplayMode::PatternOnTheFly).await?;
        ImageFlipHandler::set_flip_locked(&mut guard, FlipAxis::Long, request.long_axis_flip)
            .await?;
        ImageFlipHandler::set_flip_locked(&mut guard, FlipAxis::Short, request.short_axis_flip)
            .await?;
        Self::upload_locked(&mut guard, &upload, definitions).await
    }

    async fn upload_locked(
        guard: &mut SessionGuard<'_>,
        request: &SequenceUploadRequest,
        definitions: Vec<Vec<u8>>,
    ) -> Result<SequenceUploadReceipt, DmdError> {
        let sequence = &request.sequence;
        let span = Span::current();
        span.pb_set_message("Uploading patterns");
        span.pb_set_length(u64::try_from(sequence.len()).unwrap_or(u64::MAX));

        if guard.current_mode() == Some(DisplayMode::PatternOnTheFly) {
            PlaybackHandler::control_locked(guard, PlaybackAction::Stop).await?;
        }
        DisplayModeHandler::select_locked(guard, DisplayMode::PatternOnTheFly).await?;

        for payload in definitions {
            LutHandler::define_locked(guard, payload).await?;
        }

        let mut compressed_bytes = 0;
        let mut frames_written = 0;
        for (index, pattern) in sequence.patterns().iter().enumerate().rev() {
            let image_index = slot_index(index, sequence.len())?;
            let image = PatternCodec::compress(pattern)?;
            frames_written += BmpLoadHandler::load_locked(guard, image_index, &image).await?;
            compressed_bytes += image.total_len();
            LutHandler::configure_locked(guard, sequence.len(), sequence.number_of_repeats())
                .await?;
            span.pb_inc(1);
        }

        TriggerHandler::configure_locked(guard, request.trigger_delay_us, request.trigger_edge)
            .await?;
        PlaybackHandler::control_locked(guard, PlaybackAction::Start).await?;

        info!(
            patterns = sequence.len(),
            compressed_bytes, frames_written, "pattern sequence uploaded"
        );
        Ok(SequenceUploadReceipt {
            patterns: sequence.len(),
            compressed_bytes,
            frames_written,
        })
    }
}

fn slot_index(index: usize, sequence_len: usize) -> Result<u16, PreconditionError> {
    u16::try_from(index)
        .ok()
        .filter(|_fits| sequence_len <= MAX_SEQUENCE_LEN)
        .ok_or(PreconditionError::SequenceTooLong {
            len: sequence_len,
            max: MAX_SEQUENCE_LEN,
        })
}
