use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::hardware::HidTransport;
use super::mailbox::ReportSink;
use super::model::{DisplayMode, UsbDeviceId};
use crate::error::{FixtureError, TransportError};
use crate::handlers::{Access, ControlCommand, FrameCodec};
use crate::protocol::{CONTROL_FRAME_LEN, RAW_FRAME_LEN, REPORT_LEN, UsbCommand};
use crate::utils::parse_u16;

const REPLY_FLAG: u8 = 0x40;
const ERROR_FLAG: u8 = 0x20;
const TRUNCATED_REPLY_LEN: usize = 8;

/// Simulated controller used in tests and hardware-free runs.
///
/// ```
/// use dlpc::{DisplayMode, FakeDevice};
///
/// let device = FakeDevice::builder()
///     .initial_mode(DisplayMode::Video)
///     .error_codes([(0x1A24, 5)].into())
///     .build();
/// assert!(device.journal().is_empty());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct FakeDevice {
    #[builder(default)]
    device_id: UsbDeviceId,
    #[builder(default = DisplayMode::PatternOnTheFly)]
    initial_mode: DisplayMode,
    /// Delay before each reply is published.
    #[builder(default)]
    response_delay: Duration,
    /// Never answer any command.
    #[builder(default)]
    silent: bool,
    /// Selectors that never get an answer.
    #[builder(default)]
    unanswered: HashSet<u16>,
    /// Error code raised for each listed selector.
    #[builder(default)]
    error_codes: HashMap<u16, u8>,
    /// Publish replies shorter than a full report.
    #[builder(default)]
    truncate_replies: bool,
    #[builder(skip)]
    journal: FakeJournal,
}

impl FakeDevice {
    #[must_use]
    pub fn device_id(&self) -> UsbDeviceId {
        self.device_id
    }

    /// Record of every frame the device received.
    ///
    /// Clones share the same record, so a handle taken before the device is
    /// handed to a client keeps observing traffic.
    #[must_use]
    pub fn journal(&self) -> FakeJournal {
        self.journal.clone()
    }
}

/// One frame seen by the fake device.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum JournalEntry {
    Control(ControlCommand),
    Raw(Vec<u8>),
}

/// Shared log of frames received by a [`FakeDevice`].
#[derive(Debug, Clone, Default)]
pub struct FakeJournal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl FakeJournal {
    fn guard(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, entry: JournalEntry) {
        self.guard().push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.guard().clone()
    }

    /// Control commands in arrival order.
    #[must_use]
    pub fn control_commands(&self) -> Vec<ControlCommand> {
        self.guard()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Control(command) => Some(command.clone()),
                JournalEntry::Raw(_) => None,
            })
            .collect()
    }

    /// Raw frames in arrival order.
    #[must_use]
    pub fn raw_frames(&self) -> Vec<Vec<u8>> {
        self.guard()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Raw(frame) => Some(frame.clone()),
                JournalEntry::Control(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

/// Parses a `<usb_code>=<error_code>` error injection such as `0x1A24=5`.
pub(crate) fn parse_error_injection(value: &str) -> Result<(u16, u8), FixtureError> {
    let invalid = || FixtureError::InvalidErrorInjection {
        value: value.to_string(),
    };
    let (usb_code, error_code) = value.split_once('=').ok_or_else(invalid)?;
    let usb_code = parse_number(usb_code)?;
    let error_code = parse_number(error_code)?;
    Ok((
        usb_code,
        u8::try_from(error_code).map_err(|_overflow| invalid())?,
    ))
}

fn parse_number(value: &str) -> Result<u16, FixtureError> {
    parse_u16(value).ok_or_else(|| FixtureError::InvalidNumber {
        value: value.trim().to_string(),
    })
}

#[derive(Debug)]
struct FakeState {
    mode: DisplayMode,
    error_register: u8,
    closed: bool,
}

/// Transport that answers control frames the way a controller would.
#[derive(Debug)]
pub(crate) struct FakeTransport {
    device: FakeDevice,
    sink: ReportSink,
    state: Mutex<FakeState>,
}

impl FakeTransport {
    pub(crate) fn new(device: FakeDevice, sink: ReportSink) -> Self {
        let state = Mutex::new(FakeState {
            mode: device.initial_mode,
            error_register: 0,
            closed: false,
        });
        Self {
            device,
            sink,
            state,
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer(&self, command: &ControlCommand) -> Option<Vec<u8>> {
        if self.device.silent || self.device.unanswered.contains(&command.usb_code()) {
            debug!(usb_code = command.usb_code(), "fake device stays silent");
            return None;
        }

        let mut state = self.state();
        let (error, data) = if command.command() == Some(UsbCommand::ReadErrorCode) {
            (false, vec![std::mem::take(&mut state.error_register)])
        } else if let Some(code) = self.device.error_codes.get(&command.usb_code()) {
            state.error_register = *code;
            (true, Vec::new())
        } else {
            (false, apply(&mut state, command))
        };

        command.reply().then(|| reply_report(command.sequence_byte(), error, &data))
    }

    fn publish(&self, mut report: Vec<u8>) {
        if self.device.truncate_replies {
            report.truncate(TRUNCATED_REPLY_LEN);
        }

        let delay = self.device.response_delay;
        if delay.is_zero() {
            self.sink.deliver(&report);
            return;
        }

        let sink = self.sink.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            sink.deliver(&report);
        });
    }
}

#[async_trait]
impl HidTransport for FakeTransport {
    async fn send_report(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.state().closed {
            return Err(TransportError::Closed);
        }

        match frame.len() {
            CONTROL_FRAME_LEN => {
                let command = match FrameCodec::decode_control(frame) {
                    Ok(command) => command,
                    Err(error) => {
                        warn!(%error, "fake device dropped undecodable control frame");
                        return Ok(());
                    }
                };
                self.device
                    .journal
                    .record(JournalEntry::Control(command.clone()));
                if let Some(report) = self.answer(&command) {
                    self.publish(report);
                }
                Ok(())
            }
            RAW_FRAME_LEN => {
                self.device.journal.record(JournalEntry::Raw(frame.to_vec()));
                Ok(())
            }
            len => Err(TransportError::InvalidFrameSize { len }),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state().closed = true;
        Ok(())
    }
}

fn apply(state: &mut FakeState, command: &ControlCommand) -> Vec<u8> {
    let first_byte = command.payload().first().copied();
    match (command.command(), command.access()) {
        (Some(UsbCommand::DisplayMode), Access::Read) => vec![state.mode.as_byte()],
        (Some(UsbCommand::DisplayMode), Access::Write) => {
            if let Some(mode) = first_byte.and_then(DisplayMode::from_byte) {
                state.mode = mode;
            }
            Vec::new()
        }
        (Some(UsbCommand::InputSource), Access::Write) => {
            state.mode = DisplayMode::Video;
            Vec::new()
        }
        (_, Access::Read) => vec![0x00],
        (_, Access::Write) => Vec::new(),
    }
}

fn reply_report(sequence_byte: u8, error: bool, data: &[u8]) -> Vec<u8> {
    let mut report = vec![0u8; REPORT_LEN];
    report[1] = if error {
        REPLY_FLAG | ERROR_FLAG
    } else {
        REPLY_FLAG
    };
    report[2] = sequence_byte;
    let declared = u16::try_from(data.len()).unwrap_or(u16::MAX);
    report[3..5].copy_from_slice(&declared.to_le_bytes());
    let len = data.len().min(REPORT_LEN - 5);
    report[5..5 + len].copy_from_slice(&data[..len]);
    report
}
