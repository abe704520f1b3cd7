use std::time::Duration;

use bon::Builder;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument, trace, warn};

use crate::error::{DmdError, ResponseError};
use crate::hw::{HidTransport, ReportMailbox};
use crate::protocol::{RESERVED_SEQUENCE_BYTE, UsbCommand};
use crate::response::{DeviceErrorCode, DeviceResponse};

use super::frame_codec::{ControlCommand, FrameCodec};

const DEFAULT_ATTEMPTS: u32 = 100;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polling budget for one correlated wait.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Builder)]
pub struct CorrelatorBudget {
    #[builder(default = DEFAULT_ATTEMPTS)]
    attempts: u32,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    poll_interval: Duration,
}

impl CorrelatorBudget {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Total wait before a timeout is reported.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// assert_eq!(Duration::from_secs(1), dlpc::CorrelatorBudget::default().total());
    /// ```
    #[must_use]
    pub fn total(&self) -> Duration {
        self.poll_interval.saturating_mul(self.attempts)
    }
}

impl Default for CorrelatorBudget {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Response matched to a command by its sequence byte.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CorrelatedResponse {
    error_flag: bool,
    response: DeviceResponse,
}

impl CorrelatedResponse {
    /// Whether the device raised the error flag.
    ///
    /// A raised flag with an error register reading 0 is passed through as a
    /// successful response with this flag set.
    #[must_use]
    pub fn error_flag(&self) -> bool {
        self.error_flag
    }

    #[must_use]
    pub fn response(&self) -> &DeviceResponse {
        &self.response
    }

    #[must_use]
    pub fn into_response(self) -> DeviceResponse {
        self.response
    }
}

/// Matches inbound reports to outstanding commands.
pub(crate) struct ResponseCorrelator<'a> {
    transport: &'a dyn HidTransport,
    mailbox: &'a ReportMailbox,
}

impl<'a> ResponseCorrelator<'a> {
    pub(crate) fn new(transport: &'a dyn HidTransport, mailbox: &'a ReportMailbox) -> Self {
        Self { transport, mailbox }
    }

    /// Waits for the response to `sequence_byte` and resolves a raised error flag
    /// by reading the device error register.
    #[instrument(skip(self), level = "debug", fields(sequence_byte = format_args!("0x{sequence_byte:02X}")))]
    pub(crate) async fn await_response(
        &self,
        sequence_byte: u8,
        budget: CorrelatorBudget,
    ) -> Result<CorrelatedResponse, DmdError> {
        let response = self.poll(sequence_byte, budget).await?;
        if !response.error_flag() {
            return Ok(CorrelatedResponse {
                error_flag: false,
                response,
            });
        }

        let code = self.read_error_code(budget).await?;
        if code.is_error() {
            warn!(%code, "device rejected command");
            return Err(ResponseError::Device(code).into());
        }

        debug!("error flag raised but error register reads 0");
        Ok(CorrelatedResponse {
            error_flag: true,
            response,
        })
    }

    async fn read_error_code(&self, budget: CorrelatorBudget) -> Result<DeviceErrorCode, DmdError> {
        let command = ControlCommand::read(UsbCommand::ReadErrorCode, RESERVED_SEQUENCE_BYTE, Vec::new());
        let frame = FrameCodec::encode_control(&command)?;
        self.mailbox.clear();
        self.transport.send_report(&frame).await?;

        let answer = self.poll(RESERVED_SEQUENCE_BYTE, budget).await?;
        Ok(DeviceErrorCode::new(answer.first_data_byte()))
    }

    async fn poll(
        &self,
        sequence_byte: u8,
        budget: CorrelatorBudget,
    ) -> Result<DeviceResponse, ResponseError> {
        let started = Instant::now();
        let deadline = started + budget.total();

        loop {
            if let Some(report) = self.mailbox.latest_matching(sequence_byte) {
                return DeviceResponse::decode(sequence_byte, &report);
            }
            if Instant::now() >= deadline {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                return Err(ResponseError::ResponseTimeout {
                    sequence_byte,
                    waited_ms,
                });
            }
            trace!("no matching report yet");
            sleep(budget.poll_interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::TransportError;
    use crate::hw::ReportSink;
    use crate::protocol::REPORT_LEN;

    /// Transport that answers error-register reads with a fixed code.
    #[derive(Debug)]
    struct ErrorRegister {
        sink: ReportSink,
        code: Option<u8>,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl HidTransport for ErrorRegister {
        async fn send_report(&self, frame: &[u8]) -> Result<(), TransportError> {
            self.sent
                .lock()
                .expect("sent frames lock should not be poisoned")
                .push(frame.to_vec());
            if let Some(code) = self.code {
                self.sink.deliver(&report(RESERVED_SEQUENCE_BYTE, 0x40, code));
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn report(sequence_byte: u8, flags: u8, first_data_byte: u8) -> Vec<u8> {
        let mut report = vec![0u8; REPORT_LEN];
        report[1] = flags;
        report[2] = sequence_byte;
        report[5] = first_data_byte;
        report
    }

    fn transport(mailbox: &ReportMailbox, code: Option<u8>) -> ErrorRegister {
        ErrorRegister {
            sink: mailbox.sink(),
            code,
            sent: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn matching_report_without_error_flag_resolves_immediately() {
        let mailbox = ReportMailbox::new();
        let transport = transport(&mailbox, None);
        mailbox.sink().deliver(&report(0x21, 0x40, 0x03));

        let correlated = ResponseCorrelator::new(&transport, &mailbox)
            .await_response(0x21, CorrelatorBudget::default())
            .await
            .expect("matching report should correlate");

        assert!(!correlated.error_flag());
        assert_eq!(0x03, correlated.response().first_data_byte());
        assert!(transport.sent.lock().expect("lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_report_times_out_after_full_budget() {
        let mailbox = ReportMailbox::new();
        let transport = transport(&mailbox, None);
        mailbox.sink().deliver(&report(0x20, 0x40, 0x00));
        let started = Instant::now();

        let result = ResponseCorrelator::new(&transport, &mailbox)
            .await_response(0x21, CorrelatorBudget::default())
            .await;

        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_matches!(
            result,
            Err(DmdError::Response(error)) if matches!(
                *error,
                ResponseError::ResponseTimeout { sequence_byte: 0x21, waited_ms } if waited_ms >= 1000
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn error_flag_reads_error_register_and_maps_code() {
        let mailbox = ReportMailbox::new();
        let transport = transport(&mailbox, Some(9));
        mailbox.sink().deliver(&report(0x22, 0x60, 0x00));

        let result = ResponseCorrelator::new(&transport, &mailbox)
            .await_response(0x22, CorrelatorBudget::default())
            .await;

        let error = result.expect_err("nonzero error register should fail");
        assert_eq!(Some(DeviceErrorCode::new(9)), error.device_error_code());
        let sent = transport.sent.lock().expect("lock").clone();
        assert_eq!(1, sent.len());
        assert_eq!(&[0x00, 0xC0, 0xAB, 0x02, 0x00, 0x00, 0x01], &sent[0][..7]);
    }

    #[tokio::test(start_paused = true)]
    async fn error_flag_with_zero_code_is_treated_as_success() {
        let mailbox = ReportMailbox::new();
        let transport = transport(&mailbox, Some(0));
        mailbox.sink().deliver(&report(0x23, 0x60, 0x00));

        let correlated = ResponseCorrelator::new(&transport, &mailbox)
            .await_response(0x23, CorrelatorBudget::default())
            .await
            .expect("error code 0 should count as success");

        assert!(correlated.error_flag());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_error_register_times_out_on_reserved_sequence_byte() {
        let mailbox = ReportMailbox::new();
        let transport = transport(&mailbox, None);
        mailbox.sink().deliver(&report(0x24, 0x60, 0x00));

        let result = ResponseCorrelator::new(&transport, &mailbox)
            .await_response(0x24, CorrelatorBudget::default())
            .await;

        assert_matches!(
            result,
            Err(DmdError::Response(error)) if matches!(
                *error,
                ResponseError::ResponseTimeout { sequence_byte: 0xAB, .. }
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn truncated_matching_report_is_malformed() {
        let mailbox = ReportMailbox::new();
        let transport = transport(&mailbox, None);
        mailbox.sink().deliver(&[0x00, 0x40, 0x25, 0x00]);

        let result = ResponseCorrelator::new(&transport, &mailbox)
            .await_response(0x25, CorrelatorBudget::default())
            .await;

        assert_matches!(
            result,
            Err(DmdError::Response(error)) if matches!(*error, ResponseError::MalformedResponse { .. })
        );
    }
}
