use std::sync::Arc;

use tokio::sync::watch;
use tracing::trace;

use crate::protocol::SEQUENCE_BYTE_OFFSET;
use crate::utils::format_hex;

/// Single-slot holder for the most recent inbound report.
///
/// The transport side writes through a [`ReportSink`] from whatever thread or
/// task receives reports; the correlator reads the slot while polling.
#[derive(Debug, Clone)]
pub(crate) struct ReportMailbox {
    slot: Arc<watch::Sender<Option<Vec<u8>>>>,
}

impl ReportMailbox {
    pub(crate) fn new() -> Self {
        let (sender, _receiver) = watch::channel(None);
        Self {
            slot: Arc::new(sender),
        }
    }

    /// Returns a handle the transport uses to publish reports.
    pub(crate) fn sink(&self) -> ReportSink {
        ReportSink {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Drops any stored report before a new command is sent.
    pub(crate) fn clear(&self) {
        self.slot.send_replace(None);
    }

    /// Returns the stored report when its sequence byte equals `sequence_byte`.
    pub(crate) fn latest_matching(&self, sequence_byte: u8) -> Option<Vec<u8>> {
        let latest = self.slot.borrow();
        latest
            .as_ref()
            .filter(|report| report.get(SEQUENCE_BYTE_OFFSET) == Some(&sequence_byte))
            .cloned()
    }
}

/// Write side of the report mailbox handed to transports.
#[derive(Debug, Clone)]
pub(crate) struct ReportSink {
    slot: Arc<watch::Sender<Option<Vec<u8>>>>,
}

impl ReportSink {
    /// Replaces the stored report with `report`.
    pub(crate) fn deliver(&self, report: &[u8]) {
        trace!(report = %format_hex(report), "inbound report");
        self.slot.send_replace(Some(report.to_vec()));
    }
}
