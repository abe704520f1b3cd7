mod fake_backend;
mod hardware;
mod mailbox;
mod model;
mod rusb_backend;
mod session;

pub use self::fake_backend::{FakeDevice, FakeJournal, JournalEntry};
pub(crate) use self::fake_backend::parse_error_injection;
pub use self::hardware::{HardwareClient, fake_hardware_client, real_hardware_client};
pub(crate) use self::hardware::HidTransport;
pub(crate) use self::mailbox::{ReportMailbox, ReportSink};
pub use self::model::{DisplayMode, UsbDeviceId};
pub use self::session::DeviceSession;
pub(crate) use self::session::SessionGuard;
