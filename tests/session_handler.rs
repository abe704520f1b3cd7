use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use dlpc::{
    Access, DisplayMode, DmdError, FakeDevice, ResponseError, TransportError,
    UsbCommand, UsbDeviceId,
};

#[tokio::test]
async fn open_reads_display_mode_first() -> anyhow::Result<()> {
    let device = FakeDevice::builder()
        .initial_mode(DisplayMode::PreStoredPattern)
        .build();
    let journal = device.journal();

    let session = dlpc::fake_hardware_client(device)
        .open(UsbDeviceId::DLPC900)
        .await?;

    assert_eq!(Some(DisplayMode::PreStoredPattern), session.current_mode().await);
    let commands = journal.control_commands();
    assert_eq!(1, commands.len());
    assert_eq!(Access::Read, commands[0].access());
    assert_eq!(UsbCommand::DisplayMode.code(), commands[0].usb_code());
    assert_eq!(0x01, commands[0].sequence_byte());

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn open_fails_for_unknown_usb_ids() {
    let result = dlpc::fake_hardware_client(FakeDevice::builder().build())
        .open(UsbDeviceId::new(0x1234, 0x5678))
        .await;

    let Err(DmdError::Transport(error)) = result else {
        panic!("expected a transport error");
    };
    assert_matches!(
        error.as_ref(),
        TransportError::DeviceNotFound { device } if *device == UsbDeviceId::new(0x1234, 0x5678)
    );
}

#[tokio::test(start_paused = true)]
async fn silent_device_times_out_after_polling_budget() {
    let started = tokio::time::Instant::now();

    let result = dlpc::fake_hardware_client(FakeDevice::builder().silent(true).build())
        .open(UsbDeviceId::DLPC900)
        .await;

    let Err(DmdError::Response(error)) = result else {
        panic!("expected a response error");
    };
    assert_matches!(
        error.as_ref(),
        ResponseError::ResponseTimeout {
            sequence_byte: 0x01,
            ..
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn delayed_replies_within_budget_are_accepted() -> anyhow::Result<()> {
    let device = FakeDevice::builder()
        .response_delay(Duration::from_millis(250))
        .build();

    let session = dlpc::fake_hardware_client(device)
        .open(UsbDeviceId::DLPC900)
        .await?;

    assert_eq!(Some(DisplayMode::PatternOnTheFly), session.current_mode().await);
    Ok(())
}

#[tokio::test]
async fn sequence_bytes_increase_per_command() -> anyhow::Result<()> {
    let device = FakeDevice::builder().build();
    let journal = device.journal();
    let session = dlpc::fake_hardware_client(device)
        .open(UsbDeviceId::DLPC900)
        .await?;

    dlpc::PowerHandler::set_idle_mode(&session, true).await?;
    dlpc::PowerHandler::set_idle_mode(&session, false).await?;

    let sequence_bytes: Vec<u8> = journal
        .control_commands()
        .iter()
        .map(dlpc::ControlCommand::sequence_byte)
        .collect();
    assert_eq!(vec![0x01, 0x02, 0x03], sequence_bytes);

    let last = session
        .last_response()
        .await
        .expect("a correlated response should be recorded");
    assert_eq!(0x03, last.sequence_byte());
    Ok(())
}
