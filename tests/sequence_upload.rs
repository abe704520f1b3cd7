use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use dlpc::{
    Compression, DeviceSession, DisplayMode, DmdError, FakeDevice, FakeJournal,
    ImagePacketizer, ImageUploadRequest, JournalEntry, Pattern, PatternCodec, PatternSequence,
    Resolution, ResponseError, Rgb888Frame, SequenceUploadHandler, SequenceUploadRequest,
    TriggerEdge, UsbCommand, UsbDeviceId,
};

async fn open(device: FakeDevice) -> anyhow::Result<(DeviceSession, FakeJournal)> {
    let journal = device.journal();
    let session = dlpc::fake_hardware_client(device)
        .open(UsbDeviceId::DLPC900)
        .await?;
    journal.clear();
    Ok((session, journal))
}

fn pattern(colour: [u8; 3], compression: Compression) -> anyhow::Result<Pattern> {
    let resolution = Resolution::new(8, 4).expect("8x4 should be valid");
    let frame = Rgb888Frame::filled(resolution, colour)?;
    Ok(Pattern::builder()
        .frame(frame)
        .compression(compression)
        .exposure_time_us(20_000)
        .build())
}

fn three_pattern_sequence() -> anyhow::Result<PatternSequence> {
    Ok(PatternSequence::new(
        vec![
            pattern([0xFF, 0x00, 0x00], Compression::None)?,
            pattern([0x00, 0xFF, 0x00], Compression::Rle)?,
            pattern([0x00, 0x00, 0xFF], Compression::Rle)?,
        ],
        6,
    )?)
}

fn usb_codes(journal: &FakeJournal) -> Vec<u16> {
    journal
        .control_commands()
        .iter()
        .map(dlpc::ControlCommand::usb_code)
        .collect()
}

fn first_payload_bytes(journal: &FakeJournal, command: UsbCommand) -> Vec<u8> {
    journal
        .control_commands()
        .iter()
        .filter(|sent| sent.usb_code() == command.code())
        .map(|sent| sent.payload()[0])
        .collect()
}

#[tokio::test]
async fn upload_defines_lut_ascending_then_loads_images_descending() -> anyhow::Result<()> {
    let (session, journal) = open(FakeDevice::builder().build()).await?;
    let sequence = three_pattern_sequence()?;

    let receipt =
        SequenceUploadHandler::upload_sequence(&session, &SequenceUploadRequest::new(sequence))
            .await?;

    assert_eq!(
        vec![
            0x1A24, 0x1A1B, 0x1A34, 0x1A34, 0x1A34, 0x1A2A, 0x1A31, 0x1A2A, 0x1A31, 0x1A2A,
            0x1A31, 0x1A35, 0x1A24,
        ],
        usb_codes(&journal)
    );
    assert_eq!(
        vec![0, 1, 2],
        first_payload_bytes(&journal, UsbCommand::LutDefinition)
    );
    assert_eq!(
        vec![2, 1, 0],
        first_payload_bytes(&journal, UsbCommand::InitPatternBmpLoad)
    );
    assert_eq!(
        vec![0x00, 0x02],
        first_payload_bytes(&journal, UsbCommand::PatternStartStop)
    );
    assert_eq!(
        vec![0x03],
        first_payload_bytes(&journal, UsbCommand::DisplayMode)
    );

    let configuration = journal
        .control_commands()
        .into_iter()
        .find(|sent| sent.usb_code() == UsbCommand::LutConfiguration.code())
        .expect("LUT configuration should be sent");
    assert_eq!(&[0x03, 0x00, 0x06, 0x00, 0x00, 0x00], configuration.payload());

    let trigger = journal
        .control_commands()
        .into_iter()
        .find(|sent| sent.usb_code() == UsbCommand::TriggerIn1.code())
        .expect("trigger delay should be sent");
    assert_eq!(&[0x69, 0x00, 0x00], trigger.payload());

    assert_eq!(3, receipt.patterns());
    assert_eq!(journal.raw_frames().len(), receipt.frames_written());
    assert_eq!(Some(DisplayMode::PatternOnTheFly), session.current_mode().await);
    Ok(())
}

#[tokio::test]
async fn image_frames_follow_their_load_announcement() -> anyhow::Result<()> {
    let (session, journal) = open(FakeDevice::builder().build()).await?;
    let sequence = three_pattern_sequence()?;
    let image_lens = sequence
        .patterns()
        .iter()
        .map(|pattern| PatternCodec::compress(pattern).map(|image| image.total_len()))
        .collect::<Result<Vec<_>, _>>()?;
    let expected_frames: Vec<usize> = image_lens
        .iter()
        .rev()
        .map(|len| ImagePacketizer::frame_count(*len))
        .collect();
    let expected_bytes: usize = image_lens.iter().sum();

    let receipt =
        SequenceUploadHandler::upload_sequence(&session, &SequenceUploadRequest::new(sequence))
            .await?;

    let mut frames_per_load = Vec::new();
    for entry in journal.entries() {
        match entry {
            JournalEntry::Control(command)
                if command.usb_code() == UsbCommand::InitPatternBmpLoad.code() =>
            {
                frames_per_load.push(0);
            }
            JournalEntry::Raw(frame) => {
                assert_eq!(64, frame.len());
                let current = frames_per_load
                    .last_mut()
                    .expect("raw frames should follow a load announcement");
                *current += 1;
            }
            JournalEntry::Control(_other) => {}
        }
    }
    assert_eq!(expected_frames, frames_per_load);
    assert_eq!(expected_bytes, receipt.compressed_bytes());
    Ok(())
}

#[tokio::test]
async fn upload_from_video_mode_skips_stop() -> anyhow::Result<()> {
    let device = FakeDevice::builder()
        .initial_mode(DisplayMode::Video)
        .build();
    let (session, journal) = open(device).await?;
    let sequence = PatternSequence::repeat_forever(vec![pattern([0xFF; 3], Compression::Rle)?])?;

    SequenceUploadHandler::upload_sequence(&session, &SequenceUploadRequest::new(sequence))
        .await?;

    assert_eq!(
        vec![0x1A1B, 0x1A34, 0x1A2A, 0x1A31, 0x1A35, 0x1A24],
        usb_codes(&journal)
    );
    Ok(())
}

#[tokio::test]
async fn request_trigger_settings_reach_the_device() -> anyhow::Result<()> {
    let (session, journal) = open(FakeDevice::builder().build()).await?;
    let sequence = PatternSequence::new(vec![pattern([0xFF; 3], Compression::None)?], 1)?;
    let request = SequenceUploadRequest::builder()
        .sequence(sequence)
        .wait_for_trigger(true)
        .trigger_delay_us(2_000)
        .trigger_edge(TriggerEdge::Falling)
        .build();

    SequenceUploadHandler::upload_sequence(&session, &request).await?;

    let commands = journal.control_commands();
    let definition = commands
        .iter()
        .find(|sent| sent.usb_code() == UsbCommand::LutDefinition.code())
        .expect("LUT definition should be sent");
    assert_eq!(0x81, definition.payload()[5]);
    let trigger = commands
        .iter()
        .find(|sent| sent.usb_code() == UsbCommand::TriggerIn1.code())
        .expect("trigger delay should be sent");
    assert_eq!(&[0xD0, 0x07, 0x01], trigger.payload());
    Ok(())
}

#[tokio::test]
async fn invalid_trigger_delay_is_rejected_before_any_command() -> anyhow::Result<()> {
    let (session, journal) = open(FakeDevice::builder().build()).await?;
    let sequence = PatternSequence::repeat_forever(vec![pattern([0xFF; 3], Compression::Rle)?])?;
    let request = SequenceUploadRequest::builder()
        .sequence(sequence)
        .trigger_delay_us(104)
        .build();

    let result = SequenceUploadHandler::upload_sequence(&session, &request).await;

    assert_matches!(result, Err(error) if error.is_precondition());
    assert!(journal.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unanswered_lut_definition_aborts_upload() -> anyhow::Result<()> {
    let device = FakeDevice::builder()
        .unanswered([UsbCommand::LutDefinition.code()].into())
        .build();
    let (session, journal) = open(device).await?;

    let result = SequenceUploadHandler::upload_sequence(
        &session,
        &SequenceUploadRequest::new(three_pattern_sequence()?),
    )
    .await;

    let Err(DmdError::Response(error)) = result else {
        panic!("expected a response error");
    };
    assert_matches!(
        error.as_ref(),
        ResponseError::ResponseTimeout {
            sequence_byte: 0x04,
            ..
        }
    );
    assert_eq!(vec![0x1A24, 0x1A1B, 0x1A34], usb_codes(&journal));
    assert!(journal.raw_frames().is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_load_announcement_sends_no_image_frames() -> anyhow::Result<()> {
    let device = FakeDevice::builder()
        .error_codes([(UsbCommand::InitPatternBmpLoad.code(), 17)].into())
        .build();
    let (session, journal) = open(device).await?;

    let result = SequenceUploadHandler::upload_sequence(
        &session,
        &SequenceUploadRequest::new(three_pattern_sequence()?),
    )
    .await;

    let error = result.expect_err("rejected load should fail the upload");
    assert_eq!(17, error.device_error_code().map(|code| code.value()).unwrap_or_default());
    assert!(journal.raw_frames().is_empty());
    Ok(())
}

#[tokio::test]
async fn single_image_upload_applies_flips_first() -> anyhow::Result<()> {
    let (session, journal) = open(FakeDevice::builder().build()).await?;
    let request = ImageUploadRequest::builder()
        .pattern(pattern([0xFF; 3], Compression::Rle)?)
        .long_axis_flip(true)
        .number_of_repeats(3)
        .build();

    let receipt = SequenceUploadHandler::upload_image(&session, &request).await?;

    assert_eq!(
        vec![
            0x1A1B, 0x1008, 0x1009, 0x1A24, 0x1A1B, 0x1A34, 0x1A2A, 0x1A31, 0x1A35, 0x1A24,
        ],
        usb_codes(&journal)
    );
    assert_eq!(
        vec![0x80],
        first_payload_bytes(&journal, UsbCommand::LongAxisFlip)
    );
    assert_eq!(
        vec![0x00],
        first_payload_bytes(&journal, UsbCommand::ShortAxisFlip)
    );
    assert_eq!(1, receipt.patterns());
    Ok(())
}
