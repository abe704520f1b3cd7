use clap::Parser;
use image::ImageEncoder;
use insta::assert_snapshot;
use pretty_assertions::assert_eq;

#[derive(Debug, Default)]
struct FakeTerminalClient;

impl dlpc::TerminalClient for FakeTerminalClient {
    fn stdout_is_terminal(&self) -> bool {
        false
    }

    fn stderr_is_terminal(&self) -> bool {
        false
    }
}

async fn run_with_parsed_args(args: dlpc::Args) -> anyhow::Result<String> {
    let mut output = Vec::new();
    let options = dlpc::RunOptions {
        log_level: args.log_level(),
        output_format: Some(args.output_format().unwrap_or(dlpc::OutputFormat::Pretty)),
    };
    let device_id = args.device_id();
    let (command, maybe_fake_args) = args.into_command_and_fake_args();
    let hardware_client = match maybe_fake_args {
        Some(fake_args) => dlpc::fake_client_from_args(fake_args, device_id),
        None => dlpc::real_hardware_client(),
    };
    dlpc::run_with_clients(
        command,
        &mut output,
        &FakeTerminalClient,
        hardware_client,
        device_id,
        options,
    )
    .await?;
    Ok(String::from_utf8(output)?)
}

async fn run_with_argv<const N: usize>(argv: [&str; N]) -> anyhow::Result<String> {
    let parsed_args = dlpc::Args::try_parse_from(argv)?;
    run_with_parsed_args(parsed_args).await
}

fn write_png(path: &std::path::Path, width: u32, height: u32) -> anyhow::Result<()> {
    let source = image::RgbImage::from_pixel(width, height, image::Rgb([0xFF, 0xFF, 0xFF]));
    let file = std::fs::File::create(path)?;
    image::codecs::png::PngEncoder::new(file).write_image(
        source.as_raw(),
        width,
        height,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

#[tokio::test]
async fn mode_command_prints_current_mode() -> anyhow::Result<()> {
    let stdout = run_with_argv(["dlpc", "--fake", "--fake-mode", "video", "mode"]).await?;

    assert_snapshot!(stdout.trim_end(), @"Display mode: video");
    Ok(())
}

#[tokio::test]
async fn mode_command_selects_named_mode() -> anyhow::Result<()> {
    let stdout = run_with_argv(["dlpc", "--fake", "mode", "pre_stored_pattern"]).await?;

    assert_snapshot!(stdout.trim_end(), @"Selected display mode: pre_stored_pattern");
    Ok(())
}

#[tokio::test]
async fn playback_command_emits_json_result() -> anyhow::Result<()> {
    let stdout = run_with_argv([
        "dlpc",
        "--output-format",
        "json",
        "--fake",
        "playback",
        "pause",
    ])
    .await?;

    let value: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!(
        serde_json::json!({ "action": "playback", "playback": "pause" }),
        value
    );
    Ok(())
}

#[tokio::test]
async fn playback_command_fails_outside_pattern_mode() {
    let result = run_with_argv(["dlpc", "--fake", "--fake-mode", "video", "playback", "start"]).await;

    let error = result.expect_err("playback in video mode should fail");
    assert_eq!(
        "cannot start the pattern sequence while the device is in video mode",
        format!("{error:#}")
    );
}

#[tokio::test]
async fn injected_device_error_is_reported() {
    let result = run_with_argv(["dlpc", "--fake", "--fake-error", "0x0609=6", "park"]).await;

    let error = result.expect_err("injected error should fail the command");
    assert_eq!(
        "device reported error 6: invalid command parameter",
        format!("{error:#}")
    );
}

#[tokio::test]
async fn control_commands_print_applied_settings() -> anyhow::Result<()> {
    let mut lines = Vec::new();
    for argv in [
        ["dlpc", "--fake", "flip", "short", "on"].as_slice(),
        ["dlpc", "--fake", "idle", "off"].as_slice(),
        ["dlpc", "--fake", "test-pattern", "color_bars"].as_slice(),
        ["dlpc", "--fake", "input-source", "flash_image", "--bit-depth", "24"].as_slice(),
        ["dlpc", "--fake", "unpark"].as_slice(),
        ["dlpc", "--fake", "power", "standby"].as_slice(),
        ["dlpc", "--fake", "trigger", "250", "--edge", "falling"].as_slice(),
        ["dlpc", "--fake", "raw", "read", "0x1A1B", "00"].as_slice(),
    ] {
        let args = dlpc::Args::try_parse_from(argv)?;
        lines.push(run_with_parsed_args(args).await?.trim_end().to_string());
    }

    assert_snapshot!(lines.join("\n"), @r"
    Applied short axis flip: on
    Applied idle mode: off
    Showing test pattern: color_bars
    Selected input source: flash_image (24-bit)
    Applied mirror state: unpark
    Applied power mode: standby
    Applied TRIG_IN1 delay: 250µs on falling edge
    0x1A1B answered: 03
    ");
    Ok(())
}

#[tokio::test]
async fn upload_command_reports_receipt() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("dlpc-cli-upload-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let first = dir.join("first.png");
    let second = dir.join("second.png");
    write_png(&first, 16, 8)?;
    write_png(&second, 32, 16)?;

    let stdout = run_with_argv([
        "dlpc",
        "--output-format",
        "json",
        "--fake",
        "upload",
        first.to_str().unwrap_or_default(),
        second.to_str().unwrap_or_default(),
        "--exposure-us",
        "10000",
    ])
    .await?;
    std::fs::remove_dir_all(&dir)?;

    let value: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!(Some("upload"), value["action"].as_str());
    assert_eq!(Some(2), value["patterns"].as_u64());
    assert!(value["frames_written"].as_u64().unwrap_or_default() > 0);
    Ok(())
}

#[tokio::test]
async fn upload_command_rejects_short_exposure() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("dlpc-cli-exposure-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let image = dir.join("pattern.png");
    write_png(&image, 4, 4)?;

    let result = run_with_argv([
        "dlpc",
        "--fake",
        "upload",
        image.to_str().unwrap_or_default(),
        "--exposure-us",
        "104",
    ])
    .await;
    std::fs::remove_dir_all(&dir)?;

    let error = result.expect_err("104µs exposure should be rejected");
    assert_eq!(
        "exposure time 104µs is below the 105µs minimum",
        format!("{error:#}")
    );
    Ok(())
}
