use std::process::ExitCode;

use clap::Parser;

use dlpc::{Args, RunOptions, fake_client_from_args, real_hardware_client};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mut stdout = std::io::stdout();

    let options = RunOptions {
        log_level: args.log_level(),
        output_format: args.output_format(),
    };
    let device_id = args.device_id();
    let (command, maybe_fake_args) = args.into_command_and_fake_args();
    let hardware_client = match maybe_fake_args {
        Some(fake_args) => fake_client_from_args(fake_args, device_id),
        None => real_hardware_client(),
    };

    let run_result = dlpc::run_with_options(
        command,
        &mut stdout,
        hardware_client,
        device_id,
        options,
    )
    .await;

    match run_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
