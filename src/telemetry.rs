use std::io::{self, IsTerminal};
use std::sync::OnceLock;
use std::time::Duration;

use indicatif::ProgressStyle;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use tracing::level_filters::LevelFilter;
use tracing::{Level, Metadata};
use tracing_indicatif::{IndicatifLayer, TickSettings};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::filter::{self, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

use crate::error::TelemetryError;

const DEFAULT_LOG_FILTER: &str = "warn";
const PROGRESS_TARGET_PREFIX: &str = "dlpc::";
const PROGRESS_TEMPLATE: &str = "{spinner:.cyan.bold} {msg} [{bar:30.cyan/blue}] {pos}/{len}";
const PROGRESS_TICK: Duration = Duration::from_millis(90);

static TRACING_INITIALISED: OnceLock<Result<(), TelemetryError>> = OnceLock::new();

/// Installs the global subscriber.
///
/// Only the first call installs anything; later calls return its outcome, so
/// repeated CLI runs inside one process share a subscriber.
pub(crate) fn initialise_tracing(
    service_name: &str,
    interactive_terminal: bool,
    log_level: Option<LevelFilter>,
) -> Result<(), &'static TelemetryError> {
    TRACING_INITIALISED
        .get_or_init(|| install(service_name, interactive_terminal, log_level))
        .as_ref()
        .copied()
}

fn install(
    service_name: &str,
    interactive_terminal: bool,
    log_level: Option<LevelFilter>,
) -> Result<(), TelemetryError> {
    let tracer = tracer(service_name);
    let log_filter = log_filter(log_level);

    // Progress bars redraw stderr, so both checks must agree.
    if interactive_terminal && io::stderr().is_terminal() {
        let indicatif_layer = IndicatifLayer::new()
            .with_progress_style(progress_style())
            .with_tick_settings(TickSettings {
                default_tick_interval: Some(PROGRESS_TICK),
                ..TickSettings::default()
            });
        let formatting_layer = fmt::layer()
            .pretty()
            .with_target(false)
            .with_writer(indicatif_layer.get_stderr_writer())
            .with_filter(log_filter);
        let progress_layer = indicatif_layer.with_filter(filter::filter_fn(shows_progress));

        tracing_subscriber::registry()
            .with(formatting_layer)
            .with(progress_layer)
            .with(OpenTelemetryLayer::new(tracer))
            .try_init()?;
    } else {
        let json_layer = fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .with_writer(io::stderr)
            .with_filter(log_filter);

        tracing_subscriber::registry()
            .with(json_layer)
            .with(OpenTelemetryLayer::new(tracer))
            .try_init()?;
    }

    Ok(())
}

fn tracer(service_name: &str) -> SdkTracer {
    let resource = Resource::builder()
        .with_service_name(service_name.to_owned())
        .build();
    let provider = SdkTracerProvider::builder().with_resource(resource).build();
    let tracer = provider.tracer(service_name.to_owned());
    global::set_tracer_provider(provider);
    tracer
}

/// `--log-level` wins over `RUST_LOG`, which wins over the default.
fn log_filter(log_level: Option<LevelFilter>) -> EnvFilter {
    match log_level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_error| EnvFilter::new(DEFAULT_LOG_FILTER)),
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_error| ProgressStyle::default_spinner())
}

// Only info-level spans from this crate get a bar; the upload span is one.
fn shows_progress(metadata: &Metadata<'_>) -> bool {
    metadata.is_span()
        && metadata.target().starts_with(PROGRESS_TARGET_PREFIX)
        && *metadata.level() <= Level::INFO
}
