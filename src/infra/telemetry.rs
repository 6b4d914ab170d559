use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::tracker::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_INVALID_BARCODE, METRIC_LOOKUP_FAILURE,
    METRIC_LOOKUP_MS, METRIC_REJECT, METRIC_RUNNING_TOTAL,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so that stdout stays reserved for published totals.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Products served from the cache partition."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Products that had to be fetched from Open Food Facts."
        );
        describe_counter!(
            METRIC_LOOKUP_FAILURE,
            Unit::Count,
            "Product lookups that failed (timeout, transport, status, body)."
        );
        describe_counter!(
            METRIC_REJECT,
            Unit::Count,
            "Products without a usable per-serving energy."
        );
        describe_counter!(
            METRIC_INVALID_BARCODE,
            Unit::Count,
            "Inbound payloads discarded because they are not bar codes."
        );
        describe_histogram!(
            METRIC_LOOKUP_MS,
            Unit::Milliseconds,
            "Product lookup latency in milliseconds."
        );
        describe_gauge!(
            METRIC_RUNNING_TOTAL,
            "Running energy total in kilojoules."
        );
    });
}
