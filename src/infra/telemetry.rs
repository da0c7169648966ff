use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::documents::{METRIC_CACHE_HIT, METRIC_CACHE_MISS};
use crate::application::jobs::{METRIC_JOB_ITEMS_FAILED, METRIC_JOBS_COMPLETED, METRIC_JOBS_FAILED};
use crate::application::render::METRIC_RENDER_MS;
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Mission orders served from a previous render."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Mission orders rendered because their input changed or had no stored copy."
        );
        describe_counter!(
            METRIC_JOBS_COMPLETED,
            Unit::Count,
            "Jobs that finished with an artifact."
        );
        describe_counter!(
            METRIC_JOBS_FAILED,
            Unit::Count,
            "Jobs that finished without an artifact."
        );
        describe_counter!(
            METRIC_JOB_ITEMS_FAILED,
            Unit::Count,
            "Sub-items dropped from otherwise running jobs."
        );
        describe_histogram!(
            METRIC_RENDER_MS,
            Unit::Milliseconds,
            "Time spent drawing one mission order page."
        );
    });
}
