use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "page_cache_hit_total",
            Unit::Count,
            "Requests answered from a stored page artifact."
        );
        describe_counter!(
            "page_cache_miss_total",
            Unit::Count,
            "Eligible requests that had to run the rendering pipeline."
        );
        describe_counter!(
            "page_cache_skip_total",
            Unit::Count,
            "Requests that bypassed the cache, labelled by the failing rule."
        );
        describe_counter!(
            "page_cache_not_modified_total",
            Unit::Count,
            "Cache hits answered with 304 Not Modified."
        );
        describe_counter!(
            "page_cache_store_total",
            Unit::Count,
            "Page artifacts published to the store."
        );
        describe_counter!(
            "page_cache_store_error_total",
            Unit::Count,
            "Page artifacts the store refused to accept."
        );
        describe_counter!(
            "page_cache_evict_total",
            Unit::Count,
            "Page artifacts evicted due to capacity."
        );
        describe_counter!(
            "page_cache_clear_total",
            Unit::Count,
            "Whole-store clears, labelled by reason."
        );
        describe_gauge!(
            "page_cache_entries",
            Unit::Count,
            "Current number of stored page artifacts."
        );
    });
}
