//! Workspace-wide `tracing` setup.
//!
//! All volley crates log through `tracing` with structured fields; this
//! module owns subscriber installation so binaries and test harnesses
//! configure output exactly once.

use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Only events from our own crates are emitted; dependency noise is filtered
/// at the subscriber rather than per-call-site.
const TARGET_PREFIX: &str = "volley";

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg),*)
    }};
}

/// Events for messages leaving through a transport handle.
#[macro_export]
macro_rules! outbound {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "outbound", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outbound!(level = TRACE, $($msg),*)
    };
}

/// Events for the engine's own lifecycle.
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

/// The level requested through `LOG_LEVEL`, falling back to TRACE for debug
/// builds and INFO otherwise.
fn level_from_env() -> LevelFilter {
    let default = if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    std::env::var("LOG_LEVEL").map_or(default, |level| {
        LevelFilter::from_str(level.as_str()).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    })
}

/// Install the global subscriber.
///
/// Safe to call more than once: if a collector is already installed (another
/// test in the same process got there first), the existing one is kept.
pub fn init() {
    let layer = tracing_subscriber::fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_ansi(true)
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
        .with_filter(level_from_env())
        .with_filter(FilterFn::new(|metadata| {
            metadata.target().starts_with(TARGET_PREFIX)
        }));

    let _ = tracing_subscriber::Registry::default().with(layer).try_init();
}
