//! Logging integration for the yoyo engine.
//!
//! Provides a helper for configuring a global [`tracing`] subscriber from
//! [`Settings`](crate::settings::Settings). The engine itself only emits
//! `tracing` events (lock acquisition, per-migration and per-step spans);
//! it never decides how those events are formatted or where they go.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level is read from `settings.log_level` (e.g. `"debug"`,
/// `"info"`, `"warn"`, `"error"`). Verbose mode uses a pretty,
/// human-readable format with file/line info; otherwise a compact format
/// suitable for CI logs is used.
///
/// Safe to call more than once: if a subscriber is already installed, the
/// second call is a no-op rather than a panic, since `yoyo-cli` and test
/// harnesses may both want to initialize logging.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.verbose {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one migration-plan run, attached for the
/// lifetime of lock acquisition through post-apply hook execution.
///
/// # Examples
///
/// ```
/// use yoyo_core::logging::plan_span;
///
/// let span = plan_span("apply", "postgresql://localhost/db");
/// let _guard = span.enter();
/// tracing::info!("running plan");
/// ```
pub fn plan_span(direction: &str, database: &str) -> tracing::Span {
    tracing::info_span!("plan", direction = direction, database = database)
}
