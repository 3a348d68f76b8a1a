//! Tracing subscriber setup.
//!
//! `RUST_LOG` controls filtering. `TASKBOARD_LOG_FORMAT=pretty` switches the
//! JSON output (the default, meant for log shippers) to human-readable lines
//! for local work.

use tracing_subscriber::EnvFilter;

fn filter() -> EnvFilter {
    // sqlx logs every statement at info; keep that out of the default noise.
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"))
}

/// Install the process-wide subscriber. Later calls are no-ops.
pub fn init() {
    let pretty = std::env::var("TASKBOARD_LOG_FORMAT").is_ok_and(|v| v == "pretty");

    if pretty {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(false)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter())
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init();
    }
}
