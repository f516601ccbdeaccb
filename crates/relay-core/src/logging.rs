//! Tracing setup for the relay binary.
//!
//! Console output is human-readable; the optional file sink rotates daily and
//! writes one JSON object per event so relay runs can be grepped and shipped.
//! `RUST_LOG` overrides the level passed in.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Call once, before any actor is created.
///
/// - `log_level`: used when `RUST_LOG` is unset (e.g. `"info"`)
/// - `log_dir`: directory for `<module_name>.YYYY-MM-DD` files, if any
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let file_layer = log_dir.map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, module_name);
        fmt::layer().json().with_writer(appender).with_ansi(false).with_target(true)
    });

    tracing_subscriber::registry().with(env_filter).with(console_layer).with(file_layer).init();
}
