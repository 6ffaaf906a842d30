//! Subscriber setup. Output goes to stderr; stdout carries the stdio transport.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogLevel;

/// `RUST_LOG` overrides the configured level when set.
pub fn init(level: LogLevel) {
    let Some(directive) = level.directive() else {
        return;
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter)
        .try_init();
}
