//! Host-side `tracing` setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install a global subscriber for kernel `tracing` events.
///
/// `RUST_LOG` wins over `config.level`. Returns false if a global subscriber
/// was already installed, in which case nothing changes.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json {
        let fmt_layer = fmt::layer().json().with_target(true).with_current_span(false);
        subscriber.with(fmt_layer).try_init()
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_thread_ids(false);
        subscriber.with(fmt_layer).try_init()
    };
    installed.is_ok()
}
