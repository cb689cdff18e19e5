//! Tracing subscriber setup

use crate::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is not set
pub fn default_log_level(debug: bool) -> &'static str {
    if debug {
        "intela=debug,intela_http=debug,intela_daemon=debug,tower_http=info"
    } else {
        "intela=info,intela_http=info,intela_daemon=info,tower_http=info"
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `log_level`.
pub fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}
