//! Tracing setup for the dashboard binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "procview=info,procview_adapters=info";

/// Installs the global subscriber.
///
/// `RUST_LOG` replaces the default directives when set. Records emitted
/// through the `log` facade by the adapters crate are forwarded as well.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter)
        .init();
}
