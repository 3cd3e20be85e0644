use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global JSON subscriber.
///
/// `RUST_LOG` wins when set; otherwise `log_level` applies to everything and
/// this crate logs at debug.
pub fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

fn default_directives(log_level: &str) -> String {
    format!("{},vendor_stream=debug", log_level)
}
