//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber.
///
/// `filter` uses `RUST_LOG` syntax. `format` is `json` for one JSON object
/// per line; anything else gives human-readable text. Calling this twice is
/// harmless: the second call keeps the first subscriber.
pub fn init_tracing(filter: &str, format: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .with_target(true);

    let _ = if format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
