//! Tracing subscriber setup for the `sml` binary.

use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once; later calls are ignored.
///
/// `RUST_LOG` directives are honoured on top of `level`. Logs go to stderr so
/// they never interleave with program output.
pub fn init(level: Level) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();
        SubscriberBuilder::default()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    });
    tracing::debug!(%level, "tracing initialised");
}
