use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global subscriber once. `TALK_LOG` overrides the default
/// filter (e.g. `TALK_LOG=talk_core=trace`). Safe to call from every entry
/// point; later calls are no-ops.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("TALK_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info,talk_core=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
