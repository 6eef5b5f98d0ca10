pub mod host;
pub mod surface;

pub use host::TestHost;
pub use surface::TestSurface;

use siteblock_core::SyncConfig;

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to the
/// configured level. Safe to call from every test; only the first call wins.
pub fn init_tracing(config: &SyncConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.log_level.clone();
        if !filter.contains("rusqlite") {
            filter.push_str(",rusqlite=warn");
        }
        tracing_subscriber::EnvFilter::new(filter)
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}
