#![allow(dead_code)]

pub mod mock_http_client;
pub mod mock_server;

/// Route `tracing` output to the test harness so swallowed failures show up
/// in `--nocapture` runs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
