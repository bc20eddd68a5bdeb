// System daemon example demonstrating:
// - Long-running background sync with structured tracing
// - EnvFilter for RUST_LOG support
// - Reacting to sync events and published state
//
// Run with:
//   RUST_LOG=info cargo run -p ntpsync-client --example daemon
//
// Filter to engine decisions:
//   RUST_LOG=ntpsync_client=debug cargo run -p ntpsync-client --example daemon
//
// Stepping the system clock needs the `clock` feature and CAP_SYS_TIME:
//   sudo -E cargo run -p ntpsync-client --example daemon --features clock

use std::time::Duration;

use ntpsync_client::client::{NtpSyncClient, SyncSnapshot};
use ntpsync_client::{SyncEvent, SyncStatus};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let server = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "pool.ntp.org".to_owned());

    let (client, mut state_rx) = NtpSyncClient::builder()
        .server(server.clone())
        .intervals(Duration::from_secs(15), Duration::from_secs(600))
        .num_ave_rounds(2)
        .on_event(log_event)
        .build()?;

    info!(%server, short_s = 15, long_s = 600, "NTP sync client configured");

    let mut client_handle = tokio::spawn(client.run());
    let mut last_status = SyncStatus::Unsynced;

    loop {
        tokio::select! {
            Ok(()) = state_rx.changed() => {
                let state = state_rx.borrow().clone();
                if state.status != last_status {
                    log_status(&state);
                    last_status = state.status;
                }
            }

            res = &mut client_handle => {
                match res {
                    Ok(()) => warn!("NTP client stopped unexpectedly"),
                    Err(e) => error!(error = %e, "NTP client panicked"),
                }
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                client_handle.abort();
                break;
            }
        }
    }

    Ok(())
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::TimeSyncd { .. }
        | SyncEvent::PartlySync { .. }
        | SyncEvent::RequestSent { .. }
        | SyncEvent::SyncNotNeeded { .. } => info!("{event}"),
        _ => warn!("{event}"),
    }
}

fn log_status(state: &SyncSnapshot) {
    info!(
        status = %state.status,
        offset_ms = state.offset * 1e3,
        delay_ms = state.delay * 1e3,
        next_poll_s = state.actual_interval.as_secs(),
        "sync status changed"
    );
}
