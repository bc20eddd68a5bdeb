// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

/*!
Single-server NTP synchronization engine with a tokio driver.

The core is [`engine::SyncEngine`], a sans-IO state machine that polls one
server, averages replies, decides whether to step the local clock and reports
every outcome as a [`event::SyncEvent`]. Network transport, name resolution,
timers and the clock are collaborators supplied by the host (see [`host`]).
[`client::NtpSyncClient`] supplies all of them on top of tokio.

# Example

```rust,no_run
# async fn example() -> std::io::Result<()> {
let (client, state) = ntpsync_client::client::NtpSyncClient::builder()
    .server("pool.ntp.org")
    .on_event(|event| println!("{event}"))
    .build()?;
tokio::spawn(client.run());

let mut state = state;
state.changed().await.ok();
println!("status: {}", state.borrow().status);
# Ok(())
# }
```

# Feature Flags

| Feature | Default | Description |
|---------|---------|-------------|
| `tokio` | yes | [`client::NtpSyncClient`], the tokio host driver. |
| `clock` | no | Step the system clock with `libc::clock_settime`. Without it [`clock::SystemClock`] refuses writes. |
*/

#![warn(missing_docs)]

// Re-export protocol types from ntpsync_proto for convenience.
pub use ntpsync_proto::{Timeval, protocol, unix_time};

/// Error types for the engine and its collaborators.
pub mod error;

/// Wall-clock access and the clock step.
pub mod clock;

/// Configuration and defaults.
pub mod config;

/// Request construction and the offset/delay calculation.
pub mod request;

/// Reply plausibility checks.
pub mod validate;

/// Offset averaging.
pub mod filter;

/// Sync status, counters and poll interval selection.
pub mod session;

/// Events reported to the host application.
pub mod event;

/// Collaborator traits.
pub mod host;

/// The synchronization engine.
pub mod engine;

/// Tokio host driver.
#[cfg(feature = "tokio")]
pub mod client;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use event::{SyncEvent, SyncEventKind};
pub use session::SyncStatus;
