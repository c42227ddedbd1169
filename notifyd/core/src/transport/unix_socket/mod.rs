//! Unix Socket Transport
//!
//! # Socket Location
//!
//! Default: `$XDG_RUNTIME_DIR/notifyd/notifyd.sock`
//! Fallback: `/tmp/notifyd-$UID/notifyd.sock`
//!
//! # Security
//!
//! - Socket created with mode 0600 (owner-only access)
//! - Peer UID validated via `SO_PEERCRED` (Linux)
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  ServiceCall   ┌─────────────────┐  IncomingCall  ┌─────────────┐
//! │ ServiceClient ├───────────────►│ connection task ├───────────────►│ daemon loop │
//! │ (notifyd-send)│◄───────────────┤ (one per peer)  │◄───────────────┤ (manager)   │
//! └───────────────┘  ServiceReply  └─────────────────┘    oneshot     └─────────────┘
//! ```

mod client;
mod server;

pub use client::ServiceClient;
pub use server::{ConnectionId, IncomingCall, ServiceListener};

use std::path::PathBuf;

/// Default socket path for the daemon
///
/// Uses `XDG_RUNTIME_DIR` if available, otherwise `/tmp/notifyd-$UID/`.
#[must_use]
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("notifyd").join("notifyd.sock")
    } else {
        // SAFETY: getuid has no preconditions and cannot fail
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/notifyd-{uid}/notifyd.sock"))
    }
}
