//! Daemon Server Implementation
//!
//! Runs the single loop that owns the [`NotificationManager`]:
//! - An accept task hands each client connection to its own task
//! - Connection tasks forward decoded calls over one channel
//! - The loop answers calls, routes compositor events and expires entries
//!
//! ```text
//!      client A      client B      client C
//!     (conn_1)      (conn_2)      (conn_3)
//!         │             │             │
//!         └─────────────┼─────────────┘
//!                       │ IncomingCall (mpsc)
//!                       ▼
//!   ┌──────────── loop, every ≤16 ms ───────────┐
//!   │ wait ─▶ platform events ─▶ calls ─▶ tick  │
//!   └───────────────────────────────────────────┘
//!                       │
//!                NotificationManager
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use notifyd_core::{
    handle_call, ConnectionId, IncomingCall, NotificationManager, OverlayPlatform,
    ServiceListener, TextRasterizer, TransportError,
};

/// Longest the loop waits before servicing the compositor again
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Connection state tracking
struct ConnectionState {
    /// When the connection was established
    connected_at: Instant,
    /// The connection task
    task: JoinHandle<()>,
}

/// Configuration for the daemon server
pub struct ServerConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Calls that may wait for the loop before senders block
    pub call_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: 64,
            call_capacity: 256,
        }
    }
}

/// The daemon server
pub struct DaemonServer {
    /// Path to the Unix socket
    socket_path: PathBuf,
    /// Server configuration
    server_config: ServerConfig,
    /// Active connections
    connections: Arc<DashMap<ConnectionId, ConnectionState>>,
}

impl DaemonServer {
    /// Create a new daemon server
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            server_config: ServerConfig::default(),
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Serve until `shutdown` is set, then release every notification
    pub async fn run<P, T>(
        &self,
        mut manager: NotificationManager<P, T>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<()>
    where
        P: OverlayPlatform,
        T: TextRasterizer,
    {
        let mut listener = ServiceListener::new(self.socket_path.clone());
        listener
            .listen()
            .await
            .with_context(|| format!("Failed to bind to {}", self.socket_path.display()))?;
        let listener = Arc::new(listener);

        let (call_tx, mut call_rx) = mpsc::channel::<IncomingCall>(self.server_config.call_capacity);
        let accept_task = tokio::spawn(Self::accept_loop(
            Arc::clone(&listener),
            call_tx,
            Arc::clone(&self.connections),
            self.server_config.max_connections,
        ));

        let mut interval = tokio::time::interval(FRAME_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Notification loop running");

        while !shutdown.load(Ordering::SeqCst) {
            let first = tokio::select! {
                call = call_rx.recv() => call,
                _ = interval.tick() => None,
            };

            manager.dispatch_platform_events();

            let mut answered = 0usize;
            if let Some(call) = first {
                Self::answer(&mut manager, call);
                answered += 1;
            }
            while let Ok(call) = call_rx.try_recv() {
                Self::answer(&mut manager, call);
                answered += 1;
            }
            if answered > 0 {
                debug!(answered, live = manager.store().len(), "Calls answered");
            }

            let now = manager.now_ms();
            let expired = manager.tick(now);
            if !expired.is_empty() {
                debug!(count = expired.len(), "Notifications expired");
            }

            self.reap_connections();
        }

        accept_task.abort();
        // The accept task holds a listener reference until it is dropped
        let _ = accept_task.await;
        self.shutdown();
        manager.destroy();

        match Arc::try_unwrap(listener) {
            Ok(mut listener) => listener.shutdown(),
            Err(_) => warn!("Listener still shared at shutdown"),
        }
        Ok(())
    }

    async fn accept_loop(
        listener: Arc<ServiceListener>,
        calls: mpsc::Sender<IncomingCall>,
        connections: Arc<DashMap<ConnectionId, ConnectionState>>,
        max_connections: usize,
    ) {
        loop {
            match listener.accept(calls.clone()).await {
                Ok((conn_id, task)) => {
                    if connections.len() >= max_connections {
                        warn!(conn_id = %conn_id, "Connection limit reached, rejecting");
                        task.abort();
                        continue;
                    }
                    info!(
                        conn_id = %conn_id,
                        active_connections = connections.len() + 1,
                        "New connection accepted"
                    );
                    connections.insert(
                        conn_id,
                        ConnectionState {
                            connected_at: Instant::now(),
                            task,
                        },
                    );
                }
                Err(TransportError::AuthenticationFailed(reason)) => {
                    warn!(reason = %reason, "Connection rejected");
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                }
            }
        }
    }

    fn answer<P, T>(manager: &mut NotificationManager<P, T>, incoming: IncomingCall)
    where
        P: OverlayPlatform,
        T: TextRasterizer,
    {
        let conn_id = incoming.connection;
        let method = incoming.call.method();
        incoming.respond_with(|call| handle_call(manager, call));
        debug!(conn_id = %conn_id, method, "Answered call");
    }

    /// Forget connections whose task has finished
    fn reap_connections(&self) {
        self.connections.retain(|conn_id, state| {
            let alive = !state.task.is_finished();
            if !alive {
                debug!(
                    conn_id = %conn_id,
                    duration_ms = state.connected_at.elapsed().as_millis() as u64,
                    "Connection closed"
                );
            }
            alive
        });
    }

    /// Abort every connection task
    fn shutdown(&self) {
        info!(
            active_connections = self.connections.len(),
            "Closing connections"
        );
        for entry in self.connections.iter() {
            entry.value().task.abort();
        }
        self.connections.clear();
    }
}
