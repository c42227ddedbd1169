//! Unix Socket Listener
//!
//! Accepts client connections and runs one task per connection. A
//! connection task decodes calls, hands each to the daemon loop with a
//! oneshot reply channel, and writes the reply back in order.

use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::service::{ErrorKind, ServiceCall, ServiceReply};
use crate::transport::frame::{encode, FrameDecoder};
use crate::transport::TransportError;

/// Identifier of one accepted connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// A decoded call waiting for the daemon loop to answer it
#[derive(Debug)]
pub struct IncomingCall {
    /// Connection the call arrived on
    pub connection: ConnectionId,
    /// The call
    pub call: ServiceCall,
    reply: oneshot::Sender<ServiceReply>,
}

impl IncomingCall {
    /// Send the reply back to the connection task
    pub fn respond(self, reply: ServiceReply) {
        if self.reply.send(reply).is_err() {
            tracing::debug!(conn_id = %self.connection, "Client left before reply");
        }
    }

    /// Hand the call to `handler` and send back what it returns
    pub fn respond_with<F>(self, handler: F)
    where
        F: FnOnce(ServiceCall) -> ServiceReply,
    {
        let Self {
            connection,
            call,
            reply,
        } = self;
        if reply.send(handler(call)).is_err() {
            tracing::debug!(conn_id = %connection, "Client left before reply");
        }
    }
}

/// Server side of the notification socket
#[derive(Debug)]
pub struct ServiceListener {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    next_connection: AtomicU64,
}

impl ServiceListener {
    /// Create a listener for `socket_path` (not yet bound)
    #[must_use]
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            listener: None,
            next_connection: AtomicU64::new(1),
        }
    }

    /// Create a listener using the default socket path
    #[must_use]
    pub fn with_default_path() -> Self {
        Self::new(super::default_socket_path())
    }

    /// Socket path
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one, with owner-only permissions
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the directory, bind or chmod fails.
    pub async fn listen(&mut self) -> Result<(), TransportError> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TransportError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory {}: {e}", parent.display()),
                ))
            })?;
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                TransportError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to remove old socket {}: {e}", self.socket_path.display()),
                ))
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;
        self.listener = Some(listener);

        tracing::info!(path = %self.socket_path.display(), "Listening for notifications");
        Ok(())
    }

    /// Accept one connection and start its task
    ///
    /// Calls decoded on the connection are sent to `calls`.
    ///
    /// # Errors
    ///
    /// Fails if not listening, if accept fails, or if the peer runs as a
    /// different user.
    pub async fn accept(
        &self,
        calls: mpsc::Sender<IncomingCall>,
    ) -> Result<(ConnectionId, JoinHandle<()>), TransportError> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| TransportError::InvalidState("Not listening".to_string()))?;

        let (stream, _addr) = listener.accept().await?;
        validate_peer(&stream)?;

        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(conn_id = %id, "Client connected");

        let task = tokio::spawn(serve_connection(id, stream, calls));
        Ok((id, task))
    }

    /// Stop accepting and remove the socket file
    pub fn shutdown(&mut self) {
        self.listener = None;
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).ok();
        }
        tracing::info!(path = %self.socket_path.display(), "Socket closed");
    }
}

impl Drop for ServiceListener {
    fn drop(&mut self) {
        if self.listener.is_some() && self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).ok();
        }
    }
}

async fn serve_connection(id: ConnectionId, stream: UnixStream, calls: mpsc::Sender<IncomingCall>) {
    let (mut read_half, mut write_half) = stream.into_split();
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];

    'read: loop {
        let n = match read_half.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(conn_id = %id, error = %e, "Read error");
                break;
            }
        };
        decoder.push(&buf[..n]);

        loop {
            let call = match decoder.decode::<ServiceCall>() {
                Ok(Some(call)) => call,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(conn_id = %id, error = %e, "Dropping malformed stream");
                    let reply = ServiceReply::Error {
                        kind: ErrorKind::InvalidRequest,
                        message: e.to_string(),
                    };
                    if let Ok(data) = encode(&reply) {
                        write_half.write_all(&data).await.ok();
                    }
                    break 'read;
                }
            };

            tracing::debug!(conn_id = %id, method = call.method(), "Call received");
            let (reply_tx, reply_rx) = oneshot::channel();
            let incoming = IncomingCall {
                connection: id,
                call,
                reply: reply_tx,
            };
            if calls.send(incoming).await.is_err() {
                tracing::debug!(conn_id = %id, "Daemon loop gone");
                break 'read;
            }

            let reply = reply_rx.await.unwrap_or_else(|_| ServiceReply::Error {
                kind: ErrorKind::Internal,
                message: "call was dropped without a reply".to_string(),
            });

            match encode(&reply) {
                Ok(data) => {
                    if let Err(e) = write_half.write_all(&data).await {
                        tracing::warn!(conn_id = %id, error = %e, "Write error");
                        break 'read;
                    }
                }
                Err(e) => tracing::warn!(conn_id = %id, error = %e, "Encode error"),
            }
        }
    }

    tracing::debug!(conn_id = %id, "Connection ended");
}

/// Reject peers running as another user (`SO_PEERCRED`)
#[cfg(target_os = "linux")]
fn validate_peer(stream: &UnixStream) -> Result<(), TransportError> {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();

    // SAFETY: fd is a live socket owned by `stream`; cred and len are valid
    // for writes of the sizes passed.
    let cred = unsafe {
        let mut cred: libc::ucred = std::mem::zeroed();
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        let result = libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            &mut cred as *mut _ as *mut libc::c_void,
            &mut len,
        );

        if result < 0 {
            return Err(TransportError::AuthenticationFailed(
                "Failed to get peer credentials".to_string(),
            ));
        }
        cred
    };

    // SAFETY: getuid has no preconditions and cannot fail
    let my_uid = unsafe { libc::getuid() };

    if cred.uid != my_uid {
        tracing::warn!(
            peer_uid = cred.uid,
            my_uid = my_uid,
            "Rejecting connection from different user"
        );
        return Err(TransportError::AuthenticationFailed(format!(
            "Peer UID {} does not match server UID {}",
            cred.uid, my_uid
        )));
    }

    tracing::trace!(peer_uid = cred.uid, peer_pid = cred.pid, "Peer validated");
    Ok(())
}

/// Non-Linux platforms rely on the socket's file permissions
#[cfg(not(target_os = "linux"))]
fn validate_peer(_stream: &UnixStream) -> Result<(), TransportError> {
    Ok(())
}
