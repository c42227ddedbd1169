//! Unix Socket Client
//!
//! Request/response client used by `notifyd-send` and tests.

use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::service::{ServiceCall, ServiceReply};
use crate::transport::frame::{encode, FrameDecoder};
use crate::transport::TransportError;

/// A connection to the notification daemon
#[derive(Debug)]
pub struct ServiceClient {
    stream: UnixStream,
    decoder: FrameDecoder,
}

impl ServiceClient {
    /// Connect to the daemon socket at `socket_path`
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if nothing is listening.
    pub async fn connect(socket_path: &Path) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            TransportError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to connect to {}: {e}", socket_path.display()),
            ))
        })?;

        Ok(Self {
            stream,
            decoder: FrameDecoder::new(),
        })
    }

    /// Send one call and wait for its reply
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the daemon hangs up
    /// before replying, or any framing error.
    pub async fn call(&mut self, call: &ServiceCall) -> Result<ServiceReply, TransportError> {
        let frame = encode(call)?;
        self.stream.write_all(&frame).await?;

        let mut buf = [0u8; 4096];
        loop {
            if let Some(reply) = self.decoder.decode::<ServiceReply>()? {
                return Ok(reply);
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(TransportError::ConnectionClosed);
            }
            self.decoder.push(&buf[..n]);
        }
    }
}
