//! Error Types
//!
//! Typed failures for the notification core. Resource failures degrade a
//! single notification; only platform capability failures are fatal, and
//! those surface at startup.

use thiserror::Error;

use crate::notification::NotificationId;

/// Failures reported by the overlay platform
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform could not create an overlay surface
    #[error("Failed to create overlay surface: {0}")]
    SurfaceCreation(String),

    /// The platform could not wrap a shared-memory region as a buffer
    #[error("Failed to create buffer: {0}")]
    BufferCreation(String),

    /// A capability required at startup is not available
    #[error("Missing required platform capability: {0}")]
    MissingCapability(&'static str),
}

/// Failures while painting or publishing a notification
#[derive(Debug, Error)]
pub enum RenderError {
    /// The pixel buffer could not be allocated
    #[error("Failed to allocate {width}x{height} pixel buffer")]
    PixmapAllocation {
        /// Requested width in pixels
        width: u32,
        /// Requested height in pixels
        height: u32,
    },

    /// Text layout or rasterization failed
    #[error("Text rasterization failed: {0}")]
    Text(String),

    /// The shared-memory region could not be created or filled
    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] std::io::Error),

    /// The platform refused the buffer
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Errors returned by notification operations
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The inbound request is missing a required field
    #[error("Invalid notification request: {0}")]
    InvalidRequest(String),

    /// The store holds the maximum number of live notifications
    #[error("Notification limit reached ({limit} live notifications)")]
    CapacityReached {
        /// The configured limit
        limit: usize,
    },

    /// No live notification has this id
    #[error("No live notification with id {0}")]
    UnknownNotification(NotificationId),

    /// Surface allocation failed
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Painting or publishing failed
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl NotifyError {
    /// Whether the caller can reasonably retry later
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CapacityReached { .. } | Self::Platform(_))
    }
}
