//! Overlay Platform Capability
//!
//! The compositor-facing seam. A platform hands out overlay surfaces pinned
//! to screen edges, wraps shared-memory regions as pixel buffers, and reports
//! what happened since the last poll as discrete [`PlatformEvent`] values.
//!
//! # Event Flow
//!
//! ```text
//! ┌──────────────────────┐  create/size/anchor/commit  ┌──────────────┐
//! │ NotificationManager  │ ──────────────────────────▶ │   Platform   │
//! │                      │ ◀────────────────────────── │ (compositor) │
//! └──────────────────────┘   poll_events(): Configure, └──────────────┘
//!                            Closed, BufferReleased
//! ```
//!
//! Events are drained once per loop iteration and dispatched by the
//! manager; the platform never calls back into notification state.

pub mod headless;

use std::fmt;
use std::fs::File;

use crate::error::PlatformError;
use crate::placement::{Anchor, Margins};

pub use headless::HeadlessPlatform;

/// Handle to an overlay surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Handle to a pixel buffer backed by shared memory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// Something the compositor reported since the last poll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The surface must be acknowledged before it may be drawn
    ///
    /// A zero width or height means "use the size you asked for".
    Configure {
        /// Surface being configured
        surface: SurfaceId,
        /// Serial to acknowledge
        serial: u32,
        /// Negotiated width
        width: u32,
        /// Negotiated height
        height: u32,
    },

    /// The compositor closed the surface
    Closed {
        /// Surface that was closed
        surface: SurfaceId,
    },

    /// The compositor no longer reads from the buffer
    BufferReleased {
        /// Released buffer
        buffer: BufferId,
    },
}

/// Compositor operations needed to show overlay notifications
///
/// All calls are made from the single state-owning loop.
pub trait OverlayPlatform {
    /// Create an overlay surface on the top layer
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::SurfaceCreation`] if the compositor refuses.
    fn create_overlay_surface(&mut self, namespace: &str) -> Result<SurfaceId, PlatformError>;

    /// Destroy a surface and every buffer still attached to it
    fn destroy_surface(&mut self, surface: SurfaceId);

    /// Request a surface size (takes effect on the next commit)
    fn set_size(&mut self, surface: SurfaceId, width: u32, height: u32);

    /// Pin the surface to screen edges
    fn set_anchor(&mut self, surface: SurfaceId, anchor: Anchor);

    /// Offset the surface from its anchored edges
    fn set_margins(&mut self, surface: SurfaceId, margins: Margins);

    /// Set how much screen space the surface reserves
    fn set_exclusive_zone(&mut self, surface: SurfaceId, zone: i32);

    /// Acknowledge a configure event
    fn ack_configure(&mut self, surface: SurfaceId, serial: u32);

    /// Wrap a shared-memory region as an ARGB8888 buffer
    ///
    /// The platform keeps its own reference to the region; the caller may
    /// drop the file afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::BufferCreation`] if the region cannot be used.
    fn create_buffer(
        &mut self,
        region: &File,
        width: u32,
        height: u32,
        stride: u32,
    ) -> Result<BufferId, PlatformError>;

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Attach a buffer, damage the whole surface and commit
    fn attach_and_commit(&mut self, surface: SurfaceId, buffer: BufferId, width: u32, height: u32);

    /// Commit pending surface state without a new buffer
    fn commit(&mut self, surface: SurfaceId);

    /// Drain events that arrived since the last call
    fn poll_events(&mut self) -> Vec<PlatformEvent>;
}
