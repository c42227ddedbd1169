//! notifyd Core - Popup Notification Lifecycle & Placement
//!
//! This crate holds everything the notification daemon does apart from
//! process bootstrap: the bounded set of live notifications, text-driven
//! sizing, stacking at a screen edge, painting into shared memory, timed
//! expiry, and the IPC contract clients speak.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          IPC clients                             │
//! │            notifyd-send, desktop apps, scripts                   │
//! └───────────────────────────┬──────────────────────────────────────┘
//!                             │  ServiceCall / ServiceReply (transport)
//! ┌───────────────────────────┼──────────────────────────────────────┐
//! │                    NOTIFYD CORE                                  │
//! │  ┌────────────────────────┴────────────────────────────────────┐ │
//! │  │                  NotificationManager                        │ │
//! │  │  ┌──────────┐  ┌──────────┐  ┌───────────┐  ┌────────────┐  │ │
//! │  │  │  Store   │  │  Sizing  │  │ Placement │  │   Expiry   │  │ │
//! │  │  └──────────┘  └──────────┘  └───────────┘  └────────────┘  │ │
//! │  │                 ┌──────────┐                                │ │
//! │  │                 │ Renderer │──── TextRasterizer             │ │
//! │  │                 └────┬─────┘                                │ │
//! │  └──────────────────────┼──────────────────────────────────────┘ │
//! └─────────────────────────┼────────────────────────────────────────┘
//!                           │  OverlayPlatform (surfaces, buffers, events)
//!                    ┌──────┴───────┐
//!                    │  Compositor  │
//!                    └──────────────┘
//! ```
//!
//! All notification state is owned by one [`NotificationManager`] and is
//! only touched from the daemon's single loop. Connection tasks in
//! [`transport`] decode calls and forward them to that loop.
//!
//! # Key Types
//!
//! - [`NotificationManager`]: owns the store, engines and platform
//! - [`NotificationStore`]: ordered, bounded collection of live entries
//! - [`SizingEngine`] / [`PlacementEngine`]: pure geometry
//! - [`ExpiryScheduler`]: timeout and fade scan
//! - [`OverlayPlatform`]: the compositor seam, with [`HeadlessPlatform`]
//! - [`ServiceCall`] / [`ServiceReply`]: the IPC contract
//!
//! # Quick Start
//!
//! ```ignore
//! use notifyd_core::{
//!     HeadlessPlatform, MonospaceText, NotificationManager, NotifydConfig, NotifyParams,
//! };
//!
//! let config = NotifydConfig::default();
//! let text = MonospaceText::new(config.appearance.font.clone());
//! let mut manager = NotificationManager::create(config, HeadlessPlatform::new(), text);
//!
//! let id = manager.upsert(NotifyParams::new("Build").with_body("Running")).unwrap();
//!
//! loop {
//!     manager.dispatch_platform_events();
//!     manager.tick(manager.now_ms());
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod error;
pub mod expiry;
pub mod manager;
pub mod notification;
pub mod placement;
pub mod platform;
pub mod render;
pub mod service;
pub mod sizing;
pub mod store;
pub mod transport;

// Re-exports for convenience
pub use config::{
    load_config, load_config_from_path, AppearanceConfig, BehaviorConfig, ConfigError,
    ConfigSource, LayoutConfig, NotifydConfig, Rgb,
};
pub use error::{NotifyError, PlatformError, RenderError};
pub use expiry::{EntryTiming, ExpiryScheduler, ExpiryTarget};
pub use manager::{NotificationManager, SURFACE_NAMESPACE};
pub use notification::{CloseReason, Notification, NotificationId, NotifyParams};
pub use placement::{Alignment, Anchor, Edge, Margins, Placement, PlacementEngine};
pub use platform::{BufferId, HeadlessPlatform, OverlayPlatform, PlatformEvent, SurfaceId};
pub use render::{FontDescriptor, MonospaceText, Renderer, ShmRegion, TextRasterizer};
pub use service::{handle_call, ErrorKind, NotifyRequest, ServiceCall, ServiceReply};
pub use sizing::{Measurement, SizingEngine, TextExtent, TextMeasure};
pub use store::NotificationStore;

// Transport exports
pub use transport::{
    default_socket_path, ConnectionId, IncomingCall, ServiceClient, ServiceListener,
    TransportError,
};
