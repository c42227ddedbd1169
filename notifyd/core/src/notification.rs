//! Notification Model
//!
//! One live notification: its text, timing, computed size, stack position
//! and the overlay surface that displays it.
//!
//! # Lifecycle
//!
//! ```text
//!   upsert ──▶ surface created ──▶ Configure ──▶ ack + paint + publish
//!                                                      │
//!           replaced (same key) ◀──────────────────────┤
//!                                                      │
//!   expired / dismissed / closed ──▶ surface + buffers destroyed
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tiny_skia::Pixmap;

use crate::platform::{BufferId, SurfaceId};

/// Identifier handed back to clients
///
/// Never zero; zero on the wire means "no replacement".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(u32);

impl NotificationId {
    /// Wrap a raw id, rejecting zero
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    /// Raw value as sent over IPC
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated input to an upsert
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NotifyParams {
    /// Key of a live notification to replace (0 = none)
    pub replace_key: u32,
    /// Required, non-empty title line
    pub summary: String,
    /// Optional body text
    pub body: Option<String>,
    /// Sending application, for logging
    pub app_name: String,
    /// Per-notification timeout; `None` uses the default, `Some(0)` never expires
    pub expire_after: Option<u64>,
}

impl NotifyParams {
    /// Params with only a summary set
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the replacement key
    #[must_use]
    pub fn replacing(mut self, key: u32) -> Self {
        self.replace_key = key;
        self
    }

    /// Set the timeout in milliseconds (0 = never)
    #[must_use]
    pub fn expire_after(mut self, ms: u64) -> Self {
        self.expire_after = Some(ms);
        self
    }

    /// Set the sending application
    #[must_use]
    pub fn from_app(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }
}

/// Why a notification went away
///
/// Numeric values follow the freedesktop `NotificationClosed` reasons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Its timeout elapsed
    Expired = 1,
    /// The compositor closed its surface
    Dismissed = 2,
    /// A client asked for it to be closed
    ClosedByCall = 3,
    /// Shutdown or resource failure
    Undefined = 4,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::Dismissed => write!(f, "dismissed"),
            Self::ClosedByCall => write!(f, "closed by call"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

/// A live notification
#[derive(Debug)]
pub struct Notification {
    pub(crate) id: NotificationId,
    pub(crate) replace_key: u32,
    pub(crate) summary: String,
    pub(crate) body: Option<String>,
    pub(crate) app_name: String,
    pub(crate) created_at: u64,
    pub(crate) expire_after: Option<u64>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) position_index: usize,
    pub(crate) surface: SurfaceId,
    pub(crate) configured: bool,
    pub(crate) surface_size: (u32, u32),
    pub(crate) opacity: f32,
    pub(crate) canvas: Option<Pixmap>,
    pub(crate) buffers_in_flight: Vec<BufferId>,
}

impl Notification {
    /// Identifier handed to the client
    #[must_use]
    pub fn id(&self) -> NotificationId {
        self.id
    }

    /// Key this notification was created to replace, 0 if none
    #[must_use]
    pub fn replace_key(&self) -> u32 {
        self.replace_key
    }

    /// Title line
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Body text, if any
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Sending application
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Creation (or last replacement) time in milliseconds
    #[must_use]
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Timeout carried by the request
    #[must_use]
    pub fn expire_after(&self) -> Option<u64> {
        self.expire_after
    }

    /// Text-derived `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Rank in the stack; 0 is nearest the anchored edge
    #[must_use]
    pub fn position_index(&self) -> usize {
        self.position_index
    }

    /// Overlay surface showing this notification
    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Whether the first configure has been acknowledged
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Size actually painted: the negotiated size, or the computed one
    #[must_use]
    pub fn paint_size(&self) -> (u32, u32) {
        let (w, h) = self.surface_size;
        (
            if w == 0 { self.width } else { w },
            if h == 0 { self.height } else { h },
        )
    }

    /// Current opacity (1.0 unless fading out)
    #[must_use]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Buffers handed to the compositor and not yet released
    #[must_use]
    pub fn buffers_in_flight(&self) -> &[BufferId] {
        &self.buffers_in_flight
    }

    /// Whether `key` targets this notification for replacement
    #[must_use]
    pub fn matches_replace_key(&self, key: u32) -> bool {
        key != 0 && (self.id.as_u32() == key || self.replace_key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: u32, replace_key: u32) -> Notification {
        Notification {
            id: NotificationId::new(id).unwrap(),
            replace_key,
            summary: "s".to_string(),
            body: None,
            app_name: String::new(),
            created_at: 0,
            expire_after: None,
            width: 300,
            height: 50,
            position_index: 0,
            surface: SurfaceId(1),
            configured: false,
            surface_size: (0, 0),
            opacity: 1.0,
            canvas: None,
            buffers_in_flight: Vec::new(),
        }
    }

    #[test]
    fn test_zero_is_not_an_id() {
        assert!(NotificationId::new(0).is_none());
        assert_eq!(NotificationId::new(7).unwrap().as_u32(), 7);
    }

    #[test]
    fn test_replace_key_matches_id_or_stored_key() {
        let n = notification(3, 42);
        assert!(n.matches_replace_key(3));
        assert!(n.matches_replace_key(42));
        assert!(!n.matches_replace_key(0));
        assert!(!n.matches_replace_key(4));
    }

    #[test]
    fn test_paint_size_falls_back_per_axis() {
        let mut n = notification(1, 0);
        assert_eq!(n.paint_size(), (300, 50));

        n.surface_size = (320, 0);
        assert_eq!(n.paint_size(), (320, 50));
    }

    #[test]
    fn test_params_builder() {
        let p = NotifyParams::new("Build")
            .with_body("done")
            .replacing(9)
            .expire_after(0)
            .from_app("ci");
        assert_eq!(p.summary, "Build");
        assert_eq!(p.body.as_deref(), Some("done"));
        assert_eq!(p.replace_key, 9);
        assert_eq!(p.expire_after, Some(0));
        assert_eq!(p.app_name, "ci");
    }
}
