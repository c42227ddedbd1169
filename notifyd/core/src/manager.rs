//! Notification Manager
//!
//! Owns every piece of notification state and is the only thing that
//! mutates it. The daemon loop feeds it three kinds of input, always from
//! the same thread:
//!
//! ```text
//!   IPC call ──────────▶ upsert / close
//!   platform events ───▶ dispatch_platform_events ─▶ on_configure / remove / release
//!   loop tick ─────────▶ tick ─▶ ExpiryScheduler ─▶ remove_at
//!                                        │
//!                                        ▼
//!                           PlacementEngine restack
//! ```

use std::time::Instant;

use crate::config::NotifydConfig;
use crate::error::NotifyError;
use crate::expiry::{EntryTiming, ExpiryScheduler, ExpiryTarget};
use crate::notification::{CloseReason, Notification, NotificationId, NotifyParams};
use crate::placement::{Placement, PlacementEngine};
use crate::platform::{OverlayPlatform, PlatformEvent};
use crate::render::{Renderer, TextRasterizer};
use crate::sizing::SizingEngine;
use crate::store::NotificationStore;

/// Namespace given to every overlay surface
pub const SURFACE_NAMESPACE: &str = "notifyd";

/// Single owner of the live notifications and the platform connection
pub struct NotificationManager<P, T> {
    config: NotifydConfig,
    store: NotificationStore,
    sizing: SizingEngine,
    placement: PlacementEngine,
    renderer: Renderer,
    expiry: ExpiryScheduler,
    platform: P,
    text: T,
    next_id: u32,
    epoch: Instant,
}

impl<P, T> NotificationManager<P, T>
where
    P: OverlayPlatform,
    T: TextRasterizer,
{
    /// Build the manager at startup
    #[must_use]
    pub fn create(config: NotifydConfig, platform: P, text: T) -> Self {
        let sizing = SizingEngine::new(&config.appearance, &config.layout);
        let placement = PlacementEngine::from_config(&config.layout);
        let renderer = Renderer::new(&config.appearance, &sizing);
        let expiry = ExpiryScheduler::from_config(&config.behavior);
        let store = NotificationStore::new(config.behavior.max_notifications);

        tracing::info!(
            capacity = store.capacity(),
            edge = %config.layout.edge,
            alignment = %config.layout.alignment,
            default_duration_ms = config.behavior.default_duration_ms,
            "Notification manager ready"
        );

        Self {
            config,
            store,
            sizing,
            placement,
            renderer,
            expiry,
            platform,
            text,
            next_id: 1,
            epoch: Instant::now(),
        }
    }

    /// Release every surface and buffer, returning the platform
    pub fn destroy(mut self) -> P {
        let count = self.store.len();
        while let Some(notification) = self.store.remove_at(0) {
            self.release(notification, CloseReason::Undefined);
        }
        tracing::info!(released = count, "Notification manager shut down");
        self.platform
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Live notifications
    #[must_use]
    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    /// The platform connection
    #[must_use]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The platform connection, mutably
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Configuration the manager was created with
    #[must_use]
    pub fn config(&self) -> &NotifydConfig {
        &self.config
    }

    /// Milliseconds since the manager was created
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    // =========================================================================
    // Upsert / Remove
    // =========================================================================

    /// Create or replace a notification, stamped with the current time
    ///
    /// # Errors
    ///
    /// See [`NotificationManager::upsert_at`].
    pub fn upsert(&mut self, params: NotifyParams) -> Result<NotificationId, NotifyError> {
        let now = self.now_ms();
        self.upsert_at(params, now)
    }

    /// Create or replace a notification as of `now` milliseconds
    ///
    /// A live entry matching `replace_key` is updated in place and keeps its
    /// id, position and surface. Otherwise a new entry is appended.
    ///
    /// # Errors
    ///
    /// - [`NotifyError::InvalidRequest`] for a blank summary
    /// - [`NotifyError::CapacityReached`] when full and nothing matches
    /// - [`NotifyError::Platform`] when the surface cannot be created
    /// - [`NotifyError::Render`] when a replacement frame cannot be published
    ///
    /// The store is unchanged in every error case; a failed replacement
    /// keeps the previous text, size and frame.
    pub fn upsert_at(
        &mut self,
        params: NotifyParams,
        now: u64,
    ) -> Result<NotificationId, NotifyError> {
        if params.summary.trim().is_empty() {
            tracing::warn!(app = %params.app_name, "Rejected notification without summary");
            return Err(NotifyError::InvalidRequest("summary is required".to_string()));
        }

        if let Some(id) = self.store.find_replacement(params.replace_key) {
            self.replace(id, params, now)?;
            return Ok(id);
        }

        if self.store.is_full() {
            tracing::warn!(
                app = %params.app_name,
                limit = self.store.capacity(),
                "Rejected notification: store is full"
            );
            return Err(NotifyError::CapacityReached {
                limit: self.store.capacity(),
            });
        }

        self.insert(params, now)
    }

    fn replace(
        &mut self,
        id: NotificationId,
        params: NotifyParams,
        now: u64,
    ) -> Result<(), NotifyError> {
        let (width, height) =
            self.sizing
                .compute_dimensions(&self.text, &params.summary, params.body.as_deref());

        let notification = self
            .store
            .get_mut(id)
            .ok_or(NotifyError::UnknownNotification(id))?;

        let resized = notification.dimensions() != (width, height);
        let surface_size = if resized && notification.configured {
            (width, height)
        } else {
            notification.surface_size
        };

        let incoming = Content {
            replace_key: params.replace_key,
            summary: params.summary,
            body: params.body,
            app_name: params.app_name,
            created_at: now,
            expire_after: params.expire_after,
            width,
            height,
            opacity: 1.0,
            surface_size,
        };
        let prior = incoming.swap_into(notification);

        // New frame goes out before anything else in the stack moves
        if let Err(e) = self.renderer.refresh(&mut self.platform, &self.text, notification) {
            prior.swap_into(notification);
            tracing::warn!(%id, error = %e, "Replace failed; previous content kept");
            return Err(e.into());
        }

        let index = notification.position_index;
        tracing::info!(%id, index, width, height, resized, "Replaced notification");

        if resized {
            self.restack_from(index);
        }
        Ok(())
    }

    fn insert(&mut self, params: NotifyParams, now: u64) -> Result<NotificationId, NotifyError> {
        let (width, height) =
            self.sizing
                .compute_dimensions(&self.text, &params.summary, params.body.as_deref());

        let surface = self
            .platform
            .create_overlay_surface(SURFACE_NAMESPACE)
            .map_err(|e| {
                tracing::warn!(app = %params.app_name, error = %e, "Surface creation failed");
                e
            })?;

        let id = self.allocate_id();
        let notification = Notification {
            id,
            replace_key: params.replace_key,
            summary: params.summary,
            body: params.body,
            app_name: params.app_name,
            created_at: now,
            expire_after: params.expire_after,
            width,
            height,
            position_index: self.store.len(),
            surface,
            configured: false,
            surface_size: (0, 0),
            opacity: 1.0,
            canvas: None,
            buffers_in_flight: Vec::new(),
        };

        let index = match self.store.insert(notification) {
            Ok(index) => index,
            Err(e) => {
                self.platform.destroy_surface(surface);
                return Err(e);
            }
        };

        let prior = self
            .placement
            .prior_height(self.store.iter().take(index).map(|n| n.height));
        let placement = self.placement.anchor_and_margins(index, width, height, prior);
        self.apply_placement(&placement);

        tracing::info!(%id, index, width, height, %surface, "Created notification");
        Ok(id)
    }

    fn allocate_id(&mut self) -> NotificationId {
        loop {
            let raw = self.next_id;
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if let Some(id) = NotificationId::new(raw) {
                if self.store.get(id).is_none() {
                    return id;
                }
            }
        }
    }

    /// Close a notification at a client's request
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::UnknownNotification`] if no live entry has `id`.
    pub fn close(&mut self, id: NotificationId) -> Result<(), NotifyError> {
        let index = self
            .store
            .position_of(id)
            .ok_or(NotifyError::UnknownNotification(id))?;
        self.remove_at(index, CloseReason::ClosedByCall);
        Ok(())
    }

    /// Remove the entry at `index`, release its surface and close the gap
    pub fn remove_at(&mut self, index: usize, reason: CloseReason) -> Option<Notification> {
        let mut notification = self.store.remove_at(index)?;
        self.release_resources(&mut notification);
        tracing::info!(id = %notification.id, index, %reason, "Removed notification");
        self.restack_from(index);
        Some(notification)
    }

    fn release(&mut self, mut notification: Notification, reason: CloseReason) {
        self.release_resources(&mut notification);
        tracing::debug!(id = %notification.id, %reason, "Released notification");
    }

    fn release_resources(&mut self, notification: &mut Notification) {
        self.platform.destroy_surface(notification.surface);
        for buffer in notification.buffers_in_flight.drain(..) {
            self.platform.destroy_buffer(buffer);
        }
        notification.canvas = None;
    }

    // =========================================================================
    // Placement
    // =========================================================================

    fn apply_placement(&mut self, placement: &Placement) {
        let Some(surface) = self
            .store
            .get_index(placement.position_index)
            .map(Notification::surface)
        else {
            return;
        };

        self.platform
            .set_size(surface, placement.width, placement.height);
        self.platform.set_anchor(surface, placement.anchor);
        self.platform.set_margins(surface, placement.margins);
        self.platform
            .set_exclusive_zone(surface, placement.exclusive_zone);
        self.platform.commit(surface);
    }

    /// Recompute and republish placement for every entry from `start` on
    fn restack_from(&mut self, start: usize) {
        let placements = self
            .placement
            .layout(self.store.iter().map(Notification::dimensions));

        for placement in placements.iter().skip(start) {
            self.apply_placement(placement);
        }

        if start < placements.len() {
            tracing::debug!(from = start, count = placements.len() - start, "Restacked");
        }
    }

    /// Placement currently published for each entry, in stacking order
    #[must_use]
    pub fn placements(&self) -> Vec<Placement> {
        self.placement
            .layout(self.store.iter().map(Notification::dimensions))
    }

    // =========================================================================
    // Platform Events
    // =========================================================================

    /// Drain and handle every pending platform event; returns how many ran
    pub fn dispatch_platform_events(&mut self) -> usize {
        let events = self.platform.poll_events();
        let count = events.len();
        for event in events {
            self.handle_platform_event(event);
        }
        count
    }

    /// Route one platform event to the notification it concerns
    pub fn handle_platform_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::Configure {
                surface,
                serial,
                width,
                height,
            } => {
                let Some(id) = self.store.find_by_surface(surface) else {
                    tracing::debug!(%surface, serial, "Configure for unknown surface");
                    return;
                };
                let Some(notification) = self.store.get_mut(id) else {
                    return;
                };
                if let Err(e) = self.renderer.on_configure(
                    &mut self.platform,
                    &self.text,
                    notification,
                    serial,
                    width,
                    height,
                ) {
                    tracing::warn!(%id, error = %e, "Paint after configure failed");
                }
            }
            PlatformEvent::Closed { surface } => {
                let index = self
                    .store
                    .find_by_surface(surface)
                    .and_then(|id| self.store.position_of(id));
                match index {
                    Some(index) => {
                        self.remove_at(index, CloseReason::Dismissed);
                    }
                    None => tracing::debug!(%surface, "Close for unknown surface"),
                }
            }
            PlatformEvent::BufferReleased { buffer } => {
                let Some(id) = self.store.find_by_buffer(buffer) else {
                    tracing::trace!(%buffer, "Release for buffer already destroyed");
                    return;
                };
                if let Some(notification) = self.store.get_mut(id) {
                    notification.buffers_in_flight.retain(|b| *b != buffer);
                }
                self.platform.destroy_buffer(buffer);
                tracing::trace!(%id, %buffer, "Buffer released");
            }
        }
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Remove every notification whose timeout has elapsed at `now`
    pub fn tick(&mut self, now: u64) -> Vec<NotificationId> {
        let scheduler = self.expiry;
        scheduler.tick(self, now)
    }
}

impl<P, T> ExpiryTarget for NotificationManager<P, T>
where
    P: OverlayPlatform,
    T: TextRasterizer,
{
    fn entry_count(&self) -> usize {
        self.store.len()
    }

    fn timing_at(&self, index: usize) -> Option<EntryTiming> {
        self.store.get_index(index).map(|n| EntryTiming {
            created_at: n.created_at,
            expire_after: n.expire_after,
            opacity: n.opacity,
        })
    }

    fn expire_at(&mut self, index: usize) -> Option<NotificationId> {
        self.remove_at(index, CloseReason::Expired).map(|n| n.id)
    }

    fn fade_at(&mut self, index: usize, opacity: f32) {
        let Some(id) = self.store.get_index(index).map(Notification::id) else {
            return;
        };
        let Some(notification) = self.store.get_mut(id) else {
            return;
        };

        notification.opacity = opacity;
        if let Err(e) = self.renderer.refresh(&mut self.platform, &self.text, notification) {
            tracing::debug!(%id, error = %e, "Fade repaint failed");
        }
    }
}

/// Fields a replacement overwrites
struct Content {
    replace_key: u32,
    summary: String,
    body: Option<String>,
    app_name: String,
    created_at: u64,
    expire_after: Option<u64>,
    width: u32,
    height: u32,
    opacity: f32,
    surface_size: (u32, u32),
}

impl Content {
    /// Install these fields into `n`, returning the ones they displaced
    fn swap_into(self, n: &mut Notification) -> Self {
        use std::mem::replace;

        Self {
            replace_key: replace(&mut n.replace_key, self.replace_key),
            summary: replace(&mut n.summary, self.summary),
            body: replace(&mut n.body, self.body),
            app_name: replace(&mut n.app_name, self.app_name),
            created_at: replace(&mut n.created_at, self.created_at),
            expire_after: replace(&mut n.expire_after, self.expire_after),
            width: replace(&mut n.width, self.width),
            height: replace(&mut n.height, self.height),
            opacity: replace(&mut n.opacity, self.opacity),
            surface_size: replace(&mut n.surface_size, self.surface_size),
        }
    }
}

impl<P, T> std::fmt::Debug for NotificationManager<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationManager")
            .field("live", &self.store.len())
            .field("capacity", &self.store.capacity())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}
