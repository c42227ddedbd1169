//! Renderer
//!
//! Paints a notification into its own pixel buffer and publishes that buffer
//! to the notification's surface.
//!
//! # Frame Layout
//!
//! ```text
//!   ┌───────────────────────────────┐ ◀── border (stroked inset)
//!   │ padding                       │
//!   │   Summary, wrapped            │
//!   │   padding / 2                 │
//!   │   Body, wrapped               │
//!   │                       padding │
//!   └───────────────────────────────┘
//! ```
//!
//! # Buffer Lifetime
//!
//! `publish` copies the frame into a fresh shared-memory region, wraps it as
//! a platform buffer, attaches and commits. The region is dropped when
//! `publish` returns; the buffer id stays in the notification's in-flight
//! list until the platform reports it released (or the surface goes away),
//! and only then is the buffer destroyed.

pub mod shm;
pub mod text;

use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::config::AppearanceConfig;
use crate::error::RenderError;
use crate::notification::Notification;
use crate::platform::{BufferId, OverlayPlatform};
use crate::sizing::SizingEngine;

pub use shm::ShmRegion;
pub use text::{FontDescriptor, MonospaceText, TextRasterizer};

/// Paints and publishes notification frames
#[derive(Clone, Debug)]
pub struct Renderer {
    appearance: AppearanceConfig,
    wrap_width: u32,
}

impl Renderer {
    /// Create a renderer wrapping text at the sizing engine's width
    #[must_use]
    pub fn new(appearance: &AppearanceConfig, sizing: &SizingEngine) -> Self {
        Self {
            appearance: appearance.clone(),
            wrap_width: sizing.wrap_width(),
        }
    }

    /// Paint background, border, summary and body at the notification's paint size
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PixmapAllocation`] for a zero-sized or
    /// oversized frame, or [`RenderError::Text`] if text layout fails.
    pub fn paint<T>(&self, text: &T, notification: &mut Notification) -> Result<(), RenderError>
    where
        T: TextRasterizer + ?Sized,
    {
        let (width, height) = notification.paint_size();

        let mut canvas = match notification.canvas.take() {
            Some(canvas) if canvas.width() == width && canvas.height() == height => canvas,
            _ => Pixmap::new(width, height)
                .ok_or(RenderError::PixmapAllocation { width, height })?,
        };

        let a = &self.appearance;
        canvas.fill(Color::TRANSPARENT);
        canvas.fill(a.background.with_alpha(a.background_alpha));
        self.stroke_border(&mut canvas);

        let padding = a.padding as f32;
        text.paint(
            &mut canvas,
            &notification.summary,
            padding,
            padding,
            self.wrap_width,
            a.foreground,
        )?;

        if let Some(ref body) = notification.body {
            let summary_height = text.measure(&notification.summary, self.wrap_width).height;
            let body_y = padding + summary_height as f32 + padding / 2.0;
            text.paint(&mut canvas, body, padding, body_y, self.wrap_width, a.foreground)?;
        }

        notification.canvas = Some(canvas);
        Ok(())
    }

    fn stroke_border(&self, canvas: &mut Pixmap) {
        let border_width = self.appearance.border_width as f32;
        if border_width <= 0.0 {
            return;
        }

        let inset = border_width / 2.0;
        let Some(rect) = Rect::from_xywh(
            inset,
            inset,
            canvas.width() as f32 - border_width,
            canvas.height() as f32 - border_width,
        ) else {
            return;
        };

        let path = PathBuilder::from_rect(rect);
        let mut paint = Paint::default();
        paint.set_color(self.appearance.border.with_alpha(1.0));
        paint.anti_alias = false;

        let stroke = Stroke {
            width: border_width,
            ..Stroke::default()
        };
        canvas.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Hand the painted frame to the platform and commit it
    ///
    /// # Errors
    ///
    /// Fails if nothing has been painted yet, the shared-memory region cannot
    /// be created, or the platform refuses the buffer. The notification keeps
    /// whatever was published before.
    pub fn publish<P>(
        &self,
        platform: &mut P,
        notification: &mut Notification,
    ) -> Result<BufferId, RenderError>
    where
        P: OverlayPlatform + ?Sized,
    {
        let canvas = notification
            .canvas
            .as_ref()
            .ok_or_else(|| RenderError::Text("publish before paint".to_string()))?;

        let region = ShmRegion::from_pixmap(canvas, notification.opacity)?;
        let buffer = platform.create_buffer(
            region.file(),
            region.width(),
            region.height(),
            region.stride(),
        )?;

        platform.attach_and_commit(notification.surface, buffer, region.width(), region.height());
        notification.buffers_in_flight.push(buffer);

        tracing::debug!(
            id = %notification.id,
            %buffer,
            bytes = region.len(),
            in_flight = notification.buffers_in_flight.len(),
            "Published frame"
        );
        Ok(buffer)
    }

    /// Handle a size acknowledgment from the platform
    ///
    /// The first one marks the notification configured; every one paints and
    /// publishes at the negotiated size (zero axes fall back to the computed
    /// size). The position in the stack is never touched.
    ///
    /// # Errors
    ///
    /// Propagates paint or publish failures; the configure is acknowledged
    /// regardless.
    pub fn on_configure<P, T>(
        &self,
        platform: &mut P,
        text: &T,
        notification: &mut Notification,
        serial: u32,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError>
    where
        P: OverlayPlatform + ?Sized,
        T: TextRasterizer + ?Sized,
    {
        platform.ack_configure(notification.surface, serial);

        let first = !notification.configured;
        notification.configured = true;
        notification.surface_size = (width, height);

        tracing::debug!(
            id = %notification.id,
            serial,
            width,
            height,
            first,
            "Surface configured"
        );

        self.paint(text, notification)?;
        self.publish(platform, notification)?;
        Ok(())
    }

    /// Repaint and publish a configured notification
    ///
    /// Unconfigured notifications are skipped; their first configure paints.
    ///
    /// # Errors
    ///
    /// Propagates paint or publish failures.
    pub fn refresh<P, T>(
        &self,
        platform: &mut P,
        text: &T,
        notification: &mut Notification,
    ) -> Result<(), RenderError>
    where
        P: OverlayPlatform + ?Sized,
        T: TextRasterizer + ?Sized,
    {
        if !notification.configured {
            return Ok(());
        }
        self.paint(text, notification)?;
        self.publish(platform, notification)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::notification::NotificationId;
    use crate::platform::{HeadlessPlatform, PlatformEvent};

    fn renderer() -> Renderer {
        let appearance = AppearanceConfig::default();
        let sizing = SizingEngine::new(&appearance, &LayoutConfig::default());
        Renderer::new(&appearance, &sizing)
    }

    fn text() -> MonospaceText {
        MonospaceText::without_system_fonts(FontDescriptor::default())
    }

    fn notification(platform: &mut HeadlessPlatform) -> Notification {
        let surface = platform.create_overlay_surface("notifyd").unwrap();
        Notification {
            id: NotificationId::new(1).unwrap(),
            replace_key: 0,
            summary: "Build".to_string(),
            body: Some("Finished".to_string()),
            app_name: "ci".to_string(),
            created_at: 0,
            expire_after: None,
            width: 300,
            height: 80,
            position_index: 0,
            surface,
            configured: false,
            surface_size: (0, 0),
            opacity: 1.0,
            canvas: None,
            buffers_in_flight: Vec::new(),
        }
    }

    #[test]
    fn test_paint_fills_background_and_border() {
        let mut platform = HeadlessPlatform::new();
        let mut n = notification(&mut platform);
        renderer().paint(&text(), &mut n).unwrap();

        let canvas = n.canvas.as_ref().unwrap();
        assert_eq!((canvas.width(), canvas.height()), (300, 80));

        // Border pixel is opaque #005577
        let edge = canvas.pixel(0, 40).unwrap().demultiply();
        assert_eq!((edge.red(), edge.green(), edge.blue(), edge.alpha()), (0, 0x55, 0x77, 255));

        // Interior is the translucent background
        let inner = canvas.pixel(150, 5).unwrap();
        assert!((229..=230).contains(&inner.alpha()));
    }

    #[test]
    fn test_paint_uses_negotiated_size() {
        let mut platform = HeadlessPlatform::new();
        let mut n = notification(&mut platform);
        n.surface_size = (320, 0);
        renderer().paint(&text(), &mut n).unwrap();

        let canvas = n.canvas.as_ref().unwrap();
        assert_eq!((canvas.width(), canvas.height()), (320, 80));
    }

    #[test]
    fn test_publish_before_paint_fails() {
        let mut platform = HeadlessPlatform::new();
        let mut n = notification(&mut platform);
        assert!(renderer().publish(&mut platform, &mut n).is_err());
        assert!(n.buffers_in_flight.is_empty());
    }

    #[test]
    fn test_first_configure_paints_and_publishes() {
        let mut platform = HeadlessPlatform::new();
        let mut n = notification(&mut platform);
        let r = renderer();

        r.on_configure(&mut platform, &text(), &mut n, 7, 0, 0).unwrap();

        assert!(n.is_configured());
        assert_eq!(n.buffers_in_flight.len(), 1);
        let surface = platform.surface(n.surface).unwrap();
        assert!(surface.attached_buffer().is_some());
        let buffer = platform.buffer(n.buffers_in_flight[0]).unwrap();
        assert_eq!(buffer.size(), (300, 80));
        assert_eq!(buffer.stride(), 1200);
    }

    #[test]
    fn test_publish_failure_leaves_previous_frame() {
        let mut platform = HeadlessPlatform::new();
        let mut n = notification(&mut platform);
        let r = renderer();
        r.on_configure(&mut platform, &text(), &mut n, 1, 0, 0).unwrap();
        let before = n.buffers_in_flight.clone();

        platform.set_fail_allocations(true);
        assert!(r.refresh(&mut platform, &text(), &mut n).is_err());
        assert_eq!(n.buffers_in_flight, before);
    }

    #[test]
    fn test_second_publish_releases_first_buffer() {
        let mut platform = HeadlessPlatform::new();
        let mut n = notification(&mut platform);
        let r = renderer();
        r.on_configure(&mut platform, &text(), &mut n, 1, 0, 0).unwrap();
        let first = n.buffers_in_flight[0];
        platform.poll_events();

        r.refresh(&mut platform, &text(), &mut n).unwrap();
        let events = platform.poll_events();
        assert!(events.contains(&PlatformEvent::BufferReleased { buffer: first }));
    }
}
