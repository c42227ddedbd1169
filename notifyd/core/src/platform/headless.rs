//! In-process compositor stand-in
//!
//! [`HeadlessPlatform`] behaves like a cooperative compositor without a
//! display: it answers commits with configure events, releases buffers when
//! they are replaced, and records every request so callers can inspect the
//! resulting screen state. Committed frames can optionally be written out
//! as PNG files.

use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tiny_skia::{IntSize, Pixmap};

use super::{BufferId, OverlayPlatform, PlatformEvent, SurfaceId};
use crate::error::PlatformError;
use crate::placement::{Anchor, Margins};

/// Recorded state of one overlay surface
#[derive(Clone, Debug)]
pub struct HeadlessSurface {
    namespace: String,
    requested_size: (u32, u32),
    configured_size: Option<(u32, u32)>,
    anchor: Anchor,
    margins: Margins,
    exclusive_zone: i32,
    last_serial: Option<u32>,
    acked_serial: Option<u32>,
    attached: Option<BufferId>,
    commits: u32,
}

impl HeadlessSurface {
    fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            requested_size: (0, 0),
            configured_size: None,
            anchor: Anchor::empty(),
            margins: Margins::default(),
            exclusive_zone: 0,
            last_serial: None,
            acked_serial: None,
            attached: None,
            commits: 0,
        }
    }

    /// Namespace passed at creation
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Last size requested with `set_size`
    #[must_use]
    pub fn requested_size(&self) -> (u32, u32) {
        self.requested_size
    }

    /// Current anchor
    #[must_use]
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Current margins
    #[must_use]
    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// Current exclusive zone
    #[must_use]
    pub fn exclusive_zone(&self) -> i32 {
        self.exclusive_zone
    }

    /// Whether the most recent configure was acknowledged
    #[must_use]
    pub fn is_acked(&self) -> bool {
        self.last_serial.is_some() && self.last_serial == self.acked_serial
    }

    /// Buffer currently attached
    #[must_use]
    pub fn attached_buffer(&self) -> Option<BufferId> {
        self.attached
    }

    /// Number of commits received
    #[must_use]
    pub fn commits(&self) -> u32 {
        self.commits
    }
}

/// Recorded state of one buffer
#[derive(Clone, Debug)]
pub struct HeadlessBuffer {
    width: u32,
    height: u32,
    stride: u32,
    pixels: Vec<u8>,
}

impl HeadlessBuffer {
    /// Buffer dimensions
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes per row
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// ARGB8888 pixel data as copied from the shared-memory region
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at `(x, y)` as little-endian `[b, g, r, a]`
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y * self.stride + x * 4) as usize;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Display-less overlay platform
#[derive(Debug, Default)]
pub struct HeadlessPlatform {
    surfaces: BTreeMap<SurfaceId, HeadlessSurface>,
    buffers: BTreeMap<BufferId, HeadlessBuffer>,
    events: VecDeque<PlatformEvent>,
    next_surface: u32,
    next_buffer: u32,
    next_serial: u32,
    fail_allocations: bool,
    frame_dir: Option<PathBuf>,
    frames_written: u64,
}

impl HeadlessPlatform {
    /// Create a platform that keeps frames in memory only
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect, optionally writing every committed frame into `frame_dir`
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::MissingCapability`] if the frame directory
    /// cannot be created.
    pub fn connect(frame_dir: Option<PathBuf>) -> Result<Self, PlatformError> {
        if let Some(ref dir) = frame_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                tracing::error!(dir = %dir.display(), error = %e, "Cannot create frame directory");
                PlatformError::MissingCapability("writable frame directory")
            })?;
            tracing::info!(dir = %dir.display(), "Writing committed frames as PNG");
        }

        Ok(Self {
            frame_dir,
            ..Self::default()
        })
    }

    /// Make every surface and buffer allocation fail until reset
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Close a surface from the compositor side
    pub fn close(&mut self, surface: SurfaceId) {
        if self.surfaces.contains_key(&surface) {
            self.events.push_back(PlatformEvent::Closed { surface });
        }
    }

    /// Inspect a live surface
    #[must_use]
    pub fn surface(&self, surface: SurfaceId) -> Option<&HeadlessSurface> {
        self.surfaces.get(&surface)
    }

    /// Number of live surfaces
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Inspect a live buffer
    #[must_use]
    pub fn buffer(&self, buffer: BufferId) -> Option<&HeadlessBuffer> {
        self.buffers.get(&buffer)
    }

    /// Number of buffers not yet destroyed
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Events queued but not yet polled
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Number of PNG frames written so far
    #[must_use]
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Emit a configure if the requested size differs from the configured one
    fn configure_if_needed(&mut self, surface: SurfaceId) {
        let Some(state) = self.surfaces.get_mut(&surface) else {
            return;
        };
        if state.configured_size == Some(state.requested_size) {
            return;
        }

        self.next_serial = self.next_serial.wrapping_add(1);
        let serial = self.next_serial;
        let (width, height) = state.requested_size;
        state.configured_size = Some(state.requested_size);
        state.last_serial = Some(serial);

        self.events.push_back(PlatformEvent::Configure {
            surface,
            serial,
            width,
            height,
        });
    }

    fn write_frame(&mut self, dir: &Path, surface: SurfaceId, buffer: BufferId) {
        let Some(buf) = self.buffers.get(&buffer) else {
            return;
        };

        let Some(size) = IntSize::from_wh(buf.width, buf.height) else {
            return;
        };

        // ARGB8888 little-endian is BGRA in memory; tiny-skia wants RGBA
        let mut rgba = Vec::with_capacity((buf.width * buf.height * 4) as usize);
        for row in 0..buf.height {
            let start = (row * buf.stride) as usize;
            let end = start + (buf.width * 4) as usize;
            let Some(line) = buf.pixels.get(start..end) else {
                return;
            };
            for px in line.chunks_exact(4) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }

        let Some(pixmap) = Pixmap::from_vec(rgba, size) else {
            return;
        };

        let path = dir.join(format!(
            "frame-{:06}-s{}-b{}.png",
            self.frames_written, surface.0, buffer.0
        ));
        match pixmap.save_png(&path) {
            Ok(()) => {
                self.frames_written += 1;
                tracing::trace!(path = %path.display(), "Wrote frame");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write frame");
            }
        }
    }
}

impl OverlayPlatform for HeadlessPlatform {
    fn create_overlay_surface(&mut self, namespace: &str) -> Result<SurfaceId, PlatformError> {
        if self.fail_allocations {
            return Err(PlatformError::SurfaceCreation(
                "allocation failure injected".to_string(),
            ));
        }

        self.next_surface += 1;
        let id = SurfaceId(self.next_surface);
        self.surfaces.insert(id, HeadlessSurface::new(namespace));
        Ok(id)
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        if let Some(state) = self.surfaces.remove(&surface) {
            if let Some(buffer) = state.attached {
                self.events.push_back(PlatformEvent::BufferReleased { buffer });
            }
        }
        self.events.retain(|event| match event {
            PlatformEvent::Configure { surface: s, .. } | PlatformEvent::Closed { surface: s } => {
                *s != surface
            }
            PlatformEvent::BufferReleased { .. } => true,
        });
    }

    fn set_size(&mut self, surface: SurfaceId, width: u32, height: u32) {
        if let Some(state) = self.surfaces.get_mut(&surface) {
            state.requested_size = (width, height);
        }
    }

    fn set_anchor(&mut self, surface: SurfaceId, anchor: Anchor) {
        if let Some(state) = self.surfaces.get_mut(&surface) {
            state.anchor = anchor;
        }
    }

    fn set_margins(&mut self, surface: SurfaceId, margins: Margins) {
        if let Some(state) = self.surfaces.get_mut(&surface) {
            state.margins = margins;
        }
    }

    fn set_exclusive_zone(&mut self, surface: SurfaceId, zone: i32) {
        if let Some(state) = self.surfaces.get_mut(&surface) {
            state.exclusive_zone = zone;
        }
    }

    fn ack_configure(&mut self, surface: SurfaceId, serial: u32) {
        if let Some(state) = self.surfaces.get_mut(&surface) {
            state.acked_serial = Some(serial);
        }
    }

    fn create_buffer(
        &mut self,
        region: &File,
        width: u32,
        height: u32,
        stride: u32,
    ) -> Result<BufferId, PlatformError> {
        if self.fail_allocations {
            return Err(PlatformError::BufferCreation(
                "allocation failure injected".to_string(),
            ));
        }

        let mut pixels = Vec::with_capacity((stride * height) as usize);
        let mut reader = region;
        reader
            .seek(SeekFrom::Start(0))
            .and_then(|_| reader.read_to_end(&mut pixels))
            .map_err(|e| PlatformError::BufferCreation(e.to_string()))?;

        if pixels.len() < (stride * height) as usize {
            return Err(PlatformError::BufferCreation(format!(
                "region holds {} bytes, {}x{} at stride {} needs {}",
                pixels.len(),
                width,
                height,
                stride,
                stride * height
            )));
        }

        self.next_buffer += 1;
        let id = BufferId(self.next_buffer);
        self.buffers.insert(
            id,
            HeadlessBuffer {
                width,
                height,
                stride,
                pixels,
            },
        );
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn attach_and_commit(&mut self, surface: SurfaceId, buffer: BufferId, _width: u32, _height: u32) {
        let Some(state) = self.surfaces.get_mut(&surface) else {
            return;
        };

        if !state.is_acked() {
            tracing::warn!(%surface, %buffer, "Buffer attached before configure was acknowledged");
        }

        let previous = state.attached.replace(buffer);
        state.commits += 1;
        if let Some(old) = previous.filter(|old| *old != buffer) {
            self.events.push_back(PlatformEvent::BufferReleased { buffer: old });
        }

        if let Some(dir) = self.frame_dir.clone() {
            self.write_frame(&dir, surface, buffer);
        }

        self.configure_if_needed(surface);
    }

    fn commit(&mut self, surface: SurfaceId) {
        if let Some(state) = self.surfaces.get_mut(&surface) {
            state.commits += 1;
        }
        self.configure_if_needed(surface);
    }

    fn poll_events(&mut self) -> Vec<PlatformEvent> {
        self.events.drain(..).collect()
    }
}
