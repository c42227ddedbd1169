//! Shared-memory pixel regions.
//!
//! A region is an anonymous file holding one frame in ARGB8888 (little
//! endian, so `B G R A` in memory) with a stride of `width * 4`.

use std::fs::File;
use std::io::{self, Write};

use tiny_skia::Pixmap;

/// Bytes per ARGB8888 pixel
pub const BYTES_PER_PIXEL: u32 = 4;

/// An anonymous file filled with one frame
#[derive(Debug)]
pub struct ShmRegion {
    file: File,
    width: u32,
    height: u32,
}

impl ShmRegion {
    /// Create a region and copy `pixmap` into it, scaled by `opacity`
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the anonymous file cannot be created, sized
    /// or written.
    pub fn from_pixmap(pixmap: &Pixmap, opacity: f32) -> io::Result<Self> {
        let bytes = to_argb8888(pixmap, opacity);

        let mut file = tempfile::tempfile()?;
        file.set_len(bytes.len() as u64)?;
        file.write_all(&bytes)?;
        file.flush()?;

        Ok(Self {
            file,
            width: pixmap.width(),
            height: pixmap.height(),
        })
    }

    /// The backing file
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Frame width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.width * BYTES_PER_PIXEL
    }

    /// Total size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        (self.stride() * self.height) as usize
    }

    /// Whether the region holds no pixels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Convert premultiplied RGBA to premultiplied ARGB8888 bytes
///
/// `opacity` scales every channel, which keeps the result premultiplied.
#[must_use]
pub fn to_argb8888(pixmap: &Pixmap, opacity: f32) -> Vec<u8> {
    let opacity = opacity.clamp(0.0, 1.0);
    let scale = |c: u8| -> u8 {
        if opacity >= 1.0 {
            c
        } else {
            (f32::from(c) * opacity).round() as u8
        }
    };

    let mut out = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.data().chunks_exact(4) {
        let (r, g, b, a) = (px[0], px[1], px[2], px[3]);
        out.extend_from_slice(&[scale(b), scale(g), scale(r), scale(a)]);
    }
    out
}
