//! Sizing Engine
//!
//! Derives a notification's pixel dimensions from its text. The result depends
//! only on the summary, the body and fixed configuration, so recomputing for
//! the same text always yields the same size.

use crate::config::{AppearanceConfig, LayoutConfig};

/// Pixel extent of a block of laid-out text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextExtent {
    /// Width of the widest line
    pub width: u32,
    /// Total height of all lines
    pub height: u32,
}

/// Text measurement capability
///
/// Implementations word-wrap `text` at `wrap_width` pixels and report the
/// resulting extent. Must be deterministic.
pub trait TextMeasure {
    /// Measure `text` wrapped at `wrap_width` pixels
    fn measure(&self, text: &str, wrap_width: u32) -> TextExtent;
}

/// Raw measurements for a summary/body pair
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Measurement {
    /// Width of the widest line across summary and body
    pub text_width: u32,
    /// Height of the wrapped summary
    pub summary_height: u32,
    /// Height of the wrapped body (0 when there is no body)
    pub body_height: u32,
}

/// Pure mapping from text content to notification dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizingEngine {
    padding: u32,
    wrap_width: u32,
    min_width: u32,
    max_width: u32,
    min_height: u32,
}

impl SizingEngine {
    /// Build the engine from appearance and layout configuration
    #[must_use]
    pub fn new(appearance: &AppearanceConfig, layout: &LayoutConfig) -> Self {
        let padding = appearance.padding;
        Self {
            padding,
            wrap_width: layout
                .default_width
                .saturating_sub(padding.saturating_mul(2))
                .max(1),
            min_width: layout.min_width,
            max_width: layout.max_width.max(layout.min_width),
            min_height: layout.min_height,
        }
    }

    /// Width at which summary and body are wrapped
    #[must_use]
    pub fn wrap_width(&self) -> u32 {
        self.wrap_width
    }

    /// Padding between the border and the text
    #[must_use]
    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Measure summary and optional body at the configured wrap width
    pub fn measure<M>(&self, measurer: &M, summary: &str, body: Option<&str>) -> Measurement
    where
        M: TextMeasure + ?Sized,
    {
        let summary_extent = measurer.measure(summary, self.wrap_width);
        let body_extent = body
            .map(|b| measurer.measure(b, self.wrap_width))
            .unwrap_or_default();

        Measurement {
            text_width: summary_extent.width.max(body_extent.width),
            summary_height: summary_extent.height,
            body_height: body_extent.height,
        }
    }

    /// Compute `(width, height)` for a notification
    ///
    /// - `height = max(min_height, summary + [body + padding] + 2*padding)`
    /// - `width = clamp(text_width + 2*padding, min_width, max_width)`
    pub fn compute_dimensions<M>(&self, measurer: &M, summary: &str, body: Option<&str>) -> (u32, u32)
    where
        M: TextMeasure + ?Sized,
    {
        let m = self.measure(measurer, summary, body);

        let both_sides = self.padding.saturating_mul(2);
        let content_height = match body {
            Some(_) => m
                .summary_height
                .saturating_add(m.body_height)
                .saturating_add(self.padding),
            None => m.summary_height,
        };
        let height = content_height.saturating_add(both_sides).max(self.min_height);

        let width = m
            .text_width
            .saturating_add(both_sides)
            .max(self.min_width)
            .clamp(self.min_width, self.max_width);

        (width, height)
    }
}
