//! Text Capability
//!
//! Measurement and rasterization of word-wrapped text. [`MonospaceText`]
//! lays text out on a fixed character grid derived from the font descriptor,
//! so measurement needs no font files and is fully deterministic; painting
//! renders the same wrapped lines through resvg.

use std::fmt;
use std::str::FromStr;

use quick_xml::escape::escape;
use resvg::usvg;
use serde::{Deserialize, Serialize};
use tiny_skia::{Pixmap, Transform};
use unicode_width::UnicodeWidthStr;

use crate::config::Rgb;
use crate::error::RenderError;
use crate::sizing::{TextExtent, TextMeasure};

/// Point size used when a descriptor names only a family
const DEFAULT_POINTS: f32 = 10.0;

/// A font family plus point size, written like `"monospace 10"`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FontDescriptor {
    /// Font family name
    pub family: String,
    /// Size in points
    pub points: f32,
}

impl FontDescriptor {
    /// Size in pixels at 96 DPI
    #[must_use]
    pub fn pixel_size(&self) -> f32 {
        self.points * 96.0 / 72.0
    }
}

impl Default for FontDescriptor {
    fn default() -> Self {
        Self {
            family: "monospace".to_string(),
            points: DEFAULT_POINTS,
        }
    }
}

impl FromStr for FontDescriptor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty font descriptor".to_string());
        }

        let (family, points) = match s.rsplit_once(' ') {
            Some((family, size)) => match size.parse::<f32>() {
                Ok(points) => (family.trim(), points),
                Err(_) => (s, DEFAULT_POINTS),
            },
            None => match s.parse::<f32>() {
                Ok(_) => return Err(format!("font descriptor {s:?} has no family")),
                Err(_) => (s, DEFAULT_POINTS),
            },
        };

        if !(points.is_finite() && points > 0.0) {
            return Err(format!("font size in {s:?} must be positive"));
        }

        Ok(Self {
            family: family.to_string(),
            points,
        })
    }
}

impl TryFrom<String> for FontDescriptor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FontDescriptor> for String {
    fn from(font: FontDescriptor) -> Self {
        font.to_string()
    }
}

impl fmt::Display for FontDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family, self.points)
    }
}

/// Text rasterization capability
///
/// Painting must lay text out exactly as [`TextMeasure::measure`] does, so a
/// notification sized from measurement always fits what is painted.
pub trait TextRasterizer: TextMeasure {
    /// Paint `text` wrapped at `wrap_width`, top-left corner at `(x, y)`
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Text`] if the text cannot be laid out.
    fn paint(
        &self,
        canvas: &mut Pixmap,
        text: &str,
        x: f32,
        y: f32,
        wrap_width: u32,
        color: Rgb,
    ) -> Result<(), RenderError>;
}

/// Fixed character-cell metrics
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellMetrics {
    /// Horizontal advance of one column, in pixels
    pub advance: u32,
    /// Height of one line, in pixels
    pub line_height: u32,
    /// Font size in pixels
    pub font_px: f32,
}

impl CellMetrics {
    /// Derive cell metrics from a font descriptor
    #[must_use]
    pub fn for_font(font: &FontDescriptor) -> Self {
        let px = font.pixel_size();
        Self {
            advance: ((px * 0.6).round() as u32).max(1),
            line_height: ((px * 1.25).ceil() as u32).max(1),
            font_px: px,
        }
    }
}

/// Grid-metric text layout painted through resvg
pub struct MonospaceText {
    font: FontDescriptor,
    metrics: CellMetrics,
    options: usvg::Options<'static>,
}

impl MonospaceText {
    /// Create a rasterizer backed by the system font database
    #[must_use]
    pub fn new(font: FontDescriptor) -> Self {
        let mut text = Self::without_system_fonts(font);
        text.options.fontdb_mut().load_system_fonts();
        tracing::debug!(
            faces = text.options.fontdb.len(),
            family = %text.font.family,
            "Loaded system fonts"
        );
        text
    }

    /// Create a rasterizer with an empty font database
    ///
    /// Layout and measurement are unchanged; no glyphs are drawn.
    #[must_use]
    pub fn without_system_fonts(font: FontDescriptor) -> Self {
        let metrics = CellMetrics::for_font(&font);
        Self {
            font,
            metrics,
            options: usvg::Options::default(),
        }
    }

    /// Cell metrics in use
    #[must_use]
    pub fn metrics(&self) -> CellMetrics {
        self.metrics
    }

    /// Font in use
    #[must_use]
    pub fn font(&self) -> &FontDescriptor {
        &self.font
    }

    /// Word-wrap `text` to the number of columns that fit in `wrap_width`
    fn wrap(&self, text: &str, wrap_width: u32) -> Vec<String> {
        let columns = (wrap_width / self.metrics.advance).max(1) as usize;

        text.lines()
            .flat_map(|line| {
                if line.is_empty() {
                    vec![String::new()]
                } else {
                    textwrap::wrap(line, columns)
                        .into_iter()
                        .map(|cow| cow.into_owned())
                        .collect()
                }
            })
            .collect()
    }

    fn svg_document(&self, lines: &[String], canvas: &Pixmap, x: f32, y: f32, color: Rgb) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = canvas.width(),
            h = canvas.height(),
        );
        svg.push_str(&format!(
            r#"<text font-family="{family}" font-size="{size}" fill="{color}" xml:space="preserve">"#,
            family = escape(self.font.family.as_str()),
            size = self.metrics.font_px,
        ));

        for (i, line) in lines.iter().enumerate() {
            let baseline = y + (i as u32 * self.metrics.line_height) as f32 + self.metrics.font_px;
            svg.push_str(&format!(
                r#"<tspan x="{x}" y="{baseline}">{}</tspan>"#,
                escape(line.as_str())
            ));
        }

        svg.push_str("</text></svg>");
        svg
    }
}

impl fmt::Debug for MonospaceText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonospaceText")
            .field("font", &self.font)
            .field("metrics", &self.metrics)
            .field("font_faces", &self.options.fontdb.len())
            .finish()
    }
}

impl TextMeasure for MonospaceText {
    fn measure(&self, text: &str, wrap_width: u32) -> TextExtent {
        let lines = self.wrap(text, wrap_width);
        let widest = lines.iter().map(|l| l.width()).max().unwrap_or(0);

        TextExtent {
            width: widest as u32 * self.metrics.advance,
            height: lines.len() as u32 * self.metrics.line_height,
        }
    }
}

impl TextRasterizer for MonospaceText {
    fn paint(
        &self,
        canvas: &mut Pixmap,
        text: &str,
        x: f32,
        y: f32,
        wrap_width: u32,
        color: Rgb,
    ) -> Result<(), RenderError> {
        let lines = self.wrap(text, wrap_width);
        if lines.is_empty() {
            return Ok(());
        }

        let svg = self.svg_document(&lines, canvas, x, y, color);
        let tree = usvg::Tree::from_str(&svg, &self.options)
            .map_err(|e| RenderError::Text(e.to_string()))?;

        resvg::render(&tree, Transform::identity(), &mut canvas.as_mut());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text() -> MonospaceText {
        MonospaceText::without_system_fonts(FontDescriptor::default())
    }

    #[test]
    fn test_parse_font_descriptor() {
        let font: FontDescriptor = "Liberation Mono 12".parse().unwrap();
        assert_eq!(font.family, "Liberation Mono");
        assert!((font.points - 12.0).abs() < f32::EPSILON);

        let family_only: FontDescriptor = "Sans".parse().unwrap();
        assert_eq!(family_only.family, "Sans");
        assert!((family_only.points - DEFAULT_POINTS).abs() < f32::EPSILON);
    }

    #[test]
    fn test_reject_bad_font_descriptors() {
        assert!("".parse::<FontDescriptor>().is_err());
        assert!("12".parse::<FontDescriptor>().is_err());
        assert!("mono -3".parse::<FontDescriptor>().is_err());
    }

    #[test]
    fn test_metrics_for_ten_points() {
        let m = CellMetrics::for_font(&FontDescriptor::default());
        // 10pt = 13.33px
        assert_eq!(m.advance, 8);
        assert_eq!(m.line_height, 17);
    }

    #[test]
    fn test_measure_empty_text_is_zero() {
        assert_eq!(text().measure("", 270), TextExtent::default());
    }

    #[test]
    fn test_measure_wraps_long_lines() {
        let t = text();
        // 270 / 8 = 33 columns
        let extent = t.measure(&"word ".repeat(20), 270);
        assert!(extent.width <= 270);
        assert_eq!(extent.height % t.metrics().line_height, 0);
        assert!(extent.height >= 3 * t.metrics().line_height);
    }

    #[test]
    fn test_measure_counts_explicit_newlines() {
        let t = text();
        let extent = t.measure("one\n\nthree", 270);
        assert_eq!(extent.height, 3 * t.metrics().line_height);
        assert_eq!(extent.width, 5 * t.metrics().advance);
    }

    #[test]
    fn test_measure_uses_display_width() {
        let t = text();
        // Each CJK character occupies two columns
        let extent = t.measure("漢字", 270);
        assert_eq!(extent.width, 4 * t.metrics().advance);
    }

    #[test]
    fn test_paint_without_fonts_succeeds() {
        let t = text();
        let mut canvas = Pixmap::new(100, 40).unwrap();
        t.paint(&mut canvas, "a < b & c", 5.0, 5.0, 90, Rgb::new(0xbb, 0xbb, 0xbb))
            .unwrap();
    }

    #[test]
    fn test_svg_escapes_markup() {
        let t = text();
        let canvas = Pixmap::new(10, 10).unwrap();
        let svg = t.svg_document(&["<b>".to_string()], &canvas, 0.0, 0.0, Rgb::new(0, 0, 0));
        assert!(svg.contains("&lt;b&gt;"));
        assert!(!svg.contains("<b>"));
    }
}
