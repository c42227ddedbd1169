//! Placement Engine
//!
//! Maps a notification's rank in the stack to the screen edges its surface is
//! pinned to and the margins that keep it clear of the notifications stacked
//! closer to that edge.
//!
//! # Stacking
//!
//! ```text
//!   edge = top, alignment = right
//!
//!   ┌──────────────────────────── screen ─┐
//!   │                    spacing          │
//!   │                  ┌──────────┐       │
//!   │                  │ index 0  │ h0    │
//!   │                  └──────────┘       │
//!   │                    spacing          │
//!   │                  ┌──────────┐       │
//!   │                  │ index 1  │ h1    │
//!   │                  └──────────┘       │
//! ```
//!
//! The margin on the anchored edge of entry `i` is
//! `spacing + Σ_{j<i} (h_j + spacing)`, using each entry's own height.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;

/// Exclusive zone value that reserves no space and keeps the surface above content
pub const NON_EXCLUSIVE_ZONE: i32 = -1;

bitflags! {
    /// Screen edges a surface is pinned to
    ///
    /// Bit values match the layer-shell anchor enum.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Anchor: u32 {
        /// Top edge
        const TOP = 1;
        /// Bottom edge
        const BOTTOM = 2;
        /// Left edge
        const LEFT = 4;
        /// Right edge
        const RIGHT = 8;
    }
}

/// Vertical screen edge notifications stack away from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// Stack downward from the top of the screen
    #[default]
    Top,
    /// Stack upward from the bottom of the screen
    Bottom,
}

impl FromStr for Edge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" | "0" => Ok(Self::Top),
            "bottom" | "1" => Ok(Self::Bottom),
            other => Err(format!("unknown edge {other:?} (expected top or bottom)")),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}

/// Horizontal placement of the stack
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Pinned to the left edge
    Left,
    /// Pinned to both edges; the compositor centers the surface
    Center,
    /// Pinned to the right edge
    #[default]
    Right,
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" | "0" => Ok(Self::Left),
            "center" | "centre" | "1" => Ok(Self::Center),
            "right" | "2" => Ok(Self::Right),
            other => Err(format!(
                "unknown alignment {other:?} (expected left, center or right)"
            )),
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Center => write!(f, "center"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Offsets from the anchored screen edges, in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Margins {
    /// Offset from the top edge
    pub top: i32,
    /// Offset from the right edge
    pub right: i32,
    /// Offset from the bottom edge
    pub bottom: i32,
    /// Offset from the left edge
    pub left: i32,
}

/// Everything the platform needs to position one surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Rank in the stack this placement was computed for
    pub position_index: usize,
    /// Requested surface width
    pub width: u32,
    /// Requested surface height
    pub height: u32,
    /// Edges the surface is pinned to
    pub anchor: Anchor,
    /// Margins from those edges
    pub margins: Margins,
    /// Always [`NON_EXCLUSIVE_ZONE`]
    pub exclusive_zone: i32,
}

impl Placement {
    /// Margin on the anchored vertical edge (the stacking offset plus spacing)
    #[must_use]
    pub fn edge_margin(&self) -> i32 {
        if self.anchor.contains(Anchor::TOP) {
            self.margins.top
        } else {
            self.margins.bottom
        }
    }
}

/// Pure mapping from stack rank and dimensions to anchor and margins
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementEngine {
    edge: Edge,
    alignment: Alignment,
    spacing: u32,
}

impl PlacementEngine {
    /// Create an engine for a fixed edge, alignment and spacing
    #[must_use]
    pub fn new(edge: Edge, alignment: Alignment, spacing: u32) -> Self {
        Self {
            edge,
            alignment,
            spacing,
        }
    }

    /// Create an engine from the layout section of the configuration
    #[must_use]
    pub fn from_config(layout: &LayoutConfig) -> Self {
        Self::new(layout.edge, layout.alignment, layout.spacing)
    }

    /// Configured spacing between notifications
    #[must_use]
    pub fn spacing(&self) -> u32 {
        self.spacing
    }

    /// Space consumed by the given entries, each contributing `height + spacing`
    ///
    /// Pass the heights of every entry ranked before the one being placed.
    #[must_use]
    pub fn prior_height<I>(&self, heights: I) -> u32
    where
        I: IntoIterator<Item = u32>,
    {
        heights
            .into_iter()
            .map(|h| h.saturating_add(self.spacing))
            .fold(0u32, u32::saturating_add)
    }

    /// Compute anchor and margins for one entry
    ///
    /// `total_prior_height` is the stacking offset: the sum of
    /// `height + spacing` over every entry with a lower position index.
    #[must_use]
    pub fn anchor_and_margins(
        &self,
        position_index: usize,
        width: u32,
        height: u32,
        total_prior_height: u32,
    ) -> Placement {
        let spacing = to_margin(self.spacing);
        let edge_margin = to_margin(self.spacing.saturating_add(total_prior_height));

        let mut margins = Margins::default();
        let mut anchor = match self.edge {
            Edge::Top => {
                margins.top = edge_margin;
                Anchor::TOP
            }
            Edge::Bottom => {
                margins.bottom = edge_margin;
                Anchor::BOTTOM
            }
        };

        match self.alignment {
            Alignment::Left => {
                anchor |= Anchor::LEFT;
                margins.left = spacing;
            }
            Alignment::Center => {
                anchor |= Anchor::LEFT | Anchor::RIGHT;
            }
            Alignment::Right => {
                anchor |= Anchor::RIGHT;
                margins.right = spacing;
            }
        }

        Placement {
            position_index,
            width,
            height,
            anchor,
            margins,
            exclusive_zone: NON_EXCLUSIVE_ZONE,
        }
    }

    /// Place a whole stack, given `(width, height)` in position order
    ///
    /// Offsets are accumulated from the true height of each entry.
    #[must_use]
    pub fn layout<I>(&self, sizes: I) -> Vec<Placement>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut offset = 0u32;
        sizes
            .into_iter()
            .enumerate()
            .map(|(index, (width, height))| {
                let placement = self.anchor_and_margins(index, width, height, offset);
                offset = offset.saturating_add(self.prior_height([height]));
                placement
            })
            .collect()
    }
}

fn to_margin(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
