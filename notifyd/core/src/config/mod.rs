//! TOML Configuration File Support
//!
//! Appearance, behavior and layout settings for the notification daemon,
//! read once at startup from `~/.config/notifyd/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments (`--config` selects the file)
//! 2. Environment variables (`NOTIFYD_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! The resolved [`NotifydConfig`] is never mutated after startup; every
//! engine copies the values it needs when the manager is created.
//!
//! # Example Configuration
//!
//! ```toml
//! [appearance]
//! border_width = 2
//! padding = 15
//! background = "#222222"
//! background_alpha = 0.9
//! foreground = "#bbbbbb"
//! border = "#005577"
//! font = "monospace 10"
//!
//! [behavior]
//! default_duration_ms = 3000
//! fade_ms = 200
//! max_notifications = 5
//!
//! [layout]
//! spacing = 10
//! default_width = 300
//! min_width = 300
//! min_height = 50
//! max_width = 600
//! edge = "top"
//! alignment = "right"
//! ```

pub mod color;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use color::Rgb;

use crate::placement::{Alignment, Edge};
use crate::render::text::FontDescriptor;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Appearance section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceToml {
    /// Border stroke width in pixels
    pub border_width: Option<u32>,
    /// Space between border and text in pixels
    pub padding: Option<u32>,
    /// Background color
    pub background: Option<Rgb>,
    /// Background opacity, `0.0..=1.0`
    pub background_alpha: Option<f32>,
    /// Text color
    pub foreground: Option<Rgb>,
    /// Border color
    pub border: Option<Rgb>,
    /// Font descriptor, e.g. `"monospace 10"`
    pub font: Option<FontDescriptor>,
}

/// Behavior section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorToml {
    /// Timeout applied when a notification does not carry one
    pub default_duration_ms: Option<u64>,
    /// Length of the fade-out before expiry
    pub fade_ms: Option<u64>,
    /// Maximum number of live notifications
    pub max_notifications: Option<usize>,
}

/// Layout section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutToml {
    /// Gap between notifications and from the screen edge
    pub spacing: Option<u32>,
    /// Width used to wrap text
    pub default_width: Option<u32>,
    /// Minimum surface width
    pub min_width: Option<u32>,
    /// Minimum surface height
    pub min_height: Option<u32>,
    /// Maximum surface width
    pub max_width: Option<u32>,
    /// Screen edge to stack from
    pub edge: Option<Edge>,
    /// Horizontal alignment of the stack
    pub alignment: Option<Alignment>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifydToml {
    /// Appearance configuration section
    pub appearance: AppearanceToml,
    /// Behavior configuration section
    pub behavior: BehaviorToml,
    /// Layout configuration section
    pub layout: LayoutToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// How notifications look
#[derive(Clone, Debug, PartialEq)]
pub struct AppearanceConfig {
    /// Border stroke width in pixels
    pub border_width: u32,
    /// Space between border and text in pixels
    pub padding: u32,
    /// Background color
    pub background: Rgb,
    /// Background opacity
    pub background_alpha: f32,
    /// Text color
    pub foreground: Rgb,
    /// Border color
    pub border: Rgb,
    /// Font used for summary and body
    pub font: FontDescriptor,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            border_width: 2,
            padding: 15,
            background: Rgb::new(0x22, 0x22, 0x22),
            background_alpha: 0.9,
            foreground: Rgb::new(0xbb, 0xbb, 0xbb),
            border: Rgb::new(0x00, 0x55, 0x77),
            font: FontDescriptor::default(),
        }
    }
}

/// How long notifications live and how many may coexist
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BehaviorConfig {
    /// Timeout applied when a notification does not carry one (0 = never)
    pub default_duration_ms: u64,
    /// Length of the cosmetic fade-out before expiry (0 = no fade)
    pub fade_ms: u64,
    /// Maximum number of live notifications
    pub max_notifications: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 3000,
            fade_ms: 200,
            max_notifications: 5,
        }
    }
}

/// Where notifications go and how large they may be
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Gap between notifications and from the screen edge
    pub spacing: u32,
    /// Width used to wrap text (including padding)
    pub default_width: u32,
    /// Minimum surface width
    pub min_width: u32,
    /// Minimum surface height
    pub min_height: u32,
    /// Maximum surface width
    pub max_width: u32,
    /// Screen edge to stack from
    pub edge: Edge,
    /// Horizontal alignment of the stack
    pub alignment: Alignment,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing: 10,
            default_width: 300,
            min_width: 300,
            min_height: 50,
            max_width: 600,
            edge: Edge::Top,
            alignment: Alignment::Right,
        }
    }
}

/// Complete daemon configuration
///
/// Use [`load_config`] to resolve it with proper priority handling.
#[derive(Clone, Debug)]
pub struct NotifydConfig {
    /// Appearance settings
    pub appearance: AppearanceConfig,
    /// Behavior settings
    pub behavior: BehaviorConfig,
    /// Layout settings
    pub layout: LayoutConfig,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for NotifydConfig {
    fn default() -> Self {
        Self {
            appearance: AppearanceConfig::default(),
            behavior: BehaviorConfig::default(),
            layout: LayoutConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl NotifydConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.appearance;
        let l = &self.layout;

        if self.behavior.max_notifications == 0 {
            return Err(ConfigError::ValidationError(
                "behavior.max_notifications must be at least 1".to_string(),
            ));
        }
        if l.min_width > l.max_width {
            return Err(ConfigError::ValidationError(format!(
                "layout.min_width ({}) exceeds layout.max_width ({})",
                l.min_width, l.max_width
            )));
        }
        let text_fits = a
            .padding
            .checked_mul(2)
            .is_some_and(|both| l.default_width > both);
        if !text_fits {
            return Err(ConfigError::ValidationError(format!(
                "layout.default_width ({}) leaves no room for text inside padding {}",
                l.default_width, a.padding
            )));
        }
        if !(0.0..=1.0).contains(&a.background_alpha) {
            return Err(ConfigError::ValidationError(format!(
                "appearance.background_alpha ({}) must be within 0.0..=1.0",
                a.background_alpha
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/notifyd/config.toml` or
/// `~/.config/notifyd/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("notifyd").join("config.toml"))
}

/// Load configuration from the default path plus environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resolved values fail validation. A missing file is not an error.
pub fn load_config() -> Result<NotifydConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path plus environment
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// resolved values fail validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<NotifydConfig, ConfigError> {
    let mut config = NotifydConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: NotifydToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
pub fn apply_toml_config(config: &mut NotifydConfig, toml: &NotifydToml) {
    let a = &toml.appearance;
    if let Some(width) = a.border_width {
        config.appearance.border_width = width;
    }
    if let Some(padding) = a.padding {
        config.appearance.padding = padding;
    }
    if let Some(color) = a.background {
        config.appearance.background = color;
    }
    if let Some(alpha) = a.background_alpha {
        config.appearance.background_alpha = alpha;
    }
    if let Some(color) = a.foreground {
        config.appearance.foreground = color;
    }
    if let Some(color) = a.border {
        config.appearance.border = color;
    }
    if let Some(ref font) = a.font {
        config.appearance.font = font.clone();
    }

    let b = &toml.behavior;
    if let Some(ms) = b.default_duration_ms {
        config.behavior.default_duration_ms = ms;
    }
    if let Some(ms) = b.fade_ms {
        config.behavior.fade_ms = ms;
    }
    if let Some(max) = b.max_notifications {
        config.behavior.max_notifications = max;
    }

    let l = &toml.layout;
    if let Some(spacing) = l.spacing {
        config.layout.spacing = spacing;
    }
    if let Some(width) = l.default_width {
        config.layout.default_width = width;
    }
    if let Some(width) = l.min_width {
        config.layout.min_width = width;
    }
    if let Some(height) = l.min_height {
        config.layout.min_height = height;
    }
    if let Some(width) = l.max_width {
        config.layout.max_width = width;
    }
    if let Some(edge) = l.edge {
        config.layout.edge = edge;
    }
    if let Some(alignment) = l.alignment {
        config.layout.alignment = alignment;
    }
}

/// Apply environment variable overrides to the config
pub fn apply_env_config(config: &mut NotifydConfig) {
    apply_env_with(config, |key| std::env::var(key).ok());
}

/// Apply overrides read through `lookup`
///
/// Unparsable values are logged and ignored.
fn apply_env_with<F>(config: &mut NotifydConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("NOTIFYD_EDGE") {
        match raw.parse::<Edge>() {
            Ok(edge) => {
                config.layout.edge = edge;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring NOTIFYD_EDGE"),
        }
    }
    if let Some(raw) = lookup("NOTIFYD_ALIGNMENT") {
        match raw.parse::<Alignment>() {
            Ok(alignment) => {
                config.layout.alignment = alignment;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring NOTIFYD_ALIGNMENT"),
        }
    }
    if let Some(raw) = lookup("NOTIFYD_DURATION_MS") {
        if let Ok(ms) = raw.trim().parse::<u64>() {
            config.behavior.default_duration_ms = ms;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %raw, "Ignoring NOTIFYD_DURATION_MS");
        }
    }
    if let Some(raw) = lookup("NOTIFYD_MAX_NOTIFICATIONS") {
        if let Ok(n) = raw.trim().parse::<usize>() {
            config.behavior.max_notifications = n;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %raw, "Ignoring NOTIFYD_MAX_NOTIFICATIONS");
        }
    }
    if let Some(raw) = lookup("NOTIFYD_FONT") {
        match raw.parse::<FontDescriptor>() {
            Ok(font) => {
                config.appearance.font = font;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring NOTIFYD_FONT"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
