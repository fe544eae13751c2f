//! Typed view over the paper background configuration.
//!
//! The persisted document carries `backgroundConfig` as an opaque JSON value
//! owned by the host's background renderer. The engine only needs a few
//! facts from it: the paper colour, the size of one repeat tile, and whether
//! the background is a raster image (which locks the page size). Unknown or
//! malformed fields fall back to defaults.

#[cfg(test)]
#[path = "background_test.rs"]
mod background_test;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Ruling drawn on the paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    #[default]
    None,
    Lines,
    Grid,
    Dots,
    /// Four-line handwriting practice bundles.
    English,
    /// Five-line staves.
    Music,
    /// A raster image scaled to the page width.
    Image,
}

/// Paper tint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperColor {
    #[default]
    Gray,
    Beige,
    Blue,
}

impl PaperColor {
    /// Fully tinted RGB value at intensity 100.
    fn full_tint(self) -> (f64, f64, f64) {
        match self {
            Self::Gray => (189.0, 189.0, 189.0),
            Self::Beige => (232.0, 228.0, 201.0),
            Self::Blue => (201.0, 225.0, 232.0),
        }
    }
}

/// Background settings as stored in `backgroundConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackgroundConfig {
    #[serde(rename = "type")]
    pub kind: BackgroundKind,
    /// Pattern cell size in logical units.
    pub size: f64,
    /// Spacing multiplier between english/music bundles.
    pub bundle_gap: f64,
    /// Paper tint strength, 0 (white) to 100.
    pub intensity: f64,
    pub color_type: PaperColor,
    /// Ruling line opacity.
    pub opacity: f64,
    pub image_opacity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            kind: BackgroundKind::None,
            size: 30.0,
            bundle_gap: 1.0,
            intensity: 0.0,
            color_type: PaperColor::Gray,
            opacity: 0.2,
            image_opacity: 1.0,
            image_data: None,
        }
    }
}

/// Size of one repeat cell of the ruling pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub width: f64,
    pub height: f64,
}

impl BackgroundConfig {
    /// Parse the opaque config, falling back to defaults when it is absent
    /// or malformed.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        match serde_json::from_value(value.clone()) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "unreadable background config; using defaults");
                Self::default()
            }
        }
    }

    /// Paper colour as `(r, g, b)`.
    #[must_use]
    pub fn paper_rgb(&self) -> (u8, u8, u8) {
        let factor = (self.intensity / 100.0).clamp(0.0, 1.0);
        let (r, g, b) = self.color_type.full_tint();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let channel = |full: f64| (255.0 - (255.0 - full) * factor).round().clamp(0.0, 255.0) as u8;
        (channel(r), channel(g), channel(b))
    }

    /// Paper colour as a CSS `rgb()` string.
    #[must_use]
    pub fn paper_color(&self) -> String {
        let (r, g, b) = self.paper_rgb();
        format!("rgb({r}, {g}, {b})")
    }

    /// Height of one repeat cell. English and music bundles are taller than
    /// the cell width.
    #[must_use]
    pub fn tile_height(&self) -> f64 {
        match self.kind {
            BackgroundKind::English => self.size / 4.5 * 3.0 * 1.5 * self.bundle_gap,
            BackgroundKind::Music => self.size / 8.0 * 4.0 * 1.8 * self.bundle_gap,
            _ => self.size,
        }
    }

    /// Pixel cell of the ruling pattern, or `None` for image backgrounds.
    #[must_use]
    pub fn tile(&self) -> Option<Tile> {
        if self.is_image() {
            return None;
        }
        Some(Tile { width: self.size.ceil(), height: self.tile_height().ceil() })
    }

    /// Whether the page follows a raster image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.kind == BackgroundKind::Image
    }
}
