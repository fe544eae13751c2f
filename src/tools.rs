//! Tool state: the active tool and the settings remembered for each tool.
//!
//! Settings live in a table keyed by [`ToolKey`]. Freehand tools key on the
//! tool and its subtype (`brush:pen`, `eraser:object`), shape tools on the
//! tool alone (`shape:arrow`). Switching tools recalls that key's last-used
//! settings; the first use of a key seeds it from built-in defaults.

#[cfg(test)]
#[path = "tools_test.rs"]
mod tools_test;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::doc::{BrushKind, ShapeKind, Style};

/// Which eraser flavour is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EraserKind {
    /// Paints over ink with an eraser mark.
    #[default]
    Pixel,
    /// Deletes whole objects under the pointer.
    Object,
}

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Pick and drag existing objects.
    Select,
    /// Pan the view.
    Hand,
    /// Freehand drawing.
    Brush(BrushKind),
    /// Erase ink or objects.
    Eraser(EraserKind),
    /// Drag out a geometric shape.
    Shape(ShapeKind),
    /// Place or edit a text block.
    Text,
}

impl Default for Tool {
    fn default() -> Self {
        Self::Brush(BrushKind::Pen)
    }
}

impl Tool {
    #[must_use]
    pub fn is_eraser(self) -> bool {
        matches!(self, Self::Eraser(_))
    }

    /// Whether input with this tool is confined to the page.
    #[must_use]
    pub fn clips_to_page(self) -> bool {
        !matches!(self, Self::Select | Self::Hand)
    }

    /// Cursor name the host shows while the tool is active.
    #[must_use]
    pub fn cursor(self) -> &'static str {
        match self {
            Self::Select => "default",
            Self::Hand => "grab",
            Self::Eraser(_) => "eraser",
            Self::Text => "text",
            _ => "crosshair",
        }
    }
}

/// Error parsing a tool key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool key `{0}`")]
pub struct ToolKeyError(pub String);

/// Settings-table key derived from a tool and its subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolKey(Tool);

impl ToolKey {
    #[must_use]
    pub fn tool(self) -> Tool {
        self.0
    }
}

impl From<Tool> for ToolKey {
    fn from(tool: Tool) -> Self {
        Self(tool)
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Tool::Select => f.write_str("select"),
            Tool::Hand => f.write_str("hand"),
            Tool::Text => f.write_str("text"),
            Tool::Brush(kind) => write!(f, "brush:{}", brush_name(kind)),
            Tool::Eraser(EraserKind::Pixel) => f.write_str("eraser:pixel"),
            Tool::Eraser(EraserKind::Object) => f.write_str("eraser:object"),
            Tool::Shape(kind) => write!(f, "shape:{}", shape_name(kind)),
        }
    }
}

impl FromStr for ToolKey {
    type Err = ToolKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tool = match s.split_once(':') {
            None => match s {
                "select" => Tool::Select,
                "hand" => Tool::Hand,
                "text" => Tool::Text,
                _ => return Err(ToolKeyError(s.to_owned())),
            },
            Some(("brush", sub)) => Tool::Brush(match sub {
                "pen" => BrushKind::Pen,
                "pencil" => BrushKind::Pencil,
                "marker" => BrushKind::Marker,
                "highlighter" => BrushKind::Highlighter,
                _ => return Err(ToolKeyError(s.to_owned())),
            }),
            Some(("eraser", sub)) => Tool::Eraser(match sub {
                "pixel" => EraserKind::Pixel,
                "object" => EraserKind::Object,
                _ => return Err(ToolKeyError(s.to_owned())),
            }),
            Some(("shape", sub)) => Tool::Shape(match sub {
                "line" => ShapeKind::Line,
                "arrow" => ShapeKind::Arrow,
                "rectangle" => ShapeKind::Rectangle,
                "ellipse" => ShapeKind::Ellipse,
                "triangle" => ShapeKind::Triangle,
                _ => return Err(ToolKeyError(s.to_owned())),
            }),
            Some(_) => return Err(ToolKeyError(s.to_owned())),
        };
        Ok(Self(tool))
    }
}

impl TryFrom<String> for ToolKey {
    type Error = ToolKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToolKey> for String {
    fn from(key: ToolKey) -> Self {
        key.to_string()
    }
}

fn brush_name(kind: BrushKind) -> &'static str {
    match kind {
        BrushKind::Pen => "pen",
        BrushKind::Pencil => "pencil",
        BrushKind::Marker => "marker",
        BrushKind::Highlighter => "highlighter",
    }
}

fn shape_name(kind: ShapeKind) -> &'static str {
    match kind {
        ShapeKind::Line => "line",
        ShapeKind::Arrow => "arrow",
        ShapeKind::Rectangle => "rectangle",
        ShapeKind::Ellipse => "ellipse",
        ShapeKind::Triangle => "triangle",
    }
}

/// Remembered settings for one tool key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSettings {
    pub color: String,
    /// Stroke width, eraser width or font size depending on the tool.
    pub size: f64,
    pub opacity: f64,
    #[serde(default)]
    pub dash_pattern: Vec<f64>,
    #[serde(default)]
    pub arrowhead_size: f64,
}

impl ToolSettings {
    /// Built-in settings a key starts with.
    #[must_use]
    pub fn defaults_for(tool: Tool) -> Self {
        let base = Self {
            color: "#000000".to_owned(),
            size: 2.0,
            opacity: 1.0,
            dash_pattern: Vec::new(),
            arrowhead_size: 0.0,
        };
        match tool {
            Tool::Brush(kind) => {
                let size = match kind {
                    BrushKind::Pen => 2.0,
                    BrushKind::Pencil => 1.5,
                    BrushKind::Marker => 8.0,
                    BrushKind::Highlighter => 20.0,
                };
                let color = if kind == BrushKind::Highlighter { "#ffeb3b" } else { "#000000" };
                Self { color: color.to_owned(), size, opacity: kind.default_opacity(), ..base }
            }
            Tool::Eraser(_) => Self { color: "#ffffff".to_owned(), size: 20.0, ..base },
            Tool::Shape(ShapeKind::Arrow) => Self { arrowhead_size: 12.0, ..base },
            Tool::Text => Self { size: 20.0, ..base },
            _ => base,
        }
    }

    /// Object style materialized from these settings.
    #[must_use]
    pub fn style(&self) -> Style {
        Style {
            color: self.color.clone(),
            stroke_width: self.size,
            opacity: self.opacity,
            dash_pattern: self.dash_pattern.clone(),
        }
    }
}

/// Active tool, remembered subtypes and the per-key settings table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolState {
    #[serde(skip)]
    active: Tool,
    last_brush: BrushKind,
    last_eraser: EraserKind,
    settings: HashMap<ToolKey, ToolSettings>,
    /// Single-finger touch draws instead of panning.
    pub finger_drawing: bool,
    /// Pinch gestures only pan vertically.
    pub zoom_locked: bool,
}

impl ToolState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn active(&self) -> Tool {
        self.active
    }

    #[must_use]
    pub fn last_brush(&self) -> BrushKind {
        self.last_brush
    }

    /// Eraser flavour the barrel button switches to.
    #[must_use]
    pub fn last_eraser(&self) -> EraserKind {
        self.last_eraser
    }

    /// Activate `tool`, remembering its subtype for later recall.
    pub fn set_tool(&mut self, tool: Tool) {
        match tool {
            Tool::Brush(kind) => self.last_brush = kind,
            Tool::Eraser(kind) => self.last_eraser = kind,
            _ => {}
        }
        self.active = tool;
        self.settings.entry(ToolKey::from(tool)).or_insert_with(|| ToolSettings::defaults_for(tool));
    }

    /// Switch to the brush tool with the given subtype.
    pub fn select_brush(&mut self, kind: BrushKind) {
        self.set_tool(Tool::Brush(kind));
    }

    /// Switch to the eraser tool with the given subtype.
    pub fn select_eraser(&mut self, kind: EraserKind) {
        self.set_tool(Tool::Eraser(kind));
    }

    /// Settings for `tool`, or its defaults when never used.
    #[must_use]
    pub fn settings_for(&self, tool: Tool) -> ToolSettings {
        self.settings
            .get(&ToolKey::from(tool))
            .cloned()
            .unwrap_or_else(|| ToolSettings::defaults_for(tool))
    }

    /// Mutable settings of the active tool, seeded on first use.
    pub fn active_settings_mut(&mut self) -> &mut ToolSettings {
        let tool = self.active();
        self.settings.entry(ToolKey::from(tool)).or_insert_with(|| ToolSettings::defaults_for(tool))
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.active_settings_mut().color = color.into();
    }

    /// Set the active tool's size; non-finite or non-positive sizes are ignored.
    pub fn set_size(&mut self, size: f64) {
        if size.is_finite() && size > 0.0 {
            self.active_settings_mut().size = size;
        }
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        if opacity.is_finite() {
            self.active_settings_mut().opacity = opacity.clamp(0.0, 1.0);
        }
    }

    pub fn set_dash_pattern(&mut self, dash_pattern: Vec<f64>) {
        self.active_settings_mut().dash_pattern = dash_pattern;
    }
}
