#![allow(clippy::float_cmp)]

use super::*;

// =============================================================
// Tool
// =============================================================

#[test]
fn default_tool_is_pen_brush() {
    assert_eq!(Tool::default(), Tool::Brush(BrushKind::Pen));
    assert_eq!(ToolState::new().active(), Tool::Brush(BrushKind::Pen));
}

#[test]
fn select_and_hand_do_not_clip() {
    assert!(!Tool::Select.clips_to_page());
    assert!(!Tool::Hand.clips_to_page());
    assert!(Tool::Brush(BrushKind::Marker).clips_to_page());
    assert!(Tool::Shape(ShapeKind::Line).clips_to_page());
    assert!(Tool::Eraser(EraserKind::Object).clips_to_page());
}

#[test]
fn cursor_names() {
    assert_eq!(Tool::Eraser(EraserKind::Pixel).cursor(), "eraser");
    assert_eq!(Tool::Brush(BrushKind::Pen).cursor(), "crosshair");
    assert_eq!(Tool::Hand.cursor(), "grab");
}

// =============================================================
// ToolKey
// =============================================================

#[test]
fn tool_key_strings() {
    assert_eq!(ToolKey::from(Tool::Brush(BrushKind::Highlighter)).to_string(), "brush:highlighter");
    assert_eq!(ToolKey::from(Tool::Eraser(EraserKind::Object)).to_string(), "eraser:object");
    assert_eq!(ToolKey::from(Tool::Shape(ShapeKind::Arrow)).to_string(), "shape:arrow");
    assert_eq!(ToolKey::from(Tool::Text).to_string(), "text");
}

#[test]
fn tool_key_parses_back() {
    let key: ToolKey = "shape:triangle".parse().unwrap();
    assert_eq!(key.tool(), Tool::Shape(ShapeKind::Triangle));
    let key: ToolKey = "select".parse().unwrap();
    assert_eq!(key.tool(), Tool::Select);
}

#[test]
fn tool_key_rejects_unknown() {
    assert_eq!("brush:crayon".parse::<ToolKey>(), Err(ToolKeyError("brush:crayon".to_owned())));
    assert!("lasso".parse::<ToolKey>().is_err());
    assert!("paint:pen".parse::<ToolKey>().is_err());
}

#[test]
fn tool_key_serializes_as_string() {
    let key = ToolKey::from(Tool::Brush(BrushKind::Pencil));
    assert_eq!(serde_json::to_string(&key).unwrap(), "\"brush:pencil\"");
    assert!(serde_json::from_str::<ToolKey>("\"nope\"").is_err());
}

// =============================================================
// Settings table
// =============================================================

#[test]
fn first_use_seeds_defaults() {
    let tools = ToolState::new();
    let s = tools.settings_for(Tool::Brush(BrushKind::Highlighter));
    assert_eq!(s.opacity, BrushKind::Highlighter.default_opacity());
    assert_eq!(s.size, 20.0);
    assert_eq!(tools.settings_for(Tool::Shape(ShapeKind::Arrow)).arrowhead_size, 12.0);
}

#[test]
fn switching_tools_recalls_each_keys_settings() {
    let mut tools = ToolState::new();
    tools.select_brush(BrushKind::Pen);
    tools.set_color("#ff0000");
    tools.set_size(5.0);

    tools.select_brush(BrushKind::Marker);
    assert_eq!(tools.settings_for(tools.active()).color, "#000000");
    tools.set_color("#00ff00");

    tools.select_brush(BrushKind::Pen);
    let pen = tools.settings_for(tools.active());
    assert_eq!(pen.color, "#ff0000");
    assert_eq!(pen.size, 5.0);
    assert_eq!(tools.settings_for(Tool::Brush(BrushKind::Marker)).color, "#00ff00");
}

#[test]
fn shape_tools_key_on_tool_alone() {
    let mut tools = ToolState::new();
    tools.set_tool(Tool::Shape(ShapeKind::Rectangle));
    tools.set_dash_pattern(vec![4.0, 2.0]);
    tools.set_tool(Tool::Shape(ShapeKind::Ellipse));
    assert!(tools.settings_for(tools.active()).dash_pattern.is_empty());
    assert_eq!(tools.settings_for(Tool::Shape(ShapeKind::Rectangle)).dash_pattern, vec![4.0, 2.0]);
}

#[test]
fn invalid_size_and_opacity_are_ignored_or_clamped() {
    let mut tools = ToolState::new();
    tools.set_size(-3.0);
    tools.set_size(f64::NAN);
    assert_eq!(tools.settings_for(tools.active()).size, 2.0);
    tools.set_opacity(3.0);
    assert_eq!(tools.settings_for(tools.active()).opacity, 1.0);
}

#[test]
fn remembers_last_subtypes() {
    let mut tools = ToolState::new();
    tools.select_eraser(EraserKind::Object);
    tools.select_brush(BrushKind::Pencil);
    tools.set_tool(Tool::Select);
    assert_eq!(tools.last_eraser(), EraserKind::Object);
    assert_eq!(tools.last_brush(), BrushKind::Pencil);
}

#[test]
fn style_materializes_settings() {
    let s = ToolSettings::defaults_for(Tool::Brush(BrushKind::Marker));
    let style = s.style();
    assert_eq!(style.stroke_width, 8.0);
    assert_eq!(style.color, "#000000");
}

#[test]
fn settings_table_round_trips_through_json() {
    let mut tools = ToolState::new();
    tools.select_brush(BrushKind::Marker);
    tools.set_color("#123456");
    tools.zoom_locked = true;
    let json = serde_json::to_string(&tools).unwrap();
    assert!(json.contains("\"brush:marker\""));
    let back: ToolState = serde_json::from_str(&json).unwrap();
    assert_eq!(back.settings_for(Tool::Brush(BrushKind::Marker)).color, "#123456");
    assert!(back.zoom_locked);
    assert_eq!(back.last_brush(), BrushKind::Marker);
}
