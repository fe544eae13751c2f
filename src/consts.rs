//! Shared numeric constants for the drawing surface.

// ── Documents ───────────────────────────────────────────────────

/// Largest object id a document may carry: the biggest integer a JSON
/// number holds exactly in the host.
pub const MAX_OBJECT_ID: u64 = (1 << 53) - 1;

// ── Surface ─────────────────────────────────────────────────────

/// Smallest height a surface may have, in logical units.
pub const MIN_HEIGHT: f64 = 100.0;

/// Space kept free below the lowest object, in logical units.
pub const BOTTOM_PADDING: f64 = 40.0;

/// Inset applied to the page rectangle when clipping a stroke at its edge.
pub const BOUNDARY_EPSILON: f64 = 0.5;

/// Distance from the bottom edge at which a live stroke extends the page.
pub const AUTO_EXTEND_MARGIN: f64 = 100.0;

// ── Input ───────────────────────────────────────────────────────

/// Pressure reported by devices without pressure sensing while in contact.
pub const CANONICAL_PRESSURES: [f64; 2] = [0.5, 1.0];

/// Lower zoom bound for pinch gestures.
pub const MIN_ZOOM: f64 = 0.1;

/// Upper zoom bound for pinch gestures.
pub const MAX_ZOOM: f64 = 10.0;

/// Two touch points closer than this cannot seed a pinch ratio.
pub const MIN_PINCH_DISTANCE: f64 = 1.0;

// ── Objects ─────────────────────────────────────────────────────

/// Released shapes with both sides below this size are discarded.
pub const MIN_SHAPE_SIZE: f64 = 2.0;

/// Extra hit slop for the object eraser, in logical units.
pub const ERASER_RADIUS: f64 = 6.0;

/// Approximate glyph advance as a fraction of the font size.
pub const TEXT_ADVANCE_RATIO: f64 = 0.6;

/// Line height as a multiple of the font size.
pub const TEXT_LINE_HEIGHT: f64 = 1.2;

// ── Preview ─────────────────────────────────────────────────────

/// Smallest preview height produced for a non-empty drawing.
pub const PREVIEW_MIN_HEIGHT: f64 = 100.0;

/// Padding added below the lowest visible object in a preview.
pub const PREVIEW_PADDING_BOTTOM: f64 = 40.0;
