//! Input model: raw pointer events and the router's gesture state.
//!
//! `PointerEvent` is what the host forwards from the platform, in screen
//! coordinates, stamped with a millisecond clock. The classification
//! predicates (`looks_like_pen`, `is_palm`) are pure functions of one event.
//! `InputState` is the router's single active state between pointer-down and
//! pointer-up.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use serde::{Deserialize, Serialize};

use crate::camera::Point;
use crate::consts::CANONICAL_PRESSURES;
use crate::tools::Tool;

/// Platform pointer identifier.
pub type PointerId = u32;

/// Device class reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Pen,
    Touch,
    Mouse,
}

/// Lifecycle phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    /// The platform took the pointer away; treated as an aborted up.
    Cancel,
}

/// Button bitmask bit for the primary button (nib, finger, left mouse).
pub const BUTTON_PRIMARY: u32 = 1;
/// Button bitmask bit for the secondary button (pen barrel, right mouse).
pub const BUTTON_SECONDARY: u32 = 2;

fn default_buttons() -> u32 {
    BUTTON_PRIMARY
}

/// One pointer sample as delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerEvent {
    pub pointer_id: PointerId,
    pub kind: PointerKind,
    pub phase: PointerPhase,
    /// Screen-space position in CSS pixels.
    pub position: Point,
    /// Host clock in milliseconds; must not go backwards.
    pub time_ms: u64,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub tilt_x: Option<f64>,
    #[serde(default)]
    pub tilt_y: Option<f64>,
    /// Contact ellipse width in CSS pixels.
    #[serde(default)]
    pub width: Option<f64>,
    /// Contact ellipse height in CSS pixels.
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default = "default_buttons")]
    pub buttons: u32,
}

impl PointerEvent {
    #[must_use]
    pub fn new(kind: PointerKind, pointer_id: PointerId, phase: PointerPhase, position: Point, time_ms: u64) -> Self {
        Self {
            pointer_id,
            kind,
            phase,
            position,
            time_ms,
            pressure: None,
            tilt_x: None,
            tilt_y: None,
            width: None,
            height: None,
            buttons: BUTTON_PRIMARY,
        }
    }

    #[must_use]
    pub fn pen(pointer_id: PointerId, phase: PointerPhase, x: f64, y: f64, time_ms: u64) -> Self {
        Self::new(PointerKind::Pen, pointer_id, phase, Point::new(x, y), time_ms)
    }

    #[must_use]
    pub fn touch(pointer_id: PointerId, phase: PointerPhase, x: f64, y: f64, time_ms: u64) -> Self {
        Self::new(PointerKind::Touch, pointer_id, phase, Point::new(x, y), time_ms)
    }

    #[must_use]
    pub fn mouse(phase: PointerPhase, x: f64, y: f64, time_ms: u64) -> Self {
        Self::new(PointerKind::Mouse, 1, phase, Point::new(x, y), time_ms)
    }

    #[must_use]
    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }

    #[must_use]
    pub fn with_tilt(mut self, tilt_x: f64, tilt_y: f64) -> Self {
        self.tilt_x = Some(tilt_x);
        self.tilt_y = Some(tilt_y);
        self
    }

    #[must_use]
    pub fn with_contact(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    #[must_use]
    pub fn with_buttons(mut self, buttons: u32) -> Self {
        self.buttons = buttons;
        self
    }

    #[must_use]
    pub fn has_primary(&self) -> bool {
        self.buttons & BUTTON_PRIMARY != 0
    }

    /// Barrel button on a pen, right button on a mouse.
    #[must_use]
    pub fn has_secondary(&self) -> bool {
        self.buttons & BUTTON_SECONDARY != 0
    }

    /// Whether the event comes from a stylus.
    ///
    /// Some platforms report styluses as touch or mouse; a non-zero tilt or
    /// a fractional pressure other than the canonical no-sensor values gives
    /// them away.
    #[must_use]
    pub fn looks_like_pen(&self) -> bool {
        if self.kind == PointerKind::Pen {
            return true;
        }
        let tilted = [self.tilt_x, self.tilt_y].into_iter().flatten().any(|t| t != 0.0);
        let graded = self
            .pressure
            .is_some_and(|p| p > 0.0 && p < 1.0 && !CANONICAL_PRESSURES.contains(&p));
        tilted || graded
    }

    /// Whether a touch contact is large enough to be a resting palm.
    #[must_use]
    pub fn is_palm(&self, threshold: f64) -> bool {
        self.kind == PointerKind::Touch
            && (self.width.is_some_and(|w| w > threshold) || self.height.is_some_and(|h| h > threshold))
    }
}

/// The router's active gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A pointer is drawing, erasing, selecting or placing text.
    Drawing {
        pointer_id: PointerId,
        /// Effective tool, possibly a barrel-button eraser override.
        tool: Tool,
        /// World position of the previous accepted sample.
        last_world: Point,
        /// Whether `tool` is a barrel-button override.
        transient: bool,
    },
    /// The stroke was clipped at the page edge; waiting for the pointer to lift.
    Detached { pointer_id: PointerId },
    /// A single pointer drags the view.
    Panning { pointer_id: PointerId, last_screen: Point },
    /// Two or more touches are down. The session lasts until every touch lifts.
    MultiTouch {
        /// Pointers driving the pinch; `None` once one of them lifted.
        pair: Option<(PointerId, PointerId)>,
        start_distance: f64,
        start_zoom: f64,
        last_mid: Point,
    },
}

impl InputState {
    /// Pointer owning a single-pointer gesture.
    #[must_use]
    pub fn owner(&self) -> Option<PointerId> {
        match self {
            Self::Drawing { pointer_id, .. } | Self::Detached { pointer_id } | Self::Panning { pointer_id, .. } => {
                Some(*pointer_id)
            }
            Self::Idle | Self::MultiTouch { .. } => None,
        }
    }
}
