//! Pointer input router.
//!
//! Classifies every raw pointer event and decides whether it is forwarded
//! to drawing, absorbed, or redirected into a view gesture. Rules apply in
//! priority order:
//!
//! 1. pen detection (pointer kind, tilt, graded pressure)
//! 2. palm rejection for oversized touch contacts
//! 3. the pen exclusivity window, which suppresses every non-pen pointer
//!    while a pen is down and for a short time after it lifts
//! 4. multi-touch pinch/pan, which aborts any stroke in progress
//! 5. the barrel-button eraser override
//! 6. default forwarding by pointer kind
//!
//! Strokes are confined to the page: the first sample outside it is
//! replaced by the boundary crossing, the stroke ends there, and the
//! pointer stays detached until it lifts. The router never fails; events
//! it cannot place are dropped.

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::camera::{Camera, Point};
use crate::config::EngineConfig;
use crate::consts::MIN_PINCH_DISTANCE;
use crate::input::{InputState, PointerEvent, PointerId, PointerKind, PointerPhase};
use crate::surface::Surface;
use crate::tools::{Tool, ToolState};

/// Read-only session state the router consults.
#[derive(Debug, Clone, Copy)]
pub struct RouterContext<'a> {
    pub camera: &'a Camera,
    pub surface: &'a Surface,
    pub tools: &'a ToolState,
}

/// What the engine should do in response to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Start a draft with `tool` at a world point.
    Begin { tool: Tool, world: Point, transient: bool },
    /// Append a world-space sample to the draft.
    Extend { world: Point },
    /// Commit the draft.
    End,
    /// Discard the draft without recording anything.
    Abort,
    /// Shift the view by a screen-space delta.
    Pan { dx: f64, dy: f64 },
    /// Set the zoom, keeping the screen point `anchor` fixed.
    Zoom { anchor: Point, zoom: f64 },
}

/// Per-pointer classification and gesture state machine.
#[derive(Debug, Clone)]
pub struct PointerRouter {
    state: InputState,
    pen_window_ms: u64,
    palm_threshold: f64,
    active_pens: HashSet<PointerId>,
    palms: HashSet<PointerId>,
    suppressed: HashSet<PointerId>,
    touches: BTreeMap<PointerId, Point>,
    last_pen_up_ms: Option<u64>,
}

impl PointerRouter {
    #[must_use]
    pub fn new(pen_window_ms: u64, palm_threshold: f64) -> Self {
        Self {
            state: InputState::Idle,
            pen_window_ms,
            palm_threshold,
            active_pens: HashSet::new(),
            palms: HashSet::new(),
            suppressed: HashSet::new(),
            touches: BTreeMap::new(),
            last_pen_up_ms: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.pen_window_ms, config.palm_threshold)
    }

    #[must_use]
    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Whether any pen is touching the surface.
    #[must_use]
    pub fn pen_active(&self) -> bool {
        !self.active_pens.is_empty()
    }

    /// Whether non-pen input at `now_ms` falls inside the pen window.
    #[must_use]
    pub fn in_pen_window(&self, now_ms: u64) -> bool {
        self.pen_active()
            || self
                .last_pen_up_ms
                .is_some_and(|up| now_ms.saturating_sub(up) < self.pen_window_ms)
    }

    /// Drop the gesture in progress and return to idle.
    ///
    /// Emits `Abort` when a draft was in progress. Pens still in contact stay
    /// tracked, so touch remains suppressed until they lift.
    pub fn reset(&mut self) -> Vec<Gesture> {
        let aborted = matches!(self.state, InputState::Drawing { .. });
        self.state = InputState::Idle;
        self.palms.clear();
        self.suppressed.clear();
        self.touches.clear();
        if aborted { vec![Gesture::Abort] } else { Vec::new() }
    }

    /// Route one event.
    pub fn handle(&mut self, ev: &PointerEvent, ctx: RouterContext<'_>) -> Vec<Gesture> {
        match ev.phase {
            PointerPhase::Down => self.on_down(ev, ctx),
            PointerPhase::Move => self.on_move(ev, ctx),
            PointerPhase::Up => self.on_up(ev, false),
            PointerPhase::Cancel => self.on_up(ev, true),
        }
    }

    fn on_down(&mut self, ev: &PointerEvent, ctx: RouterContext<'_>) -> Vec<Gesture> {
        let id = ev.pointer_id;
        if self.palms.contains(&id) || self.suppressed.contains(&id) || self.active_pens.contains(&id) {
            debug!(pointer_id = id, "duplicate pointer down ignored");
            return Vec::new();
        }

        let is_pen = ev.looks_like_pen();
        if !is_pen && ev.is_palm(self.palm_threshold) {
            debug!(pointer_id = id, width = ?ev.width, height = ?ev.height, "touch rejected as palm");
            self.palms.insert(id);
            return Vec::new();
        }

        let mut out = Vec::new();
        if is_pen {
            out.extend(self.preempt_non_pen_gesture());
            self.active_pens.insert(id);
        } else if self.in_pen_window(ev.time_ms) {
            debug!(pointer_id = id, kind = ?ev.kind, "pointer suppressed by pen window");
            self.suppressed.insert(id);
            return Vec::new();
        }

        if !is_pen && ev.kind == PointerKind::Touch {
            self.touches.insert(id, ev.position);
            if self.touches.len() >= 2 {
                return self.enter_multi_touch(ctx);
            }
        }

        if self.state != InputState::Idle {
            debug!(pointer_id = id, "pointer down ignored: gesture in progress");
            return out;
        }

        let active = ctx.tools.active();
        let (tool, transient) = if is_pen && ev.has_secondary() && !active.is_eraser() {
            (Tool::Eraser(ctx.tools.last_eraser()), true)
        } else {
            (active, false)
        };

        let pans = match ev.kind {
            _ if is_pen => tool == Tool::Hand,
            PointerKind::Touch => !ctx.tools.finger_drawing || tool == Tool::Hand,
            PointerKind::Mouse | PointerKind::Pen => {
                if !ev.has_primary() {
                    return Vec::new();
                }
                tool == Tool::Hand
            }
        };
        if pans {
            self.state = InputState::Panning { pointer_id: id, last_screen: ev.position };
            return out;
        }

        let world = ctx.camera.screen_to_world(ev.position);
        if tool.clips_to_page() && !ctx.surface.contains_point(world) {
            debug!(pointer_id = id, x = world.x, y = world.y, "pointer down outside page ignored");
            return out;
        }
        self.state = InputState::Drawing { pointer_id: id, tool, last_world: world, transient };
        out.push(Gesture::Begin { tool, world, transient });
        out
    }

    /// A landing pen ends any single-pointer gesture owned by touch or mouse.
    /// The owner is suppressed until it lifts.
    fn preempt_non_pen_gesture(&mut self) -> Option<Gesture> {
        let owner = self.state.owner().filter(|o| !self.active_pens.contains(o))?;
        let drawing = matches!(self.state, InputState::Drawing { .. });
        debug!(pointer_id = owner, "non-pen gesture preempted by pen");
        self.state = InputState::Idle;
        self.touches.remove(&owner);
        self.suppressed.insert(owner);
        drawing.then_some(Gesture::Abort)
    }

    fn enter_multi_touch(&mut self, ctx: RouterContext<'_>) -> Vec<Gesture> {
        let mut out = Vec::new();
        if let InputState::Drawing { pointer_id, .. } = self.state {
            debug!(pointer_id, "stroke aborted by multi-touch");
            out.push(Gesture::Abort);
        }
        let mut ids = self.touches.iter().map(|(id, p)| (*id, *p));
        if let (Some((a, pa)), Some((b, pb))) = (ids.next(), ids.next()) {
            self.state = InputState::MultiTouch {
                pair: Some((a, b)),
                start_distance: pa.distance(pb),
                start_zoom: ctx.camera.zoom,
                last_mid: pa.midpoint(pb),
            };
        }
        out
    }

    fn on_move(&mut self, ev: &PointerEvent, ctx: RouterContext<'_>) -> Vec<Gesture> {
        let id = ev.pointer_id;
        if self.palms.contains(&id) || self.suppressed.contains(&id) {
            return Vec::new();
        }
        if let Some(p) = self.touches.get_mut(&id) {
            *p = ev.position;
        }

        match &mut self.state {
            InputState::MultiTouch { pair: Some((a, b)), start_distance, start_zoom, last_mid } => {
                if id != *a && id != *b {
                    return Vec::new();
                }
                let (Some(pa), Some(pb)) = (self.touches.get(a), self.touches.get(b)) else {
                    return Vec::new();
                };
                let mid = pa.midpoint(*pb);
                let anchor = *last_mid;
                let (dx, dy) = (mid.x - anchor.x, mid.y - anchor.y);
                *last_mid = mid;
                if ctx.tools.zoom_locked {
                    return vec![Gesture::Pan { dx: 0.0, dy }];
                }
                let mut out = Vec::new();
                if *start_distance >= MIN_PINCH_DISTANCE {
                    let zoom = *start_zoom * pa.distance(*pb) / *start_distance;
                    out.push(Gesture::Zoom { anchor, zoom });
                }
                out.push(Gesture::Pan { dx, dy });
                out
            }
            InputState::Panning { pointer_id, last_screen } if *pointer_id == id => {
                let (dx, dy) = (ev.position.x - last_screen.x, ev.position.y - last_screen.y);
                *last_screen = ev.position;
                vec![Gesture::Pan { dx, dy }]
            }
            InputState::Drawing { pointer_id, tool, last_world, .. } if *pointer_id == id => {
                let world = ctx.camera.screen_to_world(ev.position);
                if tool.clips_to_page() && !ctx.surface.contains_point(world) {
                    let edge = ctx.surface.clamp_segment_to_boundary(*last_world, world);
                    debug!(pointer_id = id, x = edge.x, y = edge.y, "stroke clipped at page edge");
                    self.state = InputState::Detached { pointer_id: id };
                    return vec![Gesture::Extend { world: edge }, Gesture::End];
                }
                *last_world = world;
                vec![Gesture::Extend { world }]
            }
            _ => Vec::new(),
        }
    }

    fn on_up(&mut self, ev: &PointerEvent, cancelled: bool) -> Vec<Gesture> {
        let id = ev.pointer_id;
        if self.palms.remove(&id) || self.suppressed.remove(&id) {
            return Vec::new();
        }
        if self.active_pens.remove(&id) {
            self.last_pen_up_ms = Some(ev.time_ms);
        }
        self.touches.remove(&id);

        match &mut self.state {
            InputState::MultiTouch { pair, .. } => {
                if pair.is_some_and(|(a, b)| a == id || b == id) {
                    *pair = None;
                }
                if self.touches.is_empty() {
                    self.state = InputState::Idle;
                }
                Vec::new()
            }
            InputState::Drawing { pointer_id, .. } if *pointer_id == id => {
                self.state = InputState::Idle;
                vec![if cancelled { Gesture::Abort } else { Gesture::End }]
            }
            InputState::Detached { pointer_id } | InputState::Panning { pointer_id, .. } if *pointer_id == id => {
                self.state = InputState::Idle;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}
