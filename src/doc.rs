//! Document model: drawable objects, their serialized records, and the store.
//!
//! This module defines what can sit on the page (`DrawableObject`, a common
//! envelope around the per-kind `ObjectBody`), the validated frozen form the
//! history and persistence layers keep (`ObjectRecord`), and the runtime
//! store that owns every live object in draw order (`DocStore`).
//!
//! Every mutation goes through `DocStore::add`, `remove` or `modify`. Each
//! one pushes a `StoreEvent` into the store's outbox, which the engine drains
//! into the history after the operation. Work done inside
//! [`DocStore::quietly`] raises no events; history reconstruction and
//! structural edits that record their own snapshot use it.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::camera::Point;

/// Stable identifier of a drawable object. Minted once, never reused.
pub type ObjectId = u64;

/// Freehand brush flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushKind {
    /// Pressure-sensitive ink pen.
    #[default]
    Pen,
    /// Thin constant-width pencil.
    Pencil,
    /// Broad opaque marker.
    Marker,
    /// Broad translucent highlighter.
    Highlighter,
}

impl BrushKind {
    /// Opacity a fresh stroke of this brush starts with.
    #[must_use]
    pub fn default_opacity(self) -> f64 {
        match self {
            Self::Highlighter => 0.4,
            Self::Pencil => 0.85,
            Self::Pen | Self::Marker => 1.0,
        }
    }

    /// Whether stroke width follows pen pressure.
    #[must_use]
    pub fn is_pressure_sensitive(self) -> bool {
        matches!(self, Self::Pen)
    }
}

/// Geometric primitive drawn by a shape tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Straight segment from `start` to `end`.
    Line,
    /// Segment with an arrowhead at `end`.
    Arrow,
    /// Axis-aligned rectangle spanning `start`/`end`.
    Rectangle,
    /// Ellipse inscribed in the `start`/`end` box.
    Ellipse,
    /// Isosceles triangle inscribed in the `start`/`end` box.
    Triangle,
}

impl ShapeKind {
    /// Whether the shape is a one-dimensional edge.
    #[must_use]
    pub fn is_edge(self) -> bool {
        matches!(self, Self::Line | Self::Arrow)
    }
}

/// Per-kind geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObjectBody {
    /// Freehand path. `pressures` is either empty or one value per point.
    #[serde(rename_all = "camelCase")]
    Stroke {
        brush: BrushKind,
        points: Vec<Point>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pressures: Vec<f64>,
    },
    /// Shape defined by its drag start and end.
    #[serde(rename_all = "camelCase")]
    Shape {
        shape: ShapeKind,
        start: Point,
        end: Point,
        #[serde(default)]
        arrowhead_size: f64,
    },
    /// Text block anchored at its top-left corner.
    #[serde(rename_all = "camelCase")]
    Text { origin: Point, content: String, font_size: f64 },
    /// Page rectangle at the origin; exactly one per surface.
    #[serde(rename_all = "camelCase")]
    BackgroundMarker { width: f64, height: f64 },
}

/// Visual style shared by every object kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    /// Stroke colour as a CSS colour string.
    pub color: String,
    /// Stroke width in world units.
    pub stroke_width: f64,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Dash lengths; empty means solid.
    #[serde(default)]
    pub dash_pattern: Vec<f64>,
}

impl Default for Style {
    fn default() -> Self {
        Self { color: "#000000".to_owned(), stroke_width: 2.0, opacity: 1.0, dash_pattern: Vec::new() }
    }
}

/// An object placed on the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawableObject {
    /// Assigned by the store on insertion; zero until then.
    #[serde(default)]
    pub id: ObjectId,
    pub body: ObjectBody,
    #[serde(default)]
    pub style: Style,
    /// Pixel-eraser stroke.
    #[serde(default)]
    pub is_eraser_mark: bool,
    /// Page boundary marker.
    #[serde(default)]
    pub is_background: bool,
}

/// Errors raised while validating or locating objects.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DocError {
    #[error("object {0} not found")]
    NotFound(ObjectId),
    #[error("object {0} is still under construction")]
    Incomplete(ObjectId),
    #[error("object {0} has non-finite geometry")]
    NonFinite(ObjectId),
    #[error("object {0} background flag disagrees with its body")]
    Inconsistent(ObjectId),
}

impl DrawableObject {
    /// A freehand stroke.
    #[must_use]
    pub fn stroke(brush: BrushKind, points: Vec<Point>, style: Style) -> Self {
        Self::with_body(ObjectBody::Stroke { brush, points, pressures: Vec::new() }, style)
    }

    /// A pixel-eraser stroke.
    #[must_use]
    pub fn eraser_mark(points: Vec<Point>, stroke_width: f64) -> Self {
        let style = Style { color: "#ffffff".to_owned(), stroke_width, ..Style::default() };
        let mut obj = Self::with_body(ObjectBody::Stroke { brush: BrushKind::Marker, points, pressures: Vec::new() }, style);
        obj.is_eraser_mark = true;
        obj
    }

    /// Attach per-sample pen pressure to a stroke. Other kinds are unchanged.
    #[must_use]
    pub fn with_pressures(mut self, samples: Vec<f64>) -> Self {
        if let ObjectBody::Stroke { pressures, .. } = &mut self.body {
            *pressures = samples;
        }
        self
    }

    /// A shape spanning `start` to `end`.
    #[must_use]
    pub fn shape(shape: ShapeKind, start: Point, end: Point, arrowhead_size: f64, style: Style) -> Self {
        Self::with_body(ObjectBody::Shape { shape, start, end, arrowhead_size }, style)
    }

    /// A text block.
    #[must_use]
    pub fn text(origin: Point, content: String, font_size: f64, style: Style) -> Self {
        Self::with_body(ObjectBody::Text { origin, content, font_size }, style)
    }

    /// The page boundary marker.
    #[must_use]
    pub fn background(width: f64, height: f64) -> Self {
        let style = Style { color: "transparent".to_owned(), stroke_width: 0.0, ..Style::default() };
        let mut obj = Self::with_body(ObjectBody::BackgroundMarker { width, height }, style);
        obj.is_background = true;
        obj
    }

    fn with_body(body: ObjectBody, style: Style) -> Self {
        Self { id: 0, body, style, is_eraser_mark: false, is_background: false }
    }

    /// Move the object by a world-space delta. The background never moves.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match &mut self.body {
            ObjectBody::Stroke { points, .. } => {
                for p in points {
                    p.x += dx;
                    p.y += dy;
                }
            }
            ObjectBody::Shape { start, end, .. } => {
                start.x += dx;
                start.y += dy;
                end.x += dx;
                end.y += dy;
            }
            ObjectBody::Text { origin, .. } => {
                origin.x += dx;
                origin.y += dy;
            }
            ObjectBody::BackgroundMarker { .. } => {}
        }
    }

    /// Validate and freeze the object into a record.
    ///
    /// # Errors
    ///
    /// Fails for strokes without samples or with a pressure list that does not
    /// match them, non-finite geometry or style, and
    /// a background flag that contradicts the body.
    pub fn to_record(&self) -> Result<ObjectRecord, DocError> {
        let finite = match &self.body {
            ObjectBody::Stroke { points, pressures, .. } => {
                if points.is_empty() || !(pressures.is_empty() || pressures.len() == points.len()) {
                    return Err(DocError::Incomplete(self.id));
                }
                points.iter().all(|p| p.is_finite()) && pressures.iter().all(|p| p.is_finite())
            }
            ObjectBody::Shape { start, end, arrowhead_size, .. } => {
                start.is_finite() && end.is_finite() && arrowhead_size.is_finite()
            }
            ObjectBody::Text { origin, font_size, .. } => origin.is_finite() && font_size.is_finite(),
            ObjectBody::BackgroundMarker { width, height } => width.is_finite() && height.is_finite(),
        };
        if !finite || !self.style.stroke_width.is_finite() || !self.style.opacity.is_finite() {
            return Err(DocError::NonFinite(self.id));
        }
        if self.is_background != matches!(self.body, ObjectBody::BackgroundMarker { .. }) {
            return Err(DocError::Inconsistent(self.id));
        }
        Ok(ObjectRecord(self.clone()))
    }
}

/// A validated, frozen serialization of one object.
///
/// History actions and snapshots hold records; re-instantiating one yields
/// an object equal in every field, including its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRecord(DrawableObject);

impl ObjectRecord {
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    #[must_use]
    pub fn object(&self) -> &DrawableObject {
        &self.0
    }

    #[must_use]
    pub fn into_object(self) -> DrawableObject {
        self.0
    }
}

/// Mutation notice raised by the store for the history engine.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// An object was inserted.
    Added { record: ObjectRecord },
    /// An object was deleted from draw-order slot `position`.
    Removed { record: ObjectRecord, position: usize },
    /// An object changed in place.
    Modified { before: ObjectRecord, after: ObjectRecord },
    /// A mutation happened but the object could not be serialized.
    Unrecorded { id: ObjectId, error: DocError },
}

/// In-memory store of drawable objects in draw order.
#[derive(Debug, Default)]
pub struct DocStore {
    objects: HashMap<ObjectId, DrawableObject>,
    order: Vec<ObjectId>,
    next_id: ObjectId,
    outbox: Vec<StoreEvent>,
    quiet: bool,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1, ..Self::default() }
    }

    /// Insert `obj` at the top of the draw order under a fresh id.
    pub fn add(&mut self, mut obj: DrawableObject) -> ObjectId {
        let id = self.mint_id();
        obj.id = id;
        self.order.push(id);
        let event = match obj.to_record() {
            Ok(record) => StoreEvent::Added { record },
            Err(error) => StoreEvent::Unrecorded { id, error },
        };
        self.objects.insert(id, obj);
        self.emit(event);
        id
    }

    /// Remove an object by id, returning it if it was present.
    pub fn remove(&mut self, id: ObjectId) -> Option<DrawableObject> {
        let position = self.position_of(id)?;
        let obj = self.objects.remove(&id)?;
        self.order.remove(position);
        let event = match obj.to_record() {
            Ok(record) => StoreEvent::Removed { record, position },
            Err(error) => StoreEvent::Unrecorded { id, error },
        };
        self.emit(event);
        Some(obj)
    }

    /// Apply `mutator` in place. Returns false if the object doesn't exist.
    ///
    /// The id survives whatever the mutator does to it. A mutation that
    /// leaves the object unchanged raises no event.
    pub fn modify(&mut self, id: ObjectId, mutator: impl FnOnce(&mut DrawableObject)) -> bool {
        let Some(obj) = self.objects.get_mut(&id) else {
            return false;
        };
        let before = obj.to_record();
        mutator(obj);
        obj.id = id;
        let event = match (before, obj.to_record()) {
            (Ok(before), Ok(after)) if before == after => None,
            (Ok(before), Ok(after)) => Some(StoreEvent::Modified { before, after }),
            (Err(error), _) | (_, Err(error)) => Some(StoreEvent::Unrecorded { id, error }),
        };
        if let Some(event) = event {
            self.emit(event);
        }
        true
    }

    /// Re-insert a record under its original id at draw-order `position`
    /// (clamped; `None` appends). Returns false if the id is already live.
    pub fn restore(&mut self, record: ObjectRecord, position: Option<usize>) -> bool {
        let id = record.id();
        if self.objects.contains_key(&id) {
            warn!(id, "restore skipped: id already live");
            return false;
        }
        self.next_id = self.next_id.max(id.saturating_add(1));
        let at = position.map_or(self.order.len(), |p| p.min(self.order.len()));
        self.order.insert(at, id);
        self.objects.insert(id, record.clone().into_object());
        self.emit(StoreEvent::Added { record });
        true
    }

    /// Return a reference to an object by id.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&DrawableObject> {
        self.objects.get(&id)
    }

    /// Draw-order slot of an object.
    #[must_use]
    pub fn position_of(&self, id: ObjectId) -> Option<usize> {
        self.order.iter().position(|o| *o == id)
    }

    /// Objects matching `predicate`, in draw order.
    pub fn query(&self, predicate: impl Fn(&DrawableObject) -> bool) -> Vec<&DrawableObject> {
        self.objects_in_order().filter(|o| predicate(o)).collect()
    }

    /// Every object, bottom-most first.
    pub fn objects_in_order(&self) -> impl Iterator<Item = &DrawableObject> {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    /// The page boundary marker, if initialized.
    #[must_use]
    pub fn background(&self) -> Option<&DrawableObject> {
        self.objects_in_order().find(|o| o.is_background)
    }

    /// Serialize every object in draw order.
    ///
    /// # Errors
    ///
    /// Fails on the first object that cannot be serialized.
    pub fn serialize_all(&self) -> Result<Vec<ObjectRecord>, DocError> {
        self.objects_in_order().map(DrawableObject::to_record).collect()
    }

    /// Replace all objects with a full snapshot. Raises no events.
    pub fn load_snapshot(&mut self, records: Vec<ObjectRecord>) {
        self.objects.clear();
        self.order.clear();
        for record in records {
            let obj = record.into_object();
            self.next_id = self.next_id.max(obj.id.saturating_add(1));
            if self.objects.contains_key(&obj.id) {
                warn!(id = obj.id, "duplicate id in snapshot; keeping first");
                continue;
            }
            self.order.push(obj.id);
            self.objects.insert(obj.id, obj);
        }
    }

    /// Run `f` with event emission suppressed, then restore the previous mode.
    pub fn quietly<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_quiet = std::mem::replace(&mut self.quiet, true);
        let out = f(self);
        self.quiet = was_quiet;
        out
    }

    /// Take every event raised since the last drain.
    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Number of objects currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the store contains no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn mint_id(&mut self) -> ObjectId {
        let id = self.next_id.max(1);
        self.next_id = id.saturating_add(1);
        id
    }

    fn emit(&mut self, event: StoreEvent) {
        if !self.quiet {
            self.outbox.push(event);
        }
    }
}
