//! Editing session: the context object tying every subsystem together.
//!
//! `EngineCore` owns the object store, the surface, the camera, the tool
//! table, the pointer router and the history log. The host feeds it pointer
//! events, timer ticks and commands; each call returns the [`Action`]s the
//! host should react to (re-render, show a text editor, change the cursor).
//!
//! No call on `EngineCore` fails. Internal errors are logged and the
//! operation degrades to a no-op. Only document loading and save
//! preparation return `Result`, since the host must know when those fail.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::autosave::SaveError;
use crate::background::BackgroundConfig;
use crate::camera::{Camera, Point, Rect};
use crate::config::EngineConfig;
use crate::consts::{AUTO_EXTEND_MARGIN, CANONICAL_PRESSURES, ERASER_RADIUS, MIN_SHAPE_SIZE};
use crate::doc::{BrushKind, DocStore, DrawableObject, ObjectBody, ObjectId, ShapeKind, Style};
use crate::history::{History, HistoryError};
use crate::hit::{lowest_content_bottom, objects_under, topmost_at};
use crate::input::PointerEvent;
use crate::persist::{PersistError, PersistedDocument};
use crate::router::{Gesture, PointerRouter, RouterContext};
use crate::surface::Surface;
use crate::tools::{EraserKind, Tool, ToolState};

/// Screen-space pick tolerance for the select and text tools.
const PICK_SLOP_PX: f64 = 4.0;

/// Actions returned from engine calls for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ObjectCreated(DrawableObject),
    ObjectUpdated { id: ObjectId },
    ObjectDeleted { id: ObjectId },
    /// Open a text editor. `id` is `None` for a new text block at `at`.
    EditTextRequested { id: Option<ObjectId>, at: Point, content: String },
    SetCursor(String),
    SurfaceResized { width: f64, height: f64 },
    HistoryChanged { can_undo: bool, can_redo: bool, dirty: bool },
    RenderNeeded,
}

/// An object under construction. Nothing is in the store until it commits.
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    Stroke {
        brush: BrushKind,
        points: Vec<Point>,
        /// One value per point for pressure-sensitive brushes on a pressure device, else empty.
        pressures: Vec<f64>,
        style: Style,
        eraser: bool,
        transient: bool,
    },
    Shape { kind: ShapeKind, start: Point, end: Point, arrowhead_size: f64, style: Style },
    /// Dragging an existing object with the select tool.
    Drag { id: ObjectId, last: Point },
    /// Object eraser sweep; objects are removed as it passes.
    ObjectErase { transient: bool },
}

impl Draft {
    fn is_transient(&self) -> bool {
        match self {
            Self::Stroke { transient, .. } | Self::ObjectErase { transient } => *transient,
            Self::Shape { .. } | Self::Drag { .. } => false,
        }
    }
}

/// Everything a save needs, captured at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    pub document: PersistedDocument,
    seq: u64,
    background_rev: u64,
}

/// Session state and logic, independent of any rendering host.
#[derive(Debug)]
pub struct EngineCore {
    pub doc: DocStore,
    pub surface: Surface,
    pub camera: Camera,
    pub tools: ToolState,
    router: PointerRouter,
    history: History,
    draft: Option<Draft>,
    /// Page as it was before the current draft grew it; growth is recorded on commit.
    provisional_page: Option<Surface>,
    selection: Option<ObjectId>,
    background_config: serde_json::Value,
    background_rev: u64,
    saved_background_rev: u64,
    config: EngineConfig,
    clock_ms: u64,
    last_extend_ms: Option<u64>,
    session_id: Uuid,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EngineCore {
    /// A blank one-page session.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let config = config.normalized();
        let surface = Surface::from_config(&config);
        let mut doc = DocStore::new();
        doc.quietly(|d| d.add(DrawableObject::background(surface.width(), surface.height())));
        let history = History::from_config(doc.serialize_all().unwrap_or_default(), &config);
        let mut tools = ToolState::new();
        tools.finger_drawing = config.finger_drawing;
        let session_id = Uuid::new_v4();
        info!(%session_id, width = surface.width(), height = surface.height(), "session started");
        Self {
            doc,
            surface,
            camera: Camera::default(),
            tools,
            router: PointerRouter::from_config(&config),
            history,
            draft: None,
            provisional_page: None,
            selection: None,
            background_config: serde_json::Value::Null,
            background_rev: 0,
            saved_background_rev: 0,
            config,
            clock_ms: 0,
            last_extend_ms: None,
            session_id,
        }
    }

    // --- Documents ---

    /// Replace the session with `document` and start a fresh history.
    ///
    /// Loading the same document twice yields an equal object set.
    ///
    /// # Errors
    ///
    /// Fails when the document's page size is unusable; the session is left
    /// as it was.
    pub fn load_document(&mut self, document: &PersistedDocument) -> Result<(), PersistError> {
        let imported = document.import()?;
        self.router.reset();
        self.draft = None;
        self.provisional_page = None;
        self.selection = None;
        self.surface = Surface::from_config(&self.config);
        self.surface.resize_to(imported.width, imported.height);
        self.doc = DocStore::new();
        self.doc.load_snapshot(imported.records.clone());
        self.history.reset(imported.records);
        self.background_config = imported.background_config;
        self.saved_background_rev = self.background_rev;
        self.last_extend_ms = None;
        info!(
            session_id = %self.session_id,
            objects = self.doc.len(),
            width = self.surface.width(),
            height = self.surface.height(),
            "document loaded"
        );
        Ok(())
    }

    /// Serialize the session.
    ///
    /// # Errors
    ///
    /// Fails if a live object cannot be serialized.
    pub fn to_document(&self) -> Result<PersistedDocument, PersistError> {
        PersistedDocument::from_store(
            &self.doc,
            self.surface.width(),
            self.surface.height(),
            self.background_config.clone(),
        )
    }

    /// Capture the document for a save, flushing debounced modifies first.
    ///
    /// # Errors
    ///
    /// Fails if a live object cannot be serialized.
    pub fn prepare_save(&mut self) -> Result<SaveTicket, PersistError> {
        self.history.flush_pending();
        let document = self.to_document()?;
        Ok(SaveTicket { document, seq: self.history.current_seq(), background_rev: self.background_rev })
    }

    /// Record the outcome of a save started with [`Self::prepare_save`].
    ///
    /// The saved marker only moves on success. Returns whether it moved.
    pub fn complete_save(&mut self, ticket: &SaveTicket, result: &Result<(), SaveError>) -> bool {
        match result {
            Ok(()) => {
                self.history.mark_saved(ticket.seq);
                self.saved_background_rev = ticket.background_rev;
                debug!(session_id = %self.session_id, seq = ticket.seq, "document saved");
                true
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "save failed; document stays dirty");
                false
            }
        }
    }

    // --- Input ---

    /// Route one pointer event.
    pub fn on_pointer(&mut self, ev: &PointerEvent) -> Vec<Action> {
        self.clock_ms = self.clock_ms.max(ev.time_ms);
        let ctx = RouterContext { camera: &self.camera, surface: &self.surface, tools: &self.tools };
        let gestures = self.router.handle(ev, ctx);
        let pressure = ev.pressure.filter(|_| ev.looks_like_pen());
        let mut actions = Vec::new();
        for gesture in gestures {
            self.apply_gesture(gesture, pressure, &mut actions);
        }
        actions
    }

    /// Advance the session clock, recording debounced modifies that settled.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Action> {
        self.clock_ms = self.clock_ms.max(now_ms);
        if self.history.tick(self.clock_ms) { vec![self.history_changed()] } else { Vec::new() }
    }

    fn apply_gesture(&mut self, gesture: Gesture, pressure: Option<f64>, actions: &mut Vec<Action>) {
        match gesture {
            Gesture::Begin { tool, world, transient } => self.begin(tool, world, transient, pressure, actions),
            Gesture::Extend { world } => self.extend_draft(world, pressure, actions),
            Gesture::End => self.commit_draft(actions),
            Gesture::Abort => self.abort_draft(actions),
            Gesture::Pan { dx, dy } => {
                self.camera.pan_by(dx, dy);
                actions.push(Action::RenderNeeded);
            }
            Gesture::Zoom { anchor, zoom } => {
                self.camera.zoom_about(anchor, zoom);
                actions.push(Action::RenderNeeded);
            }
        }
    }

    fn begin(&mut self, tool: Tool, world: Point, transient: bool, pressure: Option<f64>, actions: &mut Vec<Action>) {
        if transient {
            actions.push(Action::SetCursor(tool.cursor().to_owned()));
        }
        let settings = self.tools.settings_for(tool);
        self.draft = match tool {
            Tool::Select => {
                self.selection = topmost_at(&self.doc, world, self.camera.screen_dist_to_world(PICK_SLOP_PX));
                actions.push(Action::RenderNeeded);
                self.selection.map(|id| Draft::Drag { id, last: world })
            }
            Tool::Hand => None,
            Tool::Text => {
                actions.push(self.text_request(world));
                None
            }
            Tool::Brush(brush) => Some(Draft::Stroke {
                brush,
                points: vec![world],
                pressures: pressure.filter(|_| brush.is_pressure_sensitive()).map(clamp_pressure).into_iter().collect(),
                style: settings.style(),
                eraser: false,
                transient,
            }),
            Tool::Eraser(EraserKind::Pixel) => Some(Draft::Stroke {
                brush: BrushKind::Marker,
                points: vec![world],
                pressures: Vec::new(),
                style: settings.style(),
                eraser: true,
                transient,
            }),
            Tool::Eraser(EraserKind::Object) => {
                self.erase_at(world, actions);
                Some(Draft::ObjectErase { transient })
            }
            Tool::Shape(kind) => Some(Draft::Shape {
                kind,
                start: world,
                end: world,
                arrowhead_size: settings.arrowhead_size,
                style: settings.style(),
            }),
        };
        if matches!(self.draft, Some(Draft::Stroke { .. } | Draft::Shape { .. })) {
            self.extend_near_bottom(world, actions);
            actions.push(Action::RenderNeeded);
        }
    }

    fn text_request(&self, world: Point) -> Action {
        let slop = self.camera.screen_dist_to_world(PICK_SLOP_PX);
        let existing = topmost_at(&self.doc, world, slop).and_then(|id| self.doc.get(id));
        if let Some(DrawableObject { id, body: ObjectBody::Text { origin, content, .. }, .. }) = existing {
            return Action::EditTextRequested { id: Some(*id), at: *origin, content: content.clone() };
        }
        Action::EditTextRequested { id: None, at: world, content: String::new() }
    }

    fn extend_draft(&mut self, world: Point, pressure: Option<f64>, actions: &mut Vec<Action>) {
        match &mut self.draft {
            Some(Draft::Stroke { points, pressures, .. }) => {
                points.push(world);
                if let Some(&last) = pressures.last() {
                    pressures.push(pressure.map_or(last, clamp_pressure));
                }
                actions.push(Action::RenderNeeded);
            }
            Some(Draft::Shape { end, .. }) => {
                *end = self.surface.clamp_point(world);
                actions.push(Action::RenderNeeded);
            }
            Some(Draft::Drag { id, last }) => {
                let (id, dx, dy) = (*id, world.x - last.x, world.y - last.y);
                *last = world;
                if self.doc.modify(id, |o| o.translate(dx, dy)) {
                    self.sync_history();
                    actions.push(Action::ObjectUpdated { id });
                }
                return;
            }
            Some(Draft::ObjectErase { .. }) => {
                self.erase_at(world, actions);
                return;
            }
            None => return,
        }
        self.extend_near_bottom(world, actions);
    }

    fn commit_draft(&mut self, actions: &mut Vec<Action>) {
        let Some(draft) = self.draft.take() else {
            return;
        };
        if draft.is_transient() {
            actions.push(Action::SetCursor(self.tools.active().cursor().to_owned()));
        }
        let grown_from = self.provisional_page.take();
        let obj = match draft {
            Draft::Stroke { brush, points, pressures, style, eraser, .. } => {
                if eraser {
                    DrawableObject::eraser_mark(points, style.stroke_width)
                } else {
                    DrawableObject::stroke(brush, points, style).with_pressures(pressures)
                }
            }
            Draft::Shape { kind, start, end, arrowhead_size, style } => {
                let extent = Rect::from_corners(start, end);
                if extent.width().max(extent.height()) < MIN_SHAPE_SIZE {
                    debug!(?kind, "shape below minimum size discarded");
                    self.restore_page(grown_from, actions);
                    actions.push(Action::RenderNeeded);
                    return;
                }
                DrawableObject::shape(kind, start, end, arrowhead_size, style)
            }
            Draft::Drag { id, .. } => {
                debug!(id, "drag finished");
                actions.push(self.history_changed());
                return;
            }
            Draft::ObjectErase { .. } => return,
        };
        if grown_from.is_some() {
            self.record_snapshot();
        }
        self.add_object(obj, actions);
    }

    fn abort_draft(&mut self, actions: &mut Vec<Action>) {
        if let Some(draft) = self.draft.take() {
            debug!(session_id = %self.session_id, "draft discarded");
            if draft.is_transient() {
                actions.push(Action::SetCursor(self.tools.active().cursor().to_owned()));
            }
            let grown_from = self.provisional_page.take();
            self.restore_page(grown_from, actions);
            actions.push(Action::RenderNeeded);
        }
    }

    /// Undo live growth of a draft that produced nothing.
    fn restore_page(&mut self, grown_from: Option<Surface>, actions: &mut Vec<Action>) {
        let Some(before) = grown_from else {
            return;
        };
        self.surface = before;
        self.sync_marker();
        debug!(session_id = %self.session_id, height = self.surface.height(), "provisional page growth rolled back");
        actions.push(self.surface_resized());
    }

    fn erase_at(&mut self, world: Point, actions: &mut Vec<Action>) {
        let slop = self.camera.screen_dist_to_world(ERASER_RADIUS);
        let hits = objects_under(&self.doc, world, slop);
        if hits.is_empty() {
            return;
        }
        for id in hits {
            if self.doc.remove(id).is_some() {
                if self.selection == Some(id) {
                    self.selection = None;
                }
                actions.push(Action::ObjectDeleted { id });
            }
        }
        self.sync_history();
        actions.push(self.history_changed());
    }

    fn add_object(&mut self, obj: DrawableObject, actions: &mut Vec<Action>) {
        let id = self.doc.add(obj);
        self.sync_history();
        if let Some(created) = self.doc.get(id) {
            actions.push(Action::ObjectCreated(created.clone()));
        }
        self.fit_content(actions);
        actions.push(self.history_changed());
    }

    // --- Commands ---

    /// Step back one history entry.
    pub fn undo(&mut self) -> Vec<Action> {
        let mut actions = self.cancel_input();
        let result = self.history.undo(&mut self.doc);
        self.after_reconstruct("undo", result, &mut actions);
        actions
    }

    /// Step forward one history entry.
    pub fn redo(&mut self) -> Vec<Action> {
        let mut actions = self.cancel_input();
        let result = self.history.redo(&mut self.doc);
        self.after_reconstruct("redo", result, &mut actions);
        actions
    }

    fn after_reconstruct(&mut self, op: &str, result: Result<bool, HistoryError>, actions: &mut Vec<Action>) {
        match result {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                error!(session_id = %self.session_id, op, error = %e, "history step failed; state unchanged");
                return;
            }
        }
        if let Some(ObjectBody::BackgroundMarker { width, height }) = self.doc.background().map(|o| &o.body) {
            let (width, height) = (*width, *height);
            let before = self.surface.clone();
            self.surface.resize_to(width, height);
            if self.surface != before {
                actions.push(self.surface_resized());
            }
        }
        if self.selection.is_some_and(|id| self.doc.get(id).is_none()) {
            self.selection = None;
        }
        actions.push(Action::RenderNeeded);
        actions.push(self.history_changed());
    }

    /// Remove every object except the background, as one history entry.
    pub fn clear(&mut self) -> Vec<Action> {
        let mut actions = self.cancel_input();
        let ids: Vec<ObjectId> = self.doc.query(|o| !o.is_background).iter().map(|o| o.id).collect();
        if ids.is_empty() {
            return actions;
        }
        self.doc.quietly(|d| {
            for id in &ids {
                d.remove(*id);
            }
        });
        self.selection = None;
        self.record_snapshot();
        info!(session_id = %self.session_id, removed = ids.len(), "surface cleared");
        actions.extend(ids.into_iter().map(|id| Action::ObjectDeleted { id }));
        actions.push(self.history_changed());
        actions
    }

    /// Grow the page by one viewport height.
    pub fn extend_page(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.surface.extend_page() {
            self.after_resize(&mut actions);
        }
        actions
    }

    /// Switch the active tool. Any gesture in progress is discarded.
    pub fn set_tool(&mut self, tool: Tool) -> Vec<Action> {
        let mut actions = self.cancel_input();
        self.tools.set_tool(tool);
        if tool != Tool::Select && self.selection.take().is_some() {
            actions.push(Action::RenderNeeded);
        }
        actions.push(Action::SetCursor(tool.cursor().to_owned()));
        actions
    }

    pub fn select_brush(&mut self, kind: BrushKind) -> Vec<Action> {
        self.set_tool(Tool::Brush(kind))
    }

    pub fn select_eraser(&mut self, kind: EraserKind) -> Vec<Action> {
        self.set_tool(Tool::Eraser(kind))
    }

    /// Delete the selected object.
    pub fn delete_selected(&mut self) -> Vec<Action> {
        let Some(id) = self.selection.take() else {
            return Vec::new();
        };
        if self.doc.remove(id).is_none() {
            return Vec::new();
        }
        self.sync_history();
        vec![Action::ObjectDeleted { id }, self.history_changed()]
    }

    /// Apply text typed into the host editor.
    ///
    /// With `id` the existing text block is updated, or removed when the
    /// content is blank. Without `id` a new block is placed at `at`.
    pub fn commit_text(&mut self, id: Option<ObjectId>, at: Point, content: String) -> Vec<Action> {
        let mut actions = Vec::new();
        let blank = content.trim().is_empty();
        let Some(id) = id else {
            if !blank {
                let settings = self.tools.settings_for(Tool::Text);
                let origin = self.surface.clamp_point(at);
                self.add_object(DrawableObject::text(origin, content, settings.size, settings.style()), &mut actions);
            }
            return actions;
        };
        if !matches!(self.doc.get(id).map(|o| &o.body), Some(ObjectBody::Text { .. })) {
            warn!(id, "text commit for unknown text object ignored");
            return actions;
        }
        if blank {
            self.doc.remove(id);
            self.sync_history();
            actions.push(Action::ObjectDeleted { id });
        } else {
            self.doc.modify(id, |o| {
                if let ObjectBody::Text { content: current, .. } = &mut o.body {
                    *current = content;
                }
            });
            self.sync_history();
            self.history.flush_pending();
            actions.push(Action::ObjectUpdated { id });
            self.fit_content(&mut actions);
        }
        actions.push(self.history_changed());
        actions
    }

    /// Replace the opaque background configuration.
    ///
    /// Leaving an image background unlocks the page size.
    pub fn set_background_config(&mut self, config: serde_json::Value) -> Vec<Action> {
        if !BackgroundConfig::from_value(&config).is_image() && self.surface.is_image_locked() {
            self.surface.unlock_image();
        }
        self.background_config = config;
        self.background_rev += 1;
        vec![Action::RenderNeeded, self.history_changed()]
    }

    /// Derive the page size from a raster background of the given pixel size.
    pub fn lock_to_image(&mut self, image_width: f64, image_height: f64) -> Vec<Action> {
        let before = self.surface.clone();
        self.surface.lock_to_image(image_width, image_height);
        let mut actions = Vec::new();
        if self.surface != before {
            self.after_resize(&mut actions);
        }
        actions
    }

    // --- Queries ---

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn selection(&self) -> Option<ObjectId> {
        self.selection
    }

    #[must_use]
    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    #[must_use]
    pub fn background_config(&self) -> &serde_json::Value {
        &self.background_config
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the session holds changes not yet saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.history.is_dirty() || self.background_rev != self.saved_background_rev
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Internals ---

    fn cancel_input(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        for gesture in self.router.reset() {
            self.apply_gesture(gesture, None, &mut actions);
        }
        actions
    }

    fn sync_history(&mut self) {
        for event in self.doc.drain_events() {
            self.history.record(event, self.clock_ms);
        }
    }

    fn record_snapshot(&mut self) {
        match self.doc.serialize_all() {
            Ok(state) => self.history.record_snapshot(state),
            Err(e) => warn!(session_id = %self.session_id, error = %e, "snapshot not recorded"),
        }
    }

    /// Grow the page until the lowest object fits.
    fn fit_content(&mut self, actions: &mut Vec<Action>) {
        let Some(bottom) = lowest_content_bottom(&self.doc) else {
            return;
        };
        if self.surface.grow_to_fit(bottom) {
            self.after_resize(actions);
        }
    }

    /// One page step when a live sample comes close to the bottom edge.
    ///
    /// The growth belongs to the draft: it reaches history only when the
    /// draft commits, and is rolled back if the draft is discarded.
    fn extend_near_bottom(&mut self, world: Point, actions: &mut Vec<Action>) {
        if world.y < self.surface.height() - AUTO_EXTEND_MARGIN {
            return;
        }
        let cooling = self
            .last_extend_ms
            .is_some_and(|at| self.clock_ms.saturating_sub(at) < self.config.extend_cooldown_ms);
        if cooling {
            return;
        }
        let before = self.surface.clone();
        if self.surface.extend_page() {
            self.last_extend_ms = Some(self.clock_ms);
            self.provisional_page.get_or_insert(before);
            self.sync_marker();
            debug!(session_id = %self.session_id, height = self.surface.height(), "page extended while drawing");
            actions.push(self.surface_resized());
        }
    }

    /// Resize the background marker to the page and record the change.
    fn after_resize(&mut self, actions: &mut Vec<Action>) {
        self.sync_marker();
        self.record_snapshot();
        self.provisional_page = None;
        let (width, height) = (self.surface.width(), self.surface.height());
        debug!(session_id = %self.session_id, width, height, "page resized");
        actions.push(self.surface_resized());
        actions.push(self.history_changed());
    }

    /// Quietly size the background marker to the page.
    fn sync_marker(&mut self) {
        let (width, height) = (self.surface.width(), self.surface.height());
        if let Some(id) = self.doc.background().map(|o| o.id) {
            self.doc.quietly(|d| d.modify(id, |o| o.body = ObjectBody::BackgroundMarker { width, height }));
        }
    }

    fn surface_resized(&self) -> Action {
        Action::SurfaceResized { width: self.surface.width(), height: self.surface.height() }
    }

    fn history_changed(&self) -> Action {
        Action::HistoryChanged { can_undo: self.can_undo(), can_redo: self.can_redo(), dirty: self.is_dirty() }
    }
}

fn clamp_pressure(pressure: f64) -> f64 {
    if pressure.is_finite() { pressure.clamp(0.0, 1.0) } else { CANONICAL_PRESSURES[0] }
}
