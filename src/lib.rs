//! Paged handwriting surface: input routing, object store, and undo history.
//!
//! This crate is the engine behind a vertically paginated drawing surface
//! embedded in a note editor. It owns everything between raw pointer events
//! and the persisted document: classifying pointers (pen, touch, palm, barrel
//! button), turning accepted input into strokes and shapes clipped to the
//! page, recording every object mutation into an undo/redo log that mixes
//! deltas with full snapshots, and producing the JSON document the host
//! editor stores. Rendering is left to the host, which reacts to the
//! [`engine::Action`]s returned from each call.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Session context ([`engine::EngineCore`]) tying everything together |
//! | [`doc`] | Drawable object model and the in-memory store |
//! | [`history`] | Undo/redo log with snapshot + delta reconstruction |
//! | [`router`] | Pointer classification and the per-pointer state machine |
//! | [`input`] | Pointer event types and router state |
//! | [`tools`] | Active tool and per-tool remembered settings |
//! | [`surface`] | Page dimensions, containment and boundary clipping |
//! | [`camera`] | Points, rectangles and pan/zoom conversions |
//! | [`hit`] | Object bounds and hit-testing |
//! | [`background`] | Typed view over the opaque paper background config |
//! | [`persist`] | Persisted document format and preview bounds |
//! | [`autosave`] | Save collaborator trait and the periodic autosave task |
//! | [`config`] | Runtime tuning knobs |
//! | [`consts`] | Shared numeric constants |

pub mod autosave;
pub mod background;
pub mod camera;
pub mod config;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod history;
pub mod hit;
pub mod input;
pub mod persist;
pub mod router;
pub mod surface;
pub mod tools;
