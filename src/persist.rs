//! Persisted document format.
//!
//! A document is the JSON object the host editor stores inline:
//! `{ width, height, objects, backgroundConfig }`. `objects` lists every
//! drawable object in draw order, the background marker included.
//! `backgroundConfig` is passed through untouched.
//!
//! Import is tolerant. It drops objects that cannot be validated, mints ids
//! for objects without one (or with a clashing or out-of-range one), and
//! guarantees exactly
//! one background marker sized to the page. Importing the same document
//! twice yields the same object set.

#[cfg(test)]
#[path = "persist_test.rs"]
mod persist_test;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consts::{MAX_OBJECT_ID, MIN_HEIGHT, PREVIEW_MIN_HEIGHT, PREVIEW_PADDING_BOTTOM};
use crate::doc::{DocError, DocStore, DrawableObject, ObjectBody, ObjectId, ObjectRecord};
use crate::hit::bounds;

/// Errors reading or writing a persisted document.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("malformed document JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid document: {0}")]
    Invalid(String),
    #[error(transparent)]
    Doc(#[from] DocError),
}

/// Serialized drawing as exchanged with the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDocument {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub objects: Vec<DrawableObject>,
    #[serde(default)]
    pub background_config: serde_json::Value,
}

/// A document after validation, ready to load into a store.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedDocument {
    pub width: f64,
    pub height: f64,
    /// Validated records in draw order; exactly one is the background marker.
    pub records: Vec<ObjectRecord>,
    pub background_config: serde_json::Value,
}

impl PersistedDocument {
    /// Parse a document.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Json`] for malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Render the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Capture the store as a document of the given page size.
    ///
    /// # Errors
    ///
    /// Fails if any object cannot be serialized.
    pub fn from_store(
        store: &DocStore,
        width: f64,
        height: f64,
        background_config: serde_json::Value,
    ) -> Result<Self, PersistError> {
        let objects = store.serialize_all()?.into_iter().map(ObjectRecord::into_object).collect();
        Ok(Self { width, height, objects, background_config })
    }

    /// Validate and normalize for loading.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Invalid`] when the page size is not a finite
    /// positive width and finite height, or when no id is left to mint.
    pub fn import(&self) -> Result<ImportedDocument, PersistError> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(PersistError::Invalid(format!("width {}", self.width)));
        }
        if !self.height.is_finite() {
            return Err(PersistError::Invalid(format!("height {}", self.height)));
        }
        let height = self.height.max(MIN_HEIGHT);

        let mut next_id: ObjectId =
            self.objects.iter().map(|o| o.id).filter(|id| *id <= MAX_OBJECT_ID).max().unwrap_or(0) + 1;
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut has_background = false;
        let mut records = Vec::with_capacity(self.objects.len() + 1);

        for obj in &self.objects {
            let mut obj = obj.clone();
            if obj.is_background {
                if has_background {
                    warn!(id = obj.id, "extra background marker dropped");
                    continue;
                }
                obj.body = ObjectBody::BackgroundMarker { width: self.width, height };
            }
            if obj.id > MAX_OBJECT_ID {
                warn!(id = obj.id, "object id out of range; renumbered");
                obj.id = 0;
            }
            if obj.id == 0 || !seen.insert(obj.id) {
                obj.id = mint(&mut next_id)?;
                seen.insert(obj.id);
            }
            match obj.to_record() {
                Ok(record) => {
                    has_background |= obj.is_background;
                    records.push(record);
                }
                Err(e) => warn!(id = obj.id, error = %e, "object dropped on import"),
            }
        }

        if !has_background {
            let mut marker = DrawableObject::background(self.width, height);
            marker.id = mint(&mut next_id)?;
            records.insert(0, marker.to_record()?);
        }

        Ok(ImportedDocument {
            width: self.width,
            height,
            records,
            background_config: self.background_config.clone(),
        })
    }

    /// Height of a tight preview of the document, or `None` if nothing
    /// visible is drawn.
    ///
    /// Background and eraser marks don't count as visible content.
    #[must_use]
    pub fn preview_height(&self) -> Option<f64> {
        self.objects
            .iter()
            .filter(|o| !o.is_background && !o.is_eraser_mark)
            .filter_map(bounds)
            .map(|r| r.max.y)
            .reduce(f64::max)
            .map(|bottom| (bottom + PREVIEW_PADDING_BOTTOM).max(PREVIEW_MIN_HEIGHT))
    }

    /// Object counts by kind, for summaries.
    #[must_use]
    pub fn census(&self) -> Census {
        let mut census = Census::default();
        for obj in &self.objects {
            match &obj.body {
                _ if obj.is_eraser_mark => census.eraser_marks += 1,
                ObjectBody::Stroke { .. } => census.strokes += 1,
                ObjectBody::Shape { .. } => census.shapes += 1,
                ObjectBody::Text { .. } => census.texts += 1,
                ObjectBody::BackgroundMarker { .. } => census.backgrounds += 1,
            }
        }
        census
    }
}

fn mint(next_id: &mut ObjectId) -> Result<ObjectId, PersistError> {
    let id = *next_id;
    if id > MAX_OBJECT_ID {
        return Err(PersistError::Invalid("object ids exhausted".to_owned()));
    }
    *next_id += 1;
    Ok(id)
}

/// Number of objects of each kind in a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Census {
    pub strokes: usize,
    pub shapes: usize,
    pub texts: usize,
    pub eraser_marks: usize,
    pub backgrounds: usize,
}
