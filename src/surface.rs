//! Surface model: the page rectangle strokes are confined to.
//!
//! The surface is `width` wide and grows downward one viewport-height step
//! at a time up to `max_height`. It never shrinks on its own; the engine only
//! re-derives it from the background marker after history reconstruction.
//! When the background is a raster image the surface is image-locked: its
//! height follows the image aspect ratio and extension is disabled.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use tracing::debug;

use crate::camera::{Point, Rect};
use crate::config::EngineConfig;
use crate::consts::{BOTTOM_PADDING, BOUNDARY_EPSILON, MIN_HEIGHT};

/// Logical page dimensions and growth limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    width: f64,
    height: f64,
    viewport_height: f64,
    max_height: f64,
    image_locked: bool,
}

impl Surface {
    /// A one-page surface.
    #[must_use]
    pub fn new(width: f64, viewport_height: f64, max_pages: u32) -> Self {
        let viewport_height = viewport_height.max(MIN_HEIGHT);
        Self {
            width,
            height: viewport_height,
            viewport_height,
            max_height: viewport_height * f64::from(max_pages.max(1)),
            image_locked: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.surface_width, config.viewport_height, config.max_pages)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    #[must_use]
    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    #[must_use]
    pub fn max_height(&self) -> f64 {
        self.max_height
    }

    #[must_use]
    pub fn is_image_locked(&self) -> bool {
        self.image_locked
    }

    /// The page rectangle anchored at the origin.
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::from_corners(Point::new(0.0, 0.0), Point::new(self.width, self.height))
    }

    /// True iff `p` lies on or inside the page edges.
    #[must_use]
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= 0.0 && p.x <= self.width && p.y >= 0.0 && p.y <= self.height
    }

    /// Where the segment from inside point `p1` to outside point `p2`
    /// leaves the page, pulled in by [`BOUNDARY_EPSILON`].
    ///
    /// Clips the segment parametrically against all four inset edges and
    /// takes the smallest exit parameter.
    #[must_use]
    pub fn clamp_segment_to_boundary(&self, p1: Point, p2: Point) -> Point {
        let inset = self.inset_rect();
        let (dx, dy) = (p2.x - p1.x, p2.y - p1.y);
        let mut t_exit: f64 = 1.0;
        let edges = [
            (dx, inset.min.x - p1.x),
            (dx, inset.max.x - p1.x),
            (dy, inset.min.y - p1.y),
            (dy, inset.max.y - p1.y),
        ];
        for (delta, gap) in edges {
            if delta == 0.0 {
                continue;
            }
            let t = gap / delta;
            if (0.0..=1.0).contains(&t) {
                t_exit = t_exit.min(t);
            }
        }
        self.clamp_point(Point::new(p1.x + dx * t_exit, p1.y + dy * t_exit))
    }

    /// Nearest point of the inset page rectangle.
    #[must_use]
    pub fn clamp_point(&self, p: Point) -> Point {
        let inset = self.inset_rect();
        Point::new(p.x.clamp(inset.min.x, inset.max.x), p.y.clamp(inset.min.y, inset.max.y))
    }

    /// Grow by `amount`, capped at `max_height`. Returns whether it grew.
    pub fn extend(&mut self, amount: f64) -> bool {
        if amount.is_nan() || amount <= 0.0 {
            debug!(amount, "surface extend ignored: non-positive amount");
            return false;
        }
        if self.image_locked || self.height >= self.max_height {
            return false;
        }
        self.height = (self.height + amount).min(self.max_height);
        debug!(height = self.height, "surface extended");
        true
    }

    /// Grow by one viewport-height step.
    pub fn extend_page(&mut self) -> bool {
        self.extend(self.viewport_height)
    }

    /// Grow in page steps until content ending at `bottom` plus
    /// [`BOTTOM_PADDING`] fits. Returns whether it grew.
    pub fn grow_to_fit(&mut self, bottom: f64) -> bool {
        let mut grew = false;
        while self.height < bottom + BOTTOM_PADDING && self.extend_page() {
            grew = true;
        }
        grew
    }

    /// Derive the height from a raster background of `image_width` by
    /// `image_height` pixels and freeze it.
    pub fn lock_to_image(&mut self, image_width: f64, image_height: f64) {
        if image_width.is_nan() || image_height.is_nan() || image_width <= 0.0 || image_height <= 0.0 {
            debug!(image_width, image_height, "image lock ignored: degenerate image");
            return;
        }
        self.height = (self.width * image_height / image_width).max(MIN_HEIGHT);
        self.image_locked = true;
    }

    /// Leave image-locked mode, keeping the current dimensions.
    pub fn unlock_image(&mut self) {
        self.image_locked = false;
    }

    /// Adopt dimensions from a persisted document or the background marker.
    pub fn resize_to(&mut self, width: f64, height: f64) {
        if width.is_finite() && width > 0.0 {
            self.width = width;
        }
        if height.is_finite() {
            self.height = height.max(MIN_HEIGHT);
            self.max_height = self.max_height.max(self.height);
        }
    }

    fn inset_rect(&self) -> Rect {
        let e = BOUNDARY_EPSILON.min(self.width / 2.0).min(self.height / 2.0);
        Rect::from_corners(Point::new(e, e), Point::new(self.width - e, self.height - e))
    }
}
