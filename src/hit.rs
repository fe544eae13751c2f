#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::{Point, Rect};
use crate::consts::{TEXT_ADVANCE_RATIO, TEXT_LINE_HEIGHT};
use crate::doc::{DocStore, DrawableObject, ObjectBody, ObjectId};

/// World-space bounding box of an object, including half its stroke width.
///
/// Returns `None` for strokes without samples.
#[must_use]
pub fn bounds(obj: &DrawableObject) -> Option<Rect> {
    let half = obj.style.stroke_width.max(0.0) / 2.0;
    match &obj.body {
        ObjectBody::Stroke { points, .. } => Rect::bounding(points).map(|r| r.expand(half)),
        ObjectBody::Shape { start, end, arrowhead_size, .. } => {
            Some(Rect::from_corners(*start, *end).expand(half + arrowhead_size.max(0.0) / 2.0))
        }
        ObjectBody::Text { origin, content, font_size } => {
            let lines = content.lines().count().max(1);
            let widest = content.lines().map(|l| l.chars().count()).max().unwrap_or(0);
            #[allow(clippy::cast_precision_loss)]
            let (w, h) = (
                widest as f64 * font_size * TEXT_ADVANCE_RATIO,
                lines as f64 * font_size * TEXT_LINE_HEIGHT,
            );
            Some(Rect::from_corners(*origin, Point::new(origin.x + w, origin.y + h)))
        }
        ObjectBody::BackgroundMarker { width, height } => {
            Some(Rect::from_corners(Point::new(0.0, 0.0), Point::new(*width, *height)))
        }
    }
}

/// Whether `p` lands on `obj`, allowing `slop` extra world units.
#[must_use]
pub fn hit_test(obj: &DrawableObject, p: Point, slop: f64) -> bool {
    let reach = obj.style.stroke_width.max(0.0) / 2.0 + slop;
    match &obj.body {
        ObjectBody::Stroke { points, .. } => match points.as_slice() {
            [] => false,
            [only] => only.distance(p) <= reach,
            many => many.windows(2).any(|w| distance_to_segment(p, w[0], w[1]) <= reach),
        },
        ObjectBody::Shape { shape, start, end, .. } if shape.is_edge() => {
            distance_to_segment(p, *start, *end) <= reach
        }
        _ => bounds(obj).is_some_and(|r| r.expand(slop).contains(p)),
    }
}

/// Topmost selectable object under `p`. Background and eraser marks never
/// participate.
#[must_use]
pub fn topmost_at(doc: &DocStore, p: Point, slop: f64) -> Option<ObjectId> {
    doc.query(|o| is_hittable(o) && hit_test(o, p, slop)).last().map(|o| o.id)
}

/// Every erasable object under `p`, bottom-most first.
#[must_use]
pub fn objects_under(doc: &DocStore, p: Point, slop: f64) -> Vec<ObjectId> {
    doc.query(|o| is_hittable(o) && hit_test(o, p, slop)).into_iter().map(|o| o.id).collect()
}

/// Bottom edge of the lowest non-background object.
#[must_use]
pub fn lowest_content_bottom(doc: &DocStore) -> Option<f64> {
    doc.objects_in_order()
        .filter(|o| !o.is_background)
        .filter_map(bounds)
        .map(|r| r.max.y)
        .reduce(f64::max)
}

fn is_hittable(obj: &DrawableObject) -> bool {
    !obj.is_background && !obj.is_eraser_mark
}

/// Distance from `p` to the segment `a`–`b`.
#[must_use]
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}
