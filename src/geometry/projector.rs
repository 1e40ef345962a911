use crate::foundation::core::{BezPath, Point, Vec2};
use crate::geometry::homography::Homography;
use serde::Serialize;

/// Length below which an edge has no usable direction.
pub const EDGE_EPSILON: f64 = 1e-6;

/// Project every point through `h`.
///
/// `None` when any single point fails to project: a shape is either fully defined or skipped.
pub fn project_points(points: &[Point], h: &Homography) -> Option<Vec<Point>> {
    points.iter().map(|&p| h.project(p)).collect()
}

/// A polygon in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectedPolygon {
    /// Vertices in drawing order.
    pub vertices: Vec<Point>,
}

impl ProjectedPolygon {
    /// Project `points` through `h`, `None` if any vertex is undefined.
    pub fn project(points: &[Point], h: &Homography) -> Option<Self> {
        project_points(points, h).map(|vertices| Self { vertices })
    }

    /// Closed outline suitable for stroking or filling.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut it = self.vertices.iter();
        if let Some(&first) = it.next() {
            path.move_to(first);
            for &p in it {
                path.line_to(p);
            }
            path.close_path();
        }
        path
    }

    /// Even-odd containment; points on an edge count as inside.
    pub fn contains(&self, p: Point) -> bool {
        let v = &self.vertices;
        if v.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = v.len() - 1;
        for i in 0..v.len() {
            let (a, b) = (v[j], v[i]);
            if on_segment(a, b, p) {
                return true;
            }
            if (b.y > p.y) != (a.y > p.y) {
                let x_cross = b.x + (p.y - b.y) * (a.x - b.x) / (a.y - b.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    let ab = b - a;
    let ap = p - a;
    if ab.cross(ap).abs() > EDGE_EPSILON * ab.hypot().max(1.0) {
        return false;
    }
    let t = ap.dot(ab);
    t >= 0.0 && t <= ab.hypot2()
}

/// Rendered violation line, parallel to the source edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CrossingLine {
    /// First endpoint in frame pixels.
    pub start: Point,
    /// Second endpoint in frame pixels.
    pub end: Point,
}

impl CrossingLine {
    /// Build a line from `p1 -> p2` shifted by `offset_px` along its left normal
    /// `(-d.y, d.x)` (right normal when `flip`).
    ///
    /// `None` when `|p2 - p1| < EDGE_EPSILON`.
    pub fn offset_from_edge(p1: Point, p2: Point, offset_px: f64, flip: bool) -> Option<Self> {
        let delta = p2 - p1;
        let len = delta.hypot();
        if !(len >= EDGE_EPSILON) {
            return None;
        }
        let d = delta / len;
        let mut n = Vec2::new(-d.y, d.x);
        if flip {
            n = -n;
        }
        let shift = n * offset_px;
        Some(Self {
            start: p1 + shift,
            end: p2 + shift,
        })
    }

    /// Line derived from the first edge of a projected boundary polygon.
    pub fn from_polygon(poly: &ProjectedPolygon, offset_px: f64, flip: bool) -> Option<Self> {
        match poly.vertices.as_slice() {
            [p1, p2, ..] => Self::offset_from_edge(*p1, *p2, offset_px, flip),
            _ => None,
        }
    }

    /// Project an explicit two-point crossing definition, then offset it.
    pub fn project_explicit(
        endpoints: [Point; 2],
        h: &Homography,
        offset_px: f64,
        flip: bool,
    ) -> Option<Self> {
        let p1 = h.project(endpoints[0])?;
        let p2 = h.project(endpoints[1])?;
        Self::offset_from_edge(p1, p2, offset_px, flip)
    }

    /// Segment as a two-point path.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        path.move_to(self.start);
        path.line_to(self.end);
        path
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/projector.rs"]
mod tests;
