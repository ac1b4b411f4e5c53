//! Bowyer-Watson Delaunay triangulation in the plane.
//!
//! Incremental insertion into a super-triangle: each new point invalidates
//! the triangles whose circumcircle contains it, the cavity boundary is
//! re-triangulated around the point, and super-triangle remnants are
//! stripped at the end. Construction is sequential; the finished
//! triangulation is immutable and safe to share.

use tracing::debug;

use crate::error::{Result, TriangulationError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Twice the signed area of the triangle `a b c`; positive for CCW order.
fn orient(a: Point2, b: Point2, c: Point2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Whether `p` lies strictly inside the circumcircle of `a b c`.
fn in_circumcircle(a: Point2, b: Point2, c: Point2, p: Point2) -> bool {
    let d = 2.0 * orient(a, b, c);
    if d.abs() < f64::EPSILON {
        return false; // degenerate triangle owns no circumcircle
    }
    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let r2 = (a.x - ux).powi(2) + (a.y - uy).powi(2);
    let p2 = (p.x - ux).powi(2) + (p.y - uy).powi(2);
    p2 < r2 * (1.0 - 1e-12)
}

/// A finished Delaunay triangulation over a fixed point set.
#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<Point2>,
    /// Vertex index triples, CCW.
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    pub fn build(points: Vec<Point2>) -> Result<Self> {
        if points.len() < 3 {
            return Err(TriangulationError::degenerate(format!(
                "{} points, need at least 3",
                points.len()
            )));
        }
        if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(TriangulationError::invalid_coordinates(
                "non-finite point coordinate",
            ));
        }

        let n = points.len();
        let mut verts = points.clone();
        verts.extend(super_triangle(&points));
        let mut triangles: Vec<[usize; 3]> = vec![[n, n + 1, n + 2]];

        for p in 0..n {
            let point = verts[p];
            let mut bad = Vec::new();
            for (t, tri) in triangles.iter().enumerate() {
                if in_circumcircle(verts[tri[0]], verts[tri[1]], verts[tri[2]], point) {
                    bad.push(t);
                }
            }

            // Cavity boundary: edges belonging to exactly one bad triangle.
            let edges = |tri: [usize; 3]| [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])];
            let mut boundary: Vec<(usize, usize)> = Vec::new();
            for &t in &bad {
                for edge in edges(triangles[t]) {
                    let shared = bad.iter().any(|&u| {
                        u != t
                            && edges(triangles[u])
                                .iter()
                                .any(|&(a, b)| (a, b) == edge || (b, a) == edge)
                    });
                    if !shared {
                        boundary.push(edge);
                    }
                }
            }

            for &t in bad.iter().rev() {
                triangles.swap_remove(t);
            }
            for (a, b) in boundary {
                let tri = if orient(verts[a], verts[b], point) > 0.0 {
                    [a, b, p]
                } else {
                    [b, a, p]
                };
                triangles.push(tri);
            }
        }

        triangles.retain(|tri| tri.iter().all(|&v| v < n));
        if triangles.is_empty() {
            return Err(TriangulationError::degenerate(
                "all points are collinear",
            ));
        }
        debug!(points = n, triangles = triangles.len(), "triangulation built");
        Ok(Self { points, triangles })
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Barycentric weights of `p` in its containing triangle, or `None`
    /// when `p` is outside the convex hull.
    pub fn barycentric(&self, p: Point2) -> Option<[(usize, f64); 3]> {
        const TOL: f64 = 1e-9;
        for tri in &self.triangles {
            let (a, b, c) = (self.points[tri[0]], self.points[tri[1]], self.points[tri[2]]);
            let det = orient(a, b, c);
            if det.abs() < f64::EPSILON {
                continue;
            }
            let l0 = orient(p, b, c) / det;
            let l1 = orient(a, p, c) / det;
            let l2 = 1.0 - l0 - l1;
            if l0 >= -TOL && l1 >= -TOL && l2 >= -TOL {
                let (l0, l1, l2) = (l0.max(0.0), l1.max(0.0), l2.max(0.0));
                let sum = l0 + l1 + l2;
                return Some([
                    (tri[0], l0 / sum),
                    (tri[1], l1 / sum),
                    (tri[2], l2 / sum),
                ]);
            }
        }
        None
    }
}

/// A triangle comfortably enclosing every input point.
fn super_triangle(points: &[Point2]) -> [Point2; 3] {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let cx = 0.5 * (min_x + max_x);
    let cy = 0.5 * (min_y + max_y);
    [
        Point2::new(cx - 20.0 * span, cy - 10.0 * span),
        Point2::new(cx + 20.0 * span, cy - 10.0 * span),
        Point2::new(cx, cy + 20.0 * span),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_degenerate_layouts() {
        assert!(Triangulation::build(vec![Point2::new(0.0, 0.0)]).is_err());
        let collinear: Vec<Point2> = (0..5).map(|i| Point2::new(i as f64, 2.0)).collect();
        assert!(Triangulation::build(collinear).is_err());
        assert!(Triangulation::build(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, f64::NAN),
            Point2::new(0.0, 1.0),
        ])
        .is_err());
    }

    #[test]
    fn test_single_triangle() {
        let t = Triangulation::build(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ])
        .unwrap();
        assert_eq!(t.triangles().len(), 1);
    }

    #[test]
    fn test_square_splits_into_two_triangles() {
        let t = Triangulation::build(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ])
        .unwrap();
        assert_eq!(t.triangles().len(), 2);
    }

    #[test]
    fn test_delaunay_empty_circumcircles() {
        let points: Vec<Point2> = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.1),
            Point2::new(1.0, 1.7),
            Point2::new(3.1, 1.9),
            Point2::new(0.4, 2.8),
            Point2::new(2.2, 3.1),
        ];
        let t = Triangulation::build(points.clone()).unwrap();
        for tri in t.triangles() {
            for (i, p) in points.iter().enumerate() {
                if tri.contains(&i) {
                    continue;
                }
                assert!(
                    !in_circumcircle(points[tri[0]], points[tri[1]], points[tri[2]], *p),
                    "point {i} inside circumcircle of {tri:?}"
                );
            }
        }
    }

    #[test]
    fn test_barycentric_recovers_vertices_and_center() {
        let t = Triangulation::build(vec![
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 0.0),
            Point2::new(0.0, 3.0),
        ])
        .unwrap();
        let at_vertex = t.barycentric(Point2::new(0.0, 0.0)).unwrap();
        let w0 = at_vertex.iter().find(|(i, _)| *i == 0).unwrap().1;
        assert!((w0 - 1.0).abs() < 1e-9);

        let center = t.barycentric(Point2::new(1.0, 1.0)).unwrap();
        let sum: f64 = center.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        for (_, w) in center {
            assert!((w - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_barycentric_outside_hull() {
        let t = Triangulation::build(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ])
        .unwrap();
        assert!(t.barycentric(Point2::new(5.0, 5.0)).is_none());
    }
}
