//! 2D polyline geometry with stationing.
//!
//! Pipe-run geometry and topology curves are polylines whose segments are
//! straight lines or circular arcs (DXF-style bulge encoding: the bulge is
//! the tangent of a quarter of the included angle, positive = CCW). All
//! positions are plain `[f64; 2]` arrays.
//!
//! A *station* is the 1D arc-length coordinate measured along a curve from
//! its start vertex.

use serde::{Deserialize, Serialize};

pub type Point2 = [f64; 2];

#[inline]
pub fn dist(a: Point2, b: Point2) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

#[inline]
fn is_zero_bulge(b: &f64) -> bool {
    b.abs() < 1e-12
}

/// A polyline vertex. The bulge describes the segment *leaving* this vertex
/// toward the next one; the last vertex's bulge is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point2,
    #[serde(default, skip_serializing_if = "is_zero_bulge")]
    pub bulge: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            position: [x, y],
            bulge: 0.0,
        }
    }

    pub fn with_bulge(x: f64, y: f64, bulge: f64) -> Self {
        Self {
            position: [x, y],
            bulge,
        }
    }
}

/// Result of projecting a point onto a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Arc-length coordinate of the closest curve point.
    pub station: f64,
    /// Distance from the query point to the closest curve point.
    pub distance: f64,
    /// The closest curve point itself.
    pub point: Point2,
}

// ============================================================================
// Arc segment math (bulge encoding)
// ============================================================================

/// Circular arc between two points, derived from a bulge value.
#[derive(Debug, Clone, Copy)]
struct Arc {
    center: Point2,
    radius: f64,
    /// Angle of the start point as seen from the center.
    start_angle: f64,
    /// Signed included angle; positive = CCW.
    sweep: f64,
}

impl Arc {
    /// Bulge = tan(theta / 4) where theta is the signed included angle.
    fn from_bulge(a: Point2, b: Point2, bulge: f64) -> Option<Self> {
        let chord = dist(a, b);
        if chord < 1e-12 || bulge.abs() < 1e-12 {
            return None;
        }
        let sweep = 4.0 * bulge.atan();
        let radius = chord * (1.0 + bulge * bulge) / (4.0 * bulge.abs());
        let sagitta = bulge.abs() * chord / 2.0;

        // Center sits on the chord normal, offset (r - s) away from the
        // bulge peak side.
        let ux = (b[0] - a[0]) / chord;
        let uy = (b[1] - a[1]) / chord;
        let nx = -uy;
        let ny = ux;
        let mid = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
        let side = bulge.signum();
        let center = [
            mid[0] + nx * (radius - sagitta) * side,
            mid[1] + ny * (radius - sagitta) * side,
        ];
        let start_angle = (a[1] - center[1]).atan2(a[0] - center[0]);
        Some(Self {
            center,
            radius,
            start_angle,
            sweep,
        })
    }

    fn length(&self) -> f64 {
        self.radius * self.sweep.abs()
    }

    fn point_at_fraction(&self, t: f64) -> Point2 {
        let ang = self.start_angle + self.sweep * t;
        [
            self.center[0] + self.radius * ang.cos(),
            self.center[1] + self.radius * ang.sin(),
        ]
    }

    /// Closest point on the arc, as a fraction of the sweep in [0, 1].
    fn project_fraction(&self, p: Point2) -> f64 {
        let ang = (p[1] - self.center[1]).atan2(p[0] - self.center[0]);
        // Unwind the query angle into the sweep's direction from the start.
        let mut delta = ang - self.start_angle;
        let tau = std::f64::consts::TAU;
        if self.sweep >= 0.0 {
            while delta < 0.0 {
                delta += tau;
            }
        } else {
            while delta > 0.0 {
                delta -= tau;
            }
        }
        let t = delta / self.sweep;
        if t.is_finite() {
            t.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// One polyline segment: either a straight line or a bulged arc.
#[derive(Debug, Clone, Copy)]
pub enum Segment {
    Line { a: Point2, b: Point2 },
    Arc { a: Point2, b: Point2, bulge: f64 },
}

impl Segment {
    pub fn length(&self) -> f64 {
        match *self {
            Segment::Line { a, b } => dist(a, b),
            Segment::Arc { a, b, bulge } => match Arc::from_bulge(a, b, bulge) {
                Some(arc) => arc.length(),
                None => dist(a, b),
            },
        }
    }

    fn point_at(&self, local_station: f64) -> Point2 {
        let len = self.length();
        let t = if len > 0.0 {
            (local_station / len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        match *self {
            Segment::Line { a, b } => [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t],
            Segment::Arc { a, b, bulge } => match Arc::from_bulge(a, b, bulge) {
                Some(arc) => arc.point_at_fraction(t),
                None => [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t],
            },
        }
    }

    /// Closest point as (local station, distance, point).
    fn project(&self, p: Point2) -> (f64, f64, Point2) {
        match *self {
            Segment::Line { a, b } => {
                let abx = b[0] - a[0];
                let aby = b[1] - a[1];
                let len2 = abx * abx + aby * aby;
                let t = if len2 > 0.0 {
                    (((p[0] - a[0]) * abx + (p[1] - a[1]) * aby) / len2).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let q = [a[0] + abx * t, a[1] + aby * t];
                (t * len2.sqrt(), dist(p, q), q)
            }
            Segment::Arc { a, b, bulge } => match Arc::from_bulge(a, b, bulge) {
                Some(arc) => {
                    let t = arc.project_fraction(p);
                    let q = arc.point_at_fraction(t);
                    (t * arc.length(), dist(p, q), q)
                }
                None => Segment::Line { a, b }.project(p),
            },
        }
    }
}

// ============================================================================
// Polyline
// ============================================================================

/// An open polyline of line/arc segments with arc-length stationing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline {
    pub vertices: Vec<Vertex>,
}

impl Polyline {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    pub fn from_points(points: &[Point2]) -> Self {
        Self {
            vertices: points.iter().map(|p| Vertex::new(p[0], p[1])).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.len() < 2
    }

    pub fn start(&self) -> Option<Point2> {
        self.vertices.first().map(|v| v.position)
    }

    pub fn end(&self) -> Option<Point2> {
        self.vertices.last().map(|v| v.position)
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.vertices.windows(2).map(|w| {
            if is_zero_bulge(&w[0].bulge) {
                Segment::Line {
                    a: w[0].position,
                    b: w[1].position,
                }
            } else {
                Segment::Arc {
                    a: w[0].position,
                    b: w[1].position,
                    bulge: w[0].bulge,
                }
            }
        })
    }

    pub fn length(&self) -> f64 {
        self.segments().map(|s| s.length()).sum()
    }

    /// Point at the given station, clamped to the curve's extent.
    pub fn point_at(&self, station: f64) -> Option<Point2> {
        if self.is_empty() {
            return None;
        }
        if station <= 0.0 {
            return self.start();
        }
        let mut remaining = station;
        for seg in self.segments() {
            let len = seg.length();
            if remaining <= len {
                return Some(seg.point_at(remaining));
            }
            remaining -= len;
        }
        self.end()
    }

    /// Closest-point projection over all segments.
    pub fn project(&self, p: Point2) -> Option<Projection> {
        if self.is_empty() {
            return None;
        }
        let mut best: Option<Projection> = None;
        let mut base = 0.0;
        for seg in self.segments() {
            let (local, d, q) = seg.project(p);
            if best.as_ref().map_or(true, |b| d < b.distance) {
                best = Some(Projection {
                    station: base + local,
                    distance: d,
                    point: q,
                });
            }
            base += seg.length();
        }
        best
    }

    /// Distance from a point to the curve.
    pub fn distance_to(&self, p: Point2) -> Option<f64> {
        self.project(p).map(|pr| pr.distance)
    }

    /// Reverse orientation in place. Bulges flip sign and move to the new
    /// leading vertex of their segment.
    pub fn reverse(&mut self) {
        let n = self.vertices.len();
        if n < 2 {
            return;
        }
        let old = std::mem::take(&mut self.vertices);
        let mut rev = Vec::with_capacity(n);
        for j in 0..n {
            let src = &old[n - 1 - j];
            let bulge = if j < n - 1 { -old[n - 2 - j].bulge } else { 0.0 };
            rev.push(Vertex {
                position: src.position,
                bulge,
            });
        }
        self.vertices = rev;
    }

    pub fn push(&mut self, v: Vertex) {
        self.vertices.push(v);
    }

    /// Append another polyline's vertices, skipping a duplicated joint
    /// vertex when the pieces already touch.
    pub fn extend_with(&mut self, other: &Polyline, joint_tol: f64) {
        let mut iter = other.vertices.iter();
        if let (Some(last), Some(first)) = (self.vertices.last(), other.vertices.first()) {
            if dist(last.position, first.position) <= joint_tol {
                // Carry the incoming bulge onto the shared joint vertex.
                let bulge = first.bulge;
                let idx = self.vertices.len() - 1;
                self.vertices[idx].bulge = bulge;
                iter.next();
            }
        }
        self.vertices.extend(iter.copied());
    }
}
