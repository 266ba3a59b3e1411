// provider/curve.rs — Baked curve provider
//
// Control points are densely sampled through a Catmull-Rom spline once at
// construction (32 segments per span); runtime sampling is a binary search
// plus one lerp over the baked table. The value range and monotonicity are
// computed during the bake so the compiler can inline them into the
// instruction payload.

use crate::interval::Interval;
use crate::provider::CurveSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Samples per control-point span when baking.
const BAKE_SEGMENTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
}

// ── Catmull-Rom sampling ────────────────────────────────────────────

/// Densely sample a Catmull-Rom spline through sorted control points,
/// `segments` samples per span plus the final point.
fn catmull_rom_interpolate(pts: &[CurvePoint], segments: usize) -> Vec<CurvePoint> {
    if pts.len() < 2 {
        return pts.to_vec();
    }

    let n = pts.len();
    let mut result = Vec::with_capacity((n - 1) * segments + 1);

    for i in 0..n - 1 {
        let p0 = pts[if i > 0 { i - 1 } else { 0 }];
        let p1 = pts[i];
        let p2 = pts[i + 1];
        let p3 = pts[if i + 2 < n { i + 2 } else { n - 1 }];

        for s in 0..segments {
            let t = s as f32 / segments as f32;
            let t2 = t * t;
            let t3 = t2 * t;

            let x = 0.5
                * (2.0 * p1.x
                    + (-p0.x + p2.x) * t
                    + (2.0 * p0.x - 5.0 * p1.x + 4.0 * p2.x - p3.x) * t2
                    + (-p0.x + 3.0 * p1.x - 3.0 * p2.x + p3.x) * t3);

            let y = 0.5
                * (2.0 * p1.y
                    + (-p0.y + p2.y) * t
                    + (2.0 * p0.y - 5.0 * p1.y + 4.0 * p2.y - p3.y) * t2
                    + (-p0.y + 3.0 * p1.y - 3.0 * p2.y + p3.y) * t3);

            result.push(CurvePoint { x, y });
        }
    }

    result.push(pts[n - 1]);
    result
}

// ── BakedCurve provider ─────────────────────────────────────────────

/// A 1D curve baked from control points.
///
/// Inputs outside the control-point domain clamp to the nearest end.
pub struct BakedCurve {
    points: Vec<CurvePoint>,
    baked: Vec<CurvePoint>,
    range: Interval,
    monotonic_increasing: bool,
}

#[derive(Serialize, Deserialize)]
struct CurveSpec {
    points: Vec<CurvePoint>,
}

impl BakedCurve {
    /// Bake a curve from unsorted control points. Points are sorted by x
    /// first; fewer than two points degenerate to a constant (or identity
    /// for an empty list).
    pub fn from_points(mut points: Vec<CurvePoint>) -> Self {
        points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
        let baked = catmull_rom_interpolate(&points, BAKE_SEGMENTS);

        let mut range = Interval::from_single_value(baked.first().map(|p| p.y).unwrap_or(0.0));
        let mut monotonic = true;
        for w in baked.windows(2) {
            range = Interval::new(range.lo.min(w[1].y), range.hi.max(w[1].y));
            if w[1].y < w[0].y {
                monotonic = false;
            }
        }

        BakedCurve {
            points,
            baked,
            range,
            monotonic_increasing: monotonic,
        }
    }

    pub fn from_spec(spec: &Value) -> Option<Self> {
        let parsed: CurveSpec = serde_json::from_value(spec.clone()).ok()?;
        Some(Self::from_points(parsed.points))
    }

    pub fn control_points(&self) -> &[CurvePoint] {
        &self.points
    }
}

impl CurveSource for BakedCurve {
    fn sample(&self, x: f32) -> f32 {
        if self.baked.is_empty() {
            return x;
        }
        if self.baked.len() == 1 {
            return self.baked[0].y;
        }

        let x_min = self.points.first().map(|p| p.x).unwrap_or(0.0);
        let x_max = self.points.last().map(|p| p.x).unwrap_or(0.0);
        let clamped = x.max(x_min).min(x_max);

        let mut lo = 0usize;
        let mut hi = self.baked.len() - 1;
        while lo < hi.saturating_sub(1) {
            let mid = (lo + hi) >> 1;
            if self.baked[mid].x <= clamped {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let p0 = self.baked[lo];
        let p1 = self.baked[hi];
        let dx = p1.x - p0.x;
        let t = if dx == 0.0 { 0.0 } else { (clamped - p0.x) / dx };
        p0.y + (p1.y - p0.y) * t
    }

    fn bake_range(&self) -> (Interval, bool) {
        (self.range, self.monotonic_increasing)
    }

    fn duplicated(&self) -> Arc<dyn CurveSource> {
        Arc::new(BakedCurve::from_points(self.points.clone()))
    }

    fn to_spec(&self) -> Option<Value> {
        serde_json::to_value(CurveSpec {
            points: self.points.clone(),
        })
        .ok()
    }
}
