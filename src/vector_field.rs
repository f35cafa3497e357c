// src/vector_field.rs
// Per-sample magnitude and heading of a sampled 2D vector series, plus the rotation used to
// orient a glyph template (arrowhead) along each heading. Everything here is a pure transform.

use serde::Serialize;

/// Scale applied to velocity vectors when drawn from the moving point.
pub const VELOCITY_SCALE: f64 = 0.34;
/// Scale applied to acceleration vectors; accelerations are an order of magnitude larger.
pub const ACCELERATION_SCALE: f64 = 0.05;

/// Euclidean length of (vx, vy).
pub fn magnitude(vx: f64, vy: f64) -> f64 {
    vx.hypot(vy)
}

/// Angle from the +x axis, principal value in (-π, π].
pub fn heading(vx: f64, vy: f64) -> f64 {
    // atan2 returns -π for (negative, -0.0); fold the signed zero so the range stays half-open.
    let vy = if vy == 0.0 { 0.0 } else { vy };
    vy.atan2(vx)
}

/// Rotates (px, py) counter-clockwise by `angle` radians.
pub fn rotate(px: f64, py: f64, angle: f64) -> (f64, f64) {
    let (sin, cos) = angle.sin_cos();
    (px * cos - py * sin, px * sin + py * cos)
}

/// Magnitudes and headings of a sampled vector series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorField {
    pub magnitude: Vec<f64>,
    pub heading: Vec<f64>,
}

impl VectorField {
    /// Components must be index-aligned; the shorter slice bounds the result.
    pub fn from_components(xs: &[f64], ys: &[f64]) -> Self {
        let (magnitude, heading) = xs
            .iter()
            .zip(ys.iter())
            .map(|(&x, &y)| (self::magnitude(x, y), self::heading(x, y)))
            .unzip();
        Self { magnitude, heading }
    }

    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }
}

/// Small polyline in local coordinates, drawn with its +x axis along a vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Glyph {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

/// A glyph placed at the tip of a scaled vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedGlyph {
    pub tip: (f64, f64),
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl Default for Glyph {
    fn default() -> Self {
        Self::arrowhead()
    }
}

impl Glyph {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Self {
        Self { xs, ys }
    }

    /// Open arrowhead pointing along +x with its apex at the origin.
    pub fn arrowhead() -> Self {
        Self::new(vec![-0.25, 0.0, -0.25], vec![0.09, 0.0, -0.09])
    }

    /// Template rotated by `angle`, still in local coordinates.
    pub fn oriented(&self, angle: f64) -> Glyph {
        let (xs, ys) = self.xs.iter().zip(self.ys.iter()).map(|(&x, &y)| rotate(x, y, angle)).unzip();
        Glyph { xs, ys }
    }

    /// Anchors the oriented template at `base + scale * vector`.
    pub fn place_at(&self, base: (f64, f64), vector: (f64, f64), scale: f64) -> PlacedGlyph {
        let tip = (base.0 + scale * vector.0, base.1 + scale * vector.1);
        let oriented = self.oriented(heading(vector.0, vector.1));
        PlacedGlyph {
            tip,
            xs: oriented.xs.iter().map(|x| tip.0 + x).collect(),
            ys: oriented.ys.iter().map(|y| tip.1 + y).collect(),
        }
    }

    /// One placed glyph per sample.
    pub fn place_series(&self, xs: &[f64], ys: &[f64], vxs: &[f64], vys: &[f64], scale: f64) -> Vec<PlacedGlyph> {
        (0..xs.len().min(ys.len()).min(vxs.len()).min(vys.len()))
            .map(|i| self.place_at((xs[i], ys[i]), (vxs[i], vys[i]), scale))
            .collect()
    }
}
