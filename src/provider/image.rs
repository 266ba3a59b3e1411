// provider/image.rs — Grayscale heightmap provider
//
// Owned f32 pixel grid sampled by the Image2D opcode. Lookups wrap through
// non-negative modulo, so the image tiles infinitely in both axes.

use crate::interval::Interval;
use crate::provider::ImageSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Single-channel image with its value range baked at construction.
#[derive(Serialize, Deserialize)]
pub struct GrayImage {
    width: i32,
    height: i32,
    pixels: Vec<f32>,
    #[serde(skip)]
    range: (f32, f32),
}

impl GrayImage {
    /// Build from row-major pixels. `pixels.len()` must equal
    /// `width * height` and both dimensions must be positive.
    pub fn from_pixels(width: i32, height: i32, pixels: Vec<f32>) -> Self {
        assert!(width > 0 && height > 0, "image dimensions must be positive");
        assert_eq!(pixels.len(), (width * height) as usize);

        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for &p in &pixels {
            lo = lo.min(p);
            hi = hi.max(p);
        }

        GrayImage {
            width,
            height,
            pixels,
            range: (lo, hi),
        }
    }

    /// Build by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: i32, height: i32, f: impl Fn(i32, i32) -> f32) -> Self {
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self::from_pixels(width, height, pixels)
    }

    pub fn from_spec(spec: &Value) -> Option<Self> {
        let parsed: GrayImage = serde_json::from_value(spec.clone()).ok()?;
        if parsed.width <= 0
            || parsed.height <= 0
            || parsed.pixels.len() != (parsed.width * parsed.height) as usize
        {
            return None;
        }
        Some(Self::from_pixels(parsed.width, parsed.height, parsed.pixels))
    }
}

impl ImageSource for GrayImage {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn pixel_red(&self, x: i32, y: i32) -> f32 {
        let wx = x.rem_euclid(self.width);
        let wy = y.rem_euclid(self.height);
        self.pixels[(wy * self.width + wx) as usize]
    }

    fn bake_range(&self) -> Interval {
        Interval::new(self.range.0, self.range.1)
    }

    fn duplicated(&self) -> Arc<dyn ImageSource> {
        Arc::new(GrayImage::from_pixels(
            self.width,
            self.height,
            self.pixels.clone(),
        ))
    }

    fn to_spec(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }
}
