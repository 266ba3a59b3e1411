// provider/mod.rs — External value-provider contracts
//
// Noise, curve, and image objects are collaborators the compiled program
// samples at runtime. The program stores reference-counted handles to them
// in per-type resource tables; providers must stay alive and immutable for
// as long as any program compiled against them is in use.
//
// Implementations must be internally synchronized (`Send + Sync`) — the
// evaluators may be driven from several threads at once, one scratch memory
// per thread.

pub mod curve;
pub mod image;
pub mod noise;

use crate::interval::Interval;
use serde_json::Value;
use std::sync::Arc;

pub use curve::BakedCurve;
pub use image::GrayImage;
pub use noise::SimplexNoise;

/// Coherent noise sampled by `Noise2D` / `Noise3D` opcodes.
///
/// Values are conventionally in `[-1, 1]` but the contract doesn't require
/// it; `range_2d` / `range_3d` must return a sound outer bound of the values
/// the sampler can produce over the given coordinate intervals.
pub trait NoiseSource: Send + Sync {
    fn sample_2d(&self, x: f32, y: f32) -> f32;
    fn sample_3d(&self, x: f32, y: f32, z: f32) -> f32;
    fn range_2d(&self, x: Interval, y: Interval) -> Interval;
    fn range_3d(&self, x: Interval, y: Interval, z: Interval) -> Interval;

    /// Deep copy, for duplicating a graph together with its subresources.
    fn duplicated(&self) -> Arc<dyn NoiseSource>;

    /// Serializable self-description for graph persistence. `None` means the
    /// provider cannot be persisted and must be re-attached after loading.
    fn to_spec(&self) -> Option<Value> {
        None
    }
}

/// 1D lookup sampled by the `Curve` opcode.
pub trait CurveSource: Send + Sync {
    fn sample(&self, x: f32) -> f32;

    /// Value range over the whole domain plus whether the curve is
    /// monotonically increasing. Computed once when the curve is baked; the
    /// compiler inlines the result into the instruction payload.
    fn bake_range(&self) -> (Interval, bool);

    fn duplicated(&self) -> Arc<dyn CurveSource>;

    fn to_spec(&self) -> Option<Value> {
        None
    }
}

/// 2D heightmap sampled by the `Image2D` opcode.
///
/// Coordinates wrap via non-negative modulo, so any integer pair is valid.
pub trait ImageSource: Send + Sync {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn pixel_red(&self, x: i32, y: i32) -> f32;

    /// Min/max over all pixels, computed once at construction.
    fn bake_range(&self) -> Interval;

    fn duplicated(&self) -> Arc<dyn ImageSource>;

    fn to_spec(&self) -> Option<Value> {
        None
    }
}
