// provider/noise.rs — Simplex noise provider
//
// Seeded 2D/3D simplex noise with optional fBM octaves. The permutation
// table is built once per instance from a Mulberry32 stream, so the same
// seed always produces the same field.

use crate::interval::Interval;
use crate::provider::NoiseSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

// ── Gradient vectors ────────────────────────────────────────────────

// 2D: 8 directions (cardinal + diagonal, unnormalized)
const GRAD2: [[f32; 2]; 8] = [
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [-1.0, -1.0],
];

// 3D: 12 directions (edges of a cube)
const GRAD3: [[f32; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

// ── Mulberry32 PRNG ─────────────────────────────────────────────────

/// Small deterministic PRNG used to shuffle the permutation table.
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: i32) -> Self {
        Self { state: seed as u32 }
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b79f5);
        let mut t: u32 = (self.state ^ (self.state >> 15)).wrapping_mul(1 | self.state);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        ((t ^ (t >> 14)) as f64) / 4294967296.0
    }
}

// ── Permutation table ───────────────────────────────────────────────

/// 512-entry permutation table: a Fisher-Yates-shuffled identity over
/// [0..255], doubled to avoid modular arithmetic in the lookups.
pub fn build_perm_table(seed: i32) -> [u8; 512] {
    let mut rng = Mulberry32::new(seed);
    let mut perm = [0u8; 512];

    for i in 0..256u16 {
        perm[i as usize] = i as u8;
    }

    for i in (1..=255usize).rev() {
        let j = (rng.next_f64() * (i as f64 + 1.0)).floor() as usize;
        perm.swap(i, j);
    }

    for i in 0..256 {
        perm[i + 256] = perm[i];
    }

    perm
}

// ── Raw simplex kernels ─────────────────────────────────────────────

// Skew/unskew constants
const F2: f32 = 0.36602540378; // (sqrt(3) - 1) / 2
const G2: f32 = 0.21132486540; // (3 - sqrt(3)) / 6
const F3: f32 = 1.0 / 3.0;
const G3: f32 = 1.0 / 6.0;

/// 2D simplex noise, approximately in `[-1, 1]`.
pub fn simplex_2d(perm: &[u8; 512], x: f32, y: f32) -> f32 {
    // Skew input to simplex cell coordinates
    let s = (x + y) * F2;
    let i = (x + s).floor() as i64;
    let j = (y + s).floor() as i64;

    // Unskew to find the cell origin in input space
    let t = (i + j) as f32 * G2;
    let x0 = x - (i as f32 - t);
    let y0 = y - (j as f32 - t);

    // Which triangle of the cell
    let (i1, j1) = if x0 > y0 { (1i64, 0i64) } else { (0i64, 1i64) };

    let x1 = x0 - i1 as f32 + G2;
    let y1 = y0 - j1 as f32 + G2;
    let x2 = x0 - 1.0 + 2.0 * G2;
    let y2 = y0 - 1.0 + 2.0 * G2;

    let ii = (i & 255) as usize;
    let jj = (j & 255) as usize;
    let gi0 = (perm[ii + perm[jj] as usize] % 8) as usize;
    let gi1 = (perm[ii + i1 as usize + perm[jj + j1 as usize] as usize] % 8) as usize;
    let gi2 = (perm[ii + 1 + perm[jj + 1] as usize] % 8) as usize;

    let mut n = 0.0;

    let mut t0 = 0.5 - x0 * x0 - y0 * y0;
    if t0 >= 0.0 {
        t0 *= t0;
        n += t0 * t0 * (GRAD2[gi0][0] * x0 + GRAD2[gi0][1] * y0);
    }

    let mut t1 = 0.5 - x1 * x1 - y1 * y1;
    if t1 >= 0.0 {
        t1 *= t1;
        n += t1 * t1 * (GRAD2[gi1][0] * x1 + GRAD2[gi1][1] * y1);
    }

    let mut t2 = 0.5 - x2 * x2 - y2 * y2;
    if t2 >= 0.0 {
        t2 *= t2;
        n += t2 * t2 * (GRAD2[gi2][0] * x2 + GRAD2[gi2][1] * y2);
    }

    70.0 * n
}

/// 3D simplex noise, approximately in `[-1, 1]`.
pub fn simplex_3d(perm: &[u8; 512], x: f32, y: f32, z: f32) -> f32 {
    let s = (x + y + z) * F3;
    let i = (x + s).floor() as i64;
    let j = (y + s).floor() as i64;
    let k = (z + s).floor() as i64;

    let t = (i + j + k) as f32 * G3;
    let x0 = x - (i as f32 - t);
    let y0 = y - (j as f32 - t);
    let z0 = z - (k as f32 - t);

    // Which tetrahedron of the cell, by ranking x0/y0/z0
    let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
        if y0 >= z0 {
            (1, 0, 0, 1, 1, 0)
        } else if x0 >= z0 {
            (1, 0, 0, 1, 0, 1)
        } else {
            (0, 0, 1, 1, 0, 1)
        }
    } else if y0 < z0 {
        (0, 0, 1, 0, 1, 1)
    } else if x0 < z0 {
        (0, 1, 0, 0, 1, 1)
    } else {
        (0, 1, 0, 1, 1, 0)
    };

    let x1 = x0 - i1 as f32 + G3;
    let y1 = y0 - j1 as f32 + G3;
    let z1 = z0 - k1 as f32 + G3;
    let x2 = x0 - i2 as f32 + 2.0 * G3;
    let y2 = y0 - j2 as f32 + 2.0 * G3;
    let z2 = z0 - k2 as f32 + 2.0 * G3;
    let x3 = x0 - 1.0 + 3.0 * G3;
    let y3 = y0 - 1.0 + 3.0 * G3;
    let z3 = z0 - 1.0 + 3.0 * G3;

    let ii = (i & 255) as usize;
    let jj = (j & 255) as usize;
    let kk = (k & 255) as usize;
    let gi0 = (perm[ii + perm[jj + perm[kk] as usize] as usize] % 12) as usize;
    let gi1 = (perm[ii + i1 + perm[jj + j1 + perm[kk + k1] as usize] as usize] % 12) as usize;
    let gi2 = (perm[ii + i2 + perm[jj + j2 + perm[kk + k2] as usize] as usize] % 12) as usize;
    let gi3 = (perm[ii + 1 + perm[jj + 1 + perm[kk + 1] as usize] as usize] % 12) as usize;

    let mut n = 0.0;

    // Kernel radius 0.6 for 3D
    let mut t0 = 0.6 - x0 * x0 - y0 * y0 - z0 * z0;
    if t0 >= 0.0 {
        t0 *= t0;
        n += t0 * t0 * (GRAD3[gi0][0] * x0 + GRAD3[gi0][1] * y0 + GRAD3[gi0][2] * z0);
    }

    let mut t1 = 0.6 - x1 * x1 - y1 * y1 - z1 * z1;
    if t1 >= 0.0 {
        t1 *= t1;
        n += t1 * t1 * (GRAD3[gi1][0] * x1 + GRAD3[gi1][1] * y1 + GRAD3[gi1][2] * z1);
    }

    let mut t2 = 0.6 - x2 * x2 - y2 * y2 - z2 * z2;
    if t2 >= 0.0 {
        t2 *= t2;
        n += t2 * t2 * (GRAD3[gi2][0] * x2 + GRAD3[gi2][1] * y2 + GRAD3[gi2][2] * z2);
    }

    let mut t3 = 0.6 - x3 * x3 - y3 * y3 - z3 * z3;
    if t3 >= 0.0 {
        t3 *= t3;
        n += t3 * t3 * (GRAD3[gi3][0] * x3 + GRAD3[gi3][1] * y3 + GRAD3[gi3][2] * z3);
    }

    32.0 * n
}

// ── SimplexNoise provider ───────────────────────────────────────────

/// Seeded fractal simplex noise.
///
/// With `octaves > 1`, successive octaves multiply frequency by `lacunarity`
/// and amplitude by `gain`; the sum is normalized by the total amplitude so
/// output stays within `[-1, 1]` regardless of octave count.
#[derive(Serialize, Deserialize)]
pub struct SimplexNoise {
    pub seed: i32,
    pub frequency: f32,
    pub octaves: u32,
    pub lacunarity: f32,
    pub gain: f32,
    #[serde(skip, default = "default_perm")]
    perm: Box<[u8; 512]>,
}

fn default_perm() -> Box<[u8; 512]> {
    Box::new([0u8; 512])
}

impl SimplexNoise {
    pub fn new(seed: i32, frequency: f32) -> Self {
        Self::fractal(seed, frequency, 1, 2.0, 0.5)
    }

    pub fn fractal(seed: i32, frequency: f32, octaves: u32, lacunarity: f32, gain: f32) -> Self {
        SimplexNoise {
            seed,
            frequency,
            octaves: octaves.max(1),
            lacunarity,
            gain,
            perm: Box::new(build_perm_table(seed)),
        }
    }

    pub fn from_spec(spec: &Value) -> Option<Self> {
        let parsed: SimplexNoise = serde_json::from_value(spec.clone()).ok()?;
        // The perm table is derived state and is skipped by serde
        Some(Self::fractal(
            parsed.seed,
            parsed.frequency,
            parsed.octaves,
            parsed.lacunarity,
            parsed.gain,
        ))
    }

    /// Sum of normalized octave amplitudes: always 1 after normalization.
    fn amplitude_bound(&self) -> f32 {
        1.0
    }

    fn total_amplitude(&self) -> f32 {
        let mut total = 0.0;
        let mut amp = 1.0;
        for _ in 0..self.octaves {
            total += amp;
            amp *= self.gain;
        }
        if total == 0.0 {
            1.0
        } else {
            total
        }
    }
}

impl NoiseSource for SimplexNoise {
    fn sample_2d(&self, x: f32, y: f32) -> f32 {
        let mut sum = 0.0;
        let mut amp = 1.0;
        let mut f = self.frequency;
        for _ in 0..self.octaves {
            sum += simplex_2d(&self.perm, x * f, y * f) * amp;
            f *= self.lacunarity;
            amp *= self.gain;
        }
        sum / self.total_amplitude()
    }

    fn sample_3d(&self, x: f32, y: f32, z: f32) -> f32 {
        let mut sum = 0.0;
        let mut amp = 1.0;
        let mut f = self.frequency;
        for _ in 0..self.octaves {
            sum += simplex_3d(&self.perm, x * f, y * f, z * f) * amp;
            f *= self.lacunarity;
            amp *= self.gain;
        }
        sum / self.total_amplitude()
    }

    fn range_2d(&self, x: Interval, y: Interval) -> Interval {
        if x.is_single_value() && y.is_single_value() {
            return Interval::from_single_value(self.sample_2d(x.lo, y.lo));
        }
        let a = self.amplitude_bound();
        Interval::new(-a, a)
    }

    fn range_3d(&self, x: Interval, y: Interval, z: Interval) -> Interval {
        if x.is_single_value() && y.is_single_value() && z.is_single_value() {
            return Interval::from_single_value(self.sample_3d(x.lo, y.lo, z.lo));
        }
        let a = self.amplitude_bound();
        Interval::new(-a, a)
    }

    fn duplicated(&self) -> Arc<dyn NoiseSource> {
        Arc::new(SimplexNoise::fractal(
            self.seed,
            self.frequency,
            self.octaves,
            self.lacunarity,
            self.gain,
        ))
    }

    fn to_spec(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }
}
