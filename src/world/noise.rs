//! Seeded coherent noise
//!
//! Gradient noise in one and two dimensions plus fractal (fBm) and ridged
//! compositions. Everything here is a pure function of the seed and the
//! input coordinate: chunks that get evicted are regenerated from scratch, so
//! the same `(seed, x, y)` must always produce the same value.

use serde::{Deserialize, Serialize};

const LCG_MULTIPLIER: u64 = 6364136223846793005;
const LCG_INCREMENT: u64 = 1442695040888963407;

/// Offset between the seeds of two consecutive noise layers.
pub const LAYER_SEED_STRIDE: u64 = 1000;

/// 64-bit linear congruential generator used to shuffle permutation tables.
#[derive(Clone, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Lcg(seed)
    }

    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        // low bits of an LCG have short periods
        self.0 >> 33
    }

    fn next_below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

/// 256-entry permutation, doubled so lookups never need a second wrap.
#[derive(Clone)]
pub struct PermutationTable {
    perm: [u8; 512],
}

impl PermutationTable {
    pub fn new(seed: u64) -> Self {
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        let mut lcg = Lcg::new(seed);
        for i in (1..256).rev() {
            let j = lcg.next_below(i + 1);
            perm.swap(i, j);
        }

        for i in 0..256 {
            perm[256 + i] = perm[i];
        }

        PermutationTable { perm }
    }

    #[inline]
    fn hash(&self, i: i32) -> u8 {
        self.perm[(i & 255) as usize]
    }

    #[inline]
    fn hash2(&self, x: i32, y: i32) -> u8 {
        self.perm[self.hash(x) as usize + (y & 255) as usize]
    }
}

impl std::fmt::Debug for PermutationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermutationTable")
            .field("head", &&self.perm[..8])
            .finish_non_exhaustive()
    }
}

/// Upper bounds on octave counts.
///
/// Each octave is another full noise evaluation, and terrain generation
/// samples several bands per block, so the counts are capped. Requests above a
/// cap are clamped to it, never rejected. Raising a cap trades generation
/// time for finer detail; lowering it does the opposite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctaveLimits {
    pub fractal_1d: u32,
    pub fractal_2d: u32,
    pub ridged: u32,
}

impl OctaveLimits {
    pub const DEFAULT_FRACTAL_1D: u32 = 6;
    pub const DEFAULT_FRACTAL_2D: u32 = 3;
    pub const DEFAULT_RIDGED: u32 = 2;

    /// No capping beyond the hard ceiling.
    pub const UNCAPPED: OctaveLimits = OctaveLimits {
        fractal_1d: 16,
        fractal_2d: 16,
        ridged: 16,
    };

    #[inline]
    fn clamp(requested: u32, cap: u32) -> u32 {
        requested.clamp(1, cap.max(1))
    }
}

impl Default for OctaveLimits {
    fn default() -> Self {
        Self {
            fractal_1d: Self::DEFAULT_FRACTAL_1D,
            fractal_2d: Self::DEFAULT_FRACTAL_2D,
            ridged: Self::DEFAULT_RIDGED,
        }
    }
}

/// Decorrelated noise layers derived from one world seed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NoiseLayer {
    Continental,
    Terrain,
    Detail,
    Temperature,
    Humidity,
    Elevation,
    Tunnel,
    Cavern,
    CaveEntrance,
    Ore,
    Pocket,
    StoneVariant,
    Deep,
}

impl NoiseLayer {
    fn index(self) -> u64 {
        match self {
            NoiseLayer::Continental => 0,
            NoiseLayer::Terrain => 1,
            NoiseLayer::Detail => 2,
            NoiseLayer::Temperature => 3,
            NoiseLayer::Humidity => 4,
            NoiseLayer::Elevation => 5,
            NoiseLayer::Tunnel => 6,
            NoiseLayer::Cavern => 7,
            NoiseLayer::CaveEntrance => 8,
            NoiseLayer::Ore => 9,
            NoiseLayer::Pocket => 10,
            NoiseLayer::StoneVariant => 11,
            NoiseLayer::Deep => 12,
        }
    }

    /// `base + 1000 * k` for the k-th layer.
    pub fn seed(self, base: u64) -> u64 {
        base.wrapping_add(LAYER_SEED_STRIDE.wrapping_mul(self.index()))
    }
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

#[inline]
fn grad_1d(hash: u8, x: f64) -> f64 {
    let g = 1.0 + (hash & 7) as f64;
    let g = if hash & 8 != 0 { -g } else { g };
    g * x / 8.0
}

#[inline]
fn grad_2d(hash: u8, x: f64, y: f64) -> f64 {
    match hash & 7 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        3 => -x - y,
        4 => x,
        5 => -x,
        6 => y,
        _ => -y,
    }
}

/// Gradient noise generator for one seed.
#[derive(Clone, Debug)]
pub struct NoiseGenerator {
    seed: u64,
    perm: PermutationTable,
    limits: OctaveLimits,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        Self::with_limits(seed, OctaveLimits::default())
    }

    pub fn with_limits(seed: u64, limits: OctaveLimits) -> Self {
        NoiseGenerator {
            seed,
            perm: PermutationTable::new(seed),
            limits,
        }
    }

    /// Generator for one layer of a world seed.
    pub fn for_layer(base_seed: u64, layer: NoiseLayer, limits: OctaveLimits) -> Self {
        Self::with_limits(layer.seed(base_seed), limits)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn limits(&self) -> OctaveLimits {
        self.limits
    }

    /// 1D gradient noise in `[-1, 1]`.
    pub fn noise_1d(&self, x: f64) -> f64 {
        let x0 = x.floor();
        let i = x0 as i32;
        let f = x - x0;

        let n0 = grad_1d(self.perm.hash(i), f);
        let n1 = grad_1d(self.perm.hash(i.wrapping_add(1)), f - 1.0);

        // 1D gradient noise peaks at half the gradient magnitude
        (lerp(n0, n1, fade(f)) * 2.0).clamp(-1.0, 1.0)
    }

    /// 2D gradient noise in `[-1, 1]`.
    pub fn noise_2d(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let xi = x0 as i32;
        let yi = y0 as i32;
        let fx = x - x0;
        let fy = y - y0;

        let xi1 = xi.wrapping_add(1);
        let yi1 = yi.wrapping_add(1);

        let aa = grad_2d(self.perm.hash2(xi, yi), fx, fy);
        let ba = grad_2d(self.perm.hash2(xi1, yi), fx - 1.0, fy);
        let ab = grad_2d(self.perm.hash2(xi, yi1), fx, fy - 1.0);
        let bb = grad_2d(self.perm.hash2(xi1, yi1), fx - 1.0, fy - 1.0);

        let u = fade(fx);
        let v = fade(fy);
        lerp(lerp(aa, ba, u), lerp(ab, bb, u), v).clamp(-1.0, 1.0)
    }

    /// Fractal Brownian motion over `noise_1d`.
    ///
    /// Frequency doubles and amplitude is multiplied by `persistence` each
    /// octave; the sum is normalised by the cumulative octave weight and then
    /// scaled by `amplitude`, so the result lies in `[-amplitude, amplitude]`.
    /// `octaves` is clamped to `OctaveLimits::fractal_1d`.
    pub fn fractal_noise_1d(
        &self,
        x: f64,
        octaves: u32,
        frequency: f64,
        amplitude: f64,
        persistence: f64,
    ) -> f64 {
        let octaves = OctaveLimits::clamp(octaves, self.limits.fractal_1d);
        let mut total = 0.0;
        let mut weight = 1.0;
        let mut norm = 0.0;
        let mut freq = frequency;

        for _ in 0..octaves {
            total += self.noise_1d(x * freq) * weight;
            norm += weight;
            weight *= persistence;
            freq *= 2.0;
        }

        if norm == 0.0 {
            0.0
        } else {
            total / norm * amplitude
        }
    }

    /// 2D counterpart of [`fractal_noise_1d`](Self::fractal_noise_1d), capped by
    /// `OctaveLimits::fractal_2d`.
    pub fn fractal_noise_2d(
        &self,
        x: f64,
        y: f64,
        octaves: u32,
        frequency: f64,
        amplitude: f64,
        persistence: f64,
    ) -> f64 {
        let octaves = OctaveLimits::clamp(octaves, self.limits.fractal_2d);
        let mut total = 0.0;
        let mut weight = 1.0;
        let mut norm = 0.0;
        let mut freq = frequency;

        for _ in 0..octaves {
            total += self.noise_2d(x * freq, y * freq) * weight;
            norm += weight;
            weight *= persistence;
            freq *= 2.0;
        }

        if norm == 0.0 {
            0.0
        } else {
            total / norm * amplitude
        }
    }

    /// Ridged noise: each octave contributes `(1 - |n|)^2`, which peaks along
    /// the zero crossings of the base noise. Result in `[0, amplitude]`.
    pub fn ridged_noise_1d(
        &self,
        x: f64,
        octaves: u32,
        frequency: f64,
        amplitude: f64,
        persistence: f64,
    ) -> f64 {
        let octaves = OctaveLimits::clamp(octaves, self.limits.ridged);
        let mut total = 0.0;
        let mut weight = 1.0;
        let mut norm = 0.0;
        let mut freq = frequency;

        for _ in 0..octaves {
            let n = 1.0 - self.noise_1d(x * freq).abs();
            total += n * n * weight;
            norm += weight;
            weight *= persistence;
            freq *= 2.0;
        }

        if norm == 0.0 {
            0.0
        } else {
            total / norm * amplitude
        }
    }

    pub fn ridged_noise_2d(
        &self,
        x: f64,
        y: f64,
        octaves: u32,
        frequency: f64,
        amplitude: f64,
        persistence: f64,
    ) -> f64 {
        let octaves = OctaveLimits::clamp(octaves, self.limits.ridged);
        let mut total = 0.0;
        let mut weight = 1.0;
        let mut norm = 0.0;
        let mut freq = frequency;

        for _ in 0..octaves {
            let n = 1.0 - self.noise_2d(x * freq, y * freq).abs();
            total += n * n * weight;
            norm += weight;
            weight *= persistence;
            freq *= 2.0;
        }

        if norm == 0.0 {
            0.0
        } else {
            total / norm * amplitude
        }
    }
}
