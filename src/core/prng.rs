// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It is used only for initial phase draws and reproducible simulations.

use core::f64::consts::TAU;

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    /// Seed from wall-clock nanoseconds, for engines constructed without an
    /// explicit seed.
    #[cfg(feature = "std")]
    pub fn from_entropy() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E3779B97F4A7C15);
        Self::new(nanos)
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        // Marsaglia / Vigna family. Simple, fast, decent for simulation noise.
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform draw from [0, 1) with 53 bits of precision.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    #[inline]
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Gaussian draw via Box-Muller.
    pub fn next_gaussian(&mut self, mean: f64, sigma: f64) -> f64 {
        // u1 > 0 so the logarithm stays finite.
        let u1 = self.next_f64().max(f64::MIN_POSITIVE);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        mean + sigma * r * (TAU * u2).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_seeds_produce_equal_streams() {
        let mut a = Prng::new(7);
        let mut b = Prng::new(7);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn uniform_draws_stay_in_range() {
        let mut rng = Prng::new(11);
        for _ in 0..1000 {
            let v = rng.gen_range_f64(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&v), "draw {v} escaped [-2, 3)");
        }
    }

    #[test]
    fn gaussian_mean_is_roughly_centered() {
        let mut rng = Prng::new(13);
        let n = 4000;
        let sum: f64 = (0..n).map(|_| rng.next_gaussian(1.0, 0.5)).sum();
        let mean = sum / n as f64;
        assert!((mean - 1.0).abs() < 0.05, "sample mean {mean} far from 1.0");
    }
}
