//! Dart-throwing Monte-Carlo kernel used by the `throw_darts` worker.
//!
//! Darts land uniformly in the square [-1, 1]^2; the unit disc inside it gives
//! pi, the radial histogram gives g(r), which is flat at 1 for uniform darts.

use crate::stats::format_g;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const SQUARE_AREA: f64 = 4.0;
const STREAM_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

pub struct Target {
    rng: StdRng,
    /// `nbins` shells inside the disc, the last slot counts misses.
    counts: Vec<u64>,
    bin_width: f64,
}

impl Target {
    /// Each (seed, stream) pair gets its own independent sequence.
    pub fn new(seed: u64, stream: u64, nbins: usize) -> Self {
        let nbins = nbins.max(1);
        Self {
            rng: StdRng::seed_from_u64(seed ^ stream.wrapping_add(1).wrapping_mul(STREAM_MIX)),
            counts: vec![0; nbins + 1],
            bin_width: 1.0 / nbins as f64,
        }
    }

    pub fn nbins(&self) -> usize {
        self.counts.len() - 1
    }

    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    pub fn throw(&mut self, n: u64) {
        let nbins = self.nbins();
        for _ in 0..n {
            let x: f64 = self.rng.gen_range(-1.0..1.0);
            let y: f64 = self.rng.gen_range(-1.0..1.0);
            let r2 = x * x + y * y;
            let bin = if r2 < 1.0 {
                ((r2.sqrt() / self.bin_width) as usize).min(nbins - 1)
            } else {
                nbins
            };
            self.counts[bin] += 1;
        }
    }

    pub fn thrown(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn pi_estimate(&self) -> f64 {
        let total = self.thrown();
        if total == 0 {
            return 0.0;
        }
        let inside: u64 = self.counts[..self.nbins()].iter().sum();
        SQUARE_AREA * inside as f64 / total as f64
    }

    /// `(label, g)` per shell; the label encodes the shell midpoint.
    pub fn gr_records(&self) -> Vec<(String, f64)> {
        let norm = self.thrown().max(1) as f64;
        let delg = self.bin_width;
        (0..self.nbins())
            .map(|ig| {
                let r = delg * (ig as f64 + 0.5);
                let k = ig as f64;
                let shell_area = PI * ((k + 1.0) * (k + 1.0) - k * k) * delg * delg;
                let g = self.counts[ig] as f64 * SQUARE_AREA / (norm * shell_area);
                (format!("gr__{}", format_g(r)), g)
            })
            .collect()
    }
}

/// Parse a throw count, accepting `10^6` style powers.
pub fn parse_count(raw: &str) -> Result<u64, String> {
    let raw = raw.trim();
    match raw.split_once('^') {
        Some((base, exp)) => {
            let base: u64 = base
                .trim()
                .parse()
                .map_err(|e| format!("bad base in '{}': {}", raw, e))?;
            let exp: u32 = exp
                .trim()
                .parse()
                .map_err(|e| format!("bad exponent in '{}': {}", raw, e))?;
            base.checked_pow(exp)
                .ok_or_else(|| format!("'{}' overflows", raw))
        }
        None => raw.parse().map_err(|e| format!("bad count '{}': {}", raw, e)),
    }
}
