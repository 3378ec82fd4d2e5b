//! PLL and multisynth divider solver.
//!
//! The output frequency of a Si5351 clock is `f0 * (a0 + b0/c0) / ((a1 + b1/c1) * r)` where the
//! first divider sets the PLL (VCO) frequency from the crystal and the second (the multisynth)
//! divides the PLL down to the output. Both fractional parts are limited to 20 bit denominators.
//! Each divider is solved as the nearest fraction with such a denominator.
use num_traits::float::FloatCore;

use crate::fraction::nearest_fraction;

/// Largest denominator of a fractional divider (20 bit field).
pub const MAX_DENOMINATOR: u64 = (1 << 20) - 1;

/// Fixed point scale used to express a real divider ratio as an integer fraction.
const SCALE: u64 = 1_000_000_000_000;

/// Largest admissible relative deviation of the achieved from the requested frequency.
///
/// Truncating two 20 bit fractional dividers is bounded well below this, so it only trips on an
/// internal inconsistency.
pub const MAX_RELATIVE_ERROR: f64 = 1e-6;

/// Largest multisynth ratio before the `R` divider has to help out.
const MAX_MULTISYNTH_RATIO: f64 = 2048.0;

/// Largest `R` output divider.
const MAX_R: u32 = 128;

/// A fractional divider `a + b/c`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Divider {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

/// Register encoding of a [Divider].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    /// 18 bit
    pub p1: u32,
    /// 20 bit
    pub p2: u32,
    /// 20 bit
    pub p3: u32,
}

impl Divider {
    /// Approximate a real ratio with the nearest admissible fraction.
    pub fn approximate(ratio: f64) -> Self {
        let (n, d, _) = nearest_fraction((ratio * SCALE as f64).round() as u64, SCALE, MAX_DENOMINATOR);
        Self {
            a: (n / d) as u32,
            b: (n % d) as u32,
            c: d as u32,
        }
    }

    /// The division ratio.
    pub fn ratio(&self) -> f64 {
        self.a as f64 + self.b as f64 / self.c as f64
    }

    /// Whether the divider can run in integer mode.
    pub fn is_integer(&self) -> bool {
        self.b == 0
    }

    /// Encode into the chip's `P1`, `P2`, `P3` parameters (AN619).
    pub fn params(&self) -> Params {
        let (a, b, c) = (self.a as u64, self.b as u64, self.c as u64);
        let frac = 128 * b / c;
        Params {
            p1: (128 * a + frac).saturating_sub(512) as u32,
            p2: (128 * b - c * frac) as u32,
            p3: c as u32,
        }
    }
}

/// Errors rejecting a synthesizer configuration.
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Reference frequency {0} Hz outside 10..27 MHz")]
    Reference(f64),
    #[error("Output frequency {0} Hz above 200 MHz")]
    OutputTooHigh(f64),
    #[error("PLL frequency {0} Hz outside 600..900 MHz")]
    Pll(f64),
    #[error("Feedback ratio {0} outside 15..90")]
    FeedbackRatio(f64),
    #[error("Multisynth ratio {0} too small")]
    MultisynthRatio(f64),
    #[error("Output divider ratio {0} too big, output frequency too low")]
    OutputTooLow(f64),
    #[error("Frequency error {0} Hz out of range")]
    FrequencyError(f64),
}

/// Divider settings producing one output frequency.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    /// Reference (crystal) frequency in Hz.
    pub f0: f64,
    /// PLL frequency in Hz.
    pub pll: f64,
    /// Achieved output frequency in Hz.
    pub f: f64,
    /// PLL feedback divider.
    pub feedback: Divider,
    /// Output multisynth divider.
    pub output: Divider,
    /// Additional power of two output divider.
    pub r: u32,
    /// Requested minus achieved output frequency in Hz.
    pub eps: f64,
}

fn near(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

impl Config {
    /// Compute the divider settings for an output frequency.
    ///
    /// # Args
    /// * `f0` - Reference frequency in Hz, 10 to 27 MHz.
    /// * `pll` - PLL frequency hint in Hz, 600 to 900 MHz, or `0` to pick one. Ignored at and
    ///   above 100 MHz where the PLL runs at an integer multiple of the output.
    /// * `f` - Output frequency in Hz, at most 200 MHz.
    pub fn new(f0: f64, pll: f64, f: f64) -> Result<Self, ConfigError> {
        if !(10e6..=27e6).contains(&f0) {
            return Err(ConfigError::Reference(f0));
        }
        if f > 200e6 {
            return Err(ConfigError::OutputTooHigh(f));
        }
        if !(f > 0.0) {
            return Err(ConfigError::OutputTooLow(f));
        }

        let pll = if f > 150e6 {
            4.0 * f
        } else if f >= 100e6 {
            6.0 * f
        } else if pll == 0.0 {
            if f < 5e6 {
                600e6
            } else {
                800e6
            }
        } else if (600e6..=900e6).contains(&pll) {
            pll
        } else {
            return Err(ConfigError::Pll(pll));
        };

        let z = pll / f0;
        if !(15.0..=90.0).contains(&z) {
            return Err(ConfigError::FeedbackRatio(z));
        }
        let feedback = Divider::approximate(z);

        // Multisynth ratio for the PLL frequency actually achieved.
        let z = f0 * feedback.ratio() / f;
        if !near(z, 4.0, 1e-9) && !near(z, 6.0, 1e-9) && z < 8.0 {
            return Err(ConfigError::MultisynthRatio(z));
        }

        let mut r = 1;
        while z / r as f64 > MAX_MULTISYNTH_RATIO && r <= MAX_R {
            r *= 2;
        }
        if r > MAX_R {
            return Err(ConfigError::OutputTooLow(z));
        }
        let output = Divider::approximate(z / r as f64);

        let achieved = f0 * feedback.ratio() / (output.ratio() * r as f64);
        let eps = f - achieved;
        if (eps / f).abs() > MAX_RELATIVE_ERROR {
            return Err(ConfigError::FrequencyError(eps));
        }

        Ok(Self {
            f0,
            pll: f0 * feedback.ratio(),
            f: achieved,
            feedback,
            output,
            r,
            eps,
        })
    }

    /// The requested output frequency.
    pub fn target(&self) -> f64 {
        self.f + self.eps
    }

    /// The `R` divider as its register field value (log2).
    pub fn r_div(&self) -> u8 {
        self.r.trailing_zeros() as u8
    }
}
