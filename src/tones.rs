//! WSPR four tone frequency plan.
//!
//! Each WSPR symbol selects one of four tones spaced by 12000/8192 Hz. All four synthesizer
//! configurations are solved up front so that a tone change only writes registers.
use si5351::{Config, ConfigError};

/// Number of WSPR tones.
pub const TONES: usize = 4;

/// WSPR tone spacing in Hz.
pub const TONE_SPACING: f64 = 12000.0 / 8192.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plan {
    tones: [Config; TONES],
}

impl Plan {
    /// Solve the tones `base + n * spacing`.
    ///
    /// # Args
    /// * `f0` - Synthesizer reference frequency in Hz.
    /// * `base` - Frequency of symbol 0 in Hz.
    /// * `spacing` - Tone spacing in Hz.
    pub fn new(f0: f64, base: f64, spacing: f64) -> Result<Self, ConfigError> {
        let tone = |n: usize| Config::new(f0, 0.0, base + n as f64 * spacing);
        Ok(Self {
            tones: [tone(0)?, tone(1)?, tone(2)?, tone(3)?],
        })
    }

    /// The configuration for a symbol, `None` if the symbol is not a WSPR symbol.
    pub fn tone(&self, symbol: u8) -> Option<&Config> {
        self.tones.get(symbol as usize)
    }

    pub fn tones(&self) -> &[Config; TONES] {
        &self.tones
    }
}

/// Solve the four tones with the standard spacing.
pub fn plan(f0: f64, base: f64) -> Result<Plan, ConfigError> {
    Plan::new(f0, base, TONE_SPACING)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distinct() {
        for base in [1_838_100.0, 14_097_100.0, 28_126_100.0, 144_490_500.0] {
            let p = plan(25e6, base).unwrap();
            for pair in p.tones().windows(2) {
                let step = pair[1].f - pair[0].f;
                assert!(step > 0.0);
                assert!((step - TONE_SPACING).abs() < 1e-2, "{base}: {step}");
            }
            assert!(p.tone(3).is_some());
            assert!(p.tone(4).is_none());
        }
    }

    #[test]
    fn unreachable() {
        assert!(matches!(
            Plan::new(25e6, 199_999_999.0, 1.0),
            Err(ConfigError::OutputTooHigh(_))
        ));
    }
}
