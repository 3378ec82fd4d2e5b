//! Runtime configuration of the beacon.
//!
//! Settings are plain `serde` structures. They can be parsed from and rendered to JSON
//! without allocation (`serde-json-core`).
use serde::{Deserialize, Serialize};

use crate::design_parameters::{FAST_WRAP, PPS_PERIOD_US, SI5351_REFERENCE, SLOW_WRAP};

/// Rendered JSON capacity.
pub const JSON_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("JSON: {0}")]
    Parse(serde_json_core::de::Error),
    #[error("Rendered settings too long")]
    Render,
    #[error("Counter wrap {0} outside 2..=65536")]
    Wrap(u32),
    #[error("Monitor timeout {0} ms not longer than one PPS period")]
    Timeout(u32),
    #[error("Output frequency unreachable: {0}")]
    Synthesizer(#[from] si5351::ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Nominal Si5351 crystal frequency in Hz.
    pub reference: f64,

    /// Output frequency in Hz, the WSPR base (lowest tone) frequency.
    pub frequency: f64,

    /// PLL frequency hint in Hz, `0` to let the solver choose.
    pub pll: f64,

    /// Modulus of the fast (reference) counter.
    pub fast_wrap: u32,

    /// Modulus of the slow counter.
    pub slow_wrap: u32,

    /// Time without a sample before a window counts as missed, in milliseconds.
    pub timeout_ms: u32,

    /// Reboot into the USB bootloader after this many monitor events, `0` never.
    pub reboot_after: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reference: SI5351_REFERENCE,
            frequency: 14_097_100.0,
            pll: 0.0,
            fast_wrap: FAST_WRAP,
            slow_wrap: SLOW_WRAP,
            timeout_ms: 2000,
            reboot_after: 0,
        }
    }
}

impl Settings {
    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        let (settings, _) =
            serde_json_core::from_slice::<Self>(json).map_err(Error::Parse)?;
        settings.validate()
    }

    pub fn to_json(&self) -> Result<heapless::String<JSON_CAPACITY>, Error> {
        serde_json_core::to_string(self).map_err(|_| Error::Render)
    }

    /// Check ranges and that the synthesizer reaches the output frequency.
    pub fn validate(self) -> Result<Self, Error> {
        for wrap in [self.fast_wrap, self.slow_wrap] {
            // 16 bit counters
            if !(2..=1 << 16).contains(&wrap) {
                return Err(Error::Wrap(wrap));
            }
        }
        if (self.timeout_ms as u64) * 1000 <= PPS_PERIOD_US {
            return Err(Error::Timeout(self.timeout_ms));
        }
        si5351::Config::new(self.reference, self.pll, self.frequency)?;
        Ok(self)
    }

    /// Modulus of the composite count.
    pub fn count_wrap(&self) -> u64 {
        self.fast_wrap as u64 * self.slow_wrap as u64
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::design_parameters::COUNT_WRAP;

    #[test]
    fn defaults() {
        let s = Settings::default().validate().unwrap();
        assert_eq!(s.count_wrap(), COUNT_WRAP);
    }

    #[test]
    fn json() {
        let s = Settings::from_json(
            br#"{"reference":25000000.0,"frequency":7040100.0,"pll":0.0,
            "fast_wrap":50000,"slow_wrap":40000,"timeout_ms":1500,"reboot_after":100}"#,
        )
        .unwrap();
        assert_eq!(s.frequency, 7_040_100.0);
        assert_eq!(s.slow_wrap, 40_000);
        assert_eq!(s.reboot_after, 100);
        let json = s.to_json().unwrap();
        assert_eq!(Settings::from_json(json.as_bytes()), Ok(s));
    }

    #[test]
    fn invalid() {
        assert!(matches!(Settings::from_json(b"{"), Err(Error::Parse(_))));
        let s = Settings {
            fast_wrap: 70_000,
            ..Default::default()
        };
        assert_eq!(s.validate(), Err(Error::Wrap(70_000)));
        let s = Settings {
            timeout_ms: 1000,
            ..Default::default()
        };
        assert_eq!(s.validate(), Err(Error::Timeout(1000)));
        let s = Settings {
            frequency: 250e6,
            ..Default::default()
        };
        assert_eq!(
            s.validate(),
            Err(Error::Synthesizer(si5351::ConfigError::OutputTooHigh(250e6)))
        );
        let s = Settings {
            reference: 5e6,
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(Error::Synthesizer(_))));
    }
}
