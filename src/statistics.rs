//! Running statistics of the reference counts per PPS second.
use serde::Serialize;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct State {
    x0: i32,
    count: u32,
    min: i32,
    max: i32,
    m1: i64,
    // Data is taken relative to the first sample. Counts per second of a disciplined
    // reference stay within a few hundred cycles of each other so `m2` does not overflow.
    m2: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            x0: 0,
            count: 0,
            max: i32::MIN,
            min: i32::MAX,
            m1: 0,
            m2: 0,
        }
    }
}

impl State {
    pub fn update(&mut self, x: i32) {
        if self.count == 0 {
            self.x0 = x;
        }
        let dx = (x - self.x0) as i64;
        self.count += 1;
        self.m1 += dx;
        self.m2 += (dx * dx) as u64;
        self.max = self.max.max(x);
        self.min = self.min.min(x);
    }

    /// Number of updates.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn get(&self) -> Statistics {
        let mut stat = Statistics {
            count: self.count,
            mean: 0,
            var: 0,
            max: self.max,
            min: self.min,
        };
        if self.count != 0 {
            let mean = self.m1 / self.count as i64;
            stat.mean = mean as i32 + self.x0;
            stat.var = (self.m2 / self.count as u64).saturating_sub((mean * mean) as u64);
        }
        stat
    }

    /// Statistics as fractional deviation from a nominal count per second.
    ///
    /// # Args
    /// * `nominal` - Expected counts per second.
    pub fn get_relative(&self, nominal: f64) -> Deviation {
        let scale = 1e9 / nominal;
        let mut stat = Deviation {
            mean_ppb: 0.,
            std_ppb: 0.,
            max_ppb: (self.max as f64 - nominal) * scale,
            min_ppb: (self.min as f64 - nominal) * scale,
        };
        if self.count != 0 {
            let c = 1. / self.count as f64;
            let mean = self.m1 as f64 * c;
            stat.mean_ppb = (mean + self.x0 as f64 - nominal) * scale;
            let var = self.m2 as f64 * c - mean * mean;
            stat.std_ppb = libm::sqrt(var.max(0.)) * scale;
        }
        stat
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct Statistics {
    pub count: u32,
    pub min: i32,
    pub max: i32,
    pub mean: i32,
    pub var: u64,
}

/// Deviation in parts per billion.
#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize)]
pub struct Deviation {
    pub min_ppb: f64,
    pub max_ppb: f64,
    pub mean_ppb: f64,
    pub std_ppb: f64,
}
