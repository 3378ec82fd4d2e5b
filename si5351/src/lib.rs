#![cfg_attr(not(test), no_std)]

use bitbybit::{bitenum, bitfield};
use embedded_hal::i2c::{self, I2c};

mod config;
mod fraction;

pub use config::{Config, ConfigError, Divider, Params, MAX_DENOMINATOR, MAX_RELATIVE_ERROR};
pub use fraction::nearest_fraction;

/// Seven bit I2C address.
pub const ADDRESS: u8 = 0x60;

/// Number of outputs with a fully featured multisynth.
pub const OUTPUTS: u8 = 6;

#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
enum Addr {
    Status = 0,
    OutputEnable = 3,
    ClockControl = 16,
    MsnA = 26,
    MsnB = 34,
    Ms0 = 42,
    PllReset = 177,
    CrystalLoad = 183,
}

#[bitfield(u8)]
#[derive(Debug, PartialEq)]
pub struct Status {
    #[bits(0..=1, r)]
    revision: arbitrary_int::u2,
    #[bit(4, r)]
    los_clkin: bool,
    #[bit(5, r)]
    lol_a: bool,
    #[bit(6, r)]
    lol_b: bool,
    #[bit(7, r)]
    sys_init: bool,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum Drive {
    Ma2 = 0,
    Ma4 = 1,
    Ma6 = 2,
    Ma8 = 3,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum Source {
    Xtal = 0,
    ClkIn = 1,
    Fanout = 2,
    Multisynth = 3,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum CrystalLoad {
    Reserved = 0,
    Pf6 = 1,
    Pf8 = 2,
    Pf10 = 3,
}

#[bitfield(u8, default = 0x80)]
#[derive(Debug, PartialEq)]
pub struct ClockControl {
    #[bits(0..=1, rw)]
    drive: Drive,
    #[bits(2..=3, rw)]
    source: Source,
    #[bit(4, rw)]
    invert: bool,
    /// Multisynth fed from PLL B instead of PLL A
    #[bit(5, rw)]
    pll_b: bool,
    #[bit(6, rw)]
    integer: bool,
    #[bit(7, rw)]
    power_down: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Pll {
    A,
    B,
}

impl Pll {
    fn addr(&self) -> Addr {
        match self {
            Self::A => Addr::MsnA,
            Self::B => Addr::MsnB,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Device still initializing")]
    NotReady,
    #[error("Invalid output {0}")]
    Output(u8),
    #[error("Configuration: {0}")]
    Config(#[source] ConfigError),
    #[error("I2C")]
    Bus(i2c::ErrorKind),
}

impl<E: i2c::Error> From<E> for Error {
    fn from(value: E) -> Self {
        Self::Bus(value.kind())
    }
}

/// Serialize a divider into its eight register bytes.
///
/// `r_div` and `divby4` share the third byte and only exist for multisynth outputs.
pub fn divider_registers(divider: &Divider, r_div: u8, divby4: bool) -> [u8; 8] {
    let Params { p1, p2, p3 } = if divby4 {
        Params { p1: 0, p2: 0, p3: 1 }
    } else {
        divider.params()
    };
    [
        (p3 >> 8) as u8,
        p3 as u8,
        ((r_div & 0x7) << 4) | (if divby4 { 0b11 << 2 } else { 0 }) | ((p1 >> 16) & 0x3) as u8,
        (p1 >> 8) as u8,
        p1 as u8,
        (((p3 >> 16) & 0xf) << 4) as u8 | ((p2 >> 16) & 0xf) as u8,
        (p2 >> 8) as u8,
        p2 as u8,
    ]
}

#[derive(Clone, Debug)]
pub struct Si5351<I> {
    i2c: I,
}

impl<I: I2c> Si5351<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    pub fn release(self) -> I {
        self.i2c
    }

    fn write(&mut self, addr: u8, data: &[u8]) -> Result<(), Error> {
        let mut buf = [0; 9];
        buf[0] = addr;
        buf[1..][..data.len()].copy_from_slice(data);
        Ok(self.i2c.write(ADDRESS, &buf[..data.len() + 1])?)
    }

    fn read(&mut self, addr: u8, data: &mut [u8]) -> Result<(), Error> {
        Ok(self.i2c.write_read(ADDRESS, &[addr], data)?)
    }

    pub fn status(&mut self) -> Result<Status, Error> {
        let mut s = [0];
        self.read(Addr::Status as _, &mut s)?;
        Ok(Status::new_with_raw_value(s[0]))
    }

    /// Disable and power down all outputs and set the crystal load capacitance.
    pub fn init(&mut self, load: CrystalLoad) -> Result<(), Error> {
        if self.status()?.sys_init() {
            return Err(Error::NotReady);
        }
        self.set_output_enable(0)?;
        self.write(
            Addr::ClockControl as _,
            &[ClockControl::default().raw_value(); 8],
        )?;
        // Reserved low bits must read 0b010010
        self.write(Addr::CrystalLoad as _, &[((load as u8) << 6) | 0x12])
    }

    /// Bit `n` of `mask` enables output `n`.
    pub fn set_output_enable(&mut self, mask: u8) -> Result<(), Error> {
        self.write(Addr::OutputEnable as _, &[!mask])
    }

    pub fn set_pll(&mut self, pll: Pll, feedback: &Divider) -> Result<(), Error> {
        self.write(pll.addr() as _, &divider_registers(feedback, 0, false))
    }

    /// Needed after changing the PLL dividers.
    pub fn reset_pll(&mut self) -> Result<(), Error> {
        self.write(Addr::PllReset as _, &[0xa0])
    }

    pub fn set_multisynth(
        &mut self,
        output: u8,
        divider: &Divider,
        r_div: u8,
    ) -> Result<(), Error> {
        if output >= OUTPUTS {
            return Err(Error::Output(output));
        }
        let divby4 = divider.is_integer() && divider.a == 4;
        self.write(
            addr_offset(Addr::Ms0, 8 * output),
            &divider_registers(divider, r_div, divby4),
        )
    }

    pub fn set_clock_control(
        &mut self,
        output: u8,
        control: ClockControl,
    ) -> Result<(), Error> {
        if output >= OUTPUTS {
            return Err(Error::Output(output));
        }
        self.write(
            addr_offset(Addr::ClockControl, output),
            &[control.raw_value()],
        )
    }

    /// Program PLL and multisynth of an output to a solved configuration.
    ///
    /// The output enable is left unchanged.
    pub fn apply(
        &mut self,
        output: u8,
        pll: Pll,
        config: &Config,
        drive: Drive,
    ) -> Result<(), Error> {
        self.set_pll(pll, &config.feedback)?;
        self.set_multisynth(output, &config.output, config.r_div())?;
        self.set_clock_control(
            output,
            ClockControl::builder()
                .with_drive(drive)
                .with_source(Source::Multisynth)
                .with_invert(false)
                .with_pll_b(pll == Pll::B)
                .with_integer(config.output.is_integer() && config.output.a % 2 == 0)
                .with_power_down(false)
                .build(),
        )?;
        self.reset_pll()
    }

    /// Solve and apply an output frequency.
    ///
    /// Returns the configuration including the achieved frequency.
    pub fn set_frequency(
        &mut self,
        output: u8,
        pll: Pll,
        f0: f64,
        f: f64,
        drive: Drive,
    ) -> Result<Config, Error> {
        let config = Config::new(f0, 0.0, f).map_err(Error::Config)?;
        self.apply(output, pll, &config, drive)?;
        Ok(config)
    }
}

fn addr_offset(base: Addr, offset: u8) -> u8 {
    base as u8 + offset
}

#[cfg(test)]
mod test {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    #[test]
    fn registers() {
        assert_eq!(
            divider_registers(&Divider { a: 32, b: 0, c: 1 }, 0, false),
            [0x00, 0x01, 0x00, 0x0e, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            divider_registers(&Divider { a: 28, b: 6039, c: 14063 }, 0, false),
            [0x36, 0xef, 0x00, 0x0c, 0x36, 0x00, 0x35, 0x16]
        );
        assert_eq!(
            divider_registers(&Divider { a: 15, b: 1_000_000, c: 1_048_575 }, 0, false),
            [0xff, 0xff, 0x00, 0x05, 0xfa, 0xf1, 0x20, 0x7a]
        );
        assert_eq!(
            divider_registers(&Divider { a: 1250, b: 0, c: 1 }, 6, false),
            [0x00, 0x01, 0x62, 0x6f, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            divider_registers(&Divider { a: 4, b: 0, c: 1 }, 0, true),
            [0x00, 0x01, 0x0c, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn init() {
        let expectations = [
            Transaction::write_read(ADDRESS, vec![0], vec![0x00]),
            Transaction::write(ADDRESS, vec![3, 0xff]),
            Transaction::write(ADDRESS, vec![16, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80]),
            Transaction::write(ADDRESS, vec![183, 0xd2]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut si = Si5351::new(i2c.clone());
        si.init(CrystalLoad::Pf10).unwrap();
        i2c.done();
    }

    #[test]
    fn not_ready() {
        let expectations = [Transaction::write_read(ADDRESS, vec![0], vec![0x80])];
        let mut i2c = Mock::new(&expectations);
        let mut si = Si5351::new(i2c.clone());
        assert_eq!(si.init(CrystalLoad::Pf10), Err(Error::NotReady));
        i2c.done();
    }

    #[test]
    fn apply() {
        let config = Config::new(25e6, 0.0, 10e3).unwrap();
        let expectations = [
            Transaction::write(ADDRESS, vec![26, 0x00, 0x01, 0x00, 0x0a, 0x00, 0x00, 0x00, 0x00]),
            Transaction::write(ADDRESS, vec![42, 0x00, 0x01, 0x53, 0xa7, 0x80, 0x00, 0x00, 0x00]),
            Transaction::write(ADDRESS, vec![16, 0x0f]),
            Transaction::write(ADDRESS, vec![177, 0xa0]),
            Transaction::write(ADDRESS, vec![3, !0x01]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut si = Si5351::new(i2c.clone());
        si.apply(0, Pll::A, &config, Drive::Ma8).unwrap();
        si.set_output_enable(0x01).unwrap();
        i2c.done();
    }

    #[test]
    fn invalid_output() {
        let expectations: [Transaction; 0] = [];
        let mut i2c = Mock::new(&expectations);
        let mut si = Si5351::new(i2c.clone());
        let d = Divider { a: 100, b: 0, c: 1 };
        assert_eq!(si.set_multisynth(6, &d, 0), Err(Error::Output(6)));
        assert!(matches!(
            si.set_frequency(0, Pll::A, 25e6, 300e6, Drive::Ma2),
            Err(Error::Config(ConfigError::OutputTooHigh(_)))
        ));
        i2c.done();
    }
}
