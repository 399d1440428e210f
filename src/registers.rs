//! DS1307 timekeeping register map (addresses 0x00..=0x06) and the BCD codec for it.

use crate::{CmdFlag, Ds1307Time, BASE_YEAR};

/// Timekeeper register addresses
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    SECONDS,
    MINUTES,
    HOURS,
    DAY,
    DATE,
    MONTH,
    YEAR,
}

impl Register {
    pub fn addr(self) -> u8 {
        match self {
            Self::SECONDS => 0x00,
            Self::MINUTES => 0x01,
            Self::HOURS => 0x02,
            Self::DAY => 0x03,
            Self::DATE => 0x04,
            Self::MONTH => 0x05,
            Self::YEAR => 0x06,
        }
    }
}

/// Number of timekeeping registers covered by one burst transfer.
pub const TIME_REGISTERS: usize = 7;

// Width of the tens field of each register, already shifted into the high nibble.
const SECONDS_TENS: u8 = 0x70;
const MINUTES_TENS: u8 = 0x70;
const HOURS_12_TENS: u8 = 0x10;
const HOURS_24_TENS: u8 = 0x30;
const DATE_TENS: u8 = 0x30;
const MONTH_TENS: u8 = 0x10;
const YEAR_TENS: u8 = 0xf0;
const UNITS: u8 = 0x0f;
const DAY_MASK: u8 = 0x07;

/// Raw contents of registers 0x00..=0x06, in address order.
///
/// A block only lives for the duration of one transfer: it is decoded right after a
/// burst read, or encoded right before a burst write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterBlock(pub [u8; TIME_REGISTERS]);

impl RegisterBlock {
    /// Decode the block into a 24-hour time.
    ///
    /// The clock-halt bit of the seconds register is ignored. A chip left in 12-hour mode
    /// is resolved by adding 12 when the PM bit is set.
    pub fn decode(&self) -> Ds1307Time {
        let r = &self.0;
        let hours_reg = r[Register::HOURS.addr() as usize];
        let mut hours = hours_reg & UNITS;
        if (hours_reg & CmdFlag::HOUR_12_BIT.addr()) != 0 {
            hours += tens(hours_reg, HOURS_12_TENS) * 10;
            if (hours_reg & CmdFlag::HOUR_PM_BIT.addr()) != 0 {
                hours += 12;
            }
        } else {
            hours += tens(hours_reg, HOURS_24_TENS) * 10;
        }

        let year = r[Register::YEAR.addr() as usize];
        Ds1307Time {
            hours,
            minutes: field(r[Register::MINUTES.addr() as usize], MINUTES_TENS),
            seconds: field(r[Register::SECONDS.addr() as usize], SECONDS_TENS),
            day: field(r[Register::DATE.addr() as usize], DATE_TENS),
            month: field(r[Register::MONTH.addr() as usize], MONTH_TENS),
            year: BASE_YEAR + field(year, YEAR_TENS) as u16,
            day_of_week: r[Register::DAY.addr() as usize] & DAY_MASK,
        }
    }

    /// Burst write frame: the start address followed by the seven registers.
    ///
    /// The chip auto-increments its register pointer after every byte, so each payload
    /// byte lands on the register matching its position.
    pub fn write_frame(&self) -> [u8; TIME_REGISTERS + 1] {
        let mut frame = [0_u8; TIME_REGISTERS + 1];
        frame[0] = Register::SECONDS.addr();
        frame[1..].copy_from_slice(&self.0);
        frame
    }
}

impl From<[u8; TIME_REGISTERS]> for RegisterBlock {
    fn from(raw: [u8; TIME_REGISTERS]) -> Self {
        RegisterBlock(raw)
    }
}

impl Ds1307Time {
    /// Encode into register layout, hours always in 24-hour mode.
    ///
    /// Fields are not range checked. Each one is split into units and tens and the tens
    /// digit is masked to the register's field width, so out-of-range values truncate
    /// instead of carrying into the next register. Only years 2000..=2099 round-trip.
    pub fn encode(&self) -> RegisterBlock {
        let year = self.year.wrapping_sub(BASE_YEAR);
        let mut r = [0_u8; TIME_REGISTERS];
        r[Register::SECONDS.addr() as usize] = bcd(self.seconds, SECONDS_TENS);
        r[Register::MINUTES.addr() as usize] = bcd(self.minutes, MINUTES_TENS);
        r[Register::HOURS.addr() as usize] = bcd(self.hours, HOURS_24_TENS);
        r[Register::DAY.addr() as usize] = self.day_of_week & DAY_MASK;
        r[Register::DATE.addr() as usize] = bcd(self.day, DATE_TENS);
        r[Register::MONTH.addr() as usize] = bcd(self.month, MONTH_TENS);
        r[Register::YEAR.addr() as usize] =
            ((year % 10) as u8) | ((((year / 10) << 4) as u8) & YEAR_TENS);
        RegisterBlock(r)
    }
}

fn tens(byte: u8, mask: u8) -> u8 {
    (byte & mask) >> 4
}

fn field(byte: u8, tens_mask: u8) -> u8 {
    (byte & UNITS) + tens(byte, tens_mask) * 10
}

fn bcd(value: u8, tens_mask: u8) -> u8 {
    (value % 10) | (((value / 10) << 4) & tens_mask)
}
