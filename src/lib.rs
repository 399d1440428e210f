//! DS1307 real time clock-calendar platform agnostic driver
//!
//! # About
//!
//!The DS1307 serial real-time clock is a low-power, full binary-coded decimal (BCD) clock/calendar
//!plus 56 bytes of NV SRAM. Address and data are transferred serially through an I2C,
//!bidirectional bus. The clock/calendar provides seconds, minutes, hours, day, date, month, and
//!year information. The clock operates in either the 24-hour or 12-hour format with AM/PM
//!indicator. The chip driver is based on [`embedded-hal`] traits.
//!
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal
//!
//!Datasheet: [DS1307](https://datasheets.maximintegrated.com/en/ds/DS1307.pdf)
//!
//! ## Driver features:
//! - Reading/setting clock/calendar data in one bus transaction
//! - 12-hour (AM/PM) registers are read back as 24-hour time
//! - Starting/halting the oscillator
//!
//! ## Usage
//!
//! ```ignore
//! let mut rtc = DS1307::new(i2c);
//! rtc.start()?;
//! rtc.set_time(13, 24, 0, 10, 11, 2024, 7)?;
//! let (hours, minutes, seconds, day, month, year, day_of_week) = rtc.get_time()?;
//! ```
//!
//! Years are stored as an offset from 2000, so only 2000..=2099 round-trip.

#![no_std]
#![allow(non_camel_case_types)]

// Must stay first so the logging macros are visible to the other modules.
mod fmt;

mod registers;
pub use crate::registers::{Register, RegisterBlock, TIME_REGISTERS};

use embedded_hal::i2c::I2c;
use fugit::HertzU32;

#[cfg(all(feature = "rp2040", feature = "rp2350"))]
compile_error!("You must not enable both the `rp2040` and `rp2350` Cargo features.");

#[cfg(feature = "rp2350")]
use rp235x_hal as hal;

#[cfg(feature = "rp2040")]
use rp2040_hal as hal;

/// 7-bit I2C address of the DS1307.
pub const DEVICE_ADDRESS: u8 = 0x68;

/// The DS1307 only supports standard mode.
pub const BUS_FREQUENCY: HertzU32 = HertzU32::kHz(100);

/// Year the two-digit year register counts from.
pub const BASE_YEAR: u16 = 2000;

/// CmdFlag definitions
pub enum CmdFlag {
    CLOCK_HALT,
    HOUR_12_BIT,
    HOUR_PM_BIT,
}

impl CmdFlag {
    pub fn addr(self) -> u8 {
        match self {
            Self::CLOCK_HALT => 0x80,
            Self::HOUR_12_BIT => 0x40,
            Self::HOUR_PM_BIT => 0x20,
        }
    }
}

/// DS1307 error
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ds1307Error<E> {
    /// A field was out of range (only from [`DS1307::set_time_checked`])
    Parameter,
    /// The bus transaction failed; the fault is passed through untouched
    Bus(E),
}

impl<E> From<E> for Ds1307Error<E> {
    fn from(e: E) -> Self {
        Ds1307Error::Bus(e)
    }
}

/// Bus activation step.
///
/// Implemented by the bus, not by the driver: a channel must be activated once before the
/// first transfer, and transfers on an inactive channel fail with the bus's own error.
/// HALs that bring the controller up in their constructor implement this as a no-op.
pub trait Activate {
    /// An error that might happen while bringing the bus up
    type Error;

    /// Prepare the channel for transfers.
    fn activate(&mut self) -> Result<(), Self::Error>;
}

impl<T: Activate + ?Sized> Activate for &mut T {
    type Error = T::Error;

    fn activate(&mut self) -> Result<(), Self::Error> {
        T::activate(self)
    }
}

// rp-hal enables and configures the I2C block in `I2C::i2c0`/`I2C::i2c1`.
#[cfg(any(feature = "rp2040", feature = "rp2350"))]
impl<Block, Pins> Activate for hal::I2C<Block, Pins, hal::i2c::Controller> {
    type Error = core::convert::Infallible;

    fn activate(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Time and date, hours always in 24-hour form.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ds1307Time {
    /// 0..=23
    pub hours: u8,
    /// 0..=59
    pub minutes: u8,
    /// 0..=59
    pub seconds: u8,
    /// Day of month, 1..=31
    pub day: u8,
    /// 1..=12
    pub month: u8,
    /// 2000..=2099
    pub year: u16,
    /// 1..=7, numbering is up to the caller
    pub day_of_week: u8,
}

impl Ds1307Time {
    /// Whether every field is inside the range the chip can hold.
    pub fn is_valid(&self) -> bool {
        self.hours <= 23
            && self.minutes <= 59
            && self.seconds <= 59
            && (1..=31).contains(&self.day)
            && (1..=12).contains(&self.month)
            && (BASE_YEAR..=BASE_YEAR + 99).contains(&self.year)
            && (1..=7).contains(&self.day_of_week)
    }

    /// `(hours, minutes, seconds, day, month, year, day_of_week)`
    pub fn as_tuple(&self) -> (u8, u8, u8, u8, u8, u16, u8) {
        (
            self.hours,
            self.minutes,
            self.seconds,
            self.day,
            self.month,
            self.year,
            self.day_of_week,
        )
    }
}

///Hour information as the chip currently holds it: 12-hour (AM/PM) or 24-hour
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Hours {
    Hour24(u8),
    Hour12am(u8),
    Hour12pm(u8),
}

impl Hours {
    /// Get the hour.
    /// return.1: None => Hour24 mode; Some(false) => am; Some(true) => pm;
    pub fn hour(&self) -> (u8, Option<bool>) {
        match *self {
            Hours::Hour24(h) => (h, None),
            Hours::Hour12am(h) => (h, Some(false)),
            Hours::Hour12pm(h) => (h, Some(true)),
        }
    }
}

impl From<u8> for Hours {
    fn from(byte: u8) -> Self {
        if (byte & CmdFlag::HOUR_12_BIT.addr()) != 0 {
            //In case 12-hour format
            let hour = bcd_to_decimal(byte & 0x1F);
            if (byte & CmdFlag::HOUR_PM_BIT.addr()) != 0 {
                Hours::Hour12pm(hour)
            } else {
                Hours::Hour12am(hour)
            }
        } else {
            Hours::Hour24(bcd_to_decimal(byte & 0x3F))
        }
    }
}

// Swap format from bcd to decmial
pub(crate) fn bcd_to_decimal(bcd: u8) -> u8 {
    ((bcd & 0xF0) >> 4) * 10 + (bcd & 0x0F)
}

/// DS1307 on an I2C bus.
///
/// The driver holds nothing but the bus; every call is one blocking transaction and
/// nothing is cached between calls.
pub struct DS1307<I2C> {
    i2c: I2C,
}

impl<I2C> DS1307<I2C>
where
    I2C: I2c,
{
    /// Bind the driver to a bus. No bus traffic happens here.
    pub fn new(i2c: I2C) -> Self {
        DS1307 { i2c }
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Fixed I2C address the driver talks to.
    pub fn address(&self) -> u8 {
        DEVICE_ADDRESS
    }

    /// Bus rate the chip supports. Configure the bus with it before [`DS1307::start`].
    pub fn bus_frequency(&self) -> HertzU32 {
        BUS_FREQUENCY
    }

    /// Read all seven timekeeping registers.
    ///
    /// Writes the start address 0x00 and then reads without releasing the bus (repeated
    /// start). The chip's register pointer auto-increments on each read byte, so the 7
    /// bytes come back in address order. A seconds rollover during the transfer is not
    /// detected.
    pub fn read_registers(&mut self) -> Result<RegisterBlock, Ds1307Error<I2C::Error>> {
        let mut raw = [0_u8; TIME_REGISTERS];
        self.i2c
            .write_read(DEVICE_ADDRESS, &[Register::SECONDS.addr()], &mut raw)?;
        trace!("ds1307 read: {:?}", raw);
        Ok(RegisterBlock(raw))
    }

    /// Write all seven timekeeping registers in one transaction.
    ///
    /// There is no read-back: if the transfer fails part way the chip holds a mix of old
    /// and new values.
    pub fn write_registers(&mut self, block: &RegisterBlock) -> Result<(), Ds1307Error<I2C::Error>> {
        let frame = block.write_frame();
        trace!("ds1307 write: {:?}", frame);
        self.i2c.write(DEVICE_ADDRESS, &frame)?;
        Ok(())
    }

    ///Return current date and time
    pub fn get_datetime(&mut self) -> Result<Ds1307Time, Ds1307Error<I2C::Error>> {
        let block = self.read_registers()?;
        if (block.0[Register::SECONDS.addr() as usize] & CmdFlag::CLOCK_HALT.addr()) != 0 {
            warn!("ds1307 oscillator is halted, time is not advancing");
        }
        Ok(block.decode())
    }

    ///Return `(hours, minutes, seconds, day, month, year, day_of_week)`, hours in 24-hour form
    pub fn get_time(&mut self) -> Result<(u8, u8, u8, u8, u8, u16, u8), Ds1307Error<I2C::Error>> {
        self.get_datetime().map(|t| t.as_tuple())
    }

    ///Set date and time, without range checks
    pub fn set_datetime(&mut self, time: &Ds1307Time) -> Result<(), Ds1307Error<I2C::Error>> {
        debug!("ds1307 set: {}", time.as_tuple());
        self.write_registers(&time.encode())
    }

    /// Set date and time in 24-hour mode.
    ///
    /// Values are not range checked; see [`Ds1307Time::encode`] for how out-of-range
    /// fields truncate. Writing the seconds register also clears the clock-halt bit.
    #[allow(clippy::too_many_arguments)]
    pub fn set_time(
        &mut self,
        hours: u8,
        minutes: u8,
        seconds: u8,
        day: u8,
        month: u8,
        year: u16,
        day_of_week: u8,
    ) -> Result<(), Ds1307Error<I2C::Error>> {
        self.set_datetime(&Ds1307Time {
            hours,
            minutes,
            seconds,
            day,
            month,
            year,
            day_of_week,
        })
    }

    /// Like [`DS1307::set_time`] but rejects out-of-range fields with
    /// [`Ds1307Error::Parameter`] before touching the bus.
    #[allow(clippy::too_many_arguments)]
    pub fn set_time_checked(
        &mut self,
        hours: u8,
        minutes: u8,
        seconds: u8,
        day: u8,
        month: u8,
        year: u16,
        day_of_week: u8,
    ) -> Result<(), Ds1307Error<I2C::Error>> {
        let time = Ds1307Time {
            hours,
            minutes,
            seconds,
            day,
            month,
            year,
            day_of_week,
        };
        if !time.is_valid() {
            return Err(Ds1307Error::Parameter);
        }
        self.set_datetime(&time)
    }

    ///Return current information about hours, in the mode the chip is in
    pub fn get_hours(&mut self) -> Result<Hours, Ds1307Error<I2C::Error>> {
        self.read_reg(Register::HOURS.addr()).map(|b| b.into())
    }

    /// Whether the oscillator is running (clock-halt bit clear).
    pub fn is_running(&mut self) -> Result<bool, Ds1307Error<I2C::Error>> {
        let seconds = self.read_reg(Register::SECONDS.addr())?;
        Ok((seconds & CmdFlag::CLOCK_HALT.addr()) == 0)
    }

    /// Start or halt the oscillator, keeping the seconds count.
    pub fn set_running(&mut self, is_running: bool) -> Result<(), Ds1307Error<I2C::Error>> {
        let mut seconds = self.read_reg(Register::SECONDS.addr())?;
        if is_running {
            seconds &= !CmdFlag::CLOCK_HALT.addr();
        } else {
            seconds |= CmdFlag::CLOCK_HALT.addr();
        }
        self.write_reg(Register::SECONDS.addr(), seconds)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, Ds1307Error<I2C::Error>> {
        let mut data = [0_u8; 1];
        self.i2c.write_read(DEVICE_ADDRESS, &[reg], &mut data)?;
        Ok(data[0])
    }

    fn write_reg(&mut self, reg: u8, byte: u8) -> Result<(), Ds1307Error<I2C::Error>> {
        self.i2c.write(DEVICE_ADDRESS, &[reg, byte])?;
        Ok(())
    }
}

impl<I2C> DS1307<I2C>
where
    I2C: I2c + Activate,
{
    /// Activate the bus channel. Must be called once before the first transfer.
    pub fn start(&mut self) -> Result<(), <I2C as Activate>::Error> {
        trace!("ds1307 start");
        self.i2c.activate()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec;

    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
    use fugit::HertzU32;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    fn setup_mock(expectations: &[I2cTrans]) -> DS1307<I2cMock> {
        DS1307::new(I2cMock::new(expectations))
    }

    fn time(h: u8, mi: u8, s: u8, d: u8, mo: u8, y: u16, dow: u8) -> Ds1307Time {
        Ds1307Time {
            hours: h,
            minutes: mi,
            seconds: s,
            day: d,
            month: mo,
            year: y,
            day_of_week: dow,
        }
    }

    fn hours_of(byte: u8) -> u8 {
        RegisterBlock([0x00, 0x00, byte, 0x01, 0x01, 0x01, 0x00])
            .decode()
            .hours
    }

    /// Bus that rejects transfers until it is activated.
    struct Channel {
        mock: I2cMock,
        active: bool,
    }

    impl ErrorType for Channel {
        type Error = ErrorKind;
    }

    impl I2c for Channel {
        fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), ErrorKind> {
            if !self.active {
                return Err(ErrorKind::Other);
            }
            self.mock.write(address, bytes)
        }

        fn write_read(
            &mut self,
            address: u8,
            bytes: &[u8],
            buffer: &mut [u8],
        ) -> Result<(), ErrorKind> {
            if !self.active {
                return Err(ErrorKind::Other);
            }
            self.mock.write_read(address, bytes, buffer)
        }

        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), ErrorKind> {
            if !self.active {
                return Err(ErrorKind::Other);
            }
            self.mock.transaction(address, operations)
        }
    }

    impl Activate for Channel {
        type Error = ErrorKind;

        fn activate(&mut self) -> Result<(), ErrorKind> {
            self.active = true;
            Ok(())
        }
    }

    #[test]
    fn new_does_not_touch_bus() {
        let dev = setup_mock(&[]);
        assert_eq!(dev.address(), 0x68);
        assert_eq!(dev.bus_frequency(), HertzU32::kHz(100));
        dev.release().done();
    }

    #[test]
    fn get_time_decodes_24_hour_registers() {
        let mut dev = setup_mock(&[I2cTrans::write_read(
            DEVICE_ADDRESS,
            vec![0x00],
            vec![0x30, 0x45, 0x12, 0x03, 0x15, 0x06, 0x23],
        )]);

        assert_eq!(dev.get_time().unwrap(), (12, 45, 30, 15, 6, 2023, 3));
        dev.i2c.done();
    }

    #[test]
    fn get_time_ignores_clock_halt_bit() {
        let mut dev = setup_mock(&[I2cTrans::write_read(
            DEVICE_ADDRESS,
            vec![0x00],
            vec![0xD9, 0x59, 0x23, 0x07, 0x31, 0x12, 0x99],
        )]);

        let t = dev.get_datetime().unwrap();
        assert_eq!(t, time(23, 59, 59, 31, 12, 2099, 7));
        dev.i2c.done();
    }

    #[test]
    fn twelve_hour_registers_resolve_to_24_hours() {
        // PM, tens clear, units 2
        assert_eq!(hours_of(0x62), 14);
        // AM, tens set, units 1
        assert_eq!(hours_of(0x51), 11);
        assert_eq!(hours_of(0x49), 9);
        // 12 AM and 12 PM follow the plain additive rule
        assert_eq!(hours_of(0x52), 12);
        assert_eq!(hours_of(0x72), 24);
    }

    #[test]
    fn set_time_writes_one_burst_frame() {
        let mut dev = setup_mock(&[I2cTrans::write(
            DEVICE_ADDRESS,
            vec![0x00, 0x30, 0x45, 0x12, 0x03, 0x15, 0x06, 0x23],
        )]);

        dev.set_time(12, 45, 30, 15, 6, 2023, 3).unwrap();
        dev.i2c.done();
    }

    #[test]
    fn encode_hours_uses_two_bit_tens_field() {
        let block = time(23, 0, 0, 1, 1, 2000, 1).encode();
        assert_eq!(block.0[2], 0x23);
        assert_eq!(block.decode().hours, 23);
    }

    #[test]
    fn encode_year_window() {
        assert_eq!(time(0, 0, 0, 1, 1, 2000, 1).encode().0[6], 0x00);
        assert_eq!(time(0, 0, 0, 1, 1, 2099, 1).encode().0[6], 0x99);
        // 2100 is outside the window: offset 100 is not a valid BCD byte
        let out_of_window = time(0, 0, 0, 1, 1, 2100, 1);
        assert_eq!(out_of_window.encode().0[6], 0xA0);
        assert!(!out_of_window.is_valid());
    }

    #[test]
    fn encode_truncates_out_of_range_fields() {
        let block = time(45, 99, 75, 40, 13, 2000, 0x0F).encode();
        // tens digits masked to their field width, no carry into other registers
        assert_eq!(block.0[0], 0x75);
        assert_eq!(block.0[1], 0x19);
        assert_eq!(block.0[2], 0x05);
        assert_eq!(block.0[3], 0x07);
        assert_eq!(block.0[4], 0x00);
        assert_eq!(block.0[5], 0x13);
    }

    #[test]
    fn round_trip_each_field_over_its_range() {
        let base = time(0, 0, 0, 1, 1, 2000, 1);
        let check = |t: Ds1307Time| assert_eq!(t.encode().decode(), t);

        for hours in 0..=23 {
            check(Ds1307Time { hours, ..base });
        }
        for minutes in 0..=59 {
            check(Ds1307Time { minutes, ..base });
        }
        for seconds in 0..=59 {
            check(Ds1307Time { seconds, ..base });
        }
        for day in 1..=31 {
            check(Ds1307Time { day, ..base });
        }
        for month in 1..=12 {
            check(Ds1307Time { month, ..base });
        }
        for year in 2000..=2099 {
            check(Ds1307Time { year, ..base });
        }
        for day_of_week in 1..=7 {
            check(Ds1307Time { day_of_week, ..base });
        }
        check(time(23, 59, 59, 31, 12, 2099, 7));
        check(time(19, 38, 27, 29, 2, 2024, 4));
    }

    #[test]
    fn set_time_checked_rejects_without_bus_traffic() {
        let mut dev = setup_mock(&[]);
        assert_eq!(
            dev.set_time_checked(24, 0, 0, 1, 1, 2024, 1),
            Err(Ds1307Error::Parameter)
        );
        assert_eq!(
            dev.set_time_checked(0, 0, 0, 0, 1, 2024, 1),
            Err(Ds1307Error::Parameter)
        );
        assert_eq!(
            dev.set_time_checked(0, 0, 0, 1, 1, 2100, 1),
            Err(Ds1307Error::Parameter)
        );
        assert_eq!(
            dev.set_time_checked(0, 0, 0, 1, 1, 2024, 8),
            Err(Ds1307Error::Parameter)
        );
        dev.i2c.done();
    }

    #[test]
    fn set_time_checked_writes_valid_time() {
        let mut dev = setup_mock(&[I2cTrans::write(
            DEVICE_ADDRESS,
            vec![0x00, 0x00, 0x24, 0x13, 0x07, 0x10, 0x11, 0x24],
        )]);

        dev.set_time_checked(13, 24, 0, 10, 11, 2024, 7).unwrap();
        dev.i2c.done();
    }

    #[test]
    fn bus_faults_pass_through() {
        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
        let mut dev = setup_mock(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], vec![0; 7]).with_error(nack),
            I2cTrans::write(
                DEVICE_ADDRESS,
                vec![0x00, 0x30, 0x45, 0x12, 0x03, 0x15, 0x06, 0x23],
            )
            .with_error(ErrorKind::ArbitrationLoss),
        ]);

        assert_eq!(dev.get_time(), Err(Ds1307Error::Bus(nack)));
        assert_eq!(
            dev.set_time(12, 45, 30, 15, 6, 2023, 3),
            Err(Ds1307Error::Bus(ErrorKind::ArbitrationLoss))
        );
        dev.i2c.done();
    }

    #[test]
    fn transfers_fail_until_started() {
        let mock = I2cMock::new(&[I2cTrans::write_read(
            DEVICE_ADDRESS,
            vec![0x00],
            vec![0x00, 0x00, 0x08, 0x02, 0x01, 0x01, 0x24],
        )]);
        let mut dev = DS1307::new(Channel {
            mock,
            active: false,
        });

        assert_eq!(dev.get_time(), Err(Ds1307Error::Bus(ErrorKind::Other)));
        dev.start().unwrap();
        assert_eq!(dev.get_time().unwrap(), (8, 0, 0, 1, 1, 2024, 2));
        dev.release().mock.done();
    }

    #[test]
    fn get_hours_reports_chip_mode() {
        let mut dev = setup_mock(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x02], vec![0x71]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x02], vec![0x51]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x02], vec![0x21]),
        ]);

        assert_eq!(dev.get_hours().unwrap(), Hours::Hour12pm(11));
        assert_eq!(dev.get_hours().unwrap(), Hours::Hour12am(11));
        assert_eq!(dev.get_hours().unwrap().hour(), (21, None));
        dev.i2c.done();
    }

    #[test]
    fn set_running_only_touches_clock_halt() {
        let mut dev = setup_mock(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], vec![0x42]),
            I2cTrans::write(DEVICE_ADDRESS, vec![0x00, 0xC2]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], vec![0xC2]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], vec![0xC2]),
            I2cTrans::write(DEVICE_ADDRESS, vec![0x00, 0x42]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], vec![0x42]),
        ]);

        dev.set_running(false).unwrap();
        assert!(!dev.is_running().unwrap());
        dev.set_running(true).unwrap();
        assert!(dev.is_running().unwrap());
        dev.i2c.done();
    }
}
