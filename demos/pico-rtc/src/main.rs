#![no_std]
#![no_main]

use defmt_rtt as _;
// Ensure we halt the program on panic (if we don't mention this crate it won't
// be linked)
use panic_halt as _;

// Alias for our HAL crate
use rp2040_hal as hal;

use hal::gpio::{FunctionI2C, Pin};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// For ds1307 RTC
use ds1307_drv::{Hours, BUS_FREQUENCY, DS1307};

/// External high-speed crystal on the Raspberry Pi Pico board is 12 MHz.
/// Adjust if your board has a different frequency
const XTAL_FREQ_HZ: u32 = 12_000_000u32;

#[hal::entry]
fn main() -> ! {
    let mut pac = hal::pac::Peripherals::take().unwrap();

    // Set up the watchdog driver - needed by the clock setup code
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    // Configure the clocks
    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    // The single-cycle I/O block controls our GPIO pins
    let sio = hal::Sio::new(pac.SIO);

    // Set the pins to their default state
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    // Configure two pins as being I²C, not GPIO
    let sda: Pin<_, FunctionI2C, _> = pins.gpio4.reconfigure();
    let scl: Pin<_, FunctionI2C, _> = pins.gpio5.reconfigure();

    // The DS1307 is a standard-mode (100 kHz) device
    let i2c = hal::I2C::i2c0(
        pac.I2C0,
        sda,
        scl,
        BUS_FREQUENCY,
        &mut pac.RESETS,
        &clocks.system_clock,
    );

    let mut timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    // Configure GPIO25 as an output
    let mut led_pin = pins.gpio25.into_push_pull_output();

    let mut ds1307_ctl = DS1307::new(i2c);
    ds1307_ctl.start().unwrap();

    // If first run need to init the clock && calendar
    #[cfg(feature = "set-time")]
    ds1307_ctl.set_time(13, 24, 0, 10, 11, 2024, 7).unwrap();

    if !ds1307_ctl.is_running().unwrap_or(false) {
        defmt::warn!("oscillator halted, starting it");
        let _ = ds1307_ctl.set_running(true);
    }

    loop {
        match ds1307_ctl.get_time() {
            Ok((hh, mm, ss, dd, mt, yy, dn)) => {
                defmt::info!(
                    "{=u8:02}:{=u8:02}:{=u8:02} - {=u8:02}/{=u8:02}/{=u16} - {=u8}",
                    hh,
                    mm,
                    ss,
                    dd,
                    mt,
                    yy,
                    dn
                );
            }
            Err(e) => defmt::error!("ds1307 read failed: {}", e),
        }

        if let Ok(h) = ds1307_ctl.get_hours() {
            let text = match h {
                Hours::Hour24(_) => "24h",
                Hours::Hour12am(_) => "am",
                Hours::Hour12pm(_) => "pm",
            };
            defmt::debug!("chip hour register: {} {}", h.hour().0, text);
        }

        let _ = led_pin.set_high();
        timer.delay_ms(250);

        let _ = led_pin.set_low();
        timer.delay_ms(750);
    }
}
