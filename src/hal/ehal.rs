//! `embedded-hal` 1.0 adapters for the ADC exchange.
//!
//! Two ways to reach the converter:
//!
//! - [`SpiDeviceAdc`] wraps any [`SpiDevice`] (hardware SPI with chip select
//!   handled by the bus);
//! - [`BitBangAdc`] clocks the 16-bit word over four GPIO lines, for boards
//!   where the converter sits on plain pins.
//!
//! # Example
//!
//! ```ignore
//! use brick_dcm::hal::ehal::SpiDeviceAdc;
//! use brick_dcm::{Config, DcmController};
//!
//! let adc = SpiDeviceAdc::new(spi_device);
//! let controller = DcmController::new(port_pins, adc, &Config::default())?;
//! ```

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use crate::traits::AdcSpi;

/// ADC behind an `embedded-hal` SPI device (mode 0, 8-bit words, MSB first).
pub struct SpiDeviceAdc<D> {
    device: D,
}

impl<D: SpiDevice> SpiDeviceAdc<D> {
    /// Wrap an SPI device.
    pub fn new(device: D) -> Self {
        Self { device }
    }

    /// Return the wrapped device.
    pub fn release(self) -> D {
        self.device
    }
}

impl<D: SpiDevice> AdcSpi for SpiDeviceAdc<D> {
    type Error = D::Error;

    fn exchange(&mut self, word: u16) -> Result<u16, D::Error> {
        let mut frame = word.to_be_bytes();
        self.device.transfer_in_place(&mut frame)?;
        Ok(u16::from_be_bytes(frame))
    }
}

/// ADC clocked over GPIO lines.
///
/// Each exchange pulls chip select low, then for each of the 16 bits sets
/// MOSI, raises the clock, samples MISO and lowers the clock.
pub struct BitBangAdc<Mosi, Miso, Sck, Cs> {
    mosi: Mosi,
    miso: Miso,
    sck: Sck,
    cs: Cs,
}

impl<Mosi, Miso, Sck, Cs, E> BitBangAdc<Mosi, Miso, Sck, Cs>
where
    Mosi: OutputPin<Error = E>,
    Miso: InputPin<Error = E>,
    Sck: OutputPin<Error = E>,
    Cs: OutputPin<Error = E>,
{
    /// Take the lines and park them idle (chip select high, clock and MOSI
    /// low).
    pub fn new(mut mosi: Mosi, miso: Miso, mut sck: Sck, mut cs: Cs) -> Result<Self, E> {
        cs.set_high()?;
        sck.set_low()?;
        mosi.set_low()?;
        Ok(Self { mosi, miso, sck, cs })
    }
}

impl<Mosi, Miso, Sck, Cs, E> AdcSpi for BitBangAdc<Mosi, Miso, Sck, Cs>
where
    Mosi: OutputPin<Error = E>,
    Miso: InputPin<Error = E>,
    Sck: OutputPin<Error = E>,
    Cs: OutputPin<Error = E>,
{
    type Error = E;

    fn exchange(&mut self, word: u16) -> Result<u16, E> {
        self.cs.set_low()?;
        let reply = self.shift(word);
        // Release chip select even when a line failed mid-word
        let released = self.cs.set_high();
        let reply = reply?;
        released?;
        Ok(reply)
    }
}

impl<Mosi, Miso, Sck, Cs, E> BitBangAdc<Mosi, Miso, Sck, Cs>
where
    Mosi: OutputPin<Error = E>,
    Miso: InputPin<Error = E>,
    Sck: OutputPin<Error = E>,
{
    fn shift(&mut self, word: u16) -> Result<u16, E> {
        let mut out = word;
        let mut reply = 0u16;
        for _ in 0..16 {
            if out & 0x8000 != 0 {
                self.mosi.set_high()?;
            } else {
                self.mosi.set_low()?;
            }
            self.sck.set_high()?;
            out <<= 1;
            reply <<= 1;
            if self.miso.is_high()? {
                reply |= 0x0001;
            }
            self.sck.set_low()?;
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::Cell;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    #[derive(Debug, PartialEq)]
    struct LineFault;

    impl embedded_hal::digital::Error for LineFault {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// A GPIO line; lines sharing `level` are wired together.
    struct Line {
        level: Rc<Cell<bool>>,
        broken: bool,
    }

    impl Line {
        fn new(level: &Rc<Cell<bool>>) -> Self {
            Self {
                level: Rc::clone(level),
                broken: false,
            }
        }
    }

    impl ErrorType for Line {
        type Error = LineFault;
    }

    impl OutputPin for Line {
        fn set_low(&mut self) -> Result<(), LineFault> {
            self.level.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), LineFault> {
            self.level.set(true);
            Ok(())
        }
    }

    impl InputPin for Line {
        fn is_high(&mut self) -> Result<bool, LineFault> {
            if self.broken {
                return Err(LineFault);
            }
            Ok(self.level.get())
        }

        fn is_low(&mut self) -> Result<bool, LineFault> {
            self.is_high().map(|high| !high)
        }
    }

    fn loopback() -> (BitBangAdc<Line, Line, Line, Line>, Rc<Cell<bool>>) {
        let data = Rc::new(Cell::new(false));
        let cs = Rc::new(Cell::new(false));
        let adc = BitBangAdc::new(
            Line::new(&data),
            Line::new(&data),
            Line::new(&Rc::new(Cell::new(false))),
            Line::new(&cs),
        )
        .unwrap();
        (adc, cs)
    }

    #[test]
    fn loopback_returns_sent_word() {
        let (mut adc, cs) = loopback();
        assert!(cs.get());
        assert_eq!(adc.exchange(0xA5C3), Ok(0xA5C3));
        assert!(cs.get());
    }

    #[test]
    fn failed_read_releases_chip_select() {
        let (mut adc, cs) = loopback();
        adc.miso.broken = true;
        assert_eq!(adc.exchange(0x1234), Err(LineFault));
        assert!(cs.get());
    }
}
