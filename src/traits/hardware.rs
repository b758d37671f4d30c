//! Hardware abstraction traits for port pins and the ADC exchange.
//!
//! This module defines the two hardware seams the connection manager needs:
//! GPIO access to every port pin, and a 16-bit full-duplex exchange with the
//! external multiplexed ADC.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`PortPins`] | Read, drive and release input/output port pins |
//! | [`AdcSpi`] | One 16-bit command/response exchange with the ADC |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations from
//! [`crate::hal::mock`]. For boards exposing `embedded-hal` 1.0 peripherals,
//! use the adapters in `hal::ehal` (requires `embedded-hal` feature).
//!
//! # Example
//!
//! ```rust
//! use brick_dcm::hal::MockPins;
//! use brick_dcm::traits::PortPins;
//! use brick_dcm::{InputRole, PinDrive, Port};
//!
//! let mut pins = MockPins::new();
//! pins.drive_input(Port::P1, InputRole::Pin5, PinDrive::Low);
//! assert!(!pins.read_input(Port::P1, InputRole::Pin5));
//!
//! pins.float_input_port(Port::P1);
//! assert!(pins.read_input(Port::P1, InputRole::Pin5)); // pull-up
//! ```

use crate::types::{InputRole, OutputRole, PinDrive, Port};

/// GPIO access to the pins of every input and output port.
///
/// Reads return the logic level seen on the pin; writes either drive the pin
/// or release it. Pin access is infallible on the brick's SoC, so no error
/// type is carried.
pub trait PortPins {
    /// Logic level of an input port pin.
    fn read_input(&self, port: Port, role: InputRole) -> bool;

    /// Drive or release an input port pin.
    fn drive_input(&mut self, port: Port, role: InputRole, drive: PinDrive);

    /// Logic level of an output port pin.
    fn read_output(&self, port: Port, role: OutputRole) -> bool;

    /// Drive or release an output port pin.
    fn drive_output(&mut self, port: Port, role: OutputRole, drive: PinDrive);

    /// Release an input port: pins 5 and 6 float, the buffer control is
    /// driven high. Pins 1 and 2 are left as they are.
    fn float_input_port(&mut self, port: Port) {
        self.drive_input(port, InputRole::Pin5, PinDrive::Float);
        self.drive_input(port, InputRole::Pin6, PinDrive::Float);
        self.drive_input(port, InputRole::Buffer, PinDrive::High);
    }

    /// Release an output port: motor lines and the pin 5 pull-down are
    /// driven low, pin 6 floats.
    fn float_output_port(&mut self, port: Port) {
        self.drive_output(port, OutputRole::Pin1, PinDrive::Low);
        self.drive_output(port, OutputRole::Pin2, PinDrive::Low);
        self.drive_output(port, OutputRole::Pin5Write, PinDrive::Low);
        self.drive_output(port, OutputRole::Pin6, PinDrive::Float);
    }

    /// Levels of all input roles of a port, bit `n` for `InputRole::ALL[n]`.
    fn input_levels(&self, port: Port) -> u8 {
        InputRole::ALL
            .iter()
            .enumerate()
            .filter(|(_, role)| self.read_input(port, **role))
            .fold(0, |acc, (bit, _)| acc | (1 << bit))
    }

    /// Levels of all output roles of a port, bit `n` for `OutputRole::ALL[n]`.
    fn output_levels(&self, port: Port) -> u8 {
        OutputRole::ALL
            .iter()
            .enumerate()
            .filter(|(_, role)| self.read_output(port, **role))
            .fold(0, |acc, (bit, _)| acc | (1 << bit))
    }
}

/// One full-duplex 16-bit exchange with the multiplexed ADC.
///
/// The converter is pipelined: the value returned by an exchange belongs to
/// the channel requested two exchanges earlier. The sampler accounts for the
/// lag, implementations only shift bits.
pub trait AdcSpi {
    /// Error type for bus failures.
    type Error;

    /// Clock `word` out MSB first while clocking the reply in.
    fn exchange(&mut self, word: u16) -> Result<u16, Self::Error>;
}
