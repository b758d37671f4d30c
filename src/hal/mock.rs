//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the hardware traits, enabling
//! development and testing on desktop without a brick.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockPins`] | [`PortPins`] | Records drive state, simulates device-side levels |
//! | [`MockAdc`] | [`AdcSpi`] | Pipelined converter with settable channel values |
//!
//! [`InputDevice`] and [`OutputDevice`] preset both mocks to look like a
//! plugged device.
//!
//! # Example
//!
//! ```rust
//! use brick_dcm::hal::{InputDevice, MockAdc, MockPins};
//! use brick_dcm::Port;
//!
//! let mut pins = MockPins::new();
//! let mut adc = MockAdc::new();
//! InputDevice::Uart.plug(Port::P2, &mut pins, &mut adc);
//!
//! assert_eq!(adc.slot_mv(1), 0);
//! ```
//!
//! [`PortPins`]: crate::traits::PortPins
//! [`AdcSpi`]: crate::traits::AdcSpi

use crate::analog::ADC_SLOTS;
use crate::sampler::{ADC_CHANNEL_MAP, ADC_REQUEST};
use crate::thresholds::{counts_to_mv, mv_to_counts, ADC_RES};
use crate::traits::{AdcSpi, PortPins};
use crate::types::{InputRole, OutputRole, PinDrive, Port, INPUT_PORTS, OUTPUT_PORTS};

const ROLES: usize = 5;

// ============================================================================
// Pins
// ============================================================================

/// Mock port pins.
///
/// A driven pin reads back its drive level. A floating pin reads the level
/// the simulated device (or the board pull resistor) presents, set with
/// [`set_input_level`](Self::set_input_level) /
/// [`set_output_level`](Self::set_output_level).
#[derive(Clone, Debug)]
pub struct MockPins {
    input_drive: [[PinDrive; ROLES]; INPUT_PORTS],
    input_level: [[bool; ROLES]; INPUT_PORTS],
    output_drive: [[PinDrive; ROLES]; OUTPUT_PORTS],
    output_level: [[bool; ROLES]; OUTPUT_PORTS],
    /// Number of drive calls made.
    pub writes: usize,
}

impl Default for MockPins {
    fn default() -> Self {
        Self {
            input_drive: [[PinDrive::Float; ROLES]; INPUT_PORTS],
            input_level: [Self::OPEN_INPUT; INPUT_PORTS],
            output_drive: [[PinDrive::Float; ROLES]; OUTPUT_PORTS],
            output_level: [Self::OPEN_OUTPUT; OUTPUT_PORTS],
            writes: 0,
        }
    }
}

impl MockPins {
    /// Levels of a released, empty input port: pins 1, 2, 5 pulled up,
    /// pin 6 pulled down.
    pub const OPEN_INPUT: [bool; ROLES] = [true, true, true, false, false];

    /// Levels of a released, empty output port: pin 5 sense and pin 6
    /// pulled up.
    pub const OPEN_OUTPUT: [bool; ROLES] = [false, false, false, true, true];

    /// Creates mock pins with every port empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Level an input pin shows while floating.
    pub fn set_input_level(&mut self, port: Port, role: InputRole, high: bool) {
        self.input_level[port.index()][role as usize] = high;
    }

    /// Level an output pin shows while floating.
    pub fn set_output_level(&mut self, port: Port, role: OutputRole, high: bool) {
        self.output_level[port.index()][role as usize] = high;
    }

    /// Restore the empty-port levels of an input port.
    pub fn unplug_input(&mut self, port: Port) {
        self.input_level[port.index()] = Self::OPEN_INPUT;
    }

    /// Restore the empty-port levels of an output port.
    pub fn unplug_output(&mut self, port: Port) {
        self.output_level[port.index()] = Self::OPEN_OUTPUT;
    }

    /// Last drive applied to an input pin.
    pub fn input_drive(&self, port: Port, role: InputRole) -> PinDrive {
        self.input_drive[port.index()][role as usize]
    }

    /// Last drive applied to an output pin.
    pub fn output_drive(&self, port: Port, role: OutputRole) -> PinDrive {
        self.output_drive[port.index()][role as usize]
    }
}

fn resolve(drive: PinDrive, level: bool) -> bool {
    match drive {
        PinDrive::High => true,
        PinDrive::Low => false,
        PinDrive::Float => level,
    }
}

impl PortPins for MockPins {
    fn read_input(&self, port: Port, role: InputRole) -> bool {
        let (p, r) = (port.index(), role as usize);
        resolve(self.input_drive[p][r], self.input_level[p][r])
    }

    fn drive_input(&mut self, port: Port, role: InputRole, drive: PinDrive) {
        self.input_drive[port.index()][role as usize] = drive;
        self.writes += 1;
    }

    fn read_output(&self, port: Port, role: OutputRole) -> bool {
        let (p, r) = (port.index(), role as usize);
        resolve(self.output_drive[p][r], self.output_level[p][r])
    }

    fn drive_output(&mut self, port: Port, role: OutputRole, drive: PinDrive) {
        self.output_drive[port.index()][role as usize] = drive;
        self.writes += 1;
    }
}

// ============================================================================
// ADC
// ============================================================================

/// Bus fault injected with [`MockAdc::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mock ADC bus fault")]
pub struct MockBusError;

/// Mock multiplexed ADC.
///
/// Values are stored per physical channel and set through logical slots.
/// Replies lag requests by two exchanges like the real converter; non-request
/// words (setup) produce no conversion.
#[derive(Clone, Debug)]
pub struct MockAdc {
    channels: [u16; ADC_SLOTS],
    pipeline: [Option<u8>; 2],
    /// Total exchanges performed.
    pub exchanges: u64,
    /// Last word received.
    pub last_word: u16,
    /// Fail the next exchanges when set.
    pub fail: bool,
}

impl Default for MockAdc {
    fn default() -> Self {
        let mut adc = Self {
            channels: [0; ADC_SLOTS],
            pipeline: [None; 2],
            exchanges: 0,
            last_word: 0,
            fail: false,
        };
        for port in Port::ALL {
            InputDevice::Open.set_analog(port, &mut adc);
            OutputDevice::Open.set_analog(port, &mut adc);
        }
        adc
    }
}

impl MockAdc {
    /// Creates a converter showing every port empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw count a logical slot converts to.
    pub fn set_slot(&mut self, slot: usize, counts: u16) {
        self.channels[ADC_CHANNEL_MAP[slot] as usize] = counts.min(ADC_RES);
    }

    /// Set a logical slot in millivolts.
    pub fn set_slot_mv(&mut self, slot: usize, mv: u16) {
        self.set_slot(slot, mv_to_counts(mv));
    }

    /// Raw count of a logical slot.
    pub fn slot(&self, slot: usize) -> u16 {
        self.channels[ADC_CHANNEL_MAP[slot] as usize]
    }

    /// Logical slot in millivolts.
    pub fn slot_mv(&self, slot: usize) -> u16 {
        counts_to_mv(self.slot(slot))
    }
}

impl AdcSpi for MockAdc {
    type Error = MockBusError;

    fn exchange(&mut self, word: u16) -> Result<u16, MockBusError> {
        if self.fail {
            return Err(MockBusError);
        }
        self.exchanges += 1;
        self.last_word = word;

        let requested = if word & !0x0780 == ADC_REQUEST {
            Some(((word >> 7) & 0x0F) as u8)
        } else {
            None
        };
        let reply = self.pipeline[0]
            .map(|channel| self.channels[channel as usize])
            .unwrap_or(0);
        self.pipeline = [self.pipeline[1], requested];
        Ok(reply)
    }
}

// ============================================================================
// Device Presets
// ============================================================================

/// Simulated input port devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputDevice {
    /// Nothing plugged.
    Open,
    /// UART sensor: pin 1 tied to ground.
    Uart,
    /// Analog sensor loading pin 1 to the given voltage.
    Analog {
        /// Pin 1 voltage in millivolts.
        pin1_mv: u16,
    },
    /// Legacy IIC sensor: pin 6 pulled high.
    NxtIic,
    /// Pin 5 shorted to ground.
    ShortedPin5,
}

impl InputDevice {
    fn set_analog(self, port: Port, adc: &mut MockAdc) {
        let pin1_mv = match self {
            InputDevice::Uart => 0,
            InputDevice::Analog { pin1_mv } => pin1_mv,
            InputDevice::Open | InputDevice::NxtIic | InputDevice::ShortedPin5 => 5000,
        };
        adc.set_slot_mv(port.index(), pin1_mv);
        adc.set_slot(INPUT_PORTS + port.index(), 0);
    }

    /// Make `port` look like this device.
    pub fn plug(self, port: Port, pins: &mut MockPins, adc: &mut MockAdc) {
        pins.unplug_input(port);
        self.set_analog(port, adc);
        match self {
            InputDevice::NxtIic => pins.set_input_level(port, InputRole::Pin6, true),
            InputDevice::ShortedPin5 => pins.set_input_level(port, InputRole::Pin5, false),
            InputDevice::Open | InputDevice::Uart | InputDevice::Analog { .. } => {}
        }
    }
}

/// Simulated output port devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputDevice {
    /// Nothing plugged; pin 5 rests in the balance band.
    Open,
    /// Large motor.
    LargeMotor,
    /// Medium motor.
    MediumMotor,
    /// Large motor, new revision.
    NewLargeMotor,
    /// Intelligent output device.
    Intelligent,
    /// Plain actuator loading pin 5 to the given voltage.
    Actuator {
        /// Pin 5 voltage in millivolts.
        pin5_mv: u16,
    },
}

impl OutputDevice {
    /// Pin 5 voltage presented by this device.
    pub fn pin5_mv(self) -> u16 {
        match self {
            OutputDevice::Open => 2500,
            OutputDevice::LargeMotor => 180,
            OutputDevice::MediumMotor => 350,
            OutputDevice::NewLargeMotor => 550,
            OutputDevice::Intelligent => 1000,
            OutputDevice::Actuator { pin5_mv } => pin5_mv,
        }
    }

    fn set_analog(self, port: Port, adc: &mut MockAdc) {
        adc.set_slot_mv(8 + port.index(), self.pin5_mv());
    }

    /// Make `port` look like this device.
    pub fn plug(self, port: Port, pins: &mut MockPins, adc: &mut MockAdc) {
        pins.unplug_output(port);
        self.set_analog(port, adc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::request_word;

    #[test]
    fn floating_pins_read_device_level() {
        let mut pins = MockPins::new();
        assert!(pins.read_input(Port::P1, InputRole::Pin5));
        assert!(!pins.read_input(Port::P1, InputRole::Pin6));

        pins.set_input_level(Port::P1, InputRole::Pin6, true);
        assert!(pins.read_input(Port::P1, InputRole::Pin6));

        pins.drive_input(Port::P1, InputRole::Pin6, PinDrive::Low);
        assert!(!pins.read_input(Port::P1, InputRole::Pin6));
        assert_eq!(pins.writes, 1);
    }

    #[test]
    fn adc_replies_two_exchanges_late() {
        let mut adc = MockAdc::new();
        adc.set_slot(0, 100);
        adc.set_slot(1, 200);

        assert_eq!(adc.exchange(request_word(ADC_CHANNEL_MAP[0])), Ok(0));
        assert_eq!(adc.exchange(request_word(ADC_CHANNEL_MAP[1])), Ok(0));
        assert_eq!(adc.exchange(0x400F), Ok(100));
        assert_eq!(adc.exchange(0x400F), Ok(200));
        assert_eq!(adc.exchange(0x400F), Ok(0));
        assert_eq!(adc.exchanges, 5);
    }

    #[test]
    fn adc_fault_injection() {
        let mut adc = MockAdc::new();
        adc.fail = true;
        assert_eq!(adc.exchange(0x400F), Err(MockBusError));
    }

    #[test]
    fn presets_set_slots() {
        let mut pins = MockPins::new();
        let mut adc = MockAdc::new();
        assert_eq!(adc.slot(0), ADC_RES);
        assert_eq!(adc.slot_mv(8), 2499);

        OutputDevice::LargeMotor.plug(Port::P1, &mut pins, &mut adc);
        assert_eq!(adc.slot(8), mv_to_counts(180));

        InputDevice::NxtIic.plug(Port::P3, &mut pins, &mut adc);
        assert!(pins.read_input(Port::P3, InputRole::Pin6));
    }
}
