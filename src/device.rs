//! Byte-level control and read interfaces of the analog module.
//!
//! These are the character-device style entry points user space talks to.
//! They sit on top of [`DcmController`] and translate short byte buffers
//! into state machine requests, and the controller state back into the
//! fixed text and binary layouts tools expect.
//!
//! # Writes
//!
//! | Method | Buffer | Effect |
//! |--------|--------|--------|
//! | [`write_control`](DcmController::write_control) | `'e'` + one byte per port | `'1'` enable / `'0'` disable detection, `'-'` keep |
//! | [`write_control`](DcmController::write_control) | `'t'` + one connection code per port | force a classification on disabled ports |
//! | [`write_pins`](DcmController::write_pins) | one byte per port | `'f'` release, `'0'..'7'` pin 5 level, `0x0D..=0x11` color command |
//! | [`test_pin`](DcmController::test_pin) | [`TestPinRequest`] | test mode and raw pin access |
//!
//! # Reads
//!
//! | Method | Layout |
//! |--------|--------|
//! | [`read_analog`](DcmController::read_analog) | pin bits per port, `\r`, `ESC[B`, 16 counts `%04u`, `ESC[A` |
//! | [`read_pins`](DcmController::read_pins) | pin bits per port, `\r`, NUL |
//! | [`read_types`](DcmController::read_types) | 4 input type codes, 4 output type codes, `\r`, NUL |
//!
//! # Example
//!
//! ```rust
//! use brick_dcm::hal::{MockAdc, MockPins};
//! use brick_dcm::{Config, DcmController, Port};
//!
//! let mut controller = DcmController::new(MockPins::new(), MockAdc::new(), &Config::default()).unwrap();
//! controller.write_control(b"e0---").unwrap();
//! assert!(!controller.dcm().input(Port::P1).fsm_enabled());
//!
//! assert_eq!(controller.read_types()[..4], [126u8; 4]);
//! ```

use core::fmt::Write;

use tracing::debug;

use crate::analog::ADC_SLOTS;
use crate::controller::DcmController;
use crate::error::ControlError;
use crate::traits::{AdcSpi, PortPins};
use crate::types::{
    Classification, ConnectionClass, DeviceType, InputRole, OutputRole, PinDrive, Port,
    INPUT_PORTS, OUTPUT_PORTS,
};

/// Enable/disable automatic detection.
pub const CONTROL_ENABLE: u8 = b'e';
/// Force a connection class.
pub const CONTROL_TYPE: u8 = b't';

/// Capacity of a test-pin string, terminator included.
pub const TEST_PIN_LENGTH: usize = 16;

/// Characters per port in the pin text: 5 input roles, 5 output roles, space.
const PORT_TEXT: usize = InputRole::ALL.len() + OutputRole::ALL.len() + 1;

/// Length of [`DcmController::read_analog`].
pub const ANALOG_TEXT_LENGTH: usize = INPUT_PORTS * PORT_TEXT + 1 + 3 + ADC_SLOTS * 5 + 3;

/// Length of [`DcmController::read_pins`].
pub const PIN_TEXT_LENGTH: usize = INPUT_PORTS * PORT_TEXT + 2;

/// Length of [`DcmController::read_types`].
pub const TYPE_SNAPSHOT_LENGTH: usize = INPUT_PORTS + OUTPUT_PORTS + 2;

/// Diagnostic text of pins and raw samples.
pub type AnalogText = heapless::String<ANALOG_TEXT_LENGTH>;

/// Test-pin reply.
pub type TestPinText = heapless::Vec<u8, TEST_PIN_LENGTH>;

/// Test-mode and raw pin request.
///
/// Ports are numbered `0..4` for inputs and `4..8` for outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestPinRequest<'a> {
    /// Leave test mode; every port restarts detection after the reset delay.
    Off,
    /// Enter test mode; every port is released and unclassified.
    On,
    /// Read the pin levels of a port as `length - 1` characters plus NUL.
    Read {
        /// Port number.
        port: u8,
        /// Reply length, terminator included.
        length: usize,
    },
    /// Drive pins of a port: `'0'` low, `'1'` high, `'x'`/`'X'` release,
    /// one character per role.
    Write {
        /// Port number.
        port: u8,
        /// Drive characters.
        data: &'a [u8],
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TestPort {
    Input(Port),
    Output(Port),
}

impl TestPort {
    fn from_raw(raw: u8) -> Result<Self, ControlError> {
        let index = raw as usize;
        if let Some(port) = Port::from_index(index) {
            return Ok(TestPort::Input(port));
        }
        index
            .checked_sub(INPUT_PORTS)
            .and_then(Port::from_index)
            .map(TestPort::Output)
            .ok_or(ControlError::PortOutOfRange(raw))
    }
}

/// Classification forced by a `'t'` connection code, if the code is one of
/// the accepted ones.
pub fn forced_classification(code: u8) -> Option<Classification> {
    let forced = match ConnectionClass::from_code(code)? {
        ConnectionClass::NxtIic => Classification::new(DeviceType::NxtIic, ConnectionClass::NxtIic),
        ConnectionClass::NxtDumb => {
            Classification::new(DeviceType::NxtLight, ConnectionClass::NxtDumb)
        }
        ConnectionClass::InputDumb => {
            Classification::new(DeviceType::Touch, ConnectionClass::InputDumb)
        }
        ConnectionClass::None => Classification::NONE,
        _ => return None,
    };
    Some(forced)
}

fn drive_from_char(c: u8) -> Option<PinDrive> {
    match c {
        b'0' => Some(PinDrive::Low),
        b'1' => Some(PinDrive::High),
        b'x' | b'X' => Some(PinDrive::Float),
        _ => None,
    }
}

fn level_chars(levels: u8, count: usize) -> impl Iterator<Item = char> {
    (0..count).map(move |bit| if levels & (1 << bit) != 0 { '1' } else { '0' })
}

fn port_bytes(buffer: &[u8]) -> Result<&[u8], ControlError> {
    if buffer.len() < INPUT_PORTS {
        return Err(ControlError::TooShort {
            expected: INPUT_PORTS,
            actual: buffer.len(),
        });
    }
    Ok(&buffer[..INPUT_PORTS])
}

impl<P: PortPins, S: AdcSpi> DcmController<P, S> {
    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Apply an `'e'` or `'t'` control buffer. Returns the bytes consumed.
    pub fn write_control(&mut self, buffer: &[u8]) -> Result<usize, ControlError> {
        let (&command, rest) = buffer.split_first().ok_or(ControlError::Empty)?;
        let ports = port_bytes(rest).map_err(|_| ControlError::TooShort {
            expected: INPUT_PORTS + 1,
            actual: buffer.len(),
        })?;

        match command {
            CONTROL_ENABLE => {
                for (port, &c) in Port::ALL.into_iter().zip(ports) {
                    match c {
                        b'0' => self.set_fsm_enabled(port, false),
                        b'1' => self.set_fsm_enabled(port, true),
                        _ => {}
                    }
                }
            }
            CONTROL_TYPE => {
                for (port, &code) in Port::ALL.into_iter().zip(ports) {
                    if let Some(classification) = forced_classification(code) {
                        if self.force_input(port, classification) {
                            debug!(%port, ?classification, "classification forced");
                        }
                    }
                }
            }
            other => return Err(ControlError::UnknownCommand(other)),
        }
        Ok(buffer.len())
    }

    /// Apply one raw-pin byte per input port. Returns the bytes consumed.
    pub fn write_pins(&mut self, buffer: &[u8]) -> Result<usize, ControlError> {
        let ports = port_bytes(buffer)?;
        let color = self.color_link().is_some();

        for (port, &c) in Port::ALL.into_iter().zip(ports) {
            match c {
                b'-' => {}
                b'f' => self.pins_mut().float_input_port(port),
                _ if !self.dcm().input(port).connected() => {}
                _ if c & 0xF8 == b'0' => {
                    let drive = if c & 0x02 != 0 {
                        PinDrive::High
                    } else {
                        PinDrive::Low
                    };
                    self.pins_mut().drive_input(port, InputRole::Pin5, drive);
                }
                0x0D..=0x11 if color => {
                    self.request_color_command(port, c);
                    debug!(%port, command = c, "color command queued");
                }
                _ => {}
            }
        }
        Ok(buffer.len())
    }

    /// Handle a test-pin request. Only [`TestPinRequest::Read`] returns text.
    pub fn test_pin(
        &mut self,
        request: TestPinRequest<'_>,
    ) -> Result<Option<TestPinText>, ControlError> {
        match request {
            TestPinRequest::Off => {
                self.set_test_mode(false);
                Ok(None)
            }
            TestPinRequest::On => {
                self.set_test_mode(true);
                Ok(None)
            }
            TestPinRequest::Read { port, length } => {
                if length > TEST_PIN_LENGTH {
                    return Err(ControlError::InvalidLength(length));
                }
                let port = TestPort::from_raw(port)?;
                let mut text = TestPinText::new();
                if length == 0 {
                    return Ok(Some(text));
                }
                let (levels, roles) = match port {
                    TestPort::Input(p) => (self.pins().input_levels(p), InputRole::ALL.len()),
                    TestPort::Output(p) => (self.pins().output_levels(p), OutputRole::ALL.len()),
                };
                let chars = level_chars(levels, roles).chain(core::iter::repeat(' '));
                for c in chars.take(length - 1) {
                    let _ = text.push(c as u8);
                }
                let _ = text.push(0);
                Ok(Some(text))
            }
            TestPinRequest::Write { port, data } => {
                if data.is_empty() || data.len() >= TEST_PIN_LENGTH {
                    return Err(ControlError::InvalidLength(data.len()));
                }
                match TestPort::from_raw(port)? {
                    TestPort::Input(p) => {
                        for (role, &c) in InputRole::ALL.into_iter().zip(data) {
                            if let Some(drive) = drive_from_char(c) {
                                self.pins_mut().drive_input(p, role, drive);
                            }
                        }
                    }
                    TestPort::Output(p) => {
                        for (role, &c) in OutputRole::ALL.into_iter().zip(data) {
                            if let Some(drive) = drive_from_char(c) {
                                self.pins_mut().drive_output(p, role, drive);
                            }
                        }
                    }
                }
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    fn push_pin_text<const N: usize>(&self, text: &mut heapless::String<N>) {
        for port in Port::ALL {
            let inputs = level_chars(self.pins().input_levels(port), InputRole::ALL.len());
            let outputs = level_chars(self.pins().output_levels(port), OutputRole::ALL.len());
            for c in inputs.chain(outputs) {
                let _ = text.push(c);
            }
            let _ = text.push(' ');
        }
        let _ = text.push('\r');
    }

    /// Pin levels and raw ADC counts as terminal text.
    pub fn read_analog(&self) -> AnalogText {
        let mut text = AnalogText::new();
        self.push_pin_text(&mut text);
        let _ = text.push_str("\x1b[B");
        let samples = self.analog().samples.as_array();
        for (slot, counts) in samples.iter().enumerate() {
            let end = if slot + 1 == ADC_SLOTS { '\r' } else { ' ' };
            let _ = write!(text, "{:04}{}", counts, end);
        }
        let _ = text.push_str("\x1b[A");
        text
    }

    /// Pin levels as text, NUL terminated.
    pub fn read_pins(&self) -> heapless::String<PIN_TEXT_LENGTH> {
        let mut text = heapless::String::new();
        self.push_pin_text(&mut text);
        let _ = text.push('\0');
        text
    }

    /// Published device type codes: inputs, outputs, `\r`, NUL.
    pub fn read_types(&self) -> [u8; TYPE_SNAPSHOT_LENGTH] {
        let mut out = [0u8; TYPE_SNAPSHOT_LENGTH];
        for port in Port::ALL {
            out[port.index()] = self.analog().input(port).device.code();
            out[INPUT_PORTS + port.index()] = self.analog().output(port).device.code();
        }
        out[INPUT_PORTS + OUTPUT_PORTS] = b'\r';
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DcmConfig};
    use crate::dcm::DcmState;
    use crate::hal::{InputDevice, MockAdc, MockPins};

    fn controller() -> DcmController<MockPins, MockAdc> {
        let config = Config::default().with_dcm(DcmConfig::default().with_device_reset_ms(20));
        DcmController::new(MockPins::new(), MockAdc::new(), &config).unwrap()
    }

    #[test]
    fn layout_lengths() {
        assert_eq!(ANALOG_TEXT_LENGTH, 131);
        assert_eq!(PIN_TEXT_LENGTH, 46);
        assert_eq!(TYPE_SNAPSHOT_LENGTH, 10);
    }

    #[test]
    fn control_rejects_short_and_unknown() {
        let mut ctl = controller();
        assert_eq!(ctl.write_control(b""), Err(ControlError::Empty));
        assert_eq!(
            ctl.write_control(b"e01"),
            Err(ControlError::TooShort {
                expected: 5,
                actual: 3
            })
        );
        assert_eq!(
            ctl.write_control(b"q----"),
            Err(ControlError::UnknownCommand(b'q'))
        );
    }

    #[test]
    fn enable_command_per_port() {
        let mut ctl = controller();
        assert_eq!(ctl.write_control(b"e0-0x"), Ok(5));
        assert!(!ctl.dcm().input(Port::P1).fsm_enabled());
        assert!(ctl.dcm().input(Port::P2).fsm_enabled());
        assert!(!ctl.dcm().input(Port::P3).fsm_enabled());
        assert!(ctl.dcm().input(Port::P4).fsm_enabled());

        ctl.write_control(b"e1---").unwrap();
        assert!(ctl.dcm().input(Port::P1).fsm_enabled());
    }

    #[test]
    fn type_command_needs_disabled_port() {
        let mut ctl = controller();
        ctl.run_for_ms(100).unwrap();

        // Detection still on: ignored.
        ctl.write_control(&[b't', 120, b'-', b'-', b'-']).unwrap();
        assert_eq!(ctl.analog().input(Port::P1), Classification::NONE);

        ctl.write_control(b"e0---").unwrap();
        ctl.run_for_ms(20).unwrap();
        assert_eq!(ctl.input_state(Port::P1), DcmState::Disabled);

        ctl.write_control(&[b't', 120, b'-', b'-', b'-']).unwrap();
        assert_eq!(
            ctl.analog().input(Port::P1),
            Classification::new(DeviceType::NxtIic, ConnectionClass::NxtIic)
        );

        // Unlisted codes are ignored.
        ctl.write_control(&[b't', 122, b'-', b'-', b'-']).unwrap();
        assert_eq!(ctl.analog().input(Port::P1).connection, ConnectionClass::NxtIic);
    }

    #[test]
    fn forced_codes() {
        assert_eq!(
            forced_classification(119),
            Some(Classification::new(DeviceType::NxtLight, ConnectionClass::NxtDumb))
        );
        assert_eq!(
            forced_classification(121),
            Some(Classification::new(DeviceType::Touch, ConnectionClass::InputDumb))
        );
        assert_eq!(forced_classification(126), Some(Classification::NONE));
        assert_eq!(forced_classification(b'-'), None);
        assert_eq!(forced_classification(127), None);
    }

    #[test]
    fn raw_pins_need_connected_port() {
        let mut ctl = controller();
        ctl.run_for_ms(100).unwrap();

        ctl.write_pins(b"2---").unwrap();
        assert_eq!(ctl.pins().input_drive(Port::P1, InputRole::Pin5), PinDrive::Float);

        let (pins, adc) = ctl.hardware_mut();
        InputDevice::Uart.plug(Port::P1, pins, adc);
        ctl.run_for_ms(500).unwrap();
        assert!(ctl.dcm().input(Port::P1).connected());

        ctl.write_pins(b"2---").unwrap();
        assert_eq!(ctl.pins().input_drive(Port::P1, InputRole::Pin5), PinDrive::High);
        ctl.write_pins(b"1---").unwrap();
        assert_eq!(ctl.pins().input_drive(Port::P1, InputRole::Pin5), PinDrive::Low);
        ctl.write_pins(b"f---").unwrap();
        assert_eq!(ctl.pins().input_drive(Port::P1, InputRole::Pin5), PinDrive::Float);

        assert!(ctl.write_pins(b"--").is_err());
    }

    #[test]
    fn color_command_restarts_session() {
        let mut ctl = controller();
        let (pins, adc) = ctl.hardware_mut();
        InputDevice::Uart.plug(Port::P2, pins, adc);
        ctl.run_for_ms(500).unwrap();

        ctl.write_pins(&[b'-', 0x0E, b'-', b'-']).unwrap();
        assert_eq!(ctl.input_state(Port::P2), DcmState::NxtColorInit);
        assert_eq!(ctl.dcm().input(Port::P2).command(), 0x0E);
    }

    #[test]
    fn test_mode_on_and_off() {
        let mut ctl = controller();
        ctl.test_pin(TestPinRequest::On).unwrap();
        assert!(ctl.dcm().test_mode());
        ctl.run_for_ms(100).unwrap();
        assert!(!ctl.dcm().is_running());

        ctl.test_pin(TestPinRequest::Off).unwrap();
        ctl.run_for_ms(100).unwrap();
        assert!(ctl.dcm().is_running());
    }

    #[test]
    fn test_pin_read_pads_and_terminates() {
        let mut ctl = controller();
        let text = ctl
            .test_pin(TestPinRequest::Read { port: 0, length: 8 })
            .unwrap()
            .unwrap();
        // Empty port: pin 1, 2, 5 pulled up, pin 6 and buffer low.
        assert_eq!(&text[..], b"11100  \0");

        let short = ctl
            .test_pin(TestPinRequest::Read { port: 5, length: 3 })
            .unwrap()
            .unwrap();
        assert_eq!(&short[..], b"00\0");

        assert_eq!(
            ctl.test_pin(TestPinRequest::Read { port: 8, length: 4 }),
            Err(ControlError::PortOutOfRange(8))
        );
        assert_eq!(
            ctl.test_pin(TestPinRequest::Read { port: 0, length: 17 }),
            Err(ControlError::InvalidLength(17))
        );
    }

    #[test]
    fn test_pin_write_drives_roles() {
        let mut ctl = controller();
        ctl.test_pin(TestPinRequest::Write {
            port: 1,
            data: b"1-0x",
        })
        .unwrap();
        assert_eq!(ctl.pins().input_drive(Port::P2, InputRole::Pin1), PinDrive::High);
        assert_eq!(ctl.pins().input_drive(Port::P2, InputRole::Pin5), PinDrive::Low);
        assert_eq!(ctl.pins().input_drive(Port::P2, InputRole::Pin6), PinDrive::Float);

        ctl.test_pin(TestPinRequest::Write {
            port: 7,
            data: b"11",
        })
        .unwrap();
        assert_eq!(ctl.pins().output_drive(Port::P4, OutputRole::Pin2), PinDrive::High);

        assert_eq!(
            ctl.test_pin(TestPinRequest::Write { port: 0, data: b"" }),
            Err(ControlError::InvalidLength(0))
        );
    }

    #[test]
    fn analog_text_layout() {
        let mut ctl = controller();
        ctl.run_for_ms(5).unwrap();
        let text = ctl.read_analog();
        assert_eq!(text.len(), ANALOG_TEXT_LENGTH);
        assert!(text.starts_with("1110000011 "));
        assert!(text.contains("\r\x1b[B4095 4095 4095 4095 0000 "));
        assert!(text.ends_with("\r\x1b[A"));
    }

    #[test]
    fn pin_text_and_types() {
        let ctl = controller();
        let pins = ctl.read_pins();
        assert_eq!(pins.len(), PIN_TEXT_LENGTH);
        assert!(pins.ends_with("\r\0"));

        let types = ctl.read_types();
        assert_eq!(types, [126, 126, 126, 126, 126, 126, 126, 126, b'\r', 0]);
    }
}
