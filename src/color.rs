//! Bit-banged link to legacy color sensors.
//!
//! A session resets the sensor by toggling pin 5 (clock), holds the line low
//! for the reset delay, clocks one command byte out on pin 6 (data) and then
//! clocks the 54-byte calibration block back in. Bytes travel LSB first; the
//! sensor samples data on the rising clock edge and the brick samples replies
//! on the falling edge.
//!
//! All ports share one fast bit timer. [`ColorLink::tick`] must be called at
//! the timer period while [`ColorLink::is_running`] is `true`.
//!
//! ```text
//!  Release ──► Sense ──► PulseHigh ──► PulseLow ──► Release ...
//!                 │          (after two pulses)
//!                 ▼
//!             ResetHold ──► LoadCommand ──► Transmit ──► Receive ──► Done ──► Idle
//! ```

use tracing::{debug, trace};

use crate::analog::NXT_COLOR_BYTES;
use crate::config::ColorLinkConfig;
use crate::traits::{ColorProtocol, PortPins};
use crate::types::{InputRole, PinDrive, Port, INPUT_PORTS};

/// Reset pulses sent before the reset hold.
const RESET_PULSES: u8 = 2;

/// Session step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No session.
    #[default]
    Idle,
    /// Release the clock line.
    Release,
    /// Sample the released clock line.
    Sense,
    /// Clock line driven high.
    PulseHigh,
    /// Hold the clock line low for the reset delay.
    ResetHold,
    /// Queue the command byte.
    LoadCommand,
    /// Command byte going out.
    Transmit,
    /// Calibration block coming in.
    Receive,
    /// Transfer finished.
    Done,
}

#[derive(Clone, Debug)]
struct Session {
    state: LinkState,
    command: u8,
    shift: u8,
    transmit: bool,
    clock_high: bool,
    byte_index: usize,
    bytes_left: usize,
    bits_left: u8,
    reset_pulses: u8,
    hold_ticks: u16,
    buffer: [u8; NXT_COLOR_BYTES],
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: LinkState::Idle,
            command: 0,
            shift: 0,
            transmit: false,
            clock_high: false,
            byte_index: 0,
            bytes_left: 0,
            bits_left: 0,
            reset_pulses: 0,
            hold_ticks: 0,
            buffer: [0; NXT_COLOR_BYTES],
        }
    }
}

/// Per-port color sessions sharing one bit timer.
#[derive(Clone, Debug)]
pub struct ColorLink {
    sessions: [Session; INPUT_PORTS],
    in_use: u8,
    init_delay_ticks: u16,
}

impl ColorLink {
    /// New link with no session running.
    pub fn new(config: &ColorLinkConfig) -> Self {
        Self {
            sessions: Default::default(),
            in_use: 0,
            init_delay_ticks: config.init_delay_ticks(),
        }
    }

    /// `true` while any session holds the bit timer.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.in_use != 0
    }

    /// Session step of a port.
    pub fn state(&self, port: Port) -> LinkState {
        self.sessions[port.index()].state
    }

    /// Advance every running session by one bit-timer period.
    pub fn tick<P: PortPins>(&mut self, pins: &mut P) {
        for port in Port::ALL {
            if self.in_use & port.bit() != 0 {
                self.step(port, pins);
            }
        }
    }

    fn step<P: PortPins>(&mut self, port: Port, pins: &mut P) {
        let init_delay = self.init_delay_ticks;
        let s = &mut self.sessions[port.index()];
        if s.state == LinkState::Idle {
            return;
        }

        match s.state {
            LinkState::Release => {
                pins.drive_input(port, InputRole::Pin5, PinDrive::Float);
                s.state = LinkState::Sense;
            }
            LinkState::Sense => {
                if pins.read_input(port, InputRole::Pin5) && s.reset_pulses > 0 {
                    s.hold_ticks = 0;
                    s.state = LinkState::ResetHold;
                } else {
                    pins.drive_input(port, InputRole::Pin5, PinDrive::High);
                    s.state = LinkState::PulseHigh;
                }
            }
            LinkState::PulseHigh => {
                pins.drive_input(port, InputRole::Pin5, PinDrive::Low);
                s.reset_pulses += 1;
                s.state = if s.reset_pulses >= RESET_PULSES {
                    LinkState::ResetHold
                } else {
                    LinkState::Release
                };
            }
            LinkState::ResetHold => {
                pins.drive_input(port, InputRole::Pin5, PinDrive::Low);
                s.hold_ticks += 1;
                if s.hold_ticks >= init_delay {
                    s.state = LinkState::LoadCommand;
                }
            }
            LinkState::LoadCommand => {
                s.buffer[0] = s.command;
                s.bytes_left = 1;
                s.byte_index = 0;
                s.transmit = true;
                s.state = LinkState::Transmit;
            }
            LinkState::Transmit => {
                if s.bits_left == 0 && s.bytes_left == 0 {
                    s.bytes_left = NXT_COLOR_BYTES;
                    s.byte_index = 0;
                    s.transmit = false;
                    s.state = LinkState::Receive;
                }
            }
            LinkState::Receive => {
                if s.bits_left == 0 && s.bytes_left == 0 {
                    s.state = LinkState::Done;
                }
            }
            LinkState::Done | LinkState::Idle => {
                trace!(%port, "color transfer complete");
                s.state = LinkState::Idle;
            }
        }

        if s.bits_left > 0 {
            if !s.clock_high {
                if s.transmit {
                    let level = if s.shift & 0x01 != 0 {
                        PinDrive::High
                    } else {
                        PinDrive::Low
                    };
                    pins.drive_input(port, InputRole::Pin6, level);
                    s.shift >>= 1;
                } else {
                    pins.drive_input(port, InputRole::Pin6, PinDrive::Float);
                }
                pins.drive_input(port, InputRole::Pin5, PinDrive::High);
                s.clock_high = true;
            } else {
                s.bits_left -= 1;
                if !s.transmit {
                    s.shift >>= 1;
                    if pins.read_input(port, InputRole::Pin6) {
                        s.shift |= 0x80;
                    }
                    if s.bits_left == 0 {
                        s.buffer[s.byte_index] = s.shift;
                        s.byte_index += 1;
                    }
                }
                pins.drive_input(port, InputRole::Pin5, PinDrive::Low);
                s.clock_high = false;
            }
        } else if s.bytes_left > 0 {
            if s.transmit {
                s.shift = s.buffer[s.byte_index];
                s.byte_index += 1;
            }
            s.bits_left = 8;
            s.bytes_left -= 1;
        }
    }
}

impl ColorProtocol for ColorLink {
    fn start(&mut self, port: Port, command: u8) {
        let s = &mut self.sessions[port.index()];
        s.state = LinkState::Release;
        s.command = command;
        s.reset_pulses = 0;
        s.hold_ticks = 0;
        s.byte_index = 0;
        s.bytes_left = 0;
        s.bits_left = 0;
        s.clock_high = false;
        if self.in_use == 0 {
            debug!("color bit timer armed");
        }
        self.in_use |= port.bit();
        debug!(%port, command, "color session started");
    }

    fn ready(&self, port: Port) -> bool {
        self.sessions[port.index()].state == LinkState::Idle
    }

    fn stop(&mut self, port: Port) {
        let was_running = self.is_running();
        self.in_use &= !port.bit();
        self.sessions[port.index()].state = LinkState::Idle;
        if was_running && !self.is_running() {
            debug!("color bit timer cancelled");
        }
    }

    fn response(&self, port: Port) -> &[u8; NXT_COLOR_BYTES] {
        &self.sessions[port.index()].buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockPins;

    fn run_until_ready(link: &mut ColorLink, pins: &mut MockPins, port: Port) -> usize {
        let mut ticks = 0;
        while !link.ready(port) {
            link.tick(pins);
            ticks += 1;
            assert!(ticks < 10_000, "session never finished");
        }
        ticks
    }

    #[test]
    fn start_arms_and_stop_cancels_timer() {
        let mut link = ColorLink::new(&ColorLinkConfig::default());
        assert!(!link.is_running());

        link.start(Port::P1, 0);
        link.start(Port::P3, 0);
        assert!(link.is_running());
        assert!(!link.ready(Port::P1));

        link.stop(Port::P1);
        assert!(link.is_running());
        link.stop(Port::P3);
        assert!(!link.is_running());
        assert!(link.ready(Port::P3));

        // stopping twice is harmless
        link.stop(Port::P3);
        assert!(!link.is_running());
    }

    #[test]
    fn session_pulses_then_holds_reset() {
        let mut link = ColorLink::new(&ColorLinkConfig::default());
        let mut pins = MockPins::new();
        link.start(Port::P2, 0);

        // release, sense, pulse high, pulse low (first pulse)
        link.tick(&mut pins);
        assert_eq!(link.state(Port::P2), LinkState::Sense);
        link.tick(&mut pins);
        assert_eq!(pins.input_drive(Port::P2, InputRole::Pin5), PinDrive::High);
        link.tick(&mut pins);
        assert_eq!(pins.input_drive(Port::P2, InputRole::Pin5), PinDrive::Low);
        assert_eq!(link.state(Port::P2), LinkState::Release);

        // second round: clock line reads high again, straight to reset hold
        link.tick(&mut pins);
        link.tick(&mut pins);
        assert_eq!(link.state(Port::P2), LinkState::ResetHold);
    }

    #[test]
    fn full_session_receives_block() {
        let config = ColorLinkConfig {
            timer_us: 200,
            init_delay_ms: 1,
        };
        let mut link = ColorLink::new(&config);
        let mut pins = MockPins::new();
        // data line held high by the sensor: every received bit is one
        pins.set_input_level(Port::P4, InputRole::Pin6, true);

        link.start(Port::P4, 0x0E);
        let ticks = run_until_ready(&mut link, &mut pins, Port::P4);

        // reset (4) + hold (5) + load (1) + one byte out (17) + 54 bytes in (54 * 17) + done (2)
        assert!(ticks > 54 * 17, "{ticks}");
        assert!(link.response(Port::P4).iter().all(|b| *b == 0xFF));
        assert_eq!(pins.input_drive(Port::P4, InputRole::Pin5), PinDrive::Low);
    }

    #[test]
    fn command_bits_go_out_lsb_first() {
        let config = ColorLinkConfig {
            timer_us: 200,
            init_delay_ms: 1,
        };
        let mut link = ColorLink::new(&config);
        let mut pins = MockPins::new();
        link.start(Port::P1, 0b0000_0101);

        let mut sent = heapless::Vec::<PinDrive, 8>::new();
        let mut last_clock = PinDrive::Low;
        for _ in 0..200 {
            link.tick(&mut pins);
            let clock = pins.input_drive(Port::P1, InputRole::Pin5);
            if link.state(Port::P1) == LinkState::Transmit
                && clock == PinDrive::High
                && last_clock != PinDrive::High
            {
                let _ = sent.push(pins.input_drive(Port::P1, InputRole::Pin6));
            }
            last_clock = clock;
        }

        assert_eq!(sent.len(), 8);
        assert_eq!(sent[0], PinDrive::High);
        assert_eq!(sent[1], PinDrive::Low);
        assert_eq!(sent[2], PinDrive::High);
        assert!(sent[3..].iter().all(|d| *d == PinDrive::Low));
    }
}
