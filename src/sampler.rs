//! Round-robin ADC sampler.
//!
//! The sampler walks a fixed schedule of ADC requests in bursts. Each entry
//! names the channel to request and where the value that arrives with it
//! belongs. Because the converter returns the result of the request made two
//! exchanges earlier, every schedule starts with two requests whose replies
//! are discarded and routes each reply two entries later than its request.
//!
//! Two schedules exist:
//!
//! - the **normal** schedule (10 entries) reads all input pins every cycle
//!   and one slow channel (output pin 5, power) per cycle;
//! - the **color** schedule (15 entries) additionally reads the four color
//!   conversions of one legacy color sensor per cycle and clocks its pin 5 so
//!   the sensor steps through its LEDs.
//!
//! A burst ends at an entry carrying a period selector; [`Sampler::tick`]
//! returns that period so the caller can re-arm its timer.
//!
//! # Cycle Completion
//!
//! When the last entry of a schedule has run:
//!
//! - the fast log of every port without an active color sensor gets the
//!   latest pin 1 / pin 6 pair;
//! - every port is flagged updated;
//! - the schedule for the next cycle is picked (color when any port has an
//!   active color sensor).

use tracing::debug;

use crate::analog::{AnalogData, ADC_SLOTS, SLOW_SLOT_BASE};
use crate::config::SamplerConfig;
use crate::traits::{AdcSpi, PortPins};
use crate::types::{InputRole, PinDrive, Port, INPUT_PORTS};

/// Physical ADC channel for each logical slot.
pub const ADC_CHANNEL_MAP: [u8; ADC_SLOTS] = [14, 12, 11, 9, 15, 13, 10, 8, 0, 1, 2, 3, 5, 4, 6, 7];

/// Base of a channel request word; the channel goes in bits 7-10.
pub const ADC_REQUEST: u16 = 0x1840;

/// Configuration word sent at start-up.
pub const ADC_SETUP: u16 = 0x400F;

/// Number of setup words sent at start-up.
pub const ADC_SETUP_WORDS: usize = 6;

/// Significant bits of a reply.
pub const ADC_SAMPLE_MASK: u16 = 0x0FFF;

/// Command latched by a legacy color sensor that needs pin 5 clocking.
pub const COLOR_CLOCKED_COMMAND: u8 = 0x0D;

/// Request word for a physical channel.
#[inline]
pub const fn request_word(channel: u8) -> u16 {
    ADC_REQUEST | (((channel & 0x0F) as u16) << 7)
}

// ============================================================================
// Schedule Tables
// ============================================================================

/// Channel requested by a schedule entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    /// A fixed logical slot.
    Slot(u8),
    /// The current slow slot (rotates through `8..16`).
    Slow,
    /// Pin 6 of the color port served this cycle.
    ColorPort,
}

/// Where the reply arriving at a schedule entry is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Pipeline filler, dropped.
    Discard,
    /// A fixed logical slot.
    Slot(u8),
    /// The current slow slot, which then advances.
    Slow,
    /// One raw color conversion of the color port served this cycle.
    ColorRaw(u8),
}

/// Pin 5 clock action on the color port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clock {
    /// Leave pin 5 alone.
    Hold,
    /// Drive pin 5 high.
    High,
    /// Release pin 5.
    Release,
    /// Drive pin 5 low.
    Low,
}

/// Period selector ending a burst.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pause {
    /// Continue the burst.
    None,
    /// End the burst; wait the first period.
    Short,
    /// End the burst; wait the second period.
    Long,
}

/// One step of a schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Channel requested.
    pub request: Request,
    /// Destination of the reply received with the request.
    pub reply: Reply,
    /// Pin 5 action for the color port.
    pub clock: Clock,
    /// Burst boundary.
    pub pause: Pause,
}

const fn entry(request: Request, reply: Reply, pause: Pause) -> Entry {
    Entry {
        request,
        reply,
        clock: Clock::Hold,
        pause,
    }
}

const fn clocked(request: Request, reply: Reply, clock: Clock, pause: Pause) -> Entry {
    Entry {
        request,
        reply,
        clock,
        pause,
    }
}

use Pause::{Long, None as Go, Short};
use Reply::{ColorRaw, Discard};

/// Schedule used while no legacy color sensor is active.
pub const NORMAL_SCHEDULE: [Entry; 10] = [
    entry(Request::Slot(0), Discard, Go),
    entry(Request::Slot(1), Reply::Slow, Go),
    entry(Request::Slot(2), Reply::Slot(0), Go),
    entry(Request::Slot(3), Reply::Slot(1), Short),
    entry(Request::Slot(4), Reply::Slot(2), Go),
    entry(Request::Slot(5), Reply::Slot(3), Go),
    entry(Request::Slot(6), Reply::Slot(4), Go),
    entry(Request::Slot(7), Reply::Slot(5), Long),
    entry(Request::Slow, Reply::Slot(6), Go),
    entry(Request::Slow, Reply::Slot(7), Short),
];

/// Schedule used while any legacy color sensor is active.
pub const COLOR_SCHEDULE: [Entry; 15] = [
    entry(Request::ColorPort, Discard, Go),
    clocked(Request::Slot(0), Reply::Slow, Clock::High, Go),
    entry(Request::Slot(1), ColorRaw(3), Go),
    entry(Request::Slot(2), Reply::Slot(0), Short),
    entry(Request::ColorPort, Reply::Slot(1), Go),
    clocked(Request::Slot(3), Reply::Slot(2), Clock::Low, Go),
    entry(Request::Slot(4), ColorRaw(0), Go),
    entry(Request::Slot(5), Reply::Slot(3), Short),
    entry(Request::ColorPort, Reply::Slot(4), Go),
    clocked(Request::Slot(6), Reply::Slot(5), Clock::Release, Go),
    entry(Request::Slot(7), ColorRaw(1), Go),
    entry(Request::Slow, Reply::Slot(6), Long),
    entry(Request::ColorPort, Reply::Slot(7), Go),
    clocked(Request::Slow, Discard, Clock::Low, Go),
    entry(Request::Slow, ColorRaw(2), Short),
];

/// Which schedule a cycle runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// [`NORMAL_SCHEDULE`]
    Normal,
    /// [`COLOR_SCHEDULE`]
    Color,
}

impl Schedule {
    /// Entries of this schedule.
    pub fn entries(self) -> &'static [Entry] {
        match self {
            Schedule::Normal => &NORMAL_SCHEDULE,
            Schedule::Color => &COLOR_SCHEDULE,
        }
    }
}

// ============================================================================
// Color Handshake
// ============================================================================

/// Per-port color state shared between the sampler and the connection
/// manager.
///
/// The connection manager writes `command` and `active`; the sampler latches
/// `command` for the served port and mirrors `active` into `clocking` once
/// per cycle. A command change is considered applied once it has been
/// latched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorHandshake {
    /// A color session completed and the port is in color mode.
    pub active: [bool; INPUT_PORTS],
    /// Command requested by the connection manager.
    pub command: [u8; INPUT_PORTS],
    /// Command as last latched by the sampler.
    pub latched: [u8; INPUT_PORTS],
    /// Pin 5 clocking enabled for the port.
    pub clocking: [bool; INPUT_PORTS],
}

impl ColorHandshake {
    /// `true` once the sampler has latched the requested command.
    #[inline]
    pub fn settled(&self, port: Port) -> bool {
        self.command[port.index()] == self.latched[port.index()]
    }

    /// `true` when any port is in color mode.
    pub fn any_active(&self) -> bool {
        self.active.iter().any(|a| *a)
    }
}

// ============================================================================
// Sampler
// ============================================================================

/// Schedule interpreter.
#[derive(Clone, Debug)]
pub struct Sampler {
    config: SamplerConfig,
    schedule: Schedule,
    pointer: usize,
    slow_slot: usize,
    color_port: usize,
}

impl Sampler {
    /// New sampler at the start of the normal schedule.
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            schedule: Schedule::Normal,
            pointer: 0,
            slow_slot: SLOW_SLOT_BASE,
            color_port: 0,
        }
    }

    /// Send the converter setup words.
    pub fn init<S: AdcSpi>(&mut self, spi: &mut S) -> Result<(), S::Error> {
        for _ in 0..ADC_SETUP_WORDS {
            spi.exchange(ADC_SETUP)?;
        }
        debug!("ADC configured");
        Ok(())
    }

    /// Delay before the first burst, in microseconds.
    pub fn first_period_us(&self) -> u32 {
        self.config.periods_us(false)[0]
    }

    /// Schedule currently running.
    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Next entry to run.
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Slot the next slow request targets.
    pub fn slow_slot(&self) -> usize {
        self.slow_slot
    }

    /// Color port served this cycle.
    pub fn color_port(&self) -> Port {
        Port::from_index(self.color_port).unwrap_or(Port::P1)
    }

    /// Run one burst and return the period until the next one.
    pub fn tick<S, P>(
        &mut self,
        spi: &mut S,
        pins: &mut P,
        analog: &mut AnalogData,
        color: &mut ColorHandshake,
    ) -> Result<u32, S::Error>
    where
        S: AdcSpi,
        P: PortPins,
    {
        if self.pointer == 0 {
            self.color_port = (self.color_port + 1) % INPUT_PORTS;
            analog.preempt_ms = analog.preempt_ms.wrapping_add(1);
        }

        let entries = self.schedule.entries();
        let periods = self.config.periods_us(self.schedule == Schedule::Color);
        let cp = self.color_port;

        let period = loop {
            let step = entries[self.pointer];

            let slot = match step.request {
                Request::Slot(slot) => slot as usize,
                Request::Slow => self.slow_slot,
                Request::ColorPort => INPUT_PORTS + cp,
            };
            let value = spi.exchange(request_word(ADC_CHANNEL_MAP[slot]))? & ADC_SAMPLE_MASK;

            match step.reply {
                Reply::Discard => {}
                Reply::Slot(slot) => analog.samples.set(slot as usize, value),
                Reply::Slow => {
                    analog.samples.set(self.slow_slot, value);
                    self.slow_slot += 1;
                    if self.slow_slot >= ADC_SLOTS {
                        self.slow_slot = SLOW_SLOT_BASE;
                    }
                }
                Reply::ColorRaw(color_index) => {
                    analog.nxt_color[cp].ad_raw[color_index as usize & 0x03] = value;
                }
            }

            if color.latched[cp] == COLOR_CLOCKED_COMMAND && color.clocking[cp] {
                if let Some(port) = Port::from_index(cp) {
                    match step.clock {
                        Clock::Hold => {}
                        Clock::High => pins.drive_input(port, InputRole::Pin5, PinDrive::High),
                        Clock::Release => pins.drive_input(port, InputRole::Pin5, PinDrive::Float),
                        Clock::Low => pins.drive_input(port, InputRole::Pin5, PinDrive::Low),
                    }
                }
            }

            self.pointer += 1;
            match step.pause {
                Pause::None if self.pointer < entries.len() => continue,
                Pause::None | Pause::Short => break periods[0],
                Pause::Long => break periods[1],
            }
        };

        if self.pointer >= entries.len() {
            self.pointer = 0;
            self.complete_cycle(analog, color);
        }

        Ok(period)
    }

    fn complete_cycle(&mut self, analog: &mut AnalogData, color: &mut ColorHandshake) {
        for port in Port::ALL {
            let p = port.index();
            if !color.active[p] {
                let pin1 = analog.samples.in_pin1(port);
                let pin6 = analog.samples.in_pin6(port);
                analog.logs[p].push(pin1, pin6);
            }
            color.clocking[p] = color.active[p];
            analog.updated[p] = true;
        }
        color.latched[self.color_port] = color.command[self.color_port];

        let next = if color.any_active() {
            Schedule::Color
        } else {
            Schedule::Normal
        };
        if next != self.schedule {
            debug!(?next, "sampler schedule switch");
            self.schedule = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_word_encodes_channel() {
        assert_eq!(request_word(0), 0x1840);
        assert_eq!(request_word(14), 0x1840 | (14 << 7));
        assert_eq!(request_word(0x1F), request_word(0x0F));
    }

    #[test]
    fn schedules_end_with_a_pause() {
        for schedule in [Schedule::Normal, Schedule::Color] {
            let last = schedule.entries().last().map(|e| e.pause);
            assert_ne!(last, Some(Pause::None));
        }
    }

    #[test]
    fn replies_trail_requests_by_two() {
        // Every fixed-slot reply matches the request issued two entries before.
        for schedule in [Schedule::Normal, Schedule::Color] {
            let entries = schedule.entries();
            for (i, step) in entries.iter().enumerate().skip(2) {
                if let Reply::Slot(slot) = step.reply {
                    assert_eq!(entries[i - 2].request, Request::Slot(slot), "{schedule:?} {i}");
                }
            }
        }
    }

    #[test]
    fn normal_schedule_takes_one_millisecond() {
        let config = SamplerConfig::default();
        let total: u32 = NORMAL_SCHEDULE
            .iter()
            .map(|e| match e.pause {
                Pause::None => 0,
                Pause::Short => config.normal_periods_us[0],
                Pause::Long => config.normal_periods_us[1],
            })
            .sum();
        assert_eq!(total, 1000);
    }
}
