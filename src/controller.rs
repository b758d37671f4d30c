//! The controller that ties the sampler, the connection manager and the
//! legacy color link together.
//!
//! Three periodic jobs share the hardware:
//!
//! | Job | Period | Method |
//! |-----|--------|--------|
//! | sampler burst | 200-600 µs, chosen by the schedule | [`DcmController::sample_tick`] |
//! | connection manager | `timer_resolution_ms` | [`DcmController::dcm_tick`] |
//! | color bit timer | `timer_us`, only while a session runs | [`DcmController::color_tick`] |
//!
//! Callers either drive the jobs from their own timers, or hand the
//! controller a monotonic timestamp with [`DcmController::run_until`] and let
//! it run every job that is due, in time order.
//!
//! # Example
//!
//! ```rust
//! use brick_dcm::hal::{InputDevice, MockAdc, MockPins};
//! use brick_dcm::{Config, ConnectionClass, DcmConfig, DcmController, Port};
//!
//! let config = Config::default().with_dcm(DcmConfig::default().with_device_reset_ms(20));
//! let mut controller = DcmController::new(MockPins::new(), MockAdc::new(), &config).unwrap();
//!
//! let (pins, adc) = controller.hardware_mut();
//! InputDevice::Uart.plug(Port::P1, pins, adc);
//!
//! controller.run_for_ms(500).unwrap();
//! assert_eq!(controller.analog().input(Port::P1).connection, ConnectionClass::InputUart);
//! ```

use tracing::info;

use crate::analog::AnalogData;
use crate::color::ColorLink;
use crate::config::Config;
use crate::dcm::{Dcm, DcmState, TickContext};
use crate::sampler::{ColorHandshake, Sampler, Schedule};
use crate::thresholds::counts_to_mv;
use crate::traits::{AdcSpi, ColorProtocol, PortPins};
use crate::types::{Classification, Port};

// ============================================================================
// Snapshots
// ============================================================================

/// Published view of one port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortSnapshot {
    /// Port.
    pub port: Port,
    /// State machine position.
    pub state: DcmState,
    /// Published classification.
    pub classification: Classification,
    /// Whether a device is considered connected.
    pub connected: bool,
    /// Whether automatic detection runs (always `true` for outputs).
    pub fsm_enabled: bool,
    /// Input pin 1 or output pin 5 (mV).
    pub millivolts: u16,
}

/// Published view of the whole brick.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BrickSnapshot {
    /// Port state machines running (hold-off elapsed, test mode off).
    pub running: bool,
    /// Test mode engaged.
    pub test_mode: bool,
    /// Completed sampler cycles.
    pub sampler_cycles: u32,
    /// Sampler on the color schedule.
    pub color_schedule: bool,
    /// Input ports.
    pub inputs: [PortSnapshot; 4],
    /// Output ports.
    pub outputs: [PortSnapshot; 4],
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Clone, Copy, Debug)]
enum Job {
    Sample,
    Dcm,
    Color,
}

#[derive(Clone, Copy, Debug, Default)]
struct Deadlines {
    now_us: u64,
    sampler_us: u64,
    dcm_us: u64,
    color_us: Option<u64>,
}

/// Connection manager, sampler and color link over one set of hardware.
pub struct DcmController<P: PortPins, S: AdcSpi> {
    pins: P,
    spi: S,
    analog: AnalogData,
    sampler: Sampler,
    handshake: ColorHandshake,
    dcm: Dcm,
    color: Option<ColorLink>,
    color_period_us: u32,
    clock: Deadlines,
}

impl<P: PortPins, S: AdcSpi> DcmController<P, S> {
    /// Configure the converter and start with every port unclassified.
    pub fn new(pins: P, mut spi: S, config: &Config) -> Result<Self, S::Error> {
        let mut sampler = Sampler::new(config.sampler.clone());
        sampler.init(&mut spi)?;

        let color = config
            .dcm
            .legacy_color
            .then(|| ColorLink::new(&config.color));

        let clock = Deadlines {
            now_us: 0,
            sampler_us: sampler.first_period_us() as u64,
            dcm_us: config.dcm.tick_us() as u64,
            color_us: None,
        };

        info!(legacy_color = color.is_some(), "analog module ready");

        Ok(Self {
            pins,
            spi,
            analog: AnalogData::new(),
            sampler,
            handshake: ColorHandshake::default(),
            dcm: Dcm::new(config.dcm.clone()),
            color,
            color_period_us: config.color.timer_us.max(1),
            clock,
        })
    }

    // ------------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------------

    /// Run one sampler burst; returns the period until the next one (µs).
    pub fn sample_tick(&mut self) -> Result<u32, S::Error> {
        self.sampler.tick(
            &mut self.spi,
            &mut self.pins,
            &mut self.analog,
            &mut self.handshake,
        )
    }

    /// Run one connection manager tick.
    pub fn dcm_tick(&mut self) {
        let mut ctx = TickContext {
            pins: &mut self.pins,
            analog: &mut self.analog,
            handshake: &mut self.handshake,
            color: self.color.as_mut().map(|c| c as &mut dyn ColorProtocol),
        };
        self.dcm.tick(&mut ctx);
        self.sync_color_timer();
    }

    /// Run one color bit-timer period.
    pub fn color_tick(&mut self) {
        if let Some(link) = self.color.as_mut() {
            link.tick(&mut self.pins);
        }
    }

    /// `true` while the color bit timer must run.
    pub fn color_timer_running(&self) -> bool {
        self.color.as_ref().is_some_and(ColorLink::is_running)
    }

    fn sync_color_timer(&mut self) {
        match (self.color_timer_running(), self.clock.color_us) {
            (true, None) => {
                self.clock.color_us = Some(self.clock.now_us + self.color_period_us as u64)
            }
            (false, Some(_)) => self.clock.color_us = None,
            _ => {}
        }
    }

    /// Run every job due at or before `now_us`, earliest first.
    ///
    /// Jobs due at the same instant run sampler first, then the connection
    /// manager, then the color timer.
    pub fn run_until(&mut self, now_us: u64) -> Result<(), S::Error> {
        loop {
            let mut due = (self.clock.sampler_us, Job::Sample);
            if self.clock.dcm_us < due.0 {
                due = (self.clock.dcm_us, Job::Dcm);
            }
            if let Some(color_us) = self.clock.color_us {
                if color_us < due.0 {
                    due = (color_us, Job::Color);
                }
            }
            if due.0 > now_us {
                break;
            }

            self.clock.now_us = due.0;
            match due.1 {
                Job::Sample => {
                    let period = self.sample_tick()?;
                    self.clock.sampler_us += period as u64;
                }
                Job::Dcm => {
                    self.dcm_tick();
                    self.clock.dcm_us += self.dcm.config().tick_us() as u64;
                }
                Job::Color => {
                    self.color_tick();
                    self.clock.color_us = Some(due.0 + self.color_period_us as u64);
                    self.sync_color_timer();
                }
            }
        }
        self.clock.now_us = now_us.max(self.clock.now_us);
        Ok(())
    }

    /// Advance the controller clock by `ms` milliseconds.
    pub fn run_for_ms(&mut self, ms: u64) -> Result<(), S::Error> {
        self.run_until(self.clock.now_us + ms * 1000)
    }

    /// Controller clock (µs since construction).
    pub fn now_us(&self) -> u64 {
        self.clock.now_us
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// Switch automatic detection of an input port on or off.
    pub fn set_fsm_enabled(&mut self, port: Port, enabled: bool) {
        self.dcm.set_fsm_enabled(port, enabled);
    }

    /// Publish a classification for a disabled, connected input port.
    pub fn force_input(&mut self, port: Port, classification: Classification) -> bool {
        self.dcm.force_input(port, classification, &mut self.analog)
    }

    /// Queue a legacy color command on a connected input port.
    pub fn request_color_command(&mut self, port: Port, command: u8) -> bool {
        self.dcm.request_color_command(port, command)
    }

    /// Enter or leave test mode. Entering releases every port and clears
    /// every classification.
    pub fn set_test_mode(&mut self, on: bool) {
        self.dcm.set_test_mode(on);
        if on {
            for port in Port::ALL {
                self.pins.float_input_port(port);
                self.pins.float_output_port(port);
                self.analog.set_input(port, Classification::NONE);
                self.analog.set_output(port, Classification::NONE);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Published data.
    pub fn analog(&self) -> &AnalogData {
        &self.analog
    }

    /// Connection manager.
    pub fn dcm(&self) -> &Dcm {
        &self.dcm
    }

    /// Sampler.
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Color handshake shared by the sampler and the connection manager.
    pub fn handshake(&self) -> &ColorHandshake {
        &self.handshake
    }

    /// Legacy color link, when enabled.
    pub fn color_link(&self) -> Option<&ColorLink> {
        self.color.as_ref()
    }

    /// Port pins.
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Port pins, mutably.
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// ADC bus, mutably.
    pub fn spi_mut(&mut self) -> &mut S {
        &mut self.spi
    }

    /// Port pins and ADC bus together.
    pub fn hardware_mut(&mut self) -> (&mut P, &mut S) {
        (&mut self.pins, &mut self.spi)
    }

    /// State of an input port.
    pub fn input_state(&self, port: Port) -> DcmState {
        self.dcm.input(port).state()
    }

    /// State of an output port.
    pub fn output_state(&self, port: Port) -> DcmState {
        self.dcm.output(port).state()
    }

    /// Snapshot of every port.
    pub fn snapshot(&self) -> BrickSnapshot {
        let input = |port: Port| {
            let fsm = self.dcm.input(port);
            PortSnapshot {
                port,
                state: fsm.state(),
                classification: self.analog.input(port),
                connected: fsm.connected(),
                fsm_enabled: fsm.fsm_enabled(),
                millivolts: counts_to_mv(self.analog.samples.in_pin1(port)),
            }
        };
        let output = |port: Port| {
            let fsm = self.dcm.output(port);
            PortSnapshot {
                port,
                state: fsm.state(),
                classification: self.analog.output(port),
                connected: fsm.connected(),
                fsm_enabled: true,
                millivolts: counts_to_mv(self.analog.samples.out_pin5(port)),
            }
        };

        BrickSnapshot {
            running: self.dcm.is_running(),
            test_mode: self.dcm.test_mode(),
            sampler_cycles: self.analog.preempt_ms,
            color_schedule: self.sampler.schedule() == Schedule::Color,
            inputs: Port::ALL.map(input),
            outputs: Port::ALL.map(output),
        }
    }
}
