//! Device Connection Manager.
//!
//! One debounced state machine per input port and per output port watches
//! the sampled pin voltages and digital pin levels, decides when something
//! was plugged or unplugged, and publishes a [`Classification`] for the port.
//!
//! # Lifecycle
//!
//! ```text
//! Init ─► FloatingDelay ─► Floating ──(event held for connect_stable)──► Connection
//!   ▲                                                                        │
//!   │                                     classification rules (see rules.rs)│
//!   │                                                                        ▼
//!   └──────────(disconnect condition held for event_stable)────── Connected*Waiting*
//! ```
//!
//! Nothing runs until the power-up hold-off has elapsed and test mode is off.
//! Input ports can be taken out of automatic detection (`Disabled`) so user
//! space can force a classification.
//!
//! # Timing
//!
//! [`Dcm::tick`] runs once per `timer_resolution_ms`. Every delay in
//! [`DcmConfig`] is counted in those ticks.

mod input;
mod output;
pub mod rules;

pub use input::InputPort;
pub use output::OutputPort;

use core::ops::BitOr;

use tracing::info;

use crate::analog::AnalogData;
use crate::config::DcmConfig;
use crate::sampler::ColorHandshake;
use crate::traits::{ColorProtocol, PortPins};
use crate::types::{Classification, Port, INPUT_PORTS, OUTPUT_PORTS};

// ============================================================================
// States
// ============================================================================

/// Connection manager state of one port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DcmState {
    /// Release the port and clear the classification.
    #[default]
    Init,
    /// Let released pins settle.
    FloatingDelay,
    /// Watch for connect events.
    Floating,
    /// Output: re-measuring pin 5 while driven.
    WaitingForPin5Low,
    /// Output: second pin 5 measurement.
    WaitingForPin6Low,
    /// Dispatch on the debounced events.
    Connection,
    /// Input: pin 2 pulled low (legacy sensor).
    Pin2Low,
    /// Input: confirming a pressed legacy touch sensor.
    NxtTouchCheck,
    /// Input: preparing a legacy color session.
    NxtColorInit,
    /// Input: waiting for the sampler to latch the color command.
    NxtColorWait,
    /// Input: legacy color session running.
    NxtColorBusy,
    /// Input: connected, waiting for pin 2 to return high.
    ConnectedWaitingForPin2High,
    /// Input: pin 1 loaded (new-style device).
    Pin1Loaded,
    /// Input: connected, waiting for pin 1 to float.
    ConnectedWaitingForPin1ToFloat,
    /// Input: pin 6 pulled high (legacy IIC).
    Pin6High,
    /// Input: connected, waiting for pin 6 to drop.
    ConnectedWaitingForPin6Low,
    /// Input: pin 5 pulled low.
    Pin5Low,
    /// Input: connected, waiting for pin 5 to return high.
    ConnectedWaitingForPin5High,
    /// Output: connected, waiting for the port to open.
    ConnectedWaitingForPortOpen,
    /// Input: automatic detection switched off.
    Disabled,
}

impl DcmState {
    /// Diagnostic name.
    pub const fn name(self) -> &'static str {
        match self {
            DcmState::Init => "DCM_INIT",
            DcmState::FloatingDelay => "DCM_FLOATING_DELAY",
            DcmState::Floating => "DCM_FLOATING",
            DcmState::WaitingForPin5Low => "DCM_WAITING_FOR_PIN5_LOW",
            DcmState::WaitingForPin6Low => "DCM_WAITING_FOR_PIN6_LOW",
            DcmState::Connection => "DCM_CONNECTION",
            DcmState::Pin2Low => "DCM_PIN2_LOW",
            DcmState::NxtTouchCheck => "DCM_NXT_TOUCH_CHECK",
            DcmState::NxtColorInit => "DCM_NXT_COLOR_INIT",
            DcmState::NxtColorWait => "DCM_NXT_COLOR_WAIT",
            DcmState::NxtColorBusy => "DCM_NXT_COLOR_BUSY",
            DcmState::ConnectedWaitingForPin2High => "DCM_CONNECTED_WAITING_FOR_PIN2_HIGH",
            DcmState::Pin1Loaded => "DCM_PIN1_LOADED",
            DcmState::ConnectedWaitingForPin1ToFloat => "DCM_CONNECTED_WAITING_FOR_PIN1_TO_FLOAT",
            DcmState::Pin6High => "DCM_PIN6_HIGH",
            DcmState::ConnectedWaitingForPin6Low => "DCM_CONNECTED_WAITING_FOR_PIN6_LOW",
            DcmState::Pin5Low => "DCM_PIN5_LOW",
            DcmState::ConnectedWaitingForPin5High => "DCM_CONNECTED_WAITING_FOR_PIN5_HIGH",
            DcmState::ConnectedWaitingForPortOpen => "DCM_CONNECTED_WAITING_FOR_PORT_OPEN",
            DcmState::Disabled => "DCM_DISABLED",
        }
    }

    /// `true` while a legacy color session is being set up or running.
    pub const fn in_color_session(self) -> bool {
        matches!(
            self,
            DcmState::NxtColorInit | DcmState::NxtColorWait | DcmState::NxtColorBusy
        )
    }
}

impl core::fmt::Display for DcmState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Events
// ============================================================================

/// Set of connect conditions seen on a floating port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Events(u8);

impl Events {
    /// No condition.
    pub const NONE: Events = Events(0);
    /// Input pin 2 low.
    pub const PIN2_LOW: Events = Events(1 << 1);
    /// Input pin 5 low.
    pub const PIN5_LOW: Events = Events(1 << 2);
    /// Input pin 6 high.
    pub const PIN6_HIGH: Events = Events(1 << 3);
    /// Output pin 6 low.
    pub const PIN6_LOW: Events = Events(1 << 4);
    /// Input pin 1 loaded, or output pin 5 outside the balance band.
    pub const VALUE: Events = Events(1 << 6);

    /// `true` when every condition in `other` is present.
    #[inline]
    pub const fn contains(self, other: Events) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` when no condition is present.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bit pattern.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Add `other` when `present`.
    #[inline]
    pub fn set_if(&mut self, other: Events, present: bool) {
        if present {
            self.0 |= other.0;
        }
    }
}

impl BitOr for Events {
    type Output = Events;

    fn bitor(self, rhs: Events) -> Events {
        Events(self.0 | rhs.0)
    }
}

// ============================================================================
// Startup
// ============================================================================

/// Power-up sequence gating all port state machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Startup {
    /// Waiting for test mode to be switched off.
    WaitTestMode,
    /// About to start the hold-off.
    Reset,
    /// Counting down the hold-off.
    Holdoff(u16),
    /// Port state machines running.
    Running,
}

// ============================================================================
// Connection Manager
// ============================================================================

/// Shared resources a tick works on.
pub struct TickContext<'a, P: PortPins> {
    /// Port pins.
    pub pins: &'a mut P,
    /// Published data.
    pub analog: &'a mut AnalogData,
    /// Color command handshake with the sampler.
    pub handshake: &'a mut ColorHandshake,
    /// Legacy color protocol, when available.
    pub color: Option<&'a mut dyn ColorProtocol>,
}

/// All port state machines plus the power-up gate.
#[derive(Clone, Debug)]
pub struct Dcm {
    config: DcmConfig,
    startup: Startup,
    test_mode: bool,
    inputs: [InputPort; INPUT_PORTS],
    outputs: [OutputPort; OUTPUT_PORTS],
}

impl Dcm {
    /// New manager waiting for the power-up hold-off.
    pub fn new(config: DcmConfig) -> Self {
        Self {
            config,
            startup: Startup::WaitTestMode,
            test_mode: false,
            inputs: Default::default(),
            outputs: Default::default(),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &DcmConfig {
        &self.config
    }

    /// Power-up sequence position.
    pub fn startup(&self) -> Startup {
        self.startup
    }

    /// `true` once port state machines run.
    pub fn is_running(&self) -> bool {
        self.startup == Startup::Running
    }

    /// `true` while test mode holds the manager off.
    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// Enter or leave test mode. Either way the power-up sequence restarts
    /// and every port returns to `Init`.
    pub fn set_test_mode(&mut self, on: bool) {
        self.test_mode = on;
        self.startup = Startup::WaitTestMode;
        for input in self.inputs.iter_mut() {
            input.reset();
        }
        for output in self.outputs.iter_mut() {
            output.reset();
        }
        info!(on, "test mode");
    }

    /// Input port state machine.
    pub fn input(&self, port: Port) -> &InputPort {
        &self.inputs[port.index()]
    }

    /// Output port state machine.
    pub fn output(&self, port: Port) -> &OutputPort {
        &self.outputs[port.index()]
    }

    /// Switch automatic detection of an input port on or off.
    pub fn set_fsm_enabled(&mut self, port: Port, enabled: bool) {
        self.inputs[port.index()].fsm_enabled = enabled;
    }

    /// Publish a classification for an input port whose detection is off.
    ///
    /// Returns `false` (and changes nothing) unless the port is disabled and
    /// marked connected.
    pub fn force_input(
        &mut self,
        port: Port,
        classification: Classification,
        analog: &mut AnalogData,
    ) -> bool {
        let input = &self.inputs[port.index()];
        if input.fsm_enabled || !input.connected {
            return false;
        }
        analog.set_input(port, classification);
        true
    }

    /// Queue a legacy color command on a connected input port and restart
    /// the color session.
    pub fn request_color_command(&mut self, port: Port, command: u8) -> bool {
        let input = &mut self.inputs[port.index()];
        if !input.connected {
            return false;
        }
        input.command = command;
        input.timer = 0;
        input.state = DcmState::NxtColorInit;
        true
    }

    /// Run one tick of the power-up sequence or of every port.
    pub fn tick<P: PortPins>(&mut self, ctx: &mut TickContext<'_, P>) {
        match self.startup {
            Startup::WaitTestMode => {
                if !self.test_mode {
                    self.startup = Startup::Reset;
                }
            }
            Startup::Reset => self.startup = Startup::Holdoff(0),
            Startup::Holdoff(elapsed) => {
                let elapsed = elapsed + 1;
                self.startup = if elapsed >= self.config.device_reset_ticks() {
                    info!("connection manager running");
                    Startup::Running
                } else {
                    Startup::Holdoff(elapsed)
                };
            }
            Startup::Running => {
                for port in Port::ALL {
                    self.inputs[port.index()].tick(port, &self.config, ctx);
                }
                for port in Port::ALL {
                    self.outputs[port.index()].tick(port, &self.config, ctx);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(DcmState::Init.name(), "DCM_INIT");
        assert_eq!(
            DcmState::ConnectedWaitingForPortOpen.to_string(),
            "DCM_CONNECTED_WAITING_FOR_PORT_OPEN"
        );
        assert!(DcmState::NxtColorBusy.in_color_session());
        assert!(!DcmState::Floating.in_color_session());
    }

    #[test]
    fn events_set_operations() {
        let mut events = Events::NONE;
        assert!(events.is_empty());
        events.set_if(Events::PIN6_HIGH, true);
        events.set_if(Events::PIN5_LOW, false);
        assert!(events.contains(Events::PIN6_HIGH));
        assert!(!events.contains(Events::PIN5_LOW));
        assert_eq!((Events::PIN2_LOW | Events::VALUE).bits(), 0b0100_0010);
    }

    #[test]
    fn startup_holds_off_for_reset_delay() {
        use crate::hal::MockPins;

        let mut dcm = Dcm::new(DcmConfig::default().with_device_reset_ms(50));
        let mut pins = MockPins::new();
        let mut analog = AnalogData::new();
        let mut handshake = ColorHandshake::default();
        let mut ctx = TickContext {
            pins: &mut pins,
            analog: &mut analog,
            handshake: &mut handshake,
            color: None,
        };

        dcm.tick(&mut ctx);
        assert_eq!(dcm.startup(), Startup::Reset);
        dcm.tick(&mut ctx);
        assert_eq!(dcm.startup(), Startup::Holdoff(0));
        for _ in 0..4 {
            dcm.tick(&mut ctx);
        }
        assert!(!dcm.is_running());
        dcm.tick(&mut ctx);
        assert!(dcm.is_running());
    }

    #[test]
    fn test_mode_blocks_startup() {
        use crate::hal::MockPins;

        let mut dcm = Dcm::new(DcmConfig::default());
        dcm.set_test_mode(true);
        let mut pins = MockPins::new();
        let mut analog = AnalogData::new();
        let mut handshake = ColorHandshake::default();
        let mut ctx = TickContext {
            pins: &mut pins,
            analog: &mut analog,
            handshake: &mut handshake,
            color: None,
        };
        for _ in 0..10 {
            dcm.tick(&mut ctx);
        }
        assert_eq!(dcm.startup(), Startup::WaitTestMode);

        dcm.set_test_mode(false);
        dcm.tick(&mut ctx);
        assert_eq!(dcm.startup(), Startup::Reset);
    }
}
