use tracing::{debug, trace};

use super::rules::{first_match, DrivenProbe, OutputProbe, OutputVerdict, Pin5Sample};
use super::rules::{DRIVEN_RULES, OUTPUT_RULES};
use super::{DcmState, Events, TickContext};
use crate::config::DcmConfig;
use crate::thresholds::{counts_to_mv, mv_to_counts, OUT5_BALANCE_HIGH, OUT5_BALANCE_LOW};
use crate::traits::PortPins;
use crate::types::{Classification, ConnectionClass, DeviceType, OutputRole, PinDrive, Port};

const BALANCE_LOW_COUNTS: u16 = mv_to_counts(OUT5_BALANCE_LOW);
const BALANCE_HIGH_COUNTS: u16 = mv_to_counts(OUT5_BALANCE_HIGH);

/// State machine of one output port.
#[derive(Clone, Debug)]
pub struct OutputPort {
    state: DcmState,
    old_state: DcmState,
    connected: bool,
    timer: u16,
    events: Events,
    float_mv: u16,
    low_mv: u16,
}

impl Default for OutputPort {
    fn default() -> Self {
        Self {
            state: DcmState::Init,
            old_state: DcmState::Init,
            connected: false,
            timer: 0,
            events: Events::NONE,
            float_mv: 0,
            low_mv: 0,
        }
    }
}

impl OutputPort {
    /// Current state.
    pub fn state(&self) -> DcmState {
        self.state
    }

    /// `true` once a device has been classified.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Pin 5 with the port released, as last measured (mV).
    pub fn float_mv(&self) -> u16 {
        self.float_mv
    }

    /// Pin 5 second measurement (mV).
    pub fn low_mv(&self) -> u16 {
        self.low_mv
    }

    pub(super) fn reset(&mut self) {
        self.state = DcmState::Init;
        self.timer = 0;
        self.events = Events::NONE;
    }

    fn unbalanced(pin5: u16) -> bool {
        !(BALANCE_LOW_COUNTS..=BALANCE_HIGH_COUNTS).contains(&pin5)
    }

    pub(super) fn tick<P: PortPins>(
        &mut self,
        port: Port,
        config: &DcmConfig,
        ctx: &mut TickContext<'_, P>,
    ) {
        let pin5 = ctx.analog.samples.out_pin5(port);

        match self.state {
            DcmState::Init => {
                ctx.pins.float_output_port(port);
                ctx.analog.set_output(port, Classification::NONE);
                self.connected = false;
                self.timer = 0;
                self.events = Events::NONE;
                self.state = DcmState::FloatingDelay;
            }
            DcmState::FloatingDelay => {
                self.timer += 1;
                if self.timer >= config.float_delay_ticks() {
                    self.timer = 0;
                    self.state = DcmState::Floating;
                }
            }
            DcmState::Floating => {
                let mut events = Events::NONE;
                events.set_if(Events::PIN6_LOW, !ctx.pins.read_output(port, OutputRole::Pin6));
                events.set_if(Events::VALUE, Self::unbalanced(pin5));
                if events != self.events {
                    trace!(%port, from = self.events.bits(), to = events.bits(), "output events");
                    self.events = events;
                    self.timer = 0;
                }
                if !self.events.is_empty() {
                    self.timer += 1;
                    if self.timer >= config.connect_stable_ticks() {
                        self.float_mv = counts_to_mv(pin5);
                        self.timer = 0;
                        self.state = DcmState::WaitingForPin6Low;
                        ctx.pins.drive_output(port, OutputRole::Pin6, PinDrive::Float);
                    }
                }
            }
            DcmState::WaitingForPin6Low => {
                self.timer += 1;
                if self.timer >= config.low_delay_ticks() {
                    self.low_mv = counts_to_mv(pin5);
                    self.state = DcmState::Connection;
                    ctx.pins.drive_output(port, OutputRole::Pin6, PinDrive::Float);
                }
            }
            DcmState::Connection => {
                self.state = DcmState::ConnectedWaitingForPortOpen;
                let probe = OutputProbe {
                    float_mv: self.float_mv,
                    low_mv: self.low_mv,
                    pin6_low: self.events.contains(Events::PIN6_LOW),
                };
                if let Some(rule) = first_match(&OUTPUT_RULES, &probe) {
                    trace!(%port, rule = rule.name, "output rule");
                    match rule.verdict {
                        OutputVerdict::Connect(classification) => {
                            ctx.analog.set_output(port, classification);
                            self.connected = true;
                        }
                        OutputVerdict::Actuator(sample) => {
                            let mv = match sample {
                                Pin5Sample::Float => self.float_mv,
                                Pin5Sample::Low => self.low_mv,
                            };
                            ctx.analog.out_pin5_low[port.index()] = mv;
                            ctx.analog.set_output(
                                port,
                                Classification::new(DeviceType::Unknown, ConnectionClass::OutputDumb),
                            );
                            self.connected = true;
                        }
                        OutputVerdict::ProbeDriven => {
                            ctx.pins.drive_output(port, OutputRole::Pin5Write, PinDrive::High);
                            self.state = DcmState::WaitingForPin5Low;
                        }
                    }
                }
                self.timer = 0;
                if self.connected {
                    debug!(
                        %port,
                        device = ?ctx.analog.output(port).device,
                        float_mv = self.float_mv,
                        low_mv = self.low_mv,
                        "output classified"
                    );
                }
            }
            DcmState::WaitingForPin5Low => {
                self.timer += 1;
                if self.timer >= config.low_delay_ticks() {
                    self.low_mv = counts_to_mv(pin5);
                    ctx.pins.drive_output(port, OutputRole::Pin5Write, PinDrive::Low);
                    let probe = DrivenProbe {
                        low_mv: self.low_mv,
                    };
                    if let Some(rule) = first_match(&DRIVEN_RULES, &probe) {
                        trace!(%port, rule = rule.name, "driven rule");
                        ctx.analog.set_output(port, rule.verdict);
                    }
                    self.connected = true;
                    // Settle ticks count toward the port-open debounce
                    self.state = DcmState::ConnectedWaitingForPortOpen;
                    debug!(%port, low_mv = self.low_mv, "output classified (driven)");
                }
            }
            DcmState::ConnectedWaitingForPortOpen => {
                if Self::unbalanced(pin5) || !ctx.pins.read_output(port, OutputRole::Pin6) {
                    self.timer = 0;
                }
                self.timer += 1;
                if self.timer >= config.event_stable_ticks() {
                    self.connected = false;
                    self.state = DcmState::Init;
                    debug!(%port, "output disconnected");
                }
            }
            _ => self.state = DcmState::Init,
        }

        if self.state != self.old_state {
            debug!(%port, from = self.old_state.name(), to = self.state.name(), "output state");
            self.old_state = self.state;
        }
    }
}
