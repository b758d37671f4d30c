use tracing::{debug, trace, warn};

use super::rules::{first_match, LegacyProbe, LoadedProbe, LEGACY_RULES, LOADED_RULES};
use super::{DcmState, Events, TickContext};
use crate::config::DcmConfig;
use crate::thresholds::{mv_to_counts, IN1_NEAR_5V, TOUCH_TOLERANCE_COUNTS};
use crate::traits::PortPins;
use crate::types::{Classification, ConnectionClass, DeviceType, InputRole, Port};

const IN1_5V_COUNTS: u16 = mv_to_counts(IN1_NEAR_5V);

/// State machine of one input port.
#[derive(Clone, Debug)]
pub struct InputPort {
    pub(super) state: DcmState,
    old_state: DcmState,
    pub(super) connected: bool,
    pub(super) fsm_enabled: bool,
    pub(super) command: u8,
    pub(super) timer: u16,
    events: Events,
    value: u16,
}

impl Default for InputPort {
    fn default() -> Self {
        Self {
            state: DcmState::Init,
            old_state: DcmState::Init,
            connected: false,
            fsm_enabled: true,
            command: 0,
            timer: 0,
            events: Events::NONE,
            value: 0,
        }
    }
}

impl InputPort {
    /// Current state.
    pub fn state(&self) -> DcmState {
        self.state
    }

    /// `true` once a device has been classified (or detection is off).
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// `true` while automatic detection runs.
    pub fn fsm_enabled(&self) -> bool {
        self.fsm_enabled
    }

    /// Command sent to a legacy color sensor.
    pub fn command(&self) -> u8 {
        self.command
    }

    /// Debounced connect conditions.
    pub fn events(&self) -> Events {
        self.events
    }

    pub(super) fn reset(&mut self) {
        self.state = DcmState::Init;
        self.timer = 0;
        self.events = Events::NONE;
    }

    fn sense<P: PortPins>(
        &self,
        port: Port,
        config: &DcmConfig,
        ctx: &TickContext<'_, P>,
    ) -> Events {
        let mut events = Events::NONE;
        let pin2_low = config.pin2_detection && !ctx.pins.read_input(port, InputRole::Pin2);
        events.set_if(Events::PIN2_LOW, pin2_low);
        events.set_if(
            Events::VALUE,
            ctx.analog.samples.in_pin1(port) < IN1_5V_COUNTS,
        );
        events.set_if(Events::PIN5_LOW, !ctx.pins.read_input(port, InputRole::Pin5));
        events.set_if(Events::PIN6_HIGH, ctx.pins.read_input(port, InputRole::Pin6));
        events
    }

    fn pin2_high<P: PortPins>(
        &self,
        port: Port,
        config: &DcmConfig,
        ctx: &TickContext<'_, P>,
    ) -> bool {
        !config.pin2_detection || ctx.pins.read_input(port, InputRole::Pin2)
    }

    /// Count up while `held`, reset otherwise; `true` once the count reaches
    /// `limit`.
    fn debounce(&mut self, held: bool, limit: u16) -> bool {
        if held {
            self.timer += 1;
            self.timer >= limit
        } else {
            self.timer = 0;
            false
        }
    }

    fn disconnect(&mut self, port: Port) {
        self.connected = false;
        self.state = DcmState::Init;
        debug!(%port, "input disconnected");
    }

    pub(super) fn tick<P: PortPins>(
        &mut self,
        port: Port,
        config: &DcmConfig,
        ctx: &mut TickContext<'_, P>,
    ) {
        if !self.fsm_enabled {
            self.state = DcmState::Disabled;
        }

        match self.state {
            DcmState::Init => {
                ctx.handshake.active[port.index()] = false;
                if let Some(color) = ctx.color.as_deref_mut() {
                    color.stop(port);
                }
                ctx.pins.float_input_port(port);
                ctx.analog.set_input(port, Classification::NONE);
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
                let events = self.sense(port, config, ctx);
                if events != self.events {
                    trace!(%port, from = self.events.bits(), to = events.bits(), "input events");
                    self.events = events;
                    self.timer = 0;
                }
                if !self.events.is_empty() {
                    self.timer += 1;
                    if self.timer >= config.connect_stable_ticks() {
                        self.state = DcmState::Connection;
                    }
                }
            }
            DcmState::Connection => {
                self.state = if self.events.contains(Events::PIN2_LOW) {
                    DcmState::Pin2Low
                } else if self.events.contains(Events::VALUE) {
                    DcmState::Pin1Loaded
                } else if self.events.contains(Events::PIN6_HIGH) {
                    DcmState::Pin6High
                } else if self.events.contains(Events::PIN5_LOW) {
                    DcmState::Pin5Low
                } else {
                    DcmState::Init
                };
                ctx.analog.logs[port.index()].reset();
            }

            DcmState::Pin2Low => {
                self.connected = true;
                ctx.pins.float_input_port(port);
                self.timer = 0;

                let probe = LegacyProbe {
                    events: self.events,
                    pin1: ctx.analog.samples.in_pin1(port),
                };
                if let Some(rule) = first_match(&LEGACY_RULES, &probe) {
                    trace!(%port, rule = rule.name, "legacy rule");
                    let mut verdict = rule.verdict;
                    if verdict.next == DcmState::NxtColorInit && ctx.color.is_none() {
                        verdict.classification = Some(Classification::new(
                            DeviceType::NxtColor,
                            ConnectionClass::NxtDumb,
                        ));
                        verdict.next = DcmState::ConnectedWaitingForPin2High;
                    }
                    if verdict.next == DcmState::NxtTouchCheck {
                        self.value = probe.pin1;
                    }
                    if let Some(classification) = verdict.classification {
                        ctx.analog.set_input(port, classification);
                    }
                    self.state = verdict.next;
                }
            }
            DcmState::NxtTouchCheck => {
                self.timer += 1;
                if self.timer >= config.touch_delay_ticks() {
                    self.timer = 0;
                    self.state = DcmState::ConnectedWaitingForPin2High;
                    let drift = ctx.analog.samples.in_pin1(port) as i32 - self.value as i32;
                    let steady =
                        drift > -TOUCH_TOLERANCE_COUNTS && drift < TOUCH_TOLERANCE_COUNTS;
                    let device = if steady {
                        DeviceType::NxtTouch
                    } else {
                        DeviceType::NxtSound
                    };
                    ctx.analog
                        .set_input(port, Classification::new(device, ConnectionClass::NxtDumb));
                }
            }
            DcmState::NxtColorInit => {
                ctx.handshake.command[port.index()] = 0;
                self.timer = 0;
                match ctx.color.as_deref_mut() {
                    Some(color) => {
                        color.stop(port);
                        self.state = DcmState::NxtColorWait;
                    }
                    None => self.state = DcmState::ConnectedWaitingForPin2High,
                }
            }
            DcmState::NxtColorWait => match ctx.color.as_deref_mut() {
                Some(color) => {
                    if ctx.handshake.settled(port) {
                        color.start(port, self.command);
                        self.state = DcmState::NxtColorBusy;
                    }
                }
                None => self.state = DcmState::ConnectedWaitingForPin2High,
            },
            DcmState::NxtColorBusy => match ctx.color.as_deref_mut() {
                Some(color) => {
                    if color.ready(port) {
                        let p = port.index();
                        ctx.handshake.command[p] = self.command;
                        ctx.analog.nxt_color[p].load(color.response(port));
                        color.stop(port);
                        ctx.handshake.active[p] = true;
                        self.timer = 0;
                        self.state = DcmState::ConnectedWaitingForPin2High;
                        debug!(%port, command = self.command, "color sensor ready");
                    }
                    self.timer += 1;
                    if self.timer > config.color_timeout_ticks() {
                        warn!(%port, "color sensor handshake timed out");
                        color.stop(port);
                        self.timer = 0;
                        self.state = DcmState::ConnectedWaitingForPin2High;
                    }
                }
                None => self.state = DcmState::ConnectedWaitingForPin2High,
            },
            DcmState::ConnectedWaitingForPin2High => {
                let high = self.pin2_high(port, config, ctx);
                if self.debounce(high, config.event_stable_ticks()) {
                    self.disconnect(port);
                }
            }

            DcmState::Pin1Loaded => {
                let probe = LoadedProbe {
                    pin1: ctx.analog.samples.in_pin1(port),
                };
                if let Some(rule) = first_match(&LOADED_RULES, &probe) {
                    trace!(%port, rule = rule.name, "loaded rule");
                    ctx.analog.set_input(port, rule.verdict);
                }
                self.connected = true;
                self.timer = 0;
                self.state = DcmState::ConnectedWaitingForPin1ToFloat;
            }
            DcmState::ConnectedWaitingForPin1ToFloat => {
                let floating = ctx.analog.samples.in_pin1(port) > IN1_5V_COUNTS;
                if self.debounce(floating, config.event_stable_ticks()) {
                    self.disconnect(port);
                }
            }

            DcmState::Pin6High => {
                ctx.analog.set_input(
                    port,
                    Classification::new(DeviceType::NxtIic, ConnectionClass::NxtIic),
                );
                self.connected = true;
                self.timer = 0;
                self.state = DcmState::ConnectedWaitingForPin6Low;
            }
            DcmState::ConnectedWaitingForPin6Low => {
                let low = !ctx.pins.read_input(port, InputRole::Pin6);
                if self.debounce(low, config.event_stable_ticks()) {
                    self.disconnect(port);
                }
            }

            DcmState::Pin5Low => {
                ctx.analog.set_input(port, Classification::ERROR);
                self.connected = true;
                self.timer = 0;
                self.state = DcmState::ConnectedWaitingForPin5High;
            }
            DcmState::ConnectedWaitingForPin5High => {
                let high = ctx.pins.read_input(port, InputRole::Pin5);
                if self.debounce(high, config.event_stable_ticks()) {
                    self.disconnect(port);
                }
            }

            DcmState::Disabled => {
                if self.fsm_enabled {
                    self.state = DcmState::Init;
                } else {
                    if self.old_state.in_color_session() {
                        if let Some(color) = ctx.color.as_deref_mut() {
                            color.stop(port);
                        }
                    }
                    self.timer = 0;
                    self.connected = true;
                }
            }

            DcmState::WaitingForPin5Low
            | DcmState::WaitingForPin6Low
            | DcmState::ConnectedWaitingForPortOpen => self.state = DcmState::Init,
        }

        if self.state != self.old_state {
            debug!(%port, from = self.old_state.name(), to = self.state.name(), "input state");
            self.old_state = self.state;
        }
    }
}
