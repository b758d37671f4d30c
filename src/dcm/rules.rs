//! Ordered classification tables.
//!
//! Each table is a list of [`Rule`]s evaluated top to bottom; the first rule
//! whose predicate matches decides. Every table ends with a catch-all so a
//! decision is always made.
//!
//! | Table | Evaluated when |
//! |-------|----------------|
//! | [`LEGACY_RULES`] | input pin 2 was pulled low |
//! | [`LOADED_RULES`] | input pin 1 was loaded |
//! | [`OUTPUT_RULES`] | output pin 5 left the balance band or pin 6 went low |
//! | [`DRIVEN_RULES`] | output pin 5 was re-measured while driven |

use super::{DcmState, Events};
use crate::thresholds::*;
use crate::types::{Classification, ConnectionClass as Conn, DeviceType as Dev};

/// One row of a classification table.
pub struct Rule<P, V> {
    /// Short description, used in trace output.
    pub name: &'static str,
    /// Predicate over the probe.
    pub matches: fn(&P) -> bool,
    /// Decision when the predicate matches.
    pub verdict: V,
}

/// First rule of `rules` matching `probe`.
pub fn first_match<'r, P, V>(rules: &'r [Rule<P, V>], probe: &P) -> Option<&'r Rule<P, V>> {
    rules.iter().find(|rule| (rule.matches)(probe))
}

const fn classify(device: Dev, connection: Conn) -> Classification {
    Classification::new(device, connection)
}

// ============================================================================
// Input: pin 2 low
// ============================================================================

const IN1_GND_COUNTS: u16 = mv_to_counts(IN1_NEAR_GND);
const IN1_5V_COUNTS: u16 = mv_to_counts(IN1_NEAR_5V);
const IN1_TOUCH_LOW_COUNTS: u16 = mv_to_counts(IN1_TOUCH_LOW);
const IN1_TOUCH_HIGH_COUNTS: u16 = mv_to_counts(IN1_TOUCH_HIGH);
const IN1_PIN2_COUNTS: u16 = mv_to_counts(IN1_NEAR_PIN2);

/// Input port snapshot taken when pin 2 was pulled low.
#[derive(Clone, Copy, Debug)]
pub struct LegacyProbe {
    /// Debounced event set.
    pub events: Events,
    /// Pin 1 in raw counts.
    pub pin1: u16,
}

impl LegacyProbe {
    fn pin5_low(&self) -> bool {
        self.events.contains(Events::PIN5_LOW)
    }

    fn pin6_high(&self) -> bool {
        self.events.contains(Events::PIN6_HIGH)
    }
}

/// Result of a legacy rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputVerdict {
    /// Classification to publish, if decided already.
    pub classification: Option<Classification>,
    /// State to continue in.
    pub next: DcmState,
}

const fn settled(device: Dev, connection: Conn) -> InputVerdict {
    InputVerdict {
        classification: Some(classify(device, connection)),
        next: DcmState::ConnectedWaitingForPin2High,
    }
}

const COLOR_SESSION: InputVerdict = InputVerdict {
    classification: Some(classify(Dev::NxtColor, Conn::NxtColor)),
    next: DcmState::NxtColorInit,
};

fn color_on_pin6(p: &LegacyProbe) -> bool {
    !p.pin5_low() && p.pin6_high() && p.pin1 < IN1_GND_COUNTS
}

fn iic(p: &LegacyProbe) -> bool {
    !p.pin5_low() && p.pin6_high()
}

fn test_fixture(p: &LegacyProbe) -> bool {
    p.pin5_low() && p.pin6_high()
}

fn light(p: &LegacyProbe) -> bool {
    p.pin5_low()
}

fn color(p: &LegacyProbe) -> bool {
    p.pin1 < IN1_GND_COUNTS
}

fn touch(p: &LegacyProbe) -> bool {
    p.pin1 > IN1_5V_COUNTS
}

fn touch_candidate(p: &LegacyProbe) -> bool {
    p.pin1 > IN1_TOUCH_LOW_COUNTS && p.pin1 < IN1_TOUCH_HIGH_COUNTS
}

fn always<P>(_: &P) -> bool {
    true
}

/// Legacy sensor identification (pin 2 low).
pub static LEGACY_RULES: [Rule<LegacyProbe, InputVerdict>; 8] = [
    Rule {
        name: "color sensor, pin 6 high",
        matches: color_on_pin6,
        verdict: COLOR_SESSION,
    },
    Rule {
        name: "legacy iic",
        matches: iic,
        verdict: settled(Dev::NxtIic, Conn::NxtIic),
    },
    Rule {
        name: "legacy test fixture",
        matches: test_fixture,
        verdict: settled(Dev::NxtTest, Conn::NxtDumb),
    },
    Rule {
        name: "legacy light",
        matches: light,
        verdict: settled(Dev::NxtLight, Conn::NxtDumb),
    },
    Rule {
        name: "color sensor",
        matches: color,
        verdict: COLOR_SESSION,
    },
    Rule {
        name: "legacy touch, released",
        matches: touch,
        verdict: settled(Dev::NxtTouch, Conn::NxtDumb),
    },
    Rule {
        name: "legacy touch, pressed",
        matches: touch_candidate,
        verdict: InputVerdict {
            classification: None,
            next: DcmState::NxtTouchCheck,
        },
    },
    Rule {
        name: "legacy sound",
        matches: always,
        verdict: settled(Dev::NxtSound, Conn::NxtDumb),
    },
];

// ============================================================================
// Input: pin 1 loaded
// ============================================================================

/// Input port snapshot taken when pin 1 was loaded.
#[derive(Clone, Copy, Debug)]
pub struct LoadedProbe {
    /// Pin 1 in raw counts.
    pub pin1: u16,
}

fn shorted_to_pin2(p: &LoadedProbe) -> bool {
    p.pin1 > IN1_PIN2_COUNTS
}

fn grounded(p: &LoadedProbe) -> bool {
    p.pin1 < IN1_GND_COUNTS
}

/// New-style input device identification (pin 1 loaded).
pub static LOADED_RULES: [Rule<LoadedProbe, Classification>; 3] = [
    Rule {
        name: "pin 1 near pin 2 supply",
        matches: shorted_to_pin2,
        verdict: Classification::ERROR,
    },
    Rule {
        name: "uart device",
        matches: grounded,
        verdict: classify(Dev::Unknown, Conn::InputUart),
    },
    Rule {
        name: "analog device",
        matches: always,
        verdict: classify(Dev::Unknown, Conn::InputDumb),
    },
];

// ============================================================================
// Output
// ============================================================================

/// Output port snapshot after measuring pin 5 floating and with pin 6 low.
#[derive(Clone, Copy, Debug)]
pub struct OutputProbe {
    /// Pin 5 with the port released (mV).
    pub float_mv: u16,
    /// Pin 5 after the pin 6 settle time (mV).
    pub low_mv: u16,
    /// Pin 6 was seen low while debouncing.
    pub pin6_low: bool,
}

impl OutputProbe {
    /// Both measurements agree within the match tolerance.
    pub fn steady(&self) -> bool {
        let delta = self.float_mv as i32 - self.low_mv as i32;
        delta > -OUT5_MATCH_TOLERANCE_MV && delta < OUT5_MATCH_TOLERANCE_MV
    }

    fn below_balance(&self) -> bool {
        self.steady() && self.float_mv < OUT5_BALANCE_LOW
    }
}

/// Which pin 5 measurement an actuator publishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pin5Sample {
    /// The floating measurement.
    Float,
    /// The second measurement.
    Low,
}

/// Result of an output rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputVerdict {
    /// Publish the classification.
    Connect(Classification),
    /// Plain actuator; publish its pin 5 level.
    Actuator(Pin5Sample),
    /// Drive pin 5 and measure again.
    ProbeDriven,
}

fn input_device_on_output(p: &OutputProbe) -> bool {
    p.steady() && within(p.float_mv, OUT5_BALANCE_LOW, OUT5_BALANCE_HIGH) && p.pin6_low
}

fn shorted(p: &OutputProbe) -> bool {
    p.steady() && p.float_mv < OUT5_NEAR_GND
}

fn light_band(p: &OutputProbe) -> bool {
    p.steady() && within(p.float_mv, OUT5_LIGHT_LOW, OUT5_LIGHT_HIGH)
}

fn iic_band(p: &OutputProbe) -> bool {
    p.steady() && within(p.float_mv, OUT5_IIC_LOW, OUT5_IIC_HIGH)
}

fn dumb_band(p: &OutputProbe) -> bool {
    p.below_balance() && within_upper_open(p.float_mv, OUT5_DUMB_LOW, OUT5_DUMB_HIGH)
}

fn intelligent_band(p: &OutputProbe) -> bool {
    p.below_balance()
        && within_upper_open(p.float_mv, OUT5_INTELLIGENT_LOW2, OUT5_INTELLIGENT_HIGH2)
}

fn newtacho_band(p: &OutputProbe) -> bool {
    p.below_balance() && within_upper_open(p.float_mv, OUT5_NEWTACHO_LOW2, OUT5_NEWTACHO_HIGH2)
}

fn minitacho_band(p: &OutputProbe) -> bool {
    p.below_balance() && within_upper_open(p.float_mv, OUT5_MINITACHO_LOW2, OUT5_MINITACHO_HIGH2)
}

fn tacho(p: &OutputProbe) -> bool {
    p.below_balance()
}

fn steady_high(p: &OutputProbe) -> bool {
    p.steady()
}

fn loaded_actuator(p: &OutputProbe) -> bool {
    p.low_mv > OUT5_NEAR_GND && p.low_mv < OUT5_BALANCE_LOW
}

/// Output device identification.
pub static OUTPUT_RULES: [Rule<OutputProbe, OutputVerdict>; 12] = [
    Rule {
        name: "input device on output port",
        matches: input_device_on_output,
        verdict: OutputVerdict::Connect(Classification::ERROR),
    },
    Rule {
        name: "pin 5 shorted",
        matches: shorted,
        verdict: OutputVerdict::Connect(Classification::ERROR),
    },
    Rule {
        name: "legacy light on output port",
        matches: light_band,
        verdict: OutputVerdict::Connect(Classification::ERROR),
    },
    Rule {
        name: "legacy iic on output port",
        matches: iic_band,
        verdict: OutputVerdict::Connect(Classification::ERROR),
    },
    Rule {
        name: "dumb actuator",
        matches: dumb_band,
        verdict: OutputVerdict::Actuator(Pin5Sample::Float),
    },
    Rule {
        name: "intelligent device",
        matches: intelligent_band,
        verdict: OutputVerdict::Connect(classify(Dev::Unknown, Conn::OutputIntelligent)),
    },
    Rule {
        name: "large motor, new revision",
        matches: newtacho_band,
        verdict: OutputVerdict::Connect(classify(Dev::NewTacho, Conn::OutputTacho)),
    },
    Rule {
        name: "medium motor",
        matches: minitacho_band,
        verdict: OutputVerdict::Connect(classify(Dev::MiniTacho, Conn::OutputTacho)),
    },
    Rule {
        name: "large motor",
        matches: tacho,
        verdict: OutputVerdict::Connect(classify(Dev::Tacho, Conn::OutputTacho)),
    },
    Rule {
        name: "pin 5 high, probe driven",
        matches: steady_high,
        verdict: OutputVerdict::ProbeDriven,
    },
    Rule {
        name: "actuator",
        matches: loaded_actuator,
        verdict: OutputVerdict::Actuator(Pin5Sample::Low),
    },
    Rule {
        name: "unstable pin 5",
        matches: always,
        verdict: OutputVerdict::Connect(Classification::ERROR),
    },
];

/// Output port pin 5 measured while driven.
#[derive(Clone, Copy, Debug)]
pub struct DrivenProbe {
    /// Pin 5 (mV).
    pub low_mv: u16,
}

fn driven_newtacho(p: &DrivenProbe) -> bool {
    within_upper_open(p.low_mv, OUT5_NEWTACHO_LOW1, OUT5_NEWTACHO_HIGH1)
}

fn driven_minitacho(p: &DrivenProbe) -> bool {
    within_upper_open(p.low_mv, OUT5_MINITACHO_LOW1, OUT5_MINITACHO_HIGH1)
}

/// Motor identification from the driven measurement.
pub static DRIVEN_RULES: [Rule<DrivenProbe, Classification>; 3] = [
    Rule {
        name: "large motor, new revision",
        matches: driven_newtacho,
        verdict: classify(Dev::NewTacho, Conn::OutputTacho),
    },
    Rule {
        name: "medium motor",
        matches: driven_minitacho,
        verdict: classify(Dev::MiniTacho, Conn::OutputTacho),
    },
    Rule {
        name: "large motor",
        matches: always,
        verdict: classify(Dev::Tacho, Conn::OutputTacho),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(events: Events, pin1_mv: u16) -> InputVerdict {
        let probe = LegacyProbe {
            events: events | Events::PIN2_LOW,
            pin1: mv_to_counts(pin1_mv),
        };
        first_match(&LEGACY_RULES, &probe).map(|r| r.verdict).unwrap()
    }

    fn output(float_mv: u16, low_mv: u16, pin6_low: bool) -> OutputVerdict {
        let probe = OutputProbe {
            float_mv,
            low_mv,
            pin6_low,
        };
        first_match(&OUTPUT_RULES, &probe).map(|r| r.verdict).unwrap()
    }

    fn connected(device: Dev, connection: Conn) -> OutputVerdict {
        OutputVerdict::Connect(classify(device, connection))
    }

    #[test]
    fn legacy_priorities() {
        let pin6 = Events::PIN6_HIGH;
        let pin5 = Events::PIN5_LOW;

        assert_eq!(legacy(pin6, 50).next, DcmState::NxtColorInit);
        assert_eq!(
            legacy(pin6, 2000).classification,
            Some(classify(Dev::NxtIic, Conn::NxtIic))
        );
        assert_eq!(
            legacy(pin5 | pin6, 50).classification,
            Some(classify(Dev::NxtTest, Conn::NxtDumb))
        );
        assert_eq!(
            legacy(pin5, 50).classification,
            Some(classify(Dev::NxtLight, Conn::NxtDumb))
        );
        assert_eq!(legacy(Events::NONE, 50).next, DcmState::NxtColorInit);
        assert_eq!(
            legacy(Events::NONE, 4900).classification,
            Some(classify(Dev::NxtTouch, Conn::NxtDumb))
        );
        assert_eq!(legacy(Events::NONE, 900).next, DcmState::NxtTouchCheck);
        assert_eq!(
            legacy(Events::NONE, 2000).classification,
            Some(classify(Dev::NxtSound, Conn::NxtDumb))
        );
    }

    #[test]
    fn touch_window_is_exclusive() {
        // 850 mV and 950 mV land exactly on a threshold count
        assert_ne!(legacy(Events::NONE, 850).next, DcmState::NxtTouchCheck);
        assert_ne!(legacy(Events::NONE, 950).next, DcmState::NxtTouchCheck);
    }

    #[test]
    fn loaded_rules() {
        let decide = |mv| {
            let probe = LoadedProbe {
                pin1: mv_to_counts(mv),
            };
            first_match(&LOADED_RULES, &probe).map(|r| r.verdict).unwrap()
        };
        assert_eq!(decide(4000), Classification::ERROR);
        assert_eq!(decide(50), classify(Dev::Unknown, Conn::InputUart));
        assert_eq!(decide(1500), classify(Dev::Unknown, Conn::InputDumb));
    }

    #[test]
    fn output_bands() {
        assert_eq!(output(180, 180, false), connected(Dev::Tacho, Conn::OutputTacho));
        assert_eq!(output(250, 250, false), connected(Dev::MiniTacho, Conn::OutputTacho));
        assert_eq!(output(449, 449, false), connected(Dev::MiniTacho, Conn::OutputTacho));
        assert_eq!(output(450, 450, false), connected(Dev::NewTacho, Conn::OutputTacho));
        assert_eq!(output(650, 650, false), OutputVerdict::Connect(Classification::ERROR));
        assert_eq!(output(850, 850, false), OutputVerdict::Connect(Classification::ERROR));
        assert_eq!(
            output(851, 851, false),
            connected(Dev::Unknown, Conn::OutputIntelligent)
        );
        assert_eq!(output(1150, 1150, false), OutputVerdict::Actuator(Pin5Sample::Float));
        assert_eq!(output(2350, 2350, false), connected(Dev::Tacho, Conn::OutputTacho));
        assert_eq!(output(50, 50, false), OutputVerdict::Connect(Classification::ERROR));
    }

    #[test]
    fn output_balance_and_high_bands() {
        assert_eq!(output(2500, 2500, true), OutputVerdict::Connect(Classification::ERROR));
        assert_eq!(output(2500, 2500, false), OutputVerdict::ProbeDriven);
        assert_eq!(output(3000, 3000, false), OutputVerdict::Connect(Classification::ERROR));
        assert_eq!(output(4000, 4000, false), OutputVerdict::ProbeDriven);
    }

    #[test]
    fn output_mismatch() {
        assert_eq!(output(2000, 1000, false), OutputVerdict::Actuator(Pin5Sample::Low));
        assert_eq!(output(2000, 100, false), OutputVerdict::Connect(Classification::ERROR));
        assert_eq!(output(4000, 3000, false), OutputVerdict::Connect(Classification::ERROR));
        // tolerance edge: 50 mV apart is already a mismatch
        assert_eq!(output(1250, 1200, false), OutputVerdict::Actuator(Pin5Sample::Low));
    }

    #[test]
    fn driven_bands() {
        let decide = |mv| {
            first_match(&DRIVEN_RULES, &DrivenProbe { low_mv: mv })
                .map(|r| r.verdict)
                .unwrap()
        };
        assert_eq!(decide(1200).device, Dev::NewTacho);
        assert_eq!(decide(1600).device, Dev::MiniTacho);
        assert_eq!(decide(2000).device, Dev::Tacho);
        assert_eq!(decide(500).device, Dev::Tacho);
    }
}
