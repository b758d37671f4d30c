//! Sampler tests against the mock converter.

use brick_dcm::analog::{AnalogData, ADC_SLOTS};
use brick_dcm::hal::{MockAdc, MockBusError, MockPins};
use brick_dcm::sampler::{ColorHandshake, Sampler, COLOR_CLOCKED_COMMAND};
use brick_dcm::{InputRole, PinDrive, Port, SamplerConfig, Schedule};

struct Rig {
    sampler: Sampler,
    adc: MockAdc,
    pins: MockPins,
    analog: AnalogData,
    color: ColorHandshake,
}

impl Rig {
    fn new() -> Self {
        let mut adc = MockAdc::new();
        for slot in 0..ADC_SLOTS {
            adc.set_slot(slot, 100 + 10 * slot as u16);
        }
        let mut sampler = Sampler::new(SamplerConfig::default());
        sampler.init(&mut adc).unwrap();
        Self {
            sampler,
            adc,
            pins: MockPins::new(),
            analog: AnalogData::new(),
            color: ColorHandshake::default(),
        }
    }

    fn tick(&mut self) -> u32 {
        self.sampler
            .tick(&mut self.adc, &mut self.pins, &mut self.analog, &mut self.color)
            .unwrap()
    }

    /// Run bursts until the schedule wraps.
    fn cycle(&mut self) -> Vec<u32> {
        let mut periods = vec![self.tick()];
        while self.sampler.pointer() != 0 {
            periods.push(self.tick());
        }
        periods
    }

    fn cycles(&mut self, n: usize) {
        for _ in 0..n {
            self.cycle();
        }
    }
}

// ============================================================================
// Normal schedule
// ============================================================================

#[test]
fn setup_words_precede_sampling() {
    let rig = Rig::new();
    assert_eq!(rig.adc.exchanges, 6);
    assert_eq!(rig.adc.last_word, 0x400F);
}

#[test]
fn normal_cycle_is_three_bursts() {
    let mut rig = Rig::new();
    assert_eq!(rig.cycle(), vec![200, 600, 200]);
    assert_eq!(rig.adc.exchanges, 6 + 10);
    assert_eq!(rig.analog.preempt_ms, 1);
}

#[test]
fn fast_slots_land_in_first_cycle() {
    let mut rig = Rig::new();
    rig.cycle();
    for slot in 0..8 {
        assert_eq!(rig.analog.samples.get(slot), 100 + 10 * slot as u16, "slot {slot}");
    }
}

#[test]
fn slow_slot_rotates_once_per_cycle() {
    let mut rig = Rig::new();
    assert_eq!(rig.sampler.slow_slot(), 8);
    rig.cycle();
    assert_eq!(rig.sampler.slow_slot(), 9);
    rig.cycles(7);
    assert_eq!(rig.sampler.slow_slot(), 8);
}

#[test]
fn every_slot_filled_after_full_rotation() {
    let mut rig = Rig::new();
    rig.cycles(20);
    for slot in 0..ADC_SLOTS {
        assert_eq!(rig.analog.samples.get(slot), 100 + 10 * slot as u16, "slot {slot}");
    }
    assert_eq!(rig.analog.samples.out_pin5(Port::P3), 100 + 10 * 10);
}

#[test]
fn sample_changes_follow_within_a_cycle() {
    let mut rig = Rig::new();
    rig.cycles(2);
    rig.adc.set_slot(Port::P2.index(), 4000);
    rig.cycle();
    assert_eq!(rig.analog.samples.in_pin1(Port::P2), 4000);
}

#[test]
fn cycle_end_logs_and_flags_ports() {
    let mut rig = Rig::new();
    rig.tick();
    assert!(rig.analog.updated.iter().all(|u| !u));
    assert!(rig.analog.logs[0].is_empty());

    rig.tick();
    rig.tick();
    assert!(rig.analog.updated.iter().all(|u| *u));
    for port in Port::ALL {
        let log = &rig.analog.logs[port.index()];
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.latest(),
            Some((
                100 + 10 * port.index() as u16,
                100 + 10 * (4 + port.index()) as u16
            ))
        );
    }

    rig.cycles(4);
    assert_eq!(rig.analog.logs[2].len(), 5);
}

#[test]
fn bus_fault_propagates() {
    let mut rig = Rig::new();
    rig.adc.fail = true;
    let result = rig
        .sampler
        .tick(&mut rig.adc, &mut rig.pins, &mut rig.analog, &mut rig.color);
    assert_eq!(result, Err(MockBusError));
}

// ============================================================================
// Color schedule
// ============================================================================

#[test]
fn active_color_port_switches_schedule() {
    let mut rig = Rig::new();
    rig.color.active[1] = true;
    rig.cycle();
    assert_eq!(rig.sampler.schedule(), Schedule::Color);
    assert_eq!(rig.cycle(), vec![200, 200, 400, 200]);

    rig.color.active[1] = false;
    rig.cycle();
    assert_eq!(rig.sampler.schedule(), Schedule::Normal);
}

#[test]
fn color_port_rotates() {
    let mut rig = Rig::new();
    let mut served = Vec::new();
    for _ in 0..5 {
        rig.tick();
        served.push(rig.sampler.color_port());
        rig.cycle();
    }
    assert_eq!(served, vec![Port::P2, Port::P3, Port::P4, Port::P1, Port::P2]);
}

#[test]
fn active_port_is_left_out_of_fast_log() {
    let mut rig = Rig::new();
    rig.color.active[1] = true;
    rig.cycles(3);
    assert!(rig.analog.logs[1].is_empty());
    assert_eq!(rig.analog.logs[0].len(), 3);
}

#[test]
fn color_conversions_read_pin6_of_served_port() {
    let mut rig = Rig::new();
    rig.adc.set_slot(4 + Port::P3.index(), 1234);
    rig.color.active[2] = true;
    // Normal cycle serving P2, then a color cycle serving P3
    rig.cycles(2);
    assert_eq!(rig.analog.nxt_color[2].ad_raw, [1234; 4]);
    assert_eq!(rig.analog.nxt_color[0].ad_raw, [0; 4]);
}

#[test]
fn command_latched_for_served_port_only() {
    let mut rig = Rig::new();
    rig.color.command[1] = 0x0E;
    rig.color.command[2] = 0x0E;
    rig.cycle();
    assert!(rig.color.settled(Port::P2));
    assert!(!rig.color.settled(Port::P3));
    rig.cycle();
    assert!(rig.color.settled(Port::P3));
}

#[test]
fn clocked_command_toggles_pin5() {
    let mut rig = Rig::new();
    rig.color.active[1] = true;
    rig.color.command[1] = COLOR_CLOCKED_COMMAND;
    // Cycle 1 serves P2 and latches; cycles 2-4 serve P3, P4, P1
    rig.cycles(4);
    assert_eq!(rig.pins.input_drive(Port::P2, InputRole::Pin5), PinDrive::Float);

    let mut drives = Vec::new();
    for _ in 0..4 {
        rig.tick();
        drives.push(rig.pins.input_drive(Port::P2, InputRole::Pin5));
    }
    assert_eq!(
        drives,
        vec![PinDrive::High, PinDrive::Low, PinDrive::Float, PinDrive::Low]
    );
    assert_eq!(rig.pins.input_drive(Port::P1, InputRole::Pin5), PinDrive::Float);
}

#[test]
fn unclocked_command_leaves_pin5() {
    let mut rig = Rig::new();
    rig.color.active[1] = true;
    rig.color.command[1] = 0x0E;
    rig.cycles(9);
    assert_eq!(rig.pins.writes, 0);
}
