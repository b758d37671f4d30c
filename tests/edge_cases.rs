//! Whole-controller scenarios and timing edge cases.

use brick_dcm::hal::{InputDevice, MockAdc, MockPins, OutputDevice};
use brick_dcm::{
    Classification, Config, ControlError, DcmConfig, DcmController, DcmState, Port,
    SamplerConfig,
};

fn controller() -> DcmController<MockPins, MockAdc> {
    let config = Config::default().with_dcm(DcmConfig::default().with_device_reset_ms(20));
    DcmController::new(MockPins::new(), MockAdc::new(), &config).unwrap()
}

fn full_brick() -> DcmController<MockPins, MockAdc> {
    let mut ctl = controller();
    let (pins, adc) = ctl.hardware_mut();
    InputDevice::Uart.plug(Port::P1, pins, adc);
    InputDevice::Analog { pin1_mv: 2000 }.plug(Port::P2, pins, adc);
    InputDevice::NxtIic.plug(Port::P3, pins, adc);
    InputDevice::ShortedPin5.plug(Port::P4, pins, adc);
    OutputDevice::LargeMotor.plug(Port::P1, pins, adc);
    OutputDevice::MediumMotor.plug(Port::P2, pins, adc);
    OutputDevice::NewLargeMotor.plug(Port::P3, pins, adc);
    OutputDevice::Intelligent.plug(Port::P4, pins, adc);
    ctl
}

// ============================================================================
// Full brick
// ============================================================================

#[test]
fn every_port_classified_within_a_second() {
    let mut ctl = full_brick();
    ctl.run_for_ms(1000).unwrap();

    assert_eq!(
        ctl.read_types(),
        [125, 125, 123, 127, 7, 8, 9, 125, b'\r', 0]
    );
    let snapshot = ctl.snapshot();
    assert!(snapshot.inputs.iter().all(|p| p.connected));
    assert!(snapshot.outputs.iter().all(|p| p.connected));
}

#[test]
fn nothing_classified_before_holdoff_and_debounce() {
    let mut ctl = full_brick();
    ctl.run_for_ms(300).unwrap();
    assert_eq!(ctl.read_types(), [126, 126, 126, 126, 126, 126, 126, 126, b'\r', 0]);
}

#[test]
fn unplugging_clears_only_that_port() {
    let mut ctl = full_brick();
    ctl.run_for_ms(1000).unwrap();

    let (pins, adc) = ctl.hardware_mut();
    InputDevice::Open.plug(Port::P1, pins, adc);
    OutputDevice::Open.plug(Port::P3, pins, adc);
    ctl.run_for_ms(200).unwrap();

    assert_eq!(
        ctl.read_types(),
        [126, 125, 123, 127, 7, 8, 126, 125, b'\r', 0]
    );
    assert_eq!(ctl.input_state(Port::P1), DcmState::Floating);
    assert_eq!(ctl.output_state(Port::P3), DcmState::Floating);
}

#[test]
fn swapping_devices_reclassifies() {
    let mut ctl = full_brick();
    ctl.run_for_ms(1000).unwrap();

    let (pins, adc) = ctl.hardware_mut();
    OutputDevice::Actuator { pin5_mv: 1500 }.plug(Port::P1, pins, adc);
    // Still unbalanced: the port never sees a disconnect
    ctl.run_for_ms(1000).unwrap();
    assert_eq!(ctl.read_types()[4], 7);

    let (pins, adc) = ctl.hardware_mut();
    OutputDevice::Open.plug(Port::P1, pins, adc);
    ctl.run_for_ms(200).unwrap();
    let (pins, adc) = ctl.hardware_mut();
    OutputDevice::Actuator { pin5_mv: 1500 }.plug(Port::P1, pins, adc);
    ctl.run_for_ms(1000).unwrap();
    assert_eq!(ctl.read_types()[4], 125);
}

// ============================================================================
// Clock
// ============================================================================

#[test]
fn fine_steps_match_one_large_step() {
    let mut coarse = full_brick();
    let mut fine = full_brick();

    coarse.run_until(1_000_000).unwrap();
    let mut now = 0;
    while now < 1_000_000 {
        now = (now + 137).min(1_000_000);
        fine.run_until(now).unwrap();
    }

    assert_eq!(coarse.snapshot(), fine.snapshot());
    assert_eq!(
        coarse.analog().samples.as_array(),
        fine.analog().samples.as_array()
    );
}

#[test]
fn clock_never_runs_backwards() {
    let mut ctl = controller();
    ctl.run_for_ms(50).unwrap();
    let before = ctl.snapshot();

    ctl.run_until(10_000).unwrap();
    assert_eq!(ctl.now_us(), 50_000);
    assert_eq!(ctl.snapshot(), before);
}

#[test]
fn zero_length_run_is_noop() {
    let mut ctl = controller();
    ctl.run_for_ms(5).unwrap();
    let cycles = ctl.analog().preempt_ms;
    ctl.run_for_ms(0).unwrap();
    assert_eq!(ctl.analog().preempt_ms, cycles);
}

#[test]
fn zero_periods_still_advance_the_clock() {
    let config = Config::default()
        .with_dcm(DcmConfig {
            timer_resolution_ms: 0,
            ..DcmConfig::default().with_device_reset_ms(20)
        })
        .with_sampler(SamplerConfig {
            normal_periods_us: [0, 0],
            color_periods_us: [0, 0],
        });
    let mut ctl = DcmController::new(MockPins::new(), MockAdc::new(), &config).unwrap();

    ctl.run_until(50_000).unwrap();
    assert_eq!(ctl.now_us(), 50_000);
    assert!(ctl.snapshot().running);
    assert!(ctl.analog().preempt_ms > 0);
}

#[test]
fn bus_fault_is_recoverable() {
    let mut ctl = full_brick();
    ctl.run_for_ms(100).unwrap();
    ctl.spi_mut().fail = true;
    assert!(ctl.run_for_ms(10).is_err());

    ctl.spi_mut().fail = false;
    ctl.run_for_ms(1000).unwrap();
    assert_eq!(ctl.read_types()[0], 125);
}

// ============================================================================
// Control
// ============================================================================

#[test]
fn forced_type_survives_until_reenabled() {
    let mut ctl = full_brick();
    ctl.run_for_ms(1000).unwrap();

    ctl.write_control(b"e0---").unwrap();
    ctl.run_for_ms(10).unwrap();
    ctl.write_control(&[b't', 121, 126, 126, 126]).unwrap();
    assert_eq!(ctl.read_types()[0], 16);

    ctl.run_for_ms(1000).unwrap();
    assert_eq!(ctl.read_types()[0], 16);
    assert_eq!(ctl.input_state(Port::P1), DcmState::Disabled);

    ctl.write_control(b"e1---").unwrap();
    ctl.run_for_ms(20).unwrap();
    assert_eq!(ctl.analog().input(Port::P1), Classification::NONE);
    ctl.run_for_ms(1000).unwrap();
    assert_eq!(ctl.read_types()[0], 125);
}

#[test]
fn force_on_enabled_port_is_ignored() {
    let mut ctl = full_brick();
    ctl.run_for_ms(1000).unwrap();
    ctl.write_control(&[b't', 121, 121, 121, 121]).unwrap();
    assert_eq!(&ctl.read_types()[..4], &[125, 125, 123, 127]);
}

#[test]
fn malformed_control_buffers() {
    let mut ctl = controller();
    assert_eq!(ctl.write_control(b""), Err(ControlError::Empty));
    assert_eq!(
        ctl.write_control(b"e01"),
        Err(ControlError::TooShort {
            expected: 5,
            actual: 3
        })
    );
    assert_eq!(ctl.write_control(b"x----"), Err(ControlError::UnknownCommand(b'x')));
    assert_eq!(
        ctl.write_pins(b"--"),
        Err(ControlError::TooShort {
            expected: 4,
            actual: 2
        })
    );
}

#[test]
fn raw_pin_bytes_ignored_on_empty_ports() {
    let mut ctl = controller();
    ctl.run_for_ms(500).unwrap();
    let writes = ctl.pins().writes;
    assert_eq!(ctl.write_pins(b"1111"), Ok(4));
    assert_eq!(ctl.pins().writes, writes);
}
