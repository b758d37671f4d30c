//! # brick-dcm
//!
//! Analog front end and Device Connection Manager for a programmable brick
//! with four sensor input ports and four motor output ports.
//!
//! ## Features
//!
//! - **ADC round-robin sampler**: burst-driven schedule over a pipelined,
//!   multiplexed 12-bit converter, with a long schedule that interleaves
//!   legacy color sensor clocking
//! - **Connection manager**: one debounced state machine per port that
//!   detects plug/unplug and classifies the device from pin voltages
//! - **Legacy color protocol**: bit-level command/response exchange with
//!   first-generation color sensors
//! - **Control interfaces**: byte-level enable/force/raw-pin/test-pin
//!   writes and text/binary read layouts
//! - **Web surface** (`web` feature) and a desktop simulator (`sim` feature)
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware seams (port pins, ADC exchange, color protocol)
//! - `sampler` - Schedule tables and the per-tick burst executor
//! - `dcm` - Input and output port state machines plus classification rules
//! - `color` - Bit engine for the legacy color sensor
//! - `controller` - Ties everything together over one set of hardware
//! - `device` - Byte-level control and read interfaces
//! - `hal` - Concrete implementations (mock for testing, `embedded-hal` adapters)
//!
//! ## Example
//!
//! ```rust
//! use brick_dcm::hal::{InputDevice, MockAdc, MockPins, OutputDevice};
//! use brick_dcm::{Config, DcmController, DeviceType, Port};
//!
//! let mut controller =
//!     DcmController::new(MockPins::new(), MockAdc::new(), &Config::default()).unwrap();
//!
//! // Plug a large motor into output port A and an IIC sensor into input 3
//! let (pins, adc) = controller.hardware_mut();
//! OutputDevice::LargeMotor.plug(Port::P1, pins, adc);
//! InputDevice::NxtIic.plug(Port::P3, pins, adc);
//!
//! // Power-up hold-off (2 s) plus connect debounce
//! controller.run_for_ms(3000).unwrap();
//!
//! assert_eq!(controller.analog().output(Port::P1).device, DeviceType::Tacho);
//! assert_eq!(controller.analog().input(Port::P3).device, DeviceType::NxtIic);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Published data: raw samples, classifications, logs, color calibration.
pub mod analog;
/// Legacy color sensor bit engine.
pub mod color;
/// Builder-style configuration with the brick's default timings.
pub mod config;
/// Controller that coordinates the sampler, the connection manager and the color link.
pub mod controller;
/// Device Connection Manager state machines.
pub mod dcm;
/// Byte-level control and read interfaces.
pub mod device;
/// Control interface errors.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// ADC round-robin sampler.
pub mod sampler;
/// Threshold voltages and ADC conversions.
pub mod thresholds;
/// Core traits for hardware abstraction.
pub mod traits;
/// Port, pin and classification types.
pub mod types;

/// Network services for the HTTP API (feature-gated).
#[cfg(feature = "web")]
pub mod services;

// Re-exports for convenience
pub use analog::{AnalogData, FastLog, NxtColorData, PowerChannel, SampleSlots};
pub use controller::{BrickSnapshot, DcmController, PortSnapshot};
pub use dcm::{Dcm, DcmState, Events, Startup};
pub use device::TestPinRequest;
pub use error::ControlError;
pub use sampler::{Sampler, Schedule};
pub use traits::{AdcSpi, ColorProtocol, PortPins};
pub use types::{
    Classification, ConnectionClass, DeviceType, InputRole, OutputRole, PinDrive, Port,
};

// Config re-exports
pub use config::{ColorLinkConfig, Config, DcmConfig, SamplerConfig, WebConfig};
