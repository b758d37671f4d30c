//! Trait definitions for hardware abstraction and the legacy color link.
//!
//! # Submodules
//!
//! - `hardware`: port pin access and the ADC exchange
//! - `color`: session interface for the legacy color sensor protocol
//!
//! The connection manager is generic over [`PortPins`] and [`AdcSpi`] so it
//! runs unchanged against the desktop mocks and real peripherals. The color
//! protocol is an optional capability: when no [`ColorProtocol`] is supplied,
//! color candidates are reported as plain legacy analog sensors.

pub mod color;
pub mod hardware;

pub use color::*;
pub use hardware::*;
