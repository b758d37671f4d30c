//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `ehal`: `embedded-hal` 1.0 adapters for the ADC exchange (requires `embedded-hal` feature)

pub mod mock;

#[cfg(feature = "embedded-hal")]
pub mod ehal;

pub use mock::*;

#[cfg(feature = "embedded-hal")]
pub use ehal::*;
