//! Voltage thresholds and ADC count conversion.
//!
//! Every detection decision compares a sampled pin voltage against one of the
//! thresholds below. Thresholds are kept in millivolts; input-side decisions
//! compare raw 12-bit counts against [`mv_to_counts`] of a threshold, while
//! output-side decisions first convert the sample with [`counts_to_mv`].
//!
//! # Output Pin 5 Bands
//!
//! | Band | Range (mV) | Meaning |
//! |------|------------|---------|
//! | near ground | `< 100` | shorted / error |
//! | mini tacho (floating) | `[250, 450)` | medium motor |
//! | new tacho (floating) | `[450, 650)` | large motor, new revision |
//! | light | `[650, 850]` | error |
//! | intelligent | `[850, 1150)` | intelligent output device |
//! | dumb | `[1150, 2350)` | plain actuator |
//! | balance | `[2400, 2600]` | nothing connected |
//! | IIC | `[2800, 3700]` | error |
//!
//! # Example
//!
//! ```rust
//! use brick_dcm::thresholds::{counts_to_mv, mv_to_counts, IN1_NEAR_5V};
//!
//! assert_eq!(mv_to_counts(IN1_NEAR_5V), 3931);
//! assert_eq!(counts_to_mv(4095), 5000);
//! ```

/// ADC reference voltage in millivolts.
pub const ADC_REF_MV: u16 = 5000;

/// Full-scale ADC count (12-bit converter).
pub const ADC_RES: u16 = 4095;

/// Convert millivolts to raw ADC counts (truncating).
#[inline]
pub const fn mv_to_counts(mv: u16) -> u16 {
    ((mv as u32 * ADC_RES as u32) / ADC_REF_MV as u32) as u16
}

/// Convert raw ADC counts to millivolts (truncating).
#[inline]
pub const fn counts_to_mv(counts: u16) -> u16 {
    ((counts as u32 * ADC_REF_MV as u32) / ADC_RES as u32) as u16
}

// ============================================================================
// Input Port (pin 1 / pin 6)
// ============================================================================

/// Pin 1 above this is floating (nothing loads the pull-up).
pub const IN1_NEAR_5V: u16 = 4800;
/// Pin 1 above this while loaded is a short to the pin 2 supply.
pub const IN1_NEAR_PIN2: u16 = 3100;
/// Upper edge of the legacy touch-sensor window.
pub const IN1_TOUCH_HIGH: u16 = 950;
/// Lower edge of the legacy touch-sensor window.
pub const IN1_TOUCH_LOW: u16 = 850;
/// Pin 1 below this is pulled to ground.
pub const IN1_NEAR_GND: u16 = 100;
/// Pin 6 below this is pulled to ground.
pub const IN6_NEAR_GND: u16 = 150;

/// Maximum drift, in raw counts, allowed while confirming a touch sensor.
pub const TOUCH_TOLERANCE_COUNTS: i32 = 10;

// ============================================================================
// Output Port (pin 5)
// ============================================================================

/// Upper edge of the output IIC band.
pub const OUT5_IIC_HIGH: u16 = 3700;
/// Lower edge of the output IIC band.
pub const OUT5_IIC_LOW: u16 = 2800;

/// Upper edge of the balance band (open port).
pub const OUT5_BALANCE_HIGH: u16 = 2600;
/// Lower edge of the balance band (open port).
pub const OUT5_BALANCE_LOW: u16 = 2400;

/// Upper edge of the light band.
pub const OUT5_LIGHT_HIGH: u16 = 850;
/// Lower edge of the light band.
pub const OUT5_LIGHT_LOW: u16 = 650;

/// Pin 5 below this is shorted to ground.
pub const OUT5_NEAR_GND: u16 = 100;

/// Upper edge of the dumb actuator band.
pub const OUT5_DUMB_HIGH: u16 = 2350;
/// Lower edge of the dumb actuator band.
pub const OUT5_DUMB_LOW: u16 = 1150;

/// Medium motor band when pin 5 is driven low.
pub const OUT5_MINITACHO_HIGH1: u16 = 2000;
/// Medium motor band when pin 5 is driven low.
pub const OUT5_MINITACHO_LOW1: u16 = 1600;

/// New-revision large motor band when pin 5 is driven low.
pub const OUT5_NEWTACHO_HIGH1: u16 = 1600;
/// New-revision large motor band when pin 5 is driven low.
pub const OUT5_NEWTACHO_LOW1: u16 = 1200;

/// Intelligent device band (driven).
pub const OUT5_INTELLIGENT_HIGH1: u16 = 1150;
/// Intelligent device band (driven).
pub const OUT5_INTELLIGENT_LOW1: u16 = 850;
/// Intelligent device band (floating).
pub const OUT5_INTELLIGENT_HIGH2: u16 = 1150;
/// Intelligent device band (floating).
pub const OUT5_INTELLIGENT_LOW2: u16 = 850;

/// New-revision large motor band (floating).
pub const OUT5_NEWTACHO_HIGH2: u16 = 650;
/// New-revision large motor band (floating).
pub const OUT5_NEWTACHO_LOW2: u16 = 450;

/// Medium motor band (floating).
pub const OUT5_MINITACHO_HIGH2: u16 = 450;
/// Medium motor band (floating).
pub const OUT5_MINITACHO_LOW2: u16 = 250;

/// Floating and driven-low pin 5 readings closer than this are "unchanged".
pub const OUT5_MATCH_TOLERANCE_MV: i32 = 50;

/// `true` when `mv` lies inside `[low, high]`.
#[inline]
pub const fn within(mv: u16, low: u16, high: u16) -> bool {
    mv >= low && mv <= high
}

/// `true` when `mv` lies inside `[low, high)`.
#[inline]
pub const fn within_upper_open(mv: u16, low: u16, high: u16) -> bool {
    mv >= low && mv < high
}
