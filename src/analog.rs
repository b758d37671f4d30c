//! Shared analog data: the sample slots, per-port fast logs, published
//! classifications and legacy color calibration blocks.
//!
//! [`AnalogData`] is the one structure both the sampler and the connection
//! manager write, and the one user-facing readers snapshot.
//!
//! # Sample Slots
//!
//! | Slots | Content |
//! |-------|---------|
//! | `0..4` | input pin 1, ports 1-4 |
//! | `4..8` | input pin 6, ports 1-4 |
//! | `8..12` | output pin 5, ports 1-4 |
//! | `12..16` | battery temperature, motor current, battery current, cell voltage |
//!
//! Slots `0..8` refresh every sampler cycle; slots `8..16` are read one per
//! cycle in rotation.

use crate::types::{Classification, Port, INPUT_PORTS, OUTPUT_PORTS};

/// Number of logical sample slots.
pub const ADC_SLOTS: usize = 16;

/// Depth of each per-port fast log.
pub const LOG_BUFFER_SIZE: usize = 300;

/// Size of a legacy color calibration block.
pub const NXT_COLOR_BYTES: usize = 54;

/// First slot of the slowly rotating channels.
pub const SLOW_SLOT_BASE: usize = 8;

// ============================================================================
// Sample Slots
// ============================================================================

/// Power channels sampled alongside the ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerChannel {
    /// Battery temperature.
    BatteryTemperature,
    /// Total motor current.
    MotorCurrent,
    /// Total battery current.
    BatteryCurrent,
    /// Battery cell voltage.
    CellVoltage,
}

/// Latest raw 12-bit reading of every logical slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleSlots {
    raw: [u16; ADC_SLOTS],
}

impl Default for SampleSlots {
    fn default() -> Self {
        Self {
            raw: [0; ADC_SLOTS],
        }
    }
}

impl SampleSlots {
    /// Raw reading of a slot.
    #[inline]
    pub fn get(&self, slot: usize) -> u16 {
        self.raw[slot]
    }

    /// Store a raw reading.
    #[inline]
    pub fn set(&mut self, slot: usize, value: u16) {
        self.raw[slot] = value;
    }

    /// All slots.
    pub fn as_array(&self) -> &[u16; ADC_SLOTS] {
        &self.raw
    }

    /// Input pin 1 of `port`.
    #[inline]
    pub fn in_pin1(&self, port: Port) -> u16 {
        self.raw[port.index()]
    }

    /// Input pin 6 of `port`.
    #[inline]
    pub fn in_pin6(&self, port: Port) -> u16 {
        self.raw[INPUT_PORTS + port.index()]
    }

    /// Output pin 5 of `port`.
    #[inline]
    pub fn out_pin5(&self, port: Port) -> u16 {
        self.raw[SLOW_SLOT_BASE + port.index()]
    }

    /// A power channel.
    #[inline]
    pub fn power(&self, channel: PowerChannel) -> u16 {
        self.raw[SLOW_SLOT_BASE + OUTPUT_PORTS + channel as usize]
    }
}

// ============================================================================
// Fast Log
// ============================================================================

/// Ring buffer of input pin 1 / pin 6 samples for one port.
///
/// `log_in` is the next write position, `actual` the last written one. When
/// the writer catches up with `log_out` the reader position is pushed ahead
/// so the oldest sample is dropped.
#[derive(Clone, Debug)]
pub struct FastLog {
    pin1: [u16; LOG_BUFFER_SIZE],
    pin6: [u16; LOG_BUFFER_SIZE],
    actual: u16,
    log_in: u16,
    log_out: u16,
}

impl Default for FastLog {
    fn default() -> Self {
        Self {
            pin1: [0; LOG_BUFFER_SIZE],
            pin6: [0; LOG_BUFFER_SIZE],
            actual: 0,
            log_in: 0,
            log_out: 0,
        }
    }
}

impl FastLog {
    /// Append one pin 1 / pin 6 pair.
    pub fn push(&mut self, pin1: u16, pin6: u16) {
        let at = self.log_in as usize;
        self.pin1[at] = pin1;
        self.pin6[at] = pin6;
        self.actual = self.log_in;
        self.log_in = wrap(self.log_in + 1);
        if self.log_in == self.log_out {
            self.log_out = wrap(self.log_out + 1);
        }
    }

    /// Rewind all three positions to zero.
    pub fn reset(&mut self) {
        self.actual = 0;
        self.log_in = 0;
        self.log_out = 0;
    }

    /// Position of the newest sample.
    pub fn actual(&self) -> u16 {
        self.actual
    }

    /// Next write position.
    pub fn log_in(&self) -> u16 {
        self.log_in
    }

    /// Oldest retained position.
    pub fn log_out(&self) -> u16 {
        self.log_out
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        (self.log_in as usize + LOG_BUFFER_SIZE - self.log_out as usize) % LOG_BUFFER_SIZE
    }

    /// `true` when no sample is retained.
    pub fn is_empty(&self) -> bool {
        self.log_in == self.log_out
    }

    /// Newest pin 1 / pin 6 pair, if any was written since the last reset.
    pub fn latest(&self) -> Option<(u16, u16)> {
        if self.is_empty() {
            return None;
        }
        let at = self.actual as usize;
        Some((self.pin1[at], self.pin6[at]))
    }

    /// Retained samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        (0..self.len()).map(move |n| {
            let at = (self.log_out as usize + n) % LOG_BUFFER_SIZE;
            (self.pin1[at], self.pin6[at])
        })
    }
}

#[inline]
fn wrap(position: u16) -> u16 {
    if position as usize >= LOG_BUFFER_SIZE {
        0
    } else {
        position
    }
}

// ============================================================================
// Legacy Color Data
// ============================================================================

/// Calibration block and raw readings of a legacy color sensor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NxtColorData {
    /// Calibration factors, three ranges by four colors.
    pub calibration: [[u32; 4]; 3],
    /// Range switch limits.
    pub cal_limits: [u16; 2],
    /// Block checksum as sent by the sensor.
    pub crc: u16,
    /// Raw per-color conversions (red, green, blue, blank).
    pub ad_raw: [u16; 4],
    /// Processed per-color readings.
    pub sensor_raw: [u16; 4],
}

impl NxtColorData {
    /// Unpack a received calibration block (little endian).
    pub fn load(&mut self, bytes: &[u8; NXT_COLOR_BYTES]) {
        let mut words = bytes.chunks_exact(4);
        for range in self.calibration.iter_mut() {
            for factor in range.iter_mut() {
                if let Some(w) = words.next() {
                    *factor = u32::from_le_bytes([w[0], w[1], w[2], w[3]]);
                }
            }
        }
        let tail = &bytes[48..];
        self.cal_limits = [
            u16::from_le_bytes([tail[0], tail[1]]),
            u16::from_le_bytes([tail[2], tail[3]]),
        ];
        self.crc = u16::from_le_bytes([tail[4], tail[5]]);
    }
}

// ============================================================================
// Analog Data
// ============================================================================

/// Everything the sampler and the connection manager publish.
#[derive(Clone, Debug, Default)]
pub struct AnalogData {
    /// Latest reading of each logical slot.
    pub samples: SampleSlots,
    /// Pin 5 reading of each output port at classification time (mV).
    pub out_pin5_low: [u16; OUTPUT_PORTS],
    /// Classification of each input port.
    pub inputs: [Classification; INPUT_PORTS],
    /// Classification of each output port.
    pub outputs: [Classification; OUTPUT_PORTS],
    /// Set for every port after each completed sampler cycle.
    pub updated: [bool; INPUT_PORTS],
    /// Completed sampler cycles.
    pub preempt_ms: u32,
    /// Fast log of each input port.
    pub logs: [FastLog; INPUT_PORTS],
    /// Legacy color data of each input port.
    pub nxt_color: [NxtColorData; INPUT_PORTS],
}

impl AnalogData {
    /// Fresh data with every port unclassified.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classification of an input port.
    #[inline]
    pub fn input(&self, port: Port) -> Classification {
        self.inputs[port.index()]
    }

    /// Classification of an output port.
    #[inline]
    pub fn output(&self, port: Port) -> Classification {
        self.outputs[port.index()]
    }

    /// Publish the classification of an input port.
    #[inline]
    pub fn set_input(&mut self, port: Port, classification: Classification) {
        self.inputs[port.index()] = classification;
    }

    /// Publish the classification of an output port.
    #[inline]
    pub fn set_output(&mut self, port: Port, classification: Classification) {
        self.outputs[port.index()] = classification;
    }
}
