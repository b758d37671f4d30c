//! Port identifiers, pin roles and device classification codes.
//!
//! The brick has four input ports and four output ports. Each port exposes a
//! handful of logical pins ("roles") that the connection manager can read,
//! drive or release. The result of detection is a [`Classification`]: a
//! [`DeviceType`] paired with a [`ConnectionClass`], both carrying the numeric
//! codes published to user space.

use core::fmt;

/// Number of input ports.
pub const INPUT_PORTS: usize = 4;

/// Number of output ports.
pub const OUTPUT_PORTS: usize = 4;

// ============================================================================
// Ports
// ============================================================================

/// One of the four ports on either side of the brick.
///
/// Input and output ports share the same numbering; whether a `Port` refers to
/// an input or an output is decided by the API it is passed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Port {
    /// Port 1 (index 0).
    P1 = 0,
    /// Port 2 (index 1).
    P2 = 1,
    /// Port 3 (index 2).
    P3 = 2,
    /// Port 4 (index 3).
    P4 = 3,
}

impl Port {
    /// All ports in index order.
    pub const ALL: [Port; 4] = [Port::P1, Port::P2, Port::P3, Port::P4];

    /// Zero-based index of the port.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Port for a zero-based index.
    #[inline]
    pub const fn from_index(index: usize) -> Option<Port> {
        match index {
            0 => Some(Port::P1),
            1 => Some(Port::P2),
            2 => Some(Port::P3),
            3 => Some(Port::P4),
            _ => None,
        }
    }

    /// Single-bit mask for this port (`1 << index`).
    #[inline]
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index() + 1)
    }
}

// ============================================================================
// Pin Roles
// ============================================================================

/// Logical pins of an input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputRole {
    /// Analog sense pin with a pull-up (also the 9V supply on legacy sensors).
    Pin1,
    /// Auto-ID / legacy detect pin.
    Pin2,
    /// Digital pin 5 (legacy clock line).
    Pin5,
    /// Digital pin 6 (legacy data line).
    Pin6,
    /// Enable for the port's level-shifting buffer.
    Buffer,
}

impl InputRole {
    /// All input roles in bit order.
    pub const ALL: [InputRole; 5] = [
        InputRole::Pin1,
        InputRole::Pin2,
        InputRole::Pin5,
        InputRole::Pin6,
        InputRole::Buffer,
    ];
}

/// Logical pins of an output port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputRole {
    /// Motor drive line A.
    Pin1,
    /// Motor drive line B.
    Pin2,
    /// Pin 5 pull-down control.
    Pin5Write,
    /// Pin 5 digital sense.
    Pin5Read,
    /// Pin 6 (tacho B / detect).
    Pin6,
}

impl OutputRole {
    /// All output roles in bit order.
    pub const ALL: [OutputRole; 5] = [
        OutputRole::Pin1,
        OutputRole::Pin2,
        OutputRole::Pin5Write,
        OutputRole::Pin5Read,
        OutputRole::Pin6,
    ];
}

/// What to do with a pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PinDrive {
    /// Drive the pin high.
    High,
    /// Drive the pin low.
    Low,
    /// Release the pin (high impedance input).
    #[default]
    Float,
}

// ============================================================================
// Classification Codes
// ============================================================================

/// Detected device type, published with its numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum DeviceType {
    /// Legacy touch sensor.
    NxtTouch = 1,
    /// Legacy light sensor.
    NxtLight = 2,
    /// Legacy sound sensor.
    NxtSound = 3,
    /// Legacy color sensor.
    NxtColor = 4,
    /// Large motor.
    Tacho = 7,
    /// Medium motor.
    MiniTacho = 8,
    /// Large motor, new revision.
    NewTacho = 9,
    /// Touch sensor.
    Touch = 16,
    /// Legacy test fixture.
    NxtTest = 101,
    /// Legacy IIC device.
    NxtIic = 123,
    /// Present but not identified by the connection manager.
    Unknown = 125,
    /// Nothing connected.
    #[default]
    None = 126,
    /// Port fault.
    Error = 127,
}

impl DeviceType {
    /// Numeric type code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Type for a numeric code.
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::NxtTouch,
            2 => Self::NxtLight,
            3 => Self::NxtSound,
            4 => Self::NxtColor,
            7 => Self::Tacho,
            8 => Self::MiniTacho,
            9 => Self::NewTacho,
            16 => Self::Touch,
            101 => Self::NxtTest,
            123 => Self::NxtIic,
            125 => Self::Unknown,
            126 => Self::None,
            127 => Self::Error,
            _ => return None,
        })
    }
}

/// How a connected device talks to the brick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum ConnectionClass {
    /// Connection not yet determined.
    Unknown = 111,
    /// Legacy color sensor protocol.
    NxtColor = 118,
    /// Legacy analog sensor.
    NxtDumb = 119,
    /// Legacy IIC sensor.
    NxtIic = 120,
    /// Analog input device.
    InputDumb = 121,
    /// UART input device.
    InputUart = 122,
    /// Analog output device.
    OutputDumb = 123,
    /// Intelligent output device.
    OutputIntelligent = 124,
    /// Motor with tacho feedback.
    OutputTacho = 125,
    /// Nothing connected.
    #[default]
    None = 126,
    /// Port fault.
    Error = 127,
}

impl ConnectionClass {
    /// Numeric connection code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Connection class for a numeric code.
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            111 => Self::Unknown,
            118 => Self::NxtColor,
            119 => Self::NxtDumb,
            120 => Self::NxtIic,
            121 => Self::InputDumb,
            122 => Self::InputUart,
            123 => Self::OutputDumb,
            124 => Self::OutputIntelligent,
            125 => Self::OutputTacho,
            126 => Self::None,
            127 => Self::Error,
            _ => return None,
        })
    }
}

/// A device type paired with its connection class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Classification {
    /// Device type.
    pub device: DeviceType,
    /// Connection class.
    pub connection: ConnectionClass,
}

impl Classification {
    /// Nothing connected.
    pub const NONE: Self = Self::new(DeviceType::None, ConnectionClass::None);
    /// Port fault.
    pub const ERROR: Self = Self::new(DeviceType::Error, ConnectionClass::Error);

    /// Pair a device type with a connection class.
    #[inline]
    pub const fn new(device: DeviceType, connection: ConnectionClass) -> Self {
        Self { device, connection }
    }
}
