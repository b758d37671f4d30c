//! Configuration for the connection manager, the ADC sampler, the legacy
//! color link and the optional web surface.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`. Every timing value defaults to the
//! brick's production constants; tests and the simulator shorten them with
//! the `with_*` builders.
//!
//! # Example
//!
//! ```rust
//! use brick_dcm::config::{Config, DcmConfig, WebConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.dcm.connect_stable_ticks(), 35);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_dcm(DcmConfig::default().with_device_reset_ms(100))
//!     .with_web(WebConfig::default().with_port(3000));
//! ```

use heapless::String as HString;

/// Maximum length for short config strings (host names)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let take = s.len().min(MAX_SHORT_STRING);
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, _)| *i < take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Connection manager timing and platform options
    pub dcm: DcmConfig,
    /// ADC sampler schedule periods
    pub sampler: SamplerConfig,
    /// Legacy color link timing
    pub color: ColorLinkConfig,
    /// Web server configuration
    pub web: WebConfig,
}

impl Config {
    /// Set connection manager configuration
    pub fn with_dcm(mut self, dcm: DcmConfig) -> Self {
        self.dcm = dcm;
        self
    }

    /// Set sampler configuration
    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    /// Set color link configuration
    pub fn with_color(mut self, color: ColorLinkConfig) -> Self {
        self.color = color;
        self
    }

    /// Set web configuration
    pub fn with_web(mut self, web: WebConfig) -> Self {
        self.web = web;
        self
    }
}

// ============================================================================
// Connection Manager Config
// ============================================================================

/// Connection manager timing and platform options.
///
/// Delays are given in milliseconds and converted to ticks of
/// `timer_resolution_ms` by the `*_ticks` accessors.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DcmConfig {
    /// Period of the connection manager tick
    pub timer_resolution_ms: u16,
    /// Hold-off after power-up before any port is evaluated
    pub device_reset_ms: u16,
    /// Settle time after releasing a port
    pub float_delay_ms: u16,
    /// Settle time after driving or releasing a sense pin
    pub low_delay_ms: u16,
    /// Confirmation time for a legacy touch sensor
    pub touch_delay_ms: u16,
    /// How long a connect event must hold before classification
    pub connect_stable_ms: u16,
    /// How long a disconnect condition must hold
    pub event_stable_ms: u16,
    /// Give-up time for a legacy color handshake
    pub color_timeout_ms: u16,
    /// Whether input pin 2 can be read on this board
    pub pin2_detection: bool,
    /// Whether the legacy color link is available
    pub legacy_color: bool,
}

impl Default for DcmConfig {
    fn default() -> Self {
        Self {
            timer_resolution_ms: 10,
            device_reset_ms: 2000,
            float_delay_ms: 20,
            low_delay_ms: 20,
            touch_delay_ms: 20,
            connect_stable_ms: 350,
            event_stable_ms: 100,
            color_timeout_ms: 500,
            pin2_detection: false,
            legacy_color: true,
        }
    }
}

impl DcmConfig {
    #[inline]
    fn ticks(&self, ms: u16) -> u16 {
        ms / self.timer_resolution_ms.max(1)
    }

    /// Set the power-up hold-off
    pub fn with_device_reset_ms(mut self, ms: u16) -> Self {
        self.device_reset_ms = ms;
        self
    }

    /// Set the connect debounce time
    pub fn with_connect_stable_ms(mut self, ms: u16) -> Self {
        self.connect_stable_ms = ms;
        self
    }

    /// Enable or disable pin 2 sensing
    pub fn with_pin2_detection(mut self, enabled: bool) -> Self {
        self.pin2_detection = enabled;
        self
    }

    /// Enable or disable the legacy color link
    pub fn with_legacy_color(mut self, enabled: bool) -> Self {
        self.legacy_color = enabled;
        self
    }

    /// Tick period in microseconds, never zero
    pub fn tick_us(&self) -> u32 {
        self.timer_resolution_ms.max(1) as u32 * 1000
    }

    /// Power-up hold-off in ticks
    pub fn device_reset_ticks(&self) -> u16 {
        self.ticks(self.device_reset_ms)
    }

    /// Float settle time in ticks
    pub fn float_delay_ticks(&self) -> u16 {
        self.ticks(self.float_delay_ms)
    }

    /// Sense settle time in ticks
    pub fn low_delay_ticks(&self) -> u16 {
        self.ticks(self.low_delay_ms)
    }

    /// Touch confirmation time in ticks
    pub fn touch_delay_ticks(&self) -> u16 {
        self.ticks(self.touch_delay_ms)
    }

    /// Connect debounce in ticks
    pub fn connect_stable_ticks(&self) -> u16 {
        self.ticks(self.connect_stable_ms)
    }

    /// Disconnect debounce in ticks
    pub fn event_stable_ticks(&self) -> u16 {
        self.ticks(self.event_stable_ms)
    }

    /// Color handshake timeout in ticks
    pub fn color_timeout_ticks(&self) -> u16 {
        self.ticks(self.color_timeout_ms)
    }
}

// ============================================================================
// Sampler Config
// ============================================================================

/// Periods between sampler bursts, in microseconds.
///
/// Each schedule entry ends a burst with a period selector `1` or `2`, which
/// picks index `0` or `1` of the matching array.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplerConfig {
    /// Periods used by the normal schedule
    pub normal_periods_us: [u32; 2],
    /// Periods used while a legacy color sensor is active
    pub color_periods_us: [u32; 2],
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            normal_periods_us: [200, 600],
            color_periods_us: [200, 400],
        }
    }
}

impl SamplerConfig {
    /// Periods for one schedule, each at least 1 µs
    pub fn periods_us(&self, color: bool) -> [u32; 2] {
        let [short, long] = if color {
            self.color_periods_us
        } else {
            self.normal_periods_us
        };
        [short.max(1), long.max(1)]
    }
}

// ============================================================================
// Color Link Config
// ============================================================================

/// Legacy color link timing
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorLinkConfig {
    /// Bit timer period in microseconds
    pub timer_us: u32,
    /// Reset hold before the command byte, in milliseconds
    pub init_delay_ms: u32,
}

impl Default for ColorLinkConfig {
    fn default() -> Self {
        Self {
            timer_us: 200,
            init_delay_ms: 100,
        }
    }
}

impl ColorLinkConfig {
    /// Reset hold expressed in bit-timer ticks
    pub fn init_delay_ticks(&self) -> u16 {
        (self.init_delay_ms * 1000 / self.timer_us.max(1)) as u16
    }
}

// ============================================================================
// Web Config
// ============================================================================

/// Web server configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WebConfig {
    /// Address to bind to
    pub host: ShortString,
    /// Port to listen on
    pub port: u16,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
    /// Whether web server is enabled
    pub enabled: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: short_string("0.0.0.0"),
            port: 8080,
            cors_permissive: true,
            enabled: true,
        }
    }
}

impl WebConfig {
    /// Set the bind address
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set CORS mode
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Enable or disable web server
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
