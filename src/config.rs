//! Runtime configuration consumed by endpoints and serial links.
//!
//! `Config` is plain data: the application builds one (optionally by
//! deserializing it, when the `serde` feature is enabled) and hands it to
//! whichever endpoint or link is being opened. It is not itself part of
//! the wire protocol.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tunnelling / device-management layer requested in the connection's CRI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TunnelingLayer {
    /// `TUNNEL_LINKLAYER` (0x02) - data link layer tunnelling.
    LinkLayer,
    /// `TUNNEL_BUSMONITOR` (0x80) - passive bus monitoring.
    BusMonitorLayer,
    /// `TUNNEL_RAW` (0x04) - raw frame tunnelling.
    Raw,
}

impl TunnelingLayer {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::LinkLayer => 0x02,
            Self::BusMonitorLayer => 0x80,
            Self::Raw => 0x04,
        }
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x02 => Some(Self::LinkLayer),
            0x80 => Some(Self::BusMonitorLayer),
            0x04 => Some(Self::Raw),
            _ => None,
        }
    }
}

impl Default for TunnelingLayer {
    fn default() -> Self {
        Self::LinkLayer
    }
}

/// Process-wide serial system properties (§4.6); these back the two
/// deliberately-shared atomics described in the design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SystemProps {
    /// Initial max inter-byte delay for the TP-UART receive engine, in
    /// microseconds. Adapts upward at runtime up to 20 ms; never set below
    /// `50 * t_bit`.
    pub max_inter_byte_delay_us: u32,
    /// UART baud rate used to derive `t_bit` for TP-UART timing windows.
    pub uart_baud_rate: u32,
}

impl Default for SystemProps {
    fn default() -> Self {
        Self {
            max_inter_byte_delay_us: 50 * crate::serial::tpuart::T_BIT_NANOS_AT_9600 / 1000,
            uart_baud_rate: 9600,
        }
    }
}

/// Configuration shared by the serial links (FT1.2, TP-UART).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// OS-level serial port identifier (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port_id: String,
    /// Serial baud rate. Defaults to 19200, the FT1.2/TP-UART standard rate.
    pub baud_rate: u32,
    /// Whether the FT1.2 link carries cEMI frames (`true`) or legacy EMI2
    /// frames (`false`).
    pub use_cemi: bool,
    /// Whether UDP endpoints should use NAT HPAIs (0.0.0.0:0) instead of the
    /// locally bound address.
    pub nat: bool,
    /// Tunnelling layer requested on connect.
    pub tunneling_layer: TunnelingLayer,
    /// TP-UART addresses this host should positively acknowledge on the
    /// bus, beyond its own individual address.
    pub ack_addresses: Vec<crate::addressing::GroupAddress>,
    /// Process-wide TP-UART system properties.
    pub system: SystemProps,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port_id: String::new(),
            baud_rate: 19200,
            use_cemi: true,
            nat: false,
            tunneling_layer: TunnelingLayer::default(),
            ack_addresses: Vec::new(),
            system: SystemProps::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_standard_baud_rate() {
        assert_eq!(Config::default().baud_rate, 19200);
    }

    #[test]
    fn tunneling_layer_round_trips() {
        for layer in [
            TunnelingLayer::LinkLayer,
            TunnelingLayer::BusMonitorLayer,
            TunnelingLayer::Raw,
        ] {
            assert_eq!(TunnelingLayer::from_u8(layer.to_u8()), Some(layer));
        }
    }
}
