//! KNXnet/IP protocol constants and service type identifiers.

/// KNXnet/IP protocol version 1.0 (all services except Object Server).
pub const KNXNETIP_VERSION_10: u8 = 0x10;

/// KNXnet/IP protocol version 2.0, used only by Object-Server services.
pub const KNXNETIP_VERSION_20: u8 = 0x20;

/// Standard KNXnet/IP header length (6 bytes)
pub const HEADER_SIZE_10: u8 = 0x06;

/// Standard UDP/TCP port for KNXnet/IP communication
pub const KNXNETIP_DEFAULT_PORT: u16 = 3671;

/// Maximum size of a KNXnet/IP frame
pub const MAX_FRAME_SIZE: usize = 256;

/// Maximum size of cEMI frame payload
pub const MAX_CEMI_SIZE: usize = 64;

/// KNXnet/IP multicast address for routing
pub const KNXNETIP_MULTICAST_ADDR: &str = "224.0.23.12";

/// System Setup Multicast Address
pub const SYSTEM_SETUP_MULTICAST: &str = "224.0.23.13";

// =============================================================================
// Service Type Identifiers
// =============================================================================

/// KNXnet/IP Service Type Identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ServiceType {
    // Core services (0x02xx)
    /// `SEARCH_REQUEST` - Device discovery request
    SearchRequest = 0x0201,
    /// `SEARCH_RESPONSE` - Device discovery response
    SearchResponse = 0x0202,
    /// `DESCRIPTION_REQUEST` - Device description request
    DescriptionRequest = 0x0203,
    /// `DESCRIPTION_RESPONSE` - Device description response
    DescriptionResponse = 0x0204,
    /// `CONNECT_REQUEST` - Connection request
    ConnectRequest = 0x0205,
    /// `CONNECT_RESPONSE` - Connection response
    ConnectResponse = 0x0206,
    /// `CONNECTIONSTATE_REQUEST` - Connection state request (heartbeat)
    ConnectionstateRequest = 0x0207,
    /// `CONNECTIONSTATE_RESPONSE` - Connection state response
    ConnectionstateResponse = 0x0208,
    /// `DISCONNECT_REQUEST` - Disconnect request
    DisconnectRequest = 0x0209,
    /// `DISCONNECT_RESPONSE` - Disconnect response
    DisconnectResponse = 0x020A,
    /// `SEARCH_REQUEST_EXTENDED` - Extensible discovery request with SRPs
    SearchRequestExt = 0x020B,
    /// `SEARCH_RESPONSE_EXTENDED` - Extensible discovery response
    SearchResponseExt = 0x020C,

    // Device Management (0x03xx)
    /// `DEVICE_CONFIGURATION_REQUEST`
    DeviceConfigurationRequest = 0x0310,
    /// `DEVICE_CONFIGURATION_ACK`
    DeviceConfigurationAck = 0x0311,

    // Tunnelling (0x04xx)
    /// `TUNNELLING_REQUEST` - Tunnelling data request
    TunnellingRequest = 0x0420,
    /// `TUNNELLING_ACK` - Tunnelling acknowledgement
    TunnellingAck = 0x0421,
    /// `TUNNELLING_FEATURE_GET`
    TunnellingFeatureGet = 0x0422,
    /// `TUNNELLING_FEATURE_RESPONSE`
    TunnellingFeatureResponse = 0x0423,
    /// `TUNNELLING_FEATURE_SET`
    TunnellingFeatureSet = 0x0424,
    /// `TUNNELLING_FEATURE_INFO`
    TunnellingFeatureInfo = 0x0425,

    // Routing (0x05xx)
    /// `ROUTING_INDICATION` - Routing indication (multicast)
    RoutingIndication = 0x0530,
    /// `ROUTING_LOST_MESSAGE` - Routing lost message indication
    RoutingLostMessage = 0x0531,
    /// `ROUTING_BUSY` - Routing busy indication
    RoutingBusy = 0x0532,
    /// `ROUTING_SYSTEM_BROADCAST`
    RoutingSystemBroadcast = 0x0533,

    // Remote Logging / Diagnostics (0x07xx)
    /// `REMOTE_DIAGNOSTIC_REQUEST`
    RemoteDiagnosticRequest = 0x0740,
    /// `REMOTE_DIAGNOSTIC_RESPONSE`
    RemoteDiagnosticResponse = 0x0741,

    // Secure services (0x09xx)
    /// `SECURE_WRAPPER` - Secure session wrapper
    SecureWrapper = 0x0950,
    /// `SESSION_REQUEST` - Secure session request
    SessionRequest = 0x0951,
    /// `SESSION_RESPONSE` - Secure session response
    SessionResponse = 0x0952,
    /// `SESSION_AUTHENTICATE` - Secure session authentication
    SessionAuthenticate = 0x0953,
    /// `SESSION_STATUS` - Secure session status
    SessionStatus = 0x0954,

    // Object Server (0xF0xx), carried at protocol version 0x20
    /// `OBJECTSERVER_REQUEST`
    ObjectServerRequest = 0xF080,
    /// `OBJECTSERVER_ACK`
    ObjectServerAck = 0xF081,
}

impl ServiceType {
    /// Convert a u16 to `ServiceType`
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0201 => Some(Self::SearchRequest),
            0x0202 => Some(Self::SearchResponse),
            0x0203 => Some(Self::DescriptionRequest),
            0x0204 => Some(Self::DescriptionResponse),
            0x0205 => Some(Self::ConnectRequest),
            0x0206 => Some(Self::ConnectResponse),
            0x0207 => Some(Self::ConnectionstateRequest),
            0x0208 => Some(Self::ConnectionstateResponse),
            0x0209 => Some(Self::DisconnectRequest),
            0x020A => Some(Self::DisconnectResponse),
            0x020B => Some(Self::SearchRequestExt),
            0x020C => Some(Self::SearchResponseExt),
            0x0310 => Some(Self::DeviceConfigurationRequest),
            0x0311 => Some(Self::DeviceConfigurationAck),
            0x0420 => Some(Self::TunnellingRequest),
            0x0421 => Some(Self::TunnellingAck),
            0x0422 => Some(Self::TunnellingFeatureGet),
            0x0423 => Some(Self::TunnellingFeatureResponse),
            0x0424 => Some(Self::TunnellingFeatureSet),
            0x0425 => Some(Self::TunnellingFeatureInfo),
            0x0530 => Some(Self::RoutingIndication),
            0x0531 => Some(Self::RoutingLostMessage),
            0x0532 => Some(Self::RoutingBusy),
            0x0533 => Some(Self::RoutingSystemBroadcast),
            0x0740 => Some(Self::RemoteDiagnosticRequest),
            0x0741 => Some(Self::RemoteDiagnosticResponse),
            0x0950 => Some(Self::SecureWrapper),
            0x0951 => Some(Self::SessionRequest),
            0x0952 => Some(Self::SessionResponse),
            0x0953 => Some(Self::SessionAuthenticate),
            0x0954 => Some(Self::SessionStatus),
            0xF080 => Some(Self::ObjectServerRequest),
            0xF081 => Some(Self::ObjectServerAck),
            _ => None,
        }
    }

    /// Convert `ServiceType` to u16
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Protocol version byte this service type is carried at: 0x20 for
    /// Object-Server services, 0x10 for everything else.
    #[must_use]
    pub const fn protocol_version(self) -> u8 {
        match self {
            Self::ObjectServerRequest | Self::ObjectServerAck => KNXNETIP_VERSION_20,
            _ => KNXNETIP_VERSION_10,
        }
    }
}

// =============================================================================
// Connection Type Codes
// =============================================================================

/// Connection type for `DEVICE_MGMT_CONNECTION`
pub const DEVICE_MGMT_CONNECTION: u8 = 0x03;

/// Connection type for `TUNNEL_CONNECTION`
pub const TUNNEL_CONNECTION: u8 = 0x04;

/// Connection type for `REMLOG_CONNECTION`
pub const REMLOG_CONNECTION: u8 = 0x06;

/// Connection type for `REMCONF_CONNECTION`
pub const REMCONF_CONNECTION: u8 = 0x07;

/// Connection type for `OBJSVR_CONNECTION`
pub const OBJSVR_CONNECTION: u8 = 0x08;

// =============================================================================
// Host Protocol Codes
// =============================================================================

/// IPv4 UDP protocol
pub const IPV4_UDP: u8 = 0x01;

/// IPv4 TCP protocol
pub const IPV4_TCP: u8 = 0x02;

// =============================================================================
// Connect-response / Connectionstate status codes
// =============================================================================

/// Successful operation
pub const E_NO_ERROR: u8 = 0x00;
/// Unknown communication channel id
pub const E_CONNECTION_ID: u8 = 0x21;
/// Connection type not supported
pub const E_CONNECTION_TYPE: u8 = 0x22;
/// Connection option not supported
pub const E_CONNECTION_OPTION: u8 = 0x23;
/// No more connections available
pub const E_NO_MORE_CONNECTIONS: u8 = 0x24;
/// No more unique connections (same individual address already tunnelling)
pub const E_NO_MORE_UNIQUE_CONNECTIONS: u8 = 0x25;
/// Data connection error (server's data endpoint couldn't be reached)
pub const E_DATA_CONNECTION: u8 = 0x26;
/// KNX connection error (server couldn't open a connection to the bus)
pub const E_KNX_CONNECTION: u8 = 0x27;
/// Authentication failed (secure session)
pub const E_AUTH_ERROR: u8 = 0x28;
/// Tunnelling layer not supported
pub const E_TUNNELLING_LAYER: u8 = 0x29;
/// No free tunnelling individual address
pub const E_NO_TUNNELLING_ADDRESS: u8 = 0x2D;
/// The requested individual address is already in use by another tunnel
pub const E_CONNECTION_IN_USE: u8 = 0x2E;
/// Generic/unspecified error
pub const E_ERROR: u8 = 0x0F;

// =============================================================================
// cEMI Message Codes
// =============================================================================

/// cEMI Message Codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CEMIMessageCode {
    /// `L_Raw.req` - Raw frame request
    LRawReq = 0x10,
    /// `L_Data.req` - Data request
    LDataReq = 0x11,
    /// `L_Poll_Data.req` - Poll data request
    LPollDataReq = 0x13,
    /// `L_Raw.ind` - Raw frame indication
    LRawInd = 0x2D,
    /// `L_Data.ind` - Data indication
    LDataInd = 0x29,
    /// `L_Busmon.ind` - Bus monitor indication
    LBusmonInd = 0x2B,
    /// `L_Raw.con` - Raw frame confirmation
    LRawCon = 0x2F,
    /// `L_Data.con` - Data confirmation
    LDataCon = 0x2E,
    /// `L_Poll_Data.con` - Poll data confirmation
    LPollDataCon = 0x25,
}

impl CEMIMessageCode {
    /// Convert u8 to `CEMIMessageCode`
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x10 => Some(Self::LRawReq),
            0x11 => Some(Self::LDataReq),
            0x13 => Some(Self::LPollDataReq),
            0x2D => Some(Self::LRawInd),
            0x29 => Some(Self::LDataInd),
            0x2B => Some(Self::LBusmonInd),
            0x2F => Some(Self::LRawCon),
            0x2E => Some(Self::LDataCon),
            0x25 => Some(Self::LPollDataCon),
            _ => None,
        }
    }

    /// Convert `CEMIMessageCode` to u8
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// KNX Priority
// =============================================================================

/// KNX message priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Priority {
    /// System priority
    System = 0b00,
    /// Normal priority (default)
    Normal = 0b01,
    /// Urgent priority
    Urgent = 0b10,
    /// Low priority
    Low = 0b11,
}

impl Priority {
    /// Convert u8 to Priority
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::System,
            0b01 => Self::Normal,
            0b10 => Self::Urgent,
            _ => Self::Low,
        }
    }

    /// Convert Priority to u8
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_round_trip() {
        for raw in [
            0x0201u16, 0x020B, 0x020C, 0x0310, 0x0420, 0x0422, 0x0530, 0x0533, 0x0950, 0xF080,
        ] {
            let st = ServiceType::from_u16(raw).unwrap();
            assert_eq!(st.to_u16(), raw);
        }
    }

    #[test]
    fn object_server_uses_version_20() {
        assert_eq!(
            ServiceType::ObjectServerRequest.protocol_version(),
            KNXNETIP_VERSION_20
        );
        assert_eq!(
            ServiceType::ConnectRequest.protocol_version(),
            KNXNETIP_VERSION_10
        );
    }
}
