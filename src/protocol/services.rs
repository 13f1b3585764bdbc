//! KNXnet/IP service request and response builders.
//!
//! This module provides zero-copy builders for constructing KNXnet/IP service
//! frames. All builders work with provided buffers to avoid heap allocations.
//!
//! ## Supported Services
//!
//! - **CONNECT** - establish a tunnelling or device-management connection
//! - **CONNECTIONSTATE** - heartbeat/keep-alive checks
//! - **DISCONNECT** - clean connection shutdown
//! - **TUNNELING** - send/receive KNX telegrams through the tunnel
//! - **TUNNELLING_FEATURE** - Get/Response/Set/Info feature exchange
//! - **DESCRIPTION** / **SEARCH** - discovery and device description
//! - **ROUTING_BUSY** / **ROUTING_LOST_MESSAGE** - routing flow control
//!
//! ## Protocol Flow
//!
//! ```text
//! Client                          Gateway
//!   |                                |
//!   |------- CONNECT_REQUEST ------->|
//!   |<------ CONNECT_RESPONSE -------|
//!   |                                |
//!   |------ TUNNELING_REQUEST ------>|
//!   |<------ TUNNELING_ACK ----------|
//!   |                                |
//!   |--- CONNECTIONSTATE_REQUEST --->|  (every 60s)
//!   |<-- CONNECTIONSTATE_RESPONSE ---|
//!   |                                |
//!   |------ DISCONNECT_REQUEST ----->|
//!   |<----- DISCONNECT_RESPONSE -----|
//! ```

use crate::addressing::IndividualAddress;
use crate::error::{KnxError, Result};
use crate::protocol::constants::{
    DEVICE_MGMT_CONNECTION, HEADER_SIZE_10, ServiceType, TUNNEL_CONNECTION,
};
use crate::protocol::dib::{self, Dib, DibType};
use crate::protocol::frame::{FrameBuilder, Hpai, KnxnetIpHeader};

fn write_header(buf: &mut [u8], service_type: ServiceType, total_len: u16) -> Result<usize> {
    KnxnetIpHeader::new(service_type, total_len - KnxnetIpHeader::SIZE as u16).encode(buf)
}

/// Connection Request Information (CRI): tunnelling or device-management.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRequestInfo {
    /// `TUNNEL_CONNECTION` with a requested KNX layer.
    Tunnel {
        /// KNX layer (`TUNNEL_LINKLAYER` etc, see [`crate::config::TunnelingLayer`]).
        knx_layer: u8,
    },
    /// `DEVICE_MGMT_CONNECTION` (no extra CRI fields beyond the type).
    DeviceManagement,
}

impl ConnectionRequestInfo {
    #[must_use]
    pub const fn tunnel_link_layer() -> Self {
        Self::Tunnel { knx_layer: 0x02 }
    }

    #[must_use]
    pub const fn connection_type(self) -> u8 {
        match self {
            Self::Tunnel { .. } => TUNNEL_CONNECTION,
            Self::DeviceManagement => DEVICE_MGMT_CONNECTION,
        }
    }

    /// Encode CRI to bytes.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 4 {
            return Err(KnxError::BufferTooSmall);
        }
        buf[0] = 4;
        buf[1] = self.connection_type();
        buf[2] = match self {
            Self::Tunnel { knx_layer } => *knx_layer,
            Self::DeviceManagement => 0x00,
        };
        buf[3] = 0x00;
        Ok(4)
    }

    /// Decode CRI from bytes.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if too short, `MalformedFrame` if the
    /// declared length or connection type is invalid.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(KnxError::BufferTooSmall);
        }
        if data[0] != 4 {
            return Err(KnxError::malformed("CRI structure length must be 4"));
        }
        match data[1] {
            TUNNEL_CONNECTION => Ok(Self::Tunnel { knx_layer: data[2] }),
            DEVICE_MGMT_CONNECTION => Ok(Self::DeviceManagement),
            _ => Err(KnxError::malformed("unsupported connection type")),
        }
    }
}

/// `CONNECT_REQUEST` service (0x0205)
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest {
    pub control_endpoint: Hpai,
    pub data_endpoint: Hpai,
    pub cri: ConnectionRequestInfo,
}

impl ConnectRequest {
    #[must_use]
    pub const fn new(control_endpoint: Hpai, data_endpoint: Hpai, cri: ConnectionRequestInfo) -> Self {
        Self {
            control_endpoint,
            data_endpoint,
            cri,
        }
    }

    /// Build the complete frame. Returns bytes written.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 26 {
            return Err(KnxError::BufferTooSmall);
        }
        let mut offset = HEADER_SIZE_10 as usize;
        offset += self.control_endpoint.encode(&mut buf[offset..])?;
        offset += self.data_endpoint.encode(&mut buf[offset..])?;
        offset += self.cri.encode(&mut buf[offset..])?;
        write_header(buf, ServiceType::ConnectRequest, offset as u16)?;
        Ok(offset)
    }
}

/// Connection Response Data Block (CRD): the connection-type-specific data
/// a `CONNECT_RESPONSE` carries back. Mirrors [`ConnectionRequestInfo`]'s
/// structure-length/connection-type encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionResponseData {
    /// `TUNNEL_CONNECTION`: the individual address assigned to this tunnel.
    Tunnel {
        /// Individual address the gateway assigned for this connection.
        individual_address: IndividualAddress,
    },
    /// `DEVICE_MGMT_CONNECTION` (no extra CRD fields beyond the type).
    DeviceManagement,
}

impl ConnectionResponseData {
    #[must_use]
    pub const fn connection_type(self) -> u8 {
        match self {
            Self::Tunnel { .. } => TUNNEL_CONNECTION,
            Self::DeviceManagement => DEVICE_MGMT_CONNECTION,
        }
    }

    /// Encode CRD to bytes.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::Tunnel { individual_address } => {
                if buf.len() < 4 {
                    return Err(KnxError::BufferTooSmall);
                }
                buf[0] = 4;
                buf[1] = TUNNEL_CONNECTION;
                buf[2..4].copy_from_slice(&u16::from(*individual_address).to_be_bytes());
                Ok(4)
            }
            Self::DeviceManagement => {
                if buf.len() < 2 {
                    return Err(KnxError::BufferTooSmall);
                }
                buf[0] = 2;
                buf[1] = DEVICE_MGMT_CONNECTION;
                Ok(2)
            }
        }
    }

    /// Decode CRD from bytes.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if too short, `MalformedFrame` if the
    /// declared length or connection type is invalid.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(KnxError::BufferTooSmall);
        }
        let structure_length = data[0] as usize;
        if structure_length < 2 || data.len() < structure_length {
            return Err(KnxError::malformed("CRD structure length invalid"));
        }
        match data[1] {
            TUNNEL_CONNECTION => {
                if structure_length < 4 {
                    return Err(KnxError::malformed("tunnel CRD missing individual address"));
                }
                let raw = u16::from_be_bytes([data[2], data[3]]);
                Ok(Self::Tunnel {
                    individual_address: IndividualAddress::from(raw),
                })
            }
            DEVICE_MGMT_CONNECTION => Ok(Self::DeviceManagement),
            _ => Err(KnxError::malformed("unsupported connection type")),
        }
    }
}

/// `CONNECT_RESPONSE` service (0x0206)
#[derive(Debug, Clone, Copy)]
pub struct ConnectResponse {
    pub channel_id: u8,
    pub status: u8,
    pub data_endpoint: Hpai,
    pub crd: ConnectionResponseData,
}

impl ConnectResponse {
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `data` is shorter than the fixed-size
    /// header or the CRD is truncated.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(KnxError::BufferTooSmall);
        }
        let channel_id = data[0];
        let status = data[1];
        let data_endpoint = Hpai::parse(&data[2..10])?;
        let crd = ConnectionResponseData::decode(&data[10..])?;
        Ok(Self {
            channel_id,
            status,
            data_endpoint,
            crd,
        })
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// `CONNECTIONSTATE_REQUEST` service (0x0207)
#[derive(Debug, Clone, Copy)]
pub struct ConnectionStateRequest {
    pub channel_id: u8,
    pub control_endpoint: Hpai,
}

impl ConnectionStateRequest {
    #[must_use]
    pub const fn new(channel_id: u8, control_endpoint: Hpai) -> Self {
        Self {
            channel_id,
            control_endpoint,
        }
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 16 {
            return Err(KnxError::BufferTooSmall);
        }
        let mut offset = HEADER_SIZE_10 as usize;
        buf[offset] = self.channel_id;
        buf[offset + 1] = 0x00;
        offset += 2;
        offset += self.control_endpoint.encode(&mut buf[offset..])?;
        write_header(buf, ServiceType::ConnectionstateRequest, offset as u16)?;
        Ok(offset)
    }
}

/// `CONNECTIONSTATE_RESPONSE` service (0x0208)
#[derive(Debug, Clone, Copy)]
pub struct ConnectionStateResponse {
    pub channel_id: u8,
    pub status: u8,
}

impl ConnectionStateResponse {
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `data` is too short.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(KnxError::BufferTooSmall);
        }
        Ok(Self {
            channel_id: data[0],
            status: data[1],
        })
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// `DISCONNECT_REQUEST` service (0x0209)
#[derive(Debug, Clone, Copy)]
pub struct DisconnectRequest {
    pub channel_id: u8,
    pub control_endpoint: Hpai,
}

impl DisconnectRequest {
    #[must_use]
    pub const fn new(channel_id: u8, control_endpoint: Hpai) -> Self {
        Self {
            channel_id,
            control_endpoint,
        }
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 16 {
            return Err(KnxError::BufferTooSmall);
        }
        let mut offset = HEADER_SIZE_10 as usize;
        buf[offset] = self.channel_id;
        buf[offset + 1] = 0x00;
        offset += 2;
        offset += self.control_endpoint.encode(&mut buf[offset..])?;
        write_header(buf, ServiceType::DisconnectRequest, offset as u16)?;
        Ok(offset)
    }
}

/// `DISCONNECT_RESPONSE` service (0x020A)
#[derive(Debug, Clone, Copy)]
pub struct DisconnectResponse {
    pub channel_id: u8,
    pub status: u8,
}

impl DisconnectResponse {
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `data` is too short.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(KnxError::BufferTooSmall);
        }
        Ok(Self {
            channel_id: data[0],
            status: data[1],
        })
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Connection header prefixing tunnelling/device-management data frames.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionHeader {
    pub channel_id: u8,
    pub sequence_counter: u8,
}

impl ConnectionHeader {
    #[must_use]
    pub const fn new(channel_id: u8, sequence_counter: u8) -> Self {
        Self {
            channel_id,
            sequence_counter,
        }
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 4 {
            return Err(KnxError::BufferTooSmall);
        }
        buf[0] = 4;
        buf[1] = self.channel_id;
        buf[2] = self.sequence_counter;
        buf[3] = 0x00;
        Ok(4)
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `data` is too short.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(KnxError::BufferTooSmall);
        }
        Ok(Self {
            channel_id: data[1],
            sequence_counter: data[2],
        })
    }
}

/// `TUNNELING_REQUEST` service (0x0420); also used, with the same layout,
/// for `DEVICE_CONFIGURATION_REQUEST` (0x0310).
#[derive(Debug)]
pub struct TunnelingRequest<'a> {
    pub connection_header: ConnectionHeader,
    pub cemi_data: &'a [u8],
}

impl<'a> TunnelingRequest<'a> {
    #[must_use]
    pub const fn new(connection_header: ConnectionHeader, cemi_data: &'a [u8]) -> Self {
        Self {
            connection_header,
            cemi_data,
        }
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        self.build_as(ServiceType::TunnellingRequest, buf)
    }

    /// Build using an explicit service type, so the same frame layout can
    /// serve both tunnelling and device-management connections.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build_as(&self, service_type: ServiceType, buf: &mut [u8]) -> Result<usize> {
        let total_len = HEADER_SIZE_10 as usize + 4 + self.cemi_data.len();
        if buf.len() < total_len {
            return Err(KnxError::BufferTooSmall);
        }
        let mut offset = HEADER_SIZE_10 as usize;
        offset += self.connection_header.encode(&mut buf[offset..])?;
        buf[offset..offset + self.cemi_data.len()].copy_from_slice(self.cemi_data);
        offset += self.cemi_data.len();
        write_header(buf, service_type, offset as u16)?;
        Ok(offset)
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `data` is too short.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(KnxError::BufferTooSmall);
        }
        let connection_header = ConnectionHeader::decode(&data[0..4])?;
        let cemi_data = &data[4..];
        Ok(Self {
            connection_header,
            cemi_data,
        })
    }
}

/// `TUNNELING_ACK` service (0x0421); also used for `DEVICE_CONFIGURATION_ACK`.
#[derive(Debug, Clone, Copy)]
pub struct TunnelingAck {
    pub connection_header: ConnectionHeader,
    pub status: u8,
}

impl TunnelingAck {
    #[must_use]
    pub const fn new(connection_header: ConnectionHeader, status: u8) -> Self {
        Self {
            connection_header,
            status,
        }
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        self.build_as(ServiceType::TunnellingAck, buf)
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build_as(&self, service_type: ServiceType, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 11 {
            return Err(KnxError::BufferTooSmall);
        }
        let mut offset = HEADER_SIZE_10 as usize;
        offset += self.connection_header.encode(&mut buf[offset..])?;
        buf[offset] = self.status;
        offset += 1;
        write_header(buf, service_type, offset as u16)?;
        Ok(offset)
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `data` is too short.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 5 {
            return Err(KnxError::BufferTooSmall);
        }
        let connection_header = ConnectionHeader::decode(&data[0..4])?;
        let status = data[4];
        Ok(Self {
            connection_header,
            status,
        })
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// `TUNNELLING_FEATURE_GET`/`SET`/`RESPONSE`/`INFO` (0x0422-0x0425).
///
/// All four share the same wire layout: channel id, sequence counter,
/// feature identifier, return code, and feature data.
#[derive(Debug)]
pub struct TunnelingFeature<'a> {
    pub channel_id: u8,
    pub sequence_counter: u8,
    pub feature_id: u8,
    pub return_code: u8,
    pub data: &'a [u8],
}

impl<'a> TunnelingFeature<'a> {
    #[must_use]
    pub const fn get(channel_id: u8, sequence_counter: u8, feature_id: u8) -> Self {
        Self {
            channel_id,
            sequence_counter,
            feature_id,
            return_code: 0,
            data: &[],
        }
    }

    #[must_use]
    pub const fn set(
        channel_id: u8,
        sequence_counter: u8,
        feature_id: u8,
        data: &'a [u8],
    ) -> Self {
        Self {
            channel_id,
            sequence_counter,
            feature_id,
            return_code: 0,
            data,
        }
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build(&self, service_type: ServiceType, buf: &mut [u8]) -> Result<usize> {
        let total_len = HEADER_SIZE_10 as usize + 6 + self.data.len();
        if buf.len() < total_len {
            return Err(KnxError::BufferTooSmall);
        }
        let mut offset = HEADER_SIZE_10 as usize;
        buf[offset] = 4;
        buf[offset + 1] = self.channel_id;
        buf[offset + 2] = self.sequence_counter;
        buf[offset + 3] = 0x00;
        offset += 4;
        buf[offset] = self.feature_id;
        buf[offset + 1] = self.return_code;
        offset += 2;
        buf[offset..offset + self.data.len()].copy_from_slice(self.data);
        offset += self.data.len();
        write_header(buf, service_type, offset as u16)?;
        Ok(offset)
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `data` is shorter than the fixed prefix.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 6 {
            return Err(KnxError::BufferTooSmall);
        }
        let connection_header = ConnectionHeader::decode(&data[0..4])?;
        Ok(Self {
            channel_id: connection_header.channel_id,
            sequence_counter: connection_header.sequence_counter,
            feature_id: data[4],
            return_code: data[5],
            data: &data[6..],
        })
    }
}

/// `ROUTING_BUSY` service (0x0532).
#[derive(Debug, Clone, Copy)]
pub struct RoutingBusy {
    /// Device state byte (reserved, forwarded verbatim).
    pub device_state: u8,
    /// Requested wait time before resuming, in milliseconds.
    pub wait_time_ms: u16,
    /// Current control-field counter (used by [`crate::protocol::routing`]'s
    /// backoff algorithm).
    pub control_field: u16,
}

impl RoutingBusy {
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 12 {
            return Err(KnxError::BufferTooSmall);
        }
        let mut offset = HEADER_SIZE_10 as usize;
        buf[offset] = 6;
        buf[offset + 1] = self.device_state;
        buf[offset + 2..offset + 4].copy_from_slice(&self.wait_time_ms.to_be_bytes());
        buf[offset + 4..offset + 6].copy_from_slice(&self.control_field.to_be_bytes());
        offset += 6;
        write_header(buf, ServiceType::RoutingBusy, offset as u16)?;
        Ok(offset)
    }

    /// # Errors
    ///
    /// Returns `BufferTooSmall`/`MalformedFrame` on malformed input.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 6 {
            return Err(KnxError::BufferTooSmall);
        }
        if data[0] != 6 {
            return Err(KnxError::malformed("ROUTING_BUSY structure length must be 6"));
        }
        Ok(Self {
            device_state: data[1],
            wait_time_ms: u16::from_be_bytes([data[2], data[3]]),
            control_field: u16::from_be_bytes([data[4], data[5]]),
        })
    }
}

/// `ROUTING_LOST_MESSAGE` service (0x0531).
#[derive(Debug, Clone, Copy)]
pub struct RoutingLostMessage {
    pub device_state: u8,
    pub lost_message_count: u16,
}

impl RoutingLostMessage {
    /// # Errors
    ///
    /// Returns `BufferTooSmall`/`MalformedFrame` on malformed input.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(KnxError::BufferTooSmall);
        }
        if data[0] != 4 {
            return Err(KnxError::malformed(
                "ROUTING_LOST_MESSAGE structure length must be 4",
            ));
        }
        Ok(Self {
            device_state: data[1],
            lost_message_count: u16::from_be_bytes([data[2], data[3]]),
        })
    }
}

/// `DESCRIPTION_REQUEST` service (0x0203).
#[derive(Debug, Clone, Copy)]
pub struct DescriptionRequest {
    pub control_endpoint: Hpai,
}

impl DescriptionRequest {
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let body = {
            let mut b = [0u8; Hpai::SIZE];
            self.control_endpoint.encode(&mut b)?;
            b
        };
        FrameBuilder::new(ServiceType::DescriptionRequest, &body).build(buf)
    }
}

/// `SEARCH_REQUEST` service (0x0201).
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest {
    pub discovery_endpoint: Hpai,
}

impl SearchRequest {
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is too small.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let body = {
            let mut b = [0u8; Hpai::SIZE];
            self.discovery_endpoint.encode(&mut b)?;
            b
        };
        FrameBuilder::new(ServiceType::SearchRequest, &body).build(buf)
    }
}

/// Drop DIBs of an unrecognized type from a parsed description, logging each
/// one rather than failing the response. Duplicate *recognized* types have
/// already been rejected by [`dib::parse_all`] before this runs.
fn keep_known_dibs(dibs: Vec<Dib<'_>>) -> Vec<Dib<'_>> {
    let mut kept = Vec::with_capacity(dibs.len());
    for d in dibs {
        if matches!(d.dib_type, DibType::Unknown(code)) {
            tracing::debug!(dib_type = code, "skipping unrecognized DIB type in description response");
            continue;
        }
        kept.push(d);
    }
    kept
}

/// `DESCRIPTION_RESPONSE` service (0x0204): the DIB sequence describing a
/// device, sent in reply to a `DESCRIPTION_REQUEST`.
#[derive(Debug, Clone)]
pub struct DescriptionResponse<'a> {
    pub dibs: Vec<Dib<'a>>,
}

impl<'a> DescriptionResponse<'a> {
    /// Parse the DIB sequence carried in a `DESCRIPTION_RESPONSE` body.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if any DIB fails to parse or a recognized
    /// DIB type repeats; an unrecognized DIB type is logged and dropped
    /// rather than failing the response.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let dibs = keep_known_dibs(dib::parse_all(data)?);
        Ok(Self { dibs })
    }
}

/// `SEARCH_RESPONSE` service (0x0202): the responding gateway's control
/// endpoint plus the same DIB sequence a `DESCRIPTION_RESPONSE` carries.
#[derive(Debug, Clone)]
pub struct SearchResponse<'a> {
    pub control_endpoint: Hpai,
    pub dibs: Vec<Dib<'a>>,
}

impl<'a> SearchResponse<'a> {
    /// Parse a `SEARCH_RESPONSE` body: an HPAI followed by the DIB sequence.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if the HPAI is truncated; see
    /// [`DescriptionResponse::parse`] for the DIB-parsing error behavior.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < Hpai::SIZE {
            return Err(KnxError::BufferTooSmall);
        }
        let control_endpoint = Hpai::parse(&data[..Hpai::SIZE])?;
        let dibs = keep_known_dibs(dib::parse_all(&data[Hpai::SIZE..])?);
        Ok(Self {
            control_endpoint,
            dibs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hpai_encode_decode() {
        let hpai = Hpai::new([192, 168, 1, 10], 3671);
        let mut buf = [0u8; 8];
        let len = hpai.encode(&mut buf).unwrap();
        assert_eq!(len, 8);
        let decoded = Hpai::parse(&buf).unwrap();
        assert_eq!(decoded, hpai);
    }

    #[test]
    fn test_connect_request_build() {
        let control = Hpai::new([192, 168, 1, 100], 3671);
        let data = Hpai::new([192, 168, 1, 100], 3671);
        let request = ConnectRequest::new(control, data, ConnectionRequestInfo::tunnel_link_layer());

        let mut buf = [0u8; 32];
        let len = request.build(&mut buf).unwrap();

        assert_eq!(len, 26);
        assert_eq!(&buf[0..2], &[0x06, 0x10]);
        assert_eq!(
            u16::from_be_bytes([buf[2], buf[3]]),
            ServiceType::ConnectRequest.to_u16()
        );
    }

    #[test]
    fn test_connect_request_device_management_cri() {
        let cri = ConnectionRequestInfo::DeviceManagement;
        let mut buf = [0u8; 4];
        cri.encode(&mut buf).unwrap();
        let decoded = ConnectionRequestInfo::decode(&buf).unwrap();
        assert_eq!(decoded, ConnectionRequestInfo::DeviceManagement);
    }

    #[test]
    fn test_connection_header() {
        let header = ConnectionHeader::new(5, 10);
        let mut buf = [0u8; 4];
        let len = header.encode(&mut buf).unwrap();
        assert_eq!(len, 4);
        let decoded = ConnectionHeader::decode(&buf).unwrap();
        assert_eq!(decoded.channel_id, 5);
        assert_eq!(decoded.sequence_counter, 10);
    }

    #[test]
    fn test_tunneling_ack() {
        let header = ConnectionHeader::new(3, 15);
        let ack = TunnelingAck::new(header, 0);
        let mut buf = [0u8; 16];
        let len = ack.build(&mut buf).unwrap();
        assert_eq!(len, 11);
        assert!(ack.is_ok());
    }

    #[test]
    fn test_tunneling_feature_get_round_trip() {
        let feature = TunnelingFeature::get(7, 2, 0x01);
        let mut buf = [0u8; 32];
        let len = feature
            .build(ServiceType::TunnellingFeatureGet, &mut buf)
            .unwrap();
        let parsed = TunnelingFeature::parse(&buf[6..len]).unwrap();
        assert_eq!(parsed.channel_id, 7);
        assert_eq!(parsed.feature_id, 0x01);
    }

    #[test]
    fn test_routing_busy_round_trip() {
        let busy = RoutingBusy {
            device_state: 0,
            wait_time_ms: 100,
            control_field: 1,
        };
        let mut buf = [0u8; 16];
        let len = busy.build(&mut buf).unwrap();
        let parsed = RoutingBusy::parse(&buf[6..len]).unwrap();
        assert_eq!(parsed.wait_time_ms, 100);
        assert_eq!(parsed.control_field, 1);
    }

    #[test]
    fn test_routing_lost_message_parse() {
        let data = [0x04, 0x00, 0x00, 0x02];
        let lost = RoutingLostMessage::parse(&data).unwrap();
        assert_eq!(lost.lost_message_count, 2);
    }

    #[test]
    fn test_connection_response_data_tunnel_round_trip() {
        let crd = ConnectionResponseData::Tunnel {
            individual_address: IndividualAddress::new(1, 1, 5).unwrap(),
        };
        let mut buf = [0u8; 4];
        let n = crd.encode(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [0x04, TUNNEL_CONNECTION, 0x11, 0x05]);
        assert_eq!(ConnectionResponseData::decode(&buf).unwrap(), crd);
    }

    #[test]
    fn test_connection_response_data_device_management_round_trip() {
        let crd = ConnectionResponseData::DeviceManagement;
        let mut buf = [0u8; 4];
        let n = crd.encode(&mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], [0x02, DEVICE_MGMT_CONNECTION]);
        assert_eq!(ConnectionResponseData::decode(&buf[..2]).unwrap(), crd);
    }

    #[test]
    fn test_connect_response_parse_tunnel_crd_scenario() {
        // CONNECT_RESPONSE body: channel 0x15, status NO_ERROR, data endpoint
        // 192.168.10.10:3671/UDP, CRD = tunnel / individual address 1.1.5.
        let data = [
            0x15, 0x00, 0x08, 0x01, 0xC0, 0xA8, 0x0A, 0x0A, 0x0E, 0x57, 0x04, 0x04, 0x11, 0x05,
        ];
        let response = ConnectResponse::parse(&data).unwrap();
        assert_eq!(response.channel_id, 0x15);
        assert!(response.is_ok());
        assert_eq!(response.data_endpoint.ip_address, [192, 168, 10, 10]);
        assert_eq!(response.data_endpoint.port, 3671);
        assert_eq!(
            response.crd,
            ConnectionResponseData::Tunnel {
                individual_address: IndividualAddress::new(1, 1, 5).unwrap(),
            }
        );
    }

    #[test]
    fn test_description_response_rejects_duplicate_dib_type() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x03, 0x01, 0x00]);
        data.extend_from_slice(&[0x03, 0x01, 0x01]);
        assert!(DescriptionResponse::parse(&data).is_err());
    }

    #[test]
    fn test_description_response_skips_unknown_dib_type() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x03, 0x01, 0x00]); // DeviceInfo
        data.extend_from_slice(&[0x03, 0x7F, 0x00]); // Unknown(0x7F)
        let response = DescriptionResponse::parse(&data).unwrap();
        assert_eq!(response.dibs.len(), 1);
        assert_eq!(response.dibs[0].dib_type, DibType::DeviceInfo);
    }

    #[test]
    fn test_search_response_parses_hpai_and_dibs() {
        let mut data = Vec::new();
        let hpai = Hpai::new([192, 168, 1, 10], 3671);
        let mut hpai_buf = [0u8; 8];
        hpai.encode(&mut hpai_buf).unwrap();
        data.extend_from_slice(&hpai_buf);
        data.extend_from_slice(&[0x03, 0x01, 0x00]);
        data.extend_from_slice(&[0x04, 0x02, 0x01, 0x02]);
        let response = SearchResponse::parse(&data).unwrap();
        assert_eq!(response.control_endpoint.ip_address, [192, 168, 1, 10]);
        assert_eq!(response.control_endpoint.port, 3671);
        assert_eq!(response.dibs.len(), 2);
        assert_eq!(response.dibs[0].dib_type, DibType::DeviceInfo);
        assert_eq!(response.dibs[1].dib_type, DibType::SuppSvcFamilies);
    }
}
