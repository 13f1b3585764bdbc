//! KNXnet/IP frame parsing and encoding.
//!
//! Zero-copy parsing of the 6-byte KNXnet/IP header and the variable-length
//! body that follows it.

use crate::error::{KnxError, Result};
use crate::protocol::constants::{
    HEADER_SIZE_10, IPV4_UDP, KNXNETIP_VERSION_10, KNXNETIP_VERSION_20, MAX_FRAME_SIZE,
    ServiceType,
};

/// KNXnet/IP frame header (6 bytes)
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────────┐
/// │ Header Len   │ Protocol Ver │  Service Type ID    │
/// │   (1 byte)   │   (1 byte)   │     (2 bytes)       │
/// ├──────────────┴──────────────┴─────────────────────┤
/// │           Total Length (2 bytes)                   │
/// └────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy)]
pub struct KnxnetIpHeader {
    /// Header length (should be 0x06)
    pub header_length: u8,
    /// Protocol version (0x10 normally; 0x20 for Object-Server services)
    pub protocol_version: u8,
    /// Service type identifier
    pub service_type: ServiceType,
    /// Total length of frame (header + body)
    pub total_length: u16,
}

impl KnxnetIpHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = 6;

    /// Create a new header for `service_type` with a body of `body_length` bytes.
    #[must_use]
    pub const fn new(service_type: ServiceType, body_length: u16) -> Self {
        Self {
            header_length: HEADER_SIZE_10,
            protocol_version: service_type.protocol_version(),
            service_type,
            total_length: Self::SIZE as u16 + body_length,
        }
    }

    /// Parse a header from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if the buffer is too small, the header
    /// length or protocol version is wrong, the total length is less than
    /// the header size, or the service type is unrecognized.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(KnxError::BufferTooSmall);
        }

        let header_length = data[0];
        let protocol_version = data[1];
        let service_type_raw = u16::from_be_bytes([data[2], data[3]]);
        let total_length = u16::from_be_bytes([data[4], data[5]]);

        if header_length != HEADER_SIZE_10 {
            return Err(KnxError::malformed("header length must be 6"));
        }

        let service_type = ServiceType::from_u16(service_type_raw)
            .ok_or(KnxError::malformed("unrecognized service type"))?;

        let expected_version = service_type.protocol_version();
        if protocol_version != expected_version {
            return Err(KnxError::malformed("unsupported protocol version"));
        }
        // Defensive: every service_type maps its own version, so this can
        // only ever be 0x10 or 0x20, but keep both constants referenced.
        debug_assert!(expected_version == KNXNETIP_VERSION_10 || expected_version == KNXNETIP_VERSION_20);

        if (total_length as usize) < Self::SIZE {
            return Err(KnxError::malformed("total length shorter than header"));
        }

        Ok(Self {
            header_length,
            protocol_version,
            service_type,
            total_length,
        })
    }

    /// Encode the header into a byte buffer.
    ///
    /// # Errors
    ///
    /// Returns `KnxError::BufferTooSmall` if buffer is too small.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(KnxError::BufferTooSmall);
        }

        buf[0] = self.header_length;
        buf[1] = self.protocol_version;
        buf[2..4].copy_from_slice(&self.service_type.to_u16().to_be_bytes());
        buf[4..6].copy_from_slice(&self.total_length.to_be_bytes());

        Ok(Self::SIZE)
    }

    /// Get the expected body length from the header.
    #[must_use]
    pub const fn body_length(&self) -> u16 {
        self.total_length.saturating_sub(Self::SIZE as u16)
    }
}

/// Zero-copy view of a complete KNXnet/IP frame.
#[derive(Debug)]
pub struct KnxnetIpFrame<'a> {
    data: &'a [u8],
    header: KnxnetIpHeader,
}

impl<'a> KnxnetIpFrame<'a> {
    /// Parse a KNXnet/IP frame from a byte slice. `data` may contain
    /// trailing bytes beyond the frame (e.g. a UDP datagram padded by the
    /// OS); only `header.total_length` bytes are considered part of the frame.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if the header is invalid or the slice is
    /// shorter than the header's declared total length.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = KnxnetIpHeader::parse(data)?;

        if data.len() < header.total_length as usize {
            return Err(KnxError::malformed("frame shorter than declared length"));
        }

        Ok(Self { data, header })
    }

    #[must_use]
    pub const fn header(&self) -> &KnxnetIpHeader {
        &self.header
    }

    #[must_use]
    pub const fn service_type(&self) -> ServiceType {
        self.header.service_type
    }

    /// The frame body (payload after the header).
    #[must_use]
    pub fn body(&self) -> &'a [u8] {
        let start = KnxnetIpHeader::SIZE;
        let end = self.header.total_length as usize;
        &self.data[start..end]
    }

    /// The complete frame, header included.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        &self.data[..self.header.total_length as usize]
    }
}

/// Builder for creating KNXnet/IP frames from a pre-serialized body.
pub struct FrameBuilder<'a> {
    service_type: ServiceType,
    body: &'a [u8],
}

impl<'a> FrameBuilder<'a> {
    #[must_use]
    pub const fn new(service_type: ServiceType, body: &'a [u8]) -> Self {
        Self { service_type, body }
    }

    /// Build the frame into a buffer.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if the resulting frame would exceed
    /// [`MAX_FRAME_SIZE`], or `BufferTooSmall` if `buf` doesn't fit it.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let total_size = KnxnetIpHeader::SIZE + self.body.len();

        if total_size > MAX_FRAME_SIZE {
            return Err(KnxError::malformed("frame exceeds maximum size"));
        }
        if buf.len() < total_size {
            return Err(KnxError::BufferTooSmall);
        }

        let header = KnxnetIpHeader::new(self.service_type, self.body.len() as u16);
        header.encode(buf)?;
        buf[KnxnetIpHeader::SIZE..total_size].copy_from_slice(self.body);

        Ok(total_size)
    }

    /// Build the frame into a freshly allocated `Vec`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if the resulting frame would exceed
    /// [`MAX_FRAME_SIZE`].
    pub fn build_vec(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.size()];
        let n = self.build(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        KnxnetIpHeader::SIZE + self.body.len()
    }
}

/// Host Protocol Address Information (HPAI).
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────────┐
/// │ Structure Len│ Host Protocol│   IP Address        │
/// │   (1 byte)   │   (1 byte)   │   (4 bytes IPv4)    │
/// ├──────────────┴──────────────┴─────────────────────┤
/// │                Port (2 bytes)                      │
/// └────────────────────────────────────────────────────┘
/// ```
///
/// A "NAT HPAI" (`ip_address = 0.0.0.0`, `port = 0`) tells the peer to
/// respond on this datagram's source address/port instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hpai {
    /// Structure length (always 8 for IPv4)
    pub structure_length: u8,
    /// Host protocol code (`IPV4_UDP` or `IPV4_TCP`)
    pub host_protocol: u8,
    /// IPv4 address (4 bytes)
    pub ip_address: [u8; 4],
    /// Port
    pub port: u16,
}

impl Hpai {
    /// Size of an IPv4 HPAI structure.
    pub const SIZE: usize = 8;

    /// A NAT HPAI: all-zero address and port, host protocol UDP.
    pub const NAT: Self = Self {
        structure_length: Self::SIZE as u8,
        host_protocol: IPV4_UDP,
        ip_address: [0, 0, 0, 0],
        port: 0,
    };

    #[must_use]
    pub const fn new(ip_address: [u8; 4], port: u16) -> Self {
        Self {
            structure_length: Self::SIZE as u8,
            host_protocol: IPV4_UDP,
            ip_address,
            port,
        }
    }

    #[must_use]
    pub const fn new_tcp(ip_address: [u8; 4], port: u16) -> Self {
        Self {
            structure_length: Self::SIZE as u8,
            host_protocol: crate::protocol::constants::IPV4_TCP,
            ip_address,
            port,
        }
    }

    /// Whether this HPAI signals "respond on the datagram's source address".
    #[must_use]
    pub const fn is_nat(&self) -> bool {
        self.ip_address[0] == 0
            && self.ip_address[1] == 0
            && self.ip_address[2] == 0
            && self.ip_address[3] == 0
            && self.port == 0
    }

    #[must_use]
    pub const fn is_tcp(&self) -> bool {
        self.host_protocol == crate::protocol::constants::IPV4_TCP
    }

    /// Parse HPAI from bytes.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if `structure_length != 8`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(KnxError::BufferTooSmall);
        }

        let structure_length = data[0];
        if structure_length != Self::SIZE as u8 {
            return Err(KnxError::malformed("HPAI structure length must be 8"));
        }
        let host_protocol = data[1];
        let ip_address = [data[2], data[3], data[4], data[5]];
        let port = u16::from_be_bytes([data[6], data[7]]);

        Ok(Self {
            structure_length,
            host_protocol,
            ip_address,
            port,
        })
    }

    /// Encode HPAI into bytes.
    ///
    /// # Errors
    ///
    /// Returns `KnxError::BufferTooSmall` if buffer is too small.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(KnxError::BufferTooSmall);
        }

        buf[0] = self.structure_length;
        buf[1] = self.host_protocol;
        buf[2..6].copy_from_slice(&self.ip_address);
        buf[6..8].copy_from_slice(&self.port.to_be_bytes());

        Ok(Self::SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse() {
        let data = [0x06, 0x10, 0x02, 0x01, 0x00, 0x0E];
        let header = KnxnetIpHeader::parse(&data).unwrap();
        assert_eq!(header.header_length, 0x06);
        assert_eq!(header.protocol_version, 0x10);
        assert_eq!(header.service_type, ServiceType::SearchRequest);
        assert_eq!(header.total_length, 14);
        assert_eq!(header.body_length(), 8);
    }

    #[test]
    fn test_header_parse_routing_ind() {
        let data = [0x06, 0x10, 0x05, 0x30, 0x00, 0x11];
        let header = KnxnetIpHeader::parse(&data).unwrap();
        assert_eq!(header.service_type, ServiceType::RoutingIndication);
        assert_eq!(header.total_length, 17);
        let mut buf = [0u8; 6];
        header.encode(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_header_encode() {
        let header = KnxnetIpHeader::new(ServiceType::SearchRequest, 8);
        let mut buf = [0u8; 6];
        let size = header.encode(&mut buf).unwrap();

        assert_eq!(size, 6);
        assert_eq!(buf[0], 0x06);
        assert_eq!(buf[1], 0x10);
        assert_eq!(buf[2..4], [0x02, 0x01]);
        assert_eq!(buf[4..6], [0x00, 0x0E]);
    }

    #[test]
    fn test_frame_builder() {
        let body = [0x01, 0x02, 0x03, 0x04];
        let builder = FrameBuilder::new(ServiceType::SearchRequest, &body);

        let mut buf = [0u8; 32];
        let size = builder.build(&mut buf).unwrap();

        assert_eq!(size, 10);
        assert_eq!(buf[0], 0x06);
        assert_eq!(buf[1], 0x10);
        assert_eq!(buf[4..6], [0x00, 0x0A]);
        assert_eq!(&buf[6..10], &body);
    }

    #[test]
    fn test_hpai_parse() {
        let data = [0x08, 0x01, 192, 168, 1, 100, 0x0E, 0x57];
        let hpai = Hpai::parse(&data).unwrap();
        assert_eq!(hpai.ip_address, [192, 168, 1, 100]);
        assert_eq!(hpai.port, 3671);
        assert!(!hpai.is_nat());
    }

    #[test]
    fn test_hpai_encode() {
        let hpai = Hpai::new([192, 168, 1, 100], 3671);
        let mut buf = [0u8; 8];
        let size = hpai.encode(&mut buf).unwrap();

        assert_eq!(size, 8);
        assert_eq!(buf[0], 0x08);
        assert_eq!(buf[1], 0x01);
        assert_eq!(&buf[2..6], &[192, 168, 1, 100]);
        assert_eq!(&buf[6..8], &[0x0E, 0x57]);
    }

    #[test]
    fn test_hpai_nat_round_trip() {
        let mut buf = [0u8; 8];
        Hpai::NAT.encode(&mut buf).unwrap();
        let parsed = Hpai::parse(&buf).unwrap();
        assert!(parsed.is_nat());
    }

    #[test]
    fn test_frame_parse() {
        let data = [
            0x06, 0x10, 0x02, 0x01, 0x00, 0x0A, 0x01, 0x02, 0x03, 0x04,
        ];

        let frame = KnxnetIpFrame::parse(&data).unwrap();
        assert_eq!(frame.service_type(), ServiceType::SearchRequest);
        assert_eq!(frame.body(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_frame_parse_ignores_trailing_bytes() {
        let mut data = vec![0x06, 0x10, 0x02, 0x01, 0x00, 0x0A, 1, 2, 3, 4];
        data.extend_from_slice(&[0xFF; 10]);
        let frame = KnxnetIpFrame::parse(&data).unwrap();
        assert_eq!(frame.body(), &[1, 2, 3, 4]);
        assert_eq!(frame.data().len(), 10);
    }
}
