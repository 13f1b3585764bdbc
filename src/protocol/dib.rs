//! Description Information Block (DIB) parsing and encoding.
//!
//! DIBs are the type-tagged, variable-length structures carried in
//! `DESCRIPTION_RESPONSE` and `SEARCH_RESPONSE` frames. Each DIB starts with
//! a one-byte structure length and a one-byte type code; unknown type codes
//! are preserved as opaque payloads rather than rejected, since new DIB
//! types are added to the standard over time.

use crate::error::{KnxError, Result};

/// DIB type codes (KNXnet/IP Core + Device Management + IP DIBs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DibType {
    /// `DEVICE_INFO` - device identity, serial, MAC, friendly name
    DeviceInfo = 0x01,
    /// `SUPP_SVC_FAMILIES` - supported service families and versions
    SuppSvcFamilies = 0x02,
    /// `IP_CONFIG` - current IP assignment method and addressing
    IpConfig = 0x03,
    /// `IP_CUR_CONFIG` - currently active IP configuration
    IpCurrentConfig = 0x04,
    /// `KNX_ADDRESSES` - list of additional individual addresses
    KnxAddresses = 0x05,
    /// `MFR_DATA` - manufacturer-specific data
    MfrData = 0xFE,
    /// `SECURE_SERVICE_FAMILIES` - supported secure service families
    SecureServiceFamilies = 0x06,
    /// `TUNNELING_INFO` - max APDU length and tunnelling slot info
    TunnelingInfo = 0x07,
    /// `ADDITIONAL_DEVICE_INFO` - extra device descriptors
    AdditionalDeviceInfo = 0x08,
    /// Unrecognized DIB type, preserved verbatim.
    Unknown(u8),
}

impl DibType {
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Self::DeviceInfo,
            0x02 => Self::SuppSvcFamilies,
            0x03 => Self::IpConfig,
            0x04 => Self::IpCurrentConfig,
            0x05 => Self::KnxAddresses,
            0x06 => Self::SecureServiceFamilies,
            0x07 => Self::TunnelingInfo,
            0x08 => Self::AdditionalDeviceInfo,
            0xFE => Self::MfrData,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::DeviceInfo => 0x01,
            Self::SuppSvcFamilies => 0x02,
            Self::IpConfig => 0x03,
            Self::IpCurrentConfig => 0x04,
            Self::KnxAddresses => 0x05,
            Self::SecureServiceFamilies => 0x06,
            Self::TunnelingInfo => 0x07,
            Self::AdditionalDeviceInfo => 0x08,
            Self::MfrData => 0xFE,
            Self::Unknown(v) => v,
        }
    }
}

/// A single Description Information Block: a type-tagged opaque payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dib<'a> {
    pub dib_type: DibType,
    /// Payload following the 2-byte (length, type) prefix.
    pub payload: &'a [u8],
}

impl<'a> Dib<'a> {
    /// Parse a single DIB from the front of `data`. Returns the DIB and the
    /// number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if the declared structure length is smaller
    /// than the 2-byte prefix or overruns the buffer.
    pub fn parse(data: &'a [u8]) -> Result<(Self, usize)> {
        if data.len() < 2 {
            return Err(KnxError::BufferTooSmall);
        }
        let structure_length = data[0] as usize;
        if structure_length < 2 {
            return Err(KnxError::malformed("DIB structure length below minimum"));
        }
        if data.len() < structure_length {
            return Err(KnxError::malformed("DIB structure length exceeds buffer"));
        }
        let dib_type = DibType::from_u8(data[1]);
        let payload = &data[2..structure_length];
        Ok((Self { dib_type, payload }, structure_length))
    }

    /// Encode this DIB into `buf`. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if the total structure would exceed 255
    /// bytes, or `BufferTooSmall` if `buf` doesn't fit it.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let total = 2 + self.payload.len();
        if total > u8::MAX as usize {
            return Err(KnxError::malformed("DIB exceeds maximum structure length"));
        }
        if buf.len() < total {
            return Err(KnxError::BufferTooSmall);
        }
        buf[0] = total as u8;
        buf[1] = self.dib_type.to_u8();
        buf[2..total].copy_from_slice(self.payload);
        Ok(total)
    }
}

/// Parse a sequence of back-to-back DIBs filling `data` (as found in a
/// `DESCRIPTION_RESPONSE` or `SEARCH_RESPONSE` body).
///
/// # Errors
///
/// Returns `MalformedFrame` if any individual DIB fails to parse, or if the
/// same [`DibType`] (other than `Unknown`) appears more than once — per the
/// core's invariant, a duplicate DIB type in one description is rejected
/// rather than silently overwritten.
pub fn parse_all(mut data: &[u8]) -> Result<Vec<Dib<'_>>> {
    let mut dibs = Vec::new();
    while !data.is_empty() {
        let (dib, consumed) = Dib::parse(data)?;
        if !matches!(dib.dib_type, DibType::Unknown(_))
            && dibs.iter().any(|d: &Dib<'_>| d.dib_type == dib.dib_type)
        {
            return Err(KnxError::malformed("duplicate DIB type in description"));
        }
        dibs.push(dib);
        data = &data[consumed..];
    }
    Ok(dibs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_dib() {
        let data = [0x05, 0x01, 0xAA, 0xBB, 0xCC];
        let (dib, consumed) = Dib::parse(&data).unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(dib.dib_type, DibType::DeviceInfo);
        assert_eq!(dib.payload, &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn round_trips_through_encode() {
        let dib = Dib {
            dib_type: DibType::SuppSvcFamilies,
            payload: &[0x02, 0x01, 0x03, 0x02],
        };
        let mut buf = [0u8; 16];
        let n = dib.encode(&mut buf).unwrap();
        let (parsed, consumed) = Dib::parse(&buf[..n]).unwrap();
        assert_eq!(consumed, n);
        assert_eq!(parsed, dib);
    }

    #[test]
    fn parse_all_collects_sequential_dibs() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x03, 0x01, 0x00]);
        data.extend_from_slice(&[0x04, 0x02, 0x01, 0x02]);
        let dibs = parse_all(&data).unwrap();
        assert_eq!(dibs.len(), 2);
        assert_eq!(dibs[0].dib_type, DibType::DeviceInfo);
        assert_eq!(dibs[1].dib_type, DibType::SuppSvcFamilies);
    }

    #[test]
    fn parse_all_rejects_duplicate_type() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x03, 0x01, 0x00]);
        data.extend_from_slice(&[0x03, 0x01, 0x01]);
        assert!(parse_all(&data).is_err());
    }

    #[test]
    fn unknown_type_preserved() {
        let data = [0x03, 0x7F, 0x00];
        let (dib, _) = Dib::parse(&data).unwrap();
        assert_eq!(dib.dib_type, DibType::Unknown(0x7F));
    }
}
