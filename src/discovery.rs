//! Bare `SEARCH_REQUEST`/`DESCRIPTION_REQUEST` discovery helpers.
//!
//! Full gateway discovery (parsing `SEARCH_RESPONSE` DIBs, extended search,
//! multi-homed interface selection) is out of scope; this exposes just
//! enough to compose and send the two request frames this crate's core is
//! otherwise silent on, grounded on [`crate::protocol::services`].

use crate::error::Result;
use crate::net::transport::Transport;
use crate::net::IpEndpoint;
use crate::protocol::frame::Hpai;
use crate::protocol::services::{DescriptionRequest, SearchRequest};

/// Multicast group KNXnet/IP discovery and routing traffic both use.
pub const DISCOVERY_MULTICAST_GROUP: crate::net::Ipv4Addr = crate::net::Ipv4Addr::new(224, 0, 23, 12);
/// Standard KNXnet/IP UDP/TCP port.
pub const KNXNETIP_PORT: u16 = 3671;

/// Send a `SEARCH_REQUEST` to the discovery multicast group, advertising
/// `reply_to` as the endpoint servers should answer on (or [`Hpai::NAT`] to
/// ask for a reply to this datagram's source address).
///
/// # Errors
///
/// Returns an error if encoding or sending the frame fails.
pub fn send_search_request<T: Transport>(transport: &mut T, reply_to: Hpai) -> Result<()> {
    let request = SearchRequest {
        discovery_endpoint: reply_to,
    };
    let mut buf = [0u8; 32];
    let len = request.build(&mut buf)?;
    let dest = IpEndpoint::new(DISCOVERY_MULTICAST_GROUP, KNXNETIP_PORT);
    transport.send_to(&buf[..len], dest)
}

/// Send a `DESCRIPTION_REQUEST` directly to `gateway`, advertising
/// `reply_to` as the endpoint it should answer on.
///
/// # Errors
///
/// Returns an error if encoding or sending the frame fails.
pub fn send_description_request<T: Transport>(
    transport: &mut T,
    gateway: IpEndpoint,
    reply_to: Hpai,
) -> Result<()> {
    let request = DescriptionRequest {
        control_endpoint: reply_to,
    };
    let mut buf = [0u8; 32];
    let len = request.build(&mut buf)?;
    transport.send_to(&buf[..len], gateway)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::mock_transport::MockTransport;

    #[test]
    fn search_request_targets_discovery_multicast_group() {
        let mut transport = MockTransport::new();
        send_search_request(&mut transport, Hpai::NAT).unwrap();

        let (_, dest) = transport.last_sent().unwrap();
        assert_eq!(dest, IpEndpoint::new(DISCOVERY_MULTICAST_GROUP, KNXNETIP_PORT));
    }

    #[test]
    fn description_request_targets_gateway() {
        let mut transport = MockTransport::new();
        let gateway = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
        send_description_request(&mut transport, gateway, Hpai::NAT).unwrap();

        let (_, dest) = transport.last_sent().unwrap();
        assert_eq!(dest, gateway);
    }
}
