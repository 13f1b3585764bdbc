//! Integration tests for the knx-net library.
//!
//! The `Session`-based tests run entirely against `MockTransport` and need no
//! external KNX hardware. Tests marked `#[ignore]` exercise a real UDP socket
//! against a live gateway or simulator and are skipped by default.

use knx_net::addressing::{GroupAddress, IndividualAddress};
use knx_net::net::udp::UdpTransport;
use knx_net::net::IpEndpoint;
use knx_net::protocol::cemi::{ControlField1, ControlField2};
use knx_net::protocol::constants::CEMIMessageCode;
use knx_net::protocol::session::{ConnectionKind, SendMode, Session};

fn simulator_addr() -> IpEndpoint {
    IpEndpoint::new([127, 0, 0, 1].into(), 3671)
}

#[test]
#[ignore]
fn test_tunnel_connection() {
    let transport = UdpTransport::bind(IpEndpoint::new([0, 0, 0, 0].into(), 0))
        .expect("failed to bind UDP transport");
    let mut session = Session::new(transport, simulator_addr(), ConnectionKind::Tunnel);
    session.connect().expect("connect should succeed against a running simulator");
    session.disconnect();
}

#[test]
#[ignore]
fn test_tunnel_send_cemi() {
    let transport = UdpTransport::bind(IpEndpoint::new([0, 0, 0, 0].into(), 0))
        .expect("failed to bind UDP transport");
    let mut session = Session::new(transport, simulator_addr(), ConnectionKind::Tunnel);
    session.connect().expect("connect should succeed against a running simulator");

    let cemi = build_test_cemi_frame();
    session
        .send(&cemi, SendMode::WaitForAck)
        .expect("tunneling request should be acknowledged");

    session.disconnect();
}

#[test]
#[ignore]
fn test_tunnel_disconnect() {
    let transport = UdpTransport::bind(IpEndpoint::new([0, 0, 0, 0].into(), 0))
        .expect("failed to bind UDP transport");
    let mut session = Session::new(transport, simulator_addr(), ConnectionKind::Tunnel);
    session.connect().expect("connect should succeed against a running simulator");
    session.disconnect();
}

#[test]
fn test_group_address_creation() {
    let addr = GroupAddress::new(1, 2, 3).unwrap();
    assert_eq!(u16::from(addr), 0x0A03);

    let addr = GroupAddress::from(0x0A03u16);
    assert_eq!(addr.main(), 1);
    assert_eq!(addr.middle(), 2);
    assert_eq!(addr.sub(), 3);
}

#[test]
fn test_individual_address_creation() {
    let addr = IndividualAddress::new(1, 1, 250).unwrap();
    assert_eq!(u16::from(addr), 0x11FA);

    let addr = IndividualAddress::from(0x11FAu16);
    assert_eq!(addr.area(), 1);
    assert_eq!(addr.line(), 1);
    assert_eq!(addr.device(), 250);
}

fn build_test_cemi_frame() -> [u8; 11] {
    let ctrl1 = u8::from(ControlField1::default());
    let ctrl2 = u8::from(ControlField2::default());

    [
        CEMIMessageCode::LDataReq.to_u8(),
        0x00, // additional info length
        ctrl1,
        ctrl2,
        0x11, 0xFA, // source address
        0x0A, 0x03, // destination address
        0x01, // NPDU length
        0x00, 0x80, // TPCI/APCI: GroupValueWrite
    ]
}
