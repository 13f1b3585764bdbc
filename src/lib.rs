#![allow(dead_code)]
#![doc = include_str!("../README.md")]

//! # knx-net
//!
//! A KNXnet/IP network-access core: wire codec, client session state
//! machine (Tunnelling and Device Management), the multicast routing
//! endpoint, and the FT1.2/TP-UART serial links to a BCU.
//!
//! This crate targets a hosted environment: transports are blocking and
//! run on OS threads rather than an async executor (see [`net::transport`]
//! and [`clock`]). DPT value encoding/decoding, secure-session
//! cryptography, and discovery helpers beyond a bare `SEARCH_REQUEST`
//! composer are out of scope; see [`discovery`] and [`dpt`] for the thin
//! surfaces that remain.
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_net::net::udp::UdpTransport;
//! use knx_net::net::IpEndpoint;
//! use knx_net::protocol::session::{ConnectionKind, SendMode, Session};
//!
//! # fn main() -> Result<(), knx_net::KnxError> {
//! let transport = UdpTransport::bind(IpEndpoint::new([0, 0, 0, 0].into(), 0))?;
//! let gateway = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
//! let mut session = Session::new(transport, gateway, ConnectionKind::Tunnel);
//! session.connect()?;
//! session.send(&[0x11, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x09, 0x01, 0x01, 0x00], SendMode::WaitForAck)?;
//! session.disconnect();
//! # Ok(())
//! # }
//! ```

pub mod addressing;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod dpt;
pub mod error;
pub mod net;
pub mod protocol;
pub mod serial;

// Macro module (must be declared before use)
#[macro_use]
pub mod macros;

// Re-export commonly used types
pub use addressing::{GroupAddress, IndividualAddress};
pub use config::Config;
pub use error::{KnxError, Result};
