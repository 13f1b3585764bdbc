//! Network transport abstraction for KNXnet/IP communication.
//!
//! This module provides the [`Transport`] trait that abstracts the
//! underlying network transport mechanism, enabling:
//! - Testability through mock implementations
//! - Flexibility to support different transport types (UDP, TCP, serial)
//! - Dependency Inversion Principle compliance
//!
//! Unlike the embedded original this crate is descended from, transports
//! here are blocking: each endpoint owns one receiver thread
//! (see [`crate::net::udp`], [`crate::net::tcp`]) that calls `recv_from` in
//! a loop and dispatches to the owning session or routing endpoint.
//!
//! ## Design Pattern
//!
//! This follows the **Dependency Inversion Principle (DIP)**:
//! - High-level modules (the client session, the routing endpoint) depend
//!   on this abstraction.
//! - Low-level modules (UDP/TCP socket implementations) also depend on the
//!   same abstraction.
//! - Both can vary independently.
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_net::net::transport::Transport;
//! use knx_net::net::mock_transport::MockTransport;
//! use knx_net::net::IpEndpoint;
//!
//! let mut mock = MockTransport::new();
//! mock.add_response(vec![0x06, 0x10, 0x02, 0x06, 0x00, 0x0E]);
//! let mut buf = [0u8; 64];
//! let (n, _from) = mock.recv_from(&mut buf).unwrap();
//! assert_eq!(n, 6);
//! ```

use crate::error::Result;
use crate::net::IpEndpoint;

/// Blocking network transport abstraction.
///
/// This trait defines the interface for any network transport mechanism
/// that can send and receive UDP-like datagrams. Implementations can be
/// real network sockets, mock objects for testing, or alternative transports.
pub trait Transport: Send {
    /// Bind the transport to a local port.
    ///
    /// # Errors
    ///
    /// Returns an error if the port is already in use or binding fails.
    ///
    /// Default implementation does nothing; override if your transport
    /// requires explicit binding before sending/receiving.
    fn bind(&mut self, _port: u16) -> Result<()> {
        Ok(())
    }

    /// Send data to a specific network endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is unavailable, the send buffer is
    /// full, or the transport is closed.
    fn send_to(&mut self, data: &[u8], addr: IpEndpoint) -> Result<()>;

    /// Receive data from the network, blocking until a datagram is
    /// available, the transport is closed, or an I/O error occurs.
    ///
    /// # Errors
    ///
    /// Returns an error if the receive operation fails or the transport is
    /// closed.
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)>;

    /// Check if the transport is currently connected/ready.
    ///
    /// Default implementation returns `true`; override if your transport
    /// has connection state to track.
    fn is_ready(&self) -> bool {
        true
    }

    /// Close the transport and release resources, unblocking any thread
    /// parked in [`Transport::recv_from`].
    ///
    /// Default implementation does nothing; override if your transport
    /// needs cleanup.
    fn close(&mut self) {}
}
