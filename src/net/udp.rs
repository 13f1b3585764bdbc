//! UDP transport backed by `std::net::UdpSocket`.
//!
//! Plain point-to-point tunnelling traffic and multicast routing traffic
//! both ride on a [`UdpTransport`]; [`UdpTransport::join_multicast`] is the
//! only bit specific to the routing endpoint.

use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{KnxError, Result};
use crate::net::transport::Transport;
use crate::net::IpEndpoint;

/// Socket read timeout used so `recv_from` wakes up periodically to notice
/// [`Transport::close`] instead of blocking forever on a dead socket.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Blocking UDP transport. Cheaply cloneable: clones share the same
/// underlying socket (`UdpSocket` is usable concurrently from multiple
/// threads once bound), mirroring `UdpSocket::try_clone`.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind to `local` (use port 0 to let the OS pick an ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the bind fails.
    pub fn bind(local: IpEndpoint) -> Result<Self> {
        let socket = UdpSocket::bind(local.to_socket_addr())?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Join a multicast group (the routing endpoint's `224.0.23.12:3671`) on
    /// the given local interface.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if joining the group fails.
    pub fn join_multicast(&self, group: crate::net::Ipv4Addr, interface: crate::net::Ipv4Addr) -> Result<()> {
        self.socket
            .join_multicast_v4(&group.to_std(), &interface.to_std())?;
        Ok(())
    }

    /// The local address this socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the underlying syscall fails.
    pub fn local_addr(&self) -> Result<IpEndpoint> {
        let addr = self.socket.local_addr()?;
        match addr {
            std::net::SocketAddr::V4(v4) => Ok(IpEndpoint::from(v4)),
            std::net::SocketAddr::V6(_) => Err(KnxError::malformed("unexpected IPv6 local address")),
        }
    }
}

impl Transport for UdpTransport {
    fn send_to(&mut self, data: &[u8], addr: IpEndpoint) -> Result<()> {
        self.socket.send_to(data, addr.to_socket_addr())?;
        Ok(())
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)> {
        loop {
            match self.socket.recv_from(buf) {
                Ok((n, std::net::SocketAddr::V4(from))) => return Ok((n, IpEndpoint::from(from))),
                Ok((_, std::net::SocketAddr::V6(_))) => {
                    tracing::debug!("dropping datagram from unexpected IPv6 source");
                    continue;
                }
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "udp recv_from failed");
                    return Err(e.into());
                }
            }
        }
    }

    fn close(&mut self) {
        // UdpSocket has no explicit close; dropping the last Arc releases
        // the fd. The receiver thread's recv_from will keep timing out
        // harmlessly until the session stops polling it.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_to_ephemeral_port_succeeds() {
        let transport = UdpTransport::bind(IpEndpoint::new([127, 0, 0, 1].into(), 0)).unwrap();
        assert!(transport.local_addr().unwrap().port > 0);
    }

    #[test]
    fn send_and_receive_loopback() {
        let mut a = UdpTransport::bind(IpEndpoint::new([127, 0, 0, 1].into(), 0)).unwrap();
        let mut b = UdpTransport::bind(IpEndpoint::new([127, 0, 0, 1].into(), 0)).unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(&[1, 2, 3], b_addr).unwrap();
        let (n, _from) = b.recv_from(&mut [0u8; 16]).unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn clone_shares_socket() {
        let a = UdpTransport::bind(IpEndpoint::new([127, 0, 0, 1].into(), 0)).unwrap();
        let b = a.clone();
        assert_eq!(a.local_addr().unwrap(), b.local_addr().unwrap());
    }
}
