//! TCP transport backed by `std::net::TcpStream`.
//!
//! Unlike UDP, TCP has no datagram boundaries: a `CONNECT_REQUEST` and a
//! `TUNNELLING_REQUEST` that both land in the same `read()` call must be
//! split back into individual frames. [`TcpTransport::recv_from`]
//! reassembles exactly one frame per call by reading the 6-byte header
//! first, then the remainder indicated by `totalLength`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{KnxError, Result};
use crate::net::transport::Transport;
use crate::net::IpEndpoint;
use crate::protocol::constants::MAX_FRAME_SIZE;
use crate::protocol::frame::KnxnetIpHeader;

const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Blocking TCP transport, one connection per session.
///
/// Cheaply cloneable: clones share the same connection, mirroring
/// `TcpStream::try_clone`. `send_to`/`recv_from` ignore their `addr`
/// parameter's relevance to routing (TCP has exactly one peer, fixed at
/// connect time) but keep it in the signature to satisfy [`Transport`].
#[derive(Debug, Clone)]
pub struct TcpTransport {
    stream: Arc<Mutex<TcpStream>>,
    peer: IpEndpoint,
}

impl TcpTransport {
    /// Connect to `peer`.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the connection fails.
    pub fn connect(peer: IpEndpoint) -> Result<Self> {
        let stream = TcpStream::connect(peer.to_socket_addr())?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Arc::new(Mutex::new(stream)),
            peer,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TcpStream> {
        self.stream.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Read exactly `buf.len()` bytes, retrying across the socket's read
    /// timeout until the data arrives or the peer disconnects.
    fn read_exact_retrying(stream: &mut TcpStream, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(KnxError::port_closed("peer closed the TCP connection")),
                Ok(n) => filled += n,
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn send_to(&mut self, data: &[u8], _addr: IpEndpoint) -> Result<()> {
        self.lock().write_all(data)?;
        Ok(())
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)> {
        let mut stream = self.lock();
        let mut header_buf = [0u8; KnxnetIpHeader::SIZE];
        Self::read_exact_retrying(&mut stream, &mut header_buf)?;

        let header = KnxnetIpHeader::parse(&header_buf)?;
        let total_len = header.total_length as usize;
        if total_len > MAX_FRAME_SIZE || total_len < KnxnetIpHeader::SIZE || total_len > buf.len() {
            return Err(KnxError::malformed("TCP frame length out of bounds"));
        }

        buf[..KnxnetIpHeader::SIZE].copy_from_slice(&header_buf);
        Self::read_exact_retrying(&mut stream, &mut buf[KnxnetIpHeader::SIZE..total_len])?;

        Ok((total_len, self.peer))
    }

    fn close(&mut self) {
        let _ = self.lock().shutdown(std::net::Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn recv_from_reassembles_split_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            // write header and body in two separate writes to exercise reassembly
            sock.write_all(&[0x06, 0x10, 0x02, 0x06]).unwrap();
            thread::sleep(Duration::from_millis(20));
            sock.write_all(&[0x00, 0x08, 0xAA, 0xBB]).unwrap();
        });

        let mut client = TcpTransport::connect(IpEndpoint::from(match addr {
            std::net::SocketAddr::V4(v4) => v4,
            std::net::SocketAddr::V6(_) => unreachable!(),
        }))
        .unwrap();

        let mut buf = [0u8; 64];
        let (n, _from) = client.recv_from(&mut buf).unwrap();
        assert_eq!(n, 8);
        assert_eq!(&buf[..8], &[0x06, 0x10, 0x02, 0x06, 0x00, 0x08, 0xAA, 0xBB]);

        server.join().unwrap();
    }

    #[test]
    fn clone_shares_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let _ = listener.accept().unwrap();
        });

        let client = TcpTransport::connect(IpEndpoint::from(match addr {
            std::net::SocketAddr::V4(v4) => v4,
            std::net::SocketAddr::V6(_) => unreachable!(),
        }))
        .unwrap();
        let mut clone = client.clone();
        clone.send_to(&[1, 2, 3], clone.peer).unwrap();

        server.join().unwrap();
    }
}
