//! Mock transport implementation for testing.
//!
//! This module provides a mock implementation of [`Transport`] that can be
//! used in unit tests to simulate network behavior without requiring
//! actual network hardware. Internal state lives behind an `Arc<Mutex<_>>`
//! so that cloning a `MockTransport` (the same pattern a real socket-backed
//! transport uses to hand one handle to a session's receiver thread and
//! keep another for sending) yields two handles onto the same queue.
//!
//! ## Example
//!
//! ```rust
//! use knx_net::net::mock_transport::MockTransport;
//! use knx_net::net::transport::Transport;
//! use knx_net::net::IpEndpoint;
//!
//! let mut mock = MockTransport::new();
//! mock.add_response(vec![0x06, 0x10, 0x02, 0x06]);
//!
//! let dest = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
//! mock.send_to(&[0xAA, 0xBB], dest).unwrap();
//! assert_eq!(mock.sent_packets().len(), 1);
//!
//! let mut buf = [0u8; 64];
//! let (n, _from) = mock.recv_from(&mut buf).unwrap();
//! assert_eq!(&buf[..n], &[0x06, 0x10, 0x02, 0x06]);
//! ```

use crate::error::{KnxError, Result};
use crate::net::transport::Transport;
use crate::net::IpEndpoint;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    responses: VecDeque<(Vec<u8>, IpEndpoint)>,
    sent_packets: Vec<(Vec<u8>, IpEndpoint)>,
    ready: bool,
}

/// Mock transport for testing KNX communication without real network.
///
/// Allows pre-programming responses returned by `recv_from`, and inspecting
/// packets recorded by `send_to`. Cloning shares the underlying queues.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                responses: VecDeque::new(),
                sent_packets: Vec::new(),
                ready: true,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue a response (from a default gateway endpoint) for the next `recv_from`.
    pub fn add_response(&self, data: Vec<u8>) {
        self.add_response_from(data, IpEndpoint::new([192, 168, 1, 10].into(), 3671));
    }

    /// Queue a response with an explicit source endpoint.
    pub fn add_response_from(&self, data: Vec<u8>, from: IpEndpoint) {
        self.lock().responses.push_back((data, from));
    }

    #[must_use]
    pub fn sent_packets(&self) -> Vec<(Vec<u8>, IpEndpoint)> {
        self.lock().sent_packets.clone()
    }

    #[must_use]
    pub fn last_sent(&self) -> Option<(Vec<u8>, IpEndpoint)> {
        self.lock().sent_packets.last().cloned()
    }

    pub fn clear_sent(&self) {
        self.lock().sent_packets.clear();
    }

    pub fn clear_responses(&self) {
        self.lock().responses.clear();
    }

    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    #[must_use]
    pub fn has_responses(&self) -> bool {
        !self.lock().responses.is_empty()
    }

    #[must_use]
    pub fn pending_responses(&self) -> usize {
        self.lock().responses.len()
    }
}

impl Transport for MockTransport {
    fn send_to(&mut self, data: &[u8], addr: IpEndpoint) -> Result<()> {
        self.lock().sent_packets.push((data.to_vec(), addr));
        Ok(())
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)> {
        let mut state = self.lock();
        if let Some((data, from)) = state.responses.pop_front() {
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok((len, from))
        } else {
            Err(KnxError::port_closed("mock transport exhausted"))
        }
    }

    fn is_ready(&self) -> bool {
        self.lock().ready
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.ready = false;
        state.responses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_send_receive() {
        let mut mock = MockTransport::new();
        mock.add_response(vec![0x01, 0x02, 0x03]);

        let dest = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
        mock.send_to(&[0xAA, 0xBB], dest).unwrap();

        assert_eq!(mock.sent_packets().len(), 1);
        assert_eq!(mock.sent_packets()[0].0, vec![0xAA, 0xBB]);
        assert_eq!(mock.sent_packets()[0].1, dest);

        let mut buf = [0u8; 10];
        let (n, _) = mock.recv_from(&mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_mock_no_response_returns_error() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 10];
        assert!(mock.recv_from(&mut buf).is_err());
    }

    #[test]
    fn test_mock_fifo_order() {
        let mut mock = MockTransport::new();
        mock.add_response(vec![0x01]);
        mock.add_response(vec![0x02]);
        mock.add_response(vec![0x03]);

        let mut buf = [0u8; 10];
        let (_n, _) = mock.recv_from(&mut buf).unwrap();
        assert_eq!(buf[0], 0x01);
        let (_n, _) = mock.recv_from(&mut buf).unwrap();
        assert_eq!(buf[0], 0x02);
        let (_n, _) = mock.recv_from(&mut buf).unwrap();
        assert_eq!(buf[0], 0x03);
    }

    #[test]
    fn test_mock_ready_state() {
        let mut mock = MockTransport::new();
        assert!(mock.is_ready());

        mock.set_ready(false);
        assert!(!mock.is_ready());

        mock.close();
        assert!(!mock.is_ready());
    }

    #[test]
    fn clone_shares_queue() {
        let mock = MockTransport::new();
        let mut clone = mock.clone();
        mock.add_response(vec![0xAA]);

        let mut buf = [0u8; 4];
        let (n, _) = clone.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0xAA]);
    }
}
