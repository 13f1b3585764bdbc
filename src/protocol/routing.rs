//! Multicast routing endpoint: best-effort `ROUTING_IND` fan-out plus the
//! `ROUTING_LOST_MSG`/`ROUTING_BUSY` flow-control handshake.
//!
//! Connectionless and symmetric: grounded on the receive-loop shape of
//! [`crate::protocol::session::Session`] (one receiver thread, a listener
//! callback interface) but with no channel id, sequence counter, or
//! connect/disconnect handshake — every multicast group member is a peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::{CloseInitiator, KnxError, Result};
use crate::net::transport::Transport;
use crate::net::IpEndpoint;
use crate::protocol::cemi::{Apci, CEMIFrame};
use crate::protocol::constants::{CEMIMessageCode, ServiceType, MAX_FRAME_SIZE};
use crate::protocol::frame::{FrameBuilder, KnxnetIpFrame};
use crate::protocol::services::{RoutingBusy, RoutingLostMessage};

const RATE_LIMIT_PER_SECOND: u32 = 50;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(1);
const BUSY_JITTER_STEP_MS: u32 = 50;
const BUSY_INCREMENT_WINDOW: Duration = Duration::from_millis(10);
const BUSY_DECREMENT_INTERVAL_MS: u64 = 5;
const BUSY_SLOWDOWN_UNIT_MS: u32 = 100;
const BUSY_MIN_WAIT_MS: u16 = 20;
const BUSY_MAX_WAIT_MS: u16 = 100;

/// Raw 10-bit APCI codes this endpoint treats as qualifying for
/// `RoutingSystemBroadcast` instead of plain `ROUTING_IND`. The source this
/// core was distilled from bit-decodes the secure-service subset without
/// documenting it (an open question — see `DESIGN.md`); this list covers
/// only the two plainly-named services from §4.4 and is deliberately
/// conservative rather than guessed.
const SYSTEM_BROADCAST_APCI: [u16; 2] = [
    0x0746, // A_SystemNetworkParameter_Read
    0x0747, // A_SystemNetworkParameter_Response
];

/// Events delivered to a [`RoutingListener`].
#[derive(Debug, Clone)]
pub enum RoutingEvent {
    /// A `ROUTING_IND` (or `RoutingSystemBroadcast`) carrying a cEMI frame.
    FrameReceived(Vec<u8>),
    /// A `ROUTING_LOST_MSG` reporting indications this router dropped.
    LostMessage { device_state: u8, lost_count: u16 },
    /// A `ROUTING_BUSY` this endpoint is honoring by slowing its own sends.
    RoutingBusyReceived {
        device_state: u8,
        wait_time_ms: u16,
        control_field: u16,
    },
    /// The local send-side rate limiter dropped indications this second.
    RateLimited { dropped: u32 },
    /// The endpoint was torn down.
    ConnectionClosed {
        initiator: CloseInitiator,
        reason: &'static str,
    },
}

/// Receives [`RoutingEvent`]s from a [`RoutingEndpoint`]'s receiver thread.
pub trait RoutingListener: Send {
    fn on_event(&self, event: RoutingEvent);
}

impl<F: Fn(RoutingEvent) + Send> RoutingListener for F {
    fn on_event(&self, event: RoutingEvent) {
        self(event);
    }
}

struct RateLimiter {
    window_start: Instant,
    count: u32,
    dropped_this_window: u32,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
            dropped_this_window: 0,
        }
    }

    /// Returns `Ok(())` to send, or `Err(dropped_count)` once 50
    /// indications have already left in the current 1-second window.
    fn try_acquire(&mut self) -> std::result::Result<(), u32> {
        if self.window_start.elapsed() >= RATE_LIMIT_WINDOW {
            self.window_start = Instant::now();
            self.count = 0;
            self.dropped_this_window = 0;
        }
        if self.count >= RATE_LIMIT_PER_SECOND {
            self.dropped_this_window += 1;
            return Err(self.dropped_this_window);
        }
        self.count += 1;
        Ok(())
    }
}

/// Routing-Busy backoff counter `N`, decayed lazily from elapsed wall-clock
/// time rather than a dedicated ticking thread (equivalent under the
/// formula in §4.4, since `N` is only ever consulted when a new busy
/// message arrives).
struct BusyBackoff {
    n: i32,
    last_busy_at: Option<Instant>,
}

impl BusyBackoff {
    const fn new() -> Self {
        Self {
            n: 0,
            last_busy_at: None,
        }
    }

    fn decay(&mut self, now: Instant) {
        let Some(last_at) = self.last_busy_at else { return };
        if self.n <= 0 {
            return;
        }
        let slowdown = Duration::from_millis(u64::from(self.n as u32 * BUSY_SLOWDOWN_UNIT_MS));
        let elapsed = now.saturating_duration_since(last_at);
        if elapsed > slowdown {
            let ticks = ((elapsed - slowdown).as_millis() / u128::from(BUSY_DECREMENT_INTERVAL_MS)) as i32;
            self.n = (self.n - ticks).max(0);
        }
    }

    /// Record a newly-received `ROUTING_BUSY` and return the wait duration
    /// to honor: `waitTime_ms + rand(0,1) * N * 50ms`.
    fn on_busy(&mut self, wait_time_ms: u16) -> Duration {
        let now = Instant::now();
        self.decay(now);
        let should_increment = match self.last_busy_at {
            Some(last) => now.saturating_duration_since(last) >= BUSY_INCREMENT_WINDOW,
            None => true,
        };
        if should_increment {
            self.n += 1;
        }
        self.last_busy_at = Some(now);

        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let jitter_ms = (jitter * f64::from(self.n) * f64::from(BUSY_JITTER_STEP_MS)) as u64;
        Duration::from_millis(u64::from(wait_time_ms) + jitter_ms)
    }
}

/// A multicast routing endpoint bound to one KNXnet/IP routing group.
pub struct RoutingEndpoint<T: Transport + Clone + 'static> {
    transport: T,
    group: IpEndpoint,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    busy: Arc<Mutex<BusyBackoff>>,
    listener: Arc<Mutex<Option<Box<dyn RoutingListener>>>>,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
}

impl<T: Transport + Clone + 'static> RoutingEndpoint<T> {
    /// Wrap `transport` (already bound/joined to `group`'s multicast
    /// address) as a routing endpoint and start its receiver thread.
    #[must_use]
    pub fn new(transport: T, group: IpEndpoint) -> Self {
        let mut endpoint = Self {
            transport,
            group,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            busy: Arc::new(Mutex::new(BusyBackoff::new())),
            listener: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            receiver: None,
        };
        endpoint.start_receiver();
        endpoint
    }

    /// Register the listener receiving [`RoutingEvent`]s.
    pub fn set_listener<L: RoutingListener + 'static>(&self, listener: L) {
        *self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(Box::new(listener));
    }

    /// Multicast a cEMI frame as `ROUTING_IND`, or as `RoutingSystemBroadcast`
    /// when it matches one of the qualifying system services (see
    /// `SYSTEM_BROADCAST_APCI`). Subject to the 50 indications/second leaky
    /// bucket; beyond that, the send is dropped and a `RateLimited` event is
    /// raised instead of blocking the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or sending the datagram fails.
    pub fn send(&mut self, cemi: &[u8]) -> Result<()> {
        let acquired = self
            .rate_limiter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .try_acquire();
        let dropped = match acquired {
            Ok(()) => None,
            Err(dropped) => Some(dropped),
        };
        if let Some(dropped) = dropped {
            let guard = self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(listener) = guard.as_ref() {
                listener.on_event(RoutingEvent::RateLimited { dropped });
            }
            return Ok(());
        }

        let service = if is_system_broadcast(cemi) {
            ServiceType::RoutingSystemBroadcast
        } else {
            ServiceType::RoutingIndication
        };
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = FrameBuilder::new(service, cemi).build(&mut buf)?;
        self.transport.send_to(&buf[..len], self.group)
    }

    fn start_receiver(&mut self) {
        self.running.store(true, Ordering::SeqCst);
        let mut transport = self.transport.clone();
        let busy = Arc::clone(&self.busy);
        let listener = Arc::clone(&self.listener);
        let running = Arc::clone(&self.running);

        self.receiver = Some(thread::spawn(move || {
            let mut buf = [0u8; MAX_FRAME_SIZE];
            while running.load(Ordering::SeqCst) {
                match transport.recv_from(&mut buf) {
                    Ok((n, _from)) => handle_inbound(&buf[..n], &busy, &listener),
                    Err(KnxError::PortClosed { .. } | KnxError::ConnectionClosed { .. }) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "dropping unparsable routing datagram");
                    }
                }
            }
        }));
    }

    /// Close the endpoint, releasing the receiver thread.
    pub fn close(&mut self, initiator: CloseInitiator, reason: &'static str) {
        self.running.store(false, Ordering::SeqCst);
        self.transport.close();
        if let Some(handle) = self.receiver.take() {
            let _ = handle.join();
        }
        let guard = self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(listener) = guard.as_ref() {
            listener.on_event(RoutingEvent::ConnectionClosed { initiator, reason });
        }
    }
}

impl<T: Transport + Clone + 'static> Drop for RoutingEndpoint<T> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn handle_inbound(
    data: &[u8],
    busy: &Arc<Mutex<BusyBackoff>>,
    listener: &Arc<Mutex<Option<Box<dyn RoutingListener>>>>,
) {
    let frame = match KnxnetIpFrame::parse(data) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, "malformed routing datagram");
            return;
        }
    };

    let event = match frame.service_type() {
        ServiceType::RoutingIndication | ServiceType::RoutingSystemBroadcast => {
            RoutingEvent::FrameReceived(frame.body().to_vec())
        }
        ServiceType::RoutingLostMessage => match RoutingLostMessage::parse(frame.body()) {
            Ok(lost) => RoutingEvent::LostMessage {
                device_state: lost.device_state,
                lost_count: lost.lost_message_count,
            },
            Err(e) => {
                tracing::debug!(error = %e, "malformed ROUTING_LOST_MSG");
                return;
            }
        },
        ServiceType::RoutingBusy => match RoutingBusy::parse(frame.body()) {
            Ok(busy_msg) => {
                let wait = busy
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .on_busy(busy_msg.wait_time_ms);
                thread::sleep(wait);
                RoutingEvent::RoutingBusyReceived {
                    device_state: busy_msg.device_state,
                    wait_time_ms: busy_msg.wait_time_ms,
                    control_field: busy_msg.control_field,
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "malformed ROUTING_BUSY");
                return;
            }
        },
        _ => return,
    };

    let guard = listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(listener) = guard.as_ref() {
        listener.on_event(event);
    }
}

/// Classify a cEMI L-Data-broadcast as a qualifying system service per
/// §4.4's `RoutingSystemBroadcast` carve-out.
fn is_system_broadcast(cemi: &[u8]) -> bool {
    if cemi.first().copied() != Some(CEMIMessageCode::LDataReq.to_u8()) {
        return false;
    }
    let Ok(ldata) = CEMIFrame::parse(cemi).and_then(|f| f.as_ldata()) else {
        return false;
    };
    if ldata.destination_raw != 0 {
        return false;
    }
    matches!(ldata.apci, Apci::Unknown(code) if SYSTEM_BROADCAST_APCI.contains(&code))
}

/// Construct a `ROUTING_BUSY` payload, rejecting a `waitTime_ms` outside
/// the normative 20-100 ms range.
///
/// # Errors
///
/// Returns `ValueOutOfRange` if `wait_time_ms` is outside `[20, 100]`.
pub fn routing_busy(device_state: u8, wait_time_ms: u16, control_field: u16) -> Result<RoutingBusy> {
    if !(BUSY_MIN_WAIT_MS..=BUSY_MAX_WAIT_MS).contains(&wait_time_ms) {
        return Err(KnxError::ValueOutOfRange);
    }
    Ok(RoutingBusy {
        device_state,
        wait_time_ms,
        control_field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::mock_transport::MockTransport;

    fn group() -> IpEndpoint {
        IpEndpoint::new([224, 0, 23, 12].into(), 3671)
    }

    #[test]
    fn send_targets_the_multicast_group() {
        let mut endpoint = RoutingEndpoint::new(MockTransport::new(), group());
        endpoint.send(&[0x29, 0x00, 0xBC, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x01, 0x00]).unwrap();
        let (_, dest) = endpoint.transport.last_sent().unwrap();
        assert_eq!(dest, group());
        endpoint.close(CloseInitiator::Local, "test teardown");
    }

    #[test]
    fn rate_limiter_drops_after_fifty_per_second() {
        let mut limiter = RateLimiter::new();
        for _ in 0..RATE_LIMIT_PER_SECOND {
            assert!(limiter.try_acquire().is_ok());
        }
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn routing_busy_rejects_out_of_range_wait_time() {
        assert!(routing_busy(0, 10, 0).is_err());
        assert!(routing_busy(0, 150, 0).is_err());
        assert!(routing_busy(0, 50, 0).is_ok());
    }

    #[test]
    fn busy_backoff_increments_on_repeated_busy_within_window() {
        let mut backoff = BusyBackoff::new();
        let first = backoff.on_busy(50);
        let second = backoff.on_busy(50);
        assert!(first.as_millis() >= 50);
        assert!(second.as_millis() >= 50);
        assert!(backoff.n >= 1);
    }

    #[test]
    fn system_broadcast_classification_rejects_non_broadcast_destination() {
        let cemi = [0x11, 0x00, 0xBC, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x01, 0x00];
        assert!(!is_system_broadcast(&cemi));
    }
}
