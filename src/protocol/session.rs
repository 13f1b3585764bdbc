//! Client session state machine for point-to-point KNXnet/IP connections.
//!
//! A full threaded session: it owns a [`Transport`], a receiver thread, and
//! the condvar-driven ack/con/heartbeat timers needed to drive Tunnelling
//! and Device-Management connections alike (the two share the same
//! CONNECT/CONNECTIONSTATE/DISCONNECT/sequence-counted data frame shape,
//! selected by [`ConnectionKind`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_net::net::mock_transport::MockTransport;
//! use knx_net::net::IpEndpoint;
//! use knx_net::protocol::session::{ConnectionKind, SendMode, Session};
//!
//! let transport = MockTransport::new();
//! let gateway = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
//! let mut session = Session::new(transport, gateway, ConnectionKind::Tunnel);
//! session.connect()?;
//! session.send(&[0x11, 0x00, 0xBC, 0xE0], SendMode::WaitForAck)?;
//! session.disconnect();
//! # Ok::<(), knx_net::error::KnxError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::clock::{Deadline, Signal};
use crate::error::{CloseInitiator, KnxError, Result, TimeoutPhase};
use crate::net::transport::Transport;
use crate::net::IpEndpoint;
use crate::protocol::constants::{CEMIMessageCode, MAX_FRAME_SIZE, ServiceType};
use crate::protocol::frame::{Hpai, KnxnetIpFrame};
use crate::protocol::services::{
    ConnectRequest, ConnectResponse, ConnectionHeader, ConnectionRequestInfo,
    ConnectionResponseData, ConnectionStateRequest, ConnectionStateResponse, DisconnectRequest,
    DisconnectResponse, TunnelingAck, TunnelingRequest,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ACK_TIMEOUT: Duration = Duration::from_secs(1);
const CON_TIMEOUT: Duration = Duration::from_secs(3);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);
const HEARTBEAT_MAX_ATTEMPTS: u32 = 4;

/// Which connection type a [`Session`] drives. Both share the control-flow
/// shape of §4.3; only the data-frame service types differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// `TUNNEL_CONNECTION`, carrying `TUNNELLING_REQUEST`/`ACK`.
    Tunnel,
    /// `DEVICE_MGMT_CONNECTION`, carrying `DEVICE_CONFIGURATION_REQUEST`/`ACK`.
    DeviceManagement,
}

impl ConnectionKind {
    const fn cri(self, layer: u8) -> ConnectionRequestInfo {
        match self {
            Self::Tunnel => ConnectionRequestInfo::Tunnel { knx_layer: layer },
            Self::DeviceManagement => ConnectionRequestInfo::DeviceManagement,
        }
    }

    const fn request_service(self) -> ServiceType {
        match self {
            Self::Tunnel => ServiceType::TunnellingRequest,
            Self::DeviceManagement => ServiceType::DeviceConfigurationRequest,
        }
    }

    const fn ack_service(self) -> ServiceType {
        match self {
            Self::Tunnel => ServiceType::TunnellingAck,
            Self::DeviceManagement => ServiceType::DeviceConfigurationAck,
        }
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Delivery guarantee requested of [`Session::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Fire the `TUNNELING_REQUEST`/`DEVICE_CONFIGURATION_REQUEST` and return.
    NonBlocking,
    /// Wait for the matching ack (retransmitting once on timeout).
    WaitForAck,
    /// Wait for the ack, then additionally wait for the matching `L_Data.con`.
    WaitForCon,
}

/// Events delivered to a [`SessionListener`] from the session's receiver
/// thread. Listener callbacks are serialized and must not block for long;
/// they never cause the session itself to close.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A cEMI frame was received (and, if applicable, already ack'd).
    FrameReceived(Vec<u8>),
    /// The session was torn down.
    ConnectionClosed {
        initiator: CloseInitiator,
        reason: &'static str,
    },
}

/// Receives [`SessionEvent`]s from a session's receiver thread.
///
/// Implementations are referenced by the session only for its lifetime (no
/// listener registry/lookup is needed here, unlike the routing endpoint's
/// multi-subscriber fan-out), so a plain trait object is sufficient.
pub trait SessionListener: Send {
    fn on_event(&self, event: SessionEvent);
}

impl<F: Fn(SessionEvent) + Send> SessionListener for F {
    fn on_event(&self, event: SessionEvent) {
        self(event);
    }
}

#[derive(Debug, Default)]
struct PendingAck {
    sequence: Option<u8>,
    status: Option<u8>,
}

#[derive(Debug, Default)]
struct PendingCon {
    destination: Option<u16>,
    frame: Option<Vec<u8>>,
}

struct Protocol {
    state: SessionState,
    channel_id: u8,
    send_sequence: u8,
    recv_sequence: u8,
    connect_response: Option<ConnectResponse>,
    heartbeat_response: Option<ConnectionStateResponse>,
    disconnect_response: Option<DisconnectResponse>,
    pending_ack: PendingAck,
    pending_con: PendingCon,
}

impl Protocol {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            channel_id: 0,
            send_sequence: 0,
            recv_sequence: 0,
            connect_response: None,
            heartbeat_response: None,
            disconnect_response: None,
            pending_ack: PendingAck::default(),
            pending_con: PendingCon::default(),
        }
    }
}

/// A point-to-point KNXnet/IP client session (Tunnelling or Device
/// Management) over a blocking [`Transport`].
///
/// Owns the threaded I/O shell this core's concurrency model requires: one
/// receiver thread, a fair send-lock held only across send + wait, and
/// condvar-backed timers for ack/con/heartbeat.
pub struct Session<T: Transport + Clone + 'static> {
    transport: T,
    gateway: IpEndpoint,
    kind: ConnectionKind,
    layer: u8,
    proto: Arc<Mutex<Protocol>>,
    reply_signal: Arc<Signal>,
    ack_signal: Arc<Signal>,
    con_signal: Arc<Signal>,
    send_lock: Arc<Mutex<()>>,
    listener: Arc<Mutex<Option<Box<dyn SessionListener>>>>,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl<T: Transport + Clone + 'static> Session<T> {
    /// Create a new, unconnected session against `gateway`.
    #[must_use]
    pub fn new(transport: T, gateway: IpEndpoint, kind: ConnectionKind) -> Self {
        Self {
            transport,
            gateway,
            kind,
            layer: crate::config::TunnelingLayer::LinkLayer.to_u8(),
            proto: Arc::new(Mutex::new(Protocol::new())),
            reply_signal: Arc::new(Signal::new()),
            ack_signal: Arc::new(Signal::new()),
            con_signal: Arc::new(Signal::new()),
            send_lock: Arc::new(Mutex::new(())),
            listener: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            receiver: None,
            heartbeat: None,
        }
    }

    /// Register the listener that receives [`SessionEvent`]s. Replaces any
    /// previously registered listener.
    pub fn set_listener<L: SessionListener + 'static>(&self, listener: L) {
        *self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(Box::new(listener));
    }

    fn proto(&self) -> std::sync::MutexGuard<'_, Protocol> {
        self.proto.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.proto().state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    #[must_use]
    pub fn channel_id(&self) -> u8 {
        self.proto().channel_id
    }

    fn emit(&self, event: SessionEvent) {
        let guard = self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(listener) = guard.as_ref() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event.clone());
            }));
            if result.is_err() {
                tracing::warn!("session listener panicked while handling an event");
            }
        }
    }

    /// Establish the connection: send `CONNECT_REQUEST` and await
    /// `CONNECT_RESPONSE` for up to 10 seconds.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if already connecting/open, `Rejected` if the
    /// gateway refuses with a non-zero status, or `Timeout{phase: Con}`-like
    /// `Timeout{phase}` if no response arrives in time (reported as
    /// `Timeout{phase: TimeoutPhase::Ack}`, matching the wait the connect
    /// handshake is blocking on).
    pub fn connect(&mut self) -> Result<()> {
        {
            let mut proto = self.proto();
            if proto.state != SessionState::Idle {
                return Err(KnxError::IllegalState);
            }
            proto.state = SessionState::Connecting;
        }

        self.start_receiver();

        let local = Hpai::NAT;
        let request = ConnectRequest::new(local, local, self.kind.cri(self.layer));
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = request.build(&mut buf)?;
        self.transport.clone().send_to(&buf[..len], self.gateway)?;

        let deadline = Deadline::after(CONNECT_TIMEOUT);
        loop {
            let response = self.proto().connect_response.take();
            if let Some(response) = response {
                if !response.is_ok() {
                    self.proto().state = SessionState::Closed;
                    self.stop_receiver();
                    return Err(KnxError::rejected(response.status));
                }
                {
                    let mut proto = self.proto();
                    proto.channel_id = response.channel_id;
                    proto.send_sequence = 0;
                    proto.recv_sequence = 0;
                    proto.state = SessionState::Open;
                }
                self.start_heartbeat();
                return Ok(());
            }
            if self.reply_signal.wait_until(&deadline) == crate::clock::WaitOutcome::TimedOut {
                self.proto().state = SessionState::Closed;
                self.stop_receiver();
                return Err(KnxError::timeout(TimeoutPhase::Ack));
            }
        }
    }

    /// Send a cEMI frame with the requested delivery guarantee.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the session isn't `Open`, or
    /// `Timeout{phase}` if the requested acknowledgement/confirmation does
    /// not arrive in time.
    pub fn send(&mut self, cemi: &[u8], mode: SendMode) -> Result<()> {
        if !self.is_open() {
            return Err(KnxError::IllegalState);
        }
        let _send_guard = self.send_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let wants_con = mode == SendMode::WaitForCon && is_ldata_req(cemi);

        let (channel_id, sequence) = {
            let mut proto = self.proto();
            let sequence = proto.send_sequence;
            proto.send_sequence = proto.send_sequence.wrapping_add(1);
            proto.pending_ack = PendingAck {
                sequence: Some(sequence),
                status: None,
            };
            if wants_con {
                proto.pending_con = PendingCon {
                    destination: destination_of(cemi),
                    frame: None,
                };
            }
            (proto.channel_id, sequence)
        };

        let frame = self.build_request(channel_id, sequence, cemi)?;
        self.transport.clone().send_to(&frame, self.gateway)?;

        if mode == SendMode::NonBlocking {
            return Ok(());
        }

        if !self.wait_for_ack(sequence) {
            // one retransmit with the same sequence, per the ack contract
            self.transport.clone().send_to(&frame, self.gateway)?;
            if !self.wait_for_ack(sequence) {
                return Err(KnxError::timeout(TimeoutPhase::Ack));
            }
        }

        if wants_con {
            let deadline = Deadline::after(CON_TIMEOUT);
            loop {
                if self.proto().pending_con.frame.is_some() {
                    return Ok(());
                }
                if self.con_signal.wait_until(&deadline) == crate::clock::WaitOutcome::TimedOut {
                    return Err(KnxError::timeout(TimeoutPhase::Con));
                }
            }
        }

        Ok(())
    }

    fn build_request(&self, channel_id: u8, sequence: u8, cemi: &[u8]) -> Result<Vec<u8>> {
        let header = ConnectionHeader::new(channel_id, sequence);
        let request = TunnelingRequest::new(header, cemi);
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = request.build_as(self.kind.request_service(), &mut buf)?;
        Ok(buf[..len].to_vec())
    }

    fn wait_for_ack(&self, sequence: u8) -> bool {
        let deadline = Deadline::after(ACK_TIMEOUT);
        loop {
            if self.proto().pending_ack.sequence.is_none() {
                return true;
            }
            if self.ack_signal.wait_until(&deadline) == crate::clock::WaitOutcome::TimedOut {
                let still_pending = self.proto().pending_ack.sequence == Some(sequence);
                return !still_pending;
            }
        }
    }

    /// Tear down the connection: send `DISCONNECT_REQUEST`, wait up to 10 s
    /// for a response, and close regardless of the outcome.
    pub fn disconnect(&mut self) {
        if self.state() == SessionState::Closed {
            return;
        }
        self.proto().state = SessionState::Closing;

        let channel_id = self.channel_id();
        let request = DisconnectRequest::new(channel_id, Hpai::NAT);
        let mut buf = [0u8; MAX_FRAME_SIZE];
        if let Ok(len) = request.build(&mut buf) {
            let _ = self.transport.clone().send_to(&buf[..len], self.gateway);
        }

        let deadline = Deadline::after(DISCONNECT_TIMEOUT);
        while self.proto().disconnect_response.is_none() {
            if self.reply_signal.wait_until(&deadline) == crate::clock::WaitOutcome::TimedOut {
                break;
            }
        }

        self.close(CloseInitiator::Local, "disconnect requested");
    }

    fn close(&mut self, initiator: CloseInitiator, reason: &'static str) {
        let already_closed = {
            let mut proto = self.proto();
            let was_closed = proto.state == SessionState::Closed;
            proto.state = SessionState::Closed;
            was_closed
        };
        self.stop_heartbeat();
        self.stop_receiver();
        if !already_closed {
            self.emit(SessionEvent::ConnectionClosed { initiator, reason });
        }
    }

    fn start_receiver(&mut self) {
        self.running.store(true, Ordering::SeqCst);
        let mut transport = self.transport.clone();
        let proto = Arc::clone(&self.proto);
        let reply_signal = Arc::clone(&self.reply_signal);
        let ack_signal = Arc::clone(&self.ack_signal);
        let con_signal = Arc::clone(&self.con_signal);
        let running = Arc::clone(&self.running);
        let kind = self.kind;
        let listener = Arc::clone(&self.listener);
        let gateway = self.gateway;

        self.receiver = Some(thread::spawn(move || {
            let mut buf = [0u8; MAX_FRAME_SIZE];
            while running.load(Ordering::SeqCst) {
                let (n, _from) = match transport.recv_from(&mut buf) {
                    Ok(v) => v,
                    Err(_) => break,
                };
                let Ok(frame) = KnxnetIpFrame::parse(&buf[..n]) else {
                    tracing::debug!("dropping unparsable KNXnet/IP datagram");
                    continue;
                };
                handle_inbound(
                    frame.service_type(),
                    frame.body(),
                    kind,
                    &proto,
                    &reply_signal,
                    &ack_signal,
                    &con_signal,
                    &listener,
                    &mut transport,
                    gateway,
                );
            }
        }));
    }

    fn stop_receiver(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.transport.close();
        if let Some(handle) = self.receiver.take() {
            let _ = handle.join();
        }
    }

    fn start_heartbeat(&mut self) {
        let proto = Arc::clone(&self.proto);
        let reply_signal = Arc::clone(&self.reply_signal);
        let running = Arc::clone(&self.running);
        let mut transport = self.transport.clone();
        let gateway = self.gateway;

        self.heartbeat = Some(thread::spawn(move || loop {
            let deadline = Deadline::after(HEARTBEAT_INTERVAL);
            while deadline.remaining() > Duration::ZERO {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                thread::sleep(deadline.remaining().min(Duration::from_millis(200)));
            }
            if !running.load(Ordering::SeqCst) {
                return;
            }

            let channel_id = proto.lock().unwrap_or_else(std::sync::PoisonError::into_inner).channel_id;
            let mut succeeded = false;
            for _ in 0..HEARTBEAT_MAX_ATTEMPTS {
                {
                    let mut p = proto.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    p.heartbeat_response = None;
                }
                let request = ConnectionStateRequest::new(channel_id, Hpai::NAT);
                let mut buf = [0u8; 32];
                let Ok(len) = request.build(&mut buf) else { break };
                if transport.send_to(&buf[..len], gateway).is_err() {
                    break;
                }
                let attempt_deadline = Deadline::after(HEARTBEAT_TIMEOUT);
                loop {
                    let response = proto
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .heartbeat_response
                        .take();
                    if let Some(response) = response {
                        if response.is_ok() {
                            succeeded = true;
                        }
                        break;
                    }
                    if reply_signal.wait_until(&attempt_deadline)
                        == crate::clock::WaitOutcome::TimedOut
                    {
                        break;
                    }
                }
                if succeeded {
                    break;
                }
            }

            if !succeeded {
                let mut p = proto.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if p.state == SessionState::Open {
                    p.state = SessionState::Closed;
                }
                return;
            }
        }));
    }

    fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            let _ = handle.join();
        }
    }
}

impl<T: Transport + Clone + 'static> Drop for Session<T> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.transport.close();
    }
}

/// Best-effort destination extraction from a cEMI `L_Data.req`, used to
/// match an eventual `L_Data.con` for [`SendMode::WaitForCon`].
fn destination_of(cemi: &[u8]) -> Option<u16> {
    let ldata = crate::protocol::cemi::CEMIFrame::parse(cemi).ok()?.as_ldata().ok()?;
    Some(ldata.destination_raw)
}

/// Whether `cemi` is an `L_Data.req`: the only message code `WaitForCon`
/// actually gets a confirmation for. Device-Management requests share
/// [`Session`] with Tunnelling but never produce an `L_Data.con`, so a
/// `WaitForCon` send of one must not wait for one.
fn is_ldata_req(cemi: &[u8]) -> bool {
    cemi.first().copied() == Some(CEMIMessageCode::LDataReq.to_u8())
}

#[allow(clippy::too_many_arguments)]
fn handle_inbound<T: Transport>(
    service_type: Option<ServiceType>,
    body: &[u8],
    kind: ConnectionKind,
    proto: &Arc<Mutex<Protocol>>,
    reply_signal: &Signal,
    ack_signal: &Signal,
    con_signal: &Signal,
    listener: &Arc<Mutex<Option<Box<dyn SessionListener>>>>,
    transport: &mut T,
    gateway: IpEndpoint,
) {
    let Some(service_type) = service_type else {
        tracing::debug!("dropping KNXnet/IP datagram with unrecognized service type");
        return;
    };

    match service_type {
        ServiceType::ConnectResponse => {
            if let Ok(response) = ConnectResponse::parse(body) {
                proto.lock().unwrap_or_else(std::sync::PoisonError::into_inner).connect_response =
                    Some(response);
                reply_signal.notify();
            }
        }
        ServiceType::ConnectionstateResponse => {
            if let Ok(response) = ConnectionStateResponse::parse(body) {
                proto
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .heartbeat_response = Some(response);
                reply_signal.notify();
            }
        }
        ServiceType::DisconnectResponse => {
            if let Ok(response) = DisconnectResponse::parse(body) {
                proto
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .disconnect_response = Some(response);
                reply_signal.notify();
            }
        }
        st if st == kind.ack_service() => {
            if let Ok(ack) = TunnelingAck::parse(body) {
                let mut p = proto.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if p.pending_ack.sequence == Some(ack.connection_header.sequence_counter) {
                    p.pending_ack.sequence = None;
                    p.pending_ack.status = Some(ack.status);
                    drop(p);
                    ack_signal.notify();
                }
            }
        }
        st if st == kind.request_service() => {
            let Ok(request) = TunnelingRequest::parse(body) else {
                return;
            };
            let incoming_seq = request.connection_header.sequence_counter;
            let (expected, channel_id) = {
                let p = proto.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                (p.recv_sequence, p.channel_id)
            };

            if incoming_seq == expected {
                {
                    let mut p = proto.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    p.recv_sequence = p.recv_sequence.wrapping_add(1);
                }
                send_ack(transport, gateway, kind, channel_id, incoming_seq, 0);
                deliver(
                    request.cemi_data,
                    proto,
                    con_signal,
                    listener,
                );
            } else if incoming_seq == expected.wrapping_sub(1) {
                send_ack(transport, gateway, kind, channel_id, incoming_seq, 0);
            } else {
                tracing::debug!(
                    expected,
                    got = incoming_seq,
                    "dropping tunnelling request with out-of-window sequence"
                );
            }
        }
        _ => {
            tracing::debug!(?service_type, "ignoring unexpected service type for this session");
        }
    }
}

fn send_ack<T: Transport>(
    transport: &mut T,
    gateway: IpEndpoint,
    kind: ConnectionKind,
    channel_id: u8,
    sequence: u8,
    status: u8,
) {
    let ack = TunnelingAck::new(ConnectionHeader::new(channel_id, sequence), status);
    let mut buf = [0u8; 16];
    if let Ok(len) = ack.build_as(kind.ack_service(), &mut buf) {
        let _ = transport.send_to(&buf[..len], gateway);
    }
}

fn deliver(
    cemi: &[u8],
    proto: &Arc<Mutex<Protocol>>,
    con_signal: &Signal,
    listener: &Arc<Mutex<Option<Box<dyn SessionListener>>>>,
) {
    let is_con = cemi
        .first()
        .and_then(|b| CEMIMessageCode::from_u8(*b))
        .is_some_and(|code| {
            matches!(
                code,
                CEMIMessageCode::LDataCon | CEMIMessageCode::LRawCon | CEMIMessageCode::LPollDataCon
            )
        });

    if is_con {
        let destination = destination_of(cemi);
        let mut p = proto.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if p.pending_con.destination.is_none() || p.pending_con.destination == destination {
            p.pending_con.frame = Some(cemi.to_vec());
            drop(p);
            con_signal.notify();
            return;
        }
    }

    let guard = listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(listener) = guard.as_ref() {
        let event = SessionEvent::FrameReceived(cemi.to_vec());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            listener.on_event(event);
        }));
        if result.is_err() {
            tracing::warn!("session listener panicked while handling a frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::mock_transport::MockTransport;
    use std::sync::mpsc;
    use std::time::Duration;

    fn connect_response_bytes(channel_id: u8, status: u8) -> Vec<u8> {
        let response = ConnectResponse {
            channel_id,
            status,
            data_endpoint: Hpai::new([192, 168, 1, 10], 3671),
            crd: ConnectionResponseData::Tunnel {
                individual_address: crate::addressing::IndividualAddress::new(1, 1, 2).unwrap(),
            },
        };
        let mut body = Vec::new();
        body.push(response.channel_id);
        body.push(response.status);
        let mut hpai_buf = [0u8; 8];
        response.data_endpoint.encode(&mut hpai_buf).unwrap();
        body.extend_from_slice(&hpai_buf);
        let mut crd_buf = [0u8; 4];
        let n = response.crd.encode(&mut crd_buf).unwrap();
        body.extend_from_slice(&crd_buf[..n]);
        crate::protocol::frame::FrameBuilder::new(ServiceType::ConnectResponse, &body).build_vec()
    }

    #[test]
    fn connect_succeeds_on_ok_response() {
        let transport = MockTransport::new();
        transport.add_response(connect_response_bytes(5, 0));
        let gateway = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
        let mut session = Session::new(transport, gateway, ConnectionKind::Tunnel);

        session.connect().unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.channel_id(), 5);
    }

    #[test]
    fn connect_fails_on_rejected_status() {
        let transport = MockTransport::new();
        transport.add_response(connect_response_bytes(0, 0x24));
        let gateway = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
        let mut session = Session::new(transport, gateway, ConnectionKind::Tunnel);

        let err = session.connect().unwrap_err();
        assert!(matches!(err, KnxError::Rejected { status: 0x24 }));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn connect_times_out_with_no_response() {
        let transport = MockTransport::new();
        let gateway = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
        let mut session = Session::new(transport, gateway, ConnectionKind::Tunnel);

        // MockTransport errors immediately instead of blocking, which the
        // receiver thread treats as a closed port; the connect wait still
        // has to observe its own 10s deadline rather than hang.
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            tx.send(session.connect()).unwrap();
        });
        let result = rx.recv_timeout(Duration::from_millis(500));
        assert!(result.is_err(), "connect should still be waiting on its deadline");
    }

    #[test]
    fn send_requires_open_session() {
        let transport = MockTransport::new();
        let gateway = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
        let mut session = Session::new(transport, gateway, ConnectionKind::Tunnel);
        let err = session.send(&[0x11, 0x00], SendMode::NonBlocking).unwrap_err();
        assert!(matches!(err, KnxError::IllegalState));
    }

    fn ldata_cemi(message_code: CEMIMessageCode) -> [u8; 11] {
        [
            message_code.to_u8(),
            0x00, // additional info length
            0xBC, // ctrl1
            0xE0, // ctrl2 (group address)
            0x11, 0xFA, // source address
            0x0A, 0x03, // destination address (group 1/2/3)
            0x01, // NPDU length
            0x00, 0x80, // TPCI/APCI: GroupValueWrite
        ]
    }

    fn tunneling_request_bytes(
        service_type: ServiceType,
        channel_id: u8,
        sequence: u8,
        cemi: &[u8],
    ) -> Vec<u8> {
        let request = TunnelingRequest::new(ConnectionHeader::new(channel_id, sequence), cemi);
        let mut buf = vec![0u8; 32 + cemi.len()];
        let n = request.build_as(service_type, &mut buf).unwrap();
        buf.truncate(n);
        buf
    }

    fn tunneling_ack_bytes(service_type: ServiceType, channel_id: u8, sequence: u8, status: u8) -> Vec<u8> {
        let ack = TunnelingAck::new(ConnectionHeader::new(channel_id, sequence), status);
        let mut buf = [0u8; 16];
        let n = ack.build_as(service_type, &mut buf).unwrap();
        buf[..n].to_vec()
    }

    /// Deliver a raw inbound frame straight to `handle_inbound`, bypassing
    /// the receiver thread (which `MockTransport` can only feed once, up
    /// front, before its response queue runs dry). The arguments mirror
    /// what `start_receiver` hands its own thread.
    #[allow(clippy::too_many_arguments)]
    fn deliver_frame<T: Transport>(
        frame: &[u8],
        kind: ConnectionKind,
        proto: &Arc<Mutex<Protocol>>,
        reply_signal: &Signal,
        ack_signal: &Signal,
        con_signal: &Signal,
        listener: &Arc<Mutex<Option<Box<dyn SessionListener>>>>,
        transport: &mut T,
        gateway: IpEndpoint,
    ) {
        let parsed = KnxnetIpFrame::parse(frame).unwrap();
        handle_inbound(
            Some(parsed.service_type()),
            parsed.body(),
            kind,
            proto,
            reply_signal,
            ack_signal,
            con_signal,
            listener,
            transport,
            gateway,
        );
    }

    #[test]
    fn send_wait_for_con_waits_for_matching_ldata_con() {
        let transport = MockTransport::new();
        transport.add_response(connect_response_bytes(5, 0));
        let gateway = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
        let mut session = Session::new(transport.clone(), gateway, ConnectionKind::Tunnel);
        session.connect().unwrap();

        let kind = session.kind;
        let proto = Arc::clone(&session.proto);
        let reply_signal = Arc::clone(&session.reply_signal);
        let ack_signal = Arc::clone(&session.ack_signal);
        let con_signal = Arc::clone(&session.con_signal);
        let listener = Arc::clone(&session.listener);
        let mut inbound_transport = transport.clone();

        let sent_before = transport.sent_packets().len();
        let (tx, rx) = mpsc::channel();
        let request_cemi = ldata_cemi(CEMIMessageCode::LDataReq);
        thread::spawn(move || {
            tx.send(session.send(&request_cemi, SendMode::WaitForCon)).unwrap();
        });

        while transport.sent_packets().len() == sent_before {
            thread::sleep(Duration::from_millis(5));
        }

        deliver_frame(
            &tunneling_ack_bytes(ServiceType::TunnellingAck, 5, 0, 0),
            kind,
            &proto,
            &reply_signal,
            &ack_signal,
            &con_signal,
            &listener,
            &mut inbound_transport,
            gateway,
        );
        deliver_frame(
            &tunneling_request_bytes(
                ServiceType::TunnellingRequest,
                5,
                0,
                &ldata_cemi(CEMIMessageCode::LDataCon),
            ),
            kind,
            &proto,
            &reply_signal,
            &ack_signal,
            &con_signal,
            &listener,
            &mut inbound_transport,
            gateway,
        );

        let result = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn send_wait_for_con_does_not_wait_for_non_ldata_req() {
        let transport = MockTransport::new();
        transport.add_response(connect_response_bytes(5, 0));
        let gateway = IpEndpoint::new([192, 168, 1, 10].into(), 3671);
        let mut session = Session::new(transport.clone(), gateway, ConnectionKind::DeviceManagement);
        session.connect().unwrap();

        let kind = session.kind;
        let proto = Arc::clone(&session.proto);
        let reply_signal = Arc::clone(&session.reply_signal);
        let ack_signal = Arc::clone(&session.ack_signal);
        let con_signal = Arc::clone(&session.con_signal);
        let listener = Arc::clone(&session.listener);
        let mut inbound_transport = transport.clone();

        // Device-Management writes never produce an L_Data.con; only the
        // ack arrives. If the gate were missing, this send would instead
        // block for the full CON_TIMEOUT waiting for a confirmation that
        // never comes.
        let sent_before = transport.sent_packets().len();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            tx.send(session.send(&[0x10, 0x00], SendMode::WaitForCon)).unwrap();
        });

        while transport.sent_packets().len() == sent_before {
            thread::sleep(Duration::from_millis(5));
        }

        deliver_frame(
            &tunneling_ack_bytes(ServiceType::DeviceConfigurationAck, 5, 0, 0),
            kind,
            &proto,
            &reply_signal,
            &ack_signal,
            &con_signal,
            &listener,
            &mut inbound_transport,
            gateway,
        );

        let result = rx.recv_timeout(Duration::from_millis(500)).unwrap();
        assert!(result.is_ok());
    }
}
