//! Direct connection to a TP1 bus through a TP-UART controller.
//!
//! Unlike FT1.2, the wire here is two distinct byte vocabularies sharing one
//! serial port: single **control bytes** the host sends to the controller
//! (`Reset`, `State`, `ActivateBusmon`, `AckInfo`, and the `LData-byte`/
//! `LData-end` framing used to push a TP1 telegram out one byte at a time),
//! and the **raw TP1 bytes** the controller forwards transparently on
//! receive. The receive engine below classifies by leading byte the way the
//! controller's own datasheet state machine does.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serialport::SerialPort;

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::clock::{Deadline, Signal, WaitOutcome};
use crate::error::{CloseInitiator, KnxError, Result, TimeoutPhase};

/// `t_bit` at the standard TP1 UART rate of 9600 Bd, in nanoseconds.
pub const T_BIT_NANOS_AT_9600: u32 = 104_167;

const CTRL_RESET: u8 = 0x01;
const CTRL_STATE_REQ: u8 = 0x02;
const CTRL_ACTIVATE_BUSMON: u8 = 0x05;
const CTRL_ACK_INFO_BASE: u8 = 0x10;
const ACK_POSITIVE: u8 = 0x01;
const LDATA_BYTE_BASE: u8 = 0x80;
const LDATA_END_BASE: u8 = 0x40;

const LDATA_CON_POSITIVE: u8 = 0x8B;
const LDATA_CON_NEGATIVE: u8 = 0x0B;
const STATE_IND_MASK: u8 = 0x07;
const STATE_IND_TAG: u8 = 0x07;

const MAX_TP1_FRAME: usize = 64;
const MAX_CONFIRM_ATTEMPTS: u32 = 4;
const MAX_INTER_BYTE_DELAY_FLOOR_US: u32 = 50 * T_BIT_NANOS_AT_9600 / 1000;
const MAX_INTER_BYTE_DELAY_CEIL_US: u32 = 20_000;
const ADAPTIVE_STEP_US: u32 = 500;
const STATE_POLL_INTERVAL: Duration = Duration::from_secs(5);
const STATE_DISCONNECT_AFTER: Duration = Duration::from_millis(2 * 5_000 + 100);
const TEMPERATURE_COOLDOWN: Duration = Duration::from_secs(1);
const ACK_DESTINATION_WINDOW: Duration = Duration::from_secs(3);

/// Bits reported in a `State.ind` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusState {
    pub slave_collision: bool,
    pub receive_error: bool,
    pub transmit_error: bool,
    pub protocol_error: bool,
    pub temperature_warning: bool,
}

impl BusState {
    const fn from_byte(byte: u8) -> Self {
        Self {
            slave_collision: byte & 0x80 != 0,
            receive_error: byte & 0x40 != 0,
            transmit_error: byte & 0x20 != 0,
            protocol_error: byte & 0x10 != 0,
            temperature_warning: byte & 0x08 != 0,
        }
    }
}

/// Events delivered to a [`TpUartListener`].
#[derive(Debug, Clone)]
pub enum TpUartEvent {
    /// An `L_Data.ind` (normal mode) carrying the raw TP1 frame bytes.
    FrameReceived(Vec<u8>),
    /// A busmon indication: raw TP1 bytes plus the sequence/timestamp tag.
    BusMonitor {
        frame: Vec<u8>,
        sequence: u8,
        timestamp_us: u32,
    },
    /// The controller reported a state change via `State.ind`.
    StateChanged(BusState),
    /// The link was torn down.
    ConnectionClosed {
        initiator: CloseInitiator,
        reason: &'static str,
    },
}

/// Receives [`TpUartEvent`]s from a link's receiver/poller threads.
pub trait TpUartListener: Send {
    fn on_event(&self, event: TpUartEvent);
}

impl<F: Fn(TpUartEvent) + Send> TpUartListener for F {
    fn on_event(&self, event: TpUartEvent) {
        self(event);
    }
}

/// TP1 checksum: bitwise NOT of the XOR of all preceding bytes.
fn tp1_checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Build a TP1 frame from a raw cEMI L-Data payload (additional info and
/// message code already stripped by the caller).
fn build_tp1_frame(control: u8, source: u16, destination: u16, apdu: &[u8], extended: bool) -> Result<Vec<u8>> {
    let mut frame = Vec::with_capacity(apdu.len() + 8);
    frame.push(control);
    if extended {
        frame.push(0); // extended control field, no destination-address-type bits modeled
    }
    frame.push((source >> 8) as u8);
    frame.push((source & 0xFF) as u8);
    frame.push((destination >> 8) as u8);
    frame.push((destination & 0xFF) as u8);
    if extended {
        frame.push(apdu.len() as u8);
    } else {
        if apdu.len() > 15 {
            return Err(KnxError::malformed("standard TP1 frame APDU exceeds 15 bytes"));
        }
        frame.push(((apdu.len() as u8) & 0x0F) | 0xF0);
    }
    frame.extend_from_slice(apdu);
    if frame.len() >= MAX_TP1_FRAME {
        return Err(KnxError::malformed("TP1 frame exceeds 64 bytes"));
    }
    let checksum = tp1_checksum(&frame);
    frame.push(checksum);
    Ok(frame)
}

/// Wait window for one confirmation attempt: `50*t_bit + length*13*t_bit +
/// 2*15*t_bit`, `t_bit = 1/9600 s`.
fn confirm_timeout(length: usize) -> Duration {
    let bits = 50 + length as u64 * 13 + 2 * 15;
    Duration::from_nanos(bits * u64::from(T_BIT_NANOS_AT_9600))
}

struct PendingCon {
    request: Option<Vec<u8>>,
    sent_at: Option<Instant>,
}

/// A direct connection to a TP1 bus through a TP-UART controller.
pub struct TpUartLink {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    own_address: IndividualAddress,
    ack_addresses: Arc<Mutex<HashSet<GroupAddress>>>,
    recent_sends: Arc<Mutex<Vec<(u16, Instant)>>>,
    pending_con: Arc<Mutex<PendingCon>>,
    con_signal: Arc<Signal>,
    busmon: Arc<AtomicBool>,
    sequence: Arc<AtomicU8>,
    listener: Arc<Mutex<Option<Box<dyn TpUartListener>>>>,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
    send_lock: Arc<Mutex<()>>,
}

/// Shared process-wide adaptive inter-byte delay ceiling, in microseconds.
/// Persists across reconnects, as required by §4.6: several links on the
/// same host converge on one learned value rather than re-probing it.
static MAX_INTER_BYTE_DELAY_US: AtomicU32 = AtomicU32::new(MAX_INTER_BYTE_DELAY_FLOOR_US);
static CONSECUTIVE_DROPS: AtomicU32 = AtomicU32::new(0);

fn note_drop() {
    let drops = CONSECUTIVE_DROPS.fetch_add(1, Ordering::SeqCst) + 1;
    if drops % 3 == 0 {
        MAX_INTER_BYTE_DELAY_US
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                Some((cur + ADAPTIVE_STEP_US).min(MAX_INTER_BYTE_DELAY_CEIL_US))
            })
            .ok();
    }
}

fn note_clean_frame() {
    CONSECUTIVE_DROPS.store(0, Ordering::SeqCst);
}

impl TpUartLink {
    /// Open `port_id` at `baud_rate` (8-E-1) and start the receiver and
    /// state-polling threads.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the port can't be opened.
    pub fn open(port_id: &str, baud_rate: u32, own_address: IndividualAddress) -> Result<Self> {
        let port = serialport::new(port_id, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::Even)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_millis(50))
            .open()?;

        let mut link = Self {
            port: Arc::new(Mutex::new(port)),
            own_address,
            ack_addresses: Arc::new(Mutex::new(HashSet::new())),
            recent_sends: Arc::new(Mutex::new(Vec::new())),
            pending_con: Arc::new(Mutex::new(PendingCon {
                request: None,
                sent_at: None,
            })),
            con_signal: Arc::new(Signal::new()),
            busmon: Arc::new(AtomicBool::new(false)),
            sequence: Arc::new(AtomicU8::new(0)),
            listener: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            receiver: None,
            poller: None,
            send_lock: Arc::new(Mutex::new(())),
        };

        link.write_control(CTRL_RESET)?;
        link.start_receiver();
        link.start_poller();
        Ok(link)
    }

    /// Register the listener receiving [`TpUartEvent`]s.
    pub fn set_listener<L: TpUartListener + 'static>(&self, listener: L) {
        *self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(Box::new(listener));
    }

    /// Addresses this host should positively acknowledge beyond its own
    /// individual address.
    pub fn set_ack_addresses(&self, addresses: impl IntoIterator<Item = GroupAddress>) {
        *self.ack_addresses.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            addresses.into_iter().collect();
    }

    /// Switch to passive bus-monitor mode. Sends are rejected with
    /// `IllegalState` once active.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the control byte can't be written.
    pub fn activate_busmon(&self) -> Result<()> {
        self.write_control(CTRL_ACTIVATE_BUSMON)?;
        self.busmon.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn write_control(&self, byte: u8) -> Result<()> {
        self.port
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .write_all(&[byte])?;
        Ok(())
    }

    /// Send a cEMI L-Data payload (`control`, `source`, `destination`,
    /// `apdu`) onto the bus, splitting it into `LData-byte`/`LData-end`
    /// control sequences and waiting up to 4 attempts for a confirmation.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` while busmon is active, or `Timeout{phase:
    /// Con}` if no confirmation arrives after 4 attempts.
    pub fn send(&mut self, control: u8, source: u16, destination: u16, apdu: &[u8], extended: bool) -> Result<()> {
        if self.busmon.load(Ordering::SeqCst) {
            return Err(KnxError::IllegalState);
        }
        let _guard = self.send_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let frame = build_tp1_frame(control, source, destination, apdu, extended)?;
        {
            let mut recent = self.recent_sends.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            recent.push((destination, Instant::now()));
            recent.retain(|(_, at)| at.elapsed() < ACK_DESTINATION_WINDOW);
        }

        for _ in 0..MAX_CONFIRM_ATTEMPTS {
            {
                let mut pending = self.pending_con.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                pending.request = Some(frame.clone());
                pending.sent_at = Some(Instant::now());
            }
            self.write_tp1_frame(&frame)?;

            let deadline = Deadline::after(confirm_timeout(frame.len()));
            loop {
                let got_con = self
                    .pending_con
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .request
                    .is_none();
                if got_con {
                    return Ok(());
                }
                if self.con_signal.wait_until(&deadline) == WaitOutcome::TimedOut {
                    break;
                }
            }
        }
        self.pending_con.lock().unwrap_or_else(std::sync::PoisonError::into_inner).request = None;
        Err(KnxError::timeout(TimeoutPhase::Con))
    }

    fn write_tp1_frame(&self, frame: &[u8]) -> Result<()> {
        let mut port = self.port.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (i, &byte) in frame.iter().enumerate() {
            let control = if i == frame.len() - 1 {
                LDATA_END_BASE | (frame.len() as u8 - 1)
            } else {
                LDATA_BYTE_BASE | i as u8
            };
            port.write_all(&[control, byte])?;
        }
        Ok(())
    }

    fn start_receiver(&mut self) {
        self.running.store(true, Ordering::SeqCst);
        let port = Arc::clone(&self.port);
        let own_address = self.own_address;
        let ack_addresses = Arc::clone(&self.ack_addresses);
        let recent_sends = Arc::clone(&self.recent_sends);
        let pending_con = Arc::clone(&self.pending_con);
        let con_signal = Arc::clone(&self.con_signal);
        let busmon = Arc::clone(&self.busmon);
        let sequence = Arc::clone(&self.sequence);
        let listener = Arc::clone(&self.listener);
        let running = Arc::clone(&self.running);

        self.receiver = Some(thread::spawn(move || {
            run_receive_loop(
                &port,
                own_address,
                &ack_addresses,
                &recent_sends,
                &pending_con,
                &con_signal,
                &busmon,
                &sequence,
                &listener,
                &running,
            );
        }));
    }

    fn start_poller(&mut self) {
        let port = Arc::clone(&self.port);
        let busmon = Arc::clone(&self.busmon);
        let listener = Arc::clone(&self.listener);
        let running = Arc::clone(&self.running);

        self.poller = Some(thread::spawn(move || {
            let mut missed = Duration::ZERO;
            while running.load(Ordering::SeqCst) {
                thread::sleep(STATE_POLL_INTERVAL);
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if busmon.load(Ordering::SeqCst) {
                    continue;
                }
                let sent = port
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .write_all(&[CTRL_STATE_REQ])
                    .is_ok();
                if sent {
                    missed = Duration::ZERO;
                } else {
                    missed += STATE_POLL_INTERVAL;
                    if missed >= STATE_DISCONNECT_AFTER {
                        let guard = listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                        if let Some(listener) = guard.as_ref() {
                            listener.on_event(TpUartEvent::ConnectionClosed {
                                initiator: CloseInitiator::Local,
                                reason: "no response to State.req within 2 polling intervals",
                            });
                        }
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        }));
    }

    fn stop_threads(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.receiver.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.poller.take() {
            let _ = handle.join();
        }
    }

    /// Close the link, releasing the receiver and poller threads.
    pub fn close(&mut self, initiator: CloseInitiator, reason: &'static str) {
        self.stop_threads();
        let guard = self.listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(listener) = guard.as_ref() {
            listener.on_event(TpUartEvent::ConnectionClosed { initiator, reason });
        }
    }
}

impl Drop for TpUartLink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FrameAccumulator {
    buffer: Vec<u8>,
    extended: bool,
    last_byte_at: Option<Instant>,
}

impl FrameAccumulator {
    fn min_header_len(&self) -> usize {
        if self.extended {
            6
        } else {
            5
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.last_byte_at = None;
    }
}

#[allow(clippy::too_many_arguments)]
fn run_receive_loop(
    port: &Arc<Mutex<Box<dyn SerialPort>>>,
    own_address: IndividualAddress,
    ack_addresses: &Arc<Mutex<HashSet<GroupAddress>>>,
    recent_sends: &Arc<Mutex<Vec<(u16, Instant)>>>,
    pending_con: &Arc<Mutex<PendingCon>>,
    con_signal: &Signal,
    busmon: &Arc<AtomicBool>,
    sequence: &Arc<AtomicU8>,
    listener: &Arc<Mutex<Option<Box<dyn TpUartListener>>>>,
    running: &Arc<AtomicBool>,
) {
    let mut accum = FrameAccumulator::default();
    let mut last_accepted: Option<Vec<u8>> = None;
    let mut byte = [0u8; 1];

    while running.load(Ordering::SeqCst) {
        let read = {
            let mut p = port.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            p.read(&mut byte)
        };
        let c = match read {
            Ok(0) => continue,
            Ok(_) => byte[0],
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                check_inter_byte_gap(&mut accum);
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "TP-UART serial read failed");
                break;
            }
        };

        if c == LDATA_CON_POSITIVE || c == LDATA_CON_NEGATIVE {
            deliver_confirmation(c == LDATA_CON_POSITIVE, pending_con, con_signal);
            continue;
        }
        if c & STATE_IND_MASK == STATE_IND_TAG {
            let state = BusState::from_byte(c);
            let guard = listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(listener) = guard.as_ref() {
                listener.on_event(TpUartEvent::StateChanged(state));
            }
            continue;
        }

        if accum.buffer.is_empty() {
            let extended = c & 0xD0 == 0x10;
            let standard = c & 0xD0 == 0xD0;
            if c & 0x03 != 0 || !(extended || standard) {
                continue; // not a frame-start byte; ignore
            }
            accum.extended = extended;
        }
        accum.buffer.push(c);
        accum.last_byte_at = Some(Instant::now());
        check_inter_byte_gap(&mut accum);

        let expected_len = expected_frame_len(&accum);
        if let Some(expected_len) = expected_len {
            if accum.buffer.len() >= expected_len {
                handle_complete_frame(
                    &accum.buffer,
                    own_address,
                    ack_addresses,
                    recent_sends,
                    busmon,
                    sequence,
                    listener,
                    port,
                    &mut last_accepted,
                );
                accum.reset();
            }
        }
    }
}

fn check_inter_byte_gap(accum: &mut FrameAccumulator) {
    let Some(last) = accum.last_byte_at else { return };
    let max_delay = Duration::from_micros(u64::from(MAX_INTER_BYTE_DELAY_US.load(Ordering::SeqCst)));
    let elapsed = last.elapsed();
    let short_buffer = accum.buffer.len() < accum.min_header_len();
    if (short_buffer && elapsed > max_delay) || elapsed > max_delay * 4 {
        if !accum.buffer.is_empty() {
            note_drop();
        }
        accum.reset();
    }
}

/// `None` until enough bytes have arrived to know the APDU length field.
fn expected_frame_len(accum: &FrameAccumulator) -> Option<usize> {
    let len_index = if accum.extended { 5 } else { 4 };
    if accum.buffer.len() <= len_index {
        return None;
    }
    let apdu_len = if accum.extended {
        accum.buffer[len_index] as usize
    } else {
        (accum.buffer[len_index] & 0x0F) as usize
    };
    Some(len_index + 1 + apdu_len + 1)
}

#[allow(clippy::too_many_arguments)]
fn handle_complete_frame(
    frame: &[u8],
    own_address: IndividualAddress,
    ack_addresses: &Arc<Mutex<HashSet<GroupAddress>>>,
    recent_sends: &Arc<Mutex<Vec<(u16, Instant)>>>,
    busmon: &Arc<AtomicBool>,
    sequence: &Arc<AtomicU8>,
    listener: &Arc<Mutex<Option<Box<dyn TpUartListener>>>>,
    port: &Arc<Mutex<Box<dyn SerialPort>>>,
    last_accepted: &mut Option<Vec<u8>>,
) {
    let destination = destination_of(frame);

    if should_ack(destination, own_address, ack_addresses, recent_sends) {
        let _ = port
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .write_all(&[CTRL_ACK_INFO_BASE | ACK_POSITIVE]);
    }

    let checksum_ok = frame.last().copied() == Some(tp1_checksum(&frame[..frame.len() - 1]));
    if !checksum_ok {
        note_drop();
        return;
    }
    note_clean_frame();

    if is_repeat(frame, last_accepted.as_deref()) {
        return;
    }
    *last_accepted = Some(frame.to_vec());

    let guard = listener.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let Some(listener) = guard.as_ref() else { return };

    if busmon.load(Ordering::SeqCst) {
        let seq = sequence.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| Some((s + 1) % 8)).unwrap_or(0);
        #[allow(clippy::cast_possible_truncation)]
        let timestamp_us = Instant::now().elapsed().as_micros() as u32;
        listener.on_event(TpUartEvent::BusMonitor {
            frame: frame.to_vec(),
            sequence: seq,
            timestamp_us,
        });
    } else {
        listener.on_event(TpUartEvent::FrameReceived(frame.to_vec()));
    }
}

fn destination_of(frame: &[u8]) -> u16 {
    let extended = frame.first().is_some_and(|&c| c & 0xD0 == 0x10);
    let offset = if extended { 1 } else { 0 };
    let hi = frame.get(3 + offset).copied().unwrap_or(0);
    let lo = frame.get(4 + offset).copied().unwrap_or(0);
    (u16::from(hi) << 8) | u16::from(lo)
}

fn should_ack(
    destination: u16,
    own_address: IndividualAddress,
    ack_addresses: &Arc<Mutex<HashSet<GroupAddress>>>,
    recent_sends: &Arc<Mutex<Vec<(u16, Instant)>>>,
) -> bool {
    if destination == u16::from(own_address) {
        return true;
    }
    let group = GroupAddress::from(destination);
    if ack_addresses
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .contains(&group)
    {
        return true;
    }
    let mut recent = recent_sends.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    recent.retain(|(_, at)| at.elapsed() < ACK_DESTINATION_WINDOW);
    recent.iter().any(|(dest, _)| *dest == destination)
}

/// Byte-exact repetition of the prior accepted frame, ignoring the
/// repeat-flag bit carried in the control byte.
fn is_repeat(frame: &[u8], last: Option<&[u8]>) -> bool {
    let Some(last) = last else { return false };
    if frame.len() != last.len() {
        return false;
    }
    frame[0] & 0xEF == last[0] & 0xEF && frame[1..] == last[1..]
}

fn deliver_confirmation(positive: bool, pending_con: &Arc<Mutex<PendingCon>>, con_signal: &Signal) {
    let mut pending = pending_con.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if pending.request.take().is_some() {
        tracing::debug!(positive, "TP-UART confirmation received");
    }
    drop(pending);
    con_signal.notify();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_bitwise_not_of_xor() {
        let bytes = [0xBCu8, 0x11, 0x00, 0x00, 0x29, 0x01];
        let checksum = tp1_checksum(&bytes);
        assert_eq!(checksum, !bytes.iter().fold(0u8, |a, &b| a ^ b));
    }

    #[test]
    fn standard_frame_fits_within_64_bytes() {
        let frame = build_tp1_frame(0xBC, 0x1101, 0x0A03, &[0x00, 0x80], false).unwrap();
        assert!(frame.len() < MAX_TP1_FRAME);
        assert_eq!(frame.last().copied(), Some(tp1_checksum(&frame[..frame.len() - 1])));
    }

    #[test]
    fn oversized_standard_apdu_is_rejected() {
        let apdu = vec![0u8; 16];
        assert!(build_tp1_frame(0xBC, 0x1101, 0x0A03, &apdu, false).is_err());
    }

    #[test]
    fn confirm_timeout_grows_with_frame_length() {
        assert!(confirm_timeout(20) > confirm_timeout(5));
    }

    #[test]
    fn repeat_detection_ignores_repeat_flag_bit() {
        let a = [0xBCu8, 0x11, 0x01, 0x0A, 0x03, 0xF1, 0x00, 0x00];
        let mut b = a;
        b[0] ^= 0x10; // flip the repeat-flag bit only
        assert!(is_repeat(&b, Some(&a)));
    }

    #[test]
    fn destination_of_reads_standard_frame_fields() {
        let frame = build_tp1_frame(0xBC, 0x1101, 0x0A03, &[0x00], false).unwrap();
        assert_eq!(destination_of(&frame), 0x0A03);
    }
}
