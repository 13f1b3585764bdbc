//! Serial links to a KNX bus coupling unit: FT1.2 and TP-UART.
//!
//! Both links share the shape of [`crate::protocol::session`]: a blocking
//! port handle, one receiver thread, and condvar-backed ack/confirmation
//! timers, but the frame format and flow control are specific to each
//! physical protocol.

pub mod ft12;
pub mod tpuart;
