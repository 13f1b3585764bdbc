//! KNXnet/IP protocol implementation.
//!
//! This module contains the core protocol structures and parsing logic
//! for KNXnet/IP frames, cEMI messages, and KNX telegrams.

pub mod cemi;
pub mod constants;
pub mod dib;
pub mod frame;
pub mod routing;
pub mod services;
pub mod session;

pub use cemi::*;
pub use constants::*;
pub use dib::*;
pub use frame::*;
pub use routing::*;
pub use services::*;
pub use session::*;
