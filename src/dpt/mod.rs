//! Datapoint Type (DPT) translator contract.
//!
//! Concrete DPT value semantics (temperature scaling, percentage clamping,
//! dimming step codes, ...) are an external concern; this module only
//! specifies the seam a translator plugs into. The original reflective
//! `createTranslator(mainNumber, dptId, bytes)` lookup becomes an explicit
//! [`TranslatorRegistry`] of constructors keyed by main number, populated up
//! front via [`TranslatorRegistry::with_defaults`] instead of discovered at
//! runtime.
//!
//! ```
//! use knx_net::dpt::TranslatorRegistry;
//!
//! let registry = TranslatorRegistry::with_defaults();
//! let translator = registry.create(9, "9.001").unwrap();
//! let mut buf = [0u8; 2];
//! let len = translator.encode(&[0x0C, 0x1A], &mut buf).unwrap();
//! assert_eq!(&buf[..len], &[0x0C, 0x1A]);
//! ```

use crate::error::{KnxError, Result};
use std::collections::HashMap;
use std::fmt;

/// Encodes and decodes a single KNX datapoint type against opaque byte
/// buffers. Implementors own the semantics (scaling, signedness, bit
/// layout); this core only needs enough of a contract to round-trip bytes
/// and to report which `(main number, dpt id)` pair a translator serves.
pub trait Translator: Send + Sync {
    /// Main DPT number, e.g. `9` for 2-byte float types.
    fn main_number(&self) -> u16;

    /// Full DPT identifier this instance was constructed for, e.g. `"9.001"`.
    fn dpt_id(&self) -> &str;

    /// Encode `value` into `buf`, returning the number of bytes written.
    ///
    /// # Errors
    /// Returns [`KnxError::BufferTooSmall`] if `buf` cannot hold the
    /// encoded value, or [`KnxError::ValueOutOfRange`] if `value` is not
    /// representable by this DPT.
    fn encode(&self, value: &[u8], buf: &mut [u8]) -> Result<usize>;

    /// Decode the wire representation in `data`.
    ///
    /// # Errors
    /// Returns [`KnxError::ValueOutOfRange`] if `data` is not a valid
    /// encoding for this DPT.
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>>;
}

impl fmt::Debug for dyn Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("main_number", &self.main_number())
            .field("dpt_id", &self.dpt_id())
            .finish()
    }
}

/// Builds a [`Translator`] for one concrete `dpt_id` under a given main
/// number. Registered constructors are looked up by main number only; the
/// constructor itself decides whether the specific `dpt_id` it receives is
/// one it knows how to serve.
pub type TranslatorCtor = fn(dpt_id: &str) -> Result<Box<dyn Translator>>;

/// Maps DPT main numbers to the constructor responsible for them.
///
/// Stands in for the reflective class lookup of the original source: a
/// caller asks for `(main_number, dpt_id)` and gets back a boxed
/// [`Translator`], with every constructor registered explicitly rather than
/// discovered by scanning the classpath.
pub struct TranslatorRegistry {
    constructors: HashMap<u16, TranslatorCtor>,
}

impl TranslatorRegistry {
    /// An empty registry with no constructors registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register (or replace) the constructor for `main_number`.
    pub fn register(&mut self, main_number: u16, ctor: TranslatorCtor) {
        self.constructors.insert(main_number, ctor);
    }

    /// Construct a translator for `(main_number, dpt_id)`.
    ///
    /// # Errors
    /// Returns [`KnxError::UnknownTranslator`] if no constructor is
    /// registered for `main_number`, or whatever error the constructor
    /// itself raises for an unrecognized `dpt_id`.
    pub fn create(&self, main_number: u16, dpt_id: &str) -> Result<Box<dyn Translator>> {
        let ctor = self
            .constructors
            .get(&main_number)
            .ok_or(KnxError::UnknownTranslator { main_number })?;
        ctor(dpt_id)
    }

    /// A registry pre-populated with generic, length-validating translators
    /// for the main numbers most commonly seen on the bus (1, 3, 5, 7, 9,
    /// 13). These only validate the wire length for their main number and
    /// pass bytes through unchanged — callers that need actual value
    /// semantics (Celsius scaling, step-code decoding, ...) register their
    /// own constructor over these with [`TranslatorRegistry::register`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(1, RawTranslator::for_main_1);
        registry.register(3, RawTranslator::for_main_3);
        registry.register(5, RawTranslator::for_main_5);
        registry.register(7, RawTranslator::for_main_7);
        registry.register(9, RawTranslator::for_main_9);
        registry.register(13, RawTranslator::for_main_13);
        registry
    }
}

impl Default for TranslatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A translator that only checks the wire length for its main number and
/// otherwise copies bytes through unchanged. The default registered for
/// each main number until a real value codec is plugged in over it.
struct RawTranslator {
    main_number: u16,
    dpt_id: String,
    wire_len: usize,
}

impl RawTranslator {
    fn new(main_number: u16, dpt_id: &str, wire_len: usize) -> Box<dyn Translator> {
        Box::new(Self {
            main_number,
            dpt_id: dpt_id.to_string(),
            wire_len,
        })
    }

    fn for_main_1(dpt_id: &str) -> Result<Box<dyn Translator>> {
        Ok(Self::new(1, dpt_id, 1))
    }

    fn for_main_3(dpt_id: &str) -> Result<Box<dyn Translator>> {
        Ok(Self::new(3, dpt_id, 1))
    }

    fn for_main_5(dpt_id: &str) -> Result<Box<dyn Translator>> {
        Ok(Self::new(5, dpt_id, 1))
    }

    fn for_main_7(dpt_id: &str) -> Result<Box<dyn Translator>> {
        Ok(Self::new(7, dpt_id, 2))
    }

    fn for_main_9(dpt_id: &str) -> Result<Box<dyn Translator>> {
        Ok(Self::new(9, dpt_id, 2))
    }

    fn for_main_13(dpt_id: &str) -> Result<Box<dyn Translator>> {
        Ok(Self::new(13, dpt_id, 4))
    }
}

impl Translator for RawTranslator {
    fn main_number(&self) -> u16 {
        self.main_number
    }

    fn dpt_id(&self) -> &str {
        &self.dpt_id
    }

    fn encode(&self, value: &[u8], buf: &mut [u8]) -> Result<usize> {
        if value.len() != self.wire_len {
            return Err(KnxError::ValueOutOfRange);
        }
        if buf.len() < self.wire_len {
            return Err(KnxError::BufferTooSmall);
        }
        buf[..self.wire_len].copy_from_slice(value);
        Ok(self.wire_len)
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() != self.wire_len {
            return Err(KnxError::ValueOutOfRange);
        }
        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_defaults_covers_common_main_numbers() {
        let registry = TranslatorRegistry::with_defaults();
        for main in [1u16, 3, 5, 7, 9, 13] {
            assert!(registry.create(main, "x").is_ok());
        }
    }

    #[test]
    fn unregistered_main_number_is_rejected() {
        let registry = TranslatorRegistry::with_defaults();
        let err = registry.create(99, "99.001").unwrap_err();
        assert!(matches!(err, KnxError::UnknownTranslator { main_number: 99 }));
    }

    #[test]
    fn raw_translator_round_trips_matching_length() {
        let registry = TranslatorRegistry::with_defaults();
        let translator = registry.create(9, "9.001").unwrap();
        let mut buf = [0u8; 2];
        let len = translator.encode(&[0x0C, 0x1A], &mut buf).unwrap();
        assert_eq!(len, 2);
        assert_eq!(translator.decode(&buf[..len]).unwrap(), vec![0x0C, 0x1A]);
    }

    #[test]
    fn raw_translator_rejects_wrong_length() {
        let registry = TranslatorRegistry::with_defaults();
        let translator = registry.create(5, "5.001").unwrap();
        let mut buf = [0u8; 4];
        assert!(translator.encode(&[0, 0], &mut buf).is_err());
    }
}
