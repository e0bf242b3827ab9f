// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary serialization over pooled buffers.
//!
//! [`Serializer`] and [`Deserializer`] wrap a [`Buffer`] and expose typed
//! little-endian `put_*` / `read_*` primitives. Instances are normally rented
//! from a [`crate::pool::Pools`] for the duration of one encode/decode and
//! returned afterward.
//!
//! Two traits connect application types to the wire:
//! - [`WireValue`]: a plain value (integers, strings, vectors, options) that can
//!   be written and read without a type id. Replicated fields use it.
//! - [`Message`]: a named payload type that can be registered in the
//!   [`crate::registry::TypeRegistry`] and dispatched polymorphically.

mod buffer;
mod reader;
mod writer;

pub use buffer::Buffer;
pub use reader::Deserializer;
pub use writer::Serializer;

use std::any::Any;
use std::fmt;

/// Serialization error used within `ser`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerError {
    WriteFailed { offset: usize, reason: String },
    ReadFailed { offset: usize, reason: String },
    InvalidData { reason: String },
    /// The underlying buffer was disposed (instance returned to its pool).
    Disposed,
}

impl fmt::Display for SerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerError::WriteFailed { offset, reason } => {
                write!(f, "write failed at offset {}: {}", offset, reason)
            }
            SerError::ReadFailed { offset, reason } => {
                write!(f, "read failed at offset {}: {}", offset, reason)
            }
            SerError::InvalidData { reason } => write!(f, "invalid data: {}", reason),
            SerError::Disposed => write!(f, "buffer used after being returned to its pool"),
        }
    }
}

impl std::error::Error for SerError {}

pub type SerResult<T> = core::result::Result<T, SerError>;

/// A value with a self-delimiting wire encoding.
pub trait WireValue: Sized + Send + Sync + 'static {
    fn write_to(&self, w: &mut Serializer) -> SerResult<()>;
    fn read_from(r: &mut Deserializer) -> SerResult<Self>;
}

/// A payload type exchanged between peers.
///
/// `TYPE_NAME` must be identical on both sides of a connection; it is what the
/// registry handshake compares.
///
/// # Example
///
/// ```
/// use tessera::ser::{Deserializer, Message, SerResult, Serializer};
///
/// struct Chat {
///     text: String,
/// }
///
/// impl Message for Chat {
///     const TYPE_NAME: &'static str = "demo::Chat";
///
///     fn encode(&self, w: &mut Serializer) -> SerResult<()> {
///         w.put_str(&self.text)
///     }
///
///     fn decode(r: &mut Deserializer) -> SerResult<Self> {
///         Ok(Self { text: r.read_str()? })
///     }
/// }
/// ```
pub trait Message: Sized + Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    fn encode(&self, w: &mut Serializer) -> SerResult<()>;

    fn decode(r: &mut Deserializer) -> SerResult<Self>;
}

/// Type-erased decode used by the registry for polymorphic dispatch.
pub(crate) fn decode_boxed<T: Message>(r: &mut Deserializer) -> SerResult<Box<dyn Any + Send>> {
    Ok(Box::new(T::decode(r)?))
}

macro_rules! impl_wire_value_le {
    ($type:ty, $put:ident, $read:ident) => {
        impl WireValue for $type {
            fn write_to(&self, w: &mut Serializer) -> SerResult<()> {
                w.$put(*self)
            }

            fn read_from(r: &mut Deserializer) -> SerResult<Self> {
                r.$read()
            }
        }
    };
}

impl_wire_value_le!(u8, put_u8, read_u8);
impl_wire_value_le!(u16, put_u16, read_u16);
impl_wire_value_le!(u32, put_u32, read_u32);
impl_wire_value_le!(u64, put_u64, read_u64);
impl_wire_value_le!(i8, put_i8, read_i8);
impl_wire_value_le!(i16, put_i16, read_i16);
impl_wire_value_le!(i32, put_i32, read_i32);
impl_wire_value_le!(i64, put_i64, read_i64);
impl_wire_value_le!(f32, put_f32, read_f32);
impl_wire_value_le!(f64, put_f64, read_f64);
impl_wire_value_le!(bool, put_bool, read_bool);

impl WireValue for String {
    fn write_to(&self, w: &mut Serializer) -> SerResult<()> {
        w.put_str(self)
    }

    fn read_from(r: &mut Deserializer) -> SerResult<Self> {
        r.read_str()
    }
}

impl<T: WireValue> WireValue for Vec<T> {
    fn write_to(&self, w: &mut Serializer) -> SerResult<()> {
        let len = u32::try_from(self.len()).map_err(|_| SerError::WriteFailed {
            offset: w.len(),
            reason: "sequence longer than u32::MAX".into(),
        })?;
        w.put_u32(len)?;
        for item in self {
            item.write_to(w)?;
        }
        Ok(())
    }

    fn read_from(r: &mut Deserializer) -> SerResult<Self> {
        let len = r.read_u32()? as usize;
        // Every element takes at least one byte; refuse counts the buffer cannot hold.
        if len > r.remaining() {
            return Err(SerError::ReadFailed {
                offset: r.offset(),
                reason: "sequence length exceeds remaining bytes".into(),
            });
        }
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(T::read_from(r)?);
        }
        Ok(out)
    }
}

impl<T: WireValue> WireValue for Option<T> {
    fn write_to(&self, w: &mut Serializer) -> SerResult<()> {
        match self {
            Some(value) => {
                w.put_bool(true)?;
                value.write_to(w)
            }
            None => w.put_bool(false),
        }
    }

    fn read_from(r: &mut Deserializer) -> SerResult<Self> {
        if r.read_bool()? {
            Ok(Some(T::read_from(r)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ser_error_display_variants() {
        let err = SerError::WriteFailed {
            offset: 12,
            reason: "frame limit reached".into(),
        };
        assert_eq!(err.to_string(), "write failed at offset 12: frame limit reached");

        let err = SerError::ReadFailed {
            offset: 4,
            reason: "unexpected end of buffer".into(),
        };
        assert_eq!(err.to_string(), "read failed at offset 4: unexpected end of buffer");

        assert!(SerError::Disposed.to_string().contains("returned to its pool"));
    }

    #[test]
    fn test_wire_values_compose() {
        let mut w = Serializer::with_capacity(32);
        let names = vec!["red".to_string(), "blue".to_string()];
        let maybe: Option<i32> = Some(-7);
        names.write_to(&mut w).expect("write vec");
        maybe.write_to(&mut w).expect("write option");
        None::<u8>.write_to(&mut w).expect("write none");

        let mut r = Deserializer::from_bytes(w.as_bytes());
        assert_eq!(Vec::<String>::read_from(&mut r).expect("read vec"), names);
        assert_eq!(Option::<i32>::read_from(&mut r).expect("read option"), Some(-7));
        assert_eq!(Option::<u8>::read_from(&mut r).expect("read none"), None);
        assert!(r.is_eof());
    }

    #[test]
    fn test_vec_rejects_oversized_count() {
        let mut w = Serializer::with_capacity(8);
        w.put_u32(1_000_000).expect("write count");
        let mut r = Deserializer::from_bytes(w.as_bytes());
        assert!(matches!(
            Vec::<u64>::read_from(&mut r),
            Err(SerError::ReadFailed { .. })
        ));
    }
}
