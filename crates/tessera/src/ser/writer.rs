// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encoding cursor.

use super::{Buffer, Message, SerError, SerResult};

/// Generate little-endian put methods for primitive types.
macro_rules! impl_put_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) -> SerResult<()> {
            self.buffer.write(&value.to_le_bytes(), self.limit)
        }
    };
}

/// Growable little-endian writer.
#[derive(Debug)]
pub struct Serializer {
    buffer: Buffer,
    limit: usize,
}

impl Serializer {
    /// Writer bounded to `limit` bytes in total.
    pub fn new(initial_capacity: usize, limit: usize) -> Self {
        Self {
            buffer: Buffer::with_capacity(initial_capacity),
            limit,
        }
    }

    /// Unbounded writer.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self::new(initial_capacity, usize::MAX)
    }

    impl_put_le!(put_u8, u8);
    impl_put_le!(put_u16, u16);
    impl_put_le!(put_u32, u32);
    impl_put_le!(put_u64, u64);
    impl_put_le!(put_i8, i8);
    impl_put_le!(put_i16, i16);
    impl_put_le!(put_i32, i32);
    impl_put_le!(put_i64, i64);

    pub fn put_f32(&mut self, value: f32) -> SerResult<()> {
        self.put_u32(value.to_bits())
    }

    pub fn put_f64(&mut self, value: f64) -> SerResult<()> {
        self.put_u64(value.to_bits())
    }

    pub fn put_bool(&mut self, value: bool) -> SerResult<()> {
        self.put_u8(u8::from(value))
    }

    /// Raw bytes, no length prefix.
    pub fn put_bytes(&mut self, data: &[u8]) -> SerResult<()> {
        self.buffer.write(data, self.limit)
    }

    /// Byte block with a u32 length prefix.
    pub fn put_blob(&mut self, data: &[u8]) -> SerResult<()> {
        let len = u32::try_from(data.len()).map_err(|_| SerError::WriteFailed {
            offset: self.buffer.len(),
            reason: "byte block longer than u32::MAX".into(),
        })?;
        self.put_u32(len)?;
        self.put_bytes(data)
    }

    /// UTF-8 string with a u16 length prefix.
    pub fn put_str(&mut self, value: &str) -> SerResult<()> {
        let len = u16::try_from(value.len()).map_err(|_| SerError::WriteFailed {
            offset: self.buffer.len(),
            reason: "string longer than u16::MAX bytes".into(),
        })?;
        self.put_u16(len)?;
        self.put_bytes(value.as_bytes())
    }

    /// Nested message, no type id.
    pub fn put_message<T: Message>(&mut self, message: &T) -> SerResult<()> {
        message.encode(self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Discard written bytes, keeping the allocation.
    pub fn clear(&mut self) {
        self.buffer.attach();
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}
