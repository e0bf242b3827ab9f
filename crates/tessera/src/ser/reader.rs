// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoding cursor.

use super::{Buffer, Message, SerError, SerResult};

/// Generate little-endian read methods for primitive types.
///
/// Each generated method checks bounds through [`Buffer::read`], so reading
/// past the written length yields `SerError::ReadFailed` with the offset.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> SerResult<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.buffer.read($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Little-endian reader over an owned buffer.
#[derive(Debug)]
pub struct Deserializer {
    buffer: Buffer,
}

impl Deserializer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Buffer::with_capacity(capacity),
        }
    }

    /// Unpooled reader preloaded with `bytes` (tests, one-off decodes).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Buffer::with_capacity(bytes.len());
        buffer.attach();
        // A freshly attached buffer always accepts a load.
        let _ = buffer.load(bytes);
        Self { buffer }
    }

    /// Replace content and rewind.
    pub fn load(&mut self, bytes: &[u8]) -> SerResult<()> {
        self.buffer.load(bytes)
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u16, u16, 2);
    impl_read_le!(read_u32, u32, 4);
    impl_read_le!(read_u64, u64, 8);
    impl_read_le!(read_i8, i8, 1);
    impl_read_le!(read_i16, i16, 2);
    impl_read_le!(read_i32, i32, 4);
    impl_read_le!(read_i64, i64, 8);

    pub fn read_f32(&mut self) -> SerResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> SerResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_bool(&mut self) -> SerResult<bool> {
        let offset = self.offset();
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SerError::InvalidData {
                reason: format!("bool byte {} at offset {}", other, offset),
            }),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> SerResult<&[u8]> {
        self.buffer.read(len)
    }

    /// Byte block with a u32 length prefix.
    pub fn read_blob(&mut self) -> SerResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// UTF-8 string with a u16 length prefix.
    pub fn read_str(&mut self) -> SerResult<String> {
        let len = usize::from(self.read_u16()?);
        let offset = self.offset();
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerError::InvalidData {
            reason: format!("invalid UTF-8 string at offset {}", offset),
        })
    }

    pub fn read_message<T: Message>(&mut self) -> SerResult<T> {
        T::decode(self)
    }

    /// Everything left after the cursor.
    pub fn read_rest(&mut self) -> SerResult<&[u8]> {
        let remaining = self.buffer.remaining();
        self.buffer.read(remaining)
    }

    pub fn offset(&self) -> usize {
        self.buffer.cursor()
    }

    pub fn remaining(&self) -> usize {
        self.buffer.remaining()
    }

    pub fn is_eof(&self) -> bool {
        self.buffer.remaining() == 0
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}
