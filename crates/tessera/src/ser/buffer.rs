// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Growable byte buffer with a read cursor.

use super::{SerError, SerResult};

/// Byte buffer owned by exactly one serializer or deserializer.
///
/// Invariant: `cursor <= len <= capacity`. A disposed buffer rejects every
/// read and write until [`Buffer::attach`] is called again.
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    cursor: usize,
    attached: bool,
}

impl Buffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            cursor: 0,
            attached: true,
        }
    }

    /// Reset to an empty, usable state (run when rented).
    pub fn attach(&mut self) {
        self.data.clear();
        self.cursor = 0;
        self.attached = true;
    }

    /// Drop the content and refuse further access (run when returned).
    pub fn dispose(&mut self) {
        self.data.clear();
        self.cursor = 0;
        self.attached = false;
    }

    /// Replace the content with `bytes` and rewind the cursor.
    pub fn load(&mut self, bytes: &[u8]) -> SerResult<()> {
        self.check_attached()?;
        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.cursor = 0;
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Append `bytes`, growing the allocation; fails past `limit` total bytes.
    pub fn write(&mut self, bytes: &[u8], limit: usize) -> SerResult<()> {
        self.check_attached()?;
        if self.data.len() + bytes.len() > limit {
            return Err(SerError::WriteFailed {
                offset: self.data.len(),
                reason: "frame size limit reached".into(),
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Consume `len` bytes at the cursor.
    pub fn read(&mut self, len: usize) -> SerResult<&[u8]> {
        self.check_attached()?;
        if len > self.remaining() {
            return Err(SerError::ReadFailed {
                offset: self.cursor,
                reason: "unexpected end of buffer".into(),
            });
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.data[start..self.cursor])
    }

    fn check_attached(&self) -> SerResult<()> {
        if self.attached {
            Ok(())
        } else {
            Err(SerError::Disposed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_past_end_reports_offset() {
        let mut buf = Buffer::with_capacity(4);
        buf.write(&[1, 2], usize::MAX).expect("write");
        assert_eq!(buf.read(2).expect("read"), &[1, 2]);
        match buf.read(1) {
            Err(SerError::ReadFailed { offset, reason }) => {
                assert_eq!(offset, 2);
                assert_eq!(reason, "unexpected end of buffer");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_disposed_buffer_rejects_access() {
        let mut buf = Buffer::with_capacity(4);
        buf.write(&[9; 3], usize::MAX).expect("write");
        buf.dispose();
        assert!(buf.is_empty());
        assert_eq!(buf.write(&[1], usize::MAX), Err(SerError::Disposed));
        assert_eq!(buf.read(0).unwrap_err(), SerError::Disposed);

        buf.attach();
        buf.write(&[1], usize::MAX).expect("write after attach");
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_write_limit() {
        let mut buf = Buffer::with_capacity(2);
        buf.write(&[0; 4], 4).expect("write at limit");
        assert!(matches!(
            buf.write(&[0], 4),
            Err(SerError::WriteFailed { offset: 4, .. })
        ));
    }

    #[test]
    fn test_load_rewinds_cursor() {
        let mut buf = Buffer::with_capacity(8);
        buf.load(&[1, 2, 3]).expect("load");
        buf.read(3).expect("read");
        buf.load(&[4]).expect("reload");
        assert_eq!(buf.cursor(), 0);
        assert_eq!(buf.read(1).expect("read"), &[4]);
    }
}
