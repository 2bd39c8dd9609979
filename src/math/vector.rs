//! Integer vectors over shared storage

use super::buffer::SharedBuffer;
use crate::device::{DeviceId, Stream};
use crate::error::Result;

/// Shared vector of integer ids (class labels, token ids, per-sequence dims).
#[derive(Debug, Clone)]
pub struct IdVector {
    buf: SharedBuffer<i32>,
    device: DeviceId,
}

impl IdVector {
    pub fn from_vec(data: Vec<i32>, device: DeviceId) -> Self {
        Self { buf: SharedBuffer::from_vec(data), device }
    }

    pub fn zeros(len: usize, device: DeviceId) -> Self {
        Self { buf: SharedBuffer::filled(len, 0), device }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn shares_memory_with(&self, other: &Self) -> bool {
        self.buf.same_storage(&other.buf)
    }

    pub fn get(&self, index: usize) -> Option<i32> {
        self.buf.read(|s| s.get(index).copied())
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.buf.to_vec()
    }

    /// Aliasing window `[offset, offset + len)`.
    pub fn view(&self, offset: usize, len: usize) -> Result<Self> {
        Ok(Self { buf: self.buf.view(offset, len)?, device: self.device })
    }

    /// Copy `len` ids of `src` from `src_offset` into this vector at `dst_offset`.
    pub fn copy_range_from(
        &self,
        dst_offset: usize,
        src: &Self,
        src_offset: usize,
        len: usize,
        stream: Stream,
    ) -> Result<()> {
        tracing::trace!(len, ?stream, "id vector copy");
        self.buf.copy_from(dst_offset, &src.buf, src_offset, len)
    }

    /// Reuse `slot` when it already holds enough ids, otherwise allocate.
    pub fn resize_or_create(slot: &mut Option<Self>, len: usize, device: DeviceId) -> Result<&mut Self> {
        let resized = match slot.as_ref() {
            Some(v) if v.device == device && v.len() >= len => v.view(0, len)?,
            _ => Self::zeros(len, device),
        };
        Ok(slot.insert(resized))
    }
}
