//! Shared, view-able backing storage

use crate::error::{EnlaceError, Result};
use std::sync::{Arc, PoisonError, RwLock};

/// A window `[offset, offset + len)` into reference-counted storage.
///
/// Clones and views alias the same memory; writes through one handle are
/// visible through every other handle over the same range.
#[derive(Debug)]
pub struct SharedBuffer<T> {
    storage: Arc<RwLock<Vec<T>>>,
    offset: usize,
    len: usize,
}

impl<T> Clone for SharedBuffer<T> {
    fn clone(&self) -> Self {
        Self { storage: Arc::clone(&self.storage), offset: self.offset, len: self.len }
    }
}

impl<T: Clone> SharedBuffer<T> {
    pub fn from_vec(data: Vec<T>) -> Self {
        let len = data.len();
        Self { storage: Arc::new(RwLock::new(data)), offset: 0, len }
    }

    pub fn filled(len: usize, value: T) -> Self {
        Self::from_vec(vec![value; len])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether both handles point into the same allocation.
    pub fn same_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Alias `[offset, offset + len)` of this window.
    pub fn view(&self, offset: usize, len: usize) -> Result<Self> {
        if offset.checked_add(len).map_or(true, |end| end > self.len) {
            return Err(EnlaceError::precondition(
                "buffer view",
                format!("{len} elements at offset {offset} exceed buffer of {} elements", self.len),
            ));
        }
        Ok(Self { storage: Arc::clone(&self.storage), offset: self.offset + offset, len })
    }

    /// Run `f` over the elements of this window.
    pub fn read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let guard = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard[self.offset..self.offset + self.len])
    }

    /// Run `f` over the elements of this window, mutably.
    pub fn write<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        let mut guard = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard[self.offset..self.offset + self.len])
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.read(<[T]>::to_vec)
    }

    /// Copy `len` elements of `src` starting at `src_offset` to `dst_offset`.
    pub fn copy_from(&self, dst_offset: usize, src: &Self, src_offset: usize, len: usize) -> Result<()> {
        if dst_offset + len > self.len || src_offset + len > src.len {
            return Err(EnlaceError::precondition(
                "buffer copy",
                format!(
                    "copy of {len} elements from {src_offset} (of {}) to {dst_offset} (of {}) is out of range",
                    src.len, self.len
                ),
            ));
        }
        // One lock at a time: src and self may share storage.
        let staged = src.read(|s| s[src_offset..src_offset + len].to_vec());
        self.write(|d| d[dst_offset..dst_offset + len].clone_from_slice(&staged));
        Ok(())
    }
}
