//! Compute device placement and execution streams
//!
//! The active device is thread-local state. [`DeviceGuard`] switches it for a
//! scope and restores the previous device on drop, including early returns.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

/// Identifier of the device that owns a buffer. `-1` is host memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i32);

impl DeviceId {
    /// Host (CPU) memory.
    pub const HOST: Self = Self(-1);

    /// Check if this is host memory
    #[must_use]
    pub const fn is_host(self) -> bool {
        self.0 < 0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::HOST
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "host")
        } else {
            write!(f, "device:{}", self.0)
        }
    }
}

thread_local! {
    static ACTIVE_DEVICE: Cell<DeviceId> = const { Cell::new(DeviceId::HOST) };
}

/// Device currently active on this thread.
#[must_use]
pub fn current() -> DeviceId {
    ACTIVE_DEVICE.with(Cell::get)
}

/// Scoped switch of the active device.
#[must_use = "the previous device is restored when the guard is dropped"]
pub struct DeviceGuard {
    previous: DeviceId,
}

impl DeviceGuard {
    /// Make `device` active until the guard is dropped.
    pub fn switch(device: DeviceId) -> Self {
        let previous = ACTIVE_DEVICE.with(|d| d.replace(device));
        Self { previous }
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        ACTIVE_DEVICE.with(|d| d.set(self.previous));
    }
}

/// Execution stream that copies and compute are issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    /// The device's default stream
    #[default]
    Default,
    /// A numbered stream
    Id(u32),
}

impl Stream {
    /// Block until all work issued on this stream has finished.
    ///
    /// Host-backed buffers complete copies eagerly, so there is nothing to wait for.
    pub fn synchronize(self) {
        tracing::trace!(stream = ?self, "stream synchronized");
    }
}

/// Device that newly allocated buffers should live on.
pub(crate) fn placement(use_gpu: bool) -> DeviceId {
    if use_gpu {
        current()
    } else {
        DeviceId::HOST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_host() {
        assert!(DeviceId::default().is_host());
        assert_eq!(current(), DeviceId::HOST);
    }

    #[test]
    fn test_guard_restores_previous_device() {
        {
            let _outer = DeviceGuard::switch(DeviceId(1));
            assert_eq!(current(), DeviceId(1));
            {
                let _inner = DeviceGuard::switch(DeviceId(2));
                assert_eq!(current(), DeviceId(2));
            }
            assert_eq!(current(), DeviceId(1));
        }
        assert_eq!(current(), DeviceId::HOST);
    }

    #[test]
    fn test_guard_restores_on_early_return() {
        fn early(device: DeviceId) -> Option<()> {
            let _guard = DeviceGuard::switch(device);
            None?;
            Some(())
        }
        assert!(early(DeviceId(3)).is_none());
        assert_eq!(current(), DeviceId::HOST);
    }

    #[test]
    fn test_placement() {
        let _guard = DeviceGuard::switch(DeviceId(0));
        assert_eq!(placement(true), DeviceId(0));
        assert_eq!(placement(false), DeviceId::HOST);
    }

    #[test]
    fn test_display() {
        assert_eq!(DeviceId::HOST.to_string(), "host");
        assert_eq!(DeviceId(2).to_string(), "device:2");
    }
}
