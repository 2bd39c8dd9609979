//! Host-backed dense buffers used as batch payloads
//!
//! Buffers are reference-counted handles: clones and views alias memory, so a
//! batch copied for a new pass shares its payload with the original.

mod buffer;
mod matrix;
mod vector;

pub use buffer::SharedBuffer;
pub use matrix::Matrix;
pub use vector::IdVector;

/// Element type of dense payloads.
pub type Real = f32;
