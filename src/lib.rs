//! Sequence-structured batches exchanged between stages of a layered
//! compute pipeline.
//!
//! - [`SequenceBatch`]: shared payload buffers with optional two-level
//!   sequence boundaries
//! - [`ReadinessGate`]: value and gradient readiness between one producer and
//!   its registered consumers
//! - [`ops`]: sequence-aware sub-range, copy, concatenation, grouping and
//!   layout operations
//!
//! # Example
//!
//! ```
//! use enlace::{ops, CopyOptions, DeviceId, Matrix, SequenceBatch};
//!
//! let value = Matrix::from_vec(5, 1, vec![1.0, 2.0, 3.0, 4.0, 5.0], DeviceId::HOST)?;
//! let batch = SequenceBatch::from_value(value).with_sequence_starts(vec![0, 2, 5])?;
//! assert_eq!(batch.num_sequences(), 2);
//!
//! let mut second = SequenceBatch::new();
//! let rows = ops::resize_and_copy_range(&mut second, &batch, 1, 1, CopyOptions::host())?;
//! assert_eq!(rows, 3);
//! # Ok::<(), enlace::EnlaceError>(())
//! ```

pub mod batch;
pub mod config;
pub mod device;
pub mod error;
pub mod math;
pub mod ops;
pub mod sync;

pub use batch::{SequenceBatch, SequencePositions};
pub use config::{CopyOptions, EnlaceConfig};
pub use device::{DeviceId, Stream};
pub use error::{EnlaceError, Result};
pub use math::{IdVector, Matrix};
pub use ops::Pass;
pub use sync::ReadinessGate;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
