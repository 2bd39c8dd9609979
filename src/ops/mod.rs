//! Sequence-aware batch transformations
//!
//! All operations are stateless: they read one or more batches and write a
//! destination batch. Destination buffers are reused when large enough and
//! placed according to [`CopyOptions`](crate::config::CopyOptions).

mod aggregate;
mod concat;
mod copy;
mod group;
mod layout;
mod sub_range;

pub use aggregate::sum_costs;
pub use concat::{concat, concat_selected_rows};
pub use copy::{resize_and_copy, resize_and_copy_range};
pub use group::{group_indices_by_data_id, split_by_data_id};
pub use layout::{flatten_sub_sequences, sub_sequence_counts, SequenceLayout, SequenceSpan};
pub use sub_range::{sub_range_from, PositionSlice, SubRange};

use crate::batch::SequenceBatch;
use crate::error::{EnlaceError, Result};

/// Kind of pass a batch operation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pass {
    /// Forward and backward
    #[default]
    Train,
    /// Forward only; gradients are never allocated
    Test,
    /// Numerical gradient checking
    GradientCheck,
}

impl Pass {
    pub fn needs_gradient(self) -> bool {
        !matches!(self, Self::Test)
    }
}

/// Collect `field` from every part: `None` when no part has it, every value
/// when all parts have it, an error when only some do.
pub(crate) fn all_or_none<'a, T: ?Sized>(
    operation: &'static str,
    field: &'static str,
    parts: &'a [SequenceBatch],
    get: impl Fn(&'a SequenceBatch) -> Option<&'a T>,
) -> Result<Option<Vec<&'a T>>> {
    let present: Vec<&T> = parts.iter().filter_map(&get).collect();
    match present.len() {
        0 => Ok(None),
        n if n == parts.len() => Ok(Some(present)),
        n => Err(EnlaceError::precondition(
            operation,
            format!("{field} present in {n} of {} parts", parts.len()),
        )),
    }
}
