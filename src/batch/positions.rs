//! Sequence boundary arrays

use crate::error::{EnlaceError, Result};
use std::ops::Deref;
use std::sync::Arc;

/// Start rows of consecutive sequences plus a closing end row.
///
/// `[0, 3, 3, 7]` describes three sequences covering rows `0..3`, `3..3` and
/// `3..7`. Always non-empty, starts at 0 and never decreases. Clones share
/// the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePositions(Arc<[usize]>);

impl SequencePositions {
    /// Validate and wrap boundary values.
    pub fn new(starts: Vec<usize>) -> Result<Self> {
        match starts.first() {
            None => return Err(EnlaceError::invariant("sequence positions", "boundary array is empty")),
            Some(&first) if first != 0 => {
                return Err(EnlaceError::invariant(
                    "sequence positions",
                    format!("first boundary is {first}, expected 0"),
                ))
            }
            Some(_) => {}
        }
        if let Some(i) = starts.windows(2).position(|w| w[1] < w[0]) {
            return Err(EnlaceError::invariant(
                "sequence positions",
                format!("boundary {} ({}) is below boundary {} ({})", i + 1, starts[i + 1], i, starts[i]),
            ));
        }
        Ok(Self(starts.into()))
    }

    /// Every row its own sequence: `[0, 1, ..., rows]`.
    pub fn unit(rows: usize) -> Self {
        Self((0..=rows).collect::<Vec<_>>().into())
    }

    pub fn num_sequences(&self) -> usize {
        self.0.len() - 1
    }

    /// Row count covered, i.e. the last boundary.
    pub fn total_rows(&self) -> usize {
        self.0[self.0.len() - 1]
    }

    /// Rows spanned by sequence `index`.
    pub fn range(&self, index: usize) -> Option<std::ops::Range<usize>> {
        Some(*self.0.get(index)?..*self.0.get(index + 1)?)
    }

    /// Length of every sequence, in order.
    pub fn lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.windows(2).map(|w| w[1] - w[0])
    }

    /// Take `count` boundaries starting at `start` and shift them to begin at 0.
    pub fn rebased_slice(&self, start: usize, count: usize) -> Result<Self> {
        if count == 0 || start.checked_add(count).map_or(true, |end| end > self.0.len()) {
            return Err(EnlaceError::precondition(
                "sequence positions slice",
                format!("{count} boundaries at {start} outside {} boundaries", self.0.len()),
            ));
        }
        let base = self.0[start];
        Ok(Self(self.0[start..start + count].iter().map(|p| p - base).collect()))
    }

    /// Check the closing boundary against the batch's row count.
    pub(crate) fn check_closes_at(&self, what: &'static str, rows: usize) -> Result<()> {
        if self.total_rows() != rows {
            return Err(EnlaceError::invariant(
                what,
                format!("last boundary is {}, batch has {rows} rows", self.total_rows()),
            ));
        }
        Ok(())
    }
}

impl Deref for SequencePositions {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}
