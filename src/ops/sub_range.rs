//! Zero-copy sub-range views of a batch

use crate::batch::SequenceBatch;
use crate::error::{EnlaceError, Result};
use crate::math::Matrix;
use tracing::debug;

/// Boundaries to keep from the source: `count` entries starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSlice {
    pub start: usize,
    pub count: usize,
}

/// Window of a source batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRange {
    /// First row of the window
    pub row_offset: usize,
    /// Rows in the window
    pub rows: usize,
    /// Width of the resulting dense views
    pub width: usize,
    /// Mark the dense views as transposed
    pub transposed: bool,
    /// Sequence boundaries to carry over, re-based to start at 0
    pub sequence_positions: Option<PositionSlice>,
}

impl SubRange {
    pub fn rows(row_offset: usize, rows: usize, width: usize) -> Self {
        Self { row_offset, rows, width, transposed: false, sequence_positions: None }
    }

    #[must_use]
    pub fn with_sequence_positions(mut self, start: usize, count: usize) -> Self {
        self.sequence_positions = Some(PositionSlice { start, count });
        self
    }

    #[must_use]
    pub fn transposed(mut self) -> Self {
        self.transposed = true;
        self
    }
}

/// Batch whose value, grad, input and ids alias rows
/// `[row_offset, row_offset + rows)` of `source`.
///
/// Dense views start `row_offset * width` elements into the source buffer,
/// so `width` must describe the source's row layout. Nothing is copied;
/// writes through the result are visible in `source`.
pub fn sub_range_from(source: &SequenceBatch, range: &SubRange) -> Result<SequenceBatch> {
    let SubRange { row_offset, rows, width, transposed, sequence_positions } = *range;
    debug!(row_offset, rows, width, transposed, "sub_range_from");

    let available = source.batch_size();
    if row_offset.checked_add(rows).map_or(true, |end| end > available) {
        return Err(EnlaceError::precondition(
            "sub_range_from",
            format!("rows {row_offset}..{} exceed {available} source rows", row_offset.saturating_add(rows)),
        ));
    }

    let dense_view = |m: &Matrix| m.view(row_offset * width, rows, width, transposed);
    let mut out = SequenceBatch::new();
    out.device_id = source.device_id;
    out.data_id = source.data_id;
    out.frame_height = source.frame_height;
    out.frame_width = source.frame_width;
    out.value = source.value.as_ref().map(dense_view).transpose()?;
    out.grad = source.grad.as_ref().map(dense_view).transpose()?;
    out.input = source.input.as_ref().map(dense_view).transpose()?;
    out.ids = source.ids.as_ref().map(|ids| ids.view(row_offset, rows)).transpose()?;

    if let Some(PositionSlice { start, count }) = sequence_positions {
        let starts = source.sequence_start_positions.as_ref().ok_or_else(|| {
            EnlaceError::precondition("sub_range_from", "sequence positions requested but source has none")
        })?;
        let sliced = starts.rebased_slice(start, count)?;
        sliced.check_closes_at("sub-range sequence positions", rows)?;
        out.sequence_start_positions = Some(sliced);
    }
    Ok(out)
}
