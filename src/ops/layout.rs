//! Sequence layout queries and nesting changes

use crate::batch::{SequenceBatch, SequencePositions};
use crate::error::{EnlaceError, Result};
use tracing::debug;

/// One sequence (or sub-sequence) of a batch.
///
/// Field order is the sort order: longest first, ties broken by start row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceSpan {
    /// Rows in the span
    pub length: usize,
    /// First row
    pub start: usize,
    /// Index of the top-level sequence the span belongs to
    pub sequence: usize,
    /// Position inside the parent sequence, or `sequence` again when the
    /// batch has a single level
    pub sub_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLayout {
    /// Spans sorted longest first
    pub spans: Vec<SequenceSpan>,
    /// Longest sequence in rows, or with sub-sequences the largest number of
    /// sub-sequences in one sequence
    pub max_length: usize,
}

/// Index into `sub` of every boundary in `starts`.
///
/// Boundaries pair up in order: a repeated sequence boundary takes the next
/// equal sub-sequence boundary, so an empty sequence owns the empty
/// sub-sequence at the same row. When `sub` has fewer copies of a value the
/// last match is reused. Both arrays must close at the same row.
pub(crate) fn match_boundaries(starts: &[usize], sub: &[usize]) -> Result<Vec<usize>> {
    let mut matched = Vec::with_capacity(starts.len());
    let mut next = 0;
    for &boundary in starts {
        while sub.get(next).is_some_and(|&s| s < boundary) {
            next += 1;
        }
        let index = if sub.get(next) == Some(&boundary) {
            next += 1;
            next - 1
        } else if next > 0 && sub[next - 1] == boundary {
            next - 1
        } else {
            return Err(EnlaceError::invariant(
                "sub-sequence positions",
                format!("sequence boundary {boundary} is not a sub-sequence boundary"),
            ));
        };
        matched.push(index);
    }
    if starts.last() != sub.last() {
        return Err(EnlaceError::invariant(
            "sub-sequence positions",
            format!(
                "sequences close at row {} but sub-sequences at row {}",
                starts.last().copied().unwrap_or(0),
                sub.last().copied().unwrap_or(0)
            ),
        ));
    }
    Ok(matched)
}

impl SequenceBatch {
    /// Every sequence boundary must also be a sub-sequence boundary.
    ///
    /// Trivially holds when either level is absent.
    pub fn check_boundary_subset(&self) -> Result<()> {
        let (Some(starts), Some(sub)) = (&self.sequence_start_positions, &self.sub_sequence_start_positions)
        else {
            return Ok(());
        };
        match_boundaries(starts, sub).map(|_| ())
    }

    /// Length, start and owning sequence of every finest-level span, longest first.
    pub fn sequence_lengths_and_starts(&self) -> Result<SequenceLayout> {
        let starts = self.sequence_start_positions.as_ref().ok_or_else(|| {
            EnlaceError::precondition("sequence_lengths_and_starts", "batch has no sequence boundaries")
        })?;

        let Some(sub) = &self.sub_sequence_start_positions else {
            let mut spans: Vec<SequenceSpan> = starts
                .lengths()
                .zip(starts.iter())
                .enumerate()
                .map(|(i, (length, &start))| SequenceSpan { length, start, sequence: i, sub_index: i })
                .collect();
            let max_length = spans.iter().map(|s| s.length).max().unwrap_or(0);
            spans.sort_unstable_by(|a, b| b.cmp(a));
            return Ok(SequenceLayout { spans, max_length });
        };

        let matched = match_boundaries(starts, sub)?;
        let mut spans = Vec::with_capacity(sub.num_sequences());
        let mut max_length = 0;
        for (sequence, owned) in matched.windows(2).enumerate() {
            max_length = max_length.max(owned[1] - owned[0]);
            spans.extend((owned[0]..owned[1]).enumerate().map(|(sub_index, j)| SequenceSpan {
                length: sub[j + 1] - sub[j],
                start: sub[j],
                sequence,
                sub_index,
            }));
        }
        spans.sort_unstable_by(|a, b| b.cmp(a));
        Ok(SequenceLayout { spans, max_length })
    }
}

/// Batch sharing `source`'s data whose only boundary level is the former
/// sub-sequence boundaries.
pub fn flatten_sub_sequences(source: &SequenceBatch) -> Result<SequenceBatch> {
    let sub = source.sub_sequence_start_positions.clone().ok_or_else(|| {
        EnlaceError::precondition("flatten_sub_sequences", "batch has no sub-sequence boundaries")
    })?;
    source.check_boundary_subset()?;
    debug!(sub_sequences = sub.num_sequences(), "flatten_sub_sequences");
    let mut flat = source.clone();
    flat.sequence_start_positions = Some(sub);
    flat.sub_sequence_start_positions = None;
    Ok(flat)
}

/// Sequence boundaries counted in sub-sequences rather than rows.
///
/// Entry `i` is the number of sub-sequences before sequence `i`; the last
/// entry is the total number of sub-sequences.
pub fn sub_sequence_counts(source: &SequenceBatch) -> Result<SequencePositions> {
    let (Some(starts), Some(sub)) = (&source.sequence_start_positions, &source.sub_sequence_start_positions)
    else {
        return Err(EnlaceError::precondition(
            "sub_sequence_counts",
            "batch needs both sequence and sub-sequence boundaries",
        ));
    };
    SequencePositions::new(match_boundaries(starts, sub)?)
}
