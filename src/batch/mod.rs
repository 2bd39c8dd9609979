//! Sequence batch: the unit that flows along one edge of the pipeline
//!
//! A batch carries dense values (and optionally their gradient), ids, text or
//! opaque user data for `batch_size()` rows, plus optional two-level sequence
//! boundaries. Payload handles are shared: cloning a batch never copies
//! buffer memory, but it does start a fresh [`ReadinessGate`] history.

mod payload;
mod positions;

pub use payload::{PayloadRef, TextVector, UserData};
pub use positions::SequencePositions;

use crate::device::DeviceId;
use crate::error::{EnlaceError, Result};
use crate::math::{IdVector, Matrix};
use crate::sync::ReadinessGate;

/// Batched, optionally sequence-structured data exchanged between stages.
#[derive(Debug, Default)]
pub struct SequenceBatch {
    /// Primary values, `batch_size × width`
    pub value: Option<Matrix>,
    /// Integer ids (labels, tokens)
    pub ids: Option<IdVector>,
    /// Gradient of `value`; `None` when this edge needs no gradient
    pub grad: Option<Matrix>,
    /// Alternate dense input
    pub input: Option<Matrix>,
    /// Text items
    pub strings: Option<TextVector>,
    /// Per-row frame height when rows are 2D frames, 0 otherwise
    pub frame_height: usize,
    /// Per-row frame width when rows are 2D frames, 0 otherwise
    pub frame_width: usize,
    /// Sequence boundaries; `None` means every row is its own sequence
    pub sequence_start_positions: Option<SequencePositions>,
    /// Sub-sequence boundaries nested inside the sequence boundaries
    pub sub_sequence_start_positions: Option<SequencePositions>,
    /// Per-sequence dimensions, host only
    pub cpu_sequence_dims: Option<IdVector>,
    /// Pipeline-specific extra data
    pub user_data: Option<UserData>,
    /// Device owning `value` and `grad`
    pub device_id: DeviceId,
    /// Input stream / data provider this batch came from
    pub data_id: i32,
    gate: ReadinessGate,
}

impl Clone for SequenceBatch {
    /// Shares every data field; the copy keeps the registered consumers but
    /// has no value or gradient readiness yet.
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            ids: self.ids.clone(),
            grad: self.grad.clone(),
            input: self.input.clone(),
            strings: self.strings.clone(),
            frame_height: self.frame_height,
            frame_width: self.frame_width,
            sequence_start_positions: self.sequence_start_positions.clone(),
            sub_sequence_start_positions: self.sub_sequence_start_positions.clone(),
            cpu_sequence_dims: self.cpu_sequence_dims.clone(),
            user_data: self.user_data.clone(),
            device_id: self.device_id,
            data_id: self.data_id,
            gate: self.gate.fork(),
        }
    }
}

impl SequenceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch holding dense `value` on its device.
    pub fn from_value(value: Matrix) -> Self {
        Self { device_id: value.device(), value: Some(value), ..Self::default() }
    }

    #[must_use]
    pub fn with_grad(mut self, grad: Matrix) -> Self {
        self.grad = Some(grad);
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: IdVector) -> Self {
        self.ids = Some(ids);
        self
    }

    #[must_use]
    pub fn with_data_id(mut self, data_id: i32) -> Self {
        self.data_id = data_id;
        self
    }

    /// Attach sequence boundaries.
    pub fn with_sequence_starts(mut self, starts: Vec<usize>) -> Result<Self> {
        self.sequence_start_positions = Some(SequencePositions::new(starts)?);
        Ok(self)
    }

    /// Attach sub-sequence boundaries.
    pub fn with_sub_sequence_starts(mut self, starts: Vec<usize>) -> Result<Self> {
        self.sub_sequence_start_positions = Some(SequencePositions::new(starts)?);
        Ok(self)
    }

    /// The payload that defines the row count.
    ///
    /// Checked in the order value, ids, grad, input, user data, strings; the
    /// first present field wins.
    pub fn primary_payload(&self) -> Option<PayloadRef<'_>> {
        self.payloads().into_iter().next()
    }

    /// Every present payload, in row-count priority order.
    pub fn payloads(&self) -> Vec<PayloadRef<'_>> {
        let mut payloads = Vec::new();
        payloads.extend(self.value.as_ref().map(PayloadRef::Dense));
        payloads.extend(self.ids.as_ref().map(PayloadRef::Ids));
        payloads.extend(self.grad.as_ref().map(PayloadRef::Gradient));
        payloads.extend(self.input.as_ref().map(PayloadRef::Input));
        payloads.extend(self.user_data.as_deref().map(PayloadRef::Opaque));
        payloads.extend(self.strings.as_deref().map(|s| PayloadRef::Text(s.as_slice())));
        payloads
    }

    /// Number of rows, 0 when no payload is present.
    pub fn batch_size(&self) -> usize {
        self.primary_payload().map_or(0, |p| p.rows())
    }

    /// Fail when two present payloads disagree on the row count.
    pub fn check_batch_size_consistency(&self) -> Result<()> {
        let payloads = self.payloads();
        let Some(primary) = payloads.first() else {
            return Ok(());
        };
        match payloads.iter().find(|p| p.rows() != primary.rows()) {
            Some(other) => Err(EnlaceError::RowCountMismatch {
                primary: primary.kind(),
                primary_rows: primary.rows(),
                other: other.kind(),
                other_rows: other.rows(),
            }),
            None => Ok(()),
        }
    }

    pub fn num_sequences(&self) -> usize {
        self.sequence_start_positions
            .as_ref()
            .map_or_else(|| self.batch_size(), SequencePositions::num_sequences)
    }

    pub fn num_sub_sequences(&self) -> usize {
        self.sub_sequence_start_positions
            .as_ref()
            .map_or_else(|| self.batch_size(), SequencePositions::num_sequences)
    }

    pub fn has_sub_sequences(&self) -> bool {
        self.sub_sequence_start_positions.is_some()
    }

    /// Finest boundaries available: sub-sequences if present, else sequences.
    pub fn effective_start_positions(&self) -> Result<&SequencePositions> {
        self.sub_sequence_start_positions
            .as_ref()
            .or(self.sequence_start_positions.as_ref())
            .ok_or_else(|| {
                EnlaceError::precondition("effective_start_positions", "batch has no sequence boundaries")
            })
    }

    /// Check boundary closure against the row count and the subset relation.
    pub fn validate(&self) -> Result<()> {
        let rows = self.batch_size();
        if let Some(starts) = &self.sequence_start_positions {
            starts.check_closes_at("sequence positions", rows)?;
        }
        if let Some(starts) = &self.sub_sequence_start_positions {
            starts.check_closes_at("sub-sequence positions", rows)?;
        }
        self.check_boundary_subset()
    }

    pub fn frame_height(&self) -> usize {
        self.frame_height
    }

    pub fn frame_width(&self) -> usize {
        self.frame_width
    }

    pub fn set_frame_height(&mut self, height: usize) {
        self.frame_height = height;
    }

    pub fn set_frame_width(&mut self, width: usize) {
        self.frame_width = width;
    }

    /// Readiness gate guarding `value` and `grad`.
    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    /// See [`ReadinessGate::register_consumer`].
    pub fn register_consumer(&self) {
        self.gate.register_consumer();
    }

    pub fn consumer_count(&self) -> usize {
        self.gate.consumer_count()
    }

    /// See [`ReadinessGate::signal_value_ready`].
    pub fn signal_value_ready(&self) {
        self.gate.signal_value_ready();
    }

    /// See [`ReadinessGate::await_value`].
    pub fn await_value(&self) -> Result<()> {
        self.gate.await_value()
    }

    /// See [`ReadinessGate::signal_grad_contribution`].
    pub fn signal_grad_contribution(&self) -> Result<()> {
        self.gate.signal_grad_contribution()
    }

    /// See [`ReadinessGate::await_grad_complete`].
    pub fn await_grad_complete(&self) -> Result<()> {
        self.gate.await_grad_complete()
    }
}
