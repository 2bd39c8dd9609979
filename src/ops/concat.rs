//! Concatenation of several batches into one

use super::{all_or_none, Pass};
use crate::batch::{SequenceBatch, SequencePositions};
use crate::config::CopyOptions;
use crate::device::{self, DeviceId, Stream};
use crate::error::{EnlaceError, Result};
use crate::math::{IdVector, Matrix};
use std::sync::Arc;
use tracing::debug;

/// `(part index, source row, destination row, rows)` copy plan shared by both concatenations.
type CopyPlan = Vec<(usize, usize, usize, usize)>;

#[allow(clippy::too_many_arguments)]
fn stack_matrices(
    operation: &'static str,
    field: &'static str,
    dst: &mut Option<Matrix>,
    parts: &[SequenceBatch],
    get: impl Fn(&SequenceBatch) -> Option<&Matrix>,
    plan: &CopyPlan,
    rows: usize,
    device: DeviceId,
    stream: Stream,
) -> Result<()> {
    let Some(sources) = all_or_none(operation, field, parts, get)? else {
        *dst = None;
        return Ok(());
    };
    let out = Matrix::resize_or_create(dst, rows, sources[0].width(), device)?;
    for &(part, src_row, dst_row, count) in plan {
        out.copy_rows_from(dst_row, sources[part], src_row, count, stream)?;
    }
    Ok(())
}

fn stack_ids(
    operation: &'static str,
    dst: &mut Option<IdVector>,
    parts: &[SequenceBatch],
    plan: &CopyPlan,
    rows: usize,
    device: DeviceId,
    stream: Stream,
) -> Result<()> {
    let Some(sources) = all_or_none(operation, "ids", parts, |b| b.ids.as_ref())? else {
        *dst = None;
        return Ok(());
    };
    let out = IdVector::resize_or_create(dst, rows, device)?;
    for &(part, src_row, dst_row, count) in plan {
        out.copy_range_from(dst_row, sources[part], src_row, count, stream)?;
    }
    Ok(())
}

/// Gather plan rows of a shared per-row list (strings, user data) from every part.
fn stack_shared_rows<'a, T: Clone + 'a>(
    operation: &'static str,
    field: &'static str,
    parts: &'a [SequenceBatch],
    get: impl Fn(&'a SequenceBatch) -> Option<&'a Vec<T>>,
    plan: &CopyPlan,
) -> Result<Option<Arc<Vec<T>>>> {
    let Some(sources) = all_or_none(operation, field, parts, get)? else {
        return Ok(None);
    };
    let mut out = Vec::new();
    for &(part, src_row, _, count) in plan {
        let rows = sources[part].get(src_row..src_row + count).ok_or_else(|| {
            EnlaceError::precondition(operation, format!("{field} of part {part} too short"))
        })?;
        out.extend_from_slice(rows);
    }
    Ok(Some(Arc::new(out)))
}

/// Write every row-aligned payload of `parts` into `dst` following `plan`.
fn stack_payloads(
    operation: &'static str,
    dst: &mut SequenceBatch,
    parts: &[SequenceBatch],
    plan: &CopyPlan,
    rows: usize,
    options: CopyOptions,
    pass: Pass,
) -> Result<()> {
    let device = device::placement(options.use_gpu);
    let stream = options.stream;
    stack_matrices(operation, "input", &mut dst.input, parts, |b| b.input.as_ref(), plan, rows, device, stream)?;
    stack_matrices(operation, "value", &mut dst.value, parts, |b| b.value.as_ref(), plan, rows, device, stream)?;
    if pass.needs_gradient() {
        stack_matrices(operation, "grad", &mut dst.grad, parts, |b| b.grad.as_ref(), plan, rows, device, stream)?;
    } else {
        dst.grad = None;
    }
    stack_ids(operation, &mut dst.ids, parts, plan, rows, device, stream)?;
    dst.strings = stack_shared_rows(operation, "strings", parts, |b| b.strings.as_deref(), plan)?;
    dst.user_data = stack_shared_rows(operation, "user data", parts, |b| b.user_data.as_deref(), plan)?;
    dst.device_id = device;
    dst.data_id = parts[0].data_id;
    dst.frame_height = parts[0].frame_height;
    dst.frame_width = parts[0].frame_width;
    dst.cpu_sequence_dims = None;
    Ok(())
}

/// Build `dst` from one selected row per part: row `i` of the result is row
/// `selected_rows[i]` of `parts[i]`.
///
/// Used to assemble a batch of single frames taken from many sequences.
/// `sequence_starts` becomes the result's boundaries and must close at
/// `selected_rows.len()`. Gradients are copied only when `pass` needs them.
pub fn concat_selected_rows(
    dst: &mut SequenceBatch,
    parts: &[SequenceBatch],
    selected_rows: &[usize],
    sequence_starts: &[usize],
    options: CopyOptions,
    pass: Pass,
) -> Result<()> {
    const OP: &str = "concat_selected_rows";
    if parts.is_empty() || parts.len() != selected_rows.len() {
        return Err(EnlaceError::precondition(
            OP,
            format!("{} parts but {} selected rows", parts.len(), selected_rows.len()),
        ));
    }
    if parts.iter().any(SequenceBatch::has_sub_sequences) {
        return Err(EnlaceError::precondition(OP, "parts with sub-sequences cannot be row-selected"));
    }
    let rows = selected_rows.len();
    debug!(parts = parts.len(), rows, ?pass, "concat_selected_rows");

    let starts = SequencePositions::new(sequence_starts.to_vec())?;
    starts.check_closes_at("concatenated sequence positions", rows)?;

    let plan: CopyPlan = selected_rows.iter().enumerate().map(|(i, &row)| (i, row, i, 1)).collect();
    stack_payloads(OP, dst, parts, &plan, rows, options, pass)?;
    dst.sequence_start_positions = Some(starts);
    dst.sub_sequence_start_positions = None;
    Ok(())
}

/// Join boundaries of consecutive parts, shifting each by the rows before it.
fn join_positions(
    field: &'static str,
    parts: &[SequenceBatch],
    get: impl Fn(&SequenceBatch) -> Option<&SequencePositions>,
) -> Result<Option<SequencePositions>> {
    let Some(sources) = all_or_none("concat", field, parts, get)? else {
        return Ok(None);
    };
    let mut joined = vec![0];
    let mut offset = 0;
    for (positions, part) in sources.iter().zip(parts) {
        joined.extend(positions[1..].iter().map(|p| p + offset));
        offset += part.batch_size();
    }
    SequencePositions::new(joined).map(Some)
}

/// Concatenate whole batches end to end into `dst`.
///
/// Every part must carry the same `data_id`. Sequence and sub-sequence
/// boundaries are joined when all parts have them. Gradients are copied
/// only when `pass` needs them.
pub fn concat(dst: &mut SequenceBatch, parts: &[SequenceBatch], options: CopyOptions, pass: Pass) -> Result<()> {
    const OP: &str = "concat";
    let Some(first) = parts.first() else {
        return Err(EnlaceError::precondition(OP, "no parts to concatenate"));
    };
    if let Some(other) = parts.iter().find(|p| p.data_id != first.data_id) {
        return Err(EnlaceError::precondition(
            OP,
            format!("parts mix data ids {} and {}", first.data_id, other.data_id),
        ));
    }

    let mut plan = CopyPlan::with_capacity(parts.len());
    let mut rows = 0;
    for (i, part) in parts.iter().enumerate() {
        let size = part.batch_size();
        plan.push((i, 0, rows, size));
        rows += size;
    }
    debug!(parts = parts.len(), rows, ?pass, "concat");

    stack_payloads(OP, dst, parts, &plan, rows, options, pass)?;
    dst.sequence_start_positions =
        join_positions("sequence positions", parts, |b| b.sequence_start_positions.as_ref())?;
    dst.sub_sequence_start_positions =
        join_positions("sub-sequence positions", parts, |b| b.sub_sequence_start_positions.as_ref())?;
    Ok(())
}
