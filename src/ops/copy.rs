//! Resize-and-copy of row or sequence ranges

use super::layout::match_boundaries;
use crate::batch::SequenceBatch;
use crate::config::CopyOptions;
use crate::device::{self, DeviceId, Stream};
use crate::error::{EnlaceError, Result};
use crate::math::{IdVector, Matrix};
use std::sync::Arc;
use tracing::debug;

/// Copy `src` rows `[start_row, start_row + rows)` into a resized `dst`.
pub(crate) fn copy_matrix_rows(
    dst: &mut Option<Matrix>,
    src: Option<&Matrix>,
    start_row: usize,
    rows: usize,
    device: DeviceId,
    stream: Stream,
) -> Result<()> {
    let Some(src) = src else {
        *dst = None;
        return Ok(());
    };
    Matrix::resize_or_create(dst, rows, src.width(), device)?
        .copy_rows_from(0, src, start_row, rows, stream)
}

fn copy_ids(
    dst: &mut Option<IdVector>,
    src: Option<&IdVector>,
    start: usize,
    len: usize,
    device: DeviceId,
    stream: Stream,
) -> Result<()> {
    let Some(src) = src else {
        *dst = None;
        return Ok(());
    };
    IdVector::resize_or_create(dst, len, device)?.copy_range_from(0, src, start, len, stream)
}

/// Slice rows `[start, start + len)` of a shared per-row list (strings, user data).
fn copy_shared_rows<T: Clone>(
    field: &'static str,
    src: Option<&Arc<Vec<T>>>,
    start: usize,
    len: usize,
) -> Result<Option<Arc<Vec<T>>>> {
    src.map(|items| {
        items.get(start..start + len).map(|s| Arc::new(s.to_vec())).ok_or_else(|| {
            EnlaceError::precondition(
                "resize_and_copy",
                format!("{field} {start}..{} exceed {} items", start + len, items.len()),
            )
        })
    })
    .transpose()
}

/// Copy every row-aligned payload of `src` for rows `[start_row, start_row + rows)`.
fn copy_rows(
    dst: &mut SequenceBatch,
    src: &SequenceBatch,
    start_row: usize,
    rows: usize,
    options: CopyOptions,
) -> Result<()> {
    let device = device::placement(options.use_gpu);
    let stream = options.stream;
    copy_matrix_rows(&mut dst.input, src.input.as_ref(), start_row, rows, device, stream)?;
    copy_matrix_rows(&mut dst.value, src.value.as_ref(), start_row, rows, device, stream)?;
    copy_matrix_rows(&mut dst.grad, src.grad.as_ref(), start_row, rows, device, stream)?;
    copy_ids(&mut dst.ids, src.ids.as_ref(), start_row, rows, device, stream)?;
    dst.strings = copy_shared_rows("strings", src.strings.as_ref(), start_row, rows)?;
    dst.user_data = copy_shared_rows("user data", src.user_data.as_ref(), start_row, rows)?;
    dst.device_id = device;
    Ok(())
}

/// Copy `unit_count` units of `src` starting at unit `start_unit` into `dst`.
///
/// Units are sequences when `src` has sequence boundaries and rows otherwise.
/// The count is clamped to the units remaining after `start_unit`; a start
/// past the end is an error. Returns the number of rows copied.
///
/// Sequence copies rebuild `dst`'s boundaries to start at 0, and carry the
/// matching sub-sequence boundaries along when `src` has them.
pub fn resize_and_copy_range(
    dst: &mut SequenceBatch,
    src: &SequenceBatch,
    start_unit: usize,
    unit_count: usize,
    options: CopyOptions,
) -> Result<usize> {
    dst.data_id = src.data_id;
    dst.frame_height = src.frame_height;
    dst.frame_width = src.frame_width;
    dst.cpu_sequence_dims = None;

    let Some(starts) = src.sequence_start_positions.as_ref() else {
        let total = src.batch_size();
        if start_unit > total {
            return Err(EnlaceError::precondition(
                "resize_and_copy_range",
                format!("start row {start_unit} beyond {total} rows"),
            ));
        }
        let rows = unit_count.min(total - start_unit);
        debug!(start_row = start_unit, rows, "resize_and_copy_range by rows");
        copy_rows(dst, src, start_unit, rows, options)?;
        dst.sequence_start_positions = None;
        dst.sub_sequence_start_positions = None;
        return Ok(rows);
    };

    let total = starts.num_sequences();
    if start_unit > total {
        return Err(EnlaceError::precondition(
            "resize_and_copy_range",
            format!("start sequence {start_unit} beyond {total} sequences"),
        ));
    }
    let count = unit_count.min(total - start_unit);
    let start_row = starts[start_unit];
    let end_row = starts[start_unit + count];
    let rows = end_row - start_row;
    debug!(start_sequence = start_unit, sequences = count, rows, "resize_and_copy_range by sequences");

    copy_rows(dst, src, start_row, rows, options)?;
    dst.sequence_start_positions = Some(starts.rebased_slice(start_unit, count + 1)?);

    dst.sub_sequence_start_positions = match src.sub_sequence_start_positions.as_ref() {
        Some(sub) => {
            let matched = match_boundaries(starts, sub)?;
            let (sub_start, sub_end) = (matched[start_unit], matched[start_unit + count]);
            Some(sub.rebased_slice(sub_start, sub_end - sub_start + 1)?)
        }
        None => None,
    };
    Ok(rows)
}

/// Copy all of `src` into `dst`, reusing `dst`'s buffers when large enough.
pub fn resize_and_copy(dst: &mut SequenceBatch, src: &SequenceBatch, options: CopyOptions) -> Result<()> {
    let units = src.num_sequences();
    resize_and_copy_range(dst, src, 0, units, options)?;
    dst.cpu_sequence_dims =
        src.cpu_sequence_dims.as_ref().map(|dims| IdVector::from_vec(dims.to_vec(), DeviceId::HOST));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    fn host() -> CopyOptions {
        CopyOptions::host()
    }

    /// Five sequences over 12 rows: lengths 2, 3, 1, 4, 2.
    fn five_sequences() -> SequenceBatch {
        let data = (0..12).map(|v| v as f32).collect();
        SequenceBatch::from_value(Matrix::from_vec(12, 1, data, DeviceId::HOST).unwrap())
            .with_sequence_starts(vec![0, 2, 5, 6, 10, 12])
            .unwrap()
            .with_data_id(3)
    }

    #[test]
    fn test_copy_sequence_range() {
        let src = five_sequences();
        let mut dst = SequenceBatch::new();
        let rows = resize_and_copy_range(&mut dst, &src, 1, 2, host()).unwrap();

        assert_eq!(rows, 4);
        assert_eq!(&**dst.sequence_start_positions.as_ref().unwrap(), &[0, 3, 4]);
        assert_eq!(dst.value.as_ref().unwrap().to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(dst.data_id, 3);
        assert!(!dst.value.as_ref().unwrap().shares_memory_with(src.value.as_ref().unwrap()));
        dst.validate().unwrap();
    }

    #[test]
    fn test_copy_clamps_to_remaining_sequences() {
        let src = five_sequences();
        let mut dst = SequenceBatch::new();
        let rows = resize_and_copy_range(&mut dst, &src, 3, 10, host()).unwrap();
        assert_eq!(rows, 6);
        assert_eq!(&**dst.sequence_start_positions.as_ref().unwrap(), &[0, 4, 6]);
    }

    #[test]
    fn test_copy_start_past_end_rejected() {
        let src = five_sequences();
        let mut dst = SequenceBatch::new();
        assert!(matches!(
            resize_and_copy_range(&mut dst, &src, 6, 1, host()),
            Err(EnlaceError::Precondition { .. })
        ));
    }

    #[test]
    fn test_copy_plain_rows() {
        let data = (0..8).map(|v| v as f32).collect();
        let src = SequenceBatch::from_value(Matrix::from_vec(4, 2, data, DeviceId::HOST).unwrap())
            .with_ids(IdVector::from_vec(vec![10, 11, 12, 13], DeviceId::HOST));
        let mut dst = SequenceBatch::new().with_sequence_starts(vec![0, 1]).unwrap();
        let rows = resize_and_copy_range(&mut dst, &src, 1, 2, host()).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(dst.value.as_ref().unwrap().to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(dst.ids.as_ref().unwrap().to_vec(), vec![11, 12]);
        assert!(dst.sequence_start_positions.is_none());
    }

    #[test]
    fn test_copy_carries_sub_sequences() {
        let src = SequenceBatch::from_value(Matrix::zeros(8, 1, DeviceId::HOST))
            .with_sequence_starts(vec![0, 5, 8])
            .unwrap()
            .with_sub_sequence_starts(vec![0, 2, 5, 6, 8])
            .unwrap();
        let mut dst = SequenceBatch::new();
        let rows = resize_and_copy_range(&mut dst, &src, 1, 1, host()).unwrap();
        assert_eq!(rows, 3);
        assert_eq!(&**dst.sub_sequence_start_positions.as_ref().unwrap(), &[0, 1, 3]);
        dst.validate().unwrap();
    }

    #[test]
    fn test_copy_empty_sequence_keeps_its_sub_sequence() {
        let src = SequenceBatch::from_value(Matrix::zeros(5, 1, DeviceId::HOST))
            .with_sequence_starts(vec![0, 3, 3, 5])
            .unwrap()
            .with_sub_sequence_starts(vec![0, 3, 3, 5])
            .unwrap();
        let mut dst = SequenceBatch::new();
        assert_eq!(resize_and_copy_range(&mut dst, &src, 1, 1, host()).unwrap(), 0);
        assert_eq!(&**dst.sub_sequence_start_positions.as_ref().unwrap(), &[0, 0]);
        assert_eq!(dst.num_sub_sequences(), 1);
        dst.validate().unwrap();
    }

    #[test]
    fn test_copy_reuses_destination_buffer() {
        let src = five_sequences();
        let mut dst = SequenceBatch::from_value(Matrix::zeros(20, 1, DeviceId::HOST));
        let before = dst.value.clone().unwrap();
        resize_and_copy_range(&mut dst, &src, 0, 1, host()).unwrap();
        assert!(dst.value.as_ref().unwrap().shares_memory_with(&before));
        assert_eq!(dst.batch_size(), 2);
    }

    #[test]
    fn test_copy_drops_absent_fields() {
        let src = five_sequences();
        let mut dst = SequenceBatch::new().with_grad(Matrix::zeros(3, 1, DeviceId::HOST));
        resize_and_copy_range(&mut dst, &src, 0, 5, host()).unwrap();
        assert!(dst.grad.is_none());
    }

    #[test]
    fn test_copy_slices_user_data() {
        let mut src = SequenceBatch::from_value(Matrix::zeros(4, 1, DeviceId::HOST));
        let items: Vec<Arc<dyn Any + Send + Sync>> =
            (0..4u32).map(|i| Arc::new(i) as Arc<dyn Any + Send + Sync>).collect();
        src.user_data = Some(Arc::new(items));

        let mut dst = SequenceBatch::new();
        let stale: Arc<dyn Any + Send + Sync> = Arc::new(());
        dst.user_data = Some(Arc::new(vec![stale; 9]));
        let rows = resize_and_copy_range(&mut dst, &src, 1, 2, host()).unwrap();

        assert_eq!(rows, 2);
        let copied = dst.user_data.as_ref().unwrap();
        let tags: Vec<u32> = copied.iter().filter_map(|item| item.downcast_ref::<u32>().copied()).collect();
        assert_eq!(tags, vec![1, 2]);
        dst.check_batch_size_consistency().unwrap();

        let mut cleared = SequenceBatch::new();
        cleared.user_data = dst.user_data.clone();
        resize_and_copy(&mut cleared, &five_sequences(), host()).unwrap();
        assert!(cleared.user_data.is_none());
    }

    #[test]
    fn test_copy_whole_batch() {
        let mut src = five_sequences();
        src.strings = Some(Arc::new((0..12).map(|i| format!("t{i}")).collect()));
        src.cpu_sequence_dims = Some(IdVector::from_vec(vec![1, 2, 3, 4, 5], DeviceId::HOST));
        let mut dst = SequenceBatch::new();
        resize_and_copy(&mut dst, &src, host()).unwrap();

        assert_eq!(dst.batch_size(), 12);
        assert_eq!(dst.sequence_start_positions, src.sequence_start_positions);
        assert_eq!(dst.strings.as_ref().unwrap()[11], "t11");
        assert_eq!(dst.cpu_sequence_dims.as_ref().unwrap().to_vec(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_copy_places_on_active_device() {
        let src = five_sequences();
        let mut dst = SequenceBatch::new();
        let _guard = device::DeviceGuard::switch(DeviceId(1));
        resize_and_copy(&mut dst, &src, CopyOptions::new(true, Stream::Id(2))).unwrap();
        assert_eq!(dst.device_id, DeviceId(1));
        assert_eq!(dst.value.as_ref().unwrap().device(), DeviceId(1));
    }
}
