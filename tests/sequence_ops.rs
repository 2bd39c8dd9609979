//! End-to-end batch operation flows.

use enlace::ops::{self, SubRange};
use enlace::{CopyOptions, DeviceId, EnlaceConfig, IdVector, Matrix, Pass, SequenceBatch};
use proptest::prelude::*;

fn sequential(rows: usize, width: usize) -> Matrix {
    let data = (0..rows * width).map(|v| v as f32).collect();
    Matrix::from_vec(rows, width, data, DeviceId::HOST).unwrap()
}

fn batch(starts: Vec<usize>, width: usize) -> SequenceBatch {
    let rows = *starts.last().unwrap();
    SequenceBatch::from_value(sequential(rows, width))
        .with_ids(IdVector::from_vec((0..rows as i32).collect(), DeviceId::HOST))
        .with_sequence_starts(starts)
        .unwrap()
}

#[test]
fn test_boundary_counts_match_rows() {
    let b = batch(vec![0, 3, 4, 9], 2);
    b.validate().unwrap();
    assert_eq!(b.num_sequences(), 3);
    let starts = b.sequence_start_positions.as_ref().unwrap();
    assert_eq!(starts.first(), Some(&0));
    assert_eq!(starts.last(), Some(&b.batch_size()));
}

#[test]
fn test_sub_range_aliases_and_rebases() {
    let source = batch(vec![0, 2, 5, 7, 10], 3);
    let range = SubRange::rows(2, 3, 3).with_sequence_positions(1, 2);
    let sub = ops::sub_range_from(&source, &range).unwrap();

    assert_eq!(&**sub.sequence_start_positions.as_ref().unwrap(), &[0, 3]);
    sub.value.as_ref().unwrap().fill(0.0);
    let src_value = source.value.as_ref().unwrap();
    assert_eq!(src_value.get(1, 2), Some(5.0));
    assert_eq!(src_value.get(2, 0), Some(0.0));
    assert_eq!(src_value.get(4, 2), Some(0.0));
    assert_eq!(src_value.get(5, 0), Some(15.0));
}

#[test]
fn test_copy_two_sequences_then_concat_back() {
    let source = batch(vec![0, 2, 5, 6, 10, 12], 1);
    let options = CopyOptions::host();

    let mut head = SequenceBatch::new();
    let mut tail = SequenceBatch::new();
    assert_eq!(ops::resize_and_copy_range(&mut head, &source, 0, 1, options).unwrap(), 2);
    assert_eq!(ops::resize_and_copy_range(&mut tail, &source, 1, 4, options).unwrap(), 10);
    assert_eq!(&**tail.sequence_start_positions.as_ref().unwrap(), &[0, 3, 4, 8, 10]);

    let mut joined = SequenceBatch::new();
    ops::concat(&mut joined, &[head, tail], options, Pass::Test).unwrap();
    assert_eq!(joined.sequence_start_positions, source.sequence_start_positions);
    assert_eq!(joined.value.as_ref().unwrap().to_vec(), source.value.as_ref().unwrap().to_vec());
    assert_eq!(joined.ids.as_ref().unwrap().to_vec(), source.ids.as_ref().unwrap().to_vec());
}

#[test]
fn test_split_then_concat_each_group() {
    let batches: Vec<SequenceBatch> =
        [0, 1, 0, 2, 1].iter().map(|&id| batch(vec![0, 2], 1).with_data_id(id)).collect();
    assert_eq!(ops::group_indices_by_data_id(&batches), vec![vec![0, 2], vec![1, 4], vec![3]]);

    let groups = ops::split_by_data_id(&batches);
    let sizes: Vec<usize> = groups
        .iter()
        .map(|group| {
            let mut merged = SequenceBatch::new();
            ops::concat(&mut merged, group, CopyOptions::host(), Pass::Train).unwrap();
            merged.validate().unwrap();
            merged.num_sequences()
        })
        .collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[test]
fn test_flatten_nested_batch() {
    let nested = batch(vec![0, 5, 8], 1).with_sub_sequence_starts(vec![0, 2, 5, 8]).unwrap();
    nested.validate().unwrap();
    let flat = ops::flatten_sub_sequences(&nested).unwrap();
    assert_eq!(&**flat.sequence_start_positions.as_ref().unwrap(), &[0, 2, 5, 8]);
    assert!(flat.sub_sequence_start_positions.is_none());
    assert_eq!(&*ops::sub_sequence_counts(&nested).unwrap(), &[0, 2, 3]);
}

#[test]
fn test_broken_subset_rejected() {
    let nested = batch(vec![0, 5, 8], 1).with_sub_sequence_starts(vec![0, 2, 8]).unwrap();
    assert!(nested.validate().is_err());
    assert!(ops::flatten_sub_sequences(&nested).is_err());
    assert!(nested.sequence_lengths_and_starts().is_err());
}

#[test]
fn test_last_frame_of_each_sequence() {
    let source = batch(vec![0, 2, 5, 6], 2);
    let starts = source.sequence_start_positions.clone().unwrap();
    let parts: Vec<SequenceBatch> = (0..starts.num_sequences())
        .map(|i| {
            let range = starts.range(i).unwrap();
            let rows = range.len();
            ops::sub_range_from(&source, &SubRange::rows(range.start, rows, 2)).unwrap()
        })
        .collect();
    let last_rows: Vec<usize> = parts.iter().map(|p| p.batch_size() - 1).collect();

    let mut frames = SequenceBatch::new();
    ops::concat_selected_rows(&mut frames, &parts, &last_rows, &[0, 3], CopyOptions::host(), Pass::Test)
        .unwrap();
    assert_eq!(frames.value.as_ref().unwrap().to_vec(), vec![2.0, 3.0, 8.0, 9.0, 10.0, 11.0]);
    assert_eq!(frames.ids.as_ref().unwrap().to_vec(), vec![1, 4, 5]);
}

#[test]
fn test_copy_options_follow_process_defaults() {
    let config = EnlaceConfig::from_yaml_str("use_gpu: false\nstream: default\n").unwrap();
    enlace::config::set_defaults(config).unwrap();
    let options = CopyOptions::default();
    assert!(!options.use_gpu);

    let mut dst = SequenceBatch::new();
    ops::resize_and_copy(&mut dst, &batch(vec![0, 1], 1), options).unwrap();
    assert!(dst.device_id.is_host());
}

fn lengths() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..5, 1..10)
}

fn starts_from(lengths: &[usize]) -> Vec<usize> {
    let mut starts = vec![0];
    for len in lengths {
        starts.push(starts.last().copied().unwrap_or(0) + len);
    }
    starts
}

proptest! {
    #[test]
    fn prop_copied_range_is_self_consistent(lens in lengths(), start in 0usize..10, count in 0usize..10) {
        let source = batch(starts_from(&lens), 2);
        let mut dst = SequenceBatch::new();
        let result = ops::resize_and_copy_range(&mut dst, &source, start, count, CopyOptions::host());
        if start > lens.len() {
            prop_assert!(result.is_err());
        } else {
            let rows = result.unwrap();
            let expected: usize = lens.iter().skip(start).take(count).sum();
            prop_assert_eq!(rows, expected);
            prop_assert_eq!(dst.batch_size(), rows);
            prop_assert_eq!(dst.num_sequences(), count.min(lens.len() - start));
            prop_assert!(dst.validate().is_ok());
        }
    }

    #[test]
    fn prop_layout_lengths_sum_to_rows(lens in lengths()) {
        let source = batch(starts_from(&lens), 1);
        let layout = source.sequence_lengths_and_starts().unwrap();
        prop_assert_eq!(layout.spans.iter().map(|s| s.length).sum::<usize>(), source.batch_size());
        prop_assert_eq!(layout.max_length, lens.iter().copied().max().unwrap_or(0));
    }
}
