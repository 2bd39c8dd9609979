//! Grouping batches by originating data stream

use crate::batch::SequenceBatch;
use std::collections::HashMap;
use tracing::trace;

/// Indices of `batches` grouped by `data_id`.
///
/// Groups appear in the order their id is first seen; indices within a group
/// keep input order.
pub fn group_indices_by_data_id(batches: &[SequenceBatch]) -> Vec<Vec<usize>> {
    let mut slot_of: HashMap<i32, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (index, batch) in batches.iter().enumerate() {
        let slot = *slot_of.entry(batch.data_id).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(index);
    }
    trace!(batches = batches.len(), groups = groups.len(), "grouped by data id");
    groups
}

/// Split `batches` into one list per `data_id`, sharing payload storage.
pub fn split_by_data_id(batches: &[SequenceBatch]) -> Vec<Vec<SequenceBatch>> {
    group_indices_by_data_id(batches)
        .into_iter()
        .map(|group| group.into_iter().map(|i| batches[i].clone()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use crate::math::Matrix;

    fn tagged(ids: &[i32]) -> Vec<SequenceBatch> {
        ids.iter()
            .map(|&id| SequenceBatch::from_value(Matrix::zeros(1, 1, DeviceId::HOST)).with_data_id(id))
            .collect()
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let batches = tagged(&[0, 1, 0, 2, 1]);
        assert_eq!(group_indices_by_data_id(&batches), vec![vec![0, 2], vec![1, 4], vec![3]]);
    }

    #[test]
    fn test_split_shares_payloads() {
        let batches = tagged(&[5, 7, 5]);
        let groups = split_by_data_id(&batches);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert!(groups[0].iter().all(|b| b.data_id == 5));
        assert!(groups[0][1].value.as_ref().unwrap().shares_memory_with(batches[2].value.as_ref().unwrap()));
    }

    #[test]
    fn test_empty_input() {
        assert!(group_indices_by_data_id(&[]).is_empty());
        assert!(split_by_data_id(&[]).is_empty());
    }
}
