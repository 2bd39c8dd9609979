//! Reductions across batches that may live on different devices

use crate::batch::SequenceBatch;
use crate::device::DeviceGuard;
use crate::math::Real;

/// Sum of every element of every batch's `value`.
///
/// Each batch is reduced with its own device active; the caller's device is
/// restored afterwards. Batches without a value contribute nothing.
pub fn sum_costs(batches: &[SequenceBatch]) -> Real {
    batches
        .iter()
        .filter_map(|batch| {
            let value = batch.value.as_ref()?;
            let _device = DeviceGuard::switch(batch.device_id);
            Some(value.sum())
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{self, DeviceId};
    use crate::math::Matrix;
    use approx::assert_relative_eq;

    #[test]
    fn test_sum_costs() {
        let a = SequenceBatch::from_value(Matrix::from_vec(2, 1, vec![1.5, 2.5], DeviceId::HOST).unwrap());
        let b = SequenceBatch::from_value(Matrix::from_vec(1, 2, vec![0.25, 0.75], DeviceId(1)).unwrap());
        let empty = SequenceBatch::new();
        assert_relative_eq!(sum_costs(&[a, empty, b]), 5.0);
    }

    #[test]
    fn test_sum_costs_restores_device() {
        let _outer = DeviceGuard::switch(DeviceId(3));
        let batch = SequenceBatch::from_value(Matrix::zeros(2, 2, DeviceId(0)));
        assert_relative_eq!(sum_costs(&[batch, SequenceBatch::new()]), 0.0);
        assert_eq!(device::current(), DeviceId(3));
    }

    #[test]
    fn test_sum_costs_empty() {
        assert_relative_eq!(sum_costs(&[]), 0.0);
    }
}
