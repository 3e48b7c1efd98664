//! Index-stride reduction of profile rows for interactive rendering.
//!
//! This only bounds the number of drawn points. Statistics that claim to
//! describe the full-resolution signal must not be computed from its output
//! unless that trade-off is chosen explicitly (see [`crate::RangeBasis`]).

pub const DEFAULT_STRIDE: usize = 10;

/// Keep the records at positions `0, stride, 2 * stride, ...`.
///
/// A zero stride is treated as 1.
pub fn downsample<T: Clone>(records: &[T], stride: usize) -> Vec<T> {
    records.iter().step_by(stride.max(1)).cloned().collect()
}

/// Length of [`downsample`]'s output for `len` input records.
pub fn downsampled_len(len: usize, stride: usize) -> usize {
    len.div_ceil(stride.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_every_kth_index_starting_at_zero() {
        let input: Vec<usize> = (0..205).collect();
        let out = downsample(&input, 10);
        assert_eq!(out.len(), 21);
        assert_eq!(out.first(), Some(&0));
        assert_eq!(out.last(), Some(&200));
        assert!(out.iter().all(|i| i % 10 == 0));
    }

    #[test]
    fn length_boundaries() {
        let k = 10;
        for n in [1usize, k, k + 1] {
            let input: Vec<usize> = (0..n).collect();
            let out = downsample(&input, k);
            assert_eq!(out.len(), downsampled_len(n, k), "n = {n}");
            assert_eq!(out[0], 0);
        }
        assert_eq!(downsampled_len(1, k), 1);
        assert_eq!(downsampled_len(k, k), 1);
        assert_eq!(downsampled_len(k + 1, k), 2);
        assert_eq!(downsampled_len(0, k), 0);
    }

    #[test]
    fn stride_one_is_identity_on_downsampled_output() {
        let input: Vec<u32> = (0..57).collect();
        let once = downsample(&input, 7);
        assert_eq!(downsample(&once, 1), once);
        assert_eq!(downsample(&input, 7), once);
    }

    #[test]
    fn zero_stride_behaves_like_one() {
        let input = vec!['a', 'b', 'c'];
        assert_eq!(downsample(&input, 0), input);
    }

    #[test]
    fn empty_input_stays_empty() {
        let input: Vec<f64> = Vec::new();
        assert!(downsample(&input, 10).is_empty());
    }
}
