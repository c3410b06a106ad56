//! Fixed-duration block splitting.
//!
//! Cuts a segment's sample matrix into equal-length blocks, the unit stored
//! in the aggregate datasets. A small epsilon is taken off the target
//! duration before converting to samples so that blocks adjoining segment
//! boundaries are not spuriously rejected as too short by downstream length
//! checks.
use ndarray::{s, Array2, Array3};

/// Subtracted from the target block duration before sample conversion.
pub const BLOCK_EPSILON_SECS: f64 = 0.002;

/// A fixed-duration sub-span of a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// `[C, fixed_length]` sample matrix.
    pub samples: Array2<f32>,
    pub segment_name: String,
    pub recording_id: String,
    /// 1-based position within the segment, in emission order.
    pub index: usize,
}

/// Samples per block for a target duration at `sfreq`.
///
/// `floor((duration - epsilon) * sfreq) + 1`: the epsilon-reduced span is
/// boundary-inclusive, so 5.0 s at 256 Hz gives exactly 1280 samples. The
/// value is constant within one splitting run.
pub fn block_samples(block_duration: f64, sfreq: f64) -> usize {
    ((block_duration - BLOCK_EPSILON_SECS) * sfreq).floor() as usize + 1
}

/// Split a segment's samples (`[C, T]`) into fixed-duration blocks.
///
/// Slices start at offset 0 and advance by exactly [`block_samples`];
/// once fewer samples remain the trailing remainder is discarded — no
/// padding, no partial blocks. Blocks are numbered from 1.
pub fn split_blocks(
    data: &Array2<f32>,
    sfreq: f64,
    block_duration: f64,
    segment_name: &str,
    recording_id: &str,
) -> Vec<Block> {
    let len = block_samples(block_duration, sfreq);
    let n_blocks = data.ncols() / len;

    (0..n_blocks)
        .map(|b| Block {
            samples: data.slice(s![.., b * len..(b + 1) * len]).to_owned(),
            segment_name: segment_name.to_string(),
            recording_id: recording_id.to_string(),
            index: b + 1,
        })
        .collect()
}

/// Stack blocks into the `[blocks, channels, samples]` array the aggregate
/// store persists. Blocks must share one shape; an empty slice gives an
/// empty array with zero channels.
pub fn stack_blocks(blocks: &[Block]) -> Array3<f32> {
    let Some(first) = blocks.first() else {
        return Array3::zeros((0, 0, 0));
    };
    let (n_ch, n_t) = first.samples.dim();
    let mut out = Array3::zeros((blocks.len(), n_ch, n_t));
    for (b, block) in blocks.iter().enumerate() {
        out.slice_mut(s![b, .., ..]).assign(&block.samples);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn block_length_at_256_hz() {
        assert_eq!(block_samples(5.0, 256.0), 1280);
        assert_eq!(block_samples(1.0, 100.0), 100);
    }

    #[test]
    fn splits_and_drops_remainder() {
        // 12.3 s at 256 Hz = 3148 full samples → 2 blocks of 1280, 588 dropped.
        let n_t = (12.3_f64 * 256.0).floor() as usize;
        let data = Array2::from_shape_fn((19, n_t), |(_, t)| t as f32);
        let blocks = split_blocks(&data, 256.0, 5.0, "Baseline", "r1");
        assert_eq!(blocks.len(), 2);
        for (i, b) in blocks.iter().enumerate() {
            assert_eq!(b.samples.dim(), (19, 1280));
            assert_eq!(b.index, i + 1);
            assert_eq!(b.segment_name, "Baseline");
        }
    }

    #[test]
    fn blocks_tile_a_prefix_without_gaps() {
        let data = Array2::from_shape_fn((2, 350), |(_, t)| t as f32);
        let blocks = split_blocks(&data, 100.0, 1.0, "s", "r");
        assert_eq!(blocks.len(), 3);
        for (i, b) in blocks.iter().enumerate() {
            assert_eq!(b.samples[[0, 0]], (i * 100) as f32);
            assert_eq!(b.samples[[0, 99]], (i * 100 + 99) as f32);
        }
    }

    #[test]
    fn segment_shorter_than_block_yields_nothing() {
        let data = Array2::zeros((4, 90));
        assert!(split_blocks(&data, 100.0, 1.0, "s", "r").is_empty());
    }

    #[test]
    fn stacked_blocks_preserve_order() {
        let data = Array2::from_shape_fn((2, 300), |(_, t)| t as f32);
        let blocks = split_blocks(&data, 100.0, 1.0, "s", "r");
        let stacked = stack_blocks(&blocks);
        assert_eq!(stacked.dim(), (3, 2, 100));
        assert_eq!(stacked[[2, 0, 0]], 200.0);
    }
}
