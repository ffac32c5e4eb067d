//! Per-offset correlation kernels
//!
//! A candidate offset `d` (primary samples) shifts every primary sample by
//! `d * primary.timescale` and looks up the secondary sample covering the
//! shifted instant. Times are expressed in the secondary's local frame
//! (secondary trigger phase removed), so `target >= 0` means "at or after the
//! first secondary sample".
//!
//! Both kernels return the mean product over matched pairs, or NaN when no
//! pair matched.

use contracts::{SparseWaveform, UniformWaveform};

/// Packed kernel arguments for a uniform/uniform job
///
/// Laid out for upload as a device push-constant block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossCorrelateArgs {
    pub primary_timescale: i64,
    pub secondary_timescale: i64,
    pub primary_trigger_phase: i64,
    pub secondary_trigger_phase: i64,
    pub primary_len: u64,
    pub secondary_len: u64,
    /// Offset evaluated by output index 0
    pub starting_offset: i64,
}

impl CrossCorrelateArgs {
    pub fn new(primary: &UniformWaveform, secondary: &UniformWaveform, starting_offset: i64) -> Self {
        Self {
            primary_timescale: primary.timescale(),
            secondary_timescale: secondary.timescale(),
            primary_trigger_phase: primary.trigger_phase(),
            secondary_trigger_phase: secondary.trigger_phase(),
            primary_len: primary.len() as u64,
            secondary_len: secondary.len() as u64,
            starting_offset,
        }
    }

    /// Offset evaluated by output slot `index`
    #[inline]
    pub fn offset_for(&self, index: usize) -> i64 {
        self.starting_offset + index as i64
    }

    /// Shift applied to primary sample times for `offset`
    #[inline]
    fn delta_fs(&self, offset: i64) -> i64 {
        offset * self.primary_timescale + (self.primary_trigger_phase - self.secondary_trigger_phase)
    }
}

#[inline]
fn normalize(sum: f64, matched: u64) -> f64 {
    if matched == 0 {
        f64::NAN
    } else {
        sum / matched as f64
    }
}

/// Score one offset for a uniform/uniform pair
///
/// `primary` and `secondary` must be the buffers described by `args`.
pub fn uniform_score(args: &CrossCorrelateArgs, primary: &[f32], secondary: &[f32], offset: i64) -> f64 {
    let delta = args.delta_fs(offset);

    // first primary sample whose target is non-negative
    let first = if delta >= 0 {
        0
    } else {
        let n = -delta;
        ((n + args.primary_timescale - 1) / args.primary_timescale) as usize
    };

    let mut sum = 0.0f64;
    let mut matched = 0u64;
    for (i, &p) in primary.iter().enumerate().skip(first) {
        let target = i as i64 * args.primary_timescale + delta;
        let j = (target / args.secondary_timescale) as usize;
        if j >= secondary.len() {
            break;
        }
        sum += f64::from(p) * f64::from(secondary[j]);
        matched += 1;
    }
    normalize(sum, matched)
}

/// Score one offset for a sparse/sparse pair
///
/// Walks the secondary with a monotonic cursor that only moves past a sample
/// once it ends strictly before the target, so a target on a boundary still
/// matches the sample ending there.
pub fn sparse_score(primary: &SparseWaveform, secondary: &SparseWaveform, offset: i64) -> f64 {
    let pri_ts = primary.timescale();
    let sec_ts = secondary.timescale();
    let delta = offset * pri_ts + (primary.trigger_phase() - secondary.trigger_phase());

    let sec_offsets = secondary.offsets();
    let sec_durations = secondary.durations();
    let sec_samples = secondary.samples();
    let local_start = |k: usize| sec_offsets[k] * sec_ts;
    let local_end = |k: usize| (sec_offsets[k] + sec_durations[k]) * sec_ts;

    let mut cursor = 0usize;
    let mut sum = 0.0f64;
    let mut matched = 0u64;

    for (&pri_offset, &p) in primary.offsets().iter().zip(primary.samples()) {
        let target = pri_offset * pri_ts + delta;
        if target < 0 {
            continue;
        }

        while cursor < sec_samples.len() && local_end(cursor) < target {
            cursor += 1;
        }
        if cursor == sec_samples.len() {
            break;
        }

        let j = if local_start(cursor) > target {
            // gap: use the last sample that ended before target
            match cursor.checked_sub(1) {
                Some(prev) => prev,
                None => continue,
            }
        } else {
            cursor
        };

        sum += f64::from(p) * f64::from(sec_samples[j]);
        matched += 1;
    }
    normalize(sum, matched)
}
