// Time warping
// Proportional stretching and anchor-based alignment of voice timelines

use super::timeline::VoiceTimeline;
use super::VoiceError;

/// Round `value * numerator / denominator` to the nearest integer
fn scale_rounded(value: u64, numerator: u64, denominator: u64) -> u64 {
    let value = value as u128 * numerator as u128;
    let denominator = denominator as u128;
    ((value + denominator / 2) / denominator) as u64
}

impl VoiceTimeline {
    /// Rescale every duration so the timeline lasts `total_ms`
    ///
    /// Each item keeps its share of the total. Item ends are rounded on the
    /// cumulative time, so the rounded durations always sum to `total_ms`.
    /// The start position is kept.
    pub fn set_total_duration(&mut self, total_ms: u64) -> Result<(), VoiceError> {
        let old_total = self.duration_ms();
        if total_ms == 0 || old_total == 0 {
            return Err(VoiceError::ZeroDuration);
        }

        let start = self.start_ms();
        let mut elapsed = 0;
        let mut previous_end = 0;

        for item in &mut self.items {
            elapsed += item.duration_ms;
            let end = scale_rounded(elapsed, total_ms, old_total);
            item.duration_ms = end - previous_end;
            previous_end = end;
        }

        self.reposition(start);
        log::debug!(
            "Stretched voice from {} ms to {} ms",
            old_total,
            total_ms
        );
        Ok(())
    }

    /// Move the item at `target` to `position_ms`, keeping both anchors fixed
    ///
    /// `anchor2 == len` anchors the end of the final item. Items between
    /// `anchor1` and `target` are scaled into the new space before the target,
    /// items between `target` and `anchor2` into the space after it; their
    /// durations are re-derived from the new positions.
    pub fn align(
        &mut self,
        anchor1: usize,
        target: usize,
        anchor2: usize,
        position_ms: u64,
    ) -> Result<(), VoiceError> {
        let len = self.items.len();
        if !(anchor1 < target && target < anchor2) {
            return Err(VoiceError::AnchorOrder {
                anchor1,
                target,
                anchor2,
            });
        }
        if target >= len {
            return Err(VoiceError::IndexOutOfRange { index: target, len });
        }
        if anchor2 > len {
            return Err(VoiceError::IndexOutOfRange {
                index: anchor2,
                len,
            });
        }

        // Item boundaries, with the end of the final item at index `len`
        let mut bounds: Vec<u64> = self.items.iter().map(|item| item.position_ms).collect();
        bounds.push(self.end_ms());

        let lower = bounds[anchor1];
        let upper = bounds[anchor2];
        let old = bounds[target];

        if position_ms <= lower || position_ms >= upper {
            return Err(VoiceError::TargetOutOfBounds {
                position_ms,
                lower,
                upper,
            });
        }
        if old == lower || old == upper {
            return Err(VoiceError::ZeroDuration);
        }

        let before = (position_ms - lower) as f64 / (old - lower) as f64;
        for bound in &mut bounds[anchor1 + 1..target] {
            *bound = lower + ((*bound - lower) as f64 * before).round() as u64;
        }

        let after = (upper - position_ms) as f64 / (upper - old) as f64;
        for bound in &mut bounds[target + 1..anchor2] {
            *bound = position_ms + ((*bound - old) as f64 * after).round() as u64;
        }

        bounds[target] = position_ms;

        for index in anchor1..anchor2 {
            let item = &mut self.items[index];
            item.position_ms = bounds[index];
            item.duration_ms = bounds[index + 1] - bounds[index];
        }

        Ok(())
    }
}
