// Pitch and dynamics transforms
// Transposition, stepwise glissandi and velocity shaping over index ranges

use super::timeline::VoiceTimeline;
use super::VoiceError;

impl VoiceTimeline {
    /// Add `interval` semitones to every chord in `start..end`
    ///
    /// Pitches are clamped to 0..=127. Rests are skipped.
    pub fn transpose(&mut self, start: usize, end: usize, interval: i32) -> Result<(), VoiceError> {
        self.check_range(start, end)?;
        for item in &mut self.items[start..end] {
            if let Some(content) = item.content_mut() {
                content.transpose(interval);
            }
        }
        Ok(())
    }

    /// Transpose `start..end` by a linearly growing interval
    ///
    /// The item at offset `k` from `start` is transposed by
    /// `round((k + 1) * total_interval / (end - start))`, so the final item of
    /// the range moves by exactly `total_interval`. Each step is rounded on
    /// its own; rounding error is not carried forward.
    pub fn stepwise_gliss(
        &mut self,
        start: usize,
        end: usize,
        total_interval: i32,
    ) -> Result<(), VoiceError> {
        self.check_range(start, end)?;
        let increment = total_interval as f64 / (end - start) as f64;

        for (step, item) in self.items[start..end].iter_mut().enumerate() {
            let interval = ((step + 1) as f64 * increment).round() as i32;
            if let Some(content) = item.content_mut() {
                content.transpose(interval);
            }
        }
        Ok(())
    }

    /// Multiply every velocity in `start..end` by `factor`
    ///
    /// Velocities are clamped to 1..=127.
    pub fn adjust_velocities(
        &mut self,
        start: usize,
        end: usize,
        factor: f64,
    ) -> Result<(), VoiceError> {
        self.check_range(start, end)?;
        if !(factor.is_finite() && factor >= 0.0) {
            return Err(VoiceError::Factor(factor));
        }
        for item in &mut self.items[start..end] {
            if let Some(content) = item.content_mut() {
                content.scale_velocities(factor);
            }
        }
        Ok(())
    }

    /// Scale velocities in `start..end` by a factor moving linearly from
    /// `start_factor` (first item) to `end_factor` (last item)
    pub fn adjust_velocities_hairpin(
        &mut self,
        start: usize,
        end: usize,
        start_factor: f64,
        end_factor: f64,
    ) -> Result<(), VoiceError> {
        self.check_range(start, end)?;
        for factor in [start_factor, end_factor] {
            if !(factor.is_finite() && factor >= 0.0) {
                return Err(VoiceError::Factor(factor));
            }
        }

        let steps = (end - start - 1).max(1) as f64;
        for (step, item) in self.items[start..end].iter_mut().enumerate() {
            let factor = start_factor + (end_factor - start_factor) * step as f64 / steps;
            if let Some(content) = item.content_mut() {
                content.scale_velocities(factor);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::item::{ChordContent, DurationItem};
    use crate::voice::timeline::tests::{lowest_pitches, timeline_of};

    fn velocities(timeline: &VoiceTimeline) -> Vec<u8> {
        timeline
            .iter()
            .filter_map(|item| item.content().map(|content| content.velocities[0]))
            .collect()
    }

    #[test]
    fn test_transpose_range_only() {
        let mut timeline = timeline_of(&[10, 10, 10, 10]);
        timeline.transpose(1, 3, 12).unwrap();

        assert_eq!(
            lowest_pitches(&timeline),
            vec![Some(60), Some(73), Some(74), Some(63)]
        );
    }

    #[test]
    fn test_transpose_round_trip() {
        let mut timeline = timeline_of(&[10, 10, 10]);
        let original = timeline.clone();

        timeline.transpose(0, 3, 7).unwrap();
        timeline.transpose(0, 3, -7).unwrap();
        assert_eq!(timeline, original);
    }

    #[test]
    fn test_transpose_clamps_without_error() {
        let mut timeline = VoiceTimeline::from_items(
            0,
            vec![
                DurationItem::chord(ChordContent::new(vec![120, 125], 80), 10),
                DurationItem::rest(10),
            ],
        )
        .unwrap();

        timeline.transpose(0, 2, 10).unwrap();
        assert_eq!(timeline.get(0).unwrap().content().unwrap().pitches, vec![127, 127]);

        timeline.transpose(0, 2, -200).unwrap();
        assert_eq!(timeline.get(0).unwrap().content().unwrap().pitches, vec![0, 0]);
        assert!(timeline.get(1).unwrap().is_rest());
    }

    #[test]
    fn test_transpose_rejects_bad_range() {
        let mut timeline = timeline_of(&[10, 10]);
        assert_eq!(
            timeline.transpose(1, 1, 2),
            Err(VoiceError::EmptyRange { start: 1, end: 1 })
        );
        assert!(matches!(
            timeline.transpose(0, 3, 2),
            Err(VoiceError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_stepwise_gliss() {
        let mut timeline = VoiceTimeline::from_items(
            0,
            (0..4)
                .map(|_| DurationItem::chord(ChordContent::new(vec![60], 80), 10))
                .collect(),
        )
        .unwrap();

        timeline.stepwise_gliss(0, 4, 6).unwrap();

        // Increments of 1.5: round(1.5), round(3), round(4.5), round(6)
        assert_eq!(
            lowest_pitches(&timeline),
            vec![Some(62), Some(63), Some(65), Some(66)]
        );
    }

    #[test]
    fn test_stepwise_gliss_downward() {
        let mut timeline = VoiceTimeline::from_items(
            0,
            (0..3)
                .map(|_| DurationItem::chord(ChordContent::new(vec![60], 80), 10))
                .collect(),
        )
        .unwrap();

        timeline.stepwise_gliss(0, 3, -3).unwrap();
        assert_eq!(
            lowest_pitches(&timeline),
            vec![Some(59), Some(58), Some(57)]
        );
    }

    #[test]
    fn test_stepwise_gliss_requires_non_empty_range() {
        let mut timeline = timeline_of(&[10, 10]);
        assert_eq!(
            timeline.stepwise_gliss(1, 0, 4),
            Err(VoiceError::EmptyRange { start: 1, end: 0 })
        );
    }

    #[test]
    fn test_adjust_velocities() {
        let mut timeline = timeline_of(&[10, 10, 10]);
        timeline.adjust_velocities(0, 2, 1.5).unwrap();
        assert_eq!(velocities(&timeline), vec![120, 120, 80]);

        assert!(timeline.adjust_velocities(0, 2, -1.0).is_err());
    }

    #[test]
    fn test_hairpin() {
        let mut timeline = timeline_of(&[10, 10, 10]);
        timeline.adjust_velocities_hairpin(0, 3, 0.5, 1.5).unwrap();
        assert_eq!(velocities(&timeline), vec![40, 80, 120]);
    }
}
