// Contours - Partition reordering by pitch contour
// Sorts partitions of a voice by lowest pitch and redistributes them along a fixed contour

use super::item::DurationItem;
use super::timeline::VoiceTimeline;
use super::VoiceError;

/// Largest number of partitions a contour can reorder
pub const MAX_PARTITIONS: usize = 7;

/// Number of contours (and axes) available per partition count
pub const CONTOUR_COUNT: u8 = 12;

/// Contour shapes, indexed by `[partition count - 1][contour number - 1]`
///
/// Each row gives, slot by slot, the 1-based rank of the partition placed in
/// that slot (rank 1 has the lowest pitch). Only the first `count` entries of
/// a row are used. The shapes are, in order: rising, falling, arch, valley,
/// late peak, early peak, late valley, early valley, rising zigzag, falling
/// zigzag, wave, inverted wave.
const CONTOURS: [[[u8; MAX_PARTITIONS]; CONTOUR_COUNT as usize]; MAX_PARTITIONS] = [
    // 1 partition
    [
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
        [1, 0, 0, 0, 0, 0, 0],
    ],
    // 2 partitions
    [
        [1, 2, 0, 0, 0, 0, 0],
        [2, 1, 0, 0, 0, 0, 0],
        [1, 2, 0, 0, 0, 0, 0],
        [1, 2, 0, 0, 0, 0, 0],
        [1, 2, 0, 0, 0, 0, 0],
        [2, 1, 0, 0, 0, 0, 0],
        [2, 1, 0, 0, 0, 0, 0],
        [1, 2, 0, 0, 0, 0, 0],
        [1, 2, 0, 0, 0, 0, 0],
        [2, 1, 0, 0, 0, 0, 0],
        [1, 2, 0, 0, 0, 0, 0],
        [1, 2, 0, 0, 0, 0, 0],
    ],
    // 3 partitions
    [
        [1, 2, 3, 0, 0, 0, 0],
        [3, 2, 1, 0, 0, 0, 0],
        [1, 3, 2, 0, 0, 0, 0],
        [2, 1, 3, 0, 0, 0, 0],
        [1, 2, 3, 0, 0, 0, 0],
        [2, 3, 1, 0, 0, 0, 0],
        [3, 1, 2, 0, 0, 0, 0],
        [1, 2, 3, 0, 0, 0, 0],
        [1, 3, 2, 0, 0, 0, 0],
        [2, 3, 1, 0, 0, 0, 0],
        [1, 2, 3, 0, 0, 0, 0],
        [1, 2, 3, 0, 0, 0, 0],
    ],
    // 4 partitions
    [
        [1, 2, 3, 4, 0, 0, 0],
        [4, 3, 2, 1, 0, 0, 0],
        [1, 3, 4, 2, 0, 0, 0],
        [3, 1, 2, 4, 0, 0, 0],
        [1, 2, 4, 3, 0, 0, 0],
        [3, 4, 2, 1, 0, 0, 0],
        [4, 3, 1, 2, 0, 0, 0],
        [2, 1, 3, 4, 0, 0, 0],
        [1, 3, 2, 4, 0, 0, 0],
        [3, 4, 1, 2, 0, 0, 0],
        [2, 4, 1, 3, 0, 0, 0],
        [2, 1, 4, 3, 0, 0, 0],
    ],
    // 5 partitions
    [
        [1, 2, 3, 4, 5, 0, 0],
        [5, 4, 3, 2, 1, 0, 0],
        [1, 3, 5, 4, 2, 0, 0],
        [4, 2, 1, 3, 5, 0, 0],
        [1, 2, 3, 5, 4, 0, 0],
        [3, 5, 4, 2, 1, 0, 0],
        [5, 4, 2, 1, 3, 0, 0],
        [2, 1, 3, 4, 5, 0, 0],
        [1, 3, 2, 5, 4, 0, 0],
        [4, 5, 2, 3, 1, 0, 0],
        [2, 5, 3, 1, 4, 0, 0],
        [2, 1, 3, 5, 4, 0, 0],
    ],
    // 6 partitions
    [
        [1, 2, 3, 4, 5, 6, 0],
        [6, 5, 4, 3, 2, 1, 0],
        [1, 3, 5, 6, 4, 2, 0],
        [5, 3, 1, 2, 4, 6, 0],
        [1, 2, 3, 5, 6, 4, 0],
        [4, 6, 5, 3, 2, 1, 0],
        [6, 5, 4, 2, 1, 3, 0],
        [3, 1, 2, 4, 5, 6, 0],
        [1, 3, 2, 5, 4, 6, 0],
        [4, 6, 2, 5, 1, 3, 0],
        [3, 6, 5, 2, 1, 4, 0],
        [3, 1, 2, 5, 6, 4, 0],
    ],
    // 7 partitions
    [
        [1, 2, 3, 4, 5, 6, 7],
        [7, 6, 5, 4, 3, 2, 1],
        [1, 3, 5, 7, 6, 4, 2],
        [6, 4, 2, 1, 3, 5, 7],
        [1, 2, 3, 4, 6, 7, 5],
        [4, 6, 7, 5, 3, 2, 1],
        [7, 6, 5, 3, 1, 2, 4],
        [3, 1, 2, 4, 5, 6, 7],
        [1, 4, 2, 6, 3, 7, 5],
        [5, 7, 3, 6, 2, 4, 1],
        [3, 6, 7, 4, 1, 2, 5],
        [3, 1, 2, 4, 6, 7, 5],
    ],
];

/// Slot order for `count` partitions under a contour and axis
///
/// Returns 1-based ranks, one per output slot. The axis rotates the ranks
/// cyclically: axis 1 leaves the contour as written, axis `a` adds `a - 1`
/// to every rank (wrapping within `1..=count`).
pub fn contour(count: usize, contour_number: u8, axis_number: u8) -> Result<Vec<usize>, VoiceError> {
    if !(1..=CONTOUR_COUNT).contains(&contour_number) {
        return Err(VoiceError::ContourNumber(contour_number));
    }
    if !(1..=CONTOUR_COUNT).contains(&axis_number) {
        return Err(VoiceError::AxisNumber(axis_number));
    }
    if !(1..=MAX_PARTITIONS).contains(&count) {
        return Err(VoiceError::PartitionCount(count));
    }

    let row = &CONTOURS[count - 1][contour_number as usize - 1][..count];
    let shift = (axis_number as usize - 1) % count;
    Ok(row
        .iter()
        .map(|&rank| (rank as usize - 1 + shift) % count + 1)
        .collect())
}

impl VoiceTimeline {
    /// Reorder partitions of the range starting at `start` along a contour
    ///
    /// Algorithm:
    /// 1. Split the range into consecutive partitions of `partition_sizes`
    /// 2. Set aside partitions made of a single rest
    /// 3. Sort the rest by lowest pitch (stable; pitchless partitions last)
    /// 4. Place them in the slots given by the contour table
    /// 5. Put the set-aside rests back at their partition indices
    /// 6. Re-derive positions from the range's original start
    pub fn set_contour(
        &mut self,
        start: usize,
        partition_sizes: &[usize],
        contour_number: u8,
        axis_number: u8,
    ) -> Result<(), VoiceError> {
        if !(1..=CONTOUR_COUNT).contains(&contour_number) {
            return Err(VoiceError::ContourNumber(contour_number));
        }
        if !(1..=CONTOUR_COUNT).contains(&axis_number) {
            return Err(VoiceError::AxisNumber(axis_number));
        }
        if !(1..=MAX_PARTITIONS).contains(&partition_sizes.len()) {
            return Err(VoiceError::PartitionCount(partition_sizes.len()));
        }
        if let Some(partition) = partition_sizes.iter().position(|&size| size == 0) {
            return Err(VoiceError::PartitionSize { partition, size: 0 });
        }
        self.check_index(start)?;
        let len = self.items.len();
        let total = partition_sizes
            .iter()
            .try_fold(0usize, |sum, &size| sum.checked_add(size))
            .unwrap_or(usize::MAX);
        if start.checked_add(total).map_or(true, |end| end > len) {
            return Err(VoiceError::PartitionOverrun { start, total, len });
        }

        let range_start_ms = self.items[start].position_ms;
        let mut range: Vec<DurationItem> = self.items.drain(start..start + total).collect();

        let mut partitions: Vec<Vec<DurationItem>> = Vec::with_capacity(partition_sizes.len());
        for &size in partition_sizes {
            let rest_of_range = range.split_off(size);
            partitions.push(range);
            range = rest_of_range;
        }

        let mut rests: Vec<(usize, Vec<DurationItem>)> = Vec::new();
        let mut sounding: Vec<Vec<DurationItem>> = Vec::new();
        for (index, partition) in partitions.into_iter().enumerate() {
            if partition.len() == 1 && partition[0].is_rest() {
                rests.push((index, partition));
            } else {
                sounding.push(partition);
            }
        }

        let reordered = if sounding.len() > 1 {
            sounding.sort_by_key(|partition| lowest_pitch_key(partition));
            let slots = contour(sounding.len(), contour_number, axis_number)?;
            let mut ranked: Vec<Option<Vec<DurationItem>>> = sounding.into_iter().map(Some).collect();
            slots
                .iter()
                .filter_map(|&rank| ranked[rank - 1].take())
                .collect()
        } else {
            sounding
        };

        let mut ordered: Vec<Vec<DurationItem>> = reordered;
        for (index, rest) in rests {
            ordered.insert(index, rest);
        }

        let block: Vec<DurationItem> = ordered.into_iter().flatten().collect();
        self.items.splice(start..start, block);

        let mut position = range_start_ms;
        for item in &mut self.items[start..start + total] {
            item.position_ms = position;
            position += item.duration_ms;
        }

        Ok(())
    }
}

/// Sort key for a partition: its lowest pitch, with pitchless partitions last
fn lowest_pitch_key(partition: &[DurationItem]) -> u16 {
    partition
        .iter()
        .filter_map(DurationItem::lowest_pitch)
        .min()
        .map(u16::from)
        .unwrap_or(u16::MAX)
}
