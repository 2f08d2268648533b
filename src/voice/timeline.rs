// Voice timeline
// Ordered, duration-contiguous sequence of chords and rests

use serde::{Deserialize, Serialize};

use super::item::DurationItem;
use super::VoiceError;

/// One performable line of chords and rests
///
/// Every item starts where the previous one ends:
/// `items[i].position_ms + items[i].duration_ms == items[i + 1].position_ms`.
/// A timeline always holds at least one item.
///
/// `Clone` is a plain value copy of the item sequence; the copy shares nothing
/// with the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DurationItem>", into = "Vec<DurationItem>")]
pub struct VoiceTimeline {
    pub(super) items: Vec<DurationItem>,
}

impl VoiceTimeline {
    /// Create a timeline holding a single item at `start_ms`
    pub fn new(start_ms: u64, first: DurationItem) -> Self {
        VoiceTimeline {
            items: vec![first.at(start_ms)],
        }
    }

    /// Create a timeline from items, laid out contiguously from `start_ms`
    ///
    /// Incoming positions are ignored; durations are kept.
    pub fn from_items(start_ms: u64, items: Vec<DurationItem>) -> Result<Self, VoiceError> {
        if items.is_empty() {
            return Err(VoiceError::EmptyTimeline);
        }
        let mut timeline = VoiceTimeline { items };
        timeline.reposition(start_ms);
        Ok(timeline)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[DurationItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&DurationItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DurationItem> {
        self.items.iter()
    }

    /// Consume the timeline, returning its items
    pub fn into_items(self) -> Vec<DurationItem> {
        self.items
    }

    /// Position of the first item
    pub fn start_ms(&self) -> u64 {
        self.items[0].position_ms
    }

    /// End of the final item
    pub fn end_ms(&self) -> u64 {
        self.items[self.items.len() - 1].end_ms()
    }

    /// Sum of all item durations
    pub fn duration_ms(&self) -> u64 {
        self.end_ms() - self.start_ms()
    }

    /// Check the contiguity invariant
    pub fn is_contiguous(&self) -> bool {
        self.items
            .windows(2)
            .all(|pair| pair[0].end_ms() == pair[1].position_ms)
    }

    /// Index of the first item at or after `position_ms`
    ///
    /// Positions before the first item give 0; positions after the start of
    /// the final item give the last index.
    pub fn first_index_at_or_after(&self, position_ms: u64) -> usize {
        self.items
            .iter()
            .position(|item| item.position_ms >= position_ms)
            .unwrap_or(self.items.len() - 1)
    }

    /// Append an item after the current last item
    pub fn append(&mut self, item: DurationItem) {
        let position = self.end_ms();
        self.items.push(item.at(position));
    }

    /// Insert an item before `index` (or at the end when `index == len`)
    pub fn insert(&mut self, index: usize, item: DurationItem) -> Result<(), VoiceError> {
        if index > self.items.len() {
            return Err(VoiceError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        let start = self.start_ms();
        self.items.insert(index, item);
        self.reposition(start);
        Ok(())
    }

    /// Remove the item at `index`
    ///
    /// Positions are re-derived from the original start, so removing the first
    /// item moves its successor to the old start position.
    pub fn remove(&mut self, index: usize) -> Result<DurationItem, VoiceError> {
        self.check_index(index)?;
        if self.items.len() == 1 {
            return Err(VoiceError::WouldEmpty);
        }
        let start = self.start_ms();
        let removed = self.items.remove(index);
        self.reposition(start);
        Ok(removed)
    }

    /// Shift every item so the first item starts at `start_ms`
    pub fn set_start_position(&mut self, start_ms: u64) {
        let current = self.start_ms();
        for item in &mut self.items {
            item.position_ms = item.position_ms - current + start_ms;
        }
    }

    /// Move `count` items starting at `from` so the block begins at index `to`
    /// of the resulting sequence
    pub fn translate(&mut self, from: usize, count: usize, to: usize) -> Result<(), VoiceError> {
        let len = self.items.len();
        if count == 0 {
            return Err(VoiceError::EmptyRange {
                start: from,
                end: from,
            });
        }
        let block_end = from
            .checked_add(count)
            .filter(|&end| end <= len)
            .ok_or(VoiceError::IndexOutOfRange {
                index: from.saturating_add(count - 1),
                len,
            })?;
        if to.checked_add(count).map_or(true, |end| end > len) {
            return Err(VoiceError::IndexOutOfRange {
                index: to.saturating_add(count - 1),
                len,
            });
        }

        let start = self.start_ms();
        let block: Vec<DurationItem> = self.items.drain(from..block_end).collect();
        self.items.splice(to..to, block);
        self.reposition(start);
        Ok(())
    }

    /// Merge runs of consecutive rests into single rests
    pub fn agglomerate_rests(&mut self) {
        let start = self.start_ms();
        let mut merged: Vec<DurationItem> = Vec::with_capacity(self.items.len());

        for item in self.items.drain(..) {
            match merged.last_mut() {
                Some(previous) if previous.is_rest() && item.is_rest() => {
                    previous.duration_ms += item.duration_ms;
                }
                _ => merged.push(item),
            }
        }

        self.items = merged;
        self.reposition(start);
    }

    /// Lay items out contiguously from `start_ms`, keeping durations
    pub(super) fn reposition(&mut self, start_ms: u64) {
        let mut position = start_ms;
        for item in &mut self.items {
            item.position_ms = position;
            position += item.duration_ms;
        }
    }

    pub(super) fn check_index(&self, index: usize) -> Result<(), VoiceError> {
        if index >= self.items.len() {
            return Err(VoiceError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }

    /// Validate a half-open, non-empty index range
    pub(super) fn check_range(&self, start: usize, end: usize) -> Result<(), VoiceError> {
        if start >= end {
            return Err(VoiceError::EmptyRange { start, end });
        }
        if end > self.items.len() {
            return Err(VoiceError::IndexOutOfRange {
                index: end - 1,
                len: self.items.len(),
            });
        }
        Ok(())
    }
}

/// Deserialized items are laid out again from the first item's position
impl TryFrom<Vec<DurationItem>> for VoiceTimeline {
    type Error = VoiceError;

    fn try_from(items: Vec<DurationItem>) -> Result<Self, Self::Error> {
        let start_ms = items
            .first()
            .map(|item| item.position_ms)
            .ok_or(VoiceError::EmptyTimeline)?;
        VoiceTimeline::from_items(start_ms, items)
    }
}

impl From<VoiceTimeline> for Vec<DurationItem> {
    fn from(timeline: VoiceTimeline) -> Self {
        timeline.items
    }
}

impl<'a> IntoIterator for &'a VoiceTimeline {
    type Item = &'a DurationItem;
    type IntoIter = std::slice::Iter<'a, DurationItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
