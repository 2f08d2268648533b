// Controller state
// Fixed-slot controller snapshots and the pending-controller accumulator

use serde::{Deserialize, Serialize};

use super::types::{ControllerKind, RawControllerEvent};

/// At most one value per controller kind, indexed by [`ControllerKind::index`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    slots: [Option<u16>; ControllerKind::COUNT],
}

impl ControllerSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ControllerKind) -> Option<u16> {
        self.slots[kind.index()]
    }

    /// Store a value, replacing any earlier value of the same kind
    pub fn set(&mut self, kind: ControllerKind, value: u16) {
        self.slots[kind.index()] = Some(value);
    }

    pub fn clear(&mut self) {
        self.slots = [None; ControllerKind::COUNT];
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Number of kinds holding a value
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterate over the stored values in slot order
    pub fn iter(&self) -> impl Iterator<Item = (ControllerKind, u16)> + '_ {
        ControllerKind::ALL
            .into_iter()
            .zip(self.slots.iter())
            .filter_map(|(kind, slot)| slot.map(|value| (kind, value)))
    }
}

/// Pending controller values waiting for the next chord
///
/// The aggregator threads this value through chord construction explicitly:
/// controller events are folded in as they are passed, and the next chord
/// takes the whole accumulated state, leaving the accumulator empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerAccumulator {
    pending: ControllerSnapshot,
}

impl ControllerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a controller event into the pending state
    pub fn fold(&mut self, event: &RawControllerEvent) {
        self.pending.set(event.kind, event.value);
    }

    /// Take the pending state, leaving the accumulator empty
    pub fn take(&mut self) -> ControllerSnapshot {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &ControllerSnapshot {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_set_overwrites_same_kind() {
        let mut snapshot = ControllerSnapshot::new();
        snapshot.set(ControllerKind::Volume, 90);
        snapshot.set(ControllerKind::Volume, 64);
        snapshot.set(ControllerKind::Pan, 10);

        assert_eq!(snapshot.get(ControllerKind::Volume), Some(64));
        assert_eq!(snapshot.get(ControllerKind::Pan), Some(10));
        assert_eq!(snapshot.get(ControllerKind::Modulation), None);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_snapshot_iter_in_slot_order() {
        let mut snapshot = ControllerSnapshot::new();
        snapshot.set(ControllerKind::Expression, 1);
        snapshot.set(ControllerKind::PitchWheel, 8192);

        let values: Vec<_> = snapshot.iter().collect();
        assert_eq!(
            values,
            vec![
                (ControllerKind::PitchWheel, 8192),
                (ControllerKind::Expression, 1)
            ]
        );
    }

    #[test]
    fn test_accumulator_take_clears() {
        let mut acc = ControllerAccumulator::new();
        acc.fold(&RawControllerEvent::new(0, ControllerKind::Modulation, 20, 0));
        acc.fold(&RawControllerEvent::new(0, ControllerKind::Modulation, 40, 5));

        let taken = acc.take();
        assert_eq!(taken.get(ControllerKind::Modulation), Some(40));
        assert!(acc.is_empty());
        assert!(acc.take().is_empty());
    }
}
