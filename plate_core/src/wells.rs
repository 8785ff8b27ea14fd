use std::collections::{BTreeMap, BTreeSet};

use crate::{PlateId, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellStatus {
    Normal,
    Defunct,
    /// CC well.
    Control,
}

/// Per-plate defunct and control (CC) wells.
///
/// Adding a well to one set removes it from the other, so a well is never
/// both defunct and control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WellLedger {
    defunct: BTreeMap<PlateId, BTreeSet<Position>>,
    control: BTreeMap<PlateId, BTreeSet<Position>>,
}

static EMPTY: BTreeSet<Position> = BTreeSet::new();

impl WellLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defunct(&self, plate: PlateId) -> &BTreeSet<Position> {
        self.defunct.get(&plate).unwrap_or(&EMPTY)
    }

    pub fn control(&self, plate: PlateId) -> &BTreeSet<Position> {
        self.control.get(&plate).unwrap_or(&EMPTY)
    }

    pub fn status(&self, plate: PlateId, pos: Position) -> WellStatus {
        if self.defunct(plate).contains(&pos) {
            WellStatus::Defunct
        } else if self.control(plate).contains(&pos) {
            WellStatus::Control
        } else {
            WellStatus::Normal
        }
    }

    /// Defunct and control wells both refuse placement.
    pub fn is_blocked(&self, plate: PlateId, pos: Position) -> bool {
        self.status(plate, pos) != WellStatus::Normal
    }

    pub fn toggle_defunct(&mut self, plate: PlateId, pos: Position) {
        if toggle(&mut self.defunct, plate, pos) {
            remove(&mut self.control, plate, pos);
        }
    }

    pub fn toggle_control(&mut self, plate: PlateId, pos: Position) {
        if toggle(&mut self.control, plate, pos) {
            remove(&mut self.defunct, plate, pos);
        }
    }

    /// normal -> defunct -> control -> normal. Returns the new status.
    pub fn cycle(&mut self, plate: PlateId, pos: Position) -> WellStatus {
        let is_defunct = self.defunct(plate).contains(&pos);
        let is_control = self.control(plate).contains(&pos);

        match (is_defunct, is_control) {
            (false, false) => self.toggle_defunct(plate, pos),
            (true, false) => {
                self.toggle_defunct(plate, pos);
                self.toggle_control(plate, pos);
            }
            (false, true) => self.toggle_control(plate, pos),
            // only reachable through a hand-edited store
            (true, true) => {
                remove(&mut self.defunct, plate, pos);
                remove(&mut self.control, plate, pos);
            }
        }

        self.status(plate, pos)
    }

    pub fn set_defunct(&mut self, plate: PlateId, wells: BTreeSet<Position>) {
        for pos in &wells {
            remove(&mut self.control, plate, *pos);
        }
        self.defunct.insert(plate, wells);
    }

    pub fn set_control(&mut self, plate: PlateId, wells: BTreeSet<Position>) {
        for pos in &wells {
            remove(&mut self.defunct, plate, *pos);
        }
        self.control.insert(plate, wells);
    }

    /// Clear every status on a plate but keep its (empty) entries.
    pub fn clear_plate(&mut self, plate: PlateId) {
        if let Some(set) = self.defunct.get_mut(&plate) {
            set.clear();
        }
        if let Some(set) = self.control.get_mut(&plate) {
            set.clear();
        }
    }

    /// Drop a deleted plate from both maps.
    pub fn remove_plate(&mut self, plate: PlateId) {
        self.defunct.remove(&plate);
        self.control.remove(&plate);
    }

    pub fn has_plate_entry(&self, plate: PlateId) -> bool {
        self.defunct.contains_key(&plate) || self.control.contains_key(&plate)
    }

    pub(crate) fn defunct_map(&self) -> &BTreeMap<PlateId, BTreeSet<Position>> {
        &self.defunct
    }

    pub(crate) fn control_map(&self) -> &BTreeMap<PlateId, BTreeSet<Position>> {
        &self.control
    }

    /// Rebuild from raw maps exactly as stored (no exclusivity fix-up).
    pub(crate) fn from_maps(
        defunct: BTreeMap<PlateId, BTreeSet<Position>>,
        control: BTreeMap<PlateId, BTreeSet<Position>>,
    ) -> Self {
        Self { defunct, control }
    }
}

/// Flip membership; true if the position is now present.
fn toggle(map: &mut BTreeMap<PlateId, BTreeSet<Position>>, plate: PlateId, pos: Position) -> bool {
    let set = map.entry(plate).or_default();
    if set.remove(&pos) {
        false
    } else {
        set.insert(pos);
        true
    }
}

fn remove(map: &mut BTreeMap<PlateId, BTreeSet<Position>>, plate: PlateId, pos: Position) {
    if let Some(set) = map.get_mut(&plate) {
        set.remove(&pos);
    }
}
