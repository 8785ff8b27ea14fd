use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{next_numbered_name, smallest_unused};
use crate::{LayoutError, PlateId};

const PLATE_PREFIX: &str = "Plate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plate {
    pub id: PlateId,
    pub name: String,
    pub is_active: bool,
}

impl Plate {
    pub fn new(id: PlateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_active: false,
        }
    }
}

/// Ordered plates; exactly one is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateRegistry {
    plates: Vec<Plate>,
}

impl Default for PlateRegistry {
    fn default() -> Self {
        let mut first = Plate::new(PlateId(1), format!("{PLATE_PREFIX} 1"));
        first.is_active = true;
        Self {
            plates: vec![first],
        }
    }
}

impl PlateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take plates as stored; call `restore_invariants` afterwards.
    pub(crate) fn from_plates(plates: Vec<Plate>) -> Self {
        Self { plates }
    }

    pub fn plates(&self) -> &[Plate] {
        &self.plates
    }

    pub fn len(&self) -> usize {
        self.plates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    pub fn get(&self, id: PlateId) -> Option<&Plate> {
        self.plates.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlateId) -> bool {
        self.get(id).is_some()
    }

    pub fn active(&self) -> Result<&Plate, LayoutError> {
        self.plates
            .iter()
            .find(|p| p.is_active)
            .ok_or(LayoutError::NoActivePlate)
    }

    pub fn active_id(&self) -> Result<PlateId, LayoutError> {
        self.active().map(|p| p.id)
    }

    /// New plate with the smallest free id and `Plate N` name; it becomes active.
    pub fn add_plate(&mut self) -> PlateId {
        let id = PlateId(smallest_unused(self.plates.iter().map(|p| p.id.0)));
        let name = next_numbered_name(PLATE_PREFIX, self.plates.iter().map(|p| p.name.as_str()));

        for p in &mut self.plates {
            p.is_active = false;
        }
        let mut plate = Plate::new(id, name);
        plate.is_active = true;

        tracing::info!(plate = %id, name = %plate.name, "plate added");
        self.plates.push(plate);
        id
    }

    /// Rename; a name already used by another plate gets the smallest free
    /// numeric suffix (`Name 2`, `Name 3`, ..). Returns the applied name.
    pub fn rename_plate(&mut self, id: PlateId, name: &str) -> Result<String, LayoutError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LayoutError::EmptyName);
        }
        if !self.contains(id) {
            return Err(LayoutError::UnknownPlate(id));
        }

        let taken = |candidate: &str| {
            self.plates
                .iter()
                .any(|p| p.id != id && p.name == candidate)
        };
        let applied = if taken(name) {
            (2u32..)
                .map(|n| format!("{name} {n}"))
                .find(|candidate| !taken(candidate.as_str()))
                .unwrap_or_else(|| name.to_string())
        } else {
            name.to_string()
        };

        if let Some(plate) = self.plates.iter_mut().find(|p| p.id == id) {
            plate.name = applied.clone();
        }
        tracing::info!(plate = %id, name = %applied, "plate renamed");
        Ok(applied)
    }

    pub fn set_active(&mut self, id: PlateId) -> bool {
        if !self.contains(id) {
            tracing::debug!(plate = %id, "set_active on unknown plate ignored");
            return false;
        }
        for p in &mut self.plates {
            p.is_active = p.id == id;
        }
        true
    }

    /// Remove a plate unless it is the last one; promotes the first remaining
    /// plate when the active one goes. Returns the removed plate.
    pub(crate) fn remove(&mut self, id: PlateId) -> Option<Plate> {
        if self.plates.len() <= 1 {
            tracing::debug!(plate = %id, "refusing to delete the last plate");
            return None;
        }
        let idx = self.plates.iter().position(|p| p.id == id)?;
        let removed = self.plates.remove(idx);
        if removed.is_active {
            if let Some(first) = self.plates.first_mut() {
                first.is_active = true;
            }
        }
        Some(removed)
    }

    /// Guarantee at least one plate, unique ids and exactly one active flag.
    /// Returns true if anything had to be repaired.
    pub(crate) fn restore_invariants(&mut self) -> bool {
        if self.plates.is_empty() {
            *self = Self::default();
            return true;
        }

        let renumbered = self.dedupe_ids();

        let active: Vec<usize> = self
            .plates
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active)
            .map(|(i, _)| i)
            .collect();

        let reactivated = match active.as_slice() {
            [_] => false,
            [] => {
                self.plates[0].is_active = true;
                true
            }
            [keep, ..] => {
                let keep = *keep;
                for (i, p) in self.plates.iter_mut().enumerate() {
                    p.is_active = i == keep;
                }
                true
            }
        };
        renumbered || reactivated
    }

    /// The first plate with a given id keeps it (and everything that points
    /// at that id); later copies get fresh gap-filled ids.
    fn dedupe_ids(&mut self) -> bool {
        let mut taken: BTreeSet<u32> = self.plates.iter().map(|p| p.id.0).collect();
        let mut seen = BTreeSet::new();
        let mut changed = false;
        for p in &mut self.plates {
            if seen.insert(p.id) {
                continue;
            }
            let fresh = PlateId(smallest_unused(taken.iter().copied()));
            tracing::warn!(plate = %p.id, fresh = %fresh, "duplicate stored plate id renumbered");
            taken.insert(fresh.0);
            seen.insert(fresh);
            p.id = fresh;
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(reg: &PlateRegistry) -> Vec<&str> {
        reg.plates().iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn starts_with_one_active_plate() -> anyhow::Result<()> {
        let reg = PlateRegistry::new();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.active()?.name, "Plate 1");
        Ok(())
    }

    #[test]
    fn add_activates_the_new_plate() -> anyhow::Result<()> {
        let mut reg = PlateRegistry::new();
        let id = reg.add_plate();
        assert_eq!(id, PlateId(2));
        assert_eq!(reg.active_id()?, id);
        assert_eq!(reg.plates().iter().filter(|p| p.is_active).count(), 1);
        Ok(())
    }

    #[test]
    fn add_fills_id_and_name_gaps() {
        let mut reg = PlateRegistry::new();
        reg.add_plate();
        reg.add_plate();
        assert!(reg.remove(PlateId(2)).is_some());

        let id = reg.add_plate();
        assert_eq!(id, PlateId(2));
        assert_eq!(names(&reg), ["Plate 1", "Plate 3", "Plate 2"]);
    }

    #[test]
    fn rename_suffixes_collisions() -> anyhow::Result<()> {
        let mut reg = PlateRegistry::new();
        reg.add_plate();
        reg.add_plate();

        assert_eq!(reg.rename_plate(PlateId(1), "Run")?, "Run");
        assert_eq!(reg.rename_plate(PlateId(2), "Run")?, "Run 2");
        assert_eq!(reg.rename_plate(PlateId(3), " Run ")?, "Run 3");
        // renaming a plate to its own name is not a collision
        assert_eq!(reg.rename_plate(PlateId(1), "Run")?, "Run");
        assert!(matches!(
            reg.rename_plate(PlateId(1), "   "),
            Err(LayoutError::EmptyName)
        ));
        Ok(())
    }

    #[test]
    fn removing_active_plate_promotes_first() -> anyhow::Result<()> {
        let mut reg = PlateRegistry::new();
        let second = reg.add_plate();
        reg.remove(second);
        assert_eq!(reg.active_id()?, PlateId(1));
        Ok(())
    }

    #[test]
    fn last_plate_is_kept() {
        let mut reg = PlateRegistry::new();
        assert!(reg.remove(PlateId(1)).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn restore_picks_a_single_active_plate() -> anyhow::Result<()> {
        let mut reg = PlateRegistry::from_plates(vec![
            Plate::new(PlateId(3), "a"),
            Plate::new(PlateId(5), "b"),
        ]);
        assert!(reg.active().is_err());
        assert!(reg.restore_invariants());
        assert_eq!(reg.active_id()?, PlateId(3));

        let mut empty = PlateRegistry::from_plates(Vec::new());
        assert!(empty.restore_invariants());
        assert_eq!(empty.active()?.name, "Plate 1");
        Ok(())
    }
}
