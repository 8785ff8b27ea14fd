use std::collections::BTreeSet;

use crate::placement::{self, PlacementPlan};
use crate::reactions::Slot;
use crate::{
    ClickModifier, LayoutError, ListId, Placement, Plate, PlateId, PlateRegistry, Position,
    Reaction, ReactionBook, ReactionList, ReactionRecord, Selection, WellLedger, WellStatus,
};

/// The whole editor document: reaction lists, plates, well annotations and
/// the current selection.
///
/// Fields are only reachable through methods so the cross-component
/// invariants (one active plate, one active list, placements on known
/// plates, selection inside the active list) hold after every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub(crate) book: ReactionBook,
    pub(crate) plates: PlateRegistry,
    pub(crate) wells: WellLedger,
    pub(crate) selection: Selection,
    pub(crate) multi_drag: bool,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book(&self) -> &ReactionBook {
        &self.book
    }

    pub fn plates(&self) -> &PlateRegistry {
        &self.plates
    }

    pub fn wells(&self) -> &WellLedger {
        &self.wells
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_multi_drag(&self) -> bool {
        self.multi_drag
    }

    pub(crate) fn set_multi_drag(&mut self, on: bool) {
        self.multi_drag = on;
    }

    /// Repair whatever storage handed us. Run once after loading.
    /// Returns true if anything changed.
    pub fn restore_invariants(&mut self) -> bool {
        let mut changed = self.plates.restore_invariants();

        let plates = &self.plates;
        changed |= self.book.restore_invariants(|id| plates.contains(id));

        let stale: Vec<PlateId> = self
            .wells
            .defunct_map()
            .keys()
            .chain(self.wells.control_map().keys())
            .copied()
            .filter(|id| !self.plates.contains(*id))
            .collect();
        for id in stale {
            self.wells.remove_plate(id);
            changed = true;
        }

        let book = &self.book;
        changed |= self.selection.retain(|id| book.in_active_list(id));
        if let Some(i) = self.selection.last_selected_index() {
            if i >= self.book.all_reactions().count() {
                self.selection.set_anchor(None);
                changed = true;
            }
        }

        if changed {
            tracing::warn!("layout repaired after load");
        }
        changed
    }

    pub fn active_plate(&self) -> Result<&Plate, LayoutError> {
        self.plates.active()
    }

    pub fn active_list(&self) -> Result<&ReactionList, LayoutError> {
        self.book.active_list()
    }

    pub fn reaction(&self, id: &str) -> Option<&Reaction> {
        self.book.reaction(id)
    }

    /// Occupant of a well; `plate` defaults to the active plate.
    pub fn reaction_at(&self, pos: Position, plate: Option<PlateId>) -> Option<&Reaction> {
        let plate = match plate {
            Some(p) => p,
            None => self.plates.active_id().ok()?,
        };
        self.book.reaction_at(plate, pos)
    }

    pub fn used_items(&self, plate: Option<PlateId>) -> BTreeSet<String> {
        self.book.used_items(plate)
    }

    pub fn well_status(&self, plate: PlateId, pos: Position) -> WellStatus {
        self.wells.status(plate, pos)
    }

    /// A well refuses placement when annotated or already occupied.
    pub fn is_blocked(&self, plate: PlateId, pos: Position) -> bool {
        self.wells.is_blocked(plate, pos) || self.book.reaction_at(plate, pos).is_some()
    }

    // ---- reactions ----

    pub fn set_reactions(
        &mut self,
        records: Vec<ReactionRecord>,
        list: Option<ListId>,
    ) -> Result<Vec<String>, LayoutError> {
        let ids = self.book.set_reactions(records, list)?;
        let book = &self.book;
        self.selection.retain(|id| book.reaction(id).is_some());
        Ok(ids)
    }

    /// Place a reaction on the active plate or send it back to the list.
    /// Returns false for an unknown id.
    pub fn move_reaction(&mut self, id: &str, to: Placement) -> Result<bool, LayoutError> {
        let slot = match to {
            Placement::Unused => None,
            Placement::Well(position) => Some(Slot {
                plate_id: self.plates.active_id()?,
                position,
            }),
        };
        Ok(self.book.set_slot(id, slot))
    }

    pub fn swap_reactions(&mut self, a: &str, b: &str) -> bool {
        self.book.swap_reactions(a, b)
    }

    pub fn reorder_reaction(&mut self, id: &str, to_index: usize) -> Result<bool, LayoutError> {
        let active = self.book.active_list_id()?;
        Ok(self
            .book
            .list_mut(active)
            .map(|l| l.reorder(id, to_index))
            .unwrap_or(false))
    }

    // ---- plates ----

    pub fn add_plate(&mut self) -> PlateId {
        self.plates.add_plate()
    }

    pub fn rename_plate(&mut self, id: PlateId, name: &str) -> Result<String, LayoutError> {
        self.plates.rename_plate(id, name)
    }

    pub fn set_active_plate(&mut self, id: PlateId) -> bool {
        self.plates.set_active(id)
    }

    /// Delete a plate unless it is the last one. Its reactions go back to
    /// their lists and its well annotations are dropped.
    pub fn delete_plate(&mut self, id: PlateId) -> bool {
        if self.plates.remove(id).is_none() {
            return false;
        }
        let freed = self.book.release_plate(id);
        self.wells.remove_plate(id);
        tracing::info!(plate = %id, freed, "plate deleted");
        true
    }

    /// Empty a plate: every reaction back to unused, every well normal.
    pub fn reset_plate(&mut self, id: PlateId) -> Result<usize, LayoutError> {
        if !self.plates.contains(id) {
            return Err(LayoutError::UnknownPlate(id));
        }
        let freed = self.book.release_plate(id);
        self.wells.clear_plate(id);
        tracing::info!(plate = %id, freed, "plate reset");
        Ok(freed)
    }

    // ---- reaction lists ----

    pub fn add_reaction_list(&mut self) -> ListId {
        let id = self.book.add_reaction_list();
        self.selection.clear();
        id
    }

    pub fn remove_reaction_list(&mut self, id: ListId) -> bool {
        if self.book.remove_reaction_list(id).is_none() {
            return false;
        }
        let book = &self.book;
        self.selection.retain(|r| book.in_active_list(r));
        self.selection.set_anchor(None);
        true
    }

    pub fn rename_reaction_list(&mut self, id: ListId, name: &str) -> Result<(), LayoutError> {
        self.book.rename_reaction_list(id, name)
    }

    /// Switching lists drops the selection, which only ever covers the
    /// active list.
    pub fn set_active_reaction_list(&mut self, id: ListId) -> bool {
        let was = self.book.active_list_id().ok();
        if !self.book.set_active_reaction_list(id) {
            return false;
        }
        if was != Some(id) {
            self.selection.clear();
        }
        true
    }

    // ---- wells ----

    pub fn toggle_defunct(&mut self, plate: PlateId, pos: Position) {
        self.wells.toggle_defunct(plate, pos);
    }

    pub fn toggle_control(&mut self, plate: PlateId, pos: Position) {
        self.wells.toggle_control(plate, pos);
    }

    /// Advance a well on the active plate through normal/defunct/control.
    pub fn cycle_well(&mut self, pos: Position) -> Result<WellStatus, LayoutError> {
        let plate = self.plates.active_id()?;
        Ok(self.wells.cycle(plate, pos))
    }

    // ---- selection ----

    /// Apply a click on a reaction in `view` (the caller's ordering of the
    /// active list). Reactions outside the active list are ignored.
    pub fn click_reaction(&mut self, id: &str, modifier: ClickModifier, view: &[&str]) -> bool {
        if !self.book.in_active_list(id) {
            tracing::debug!(reaction = id, "click outside the active list ignored");
            return false;
        }
        let anchor = self
            .selection
            .last_selected_index()
            .and_then(|i| self.book.all_reactions().nth(i))
            .map(|r| r.id.clone());

        self.selection.click(id, modifier, view, anchor.as_deref());
        self.selection.set_anchor(self.book.global_index(id));
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ---- placement ----

    /// First-fit plan for dropping `candidates` at `target` on the active
    /// plate. Unknown and already placed reactions are left out.
    pub fn plan_drop(
        &self,
        target: Position,
        candidates: &[String],
    ) -> Result<PlacementPlan, LayoutError> {
        let plate = self.plates.active_id()?;
        let unused: Vec<String> = candidates
            .iter()
            .filter(|id| self.book.reaction(id).is_some_and(Reaction::is_unused))
            .cloned()
            .collect();
        if unused.is_empty() {
            return Ok(PlacementPlan::default());
        }
        Ok(placement::plan(target, &unused, |pos| {
            self.is_blocked(plate, pos)
        }))
    }

    /// Wells a drop at `target` would fill. Nothing is mutated.
    pub fn preview(&self, target: Position, candidates: &[String]) -> BTreeSet<Position> {
        self.plan_drop(target, candidates)
            .map(|p| p.positions())
            .unwrap_or_default()
    }

    /// Place `candidates` from `target` onward and clear the selection if
    /// anything landed.
    pub fn commit_drop(
        &mut self,
        target: Position,
        candidates: &[String],
    ) -> Result<PlacementPlan, LayoutError> {
        let plan = self.plan_drop(target, candidates)?;
        for (id, pos) in &plan.assignments {
            self.move_reaction(id, Placement::Well(*pos))?;
        }
        if !plan.is_empty() {
            self.selection.clear_items();
            tracing::debug!(placed = plan.assignments.len(), unplaced = plan.unplaced.len(), "drop committed");
        }
        Ok(plan)
    }
}
