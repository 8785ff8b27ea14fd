use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::ids::{next_numbered_name, smallest_unused};
use crate::{LayoutError, ListId, PlateId, Position};

const LIST_PREFIX: &str = "List";
pub const UNUSED: &str = "unused";

/// Where a placed reaction sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub plate_id: PlateId,
    pub position: Position,
}

/// Target of a move: back to the list, or a well on the active plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Unused,
    Well(Position),
}

impl Placement {
    pub fn parse(text: &str) -> Result<Self, LayoutError> {
        if text.trim().eq_ignore_ascii_case(UNUSED) {
            Ok(Placement::Unused)
        } else {
            Position::parse(text).map(Placement::Well)
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Unused => f.write_str(UNUSED),
            Placement::Well(p) => write!(f, "{p}"),
        }
    }
}

/// A sample/primer pair.
///
/// The placement state and the owning plate live together in `slot`, so a
/// reaction is unused exactly when it has no plate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub id: String,
    pub name: String,
    pub primer: String,
    /// Coordinate in the source list; never touched by placement.
    pub origin: Option<String>,
    slot: Option<Slot>,
}

impl Reaction {
    pub fn new(id: impl Into<String>, name: impl Into<String>, primer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            primer: primer.into(),
            origin: None,
            slot: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub(crate) fn with_slot(mut self, slot: Option<Slot>) -> Self {
        self.slot = slot;
        self
    }

    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }

    pub fn plate_id(&self) -> Option<PlateId> {
        self.slot.map(|s| s.plate_id)
    }

    pub fn position(&self) -> Option<Position> {
        self.slot.map(|s| s.position)
    }

    pub fn placement(&self) -> Placement {
        match self.slot {
            Some(s) => Placement::Well(s.position),
            None => Placement::Unused,
        }
    }

    pub fn is_unused(&self) -> bool {
        self.slot.is_none()
    }

    /// `"unused"` or the well position, as persisted.
    pub fn state_label(&self) -> String {
        self.placement().to_string()
    }

    pub fn is_at(&self, plate: PlateId, pos: Position) -> bool {
        self.slot == Some(Slot {
            plate_id: plate,
            position: pos,
        })
    }
}

/// One validated row handed over by the clipboard parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRecord {
    pub name: String,
    pub primer: String,
    pub position: Option<String>,
}

impl ReactionRecord {
    pub fn new(name: impl Into<String>, primer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primer: primer.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMethod {
    /// Custom list order.
    #[default]
    Sample,
    /// Custom order, grouped by primer in order of first appearance.
    Primer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionList {
    pub id: ListId,
    pub name: String,
    pub is_active: bool,
    reactions: Vec<Reaction>,
    /// Display order; ids missing here follow in array order.
    order: Vec<String>,
}

impl ReactionList {
    pub fn new(id: ListId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_active: false,
            reactions: Vec::new(),
            order: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        id: ListId,
        name: String,
        is_active: bool,
        reactions: Vec<Reaction>,
        order: Vec<String>,
    ) -> Self {
        Self {
            id,
            name,
            is_active,
            reactions,
            order,
        }
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, reaction_id: &str) -> bool {
        self.reactions.iter().any(|r| r.id == reaction_id)
    }

    /// Reactions in custom order, unordered ones last.
    pub fn ordered(&self) -> Vec<&Reaction> {
        let by_id: HashMap<&str, &Reaction> =
            self.reactions.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.reactions.len());
        for id in &self.order {
            if let Some(r) = by_id.get(id.as_str()) {
                if seen.insert(id.as_str()) {
                    out.push(*r);
                }
            }
        }
        out.extend(self.reactions.iter().filter(|r| !seen.contains(r.id.as_str())));
        out
    }

    /// The sidebar view for a sort method.
    pub fn view(&self, sort: SortMethod) -> Vec<&Reaction> {
        let ordered = self.ordered();
        match sort {
            SortMethod::Sample => ordered,
            SortMethod::Primer => {
                let mut primers: Vec<&str> = Vec::new();
                for r in &ordered {
                    if !primers.contains(&r.primer.as_str()) {
                        primers.push(&r.primer);
                    }
                }
                primers
                    .into_iter()
                    .flat_map(|p| ordered.iter().copied().filter(move |r| r.primer == p))
                    .collect()
            }
        }
    }

    /// Move a reaction to `to_index` in the custom order.
    pub fn reorder(&mut self, reaction_id: &str, to_index: usize) -> bool {
        let mut ids: Vec<String> = self.ordered().iter().map(|r| r.id.clone()).collect();
        let Some(from) = ids.iter().position(|id| id == reaction_id) else {
            return false;
        };
        let id = ids.remove(from);
        ids.insert(to_index.min(ids.len()), id);
        self.order = ids;
        true
    }

    fn find_mut(&mut self, reaction_id: &str) -> Option<&mut Reaction> {
        self.reactions.iter_mut().find(|r| r.id == reaction_id)
    }
}

/// All reaction lists; exactly one is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionBook {
    lists: Vec<ReactionList>,
}

impl Default for ReactionBook {
    fn default() -> Self {
        let mut first = ReactionList::new(ListId(1), format!("{LIST_PREFIX} 1"));
        first.is_active = true;
        Self { lists: vec![first] }
    }
}

impl ReactionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_lists(lists: Vec<ReactionList>) -> Self {
        Self { lists }
    }

    pub fn lists(&self) -> &[ReactionList] {
        &self.lists
    }

    pub fn list(&self, id: ListId) -> Option<&ReactionList> {
        self.lists.iter().find(|l| l.id == id)
    }

    pub fn list_mut(&mut self, id: ListId) -> Option<&mut ReactionList> {
        self.lists.iter_mut().find(|l| l.id == id)
    }

    pub fn active_list(&self) -> Result<&ReactionList, LayoutError> {
        self.lists
            .iter()
            .find(|l| l.is_active)
            .ok_or(LayoutError::NoActiveList)
    }

    pub fn active_list_id(&self) -> Result<ListId, LayoutError> {
        self.active_list().map(|l| l.id)
    }

    pub fn in_active_list(&self, reaction_id: &str) -> bool {
        self.active_list()
            .map(|l| l.contains(reaction_id))
            .unwrap_or(false)
    }

    pub fn reaction(&self, id: &str) -> Option<&Reaction> {
        self.all_reactions().find(|r| r.id == id)
    }

    pub fn list_of(&self, reaction_id: &str) -> Option<&ReactionList> {
        self.lists.iter().find(|l| l.contains(reaction_id))
    }

    /// Every reaction: lists in list order, reactions in array order.
    pub fn all_reactions(&self) -> impl Iterator<Item = &Reaction> {
        self.lists.iter().flat_map(|l| l.reactions.iter())
    }

    pub fn global_index(&self, reaction_id: &str) -> Option<usize> {
        self.all_reactions().position(|r| r.id == reaction_id)
    }

    pub fn reaction_at(&self, plate: PlateId, pos: Position) -> Option<&Reaction> {
        self.all_reactions().find(|r| r.is_at(plate, pos))
    }

    pub fn reactions_on_plate(&self, plate: PlateId) -> Vec<&Reaction> {
        self.all_reactions()
            .filter(|r| r.plate_id() == Some(plate))
            .collect()
    }

    /// Ids of placed reactions, optionally only those on one plate.
    pub fn used_items(&self, plate: Option<PlateId>) -> BTreeSet<String> {
        self.all_reactions()
            .filter(|r| match (r.plate_id(), plate) {
                (Some(on), Some(wanted)) => on == wanted,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .map(|r| r.id.clone())
            .collect()
    }

    /// Replace a list's reactions (active list by default).
    ///
    /// Rejected as a whole when an incoming name is already used by a
    /// reaction in another list. Returns the new reaction ids.
    pub fn set_reactions(
        &mut self,
        records: Vec<ReactionRecord>,
        list: Option<ListId>,
    ) -> Result<Vec<String>, LayoutError> {
        let target = match list {
            Some(id) => self.list(id).ok_or(LayoutError::UnknownList(id))?.id,
            None => self.active_list_id()?,
        };

        let existing: HashSet<&str> = self
            .lists
            .iter()
            .filter(|l| l.id != target)
            .flat_map(|l| l.reactions.iter().map(|r| r.name.as_str()))
            .collect();

        let mut duplicates: Vec<String> = Vec::new();
        for rec in &records {
            if existing.contains(rec.name.as_str()) && !duplicates.contains(&rec.name) {
                duplicates.push(rec.name.clone());
            }
        }
        if !duplicates.is_empty() {
            tracing::info!(list = %target, ?duplicates, "import rejected: duplicate sample names");
            return Err(LayoutError::DuplicateSampleNames { names: duplicates });
        }

        let reactions: Vec<Reaction> = records
            .into_iter()
            .map(|rec| Reaction {
                id: uuid::Uuid::new_v4().to_string(),
                name: rec.name,
                primer: rec.primer,
                origin: rec.position.filter(|p| !p.trim().is_empty()),
                slot: None,
            })
            .collect();
        let ids: Vec<String> = reactions.iter().map(|r| r.id.clone()).collect();

        if let Some(l) = self.list_mut(target) {
            l.reactions = reactions;
            l.order = ids.clone();
        }
        tracing::info!(list = %target, count = ids.len(), "reactions replaced");
        Ok(ids)
    }

    /// Sole placement mutator. No occupancy check.
    pub(crate) fn set_slot(&mut self, reaction_id: &str, slot: Option<Slot>) -> bool {
        for list in &mut self.lists {
            if let Some(r) = list.find_mut(reaction_id) {
                r.slot = slot;
                return true;
            }
        }
        tracing::debug!(reaction = reaction_id, "move of unknown reaction ignored");
        false
    }

    /// Exchange placement of two reactions; no-op if either is unknown.
    pub fn swap_reactions(&mut self, a: &str, b: &str) -> bool {
        let (Some(slot_a), Some(slot_b)) = (
            self.reaction(a).map(|r| r.slot),
            self.reaction(b).map(|r| r.slot),
        ) else {
            return false;
        };
        self.set_slot(a, slot_b);
        self.set_slot(b, slot_a);
        true
    }

    /// Every reaction on `plate` goes back to unused. Returns how many moved.
    pub(crate) fn release_plate(&mut self, plate: PlateId) -> usize {
        let mut freed = 0;
        for r in self.lists.iter_mut().flat_map(|l| l.reactions.iter_mut()) {
            if r.plate_id() == Some(plate) {
                r.slot = None;
                freed += 1;
            }
        }
        freed
    }

    /// New empty list with the smallest free id and `List N` name; it
    /// becomes active.
    pub fn add_reaction_list(&mut self) -> ListId {
        let id = ListId(smallest_unused(self.lists.iter().map(|l| l.id.0)));
        let name = next_numbered_name(LIST_PREFIX, self.lists.iter().map(|l| l.name.as_str()));
        for l in &mut self.lists {
            l.is_active = false;
        }
        let mut list = ReactionList::new(id, name);
        list.is_active = true;
        tracing::info!(list = %id, name = %list.name, "reaction list added");
        self.lists.push(list);
        id
    }

    /// Remove a list and its reactions, unless it is the last list.
    pub fn remove_reaction_list(&mut self, id: ListId) -> Option<ReactionList> {
        if self.lists.len() <= 1 {
            tracing::debug!(list = %id, "refusing to delete the last reaction list");
            return None;
        }
        let idx = self.lists.iter().position(|l| l.id == id)?;
        let removed = self.lists.remove(idx);
        if removed.is_active {
            if let Some(first) = self.lists.first_mut() {
                first.is_active = true;
            }
        }
        tracing::info!(list = %id, name = %removed.name, "reaction list removed");
        Some(removed)
    }

    /// Rename a list. Names are unique across lists; a collision is rejected.
    pub fn rename_reaction_list(&mut self, id: ListId, name: &str) -> Result<(), LayoutError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LayoutError::EmptyName);
        }
        if self.lists.iter().any(|l| l.id != id && l.name == name) {
            return Err(LayoutError::DuplicateListName(name.to_string()));
        }
        let list = self.list_mut(id).ok_or(LayoutError::UnknownList(id))?;
        list.name = name.to_string();
        Ok(())
    }

    pub fn set_active_reaction_list(&mut self, id: ListId) -> bool {
        if self.list(id).is_none() {
            tracing::debug!(list = %id, "activate unknown list ignored");
            return false;
        }
        for l in &mut self.lists {
            l.is_active = l.id == id;
        }
        true
    }

    /// Repair a book loaded from storage. `plate_exists` tells which plate
    /// ids are still registered. Returns true if anything changed.
    pub(crate) fn restore_invariants(&mut self, plate_exists: impl Fn(PlateId) -> bool) -> bool {
        let mut changed = false;

        if self.lists.is_empty() {
            *self = Self::default();
            return true;
        }

        // unique list ids; later copies are renumbered
        let mut taken: BTreeSet<u32> = self.lists.iter().map(|l| l.id.0).collect();
        let mut seen_lists = HashSet::new();
        for l in &mut self.lists {
            if !seen_lists.insert(l.id) {
                let fresh = ListId(smallest_unused(taken.iter().copied()));
                tracing::warn!(list = %l.id, fresh = %fresh, "duplicate stored list id renumbered");
                taken.insert(fresh.0);
                seen_lists.insert(fresh);
                l.id = fresh;
                changed = true;
            }
        }

        // unique reaction ids across all lists; the first copy keeps the id
        // (and its order, selection and origin references)
        let mut seen_reactions: HashSet<String> = HashSet::new();
        for l in &mut self.lists {
            for r in &mut l.reactions {
                if !seen_reactions.insert(r.id.clone()) {
                    let fresh = uuid::Uuid::new_v4().to_string();
                    tracing::warn!(reaction = %r.id, fresh = %fresh, "duplicate stored reaction id replaced");
                    seen_reactions.insert(fresh.clone());
                    r.id = fresh;
                    changed = true;
                }
            }
        }

        // exactly one active list
        let first_active = self.lists.iter().position(|l| l.is_active);
        let keep = first_active.unwrap_or(0);
        for (i, l) in self.lists.iter_mut().enumerate() {
            let want = i == keep;
            if l.is_active != want {
                l.is_active = want;
                changed = true;
            }
        }

        // unique list names
        let mut names: HashSet<String> = HashSet::new();
        for l in &mut self.lists {
            if !names.insert(l.name.clone()) {
                let renamed = (2u32..)
                    .map(|n| format!("{} {n}", l.name))
                    .find(|c| !names.contains(c))
                    .unwrap_or_else(|| format!("{} {}", l.name, l.id));
                names.insert(renamed.clone());
                l.name = renamed;
                changed = true;
            }
        }

        // placements: known plates only, one reaction per well
        let mut occupied: HashSet<Slot> = HashSet::new();
        for r in self.lists.iter_mut().flat_map(|l| l.reactions.iter_mut()) {
            if let Some(slot) = r.slot {
                if !plate_exists(slot.plate_id) || !occupied.insert(slot) {
                    tracing::warn!(reaction = %r.id, "freeing reaction with invalid placement");
                    r.slot = None;
                    changed = true;
                }
            }
        }

        // order: known ids, no repeats
        for l in &mut self.lists {
            let known: HashSet<&str> = l.reactions.iter().map(|r| r.id.as_str()).collect();
            let mut seen = HashSet::new();
            let cleaned: Vec<String> = l
                .order
                .iter()
                .filter(|id| known.contains(id.as_str()) && seen.insert(id.as_str()))
                .cloned()
                .collect();
            if cleaned.len() != l.order.len() {
                l.order = cleaned;
                changed = true;
            }
        }

        changed
    }
}
