use std::collections::BTreeSet;
use std::mem;

use crate::export::{self, PlateExport};
use crate::placement::PlacementPlan;
use crate::{
    ClickModifier, Layout, LayoutError, ListId, Placement, PlateId, Position, ReactionRecord,
    Storage, WellStatus, import, persist,
};

/// Where the dragged reactions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOrigin {
    List,
    /// Picked up off the plate by clicking its well.
    Well(Position),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        payload: Vec<String>,
        origin: DragOrigin,
    },
}

/// A layout wired to storage, plus the transient drag state.
///
/// Every accepted mutation is written through to storage. A failed write
/// is logged and the in-memory layout is kept.
pub struct Editor<S: Storage> {
    layout: Layout,
    storage: S,
    key: String,
    drag: DragState,
    preview: BTreeSet<Position>,
}

impl<S: Storage> Editor<S> {
    /// Load whatever `storage` holds under `key` (defaults when nothing
    /// does), repair it, and write the repaired state back.
    pub fn open(storage: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let (mut layout, stored) = match storage.read(&key) {
            Ok(Some(text)) => (persist::decode(&text), true),
            Ok(None) => (Layout::default(), false),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "could not read stored layout; starting fresh");
                (Layout::default(), false)
            }
        };
        let repaired = layout.restore_invariants();

        let mut editor = Self::with_layout(storage, key, layout);
        if stored && repaired {
            editor.commit();
        }
        tracing::debug!(
            lists = editor.layout.book().lists().len(),
            plates = editor.layout.plates().len(),
            "editor opened"
        );
        editor
    }

    pub fn with_layout(storage: S, key: impl Into<String>, layout: Layout) -> Self {
        Self {
            layout,
            storage,
            key: key.into(),
            drag: DragState::Idle,
            preview: BTreeSet::new(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    pub fn preview(&self) -> &BTreeSet<Position> {
        &self.preview
    }

    fn commit(&mut self) {
        let written = persist::encode(&self.layout).and_then(|json| self.storage.write(&self.key, &json));
        if let Err(e) = written {
            tracing::warn!(key = %self.key, error = %e, "failed to persist layout");
        }
    }

    // ---- selection ----

    pub fn click_reaction(&mut self, id: &str, modifier: ClickModifier, view: &[&str]) -> bool {
        let accepted = self.layout.click_reaction(id, modifier, view);
        if accepted {
            self.commit();
        }
        accepted
    }

    pub fn clear_selection(&mut self) {
        self.layout.clear_selection();
        self.commit();
    }

    // ---- drag and drop ----

    /// Begin dragging a reaction of the active list. A reaction that is part
    /// of a multi-item selection drags the whole selection, in pick order.
    pub fn drag_start(&mut self, id: &str) -> bool {
        if !self.layout.book().in_active_list(id) {
            tracing::debug!(reaction = id, "drag from outside the active list ignored");
            return false;
        }
        let selection = self.layout.selection();
        let multi = selection.len() > 1 && selection.contains(id);
        let payload = if multi {
            selection.order().to_vec()
        } else {
            vec![id.to_string()]
        };

        self.drag = DragState::Dragging {
            payload,
            origin: DragOrigin::List,
        };
        self.preview.clear();
        if self.layout.is_multi_drag() != multi {
            self.layout.set_multi_drag(multi);
            self.commit();
        }
        true
    }

    /// Recompute the preview for the hovered well (`None` when off the grid).
    pub fn drag_over(&mut self, target: Option<Position>) -> &BTreeSet<Position> {
        self.preview = match (&self.drag, target) {
            (DragState::Dragging { payload, .. }, Some(pos)) => self.layout.preview(pos, payload),
            _ => BTreeSet::new(),
        };
        &self.preview
    }

    /// Finish the drag. Dropping on a well commits the placement; `None`
    /// cancels. Either way the editor is idle afterwards.
    pub fn drag_end(&mut self, target: Option<Position>) -> Result<PlacementPlan, LayoutError> {
        let state = mem::take(&mut self.drag);
        self.preview.clear();
        let was_multi = self.layout.is_multi_drag();
        self.layout.set_multi_drag(false);

        let outcome = match (state, target) {
            (DragState::Dragging { payload, .. }, Some(pos)) => {
                if payload.iter().all(|id| self.layout.book().in_active_list(id)) {
                    self.layout.commit_drop(pos, &payload)
                } else {
                    tracing::debug!("drop rejected: payload reaches outside the active list");
                    Ok(PlacementPlan::default())
                }
            }
            (DragState::Dragging { .. }, None) => {
                tracing::debug!("drag cancelled");
                Ok(PlacementPlan::default())
            }
            (DragState::Idle, _) => Ok(PlacementPlan::default()),
        };

        // the cleared multi-drag flag is stored even when the drop failed
        if was_multi || outcome.as_ref().is_ok_and(|plan| !plan.is_empty()) {
            self.commit();
        }
        outcome
    }

    /// Abandon any drag in progress without touching the layout.
    pub fn drag_cancel(&mut self) {
        if self.is_dragging() {
            self.drag = DragState::Idle;
            self.preview.clear();
            if self.layout.is_multi_drag() {
                self.layout.set_multi_drag(false);
                self.commit();
            }
        }
    }

    /// Pick a reaction of the active list up off the active plate. It goes
    /// back to unused and is being dragged until the next `drag_end`.
    pub fn click_well(&mut self, pos: Position) -> Option<String> {
        let id = self
            .layout
            .reaction_at(pos, None)
            .filter(|r| self.layout.book().in_active_list(&r.id))
            .map(|r| r.id.clone())?;

        match self.layout.move_reaction(&id, Placement::Unused) {
            Ok(true) => {}
            _ => return None,
        }
        self.drag = DragState::Dragging {
            payload: vec![id.clone()],
            origin: DragOrigin::Well(pos),
        };
        self.preview.clear();
        self.commit();
        Some(id)
    }

    /// Evict an active-list occupant, then advance the well's status.
    pub fn right_click_well(&mut self, pos: Position) -> Result<WellStatus, LayoutError> {
        let occupant = self
            .layout
            .reaction_at(pos, None)
            .filter(|r| self.layout.book().in_active_list(&r.id))
            .map(|r| r.id.clone());
        if let Some(id) = occupant {
            self.layout.move_reaction(&id, Placement::Unused)?;
        }
        let status = self.layout.cycle_well(pos)?;
        self.commit();
        Ok(status)
    }

    // ---- reactions ----

    /// Import clipboard text into a list (the active one by default).
    /// Returns how many reactions were created.
    pub fn paste(&mut self, text: &str, list: Option<ListId>) -> Result<usize, LayoutError> {
        let records = import::parse_clipboard(text)?;
        Ok(self.import(records, list)?.len())
    }

    pub fn import(
        &mut self,
        records: Vec<ReactionRecord>,
        list: Option<ListId>,
    ) -> Result<Vec<String>, LayoutError> {
        let active = self.layout.book().active_list_id().ok();
        let into_active = list.is_none() || list == active;
        let ids = self.layout.set_reactions(records, list)?;
        if into_active {
            self.layout.clear_selection();
        }
        self.commit();
        Ok(ids)
    }

    pub fn move_reaction(&mut self, id: &str, to: Placement) -> Result<bool, LayoutError> {
        let moved = self.layout.move_reaction(id, to)?;
        if moved {
            self.commit();
        }
        Ok(moved)
    }

    pub fn swap_reactions(&mut self, a: &str, b: &str) -> bool {
        let swapped = self.layout.swap_reactions(a, b);
        if swapped {
            self.commit();
        }
        swapped
    }

    pub fn reorder_reaction(&mut self, id: &str, to_index: usize) -> Result<bool, LayoutError> {
        let moved = self.layout.reorder_reaction(id, to_index)?;
        if moved {
            self.commit();
        }
        Ok(moved)
    }

    // ---- plates ----

    pub fn add_plate(&mut self) -> PlateId {
        let id = self.layout.add_plate();
        self.commit();
        id
    }

    pub fn rename_plate(&mut self, id: PlateId, name: &str) -> Result<String, LayoutError> {
        let applied = self.layout.rename_plate(id, name)?;
        self.commit();
        Ok(applied)
    }

    pub fn set_active_plate(&mut self, id: PlateId) -> bool {
        let changed = self.layout.set_active_plate(id);
        if changed {
            self.commit();
        }
        changed
    }

    pub fn delete_plate(&mut self, id: PlateId) -> bool {
        let deleted = self.layout.delete_plate(id);
        if deleted {
            self.commit();
        }
        deleted
    }

    /// Clear the active plate. Returns how many reactions went back to unused.
    pub fn reset_active_plate(&mut self) -> Result<usize, LayoutError> {
        let plate = self.layout.active_plate()?.id;
        let freed = self.layout.reset_plate(plate)?;
        self.commit();
        Ok(freed)
    }

    /// Start over with one empty list and one empty plate.
    pub fn reset_all(&mut self) {
        self.layout = Layout::default();
        self.drag = DragState::Idle;
        self.preview.clear();
        tracing::info!("layout reset to defaults");
        self.commit();
    }

    pub fn export_plate(&self, plate: PlateId) -> Result<PlateExport, LayoutError> {
        export::project(&self.layout, plate)
    }

    pub fn export_active_plate(&self) -> Result<PlateExport, LayoutError> {
        self.export_plate(self.layout.active_plate()?.id)
    }

    // ---- reaction lists ----

    pub fn add_reaction_list(&mut self) -> ListId {
        let id = self.layout.add_reaction_list();
        self.commit();
        id
    }

    pub fn remove_reaction_list(&mut self, id: ListId) -> bool {
        let removed = self.layout.remove_reaction_list(id);
        if removed {
            self.commit();
        }
        removed
    }

    pub fn rename_reaction_list(&mut self, id: ListId, name: &str) -> Result<(), LayoutError> {
        self.layout.rename_reaction_list(id, name)?;
        self.commit();
        Ok(())
    }

    pub fn set_active_reaction_list(&mut self, id: ListId) -> bool {
        let changed = self.layout.set_active_reaction_list(id);
        if changed {
            self.commit();
        }
        changed
    }
}
