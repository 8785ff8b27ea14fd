use std::collections::BTreeSet;

use crate::Position;

/// Result of a first-fit scan: which reaction goes where, and which found
/// no free well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementPlan {
    pub assignments: Vec<(String, Position)>,
    pub unplaced: Vec<String>,
}

impl PlacementPlan {
    pub fn positions(&self) -> BTreeSet<Position> {
        self.assignments.iter().map(|(_, p)| *p).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Greedy row-major placement.
///
/// Each candidate, in input order, takes the first well at or after the
/// cursor that `is_blocked` does not reject; the cursor then moves to the
/// well after it. No backtracking. Candidates left when the grid runs out
/// stay unplaced.
pub fn plan(
    start: Position,
    candidates: &[String],
    mut is_blocked: impl FnMut(Position) -> bool,
) -> PlacementPlan {
    let mut out = PlacementPlan::default();
    let mut cursor = Some(start);

    for id in candidates {
        let found = cursor.and_then(|c| c.scan_from().find(|p| !is_blocked(*p)));
        match found {
            Some(pos) => {
                out.assignments.push((id.clone(), pos));
                cursor = pos.next();
            }
            None => {
                out.unplaced.push(id.clone());
                cursor = None;
            }
        }
    }

    out
}
