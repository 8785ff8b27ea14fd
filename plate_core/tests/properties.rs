use std::collections::{BTreeSet, HashSet};

use plate_core::persist::{self, DEFAULT_KEY};
use plate_core::{ClickModifier, Editor, MemoryStorage, Placement, PlateId, Position};
use proptest::prelude::*;
use serde_json::json;

const REACTIONS: usize = 12;

#[derive(Debug, Clone)]
enum Op {
    Click(usize, u8),
    Drag(usize, u8),
    Move(usize, Option<u8>),
    Swap(usize, usize),
    Mark(u8),
    Pickup(u8),
    AddPlate,
    DeletePlate(u32),
    SwitchPlate(u32),
    ResetPlate,
}

fn well(i: u8) -> Position {
    Position::all().nth(usize::from(i) % 96).unwrap()
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..REACTIONS, 0..3u8).prop_map(|(r, m)| Op::Click(r, m)),
        (0..REACTIONS, 0..96u8).prop_map(|(r, w)| Op::Drag(r, w)),
        (0..REACTIONS, proptest::option::of(0..96u8)).prop_map(|(r, w)| Op::Move(r, w)),
        (0..REACTIONS, 0..REACTIONS).prop_map(|(a, b)| Op::Swap(a, b)),
        (0..96u8).prop_map(Op::Mark),
        (0..96u8).prop_map(Op::Pickup),
        Just(Op::AddPlate),
        (1..5u32).prop_map(Op::DeletePlate),
        (1..5u32).prop_map(Op::SwitchPlate),
        Just(Op::ResetPlate),
    ]
}

fn fresh() -> (Editor<MemoryStorage>, Vec<String>) {
    let mut editor = Editor::open(MemoryStorage::new(), DEFAULT_KEY);
    let rows: String = (0..REACTIONS).map(|i| format!("S{i}\tP{}\n", i % 3)).collect();
    editor.paste(&rows, None).unwrap();
    let ids = editor
        .layout()
        .active_list()
        .unwrap()
        .ordered()
        .iter()
        .map(|r| r.id.clone())
        .collect();
    (editor, ids)
}

fn apply(editor: &mut Editor<MemoryStorage>, ids: &[String], op: &Op) {
    let view: Vec<&str> = ids.iter().map(String::as_str).collect();
    match *op {
        Op::Click(r, m) => {
            let modifier = match m {
                0 => ClickModifier::None,
                1 => ClickModifier::Toggle,
                _ => ClickModifier::Range,
            };
            editor.click_reaction(&ids[r], modifier, &view);
        }
        Op::Drag(r, w) => {
            if editor.drag_start(&ids[r]) {
                editor.drag_over(Some(well(w)));
                editor.drag_end(Some(well(w))).unwrap();
            }
        }
        Op::Move(r, w) => {
            // raw moves skip occupancy checks, so only target free wells
            let to = match w.map(well) {
                Some(p) if editor.layout().reaction_at(p, None).is_none() => Placement::Well(p),
                Some(_) => return,
                None => Placement::Unused,
            };
            editor.move_reaction(&ids[r], to).unwrap();
        }
        Op::Swap(a, b) => {
            editor.swap_reactions(&ids[a], &ids[b]);
        }
        Op::Mark(w) => {
            editor.right_click_well(well(w)).unwrap();
        }
        Op::Pickup(w) => {
            if editor.click_well(well(w)).is_some() {
                editor.drag_end(None).unwrap();
            }
        }
        Op::AddPlate => {
            editor.add_plate();
        }
        Op::DeletePlate(id) => {
            editor.delete_plate(PlateId(id));
        }
        Op::SwitchPlate(id) => {
            editor.set_active_plate(PlateId(id));
        }
        Op::ResetPlate => {
            editor.reset_active_plate().unwrap();
        }
    }
}

proptest! {
    #[test]
    fn prop_layout_invariants_hold(ops in proptest::collection::vec(op(), 1..60)) {
        let (mut editor, ids) = fresh();
        for op in &ops {
            apply(&mut editor, &ids, op);

            let layout = editor.layout();
            let mut occupied = HashSet::new();
            for r in layout.book().all_reactions() {
                // unused exactly when there is no plate
                prop_assert_eq!(r.is_unused(), r.plate_id().is_none());
                if let Some(slot) = r.slot() {
                    prop_assert!(layout.plates().contains(slot.plate_id));
                    prop_assert!(occupied.insert(slot), "two reactions in {:?}", slot);
                }
            }

            prop_assert_eq!(layout.plates().plates().iter().filter(|p| p.is_active).count(), 1);

            let sel = layout.selection();
            let ordered: BTreeSet<String> = sel.order().iter().cloned().collect();
            prop_assert_eq!(&ordered, sel.items());
            prop_assert_eq!(ordered.len(), sel.order().len());
        }
    }

    #[test]
    fn prop_stored_state_reloads_identically(ops in proptest::collection::vec(op(), 0..30)) {
        let (mut editor, ids) = fresh();
        for op in &ops {
            apply(&mut editor, &ids, op);
        }
        let before = editor.layout().clone();
        let reopened = Editor::open(editor.into_storage(), DEFAULT_KEY);
        prop_assert_eq!(reopened.layout(), &before);
    }

    #[test]
    fn prop_decode_never_panics(text in "\\PC*") {
        let mut layout = persist::decode(&text);
        layout.restore_invariants();
        prop_assert!(layout.active_plate().is_ok());
        prop_assert!(layout.active_list().is_ok());
    }

    #[test]
    fn prop_stored_ids_are_repaired_not_dropped(
        plate_ids in proptest::collection::vec(stored_id(), 1..5),
        lists in proptest::collection::vec((stored_id(), any::<bool>(), 0..5usize, 0..96u8), 1..5),
    ) {
        let plates: Vec<_> = plate_ids
            .iter()
            .enumerate()
            .map(|(i, id)| json!({"id": id, "name": format!("P{i}"), "isActive": i == 0}))
            .collect();
        let stored_lists: Vec<_> = lists
            .iter()
            .enumerate()
            .map(|(i, (id, shared, plate, w))| {
                let reaction_id = if *shared { "dup".to_string() } else { format!("r{i}") };
                let plate_id = &plate_ids[plate % plate_ids.len()];
                json!({
                    "id": id,
                    "name": format!("L{i}"),
                    "isActive": i == 0,
                    "reactions": [{"id": reaction_id, "name": format!("S{i}"), "primer": "P",
                                   "state": well(*w).to_string(), "plateId": plate_id}],
                    "order": [reaction_id],
                })
            })
            .collect();
        let text = json!({"plates": plates, "reactionLists": stored_lists}).to_string();

        let mut layout = persist::decode(&text);
        layout.restore_invariants();

        prop_assert_eq!(layout.plates().len(), plate_ids.len());
        prop_assert_eq!(layout.book().lists().len(), lists.len());
        prop_assert_eq!(layout.book().all_reactions().count(), lists.len());

        let unique_plates: HashSet<PlateId> = layout.plates().plates().iter().map(|p| p.id).collect();
        prop_assert_eq!(unique_plates.len(), plate_ids.len());
        let unique_lists: HashSet<_> = layout.book().lists().iter().map(|l| l.id).collect();
        prop_assert_eq!(unique_lists.len(), lists.len());
        let unique_reactions: HashSet<&str> =
            layout.book().all_reactions().map(|r| r.id.as_str()).collect();
        prop_assert_eq!(unique_reactions.len(), lists.len());

        let ids: Vec<PlateId> = unique_plates.into_iter().collect();
        for id in ids {
            prop_assert!(layout.set_active_plate(id));
            let active = layout.plates().plates().iter().filter(|p| p.is_active).count();
            prop_assert_eq!(active, 1);
        }
    }
}

/// Stored id text: valid, repeated, too large for a u32, or not a number.
fn stored_id() -> impl Strategy<Value = String> {
    prop_oneof![
        (1..4u32).prop_map(|n| n.to_string()),
        Just("1718000000000".to_string()),
        Just("plate-a".to_string()),
        Just(String::new()),
    ]
}
