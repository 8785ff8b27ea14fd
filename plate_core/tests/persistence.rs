use std::fs;

use plate_core::persist::{self, DEFAULT_KEY};
use plate_core::{
    Editor, FileStorage, ListId, Placement, PlateId, Position, Storage, WellStatus,
};

fn pos(s: &str) -> Position {
    Position::parse(s).unwrap()
}

#[test]
fn file_storage_survives_a_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let placed = {
        let mut editor = Editor::open(FileStorage::new(dir.path()), DEFAULT_KEY);
        editor.paste("S1\tP1\nS2\tP2", None)?;
        let id = editor.layout().active_list()?.reactions()[0].id.clone();
        editor.move_reaction(&id, Placement::Well(pos("D07")))?;
        editor.right_click_well(pos("E07"))?;
        editor.add_plate();
        id
    };

    assert!(dir.path().join("reactions-storage.json").exists());

    let editor = Editor::open(FileStorage::new(dir.path()), DEFAULT_KEY);
    let layout = editor.layout();
    assert_eq!(layout.plates().len(), 2);
    assert_eq!(layout.active_plate()?.id, PlateId(2));
    assert_eq!(
        layout.reaction(&placed).and_then(|r| r.slot()).map(|s| (s.plate_id, s.position)),
        Some((PlateId(1), pos("D07")))
    );
    assert_eq!(layout.well_status(PlateId(1), pos("E07")), WellStatus::Defunct);
    Ok(())
}

#[test]
fn missing_directory_starts_fresh() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = FileStorage::new(dir.path().join("not-yet"));
    assert_eq!(storage.read(DEFAULT_KEY)?, None);

    let mut editor = Editor::open(storage, DEFAULT_KEY);
    assert_eq!(editor.layout().active_plate()?.name, "Plate 1");

    editor.add_reaction_list();
    assert!(dir.path().join("not-yet").join("reactions-storage.json").exists());
    Ok(())
}

#[test]
fn corrupt_store_is_repaired_and_rewritten() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("reactions-storage.json");
    fs::write(
        &path,
        r#"{
            "plates": [{"id": "1", "name": "Plate 1", "isActive": false},
                       {"id": "2", "name": "Plate 2", "isActive": false}],
            "reactionLists": [{"id": "1", "name": "List 1", "isActive": true,
                "reactions": [
                    {"id": "a", "name": "S1", "primer": "P", "state": "A01", "plateId": "1"},
                    {"id": "b", "name": "S2", "primer": "P", "state": "A01", "plateId": "1"},
                    {"id": "c", "name": "S3", "primer": "P", "state": "B01", "plateId": "9"}
                ],
                "order": ["c", "b", "a", "zzz"]}],
            "ccWells": "broken",
            "selectedItems": ["a", "ghost"],
            "selectedOrder": ["ghost", "a"],
            "lastSelectedIndex": 40
        }"#,
    )?;

    let editor = Editor::open(FileStorage::new(dir.path()), DEFAULT_KEY);
    let layout = editor.layout();
    assert_eq!(layout.active_plate()?.id, PlateId(1));
    assert_eq!(layout.used_items(None).len(), 1);
    assert_eq!(layout.selection().order(), ["a"]);
    assert_eq!(layout.selection().last_selected_index(), None);
    assert_eq!(layout.active_list()?.order(), ["c", "b", "a"]);

    // the repaired state was written back
    let stored: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(stored["plates"][0]["isActive"], true);
    assert_eq!(stored["ccWells"], serde_json::json!([]));
    Ok(())
}

#[test]
fn lists_with_oversized_ids_survive_a_reload() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("reactions-storage.json"),
        r#"{
            "plates": [{"id": "1", "name": "Plate 1", "isActive": true}],
            "reactionLists": [
                {"id": "1", "name": "List 1", "isActive": true,
                 "reactions": [{"id": "a", "name": "S1", "primer": "P", "state": "unused"}]},
                {"id": "1718000000000", "name": "Imported", "isActive": false,
                 "reactions": [{"id": "b", "name": "S2", "primer": "P", "state": "B02", "plateId": "1"}]}
            ]
        }"#,
    )?;

    let editor = Editor::open(FileStorage::new(dir.path()), DEFAULT_KEY);
    let layout = editor.layout();
    let names: Vec<&str> = layout.book().lists().iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["List 1", "Imported"]);
    assert_eq!(layout.book().lists()[1].id, ListId(2));
    assert_eq!(
        layout.reaction("b").and_then(|r| r.slot()).map(|s| (s.plate_id, s.position)),
        Some((PlateId(1), pos("B02")))
    );

    // the repaired ids are what a second start sees
    let again = Editor::open(FileStorage::new(dir.path()), DEFAULT_KEY);
    assert_eq!(again.layout(), layout);
    Ok(())
}

#[test]
fn json_file_helpers_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("layout.json");

    let mut layout = plate_core::Layout::new();
    layout.add_plate();
    layout.toggle_control(PlateId(2), pos("H12"));
    persist::save_json_file(&layout, &path)?;

    let back = persist::load_json_file(&path)?;
    assert_eq!(back, layout);
    Ok(())
}
