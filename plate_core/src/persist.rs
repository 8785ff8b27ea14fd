use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::smallest_unused;
use crate::reactions::Slot;
use crate::{
    Layout, LayoutError, ListId, Plate, PlateId, PlateRegistry, Position, Reaction, ReactionBook,
    ReactionList, Selection, WellLedger,
};

pub const DEFAULT_KEY: &str = "reactions-storage";

/// Key/value store the editor writes through to.
pub trait Storage {
    fn read(&self, key: &str) -> Result<Option<String>, LayoutError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), LayoutError>;
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, LayoutError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), LayoutError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, LayoutError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), LayoutError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---- stored shape ----

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredReaction {
    id: String,
    name: String,
    primer: String,
    state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    plate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredList {
    #[serde(deserialize_with = "id_text")]
    id: String,
    name: String,
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    reactions: Vec<StoredReaction>,
    #[serde(default)]
    order: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPlate {
    #[serde(deserialize_with = "id_text")]
    id: String,
    name: String,
    #[serde(default)]
    is_active: bool,
}

/// Ids are written as strings; older data may hold bare numbers.
fn id_text<'de, D: serde::Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected id {other}"))),
    }
}

/// `[[plateId, [pos, ..]], ..]`
type StoredWells = Vec<(String, Vec<String>)>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredLayout {
    reaction_lists: Vec<StoredList>,
    plates: Vec<Plate>,
    selected_items: Vec<String>,
    selected_order: Vec<String>,
    last_selected_index: i64,
    defunct_wells: StoredWells,
    cc_wells: StoredWells,
    is_multi_drag: bool,
}

// ---- encode ----

/// Serialize the persisted slice of a layout (the preview is never stored).
pub fn encode(layout: &Layout) -> Result<String, LayoutError> {
    let stored = StoredLayout {
        reaction_lists: layout.book.lists().iter().map(store_list).collect(),
        plates: layout.plates.plates().to_vec(),
        selected_items: layout.selection.items().iter().cloned().collect(),
        selected_order: layout.selection.order().to_vec(),
        last_selected_index: layout
            .selection
            .last_selected_index()
            .and_then(|i| i64::try_from(i).ok())
            .unwrap_or(-1),
        defunct_wells: store_wells(layout.wells.defunct_map()),
        cc_wells: store_wells(layout.wells.control_map()),
        is_multi_drag: layout.multi_drag,
    };
    Ok(serde_json::to_string_pretty(&stored)?)
}

fn store_list(list: &ReactionList) -> StoredList {
    StoredList {
        id: list.id.to_string(),
        name: list.name.clone(),
        is_active: list.is_active,
        reactions: list.reactions().iter().map(store_reaction).collect(),
        order: list.order().to_vec(),
    }
}

fn store_reaction(r: &Reaction) -> StoredReaction {
    StoredReaction {
        id: r.id.clone(),
        name: r.name.clone(),
        primer: r.primer.clone(),
        state: r.state_label(),
        plate_id: r.plate_id().map(|p| p.to_string()),
        position: r.origin.clone(),
    }
}

fn store_wells(map: &BTreeMap<PlateId, BTreeSet<Position>>) -> StoredWells {
    map.iter()
        .map(|(plate, wells)| {
            (
                plate.to_string(),
                wells.iter().map(Position::to_string).collect(),
            )
        })
        .collect()
}

// ---- decode ----

/// Rebuild a layout from stored text.
///
/// Never fails: text that is not a JSON object yields the default layout,
/// and each malformed field falls back to its default on its own. The
/// result still needs `Layout::restore_invariants`.
pub fn decode(text: &str) -> Layout {
    let root: Map<String, Value> = match serde_json::from_str(text) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::warn!("stored layout is not a JSON object; starting fresh");
            return Layout::default();
        }
        Err(e) => {
            tracing::warn!(error = %e, "stored layout is not valid JSON; starting fresh");
            return Layout::default();
        }
    };

    let stored_plates = field::<Vec<StoredPlate>>(&root, "plates");
    let plate_ids = match &stored_plates {
        Some(plates) => StoredIds::assign(plates.iter().map(|p| p.id.as_str()), "plate"),
        None => StoredIds::default(),
    };
    let plates = stored_plates
        .map(|plates| {
            let plates = plates
                .into_iter()
                .zip(&plate_ids.assigned)
                .map(|(p, id)| Plate {
                    id: PlateId(*id),
                    name: p.name,
                    is_active: p.is_active,
                })
                .collect();
            PlateRegistry::from_plates(plates)
        })
        .unwrap_or_default();

    let book = field::<Vec<StoredList>>(&root, "reactionLists")
        .map(|lists| {
            let list_ids = StoredIds::assign(lists.iter().map(|l| l.id.as_str()), "list");
            let lists = lists
                .into_iter()
                .zip(list_ids.assigned)
                .map(|(l, id)| load_list(l, ListId(id), &plate_ids))
                .collect();
            ReactionBook::from_lists(lists)
        })
        .unwrap_or_default();

    let items: BTreeSet<String> = field(&root, "selectedItems").unwrap_or_default();
    let order: Vec<String> = field(&root, "selectedOrder").unwrap_or_default();
    let anchor = field::<i64>(&root, "lastSelectedIndex")
        .and_then(|i| usize::try_from(i).ok());
    let selection = Selection::from_parts(items, order, anchor);

    let defunct = field::<StoredWells>(&root, "defunctWells")
        .map(|w| load_wells(w, "defunctWells", &plate_ids))
        .unwrap_or_default();
    let control = field::<StoredWells>(&root, "ccWells")
        .map(|w| load_wells(w, "ccWells", &plate_ids))
        .unwrap_or_default();

    Layout {
        book,
        plates,
        wells: WellLedger::from_maps(defunct, control),
        selection,
        multi_drag: field(&root, "isMultiDrag").unwrap_or(false),
    }
}

/// Decode one top-level field; a missing key or a wrong shape gives None.
fn field<T: DeserializeOwned>(root: &Map<String, Value>, key: &str) -> Option<T> {
    let value = root.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(field = key, error = %e, "malformed stored field; using default");
            None
        }
    }
}

/// Numeric ids for stored id strings.
///
/// Ids that parse and are not yet taken are kept; unparsable or repeated
/// ones get the smallest free number. References resolve to whatever the
/// first record with that text received.
#[derive(Debug, Default)]
struct StoredIds {
    assigned: Vec<u32>,
    by_text: HashMap<String, u32>,
}

impl StoredIds {
    fn assign<'a>(texts: impl Iterator<Item = &'a str> + Clone, kind: &str) -> Self {
        let mut taken = BTreeSet::new();
        let kept: Vec<Option<u32>> = texts
            .clone()
            .map(|t| t.trim().parse::<u32>().ok().filter(|n| taken.insert(*n)))
            .collect();

        let mut out = Self::default();
        for (text, id) in texts.zip(kept) {
            let id = id.unwrap_or_else(|| {
                let fresh = smallest_unused(taken.iter().copied());
                taken.insert(fresh);
                tracing::warn!(kind, stored = %text, fresh, "stored id reassigned");
                fresh
            });
            out.by_text.entry(text.to_string()).or_insert(id);
            out.assigned.push(id);
        }
        out
    }

    fn resolve(&self, text: &str) -> Option<u32> {
        self.by_text
            .get(text)
            .copied()
            .or_else(|| text.trim().parse().ok())
    }
}

fn load_list(stored: StoredList, id: ListId, plates: &StoredIds) -> ReactionList {
    let reactions = stored
        .reactions
        .into_iter()
        .map(|r| load_reaction(r, plates))
        .collect();
    ReactionList::from_parts(id, stored.name, stored.is_active, reactions, stored.order)
}

/// `state` and `plateId` must agree; anything else leaves the reaction unused.
fn load_reaction(stored: StoredReaction, plates: &StoredIds) -> Reaction {
    let placed = Position::parse(&stored.state).ok();
    let plate = stored
        .plate_id
        .as_deref()
        .and_then(|p| plates.resolve(p))
        .map(PlateId);
    let slot = match (placed, plate) {
        (Some(position), Some(plate_id)) => Some(Slot { plate_id, position }),
        (None, None) => None,
        _ => {
            tracing::warn!(reaction = %stored.id, state = %stored.state, "inconsistent stored placement; reaction freed");
            None
        }
    };

    let mut r = Reaction::new(stored.id, stored.name, stored.primer).with_slot(slot);
    r.origin = stored.position.filter(|p| !p.trim().is_empty());
    r
}

fn load_wells(
    stored: StoredWells,
    field: &str,
    plates: &StoredIds,
) -> BTreeMap<PlateId, BTreeSet<Position>> {
    let mut out: BTreeMap<PlateId, BTreeSet<Position>> = BTreeMap::new();
    for (plate, wells) in stored {
        let Some(plate) = plates.resolve(&plate).map(PlateId) else {
            tracing::warn!(field, plate = %plate, "skipping wells of invalid plate id");
            continue;
        };
        let set = out.entry(plate).or_default();
        for w in wells {
            match Position::parse(&w) {
                Ok(p) => {
                    set.insert(p);
                }
                Err(_) => tracing::warn!(field, well = %w, "skipping invalid stored well"),
            }
        }
    }
    out
}

// ---- files ----

/// Write a layout to an arbitrary JSON file.
pub fn save_json_file(layout: &Layout, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let json = encode(layout).context("serialize layout to json")?;
    fs::write(path.as_ref(), json).context("write layout json file")?;
    Ok(())
}

/// Read a layout from an arbitrary JSON file, repairing it on the way in.
pub fn load_json_file(path: impl AsRef<Path>) -> anyhow::Result<Layout> {
    let text = fs::read_to_string(path.as_ref()).context("read layout json file")?;
    let mut layout = decode(&text);
    layout.restore_invariants();
    Ok(layout)
}
