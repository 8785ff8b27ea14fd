//! Plate layout editor core: reaction lists, 96-well plates, well
//! annotations, first-fit placement and the drag/click state machine.

pub mod command;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod import;
pub mod layout;
pub mod persist;
pub mod placement;
pub mod plates;
pub mod position;
pub mod reactions;
pub mod selection;
pub mod telemetry;
pub mod wells;

mod ids;

pub use config::{EditorConfig, ExportConfig};
pub use editor::{DragOrigin, DragState, Editor};
pub use error::{ImportError, LayoutError, RowError};
pub use export::{PlateExport, WellContent, WellExport};
pub use ids::{ListId, PlateId};
pub use layout::Layout;
pub use persist::{FileStorage, MemoryStorage, Storage};
pub use placement::PlacementPlan;
pub use plates::{Plate, PlateRegistry};
pub use position::Position;
pub use reactions::{
    Placement, Reaction, ReactionBook, ReactionList, ReactionRecord, Slot, SortMethod,
};
pub use selection::{ClickModifier, Selection};
pub use wells::{WellLedger, WellStatus};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
