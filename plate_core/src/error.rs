use thiserror::Error;

use crate::{ListId, PlateId};

/// Failures surfaced by layout operations.
///
/// Guard conditions (clicks on inactive lists, deleting the last plate, a
/// drag with nothing to place) are not errors; those operations report
/// `false`/`None` instead.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid well position '{0}'")]
    InvalidPosition(String),

    #[error("well position out of bounds: column index {column}, row {row}")]
    PositionOutOfBounds { column: u8, row: u8 },

    #[error("duplicate sample name(s) already used in another list: {}", names.join(", "))]
    DuplicateSampleNames { names: Vec<String> },

    #[error("a reaction list named '{0}' already exists")]
    DuplicateListName(String),

    #[error("name must not be empty")]
    EmptyName,

    #[error("unknown plate {0}")]
    UnknownPlate(PlateId),

    #[error("unknown reaction list {0}")]
    UnknownList(ListId),

    #[error("no active plate")]
    NoActivePlate,

    #[error("no active reaction list")]
    NoActiveList,

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),

    #[error("encode layout: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A clipboard row that could not be turned into a reaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based line number in the pasted text.
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("clipboard holds no reaction rows")]
    Empty,

    #[error("{} invalid row(s): {}", rows.len(), describe_rows(rows))]
    InvalidRows { rows: Vec<RowError> },
}

fn describe_rows(rows: &[RowError]) -> String {
    rows.iter()
        .map(|r| format!("line {}: {}", r.line, r.reason))
        .collect::<Vec<_>>()
        .join("; ")
}
