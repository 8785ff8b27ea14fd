use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::LayoutError;

/// Lettered axis: A..H.
pub const COLUMNS: u8 = 8;
/// Numbered axis: 1..12.
pub const ROWS: u8 = 12;
pub const WELLS: usize = COLUMNS as usize * ROWS as usize;

/// One well of a 96-well plate.
///
/// "Column" is the lettered axis (A..H) and "row" the numbered one (1..12).
/// Positions order row-major: A01, B01, .. H01, A02, ..
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Position {
    // field order drives the derived Ord
    row: u8,
    column: u8,
}

impl Position {
    pub const FIRST: Position = Position { row: 1, column: 0 };

    /// `column` is 0-based (0 = A), `row` is 1-based.
    pub fn new(column: u8, row: u8) -> Result<Self, LayoutError> {
        if column >= COLUMNS || !(1..=ROWS).contains(&row) {
            return Err(LayoutError::PositionOutOfBounds { column, row });
        }
        Ok(Self { row, column })
    }

    /// Column letter + row number, e.g. `('A', 3)` -> `A03`.
    pub fn from_letter(letter: char, row: u8) -> Result<Self, LayoutError> {
        let upper = letter.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return Err(LayoutError::InvalidPosition(format!("{letter}{row}")));
        }
        Self::new(upper as u8 - b'A', row)
    }

    /// Parse `A03` (or the unpadded `A3`).
    pub fn parse(text: &str) -> Result<Self, LayoutError> {
        let invalid = || LayoutError::InvalidPosition(text.to_string());

        let mut chars = text.trim().chars();
        let letter = chars.next().ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let row: u8 = digits.parse().map_err(|_| invalid())?;
        Self::from_letter(letter, row)
    }

    pub fn column_index(self) -> u8 {
        self.column
    }

    pub fn column_letter(self) -> char {
        (b'A' + self.column) as char
    }

    pub fn row(self) -> u8 {
        self.row
    }

    /// Row-major successor: next column, wrapping to the next row after H.
    pub fn next(self) -> Option<Self> {
        if self.column + 1 < COLUMNS {
            Some(Self {
                row: self.row,
                column: self.column + 1,
            })
        } else if self.row < ROWS {
            Some(Self {
                row: self.row + 1,
                column: 0,
            })
        } else {
            None
        }
    }

    /// This position and every later one, in scan order.
    pub fn scan_from(self) -> impl Iterator<Item = Position> {
        std::iter::successors(Some(self), |p| p.next())
    }

    /// All 96 wells, row 1 first, A..H within a row.
    pub fn all() -> impl Iterator<Item = Position> {
        Self::FIRST.scan_from()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.column_letter(), self.row)
    }
}

impl FromStr for Position {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Position {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Position> for String {
    fn from(p: Position) -> Self {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_padded_row() -> anyhow::Result<()> {
        assert_eq!(Position::from_letter('A', 3)?.to_string(), "A03");
        assert_eq!(Position::new(7, 12)?.to_string(), "H12");
        Ok(())
    }

    #[test]
    fn parses_back_to_column_and_row() -> anyhow::Result<()> {
        let p = Position::parse("C11")?;
        assert_eq!(p.column_index(), 2);
        assert_eq!(p.column_letter(), 'C');
        assert_eq!(p.row(), 11);
        assert_eq!(Position::parse("b5")?, Position::parse("B05")?);
        Ok(())
    }

    #[test]
    fn rejects_out_of_grid() {
        assert!(Position::parse("I01").is_err());
        assert!(Position::parse("A13").is_err());
        assert!(Position::parse("A00").is_err());
        assert!(Position::parse("A").is_err());
        assert!(Position::parse("").is_err());
        assert!(Position::parse("A1x").is_err());
        assert!(Position::new(8, 1).is_err());
    }

    #[test]
    fn successor_wraps_after_h() -> anyhow::Result<()> {
        assert_eq!(Position::parse("B05")?.next(), Some(Position::parse("C05")?));
        assert_eq!(Position::parse("H05")?.next(), Some(Position::parse("A06")?));
        assert_eq!(Position::parse("H12")?.next(), None);
        Ok(())
    }

    #[test]
    fn enumerates_96_wells_in_row_major_order() {
        let all: Vec<_> = Position::all().collect();
        assert_eq!(all.len(), WELLS);
        assert_eq!(all[0].to_string(), "A01");
        assert_eq!(all[8].to_string(), "A02");
        assert_eq!(all[95].to_string(), "H12");
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn serializes_as_string() -> anyhow::Result<()> {
        let p = Position::parse("D07")?;
        assert_eq!(serde_json::to_string(&p)?, "\"D07\"");
        let back: Position = serde_json::from_str("\"D07\"")?;
        assert_eq!(back, p);
        assert!(serde_json::from_str::<Position>("\"Z99\"").is_err());
        Ok(())
    }
}
