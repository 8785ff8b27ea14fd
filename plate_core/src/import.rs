use crate::ReactionRecord;
use crate::error::{ImportError, RowError};

/// Parse tab-separated clipboard text into reaction records.
///
/// Two columns read as `name, primer`; three or more as
/// `position, name, primer`. A `;`-separated primer cell expands into one
/// record per primer. `/` in sample names becomes `-`. Blank lines are
/// skipped. Any bad row rejects the whole paste.
pub fn parse_clipboard(text: &str) -> Result<Vec<ReactionRecord>, ImportError> {
    let mut records = Vec::new();
    let mut bad = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let cells: Vec<&str> = line.split('\t').map(str::trim).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }

        let (position, name, primers) = match cells.as_slice() {
            [name] => (None, *name, ""),
            [name, primers] => (None, *name, *primers),
            [position, name, primers, ..] => (Some(*position), *name, *primers),
            [] => continue,
        };

        let line = i + 1;
        let name = name.replace('/', "-");
        if name.is_empty() {
            bad.push(RowError {
                line,
                reason: "missing sample name".into(),
            });
            continue;
        }

        let primers: Vec<&str> = primers
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if primers.is_empty() {
            bad.push(RowError {
                line,
                reason: format!("missing primer for '{name}'"),
            });
            continue;
        }

        let position = position.filter(|p| !p.is_empty());
        for primer in primers {
            let mut rec = ReactionRecord::new(name.clone(), primer);
            if let Some(p) = position {
                rec = rec.at(p);
            }
            records.push(rec);
        }
    }

    if !bad.is_empty() {
        tracing::info!(rows = bad.len(), "paste rejected");
        return Err(ImportError::InvalidRows { rows: bad });
    }
    if records.is_empty() {
        return Err(ImportError::Empty);
    }
    tracing::debug!(records = records.len(), "clipboard parsed");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_columns_are_name_and_primer() -> anyhow::Result<()> {
        let recs = parse_clipboard("S1\tP1\nS2\tP2\n")?;
        assert_eq!(
            recs,
            [ReactionRecord::new("S1", "P1"), ReactionRecord::new("S2", "P2")]
        );
        Ok(())
    }

    #[test]
    fn three_columns_carry_a_source_position() -> anyhow::Result<()> {
        let recs = parse_clipboard("A1\tS1\tP1\r\nB1\tS2\tP2")?;
        assert_eq!(recs[0], ReactionRecord::new("S1", "P1").at("A1"));
        assert_eq!(recs[1].position.as_deref(), Some("B1"));
        Ok(())
    }

    #[test]
    fn primer_lists_expand_and_slashes_become_dashes() -> anyhow::Result<()> {
        let recs = parse_clipboard("Sample/1\tP1; P2;\n")?;
        assert_eq!(
            recs,
            [
                ReactionRecord::new("Sample-1", "P1"),
                ReactionRecord::new("Sample-1", "P2"),
            ]
        );
        Ok(())
    }

    #[test]
    fn blank_lines_are_skipped() -> anyhow::Result<()> {
        let recs = parse_clipboard("\n\nS1\tP1\n\t\n")?;
        assert_eq!(recs.len(), 1);
        Ok(())
    }

    #[test]
    fn bad_rows_reject_the_whole_paste() {
        let err = parse_clipboard("S1\tP1\n\tP2\nS3\n").unwrap_err();
        let ImportError::InvalidRows { rows } = err else {
            panic!("expected invalid rows, got {err:?}");
        };
        assert_eq!(rows.iter().map(|r| r.line).collect::<Vec<_>>(), [2, 3]);
    }

    #[test]
    fn empty_paste_is_an_error() {
        assert_eq!(parse_clipboard("  \n\n"), Err(ImportError::Empty));
    }
}
