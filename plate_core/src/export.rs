use crate::config::ExportConfig;
use crate::{Layout, LayoutError, PlateId, Position};

/// What a well holds, as printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WellContent {
    Reaction {
        name: String,
        primer: String,
        /// `<list name>-<origin position>` when the reaction came with one.
        source: Option<String>,
    },
    Defunct,
    Control,
    Empty,
}

impl WellContent {
    pub fn label(&self) -> String {
        match self {
            WellContent::Reaction { name, primer, .. } => format!("{name}-{primer}"),
            WellContent::Defunct => "Defunct".into(),
            WellContent::Control => "CC".into(),
            WellContent::Empty => "-".into(),
        }
    }

    /// Label in "well mode": the source coordinate when known.
    pub fn source_label(&self) -> String {
        match self {
            WellContent::Reaction {
                source: Some(src), ..
            } => src.clone(),
            other => other.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellExport {
    pub position: Position,
    pub content: WellContent,
}

/// All 96 wells of one plate, row 1 first, A..H within a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateExport {
    pub plate_id: PlateId,
    pub plate_name: String,
    pub wells: Vec<WellExport>,
}

impl PlateExport {
    pub fn well(&self, pos: Position) -> Option<&WellContent> {
        self.wells
            .iter()
            .find(|w| w.position == pos)
            .map(|w| &w.content)
    }
}

/// Project a plate into printable form. A reaction wins over the well
/// status; defunct wins over control.
pub fn project(layout: &Layout, plate: PlateId) -> Result<PlateExport, LayoutError> {
    let info = layout
        .plates()
        .get(plate)
        .ok_or(LayoutError::UnknownPlate(plate))?;

    let wells = Position::all()
        .map(|pos| {
            let content = match layout.reaction_at(pos, Some(plate)) {
                Some(r) => WellContent::Reaction {
                    name: r.name.clone(),
                    primer: r.primer.clone(),
                    source: r.origin.as_ref().and_then(|origin| {
                        layout
                            .book()
                            .list_of(&r.id)
                            .map(|l| format!("{}-{origin}", l.name))
                    }),
                },
                None if layout.wells().defunct(plate).contains(&pos) => WellContent::Defunct,
                None if layout.wells().control(plate).contains(&pos) => WellContent::Control,
                None => WellContent::Empty,
            };
            WellExport {
                position: pos,
                content,
            }
        })
        .collect();

    Ok(PlateExport {
        plate_id: plate,
        plate_name: info.name.clone(),
        wells,
    })
}

/// Render the sequencer plate record: five header rows, then one row per
/// well. Cells joined by tabs, rows by newlines.
pub fn render_tsv(export: &PlateExport, cfg: &ExportConfig) -> String {
    let wells: Vec<(String, String)> = export
        .wells
        .iter()
        .map(|w| (w.position.to_string(), w.content.label()))
        .collect();
    let name = export.plate_name.as_str();
    let mut rows: Vec<Vec<&str>> = vec![
        vec![
            "Container Name",
            "Plate ID",
            "Description",
            "ContainerType",
            "AppType",
            "Owner",
            "Operator",
            "PlateSealin",
            "SchedulingPref",
        ],
        vec![
            name,
            name,
            "",
            cfg.container_type.as_str(),
            cfg.app_type.as_str(),
            cfg.owner.as_str(),
            cfg.operator.as_str(),
            cfg.plate_sealing.as_str(),
            cfg.scheduling_pref.as_str(),
        ],
        vec!["AppServer", "AppInstance"],
        vec!["SequencingAnalysis"],
        vec![
            "Well",
            "Sample Name",
            "Comment",
            "Results Group 1",
            "Instrument Protocol 1",
            "Analysis Protocol 1",
        ],
    ];

    for (pos, label) in &wells {
        rows.push(vec![
            pos.as_str(),
            label.as_str(),
            "",
            cfg.results_group.as_str(),
            cfg.instrument_protocol.as_str(),
            cfg.analysis_protocol.as_str(),
        ]);
    }

    rows.iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Suggested file name for an exported plate.
pub fn file_name(export: &PlateExport) -> String {
    let stem: String = export
        .plate_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        return "plate.tsv".to_string();
    }
    format!("{stem}.tsv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Placement, ReactionRecord};

    fn pos(s: &str) -> Position {
        Position::parse(s).unwrap()
    }

    fn layout() -> anyhow::Result<Layout> {
        let mut layout = Layout::new();
        let ids = layout.set_reactions(
            vec![
                ReactionRecord::new("S1", "P1").at("C7"),
                ReactionRecord::new("S2", "P2"),
            ],
            None,
        )?;
        layout.move_reaction(&ids[0], Placement::Well(pos("A01")))?;
        layout.move_reaction(&ids[1], Placement::Well(pos("B01")))?;
        layout.toggle_defunct(PlateId(1), pos("C01"));
        layout.toggle_control(PlateId(1), pos("D01"));
        Ok(layout)
    }

    #[test]
    fn projection_labels_every_well() -> anyhow::Result<()> {
        let export = project(&layout()?, PlateId(1))?;
        assert_eq!(export.wells.len(), 96);
        assert_eq!(export.wells[1].position, pos("B01"));
        assert_eq!(export.wells[8].position, pos("A02"));

        let labels: Vec<String> = export.wells[..5].iter().map(|w| w.content.label()).collect();
        assert_eq!(labels, ["S1-P1", "S2-P2", "Defunct", "CC", "-"]);
        Ok(())
    }

    #[test]
    fn source_uses_list_name_and_origin() -> anyhow::Result<()> {
        let export = project(&layout()?, PlateId(1))?;
        assert_eq!(export.wells[0].content.source_label(), "List 1-C7");
        assert_eq!(export.wells[1].content.source_label(), "S2-P2");
        Ok(())
    }

    #[test]
    fn unknown_plate_is_an_error() -> anyhow::Result<()> {
        assert!(matches!(
            project(&layout()?, PlateId(5)),
            Err(LayoutError::UnknownPlate(PlateId(5)))
        ));
        Ok(())
    }

    #[test]
    fn tsv_has_headers_and_96_rows() -> anyhow::Result<()> {
        let export = project(&layout()?, PlateId(1))?;
        let tsv = render_tsv(&export, &ExportConfig::default());
        let lines: Vec<&str> = tsv.lines().collect();

        assert_eq!(lines.len(), 5 + 96);
        assert!(lines[0].starts_with("Container Name\tPlate ID\t"));
        assert_eq!(lines[1], "Plate 1\tPlate 1\t\t96-Well\tRegular\tW\tW\tSepta\t1234");
        assert_eq!(lines[2], "AppServer\tAppInstance");
        assert_eq!(lines[3], "SequencingAnalysis");
        assert_eq!(lines[5], "A01\tS1-P1\t\tATANTARES\tLONG\tATANTARES");
        assert_eq!(lines[100], "H12\t-\t\tATANTARES\tLONG\tATANTARES");
        assert!(!tsv.ends_with('\n'));
        Ok(())
    }

    #[test]
    fn file_name_is_sanitised() {
        let export = PlateExport {
            plate_id: PlateId(1),
            plate_name: "Run 3/A".into(),
            wells: Vec::new(),
        };
        assert_eq!(file_name(&export), "Run_3_A.tsv");

        let unnamed = PlateExport {
            plate_name: String::new(),
            ..export
        };
        assert_eq!(file_name(&unnamed), "plate.tsv");
    }
}
