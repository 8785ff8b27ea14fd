use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use eframe::egui;
use plate_core::{
    ClickModifier, DragOrigin, DragState, Editor, EditorConfig, FileStorage, LayoutError, ListId,
    PlateId, Position, SortMethod, WellStatus, export,
};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = EditorConfig::load(config_path.as_deref()).context("load config")?;
    plate_core::telemetry::init(&config.logging.filter);

    let storage = FileStorage::new(config.storage.resolved_dir());
    let editor = Editor::open(storage, config.storage.key.clone());

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Plate Layout",
        options,
        Box::new(|_cc| Ok(Box::new(PlateApp::new(editor, config)))),
    )
    .map_err(|e| anyhow::anyhow!("run gui: {e}"))
}

/// One row of the reaction list panel.
struct ItemView {
    id: String,
    name: String,
    primer: String,
    state: String,
    selected: bool,
    rank: Option<usize>,
}

/// What a well button shows.
struct CellView {
    pos: Position,
    text: String,
    fill: egui::Color32,
}

struct PlateApp {
    editor: Editor<FileStorage>,
    config: EditorConfig,

    // UI state
    sort: SortMethod,
    hovered: Option<Position>,
    plate_name: String,
    list_name: String,
    import_text: String,
    status: Option<String>,
    last_error: Option<String>,
}

impl PlateApp {
    fn new(editor: Editor<FileStorage>, config: EditorConfig) -> Self {
        let mut app = Self {
            editor,
            config,
            sort: SortMethod::Sample,
            hovered: None,
            plate_name: String::new(),
            list_name: String::new(),
            import_text: String::new(),
            status: None,
            last_error: None,
        };
        app.sync_names();
        app
    }

    fn sync_names(&mut self) {
        let layout = self.editor.layout();
        self.plate_name = layout
            .active_plate()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        self.list_name = layout
            .active_list()
            .map(|l| l.name.clone())
            .unwrap_or_default();
    }

    fn report<T>(&mut self, result: Result<T, LayoutError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            }
            Err(e) => {
                self.last_error = Some(format!("{e:#}"));
                None
            }
        }
    }

    fn import(&mut self, text: &str) {
        let result = self.editor.paste(text, None);
        if let Some(n) = self.report(result) {
            self.status = Some(format!("Imported {n} reaction(s)"));
            self.import_text.clear();
        }
    }

    fn export_active(&mut self) {
        let result = self.editor.export_active_plate();
        let Some(export) = self.report(result) else {
            return;
        };
        let tsv = export::render_tsv(&export, &self.config.export);
        let path = PathBuf::from(export::file_name(&export));
        match fs::write(&path, tsv) {
            Ok(()) => self.status = Some(format!("Exported to {}", path.display())),
            Err(e) => self.last_error = Some(format!("write {}: {e}", path.display())),
        }
    }

    fn items(&self) -> Vec<ItemView> {
        let layout = self.editor.layout();
        let selection = layout.selection();
        let Ok(list) = layout.active_list() else {
            return Vec::new();
        };
        list.view(self.sort)
            .into_iter()
            .map(|r| ItemView {
                id: r.id.clone(),
                name: r.name.clone(),
                primer: r.primer.clone(),
                state: r.state_label(),
                selected: selection.contains(&r.id),
                rank: selection.rank(&r.id).filter(|_| selection.len() > 1),
            })
            .collect()
    }

    fn cells(&self) -> Vec<CellView> {
        let layout = self.editor.layout();
        let Ok(plate) = layout.active_plate() else {
            return Vec::new();
        };
        let preview = self.editor.preview();

        Position::all()
            .map(|pos| {
                let (text, fill) = match layout.reaction_at(pos, Some(plate.id)) {
                    Some(r) => {
                        let mine = layout.book().in_active_list(&r.id);
                        let fill = if mine {
                            egui::Color32::from_rgb(60, 90, 140)
                        } else {
                            egui::Color32::from_rgb(70, 70, 80)
                        };
                        (format!("{}\n{}", r.name, r.primer), fill)
                    }
                    None => match layout.well_status(plate.id, pos) {
                        WellStatus::Defunct => {
                            ("Defunct".to_string(), egui::Color32::from_rgb(120, 40, 40))
                        }
                        WellStatus::Control => ("CC".to_string(), egui::Color32::from_rgb(130, 110, 30)),
                        WellStatus::Normal if preview.contains(&pos) => {
                            (pos.to_string(), egui::Color32::from_rgb(50, 120, 60))
                        }
                        WellStatus::Normal => (pos.to_string(), egui::Color32::from_gray(40)),
                    },
                };
                CellView { pos, text, fill }
            })
            .collect()
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Plate Layout");
            ui.separator();

            // plates
            let plates: Vec<(PlateId, String)> = self
                .editor
                .layout()
                .plates()
                .plates()
                .iter()
                .map(|p| (p.id, p.name.clone()))
                .collect();
            let active_plate = self.editor.layout().active_plate().map(|p| p.id).ok();
            let mut chosen = active_plate;
            ui.label("Plate:");
            egui::ComboBox::from_id_source("plate_select")
                .selected_text(self.plate_name.clone())
                .show_ui(ui, |ui| {
                    for (id, name) in &plates {
                        ui.selectable_value(&mut chosen, Some(*id), name);
                    }
                });
            if chosen != active_plate {
                if let Some(id) = chosen {
                    self.editor.set_active_plate(id);
                    self.sync_names();
                }
            }
            if ui.button("+").on_hover_text("Add plate").clicked() {
                self.editor.add_plate();
                self.sync_names();
            }
            if ui.button("Delete").clicked() {
                if let Some(id) = active_plate {
                    if !self.editor.delete_plate(id) {
                        self.status = Some("The last plate cannot be deleted".into());
                    }
                    self.sync_names();
                }
            }
            ui.add(egui::TextEdit::singleline(&mut self.plate_name).desired_width(110.0));
            if ui.button("Rename").clicked() {
                if let Some(id) = active_plate {
                    let name = self.plate_name.clone();
                    let result = self.editor.rename_plate(id, &name);
                    self.report(result);
                    self.sync_names();
                }
            }
            if ui.button("Reset plate").clicked() {
                let result = self.editor.reset_active_plate();
                if let Some(n) = self.report(result) {
                    self.status = Some(format!("{n} reaction(s) back in their lists"));
                }
            }
            if ui.button("Export").clicked() {
                self.export_active();
            }
        });

        ui.horizontal(|ui| {
            // lists
            let lists: Vec<(ListId, String)> = self
                .editor
                .layout()
                .book()
                .lists()
                .iter()
                .map(|l| (l.id, l.name.clone()))
                .collect();
            let active_list = self.editor.layout().active_list().map(|l| l.id).ok();
            let mut chosen = active_list;
            ui.label("List:");
            egui::ComboBox::from_id_source("list_select")
                .selected_text(self.list_name.clone())
                .show_ui(ui, |ui| {
                    for (id, name) in &lists {
                        ui.selectable_value(&mut chosen, Some(*id), name);
                    }
                });
            if chosen != active_list {
                if let Some(id) = chosen {
                    self.editor.set_active_reaction_list(id);
                    self.sync_names();
                }
            }
            if ui.button("+").on_hover_text("Add list").clicked() {
                self.editor.add_reaction_list();
                self.sync_names();
            }
            if ui.button("Delete").clicked() {
                if let Some(id) = active_list {
                    if !self.editor.remove_reaction_list(id) {
                        self.status = Some("The last list cannot be deleted".into());
                    }
                    self.sync_names();
                }
            }
            ui.add(egui::TextEdit::singleline(&mut self.list_name).desired_width(110.0));
            if ui.button("Rename").clicked() {
                if let Some(id) = active_list {
                    let name = self.list_name.clone();
                    let result = self.editor.rename_reaction_list(id, &name);
                    self.report(result);
                    self.sync_names();
                }
            }

            ui.separator();
            ui.label("Sort:");
            egui::ComboBox::from_id_source("sort")
                .selected_text(format!("{:?}", self.sort))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.sort, SortMethod::Sample, "Sample");
                    ui.selectable_value(&mut self.sort, SortMethod::Primer, "Primer");
                });
        });

        if let Some(status) = &self.status {
            ui.label(status);
        }
        if let Some(err) = &self.last_error {
            ui.colored_label(egui::Color32::RED, format!("Error: {err}"));
        }
    }

    fn list_panel(&mut self, ui: &mut egui::Ui) {
        let items = self.items();
        let view: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        let view_refs: Vec<&str> = view.iter().map(String::as_str).collect();
        let modifiers = ui.input(|i| i.modifiers);

        ui.heading(format!("{} ({})", self.list_name, items.len()));
        ui.label("Ctrl/Cmd-click to add, Shift-click for a range, drag onto the plate.");
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            for item in &items {
                let badge = item.rank.map(|r| format!("{r:>2} ")).unwrap_or_default();
                let text = format!("{badge}{}  {}  [{}]", item.name, item.primer, item.state);
                let resp = ui
                    .selectable_label(item.selected, text)
                    .interact(egui::Sense::click_and_drag());

                if resp.drag_started() {
                    self.editor.drag_start(&item.id);
                } else if resp.clicked() {
                    let modifier = if modifiers.shift {
                        ClickModifier::Range
                    } else if modifiers.command {
                        ClickModifier::Toggle
                    } else {
                        ClickModifier::None
                    };
                    self.editor.click_reaction(&item.id, modifier, &view_refs);
                }
            }
        });

        ui.separator();
        ui.collapsing("Import", |ui| {
            ui.label("Rows: name<TAB>primer, or position<TAB>name<TAB>primer. Ctrl+V also works.");
            ui.add(
                egui::TextEdit::multiline(&mut self.import_text)
                    .desired_rows(6)
                    .code_editor(),
            );
            if ui.button("Import into active list").clicked() {
                let text = self.import_text.clone();
                self.import(&text);
            }
        });
    }

    fn plate_grid(&mut self, ui: &mut egui::Ui) {
        let cells = self.cells();
        let picking = matches!(
            self.editor.drag_state(),
            DragState::Dragging {
                origin: DragOrigin::Well(_),
                ..
            }
        );
        let mut hovered = None;

        ui.heading(self.plate_name.as_str());
        ui.label("Click a well to pick its reaction up, click again to place. Right-click cycles defunct / CC.");
        ui.separator();

        egui::Grid::new("plate_grid")
            .spacing(egui::vec2(4.0, 4.0))
            .show(ui, |ui| {
                ui.label("");
                for c in 0..plate_core::position::COLUMNS {
                    ui.strong(((b'A' + c) as char).to_string());
                }
                ui.end_row();

                for row in cells.chunks(usize::from(plate_core::position::COLUMNS)) {
                    if let Some(first) = row.first() {
                        ui.strong(first.pos.row().to_string());
                    }
                    for cell in row {
                        let resp = ui.add(
                            egui::Button::new(egui::RichText::new(&cell.text).small())
                                .fill(cell.fill)
                                .min_size(egui::vec2(78.0, 38.0)),
                        );
                        if resp.contains_pointer() {
                            hovered = Some(cell.pos);
                        }
                        if resp.clicked() {
                            if picking {
                                let result = self.editor.drag_end(Some(cell.pos));
                                self.report(result);
                            } else {
                                self.editor.click_well(cell.pos);
                            }
                        }
                        if resp.secondary_clicked() {
                            let result = self.editor.right_click_well(cell.pos);
                            self.report(result);
                        }
                    }
                    ui.end_row();
                }
            });

        if hovered != self.hovered {
            self.hovered = hovered;
            if self.editor.is_dragging() {
                self.editor.drag_over(hovered);
            }
        }
    }

    fn finish_drag(&mut self, ctx: &egui::Context) {
        let DragState::Dragging { payload, origin } = self.editor.drag_state() else {
            return;
        };
        let count = payload.len();
        let from_list = *origin == DragOrigin::List;

        if let Some(pointer) = ctx.input(|i| i.pointer.hover_pos()) {
            let painter = ctx.layer_painter(egui::LayerId::new(
                egui::Order::Tooltip,
                egui::Id::new("drag_ghost"),
            ));
            painter.text(
                pointer + egui::vec2(12.0, 12.0),
                egui::Align2::LEFT_TOP,
                format!("{count} reaction(s)"),
                egui::FontId::proportional(14.0),
                egui::Color32::WHITE,
            );
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            let result = self.editor.drag_end(None);
            self.report(result);
        } else if from_list && ctx.input(|i| i.pointer.any_released()) {
            let result = self.editor.drag_end(self.hovered);
            if let Some(plan) = self.report(result) {
                if !plan.unplaced.is_empty() {
                    self.status = Some(format!("{} reaction(s) did not fit", plan.unplaced.len()));
                }
            }
        }
        ctx.request_repaint();
    }
}

impl eframe::App for PlateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !ctx.wants_keyboard_input() {
            let pasted = ctx.input(|i| {
                i.events.iter().find_map(|e| match e {
                    egui::Event::Paste(text) => Some(text.clone()),
                    _ => None,
                })
            });
            if let Some(text) = pasted {
                tracing::debug!(bytes = text.len(), "clipboard paste");
                self.import(&text);
            }
        }

        egui::TopBottomPanel::top("top").show(ctx, |ui| self.top_bar(ui));

        egui::SidePanel::left("reactions")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.list_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| self.plate_grid(ui));
        });

        self.finish_drag(ctx);
    }
}
