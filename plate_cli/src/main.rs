use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use plate_core::command::{ApplyStatus, try_apply_selection_line};
use plate_core::{
    Editor, EditorConfig, FileStorage, ListId, Placement, PlateId, Position, SortMethod, Storage,
    WellStatus, export,
};

#[derive(Parser, Debug)]
#[command(name = "plate", version, about = "Lay out sequencing reactions on 96-well plates")]
struct Cli {
    /// Config file (default: <config dir>/plate-layout/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive editor (default)
    Repl,
    /// Import tab-separated reactions from a file ('-' for stdin)
    Import {
        file: PathBuf,
        /// Target list id (default: active list)
        #[arg(long)]
        list: Option<u32>,
    },
    /// Write a plate as a sequencer plate record
    Export {
        /// Plate id (default: active plate)
        #[arg(long)]
        plate: Option<u32>,
        /// Output file (default: stdout)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Summarise plates and lists
    Show,
    /// Forget everything: one empty list, one empty plate
    Reset,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EditorConfig::load(cli.config.as_deref())?;
    plate_core::telemetry::init(&config.logging.filter);

    let storage = FileStorage::new(config.storage.resolved_dir());
    tracing::debug!(dir = %storage.dir().display(), key = %config.storage.key, "opening store");
    let mut editor = Editor::open(storage, config.storage.key.clone());

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => repl(&mut editor, &config)?,
        Commands::Import { file, list } => {
            let text = if file.as_os_str() == "-" {
                io::read_to_string(io::stdin()).context("read reactions from stdin")?
            } else {
                fs::read_to_string(&file)
                    .with_context(|| format!("read reactions from {}", file.display()))?
            };
            let n = editor.paste(&text, list.map(ListId))?;
            println!("Imported {n} reaction(s)");
        }
        Commands::Export { plate, out } => {
            let export = match plate {
                Some(id) => editor.export_plate(PlateId(id))?,
                None => editor.export_active_plate()?,
            };
            let tsv = export::render_tsv(&export, &config.export);
            match out {
                Some(path) => {
                    fs::write(&path, tsv)
                        .with_context(|| format!("write export {}", path.display()))?;
                    println!("Exported {} to {}", export.plate_name, path.display());
                }
                None => println!("{tsv}"),
            }
        }
        Commands::Show => print_summary(&editor),
        Commands::Reset => {
            editor.reset_all();
            println!("Layout reset");
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"Commands:
            <n>                    select item n of the active list
            <a> thru <b>           select a range
            +<n>                   add/remove item n
            <sel> @ <well>         select, then drop at well (e.g. 1 thru 4 @ B05)
            @ <well>               drop the current selection
            list                   show the active list
            sort sample|primer
            clear                  clear the selection
            preview <well>         wells the selection would fill
            drop <well>            drop the selection (or the picked-up reaction)
            pick <well>            pick a reaction up off the plate
            cancel                 put a picked-up reaction back in the list
            move <n> <well|unused>
            swap <n> <m>
            mark <well>            cycle normal -> defunct -> CC -> normal
            grid                   show the active plate
            wells                  list defunct and CC wells
            plates | plate add | plate use <id> | plate rename <id> <name> | plate delete <id> | plate reset
            lists  | list add  | list use <id>  | list rename <id> <name>  | list delete <id>
            paste                  read tab-separated rows until an empty line
            export [file]
            show
            quit
            "#
    );
}

fn repl<S: Storage>(editor: &mut Editor<S>, config: &EditorConfig) -> anyhow::Result<()> {
    let mut sort = SortMethod::Sample;

    print_summary(editor);
    println!("Type 'help' for commands. 'quit' to exit.");

    let stdin = io::stdin();
    loop {
        print!("plate> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF (Ctrl+D)
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match try_apply_selection_line(line, editor, sort) {
            ApplyStatus::Applied => {
                print_list(editor, sort);
                continue;
            }
            ApplyStatus::Dropped { placed, unplaced } => {
                report_drop(placed, unplaced);
                continue;
            }
            ApplyStatus::Incomplete => {
                println!("(selection) incomplete input…");
                continue;
            }
            ApplyStatus::Rejected(why) => {
                println!("(selection) {why}");
                continue;
            }
            ApplyStatus::NotSelection => {
                // fall through to named commands
            }
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();
        if let Err(e) = run_command(editor, config, &mut sort, &cmd, &parts[1..]) {
            println!("error: {e:#}");
        }
        if cmd == "quit" || cmd == "exit" {
            break;
        }
    }

    Ok(())
}

fn run_command<S: Storage>(
    editor: &mut Editor<S>,
    config: &EditorConfig,
    sort: &mut SortMethod,
    cmd: &str,
    args: &[&str],
) -> anyhow::Result<()> {
    match cmd {
        "help" => print_help(),
        "quit" | "exit" => {}
        "show" => print_summary(editor),
        "list" if !args.is_empty() => list_command(editor, args)?,
        "list" => print_list(editor, *sort),
        "sort" => {
            *sort = match args.first().map(|s| s.to_lowercase()).as_deref() {
                Some("sample") => SortMethod::Sample,
                Some("primer") => SortMethod::Primer,
                _ => {
                    println!("Usage: sort sample|primer");
                    return Ok(());
                }
            };
            print_list(editor, *sort);
        }
        "clear" => editor.clear_selection(),

        "preview" => {
            let pos = well_arg(args.first())?;
            let Some(first) = editor.layout().selection().order().first().cloned() else {
                println!("Nothing selected");
                return Ok(());
            };
            if editor.drag_start(&first) {
                let wells: Vec<String> = editor
                    .drag_over(Some(pos))
                    .iter()
                    .map(Position::to_string)
                    .collect();
                editor.drag_cancel();
                println!("Would fill: {}", wells.join(" "));
            }
        }
        "drop" => {
            let pos = well_arg(args.first())?;
            if editor.is_dragging() {
                let plan = editor.drag_end(Some(pos))?;
                report_drop(plan.assignments.len(), plan.unplaced.len());
            } else {
                match try_apply_selection_line(&format!("@ {pos}"), editor, *sort) {
                    ApplyStatus::Dropped { placed, unplaced } => report_drop(placed, unplaced),
                    ApplyStatus::Rejected(why) => println!("{why}"),
                    _ => {}
                }
            }
        }
        "pick" => {
            let pos = well_arg(args.first())?;
            match editor.click_well(pos) {
                Some(id) => {
                    let name = editor
                        .layout()
                        .reaction(&id)
                        .map(|r| r.name.clone())
                        .unwrap_or(id);
                    println!("Picked up {name}; 'drop <well>' to place it, 'cancel' to leave it unused");
                }
                None => println!("No reaction of the active list at {pos}"),
            }
        }
        "cancel" => {
            editor.drag_end(None)?;
        }
        "move" => {
            let id = item_arg(editor, *sort, args.first())?;
            let to = Placement::parse(args.get(1).context("missing <well|unused>")?)?;
            let target_busy = match to {
                Placement::Well(p) => editor.layout().reaction_at(p, None).is_some(),
                Placement::Unused => false,
            };
            if target_busy {
                println!("{to} is occupied; use swap");
            } else {
                editor.move_reaction(&id, to)?;
            }
        }
        "swap" => {
            let a = item_arg(editor, *sort, args.first())?;
            let b = item_arg(editor, *sort, args.get(1))?;
            editor.swap_reactions(&a, &b);
        }
        "mark" => {
            let pos = well_arg(args.first())?;
            let status = editor.right_click_well(pos)?;
            println!("{pos} is now {}", status_name(status));
        }
        "grid" => print_grid(editor),
        "wells" => {
            let plate = editor.layout().active_plate()?.id;
            let wells = editor.layout().wells();
            let join = |set: &std::collections::BTreeSet<Position>| {
                set.iter().map(Position::to_string).collect::<Vec<_>>().join(" ")
            };
            println!("Defunct: {}", join(wells.defunct(plate)));
            println!("CC:      {}", join(wells.control(plate)));
        }

        "plates" => print_plates(editor),
        "plate" => plate_command(editor, args)?,
        "lists" => print_lists(editor),

        "paste" => {
            println!("Paste rows, finish with an empty line:");
            let mut text = String::new();
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    break;
                }
                text.push_str(&line);
                text.push('\n');
            }
            let n = editor.paste(&text, None)?;
            println!("Imported {n} reaction(s)");
        }
        "export" => {
            let export = editor.export_active_plate()?;
            let tsv = export::render_tsv(&export, &config.export);
            let path = args
                .first()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(export::file_name(&export)));
            fs::write(&path, tsv).with_context(|| format!("write export {}", path.display()))?;
            println!("Exported {} to {}", export.plate_name, path.display());
        }

        _ => println!("Unknown command. Type 'help'."),
    }
    Ok(())
}

fn plate_command<S: Storage>(editor: &mut Editor<S>, args: &[&str]) -> anyhow::Result<()> {
    match args.first().map(|s| s.to_lowercase()).as_deref() {
        Some("add") => {
            let id = editor.add_plate();
            println!("Added plate {id}");
        }
        Some("use") => {
            let id = plate_id_arg(args.get(1))?;
            if !editor.set_active_plate(id) {
                println!("No plate {id}");
            }
        }
        Some("rename") => {
            let id = plate_id_arg(args.get(1))?;
            let applied = editor.rename_plate(id, &args[2.min(args.len())..].join(" "))?;
            println!("Plate {id} is now '{applied}'");
        }
        Some("delete") => {
            let id = plate_id_arg(args.get(1))?;
            if !editor.delete_plate(id) {
                println!("Plate {id} not deleted (unknown, or the last plate)");
            }
        }
        Some("reset") => {
            let freed = editor.reset_active_plate()?;
            println!("Plate cleared, {freed} reaction(s) back in their lists");
        }
        _ => println!("Usage: plate add|use <id>|rename <id> <name>|delete <id>|reset"),
    }
    print_plates(editor);
    Ok(())
}

fn list_command<S: Storage>(editor: &mut Editor<S>, args: &[&str]) -> anyhow::Result<()> {
    match args.first().map(|s| s.to_lowercase()).as_deref() {
        Some("add") => {
            let id = editor.add_reaction_list();
            println!("Added list {id}");
        }
        Some("use") => {
            let id = list_id_arg(args.get(1))?;
            if !editor.set_active_reaction_list(id) {
                println!("No list {id}");
            }
        }
        Some("rename") => {
            let id = list_id_arg(args.get(1))?;
            editor.rename_reaction_list(id, &args[2.min(args.len())..].join(" "))?;
        }
        Some("delete") => {
            let id = list_id_arg(args.get(1))?;
            if !editor.remove_reaction_list(id) {
                println!("List {id} not deleted (unknown, or the last list)");
            }
        }
        _ => println!("Usage: list add|use <id>|rename <id> <name>|delete <id>"),
    }
    print_lists(editor);
    Ok(())
}

fn well_arg(arg: Option<&&str>) -> anyhow::Result<Position> {
    let text = arg.context("missing <well>")?;
    Ok(Position::parse(text)?)
}

fn plate_id_arg(arg: Option<&&str>) -> anyhow::Result<PlateId> {
    arg.context("missing <id>")?
        .parse()
        .context("plate id must be a number")
}

fn list_id_arg(arg: Option<&&str>) -> anyhow::Result<ListId> {
    arg.context("missing <id>")?
        .parse()
        .context("list id must be a number")
}

/// Reaction id for a 1-based item number of the active list.
fn item_arg<S: Storage>(
    editor: &Editor<S>,
    sort: SortMethod,
    arg: Option<&&str>,
) -> anyhow::Result<String> {
    let n: usize = arg
        .context("missing <n>")?
        .parse()
        .context("item must be a number")?;
    let list = editor.layout().active_list()?;
    n.checked_sub(1)
        .and_then(|i| list.view(sort).get(i).map(|r| r.id.clone()))
        .with_context(|| format!("no item {n} in the active list"))
}

fn report_drop(placed: usize, unplaced: usize) {
    if placed == 0 {
        println!("Nothing placed");
    } else if unplaced > 0 {
        println!("Placed {placed}, {unplaced} did not fit");
    } else {
        println!("Placed {placed}");
    }
}

fn status_name(status: WellStatus) -> &'static str {
    match status {
        WellStatus::Normal => "normal",
        WellStatus::Defunct => "defunct",
        WellStatus::Control => "CC",
    }
}

fn print_summary<S: Storage>(editor: &Editor<S>) {
    let layout = editor.layout();
    println!("plate_core {}", plate_core::version());
    print_plates(editor);
    print_lists(editor);
    println!(
        "Placed: {} of {} reaction(s)",
        layout.used_items(None).len(),
        layout.book().all_reactions().count()
    );
}

fn print_plates<S: Storage>(editor: &Editor<S>) {
    let layout = editor.layout();
    println!("Plates:");
    for p in layout.plates().plates() {
        println!(
            "  {} #{:>2} | {:<16} | {} placed",
            if p.is_active { "*" } else { " " },
            p.id,
            p.name,
            layout.used_items(Some(p.id)).len()
        );
    }
}

fn print_lists<S: Storage>(editor: &Editor<S>) {
    println!("Lists:");
    for l in editor.layout().book().lists() {
        println!(
            "  {} #{:>2} | {:<16} | {} reaction(s)",
            if l.is_active { "*" } else { " " },
            l.id,
            l.name,
            l.reactions().len()
        );
    }
}

fn print_list<S: Storage>(editor: &Editor<S>, sort: SortMethod) {
    let layout = editor.layout();
    let Ok(list) = layout.active_list() else {
        println!("No active list");
        return;
    };
    let selection = layout.selection();
    println!("{}:", list.name);
    for (i, r) in list.view(sort).iter().enumerate() {
        let mark = match selection.rank(&r.id) {
            Some(rank) if selection.len() > 1 => format!("[{rank}]"),
            Some(_) => "[*]".to_string(),
            None => "   ".to_string(),
        };
        println!(
            "  {mark} {:>3}. {:<16} {:<10} {}",
            i + 1,
            r.name,
            r.primer,
            r.state_label()
        );
    }
}

fn print_grid<S: Storage>(editor: &Editor<S>) {
    let layout = editor.layout();
    let Ok(plate) = layout.active_plate() else {
        println!("No active plate");
        return;
    };
    println!("{}", plate.name);

    print!("    ");
    for c in 0..plate_core::position::COLUMNS {
        print!(" {:<8}", (b'A' + c) as char);
    }
    println!();

    let mut row = Vec::new();
    for pos in Position::all() {
        let cell = match layout.reaction_at(pos, Some(plate.id)) {
            Some(r) => r.name.chars().take(8).collect(),
            None => match layout.well_status(plate.id, pos) {
                WellStatus::Defunct => "xx".to_string(),
                WellStatus::Control => "CC".to_string(),
                WellStatus::Normal => ".".to_string(),
            },
        };
        row.push(cell);
        if row.len() == usize::from(plate_core::position::COLUMNS) {
            print!("{:>3} ", pos.row());
            for cell in row.drain(..) {
                print!(" {cell:<8}");
            }
            println!();
        }
    }
}
