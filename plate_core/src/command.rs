use crate::{ClickModifier, Editor, Position, SortMethod, Storage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelWord {
    /// 1-based index into the active list as displayed.
    Num(usize),
    /// `+N`
    Toggle(usize),
    Thru,
    At,
    Well(Position),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyStatus {
    Applied,
    /// Selection applied and dropped at a well.
    Dropped { placed: usize, unplaced: usize },
    Incomplete,   // valid so far, but needs more tokens
    NotSelection, // doesn't look like selection syntax
    Rejected(String),
}

fn lex(input: &str) -> Vec<String> {
    input.split_whitespace().map(|s| s.to_string()).collect()
}

/// Bare digits only; `usize::from_str` would also take a leading sign.
fn parse_index(token: &str) -> Option<usize> {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

fn parse_toggle(token: &str) -> Option<usize> {
    token.strip_prefix('+').and_then(parse_index)
}

fn parse_words(tokens: &[String]) -> Result<Vec<SelWord>, ApplyStatus> {
    let Some(first) = tokens.first() else {
        return Err(ApplyStatus::NotSelection);
    };
    let starts_ok = first == "@" || parse_index(first).is_some() || parse_toggle(first).is_some();
    if !starts_ok {
        return Err(ApplyStatus::NotSelection);
    }

    let mut out = Vec::new();
    for t in tokens {
        let low = t.to_lowercase();
        let w = match low.as_str() {
            "thru" => SelWord::Thru,
            "@" => SelWord::At,
            _ => {
                if let Some(n) = parse_toggle(&low) {
                    SelWord::Toggle(n)
                } else if let Some(n) = parse_index(&low) {
                    SelWord::Num(n)
                } else if let Ok(p) = Position::parse(&low) {
                    SelWord::Well(p)
                } else {
                    return Err(ApplyStatus::NotSelection);
                }
            }
        };
        out.push(w);
    }

    Ok(out)
}

/// Apply one REPL line of selection syntax to the active list.
///
/// Grammar:
/// ```text
/// <a>                select item a
/// <a> thru <b>       select a..b
/// +<a>               add/remove item a
/// ... @ <well>       then drop the selection at well
/// @ <well>           drop the current selection
/// ```
/// Items are numbered from 1 in the order `sort` displays them.
pub fn try_apply_selection_line<S: Storage>(
    line: &str,
    editor: &mut Editor<S>,
    sort: SortMethod,
) -> ApplyStatus {
    let tokens = lex(line);
    let words = match parse_words(&tokens) {
        Ok(w) => w,
        Err(status) => return status,
    };

    let view: Vec<String> = match editor.layout().active_list() {
        Ok(list) => list.view(sort).iter().map(|r| r.id.clone()).collect(),
        Err(e) => return ApplyStatus::Rejected(e.to_string()),
    };
    let view_refs: Vec<&str> = view.iter().map(String::as_str).collect();
    let item = |n: usize| nth_item(&view_refs, n);

    let mut i = 0;

    // Selection part
    match words.get(i) {
        Some(SelWord::Num(a)) => {
            let first = match item(*a) {
                Ok(id) => id,
                Err(status) => return status,
            };
            i += 1;
            let last = match words.get(i) {
                Some(SelWord::Thru) => {
                    i += 1;
                    let b = match words.get(i) {
                        Some(SelWord::Num(n)) => *n,
                        _ => return ApplyStatus::Incomplete, // "3 thru"
                    };
                    i += 1;
                    match item(b) {
                        Ok(id) => Some(id),
                        Err(status) => return status,
                    }
                }
                _ => None,
            };

            editor.click_reaction(first, ClickModifier::None, &view_refs);
            if let Some(last) = last {
                editor.click_reaction(last, ClickModifier::Range, &view_refs);
            }
        }
        Some(SelWord::Toggle(a)) => {
            let id = match item(*a) {
                Ok(id) => id,
                Err(status) => return status,
            };
            i += 1;
            editor.click_reaction(id, ClickModifier::Toggle, &view_refs);
        }
        Some(SelWord::At) => {}
        _ => return ApplyStatus::NotSelection,
    }

    // Optional: @ <well>
    match words.get(i) {
        None => ApplyStatus::Applied,
        Some(SelWord::At) => {
            let target = match words.get(i + 1) {
                Some(SelWord::Well(p)) => *p,
                _ => return ApplyStatus::Incomplete, // "3 @"
            };
            drop_selection(editor, target)
        }
        Some(_) => ApplyStatus::Rejected(format!("unexpected '{}'", tokens[i])),
    }
}

fn nth_item<'a>(view: &[&'a str], n: usize) -> Result<&'a str, ApplyStatus> {
    n.checked_sub(1)
        .and_then(|i| view.get(i).copied())
        .ok_or_else(|| ApplyStatus::Rejected(format!("no item {n} in the active list")))
}

fn drop_selection<S: Storage>(editor: &mut Editor<S>, target: Position) -> ApplyStatus {
    let Some(first) = editor.layout().selection().order().first().cloned() else {
        return ApplyStatus::Rejected("nothing selected".into());
    };
    if !editor.drag_start(&first) {
        return ApplyStatus::Rejected("selection is not in the active list".into());
    }
    match editor.drag_end(Some(target)) {
        Ok(plan) => ApplyStatus::Dropped {
            placed: plan.assignments.len(),
            unplaced: plan.unplaced.len(),
        },
        Err(e) => ApplyStatus::Rejected(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use crate::persist::DEFAULT_KEY;

    fn editor() -> anyhow::Result<Editor<MemoryStorage>> {
        let mut e = Editor::open(MemoryStorage::new(), DEFAULT_KEY);
        e.paste("S1\tP\nS2\tP\nS3\tP\nS4\tP\n", None)?;
        Ok(e)
    }

    fn selected_names(e: &Editor<MemoryStorage>) -> Vec<String> {
        e.layout()
            .selection()
            .order()
            .iter()
            .filter_map(|id| e.layout().reaction(id))
            .map(|r| r.name.clone())
            .collect()
    }

    #[test]
    fn range_selects_in_display_order() -> anyhow::Result<()> {
        let mut e = editor()?;
        let st = try_apply_selection_line("2 thru 4", &mut e, SortMethod::Sample);
        assert_eq!(st, ApplyStatus::Applied);
        assert_eq!(selected_names(&e), ["S2", "S3", "S4"]);
        Ok(())
    }

    #[test]
    fn toggles_keep_pick_order() -> anyhow::Result<()> {
        let mut e = editor()?;
        try_apply_selection_line("3", &mut e, SortMethod::Sample);
        try_apply_selection_line("+1", &mut e, SortMethod::Sample);
        assert_eq!(selected_names(&e), ["S3", "S1"]);
        Ok(())
    }

    #[test]
    fn signed_tokens_are_not_plain_indexes() {
        let words = parse_words(&lex("+2 thru 3")).unwrap();
        assert_eq!(words, [SelWord::Toggle(2), SelWord::Thru, SelWord::Num(3)]);

        assert_eq!(parse_words(&lex("-2")), Err(ApplyStatus::NotSelection));
        assert_eq!(parse_words(&lex("++2")), Err(ApplyStatus::NotSelection));
    }

    #[test]
    fn select_and_drop_in_one_line() -> anyhow::Result<()> {
        let mut e = editor()?;
        let st = try_apply_selection_line("1 thru 3 @ b05", &mut e, SortMethod::Sample);
        assert_eq!(st, ApplyStatus::Dropped { placed: 3, unplaced: 0 });

        let at = |p: &str| {
            e.layout()
                .reaction_at(Position::parse(p).unwrap(), None)
                .map(|r| r.name.clone())
        };
        assert_eq!(at("B05").as_deref(), Some("S1"));
        assert_eq!(at("D05").as_deref(), Some("S3"));
        Ok(())
    }

    #[test]
    fn incomplete_thru_is_incomplete() -> anyhow::Result<()> {
        let mut e = editor()?;
        let st = try_apply_selection_line("1 thru", &mut e, SortMethod::Sample);
        assert_eq!(st, ApplyStatus::Incomplete);
        assert_eq!(
            try_apply_selection_line("1 @", &mut e, SortMethod::Sample),
            ApplyStatus::Incomplete
        );
        Ok(())
    }

    #[test]
    fn out_of_range_items_are_rejected() -> anyhow::Result<()> {
        let mut e = editor()?;
        let st = try_apply_selection_line("9", &mut e, SortMethod::Sample);
        assert!(matches!(st, ApplyStatus::Rejected(_)));
        assert!(e.layout().selection().is_empty());
        Ok(())
    }

    #[test]
    fn drop_without_selection_is_rejected() -> anyhow::Result<()> {
        let mut e = editor()?;
        let st = try_apply_selection_line("@ A01", &mut e, SortMethod::Sample);
        assert_eq!(st, ApplyStatus::Rejected("nothing selected".into()));
        Ok(())
    }

    #[test]
    fn non_selection_lines_are_ignored() -> anyhow::Result<()> {
        let mut e = editor()?;
        let st = try_apply_selection_line("help", &mut e, SortMethod::Sample);
        assert_eq!(st, ApplyStatus::NotSelection);
        Ok(())
    }
}
