use std::collections::BTreeSet;

/// How a reaction was clicked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClickModifier {
    #[default]
    None,
    /// Ctrl/Cmd: add or remove one item.
    Toggle,
    /// Shift: contiguous range from the anchor.
    Range,
}

/// Selected reactions plus the order they were picked in.
///
/// `items` and `order` always hold the same ids; `order` numbers the items
/// during a multi-drag. The anchor is an index into the global reaction
/// ordering (all lists flattened).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: BTreeSet<String>,
    order: Vec<String>,
    last_selected_index: Option<usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored parts, repairing any mismatch between the set and
    /// the order list.
    pub(crate) fn from_parts(
        items: BTreeSet<String>,
        order: Vec<String>,
        last_selected_index: Option<usize>,
    ) -> Self {
        let mut seen = BTreeSet::new();
        let mut fixed: Vec<String> = order
            .into_iter()
            .filter(|id| items.contains(id) && seen.insert(id.clone()))
            .collect();
        fixed.extend(items.iter().filter(|id| !seen.contains(*id)).cloned());
        Self {
            items,
            order: fixed,
            last_selected_index,
        }
    }

    pub fn items(&self) -> &BTreeSet<String> {
        &self.items
    }

    /// Ids in the order they were selected.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn last_selected_index(&self) -> Option<usize> {
        self.last_selected_index
    }

    pub(crate) fn set_anchor(&mut self, index: Option<usize>) {
        self.last_selected_index = index;
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 1-based badge number shown on multi-selected items.
    pub fn rank(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|x| x == id).map(|i| i + 1)
    }

    pub fn select_one(&mut self, id: &str) {
        self.items = BTreeSet::from([id.to_string()]);
        self.order = vec![id.to_string()];
    }

    pub fn toggle(&mut self, id: &str) {
        if self.items.remove(id) {
            self.order.retain(|x| x != id);
        } else {
            self.items.insert(id.to_string());
            self.order.push(id.to_string());
        }
    }

    /// Replace the selection with `view[anchor..=clicked]` (either direction).
    /// Returns false, leaving the selection alone, if either end is not in
    /// the view.
    pub fn select_range(&mut self, view: &[&str], anchor: &str, clicked: &str) -> bool {
        let (Some(a), Some(b)) = (
            view.iter().position(|id| *id == anchor),
            view.iter().position(|id| *id == clicked),
        ) else {
            return false;
        };
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        let range: Vec<String> = view[start..=end].iter().map(|s| s.to_string()).collect();
        self.items = range.iter().cloned().collect();
        self.order = range;
        true
    }

    /// Apply one click. `anchor` is the reaction currently at the anchor
    /// index, if any.
    pub fn click(&mut self, id: &str, modifier: ClickModifier, view: &[&str], anchor: Option<&str>) {
        match (modifier, anchor) {
            (ClickModifier::Toggle, _) => self.toggle(id),
            (ClickModifier::Range, Some(anchor)) => {
                self.select_range(view, anchor, id);
            }
            (ClickModifier::Range, None) | (ClickModifier::None, _) => self.select_one(id),
        }
    }

    /// Drop items and order, keep the anchor.
    pub fn clear_items(&mut self) {
        self.items.clear();
        self.order.clear();
    }

    pub fn clear(&mut self) {
        self.clear_items();
        self.last_selected_index = None;
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> bool {
        let before = self.items.len();
        self.items.retain(|id| keep(id.as_str()));
        let items = &self.items;
        self.order.retain(|id| items.contains(id));
        before != self.items.len()
    }
}
