use super::screen::ScreenId;

/// One focusable row on a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenOption {
    pub label: String,
    /// Screen opened when the option is activated. Leaf rows have none.
    pub target: Option<ScreenId>,
}

impl ScreenOption {
    pub fn new(label: impl Into<String>, target: Option<ScreenId>) -> Self {
        Self {
            label: label.into(),
            target,
        }
    }
}

/// Ordered options with a focus cursor that wraps at both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionList {
    items: Vec<ScreenOption>,
    selected: Option<usize>,
}

impl OptionList {
    pub fn new(items: Vec<ScreenOption>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    /// Replaces the rows, keeping focus on the same label when it survives.
    pub fn replace(&mut self, items: Vec<ScreenOption>) {
        let previous = self.selected_option().map(|o| o.label.clone());
        self.items = items;
        self.selected = match previous {
            Some(label) => self.items.iter().position(|o| o.label == label).or(Some(0)),
            None => Some(0),
        }
        .filter(|_| !self.items.is_empty());
    }

    pub fn items(&self) -> &[ScreenOption] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_option(&self) -> Option<&ScreenOption> {
        self.selected.and_then(|i| self.items.get(i))
    }

    pub fn select_next(&mut self) -> Option<&ScreenOption> {
        let len = self.items.len();
        if len > 0 {
            self.selected = Some(self.selected.map_or(0, |i| (i + 1) % len));
        }
        self.selected_option()
    }

    pub fn select_prev(&mut self) -> Option<&ScreenOption> {
        let len = self.items.len();
        if len > 0 {
            self.selected = Some(self.selected.map_or(len - 1, |i| (i + len - 1) % len));
        }
        self.selected_option()
    }

    /// Focus a row by index. Out of range leaves the focus alone.
    pub fn select(&mut self, index: usize) -> Option<&ScreenOption> {
        if index < self.items.len() {
            self.selected = Some(index);
            self.selected_option()
        } else {
            None
        }
    }
}
