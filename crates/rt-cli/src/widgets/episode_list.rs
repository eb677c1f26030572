//! Selection and scrolling over the displayed episodes.
//!
//! Rows are keyed by file name so the cursor stays on the same episode when
//! a fresh result set arrives.

pub struct EpisodeList {
    keys: Vec<String>,
    pub selected: usize,
    pub scroll_offset: usize,
}

impl EpisodeList {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            selected: 0,
            scroll_offset: 0,
        }
    }

    /// Replace the rows, keeping the selected episode when it is still there.
    pub fn sync<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        let previous = self.keys.get(self.selected).cloned();
        self.keys = keys.into_iter().map(str::to_string).collect();
        self.selected = previous
            .and_then(|prev| self.keys.iter().position(|k| *k == prev))
            .unwrap_or(0);
        self.scroll_offset = self.scroll_offset.min(self.selected);
    }

    pub fn select_up(&mut self, n: usize) {
        self.selected = self.selected.saturating_sub(n);
    }

    pub fn select_down(&mut self, n: usize) {
        if self.keys.is_empty() {
            return;
        }
        self.selected = (self.selected + n).min(self.keys.len() - 1);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.keys.len().saturating_sub(1);
    }

    /// Index of the selected row, if any rows exist.
    pub fn selected_index(&self) -> Option<usize> {
        (self.selected < self.keys.len()).then_some(self.selected)
    }

    pub fn ensure_visible(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + height {
            self.scroll_offset = self.selected + 1 - height;
        }
    }

    /// Row indices visible in `height` rows.
    pub fn visible_range(&self, height: usize) -> std::ops::Range<usize> {
        let end = (self.scroll_offset + height).min(self.keys.len());
        self.scroll_offset.min(end)..end
    }
}

impl Default for EpisodeList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_follows_episode_across_sync() {
        let mut list = EpisodeList::new();
        list.sync(["rt903", "rt902", "rt901"]);
        list.select_down(1);
        assert_eq!(list.selected_index(), Some(1));

        list.sync(["rt904", "rt903", "rt902", "rt901"]);
        assert_eq!(list.selected_index(), Some(2));

        list.sync(["rt100"]);
        assert_eq!(list.selected_index(), Some(0));

        list.sync(std::iter::empty());
        assert_eq!(list.selected_index(), None);
    }

    #[test]
    fn test_movement_is_clamped() {
        let mut list = EpisodeList::new();
        list.select_down(3);
        assert_eq!(list.selected, 0);

        list.sync(["a", "b", "c"]);
        list.select_down(10);
        assert_eq!(list.selected, 2);
        list.select_up(10);
        assert_eq!(list.selected, 0);
        list.select_last();
        assert_eq!(list.selected, 2);
        list.select_first();
        assert_eq!(list.selected, 0);
    }

    #[test]
    fn test_scrolls_to_keep_selection_visible() {
        let mut list = EpisodeList::new();
        let keys: Vec<String> = (0..9).map(|i| format!("rt{i}")).collect();
        list.sync(keys.iter().map(String::as_str));

        list.select_down(5);
        list.ensure_visible(3);
        assert_eq!(list.visible_range(3), 3..6);

        list.select_up(4);
        list.ensure_visible(3);
        assert_eq!(list.visible_range(3), 1..4);
    }
}
