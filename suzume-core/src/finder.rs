use crate::input::{Key, KeyInput};
use crate::recent::RecentDocument;

#[derive(Debug, Clone, PartialEq)]
pub enum FinderOutcome {
    Stay,
    Close,
    Open(RecentDocument),
}

/// Text-filtered picker over recent documents.
#[derive(Debug, Clone, Default)]
pub struct RecentFinder {
    query: String,
    selected: usize,
}

impl RecentFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn reset(&mut self) {
        self.query.clear();
        self.selected = 0;
    }

    /// Case-insensitive substring match on identity; an empty query matches all.
    pub fn filter<'a>(&self, items: &'a [RecentDocument]) -> Vec<&'a RecentDocument> {
        if self.query.is_empty() {
            return items.iter().collect();
        }
        let needle = self.query.to_lowercase();
        items
            .iter()
            .filter(|item| item.identity.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn handle_key(&mut self, input: &KeyInput, items: &[RecentDocument]) -> FinderOutcome {
        if input.is_release() {
            return FinderOutcome::Stay;
        }
        let ctrl = input.modifiers.ctrl;
        match input.key {
            Key::Escape => return FinderOutcome::Close,
            Key::Enter => {
                let matches = self.filter(items);
                return match matches.get(self.selected) {
                    Some(item) => FinderOutcome::Open((*item).clone()),
                    None => FinderOutcome::Stay,
                };
            }
            Key::Down => self.step(1, items),
            Key::Up => self.step(-1, items),
            Key::Char('j') if ctrl => self.step(1, items),
            Key::Char('k') if ctrl => self.step(-1, items),
            Key::Backspace => {
                self.query.pop();
            }
            _ => {
                if let Some(c) = input.plain_char() {
                    self.query.push(c);
                }
            }
        }
        self.clamp_selection(items);
        FinderOutcome::Stay
    }

    fn step(&mut self, delta: isize, items: &[RecentDocument]) {
        let len = self.filter(items).len() as isize;
        if len == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected as isize + delta).rem_euclid(len) as usize;
    }

    fn clamp_selection(&mut self, items: &[RecentDocument]) {
        let len = self.filter(items).len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<RecentDocument> {
        ["Rust Book.pdf", "paper.pdf", "rustonomicon.pdf"]
            .iter()
            .map(|name| RecentDocument {
                identity: name.to_string(),
                path: None,
            })
            .collect()
    }

    fn type_text(finder: &mut RecentFinder, text: &str, items: &[RecentDocument]) {
        for c in text.chars() {
            finder.handle_key(&KeyInput::char(c), items);
        }
    }

    #[test]
    fn filter_is_case_insensitive() {
        let items = items();
        let mut finder = RecentFinder::new();
        type_text(&mut finder, "RUST", &items);
        let names: Vec<_> = finder
            .filter(&items)
            .iter()
            .map(|item| item.identity.as_str())
            .collect();
        assert_eq!(names, vec!["Rust Book.pdf", "rustonomicon.pdf"]);
    }

    #[test]
    fn selection_wraps_both_ways() {
        let items = items();
        let mut finder = RecentFinder::new();
        finder.handle_key(&KeyInput::press(Key::Up), &items);
        assert_eq!(finder.selected(), 2);
        finder.handle_key(&KeyInput::ctrl('j'), &items);
        assert_eq!(finder.selected(), 0);
        finder.handle_key(&KeyInput::ctrl('k'), &items);
        assert_eq!(finder.selected(), 2);
    }

    #[test]
    fn narrowing_clamps_selection_and_enter_opens() {
        let items = items();
        let mut finder = RecentFinder::new();
        finder.handle_key(&KeyInput::press(Key::Down), &items);
        finder.handle_key(&KeyInput::press(Key::Down), &items);
        type_text(&mut finder, "paper", &items);
        assert_eq!(finder.selected(), 0);
        match finder.handle_key(&KeyInput::press(Key::Enter), &items) {
            FinderOutcome::Open(item) => assert_eq!(item.identity, "paper.pdf"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn enter_with_no_match_stays_and_escape_closes() {
        let items = items();
        let mut finder = RecentFinder::new();
        type_text(&mut finder, "zzz", &items);
        assert_eq!(
            finder.handle_key(&KeyInput::press(Key::Enter), &items),
            FinderOutcome::Stay
        );
        finder.handle_key(&KeyInput::press(Key::Backspace), &items);
        assert_eq!(finder.query(), "zz");
        assert_eq!(
            finder.handle_key(&KeyInput::press(Key::Escape), &items),
            FinderOutcome::Close
        );
    }
}
