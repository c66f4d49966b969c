use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_TOLERANCE: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpEntry {
    pub page: usize,
    pub scroll_offset: f32,
}

impl JumpEntry {
    pub fn new(page: usize, scroll_offset: f32) -> Self {
        Self {
            page,
            scroll_offset,
        }
    }

    pub fn is_near(&self, other: &JumpEntry, tolerance: f32) -> bool {
        self.page == other.page && (self.scroll_offset - other.scroll_offset).abs() <= tolerance
    }
}

/// Browser-style back/forward stack. `index` is `-1` only while empty.
#[derive(Debug, Clone)]
pub struct JumpHistory {
    entries: VecDeque<JumpEntry>,
    index: isize,
    capacity: usize,
    tolerance: f32,
}

impl Default for JumpHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TOLERANCE)
    }
}

impl JumpHistory {
    pub fn new(capacity: usize, tolerance: f32) -> Self {
        Self {
            entries: VecDeque::new(),
            index: -1,
            capacity: capacity.max(1),
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> isize {
        self.index
    }

    pub fn current(&self) -> Option<&JumpEntry> {
        usize::try_from(self.index)
            .ok()
            .and_then(|index| self.entries.get(index))
    }

    pub fn entries(&self) -> impl Iterator<Item = &JumpEntry> {
        self.entries.iter()
    }

    pub fn push(&mut self, entry: JumpEntry) {
        let keep = usize::try_from(self.index + 1).unwrap_or(0);
        self.entries.truncate(keep);

        if let Some(top) = self.entries.back_mut() {
            if top.is_near(&entry, self.tolerance) {
                *top = entry;
                self.index = self.entries.len() as isize - 1;
                return;
            }
        }

        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.index = self.entries.len() as isize - 1;
    }

    pub fn back(&mut self) -> Option<JumpEntry> {
        if self.index <= 0 {
            return None;
        }
        self.index -= 1;
        self.current().copied()
    }

    pub fn forward(&mut self) -> Option<JumpEntry> {
        if self.index + 1 >= self.entries.len() as isize {
            return None;
        }
        self.index += 1;
        self.current().copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = -1;
    }

    pub fn snapshot(&self) -> (Vec<JumpEntry>, isize) {
        (self.entries.iter().copied().collect(), self.index)
    }

    /// Rebuilds from a persisted snapshot, repairing an out-of-range cursor.
    pub fn restore(&mut self, entries: Vec<JumpEntry>, index: isize) {
        let mut entries: VecDeque<JumpEntry> = entries.into();
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        let last = entries.len() as isize - 1;
        self.index = if entries.is_empty() {
            -1
        } else {
            index.clamp(0, last)
        };
        self.entries = entries;
    }
}
