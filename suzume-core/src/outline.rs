use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::scroll::Align;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// 0-based page index.
    Page(usize),
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineNode {
    pub title: String,
    pub destination: Option<Destination>,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn new(title: impl Into<String>, destination: Option<Destination>) -> Self {
        Self {
            title: title.into(),
            destination,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatOutlineItem {
    pub title: String,
    pub destination: Option<Destination>,
    pub depth: usize,
    pub path: String,
    pub has_children: bool,
    pub expanded: bool,
}

pub fn child_path(parent: Option<&str>, index: usize) -> String {
    match parent {
        Some(parent) => format!("{parent}-{index}"),
        None => index.to_string(),
    }
}

/// Pre-order listing of the visible part of `tree`; a node's children appear only
/// when its path is in `expanded`.
pub fn flatten(tree: &[OutlineNode], expanded: &HashSet<String>) -> Vec<FlatOutlineItem> {
    let mut items = Vec::new();
    flatten_into(tree, expanded, None, 0, &mut items);
    items
}

fn flatten_into(
    nodes: &[OutlineNode],
    expanded: &HashSet<String>,
    parent: Option<&str>,
    depth: usize,
    out: &mut Vec<FlatOutlineItem>,
) {
    for (index, node) in nodes.iter().enumerate() {
        let path = child_path(parent, index);
        let is_expanded = expanded.contains(&path);
        out.push(FlatOutlineItem {
            title: node.title.clone(),
            destination: node.destination.clone(),
            depth,
            path: path.clone(),
            has_children: !node.children.is_empty(),
            expanded: is_expanded,
        });
        if is_expanded {
            flatten_into(&node.children, expanded, Some(&path), depth + 1, out);
        }
    }
}

pub fn index_of(items: &[FlatOutlineItem], path: &str) -> Option<usize> {
    items.iter().position(|item| item.path == path)
}

/// Moves the selection by `delta` rows, stopping at either end. An unknown or
/// missing selection counts as sitting just above the first row.
pub fn step_selection(
    items: &[FlatOutlineItem],
    selected: Option<&str>,
    delta: isize,
) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let current = selected
        .and_then(|path| index_of(items, path))
        .map(|index| index as isize)
        .unwrap_or(-1);
    let last = items.len() as isize - 1;
    let next = (current + delta).clamp(0, last) as usize;
    items.get(next).map(|item| item.path.clone())
}

/// Scroll position of the outline list, in rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutlineWindow {
    pub scroll_offset: usize,
}

impl OutlineWindow {
    pub fn ensure_visible(&mut self, selected: Option<usize>, len: usize, viewport_rows: usize) {
        if viewport_rows == 0 || len == 0 {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = len.saturating_sub(viewport_rows);
        if self.scroll_offset > max_offset {
            self.scroll_offset = max_offset;
        }
        let Some(selected) = selected else {
            return;
        };
        if selected < self.scroll_offset {
            self.scroll_offset = selected;
            return;
        }
        let bottom = self.scroll_offset + viewport_rows;
        if selected >= bottom {
            self.scroll_offset = selected.saturating_sub(viewport_rows.saturating_sub(1));
        }
    }

    /// `zt`/`zz`/`zb` for the outline list.
    pub fn align(&mut self, selected: usize, len: usize, viewport_rows: usize, align: Align) {
        let offset = match align {
            Align::Start => selected,
            Align::Center => selected.saturating_sub(viewport_rows / 2),
            Align::End => selected.saturating_sub(viewport_rows.saturating_sub(1)),
        };
        self.scroll_offset = offset.min(len.saturating_sub(viewport_rows));
    }
}
