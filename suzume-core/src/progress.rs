use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::history::{JumpEntry, JumpHistory};
use crate::persistence::KeyValueStore;
use crate::scale::{sanitize, FitMode, Zoom};
use crate::view::ViewState;

/// Per-document reading position, restored when the same identity is reopened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentProgress {
    pub page: usize,
    pub scroll_offset: f32,
    pub render_scale: f32,
    pub visual_scale: f32,
    pub fit_mode: FitMode,
    pub fit_ratio: f32,
    pub sidebar_open: bool,
    #[serde(default)]
    pub history: Vec<JumpEntry>,
    #[serde(default = "no_index")]
    pub history_index: isize,
}

fn no_index() -> isize {
    -1
}

impl DocumentProgress {
    pub fn capture(view: &ViewState, history: &JumpHistory) -> Self {
        let (history, history_index) = history.snapshot();
        Self {
            page: view.current_page,
            scroll_offset: view.scroll_offset,
            render_scale: view.render_scale,
            visual_scale: view.zoom.visual_scale,
            fit_mode: view.zoom.fit_mode,
            fit_ratio: view.zoom.fit_ratio,
            sidebar_open: view.sidebar_open,
            history,
            history_index,
        }
    }

    /// Writes the record back into live state. Corrupt numbers fall back to what
    /// `view` already holds.
    pub fn apply(&self, view: &mut ViewState, history: &mut JumpHistory) {
        view.current_page = self.page.max(1);
        view.scroll_offset = if self.scroll_offset.is_finite() {
            self.scroll_offset.max(0.0)
        } else {
            0.0
        };
        view.render_scale = sanitize(self.render_scale, view.render_scale);
        view.zoom = Zoom {
            fit_mode: self.fit_mode,
            visual_scale: sanitize(self.visual_scale, view.zoom.visual_scale),
            fit_ratio: sanitize(self.fit_ratio, view.zoom.fit_ratio),
        };
        view.sidebar_open = self.sidebar_open;
        history.restore(self.history.clone(), self.history_index);
    }
}

pub fn progress_key(id: &DocumentId) -> String {
    format!("progress:{id}")
}

pub fn load_progress(
    store: &dyn KeyValueStore,
    id: &DocumentId,
) -> Result<Option<DocumentProgress>> {
    let key = progress_key(id);
    match store.get(&key)? {
        Some(value) => {
            let progress = serde_json::from_value(value)
                .with_context(|| format!("failed to decode progress record {key}"))?;
            Ok(Some(progress))
        }
        None => Ok(None),
    }
}

pub fn save_progress(
    store: &dyn KeyValueStore,
    id: &DocumentId,
    progress: &DocumentProgress,
) -> Result<()> {
    store.set(&progress_key(id), serde_json::to_value(progress)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::document_id_for_identity;
    use crate::persistence::MemoryKeyValueStore;
    use serde_json::json;

    #[test]
    fn capture_then_apply_restores_view() {
        let mut view = ViewState::default();
        view.current_page = 7;
        view.scroll_offset = 6400.0;
        view.zoom.fit_mode = FitMode::Absolute;
        view.zoom.visual_scale = 1.75;
        view.sidebar_open = false;
        let mut history = JumpHistory::default();
        history.push(JumpEntry::new(1, 0.0));
        history.push(JumpEntry::new(7, 6400.0));
        history.back();

        let progress = DocumentProgress::capture(&view, &history);
        let mut restored_view = ViewState::default();
        let mut restored_history = JumpHistory::default();
        progress.apply(&mut restored_view, &mut restored_history);

        assert_eq!(restored_view.current_page, 7);
        assert_eq!(restored_view.scroll_offset, 6400.0);
        assert_eq!(restored_view.zoom, view.zoom);
        assert!(!restored_view.sidebar_open);
        assert_eq!(restored_history.index(), 0);
        assert_eq!(restored_history.len(), 2);
    }

    #[test]
    fn stored_records_round_trip() {
        let store = MemoryKeyValueStore::new();
        let id = document_id_for_identity("book.pdf");
        assert!(load_progress(&store, &id).unwrap().is_none());

        let progress = DocumentProgress::capture(&ViewState::default(), &JumpHistory::default());
        save_progress(&store, &id, &progress).unwrap();
        assert_eq!(load_progress(&store, &id).unwrap(), Some(progress));
    }

    #[test]
    fn older_records_without_history_load() {
        let store = MemoryKeyValueStore::new();
        let id = document_id_for_identity("old.pdf");
        store
            .set(
                &progress_key(&id),
                json!({
                    "page": 3,
                    "scroll_offset": 100.0,
                    "render_scale": 1.5,
                    "visual_scale": 1.0,
                    "fit_mode": "relative",
                    "fit_ratio": 0.9,
                    "sidebar_open": true
                }),
            )
            .unwrap();
        let progress = load_progress(&store, &id).unwrap().unwrap();
        assert!(progress.history.is_empty());
        assert_eq!(progress.history_index, -1);
    }

    #[test]
    fn corrupt_numbers_are_rejected_on_apply() {
        let mut progress =
            DocumentProgress::capture(&ViewState::default(), &JumpHistory::default());
        progress.render_scale = f32::NAN;
        progress.fit_ratio = -2.0;
        progress.page = 0;
        let mut view = ViewState::default();
        let mut history = JumpHistory::default();
        progress.apply(&mut view, &mut history);
        assert_eq!(view.render_scale, 1.5);
        assert_eq!(view.zoom.fit_ratio, 0.9);
        assert_eq!(view.current_page, 1);
    }
}
