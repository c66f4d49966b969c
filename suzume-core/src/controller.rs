//! Key routing and the held-key repeat loop.
//!
//! Discrete keys go through the store's command interpreter. Movement and zoom keys
//! are different: while held they move the view a fixed amount every frame until
//! released. Terminals that never report releases get a timeout instead, refreshed
//! by every auto-repeat event.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::command::Action;
use crate::config::ViewerConfig;
use crate::input::{Key, KeyInput};
use crate::scale::Zoom;
use crate::store::ViewStateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepeatKey {
    Down,
    Up,
    FastDown,
    FastUp,
    ZoomIn,
    ZoomOut,
}

impl RepeatKey {
    fn from_input(input: &KeyInput) -> Option<Self> {
        if input.modifiers.ctrl || input.modifiers.alt || input.modifiers.meta {
            return None;
        }
        match input.key {
            Key::Char('j') | Key::Down => Some(Self::Down),
            Key::Char('k') | Key::Up => Some(Self::Up),
            Key::Char('d') => Some(Self::FastDown),
            Key::Char('u') => Some(Self::FastUp),
            Key::Char('+') | Key::Char('=') => Some(Self::ZoomIn),
            Key::Char('-') => Some(Self::ZoomOut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HeldKey {
    key: RepeatKey,
    expires: Option<Instant>,
}

/// Values the repeat loop accumulates across frames. Written through to the store
/// every frame and re-read after each write so store-side clamping sticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepeatCell {
    pub scroll_offset: f32,
    pub zoom: Zoom,
}

impl RepeatCell {
    fn from_store(store: &ViewStateStore) -> Self {
        Self {
            scroll_offset: store.scroll_offset(),
            zoom: store.zoom(),
        }
    }
}

pub struct NavigationController {
    held: Vec<HeldKey>,
    cell: Option<RepeatCell>,
    next_frame: Option<Instant>,
    releases_reported: bool,
    frame_interval: Duration,
    release_timeout: Duration,
    scroll_speed: f32,
    fast_scroll_speed: f32,
    zoom_rate: f32,
}

impl NavigationController {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            held: Vec::new(),
            cell: None,
            next_frame: None,
            releases_reported: false,
            frame_interval: config.frame_interval.max(Duration::from_millis(1)),
            release_timeout: config.release_timeout,
            scroll_speed: config.scroll_speed,
            fast_scroll_speed: config.fast_scroll_speed,
            zoom_rate: config.zoom_rate,
        }
    }

    /// Whether the terminal delivers key release events. Without them held keys
    /// expire after the configured release timeout.
    pub fn set_release_events(&mut self, reported: bool) {
        self.releases_reported = reported;
    }

    pub fn is_animating(&self) -> bool {
        self.next_frame.is_some()
    }

    pub fn cell(&self) -> Option<RepeatCell> {
        self.cell
    }

    /// Earliest instant the event loop must wake for: the next frame or the next
    /// debounced progress write.
    pub fn next_deadline(&self, store: &ViewStateStore) -> Option<Instant> {
        match (self.next_frame, store.next_save_due()) {
            (Some(frame), Some(save)) => Some(frame.min(save)),
            (frame, save) => frame.or(save),
        }
    }

    pub fn handle_key(&mut self, store: &mut ViewStateStore, input: &KeyInput, now: Instant) {
        if let Some(action) = captured(input) {
            debug!(?action, "history chord");
            self.cell = None;
            store.apply(action);
            return;
        }

        if store.text_entry_active() {
            self.stop();
            store.handle_key(input);
            return;
        }

        if let Some(key) = RepeatKey::from_input(input) {
            if input.is_release() {
                self.release(key);
                return;
            }
            if store.repeat_keys_enabled() {
                self.hold(key, now);
                return;
            }
        }

        self.cell = None;
        store.handle_key(input);
    }

    fn hold(&mut self, key: RepeatKey, now: Instant) {
        let expires = (!self.releases_reported).then(|| now + self.release_timeout);
        match self.held.iter_mut().find(|held| held.key == key) {
            Some(held) => held.expires = expires,
            None => {
                self.held.push(HeldKey { key, expires });
                if self.next_frame.is_none() {
                    self.next_frame = Some(now);
                }
            }
        }
    }

    fn release(&mut self, key: RepeatKey) {
        self.held.retain(|held| held.key != key);
        if self.held.is_empty() {
            self.stop();
        }
    }

    fn stop(&mut self) {
        self.held.clear();
        self.cell = None;
        self.next_frame = None;
    }

    /// Runs one frame of the repeat loop if one is due.
    pub fn on_frame(&mut self, store: &mut ViewStateStore, now: Instant) {
        match self.next_frame {
            Some(due) if due <= now => {}
            _ => return,
        }
        self.held
            .retain(|held| held.expires.map(|expires| expires > now).unwrap_or(true));
        if self.held.is_empty() || !store.repeat_keys_enabled() {
            self.stop();
            return;
        }

        let mut scroll = 0.0;
        let mut zoom = 0.0;
        for held in &self.held {
            match held.key {
                RepeatKey::Down => scroll += self.scroll_speed,
                RepeatKey::Up => scroll -= self.scroll_speed,
                RepeatKey::FastDown => scroll += self.fast_scroll_speed,
                RepeatKey::FastUp => scroll -= self.fast_scroll_speed,
                RepeatKey::ZoomIn => zoom += self.zoom_rate,
                RepeatKey::ZoomOut => zoom -= self.zoom_rate,
            }
        }

        let cell = self.cell.get_or_insert_with(|| RepeatCell::from_store(store));
        if zoom != 0.0 {
            cell.zoom.step(zoom, store.zoom_limits());
            store.set_zoom(cell.zoom);
            cell.zoom = store.zoom();
            cell.scroll_offset = store.scroll_offset();
        }
        if scroll != 0.0 {
            let target = cell.scroll_offset + scroll;
            let target = match store.geometry() {
                Some(geometry) => geometry.clamp(target),
                None => target.max(0.0),
            };
            store.scroll_to(target);
            cell.scroll_offset = store.scroll_offset();
        }
        self.next_frame = Some(now + self.frame_interval);
    }
}

/// Chords that bypass every other handler.
fn captured(input: &KeyInput) -> Option<Action> {
    if input.is_release() {
        return None;
    }
    let modifiers = input.modifiers;
    match input.key {
        Key::Char('o') if modifiers.ctrl && !modifiers.meta => Some(Action::JumpBack),
        Key::Char('i') if modifiers.ctrl && !modifiers.meta => Some(Action::JumpForward),
        // Terminals send Tab for Ctrl+I.
        Key::Tab if !modifiers.ctrl && !modifiers.alt && !modifiers.meta => {
            Some(Action::JumpForward)
        }
        _ => None,
    }
}
