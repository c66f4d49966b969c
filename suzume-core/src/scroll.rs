//! Conversions between the continuous scroll offset and discrete page numbers.
//!
//! Offsets are measured in raster pixels: every page occupies
//! `base_height * render_scale + gap` of them regardless of the display transform.

use std::ops::RangeInclusive;

use crate::scale::sanitize;

pub const FALLBACK_BASE_HEIGHT: f32 = 800.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Center,
    End,
}

impl Align {
    /// The second key of a `z` sequence.
    pub fn from_z_suffix(c: char) -> Option<Self> {
        match c {
            'z' => Some(Align::Center),
            't' => Some(Align::Start),
            'b' => Some(Align::End),
            _ => None,
        }
    }
}

pub fn page_height(base_height: f32, render_scale: f32, gap: f32) -> f32 {
    sanitize(base_height, FALLBACK_BASE_HEIGHT) * sanitize(render_scale, 1.0) + gap.max(0.0)
}

/// The page under the vertical centre of the viewport, clamped to `[1, num_pages]`.
pub fn page_from_scroll(
    scroll_offset: f32,
    viewport_height: f32,
    page_height: f32,
    num_pages: usize,
) -> usize {
    if num_pages == 0 || !(page_height.is_finite() && page_height > 0.0) {
        return 1;
    }
    let offset = if scroll_offset.is_finite() {
        scroll_offset.max(0.0)
    } else {
        0.0
    };
    let half_viewport = if viewport_height.is_finite() {
        viewport_height.max(0.0) / 2.0
    } else {
        0.0
    };
    let index = ((offset + half_viewport) / page_height).floor();
    let page = if index.is_finite() && index >= 0.0 {
        index as usize + 1
    } else {
        1
    };
    page.clamp(1, num_pages)
}

/// Offset placing `page` at the top of the viewport (`Start`), centred in it, or
/// with its bottom edge on the viewport's bottom (`End`). May be negative or past
/// the end; callers clamp against the document extent.
pub fn scroll_for_page(page: usize, page_height: f32, align: Align, viewport_height: f32) -> f32 {
    let top = page.saturating_sub(1) as f32 * page_height;
    let slack = viewport_height - page_height;
    let offset = match align {
        Align::Start => top,
        Align::Center => top - slack / 2.0,
        Align::End => top - slack,
    };
    if offset.is_finite() {
        offset
    } else {
        0.0
    }
}

pub fn max_scroll(page_height: f32, num_pages: usize, viewport_height: f32) -> f32 {
    let total = page_height * num_pages as f32;
    let max = total - viewport_height;
    if max.is_finite() {
        max.max(0.0)
    } else {
        0.0
    }
}

pub fn clamp_scroll(offset: f32, page_height: f32, num_pages: usize, viewport_height: f32) -> f32 {
    let max = max_scroll(page_height, num_pages, viewport_height);
    if offset.is_finite() {
        offset.clamp(0.0, max)
    } else {
        0.0
    }
}

/// Keeps the same content in view when the page height changes (render scale change).
pub fn rescale_offset(offset: f32, old_page_height: f32, new_page_height: f32) -> f32 {
    let ratio = new_page_height / old_page_height;
    if ratio.is_finite() && ratio > 0.0 {
        offset * ratio
    } else {
        offset
    }
}

/// 1-based pages intersecting `[offset, offset + viewport_height)`.
pub fn visible_pages(
    scroll_offset: f32,
    viewport_height: f32,
    page_height: f32,
    num_pages: usize,
) -> RangeInclusive<usize> {
    let first = page_from_scroll(scroll_offset, 0.0, page_height, num_pages);
    let last = page_from_scroll(
        scroll_offset + viewport_height.max(1.0) - 1.0,
        0.0,
        page_height,
        num_pages,
    );
    first..=last.max(first)
}

/// Geometry snapshot of the current layout, in raster pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollGeometry {
    pub page_height: f32,
    pub viewport_height: f32,
    pub num_pages: usize,
}

impl ScrollGeometry {
    pub fn page_at(&self, offset: f32) -> usize {
        page_from_scroll(offset, self.viewport_height, self.page_height, self.num_pages)
    }

    pub fn offset_for(&self, page: usize, align: Align) -> f32 {
        let page = page.clamp(1, self.num_pages.max(1));
        self.clamp(scroll_for_page(page, self.page_height, align, self.viewport_height))
    }

    pub fn clamp(&self, offset: f32) -> f32 {
        clamp_scroll(offset, self.page_height, self.num_pages, self.viewport_height)
    }

    pub fn max_offset(&self) -> f32 {
        max_scroll(self.page_height, self.num_pages, self.viewport_height)
    }

    pub fn visible(&self, offset: f32) -> RangeInclusive<usize> {
        visible_pages(offset, self.viewport_height, self.page_height, self.num_pages)
    }
}
