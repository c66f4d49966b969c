//! Terminal-cell layout and pixel composition, kept free of IO.

use suzume_core::{FitMode, FlatOutlineItem, RenderImage, Theme, Viewport};

/// Cell size assumed when the terminal does not report its pixel dimensions.
const FALLBACK_CELL_WIDTH: f32 = 8.0;
const FALLBACK_CELL_HEIGHT: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screen {
    pub columns: u16,
    pub rows: u16,
    pub cell_width: f32,
    pub cell_height: f32,
}

impl Screen {
    pub fn new(columns: u16, rows: u16, pixel_width: u16, pixel_height: u16) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        let cell = |pixels: u16, cells: u16, fallback: f32| {
            if pixels == 0 {
                fallback
            } else {
                f32::from(pixels) / f32::from(cells)
            }
        };
        Self {
            columns,
            rows,
            cell_width: cell(pixel_width, columns, FALLBACK_CELL_WIDTH),
            cell_height: cell(pixel_height, rows, FALLBACK_CELL_HEIGHT),
        }
    }

    /// Rows for the document, leaving the status line unless fullscreen.
    pub fn document_rows(&self, fullscreen: bool) -> u16 {
        if fullscreen {
            self.rows
        } else {
            self.rows.saturating_sub(1).max(1)
        }
    }

    /// Width of the outline sidebar, never more than half the screen.
    pub fn sidebar_columns(&self, configured: u16) -> u16 {
        configured.min(self.columns / 2)
    }

    pub fn sidebar_visible(sidebar_open: bool, fullscreen: bool) -> bool {
        sidebar_open && !fullscreen
    }

    pub fn document_columns(&self, configured_sidebar: u16, sidebar_visible: bool) -> u16 {
        if sidebar_visible {
            self.columns
                .saturating_sub(self.sidebar_columns(configured_sidebar))
                .max(1)
        } else {
            self.columns
        }
    }

    pub fn viewport(&self, configured_sidebar: u16, fullscreen: bool) -> Viewport {
        let document_rows = self.document_rows(fullscreen);
        Viewport {
            width: f32::from(self.columns) * self.cell_width,
            height: f32::from(document_rows) * self.cell_height,
            sidebar_width: f32::from(self.sidebar_columns(configured_sidebar)) * self.cell_width,
            // Title and divider take two rows.
            outline_rows: usize::from(document_rows.saturating_sub(2)).max(1),
        }
    }
}

pub fn background(theme: Theme) -> [u8; 3] {
    match theme {
        Theme::Dark => [24, 24, 27],
        Theme::Light => [214, 214, 218],
    }
}

/// A rendered page and its 1-based number.
pub struct PageSlot<'a> {
    pub page: usize,
    pub image: &'a RenderImage,
}

/// Stacks pages vertically at `page_height` intervals, shifted up by
/// `scroll_offset`, and crops the result to the canvas. Pages are centred
/// horizontally.
pub fn compose_pages(
    slots: &[PageSlot<'_>],
    page_height: f32,
    scroll_offset: f32,
    canvas_width: u32,
    canvas_height: u32,
    fill: [u8; 3],
) -> RenderImage {
    let width = canvas_width.max(1) as usize;
    let height = canvas_height.max(1) as usize;
    let mut pixels = Vec::with_capacity(width * height * 4);
    for _ in 0..width * height {
        pixels.extend_from_slice(&[fill[0], fill[1], fill[2], 255]);
    }

    for slot in slots {
        let image = slot.image;
        let src_width = image.width as usize;
        if src_width == 0 || image.pixels.len() < src_width * image.height as usize * 4 {
            continue;
        }
        let top = (slot.page.saturating_sub(1) as f32 * page_height - scroll_offset).round() as i64;
        let left = (width as i64 - src_width as i64) / 2;
        let x0 = (-left).max(0) as usize;
        let x1 = (width as i64 - left).min(src_width as i64).max(0) as usize;
        if x0 >= x1 {
            continue;
        }
        for row in 0..image.height as usize {
            let y = top + row as i64;
            if y < 0 {
                continue;
            }
            if y >= height as i64 {
                break;
            }
            let src = (row * src_width + x0) * 4..(row * src_width + x1) * 4;
            let dst_start = (y as usize * width + (left + x0 as i64) as usize) * 4;
            pixels[dst_start..dst_start + src.len()].copy_from_slice(&image.pixels[src]);
        }
    }

    RenderImage {
        width: width as u32,
        height: height as u32,
        pixels,
    }
}

pub fn format_status(
    identity: Option<&str>,
    page: usize,
    num_pages: Option<usize>,
    displayed_scale: f32,
    fit_mode: FitMode,
    pending: Option<char>,
) -> String {
    let mut parts = vec![identity.unwrap_or("no document").to_string()];
    let total = num_pages.map_or_else(|| "?".to_string(), |count| count.to_string());
    parts.push(format!("page {page} / {total}"));
    parts.push(format!("{:.0}% {}", displayed_scale * 100.0, fit_mode));
    if let Some(pending) = pending {
        parts.push(pending.to_string());
    }
    parts.join(" | ")
}

pub fn format_outline_line(item: &FlatOutlineItem, selected: bool, width: usize) -> String {
    let marker = if selected { '>' } else { ' ' };
    let fold = match (item.has_children, item.expanded) {
        (false, _) => ' ',
        (true, false) => '+',
        (true, true) => '-',
    };
    let indent = "  ".repeat(item.depth.min(8));
    truncate_with_ellipsis(format!("{marker}{fold}{indent}{}", item.title), width)
}

/// Cuts `text` to `width` characters, ending in `...` when shortened, and pads it
/// back out to exactly `width`.
pub fn truncate_with_ellipsis(text: String, width: usize) -> String {
    let length = text.chars().count();
    let mut text = if length > width {
        if width <= 3 {
            text.chars().take(width).collect()
        } else {
            let mut truncated: String = text.chars().take(width - 3).collect();
            truncated.push_str("...");
            truncated
        }
    } else {
        text
    };
    let length = text.chars().count();
    if length < width {
        text.push_str(&" ".repeat(width - length));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> RenderImage {
        RenderImage {
            width,
            height,
            pixels: vec![value; (width * height * 4) as usize],
        }
    }

    fn pixel(image: &RenderImage, x: u32, y: u32) -> u8 {
        image.pixels[((y * image.width + x) * 4) as usize]
    }

    #[test]
    fn viewport_reserves_status_line() {
        let screen = Screen::new(100, 41, 800, 656);
        assert_eq!(screen.cell_width, 8.0);
        assert_eq!(screen.cell_height, 16.0);
        let viewport = screen.viewport(32, false);
        assert_eq!(viewport.height, 640.0);
        assert_eq!(viewport.sidebar_width, 256.0);
        assert_eq!(viewport.outline_rows, 38);
        assert_eq!(screen.viewport(32, true).height, 656.0);
    }

    #[test]
    fn missing_pixel_size_falls_back() {
        let screen = Screen::new(80, 24, 0, 0);
        assert_eq!(screen.cell_width, FALLBACK_CELL_WIDTH);
        assert_eq!(screen.sidebar_columns(60), 40);
        assert_eq!(screen.document_columns(32, true), 48);
        assert_eq!(screen.document_columns(32, false), 80);
    }

    #[test]
    fn pages_are_stacked_and_cropped() {
        let first = solid(2, 2, 10);
        let second = solid(2, 2, 20);
        let slots = [
            PageSlot { page: 1, image: &first },
            PageSlot { page: 2, image: &second },
        ];
        // Page height 3 leaves a one-row gap between the pages.
        let canvas = compose_pages(&slots, 3.0, 1.0, 4, 4, [0, 0, 0]);
        assert_eq!((canvas.width, canvas.height), (4, 4));
        assert_eq!(pixel(&canvas, 1, 0), 10);
        assert_eq!(pixel(&canvas, 0, 0), 0);
        assert_eq!(pixel(&canvas, 1, 1), 0);
        assert_eq!(pixel(&canvas, 1, 2), 20);
        assert_eq!(pixel(&canvas, 2, 3), 20);
        assert_eq!(pixel(&canvas, 3, 3), 0);
    }

    #[test]
    fn wide_pages_are_centre_cropped() {
        let mut wide = solid(6, 1, 0);
        for x in 0..6u8 {
            wide.pixels[x as usize * 4] = x;
        }
        let slots = [PageSlot { page: 1, image: &wide }];
        let canvas = compose_pages(&slots, 1.0, 0.0, 2, 1, [99, 99, 99]);
        assert_eq!(pixel(&canvas, 0, 0), 2);
        assert_eq!(pixel(&canvas, 1, 0), 3);
    }

    #[test]
    fn status_line_lists_position_and_zoom() {
        let status = format_status(Some("a.pdf"), 3, Some(10), 1.5, FitMode::Relative, Some('g'));
        assert_eq!(status, "a.pdf | page 3 / 10 | 150% relative | g");
        let unknown = format_status(None, 1, None, 1.0, FitMode::Absolute, None);
        assert_eq!(unknown, "no document | page 1 / ? | 100% absolute");
    }

    #[test]
    fn outline_lines_show_depth_and_fold_state() {
        let item = FlatOutlineItem {
            title: "Introduction".into(),
            destination: None,
            depth: 1,
            path: "0-0".into(),
            has_children: true,
            expanded: false,
        };
        assert_eq!(format_outline_line(&item, true, 12), ">+  Intro...");
        assert_eq!(format_outline_line(&item, false, 18), " +  Introduction  ");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_with_ellipsis("ééééé".into(), 4), "é...");
        assert_eq!(truncate_with_ellipsis("ab".into(), 2), "ab");
        assert_eq!(truncate_with_ellipsis("abcdef".into(), 2), "ab");
    }
}
