use std::io::{self, Write};

use anyhow::Result;
use crossterm::cursor;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use suzume_core::{FocusMode, PageCache, ViewStateStore};
use suzume_tty::{write_status_line, DrawParams, KittyRenderer};
use tracing::warn;

use crate::layout::{
    background, compose_pages, format_outline_line, format_status, truncate_with_ellipsis,
    PageSlot, Screen,
};

/// Largest canvas edge composed in one frame, in raster pixels.
const MAX_CANVAS_EDGE: f32 = 8192.0;

const HELP_LINES: &[&str] = &[
    "j k       scroll (hold to glide)",
    "d u       scroll faster",
    "h l       previous / next page",
    "gg G      first / last page",
    "zt zz zb  page to top / centre / bottom",
    "+ -       zoom in / out",
    "a         toggle absolute / relative fit",
    "t         toggle outline",
    "Ctrl-o    jump back",
    "Ctrl-i    jump forward",
    "r         recent documents",
    "o         open a file",
    ":N        go to page N",
    ":a :r [%] absolute / relative zoom",
    ":fw :fp   fit width / fit page",
    ":raster % render resolution",
    ":dark     dark theme (:light)",
    ":fs       fullscreen",
    "?         toggle this help",
    "q         quit",
];

/// Repaints the whole screen from the store.
pub fn redraw(
    renderer: &mut KittyRenderer<io::Stdout>,
    store: &ViewStateStore,
    cache: &PageCache,
    screen: Screen,
) -> Result<()> {
    renderer.begin_sync_update()?;
    renderer.clear_all()?;
    renderer.clear_images()?;

    let fullscreen = store.fullscreen();
    let sidebar_visible = Screen::sidebar_visible(store.sidebar_open(), fullscreen);
    let sidebar_columns = if sidebar_visible {
        screen.sidebar_columns(store.config().sidebar_columns)
    } else {
        0
    };

    draw_document(renderer, store, cache, screen, sidebar_columns)?;
    if sidebar_columns > 0 {
        draw_sidebar(renderer.writer(), store, screen, sidebar_columns)?;
    }
    draw_bottom_line(renderer.writer(), store, screen)?;

    if store.help_open() {
        let lines: Vec<String> = HELP_LINES.iter().map(|line| line.to_string()).collect();
        draw_box(renderer.writer(), "Keys", &lines, None, screen)?;
    } else if store.finder_open() {
        draw_finder(renderer.writer(), store, screen)?;
    }

    renderer.end_sync_update()
}

fn draw_document(
    renderer: &mut KittyRenderer<io::Stdout>,
    store: &ViewStateStore,
    cache: &PageCache,
    screen: Screen,
    sidebar_columns: u16,
) -> Result<()> {
    let (Some(geometry), Some(backend)) = (store.geometry(), store.backend()) else {
        return Ok(());
    };
    let ratio = store.transform_ratio();
    let canvas_width = (store.available_width() / ratio).clamp(1.0, MAX_CANVAS_EDGE);
    let canvas_height = geometry.viewport_height.clamp(1.0, MAX_CANVAS_EDGE);

    let offset = store.scroll_offset();
    let reference_page = store.current_page().saturating_sub(1);
    let dark = store.theme().is_dark();
    let mut rendered = Vec::new();
    for page in geometry.visible(offset) {
        match cache.get_or_render(
            backend.as_ref(),
            page - 1,
            store.render_scale(),
            dark,
            reference_page,
        ) {
            Ok(image) => rendered.push((page, image)),
            Err(err) => warn!(page, %err, "failed to render page"),
        }
    }
    let slots: Vec<PageSlot<'_>> = rendered
        .iter()
        .map(|(page, image)| PageSlot {
            page: *page,
            image: image.as_ref(),
        })
        .collect();
    let canvas = compose_pages(
        &slots,
        geometry.page_height,
        offset,
        canvas_width as u32,
        canvas_height as u32,
        background(store.theme()),
    );

    let fullscreen = store.fullscreen();
    let columns = screen.document_columns(store.config().sidebar_columns, sidebar_columns > 0);
    let rows = screen.document_rows(fullscreen);
    crossterm::queue!(renderer.writer(), cursor::MoveTo(sidebar_columns, 0))?;
    renderer.draw(
        &canvas,
        DrawParams::clamped(u32::from(columns), u32::from(rows)),
    )
}

fn draw_sidebar(
    writer: &mut impl Write,
    store: &ViewStateStore,
    screen: Screen,
    columns: u16,
) -> Result<()> {
    let rows = screen.document_rows(store.fullscreen());
    let width = usize::from(columns.saturating_sub(1));
    let focused = store.focus_mode() == FocusMode::Outline;

    let mut lines = Vec::with_capacity(usize::from(rows));
    lines.push((format!("{:^width$}", "Outline"), false));
    lines.push(("-".repeat(width), false));

    let items = store.outline();
    if items.is_empty() {
        lines.push((truncate_with_ellipsis("  (no outline)".into(), width), false));
    } else {
        let selected = store.selected_outline_path();
        let start = store.outline_window().scroll_offset;
        let visible = usize::from(rows.saturating_sub(2));
        for item in items.iter().skip(start).take(visible) {
            let is_selected = selected == Some(item.path.as_str());
            lines.push((
                format_outline_line(item, is_selected, width),
                is_selected && focused,
            ));
        }
    }

    for row in 0..rows {
        let (text, inverted) = lines
            .get(usize::from(row))
            .cloned()
            .unwrap_or_else(|| (" ".repeat(width), false));
        let text = truncate_with_ellipsis(text, width);
        if inverted {
            print_inverted(writer, 0, row, &text)?;
        } else {
            crossterm::queue!(writer, cursor::MoveTo(0, row), Print(text))?;
        }
        crossterm::queue!(writer, cursor::MoveTo(columns.saturating_sub(1), row), Print('|'))?;
    }
    writer.flush()?;
    Ok(())
}

/// Status line, or the command line while one is being typed. Fullscreen hides the
/// status line but still shows the command line over the last row.
fn draw_bottom_line(writer: &mut impl Write, store: &ViewStateStore, screen: Screen) -> Result<()> {
    let interpreter = store.interpreter();
    let text = if interpreter.is_command_line() {
        format!(":{}", interpreter.buffer())
    } else if store.fullscreen() {
        return Ok(());
    } else {
        format_status(
            store.active_identity(),
            store.current_page(),
            store.num_pages(),
            store.displayed_scale(),
            store.fit_mode(),
            store.pending_command().map(|pending| pending.as_char()),
        )
    };
    let row = screen.rows.saturating_sub(1);
    crossterm::queue!(writer, cursor::MoveTo(0, row), Clear(ClearType::CurrentLine))?;
    let width = usize::from(screen.columns);
    let text: String = text.chars().take(width).collect();
    write_status_line(writer, &text)?;
    Ok(())
}

fn draw_finder(writer: &mut impl Write, store: &ViewStateStore, screen: Screen) -> Result<()> {
    let finder = store.finder();
    let matches = finder.filter(store.recent().entries());
    let mut lines = vec![format!("> {}", finder.query()), String::new()];
    if matches.is_empty() {
        lines.push("  no matching documents".into());
    }
    for (index, document) in matches.iter().enumerate() {
        let marker = if index == finder.selected() { '>' } else { ' ' };
        lines.push(format!("{marker} {}", document.identity));
    }
    let selected_line = (!matches.is_empty()).then(|| finder.selected() + 2);
    draw_box(writer, "Recent documents", &lines, selected_line, screen)
}

/// Draws a centred, inverted box with a title. Lines past the available height are
/// scrolled so `selected` stays visible.
fn draw_box(
    writer: &mut impl Write,
    title: &str,
    lines: &[String],
    selected: Option<usize>,
    screen: Screen,
) -> Result<()> {
    let total_cols = usize::from(screen.columns);
    let total_rows = usize::from(screen.rows);
    if total_cols < 20 || total_rows < 6 {
        return Ok(());
    }

    let max_inner_width = total_cols - 4;
    let inner_width = lines
        .iter()
        .map(|line| line.chars().count() + 2)
        .chain(std::iter::once(title.chars().count() + 2))
        .max()
        .unwrap_or(0)
        .clamp(20.min(max_inner_width), max_inner_width);
    let content_height = lines.len().min(total_rows.saturating_sub(6)).max(1);
    let first = match selected {
        Some(selected) if selected >= content_height => selected + 1 - content_height,
        _ => 0,
    };

    let window_height = content_height + 4;
    let start_col = ((total_cols - (inner_width + 2)) / 2) as u16;
    let mut row = (total_rows.saturating_sub(window_height) / 2) as u16;
    let border = format!("+{}+", "-".repeat(inner_width));

    print_inverted(writer, start_col, row, &border)?;
    row += 1;
    print_inverted(writer, start_col, row, &format!("|{title:^inner_width$}|"))?;
    row += 1;
    print_inverted(writer, start_col, row, &format!("|{}|", "-".repeat(inner_width)))?;
    row += 1;
    for index in first..first + content_height {
        let line = lines.get(index).cloned().unwrap_or_default();
        let content = truncate_with_ellipsis(format!(" {line}"), inner_width);
        print_inverted(writer, start_col, row, &format!("|{content}|"))?;
        row += 1;
    }
    print_inverted(writer, start_col, row, &border)?;
    writer.flush()?;
    Ok(())
}

fn print_inverted(writer: &mut impl Write, col: u16, row: u16, content: &str) -> Result<()> {
    crossterm::queue!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(Attribute::Reverse),
        Print(content),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> Screen {
        Screen::new(60, 20, 480, 320)
    }

    #[test]
    fn boxes_are_framed_and_centred() {
        let mut out = Vec::new();
        let lines = vec!["first".to_string(), "second".to_string()];
        draw_box(&mut out, "Title", &lines, None, screen()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("+{}+", "-".repeat(20))));
        assert!(text.contains("|       Title        |"));
        assert!(text.contains("| first              |"));
    }

    #[test]
    fn long_lists_scroll_to_the_selection() {
        let mut out = Vec::new();
        let lines: Vec<String> = (0..40).map(|i| format!("entry {i}")).collect();
        draw_box(&mut out, "List", &lines, Some(30), screen()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("entry 30"));
        assert!(!text.contains("entry 0 "));
    }

    #[test]
    fn tiny_screens_skip_boxes() {
        let mut out = Vec::new();
        draw_box(&mut out, "Keys", &[], None, Screen::new(10, 4, 0, 0)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn help_fits_a_standard_terminal() {
        assert!(HELP_LINES.iter().all(|line| line.chars().count() <= 40));
    }
}
