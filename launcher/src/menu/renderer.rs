use super::state::MenuEntry;

/// Text styles a surface maps to its own colors or fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Border,
    Heading,
    Entry,
    Selected,
    Hint,
}

/// Character-cell drawing surface.
pub trait TextSurface {
    /// Width in cells
    fn width(&self) -> usize;

    /// Height in cells
    fn height(&self) -> usize;

    fn clear(&mut self);

    fn put_str_at(&mut self, x: usize, y: usize, text: &str, style: TextStyle);

    /// Push the frame to the display.
    fn flush(&mut self) {}

    fn center_x(&self, content_width: usize) -> usize {
        self.width().saturating_sub(content_width) / 2
    }

    fn center_y(&self, content_height: usize) -> usize {
        self.height().saturating_sub(content_height) / 2
    }
}

// Box constants
const BOX_WIDTH: usize = 40;
const INNER_WIDTH: usize = BOX_WIDTH - 2;
const TOP_BORDER: &str = "+======================================+";
const BOTTOM_BORDER: &str = "+======================================+";
const DIVIDER: &str = "+--------------------------------------+";
const EMPTY_LINE: &str = "|                                      |";

const LEGEND: &str = "[A] start app  [B] back";
const EMPTY_MESSAGE: &str = "No apps installed";

/// Entry rows shown at once; the window scrolls with the cursor.
pub const VISIBLE_ENTRIES: usize = 8;

pub struct MenuRenderer;

impl MenuRenderer {
    /// Draw the boxed menu with the selection marker on `selected`.
    pub fn render<S: TextSurface + ?Sized>(
        surface: &mut S,
        title: &str,
        entries: &[MenuEntry],
        selected: usize,
    ) {
        let rows = entries.len().clamp(1, VISIBLE_ENTRIES);
        // border, title, divider, rows, divider, legend, border
        let total_height = 1 + 1 + 1 + rows + 1 + 1 + 1;

        let x = surface.center_x(BOX_WIDTH);
        let mut y = surface.center_y(total_height);

        surface.clear();
        surface.put_str_at(x, y, TOP_BORDER, TextStyle::Border);
        y += 1;

        Self::boxed_line(surface, x, y, title, TextStyle::Heading);
        y += 1;

        surface.put_str_at(x, y, DIVIDER, TextStyle::Border);
        y += 1;

        if entries.is_empty() {
            Self::boxed_line(surface, x, y, EMPTY_MESSAGE, TextStyle::Hint);
            y += 1;
        } else {
            let first = Self::window_start(entries.len(), selected);
            for (i, entry) in entries.iter().enumerate().skip(first).take(rows) {
                surface.put_str_at(x, y, EMPTY_LINE, TextStyle::Border);

                let marker = if i == selected { ">> " } else { "   " };
                let style = if i == selected {
                    TextStyle::Selected
                } else {
                    TextStyle::Entry
                };
                surface.put_str_at(x + 2, y, marker, style);
                surface.put_str_at(x + 5, y, clip(&entry.label, INNER_WIDTH - 5), style);
                y += 1;
            }
        }

        surface.put_str_at(x, y, DIVIDER, TextStyle::Border);
        y += 1;

        Self::boxed_line(surface, x, y, LEGEND, TextStyle::Hint);
        y += 1;

        surface.put_str_at(x, y, BOTTOM_BORDER, TextStyle::Border);
        surface.flush();
    }

    /// Single centered status line, used by the installer.
    pub fn render_status<S: TextSurface + ?Sized>(surface: &mut S, message: &str) {
        let x = surface.center_x(BOX_WIDTH);
        let y = surface.center_y(3);

        surface.clear();
        surface.put_str_at(x, y, TOP_BORDER, TextStyle::Border);
        Self::boxed_line(surface, x, y + 1, message, TextStyle::Heading);
        surface.put_str_at(x, y + 2, BOTTOM_BORDER, TextStyle::Border);
        surface.flush();
    }

    fn boxed_line<S: TextSurface + ?Sized>(surface: &mut S, x: usize, y: usize, text: &str, style: TextStyle) {
        surface.put_str_at(x, y, EMPTY_LINE, TextStyle::Border);
        let text = clip(text, INNER_WIDTH);
        let padding = (INNER_WIDTH - text.len()) / 2;
        surface.put_str_at(x + 1 + padding, y, text, style);
    }

    fn window_start(len: usize, selected: usize) -> usize {
        if len <= VISIBLE_ENTRIES {
            0
        } else {
            selected
                .saturating_sub(VISIBLE_ENTRIES - 1)
                .min(len - VISIBLE_ENTRIES)
        }
    }
}

/// Longest prefix of `text` that fits in `max` bytes on a char boundary.
fn clip(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
