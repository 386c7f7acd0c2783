use std::ops::Range;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table as RatatuiTable, TableState},
    Frame,
};

use crate::app::App;
use crate::clipboard::ClipKind;
use crate::editor::ActiveEdit;
use crate::mode::Mode;
use crate::sync::SaveStatus;
use crate::util::{col_to_letters, display_width, insert_char_at};

/// Widest a column is drawn, in terminal cells
const MAX_COL_WIDTH: usize = 40;
const MIN_COL_WIDTH: usize = 3;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.size());

    render_table(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
    render_command_line(frame, app, chunks[2]);
}

/// One line of a cell as shown in the grid. Multi-line values show their first line.
fn cell_display(value: &str) -> String {
    match value.split_once('\n') {
        Some((first, _)) => format!("{}…", first),
        None => value.to_string(),
    }
}

/// Edit buffer with a caret marker, line breaks shown as ⏎
fn edit_display(edit: &ActiveEdit) -> String {
    let mut shown = edit.buffer.clone();
    insert_char_at(&mut shown, edit.cursor, '▏');
    shown.replace('\n', "⏎")
}

/// Columns that fit in `available` cells while keeping `cursor_col` on screen
fn visible_columns(widths: &[usize], cursor_col: usize, available: usize) -> Range<usize> {
    if widths.is_empty() {
        return 0..0;
    }
    let cursor_col = cursor_col.min(widths.len() - 1);

    // Walk left from the cursor while there is room
    let mut start = cursor_col;
    let mut used = widths[cursor_col];
    while start > 0 && used + widths[start - 1] <= available {
        start -= 1;
        used += widths[start];
    }

    let mut end = cursor_col + 1;
    while end < widths.len() && used + widths[end] <= available {
        used += widths[end];
        end += 1;
    }
    start..end
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let engine = &app.engine;
    let grid = engine.grid();
    let col_count = grid.col_count();
    if col_count == 0 {
        return;
    }

    let cursor = engine.selection().cursor();
    let range = engine.selection().active_range();
    let edit = engine.session().active();
    let cut_source = engine
        .clipboard_payload()
        .filter(|p| p.kind == ClipKind::Cut)
        .and_then(|p| p.source);

    let row_num_width = grid.row_count().to_string().len().max(3);

    // Column widths from header and content, each plus two cells of padding
    let data_col_widths: Vec<usize> = grid
        .columns()
        .iter()
        .map(|name| {
            let content_width = grid
                .rows()
                .iter()
                .filter_map(|row| row.get(name))
                .map(|s| display_width(&cell_display(s)))
                .max()
                .unwrap_or(0);
            content_width
                .max(display_width(name) + 1)
                .clamp(MIN_COL_WIDTH, MAX_COL_WIDTH)
                + 2
        })
        .collect();

    let available = (area.width as usize).saturating_sub(row_num_width + 3);
    let shown = visible_columns(&data_col_widths, cursor.col, available);

    let mut col_widths: Vec<Constraint> = Vec::with_capacity(shown.len() + 1);
    col_widths.push(Constraint::Length(row_num_width as u16 + 1));
    for w in &data_col_widths[shown.clone()] {
        col_widths.push(Constraint::Length(*w as u16));
    }

    let header_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);

    let mut header_cells: Vec<Cell> = Vec::with_capacity(shown.len() + 1);
    header_cells.push(Cell::from("").style(header_style));
    for col in shown.clone() {
        let name = grid.column_at(col).unwrap_or("");
        // Columns with an instruction are marked
        let label = if grid.instruction(name).is_some() {
            format!("{}*", name)
        } else {
            name.to_string()
        };
        let style = if col == cursor.col {
            header_style.bg(Color::DarkGray)
        } else {
            header_style
        };
        header_cells.push(Cell::from(label).style(style));
    }
    let header_row = Row::new(header_cells);

    let rows: Vec<Row> = grid
        .rows()
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let mut cells: Vec<Cell> = Vec::with_capacity(shown.len() + 1);

            let row_num_style = if row_idx == cursor.row {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            cells.push(Cell::from(format!("{}", row_idx + 1)).style(row_num_style));

            for col_idx in shown.clone() {
                let name = grid.column_at(col_idx).unwrap_or("");
                let is_cursor = row_idx == cursor.row && col_idx == cursor.col;
                let editing_here = edit.filter(|e| e.row == row_idx && e.column == name);

                let mut style = if is_cursor {
                    Style::default()
                        .bg(Color::Blue)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD)
                } else if !range.is_single() && range.contains(row_idx, col_idx) {
                    Style::default().bg(Color::DarkGray)
                } else {
                    Style::default()
                };
                if cut_source.is_some_and(|source| source.contains(row_idx, col_idx)) {
                    style = style.fg(Color::Yellow).add_modifier(Modifier::ITALIC);
                }

                let content = match editing_here {
                    Some(edit) => edit_display(edit),
                    None => cell_display(row.get(name).map(String::as_str).unwrap_or("")),
                };
                cells.push(Cell::from(content).style(style));
            }

            Row::new(cells)
        })
        .collect();

    let title = format!(" {} ", grid.name());
    let table = RatatuiTable::new(rows, col_widths)
        .header(header_row)
        .block(Block::default().borders(Borders::ALL).title(title));

    let mut state = TableState::default();
    state.select(Some(cursor.row));
    frame.render_stateful_widget(table, area, &mut state);
}

fn save_indicator(status: &SaveStatus) -> (&'static str, Style) {
    match status {
        SaveStatus::Saved => ("saved", Style::default().fg(Color::Green)),
        SaveStatus::Unsaved => ("[+]", Style::default().fg(Color::Red)),
        SaveStatus::Saving => ("saving…", Style::default().fg(Color::Yellow)),
        SaveStatus::Failed(_) => ("save failed", Style::default().fg(Color::White).bg(Color::Red)),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let engine = &app.engine;
    let mode = app.mode();
    let mode_style = match mode {
        Mode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        Mode::Edit => Style::default().bg(Color::Green).fg(Color::Black),
        Mode::Command => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let status = engine.save_status();
    let (save_text, save_style) = save_indicator(&status);

    let document = engine.doc_id().unwrap_or("[not saved]").to_string();

    let cursor = engine.selection().cursor();
    let column = engine.grid().column_at(cursor.col).unwrap_or("");
    let instruction = engine
        .grid()
        .instruction(column)
        .map(|text| format!(" {}: {}", column, text))
        .unwrap_or_default();
    let modified = engine.session().active().is_some_and(|edit| edit.is_modified());
    let position = format!(
        "{}{}{} ",
        if modified { "[+] " } else { "" },
        col_to_letters(cursor.col),
        cursor.row + 1
    );

    let used = mode.display_name().len() + document.len() + save_text.len() + instruction.len() + 6;
    let padding = (area.width as usize)
        .saturating_sub(used)
        .saturating_sub(position.len());

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode.display_name()),
            mode_style.add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(document),
        Span::raw(" "),
        Span::styled(save_text, save_style),
        Span::styled(instruction, Style::default().fg(Color::Gray)),
        Span::raw(" ".repeat(padding)),
        Span::raw(position),
    ]);

    let status_bar = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

fn render_command_line(frame: &mut Frame, app: &App, area: Rect) {
    let content = match app.mode() {
        Mode::Command => format!(":{}", app.prompt_buffer()),
        _ => app.message.clone().unwrap_or_default(),
    };

    frame.render_widget(Paragraph::new(content), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_display_first_line() {
        assert_eq!(cell_display("one\ntwo"), "one…");
        assert_eq!(cell_display("plain"), "plain");
    }

    #[test]
    fn test_visible_columns_follow_cursor() {
        let widths = [10, 10, 10, 10, 10];
        assert_eq!(visible_columns(&widths, 0, 25), 0..2);
        assert_eq!(visible_columns(&widths, 4, 25), 3..5);
        assert_eq!(visible_columns(&widths, 2, 100), 0..5);
        // a column wider than the screen is still shown
        assert_eq!(visible_columns(&[50, 5], 0, 20), 0..1);
        assert_eq!(visible_columns(&[], 0, 20), 0..0);
    }
}
