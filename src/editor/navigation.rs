use crate::selection::{CellPos, Direction};

/// Keys that commit the current edit and then move the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Same column, next row. Grows the grid when on the last row.
    Enter,
    /// Next column, wrapping to the first column of the next row
    Tab,
    /// Previous column, wrapping to the last column of the previous row
    BackTab,
    /// Adjacent cell, clamped at the edges
    Arrow(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavTarget {
    pub pos: CellPos,
    /// A row must be appended before `pos` is valid
    pub append_row: bool,
}

pub fn next_cell(pos: CellPos, advance: Advance, row_count: usize, col_count: usize) -> NavTarget {
    let last_row = row_count.saturating_sub(1);
    let last_col = col_count.saturating_sub(1);
    let stay = |pos| NavTarget { pos, append_row: false };

    match advance {
        Advance::Enter if pos.row >= last_row => NavTarget {
            pos: CellPos::new(pos.row + 1, pos.col),
            append_row: true,
        },
        Advance::Enter => stay(CellPos::new(pos.row + 1, pos.col)),
        Advance::Tab if pos.col < last_col => stay(CellPos::new(pos.row, pos.col + 1)),
        Advance::Tab if pos.row < last_row => stay(CellPos::new(pos.row + 1, 0)),
        Advance::Tab => stay(pos),
        Advance::BackTab if pos.col > 0 => stay(CellPos::new(pos.row, pos.col - 1)),
        Advance::BackTab if pos.row > 0 => stay(CellPos::new(pos.row - 1, last_col)),
        Advance::BackTab => stay(pos),
        Advance::Arrow(dir) => stay(dir.step(pos, row_count, col_count)),
    }
}
