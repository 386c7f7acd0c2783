use std::cmp;

/// A cell in (row index, column index) space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Adjacent cell in this direction, clamped at the grid edges
    pub fn step(self, pos: CellPos, row_count: usize, col_count: usize) -> CellPos {
        match self {
            Direction::Up => CellPos::new(pos.row.saturating_sub(1), pos.col),
            Direction::Down => CellPos::new(cmp::min(pos.row + 1, row_count.saturating_sub(1)), pos.col),
            Direction::Left => CellPos::new(pos.row, pos.col.saturating_sub(1)),
            Direction::Right => CellPos::new(pos.row, cmp::min(pos.col + 1, col_count.saturating_sub(1))),
        }
    }
}

/// A rectangular selection. `start` is the anchor and `end` the moving corner; they are not
/// ordered, so always go through `bounds()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub start: CellPos,
    pub end: CellPos,
}

impl SelectionRange {
    pub fn new(start: CellPos, end: CellPos) -> Self {
        Self { start, end }
    }

    pub fn single(pos: CellPos) -> Self {
        Self { start: pos, end: pos }
    }

    /// Get the normalized bounds (start_row, end_row, start_col, end_col), inclusive
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        (
            cmp::min(self.start.row, self.end.row),
            cmp::max(self.start.row, self.end.row),
            cmp::min(self.start.col, self.end.col),
            cmp::max(self.start.col, self.end.col),
        )
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        let (r0, r1, c0, c1) = self.bounds();
        (r0..=r1).contains(&row) && (c0..=c1).contains(&col)
    }

    pub fn height(&self) -> usize {
        let (r0, r1, _, _) = self.bounds();
        r1 - r0 + 1
    }

    pub fn width(&self) -> usize {
        let (_, _, c0, c1) = self.bounds();
        c1 - c0 + 1
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// Every cell in the range, row-major
    pub fn cells(&self) -> impl Iterator<Item = CellPos> {
        let (r0, r1, c0, c1) = self.bounds();
        (r0..=r1).flat_map(move |r| (c0..=c1).map(move |c| CellPos::new(r, c)))
    }
}

/// Cursor plus optional range selection
#[derive(Debug, Clone, Default)]
pub struct Selection {
    cursor: CellPos,
    range: Option<SelectionRange>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> CellPos {
        self.cursor
    }

    pub fn range(&self) -> Option<SelectionRange> {
        self.range
    }

    /// Select a single cell, dropping any range
    pub fn select_cell(&mut self, pos: CellPos) {
        self.cursor = pos;
        self.range = None;
    }

    /// Grow the range one cell in `dir`. The first extension anchors the range at the cursor;
    /// later ones keep the anchor and move only the end.
    pub fn extend(&mut self, dir: Direction, row_count: usize, col_count: usize) {
        let range = self.range.get_or_insert(SelectionRange::single(self.cursor));
        range.end = dir.step(range.end, row_count, col_count);
    }

    pub fn set_range(&mut self, range: SelectionRange) {
        self.cursor = range.start;
        self.range = Some(range);
    }

    /// The range if any, else the cursor cell as a degenerate range
    pub fn active_range(&self) -> SelectionRange {
        self.range.unwrap_or(SelectionRange::single(self.cursor))
    }

    /// Ensure cursor and range are within grid bounds
    pub fn clamp(&mut self, row_count: usize, col_count: usize) {
        let clamp_pos = |p: CellPos| {
            CellPos::new(
                cmp::min(p.row, row_count.saturating_sub(1)),
                cmp::min(p.col, col_count.saturating_sub(1)),
            )
        };
        self.cursor = clamp_pos(self.cursor);
        if let Some(range) = self.range.as_mut() {
            range.start = clamp_pos(range.start);
            range.end = clamp_pos(range.end);
        }
    }
}
