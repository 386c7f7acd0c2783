use std::collections::HashMap;

use crate::error::GridError;

use super::snapshot::{count_filled, Snapshot};

/// A row maps column name to cell text. Absent keys read as empty.
pub type Row = HashMap<String, String>;

/// Where a new column goes relative to an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAnchor<'a> {
    Before(&'a str),
    After(&'a str),
    End,
}

/// The authoritative in-memory document: ordered columns, ordered rows, name and
/// per-column instructions.
///
/// Invariants kept by every mutation:
/// - every row holds a key for every column and no other keys
/// - the row count never drops below `min_rows`
#[derive(Debug, Clone, PartialEq)]
pub struct GridModel {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    instructions: HashMap<String, String>,
    min_rows: usize,
    /// Cells written through `set_cell` since the last `take_touched`
    touched: Vec<(usize, String)>,
}

fn empty_row(columns: &[String]) -> Row {
    columns.iter().map(|c| (c.clone(), String::new())).collect()
}

impl GridModel {
    pub fn new(name: &str, columns: Vec<String>, min_rows: usize) -> Self {
        let mut grid = Self {
            name: name.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            instructions: HashMap::new(),
            min_rows,
            touched: Vec::new(),
        };
        grid.replace_with(Snapshot::new(name, columns, Vec::new()));
        grid
    }

    pub fn from_snapshot(snapshot: Snapshot, min_rows: usize) -> Self {
        let mut grid = Self::new("", Vec::new(), min_rows);
        grid.replace_with(snapshot);
        grid
    }

    /// Replace the whole document with a snapshot, normalising it to the grid invariants.
    /// Duplicate column names keep their first occurrence; unknown row keys are dropped.
    pub fn replace_with(&mut self, snapshot: Snapshot) {
        let mut columns: Vec<String> = Vec::with_capacity(snapshot.columns.len());
        for column in snapshot.columns {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }

        self.rows = snapshot
            .rows
            .into_iter()
            .map(|mut row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.remove(c).unwrap_or_default()))
                    .collect()
            })
            .collect();

        self.instructions = snapshot
            .column_instructions
            .into_iter()
            .filter(|(c, _)| columns.contains(c))
            .collect();
        self.columns = columns;
        self.name = snapshot.name;
        self.touched.clear();
        self.ensure_minimum_rows(self.min_rows);
    }

    pub fn to_snapshot(&self, id: Option<&str>) -> Snapshot {
        Snapshot {
            id: id.map(str::to_string),
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.clone(),
            column_instructions: self.instructions.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_at(&self, idx: usize) -> Option<&str> {
        self.columns.get(idx).map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        if !self.has_column(column) {
            return None;
        }
        self.rows
            .get(row)
            .map(|r| r.get(column).map(String::as_str).unwrap_or(""))
    }

    pub fn cell_at(&self, row: usize, col: usize) -> Option<&str> {
        let column = self.columns.get(col)?;
        self.cell(row, column)
    }

    pub fn set_cell(&mut self, row: usize, column: &str, value: String) -> Result<(), GridError> {
        if !self.has_column(column) {
            return Err(GridError::OutOfRange { row, column: column.to_string() });
        }
        let r = self
            .rows
            .get_mut(row)
            .ok_or_else(|| GridError::OutOfRange { row, column: column.to_string() })?;
        r.insert(column.to_string(), value);
        self.touched.push((row, column.to_string()));
        Ok(())
    }

    /// Drain the log of cells written since the last call
    pub fn take_touched(&mut self) -> Vec<(usize, String)> {
        std::mem::take(&mut self.touched)
    }

    pub fn set_cell_at(&mut self, row: usize, col: usize, value: String) -> Result<(), GridError> {
        let column = self
            .columns
            .get(col)
            .cloned()
            .ok_or_else(|| GridError::OutOfRange { row, column: format!("#{}", col) })?;
        self.set_cell(row, &column, value)
    }

    /// Get a rectangular region (inclusive bounds), rows outer
    pub fn get_span(
        &self,
        start_row: usize,
        end_row: usize,
        start_col: usize,
        end_col: usize,
    ) -> Option<Vec<Vec<String>>> {
        if end_row >= self.row_count() || end_col >= self.col_count() {
            return None;
        }
        let cols = &self.columns[start_col..=end_col];
        Some(
            self.rows[start_row..=end_row]
                .iter()
                .map(|row| {
                    cols.iter()
                        .map(|c| row.get(c).cloned().unwrap_or_default())
                        .collect()
                })
                .collect(),
        )
    }

    // === Columns ===

    pub fn insert_column(&mut self, anchor: ColumnAnchor<'_>, name: &str) -> Result<usize, GridError> {
        if self.has_column(name) {
            return Err(GridError::DuplicateColumn(name.to_string()));
        }
        let idx = match anchor {
            ColumnAnchor::Before(existing) => self
                .column_index(existing)
                .ok_or_else(|| GridError::UnknownColumn(existing.to_string()))?,
            ColumnAnchor::After(existing) => self
                .column_index(existing)
                .ok_or_else(|| GridError::UnknownColumn(existing.to_string()))?
                + 1,
            ColumnAnchor::End => self.columns.len(),
        };

        self.columns.insert(idx, name.to_string());
        for row in self.rows.iter_mut() {
            row.insert(name.to_string(), String::new());
        }
        Ok(idx)
    }

    pub fn remove_column(&mut self, name: &str) -> Result<usize, GridError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| GridError::UnknownColumn(name.to_string()))?;
        if self.columns.len() <= 1 {
            return Err(GridError::LastColumnProtected);
        }

        self.columns.remove(idx);
        for row in self.rows.iter_mut() {
            row.remove(name);
        }
        self.instructions.remove(name);
        Ok(idx)
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<(), GridError> {
        let idx = self
            .column_index(old)
            .ok_or_else(|| GridError::UnknownColumn(old.to_string()))?;
        if old == new {
            return Ok(());
        }
        if self.has_column(new) {
            return Err(GridError::DuplicateColumn(new.to_string()));
        }

        self.columns[idx] = new.to_string();
        for row in self.rows.iter_mut() {
            let value = row.remove(old).unwrap_or_default();
            row.insert(new.to_string(), value);
        }
        if let Some(instruction) = self.instructions.remove(old) {
            self.instructions.insert(new.to_string(), instruction);
        }
        Ok(())
    }

    /// Move a column to a new position. Row values are keyed by name so only the order changes.
    pub fn move_column(&mut self, from: usize, to: usize) -> Result<(), GridError> {
        let len = self.columns.len();
        if from >= len || to >= len {
            return Err(GridError::OutOfRange { row: 0, column: format!("#{}", from.max(to)) });
        }
        let column = self.columns.remove(from);
        self.columns.insert(to, column);
        Ok(())
    }

    pub fn instruction(&self, column: &str) -> Option<&str> {
        self.instructions.get(column).map(String::as_str)
    }

    pub fn set_instruction(&mut self, column: &str, text: &str) -> Result<(), GridError> {
        if !self.has_column(column) {
            return Err(GridError::UnknownColumn(column.to_string()));
        }
        if text.is_empty() {
            self.instructions.remove(column);
        } else {
            self.instructions.insert(column.to_string(), text.to_string());
        }
        Ok(())
    }

    // === Rows ===

    /// Insert `count` empty rows at `at` (appending when `None`). Returns the first new index.
    pub fn insert_rows(&mut self, count: usize, at: Option<usize>) -> Result<usize, GridError> {
        let idx = at.unwrap_or(self.rows.len());
        if idx > self.rows.len() {
            return Err(GridError::OutOfRange { row: idx, column: String::new() });
        }
        let new_rows = (0..count).map(|_| empty_row(&self.columns));
        self.rows.splice(idx..idx, new_rows);
        Ok(idx)
    }

    /// Remove a row, re-padding to the minimum row count
    pub fn remove_row(&mut self, idx: usize) -> Result<Row, GridError> {
        if idx >= self.rows.len() {
            return Err(GridError::OutOfRange { row: idx, column: String::new() });
        }
        let removed = self.rows.remove(idx);
        self.ensure_minimum_rows(self.min_rows);
        Ok(removed)
    }

    /// Move a row, keeping every other row's relative order
    pub fn move_row(&mut self, from: usize, to: usize) -> Result<(), GridError> {
        let len = self.rows.len();
        if from >= len || to >= len {
            return Err(GridError::OutOfRange { row: from.max(to), column: String::new() });
        }
        let row = self.rows.remove(from);
        self.rows.insert(to, row);
        Ok(())
    }

    /// Append empty rows until there are at least `min`. Returns how many were added.
    pub fn ensure_minimum_rows(&mut self, min: usize) -> usize {
        let missing = min.saturating_sub(self.rows.len());
        for _ in 0..missing {
            self.rows.push(empty_row(&self.columns));
        }
        missing
    }

    pub fn filled_cell_count(&self) -> usize {
        count_filled(&self.columns, &self.rows)
    }
}
