use std::cmp::Ordering;
use std::collections::HashMap;

use crate::grid::GridModel;

/// A local cell value waiting to be carried over onto a new grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCell {
    pub row: usize,
    pub column: String,
    pub value: String,
}

/// Cell writes the store has not acknowledged yet, each tagged with the revision that
/// produced it. A remote snapshot knows nothing of them, so they are written back on top
/// of any snapshot that replaces the grid.
///
/// Row indices follow local row inserts, removals and moves; column keys follow renames.
#[derive(Debug, Default)]
pub struct PendingEdits {
    cells: HashMap<(usize, String), (String, u64)>,
}

impl PendingEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn record(&mut self, row: usize, column: String, value: String, revision: u64) {
        self.cells.insert((row, column), (value, revision));
    }

    /// A save covering every revision up to `revision` succeeded
    pub fn acknowledge(&mut self, revision: u64) {
        self.cells.retain(|_, (_, rev)| *rev > revision);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn rows_inserted(&mut self, at: usize, count: usize) {
        self.remap_rows(|r| Some(if r >= at { r + count } else { r }));
    }

    pub fn row_removed(&mut self, idx: usize) {
        self.remap_rows(|r| match r.cmp(&idx) {
            Ordering::Less => Some(r),
            Ordering::Equal => None,
            Ordering::Greater => Some(r - 1),
        });
    }

    pub fn row_moved(&mut self, from: usize, to: usize) {
        self.remap_rows(|r| {
            Some(if r == from {
                to
            } else if from < to && r > from && r <= to {
                r - 1
            } else if to < from && r >= to && r < from {
                r + 1
            } else {
                r
            })
        });
    }

    pub fn column_renamed(&mut self, old: &str, new: &str) {
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .map(|((row, column), entry)| {
                let column = if column == old { new.to_string() } else { column };
                ((row, column), entry)
            })
            .collect();
    }

    pub fn column_removed(&mut self, name: &str) {
        self.cells.retain(|(_, column), _| column != name);
    }

    fn remap_rows(&mut self, f: impl Fn(usize) -> Option<usize>) {
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|((row, column), entry)| f(row).map(|r| ((r, column), entry)))
            .collect();
    }

    /// Write every pending value into `grid`, padding rows as needed.
    /// Returns how many cells changed and the pending cells whose column is gone; those
    /// are forgotten.
    pub fn reapply(&mut self, grid: &mut GridModel) -> (usize, Vec<PendingCell>) {
        let mut keys: Vec<(usize, String)> = self.cells.keys().cloned().collect();
        keys.sort();

        let mut restored = 0;
        let mut dropped = Vec::new();
        for (row, column) in keys {
            let Some((value, _)) = self.cells.get(&(row, column.clone())) else {
                continue;
            };
            if !grid.has_column(&column) {
                if let Some((value, _)) = self.cells.remove(&(row, column.clone())) {
                    dropped.push(PendingCell { row, column, value });
                }
                continue;
            }
            if grid.cell(row, &column) == Some(value.as_str()) {
                continue;
            }
            if row >= grid.row_count() {
                grid.ensure_minimum_rows(row + 1);
            }
            if grid.set_cell(row, &column, value.clone()).is_ok() {
                restored += 1;
            }
        }
        (restored, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::grid::Snapshot;

    fn grid(rows: usize) -> GridModel {
        GridModel::new("t", vec!["A".to_string(), "B".to_string()], rows)
    }

    fn keys(pending: &PendingEdits) -> Vec<(usize, String)> {
        let mut keys: Vec<_> = pending.cells.keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_acknowledge_drops_covered_revisions() {
        let mut pending = PendingEdits::new();
        pending.record(0, "A".to_string(), "one".to_string(), 1);
        pending.record(1, "A".to_string(), "two".to_string(), 3);

        pending.acknowledge(2);
        assert_eq!(keys(&pending), vec![(1, "A".to_string())]);
        pending.acknowledge(3);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_rewrite_replaces_value_and_revision() {
        let mut pending = PendingEdits::new();
        pending.record(0, "A".to_string(), "old".to_string(), 1);
        pending.record(0, "A".to_string(), "new".to_string(), 4);
        pending.acknowledge(2);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_rows_follow_structure() {
        let mut pending = PendingEdits::new();
        for r in 0..4 {
            pending.record(r, "A".to_string(), r.to_string(), 1);
        }

        pending.rows_inserted(1, 2);
        assert_eq!(
            keys(&pending).into_iter().map(|(r, _)| r).collect::<Vec<_>>(),
            vec![0, 3, 4, 5]
        );

        pending.row_removed(3);
        assert_eq!(
            keys(&pending).into_iter().map(|(r, _)| r).collect::<Vec<_>>(),
            vec![0, 3, 4]
        );

        // row 0 moves to 4; 3 and 4 shift up
        pending.row_moved(0, 4);
        let mut g = grid(5);
        pending.reapply(&mut g);
        assert_eq!(g.cell(4, "A"), Some("0"));
        assert_eq!(g.cell(2, "A"), Some("2"));
        assert_eq!(g.cell(3, "A"), Some("3"));
    }

    #[test]
    fn test_reapply_on_top_of_snapshot() {
        let mut pending = PendingEdits::new();
        pending.record(0, "B".to_string(), "mine".to_string(), 1);
        pending.record(6, "A".to_string(), "far".to_string(), 1);
        pending.record(1, "Gone".to_string(), "lost".to_string(), 1);

        let mut g = grid(2);
        g.replace_with(Snapshot::new("t", vec!["A".to_string(), "B".to_string()], vec![]));
        let (restored, dropped) = pending.reapply(&mut g);

        assert_eq!(restored, 2);
        assert_eq!(g.cell(0, "B"), Some("mine"));
        assert_eq!(g.cell(6, "A"), Some("far"));
        assert_eq!(
            dropped,
            vec![PendingCell { row: 1, column: "Gone".to_string(), value: "lost".to_string() }]
        );
        assert_eq!(pending.len(), 2);

        // already in place: nothing to restore
        assert_eq!(pending.reapply(&mut g).0, 0);
    }

    #[test]
    fn test_column_rename_and_removal() {
        let mut pending = PendingEdits::new();
        pending.record(0, "A".to_string(), "x".to_string(), 1);
        pending.record(0, "B".to_string(), "y".to_string(), 1);

        pending.column_renamed("A", "Cue");
        pending.column_removed("B");
        assert_eq!(keys(&pending), vec![(0, "Cue".to_string())]);
    }
}
