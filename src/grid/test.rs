use super::*;

use crate::error::GridError;
use super::model::Row;

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn make_row(pairs: &[(&str, &str)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn make_grid(columns: &[&str], rows: Vec<Row>, min_rows: usize) -> GridModel {
    GridModel::from_snapshot(Snapshot::new("sheet", cols(columns), rows), min_rows)
}

/// Helper to get a cell value as String for assertion comparisons
fn cell(grid: &GridModel, r: usize, c: &str) -> String {
    grid.cell(r, c).unwrap().to_string()
}

#[test]
fn new_grid_is_padded_to_minimum() {
    let grid = GridModel::new("sheet", cols(&["A", "B"]), DEFAULT_MIN_ROWS);
    assert_eq!(grid.row_count(), DEFAULT_MIN_ROWS);
    for row in grid.rows() {
        assert_eq!(row.len(), 2);
        assert!(row.values().all(|v| v.is_empty()));
    }
}

#[test]
fn from_snapshot_backfills_missing_keys_and_drops_unknown() {
    let grid = make_grid(
        &["A", "B"],
        vec![make_row(&[("A", "1"), ("Z", "stray")])],
        1,
    );
    assert_eq!(grid.rows()[0].len(), 2);
    assert_eq!(cell(&grid, 0, "A"), "1");
    assert_eq!(cell(&grid, 0, "B"), "");
    assert!(grid.rows()[0].get("Z").is_none());
}

#[test]
fn from_snapshot_dedupes_columns() {
    let grid = make_grid(&["A", "B", "A"], vec![], 1);
    assert_eq!(grid.columns(), &cols(&["A", "B"])[..]);
}

#[test]
fn set_cell_replaces_value() {
    let mut grid = make_grid(&["A", "B"], vec![], 2);
    grid.set_cell(1, "B", "hello".to_string()).unwrap();
    assert_eq!(cell(&grid, 1, "B"), "hello");
    assert_eq!(cell(&grid, 0, "B"), "");
}

#[test]
fn set_cell_is_logged_until_taken() {
    let mut grid = make_grid(&["A", "B"], vec![], 3);
    grid.set_cell(2, "B", "x".to_string()).unwrap();
    grid.set_cell_at(0, 0, "y".to_string()).unwrap();
    assert!(grid.set_cell(9, "A", "z".to_string()).is_err());

    assert_eq!(grid.take_touched(), vec![(2, "B".to_string()), (0, "A".to_string())]);
    assert!(grid.take_touched().is_empty());

    grid.set_cell(1, "A", "w".to_string()).unwrap();
    grid.replace_with(Snapshot::new("t", cols(&["A"]), vec![]));
    assert!(grid.take_touched().is_empty());
}

#[test]
fn set_cell_out_of_range() {
    let mut grid = make_grid(&["A"], vec![], 2);
    assert!(matches!(
        grid.set_cell(2, "A", "x".to_string()),
        Err(GridError::OutOfRange { row: 2, .. })
    ));
    assert!(matches!(
        grid.set_cell(0, "Nope", "x".to_string()),
        Err(GridError::OutOfRange { .. })
    ));
}

#[test]
fn multiline_and_tab_values_are_stored_verbatim() {
    let mut grid = make_grid(&["A"], vec![], 1);
    grid.set_cell(0, "A", "line one\nline\ttwo".to_string()).unwrap();
    assert_eq!(cell(&grid, 0, "A"), "line one\nline\ttwo");
}

#[test]
fn insert_column_after_backfills_and_keeps_order() {
    let mut grid = make_grid(&["A", "B"], vec![make_row(&[("A", "1"), ("B", "2")])], 1);
    let idx = grid.insert_column(ColumnAnchor::After("A"), "C").unwrap();

    assert_eq!(idx, 1);
    assert_eq!(grid.columns(), &cols(&["A", "C", "B"])[..]);
    assert_eq!(grid.rows()[0], make_row(&[("A", "1"), ("C", ""), ("B", "2")]));
}

#[test]
fn insert_column_before_and_end() {
    let mut grid = make_grid(&["A", "B"], vec![], 1);
    grid.insert_column(ColumnAnchor::Before("A"), "Z").unwrap();
    grid.insert_column(ColumnAnchor::End, "E").unwrap();
    assert_eq!(grid.columns(), &cols(&["Z", "A", "B", "E"])[..]);
}

#[test]
fn insert_duplicate_column_is_rejected_without_mutation() {
    let mut grid = make_grid(&["A", "B"], vec![], 1);
    let before = grid.clone();
    assert_eq!(
        grid.insert_column(ColumnAnchor::End, "B"),
        Err(GridError::DuplicateColumn("B".to_string()))
    );
    assert_eq!(grid, before);
}

#[test]
fn insert_column_unknown_anchor() {
    let mut grid = make_grid(&["A"], vec![], 1);
    assert_eq!(
        grid.insert_column(ColumnAnchor::After("Q"), "C"),
        Err(GridError::UnknownColumn("Q".to_string()))
    );
}

#[test]
fn remove_column_drops_key_everywhere() {
    let mut grid = make_grid(&["A", "B"], vec![make_row(&[("A", "1"), ("B", "2")])], 3);
    grid.set_instruction("B", "extract the total").unwrap();
    grid.remove_column("B").unwrap();

    assert_eq!(grid.columns(), &cols(&["A"])[..]);
    assert!(grid.rows().iter().all(|r| !r.contains_key("B") && r.len() == 1));
    assert_eq!(grid.instruction("B"), None);
}

#[test]
fn remove_last_column_is_protected() {
    let mut grid = make_grid(&["A"], vec![make_row(&[("A", "1")])], 1);
    assert_eq!(grid.remove_column("A"), Err(GridError::LastColumnProtected));
    assert_eq!(cell(&grid, 0, "A"), "1");
}

#[test]
fn rename_column_preserves_values_and_position() {
    let mut grid = make_grid(
        &["A", "B", "C"],
        vec![
            make_row(&[("A", "1"), ("B", "2"), ("C", "3")]),
            make_row(&[("A", "4"), ("B", "5"), ("C", "6")]),
        ],
        2,
    );
    grid.set_instruction("B", "hint").unwrap();
    let old_rows = grid.rows().to_vec();

    grid.rename_column("B", "Beta").unwrap();

    assert_eq!(grid.columns(), &cols(&["A", "Beta", "C"])[..]);
    for (row, old) in grid.rows().iter().zip(old_rows.iter()) {
        assert_eq!(row.get("Beta"), old.get("B"));
        assert!(!row.contains_key("B"));
    }
    assert_eq!(grid.instruction("Beta"), Some("hint"));
}

#[test]
fn rename_to_existing_column_fails() {
    let mut grid = make_grid(&["A", "B"], vec![], 1);
    assert_eq!(
        grid.rename_column("A", "B"),
        Err(GridError::DuplicateColumn("B".to_string()))
    );
    assert_eq!(grid.columns(), &cols(&["A", "B"])[..]);
}

#[test]
fn rename_to_same_name_is_noop() {
    let mut grid = make_grid(&["A", "B"], vec![make_row(&[("A", "x")])], 1);
    grid.rename_column("A", "A").unwrap();
    assert_eq!(cell(&grid, 0, "A"), "x");
}

#[test]
fn move_column_reorders_only() {
    let mut grid = make_grid(&["A", "B", "C"], vec![make_row(&[("A", "1"), ("C", "3")])], 1);
    grid.move_column(2, 0).unwrap();
    assert_eq!(grid.columns(), &cols(&["C", "A", "B"])[..]);
    assert_eq!(cell(&grid, 0, "C"), "3");
    assert_eq!(grid.cell_at(0, 0), Some("3"));
}

#[test]
fn insert_rows_in_middle_and_end() {
    let mut grid = make_grid(
        &["A"],
        vec![make_row(&[("A", "0")]), make_row(&[("A", "1")])],
        2,
    );
    grid.insert_rows(2, Some(1)).unwrap();
    assert_eq!(grid.row_count(), 4);
    assert_eq!(cell(&grid, 0, "A"), "0");
    assert_eq!(cell(&grid, 1, "A"), "");
    assert_eq!(cell(&grid, 3, "A"), "1");

    let first = grid.insert_rows(1, None).unwrap();
    assert_eq!(first, 4);
    assert_eq!(grid.row_count(), 5);
    assert_eq!(grid.rows()[4].len(), 1);
}

#[test]
fn insert_rows_past_end_fails() {
    let mut grid = make_grid(&["A"], vec![], 2);
    assert!(grid.insert_rows(1, Some(5)).is_err());
}

#[test]
fn remove_row_keeps_minimum() {
    let mut grid = make_grid(&["A"], vec![], 5);
    for i in 0..5 {
        grid.set_cell(i, "A", i.to_string()).unwrap();
    }

    for _ in 0..10 {
        grid.remove_row(0).unwrap();
        assert!(grid.row_count() >= 5);
    }
    assert_eq!(grid.row_count(), 5);
    assert_eq!(grid.filled_cell_count(), 0);
}

#[test]
fn remove_row_above_minimum_shrinks() {
    let mut grid = make_grid(&["A"], vec![], 2);
    grid.insert_rows(3, None).unwrap();
    grid.set_cell(1, "A", "keep".to_string()).unwrap();
    let removed = grid.remove_row(0).unwrap();
    assert_eq!(removed.get("A").map(String::as_str), Some(""));
    assert_eq!(grid.row_count(), 4);
    assert_eq!(cell(&grid, 0, "A"), "keep");
}

#[test]
fn move_row_keeps_relative_order() {
    let rows = (0..5).map(|i| make_row(&[("A", &i.to_string())])).collect();
    let mut grid = make_grid(&["A"], rows, 5);

    grid.move_row(0, 3).unwrap();
    let order: Vec<String> = (0..5).map(|i| cell(&grid, i, "A")).collect();
    assert_eq!(order, vec!["1", "2", "3", "0", "4"]);

    grid.move_row(4, 0).unwrap();
    let order: Vec<String> = (0..5).map(|i| cell(&grid, i, "A")).collect();
    assert_eq!(order, vec!["4", "1", "2", "3", "0"]);
}

#[test]
fn move_row_out_of_range() {
    let mut grid = make_grid(&["A"], vec![], 3);
    assert!(grid.move_row(0, 3).is_err());
}

#[test]
fn ensure_minimum_rows_is_idempotent() {
    let mut grid = make_grid(&["A"], vec![], 1);
    assert_eq!(grid.ensure_minimum_rows(4), 3);
    assert_eq!(grid.ensure_minimum_rows(4), 0);
    assert_eq!(grid.ensure_minimum_rows(2), 0);
    assert_eq!(grid.row_count(), 4);
}

#[test]
fn get_span_returns_row_major_matrix() {
    let mut grid = make_grid(&["A", "B", "C"], vec![], 3);
    grid.set_cell(0, "B", "b0".to_string()).unwrap();
    grid.set_cell(1, "C", "c1".to_string()).unwrap();

    let span = grid.get_span(0, 1, 1, 2).unwrap();
    assert_eq!(span, vec![vec!["b0", ""], vec!["", "c1"]]);
    assert!(grid.get_span(0, 3, 0, 0).is_none());
}

#[test]
fn filled_cells_ignore_whitespace() {
    let mut grid = make_grid(&["A", "B"], vec![], 3);
    grid.set_cell(0, "A", "x".to_string()).unwrap();
    grid.set_cell(1, "B", "   ".to_string()).unwrap();
    grid.set_cell(2, "B", " y ".to_string()).unwrap();
    assert_eq!(grid.filled_cell_count(), 2);
    assert_eq!(grid.to_snapshot(None).filled_cell_count(), 2);
}

#[test]
fn filled_cells_large_grid_uses_same_count() {
    let columns: Vec<String> = (0..10).map(|i| format!("c{}", i)).collect();
    let rows: Vec<Row> = (0..2_000)
        .map(|r| {
            columns
                .iter()
                .map(|c| (c.clone(), if r % 2 == 0 { "v".to_string() } else { String::new() }))
                .collect()
        })
        .collect();
    let snapshot = Snapshot::new("big", columns, rows);
    assert_eq!(snapshot.filled_cell_count(), 1_000 * 10);
}

#[test]
fn fingerprint_ignores_id_and_map_order() {
    let grid = make_grid(&["A", "B"], vec![make_row(&[("A", "1"), ("B", "2")])], 2);
    let a = grid.to_snapshot(None);
    let b = grid.to_snapshot(Some("doc-1"));
    assert_eq!(a.fingerprint(), b.fingerprint());

    let mut reordered = a.clone();
    reordered.rows[0] = make_row(&[("B", "2"), ("A", "1")]);
    assert_eq!(a.fingerprint(), reordered.fingerprint());
}

#[test]
fn fingerprint_changes_with_content() {
    let mut grid = make_grid(&["A", "B"], vec![], 2);
    let before = grid.to_snapshot(None).fingerprint();
    grid.set_cell(1, "B", "x".to_string()).unwrap();
    assert_ne!(before, grid.to_snapshot(None).fingerprint());

    let moved = {
        let mut g = grid.clone();
        g.move_column(0, 1).unwrap();
        g.to_snapshot(None).fingerprint()
    };
    assert_ne!(moved, grid.to_snapshot(None).fingerprint());
}

#[test]
fn fingerprint_separators_do_not_collide() {
    let a = Snapshot::new("", cols(&["A", "B"]), vec![make_row(&[("A", "x\t"), ("B", "y")])]);
    let b = Snapshot::new("", cols(&["A", "B"]), vec![make_row(&[("A", "x"), ("B", "\ty")])]);
    assert_ne!(a.fingerprint(), b.fingerprint());
}
