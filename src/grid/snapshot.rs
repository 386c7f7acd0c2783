use std::collections::HashMap;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::model::Row;
use super::PARALLEL_THRESHOLD;

/// A complete copy of a document at one instant. This is what gateways store and what
/// the realtime feed delivers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub column_instructions: HashMap<String, String>,
}

impl Snapshot {
    pub fn new(name: &str, columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            columns,
            rows,
            column_instructions: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Value of a cell, treating absent keys as empty
    pub fn value(&self, row: usize, column: &str) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Number of cells whose trimmed value is non-empty. Only declared columns count.
    pub fn filled_cell_count(&self) -> usize {
        count_filled(&self.columns, &self.rows)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

pub(crate) fn count_filled(columns: &[String], rows: &[Row]) -> usize {
    let filled_in = |row: &Row| {
        columns
            .iter()
            .filter(|c| row.get(*c).is_some_and(|v| !v.trim().is_empty()))
            .count()
    };

    if rows.len() * columns.len() >= PARALLEL_THRESHOLD {
        rows.par_iter().map(filled_in).sum()
    } else {
        rows.iter().map(filled_in).sum()
    }
}

/// Content hash of a snapshot, used to recognise our own writes when they echo back.
///
/// Covers name, column order, every cell in column order and the per-column instructions.
/// The document id is not part of the content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(snapshot: &Snapshot) -> Self {
        let mut hasher = blake3::Hasher::new();
        update_field(&mut hasher, snapshot.name.as_bytes());

        hasher.update(&(snapshot.columns.len() as u64).to_le_bytes());
        for column in &snapshot.columns {
            update_field(&mut hasher, column.as_bytes());
        }

        hasher.update(&(snapshot.rows.len() as u64).to_le_bytes());
        for row in &snapshot.rows {
            for column in &snapshot.columns {
                let value = row.get(column).map(String::as_str).unwrap_or("");
                update_field(&mut hasher, value.as_bytes());
            }
        }

        for column in &snapshot.columns {
            let instruction = snapshot
                .column_instructions
                .get(column)
                .map(String::as_str)
                .unwrap_or("");
            update_field(&mut hasher, instruction.as_bytes());
        }

        Self(*hasher.finalize().as_bytes())
    }

    /// Short string representation (first 12 hex chars)
    pub fn short(&self) -> String {
        let mut s = self.to_string();
        s.truncate(12);
        s
    }
}

// Length-prefixed so that values containing separators cannot collide
fn update_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", blake3::Hash::from(self.0).to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}
