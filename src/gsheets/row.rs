use serde::Deserialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Synthetic key for a zero-based column index ("col0", "col1", ...)
pub fn column_key(index: usize) -> String {
    format!("col{}", index)
}

/// Parse a synthetic key back into its column index
pub fn parse_column_key(key: &str) -> Option<usize> {
    key.strip_prefix("col")?.parse().ok()
}

/// Spreadsheet column letter for a zero-based index (0 → A, 25 → Z, 26 → AA)
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Header descriptor used for display and export, never for addressing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub index: usize,
    /// Synthetic key, `col<index>`
    pub id: String,
    pub label: String,
}

impl ColumnDescriptor {
    pub fn new(index: usize, label: impl Into<String>) -> Self {
        ColumnDescriptor {
            index,
            id: column_key(index),
            label: label.into(),
        }
    }
}

/// One sheet row as seen by the client
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Client-generated, regenerated on every fetch
    pub id: Uuid,
    /// 1-based physical sheet row targeted by row-index updates
    pub row_index: usize,
    values: Vec<String>,
}

impl Row {
    pub fn new(row_index: usize, values: Vec<String>) -> Self {
        Row {
            id: Uuid::new_v4(),
            row_index,
            values,
        }
    }

    /// Display value at a column index; empty past the end of the row
    pub fn get(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    /// Display value by synthetic key (`col<N>`)
    pub fn by_key(&self, key: &str) -> Option<&str> {
        parse_column_key(key).map(|index| self.get(index))
    }

    pub fn set(&mut self, index: usize, value: impl Into<String>) {
        if index >= self.values.len() {
            self.values.resize(index + 1, String::new());
        }
        self.values[index] = value.into();
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if the trimmed value at `index` is non-empty
    pub fn has_data(&self, index: usize) -> bool {
        !self.get(index).trim().is_empty()
    }

    /// The full `col<N>` → value map
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (column_key(i), v.clone()))
            .collect()
    }
}

/// How leading rows of the gviz result are skipped before projection
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderSkip {
    #[default]
    None,
    /// Always drop this many leading rows
    Fixed(usize),
    /// Drop the first row if it looks like a repeated header
    Heuristic,
}
