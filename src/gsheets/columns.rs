//! Declarative column maps
//!
//! Sheets have no schema; meaning comes from positional convention. A
//! `ColumnMap` names those positions once per layout so call sites say
//! `"sales"` instead of `col25`, and checks the convention against the
//! headers the sheet actually reports.

use super::error::{Result, SheetError};
use super::row::{ColumnDescriptor, Row};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

/// One named column
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldColumn {
    pub field: String,
    /// Zero-based column index
    pub index: usize,
    /// Header text the sheet is expected to report for this column
    #[serde(default)]
    pub label: Option<String>,
}

impl FieldColumn {
    pub fn new(field: impl Into<String>, index: usize) -> Self {
        FieldColumn {
            field: field.into(),
            index,
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Field name ↔ column index table for one sheet
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<FieldColumn>")]
pub struct ColumnMap {
    fields: Vec<FieldColumn>,
}

impl TryFrom<Vec<FieldColumn>> for ColumnMap {
    type Error = SheetError;

    fn try_from(fields: Vec<FieldColumn>) -> Result<Self> {
        ColumnMap::new(fields)
    }
}

impl ColumnMap {
    /// Build a map; field names and column indices must be unique
    pub fn new(fields: Vec<FieldColumn>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut indices = HashSet::new();

        for f in &fields {
            if f.field.trim().is_empty() {
                return Err(SheetError::Config(format!(
                    "column {} has an empty field name",
                    f.index
                )));
            }
            if !names.insert(f.field.as_str()) {
                return Err(SheetError::Config(format!(
                    "field '{}' is mapped twice",
                    f.field
                )));
            }
            if !indices.insert(f.index) {
                return Err(SheetError::Config(format!(
                    "column {} is mapped to more than one field",
                    f.index
                )));
            }
        }

        Ok(ColumnMap { fields })
    }

    pub fn fields(&self) -> &[FieldColumn] {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&FieldColumn> {
        self.fields.iter().find(|f| f.field == field)
    }

    pub fn index_of(&self, field: &str) -> Result<usize> {
        self.get(field)
            .map(|f| f.index)
            .ok_or_else(|| SheetError::Config(format!("unknown field '{}'", field)))
    }

    pub fn indices_of<S: AsRef<str>>(&self, fields: &[S]) -> Result<Vec<usize>> {
        fields.iter().map(|f| self.index_of(f.as_ref())).collect()
    }

    pub fn field_at(&self, index: usize) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.index == index)
            .map(|f| f.field.as_str())
    }

    /// Number of columns needed to hold every mapped field
    pub fn width(&self) -> usize {
        self.fields.iter().map(|f| f.index + 1).max().unwrap_or(0)
    }

    /// Expected header text keyed by column index
    pub fn header_hints(&self) -> BTreeMap<usize, String> {
        self.fields
            .iter()
            .filter_map(|f| f.label.clone().map(|l| (f.index, l)))
            .collect()
    }

    /// Check the map against the columns a read reported
    ///
    /// Every index must exist, and every expected label must match the
    /// reported one (trimmed, case-insensitive).
    pub fn validate_against(&self, columns: &[ColumnDescriptor]) -> Result<()> {
        let mut problems = Vec::new();

        for f in &self.fields {
            match columns.get(f.index) {
                None => problems.push(format!(
                    "'{}' maps to column {} but the sheet reports {} columns",
                    f.field,
                    f.index,
                    columns.len()
                )),
                Some(col) => {
                    if let Some(expected) = &f.label {
                        if !col.label.trim().eq_ignore_ascii_case(expected.trim()) {
                            problems.push(format!(
                                "'{}' expects header '{}' in column {} but found '{}'",
                                f.field, expected, f.index, col.label
                            ));
                        }
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SheetError::Config(problems.join("; ")))
        }
    }

    /// Value of a named field in a row
    pub fn value<'r>(&self, row: &'r Row, field: &str) -> Result<&'r str> {
        Ok(row.get(self.index_of(field)?))
    }

    /// Named view of a row (mapped fields only)
    pub fn record(&self, row: &Row) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.field.clone(), row.get(f.index).to_string()))
            .collect()
    }

    /// Lay named values out as an ordered row of [`width`](Self::width) cells
    ///
    /// Unmapped positions stay empty. Unknown field names are a configuration
    /// error.
    pub fn layout_row(&self, values: &BTreeMap<String, String>) -> Result<Vec<String>> {
        let mut row = vec![String::new(); self.width()];
        for (field, value) in values {
            let index = self.index_of(field)?;
            row[index] = value.clone();
        }
        Ok(row)
    }
}
