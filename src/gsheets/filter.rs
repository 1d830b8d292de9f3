use super::row::Row;

/// Substring filter on one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: usize,
    pub needle: String,
}

impl ColumnFilter {
    pub fn new(column: usize, needle: impl Into<String>) -> Self {
        ColumnFilter {
            column,
            needle: needle.into(),
        }
    }

    fn matches(&self, row: &Row) -> bool {
        let needle = self.needle.trim().to_lowercase();
        needle.is_empty() || row.get(self.column).to_lowercase().contains(&needle)
    }
}

/// Client-side search state for one view
///
/// All parts are conjunctive: the search term must match one of the search
/// columns, and each set column filter must match its column. Empty terms
/// match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search: String,
    pub search_columns: Vec<usize>,
    pub column_filters: [Option<ColumnFilter>; 2],
}

impl FilterCriteria {
    pub fn new(search_columns: Vec<usize>) -> Self {
        FilterCriteria {
            search_columns,
            ..Self::default()
        }
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }

    /// Set the first free column filter slot; `false` if both are taken
    pub fn push_filter(&mut self, filter: ColumnFilter) -> bool {
        match self.column_filters.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(filter);
                true
            }
            None => false,
        }
    }

    pub fn with_filter(mut self, column: usize, needle: impl Into<String>) -> Self {
        self.push_filter(ColumnFilter::new(column, needle));
        self
    }

    pub fn clear_filters(&mut self) {
        self.column_filters = [None, None];
    }

    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self
                .column_filters
                .iter()
                .flatten()
                .all(|f| f.needle.trim().is_empty())
    }

    pub fn matches(&self, row: &Row) -> bool {
        let term = self.search.trim().to_lowercase();
        let search_ok = term.is_empty()
            || self
                .search_columns
                .iter()
                .any(|&i| row.get(i).to_lowercase().contains(&term));

        search_ok && self.column_filters.iter().flatten().all(|f| f.matches(row))
    }

    /// Rows matching the criteria, in input order
    pub fn apply<'a, I>(&self, rows: I) -> Vec<&'a Row>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}
