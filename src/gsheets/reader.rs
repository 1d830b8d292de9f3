//! Sheet reader
//!
//! Turns a gviz table into header descriptors and row projections.
//!
//! ## Row numbering
//! Each row's `row_index` is `first_data_row + position`, where `position` is
//! the row's zero-based position in the raw gviz `rows` array. Skipped
//! header-like rows and rows dropped by the existence filter keep their
//! numbers reserved, so the index always names the physical sheet row that
//! an update by row index will touch.
//!
//! `first_data_row` is pinned by the caller or, when left open, taken from
//! the `parsedNumHeaders` the endpoint reports: with `n` header rows consumed
//! the first gviz row is sheet row `n + 1`.

use super::client::{SheetRef, SheetsClient};
use super::error::{Result, SheetError};
use super::gviz::{parse_table, GvizTable};
use super::row::{column_letter, ColumnDescriptor, HeaderSkip, Row};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Physical row of the first gviz row when the endpoint does not say how many
/// header rows it consumed
pub const DEFAULT_FIRST_DATA_ROW: usize = 2;

/// Caller conventions for projecting one sheet
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Column indices included in the header list
    pub displayed: Vec<usize>,
    /// A row is kept only if one of these columns has non-blank data
    pub required: Vec<usize>,
    pub skip: HeaderSkip,
    /// 1-based physical sheet row of the first gviz row; `None` derives it
    /// from the endpoint's header count
    pub first_data_row: Option<usize>,
    /// Expected header text per column, used by [`HeaderSkip::Heuristic`]
    pub header_hints: BTreeMap<usize, String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            displayed: Vec::new(),
            required: Vec::new(),
            skip: HeaderSkip::None,
            first_data_row: None,
            header_hints: BTreeMap::new(),
        }
    }
}

/// Result of one read: every column, the displayed headers, and the rows
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    /// One descriptor per column reported by the sheet
    pub columns: Vec<ColumnDescriptor>,
    /// Descriptors for the displayed columns, in caller order
    pub headers: Vec<ColumnDescriptor>,
    pub rows: Vec<Row>,
    /// Physical row of the first raw gviz row (0 before any read)
    pub first_data_row: usize,
}

impl SheetData {
    /// Highest row index seen, if any rows were kept
    pub fn last_row_index(&self) -> Option<usize> {
        self.rows.iter().map(|r| r.row_index).max()
    }
}

fn column_label(table: &GvizTable, index: usize) -> String {
    let col = table.cols.get(index);

    if let Some(label) = col
        .and_then(|c| c.label.as_deref())
        .map(str::trim)
        .filter(|l| !l.is_empty())
    {
        return label.to_string();
    }

    col.and_then(|c| c.id.as_deref())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| column_letter(index))
}

/// Physical sheet row of the first raw gviz row
pub fn resolve_first_data_row(table: &GvizTable, options: &ReadOptions) -> usize {
    options.first_data_row.unwrap_or_else(|| {
        table
            .parsed_num_headers
            .map(|n| n + 1)
            .unwrap_or(DEFAULT_FIRST_DATA_ROW)
    })
}

/// Label the endpoint actually reported, ignoring id and letter fallbacks
fn reported_label(table: &GvizTable, index: usize) -> Option<&str> {
    table
        .cols
        .get(index)
        .and_then(|c| c.label.as_deref())
        .map(str::trim)
        .filter(|l| !l.is_empty())
}

fn looks_like_header(values: &[String], table: &GvizTable, options: &ReadOptions) -> bool {
    let candidates = if options.required.is_empty() {
        &options.displayed
    } else {
        &options.required
    };

    candidates.iter().any(|&index| {
        let value = values.get(index).map(|v| v.trim()).unwrap_or("");
        if value.is_empty() {
            return false;
        }
        let value = value.to_lowercase();
        let matches_label = reported_label(table, index)
            .map(|l| l.to_lowercase() == value)
            .unwrap_or(false);
        let matches_hint = options
            .header_hints
            .get(&index)
            .map(|h| h.trim().to_lowercase() == value)
            .unwrap_or(false);
        matches_label || matches_hint
    })
}

/// Project a parsed gviz table into headers and rows
pub fn project(table: &GvizTable, options: &ReadOptions) -> SheetData {
    let columns: Vec<ColumnDescriptor> = (0..table.cols.len())
        .map(|i| ColumnDescriptor::new(i, column_label(table, i)))
        .collect();

    let headers = options
        .displayed
        .iter()
        .map(|&i| ColumnDescriptor::new(i, column_label(table, i)))
        .collect();

    let raw: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| {
            let mut values = r.display_values();
            if values.len() < columns.len() {
                values.resize(columns.len(), String::new());
            }
            values
        })
        .collect();

    let skip = match options.skip {
        HeaderSkip::None => 0,
        HeaderSkip::Fixed(n) => n,
        HeaderSkip::Heuristic => raw
            .first()
            .map(|first| usize::from(looks_like_header(first, table, options)))
            .unwrap_or(0),
    };

    let first_data_row = resolve_first_data_row(table, options);
    let rows = raw
        .into_iter()
        .enumerate()
        .skip(skip)
        .map(|(position, values)| Row::new(first_data_row + position, values))
        .filter(|row| options.required.is_empty() || options.required.iter().any(|&i| row.has_data(i)))
        .collect();

    SheetData {
        columns,
        headers,
        rows,
        first_data_row,
    }
}

/// Reads sheets through a [`SheetsClient`]
pub struct SheetReader<'a> {
    client: &'a SheetsClient,
}

impl<'a> SheetReader<'a> {
    pub fn new(client: &'a SheetsClient) -> Self {
        SheetReader { client }
    }

    /// Fetch, extract, parse and project a sheet
    pub async fn read(&self, sheet: &SheetRef, options: &ReadOptions) -> Result<SheetData> {
        let body = self.client.fetch_raw(sheet).await?;
        let table = parse_table(&body)?;
        let data = project(&table, options);

        debug!(
            sheet = %sheet,
            columns = data.columns.len(),
            raw_rows = table.rows.len(),
            kept_rows = data.rows.len(),
            "sheet projected"
        );

        Ok(data)
    }

    /// [`read`](Self::read) bounded by a deadline
    ///
    /// Expiry is reported as a transport error.
    pub async fn read_with_deadline(
        &self,
        sheet: &SheetRef,
        options: &ReadOptions,
        deadline: Duration,
    ) -> Result<SheetData> {
        tokio::time::timeout(deadline, self.read(sheet, options))
            .await
            .map_err(|_| {
                SheetError::Transport(format!(
                    "read of '{}' timed out after {} ms",
                    sheet,
                    deadline.as_millis()
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::super::client::testing::{client, FakeTransport};
    use super::*;
    use std::sync::Arc;

    fn table(body: &str) -> GvizTable {
        parse_table(body).unwrap()
    }

    const DEALERS: &str = r#"/*O_o*/
google.visualization.Query.setResponse({"status":"ok","table":{"cols":[{"id":"A","label":"Timestamp"},{"id":"B","label":"Dealer Code"},{"id":"C","label":""},{"id":"D","label":"City"}],"rows":[{"c":[{"v":"t1"},{"v":"D-001"},{"v":"Acme"},{"v":"Delhi"}]},{"c":[{"v":"t2"},{"v":"   "},{"v":"Ghost"},null]},{"c":[null,null,null,null]},{"c":[{"v":"t4"},{"v":"D-004"},{"v":"Zen"}]}]}});"#;

    fn options() -> ReadOptions {
        ReadOptions {
            displayed: vec![1, 2, 3],
            required: vec![1],
            ..ReadOptions::default()
        }
    }

    #[test]
    fn test_headers_use_labels_and_fallbacks() {
        let data = project(&table(DEALERS), &options());
        let labels: Vec<&str> = data.headers.iter().map(|h| h.label.as_str()).collect();
        assert_eq!(labels, vec!["Dealer Code", "C", "City"]);
        assert_eq!(data.headers[0].id, "col1");
        assert_eq!(data.columns.len(), 4);
        assert_eq!(data.columns[0].label, "Timestamp");
    }

    #[test]
    fn test_header_for_missing_column_uses_letter() {
        let opts = ReadOptions {
            displayed: vec![27],
            ..ReadOptions::default()
        };
        let data = project(&table(DEALERS), &opts);
        assert_eq!(data.headers[0].label, "AB");
        assert_eq!(data.headers[0].id, "col27");
    }

    #[test]
    fn test_whitespace_only_required_column_is_excluded() {
        let data = project(&table(DEALERS), &options());
        let codes: Vec<&str> = data.rows.iter().map(|r| r.get(1)).collect();
        assert_eq!(codes, vec!["D-001", "D-004"]);
    }

    #[test]
    fn test_any_required_column_keeps_row() {
        let opts = ReadOptions {
            required: vec![1, 2],
            ..options()
        };
        let data = project(&table(DEALERS), &opts);
        // "Ghost" row has a blank code but a name
        assert_eq!(data.rows.len(), 3);
    }

    #[test]
    fn test_no_required_columns_keeps_everything() {
        let opts = ReadOptions {
            required: vec![],
            ..options()
        };
        let data = project(&table(DEALERS), &opts);
        assert_eq!(data.rows.len(), 4);
    }

    #[test]
    fn test_row_indices_follow_raw_position() {
        let data = project(&table(DEALERS), &options());
        let indices: Vec<usize> = data.rows.iter().map(|r| r.row_index).collect();
        // gviz positions 0 and 3 → sheet rows 2 and 5
        assert_eq!(indices, vec![2, 5]);
        assert_eq!(data.last_row_index(), Some(5));
    }

    #[test]
    fn test_fixed_skip_keeps_numbering() {
        let opts = ReadOptions {
            skip: HeaderSkip::Fixed(1),
            first_data_row: Some(1),
            ..options()
        };
        let data = project(&table(DEALERS), &opts);
        let indices: Vec<usize> = data.rows.iter().map(|r| r.row_index).collect();
        assert_eq!(indices, vec![4]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let data = project(&table(DEALERS), &options());
        let last = data.rows.last().unwrap();
        assert_eq!(last.len(), 4);
        assert_eq!(last.get(3), "");
        assert_eq!(last.by_key("col2"), Some("Zen"));
    }

    #[test]
    fn test_heuristic_skips_repeated_header() {
        let body = r#"({"table":{"cols":[{"id":"A","label":""},{"id":"B","label":""}],"rows":[{"c":[{"v":"Dealer Code"},{"v":"Sales"}]},{"c":[{"v":"D-1"},{"v":"100"}]}]}})"#;
        let mut opts = ReadOptions {
            displayed: vec![0, 1],
            required: vec![0],
            skip: HeaderSkip::Heuristic,
            first_data_row: Some(1),
            ..ReadOptions::default()
        };
        opts.header_hints.insert(0, "dealer code".into());

        let data = project(&table(body), &opts);
        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.rows[0].get(0), "D-1");
        assert_eq!(data.rows[0].row_index, 2);
    }

    fn sales_options() -> ReadOptions {
        let mut opts = ReadOptions {
            displayed: vec![0, 1],
            required: vec![0],
            skip: HeaderSkip::Heuristic,
            ..ReadOptions::default()
        };
        opts.header_hints.insert(0, "Dealer Code".into());
        opts
    }

    #[test]
    fn test_consumed_header_row_offsets_numbering() {
        // Labels present: the endpoint took sheet row 1 as the header
        let body = r#"({"table":{"cols":[{"id":"A","label":"Dealer Code"},{"id":"B","label":"Sales"}],"rows":[{"c":[{"v":"D-1"},{"v":"100"}]},{"c":[{"v":"D-2"},{"v":"50"}]}],"parsedNumHeaders":1}})"#;
        let data = project(&table(body), &sales_options());
        let indices: Vec<usize> = data.rows.iter().map(|r| r.row_index).collect();
        assert_eq!(indices, vec![2, 3]);
        assert_eq!(data.first_data_row, 2);
    }

    #[test]
    fn test_unconsumed_header_row_is_skipped_in_place() {
        // No labels: the header comes back as data from sheet row 1
        let body = r#"({"table":{"cols":[{"id":"A","label":""},{"id":"B","label":""}],"rows":[{"c":[{"v":"Dealer Code"},{"v":"Sales"}]},{"c":[{"v":"D-1"},{"v":"100"}]}],"parsedNumHeaders":0}})"#;
        let data = project(&table(body), &sales_options());
        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.rows[0].row_index, 2);
    }

    #[test]
    fn test_pinned_first_data_row_wins() {
        let body = r#"({"table":{"cols":[{"id":"A","label":"Dealer Code"}],"rows":[{"c":[{"v":"D-1"}]}],"parsedNumHeaders":1}})"#;
        let opts = ReadOptions {
            first_data_row: Some(4),
            ..sales_options()
        };
        assert_eq!(project(&table(body), &opts).rows[0].row_index, 4);
    }

    #[test]
    fn test_heuristic_ignores_letter_fallbacks() {
        // Column A has no label; a real value "A" is not a header
        let body = r#"({"table":{"cols":[{"id":"A","label":""},{"id":"B","label":""}],"rows":[{"c":[{"v":"A"},{"v":"100"}]},{"c":[{"v":"B"},{"v":"50"}]}],"parsedNumHeaders":0}})"#;
        let opts = ReadOptions {
            header_hints: BTreeMap::new(),
            ..sales_options()
        };
        let data = project(&table(body), &opts);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[0].get(0), "A");
        assert_eq!(data.rows[0].row_index, 1);
    }

    #[test]
    fn test_heuristic_keeps_real_first_row() {
        let opts = ReadOptions {
            skip: HeaderSkip::Heuristic,
            ..options()
        };
        let data = project(&table(DEALERS), &opts);
        assert_eq!(data.rows[0].get(1), "D-001");
    }

    #[tokio::test]
    async fn test_read_through_client() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_read(Ok(DEALERS.to_string()));
        let client = client(transport);

        let data = client
            .reader()
            .read(&SheetRef::Name("Dealers".into()), &options())
            .await
            .unwrap();
        assert_eq!(data.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_read_malformed_body() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_read(Ok("<html>Sign in</html>".to_string()));
        let client = client(transport);

        let result = client
            .reader()
            .read(&SheetRef::Name("Dealers".into()), &options())
            .await;
        assert!(matches!(result, Err(SheetError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_read_deadline_expires() {
        let transport = Arc::new(FakeTransport::with_read_delay(Duration::from_millis(200)));
        transport.push_read(Ok(DEALERS.to_string()));
        let client = client(transport);

        let result = client
            .reader()
            .read_with_deadline(
                &SheetRef::Name("Users".into()),
                &options(),
                Duration::from_millis(10),
            )
            .await;
        match result {
            Err(SheetError::Transport(msg)) => assert!(msg.contains("timed out")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
