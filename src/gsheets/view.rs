//! Per-view state
//!
//! A `SheetView` owns everything one screen of the dashboard needs: the
//! layout it reads with, the last successful projection, the error state of
//! the last load, the search criteria and the submission state of its form.
//! Failures are turned into notifications here, where the operation started.

use super::client::SheetsClient;
use super::error::{ErrorKind, Result, SheetError};
use super::export::{to_csv, write_csv_file};
use super::filter::{ColumnFilter, FilterCriteria};
use super::layouts::SheetLayout;
use super::notify::{Notification, Notifier};
use super::reader::{SheetData, DEFAULT_FIRST_DATA_ROW};
use super::row::{ColumnDescriptor, Row};
use super::validation::{FormValues, Rule};
use super::writer::{SubmissionTracker, WriteMode, WriteOutcome};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// What happens to the current rows when a load starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Previous rows stay visible if the load fails
    #[default]
    KeepOnError,
    /// Rows are cleared before fetching
    ClearFirst,
}

/// Error state left by the last failed load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub kind: ErrorKind,
    pub message: String,
    /// A manual retry should be offered
    pub retry: bool,
}

pub struct SheetView {
    layout: SheetLayout,
    data: SheetData,
    error: Option<ViewError>,
    criteria: FilterCriteria,
    tracker: SubmissionTracker,
    notifier: Arc<dyn Notifier>,
    headers_checked: bool,
}

impl SheetView {
    pub fn new(layout: SheetLayout, notifier: Arc<dyn Notifier>) -> Result<Self> {
        layout.check()?;
        let criteria = layout.criteria("", &[])?;
        Ok(SheetView {
            layout,
            data: SheetData::default(),
            error: None,
            criteria,
            tracker: SubmissionTracker::new(),
            notifier,
            headers_checked: false,
        })
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    pub fn data(&self) -> &SheetData {
        &self.data
    }

    pub fn headers(&self) -> &[ColumnDescriptor] {
        &self.data.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.data.rows
    }

    pub fn error(&self) -> Option<&ViewError> {
        self.error.as_ref()
    }

    pub fn tracker(&self) -> &SubmissionTracker {
        &self.tracker
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    fn report(&self, e: &SheetError) {
        self.notifier.notify(e.notification());
    }

    /// Fetch the layout's sheet and replace the view's rows
    ///
    /// The column map is checked against the reported headers on the first
    /// successful fetch only. On failure the error state is set and a
    /// notification sent; the rows are kept unless `policy` cleared them.
    pub async fn load(&mut self, client: &SheetsClient, policy: RefreshPolicy) -> Result<usize> {
        if policy == RefreshPolicy::ClearFirst {
            self.data = SheetData::default();
        }

        match self.fetch(client).await {
            Ok(data) => {
                let count = data.rows.len();
                self.data = data;
                self.error = None;
                debug!(view = %self.layout.name, rows = count, "view loaded");
                Ok(count)
            }
            Err(e) => {
                let notification = e.notification();
                self.error = Some(ViewError {
                    kind: e.kind(),
                    message: e.to_string(),
                    retry: notification.retry,
                });
                self.notifier.notify(notification);
                Err(e)
            }
        }
    }

    async fn fetch(&mut self, client: &SheetsClient) -> Result<SheetData> {
        let sheet = self.layout.sheet_ref()?;
        let options = self.layout.read_options()?;
        let data = client.reader().read(&sheet, &options).await?;

        if self.layout.validate_headers && !self.headers_checked {
            self.layout.columns.validate_against(&data.columns)?;
            self.headers_checked = true;
        }

        Ok(data)
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.criteria.search = term.into();
    }

    /// Add a substring filter on a named field (two at most)
    pub fn add_filter(&mut self, field: &str, needle: impl Into<String>) -> Result<()> {
        let column = self.layout.filter_column(field)?;
        if self
            .criteria
            .push_filter(ColumnFilter::new(column, needle))
        {
            Ok(())
        } else {
            Err(SheetError::Config("at most two column filters".into()))
        }
    }

    pub fn clear_filters(&mut self) {
        self.criteria.clear_filters();
    }

    /// Rows passing the current search and filters
    pub fn visible_rows(&self) -> Vec<&Row> {
        self.criteria.apply(&self.data.rows)
    }

    pub fn find_row(&self, id: Uuid) -> Option<&Row> {
        self.data.rows.iter().find(|r| r.id == id)
    }

    /// Row whose business key equals `key` (trimmed, case-insensitive)
    pub fn find_by_key(&self, key: &str) -> Result<Option<&Row>> {
        let field = self.layout.key_field.as_deref().ok_or_else(|| {
            SheetError::Config(format!("view '{}' has no key field", self.layout.name))
        })?;
        let index = self.layout.columns.index_of(field)?;
        let key = key.trim();
        Ok(self
            .data
            .rows
            .iter()
            .find(|r| r.get(index).trim().eq_ignore_ascii_case(key)))
    }

    pub fn find_by_row_index(&self, row_index: usize) -> Option<&Row> {
        self.data.rows.iter().find(|r| r.row_index == row_index)
    }

    /// CSV of the visible rows under the displayed headers
    pub fn export_csv(&self) -> Result<String> {
        to_csv(&self.data.headers, self.visible_rows())
    }

    pub fn export_to(&self, path: &Path) -> Result<usize> {
        write_csv_file(path, &self.data.headers, self.visible_rows())
    }

    /// Validate and submit a new row, then append it locally
    ///
    /// The appended row gets a fresh id and the next row index after the
    /// last one known, so the view reflects the insert without a refetch.
    pub async fn insert(
        &mut self,
        client: &SheetsClient,
        mode: WriteMode,
        form: &FormValues,
    ) -> Result<WriteOutcome> {
        if !self.tracker.begin() {
            return Err(SheetError::Config("a submission is already in progress".into()));
        }

        let result = self.submit_insert(client, mode, form).await;
        self.tracker.finish(&result);

        match &result {
            Ok(outcome) => {
                let values = self.layout.columns.layout_row(form)?;
                let row_index = self
                    .data
                    .last_row_index()
                    .map(|last| last + 1)
                    .or(self.layout.first_data_row)
                    .or(Some(self.data.first_data_row).filter(|&n| n > 0))
                    .unwrap_or(DEFAULT_FIRST_DATA_ROW);
                self.data.rows.push(Row::new(row_index, values));
                self.notifier.notify(saved(*outcome, "Record added"));
            }
            Err(e) => self.report(e),
        }

        result
    }

    async fn submit_insert(
        &self,
        client: &SheetsClient,
        mode: WriteMode,
        form: &FormValues,
    ) -> Result<WriteOutcome> {
        let request = self.layout.insert_request(form)?;
        client
            .writer(mode)
            .submit_validated(&request, form, &self.layout.rules)
            .await
    }

    /// Validate and submit changes to one row, then apply them locally
    ///
    /// Only the rules of the fields being changed are checked.
    pub async fn update(
        &mut self,
        client: &SheetsClient,
        mode: WriteMode,
        row_id: Uuid,
        changes: &FormValues,
    ) -> Result<WriteOutcome> {
        if !self.tracker.begin() {
            return Err(SheetError::Config("a submission is already in progress".into()));
        }

        let result = self.submit_update(client, mode, row_id, changes).await;
        self.tracker.finish(&result);

        match &result {
            Ok(outcome) => {
                let columns = &self.layout.columns;
                if let Some(row) = self.data.rows.iter_mut().find(|r| r.id == row_id) {
                    for (field, value) in changes {
                        match columns.index_of(field) {
                            Ok(index) => row.set(index, value.clone()),
                            Err(e) => warn!("not applied locally: {}", e),
                        }
                    }
                }
                self.notifier.notify(saved(*outcome, "Record updated"));
            }
            Err(e) => self.report(e),
        }

        result
    }

    async fn submit_update(
        &self,
        client: &SheetsClient,
        mode: WriteMode,
        row_id: Uuid,
        changes: &FormValues,
    ) -> Result<WriteOutcome> {
        let row = self.find_row(row_id).ok_or_else(|| {
            SheetError::Config(format!(
                "row {} is not in view '{}'; reload and retry",
                row_id, self.layout.name
            ))
        })?;
        let request = self.layout.update_request(row, changes)?;

        let rules: BTreeMap<String, Vec<Rule>> = self
            .layout
            .rules
            .iter()
            .filter(|(field, _)| changes.contains_key(*field))
            .map(|(field, rules)| (field.clone(), rules.clone()))
            .collect();

        client
            .writer(mode)
            .submit_validated(&request, changes, &rules)
            .await
    }
}

fn saved(outcome: WriteOutcome, what: &str) -> Notification {
    match outcome {
        WriteOutcome::Confirmed => Notification::success(what),
        WriteOutcome::Assumed => Notification::success(format!("{} (sent)", what)),
    }
}
