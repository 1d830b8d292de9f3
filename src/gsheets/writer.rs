//! Sheet writer
//!
//! Writes go to the Apps Script web app as one form-encoded POST each. The
//! web app is usually called in a mode where the response cannot be read, so
//! two write modes exist:
//!
//! - [`WriteMode::FireAndForget`]: a send that did not fail at the transport
//!   layer counts as success ([`WriteOutcome::Assumed`]). Backend failures are
//!   invisible in this mode.
//! - [`WriteMode::Confirmed`]: the `{success, error?}` body is read and a
//!   `success: false` becomes [`SheetError::Application`].

use super::client::SheetsClient;
use super::error::{Result, SheetError, GENERIC_FAILURE};
use super::gviz::extract_json_object;
use super::validation::{validate, FormValues, Rule};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// How the write endpoint's response is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Response is never read; "send did not fail" is success
    #[default]
    FireAndForget,
    /// Response body is parsed and its success flag enforced
    Confirmed,
}

impl std::str::FromStr for WriteMode {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "opaque" | "fire-and-forget" | "no-cors" => Ok(WriteMode::FireAndForget),
            "confirmed" | "cors" => Ok(WriteMode::Confirmed),
            other => Err(SheetError::Config(format!(
                "Unknown write mode '{}' (expected 'opaque' or 'confirmed')",
                other
            ))),
        }
    }
}

/// What a successful submission actually tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Sent without a transport error; the backend was not heard from
    Assumed,
    /// The backend answered `success: true`
    Confirmed,
}

/// One write command for the web app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub sheet_name: String,
    pub action: String,
    /// Action-specific fields, in send order
    pub params: Vec<(String, String)>,
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| SheetError::Transport(format!("failed to serialize request: {}", e)))
}

impl WriteRequest {
    pub fn new(sheet_name: impl Into<String>, action: impl Into<String>) -> Self {
        WriteRequest {
            sheet_name: sheet_name.into(),
            action: action.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Append a full ordered row (`action=insert`, `rowData=[...]`)
    pub fn insert(sheet_name: impl Into<String>, row: &[String]) -> Result<Self> {
        Self::with_row(sheet_name, "insert", row)
    }

    /// Append a full ordered row using the `add` action
    pub fn add(sheet_name: impl Into<String>, row: &[String]) -> Result<Self> {
        Self::with_row(sheet_name, "add", row)
    }

    /// A row-carrying request with a custom action tag
    pub fn with_row(
        sheet_name: impl Into<String>,
        action: impl Into<String>,
        row: &[String],
    ) -> Result<Self> {
        Ok(Self::new(sheet_name, action).param("rowData", encode_json(&row)?))
    }

    /// Update the row identified by a business key
    ///
    /// e.g. `action=updateByDealerCode`, `dealerCode=D-001`, `updateData={...}`
    pub fn update_by_key(
        sheet_name: impl Into<String>,
        action: impl Into<String>,
        key_param: impl Into<String>,
        key: impl Into<String>,
        changes: &BTreeMap<String, String>,
    ) -> Result<Self> {
        Ok(Self::new(sheet_name, action)
            .param(key_param, key)
            .param("updateData", encode_json(changes)?))
    }

    /// Update a physical row by its 1-based index (`action=update`)
    pub fn update_row(
        sheet_name: impl Into<String>,
        row_index: usize,
        changes: &BTreeMap<String, String>,
    ) -> Result<Self> {
        if row_index == 0 {
            return Err(SheetError::Config("row indices are 1-based".into()));
        }
        Ok(Self::new(sheet_name, "update")
            .param("rowIndex", row_index.to_string())
            .param("updateData", encode_json(changes)?))
    }

    /// All form fields: `sheetName`, `action`, then the action parameters
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::with_capacity(self.params.len() + 2);
        fields.push(("sheetName".to_string(), self.sheet_name.clone()));
        fields.push(("action".to_string(), self.action.clone()));
        fields.extend(self.params.iter().cloned());
        fields
    }
}

#[derive(Debug, Deserialize)]
struct WriteAck {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Interpret a confirmed-mode response body
pub fn parse_ack(body: &str) -> Result<WriteOutcome> {
    let json = extract_json_object(body)?;
    let ack: WriteAck = serde_json::from_str(json)
        .map_err(|e| SheetError::MalformedResponse(format!("invalid write response: {}", e)))?;

    if ack.success {
        Ok(WriteOutcome::Confirmed)
    } else {
        let message = ack
            .error
            .or(ack.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE.to_string());
        Err(SheetError::Application(message))
    }
}

/// Submits write requests through a [`SheetsClient`]
pub struct SheetWriter<'a> {
    client: &'a SheetsClient,
    mode: WriteMode,
}

impl<'a> SheetWriter<'a> {
    pub fn new(client: &'a SheetsClient, mode: WriteMode) -> Self {
        SheetWriter { client, mode }
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Send one request; no retry
    pub async fn submit(&self, request: &WriteRequest) -> Result<WriteOutcome> {
        let url = self.client.webapp_url()?;
        let fields = request.form_fields();

        let body = self
            .client
            .transport()
            .post_form(url, &fields, self.mode)
            .await?;

        let outcome = match (self.mode, body) {
            (WriteMode::FireAndForget, _) => WriteOutcome::Assumed,
            (WriteMode::Confirmed, Some(body)) => parse_ack(&body)?,
            (WriteMode::Confirmed, None) => {
                return Err(SheetError::MalformedResponse(
                    "confirmed write returned no body".into(),
                ))
            }
        };

        info!(
            sheet = %request.sheet_name,
            action = %request.action,
            ?outcome,
            "write submitted"
        );
        Ok(outcome)
    }

    /// Validate the form first; a failing form is never sent
    pub async fn submit_validated(
        &self,
        request: &WriteRequest,
        form: &FormValues,
        rules: &BTreeMap<String, Vec<Rule>>,
    ) -> Result<WriteOutcome> {
        if let Err(e) = validate(form, rules) {
            warn!(sheet = %request.sheet_name, "write blocked by validation: {}", e);
            return Err(e);
        }
        self.submit(request).await
    }
}

/// Submission state for one form: `idle → submitting → {success | error}`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting,
    Succeeded(WriteOutcome),
    Failed(String),
}

/// Tracks a form's submission so callers can disable re-submission
#[derive(Debug, Clone, Default)]
pub struct SubmissionTracker {
    state: SubmitState,
}

impl SubmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SubmitState {
        &self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.state == SubmitState::Submitting
    }

    /// Enter `submitting`; `false` if a submission is already in flight
    pub fn begin(&mut self) -> bool {
        if self.is_submitting() {
            return false;
        }
        self.state = SubmitState::Submitting;
        true
    }

    /// Record the result of the in-flight submission
    pub fn finish(&mut self, result: &Result<WriteOutcome>) {
        self.state = match result {
            Ok(outcome) => SubmitState::Succeeded(*outcome),
            Err(e) => SubmitState::Failed(e.to_string()),
        };
    }

    pub fn reset(&mut self) {
        self.state = SubmitState::Idle;
    }
}
